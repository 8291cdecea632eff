pub mod manifest;
pub mod source;

pub use manifest::{BuildSystem, Manifest, ManifestError, ProjectConfig};
pub use source::{
    ArchiveSource, GitSource, GitSourceConfig, Source, SourceConfig, SourceConfigError,
};
