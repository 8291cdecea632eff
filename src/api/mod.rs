use std::{error::Error, path::PathBuf};

use crate::cli::command_handlers::{do_build, do_clear_cache, do_sync};

mod builder;

pub use builder::PrefixBuilder;

/// A workspace described by a manifest file in its root directory.
pub struct Prefix {
    root: PathBuf,
    manifest_file_name: PathBuf,
    cache_directory: PathBuf,
}

impl Prefix {
    pub fn builder() -> PrefixBuilder {
        PrefixBuilder::default()
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    pub fn cache_directory(&self) -> &std::path::Path {
        &self.cache_directory
    }

    /// Brings the sources of `projects` and their dependencies up to date.
    /// An empty list selects every project of the manifest.
    pub fn sync(&self, projects: &[String], clean: bool) -> Result<(), Box<dyn Error>> {
        do_sync(
            &self.root,
            &self.manifest_file_name,
            &self.cache_directory,
            projects,
            clean,
        )
    }

    /// Synchronizes, builds and installs `projects` and their dependencies in manifest order.
    pub fn build(&self, projects: &[String], clean: bool) -> Result<(), Box<dyn Error>> {
        do_build(
            &self.root,
            &self.manifest_file_name,
            &self.cache_directory,
            projects,
            clean,
        )
    }

    pub fn clear_cache(&self) -> Result<(), Box<dyn Error>> {
        do_clear_cache(&self.cache_directory)
    }
}
