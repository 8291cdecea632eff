use std::{env, error::Error, path::PathBuf};

use crate::Prefix;

const DEFAULT_MANIFEST_FILE_NAME: &str = "prefix.toml";
const DEFAULT_CACHE_DIRECTORY_NAME: &str = "cache";

#[derive(Default)]
pub struct PrefixBuilder {
    // All other paths are relative to `root`
    root: Option<PathBuf>,
    manifest_file_name: Option<PathBuf>,
    cache_directory_path: Option<PathBuf>,
}

impl PrefixBuilder {
    /// Workspace root directory.
    ///
    /// Defaults to the current directory.
    pub fn root(mut self, path: impl Into<PathBuf>) -> Self {
        self.root = Some(path.into());
        self
    }

    /// Name of the manifest file.
    ///
    /// Defaults to `prefix.toml`.
    pub fn manifest_file_name(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_file_name = Some(path.into());
        self
    }

    /// Location of the download cache.
    ///
    /// Defaults to `cache` inside the workspace root.
    pub fn cache_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_directory_path = Some(path.into());
        self
    }

    pub fn try_build(self) -> Result<Prefix, Box<dyn Error>> {
        let Self {
            root,
            manifest_file_name,
            cache_directory_path,
        } = self;
        let root = match root {
            Some(root) => std::path::absolute(root)?,
            None => env::current_dir()?,
        };

        let manifest_file_name =
            manifest_file_name.unwrap_or_else(|| PathBuf::from(DEFAULT_MANIFEST_FILE_NAME));

        let cache_directory = root.join(
            cache_directory_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIRECTORY_NAME)),
        );

        Ok(Prefix {
            root,
            manifest_file_name,
            cache_directory,
        })
    }
}
