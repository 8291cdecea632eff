use std::{
    num::NonZeroU32,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;

use crate::{
    archive::{ArchiveError, SourceUrl},
    git::{SyncPolicy, SyncRequest, DEFAULT_REMOTE, DEFAULT_REVISION},
};

#[derive(Error, Debug)]
pub enum SourceConfigError {
    #[error("Source URL must not be empty")]
    EmptyUrl,
    #[error("Revision must not be empty")]
    EmptyRevision,
    #[error("Invalid remote name `{0}`")]
    InvalidRemote(String),
    #[error("Invalid archive URL: {0}")]
    InvalidArchiveUrl(#[from] ArchiveError),
}

/// Options of a source tracked in a git repository.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitSourceConfig {
    pub url: String,
    #[serde(default = "default_revision")]
    pub revision: String,
    #[serde(default = "default_depth")]
    pub depth: NonZeroU32,
    #[serde(default = "default_remote")]
    pub remote: String,
}

fn default_revision() -> String {
    DEFAULT_REVISION.to_owned()
}

fn default_depth() -> NonZeroU32 {
    NonZeroU32::MIN
}

fn default_remote() -> String {
    DEFAULT_REMOTE.to_owned()
}

impl GitSourceConfig {
    pub fn new(url: impl Into<String>) -> Self {
        GitSourceConfig {
            url: url.into(),
            revision: default_revision(),
            depth: default_depth(),
            remote: default_remote(),
        }
    }

    pub fn validate(&self) -> Result<(), SourceConfigError> {
        if self.url.trim().is_empty() {
            return Err(SourceConfigError::EmptyUrl);
        }
        if self.revision.trim().is_empty() {
            return Err(SourceConfigError::EmptyRevision);
        }
        let remote_is_valid = !self.remote.is_empty()
            && !self.remote.starts_with('-')
            && !self
                .remote
                .chars()
                .any(|c| c.is_whitespace() || c == '/' || c == ':');
        if !remote_is_valid {
            return Err(SourceConfigError::InvalidRemote(self.remote.clone()));
        }
        Ok(())
    }
}

/// Where the source of a project comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    Archive { url: String },
    Git(GitSourceConfig),
}

impl SourceConfig {
    pub fn validate(&self) -> Result<(), SourceConfigError> {
        match self {
            SourceConfig::Archive { url } => {
                if url.trim().is_empty() {
                    return Err(SourceConfigError::EmptyUrl);
                }
                SourceUrl::parse(url)?;
                Ok(())
            }
            SourceConfig::Git(config) => config.validate(),
        }
    }
}

/// A validated git-backed source directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSource {
    source_dir: PathBuf,
    config: GitSourceConfig,
}

impl GitSource {
    pub fn new(
        source_dir: impl Into<PathBuf>,
        config: GitSourceConfig,
    ) -> Result<Self, SourceConfigError> {
        config.validate()?;
        Ok(GitSource {
            source_dir: source_dir.into(),
            config,
        })
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn config(&self) -> &GitSourceConfig {
        &self.config
    }

    pub fn sync_request(&self, clean: bool) -> SyncRequest {
        SyncRequest {
            url: self.config.url.clone(),
            revision: self.config.revision.clone(),
            remote: self.config.remote.clone(),
            policy: SyncPolicy {
                depth: self.config.depth,
                clean,
            },
        }
    }
}

/// A validated archive-backed source directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSource {
    source_dir: PathBuf,
    url: String,
}

impl ArchiveSource {
    pub fn new(
        source_dir: impl Into<PathBuf>,
        url: impl Into<String>,
    ) -> Result<Self, SourceConfigError> {
        let url = url.into();
        SourceConfig::Archive { url: url.clone() }.validate()?;
        Ok(ArchiveSource {
            source_dir: source_dir.into(),
            url,
        })
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Git(GitSource),
    Archive(ArchiveSource),
}

impl Source {
    pub fn from_config(
        source_dir: impl Into<PathBuf>,
        config: SourceConfig,
    ) -> Result<Self, SourceConfigError> {
        match config {
            SourceConfig::Archive { url } => Ok(Source::Archive(ArchiveSource::new(source_dir, url)?)),
            SourceConfig::Git(config) => Ok(Source::Git(GitSource::new(source_dir, config)?)),
        }
    }

    pub fn source_dir(&self) -> &Path {
        match self {
            Source::Git(git) => git.source_dir(),
            Source::Archive(archive) => archive.source_dir(),
        }
    }
}
