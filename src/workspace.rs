use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use log::{debug, info};
use thiserror::Error;

use crate::{
    archive::{self, ArchiveError},
    git::{self, SyncError},
    model::Source,
};

const CACHE_DIR: &str = "cache";
const SRC_DIR: &str = "src";
const BUILD_DIR: &str = "build";
const INSTALL_DIR: &str = "install";

static NEXT_WORKSPACE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("Source `{name}` already belongs to another workspace and must be removed from it first")]
    OwnershipViolation { name: String },
    #[error("Source `{0}` is already registered in this workspace")]
    DuplicateSource(String),
    #[error("Source `{0}` is not registered in this workspace")]
    UnknownSource(String),
    #[error("Error while synchronizing `{name}`: {source}")]
    Sync { name: String, source: SyncError },
    #[error("Error while unpacking `{name}`: {source}")]
    Archive { name: String, source: ArchiveError },
}

/// Identifies the workspace a source entry is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkspaceId(u64);

/// A named source directory that can be registered in at most one workspace at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    name: String,
    source: Source,
    owner: Option<WorkspaceId>,
}

impl SourceEntry {
    pub fn new(name: impl Into<String>, source: Source) -> Self {
        SourceEntry {
            name: name.into(),
            source,
            owner: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn source_dir(&self) -> &Path {
        self.source.source_dir()
    }

    pub fn owner(&self) -> Option<WorkspaceId> {
        self.owner
    }
}

/// Root of all per-project directories plus the download cache shared by archive sources.
#[derive(Debug)]
pub struct Workspace {
    id: WorkspaceId,
    root_dir: PathBuf,
    cache_dir: PathBuf,
    entries: Vec<SourceEntry>,
}

impl Workspace {
    /// A workspace whose download cache lives in `{root_dir}/cache`.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        let root_dir = root_dir.into();
        let cache_dir = root_dir.join(CACHE_DIR);
        Self::with_cache_dir(root_dir, cache_dir)
    }

    pub fn with_cache_dir(root_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Workspace {
            id: WorkspaceId(NEXT_WORKSPACE_ID.fetch_add(1, Ordering::Relaxed)),
            root_dir: root_dir.into(),
            cache_dir: cache_dir.into(),
            entries: Vec::new(),
        }
    }

    pub fn id(&self) -> WorkspaceId {
        self.id
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn src_dir_for(&self, project: &str) -> PathBuf {
        self.root_dir.join(project).join(SRC_DIR)
    }

    pub fn build_dir_for(&self, project: &str) -> PathBuf {
        self.root_dir.join(project).join(BUILD_DIR)
    }

    pub fn install_dir_for(&self, project: &str) -> PathBuf {
        self.root_dir.join(project).join(INSTALL_DIR)
    }

    /// Registers `entry`, which must not be attached to any workspace.
    pub fn add(&mut self, mut entry: SourceEntry) -> Result<(), WorkspaceError> {
        if entry.owner.is_some() {
            return Err(WorkspaceError::OwnershipViolation { name: entry.name });
        }
        if self.contains(&entry.name) {
            return Err(WorkspaceError::DuplicateSource(entry.name));
        }
        debug!(
            "Registering source `{}` at {}",
            entry.name,
            entry.source_dir().display()
        );
        entry.owner = Some(self.id);
        self.entries.push(entry);
        Ok(())
    }

    /// Detaches the entry called `name`, leaving it free to join another workspace.
    pub fn remove(&mut self, name: &str) -> Option<SourceEntry> {
        let index = self.entries.iter().position(|entry| entry.name == name)?;
        let mut entry = self.entries.remove(index);
        entry.owner = None;
        Some(entry)
    }

    pub fn get(&self, name: &str) -> Option<&SourceEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceEntry> {
        self.entries.iter()
    }

    /// Brings the source directory of the entry called `name` up to date.
    pub fn update(&self, name: &str, clean: bool) -> Result<(), WorkspaceError> {
        let entry = self
            .get(name)
            .ok_or_else(|| WorkspaceError::UnknownSource(name.to_owned()))?;
        self.update_entry(entry, clean)
    }

    pub fn update_all(&self, clean: bool) -> Result<(), WorkspaceError> {
        for entry in &self.entries {
            self.update_entry(entry, clean)?;
        }
        Ok(())
    }

    fn update_entry(&self, entry: &SourceEntry, clean: bool) -> Result<(), WorkspaceError> {
        match &entry.source {
            Source::Git(source) => {
                let fetched = git::update(source.source_dir(), &source.sync_request(clean))
                    .map_err(|source| WorkspaceError::Sync {
                        name: entry.name.clone(),
                        source,
                    })?;
                info!("Source `{}` is at {}", entry.name, fetched);
            }
            Source::Archive(source) => {
                let archive_error = |source| WorkspaceError::Archive {
                    name: entry.name.clone(),
                    source,
                };
                let archive =
                    archive::resolve(source.url(), &self.cache_dir).map_err(archive_error)?;
                archive::extract(&archive, source.source_dir(), clean).map_err(archive_error)?;
            }
        }
        Ok(())
    }
}
