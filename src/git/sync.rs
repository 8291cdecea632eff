use std::{
    fmt::{Display, Formatter},
    num::NonZeroU32,
    path::{Path, PathBuf},
};

use log::{debug, info, warn};
use thiserror::Error;

use crate::process::CommandError;

use super::runner::Git;

pub const DEFAULT_REMOTE: &str = "origin";
pub const DEFAULT_REVISION: &str = "master";

const GIT_DIR: &str = ".git";
const SHALLOW_FILE: &str = "shallow";

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Wrong remote '{remote}' URL '{actual}' (should be '{expected}')")]
    RemoteConflict {
        remote: String,
        expected: String,
        actual: String,
    },
    #[error("Revision '{revision}' could not be fetched from remote '{remote}': {source}")]
    RevisionNotFound {
        revision: String,
        remote: String,
        source: CommandError,
    },
    #[error("Could not restore stashed changes in {}: {source}", dir.display())]
    RestoreConflict { dir: PathBuf, source: CommandError },
    #[error("Git error: {0}")]
    Command(#[from] CommandError),
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
}

/// How far `update` may go to reproduce the requested revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Number of commits fetched by the initial shallow fetch.
    pub depth: NonZeroU32,
    /// Allows rewriting the remote URL and discarding local modifications and untracked files.
    pub clean: bool,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        SyncPolicy {
            depth: NonZeroU32::MIN,
            clean: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    pub url: String,
    /// Branch name, tag name or commit id. Which one it is gets decided by the remote.
    pub revision: String,
    pub remote: String,
    pub policy: SyncPolicy,
}

impl SyncRequest {
    pub fn new(url: impl Into<String>) -> Self {
        SyncRequest {
            url: url.into(),
            revision: DEFAULT_REVISION.to_owned(),
            remote: DEFAULT_REMOTE.to_owned(),
            policy: SyncPolicy::default(),
        }
    }

    pub fn revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    pub fn remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    pub fn depth(mut self, depth: NonZeroU32) -> Self {
        self.policy.depth = depth;
        self
    }

    pub fn clean(mut self, clean: bool) -> Self {
        self.policy.clean = clean;
        self
    }
}

/// The commit a revision resolved to after the most recent fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub commit_id: String,
}

impl Display for FetchResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.commit_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Upstream {
    name: String,
    commit_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TreeMove {
    Rebase,
    Checkout,
}

/// Brings the tracked content of `working_dir` to exactly the requested revision.
///
/// The state of the working directory is re-derived from git on every call, so the
/// function can be re-entered after a partial failure. Uncommitted changes are stashed and
/// re-applied on top of the new tree unless the policy allows discarding them.
pub fn update(working_dir: &Path, request: &SyncRequest) -> Result<FetchResult, SyncError> {
    let git = Git::new(working_dir);

    if !working_dir.exists() {
        info!("Creating directory '{}'", working_dir.display());
        std::fs::create_dir_all(working_dir)?;
    }

    let git_dir = working_dir.join(GIT_DIR);
    if !git_dir.exists() {
        info!("Creating git repository in '{}'", working_dir.display());
        git.run(["init", "-q"])?;
    }

    reconcile_remote(&git, request)?;

    let fetched = fetch_revision(&git, &git_dir, request)?;

    let stashed = preserve_local_changes(&git, request)?;

    let upstream = current_upstream(&git)?;
    match plan_tree_move(request, upstream.as_ref(), &fetched) {
        TreeMove::Rebase => {
            info!(
                "Rebasing '{}' onto '{}' ({})",
                working_dir.display(),
                request.revision,
                fetched
            );
            git.run(["rebase", fetched.commit_id.as_str()])?;
        }
        TreeMove::Checkout => {
            info!(
                "Switching '{}' to '{}' ({})",
                working_dir.display(),
                request.revision,
                fetched
            );
            git.run(["checkout", "-q", fetched.commit_id.as_str()])?;
        }
    }

    if stashed {
        info!("Restoring changes in '{}'", working_dir.display());
        git.run(["stash", "pop"])
            .map_err(|source| SyncError::RestoreConflict {
                dir: working_dir.to_path_buf(),
                source,
            })?;
    }

    Ok(fetched)
}

fn reconcile_remote(git: &Git, request: &SyncRequest) -> Result<(), SyncError> {
    let remotes = git.output(["remote"])?;
    let SyncRequest { url, remote, .. } = request;

    if remotes.lines().any(|line| line.trim() == remote) {
        let current_url = git.output(["remote", "get-url", remote.as_str()])?;
        if &current_url != url {
            if request.policy.clean {
                warn!("Changing URL of remote '{}' to '{}'", remote, url);
                git.run(["remote", "set-url", remote.as_str(), url.as_str()])?;
            } else {
                return Err(SyncError::RemoteConflict {
                    remote: remote.clone(),
                    expected: url.clone(),
                    actual: current_url,
                });
            }
        }
    } else {
        info!("Adding remote '{}' with URL '{}'", remote, url);
        git.run(["remote", "add", remote.as_str(), url.as_str()])?;
    }

    Ok(())
}

fn fetch_revision(
    git: &Git,
    git_dir: &Path,
    request: &SyncRequest,
) -> Result<FetchResult, SyncError> {
    let SyncRequest {
        url,
        revision,
        remote,
        policy,
    } = request;
    let depth = policy.depth.to_string();

    info!(
        "Fetching '{}' from remote '{}' ('{}') to '{}'",
        revision,
        remote,
        url,
        git.cwd().display()
    );
    let error = match git.run([
        "fetch",
        "--depth",
        depth.as_str(),
        remote.as_str(),
        "--",
        revision.as_str(),
    ]) {
        Ok(()) => {
            let commit_id = git.output(["rev-parse", "--verify", "FETCH_HEAD^{commit}"])?;
            return Ok(FetchResult { commit_id });
        }
        Err(error @ CommandError::Failed { .. }) => error,
        Err(error) => return Err(error.into()),
    };

    // Branches and tags can always be fetched by name, so a name that resolves to a ref
    // locally but failed to fetch does not exist on the remote.
    if is_symbolic_name(git, revision)? {
        return Err(SyncError::RevisionNotFound {
            revision: revision.clone(),
            remote: remote.clone(),
            source: error,
        });
    }

    warn!(
        "Fetching '{}' failed, trying to fetch entire repository",
        revision
    );
    debug!("Single revision fetch failed with: {}", error);

    if git_dir.join(SHALLOW_FILE).exists() {
        git.run(["fetch", "--unshallow", remote.as_str()])?;
    } else {
        git.run(["fetch", remote.as_str()])?;
    }

    // A well-formed commit id verifies even without a matching object, `^{commit}` does not.
    let commit = format!("{revision}^{{commit}}");
    match git.probe(["rev-parse", "--verify", "-q", commit.as_str()])? {
        Some(commit_id) if !commit_id.is_empty() => Ok(FetchResult { commit_id }),
        _ => Err(SyncError::RevisionNotFound {
            revision: revision.clone(),
            remote: remote.clone(),
            source: error,
        }),
    }
}

/// Whether `revision` names a ref (branch, tag, remote branch) in the local repository.
///
/// A tag whose name looks like a full commit id is indistinguishable from that commit id here.
fn is_symbolic_name(git: &Git, revision: &str) -> Result<bool, SyncError> {
    let name = git.probe(["rev-parse", "--symbolic-full-name", revision])?;
    Ok(name.is_some_and(|name| !name.is_empty()))
}

/// Stashes or discards local modifications. Returns whether a stash has to be restored.
fn preserve_local_changes(git: &Git, request: &SyncRequest) -> Result<bool, SyncError> {
    let status = git.output(["status", "--porcelain"])?;
    if status.is_empty() {
        return Ok(false);
    }

    if request.policy.clean {
        info!("Cleaning '{}'", git.cwd().display());
        git.run(["reset", "--hard"])?;
        git.run(["clean", "-dff"])?;
        Ok(false)
    } else {
        info!("Stashing changes in '{}'", git.cwd().display());
        let message = format!("Automatically stashed by \"{}\"", program_name());
        git.run(["stash", "save", "--all", message.as_str()])?;
        Ok(true)
    }
}

fn current_upstream(git: &Git) -> Result<Option<Upstream>, SyncError> {
    let name = git.probe(["rev-parse", "--verify", "-q", "--symbolic-full-name", "@{u}"])?;
    let commit_id = git.probe(["rev-parse", "--verify", "-q", "@{u}"])?;

    Ok(match (name, commit_id) {
        (Some(name), Some(commit_id)) if !name.is_empty() && !commit_id.is_empty() => {
            debug!("Current upstream is {} ({})", name, commit_id);
            Some(Upstream { name, commit_id })
        }
        _ => None,
    })
}

/// Local commits survive only when the working copy already tracks the requested branch
/// of the same remote and that branch is exactly what was just fetched.
fn plan_tree_move(
    request: &SyncRequest,
    upstream: Option<&Upstream>,
    fetched: &FetchResult,
) -> TreeMove {
    let tracked_ref = format!("refs/remotes/{}/{}", request.remote, request.revision);
    match upstream {
        Some(upstream)
            if !request.policy.clean
                && upstream.name == tracked_ref
                && upstream.commit_id == fetched.commit_id =>
        {
            TreeMove::Rebase
        }
        _ => TreeMove::Checkout,
    }
}

fn program_name() -> String {
    std::env::args_os()
        .next()
        .map(|arg| arg.to_string_lossy().into_owned())
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_owned())
}
