//! Synchronization of a local git working copy with a remote revision.
//!
//! Every operation is an invocation of the external `git` program; the repository on disk is
//! the only source of truth about its state.

mod runner;
mod sync;

pub use runner::Git;
pub use sync::{
    update, FetchResult, SyncError, SyncPolicy, SyncRequest, DEFAULT_REMOTE, DEFAULT_REVISION,
};
