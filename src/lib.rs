pub mod archive;
pub mod build;
pub mod cli;
pub mod config;
pub mod git;
pub mod model;
pub mod process;
pub mod workspace;

mod api;
mod flock;

pub use api::{Prefix, PrefixBuilder};
