use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    process::Command,
};

use crate::process::{self, CommandError};

const GIT_PROGRAM: &str = "git";

/// Runs git subcommands inside a fixed working directory.
#[derive(Debug, Clone)]
pub struct Git {
    cwd: PathBuf,
}

impl Git {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Git { cwd: cwd.into() }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Runs a subcommand, failing on a nonzero exit.
    pub fn run<I, S>(&self, args: I) -> Result<(), CommandError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        process::run_captured(&mut self.command(args))?;
        Ok(())
    }

    /// Runs a subcommand and returns its trimmed standard output.
    pub fn output<I, S>(&self, args: I) -> Result<String, CommandError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = process::run_captured(&mut self.command(args))?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }

    /// Like [`Git::output`], but a nonzero exit yields `Ok(None)` instead of an error.
    ///
    /// Used to probe for things that may legitimately be absent, such as an upstream branch.
    /// Failing to start git at all is still an error.
    pub fn probe<I, S>(&self, args: I) -> Result<Option<String>, CommandError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        match self.output(args) {
            Ok(output) => Ok(Some(output)),
            Err(CommandError::Failed { .. }) => Ok(None),
            Err(error) => Err(error),
        }
    }

    fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(GIT_PROGRAM);
        command.args(args).current_dir(&self.cwd);
        command
    }
}
