use std::{
    ffi::OsStr,
    fmt::Write,
    path::{Path, PathBuf},
    process::{Command, Output},
};

use log::{debug, trace};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Could not start `{command}` in {}: {source}", cwd.display())]
    Spawn {
        command: String,
        cwd: PathBuf,
        source: std::io::Error,
    },
    #[error("`{command}` in {} failed with exit code {}{}", cwd.display(), display_code(*code), display_stderr(stderr))]
    Failed {
        command: String,
        cwd: PathBuf,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

impl CommandError {
    /// Exit code of the failed process, `None` if it was killed by a signal or never started.
    pub fn code(&self) -> Option<i32> {
        match self {
            CommandError::Spawn { .. } => None,
            CommandError::Failed { code, .. } => *code,
        }
    }

    pub fn stderr(&self) -> &str {
        match self {
            CommandError::Spawn { .. } => "",
            CommandError::Failed { stderr, .. } => stderr,
        }
    }
}

fn display_code(code: Option<i32>) -> String {
    code.map(|code| code.to_string())
        .unwrap_or_else(|| "<signal>".to_owned())
}

fn display_stderr(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// Runs `command` to completion, capturing its output.
///
/// A nonzero exit becomes [`CommandError::Failed`] carrying the exit code and both output streams.
pub fn run_captured(command: &mut Command) -> Result<Output, CommandError> {
    let (rendered, cwd) = describe(command);
    debug!("Running {} in {}", rendered, cwd.display());

    let output = command.output().map_err(|source| CommandError::Spawn {
        command: rendered.clone(),
        cwd: cwd.clone(),
        source,
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        trace!("{}: {}", rendered, stderr.trim());
    }

    if output.status.success() {
        Ok(output)
    } else {
        Err(CommandError::Failed {
            command: rendered,
            cwd,
            code: output.status.code(),
            stdout: stdout.trim().to_owned(),
            stderr: stderr.trim().to_owned(),
        })
    }
}

/// Runs `command` with inherited standard streams, so the user sees its progress.
pub fn run_inherited(command: &mut Command) -> Result<(), CommandError> {
    let (rendered, cwd) = describe(command);
    debug!("Running {} in {}", rendered, cwd.display());

    let status = command.status().map_err(|source| CommandError::Spawn {
        command: rendered.clone(),
        cwd: cwd.clone(),
        source,
    })?;

    if status.success() {
        Ok(())
    } else {
        Err(CommandError::Failed {
            command: rendered,
            cwd,
            code: status.code(),
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

fn describe(command: &Command) -> (String, PathBuf) {
    let mut rendered = shell_quote(command.get_program());
    for arg in command.get_args() {
        let _ = write!(rendered, " {}", shell_quote(arg));
    }
    let cwd = command
        .get_current_dir()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    (rendered, cwd)
}

/// Quotes `value` for a POSIX shell, leaving it untouched when it has no special characters.
pub fn shell_quote(value: impl AsRef<OsStr>) -> String {
    let value = value.as_ref().to_string_lossy();
    let is_safe = |c: char| c.is_ascii_alphanumeric() || "@%+=:,./-_".contains(c);
    if !value.is_empty() && value.chars().all(is_safe) {
        value.into_owned()
    } else {
        format!("'{}'", value.replace('\'', "'\"'\"'"))
    }
}
