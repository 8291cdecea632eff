//! Build drivers for CMake and Autotools projects living in a [`Workspace`].
//!
//! Every project is configured out of tree in `{root}/{project}/build` and installed into
//! `{root}/{project}/install`, where later projects can find it through their environment.

use std::{
    env::JoinPathsError,
    fs, io,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    process::Command,
};

use log::{error, info};
use thiserror::Error;

use crate::{
    archive::{self, ArchiveError},
    model::{BuildSystem, ProjectConfig},
    process::{run_inherited, CommandError},
    workspace::{Workspace, WorkspaceError},
};

mod autotools;
mod cmake;
mod environment;
mod project_root;

pub use environment::{BuildEnvironment, DependencyPaths};
pub use project_root::find_file_bfs;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("More than one project root found: {candidates:?}")]
    AmbiguousProjectRoot { candidates: Vec<PathBuf> },
    #[error("None of {file_names:?} found in {}", start_dir.display())]
    ProjectRootNotFound {
        file_names: Vec<String>,
        start_dir: PathBuf,
    },
    #[error(transparent)]
    Source(#[from] WorkspaceError),
    #[error("Could not populate the source directory: {0}")]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("Could not compose the build environment: {0}")]
    Environment(#[from] JoinPathsError),
    #[error("IO error: {0}")]
    IO(#[from] io::Error),
}

/// Unpacks the archive at `url` into the source directory of `project`, then configures,
/// builds and installs it with CMake.
pub fn build_cmake(project: &str, url: &str, workspace: &Workspace) -> Result<(), BuildError> {
    populate_from_archive(project, url, workspace)?;
    let environment = BuildEnvironment::from_current_env();
    cmake::build(project, workspace, &environment)
}

/// Unpacks the archive at `url` into the source directory of `project`, then configures,
/// builds and installs it with its `configure` script.
///
/// The install prefixes of `deps` are made visible through the environment of the build.
pub fn build_autotools<D, A>(
    project: &str,
    url: &str,
    workspace: &Workspace,
    deps: &[D],
    extra_args: &[A],
) -> Result<(), BuildError>
where
    D: AsRef<str>,
    A: AsRef<str>,
{
    populate_from_archive(project, url, workspace)?;
    let environment = dependency_environment(workspace, deps)?;
    autotools::build(project, workspace, &environment, extra_args)
}

/// Builds and installs a manifest project whose source directory is already populated.
pub fn build_project(project: &ProjectConfig, workspace: &Workspace) -> Result<(), BuildError> {
    info!("Building `{}` with {}", project.name, project.build);
    let environment = dependency_environment(workspace, &project.deps)?;
    match project.build {
        BuildSystem::Cmake => cmake::build(&project.name, workspace, &environment),
        BuildSystem::Autotools => autotools::build(
            &project.name,
            workspace,
            &environment,
            &project.configure_args,
        ),
    }
}

fn populate_from_archive(project: &str, url: &str, workspace: &Workspace) -> Result<(), BuildError> {
    let archive = archive::resolve(url, workspace.cache_dir())?;
    archive::extract(&archive, &workspace.src_dir_for(project), false)?;
    Ok(())
}

fn dependency_environment<D: AsRef<str>>(
    workspace: &Workspace,
    deps: &[D],
) -> Result<BuildEnvironment, BuildError> {
    let prefixes: Vec<PathBuf> = deps
        .iter()
        .map(|dep| workspace.install_dir_for(dep.as_ref()))
        .collect();
    let paths = DependencyPaths::from_prefixes(prefixes.iter().map(PathBuf::as_path));

    let mut environment = BuildEnvironment::from_current_env();
    environment.add_dependencies(&paths)?;
    Ok(environment)
}

/// Absolute build and install directories of `project`, created if missing.
fn prepare_dirs(project: &str, workspace: &Workspace) -> Result<(PathBuf, PathBuf), BuildError> {
    let build_dir = std::path::absolute(workspace.build_dir_for(project))?;
    let install_dir = std::path::absolute(workspace.install_dir_for(project))?;
    fs::create_dir_all(&build_dir)?;
    fs::create_dir_all(&install_dir)?;
    Ok((build_dir, install_dir))
}

fn jobs() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Runs `command` in `build_dir` with exactly the variables of `environment`.
fn run_in(
    command: &mut Command,
    build_dir: &Path,
    environment: &BuildEnvironment,
) -> Result<(), BuildError> {
    command
        .current_dir(build_dir)
        .env_clear()
        .envs(environment.vars());
    if let Err(err) = run_inherited(command) {
        error!("Environment:\n{}", environment);
        return Err(err.into());
    }
    Ok(())
}

fn make_install(build_dir: &Path, environment: &BuildEnvironment) -> Result<(), BuildError> {
    run_in(
        Command::new("make")
            .arg(format!("-j{}", jobs()))
            .arg("install"),
        build_dir,
        environment,
    )
}
