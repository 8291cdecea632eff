use std::{ffi::OsString, process::Command};

use log::info;

use crate::workspace::Workspace;

use super::{find_file_bfs, make_install, prepare_dirs, run_in, BuildEnvironment, BuildError};

const PROJECT_FILE: &str = "CMakeLists.txt";

pub(super) fn build(
    project: &str,
    workspace: &Workspace,
    environment: &BuildEnvironment,
) -> Result<(), BuildError> {
    let (build_dir, install_dir) = prepare_dirs(project, workspace)?;

    let cmake_lists = find_file_bfs(&workspace.src_dir_for(project), &[PROJECT_FILE])?;
    let project_root = std::path::absolute(cmake_lists.parent().unwrap_or(cmake_lists.as_path()))?;

    let mut install_prefix = OsString::from("-DCMAKE_INSTALL_PREFIX=");
    install_prefix.push(&install_dir);

    info!(
        "Configuring `{}` from {} in {}",
        project,
        project_root.display(),
        build_dir.display()
    );
    run_in(
        Command::new("cmake").arg(install_prefix).arg(&project_root),
        &build_dir,
        environment,
    )?;
    make_install(&build_dir, environment)?;

    info!("Installed `{}` into {}", project, install_dir.display());
    Ok(())
}
