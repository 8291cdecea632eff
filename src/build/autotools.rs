use std::process::Command;

use log::info;

use crate::workspace::Workspace;

use super::{find_file_bfs, make_install, prepare_dirs, run_in, BuildEnvironment, BuildError};

const CONFIGURE_SCRIPT: &str = "configure";

pub(super) fn build<A: AsRef<str>>(
    project: &str,
    workspace: &Workspace,
    environment: &BuildEnvironment,
    extra_args: &[A],
) -> Result<(), BuildError> {
    let (build_dir, install_dir) = prepare_dirs(project, workspace)?;

    let configure = std::path::absolute(find_file_bfs(
        &workspace.src_dir_for(project),
        &[CONFIGURE_SCRIPT],
    )?)?;
    let extra_args: Vec<&str> = extra_args.iter().map(|arg| arg.as_ref()).collect();

    info!(
        "Configuring `{}` with {} in {}",
        project,
        configure.display(),
        build_dir.display()
    );
    run_in(
        Command::new(&configure)
            .arg("--prefix")
            .arg(&install_dir)
            .args(&extra_args),
        &build_dir,
        environment,
    )?;
    make_install(&build_dir, environment)?;

    info!("Installed `{}` into {}", project, install_dir.display());
    Ok(())
}
