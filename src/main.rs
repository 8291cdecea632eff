use std::{error::Error, path::PathBuf, process::ExitCode};

use clap::Parser;
use log::error;

use prefix::{
    cli::args::{CliArgs, Command},
    config::PrefixConfig,
    Prefix,
};

fn main() -> ExitCode {
    let cli_args = CliArgs::parse();

    env_logger::Builder::new()
        .filter_level(cli_args.log_level())
        .parse_env(env_logger::Env::default())
        .init();

    match run(cli_args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli_args: CliArgs) -> Result<(), Box<dyn Error>> {
    let config = PrefixConfig::load()?;

    let mut builder = Prefix::builder().manifest_file_name(&cli_args.manifest);
    if let Some(root) = cli_args.root.map(PathBuf::from).or(config.workspace_root) {
        builder = builder.root(root);
    }
    if let Some(cache_directory) = cli_args
        .cache_directory
        .map(PathBuf::from)
        .or(config.cache_dir)
    {
        builder = builder.cache_directory(cache_directory);
    }
    let prefix = builder.try_build()?;

    match cli_args.cmd {
        Command::Sync { clean, projects } => prefix.sync(&projects, clean),
        Command::Build { clean, projects } => prefix.build(&projects, clean),
        Command::ClearCache => prefix.clear_cache(),
    }
}
