use clap::{ArgAction, Parser};

/// Fetches, builds and installs native projects into a self-contained workspace.
#[derive(Debug, Parser)]
#[clap(version)]
pub struct CliArgs {
    #[clap(subcommand)]
    pub cmd: Command,
    /// Increase logging verbosity, may be repeated
    #[clap(short, long, action = ArgAction::Count, global = true, conflicts_with = "quiet")]
    pub verbose: u8,
    /// Decrease logging verbosity, may be repeated
    #[clap(short, long, action = ArgAction::Count, global = true)]
    pub quiet: u8,
    /// Workspace root directory [default: current directory]
    #[clap(short, long)]
    pub root: Option<String>,
    /// Name of the manifest file, relative to the workspace root
    #[clap(short = 'f', long, default_value = "prefix.toml")]
    pub manifest: String,
    /// Location of the download cache [default: <root>/cache]
    #[clap(long)]
    pub cache_directory: Option<String>,
}

#[derive(Debug, Parser)]
pub enum Command {
    ///Synchronizes the sources of the given projects, or of all projects
    Sync {
        /// Discard local changes instead of stashing them
        #[clap(long)]
        clean: bool,
        projects: Vec<String>,
    },
    ///Synchronizes, builds and installs the given projects, or all projects
    Build {
        /// Discard local changes and previous build directories
        #[clap(long)]
        clean: bool,
        projects: Vec<String>,
    },
    ///Removes the download cache
    ClearCache,
}

impl CliArgs {
    /// Log level filter implied by the verbosity flags.
    pub fn log_level(&self) -> log::LevelFilter {
        match (self.verbose, self.quiet) {
            (0, 0) => log::LevelFilter::Info,
            (0, 1) => log::LevelFilter::Warn,
            (0, _) => log::LevelFilter::Error,
            (1, _) => log::LevelFilter::Debug,
            (_, _) => log::LevelFilter::Trace,
        }
    }
}
