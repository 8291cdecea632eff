use std::{collections::HashMap, path::PathBuf};

use config::{Config, ConfigError, Environment, File, FileFormat};
use log::debug;
use serde::Deserialize;

const ENV_PREFIX: &str = "PREFIX";
const CONFIG_FILE: &str = ".prefix/config.toml";

/// Settings that may come from the environment or from `$HOME/.prefix/config.toml`.
///
/// Command line options take precedence over both.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PrefixConfig {
    pub workspace_root: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
}

impl PrefixConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config_file = home::home_dir().map(|home| home.join(CONFIG_FILE));
        let raw_config = RawConfig::load(config_file, None)?;
        debug!("Loaded configuration {:?}", raw_config);

        Ok(Self {
            workspace_root: raw_config.workspace.root,
            cache_dir: raw_config.cache.dir,
        })
    }
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct RawConfig {
    #[serde(default)]
    workspace: WorkspaceConfig,
    #[serde(default)]
    cache: CacheConfig,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct WorkspaceConfig {
    root: Option<PathBuf>,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct CacheConfig {
    dir: Option<PathBuf>,
}

impl RawConfig {
    fn load(
        config_file: Option<PathBuf>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(config_file) = config_file {
            builder = builder.add_source(
                File::from(config_file)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }
        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("_")
                    .source(env),
            )
            .build()?
            .try_deserialize()
    }
}
