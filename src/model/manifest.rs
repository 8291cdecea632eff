use std::{
    fmt::{Display, Formatter},
    num::NonZeroU32,
    path::Path,
};

use log::debug;
use serde::Deserialize;
use thiserror::Error;

use super::source::{GitSourceConfig, SourceConfig, SourceConfigError};

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error reading manifest: {0}")]
    IO(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid definition of project `{project}`: {source}")]
    InvalidProject {
        project: String,
        source: toml::de::Error,
    },
    #[error("Project name `{0}` cannot be used as a directory name")]
    InvalidProjectName(String),
    #[error("Project `{0}` needs exactly one of `url` or `git`")]
    MissingSource(String),
    #[error("Project `{0}` defines both `url` and `git`")]
    ConflictingSources(String),
    #[error("Project `{project}` sets `{option}`, which only applies to `git` sources")]
    GitOptionWithoutGit {
        project: String,
        option: &'static str,
    },
    #[error("Project `{0}` sets `configure_args`, which only applies to autotools builds")]
    ConfigureArgsWithoutAutotools(String),
    #[error("Project `{project}` depends on `{dependency}`, which is not defined before it")]
    UnknownDependency { project: String, dependency: String },
    #[error("Invalid source of project `{project}`: {source}")]
    InvalidSource {
        project: String,
        source: SourceConfigError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildSystem {
    Cmake,
    Autotools,
}

impl Display for BuildSystem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildSystem::Cmake => f.write_str("cmake"),
            BuildSystem::Autotools => f.write_str("autotools"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    pub name: String,
    pub build: BuildSystem,
    pub source: SourceConfig,
    /// Projects whose install prefixes are made visible to this build.
    pub deps: Vec<String>,
    pub configure_args: Vec<String>,
}

/// The projects of a workspace, in the order they have to be built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub projects: Vec<ProjectConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProject {
    build: BuildSystem,
    url: Option<String>,
    git: Option<String>,
    revision: Option<String>,
    depth: Option<NonZeroU32>,
    remote: Option<String>,
    #[serde(default)]
    deps: Vec<String>,
    #[serde(default)]
    configure_args: Vec<String>,
}

impl Manifest {
    pub fn from_file(path: &Path) -> Result<Manifest, ManifestError> {
        debug!("Attempting to read manifest from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Manifest::from_toml_str(&contents)
    }

    pub fn from_toml_str(data: &str) -> Result<Manifest, ManifestError> {
        let table: toml::Table = toml::from_str(data)?;
        let mut projects: Vec<ProjectConfig> = Vec::with_capacity(table.len());

        for (name, value) in table {
            let raw = value
                .try_into::<RawProject>()
                .map_err(|source| ManifestError::InvalidProject {
                    project: name.clone(),
                    source,
                })?;

            if let Some(dependency) = raw
                .deps
                .iter()
                .find(|dep| !projects.iter().any(|project| &project.name == *dep))
            {
                return Err(ManifestError::UnknownDependency {
                    project: name,
                    dependency: dependency.clone(),
                });
            }

            projects.push(ProjectConfig::from_raw(name, raw)?);
        }

        Ok(Manifest { projects })
    }

    pub fn project(&self, name: &str) -> Option<&ProjectConfig> {
        self.projects.iter().find(|project| project.name == name)
    }
}

impl ProjectConfig {
    fn from_raw(name: String, raw: RawProject) -> Result<ProjectConfig, ManifestError> {
        if !is_valid_project_name(&name) {
            return Err(ManifestError::InvalidProjectName(name));
        }

        let source = match (raw.url, raw.git) {
            (Some(_), Some(_)) => return Err(ManifestError::ConflictingSources(name)),
            (None, None) => return Err(ManifestError::MissingSource(name)),
            (Some(url), None) => {
                let git_only = [
                    ("revision", raw.revision.is_some()),
                    ("depth", raw.depth.is_some()),
                    ("remote", raw.remote.is_some()),
                ];
                if let Some((option, _)) = git_only.into_iter().find(|(_, set)| *set) {
                    return Err(ManifestError::GitOptionWithoutGit {
                        project: name,
                        option,
                    });
                }
                SourceConfig::Archive { url }
            }
            (None, Some(url)) => {
                let mut config = GitSourceConfig::new(url);
                if let Some(revision) = raw.revision {
                    config.revision = revision;
                }
                if let Some(depth) = raw.depth {
                    config.depth = depth;
                }
                if let Some(remote) = raw.remote {
                    config.remote = remote;
                }
                SourceConfig::Git(config)
            }
        };

        if let Err(source) = source.validate() {
            return Err(ManifestError::InvalidSource {
                project: name,
                source,
            });
        }

        if raw.build != BuildSystem::Autotools && !raw.configure_args.is_empty() {
            return Err(ManifestError::ConfigureArgsWithoutAutotools(name));
        }

        Ok(ProjectConfig {
            name,
            build: raw.build,
            source,
            deps: raw.deps,
            configure_args: raw.configure_args,
        })
    }
}

/// Project names become a single path component below the workspace root.
fn is_valid_project_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(|c: char| c == '/' || c == '\\' || c == '\0')
}
