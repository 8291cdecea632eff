//! Environment for builds that find their dependencies through well-known variables.

use std::{
    collections::BTreeMap,
    env::{self, JoinPathsError},
    ffi::{OsStr, OsString},
    fmt::{Display, Formatter},
    path::{Path, PathBuf},
};

use crate::process::shell_quote;

/// Directories of already installed dependencies, in dependency order and without duplicates.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DependencyPaths {
    pub pkg_config: Vec<PathBuf>,
    pub bin: Vec<PathBuf>,
    pub lib: Vec<PathBuf>,
    pub include: Vec<PathBuf>,
}

impl DependencyPaths {
    /// Collects the directories that exist below each install prefix.
    pub fn from_prefixes<'a>(prefixes: impl IntoIterator<Item = &'a Path>) -> Self {
        let mut paths = DependencyPaths::default();
        for prefix in prefixes {
            push_existing(&mut paths.pkg_config, prefix.join("lib").join("pkgconfig"));
            push_existing(&mut paths.pkg_config, prefix.join("share").join("pkgconfig"));
            push_existing(&mut paths.bin, prefix.join("bin"));
            push_existing(&mut paths.lib, prefix.join("lib"));
            push_existing(&mut paths.include, prefix.join("include"));
        }
        paths
    }
}

fn push_existing(paths: &mut Vec<PathBuf>, path: PathBuf) {
    if path.is_dir() && !paths.contains(&path) {
        paths.push(path);
    }
}

/// A full set of environment variables handed to a build subprocess.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildEnvironment {
    vars: BTreeMap<OsString, OsString>,
}

impl BuildEnvironment {
    pub fn from_current_env() -> Self {
        Self::from_vars(env::vars_os())
    }

    pub fn from_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<OsString>,
        V: Into<OsString>,
    {
        BuildEnvironment {
            vars: vars
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: impl AsRef<OsStr>) -> Option<&OsStr> {
        self.vars.get(key.as_ref()).map(OsString::as_os_str)
    }

    pub fn vars(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
        self.vars
            .iter()
            .map(|(key, value)| (key.as_os_str(), value.as_os_str()))
    }

    /// Makes the installed dependencies visible to pkg-config, the shell, the dynamic loader
    /// and the C preprocessor and linker.
    pub fn add_dependencies(&mut self, paths: &DependencyPaths) -> Result<(), JoinPathsError> {
        self.prepend_paths("PKG_CONFIG_PATH", &paths.pkg_config)?;
        self.prepend_paths("PATH", &paths.bin)?;
        self.prepend_paths("LD_LIBRARY_PATH", &paths.lib)?;
        self.prepend_paths("DYLD_LIBRARY_PATH", &paths.lib)?;
        self.append_flags("CPPFLAGS", paths.include.iter().map(|path| flag("-I", path)));
        self.append_flags("LDFLAGS", paths.lib.iter().map(|path| flag("-L", path)));
        Ok(())
    }

    /// Puts `paths` in front of the current value of the search path variable `key`,
    /// skipping entries it already contains.
    pub fn prepend_paths(&mut self, key: &str, paths: &[PathBuf]) -> Result<(), JoinPathsError> {
        let existing: Vec<PathBuf> = self
            .get(key)
            .map(|value| env::split_paths(value).collect())
            .unwrap_or_default();

        let mut combined: Vec<PathBuf> = Vec::with_capacity(paths.len() + existing.len());
        for path in paths {
            if !existing.contains(path) && !combined.contains(path) {
                combined.push(path.clone());
            }
        }
        if combined.is_empty() {
            return Ok(());
        }
        combined.extend(existing);

        let value = env::join_paths(combined)?;
        self.vars.insert(key.into(), value);
        Ok(())
    }

    /// Appends `flags` to the variable `key`, shell-quoted and space separated, skipping flags
    /// the current value already contains.
    pub fn append_flags(&mut self, key: &str, flags: impl IntoIterator<Item = String>) {
        let mut value = self.get(key).map(OsStr::to_os_string).unwrap_or_default();
        let current = value.to_string_lossy().into_owned();
        // Unbalanced quotes cannot be split as shell words; fall back to plain whitespace.
        let existing: Vec<String> = shlex::split(&current)
            .unwrap_or_else(|| current.split_whitespace().map(str::to_owned).collect());

        let mut added: Vec<String> = Vec::new();
        for flag in flags {
            if !existing.contains(&flag) && !added.contains(&flag) {
                added.push(flag);
            }
        }
        if added.is_empty() {
            return;
        }

        let quoted: Vec<String> = added.iter().map(shell_quote).collect();
        if !value.is_empty() {
            value.push(" ");
        }
        value.push(quoted.join(" "));
        self.vars.insert(key.into(), value);
    }
}

fn flag(prefix: &str, path: &Path) -> String {
    format!("{}{}", prefix, path.to_string_lossy())
}

impl Display for BuildEnvironment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (key, value) in &self.vars {
            writeln!(f, "{}={}", key.to_string_lossy(), value.to_string_lossy())?;
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    use std::fs;

    use pretty_assertions::assert_eq;

    fn value(environment: &BuildEnvironment, key: &str) -> Option<String> {
        environment
            .get(key)
            .map(|value| value.to_string_lossy().into_owned())
    }

    #[test]
    fn collects_existing_dependency_directories() {
        let dir = tempfile::tempdir().unwrap();
        let zlib = dir.path().join("zlib/install");
        let libffi = dir.path().join("libffi/install");
        for path in ["lib/pkgconfig", "include"] {
            fs::create_dir_all(zlib.join(path)).unwrap();
        }
        for path in ["bin", "lib", "share/pkgconfig"] {
            fs::create_dir_all(libffi.join(path)).unwrap();
        }

        let paths = DependencyPaths::from_prefixes([zlib.as_path(), libffi.as_path(), zlib.as_path()]);
        assert_eq!(
            paths,
            DependencyPaths {
                pkg_config: vec![zlib.join("lib/pkgconfig"), libffi.join("share/pkgconfig")],
                bin: vec![libffi.join("bin")],
                lib: vec![zlib.join("lib"), libffi.join("lib")],
                include: vec![zlib.join("include")],
            }
        );
    }

    #[test]
    fn prepends_to_existing_search_paths() {
        let mut environment = BuildEnvironment::from_vars([("PATH", "/usr/bin:/bin")]);
        environment
            .prepend_paths("PATH", &[PathBuf::from("/ws/a/bin"), PathBuf::from("/ws/b/bin")])
            .unwrap();
        assert_eq!(
            value(&environment, "PATH").as_deref(),
            Some("/ws/a/bin:/ws/b/bin:/usr/bin:/bin")
        );
    }

    #[test]
    fn prepend_skips_duplicates() {
        let mut environment = BuildEnvironment::from_vars([("PATH", "/ws/a/bin:/usr/bin")]);
        environment
            .prepend_paths(
                "PATH",
                &[
                    PathBuf::from("/ws/a/bin"),
                    PathBuf::from("/ws/b/bin"),
                    PathBuf::from("/ws/b/bin"),
                ],
            )
            .unwrap();
        assert_eq!(
            value(&environment, "PATH").as_deref(),
            Some("/ws/b/bin:/ws/a/bin:/usr/bin")
        );
    }

    #[test]
    fn prepend_to_unset_variable() {
        let mut environment = BuildEnvironment::default();
        environment
            .prepend_paths("PKG_CONFIG_PATH", &[PathBuf::from("/ws/a/lib/pkgconfig")])
            .unwrap();
        assert_eq!(
            value(&environment, "PKG_CONFIG_PATH").as_deref(),
            Some("/ws/a/lib/pkgconfig")
        );

        environment.prepend_paths("LD_LIBRARY_PATH", &[]).unwrap();
        assert_eq!(environment.get("LD_LIBRARY_PATH"), None);
    }

    #[test]
    fn appends_flags_with_single_space() {
        let mut environment = BuildEnvironment::from_vars([("CPPFLAGS", "-DNDEBUG")]);
        environment.append_flags(
            "CPPFLAGS",
            ["-I/ws/a/include".to_owned(), "-I/ws/b/include".to_owned()],
        );
        assert_eq!(
            value(&environment, "CPPFLAGS").as_deref(),
            Some("-DNDEBUG -I/ws/a/include -I/ws/b/include")
        );

        environment.append_flags("CPPFLAGS", ["-I/ws/a/include".to_owned()]);
        assert_eq!(
            value(&environment, "CPPFLAGS").as_deref(),
            Some("-DNDEBUG -I/ws/a/include -I/ws/b/include")
        );
    }

    #[test]
    fn flags_are_shell_quoted() {
        let mut environment = BuildEnvironment::default();
        environment.append_flags("LDFLAGS", [flag("-L", Path::new("/my ws/lib"))]);
        assert_eq!(
            value(&environment, "LDFLAGS").as_deref(),
            Some("'-L/my ws/lib'")
        );
    }

    #[test]
    fn quoted_flags_are_not_repeated() {
        let mut environment = BuildEnvironment::from_vars([("CPPFLAGS", "-DNDEBUG")]);
        let include = Path::new("/my ws/include");
        environment.append_flags("CPPFLAGS", [flag("-I", include)]);
        environment.append_flags("CPPFLAGS", [flag("-I", include)]);
        assert_eq!(
            value(&environment, "CPPFLAGS").as_deref(),
            Some("-DNDEBUG '-I/my ws/include'")
        );

        let mut environment = BuildEnvironment::from_vars([("CPPFLAGS", "\"-I/my ws/include\"")]);
        environment.append_flags("CPPFLAGS", [flag("-I", include)]);
        assert_eq!(
            value(&environment, "CPPFLAGS").as_deref(),
            Some("\"-I/my ws/include\"")
        );
    }

    #[test]
    fn unbalanced_quotes_fall_back_to_whitespace() {
        let mut environment = BuildEnvironment::from_vars([("LDFLAGS", "-L/a 'broken")]);
        environment.append_flags("LDFLAGS", ["-L/a".to_owned(), "-L/b".to_owned()]);
        assert_eq!(
            value(&environment, "LDFLAGS").as_deref(),
            Some("-L/a 'broken -L/b")
        );
    }

    #[test]
    fn adds_all_dependency_variables() {
        let paths = DependencyPaths {
            pkg_config: vec![PathBuf::from("/ws/z/install/lib/pkgconfig")],
            bin: vec![PathBuf::from("/ws/z/install/bin")],
            lib: vec![PathBuf::from("/ws/z/install/lib")],
            include: vec![PathBuf::from("/ws/z/install/include")],
        };
        let mut environment =
            BuildEnvironment::from_vars([("PATH", "/usr/bin"), ("LDFLAGS", "-s"), ("HOME", "/home/me")]);
        environment.add_dependencies(&paths).unwrap();

        assert_eq!(
            value(&environment, "PKG_CONFIG_PATH").as_deref(),
            Some("/ws/z/install/lib/pkgconfig")
        );
        assert_eq!(
            value(&environment, "PATH").as_deref(),
            Some("/ws/z/install/bin:/usr/bin")
        );
        assert_eq!(
            value(&environment, "LD_LIBRARY_PATH").as_deref(),
            Some("/ws/z/install/lib")
        );
        assert_eq!(
            value(&environment, "DYLD_LIBRARY_PATH").as_deref(),
            Some("/ws/z/install/lib")
        );
        assert_eq!(
            value(&environment, "CPPFLAGS").as_deref(),
            Some("-I/ws/z/install/include")
        );
        assert_eq!(
            value(&environment, "LDFLAGS").as_deref(),
            Some("-s -L/ws/z/install/lib")
        );
        assert_eq!(value(&environment, "HOME").as_deref(), Some("/home/me"));
    }

    #[test]
    fn display_lists_every_variable() {
        let environment = BuildEnvironment::from_vars([("B", "2"), ("A", "1")]);
        assert_eq!(environment.to_string(), "A=1\nB=2\n");
    }
}
