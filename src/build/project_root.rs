use std::{
    fs,
    path::{Path, PathBuf},
};

use log::debug;

use super::BuildError;

const SKIPPED_DIRS: &[&str] = &[".git"];

/// Finds the shallowest file called one of `file_names` below `start_dir`.
///
/// Directories are searched level by level. Within a directory the first matching name
/// wins; more than one directory with a match on the same level is ambiguous.
pub fn find_file_bfs(start_dir: &Path, file_names: &[&str]) -> Result<PathBuf, BuildError> {
    let mut dirs = vec![start_dir.to_path_buf()];

    while !dirs.is_empty() {
        let mut found = Vec::new();
        let mut next_dirs = Vec::new();

        for dir in &dirs {
            if let Some(file) = file_names
                .iter()
                .map(|name| dir.join(name))
                .find(|candidate| candidate.is_file())
            {
                found.push(file);
            }

            for entry in fs::read_dir(dir)? {
                let entry = entry?;
                let skipped = SKIPPED_DIRS.iter().any(|skipped| entry.file_name() == *skipped);
                if entry.file_type()?.is_dir() && !skipped {
                    next_dirs.push(entry.path());
                }
            }
        }

        match found.len() {
            0 => {
                next_dirs.sort();
                dirs = next_dirs;
            }
            1 => {
                let file = found.remove(0);
                debug!("Found {}", file.display());
                return Ok(file);
            }
            _ => return Err(BuildError::AmbiguousProjectRoot { candidates: found }),
        }
    }

    Err(BuildError::ProjectRootNotFound {
        file_names: file_names.iter().map(|name| name.to_string()).collect(),
        start_dir: start_dir.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn finds_file_at_root() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("CMakeLists.txt"));
        touch(&dir.path().join("sub/CMakeLists.txt"));

        let found = find_file_bfs(dir.path(), &["CMakeLists.txt"]).unwrap();
        assert_eq!(found, dir.path().join("CMakeLists.txt"));
    }

    #[test]
    fn finds_file_in_unpacked_top_directory() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("zlib-1.2.11/CMakeLists.txt"));
        touch(&dir.path().join("zlib-1.2.11/contrib/minizip/CMakeLists.txt"));

        let found = find_file_bfs(dir.path(), &["CMakeLists.txt"]).unwrap();
        assert_eq!(found, dir.path().join("zlib-1.2.11/CMakeLists.txt"));
    }

    #[test]
    fn first_name_wins_within_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("pkg/configure"));
        touch(&dir.path().join("pkg/configure.ac"));

        let found = find_file_bfs(dir.path(), &["configure", "configure.ac"]).unwrap();
        assert_eq!(found, dir.path().join("pkg/configure"));
    }

    #[test]
    fn matches_on_same_level_are_ambiguous() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a/configure"));
        touch(&dir.path().join("b/configure"));

        let error = find_file_bfs(dir.path(), &["configure"]).unwrap_err();
        match error {
            BuildError::AmbiguousProjectRoot { mut candidates } => {
                candidates.sort();
                assert_eq!(
                    candidates,
                    vec![dir.path().join("a/configure"), dir.path().join("b/configure")]
                );
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a/b/README"));

        let error = find_file_bfs(dir.path(), &["CMakeLists.txt"]).unwrap_err();
        assert!(matches!(error, BuildError::ProjectRootNotFound { .. }));
    }

    #[test]
    fn directories_named_like_the_file_do_not_match() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("configure")).unwrap();
        touch(&dir.path().join("src/configure"));

        let found = find_file_bfs(dir.path(), &["configure"]).unwrap();
        assert_eq!(found, dir.path().join("src/configure"));
    }
}
