use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::watcher::classify::SourceFilter;

/// Walk the watched root and collect every folder that directly contains at
/// least one source file.
///
/// Respects `.gitignore` rules, skips hidden directories and `node_modules`,
/// and applies the config `exclude` patterns via [`SourceFilter`]. Folders are
/// returned sorted so the initial baseline runs start in a stable order.
pub fn discover_source_folders(filter: &SourceFilter) -> anyhow::Result<Vec<PathBuf>> {
    let root = filter.root();
    if !root.is_dir() {
        anyhow::bail!("{} is not a directory", root.display());
    }

    let mut folders = BTreeSet::new();
    collect_folders(root, filter, &mut folders);

    debug!(count = folders.len(), "discovered source folders");
    Ok(folders.into_iter().collect())
}

/// Collect source folders from a single directory tree using the `ignore` crate.
fn collect_folders(root: &Path, filter: &SourceFilter, out: &mut BTreeSet<PathBuf>) {
    let walker = ignore::WalkBuilder::new(root)
        .standard_filters(true)
        // Read .gitignore files even when the directory is not inside a git repository.
        .require_git(false)
        .build();

    for result in walker {
        let entry = match result {
            Ok(e) => e,
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry");
                continue;
            }
        };

        let path = entry.path();

        // Skip directories; a folder counts once one of its files matches.
        if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
            continue;
        }

        if !filter.is_source_file(path) || filter.is_excluded(path) {
            continue;
        }

        if let Some(parent) = path.parent() {
            out.insert(parent.to_path_buf());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WatchConfig;
    use std::fs;
    use tempfile::TempDir;

    fn tmp() -> TempDir {
        tempfile::tempdir().expect("tempdir")
    }

    fn discover(dir: &TempDir, config: &WatchConfig) -> Vec<PathBuf> {
        let filter = SourceFilter::new(dir.path(), config);
        discover_source_folders(&filter).unwrap()
    }

    #[test]
    fn test_finds_folders_with_source_files() {
        let dir = tmp();
        fs::write(dir.path().join("main.go"), "package main").unwrap();
        fs::create_dir_all(dir.path().join("pkg").join("util")).unwrap();
        fs::write(dir.path().join("pkg").join("util").join("util.go"), "package util").unwrap();
        fs::create_dir_all(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs").join("README.md"), "# Hello").unwrap();

        let folders = discover(&dir, &WatchConfig::default());

        assert_eq!(
            folders,
            vec![
                dir.path().to_path_buf(),
                dir.path().join("pkg").join("util"),
            ]
        );
    }

    #[test]
    fn test_folder_with_many_files_is_listed_once() {
        let dir = tmp();
        for name in ["a.go", "b.go", "c_test.go"] {
            fs::write(dir.path().join(name), "package x").unwrap();
        }

        assert_eq!(discover(&dir, &WatchConfig::default()).len(), 1);
    }

    #[test]
    fn test_excludes_node_modules_and_hidden_dirs() {
        let dir = tmp();
        let nm = dir.path().join("node_modules").join("pkg");
        fs::create_dir_all(&nm).unwrap();
        fs::write(nm.join("x.go"), "package x").unwrap();
        let hidden = dir.path().join(".cache");
        fs::create_dir_all(&hidden).unwrap();
        fs::write(hidden.join("y.go"), "package y").unwrap();

        assert!(discover(&dir, &WatchConfig::default()).is_empty());
    }

    #[test]
    fn test_respects_exclude_patterns() {
        let dir = tmp();
        let generated = dir.path().join("generated");
        fs::create_dir_all(&generated).unwrap();
        fs::write(generated.join("api.go"), "package generated").unwrap();
        fs::write(dir.path().join("main.go"), "package main").unwrap();

        let config = WatchConfig {
            exclude: vec!["generated".to_string()],
            ..WatchConfig::default()
        };

        assert_eq!(discover(&dir, &config), vec![dir.path().to_path_buf()]);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = tmp();
        let filter = SourceFilter::new(&dir.path().join("gone"), &WatchConfig::default());
        assert!(discover_source_folders(&filter).is_err());
    }
}
