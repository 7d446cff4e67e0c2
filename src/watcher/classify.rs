use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use super::event::{ChangeEvent, ChangeOp};
use crate::config::WatchConfig;

/// Directories never worth re-testing, regardless of .gitignore.
const ALWAYS_EXCLUDED: &[&str] = &["node_modules", "vendor", "testdata"];

/// Decides which paths are source files and which folder owns a change.
///
/// Shared by the initial folder discovery and the live watch so both agree on
/// what counts as a source folder.
#[derive(Debug)]
pub struct SourceFilter {
    root: PathBuf,
    extensions: Vec<String>,
    exclude: Vec<glob::Pattern>,
    gitignore: Gitignore,
}

/// Build a Gitignore matcher from the root's .gitignore file.
/// If no .gitignore exists, returns an empty matcher that matches nothing.
fn build_gitignore_matcher(root: &Path) -> Gitignore {
    let mut builder = GitignoreBuilder::new(root);
    let gitignore_path = root.join(".gitignore");
    if gitignore_path.exists() {
        let _ = builder.add(&gitignore_path);
    }
    builder.build().unwrap_or_else(|_| Gitignore::empty())
}

impl SourceFilter {
    pub fn new(root: &Path, config: &WatchConfig) -> Self {
        let exclude = config
            .exclude
            .iter()
            .filter_map(|pattern| glob::Pattern::new(pattern).ok())
            .collect();
        Self {
            root: root.to_path_buf(),
            extensions: config.extensions.clone(),
            exclude,
            gitignore: build_gitignore_matcher(root),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True when the path's extension is one of the configured source extensions.
    pub fn is_source_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e == ext))
    }

    /// True when the path sits somewhere we never test: hidden directories,
    /// node_modules, config `exclude` patterns, or .gitignore'd paths.
    ///
    /// Only components below the root are checked, so a root that itself lives
    /// under a hidden directory still works.
    pub fn is_excluded(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);

        for component in relative.components() {
            let Some(name) = component.as_os_str().to_str() else {
                continue;
            };
            if name.starts_with('.') && name != "." && name != ".." {
                return true;
            }
            if ALWAYS_EXCLUDED.contains(&name) {
                return true;
            }
            if self.exclude.iter().any(|p| p.matches(name)) {
                return true;
            }
        }

        let relative_str = relative.to_string_lossy();
        if self.exclude.iter().any(|p| p.matches(&relative_str)) {
            return true;
        }

        path.starts_with(&self.root)
            && self
                .gitignore
                .matched_path_or_any_parents(path, path.is_dir())
                .is_ignore()
    }

    /// Resolve the folder a change belongs to, or `None` if the change should
    /// never trigger a test run.
    ///
    /// Moves and renames are resolved to their destination. Relative paths are
    /// made absolute against the working directory.
    pub fn owning_folder(&self, event: &ChangeEvent) -> Option<PathBuf> {
        if event.op == ChangeOp::Remove {
            return None;
        }

        let target = event.target_path();
        if !self.is_source_file(&target) {
            return None;
        }

        let target = std::path::absolute(&target).ok()?;
        if target.is_dir() || self.is_excluded(&target) {
            return None;
        }

        target.parent().map(Path::to_path_buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn filter_for(root: &Path) -> SourceFilter {
        SourceFilter::new(root, &WatchConfig::default())
    }

    #[test]
    fn test_source_file_resolves_to_parent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let filter = filter_for(dir.path());
        let file = dir.path().join("pkg").join("main.go");

        let event = ChangeEvent::new(&file, ChangeOp::Write);
        assert_eq!(filter.owning_folder(&event), Some(dir.path().join("pkg")));
    }

    #[test]
    fn test_non_source_extension_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let filter = filter_for(dir.path());

        for name in ["README.md", "go.mod", "Makefile", "main.go.swp"] {
            let event = ChangeEvent::new(dir.path().join(name), ChangeOp::Write);
            assert_eq!(filter.owning_folder(&event), None, "{name} should be ignored");
        }
    }

    #[test]
    fn test_directory_events_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let odd = dir.path().join("weird.go");
        fs::create_dir_all(&odd).unwrap();
        let filter = filter_for(dir.path());

        let event = ChangeEvent::new(&odd, ChangeOp::Create);
        assert_eq!(filter.owning_folder(&event), None);

        let event = ChangeEvent::new(dir.path().join("pkg"), ChangeOp::Create);
        assert_eq!(filter.owning_folder(&event), None);
    }

    #[test]
    fn test_rename_resolves_to_new_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let filter = filter_for(dir.path());
        let from = dir.path().join("a").join("old.go");
        let to = dir.path().join("b").join("new.go");

        let event = ChangeEvent::moved(&from, &to, ChangeOp::Rename);
        assert_eq!(filter.owning_folder(&event), Some(dir.path().join("b")));

        let into_text = ChangeEvent::moved(&from, &dir.path().join("b").join("notes.txt"), ChangeOp::Move);
        assert_eq!(filter.owning_folder(&into_text), None);
    }

    #[test]
    fn test_remove_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let filter = filter_for(dir.path());
        let event = ChangeEvent::new(dir.path().join("main.go"), ChangeOp::Remove);
        assert_eq!(filter.owning_folder(&event), None);
    }

    #[test]
    fn test_hidden_and_node_modules_are_excluded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let filter = filter_for(dir.path());

        assert!(filter.is_excluded(&dir.path().join(".git").join("x.go")));
        assert!(filter.is_excluded(&dir.path().join("node_modules").join("x.go")));
        assert!(!filter.is_excluded(&dir.path().join("pkg").join("x.go")));
    }

    #[test]
    fn test_config_exclude_patterns() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = WatchConfig {
            exclude: vec!["generated*".to_string()],
            ..WatchConfig::default()
        };
        let filter = SourceFilter::new(dir.path(), &config);

        assert!(filter.is_excluded(&dir.path().join("generated_api").join("x.go")));
        assert!(!filter.is_excluded(&dir.path().join("api").join("x.go")));
    }

    #[test]
    fn test_gitignored_paths_are_excluded() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(".gitignore"), "build/\n").unwrap();
        fs::create_dir_all(dir.path().join("build")).unwrap();
        let filter = filter_for(dir.path());

        assert!(filter.is_excluded(&dir.path().join("build").join("x.go")));
        assert!(!filter.is_excluded(&dir.path().join("src").join("x.go")));
    }
}
