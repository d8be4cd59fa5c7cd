//! Deterministic directory walk shared by both analysis passes.

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use jwalk::{Parallelism, WalkDir};

use codetally_core::{
    AnalysisConfig, AnalysisError, Classifier, DirectoryNode, FileClass, IgnoreRules, SkipWarning,
    WarningKind,
};

/// One step of a walk, in walk order.
#[derive(Debug, Clone)]
pub enum WalkStep {
    /// A directory below the root was entered.
    DirectoryEntered(DirectoryNode),
    /// Every child of this directory has been visited.
    DirectoryCompleted(PathBuf),
    /// A regular file.
    File { node: DirectoryNode, class: FileClass },
    /// An entry that could not be read.
    Skipped(SkipWarning),
}

/// Walks a tree applying ignore rules and the classifier.
///
/// Children are visited sorted by name, so two walks over an unchanged tree
/// yield identical step sequences. Symlinks are never followed and never
/// yielded. The root itself is not yielded.
#[derive(Debug, Clone)]
pub struct Walker {
    rules: Arc<IgnoreRules>,
    classifier: Classifier,
}

impl Walker {
    /// Create a walker from compiled rules.
    pub fn new(rules: IgnoreRules, classifier: Classifier) -> Self {
        Self {
            rules: Arc::new(rules),
            classifier,
        }
    }

    /// Create a walker from a session config.
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        Ok(Self::new(
            IgnoreRules::new(config)?,
            Classifier::new(&config.classification),
        ))
    }

    /// The classifier applied to file names.
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Walk `root`, feeding each step to `visit` until it breaks.
    pub fn walk<F>(&self, root: &Path, mut visit: F) -> ControlFlow<()>
    where
        F: FnMut(WalkStep) -> ControlFlow<()>,
    {
        let rules = Arc::clone(&self.rules);
        let walker = WalkDir::new(root)
            .sort(true)
            .skip_hidden(false)
            .follow_links(false)
            .parallelism(Parallelism::RayonDefaultPool {
                busy_timeout: Duration::from_millis(100),
            })
            .process_read_dir(move |_depth, _path, _state, children| {
                children.retain(|entry| match entry {
                    Ok(e) => {
                        let name = e.file_name().to_string_lossy();
                        let file_type = e.file_type();
                        if file_type.is_dir() {
                            !rules.skip_dir(&name)
                        } else if file_type.is_file() {
                            !rules.skip_file(&name)
                        } else {
                            // symlinks, sockets, devices
                            false
                        }
                    }
                    Err(_) => true,
                });
            });

        // Directories whose subtree is still being yielded, innermost last.
        let mut open: Vec<(usize, PathBuf)> = Vec::new();

        for entry_result in walker {
            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    let kind = err
                        .io_error()
                        .map(|io| SkipWarning::from_io(&path, io).kind)
                        .unwrap_or(WarningKind::ReadError);
                    visit(WalkStep::Skipped(SkipWarning::new(path, err.to_string(), kind)))?;
                    continue;
                }
            };

            let depth = entry.depth();
            if depth == 0 {
                continue;
            }

            while open.last().is_some_and(|(d, _)| *d >= depth) {
                if let Some((_, finished)) = open.pop() {
                    visit(WalkStep::DirectoryCompleted(finished))?;
                }
            }

            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            let file_type = entry.file_type();

            if file_type.is_dir() {
                open.push((depth, path.clone()));
                visit(WalkStep::DirectoryEntered(DirectoryNode::directory(path, name)))?;
            } else if file_type.is_file() {
                let class = self.classifier.classify(&name);
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                let node = DirectoryNode::file(path, name, size, class.category);
                visit(WalkStep::File { node, class })?;
            }
        }

        while let Some((_, finished)) = open.pop() {
            visit(WalkStep::DirectoryCompleted(finished))?;
        }

        ControlFlow::Continue(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codetally_core::Category;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::create_dir_all(root.join("b/inner")).unwrap();
        fs::create_dir(root.join("a")).unwrap();
        fs::create_dir(root.join("node_modules")).unwrap();

        fs::write(root.join("a/one.py"), "def x():\n").unwrap();
        fs::write(root.join("b/inner/two.md"), "doc\n").unwrap();
        fs::write(root.join("b/three.bin"), [0u8, 1, 2]).unwrap();
        fs::write(root.join("node_modules/dep.js"), "function f() {}\n").unwrap();
        fs::write(root.join("debug.log"), "noise\n").unwrap();
        fs::write(root.join(".hidden.py"), "def h():\n").unwrap();

        temp
    }

    fn collect(root: &Path) -> Vec<String> {
        let walker = Walker::from_config(&AnalysisConfig::new(root)).unwrap();
        let mut steps = Vec::new();
        let _ = walker.walk(root, |step| {
            let label = match step {
                WalkStep::DirectoryEntered(node) => format!("enter {}", rel(root, &node.path)),
                WalkStep::DirectoryCompleted(path) => format!("leave {}", rel(root, &path)),
                WalkStep::File { node, .. } => format!("file {}", rel(root, &node.path)),
                WalkStep::Skipped(w) => format!("skip {}", w.path.display()),
            };
            steps.push(label);
            ControlFlow::Continue(())
        });
        steps
    }

    fn rel(root: &Path, path: &Path) -> String {
        path.strip_prefix(root)
            .unwrap()
            .to_string_lossy()
            .replace('\\', "/")
    }

    #[test]
    fn test_walk_order_and_filters() {
        let temp = create_test_tree();
        let steps = collect(temp.path());

        assert_eq!(
            steps,
            vec![
                "enter a",
                "file a/one.py",
                "leave a",
                "enter b",
                "enter b/inner",
                "file b/inner/two.md",
                "leave b/inner",
                "file b/three.bin",
                "leave b",
            ]
        );
    }

    #[test]
    fn test_walk_is_repeatable() {
        let temp = create_test_tree();
        assert_eq!(collect(temp.path()), collect(temp.path()));
    }

    #[test]
    fn test_walk_classifies_files() {
        let temp = create_test_tree();
        let walker = Walker::from_config(&AnalysisConfig::new(temp.path())).unwrap();
        let mut categories = Vec::new();
        let _ = walker.walk(temp.path(), |step| {
            if let WalkStep::File { node, class } = step {
                assert_eq!(node.category, class.category);
                categories.push(class.category);
            }
            ControlFlow::Continue(())
        });
        assert_eq!(
            categories,
            vec![Category::Code, Category::Document, Category::Other]
        );
    }

    #[test]
    fn test_walk_stops_on_break() {
        let temp = create_test_tree();
        let walker = Walker::from_config(&AnalysisConfig::new(temp.path())).unwrap();
        let mut seen = 0;
        let flow = walker.walk(temp.path(), |_| {
            seen += 1;
            if seen == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert!(flow.is_break());
        assert_eq!(seen, 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_not_followed() {
        let temp = create_test_tree();
        std::os::unix::fs::symlink(temp.path(), temp.path().join("a/loop")).unwrap();
        std::os::unix::fs::symlink(temp.path().join("a/one.py"), temp.path().join("link.py"))
            .unwrap();

        let steps = collect(temp.path());
        assert!(!steps.iter().any(|s| s.contains("loop") || s.contains("link.py")));
    }
}
