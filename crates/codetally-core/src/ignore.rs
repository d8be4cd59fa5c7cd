//! Name-based ignore rules shared by every traversal pass.

use std::collections::HashSet;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::classify::extension;
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;

/// Compiled ignore rules. Matching is case-insensitive on entry names.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    include_hidden: bool,
    dir_names: HashSet<String>,
    dir_globs: GlobSet,
    name_globs: GlobSet,
    extensions: HashSet<String>,
    file_names: HashSet<String>,
}

impl IgnoreRules {
    /// Compile the rules in `config`.
    pub fn new(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        let mut dir_globs = GlobSetBuilder::new();
        for prefix in &config.ignored_dir_prefixes {
            dir_globs.add(compile(&format!("{}*", prefix.to_lowercase()))?);
        }

        let mut name_globs = GlobSetBuilder::new();
        for pattern in &config.ignore_globs {
            name_globs.add(compile(&pattern.to_lowercase())?);
        }

        Ok(Self {
            include_hidden: config.include_hidden,
            dir_names: lowercase_set(&config.ignored_dirs),
            dir_globs: build(dir_globs)?,
            name_globs: build(name_globs)?,
            extensions: lowercase_set(&config.ignored_extensions),
            file_names: lowercase_set(&config.ignored_file_names),
        })
    }

    /// Whether hidden entries are skipped.
    pub fn skips_hidden(&self) -> bool {
        !self.include_hidden
    }

    /// Whether a directory named `name` is pruned (not counted, not descended).
    pub fn skip_dir(&self, name: &str) -> bool {
        if self.is_hidden(name) {
            return true;
        }
        let name = name.to_lowercase();
        self.dir_names.contains(&name) || self.dir_globs.is_match(&name) || self.name_globs.is_match(&name)
    }

    /// Whether a file named `name` is skipped.
    pub fn skip_file(&self, name: &str) -> bool {
        if self.is_hidden(name) {
            return true;
        }
        let lower = name.to_lowercase();
        if self.file_names.contains(&lower) || self.name_globs.is_match(&lower) {
            return true;
        }
        extension(name).is_some_and(|ext| self.extensions.contains(&ext))
    }

    fn is_hidden(&self, name: &str) -> bool {
        !self.include_hidden && name.starts_with('.')
    }
}

fn lowercase_set(items: &[String]) -> HashSet<String> {
    items.iter().map(|s| s.to_lowercase()).collect()
}

fn compile(pattern: &str) -> Result<Glob, AnalysisError> {
    Glob::new(pattern).map_err(|e| AnalysisError::InvalidConfig {
        message: format!("bad ignore pattern '{pattern}': {e}"),
    })
}

fn build(builder: GlobSetBuilder) -> Result<GlobSet, AnalysisError> {
    builder.build().map_err(|e| AnalysisError::InvalidConfig {
        message: e.to_string(),
    })
}
