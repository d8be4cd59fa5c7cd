//! File classification by name.

use std::collections::HashMap;

use crate::config::ClassificationConfig;
use crate::model::Category;

/// Category and language index for one extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileClass {
    /// Category of the file.
    pub category: Category,
    /// Index into [`ClassificationConfig::languages`] for code files with a profile.
    pub language: Option<usize>,
}

impl FileClass {
    const OTHER: Self = Self {
        category: Category::Other,
        language: None,
    };
}

/// Maps file names to categories. Pure and I/O free.
#[derive(Debug, Clone)]
pub struct Classifier {
    by_extension: HashMap<String, FileClass>,
    language_tags: Vec<String>,
}

impl Classifier {
    /// Build a classifier from extension tables.
    ///
    /// Document extensions win over code extensions listed in both tables;
    /// a profile's extensions are code even when absent from `code_extensions`.
    pub fn new(config: &ClassificationConfig) -> Self {
        let mut by_extension = HashMap::new();

        for ext in &config.code_extensions {
            by_extension.insert(
                ext.to_lowercase(),
                FileClass {
                    category: Category::Code,
                    language: None,
                },
            );
        }
        for (index, profile) in config.languages.iter().enumerate() {
            for ext in &profile.extensions {
                by_extension
                    .entry(ext.to_lowercase())
                    .and_modify(|class: &mut FileClass| {
                        if class.language.is_none() {
                            class.language = Some(index);
                        }
                    })
                    .or_insert(FileClass {
                        category: Category::Code,
                        language: Some(index),
                    });
            }
        }
        for ext in &config.document_extensions {
            by_extension.insert(
                ext.to_lowercase(),
                FileClass {
                    category: Category::Document,
                    language: None,
                },
            );
        }

        Self {
            by_extension,
            language_tags: config.languages.iter().map(|l| l.tag.clone()).collect(),
        }
    }

    /// Classify a file name. Unknown or missing extensions are `Other`.
    pub fn classify(&self, name: &str) -> FileClass {
        extension(name)
            .and_then(|ext| self.by_extension.get(&ext).copied())
            .unwrap_or(FileClass::OTHER)
    }

    /// Classify an entry, checking the directory flag before the extension.
    pub fn classify_entry(&self, name: &str, is_directory: bool) -> FileClass {
        if is_directory {
            FileClass {
                category: Category::Directory,
                language: None,
            }
        } else {
            self.classify(name)
        }
    }

    /// Tag of the language profile at `index`.
    pub fn language_tag(&self, index: usize) -> Option<&str> {
        self.language_tags.get(index).map(String::as_str)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&ClassificationConfig::default())
    }
}

/// Lowercased extension of `name`.
///
/// A leading dot does not start an extension (`.gitignore` has none) and a
/// trailing dot yields none.
pub fn extension(name: &str) -> Option<String> {
    let dot = name.rfind('.')?;
    if dot == 0 || dot == name.len() - 1 {
        return None;
    }
    Some(name[dot + 1..].to_lowercase())
}
