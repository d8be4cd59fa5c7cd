//! Analysis data model: nodes, totals, progress and the final result.

use std::path::PathBuf;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Classification of a filesystem entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Category {
    Directory,
    Code,
    Document,
    Other,
}

impl Category {
    /// Whether files of this category contribute lines.
    pub fn counts_lines(self) -> bool {
        matches!(self, Self::Code | Self::Document)
    }
}

/// A filesystem entry met during a traversal step.
///
/// Built per step and dropped once its event is out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryNode {
    /// Absolute path.
    pub path: PathBuf,
    /// Display name.
    pub name: CompactString,
    /// Whether this is a directory.
    pub is_directory: bool,
    /// Size in bytes (files only).
    pub size: Option<u64>,
    /// Category of the entry.
    pub category: Category,
}

impl DirectoryNode {
    /// Create a directory node.
    pub fn directory(path: PathBuf, name: impl Into<CompactString>) -> Self {
        Self {
            path,
            name: name.into(),
            is_directory: true,
            size: None,
            category: Category::Directory,
        }
    }

    /// Create a file node.
    pub fn file(path: PathBuf, name: impl Into<CompactString>, size: u64, category: Category) -> Self {
        Self {
            path,
            name: name.into(),
            is_directory: false,
            size: Some(size),
            category,
        }
    }
}

/// Line and method counts for one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetrics {
    /// Number of lines.
    pub lines: u64,
    /// Number of lines matching a method heuristic.
    pub methods: u64,
}

impl FileMetrics {
    /// Create new metrics.
    pub fn new(lines: u64, methods: u64) -> Self {
        Self { lines, methods }
    }
}

/// Aggregate counters computed by the pre-pass.
///
/// `total_files = total_code_files + total_doc_files + total_other_files` and
/// `total_lines = total_code_lines + total_doc_lines` always hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisTotals {
    pub total_folders: u64,
    pub total_files: u64,
    pub total_code_files: u64,
    pub total_doc_files: u64,
    pub total_other_files: u64,
    pub total_code_lines: u64,
    pub total_doc_lines: u64,
    pub total_lines: u64,
    pub total_methods: u64,
}

impl AnalysisTotals {
    /// Create empty totals.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a (non-root) directory.
    pub fn record_dir(&mut self) {
        self.total_folders += 1;
    }

    /// Record a file and its metrics.
    ///
    /// Lines and methods from `other` files are ignored; methods only count
    /// for code files.
    pub fn record_file(&mut self, category: Category, metrics: FileMetrics) {
        self.total_files += 1;
        match category {
            Category::Code => {
                self.total_code_files += 1;
                self.total_code_lines += metrics.lines;
                self.total_lines += metrics.lines;
                self.total_methods += metrics.methods;
            }
            Category::Document => {
                self.total_doc_files += 1;
                self.total_doc_lines += metrics.lines;
                self.total_lines += metrics.lines;
            }
            Category::Other | Category::Directory => {
                self.total_other_files += 1;
            }
        }
    }

    /// Merge counters from another partial sum.
    pub fn merge(mut self, other: Self) -> Self {
        self.total_folders += other.total_folders;
        self.total_files += other.total_files;
        self.total_code_files += other.total_code_files;
        self.total_doc_files += other.total_doc_files;
        self.total_other_files += other.total_other_files;
        self.total_code_lines += other.total_code_lines;
        self.total_doc_lines += other.total_doc_lines;
        self.total_lines += other.total_lines;
        self.total_methods += other.total_methods;
        self
    }

    /// Check the file and line sum invariants.
    pub fn is_consistent(&self) -> bool {
        self.total_files == self.total_code_files + self.total_doc_files + self.total_other_files
            && self.total_lines == self.total_code_lines + self.total_doc_lines
    }
}

/// Running counters for the full pass.
///
/// Never decreases, and every field stays at or below the matching
/// [`AnalysisTotals`] field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisProgress {
    pub processed_folders: u64,
    pub processed_files: u64,
    pub processed_code_files: u64,
    pub processed_doc_files: u64,
    pub processed_other_files: u64,
    pub processed_code_lines: u64,
    pub processed_doc_lines: u64,
    pub processed_lines: u64,
    pub processed_methods: u64,
}

/// Outcome of recording one entry into [`AnalysisProgress`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordOutcome {
    /// Some counter would have passed its total and was held at the total.
    pub clamped: bool,
}

fn bump(counter: &mut u64, by: u64, limit: u64, clamped: &mut bool) {
    let next = counter.saturating_add(by);
    if next > limit {
        *clamped = true;
        *counter = limit.max(*counter);
    } else {
        *counter = next;
    }
}

impl AnalysisProgress {
    /// Create zeroed progress.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished directory, bounded by `totals`.
    pub fn record_dir(&mut self, totals: &AnalysisTotals) -> RecordOutcome {
        let mut clamped = false;
        bump(&mut self.processed_folders, 1, totals.total_folders, &mut clamped);
        RecordOutcome { clamped }
    }

    /// Record a processed file, bounded by `totals`.
    pub fn record_file(
        &mut self,
        category: Category,
        metrics: FileMetrics,
        totals: &AnalysisTotals,
    ) -> RecordOutcome {
        let mut clamped = false;
        bump(&mut self.processed_files, 1, totals.total_files, &mut clamped);
        match category {
            Category::Code => {
                bump(&mut self.processed_code_files, 1, totals.total_code_files, &mut clamped);
                bump(&mut self.processed_code_lines, metrics.lines, totals.total_code_lines, &mut clamped);
                bump(&mut self.processed_methods, metrics.methods, totals.total_methods, &mut clamped);
            }
            Category::Document => {
                bump(&mut self.processed_doc_files, 1, totals.total_doc_files, &mut clamped);
                bump(&mut self.processed_doc_lines, metrics.lines, totals.total_doc_lines, &mut clamped);
            }
            Category::Other | Category::Directory => {
                bump(&mut self.processed_other_files, 1, totals.total_other_files, &mut clamped);
            }
        }
        self.processed_lines = self.processed_code_lines + self.processed_doc_lines;
        RecordOutcome { clamped }
    }

    /// Whether every counter is within `totals`.
    pub fn within(&self, totals: &AnalysisTotals) -> bool {
        self.processed_folders <= totals.total_folders
            && self.processed_files <= totals.total_files
            && self.processed_code_files <= totals.total_code_files
            && self.processed_doc_files <= totals.total_doc_files
            && self.processed_other_files <= totals.total_other_files
            && self.processed_code_lines <= totals.total_code_lines
            && self.processed_doc_lines <= totals.total_doc_lines
            && self.processed_lines <= totals.total_lines
            && self.processed_methods <= totals.total_methods
    }

    /// The counters as a totals-shaped snapshot.
    pub fn as_totals(&self) -> AnalysisTotals {
        AnalysisTotals {
            total_folders: self.processed_folders,
            total_files: self.processed_files,
            total_code_files: self.processed_code_files,
            total_doc_files: self.processed_doc_files,
            total_other_files: self.processed_other_files,
            total_code_lines: self.processed_code_lines,
            total_doc_lines: self.processed_doc_lines,
            total_lines: self.processed_lines,
            total_methods: self.processed_methods,
        }
    }
}

/// Final snapshot of a completed analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Analyzed root path.
    pub path: PathBuf,
    /// Aggregate counters.
    #[serde(flatten)]
    pub totals: AnalysisTotals,
    /// Entries skipped because they could not be read.
    #[serde(default)]
    pub skipped_entries: u64,
}

impl AnalysisResult {
    /// Create a result for `path`.
    pub fn new(path: impl Into<PathBuf>, totals: AnalysisTotals, skipped_entries: u64) -> Self {
        Self {
            path: path.into(),
            totals,
            skipped_entries,
        }
    }
}

/// Paths met during the full pass, capped per list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileListing {
    pub folders: Vec<PathBuf>,
    pub files: Vec<PathBuf>,
    pub code_files: Vec<PathBuf>,
    pub document_files: Vec<PathBuf>,
    pub other_files: Vec<PathBuf>,
    /// Maximum entries kept per list.
    pub cap: usize,
    /// Whether any list hit the cap.
    pub truncated: bool,
}

impl FileListing {
    /// Create a listing keeping at most `cap` paths per list.
    pub fn with_cap(cap: usize) -> Self {
        Self {
            cap,
            ..Self::default()
        }
    }

    /// Record a directory path.
    pub fn push_folder(&mut self, path: PathBuf) {
        let cap = self.cap;
        self.truncated |= !push_capped(&mut self.folders, path, cap);
    }

    /// Record a file path under its category.
    pub fn push_file(&mut self, path: PathBuf, category: Category) {
        let cap = self.cap;
        let list = match category {
            Category::Code => &mut self.code_files,
            Category::Document => &mut self.document_files,
            Category::Other | Category::Directory => &mut self.other_files,
        };
        let mut kept = push_capped(list, path.clone(), cap);
        kept &= push_capped(&mut self.files, path, cap);
        self.truncated |= !kept;
    }
}

fn push_capped(list: &mut Vec<PathBuf>, path: PathBuf, cap: usize) -> bool {
    if list.len() < cap {
        list.push(path);
        true
    } else {
        false
    }
}
