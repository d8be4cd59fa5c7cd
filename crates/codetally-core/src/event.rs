//! Typed progress events and their wire encodings.
//!
//! Events are append-only within a session. Every numeric event carries
//! absolute `processed` and `total` counts, so a consumer that missed earlier
//! events can resynchronize from the latest one alone.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::model::{AnalysisProgress, AnalysisResult, AnalysisTotals, Category};

/// Integer percentage, or `None` when the denominator is unknown or zero.
pub fn percent(processed: u64, total: Option<u64>) -> Option<u64> {
    match total {
        Some(total) if total > 0 => Some(processed.saturating_mul(100) / total),
        _ => None,
    }
}

/// `{processedFolders, totalFolders}` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderProgress {
    pub processed_folders: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_folders: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<u64>,
}

/// Per-file statistics for a processed code or document file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStats {
    #[serde(rename = "type")]
    pub category: Category,
    pub path: String,
    pub processed_code_files: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_code_files: Option<u64>,
    pub processed_doc_files: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_doc_files: Option<u64>,
    pub processed_code_lines: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_code_lines: Option<u64>,
    pub processed_doc_lines: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_doc_lines: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_percent: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_percent: Option<u64>,
}

/// `{processedMethods, totalMethods}` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodProgress {
    pub processed_methods: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_methods: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<u64>,
}

/// Compact overall heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallProgress {
    pub processed_folders: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_folders: Option<u64>,
    pub processed_files: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_files: Option<u64>,
    pub processed_lines: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_lines: Option<u64>,
    pub processed_methods: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_methods: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_percent: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines_percent: Option<u64>,
}

/// Where a result was persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedResults {
    pub results_path: String,
    pub saved_files: Vec<String>,
}

/// One event of an analysis stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ProgressEvent {
    /// Session began.
    #[serde(rename = "start")]
    Start { message: String },
    /// Pre-pass finished; denominators are known from here on.
    #[serde(rename = "totals")]
    Totals(AnalysisTotals),
    /// Directories entered, in walk order. Usually one; more when coalesced.
    #[serde(rename = "directory")]
    Directory { paths: Vec<String> },
    /// Files processed, in walk order. Usually one; more when coalesced.
    #[serde(rename = "file")]
    File { paths: Vec<String> },
    #[serde(rename = "folderProgress")]
    FolderProgress(FolderProgress),
    #[serde(rename = "file-stats")]
    FileStats(FileStats),
    #[serde(rename = "methodProgress")]
    MethodProgress(MethodProgress),
    #[serde(rename = "progress")]
    Progress(OverallProgress),
    /// Final aggregate.
    #[serde(rename = "result")]
    Result(AnalysisResult),
    /// Result persisted.
    #[serde(rename = "saved")]
    Saved(SavedResults),
    /// Analysis succeeded but the result was not saved.
    #[serde(rename = "save-failed")]
    SaveFailed { message: String },
    /// Terminal event of a successful session. Sent exactly once.
    #[serde(rename = "done")]
    Done,
    /// Fatal session error. Terminates the stream.
    #[serde(rename = "error")]
    Error { message: String },
}

/// Kind of coalescable event, used by the rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Directory,
    File,
    FolderProgress,
    FileStats,
    MethodProgress,
    Progress,
}

impl ProgressEvent {
    /// Build a `folderProgress` event.
    pub fn folder_progress(progress: &AnalysisProgress, totals: Option<&AnalysisTotals>) -> Self {
        let total = totals.map(|t| t.total_folders);
        Self::FolderProgress(FolderProgress {
            processed_folders: progress.processed_folders,
            total_folders: total,
            percent: percent(progress.processed_folders, total),
        })
    }

    /// Build a `file-stats` event for a processed file.
    pub fn file_stats(
        category: Category,
        path: impl Into<String>,
        progress: &AnalysisProgress,
        totals: Option<&AnalysisTotals>,
    ) -> Self {
        let total_code_lines = totals.map(|t| t.total_code_lines);
        let total_doc_lines = totals.map(|t| t.total_doc_lines);
        Self::FileStats(FileStats {
            category,
            path: path.into(),
            processed_code_files: progress.processed_code_files,
            total_code_files: totals.map(|t| t.total_code_files),
            processed_doc_files: progress.processed_doc_files,
            total_doc_files: totals.map(|t| t.total_doc_files),
            processed_code_lines: progress.processed_code_lines,
            total_code_lines,
            processed_doc_lines: progress.processed_doc_lines,
            total_doc_lines,
            code_percent: percent(progress.processed_code_lines, total_code_lines),
            doc_percent: percent(progress.processed_doc_lines, total_doc_lines),
        })
    }

    /// Build a `methodProgress` event.
    pub fn method_progress(progress: &AnalysisProgress, totals: Option<&AnalysisTotals>) -> Self {
        let total = totals.map(|t| t.total_methods);
        Self::MethodProgress(MethodProgress {
            processed_methods: progress.processed_methods,
            total_methods: total,
            percent: percent(progress.processed_methods, total),
        })
    }

    /// Build a `progress` heartbeat.
    pub fn overall(progress: &AnalysisProgress, totals: Option<&AnalysisTotals>) -> Self {
        let total_files = totals.map(|t| t.total_files);
        let total_lines = totals.map(|t| t.total_lines);
        Self::Progress(OverallProgress {
            processed_folders: progress.processed_folders,
            total_folders: totals.map(|t| t.total_folders),
            processed_files: progress.processed_files,
            total_files,
            processed_lines: progress.processed_lines,
            total_lines,
            processed_methods: progress.processed_methods,
            total_methods: totals.map(|t| t.total_methods),
            files_percent: percent(progress.processed_files, total_files),
            lines_percent: percent(progress.processed_lines, total_lines),
        })
    }

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Totals(_) => "totals",
            Self::Directory { .. } => "directory",
            Self::File { .. } => "file",
            Self::FolderProgress(_) => "folderProgress",
            Self::FileStats(_) => "file-stats",
            Self::MethodProgress(_) => "methodProgress",
            Self::Progress(_) => "progress",
            Self::Result(_) => "result",
            Self::Saved(_) => "saved",
            Self::SaveFailed { .. } => "save-failed",
            Self::Done => "done",
            Self::Error { .. } => "error",
        }
    }

    /// Rate-limited kind, or `None` for events that always pass straight through.
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            Self::Directory { .. } => Some(EventKind::Directory),
            Self::File { .. } => Some(EventKind::File),
            Self::FolderProgress(_) => Some(EventKind::FolderProgress),
            Self::FileStats(_) => Some(EventKind::FileStats),
            Self::MethodProgress(_) => Some(EventKind::MethodProgress),
            Self::Progress(_) => Some(EventKind::Progress),
            _ => None,
        }
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }

    /// Payload lines for the `data:` fields of a server-sent event.
    ///
    /// No line contains CR or LF; `directory` and `file` paths go out as one
    /// JSON array.
    pub fn data_lines(&self) -> Result<Vec<String>, serde_json::Error> {
        let lines = match self {
            Self::Start { message } | Self::SaveFailed { message } | Self::Error { message } => {
                message.split(['\r', '\n']).filter(|l| !l.is_empty()).map(str::to_string).collect()
            }
            Self::Directory { paths } | Self::File { paths } => vec![serde_json::to_string(paths)?],
            // Browsers drop events with an empty data buffer.
            Self::Done => vec!["complete".to_string()],
            Self::Totals(totals) => vec![serde_json::to_string(totals)?],
            Self::FolderProgress(p) => vec![serde_json::to_string(p)?],
            Self::FileStats(p) => vec![serde_json::to_string(p)?],
            Self::MethodProgress(p) => vec![serde_json::to_string(p)?],
            Self::Progress(p) => vec![serde_json::to_string(p)?],
            Self::Result(r) => vec![serde_json::to_string(r)?],
            Self::Saved(s) => vec![serde_json::to_string(s)?],
        };
        Ok(lines)
    }

    /// Encode as a `text/event-stream` frame.
    pub fn to_sse(&self) -> Result<String, serde_json::Error> {
        let mut frame = String::new();
        let _ = writeln!(frame, "event: {}", self.name());
        let lines = self.data_lines()?;
        if lines.is_empty() {
            frame.push_str("data:\n");
        }
        for line in lines {
            let _ = writeln!(frame, "data: {line}");
        }
        frame.push('\n');
        Ok(frame)
    }

    /// Encode as one line of newline-delimited JSON.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}
