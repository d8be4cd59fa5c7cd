//! Core types and traits for codetally.
//!
//! This crate provides the data structures shared by the analysis engine and
//! its consumers: the aggregate counters, the classifier and ignore rules,
//! configuration, the progress event protocol and the result sink seam.

mod classify;
mod config;
mod error;
mod event;
mod ignore;
mod model;
mod sink;

pub use classify::{Classifier, FileClass, extension};
pub use config::{
    AnalysisConfig, AnalysisConfigBuilder, ClassificationConfig, LanguageProfile, ReporterConfig,
};
pub use error::{AnalysisError, PersistError, SkipWarning, WarningKind};
pub use event::{
    EventKind, FileStats, FolderProgress, MethodProgress, OverallProgress, ProgressEvent,
    SavedResults, percent,
};
pub use ignore::IgnoreRules;
pub use model::{
    AnalysisProgress, AnalysisResult, AnalysisTotals, Category, DirectoryNode, FileListing,
    FileMetrics, RecordOutcome,
};
pub use sink::{ResultHandle, ResultSink};
