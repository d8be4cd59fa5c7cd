//! Two-pass analysis engine for codetally.
//!
//! This crate walks a directory tree twice: a pre-pass that fixes the
//! totals, and a full pass that reports progress against them.
//!
//! # Overview
//!
//! - **Deterministic traversal** via jwalk with sorted children, shared by
//!   both passes
//! - **Parallel measuring** of files in the pre-pass via rayon
//! - **Rate-controlled progress** that coalesces events instead of dropping them
//! - **Cancellation** when the consumer goes away
//!
//! # Example
//!
//! ```rust,no_run
//! use codetally_scan::{AnalysisConfig, Analyzer};
//!
//! let analyzer = Analyzer::new(AnalysisConfig::new("/path/to/project")).unwrap();
//! let result = analyzer.analyze().unwrap();
//!
//! println!("Code lines: {}", result.totals.total_code_lines);
//! println!("Methods: {}", result.totals.total_methods);
//! ```
//!
//! # Streaming
//!
//! ```rust,no_run
//! use codetally_scan::{AnalysisConfig, start_analysis};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() {
//! let config = AnalysisConfig::new("/path/to/project");
//! let mut events = start_analysis(config, None, CancellationToken::new());
//! while let Some(event) = events.recv().await {
//!     print!("{}", event.to_sse().unwrap());
//! }
//! # }
//! ```

mod engine;
mod metrics;
mod reporter;
mod session;
mod stream;
mod walker;

pub use engine::{AnalysisOutcome, Analyzer};
pub use metrics::{MethodHeuristic, MetricExtractor, count_lines};
pub use reporter::{DiscardEvents, EventSink, ProgressReporter};
pub use session::{AnalysisSession, SessionState};
pub use stream::{EVENT_CHANNEL_SIZE, start_analysis};
pub use walker::{WalkStep, Walker};

// Re-export core types for convenience
pub use codetally_core::{
    AnalysisConfig, AnalysisError, AnalysisProgress, AnalysisResult, AnalysisTotals, Category,
    FileListing, FileMetrics, ProgressEvent, ResultSink, SkipWarning,
};
