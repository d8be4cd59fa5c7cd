//! Two-pass analysis engine.
//!
//! The pre-pass walks the tree and measures every file to fix the totals.
//! The full pass walks it again in the same order, measures each file once
//! more and reports progress against those totals.

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use codetally_core::{
    AnalysisConfig, AnalysisError, AnalysisResult, AnalysisTotals, FileClass, FileListing,
    FileMetrics, SkipWarning,
};

use crate::metrics::MetricExtractor;
use crate::reporter::{DiscardEvents, EventSink, ProgressReporter};
use crate::session::{AnalysisSession, SessionState};
use crate::walker::{WalkStep, Walker};

/// Everything a completed session produced.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    /// Final aggregate, equal to the pre-pass totals on an unchanged tree.
    pub result: AnalysisResult,
    /// Paths met during the full pass.
    pub listing: FileListing,
    /// Entries that could not be read.
    pub warnings: Vec<SkipWarning>,
}

/// Runs analysis sessions for one configuration.
///
/// Holds only immutable compiled state, so it can be shared between
/// threads and reused for any number of sessions.
#[derive(Debug, Clone)]
pub struct Analyzer {
    config: AnalysisConfig,
    walker: Walker,
    extractor: MetricExtractor,
}

impl Analyzer {
    /// Compile ignore rules, classifier and method heuristics.
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        let walker = Walker::from_config(&config)?;
        let extractor = MetricExtractor::new(&config.classification)?;
        Ok(Self {
            config,
            walker,
            extractor,
        })
    }

    /// The configuration sessions run with.
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Check the root and return it in canonical form, so `..` and symlinks
    /// in the given path are resolved.
    ///
    /// Fails with `PathNotFound`, `NotADirectory` or `PermissionDenied`
    /// before anything is walked.
    pub fn validate_root(&self) -> Result<PathBuf, AnalysisError> {
        let root = &self.config.root;
        let metadata = std::fs::metadata(root).map_err(|e| AnalysisError::io(root, e))?;
        if !metadata.is_dir() {
            return Err(AnalysisError::NotADirectory { path: root.clone() });
        }
        std::fs::read_dir(root).map_err(|e| AnalysisError::io(root, e))?;
        root.canonicalize().map_err(|e| AnalysisError::io(root, e))
    }

    /// Run one streaming session, sending events to `sink`.
    ///
    /// Root validation failures return before any event is sent. Returns
    /// `SessionAborted` as soon as `cancel` fires or the sink closes.
    pub fn run<S: EventSink>(
        &self,
        sink: S,
        cancel: &CancellationToken,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let root = self.validate_root()?;
        let started = Instant::now();
        info!(root = %root.display(), "Analysis started");

        let mut session = AnalysisSession::new(root);
        let mut reporter = ProgressReporter::new(sink, self.config.reporter);

        let listing = match self.drive(&mut session, &mut reporter, cancel) {
            Ok(listing) => listing,
            Err(err) => {
                session.fail();
                return Err(err);
            }
        };
        reporter.finish()?;

        let result = session.result().ok_or_else(|| AnalysisError::Other {
            message: "session ended without a result".to_string(),
        })?;
        if session.clamped_updates() > 0 {
            warn!(
                root = %session.root().display(),
                updates = session.clamped_updates(),
                "Tree changed between passes; progress was held at pre-pass totals"
            );
        }
        info!(
            root = %session.root().display(),
            files = result.totals.total_files,
            lines = result.totals.total_lines,
            skipped = result.skipped_entries,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Analysis finished"
        );

        Ok(AnalysisOutcome {
            result,
            listing,
            warnings: session.into_skipped(),
        })
    }

    /// Analyze without streaming and return only the final result.
    pub fn analyze(&self) -> Result<AnalysisResult, AnalysisError> {
        self.run(DiscardEvents, &CancellationToken::new())
            .map(|outcome| outcome.result)
    }

    fn drive<S: EventSink>(
        &self,
        session: &mut AnalysisSession,
        reporter: &mut ProgressReporter<S>,
        cancel: &CancellationToken,
    ) -> Result<FileListing, AnalysisError> {
        reporter.on_session_started(session.root())?;

        session.advance(SessionState::PrePass)?;
        let totals = self.pre_pass(session.root(), reporter, cancel)?;
        session.set_totals(totals)?;
        reporter.on_totals(totals)?;

        session.advance(SessionState::FullPass)?;
        let mut listing = FileListing::with_cap(self.config.max_listed_paths);
        self.full_pass(session, reporter, &mut listing, cancel)?;
        reporter.on_pass_complete(session.progress())?;

        session.advance(SessionState::Completed)?;
        Ok(listing)
    }

    /// Walk once to collect files, then measure them in parallel.
    fn pre_pass<S: EventSink>(
        &self,
        root: &Path,
        reporter: &ProgressReporter<S>,
        cancel: &CancellationToken,
    ) -> Result<AnalysisTotals, AnalysisError> {
        let mut folders = AnalysisTotals::new();
        let mut files: Vec<(PathBuf, FileClass)> = Vec::new();

        let flow = self.walker.walk(root, |step| {
            if cancel.is_cancelled() || reporter.is_closed() {
                return ControlFlow::Break(());
            }
            match step {
                WalkStep::DirectoryEntered(_) => folders.record_dir(),
                WalkStep::File { node, class } => files.push((node.path, class)),
                WalkStep::DirectoryCompleted(_) | WalkStep::Skipped(_) => {}
            }
            ControlFlow::Continue(())
        });
        if flow.is_break() {
            return Err(AnalysisError::SessionAborted);
        }

        let measured = files
            .par_iter()
            .map(|(path, class)| {
                let mut one = AnalysisTotals::new();
                if !cancel.is_cancelled() {
                    let metrics = self.extractor.extract(path, *class).unwrap_or_default();
                    one.record_file(class.category, metrics);
                }
                one
            })
            .reduce(AnalysisTotals::new, AnalysisTotals::merge);

        if cancel.is_cancelled() {
            return Err(AnalysisError::SessionAborted);
        }
        debug!(files = files.len(), "Pre-pass complete");
        Ok(folders.merge(measured))
    }

    fn full_pass<S: EventSink>(
        &self,
        session: &mut AnalysisSession,
        reporter: &mut ProgressReporter<S>,
        listing: &mut FileListing,
        cancel: &CancellationToken,
    ) -> Result<(), AnalysisError> {
        let root = session.root().to_path_buf();
        let mut failure = None;

        let _ = self.walker.walk(&root, |step| {
            if cancel.is_cancelled() || reporter.is_closed() {
                failure = Some(AnalysisError::SessionAborted);
                return ControlFlow::Break(());
            }
            match self.apply(step, session, reporter, listing) {
                Ok(()) => ControlFlow::Continue(()),
                Err(err) => {
                    failure = Some(err);
                    ControlFlow::Break(())
                }
            }
        });

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn apply<S: EventSink>(
        &self,
        step: WalkStep,
        session: &mut AnalysisSession,
        reporter: &mut ProgressReporter<S>,
        listing: &mut FileListing,
    ) -> Result<(), AnalysisError> {
        match step {
            WalkStep::DirectoryEntered(node) => {
                reporter.on_directory_entered(&node.path)?;
                listing.push_folder(node.path);
            }
            WalkStep::DirectoryCompleted(path) => {
                if session.record_dir()?.clamped {
                    debug!(path = %path.display(), "Folder count past pre-pass total");
                }
                reporter.on_directory_completed(session.progress())?;
            }
            WalkStep::File { node, class } => {
                let metrics = match self.extractor.extract(&node.path, class) {
                    Ok(metrics) => metrics,
                    Err(err) => {
                        debug!(path = %node.path.display(), error = %err, "Skipping unreadable file");
                        session.record_skip(SkipWarning::from_io(&node.path, &err));
                        FileMetrics::default()
                    }
                };
                if session.record_file(class.category, metrics)?.clamped {
                    debug!(path = %node.path.display(), "File counts past pre-pass totals");
                }
                reporter.on_file_processed(&node.path, class.category, metrics, session.progress())?;
                listing.push_file(node.path, class.category);
            }
            WalkStep::Skipped(warning) => {
                debug!(path = %warning.path.display(), message = %warning.message, "Skipping entry");
                session.record_skip(warning);
            }
        }
        Ok(())
    }
}
