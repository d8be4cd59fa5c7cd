//! Per-request analysis session state.

use std::path::{Path, PathBuf};

use codetally_core::{
    AnalysisError, AnalysisProgress, AnalysisResult, AnalysisTotals, Category, FileMetrics,
    RecordOutcome, SkipWarning,
};

/// Lifecycle of a session: `Idle -> PrePass -> FullPass -> Completed`, or
/// `Failed` from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    PrePass,
    FullPass,
    Completed,
    Failed,
}

impl SessionState {
    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn next(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::PrePass),
            Self::PrePass => Some(Self::FullPass),
            Self::FullPass => Some(Self::Completed),
            Self::Completed | Self::Failed => None,
        }
    }
}

/// Everything one analysis owns: its root, totals, progress and skips.
///
/// Sessions share nothing mutable, so any number may run side by side.
#[derive(Debug)]
pub struct AnalysisSession {
    root: PathBuf,
    state: SessionState,
    totals: Option<AnalysisTotals>,
    progress: AnalysisProgress,
    skipped: Vec<SkipWarning>,
    clamped_updates: u64,
}

impl AnalysisSession {
    /// Create an idle session for `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            state: SessionState::Idle,
            totals: None,
            progress: AnalysisProgress::new(),
            skipped: Vec::new(),
            clamped_updates: 0,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn totals(&self) -> Option<&AnalysisTotals> {
        self.totals.as_ref()
    }

    pub fn progress(&self) -> &AnalysisProgress {
        &self.progress
    }

    pub fn skipped(&self) -> &[SkipWarning] {
        &self.skipped
    }

    /// Number of updates that hit a total (the tree changed between passes).
    pub fn clamped_updates(&self) -> u64 {
        self.clamped_updates
    }

    /// Move to `to`, which must be the next state in order.
    pub fn advance(&mut self, to: SessionState) -> Result<(), AnalysisError> {
        if self.state.next() != Some(to) {
            return Err(AnalysisError::Other {
                message: format!("invalid session transition {:?} -> {:?}", self.state, to),
            });
        }
        self.state = to;
        Ok(())
    }

    /// Mark the session failed. No effect once terminal.
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = SessionState::Failed;
        }
    }

    /// Fix the totals; only allowed while in the pre-pass.
    pub fn set_totals(&mut self, totals: AnalysisTotals) -> Result<(), AnalysisError> {
        if self.state != SessionState::PrePass || self.totals.is_some() {
            return Err(AnalysisError::Other {
                message: "totals can only be set once, during the pre-pass".to_string(),
            });
        }
        self.totals = Some(totals);
        Ok(())
    }

    /// Count a finished directory, clamped to the totals.
    pub(crate) fn record_dir(&mut self) -> Result<RecordOutcome, AnalysisError> {
        let totals = self.full_pass_totals()?;
        let outcome = self.progress.record_dir(&totals);
        self.note(outcome);
        Ok(outcome)
    }

    /// Count a processed file, clamped to the totals.
    pub(crate) fn record_file(
        &mut self,
        category: Category,
        metrics: FileMetrics,
    ) -> Result<RecordOutcome, AnalysisError> {
        let totals = self.full_pass_totals()?;
        let outcome = self.progress.record_file(category, metrics, &totals);
        self.note(outcome);
        Ok(outcome)
    }

    pub(crate) fn record_skip(&mut self, warning: SkipWarning) {
        self.skipped.push(warning);
    }

    /// Hand over the skipped entries.
    pub fn into_skipped(self) -> Vec<SkipWarning> {
        self.skipped
    }

    fn full_pass_totals(&self) -> Result<AnalysisTotals, AnalysisError> {
        match self.totals {
            Some(totals) if self.state == SessionState::FullPass => Ok(totals),
            _ => Err(AnalysisError::Other {
                message: format!("progress recorded in state {:?}", self.state),
            }),
        }
    }

    fn note(&mut self, outcome: RecordOutcome) {
        if outcome.clamped {
            self.clamped_updates += 1;
        }
    }

    /// Final snapshot; only available once completed.
    pub fn result(&self) -> Option<AnalysisResult> {
        (self.state == SessionState::Completed).then(|| {
            AnalysisResult::new(
                self.root.clone(),
                self.progress.as_totals(),
                self.skipped.len() as u64,
            )
        })
    }
}
