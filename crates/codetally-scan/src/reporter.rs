//! Turns traversal callbacks into a rate-controlled, ordered event stream.
//!
//! Per-item events (`directory`, `file`) and per-item snapshots
//! (`folderProgress`, `file-stats`, `methodProgress`, `progress`) pass
//! straight through until `max_events_per_interval` is reached inside the
//! current window. Past that they are held back: consecutive items of the
//! same kind are merged into one event carrying several paths, and snapshots
//! keep only the latest of each kind. Held events go out, in order, when the
//! window rolls over or right before any other event. Nothing is reordered
//! relative to other item events and the closing events are never held.

use std::path::Path;
use std::time::Instant;

use tokio::sync::mpsc;

use codetally_core::{
    AnalysisError, AnalysisProgress, AnalysisTotals, Category, EventKind, FileMetrics,
    ProgressEvent, ReporterConfig,
};

/// Destination for progress events.
pub trait EventSink {
    /// Deliver one event. An error means the consumer is gone.
    fn send(&mut self, event: ProgressEvent) -> Result<(), AnalysisError>;

    /// Whether the consumer has gone away.
    fn is_closed(&self) -> bool {
        false
    }
}

impl EventSink for Vec<ProgressEvent> {
    fn send(&mut self, event: ProgressEvent) -> Result<(), AnalysisError> {
        self.push(event);
        Ok(())
    }
}

/// Blocks on backpressure; must be used from a blocking thread.
impl EventSink for mpsc::Sender<ProgressEvent> {
    fn send(&mut self, event: ProgressEvent) -> Result<(), AnalysisError> {
        self.blocking_send(event)
            .map_err(|_| AnalysisError::SessionAborted)
    }

    fn is_closed(&self) -> bool {
        mpsc::Sender::is_closed(self)
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn send(&mut self, event: ProgressEvent) -> Result<(), AnalysisError> {
        (**self).send(event)
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}

/// Sink that drops every event. Used for one-shot analyses.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardEvents;

impl EventSink for DiscardEvents {
    fn send(&mut self, _event: ProgressEvent) -> Result<(), AnalysisError> {
        Ok(())
    }
}

/// Snapshot slots, one per snapshot kind, flushed in this order.
const SNAPSHOT_KINDS: [EventKind; 4] = [
    EventKind::FolderProgress,
    EventKind::FileStats,
    EventKind::MethodProgress,
    EventKind::Progress,
];

fn snapshot_slot(kind: EventKind) -> Option<usize> {
    SNAPSHOT_KINDS.iter().position(|k| *k == kind)
}

/// Progress reporter for one session.
#[derive(Debug)]
pub struct ProgressReporter<S> {
    sink: S,
    config: ReporterConfig,
    totals: Option<AnalysisTotals>,
    window_start: Instant,
    emitted_in_window: u32,
    held_items: Vec<ProgressEvent>,
    held_snapshots: [Option<ProgressEvent>; 4],
    files_since_heartbeat: u64,
}

impl<S: EventSink> ProgressReporter<S> {
    /// Create a reporter writing to `sink`.
    pub fn new(sink: S, config: ReporterConfig) -> Self {
        Self {
            sink,
            config,
            totals: None,
            window_start: Instant::now(),
            emitted_in_window: 0,
            held_items: Vec::new(),
            held_snapshots: Default::default(),
            files_since_heartbeat: 0,
        }
    }

    /// Totals, once the pre-pass has produced them.
    pub fn totals(&self) -> Option<&AnalysisTotals> {
        self.totals.as_ref()
    }

    /// Whether the consumer has gone away.
    pub fn is_closed(&self) -> bool {
        self.sink.is_closed()
    }

    /// Emit the `start` event.
    pub fn on_session_started(&mut self, root: &Path) -> Result<(), AnalysisError> {
        self.emit(ProgressEvent::Start {
            message: format!("Starting analysis of: {}", root.display()),
        })
    }

    /// Record the pre-pass totals and emit the `totals` event.
    pub fn on_totals(&mut self, totals: AnalysisTotals) -> Result<(), AnalysisError> {
        self.totals = Some(totals);
        self.emit(ProgressEvent::Totals(totals))
    }

    /// A directory was entered during the full pass.
    pub fn on_directory_entered(&mut self, path: &Path) -> Result<(), AnalysisError> {
        self.push(ProgressEvent::Directory {
            paths: vec![path.display().to_string()],
        })
    }

    /// A directory's children are done; `progress` already counts it.
    pub fn on_directory_completed(&mut self, progress: &AnalysisProgress) -> Result<(), AnalysisError> {
        let event = ProgressEvent::folder_progress(progress, self.totals.as_ref());
        self.push(event)
    }

    /// A file was processed; `progress` already includes it.
    pub fn on_file_processed(
        &mut self,
        path: &Path,
        category: Category,
        metrics: FileMetrics,
        progress: &AnalysisProgress,
    ) -> Result<(), AnalysisError> {
        let display = path.display().to_string();
        self.push(ProgressEvent::File {
            paths: vec![display.clone()],
        })?;

        if category.counts_lines() {
            let event = ProgressEvent::file_stats(category, display, progress, self.totals.as_ref());
            self.push(event)?;
        }
        if metrics.methods > 0 {
            let event = ProgressEvent::method_progress(progress, self.totals.as_ref());
            self.push(event)?;
        }

        self.files_since_heartbeat += 1;
        if self.files_since_heartbeat >= self.config.heartbeat_every.max(1) {
            self.files_since_heartbeat = 0;
            let event = ProgressEvent::overall(progress, self.totals.as_ref());
            self.push(event)?;
        }
        Ok(())
    }

    /// The full pass finished: flush everything held and emit final snapshots.
    pub fn on_pass_complete(&mut self, progress: &AnalysisProgress) -> Result<(), AnalysisError> {
        let totals = self.totals;
        self.emit(ProgressEvent::folder_progress(progress, totals.as_ref()))?;
        self.emit(ProgressEvent::method_progress(progress, totals.as_ref()))?;
        self.emit(ProgressEvent::overall(progress, totals.as_ref()))
    }

    /// Send an event that is never rate limited, flushing held events first.
    pub fn emit(&mut self, event: ProgressEvent) -> Result<(), AnalysisError> {
        self.flush()?;
        self.sink.send(event)
    }

    /// Send a rate-limited event.
    pub fn push(&mut self, event: ProgressEvent) -> Result<(), AnalysisError> {
        let Some(kind) = event.kind() else {
            return self.emit(event);
        };

        if self.window_start.elapsed() >= self.config.interval() {
            self.window_start = Instant::now();
            self.emitted_in_window = 0;
            self.flush()?;
        }

        if !self.is_holding() && self.emitted_in_window < self.config.max_events_per_interval {
            self.emitted_in_window += 1;
            return self.sink.send(event);
        }

        self.hold(kind, event);
        Ok(())
    }

    /// Send every held event in order.
    pub fn flush(&mut self) -> Result<(), AnalysisError> {
        for event in std::mem::take(&mut self.held_items) {
            self.sink.send(event)?;
        }
        for slot in 0..self.held_snapshots.len() {
            if let Some(event) = self.held_snapshots[slot].take() {
                self.sink.send(event)?;
            }
        }
        Ok(())
    }

    /// Flush and hand back the sink.
    pub fn finish(mut self) -> Result<S, AnalysisError> {
        self.flush()?;
        Ok(self.sink)
    }

    fn is_holding(&self) -> bool {
        !self.held_items.is_empty() || self.held_snapshots.iter().any(Option::is_some)
    }

    fn hold(&mut self, kind: EventKind, event: ProgressEvent) {
        if let Some(slot) = snapshot_slot(kind) {
            self.held_snapshots[slot] = Some(event);
            return;
        }

        let same_kind = self.held_items.last().and_then(ProgressEvent::kind) == Some(kind);
        let more = match event {
            ProgressEvent::Directory { paths } | ProgressEvent::File { paths } if same_kind => paths,
            other => {
                self.held_items.push(other);
                return;
            }
        };
        if let Some(ProgressEvent::Directory { paths } | ProgressEvent::File { paths }) =
            self.held_items.last_mut()
        {
            paths.extend(more);
        }
    }
}
