//! Async driver that runs a session in the background and streams its events.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use codetally_core::{
    AnalysisConfig, AnalysisError, PersistError, ProgressEvent, ResultHandle, ResultSink,
};

use crate::engine::{AnalysisOutcome, Analyzer};

/// Capacity of the event channel. A slow consumer blocks the walk once full.
pub const EVENT_CHANNEL_SIZE: usize = 256;

/// Start a background analysis.
///
/// Returns a receiver that gets the session's events in order. A valid
/// session ends with `result`, then `saved` or `save-failed` when `sink` is
/// set, then `done`; a failed one ends with a single `error`. Cancelling
/// `cancel` stops the walk and ends the stream with an `error`. Dropping the
/// receiver stops the walk.
pub fn start_analysis(
    config: AnalysisConfig,
    sink: Option<Arc<dyn ResultSink>>,
    cancel: CancellationToken,
) -> mpsc::Receiver<ProgressEvent> {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
    tokio::spawn(run_session(config, sink, cancel.child_token(), tx));
    rx
}

async fn run_session(
    config: AnalysisConfig,
    sink: Option<Arc<dyn ResultSink>>,
    cancel: CancellationToken,
    tx: mpsc::Sender<ProgressEvent>,
) {
    // Consumer hung up: stop the walk even while it is between sends.
    let watcher = tokio::spawn({
        let tx = tx.clone();
        let cancel = cancel.clone();
        async move {
            tokio::select! {
                () = tx.closed() => cancel.cancel(),
                () = cancel.cancelled() => {}
            }
        }
    });

    let persist_timeout = config.persist_timeout();

    // jwalk and rayon do blocking work
    let outcome = {
        let tx = tx.clone();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            let analyzer = Analyzer::new(config)?;
            analyzer.run(tx, &cancel)
        })
        .await
        .unwrap_or_else(|e| {
            Err(AnalysisError::Other {
                message: e.to_string(),
            })
        })
    };

    match outcome {
        Ok(outcome) => finish(outcome, sink, persist_timeout, &tx).await,
        Err(err) if err.is_aborted() && tx.is_closed() => debug!("Analysis session aborted"),
        Err(err) => {
            debug!(error = %err, "Analysis failed");
            let _ = tx
                .send(ProgressEvent::Error {
                    message: err.to_string(),
                })
                .await;
        }
    }

    cancel.cancel();
    let _ = watcher.await;
}

async fn finish(
    outcome: AnalysisOutcome,
    sink: Option<Arc<dyn ResultSink>>,
    persist_timeout: Duration,
    tx: &mpsc::Sender<ProgressEvent>,
) {
    if tx
        .send(ProgressEvent::Result(outcome.result.clone()))
        .await
        .is_err()
    {
        return;
    }

    if let Some(sink) = sink {
        let event = match persist(sink, outcome, persist_timeout).await {
            Ok(handle) => ProgressEvent::Saved(handle.to_saved()),
            Err(err) => {
                warn!(error = %err, "Failed to save analysis results");
                ProgressEvent::SaveFailed {
                    message: err.to_string(),
                }
            }
        };
        if tx.send(event).await.is_err() {
            return;
        }
    }

    let _ = tx.send(ProgressEvent::Done).await;
}

/// Persist off the async threads, giving up after `limit`.
///
/// A write that completes after the timeout was reported is discarded
/// through [`ResultSink::discard`].
async fn persist(
    sink: Arc<dyn ResultSink>,
    outcome: AnalysisOutcome,
    limit: Duration,
) -> Result<ResultHandle, PersistError> {
    // Set by whichever side settles first: the writer or the timeout.
    let settled = Arc::new(AtomicBool::new(false));
    let mut task = tokio::task::spawn_blocking({
        let settled = settled.clone();
        move || {
            let saved = sink.persist(&outcome.result, &outcome.listing);
            if settled.swap(true, Ordering::AcqRel) {
                if let Ok(handle) = &saved {
                    warn!(path = %handle.results_path.display(), "Save finished after timing out; removing it");
                    if let Err(err) = sink.discard(handle) {
                        warn!(error = %err, "Failed to remove late save");
                    }
                }
            }
            saved
        }
    });

    let joined = match tokio::time::timeout(limit, &mut task).await {
        Ok(joined) => joined,
        Err(_) if !settled.swap(true, Ordering::AcqRel) => {
            return Err(PersistError::Timeout {
                seconds: limit.as_secs(),
            });
        }
        // Writer settled as the timer fired
        Err(_) => task.await,
    };
    joined.unwrap_or_else(|join| {
        Err(PersistError::Other {
            message: join.to_string(),
        })
    })
}
