use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use codetally_core::{PersistError, ReporterConfig, ResultHandle};
use codetally_scan::{
    AnalysisConfig, AnalysisError, AnalysisResult, Analyzer, EventSink, FileListing,
    ProgressEvent, ResultSink, WalkStep, Walker, start_analysis,
};
use std::fs;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn create_project() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir(root.join("src")).unwrap();
    fs::write(
        root.join("src/a.py"),
        "import os\n\ndef one():\n    pass\n\n\ndef two():\n    pass\n\nprint(1)\n",
    )
    .unwrap();
    fs::write(root.join("src/readme.md"), "a\nb\nc\nd\ne\n").unwrap();
    temp
}

fn create_wide_tree(dirs: usize, files_per_dir: usize) -> TempDir {
    let temp = TempDir::new().unwrap();
    for d in 0..dirs {
        let dir = temp.path().join(format!("pkg{d:03}"));
        fs::create_dir(&dir).unwrap();
        for f in 0..files_per_dir {
            fs::write(dir.join(format!("m{f:02}.rs")), "fn a() {}\nfn b() {}\n").unwrap();
        }
    }
    temp
}

async fn collect(config: AnalysisConfig, sink: Option<Arc<dyn ResultSink>>) -> Vec<ProgressEvent> {
    let mut rx = start_analysis(config, sink, CancellationToken::new());
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

fn names(events: &[ProgressEvent]) -> Vec<&'static str> {
    events.iter().map(ProgressEvent::name).collect()
}

fn result_of(events: &[ProgressEvent]) -> AnalysisResult {
    events
        .iter()
        .find_map(|e| match e {
            ProgressEvent::Result(r) => Some(r.clone()),
            _ => None,
        })
        .unwrap()
}

fn assert_bounded(event: &ProgressEvent) {
    fn le(processed: u64, total: Option<u64>) {
        if let Some(total) = total {
            assert!(processed <= total, "{processed} > {total}");
        }
    }
    match event {
        ProgressEvent::FolderProgress(p) => le(p.processed_folders, p.total_folders),
        ProgressEvent::MethodProgress(p) => le(p.processed_methods, p.total_methods),
        ProgressEvent::FileStats(s) => {
            le(s.processed_code_files, s.total_code_files);
            le(s.processed_doc_files, s.total_doc_files);
            le(s.processed_code_lines, s.total_code_lines);
            le(s.processed_doc_lines, s.total_doc_lines);
        }
        ProgressEvent::Progress(p) => {
            le(p.processed_folders, p.total_folders);
            le(p.processed_files, p.total_files);
            le(p.processed_lines, p.total_lines);
            le(p.processed_methods, p.total_methods);
        }
        _ => {}
    }
}

/// Records persist calls and returns a fixed outcome.
struct RecordingSink {
    calls: AtomicUsize,
    discarded: AtomicUsize,
    fail: bool,
    delay: Duration,
}

impl RecordingSink {
    fn new(fail: bool) -> Arc<Self> {
        Self::slow(fail, Duration::ZERO)
    }

    fn slow(fail: bool, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            discarded: AtomicUsize::new(0),
            fail,
            delay,
        })
    }
}

impl ResultSink for RecordingSink {
    fn persist(
        &self,
        result: &AnalysisResult,
        _listing: &FileListing,
    ) -> Result<ResultHandle, PersistError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        if self.fail {
            return Err(PersistError::Other {
                message: "disk full".to_string(),
            });
        }
        Ok(ResultHandle {
            results_path: result.path.join("results"),
            saved_files: vec![result.path.join("results/summary.json")],
        })
    }

    fn discard(&self, _handle: &ResultHandle) -> Result<(), PersistError> {
        self.discarded.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_analyze_sample_project() {
    let temp = create_project();
    let result = Analyzer::new(AnalysisConfig::new(temp.path()))
        .unwrap()
        .analyze()
        .unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["totalFolders"], 1);
    assert_eq!(json["totalFiles"], 2);
    assert_eq!(json["totalCodeFiles"], 1);
    assert_eq!(json["totalDocFiles"], 1);
    assert_eq!(json["totalCodeLines"], 10);
    assert_eq!(json["totalDocLines"], 5);
    assert_eq!(json["totalLines"], 15);
    assert_eq!(json["totalMethods"], 2);
}

#[test]
fn test_analyze_is_idempotent() {
    let temp = create_wide_tree(5, 4);
    let analyzer = Analyzer::new(AnalysisConfig::new(temp.path())).unwrap();
    assert_eq!(analyzer.analyze().unwrap(), analyzer.analyze().unwrap());
}

#[test]
fn test_ignored_entries_do_not_count() {
    let temp = create_project();
    let root = temp.path();
    fs::create_dir_all(root.join("node_modules/dep")).unwrap();
    fs::write(root.join("node_modules/dep/index.js"), "function f() {}\n").unwrap();
    fs::create_dir(root.join(".venv-tools")).unwrap();
    fs::write(root.join(".venv-tools/x.py"), "def x():\n").unwrap();
    fs::write(root.join("src/trace.log"), "noise\n").unwrap();
    fs::write(root.join(".gitignore"), "target\n").unwrap();

    let result = Analyzer::new(AnalysisConfig::new(root))
        .unwrap()
        .analyze()
        .unwrap();
    assert_eq!(result.totals.total_folders, 1);
    assert_eq!(result.totals.total_files, 2);
}

#[test]
fn test_walker_shared_by_both_passes() {
    let temp = create_wide_tree(3, 2);
    let walker = Walker::from_config(&AnalysisConfig::new(temp.path())).unwrap();
    let walk = |root: &Path| {
        let mut files = Vec::new();
        let _ = walker.walk(root, |step| {
            if let WalkStep::File { node, .. } = step {
                files.push(node.path);
            }
            ControlFlow::Continue(())
        });
        files
    };
    let first: Vec<PathBuf> = walk(temp.path());
    assert_eq!(first.len(), 6);
    assert_eq!(first, walk(temp.path()));
}

#[tokio::test]
async fn test_stream_event_order() {
    let temp = create_project();
    let events = collect(AnalysisConfig::new(temp.path()), None).await;
    let names = names(&events);

    assert_eq!(names[0], "start");
    assert_eq!(names[1], "totals");
    assert_eq!(&names[names.len() - 2..], &["result", "done"]);
    assert_eq!(names.iter().filter(|n| **n == "done").count(), 1);
    assert!(!names.contains(&"error"));

    let dir = names.iter().position(|n| *n == "directory").unwrap();
    let file = names.iter().position(|n| *n == "file").unwrap();
    assert!(dir < file);

    events.iter().for_each(assert_bounded);
}

#[tokio::test]
async fn test_stream_progress_reaches_totals() {
    let temp = create_wide_tree(4, 3);
    let events = collect(AnalysisConfig::new(temp.path()), None).await;

    let totals = events
        .iter()
        .find_map(|e| match e {
            ProgressEvent::Totals(t) => Some(*t),
            _ => None,
        })
        .unwrap();
    let last_progress = events
        .iter()
        .rev()
        .find_map(|e| match e {
            ProgressEvent::Progress(p) => Some(p.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(last_progress.processed_files, totals.total_files);
    assert_eq!(last_progress.processed_folders, totals.total_folders);
    assert_eq!(last_progress.processed_lines, totals.total_lines);
    assert_eq!(last_progress.processed_methods, totals.total_methods);
    assert_eq!(last_progress.files_percent, Some(100));

    let result = events
        .iter()
        .find_map(|e| match e {
            ProgressEvent::Result(r) => Some(r.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(result.totals, totals);
    assert_eq!(totals.total_methods, 24);
}

#[tokio::test]
async fn test_stream_empty_directory() {
    let temp = TempDir::new().unwrap();
    let events = collect(AnalysisConfig::new(temp.path()), None).await;
    let names = names(&events);

    assert_eq!(names[0], "start");
    assert_eq!(names[1], "totals");
    assert_eq!(names.last(), Some(&"done"));
    assert!(!names.contains(&"directory"));
    assert!(!names.contains(&"file"));

    match &events[1] {
        ProgressEvent::Totals(t) => assert_eq!(t.total_files, 0),
        other => panic!("unexpected {other:?}"),
    }
    // percentages are omitted for zero totals
    let overall = events.iter().find_map(|e| match e {
        ProgressEvent::Progress(p) => Some(p.clone()),
        _ => None,
    });
    assert_eq!(overall.unwrap().files_percent, None);
}

#[tokio::test]
async fn test_stream_missing_root() {
    let temp = TempDir::new().unwrap();
    let events = collect(AnalysisConfig::new(temp.path().join("missing")), None).await;

    assert_eq!(events.len(), 1);
    match &events[0] {
        ProgressEvent::Error { message } => assert!(message.contains("not found")),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_stream_root_is_file() {
    let temp = create_project();
    let events = collect(AnalysisConfig::new(temp.path().join("src/a.py")), None).await;
    assert_eq!(names(&events), vec!["error"]);
}

#[tokio::test]
async fn test_stream_saved() {
    let temp = create_project();
    let sink = RecordingSink::new(false);
    let events = collect(AnalysisConfig::new(temp.path()), Some(sink.clone())).await;
    let names = names(&events);

    assert_eq!(&names[names.len() - 3..], &["result", "saved", "done"]);
    assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stream_save_failed_still_done() {
    let temp = create_project();
    let sink = RecordingSink::new(true);
    let events = collect(AnalysisConfig::new(temp.path()), Some(sink)).await;
    let names = names(&events);

    assert_eq!(&names[names.len() - 3..], &["result", "save-failed", "done"]);
    match &events[events.len() - 2] {
        ProgressEvent::SaveFailed { message } => assert!(message.contains("disk full")),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_stream_persist_timeout() {
    let temp = create_project();
    let sink = RecordingSink::slow(false, Duration::from_millis(500));
    let mut config = AnalysisConfig::new(temp.path());
    config.persist_timeout_secs = 0;

    let events = collect(config, Some(sink.clone())).await;
    match &events[events.len() - 2] {
        ProgressEvent::SaveFailed { message } => assert!(message.contains("timed out")),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(events.last(), Some(&ProgressEvent::Done));

    // The write that finished late is rolled back.
    tokio::time::timeout(Duration::from_secs(10), async {
        while sink.discarded.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    assert_eq!(sink.discarded.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stream_fast_save_is_kept() {
    let temp = create_project();
    let sink = RecordingSink::new(false);
    let events = collect(AnalysisConfig::new(temp.path()), Some(sink.clone())).await;

    assert!(events.iter().any(|e| matches!(e, ProgressEvent::Saved(_))));
    assert_eq!(sink.discarded.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stream_coalesces_without_losing_paths() {
    let temp = create_wide_tree(3, 5);
    let mut config = AnalysisConfig::new(temp.path());
    config.reporter = ReporterConfig {
        max_events_per_interval: 2,
        interval_ms: 3_600_000,
        heartbeat_every: 1,
    };
    let events = collect(config, None).await;

    let files: Vec<String> = events
        .iter()
        .flat_map(|e| match e {
            ProgressEvent::File { paths } => paths.clone(),
            _ => Vec::new(),
        })
        .collect();
    assert_eq!(files.len(), 15);
    let mut sorted = files.clone();
    sorted.sort();
    assert_eq!(files, sorted);

    assert!(events.iter().any(|e| matches!(e, ProgressEvent::File { paths } if paths.len() > 1)));
    assert_eq!(events.last(), Some(&ProgressEvent::Done));
}

#[tokio::test]
async fn test_disconnect_stops_session() {
    let temp = create_wide_tree(50, 20);
    let sink = RecordingSink::new(false);
    let mut config = AnalysisConfig::new(temp.path());
    config.reporter = ReporterConfig {
        max_events_per_interval: u32::MAX,
        interval_ms: 100,
        heartbeat_every: 1,
    };

    let mut rx = start_analysis(config, Some(sink.clone()), CancellationToken::new());
    for _ in 0..3 {
        rx.recv().await.unwrap();
    }
    drop(rx);

    // The session drops its handle on the sink once it has stopped.
    tokio::time::timeout(Duration::from_secs(30), async {
        while Arc::strong_count(&sink) > 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancel_ends_stream_with_error() {
    let temp = create_wide_tree(50, 20);
    let mut config = AnalysisConfig::new(temp.path());
    config.reporter = ReporterConfig {
        max_events_per_interval: u32::MAX,
        interval_ms: 100,
        heartbeat_every: 1,
    };
    let cancel = CancellationToken::new();
    let mut rx = start_analysis(config, None, cancel.clone());
    rx.recv().await.unwrap();
    cancel.cancel();

    let mut rest = Vec::new();
    while let Some(event) = rx.recv().await {
        rest.push(event);
    }
    match rest.last() {
        Some(ProgressEvent::Error { message }) => assert_eq!(message, "Analysis session aborted"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(!rest.contains(&ProgressEvent::Done));
    assert!(!names(&rest).contains(&"result"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_unreadable_file_counts_as_skipped() {
    use std::os::unix::fs::PermissionsExt;

    let temp = create_project();
    let locked = temp.path().join("src/locked.py");
    fs::write(&locked, "def hidden():\n    pass\n").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read(&locked).is_ok() {
        // Permission bits are not enforced for this user
        return;
    }

    let events = collect(AnalysisConfig::new(temp.path()), None).await;
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

    let names = names(&events);
    assert_eq!(&names[..2], &["start", "totals"]);
    assert_eq!(&names[names.len() - 2..], &["result", "done"]);
    assert!(!names.contains(&"error"));
    events.iter().for_each(assert_bounded);

    let result = result_of(&events);
    assert_eq!(result.totals.total_files, 3);
    assert_eq!(result.totals.total_code_files, 2);
    assert_eq!(result.totals.total_code_lines, 10);
    assert_eq!(result.totals.total_methods, 2);
    assert_eq!(result.skipped_entries, 1);

    let last_progress = events
        .iter()
        .rev()
        .find_map(|e| match e {
            ProgressEvent::Progress(p) => Some(p.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(Some(last_progress.processed_files), last_progress.total_files);
    assert_eq!(Some(last_progress.processed_folders), last_progress.total_folders);

    let listed = events.iter().any(|e| {
        matches!(e, ProgressEvent::File { paths } if paths.iter().any(|p| p.ends_with("locked.py")))
    });
    assert!(listed);
}

#[tokio::test]
async fn test_invalid_utf8_does_not_abort() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("Binary.java"), [0xC3u8, 0x28, b'\n', 0xFF]).unwrap();
    fs::write(
        temp.path().join("Included.java"),
        "public class Included {\n    public void run() {\n    }\n}\n",
    )
    .unwrap();

    let events = collect(AnalysisConfig::new(temp.path()), None).await;
    let names = names(&events);
    assert_eq!(&names[names.len() - 2..], &["result", "done"]);
    assert!(!names.contains(&"error"));

    let result = result_of(&events);
    assert_eq!(result.totals.total_files, 2);
    assert_eq!(result.totals.total_code_files, 2);
    assert_eq!(result.totals.total_code_lines, 6);
    assert_eq!(result.totals.total_methods, 1);
    assert_eq!(result.skipped_entries, 0);
}

/// Closes after a fixed number of events.
struct ClosingSink {
    remaining: usize,
}

impl EventSink for ClosingSink {
    fn send(&mut self, _event: ProgressEvent) -> Result<(), AnalysisError> {
        if self.remaining == 0 {
            return Err(AnalysisError::SessionAborted);
        }
        self.remaining -= 1;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.remaining == 0
    }
}

#[test]
fn test_closed_sink_aborts_run() {
    let temp = create_wide_tree(5, 5);
    let analyzer = Analyzer::new(AnalysisConfig::new(temp.path())).unwrap();
    let err = analyzer
        .run(ClosingSink { remaining: 4 }, &CancellationToken::new())
        .unwrap_err();
    assert!(err.is_aborted());
}
