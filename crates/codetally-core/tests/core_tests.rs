use codetally_core::{
    AnalysisConfig, AnalysisProgress, AnalysisResult, AnalysisTotals, Category,
    ClassificationConfig, Classifier, FileMetrics, IgnoreRules, LanguageProfile, ProgressEvent,
    extension,
};

#[test]
fn test_default_tables() {
    let classifier = Classifier::default();

    for name in ["Main.java", "app.tsx", "setup.py", "lib.rs", "deploy.sh", "pom.xml"] {
        assert_eq!(classifier.classify(name).category, Category::Code, "{name}");
    }
    for name in ["README.md", "notes.txt", "manual.pdf", "spec.adoc"] {
        assert_eq!(classifier.classify(name).category, Category::Document, "{name}");
    }
    for name in ["logo.png", "Makefile", "archive.tar.gz", ".env"] {
        assert_eq!(classifier.classify(name).category, Category::Other, "{name}");
    }
}

#[test]
fn test_classification_is_case_insensitive() {
    let classifier = Classifier::default();
    assert_eq!(classifier.classify("MAIN.PY"), classifier.classify("main.py"));
    assert_eq!(extension("Photo.JPEG").as_deref(), Some("jpeg"));
}

#[test]
fn test_custom_profile_makes_code() {
    let mut config = ClassificationConfig::default();
    config.languages.push(LanguageProfile {
        tag: "elixir".to_string(),
        extensions: vec!["ex".to_string()],
        method_patterns: vec![r"^defp?\s".to_string()],
        exclude_patterns: Vec::new(),
        comment_prefixes: vec!["#".to_string()],
    });

    let classifier = Classifier::new(&config);
    let class = classifier.classify("server.ex");
    assert_eq!(class.category, Category::Code);
    assert_eq!(class.language.and_then(|i| classifier.language_tag(i)), Some("elixir"));
}

#[test]
fn test_ignore_rules_defaults() {
    let rules = IgnoreRules::new(&AnalysisConfig::new("/src")).unwrap();

    assert!(rules.skip_dir("node_modules"));
    assert!(rules.skip_dir("Target"));
    assert!(rules.skip_dir("venv-py311"));
    assert!(rules.skip_dir(".git"));
    assert!(!rules.skip_dir("src"));

    assert!(rules.skip_file("server.log"));
    assert!(rules.skip_file(".gitignore"));
    assert!(rules.skip_file("cache.DB"));
    assert!(!rules.skip_file("main.rs"));
}

#[test]
fn test_ignore_rules_include_hidden() {
    let mut config = AnalysisConfig::new("/src");
    config.include_hidden = true;
    let rules = IgnoreRules::new(&config).unwrap();

    assert!(!rules.skip_dir(".config"));
    // Explicit names still win
    assert!(rules.skip_dir(".idea"));
    assert!(rules.skip_file(".gitignore"));
}

#[test]
fn test_totals_and_progress_agree() {
    let files = [
        (Category::Code, FileMetrics::new(120, 7)),
        (Category::Document, FileMetrics::new(40, 0)),
        (Category::Other, FileMetrics::default()),
        (Category::Code, FileMetrics::new(3, 1)),
    ];

    let mut totals = AnalysisTotals::new();
    totals.record_dir();
    for (category, metrics) in files {
        totals.record_file(category, metrics);
    }
    assert!(totals.is_consistent());

    let mut progress = AnalysisProgress::new();
    progress.record_dir(&totals);
    for (category, metrics) in files {
        assert!(!progress.record_file(category, metrics, &totals).clamped);
        assert!(progress.within(&totals));
    }
    assert_eq!(progress.as_totals(), totals);
}

#[test]
fn test_partial_merges_equal_sequential() {
    let mut left = AnalysisTotals::new();
    left.record_file(Category::Code, FileMetrics::new(10, 2));
    let mut right = AnalysisTotals::new();
    right.record_dir();
    right.record_file(Category::Document, FileMetrics::new(5, 0));

    let mut sequential = AnalysisTotals::new();
    sequential.record_file(Category::Code, FileMetrics::new(10, 2));
    sequential.record_dir();
    sequential.record_file(Category::Document, FileMetrics::new(5, 0));

    assert_eq!(left.merge(right), sequential);
    assert_eq!(right.merge(left), sequential);
}

#[test]
fn test_session_frames() {
    let mut totals = AnalysisTotals::new();
    totals.record_dir();
    totals.record_file(Category::Code, FileMetrics::new(10, 2));
    totals.record_file(Category::Document, FileMetrics::new(5, 0));

    let start = ProgressEvent::Start {
        message: "Starting analysis of: /work/src".to_string(),
    };
    assert_eq!(
        start.to_sse().unwrap(),
        "event: start\ndata: Starting analysis of: /work/src\n\n"
    );

    let frame = ProgressEvent::Totals(totals).to_sse().unwrap();
    assert!(frame.starts_with("event: totals\ndata: {"));
    assert!(frame.contains("\"totalCodeLines\":10"));
    assert!(frame.ends_with("}\n\n"));

    let result = ProgressEvent::Result(AnalysisResult::new("/work/src", totals, 0));
    let line = result.to_json_line().unwrap();
    let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
    assert_eq!(value["event"], "result");
    assert_eq!(value["data"]["totalLines"], 15);

    assert_eq!(ProgressEvent::Done.to_sse().unwrap(), "event: done\ndata: complete\n\n");
    assert!(ProgressEvent::Done.is_terminal());
}

#[test]
fn test_json_lines_round_trip_event_names() {
    let event = ProgressEvent::SaveFailed {
        message: "disk full".to_string(),
    };
    let line = event.to_json_line().unwrap();
    assert!(line.contains("\"event\":\"save-failed\""));
    let back: ProgressEvent = serde_json::from_str(line.trim_end()).unwrap();
    assert_eq!(back, event);
}
