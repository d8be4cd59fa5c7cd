//! Analysis configuration types.

use std::path::PathBuf;
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Method-detection profile for one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageProfile {
    /// Language tag, e.g. `"python"`.
    pub tag: String,
    /// File extensions (lowercase, no dot) handled by this profile.
    pub extensions: Vec<String>,
    /// Regular expressions; a trimmed line matching any of them counts as a method.
    pub method_patterns: Vec<String>,
    /// Regular expressions vetoing a match (control-flow lines and the like).
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    /// Lines starting with one of these (after trimming) are never counted.
    #[serde(default)]
    pub comment_prefixes: Vec<String>,
}

impl LanguageProfile {
    fn new(tag: &str, extensions: &[&str], method_patterns: &[&str]) -> Self {
        Self {
            tag: tag.to_string(),
            extensions: to_strings(extensions),
            method_patterns: to_strings(method_patterns),
            exclude_patterns: Vec::new(),
            comment_prefixes: Vec::new(),
        }
    }

    fn excluding(mut self, patterns: &[&str]) -> Self {
        self.exclude_patterns = to_strings(patterns);
        self
    }

    fn comments(mut self, prefixes: &[&str]) -> Self {
        self.comment_prefixes = to_strings(prefixes);
        self
    }
}

const C_COMMENTS: &[&str] = &["//", "/*", "*"];
const CONTROL_FLOW: &str = r"^(?:\}\s*)?(?:if|else|for|foreach|while|switch|catch|return|new|do|try|using|lock|synchronized)\b";

/// Extension tables and language profiles used by the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Extensions classified as code.
    pub code_extensions: Vec<String>,
    /// Extensions classified as documents.
    pub document_extensions: Vec<String>,
    /// Language profiles for method detection. Their extensions are code too.
    #[serde(default)]
    pub languages: Vec<LanguageProfile>,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            code_extensions: to_strings(&[
                "java", "js", "ts", "py", "cpp", "c", "h", "cs", "go", "rb", "php", "swift", "kt",
                "rs", "scala", "sh", "bash", "ps1", "sql", "html", "css", "jsx", "tsx", "vue",
                "xml", "json", "yaml", "yml", "properties",
            ]),
            document_extensions: to_strings(&["md", "txt", "rst", "adoc", "pdf", "doc", "docx"]),
            languages: default_languages(),
        }
    }
}

fn default_languages() -> Vec<LanguageProfile> {
    vec![
        LanguageProfile::new(
            "javascript",
            &["js", "jsx", "ts", "tsx"],
            &[
                r"^function[\s*]",
                r"\sfunction\s*\(",
                r"\w+\s*\([^)]*\)\s*\{",
                r"=>\s*\{",
            ],
        )
        .comments(C_COMMENTS),
        LanguageProfile::new("python", &["py"], &[r"^(?:async\s+)?def\s+\w+"]).comments(&["#"]),
        LanguageProfile::new("c", &["c", "cpp", "h", "cs"], &[r"\w+\s+\w+\s*\([^)]*\)\s*\{"])
            .excluding(&[CONTROL_FLOW])
            .comments(C_COMMENTS),
        LanguageProfile::new(
            "java",
            &["java"],
            &[r"^(?:@\w+\s+)*(?:(?:public|protected|private|static|final|abstract|synchronized|native|default)\s+)*[\w<>\[\],.?]+\s+\w+\s*\([^)]*\)\s*(?:throws\s+[\w.,\s]+)?\{?\s*$"],
        )
        .excluding(&[CONTROL_FLOW])
        .comments(C_COMMENTS),
        LanguageProfile::new(
            "rust",
            &["rs"],
            &[r#"^(?:pub(?:\([^)]*\))?\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?(?:extern\s+"[^"]*"\s+)?fn\s+\w+"#],
        )
        .comments(&["//"]),
        LanguageProfile::new("go", &["go"], &[r"^func\s"]).comments(&["//"]),
        LanguageProfile::new("ruby", &["rb"], &[r"^def\s"]).comments(&["#"]),
        LanguageProfile::new("php", &["php"], &[r"\bfunction\s+\w+\s*\("]).comments(C_COMMENTS),
        LanguageProfile::new("kotlin", &["kt"], &[r"\bfun\s+[\w.<>]+\s*\("]).comments(C_COMMENTS),
        LanguageProfile::new("swift", &["swift"], &[r"\bfunc\s+\w+"]).comments(C_COMMENTS),
        LanguageProfile::new("scala", &["scala"], &[r"\bdef\s+\w+"]).comments(C_COMMENTS),
        LanguageProfile::new(
            "shell",
            &["sh", "bash"],
            &[r"^function\s+\w+", r"^\w+\s*\(\)\s*\{?\s*$"],
        )
        .comments(&["#"]),
    ]
}

/// Rate control for per-item progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    /// Per-item events let through unbatched per interval.
    pub max_events_per_interval: u32,
    /// Length of a rate window in milliseconds.
    pub interval_ms: u64,
    /// Emit a `progress` heartbeat every this many processed files.
    pub heartbeat_every: u64,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            max_events_per_interval: 200,
            interval_ms: 100,
            heartbeat_every: 100,
        }
    }
}

impl ReporterConfig {
    /// Rate window as a duration.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Configuration for one analysis session.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct AnalysisConfig {
    /// Root directory to analyze. Config files usually leave it out and
    /// let the command line supply it.
    #[serde(default)]
    pub root: PathBuf,

    /// Include hidden entries (names starting with `.`).
    #[builder(default = "false")]
    #[serde(default)]
    pub include_hidden: bool,

    /// Directory names pruned from the walk (case-insensitive).
    #[builder(default = "default_ignored_dirs()")]
    #[serde(default = "default_ignored_dirs")]
    pub ignored_dirs: Vec<String>,

    /// Directory name prefixes pruned from the walk (case-insensitive).
    #[builder(default = "default_ignored_dir_prefixes()")]
    #[serde(default = "default_ignored_dir_prefixes")]
    pub ignored_dir_prefixes: Vec<String>,

    /// Extra glob patterns matched against entry names, e.g. `build*`.
    #[builder(default)]
    #[serde(default)]
    pub ignore_globs: Vec<String>,

    /// File extensions skipped entirely.
    #[builder(default = "default_ignored_extensions()")]
    #[serde(default = "default_ignored_extensions")]
    pub ignored_extensions: Vec<String>,

    /// File names skipped entirely.
    #[builder(default = "default_ignored_file_names()")]
    #[serde(default = "default_ignored_file_names")]
    pub ignored_file_names: Vec<String>,

    /// Extension tables and language profiles.
    #[builder(default)]
    #[serde(default)]
    pub classification: ClassificationConfig,

    /// Progress event rate control.
    #[builder(default)]
    #[serde(default)]
    pub reporter: ReporterConfig,

    /// Maximum paths kept per category for the saved listing.
    #[builder(default = "default_max_listed_paths()")]
    #[serde(default = "default_max_listed_paths")]
    pub max_listed_paths: usize,

    /// Upper bound on time spent persisting the result, in seconds.
    #[builder(default = "default_persist_timeout_secs()")]
    #[serde(default = "default_persist_timeout_secs")]
    pub persist_timeout_secs: u64,
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_ignored_dirs() -> Vec<String> {
    to_strings(&[
        "target",
        ".github",
        ".idea",
        ".vscode",
        "code_counter_results",
        "data",
        ".venv",
        "venv",
        "env",
        "__pycache__",
        "site-packages",
        ".husky",
        ".pytest_cache",
        "chroma",
        "chroma_data",
        "lucene-indices",
        ".cache",
        "models",
        "assistant-proceed-extension",
        "node_modules",
    ])
}

fn default_ignored_dir_prefixes() -> Vec<String> {
    to_strings(&[".venv", "venv"])
}

fn default_ignored_extensions() -> Vec<String> {
    to_strings(&["idx", "db", "iml", "log", "bak"])
}

fn default_ignored_file_names() -> Vec<String> {
    to_strings(&[".gitignore"])
}

fn default_max_listed_paths() -> usize {
    100_000
}

fn default_persist_timeout_secs() -> u64 {
    30
}

impl AnalysisConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.root {
            Some(ref root) if root.as_os_str().is_empty() => {
                return Err("Root path cannot be empty".to_string());
            }
            None => return Err("Root path is required".to_string()),
            _ => {}
        }
        if let Some(reporter) = self.reporter {
            if reporter.max_events_per_interval == 0 {
                return Err("max_events_per_interval must be greater than zero".to_string());
            }
        }
        Ok(())
    }
}

impl AnalysisConfig {
    /// Create a new config builder.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::default()
    }

    /// Create a config with default tables for `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            include_hidden: false,
            ignored_dirs: default_ignored_dirs(),
            ignored_dir_prefixes: default_ignored_dir_prefixes(),
            ignore_globs: Vec::new(),
            ignored_extensions: default_ignored_extensions(),
            ignored_file_names: default_ignored_file_names(),
            classification: ClassificationConfig::default(),
            reporter: ReporterConfig::default(),
            max_listed_paths: default_max_listed_paths(),
            persist_timeout_secs: default_persist_timeout_secs(),
        }
    }

    /// Same configuration, different root.
    pub fn with_root(&self, root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..self.clone()
        }
    }

    /// Persistence timeout as a duration.
    pub fn persist_timeout(&self) -> Duration {
        Duration::from_secs(self.persist_timeout_secs)
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::new(".")
    }
}
