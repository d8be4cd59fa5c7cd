//! codetally - streaming code and document metrics for directory trees.
//!
//! Usage:
//!   tally stream [PATH]      Stream progress events (SSE or NDJSON) to stdout
//!   tally analyze [PATH]     Analyze and print the final totals
//!   tally --help             Show help

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, eyre};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use codetally_core::{AnalysisConfig, ProgressEvent, ResultSink};
use codetally_scan::{Analyzer, start_analysis};
use codetally_store::{DEFAULT_RESULTS_DIR, FsResultSink};

#[derive(Parser)]
#[command(
    name = "codetally",
    version,
    about = "Streaming code and document metrics for large directory trees",
    long_about = "codetally counts folders, files, lines and methods under a directory.\n\n\
                  `tally stream` walks the tree twice, first to fix the totals and then \
                  to report progress against them as a live event stream."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stream progress events for an analysis
    Stream {
        /// Path to analyze
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Wire format for events
        #[arg(short, long, default_value = "sse")]
        format: StreamFormat,

        /// Directory where results are saved
        #[arg(short, long, default_value = DEFAULT_RESULTS_DIR)]
        results_dir: PathBuf,

        /// Do not save results
        #[arg(long)]
        no_save: bool,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Analyze and print the final result
    Analyze {
        /// Path to analyze
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(Args)]
struct ConfigArgs {
    /// TOML file overriding the default tables
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Include hidden files and directories
    #[arg(short = 'H', long)]
    include_hidden: bool,

    /// Extra glob of names to ignore (repeatable)
    #[arg(short, long = "ignore", value_name = "GLOB")]
    ignore: Vec<String>,

    /// Per-item events let through per rate window before coalescing
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_events: Option<u32>,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum StreamFormat {
    #[default]
    Sse,
    Ndjson,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    // stdout carries the event stream; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Stream {
            path,
            format,
            results_dir,
            no_save,
            config,
        } => {
            let config = load_config(&config, &path)?;
            let sink: Option<Arc<dyn ResultSink>> =
                (!no_save).then(|| Arc::new(FsResultSink::new(results_dir)) as Arc<dyn ResultSink>);
            run_stream(config, sink, format)?;
        }
        Command::Analyze {
            path,
            format,
            config,
        } => {
            run_analyze(load_config(&config, &path)?, format)?;
        }
    }

    Ok(())
}

/// Build the session config from an optional file plus flags.
fn load_config(args: &ConfigArgs, path: &Path) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(file) => {
            let text = std::fs::read_to_string(file)
                .wrap_err_with(|| format!("Failed to read config {}", file.display()))?;
            toml::from_str::<AnalysisConfig>(&text)
                .wrap_err_with(|| format!("Invalid config {}", file.display()))?
        }
        None => AnalysisConfig::default(),
    };

    config.root = path.to_path_buf();
    config.include_hidden |= args.include_hidden;
    config.ignore_globs.extend(args.ignore.iter().cloned());
    if let Some(max) = args.max_events {
        config.reporter.max_events_per_interval = max;
    }
    debug!(root = %config.root.display(), file = ?args.config, "Loaded configuration");
    Ok(config)
}

/// Stream events to stdout until the session ends or stdout closes.
fn run_stream(
    config: AnalysisConfig,
    sink: Option<Arc<dyn ResultSink>>,
    format: StreamFormat,
) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;

    let failure = runtime.block_on(async move {
        let mut rx = start_analysis(config, sink, CancellationToken::new());
        let stdout = io::stdout();
        let mut failure = None;

        while let Some(event) = rx.recv().await {
            let frame = match format {
                StreamFormat::Sse => event.to_sse()?,
                StreamFormat::Ndjson => event.to_json_line()?,
            };

            let mut out = stdout.lock();
            match out.write_all(frame.as_bytes()).and_then(|()| out.flush()) {
                Ok(()) => {}
                // Reader went away; dropping the receiver stops the walk
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => break,
                Err(e) => return Err(e).context("Failed to write event"),
            }

            if let ProgressEvent::Error { message } = event {
                failure = Some(message);
            }
        }
        Ok::<_, color_eyre::Report>(failure)
    })?;

    match failure {
        Some(message) => Err(eyre!("Analysis failed: {message}")),
        None => Ok(()),
    }
}

/// Run a one-shot analysis and print the result.
fn run_analyze(config: AnalysisConfig, format: OutputFormat) -> Result<()> {
    let root = config.root.clone();
    let analyzer = Analyzer::new(config).context("Invalid configuration")?;

    eprintln!("Analyzing {}...", root.display());
    let result = analyzer.analyze().context("Analysis failed")?;

    match format {
        OutputFormat::Text => {
            let t = &result.totals;
            println!();
            println!("{}", "─".repeat(60));
            println!(" {}", result.path.display());
            println!("{}", "─".repeat(60));
            println!(" {:<16} {:>12}", "Folders", t.total_folders);
            println!(
                " {:<16} {:>12}  ({} code, {} document, {} other)",
                "Files", t.total_files, t.total_code_files, t.total_doc_files, t.total_other_files
            );
            println!(
                " {:<16} {:>12}  ({} code, {} document)",
                "Lines", t.total_lines, t.total_code_lines, t.total_doc_lines
            );
            println!(" {:<16} {:>12}", "Methods", t.total_methods);
            println!("{}", "─".repeat(60));

            if result.skipped_entries > 0 {
                println!();
                println!("{} entries could not be read", result.skipped_entries);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
