//! [`ResultSink`] writing run folders to the local filesystem.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate};
use serde::Serialize;
use tracing::{debug, info};

use codetally_core::{AnalysisResult, FileListing, PersistError, ResultHandle, ResultSink};

use crate::layout::{project_folder_name, run_suffix, suffix_index};

/// Results directory used when none is configured.
pub const DEFAULT_RESULTS_DIR: &str = "code_counter_results";

/// Name of the JSON summary inside a run folder.
pub const SUMMARY_FILE: &str = "summary.json";

/// How many run folders to try when another writer races us for a name.
const MAX_CREATE_ATTEMPTS: u32 = 16;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Summary<'a> {
    #[serde(flatten)]
    result: &'a AnalysisResult,
    saved_at: DateTime<Local>,
    listing_truncated: bool,
}

/// Persists results under a base directory, one run folder per call.
#[derive(Debug, Clone)]
pub struct FsResultSink {
    results_dir: PathBuf,
}

impl FsResultSink {
    /// Create a sink writing below `results_dir`.
    pub fn new(results_dir: impl Into<PathBuf>) -> Self {
        Self {
            results_dir: results_dir.into(),
        }
    }

    /// Base directory for all projects.
    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// Persist as if today were `date`.
    pub fn persist_on(
        &self,
        date: NaiveDate,
        result: &AnalysisResult,
        listing: &FileListing,
    ) -> Result<ResultHandle, PersistError> {
        let project_dir = self.results_dir.join(project_folder_name(&result.path));
        fs::create_dir_all(&project_dir).map_err(|e| PersistError::io(&project_dir, e))?;

        let run_dir = create_run_dir(&project_dir, &date.format("%Y_%m_%d").to_string())?;
        debug!(path = %run_dir.display(), "Created run folder");

        let mut saved_files = Vec::with_capacity(6);
        saved_files.push(write_summary(&run_dir, result, listing)?);
        for (name, paths) in [
            ("folders.txt", &listing.folders),
            ("total_files.txt", &listing.files),
            ("code_files.txt", &listing.code_files),
            ("document_files.txt", &listing.document_files),
            ("other_files.txt", &listing.other_files),
        ] {
            saved_files.push(write_list(&run_dir.join(name), paths)?);
        }

        info!(path = %run_dir.display(), "Saved analysis results");
        Ok(ResultHandle {
            results_path: run_dir,
            saved_files,
        })
    }
}

impl Default for FsResultSink {
    fn default() -> Self {
        Self::new(DEFAULT_RESULTS_DIR)
    }
}

impl ResultSink for FsResultSink {
    fn persist(
        &self,
        result: &AnalysisResult,
        listing: &FileListing,
    ) -> Result<ResultHandle, PersistError> {
        self.persist_on(Local::now().date_naive(), result, listing)
    }

    fn discard(&self, handle: &ResultHandle) -> Result<(), PersistError> {
        let path = &handle.results_path;
        if !path.starts_with(&self.results_dir) {
            return Err(PersistError::Other {
                message: format!("{} is not under {}", path.display(), self.results_dir.display()),
            });
        }
        fs::remove_dir_all(path).map_err(|e| PersistError::io(path, e))?;
        debug!(path = %path.display(), "Removed run folder");
        Ok(())
    }
}

/// Highest run index already used for `date_prefix` in `project_dir`.
fn last_run_index(project_dir: &Path, date_prefix: &str) -> io::Result<u64> {
    let mut last = 0;
    for entry in fs::read_dir(project_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let index = name
            .to_str()
            .and_then(|n| n.strip_prefix(date_prefix))
            .and_then(|rest| rest.strip_prefix('_'))
            .and_then(suffix_index);
        if let Some(index) = index {
            last = last.max(index);
        }
    }
    Ok(last)
}

fn create_run_dir(project_dir: &Path, date_prefix: &str) -> Result<PathBuf, PersistError> {
    let mut index =
        last_run_index(project_dir, date_prefix).map_err(|e| PersistError::io(project_dir, e))?;

    for _ in 0..MAX_CREATE_ATTEMPTS {
        index += 1;
        let run_dir = project_dir.join(format!("{date_prefix}_{}", run_suffix(index)));
        match fs::create_dir(&run_dir) {
            Ok(()) => return Ok(run_dir),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(PersistError::io(&run_dir, e)),
        }
    }

    Err(PersistError::Other {
        message: format!(
            "Could not claim a run folder in {} after {MAX_CREATE_ATTEMPTS} attempts",
            project_dir.display()
        ),
    })
}

fn write_summary(
    run_dir: &Path,
    result: &AnalysisResult,
    listing: &FileListing,
) -> Result<PathBuf, PersistError> {
    let path = run_dir.join(SUMMARY_FILE);
    let summary = Summary {
        result,
        saved_at: Local::now(),
        listing_truncated: listing.truncated,
    };
    let json = serde_json::to_string_pretty(&summary)?;
    fs::write(&path, json).map_err(|e| PersistError::io(&path, e))?;
    Ok(path)
}

fn write_list(path: &Path, paths: &[PathBuf]) -> Result<PathBuf, PersistError> {
    let write = || -> io::Result<()> {
        let mut out = BufWriter::new(fs::File::create(path)?);
        for entry in paths {
            writeln!(out, "{}", entry.display())?;
        }
        out.flush()
    };
    write().map_err(|e| PersistError::io(path, e))?;
    Ok(path.to_path_buf())
}
