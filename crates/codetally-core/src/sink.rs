//! Persistence seam for finished analyses.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::PersistError;
use crate::event::SavedResults;
use crate::model::{AnalysisResult, FileListing};

/// Reference to a persisted result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultHandle {
    /// Location of the persisted result.
    pub results_path: PathBuf,
    /// Files written under `results_path`.
    pub saved_files: Vec<PathBuf>,
}

impl ResultHandle {
    /// Payload for the `saved` event.
    pub fn to_saved(&self) -> SavedResults {
        SavedResults {
            results_path: self.results_path.display().to_string(),
            saved_files: self
                .saved_files
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
        }
    }
}

/// Durable storage for analysis results.
///
/// Called from a blocking context; implementations may do synchronous I/O.
pub trait ResultSink: Send + Sync {
    /// Persist `result` and its path listing, returning where it went.
    fn persist(
        &self,
        result: &AnalysisResult,
        listing: &FileListing,
    ) -> Result<ResultHandle, PersistError>;

    /// Remove a result persisted too late to be reported.
    fn discard(&self, handle: &ResultHandle) -> Result<(), PersistError> {
        let _ = handle;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_saved() {
        let handle = ResultHandle {
            results_path: PathBuf::from("/results/proj/2024_01_02_a"),
            saved_files: vec![PathBuf::from("/results/proj/2024_01_02_a/summary.json")],
        };
        let saved = handle.to_saved();
        assert_eq!(saved.results_path, "/results/proj/2024_01_02_a");
        assert_eq!(saved.saved_files.len(), 1);
    }
}
