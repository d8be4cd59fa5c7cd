//! Filesystem result storage for codetally.
//!
//! Each persisted analysis gets its own run folder:
//!
//! ```text
//! <results_dir>/<project>/<YYYY_MM_DD>_<suffix>/
//!     summary.json
//!     folders.txt
//!     total_files.txt
//!     code_files.txt
//!     document_files.txt
//!     other_files.txt
//! ```
//!
//! `<project>` is the sanitized last component of the analyzed root and
//! `<suffix>` counts runs of the same day: `a` through `z`, then `aa`.

mod fs_sink;
mod layout;

pub use fs_sink::{DEFAULT_RESULTS_DIR, FsResultSink, SUMMARY_FILE};
pub use layout::{project_folder_name, run_suffix, sanitize_component, suffix_index};
