//! Line and method counting.
//!
//! Method detection is a lexical heuristic: each trimmed line is matched
//! against per-language patterns and every matching line counts once. It
//! over-counts shapes like `if (x) {` in the JavaScript profile, misses
//! signatures split across lines, and counts one-line lambdas in some
//! languages. That is accepted; nothing here parses source code.

use std::fs::File;
use std::io::{self, BufRead, BufReader, ErrorKind, Read};
use std::path::Path;

use regex::RegexSet;

use codetally_core::{
    AnalysisError, Category, ClassificationConfig, FileClass, FileMetrics, LanguageProfile,
};

const READ_CHUNK: usize = 64 * 1024;

/// Bytes of each line kept for method matching.
const MATCHED_PREFIX: usize = 4 * 1024;

/// Compiled method patterns for one language profile.
#[derive(Debug, Clone)]
pub struct MethodHeuristic {
    patterns: RegexSet,
    excludes: RegexSet,
    comment_prefixes: Vec<String>,
}

impl MethodHeuristic {
    /// Compile a profile.
    pub fn new(profile: &LanguageProfile) -> Result<Self, AnalysisError> {
        let invalid = |e: regex::Error| AnalysisError::InvalidConfig {
            message: format!("bad method pattern for '{}': {e}", profile.tag),
        };
        Ok(Self {
            patterns: RegexSet::new(&profile.method_patterns).map_err(invalid)?,
            excludes: RegexSet::new(&profile.exclude_patterns).map_err(invalid)?,
            comment_prefixes: profile.comment_prefixes.clone(),
        })
    }

    /// Whether `line` looks like a method or function declaration.
    pub fn matches(&self, line: &str) -> bool {
        let trimmed = line.trim();
        if trimmed.is_empty() || self.is_comment(trimmed) {
            return false;
        }
        self.patterns.is_match(trimmed) && !self.excludes.is_match(trimmed)
    }

    fn is_comment(&self, trimmed: &str) -> bool {
        self.comment_prefixes
            .iter()
            .any(|prefix| trimmed.starts_with(prefix.as_str()))
    }
}

/// Computes [`FileMetrics`] for classified files.
#[derive(Debug, Clone)]
pub struct MetricExtractor {
    heuristics: Vec<MethodHeuristic>,
}

impl MetricExtractor {
    /// Compile every language profile in `config`.
    pub fn new(config: &ClassificationConfig) -> Result<Self, AnalysisError> {
        let heuristics = config
            .languages
            .iter()
            .map(MethodHeuristic::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { heuristics })
    }

    /// Measure the file at `path`.
    ///
    /// `Other` files are never opened. The handle is dropped before returning.
    pub fn extract(&self, path: &Path, class: FileClass) -> io::Result<FileMetrics> {
        if !class.category.counts_lines() {
            return Ok(FileMetrics::default());
        }
        let file = File::open(path)?;
        self.extract_from(BufReader::with_capacity(READ_CHUNK, file), class)
    }

    /// Measure content from any buffered reader.
    pub fn extract_from<R: BufRead>(&self, reader: R, class: FileClass) -> io::Result<FileMetrics> {
        match (class.category, self.heuristic(class)) {
            (Category::Code, Some(heuristic)) => count_with_methods(reader, heuristic),
            (Category::Code | Category::Document, _) => Ok(FileMetrics::new(count_lines(reader)?, 0)),
            _ => Ok(FileMetrics::default()),
        }
    }

    fn heuristic(&self, class: FileClass) -> Option<&MethodHeuristic> {
        class.language.and_then(|index| self.heuristics.get(index))
    }
}

/// Count lines: one per `\n`, plus one for trailing content without a
/// terminator. Empty input has zero lines. Reads in fixed-size chunks.
pub fn count_lines<R: Read>(mut reader: R) -> io::Result<u64> {
    let mut buf = vec![0u8; READ_CHUNK];
    let mut lines = 0u64;
    let mut last = None;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        lines += buf[..n].iter().filter(|&&b| b == b'\n').count() as u64;
        last = Some(buf[n - 1]);
    }
    if last.is_some_and(|b| b != b'\n') {
        lines += 1;
    }
    Ok(lines)
}

fn count_with_methods<R: Read>(mut reader: R, heuristic: &MethodHeuristic) -> io::Result<FileMetrics> {
    let mut buf = vec![0u8; READ_CHUNK];
    // Only a bounded prefix of each line is matched; the rest is counted and dropped.
    let mut line = Vec::with_capacity(MATCHED_PREFIX);
    let mut open = false;
    let mut metrics = FileMetrics::default();

    let end_line = |line: &mut Vec<u8>, metrics: &mut FileMetrics| {
        metrics.lines += 1;
        if heuristic.matches(&String::from_utf8_lossy(line)) {
            metrics.methods += 1;
        }
        line.clear();
    };

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        for segment in buf[..n].split_inclusive(|&b| b == b'\n') {
            let (content, terminated) = match segment.split_last() {
                Some((b'\n', rest)) => (rest, true),
                _ => (segment, false),
            };
            let room = MATCHED_PREFIX - line.len();
            line.extend_from_slice(&content[..content.len().min(room)]);
            if terminated {
                end_line(&mut line, &mut metrics);
                open = false;
            } else {
                open = true;
            }
        }
    }
    if open {
        end_line(&mut line, &mut metrics);
    }
    Ok(metrics)
}
