//! Trace sources: delimited-text files and in-memory playback.
//!
//! A trace source hands the pipeline one fully materialized set of
//! equal-length channels per call. File reads go through an explicit
//! [`TraceCache`] keyed by path and column selection; there is no implicit
//! process-wide cache, and invalidation is a method call away. File reads
//! are never retried — transient failures surface to the caller.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::BifmapError;

/// One synchronously sampled acquisition: a drive trace plus the measured
/// response channels, all of equal length.
#[derive(Debug, Clone, Default)]
pub struct TraceSet {
    pub drive: Vec<f64>,
    pub responses: Vec<Vec<f64>>,
}

impl TraceSet {
    pub fn new(drive: Vec<f64>, responses: Vec<Vec<f64>>) -> Self {
        Self { drive, responses }
    }

    /// Check that every response channel matches the drive length.
    pub fn validate(&self) -> Result<(), BifmapError> {
        for (channel, response) in self.responses.iter().enumerate() {
            if response.len() != self.drive.len() {
                return Err(BifmapError::TraceLengthMismatch {
                    drive: self.drive.len(),
                    channel,
                    response: response.len(),
                });
            }
        }
        Ok(())
    }

    pub fn num_samples(&self) -> usize {
        self.drive.len()
    }

    pub fn num_channels(&self) -> usize {
        self.responses.len()
    }
}

/// Something that can yield acquisitions on demand: a parsed file, a live
/// instrument, or canned test data.
pub trait TraceSource {
    fn get_data(&mut self) -> Result<TraceSet, BifmapError>;
}

/// Explicit cache of parsed file columns, keyed by path and column set.
#[derive(Debug, Default)]
pub struct TraceCache {
    entries: HashMap<(PathBuf, Vec<usize>), Arc<Vec<Vec<f64>>>>,
}

impl TraceCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, path: &Path, columns: &[usize]) -> Option<Arc<Vec<Vec<f64>>>> {
        self.entries
            .get(&(path.to_path_buf(), columns.to_vec()))
            .cloned()
    }

    fn insert(&mut self, path: &Path, columns: &[usize], data: Arc<Vec<Vec<f64>>>) {
        self.entries
            .insert((path.to_path_buf(), columns.to_vec()), data);
    }

    /// Drop every cached read.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn read_columns(path: &Path, columns: &[usize]) -> Result<Vec<Vec<f64>>, BifmapError> {
    let text = fs::read_to_string(path).map_err(|source| BifmapError::TraceIo {
        path: path.to_path_buf(),
        source,
    })?;

    let mut parsed = vec![Vec::new(); columns.len()];
    for (row, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        for (slot, &column) in columns.iter().enumerate() {
            let raw = fields.get(column).ok_or(BifmapError::MissingColumn {
                path: path.to_path_buf(),
                row,
                fields: fields.len(),
                column,
            })?;
            let value: f64 = raw.trim().parse().map_err(|_| BifmapError::MalformedRow {
                path: path.to_path_buf(),
                row,
                column,
            })?;
            parsed[slot].push(value);
        }
    }
    Ok(parsed)
}

/// Trace source backed by a comma-delimited text file.
///
/// Columns are selected by index; the first selected column is the drive
/// channel and the rest are responses. Parsed columns are cached under the
/// (path, column set) key, so repeated reads of the same selection are free
/// until the cache is cleared.
pub struct CsvTraceSource {
    path: PathBuf,
    columns: Vec<usize>,
    cache: TraceCache,
}

impl CsvTraceSource {
    pub fn new(path: impl Into<PathBuf>, columns: Vec<usize>) -> Self {
        Self::with_cache(path, columns, TraceCache::new())
    }

    /// Use a caller-provided cache, e.g. one shared across several sources.
    pub fn with_cache(path: impl Into<PathBuf>, columns: Vec<usize>, cache: TraceCache) -> Self {
        Self {
            path: path.into(),
            columns,
            cache,
        }
    }

    pub fn cache(&self) -> &TraceCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut TraceCache {
        &mut self.cache
    }
}

impl TraceSource for CsvTraceSource {
    fn get_data(&mut self) -> Result<TraceSet, BifmapError> {
        let columns = match self.cache.get(&self.path, &self.columns) {
            Some(hit) => {
                log::debug!("cache hit for {:?} columns {:?}", self.path, self.columns);
                hit
            }
            None => {
                log::debug!("reading {:?} columns {:?}", self.path, self.columns);
                let data = Arc::new(read_columns(&self.path, &self.columns)?);
                self.cache.insert(&self.path, &self.columns, data.clone());
                data
            }
        };

        let mut iter = columns.iter();
        let drive = iter.next().cloned().unwrap_or_default();
        let set = TraceSet::new(drive, iter.cloned().collect());
        set.validate()?;
        Ok(set)
    }
}

/// In-memory source for tests and deterministic playback. Yields its queued
/// trace sets in order; a drained queue signals a disconnect, like an
/// unplugged instrument.
pub struct MemoryTraceSource {
    queue: VecDeque<TraceSet>,
}

impl MemoryTraceSource {
    pub fn new(sets: impl IntoIterator<Item = TraceSet>) -> Self {
        Self {
            queue: sets.into_iter().collect(),
        }
    }
}

impl TraceSource for MemoryTraceSource {
    fn get_data(&mut self) -> Result<TraceSet, BifmapError> {
        self.queue.pop_front().ok_or(BifmapError::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    struct TempCsv {
        path: PathBuf,
    }

    impl TempCsv {
        fn new(name: &str, contents: &str) -> Self {
            let path = std::env::temp_dir().join(format!(
                "bifmap-{}-{}",
                std::process::id(),
                name
            ));
            let mut file = fs::File::create(&path).unwrap();
            file.write_all(contents.as_bytes()).unwrap();
            Self { path }
        }
    }

    impl Drop for TempCsv {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.path);
        }
    }

    #[test]
    fn test_csv_column_selection() {
        let csv = TempCsv::new("cols.csv", "0.0,10.0,100.0\n1.0,20.0,200.0\n2.0,30.0,300.0\n");
        let mut source = CsvTraceSource::new(&csv.path, vec![0, 2]);
        let set = source.get_data().unwrap();
        assert_eq!(set.drive, vec![0.0, 1.0, 2.0]);
        assert_eq!(set.responses, vec![vec![100.0, 200.0, 300.0]]);
    }

    #[test]
    fn test_csv_cache_hit_and_clear() {
        let csv = TempCsv::new("cache.csv", "1.0,2.0\n");
        let mut source = CsvTraceSource::new(&csv.path, vec![0, 1]);
        source.get_data().unwrap();
        assert_eq!(source.cache().len(), 1);

        // The cached parse masks the rewritten file until the cache clears.
        fs::write(&csv.path, "9.0,9.0\n").unwrap();
        assert_eq!(source.get_data().unwrap().drive, vec![1.0]);
        source.cache_mut().clear();
        assert_eq!(source.get_data().unwrap().drive, vec![9.0]);
    }

    #[test]
    fn test_csv_malformed_row() {
        let csv = TempCsv::new("bad.csv", "1.0,2.0\n1.0,oops\n");
        let mut source = CsvTraceSource::new(&csv.path, vec![0, 1]);
        let err = source.get_data().unwrap_err();
        assert!(matches!(err, BifmapError::MalformedRow { row: 1, .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn test_csv_missing_column() {
        let csv = TempCsv::new("short.csv", "1.0,2.0\n");
        let mut source = CsvTraceSource::new(&csv.path, vec![0, 5]);
        assert!(matches!(
            source.get_data().unwrap_err(),
            BifmapError::MissingColumn { column: 5, .. }
        ));
    }

    #[test]
    fn test_csv_unreadable_file() {
        let mut source = CsvTraceSource::new("/nonexistent/trace.csv", vec![0]);
        let err = source.get_data().unwrap_err();
        assert!(matches!(err, BifmapError::TraceIo { .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn test_memory_source_drains_then_disconnects() {
        let set = TraceSet::new(vec![1.0], vec![vec![2.0]]);
        let mut source = MemoryTraceSource::new([set.clone(), set]);
        assert!(source.get_data().is_ok());
        assert!(source.get_data().is_ok());
        assert!(matches!(
            source.get_data().unwrap_err(),
            BifmapError::Disconnected
        ));
    }

    #[test]
    fn test_trace_set_validation() {
        let set = TraceSet::new(vec![1.0, 2.0], vec![vec![1.0]]);
        assert!(matches!(
            set.validate().unwrap_err(),
            BifmapError::TraceLengthMismatch {
                drive: 2,
                channel: 0,
                response: 1
            }
        ));
    }
}
