use polars::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, trace};
use tracing_error::SpanTrace;

use crate::domain::DVError;

#[derive(Debug, Clone, Copy, PartialEq)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

#[derive(Debug)]
struct FileInfo {
    path: PathBuf,
    file_size: u64,
    file_type: FileType,
}

/// Reads tables from disk and keeps every successfully loaded table for the
/// lifetime of the loader. Source files are assumed not to change while a
/// session runs, so there is no invalidation besides `reset`.
#[derive(Default)]
pub struct Loader {
    cache: HashMap<PathBuf, Arc<DataFrame>>,
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the table at `path`, or return the cached one.
    /// Failures are not cached, a later call reads the file again.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(&mut self, path: &Path) -> Result<Arc<DataFrame>, DVError> {
        if let Some(table) = self.cache.get(path) {
            trace!("Cache hit");
            return Ok(Arc::clone(table));
        }

        match Self::read_table(path) {
            Ok(table) => {
                let table = Arc::new(table);
                self.cache.insert(path.to_path_buf(), Arc::clone(&table));
                Ok(table)
            }
            Err(e) => {
                error!("Loading failed: {e}\n{}", SpanTrace::capture());
                Err(e)
            }
        }
    }

    pub fn is_cached(&self, path: &Path) -> bool {
        self.cache.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Forget every cached table.
    pub fn reset(&mut self) {
        debug!("Dropping {} cached tables", self.cache.len());
        self.cache.clear();
    }

    fn read_table(path: &Path) -> Result<DataFrame, DVError> {
        let file_info = Self::get_file_info(path)?;
        let start_time = Instant::now();

        let frame = match file_info.file_type {
            FileType::CSV => Self::load_csv(&file_info.path)?,
            FileType::PARQUET => Self::load_parquet(&file_info.path)?,
            FileType::ARROW => Self::load_arrow(&file_info.path)?,
        };
        let df = frame.collect()?;

        info!(
            "Loaded {} rows x {} columns ({} bytes) in {}ms",
            df.height(),
            df.width(),
            file_info.file_size,
            start_time.elapsed().as_millis()
        );
        for column in df.get_columns() {
            debug!("Column \"{}\": {:?}", column.name(), column.dtype());
        }
        Ok(df)
    }

    fn get_file_info(path: &Path) -> Result<FileInfo, DVError> {
        let metadata = fs::metadata(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => DVError::FileNotFound,
            ErrorKind::PermissionDenied => DVError::PermissionDenied,
            _ => DVError::IoError(e),
        })?;
        if !metadata.is_file() {
            return Err(DVError::LoadingFailed("Not a file!".into()));
        }

        Ok(FileInfo {
            path: path.to_path_buf(),
            file_size: metadata.len(),
            file_type: Self::detect_file_type(path)?,
        })
    }

    fn detect_file_type(path: &Path) -> Result<FileType, DVError> {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_uppercase())
            .as_deref()
        {
            Some("CSV") => Ok(FileType::CSV),
            Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
            Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
            _ => Err(DVError::UnknownFileType),
        }
    }

    // Schema inference scans the whole file: a column only becomes numeric if
    // every non-empty field parses as a number. Empty fields are read as null.
    fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyCsvReader::new(PlPath::Local(path.into()))
            .with_has_header(true)
            .with_infer_schema_length(None)
            .finish()
    }

    fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
    }

    fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_ipc(
            PlPath::Local(path.into()),
            polars::io::ipc::IpcScanOptions,
            UnifiedScanArgs::default(),
        )
    }
}
