use std::fmt;
use std::env::VarError;
use std::io::Error;
use std::path::{Path, PathBuf};

use polars::error::PolarsError;

use crate::dataset::DatasetName;
use crate::dispatch::Bins;

// Errors surfaced to the user as plain text. Load problems halt the dashboard,
// everything else is scoped to a single view (see `dispatch::ViewResult`).
#[derive(Debug)]
pub enum DVError {
    IoError(Error),
    PolarsError(PolarsError),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
    InvalidPath(String),
    InvalidBins(usize),
    DatasetsUnavailable(Vec<LoadFailure>),
}

impl From<Error> for DVError {
    fn from(err: Error) -> Self {
        DVError::IoError(err)
    }
}

impl From<PolarsError> for DVError {
    fn from(err: PolarsError) -> Self {
        DVError::PolarsError(err)
    }
}

impl fmt::Display for DVError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DVError::IoError(e) => write!(f, "I/O error: {e}"),
            DVError::PolarsError(e) => write!(f, "Could not read table: {e}"),
            DVError::LoadingFailed(reason) => write!(f, "Loading failed: {reason}"),
            DVError::FileNotFound => write!(f, "File not found"),
            DVError::PermissionDenied => write!(f, "Permission denied"),
            DVError::UnknownFileType => write!(f, "Unknown file type"),
            DVError::InvalidPath(reason) => write!(f, "Invalid path: {reason}"),
            DVError::InvalidBins(bins) => write!(
                f,
                "Invalid bin count {bins}, expected {} to {}",
                Bins::MIN,
                Bins::MAX
            ),
            DVError::DatasetsUnavailable(failures) => {
                writeln!(
                    f,
                    "{} of {} datasets could not be loaded. Check the file paths.",
                    failures.len(),
                    DatasetName::ALL.len()
                )?;
                for failure in failures {
                    writeln!(f, "  {failure}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for DVError {}

/// One dataset that failed to load, kept for the aggregate startup error.
#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub dataset: DatasetName,
    pub path: PathBuf,
    pub message: String,
}

impl fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({})",
            self.dataset,
            self.path.display(),
            self.message
        )
    }
}

#[derive(Debug, Clone)]
pub struct DatasetPaths {
    pub cust: PathBuf,
    pub claim: PathBuf,
    pub cntt: PathBuf,
}

impl DatasetPaths {
    pub fn get(&self, name: DatasetName) -> &Path {
        match name {
            DatasetName::Cust => &self.cust,
            DatasetName::Claim => &self.claim,
            DatasetName::Cntt => &self.cntt,
        }
    }
}

impl Default for DatasetPaths {
    fn default() -> Self {
        Self {
            cust: PathBuf::from("data/cust.csv"),
            claim: PathBuf::from("data/claim.csv"),
            cntt: PathBuf::from("data/cntt.csv"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DVConfig {
    pub paths: DatasetPaths,
    pub initial_dataset: DatasetName,
    /// Histogram bins a session starts with.
    pub bins: Bins,
    pub event_poll_time: u64,
    pub max_column_width: usize,
    pub log_file: PathBuf,
}

impl Default for DVConfig {
    fn default() -> Self {
        Self {
            paths: DatasetPaths::default(),
            initial_dataset: DatasetName::Cust,
            bins: Bins::default(),
            event_poll_time: 100,
            max_column_width: 24,
            log_file: PathBuf::from("dv.log"),
        }
    }
}

/// Expand `~` and environment variables in a user supplied path.
pub fn expand_path(raw: &str) -> Result<PathBuf, DVError> {
    expand_path_with(raw, |var| std::env::var(var).ok())
}

fn expand_path_with<F>(raw: &str, mut lookup: F) -> Result<PathBuf, DVError>
where
    F: FnMut(&str) -> Option<String>,
{
    let with_vars = shellexpand::env_with_context(raw, |var| {
        lookup(var).map(Some).ok_or(VarError::NotPresent)
    })
    .map_err(|e| DVError::InvalidPath(e.to_string()))?;
    Ok(PathBuf::from(shellexpand::tilde(with_vars.as_ref()).as_ref()))
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    Help,
    Exit,
    NextDataset,
    PrevDataset,
    SelectDataset(DatasetName),
    NextView,
    PrevView,
    NextColumn,
    PrevColumn,
    NextGroup,
    PrevGroup,
    MoreBins,
    FewerBins,
    Trigger,
}

pub const HELP_TEXT: &str = "\
Tab / Shift-Tab   next / previous dataset
1 2 3             select CUST / CLAIM / CNTT
v / V             next / previous view
Right / Left      next / previous column
Down / Up         next / previous group column
+ / -             more / fewer histogram bins
Enter             compute grouped means
?                 toggle this help
Esc               close popup
q                 quit";
