use polars::prelude::*;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::{DVConfig, DVError, LoadFailure};
use crate::loader::Loader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum DatasetName {
    Cust,
    Claim,
    Cntt,
}

impl DatasetName {
    pub const ALL: [DatasetName; 3] = [DatasetName::Cust, DatasetName::Claim, DatasetName::Cntt];

    pub fn index(self) -> usize {
        match self {
            DatasetName::Cust => 0,
            DatasetName::Claim => 1,
            DatasetName::Cntt => 2,
        }
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DatasetName::Cust => "CUST",
            DatasetName::Claim => "CLAIM",
            DatasetName::Cntt => "CNTT",
        };
        f.write_str(name)
    }
}

/// Column names of a table split by type, both in original column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnSet {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
}

impl ColumnSet {
    pub fn from_frame(df: &DataFrame) -> Self {
        let mut columns = ColumnSet::default();
        for column in df.get_columns() {
            let name = column.name().to_string();
            if is_numeric_type(column.dtype()) {
                columns.numeric.push(name);
            } else {
                columns.categorical.push(name);
            }
        }
        columns
    }

    #[cfg(test)]
    pub fn is_numeric(&self, name: &str) -> bool {
        self.numeric.iter().any(|c| c == name)
    }

    #[cfg(test)]
    pub fn is_categorical(&self, name: &str) -> bool {
        self.categorical.iter().any(|c| c == name)
    }
}

pub fn is_numeric_type(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// The active table together with its column partition.
#[derive(Debug, Clone)]
pub struct Selection {
    pub name: DatasetName,
    pub table: Arc<DataFrame>,
    pub columns: ColumnSet,
}

/// All three tables. Only exists if every one of them loaded.
#[derive(Debug, Clone)]
pub struct Datasets {
    cust: Arc<DataFrame>,
    claim: Arc<DataFrame>,
    cntt: Arc<DataFrame>,
}

impl Datasets {
    /// Load every configured path. A failing path does not stop the others
    /// from being read; all failures are reported together.
    pub fn load(loader: &mut Loader, config: &DVConfig) -> Result<Self, DVError> {
        let mut tables = Vec::with_capacity(DatasetName::ALL.len());
        let mut failures = Vec::new();

        for name in DatasetName::ALL {
            let path = config.paths.get(name);
            match loader.load(path) {
                Ok(table) => tables.push(table),
                Err(e) => {
                    warn!("Dataset {name} unavailable: {e}");
                    failures.push(LoadFailure {
                        dataset: name,
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    });
                }
            }
        }

        if !failures.is_empty() {
            return Err(DVError::DatasetsUnavailable(failures));
        }

        let mut tables = tables.into_iter();
        match (tables.next(), tables.next(), tables.next()) {
            (Some(cust), Some(claim), Some(cntt)) => {
                info!("All datasets loaded");
                Ok(Self { cust, claim, cntt })
            }
            _ => Err(DVError::LoadingFailed("Dataset count mismatch".into())),
        }
    }

    pub fn table(&self, name: DatasetName) -> &Arc<DataFrame> {
        match name {
            DatasetName::Cust => &self.cust,
            DatasetName::Claim => &self.claim,
            DatasetName::Cntt => &self.cntt,
        }
    }

    pub fn select(&self, name: DatasetName) -> Selection {
        let table = Arc::clone(self.table(name));
        let columns = ColumnSet::from_frame(&table);
        Selection {
            name,
            table,
            columns,
        }
    }
}
