//! Numeric statistics over the non-null values of a column.
//!
//! Descriptive statistics and correlations are polars aggregations; binning
//! and box-plot fences are computed here. NaN cells count as missing
//! everywhere. Quartiles use linear interpolation, the standard deviation is
//! the sample deviation (ddof 1), histograms use equal-width bins with the
//! last bin closed on the right.

use polars::prelude::*;

/// Column `name` as Float64 with NaN turned into null.
pub fn numeric(name: &str) -> Expr {
    col(name).cast(DataType::Float64).fill_nan(lit(NULL))
}

/// Present values of a numeric column, in row order.
pub fn column_values(table: &DataFrame, name: &str) -> PolarsResult<Vec<f64>> {
    let values = table
        .clone()
        .lazy()
        .select([numeric(name).drop_nulls()])
        .collect()?;
    Ok(values.column(name)?.f64()?.into_no_null_iter().collect())
}

/// Pearson correlation over the rows where both columns have a value.
/// `None` with fewer than two such rows or when either side is constant.
pub fn pearson(table: &DataFrame, a: &str, b: &str) -> PolarsResult<Option<f64>> {
    let pairs = table
        .clone()
        .lazy()
        .select([numeric(a).alias("x"), numeric(b).alias("y")])
        .filter(col("x").is_not_null().and(col("y").is_not_null()))
        .select([
            len().cast(DataType::Float64).alias("n"),
            pearson_corr(col("x"), col("y")).alias("r"),
        ])
        .collect()?;

    let n = first_f64(&pairs, "n")?.unwrap_or(0.0);
    if n < 2.0 {
        return Ok(None);
    }
    Ok(first_f64(&pairs, "r")?
        .filter(|r| r.is_finite())
        .map(|r| r.clamp(-1.0, 1.0)))
}

fn first_f64(frame: &DataFrame, name: &str) -> PolarsResult<Option<f64>> {
    Ok(frame.column(name)?.cast(&DataType::Float64)?.f64()?.get(0))
}

/// Per-column row of the summary table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q1: Option<f64>,
    pub median: Option<f64>,
    pub q3: Option<f64>,
    pub max: Option<f64>,
}

impl ColumnSummary {
    pub fn describe(table: &DataFrame, column: &str) -> PolarsResult<Self> {
        let v = numeric(column);
        let row = table
            .clone()
            .lazy()
            .select([
                v.clone().count().alias("count"),
                v.clone().mean().alias("mean"),
                v.clone().std(1).alias("std"),
                v.clone().min().alias("min"),
                v.clone()
                    .quantile(lit(0.25), QuantileMethod::Linear)
                    .alias("q1"),
                v.clone().median().alias("median"),
                v.clone()
                    .quantile(lit(0.75), QuantileMethod::Linear)
                    .alias("q3"),
                v.max().alias("max"),
            ])
            .collect()?;

        Ok(Self {
            column: column.to_string(),
            count: first_f64(&row, "count")?.unwrap_or(0.0) as usize,
            mean: first_f64(&row, "mean")?,
            std: first_f64(&row, "std")?,
            min: first_f64(&row, "min")?,
            q1: first_f64(&row, "q1")?,
            median: first_f64(&row, "median")?,
            q3: first_f64(&row, "q3")?,
            max: first_f64(&row, "max")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub column: String,
    /// `counts.len() + 1` bin edges, ascending.
    pub edges: Vec<f64>,
    pub counts: Vec<u64>,
}

impl Histogram {
    /// Returns `None` if there are no values to bin.
    pub fn from_values(column: &str, values: &[f64], bins: usize) -> Option<Self> {
        let bins = bins.max(1);
        let (mut lo, mut hi) = min_max(values)?;
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }
        let width = (hi - lo) / bins as f64;

        let mut counts = vec![0u64; bins];
        for &v in values {
            let idx = ((v - lo) / width) as usize;
            counts[idx.min(bins - 1)] += 1;
        }

        let mut edges: Vec<f64> = (0..bins).map(|i| lo + i as f64 * width).collect();
        edges.push(hi);

        Some(Self {
            column: column.to_string(),
            edges,
            counts,
        })
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Index of the first bin with the highest count.
    pub fn tallest(&self) -> Option<usize> {
        let max = self.counts.iter().max()?;
        self.counts.iter().position(|c| c == max)
    }

    pub fn bin_range(&self, idx: usize) -> Option<(f64, f64)> {
        Some((*self.edges.get(idx)?, *self.edges.get(idx + 1)?))
    }
}

/// Vertical box plot: quartiles, whiskers at the most extreme values within
/// 1.5 IQR of the box, everything beyond the whiskers is an outlier.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxPlot {
    pub column: String,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub lower_whisker: f64,
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
}

impl BoxPlot {
    /// Box from the quartiles in `summary`, whiskers and outliers from
    /// `values`. `None` if the column has no values.
    pub fn from_summary(summary: &ColumnSummary, values: &[f64]) -> Option<Self> {
        let (q1, q3) = (summary.q1?, summary.q3?);
        let iqr = q3 - q1;
        let low_fence = q1 - 1.5 * iqr;
        let high_fence = q3 + 1.5 * iqr;

        let (inside, mut outliers): (Vec<f64>, Vec<f64>) = values
            .iter()
            .copied()
            .partition(|v| *v >= low_fence && *v <= high_fence);
        outliers.sort_by(|a, b| a.total_cmp(b));

        Some(Self {
            column: summary.column.clone(),
            min: summary.min?,
            q1,
            median: summary.median?,
            q3,
            max: summary.max?,
            lower_whisker: inside.iter().copied().reduce(f64::min).unwrap_or(q1),
            upper_whisker: inside.iter().copied().reduce(f64::max).unwrap_or(q3),
            outliers,
        })
    }
}

/// Pearson correlation between all numeric columns.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// Row-major, `values[i][j] == values[j][i]`. `None` where undefined.
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, row: usize, column: usize) -> Option<f64> {
        self.values.get(row)?.get(column).copied().flatten()
    }

    /// Cell text, two decimals.
    pub fn annotation(&self, row: usize, column: usize) -> String {
        match self.get(row, column) {
            Some(v) => format!("{v:.2}"),
            None => "NaN".to_string(),
        }
    }
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values.iter().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}
