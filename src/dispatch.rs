use derive_setters::Setters;
use polars::prelude::*;
use rayon::prelude::*;
use std::fmt;
use tracing::{error, instrument, trace};

use crate::dataset::ColumnSet;
use crate::stats::{self, BoxPlot, ColumnSummary, CorrelationMatrix, Histogram};

pub const PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewKind {
    #[default]
    Preview,
    Summary,
    Histogram,
    Heatmap,
    BoxPlot,
    Grouped,
}

impl ViewKind {
    pub const ALL: [ViewKind; 6] = [
        ViewKind::Preview,
        ViewKind::Summary,
        ViewKind::Histogram,
        ViewKind::Heatmap,
        ViewKind::BoxPlot,
        ViewKind::Grouped,
    ];

    fn index(self) -> usize {
        Self::ALL.iter().position(|k| *k == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    pub fn title(self) -> &'static str {
        match self {
            ViewKind::Preview => "Preview",
            ViewKind::Summary => "Summary",
            ViewKind::Histogram => "Histogram",
            ViewKind::Heatmap => "Correlation heatmap",
            ViewKind::BoxPlot => "Box plot",
            ViewKind::Grouped => "Grouped means",
        }
    }

    /// Views that plot a single numeric column.
    pub fn uses_column(self) -> bool {
        matches!(self, ViewKind::Histogram | ViewKind::BoxPlot)
    }
}

/// Histogram bin count. Can only hold values in `MIN..=MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bins(usize);

impl Bins {
    pub const MIN: usize = 5;
    pub const MAX: usize = 50;
    pub const DEFAULT: usize = 20;

    pub fn new(bins: usize) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&bins).then_some(Self(bins))
    }

    pub fn get(self) -> usize {
        self.0
    }

    /// Move by `delta`, stopping at the bounds.
    pub fn step(self, delta: isize) -> Self {
        let bins = self.0.saturating_add_signed(delta);
        Self(bins.clamp(Self::MIN, Self::MAX))
    }
}

impl Default for Bins {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

/// Everything the user selected for one render pass.
#[derive(Debug, Clone, Default, PartialEq, Setters)]
#[setters(strip_option, into)]
pub struct ViewRequest {
    pub kind: ViewKind,
    /// Numeric column for histogram and box plot.
    pub column: Option<String>,
    pub bins: Bins,
    pub group_column: Option<String>,
    pub agg_column: Option<String>,
}

impl ViewRequest {
    pub fn new(kind: ViewKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupMean {
    pub label: String,
    pub mean: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupedMeans {
    pub group_column: String,
    pub value_column: String,
    /// One row per distinct group value, sorted by label.
    pub rows: Vec<GroupMean>,
}

impl GroupedMeans {
    #[cfg(test)]
    pub fn mean_of(&self, label: &str) -> Option<f64> {
        self.rows.iter().find(|r| r.label == label)?.mean
    }
}

/// Informational outcomes. They replace a view, they never stop the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    NoNumericColumns,
    NoCategoricalColumns,
    UnknownColumn(String),
    NoValues(String),
    AwaitingTrigger,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::NoNumericColumns => write!(f, "No numeric columns."),
            Notice::NoCategoricalColumns => write!(f, "No categorical columns."),
            Notice::UnknownColumn(name) => write!(f, "Column \"{name}\" is not available."),
            Notice::NoValues(name) => write!(f, "Column \"{name}\" has no values."),
            Notice::AwaitingTrigger => write!(f, "Press <Enter> to compute the grouped means."),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewResult {
    Preview(Preview),
    Summary(Vec<ColumnSummary>),
    Histogram(Histogram),
    Heatmap(CorrelationMatrix),
    BoxPlot(BoxPlot),
    Grouped(GroupedMeans),
    Notice(Notice),
    Failed(String),
}

impl From<Notice> for ViewResult {
    fn from(notice: Notice) -> Self {
        ViewResult::Notice(notice)
    }
}

/// Compute the view described by `request` for `table`.
///
/// Pure: the same table and request always give the same result. Missing or
/// unknown columns become a [`Notice`], errors raised by polars while computing
/// become [`ViewResult::Failed`]; neither escapes this function.
#[instrument(skip(table, columns), fields(kind = ?request.kind))]
pub fn render(table: &DataFrame, columns: &ColumnSet, request: &ViewRequest) -> ViewResult {
    let result = match request.kind {
        ViewKind::Preview => preview(table, PREVIEW_ROWS).map(ViewResult::Preview),
        ViewKind::Summary => summary(table, columns),
        ViewKind::Histogram => histogram(table, columns, request),
        ViewKind::Heatmap => heatmap(table, columns),
        ViewKind::BoxPlot => box_plot(table, columns, request),
        ViewKind::Grouped => grouped(table, columns, request),
    };
    result.unwrap_or_else(|e| {
        error!("Computing {:?} failed: {e}", request.kind);
        ViewResult::Failed(e.to_string())
    })
}

/// First `n` rows as text, in original column order.
pub fn preview(table: &DataFrame, n: usize) -> Result<Preview, PolarsError> {
    let head = table.head(Some(n));
    let mut text_columns = Vec::with_capacity(head.width());
    for column in head.get_columns() {
        text_columns.push(column_as_text(column)?);
    }

    let rows = (0..head.height())
        .map(|ridx| text_columns.iter().map(|c| c[ridx].clone()).collect())
        .collect();

    Ok(Preview {
        headers: head
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect(),
        rows,
        total_rows: table.height(),
    })
}

fn summary(table: &DataFrame, columns: &ColumnSet) -> Result<ViewResult, PolarsError> {
    if columns.numeric.is_empty() {
        return Ok(Notice::NoNumericColumns.into());
    }
    let rows: Result<Vec<ColumnSummary>, PolarsError> = columns
        .numeric
        .par_iter()
        .map(|name| ColumnSummary::describe(table, name))
        .collect();
    Ok(ViewResult::Summary(rows?))
}

fn histogram(
    table: &DataFrame,
    columns: &ColumnSet,
    request: &ViewRequest,
) -> Result<ViewResult, PolarsError> {
    let name = match pick(request.column.as_deref(), &columns.numeric, Notice::NoNumericColumns) {
        Ok(name) => name,
        Err(notice) => return Ok(notice.into()),
    };
    let values = stats::column_values(table, name)?;
    trace!("Histogram of {name}: {} values, {} bins", values.len(), request.bins.get());
    Ok(match Histogram::from_values(name, &values, request.bins.get()) {
        Some(hist) => ViewResult::Histogram(hist),
        None => Notice::NoValues(name.to_string()).into(),
    })
}

fn heatmap(table: &DataFrame, columns: &ColumnSet) -> Result<ViewResult, PolarsError> {
    if columns.numeric.is_empty() {
        return Ok(Notice::NoNumericColumns.into());
    }
    let names = &columns.numeric;
    let n = names.len();
    let pairs: Vec<(usize, usize)> = (0..n).flat_map(|i| (i..n).map(move |j| (i, j))).collect();
    let computed: Result<Vec<((usize, usize), Option<f64>)>, PolarsError> = pairs
        .into_par_iter()
        .map(|(i, j)| {
            let r = stats::pearson(table, &names[i], &names[j])?;
            // a column with variance correlates with itself exactly
            let r = if i == j { r.map(|_| 1.0) } else { r };
            Ok(((i, j), r))
        })
        .collect();

    let mut values = vec![vec![None; n]; n];
    for ((i, j), r) in computed? {
        values[i][j] = r;
        values[j][i] = r;
    }

    Ok(ViewResult::Heatmap(CorrelationMatrix {
        columns: columns.numeric.clone(),
        values,
    }))
}

fn box_plot(
    table: &DataFrame,
    columns: &ColumnSet,
    request: &ViewRequest,
) -> Result<ViewResult, PolarsError> {
    let name = match pick(request.column.as_deref(), &columns.numeric, Notice::NoNumericColumns) {
        Ok(name) => name,
        Err(notice) => return Ok(notice.into()),
    };
    let summary = ColumnSummary::describe(table, name)?;
    let values = stats::column_values(table, name)?;
    Ok(match BoxPlot::from_summary(&summary, &values) {
        Some(bp) => ViewResult::BoxPlot(bp),
        None => Notice::NoValues(name.to_string()).into(),
    })
}

fn grouped(
    table: &DataFrame,
    columns: &ColumnSet,
    request: &ViewRequest,
) -> Result<ViewResult, PolarsError> {
    let group = match pick(
        request.group_column.as_deref(),
        &columns.categorical,
        Notice::NoCategoricalColumns,
    ) {
        Ok(name) => name,
        Err(notice) => return Ok(notice.into()),
    };
    let value = match pick(request.agg_column.as_deref(), &columns.numeric, Notice::NoNumericColumns) {
        Ok(name) => name,
        Err(notice) => return Ok(notice.into()),
    };
    Ok(ViewResult::Grouped(group_means(table, group, value)?))
}

/// Mean of `value` per distinct non-null `group` value, sorted by group label.
pub fn group_means(table: &DataFrame, group: &str, value: &str) -> Result<GroupedMeans, PolarsError> {
    let grouped = table
        .clone()
        .lazy()
        .filter(col(group).is_not_null())
        .group_by([col(group)])
        .agg([stats::numeric(value).mean()])
        .sort_by_exprs([col(group)], SortMultipleOptions::default())
        .collect()?;

    let labels = column_as_text(grouped.column(group)?)?;
    let means = grouped.column(value)?.cast(&DataType::Float64)?;
    let rows = labels
        .into_iter()
        .zip(means.f64()?.into_iter())
        .map(|(label, mean)| GroupMean { label, mean })
        .collect();

    Ok(GroupedMeans {
        group_column: group.to_string(),
        value_column: value.to_string(),
        rows,
    })
}

// Resolve the column a view should use. No selection means the first one in
// the list, a selection outside the list is reported instead of used.
fn pick<'a>(
    selected: Option<&'a str>,
    available: &'a [String],
    when_empty: Notice,
) -> Result<&'a str, Notice> {
    if available.is_empty() {
        return Err(when_empty);
    }
    match selected {
        None => Ok(available[0].as_str()),
        Some(name) if available.iter().any(|c| c == name) => Ok(name),
        Some(name) => Err(Notice::UnknownColumn(name.to_string())),
    }
}

fn column_as_text(column: &Column) -> Result<Vec<String>, PolarsError> {
    let col = column.cast(&DataType::String)?;
    let series = col.str()?;
    Ok(series
        .into_iter()
        .map(|value| match value {
            Some(s) => s.replace("\r\n", " ↵ ").replace('\n', " ↵ "),
            None => String::from("∅"),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::Loader;

    fn text_only() -> DataFrame {
        df!(
            "name" => &["kim", "lee", "park"],
            "city" => &["seoul", "busan", "seoul"]
        )
        .unwrap()
    }

    fn mixed() -> DataFrame {
        df!(
            "g" => &["x", "x", "y"],
            "v" => &[10, 20, 30],
            "w" => &[1.0, 4.0, 2.0]
        )
        .unwrap()
    }

    fn run(df: &DataFrame, request: ViewRequest) -> ViewResult {
        render(df, &ColumnSet::from_frame(df), &request)
    }

    #[test]
    fn bins_stay_in_range() {
        assert_eq!(Bins::default().get(), 20);
        assert!(Bins::new(4).is_none());
        assert!(Bins::new(51).is_none());
        assert_eq!(Bins::new(5).unwrap().get(), 5);
        assert_eq!(Bins::new(50).unwrap().get(), 50);
        assert_eq!(Bins::new(6).unwrap().step(-5).get(), 5);
        assert_eq!(Bins::new(48).unwrap().step(10).get(), 50);
        assert_eq!(Bins::default().step(1).get(), 21);
    }

    #[test]
    fn view_kinds_cycle() {
        assert_eq!(ViewKind::Preview.next(), ViewKind::Summary);
        assert_eq!(ViewKind::Grouped.next(), ViewKind::Preview);
        assert_eq!(ViewKind::Preview.prev(), ViewKind::Grouped);
    }

    #[test]
    fn request_setters() {
        let request = ViewRequest::new(ViewKind::Histogram)
            .column("v")
            .bins(Bins::new(10).unwrap());
        assert_eq!(request.column.as_deref(), Some("v"));
        assert_eq!(request.bins.get(), 10);
        assert_eq!(request.group_column, None);
    }

    #[test]
    fn preview_returns_first_five_rows_in_column_order() {
        let df = df!(
            "b" => (0..8).collect::<Vec<i32>>(),
            "a" => (0..8).map(|i| format!("r{i}")).collect::<Vec<String>>()
        )
        .unwrap();
        match run(&df, ViewRequest::new(ViewKind::Preview)) {
            ViewResult::Preview(p) => {
                assert_eq!(p.headers, vec!["b", "a"]);
                assert_eq!(p.rows.len(), 5);
                assert_eq!(p.rows[4], vec!["4", "r4"]);
                assert_eq!(p.total_rows, 8);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn preview_marks_nulls() {
        let df = df!("a" => &[Some(1), None]).unwrap();
        let p = preview(&df, 5).unwrap();
        assert_eq!(p.rows, vec![vec!["1".to_string()], vec!["∅".to_string()]]);
    }

    #[test]
    fn summary_of_one_to_five() {
        let df = df!("v" => &[1, 2, 3, 4, 5], "t" => &["a", "b", "c", "d", "e"]).unwrap();
        match run(&df, ViewRequest::new(ViewKind::Summary)) {
            ViewResult::Summary(rows) => {
                assert_eq!(rows.len(), 1);
                let s = &rows[0];
                assert_eq!(s.column, "v");
                assert_eq!(s.count, 5);
                assert_eq!(s.mean, Some(3.0));
                assert_eq!(s.min, Some(1.0));
                assert_eq!(s.max, Some(5.0));
                assert!((s.std.unwrap() - 1.581).abs() < 1e-3);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn summary_skips_missing_values() {
        let df = df!("v" => &[Some(2.0), None, Some(4.0)]).unwrap();
        match run(&df, ViewRequest::new(ViewKind::Summary)) {
            ViewResult::Summary(rows) => {
                assert_eq!(rows[0].count, 2);
                assert_eq!(rows[0].mean, Some(3.0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn histogram_with_five_bins() {
        let df = df!("v" => &[1, 1, 1, 2, 2, 3, 4, 5]).unwrap();
        let request = ViewRequest::new(ViewKind::Histogram)
            .column("v")
            .bins(Bins::new(5).unwrap());
        match run(&df, request) {
            ViewResult::Histogram(hist) => {
                assert_eq!(hist.column, "v");
                assert_eq!(hist.total(), 8);
                let tallest = hist.tallest().unwrap();
                let (lo, hi) = hist.bin_range(tallest).unwrap();
                assert!(lo >= 1.0 && hi <= 2.0);
                assert_eq!(hist.counts[tallest], 3);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn histogram_defaults_to_first_numeric_column() {
        match run(&mixed(), ViewRequest::new(ViewKind::Histogram)) {
            ViewResult::Histogram(hist) => {
                assert_eq!(hist.column, "v");
                assert_eq!(hist.counts.len(), Bins::DEFAULT);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn heatmap_is_symmetric_with_unit_diagonal() {
        let df = df!(
            "a" => &[1.0, 2.0, 3.0, 4.0, 5.0],
            "b" => &[2.0, 1.0, 4.0, 3.0, 6.0],
            "c" => &[9.0, 7.0, 4.0, 4.0, 1.0],
            "label" => &["p", "q", "r", "s", "t"]
        )
        .unwrap();
        match run(&df, ViewRequest::new(ViewKind::Heatmap)) {
            ViewResult::Heatmap(m) => {
                assert_eq!(m.columns, vec!["a", "b", "c"]);
                for i in 0..3 {
                    assert_eq!(m.annotation(i, i), "1.00");
                    for j in 0..3 {
                        assert_eq!(m.get(i, j), m.get(j, i));
                        let r = m.get(i, j).unwrap();
                        assert!((-1.0..=1.0).contains(&r));
                    }
                }
                assert!(m.get(0, 2).unwrap() < 0.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn nan_cells_are_skipped_like_missing_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nan.csv");
        std::fs::write(
            &path,
            "a,b,g\n1.0,2.0,x\n2.0,1.0,x\nNaN,4.0,y\n4.0,3.0,y\n5.0,6.0,y\n",
        )
        .unwrap();
        let table = Loader::new().load(&path).unwrap();
        assert_eq!(table.column("a").unwrap().dtype(), &DataType::Float64);

        match run(&table, ViewRequest::new(ViewKind::Heatmap)) {
            ViewResult::Heatmap(m) => {
                assert_eq!(m.columns, vec!["a", "b"]);
                assert_eq!(m.annotation(0, 0), "1.00");
                assert_eq!(m.annotation(1, 1), "1.00");
                assert!(m.get(0, 1).is_some());
            }
            other => panic!("unexpected {other:?}"),
        }

        let g = group_means(&table, "g", "a").unwrap();
        assert_eq!(g.mean_of("x"), Some(1.5));
        assert_eq!(g.mean_of("y"), Some(4.5));
    }

    #[test]
    fn box_plot_of_selected_column() {
        let request = ViewRequest::new(ViewKind::BoxPlot).column("w");
        match run(&mixed(), request) {
            ViewResult::BoxPlot(bp) => {
                assert_eq!(bp.column, "w");
                assert_eq!(bp.median, 2.0);
                assert_eq!(bp.min, 1.0);
                assert_eq!(bp.max, 4.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn grouped_mean_per_distinct_value() {
        let request = ViewRequest::new(ViewKind::Grouped)
            .group_column("g")
            .agg_column("v");
        match run(&mixed(), request) {
            ViewResult::Grouped(g) => {
                assert_eq!(g.group_column, "g");
                assert_eq!(g.value_column, "v");
                assert_eq!(
                    g.rows,
                    vec![
                        GroupMean { label: "x".into(), mean: Some(15.0) },
                        GroupMean { label: "y".into(), mean: Some(30.0) },
                    ]
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn grouped_labels_are_sorted_and_null_keys_dropped() {
        let df = df!(
            "g" => &[Some("zeta"), Some("alpha"), None, Some("mid"), Some("alpha")],
            "v" => &[Some(1.0), Some(2.0), Some(50.0), None, Some(4.0)]
        )
        .unwrap();
        let g = group_means(&df, "g", "v").unwrap();
        let labels: Vec<&str> = g.rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["alpha", "mid", "zeta"]);
        assert_eq!(g.mean_of("alpha"), Some(3.0));
        assert_eq!(g.mean_of("mid"), None);
        assert_eq!(g.mean_of("zeta"), Some(1.0));
    }

    #[test]
    fn no_numeric_columns_is_a_notice() {
        let df = text_only();
        for kind in [
            ViewKind::Summary,
            ViewKind::Histogram,
            ViewKind::BoxPlot,
            ViewKind::Heatmap,
            ViewKind::Grouped,
        ] {
            assert_eq!(
                run(&df, ViewRequest::new(kind)),
                ViewResult::Notice(Notice::NoNumericColumns),
                "{kind:?}"
            );
        }
    }

    #[test]
    fn no_categorical_columns_is_a_notice() {
        let df = df!("v" => &[1, 2, 3]).unwrap();
        assert_eq!(
            run(&df, ViewRequest::new(ViewKind::Grouped)),
            ViewResult::Notice(Notice::NoCategoricalColumns)
        );
    }

    #[test]
    fn unknown_or_wrongly_typed_column_is_a_notice() {
        let df = mixed();
        assert_eq!(
            run(&df, ViewRequest::new(ViewKind::Histogram).column("nope")),
            ViewResult::Notice(Notice::UnknownColumn("nope".into()))
        );
        // "g" exists but is not numeric
        assert_eq!(
            run(&df, ViewRequest::new(ViewKind::BoxPlot).column("g")),
            ViewResult::Notice(Notice::UnknownColumn("g".into()))
        );
        assert_eq!(
            run(&df, ViewRequest::new(ViewKind::Grouped).group_column("v")),
            ViewResult::Notice(Notice::UnknownColumn("v".into()))
        );
    }

    #[test]
    fn all_null_column_has_no_values() {
        let df = df!("v" => &[None::<f64>, None]).unwrap();
        assert_eq!(
            run(&df, ViewRequest::new(ViewKind::Histogram)),
            ViewResult::Notice(Notice::NoValues("v".into()))
        );
        assert_eq!(
            run(&df, ViewRequest::new(ViewKind::BoxPlot)),
            ViewResult::Notice(Notice::NoValues("v".into()))
        );
    }

    #[test]
    fn inconsistent_column_set_fails_only_the_view() {
        let df = mixed();
        let columns = ColumnSet {
            numeric: vec!["gone".into()],
            categorical: vec![],
        };
        match render(&df, &columns, &ViewRequest::new(ViewKind::Summary)) {
            ViewResult::Failed(message) => assert!(message.contains("gone")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
