use std::time::Instant;
use tracing::{debug, info, trace};

use crate::dataset::{DatasetName, Datasets, Selection};
use crate::dispatch::{self, Bins, Notice, ViewKind, ViewRequest, ViewResult};
use crate::domain::{DVConfig, HELP_TEXT, Message};
use crate::loader::Loader;

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    FAILED,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    DASHBOARD,
    POPUP,
}

/// Values of the dashboard controls.
#[derive(Debug, Clone, Default)]
struct Widgets {
    kind: ViewKind,
    column_idx: usize,
    group_idx: usize,
    agg_idx: usize,
    bins: Bins,
    triggered: bool,
}

/// Everything the UI needs for one frame.
pub struct UIData {
    pub datasets: Vec<String>,
    pub selected_dataset: usize,
    pub view_title: String,
    pub controls: Vec<(String, String)>,
    pub view: ViewResult,
    pub nrows: usize,
    pub error: Option<String>,
    pub show_popup: bool,
    pub popup_message: String,
    pub status_message: String,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            datasets: Vec::new(),
            selected_dataset: 0,
            view_title: String::new(),
            controls: Vec::new(),
            view: ViewResult::Notice(Notice::NoNumericColumns),
            nrows: 0,
            error: None,
            show_popup: false,
            popup_message: String::new(),
            status_message: String::new(),
        }
    }
}

pub struct Model {
    pub status: Status,
    modus: Modus,
    datasets: Option<Datasets>,
    selection: Option<Selection>,
    widgets: Widgets,
    view: ViewResult,
    uidata: UIData,
    status_message: String,
}

impl Model {
    /// Load all datasets and prepare the first view. A load failure does not
    /// fail here; the model switches to `Status::FAILED` and only reports it.
    pub fn init(config: &DVConfig, loader: &mut Loader) -> Self {
        let mut model = Self {
            status: Status::READY,
            modus: Modus::DASHBOARD,
            datasets: None,
            selection: None,
            widgets: Widgets {
                bins: config.bins,
                ..Default::default()
            },
            view: ViewResult::Notice(Notice::NoNumericColumns),
            uidata: UIData::empty(),
            status_message: String::new(),
        };

        let start_time = Instant::now();
        match Datasets::load(loader, config) {
            Ok(datasets) => {
                model.datasets = Some(datasets);
                model.select_dataset(config.initial_dataset);
                model.set_status_message(format!(
                    "Loaded datasets in {}ms ...",
                    start_time.elapsed().as_millis()
                ));
            }
            Err(e) => {
                info!("Dashboard disabled: {e}");
                model.status = Status::FAILED;
                model.uidata.error = Some(e.to_string());
            }
        }
        model
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    #[cfg(test)]
    pub fn view(&self) -> &ViewResult {
        &self.view
    }

    #[cfg(test)]
    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    #[cfg(test)]
    pub fn request(&self) -> Option<ViewRequest> {
        self.selection.as_ref().map(|s| self.build_request(s))
    }

    pub fn showing_popup(&self) -> bool {
        self.modus == Modus::POPUP
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn update(&mut self, message: Message) {
        trace!("Update: Modus {:?}, Message {:?}", self.modus, message);

        if self.status == Status::FAILED {
            if message == Message::Quit {
                self.quit();
            }
            return;
        }

        match self.modus {
            Modus::DASHBOARD => match message {
                Message::Quit => self.quit(),
                Message::Help => self.show_help(),
                Message::Exit => {}
                Message::NextDataset => self.shift_dataset(true),
                Message::PrevDataset => self.shift_dataset(false),
                Message::SelectDataset(name) => self.select_dataset(name),
                Message::NextView => self.set_view_kind(self.widgets.kind.next()),
                Message::PrevView => self.set_view_kind(self.widgets.kind.prev()),
                Message::NextColumn => self.shift_column(true),
                Message::PrevColumn => self.shift_column(false),
                Message::NextGroup => self.shift_group(true),
                Message::PrevGroup => self.shift_group(false),
                Message::MoreBins => self.step_bins(1),
                Message::FewerBins => self.step_bins(-1),
                Message::Trigger => self.trigger(),
            },
            Modus::POPUP => match message {
                Message::Quit => self.quit(),
                Message::Help | Message::Exit => self.close_popup(),
                _ => (),
            },
        }
    }

    // -------------------- Control handling functions ---------------------- //

    fn select_dataset(&mut self, name: DatasetName) {
        let Some(datasets) = &self.datasets else {
            return;
        };
        let selection = datasets.select(name);
        debug!(
            "Selected {name}: numeric {:?}, categorical {:?}",
            selection.columns.numeric, selection.columns.categorical
        );
        self.selection = Some(selection);
        // Column lists changed, old positions mean nothing for the new table.
        self.widgets.column_idx = 0;
        self.widgets.group_idx = 0;
        self.widgets.agg_idx = 0;
        self.widgets.triggered = false;
        self.refresh();
    }

    fn shift_dataset(&mut self, forward: bool) {
        if let Some(current) = self.selection.as_ref().map(|s| s.name) {
            let next = if forward { current.next() } else { current.prev() };
            self.select_dataset(next);
        }
    }

    fn set_view_kind(&mut self, kind: ViewKind) {
        self.widgets.kind = kind;
        self.refresh();
    }

    fn shift_column(&mut self, forward: bool) {
        let Some(n) = self.selection.as_ref().map(|s| s.columns.numeric.len()) else {
            return;
        };
        if self.widgets.kind == ViewKind::Grouped {
            self.widgets.agg_idx = cycle(self.widgets.agg_idx, n, forward);
            self.widgets.triggered = false;
        } else {
            self.widgets.column_idx = cycle(self.widgets.column_idx, n, forward);
        }
        self.refresh();
    }

    fn shift_group(&mut self, forward: bool) {
        let Some(n) = self.selection.as_ref().map(|s| s.columns.categorical.len()) else {
            return;
        };
        self.widgets.group_idx = cycle(self.widgets.group_idx, n, forward);
        self.widgets.triggered = false;
        self.refresh();
    }

    fn step_bins(&mut self, delta: isize) {
        self.widgets.bins = self.widgets.bins.step(delta);
        self.refresh();
    }

    fn trigger(&mut self) {
        if self.widgets.kind == ViewKind::Grouped {
            self.widgets.triggered = true;
            self.refresh();
        }
    }

    fn show_help(&mut self) {
        self.modus = Modus::POPUP;
        self.uidata.popup_message = HELP_TEXT.to_string();
        self.uidata.show_popup = true;
    }

    fn close_popup(&mut self) {
        trace!("Close popup ...");
        self.modus = Modus::DASHBOARD;
        self.uidata.show_popup = false;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.uidata.status_message = self.status_message.clone();
    }

    // ------------------------ View computation ---------------------------- //

    fn build_request(&self, selection: &Selection) -> ViewRequest {
        let columns = &selection.columns;
        let widgets = &self.widgets;
        let mut request = ViewRequest::new(widgets.kind).bins(widgets.bins);
        if let Some(name) = columns.numeric.get(widgets.column_idx) {
            request = request.column(name.as_str());
        }
        if let Some(name) = columns.categorical.get(widgets.group_idx) {
            request = request.group_column(name.as_str());
        }
        if let Some(name) = columns.numeric.get(widgets.agg_idx) {
            request = request.agg_column(name.as_str());
        }
        request
    }

    // Recompute the current view from scratch, then the data the UI draws.
    fn refresh(&mut self) {
        let Some(selection) = &self.selection else {
            return;
        };
        let request = self.build_request(selection);
        let start_time = Instant::now();

        let awaiting_trigger = request.kind == ViewKind::Grouped
            && !self.widgets.triggered
            && !selection.columns.categorical.is_empty()
            && !selection.columns.numeric.is_empty();
        self.view = if awaiting_trigger {
            ViewResult::Notice(Notice::AwaitingTrigger)
        } else {
            dispatch::render(&selection.table, &selection.columns, &request)
        };
        trace!(
            "Rendered {:?} for {} in {}ms",
            request.kind,
            selection.name,
            start_time.elapsed().as_millis()
        );

        self.uidata = UIData {
            datasets: DatasetName::ALL.iter().map(|n| n.to_string()).collect(),
            selected_dataset: selection.name.index(),
            view_title: request.kind.title().to_string(),
            controls: Self::controls(&request),
            view: self.view.clone(),
            nrows: selection.table.height(),
            error: None,
            show_popup: self.modus == Modus::POPUP,
            popup_message: self.uidata.popup_message.clone(),
            status_message: self.status_message.clone(),
        };
    }

    fn controls(request: &ViewRequest) -> Vec<(String, String)> {
        let mut controls = vec![("view".to_string(), request.kind.title().to_string())];
        let none = || "-".to_string();
        if request.kind.uses_column() {
            controls.push(("column".into(), request.column.clone().unwrap_or_else(none)));
        }
        if request.kind == ViewKind::Histogram {
            controls.push(("bins".into(), request.bins.get().to_string()));
        }
        if request.kind == ViewKind::Grouped {
            controls.push(("group by".into(), request.group_column.clone().unwrap_or_else(none)));
            controls.push(("mean of".into(), request.agg_column.clone().unwrap_or_else(none)));
        }
        controls
    }
}

fn cycle(idx: usize, len: usize, forward: bool) -> usize {
    if len == 0 {
        0
    } else if forward {
        (idx + 1) % len
    } else {
        (idx + len - 1) % len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DatasetPaths;
    use std::path::PathBuf;

    fn fixture_config() -> DVConfig {
        DVConfig {
            paths: DatasetPaths {
                cust: PathBuf::from("tests/fixtures/cust.csv"),
                claim: PathBuf::from("tests/fixtures/claim.csv"),
                cntt: PathBuf::from("tests/fixtures/cntt.csv"),
            },
            ..Default::default()
        }
    }

    fn ready_model() -> Model {
        let mut loader = Loader::new();
        let model = Model::init(&fixture_config(), &mut loader);
        assert_eq!(model.status, Status::READY);
        model
    }

    #[test]
    fn starts_with_preview_of_initial_dataset() {
        let model = ready_model();
        let uidata = model.get_uidata();
        assert_eq!(uidata.datasets, vec!["CUST", "CLAIM", "CNTT"]);
        assert_eq!(uidata.selected_dataset, 0);
        assert_eq!(uidata.nrows, 12);
        match model.view() {
            ViewResult::Preview(p) => assert_eq!(p.rows.len(), 5),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn initial_dataset_comes_from_config() {
        let mut config = fixture_config();
        config.initial_dataset = DatasetName::Cntt;
        let model = Model::init(&config, &mut Loader::new());
        assert_eq!(model.selection().unwrap().name, DatasetName::Cntt);
    }

    #[test]
    fn missing_path_shows_one_error_and_no_dataset_tabs() {
        let mut config = fixture_config();
        config.paths.cntt = PathBuf::from("tests/fixtures/nope.csv");
        let mut model = Model::init(&config, &mut Loader::new());

        assert_eq!(model.status, Status::FAILED);
        let uidata = model.get_uidata();
        assert!(uidata.datasets.is_empty());
        let error = uidata.error.as_deref().unwrap();
        assert!(error.contains("CNTT"));
        assert!(model.selection().is_none());

        // Nothing but quitting works.
        model.update(Message::NextDataset);
        assert!(model.get_uidata().datasets.is_empty());
        model.update(Message::Quit);
        assert_eq!(model.status, Status::QUITTING);
    }

    #[test]
    fn switching_dataset_recomputes_columns() {
        let mut model = ready_model();
        model.update(Message::NextDataset);
        let selection = model.selection().unwrap();
        assert_eq!(selection.name, DatasetName::Claim);
        assert!(selection.columns.is_numeric("DMND_AMT"));
        assert_eq!(model.get_uidata().selected_dataset, 1);

        model.update(Message::SelectDataset(DatasetName::Cust));
        assert!(model.selection().unwrap().columns.is_numeric("AGE"));
        model.update(Message::PrevDataset);
        assert_eq!(model.selection().unwrap().name, DatasetName::Cntt);
    }

    #[test]
    fn views_cycle_and_follow_the_widgets() {
        let mut model = ready_model();
        model.update(Message::NextView);
        assert!(matches!(model.view(), ViewResult::Summary(_)));

        model.update(Message::NextView);
        match model.view() {
            ViewResult::Histogram(h) => {
                assert_eq!(h.column, "CUST_ID");
                assert_eq!(h.counts.len(), 20);
            }
            other => panic!("unexpected {other:?}"),
        }

        model.update(Message::NextColumn);
        model.update(Message::FewerBins);
        match model.view() {
            ViewResult::Histogram(h) => {
                assert_eq!(h.column, "AGE");
                assert_eq!(h.counts.len(), 19);
                assert_eq!(h.total(), 12);
            }
            other => panic!("unexpected {other:?}"),
        }

        model.update(Message::PrevView);
        model.update(Message::PrevView);
        assert!(matches!(model.view(), ViewResult::Preview(_)));
        model.update(Message::PrevView);
        assert!(matches!(model.view(), ViewResult::Notice(Notice::AwaitingTrigger)));
    }

    #[test]
    fn initial_bins_come_from_config() {
        let mut config = fixture_config();
        config.bins = Bins::new(8).unwrap();
        let mut model = Model::init(&config, &mut Loader::new());
        model.update(Message::NextView);
        model.update(Message::NextView);
        match model.view() {
            ViewResult::Histogram(h) => assert_eq!(h.counts.len(), 8),
            other => panic!("unexpected {other:?}"),
        }
        // bins survive a dataset switch
        model.update(Message::NextDataset);
        assert_eq!(model.request().unwrap().bins.get(), 8);
    }

    #[test]
    fn bins_saturate_at_the_bounds() {
        let mut model = ready_model();
        for _ in 0..100 {
            model.update(Message::MoreBins);
        }
        assert_eq!(model.request().unwrap().bins.get(), Bins::MAX);
        for _ in 0..100 {
            model.update(Message::FewerBins);
        }
        assert_eq!(model.request().unwrap().bins.get(), Bins::MIN);
    }

    #[test]
    fn grouping_waits_for_the_trigger() {
        let mut model = ready_model();
        model.update(Message::SelectDataset(DatasetName::Claim));
        for _ in 0..5 {
            model.update(Message::NextView);
        }
        assert_eq!(
            model.view(),
            &ViewResult::Notice(Notice::AwaitingTrigger)
        );

        model.update(Message::Trigger);
        let first = match model.view() {
            ViewResult::Grouped(g) => g.clone(),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(first.group_column, "POLY_NO");

        // ACCI_DVSN / HOSP_DAYS
        model.update(Message::NextGroup);
        assert_eq!(
            model.view(),
            &ViewResult::Notice(Notice::AwaitingTrigger)
        );
        model.update(Message::NextColumn);
        model.update(Message::Trigger);
        match model.view() {
            ViewResult::Grouped(g) => {
                assert_eq!(g.group_column, "ACCI_DVSN");
                assert_eq!(g.value_column, "HOSP_DAYS");
                assert_eq!(g.rows.len(), 2);
                assert_eq!(g.mean_of("injury"), Some(5.0));
                assert_eq!(g.mean_of("disease"), Some(41.0 / 6.0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn help_popup_blocks_dashboard_keys() {
        let mut model = ready_model();
        model.update(Message::Help);
        assert!(model.showing_popup());
        assert!(model.get_uidata().show_popup);

        model.update(Message::NextView);
        assert!(matches!(model.view(), ViewResult::Preview(_)));

        model.update(Message::Exit);
        assert!(!model.showing_popup());
        model.update(Message::NextView);
        assert!(matches!(model.view(), ViewResult::Summary(_)));
    }

    #[test]
    fn cycle_wraps() {
        assert_eq!(cycle(2, 3, true), 0);
        assert_eq!(cycle(0, 3, false), 2);
        assert_eq!(cycle(0, 0, true), 0);
    }
}
