use std::fs::File;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod controller;
mod dataset;
mod dispatch;
mod domain;
mod loader;
mod model;
mod stats;
mod ui;

use controller::Controller;
use dataset::DatasetName;
use dispatch::Bins;
use domain::{DVConfig, DVError, DatasetPaths, expand_path};
use loader::Loader;
use model::{Model, Status};
use ui::DashboardUI;

/// Explore the customer, claim and contract tables in the terminal.
#[derive(Parser, Debug)]
#[command(name = "dv", version, about, long_about = None)]
struct Args {
    /// Customer table (csv, parquet or arrow)
    #[arg(long, default_value = "data/cust.csv")]
    cust: String,

    /// Claim table
    #[arg(long, default_value = "data/claim.csv")]
    claim: String,

    /// Contract table
    #[arg(long, default_value = "data/cntt.csv")]
    cntt: String,

    /// Dataset shown first
    #[arg(long, value_enum, default_value = "cust")]
    dataset: DatasetName,

    /// Histogram bins to start with (5 to 50)
    #[arg(long, default_value_t = Bins::DEFAULT)]
    bins: usize,

    /// Keyboard poll interval in milliseconds
    #[arg(long, default_value = "100")]
    poll_ms: u64,

    /// Log destination, the level is taken from RUST_LOG
    #[arg(long, default_value = "dv.log")]
    log_file: String,
}

impl Args {
    fn into_config(self) -> Result<DVConfig, DVError> {
        Ok(DVConfig {
            paths: DatasetPaths {
                cust: expand_path(&self.cust)?,
                claim: expand_path(&self.claim)?,
                cntt: expand_path(&self.cntt)?,
            },
            initial_dataset: self.dataset,
            bins: Bins::new(self.bins).ok_or(DVError::InvalidBins(self.bins))?,
            event_poll_time: self.poll_ms,
            log_file: expand_path(&self.log_file)?,
            ..Default::default()
        })
    }
}

fn init_tracing(config: &DVConfig) -> Result<(), DVError> {
    let file = File::create(&config.log_file)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn main() -> ExitCode {
    let config = match Args::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = init_tracing(&config) {
        eprintln!("Could not open log file {}: {e}", config.log_file.display());
        return ExitCode::FAILURE;
    }
    info!("Starting dv {}", env!("CARGO_PKG_VERSION"));

    let mut terminal = ratatui::init();
    let result = run(&config, &mut terminal);
    ratatui::restore();

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Terminated with error: {e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &DVConfig, terminal: &mut ratatui::DefaultTerminal) -> Result<(), DVError> {
    let mut loader = Loader::new();
    let mut model = Model::init(config, &mut loader);
    let ui = DashboardUI::new(config);
    let controller = Controller::new(config);

    while model.status != Status::QUITTING {
        terminal.draw(|f| ui.draw(&model, f))?;

        if let Some(message) = controller.handle_event(&model)? {
            model.update(message);
        }
    }
    info!("Bye, {} tables cached", loader.len());
    Ok(())
}
