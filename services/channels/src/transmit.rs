use crate::infra::Backends;
use clap::Args;
use enterprise::channels::export::{CsvProgressSource, LearnerProgressSource};
use enterprise::channels::{TransmissionReport, TransmissionRequest};
use enterprise::config::AppConfig;
use enterprise::error::AppError;
use enterprise::telemetry;
use std::path::PathBuf;
use tracing::info;

/// Filters shared by both transmission commands.
#[derive(Args, Debug, Default)]
pub(crate) struct TransmissionFilters {
    /// Only transmit for this enterprise customer (UUID)
    #[arg(long)]
    pub(crate) enterprise_customer: Option<String>,
    /// Only transmit to this integrated channel code (e.g. SAP)
    #[arg(long)]
    pub(crate) channel: Option<String>,
}

impl TransmissionFilters {
    fn request(&self, acting_user: &str) -> TransmissionRequest {
        let mut request = TransmissionRequest::new(acting_user);
        if let Some(customer) = &self.enterprise_customer {
            request = request.for_customer(customer.clone());
        }
        if let Some(channel) = &self.channel {
            request = request.on_channel(channel.clone());
        }
        request
    }
}

#[derive(Args, Debug)]
pub(crate) struct CoursewareArgs {
    /// Username of the platform user the catalog is read as
    #[arg(long)]
    pub(crate) catalog_user: String,
    #[command(flatten)]
    pub(crate) filters: TransmissionFilters,
}

impl CoursewareArgs {
    pub(crate) fn request(&self) -> TransmissionRequest {
        self.filters.request(&self.catalog_user)
    }
}

#[derive(Args, Debug)]
pub(crate) struct LearnerDataArgs {
    /// Username of the platform user the learner data is read as
    #[arg(long)]
    pub(crate) api_user: String,
    #[command(flatten)]
    pub(crate) filters: TransmissionFilters,
    /// CSV export of learner progress; defaults to the snapshot store's progress
    #[arg(long)]
    pub(crate) progress_csv: Option<PathBuf>,
}

impl LearnerDataArgs {
    pub(crate) fn request(&self) -> TransmissionRequest {
        self.filters.request(&self.api_user)
    }
}

pub(crate) fn run_transmit_courseware(args: CoursewareArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let backends = Backends::open(&config)?;
    let report = backends
        .orchestrator(&config)
        .transmit_courseware(&args.request())?;
    print_report(&report)
}

pub(crate) fn run_transmit_learner_data(args: LearnerDataArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let backends = Backends::open(&config)?;
    let csv_progress = match &args.progress_csv {
        Some(path) => {
            let source = CsvProgressSource::from_path(path)?;
            info!(path = %path.display(), rows = source.len(), "loaded learner progress export");
            Some(source)
        }
        None => None,
    };
    let progress: &dyn LearnerProgressSource = match &csv_progress {
        Some(source) => source,
        None => &*backends.store,
    };

    let report = backends
        .orchestrator(&config)
        .transmit_learner_data(&args.request(), progress)?;
    print_report(&report)
}

fn print_report(report: &TransmissionReport) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(report).map_err(std::io::Error::from)?;
    println!("{rendered}");
    Ok(())
}
