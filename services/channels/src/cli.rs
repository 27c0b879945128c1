use crate::server;
use crate::transmit::{run_transmit_courseware, run_transmit_learner_data, CoursewareArgs, LearnerDataArgs};
use clap::{Args, Parser, Subcommand};
use enterprise::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "enterprise-channels",
    about = "Serve the data sharing consent API and transmit data to integrated channels",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Send enterprise course catalogs to integrated channels
    TransmitCoursewareData(CoursewareArgs),
    /// Send learner completion data to integrated channels
    TransmitLearnerData(LearnerDataArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::TransmitCoursewareData(args) => run_transmit_courseware(args),
        Command::TransmitLearnerData(args) => run_transmit_learner_data(args),
    }
}
