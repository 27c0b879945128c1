mod cli;
mod infra;
mod routes;
mod server;
mod transmit;

use enterprise::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
