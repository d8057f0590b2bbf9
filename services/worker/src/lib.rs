mod cli;
mod infra;
mod reports;

use itam::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
