mod cli;
mod infra;
mod routes;
mod seed;
mod server;

use jobboard::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
