mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use petty_patrol::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
