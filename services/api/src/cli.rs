use crate::demo::{run_demo, run_stats, DemoArgs, StatsArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use petty_patrol::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Petty Patrol",
    about = "Run the Petty Patrol reporting service or walk through a scripted session",
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
    /// Run a scripted capture, report, and deal claim session against a throwaway store
    Demo(DemoArgs),
    /// Summarize the reports, badges, and deals persisted in a data directory
    Stats(StatsArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Override the directory holding persisted reports, badges, and deals
    #[arg(long)]
    pub(crate) data_dir: Option<std::path::PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args).await,
        Command::Stats(args) => run_stats(args),
    }
}
