use std::process::ExitCode;

use chrono::Utc;
use clap::Parser;
use tracing::error;

use solar_tick_sim::cli::{self, Cli};
use solar_tick_sim::telemetry;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.log_json);

    match cli::run(&cli, Utc::now(), &mut std::io::stdout()).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
