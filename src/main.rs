use std::process::ExitCode;

use clap::Parser;

use app_lib::cli::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    if cli.command() == Command::Version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    match app_lib::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Already logged by `run` when logging was up.
            eprintln!("[FATAL] {e}");
            ExitCode::FAILURE
        }
    }
}
