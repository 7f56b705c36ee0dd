use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// A starter web service: schema reconciliation, HTTP API and cache wiring.
#[derive(Debug, Parser)]
#[command(name = "starter-service", version, about)]
pub struct Cli {
    /// Load configuration from FILE
    #[arg(short, long, global = true, value_name = "FILE", env = "APP_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Reconcile the schema, then serve HTTP (default)
    Serve,
    /// Reconcile the schema and exit
    Migrate,
    /// Display version info
    #[command(alias = "v")]
    Version,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Serve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_serve() {
        let cli = Cli::try_parse_from(["starter-service"]).unwrap();
        assert_eq!(cli.command(), Command::Serve);
    }

    #[test]
    fn test_config_flag_and_subcommand() {
        let cli = Cli::try_parse_from(["starter-service", "migrate", "-c", "conf/app.yaml"]).unwrap();
        assert_eq!(cli.command(), Command::Migrate);
        assert_eq!(cli.config, Some(PathBuf::from("conf/app.yaml")));

        let cli = Cli::try_parse_from(["starter-service", "v"]).unwrap();
        assert_eq!(cli.command(), Command::Version);
    }
}
