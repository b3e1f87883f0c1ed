//! CLI module for the A/B testing API
//!
//! - `serve`: run the HTTP API
//! - `migrate`: apply PostgreSQL migrations and exit

pub mod migrate;
pub mod serve;

use clap::{Parser, Subcommand};

/// A/B testing API - experiment registration, random assignment and conversion tracking
#[derive(Parser)]
#[command(name = "ab-testing-api")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API server
    Serve,

    /// Apply database migrations and exit
    Migrate(migrate::MigrateArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve() {
        let cli = Cli::try_parse_from(["ab-testing-api", "serve"]).unwrap();
        assert!(matches!(cli.command, Command::Serve));
    }

    #[test]
    fn test_parse_migrate_with_url() {
        let cli = Cli::try_parse_from([
            "ab-testing-api",
            "migrate",
            "--database-url",
            "postgres://localhost/ab",
        ])
        .unwrap();

        match cli.command {
            Command::Migrate(args) => {
                assert_eq!(args.database_url.as_deref(), Some("postgres://localhost/ab"));
                assert!(!args.revert);
            }
            Command::Serve => panic!("Expected migrate"),
        }
    }

    #[test]
    fn test_parse_migrate_revert() {
        let cli = Cli::try_parse_from(["ab-testing-api", "migrate", "--revert"]).unwrap();

        match cli.command {
            Command::Migrate(args) => {
                assert!(args.revert);
                assert!(args.database_url.is_none());
            }
            Command::Serve => panic!("Expected migrate"),
        }
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["ab-testing-api"]).is_err());
    }
}
