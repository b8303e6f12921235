//! CLI module for pdb-advisor
//!
//! # Commands
//!
//! - `serve` - Start the advisor server
//! - `config init` - Write an example configuration file
//!
//! # Example
//!
//! ```bash
//! # Start server with default config
//! pdb-advisor serve
//!
//! # Run without a cluster (proxy and health only)
//! pdb-advisor serve --no-kubernetes --port 9090
//! ```

pub mod config;
pub mod serve;

pub use config::handle_config_init;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// pdb-advisor - PodDisruptionBudget advisory tool server
#[derive(Parser, Debug)]
#[command(
    name = "pdb-advisor",
    version,
    about = "PodDisruptionBudget advisory tool server"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the advisor server
    Serve(ServeArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "pdb-advisor.toml")]
    pub config: PathBuf,

    /// Override server port
    #[arg(short, long, env = "PDB_ADVISOR_PORT")]
    pub port: Option<u16>,

    /// Override server host
    #[arg(short = 'H', long, env = "PDB_ADVISOR_HOST")]
    pub host: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "PDB_ADVISOR_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Do not connect to Kubernetes; domain tools are not registered
    #[arg(long)]
    pub no_kubernetes: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "pdb-advisor.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_parse_serve_defaults() {
        let cli = Cli::try_parse_from(["pdb-advisor", "serve"]).unwrap();
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.config, PathBuf::from("pdb-advisor.toml"));
                assert!(!args.no_kubernetes);
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_cli_parse_serve_overrides() {
        let cli = Cli::try_parse_from([
            "pdb-advisor",
            "serve",
            "--port",
            "9090",
            "-H",
            "127.0.0.1",
            "--no-kubernetes",
        ])
        .unwrap();
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.port, Some(9090));
                assert_eq!(args.host.as_deref(), Some("127.0.0.1"));
                assert!(args.no_kubernetes);
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_cli_parse_config_init() {
        let cli =
            Cli::try_parse_from(["pdb-advisor", "config", "init", "-o", "out.toml", "--force"])
                .unwrap();
        match cli.command {
            Commands::Config(ConfigCommands::Init(args)) => {
                assert_eq!(args.output, PathBuf::from("out.toml"));
                assert!(args.force);
            }
            _ => panic!("Expected Config Init command"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_command() {
        assert!(Cli::try_parse_from(["pdb-advisor", "backends"]).is_err());
    }
}
