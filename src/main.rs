use clap::Parser;
use pdb_advisor::cli::{handle_config_init, Cli, Commands, ConfigCommands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => pdb_advisor::cli::serve::run_serve(args).await,
        Commands::Config(ConfigCommands::Init(args)) => handle_config_init(&args),
    }
}
