mod transact;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pantry-cli")]
#[command(about = "Pantry operator command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Log in to Transact once and print the detected client version
    Login,
    /// List the favorite reports saved in Transact
    Reports,
    /// Run one inventory fetch and print the result
    Fetch {
        /// Print the products at this location as JSON instead of a summary
        #[arg(long)]
        location: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = pantry_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Login) => transact::run_login(&config.transact).await?,
        Some(Commands::Reports) => transact::run_reports(&config.transact).await?,
        Some(Commands::Fetch { location }) => {
            transact::run_fetch(&config.transact, location.as_deref()).await?;
        }
        None => println!("pantry-cli ready; run with --help for commands"),
    }

    Ok(())
}
