//! Mbuli's Feast CLI - Database migrations and catalogue seeding.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! mbuli-cli migrate
//!
//! # Seed the product catalogue (skipped if products exist)
//! mbuli-cli seed
//!
//! # Seed even if the catalogue is not empty
//! mbuli-cli seed --force
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "mbuli-cli")]
#[command(author, version, about = "Mbuli's Feast CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the product catalogue
    Seed {
        /// Insert products even if the catalogue is not empty
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await,
        Commands::Seed { force } => commands::seed::catalogue(force).await,
    }
}
