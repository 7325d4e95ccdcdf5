//! Inkstand CLI - Database migrations and catalog management.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! inkstand-cli migrate
//!
//! # Add a product to the catalog
//! inkstand-cli seed product -n "Field Notes: Letterpress" -p 50000 -f field-notes.pdf
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed product` - Insert a catalog product

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "inkstand-cli")]
#[command(author, version, about = "Inkstand CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed database records
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Insert a product into the catalog
    Product {
        /// Product display name
        #[arg(short, long)]
        name: String,

        /// Price in minor currency units (e.g. paise)
        #[arg(short, long)]
        price: i64,

        /// Deliverable file path, relative to the files directory
        #[arg(short, long)]
        file: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Product { name, price, file } => {
                commands::seed::product(&name, price, &file).await?;
            }
        },
    }
    Ok(())
}
