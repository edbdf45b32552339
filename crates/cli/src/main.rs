//! Webshop CRM CLI - database migrations, staff accounts and seed data.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! crm-cli migrate
//!
//! # Create a staff user
//! crm-cli user create -e jan@example.nl -f Jan -l Jansen -p geheim123 -r manager
//!
//! # Ensure the default admin exists, then import demo data
//! crm-cli seed --file demos/demo.yaml
//! ```
//!
//! All commands read `CRM_DATABASE_URL` (falling back to `DATABASE_URL`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "crm-cli")]
#[command(author, version, about = "Webshop CRM CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage staff users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Create the default admin and optionally import seed data
    Seed {
        /// YAML file with webshops, customers, products, rules and costs
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new staff user
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// First name
        #[arg(short, long)]
        first_name: String,

        /// Last name
        #[arg(short, long)]
        last_name: String,

        /// Initial password
        #[arg(short, long)]
        password: String,

        /// Role (`admin`, `manager`, `user`)
        #[arg(short, long, default_value = "user")]
        role: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .init();

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
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                first_name,
                last_name,
                password,
                role,
            } => {
                commands::user::create(&email, &first_name, &last_name, &password, &role).await?;
            }
        },
        Commands::Seed { file } => commands::seed::run(file.as_deref()).await?,
    }
    Ok(())
}
