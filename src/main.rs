//! gbdx - command-line access to the GBDX imagery platform

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gbdx_auth::api::{self, DEFAULT_S3_DURATION_SECS};
use gbdx_auth::auth::{setup, GBDX_AUTH_URL};
use gbdx_auth::config::{self, CredentialSource};
use gbdx_auth::{SessionBuilder, TokenStore};

#[derive(Parser)]
#[command(name = "gbdx")]
#[command(about = "Command-line access to the GBDX imagery platform", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file to use instead of GBDX_* variables or ~/.gbdx-config
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Prompt for credentials and write a new config file
    Configure {
        /// Token endpoint to store in the config file
        #[arg(long, default_value = GBDX_AUTH_URL)]
        auth_url: String,
    },

    /// Authenticate now, storing a token if none is valid
    Login,

    /// Remove the stored token, keeping credentials
    Logout,

    /// Show where credentials come from and the state of the stored token
    Status,

    /// Show the status of an imagery order
    Order {
        /// Order number
        order_id: String,
    },

    /// Show the catalog record for an image
    Catalog {
        /// Catalog id
        catalog_id: String,
    },

    /// Download the browse thumbnail for an image
    Thumbnail {
        /// Catalog id
        catalog_id: String,

        /// Output file (defaults to <catalog_id>.medium.png)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Get temporary S3 credentials for your customer data prefix
    S3creds {
        /// Lifetime of the credentials in seconds
        #[arg(short, long, default_value_t = DEFAULT_S3_DURATION_SECS)]
        duration: u64,
    },
}

fn session_builder(config: &Option<PathBuf>) -> SessionBuilder {
    match config {
        Some(path) => SessionBuilder::new().config_file(path),
        None => SessionBuilder::new(),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Configure { auth_url } => {
            let path = match cli.config {
                Some(path) => path,
                None => config::default_config_path()?,
            };
            let credentials = setup::prompt_credentials(io::stdin().lock(), io::stdout(), &auth_url)
                .context("Failed to read credentials")?;
            setup::write_config(&path, &credentials)?;
            println!("Wrote {}", path.display());
        }
        Commands::Login => {
            tracing::info!("Starting authentication flow...");
            let session = session_builder(&cli.config).connect().await?;
            if let Some(token) = session.token() {
                println!("Authenticated (token expires at {}).", token.expires_at);
            }
        }
        Commands::Logout => {
            let source = config::resolve(cli.config.as_deref())?;
            if let CredentialSource::Environment(_) = source {
                println!("Using environment credentials; no stored token to remove.");
                return Ok(());
            }
            if TokenStore::new(source).clear()? {
                println!("Logged out.");
            } else {
                println!("No stored token.");
            }
        }
        Commands::Status => {
            let source = config::resolve(cli.config.as_deref())?;
            println!("Source:      {}", source.describe());
            let (credentials, token) = TokenStore::new(source).load()?;
            println!("User:        {}", credentials.username);
            println!("Client id:   {}", credentials.client_id);
            println!("Auth URL:    {}", credentials.auth_url);
            match token {
                Some(token) if !token.is_expired() => {
                    println!("Token:       valid");
                    println!("  expires_at: {}", token.expires_at);
                    println!(
                        "  usable for: {}s",
                        token.expires_in(Utc::now()).num_seconds()
                    );
                }
                Some(token) => {
                    println!("Token:       expired");
                    match token.refresh_token {
                        Some(_) => println!("Refresh tok: present"),
                        None => println!("Refresh tok: none"),
                    }
                }
                None => {
                    println!("Token:       none");
                    println!("\nRun 'gbdx login' to authenticate.");
                }
            }
        }
        Commands::Order { order_id } => {
            let mut session = session_builder(&cli.config).connect().await?;
            let status = api::get_order_status(&mut session, &order_id).await?;
            print_json(&status)?;
        }
        Commands::Catalog { catalog_id } => {
            let mut session = session_builder(&cli.config).connect().await?;
            match api::get_catalog_record(&mut session, &catalog_id).await? {
                Some(record) => print_json(&record)?,
                None => println!("No catalog record for {}.", catalog_id),
            }
        }
        Commands::Thumbnail { catalog_id, out } => {
            let mut session = session_builder(&cli.config).connect().await?;
            let image = api::get_thumbnail(&mut session, &catalog_id).await?;
            let out = out.unwrap_or_else(|| PathBuf::from(format!("{}.medium.png", catalog_id)));
            image
                .save(&out)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            println!(
                "Saved {}x{} thumbnail to {}",
                image.width(),
                image.height(),
                out.display()
            );
        }
        Commands::S3creds { duration } => {
            let mut session = session_builder(&cli.config).connect().await?;
            tracing::info!("Requesting S3 credentials valid for {}s...", duration);
            let (s3_url, creds) = api::get_s3creds(&mut session, duration).await?;
            println!("{}", s3_url);
            print_json(&creds)?;
        }
    }

    Ok(())
}
