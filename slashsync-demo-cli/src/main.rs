//! Slashsync Demo CLI
//!
//! Command-line interface for exercising slashsync against an in-memory drive
//! store, a scripted wallet and a real seeding relay.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod ui;

#[derive(Parser)]
#[command(name = "slashsync-demo")]
#[command(about = "Slashsync Demo CLI - Try out slashtags contacts, slashpay.json and seeding", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate and show an ephemeral identity
    Whoami,

    /// Work with slash: and slashfeed: URLs
    Url {
        #[command(subcommand)]
        action: UrlAction,
    },

    /// Bulk import random contacts and list them
    Contacts {
        /// Number of contacts to import
        #[arg(short, long, default_value = "10")]
        count: usize,
    },

    /// Publish a profile and read it back as a peer
    Profile {
        /// Display name
        name: String,

        /// Short bio
        #[arg(long)]
        bio: Option<String>,

        /// Link as title=url (repeatable)
        #[arg(long = "link")]
        links: Vec<String>,
    },

    /// Run a scripted slashpay.json synchronization
    Sync {
        /// Address type of the wallet (p2pkh, p2sh, p2wpkh, p2tr)
        #[arg(long, default_value = "p2wpkh")]
        address_type: String,

        /// Receive address the wallet switches to before the second run
        #[arg(long)]
        new_address: Option<String>,

        /// Expire the published invoice before the second run
        #[arg(long)]
        expire: bool,

        /// Make invoice creation fail before the second run
        #[arg(long)]
        fail_invoice: bool,

        /// Turn offline payments off before the second run
        #[arg(long)]
        disable: bool,

        /// Drop a stale invoice instead of keeping it when renewal fails
        #[arg(long)]
        omit_stale: bool,

        /// Debounce window in milliseconds
        #[arg(long, default_value = "500")]
        debounce_ms: u64,
    },

    /// Seed a fresh identity's drives to the seeding relay
    Seed {
        /// Relay endpoint (defaults to SLASHSYNC_SEEDER_URL or the public relay)
        #[arg(long)]
        endpoint: Option<String>,

        /// Request timeout in seconds
        #[arg(long, default_value = "30")]
        timeout: u64,
    },
}

#[derive(Subcommand)]
enum UrlAction {
    /// Parse a URL and show its parts
    Parse { url: String },

    /// Check whether a URL is a valid identity URL
    Validate { url: String },

    /// Route a URL to the screen it opens
    Open { url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing; RUST_LOG takes precedence over --verbose
    let default_filter = if cli.verbose {
        "slashsync_demo_cli=debug,slashsync_lib=debug"
    } else {
        "slashsync_demo_cli=info,slashsync_lib=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Whoami => {
            commands::whoami::run(cli.verbose).await?;
        }

        Commands::Url { action } => match action {
            UrlAction::Parse { url } => {
                commands::url::parse(&url, cli.verbose).await?;
            }
            UrlAction::Validate { url } => {
                commands::url::validate(&url, cli.verbose).await?;
            }
            UrlAction::Open { url } => {
                commands::url::open(&url, cli.verbose).await?;
            }
        },

        Commands::Contacts { count } => {
            commands::contacts::bulk(count, cli.verbose).await?;
        }

        Commands::Profile { name, bio, links } => {
            commands::profile::run(&name, bio.as_deref(), &links, cli.verbose).await?;
        }

        Commands::Sync {
            address_type,
            new_address,
            expire,
            fail_invoice,
            disable,
            omit_stale,
            debounce_ms,
        } => {
            let scenario = commands::sync::Scenario {
                address_type: address_type
                    .parse()
                    .with_context(|| format!("Unsupported address type '{}'", address_type))?,
                new_address,
                expire_invoice: expire,
                fail_invoice,
                disable,
                omit_stale,
                debounce_ms,
            };
            commands::sync::run(scenario, cli.verbose).await?;
        }

        Commands::Seed { endpoint, timeout } => {
            commands::seed::run(endpoint, timeout, cli.verbose).await?;
        }
    }

    Ok(())
}
