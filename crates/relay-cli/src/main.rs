//! relay - mirror-aware artifact transport

use std::path::PathBuf;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::Config;
use relay_core::{MirroredTransport, Registry};
use relay_transport::{Transport, checksum};

/// Mirror-aware artifact transport: repositories with configured mirrors
/// fail over transparently when one goes bad.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "relay.toml", env = "RELAY_CONFIG")]
    config: String,

    /// Treat remote repositories as temporarily unreachable
    #[arg(long)]
    offline: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download a resource from a repository
    Get {
        repository: String,
        resource: String,
        destination: PathBuf,
        /// Verify the download against a SHA-256 checksum (hex)
        #[arg(long)]
        sha256: Option<String>,
        /// Only download when the remote copy is newer than this RFC 3339
        /// timestamp
        #[arg(long)]
        if_newer_than: Option<DateTime<Utc>>,
    },
    /// Upload a file to a repository
    Put {
        repository: String,
        source: PathBuf,
        resource: String,
    },
    /// Check whether a resource exists
    Exists {
        repository: String,
        resource: String,
    },
    /// List a repository directory
    List {
        repository: String,
        #[arg(default_value = "")]
        directory: String,
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config)?;

    let level = if args.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    init_logging(level);

    let registry = config.build_registry()?;
    if args.offline {
        info!("working offline");
        registry.set_online(false);
    }

    match args.command {
        Command::Get {
            repository,
            resource,
            destination,
            sha256,
            if_newer_than,
        } => {
            let mut transport = MirroredTransport::for_repository(&registry, &repository)?;
            transport.connect().await?;
            let fetched = match if_newer_than {
                Some(timestamp) => {
                    transport
                        .get_if_newer(&resource, &destination, timestamp)
                        .await?
                }
                None => {
                    transport.get(&resource, &destination).await?;
                    true
                }
            };
            transport.disconnect().await?;
            registry.release(transport).await;

            if !fetched {
                info!("remote copy is not newer; nothing downloaded");
            } else if !destination.exists() {
                bail!(
                    "download of {resource} did not produce {}",
                    destination.display()
                );
            } else {
                if let Some(expected) = sha256 {
                    let actual = checksum::sha256_file(&destination).await?;
                    if !actual.eq_ignore_ascii_case(&expected) {
                        bail!(
                            "checksum mismatch for {}: expected {expected}, got {actual}",
                            destination.display()
                        );
                    }
                    debug!("checksum verified");
                }
                info!(resource = %resource, destination = %destination.display(), "downloaded");
            }
            report_statistics(&registry);
        }
        Command::Put {
            repository,
            source,
            resource,
        } => {
            let mut transport = MirroredTransport::for_repository(&registry, &repository)?;
            transport.connect().await?;
            transport.put(&source, &resource).await?;
            transport.disconnect().await?;
            registry.release(transport).await;
            info!(resource = %resource, source = %source.display(), "uploaded");
            report_statistics(&registry);
        }
        Command::Exists {
            repository,
            resource,
        } => {
            let mut transport = MirroredTransport::for_repository(&registry, &repository)?;
            transport.connect().await?;
            let exists = transport.resource_exists(&resource).await?;
            transport.disconnect().await?;
            registry.release(transport).await;
            println!("{exists}");
        }
        Command::List {
            repository,
            directory,
            json,
        } => {
            let mut transport = MirroredTransport::for_repository(&registry, &repository)?;
            transport.connect().await?;
            let listing = transport.file_list(&directory).await?;
            transport.disconnect().await?;
            registry.release(transport).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                for entry in listing {
                    println!("{entry}");
                }
            }
        }
    }

    Ok(())
}

fn report_statistics(registry: &Registry) {
    let stats = registry.statistics();
    debug!(
        started = stats.transfers_started(),
        completed = stats.transfers_completed(),
        failed = stats.transfers_failed(),
        bytes = stats.bytes_transferred(),
        "transfer statistics"
    );
}

/// Initialize logging
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();
}
