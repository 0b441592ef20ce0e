//! Command line front end for the keyfile profile store.
use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use clap::{Parser, Subcommand};
use keyfile_store::{
    config::{Config, PATH_CONFIG_DEFAULT},
    profile_store::{PointerTarget, ProfileChange, ProfileRecord, ProfileStore, StorageTier},
    tracing_config,
};
use serde::Serialize;
use tracing::info;

#[derive(Parser)]
#[command(name = "keyfile-store")]
#[command(about = "Inspect and manage keyfile connection profiles")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = PATH_CONFIG_DEFAULT)]
    config: PathBuf,

    /// Also write logs to rotated files in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List exported profiles
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one profile and the files providing it
    Show { uuid: String },
    /// Hide a profile with a pointer to /dev/null
    Mask {
        uuid: String,
        /// Write the pointer to the persistent directory instead of the volatile one
        #[arg(long)]
        persistent: bool,
    },
    /// Remove a pointer written by `mask`
    Unmask {
        uuid: String,
        #[arg(long)]
        persistent: bool,
    },
    /// Reload all directories and print the resulting changes
    Reload,
    /// Keep running and apply file changes as they happen
    Watch,
}

#[derive(Serialize)]
struct ProfileSummary {
    uuid: String,
    id: Option<String>,
    #[serde(rename = "type")]
    connection_type: Option<String>,
    tier: Option<String>,
    files: Vec<PathBuf>,
}

impl From<&ProfileRecord> for ProfileSummary {
    fn from(record: &ProfileRecord) -> Self {
        let exported = record.exported();
        Self {
            uuid: record.uuid().to_string(),
            id: exported.and_then(|c| c.id()).map(String::from),
            connection_type: exported.and_then(|c| c.connection_type()).map(String::from),
            tier: record.exported_tier().map(|tier| tier.to_string()),
            files: record
                .candidates()
                .iter()
                .map(|candidate| candidate.path().to_path_buf())
                .collect(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match &cli.log_dir {
        Some(dir) => tracing_config::init_with_file(&config.general.log_level, dir)?,
        None => tracing_config::init(&config.general.log_level)?,
    }

    let mut store = ProfileStore::new(&config.keyfile);
    let loaded = store.reload();

    match cli.command {
        Commands::List { json } => {
            let summaries: Vec<ProfileSummary> =
                store.profiles().map(ProfileSummary::from).collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else {
                for summary in summaries {
                    println!(
                        "{}  {:<24} {:<20} {}",
                        summary.uuid,
                        summary.id.unwrap_or_default(),
                        summary.connection_type.unwrap_or_default(),
                        summary.tier.unwrap_or_default()
                    );
                }
            }
        }
        Commands::Show { uuid } => {
            let Some(record) = store.get(&uuid) else {
                return Err(format!("no profile with UUID {uuid}").into());
            };
            println!("{}", serde_json::to_string_pretty(&ProfileSummary::from(record))?);
            if let Some(connection) = record.exported() {
                print!("{}", keyfile_store::connection::keyfile::serialize(connection));
            } else {
                println!("(masked)");
            }
        }
        Commands::Mask { uuid, persistent } => {
            let changes =
                store.write_pointer(&uuid, pointer_tier(persistent), PointerTarget::Masked)?;
            print_changes(&changes);
        }
        Commands::Unmask { uuid, persistent } => {
            let changes =
                store.write_pointer(&uuid, pointer_tier(persistent), PointerTarget::Clear)?;
            print_changes(&changes);
        }
        Commands::Reload => {
            print_changes(&loaded);
        }
        Commands::Watch => {
            let store = Arc::new(Mutex::new(store));
            let Some(monitor) = ProfileStore::start_monitoring(Arc::clone(&store))? else {
                return Err(
                    "monitoring is disabled, set monitor_connection_files = true in [keyfile]"
                        .into(),
                );
            };
            info!("keyfile: watching for changes, press Ctrl-C to stop");

            tokio::signal::ctrl_c().await?;
            monitor.abort();
        }
    }

    Ok(())
}

fn pointer_tier(persistent: bool) -> StorageTier {
    if persistent {
        StorageTier::Persistent
    } else {
        StorageTier::Volatile
    }
}

fn print_changes(changes: &[ProfileChange]) {
    if changes.is_empty() {
        println!("no changes");
        return;
    }
    for change in changes {
        match &change.connection {
            Some(connection) => println!(
                "updated {} ({})",
                change.uuid,
                connection.id().unwrap_or_default()
            ),
            None => println!("removed {}", change.uuid),
        }
    }
}
