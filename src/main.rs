#![deny(warnings)]
#![deny(clippy::unwrap_used)]

//! mediahost-ssh - operator CLI over the media host remote storage core.
//!
//! Every subcommand builds one [`RemoteStorage`] from the environment and a
//! JSON host directory, performs a single operation, prints the result as
//! JSON on stdout and closes the pooled sessions. Logs go to stderr.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serde_json::{Value, json};
use tracing::info;
use tracing_subscriber::EnvFilter;

use mediahost_ssh::remote::{ServerId, StaticHostDirectory, UserStructure};
use mediahost_ssh::{CoreConfig, RemoteError, RemoteStorage};

/// Provision and inspect per-user storage on media-server hosts over SSH
#[derive(Parser, Debug)]
#[command(name = "mediahost-ssh", version, about, long_about = None)]
struct Cli {
    /// JSON file with the host directory (array of host records)
    #[arg(long, env = "MEDIAHOST_HOSTS")]
    hosts: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the user directory and its fixed subdirectories
    EnsureUser {
        server: ServerId,
        login: String,

        /// Extra folder to provision under the user directory (repeatable)
        #[arg(long = "folder")]
        folders: Vec<String>,
    },

    /// Create one folder under the user directory and verify it
    EnsureFolder {
        server: ServerId,
        login: String,
        folder: String,
    },

    /// Whether a remote directory exists
    Exists { server: ServerId, path: String },

    /// File count and total size of a remote directory
    FolderInfo { server: ServerId, path: String },

    /// Size and permissions of a remote file
    FileInfo { server: ServerId, path: String },

    /// Upload a local file
    Upload {
        server: ServerId,
        local: PathBuf,
        remote: String,
    },

    /// Remove a remote file (best-effort)
    Remove { server: ServerId, path: String },

    /// Run a raw shell command line
    Run { server: ServerId, command: String },
}

async fn execute(storage: &RemoteStorage, command: Commands) -> Result<Value, RemoteError> {
    let value = match command {
        Commands::EnsureUser {
            server,
            login,
            folders,
        } => {
            let outcome = if folders.is_empty() {
                storage.ensure_user_directory(server, &login).await?
            } else {
                storage
                    .ensure_complete_user_structure(server, &login, &UserStructure { folders })
                    .await?
            };
            json!({ "outcome": outcome })
        }
        Commands::EnsureFolder {
            server,
            login,
            folder,
        } => {
            let outcome = storage.ensure_user_folder(server, &login, &folder).await?;
            json!({ "outcome": outcome })
        }
        Commands::Exists { server, path } => {
            json!({ "exists": storage.directory_exists(server, &path).await })
        }
        Commands::FolderInfo { server, path } => json!(storage.folder_info(server, &path).await),
        Commands::FileInfo { server, path } => json!(storage.file_info(server, &path).await),
        Commands::Upload {
            server,
            local,
            remote,
        } => json!(storage.upload_to(server, &local, &remote).await?),
        Commands::Remove { server, path } => {
            json!({ "removed": storage.remove_file(server, &path).await })
        }
        Commands::Run { server, command } => json!(storage.run_on(server, &command).await?),
    };
    Ok(value)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    // Logs on stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let directory = StaticHostDirectory::from_json_file(&cli.hosts)?;
    info!(
        "Loaded {} host(s) from {}",
        directory.len(),
        cli.hosts.display()
    );

    let storage = Arc::new(RemoteStorage::with_russh(
        CoreConfig::from_env(),
        Arc::new(directory),
    ));
    let janitor = storage.start_janitor();

    let result = execute(&storage, cli.command).await;

    storage.shutdown().await;
    janitor.await?;

    let value = result?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
