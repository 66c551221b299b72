//! `gettogether` - Inspector for the Get-Together local conversation store
//!
//! Reads (and clears) what the synchronization core persisted, without a
//! running messaging engine.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use gettogether_core::{AccountId, ConversationId, PersistenceGateway, SqliteStore, SyncConfig};
use serde_json::json;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application directory name under the platform config and data dirs.
const APP_DIR: &str = "gettogether";

/// Inspect the local Get-Together conversation store
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Database file (defaults to the platform data directory)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the stored conversations of an account
    Conversations {
        /// Account identifier
        account: String,
    },
    /// List the stored messages of a conversation
    Messages {
        /// Account identifier
        account: String,
        /// Conversation identifier
        conversation: String,
    },
    /// List the stored contacts of an account
    Contacts {
        /// Account identifier
        account: String,
        /// Only show contacts whose name or URI contains this text
        #[arg(short, long)]
        query: Option<String>,
    },
    /// Delete every stored conversation and message of an account
    Clear {
        /// Account identifier
        account: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gettogether=debug,gettogether_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config_path = args.config.unwrap_or_else(|| app_dir(dirs::config_dir()).join("settings.json"));
    let config = SyncConfig::load(&config_path)
        .await
        .with_context(|| format!("failed to load settings from {}", config_path.display()))?;
    debug!(path = %config_path.display(), ?config, "Loaded settings");

    let db_path = match args.database {
        Some(path) => path,
        None => {
            let data_dir = app_dir(dirs::data_dir());
            tokio::fs::create_dir_all(&data_dir)
                .await
                .with_context(|| format!("failed to create {}", data_dir.display()))?;
            data_dir.join(&config.database_file)
        }
    };
    let db = db_path
        .to_str()
        .context("database path is not valid UTF-8")?;
    let store = SqliteStore::new(db)
        .await
        .with_context(|| format!("failed to open {db}"))?;
    info!(database = db, "Opened store");

    let output = match args.command {
        Command::Conversations { account } => {
            let conversations = store.load_conversations(&AccountId::new(account)).await?;
            serde_json::to_value(conversations)?
        }
        Command::Messages {
            account,
            conversation,
        } => {
            let messages = store
                .load_messages(&AccountId::new(account), &ConversationId::new(conversation))
                .await?;
            serde_json::to_value(messages)?
        }
        Command::Contacts { account, query } => {
            let contacts: Vec<_> = store
                .load_contacts(&AccountId::new(account))
                .await?
                .into_iter()
                .filter(|c| query.as_deref().is_none_or(|q| c.matches(q)))
                .collect();
            serde_json::to_value(contacts)?
        }
        Command::Clear { account } => clear(&store, &AccountId::new(account)).await?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Removes the account's stored conversations and messages.
async fn clear(store: &SqliteStore, account_id: &AccountId) -> anyhow::Result<serde_json::Value> {
    let conversations = store.load_conversations(account_id).await?;
    let mut message_lists = store.message_conversation_ids(account_id).await?;
    for conversation in &conversations {
        if !message_lists.contains(&conversation.id) {
            message_lists.push(conversation.id.clone());
        }
    }

    for conversation_id in &message_lists {
        store.clear_messages(account_id, conversation_id).await?;
    }
    store.clear_conversations(account_id).await?;

    info!(%account_id, conversations = conversations.len(), "Cleared stored conversations");
    Ok(json!({
        "account_id": account_id,
        "conversations_cleared": conversations.len(),
        "message_lists_cleared": message_lists.len(),
    }))
}

fn app_dir(base: Option<PathBuf>) -> PathBuf {
    base.unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR)
}
