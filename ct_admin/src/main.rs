//! Administrative command line for card_table storage.
//!
//! Runs one command against the PostgreSQL store (or a throwaway in-memory
//! store), prints the result as JSON and logs the table events it caused.

mod commands;

use std::sync::Arc;

use anyhow::Error;
use card_table::{
    CardTable, CardTableConfig, ChannelBroadcaster,
    db::{Database, DatabaseConfig},
    store::{MemoryStore, Store},
};
use commands::AdminCommand;
use ctrlc::set_handler;
use log::{info, warn};
use pico_args::Arguments;
use tokio::sync::broadcast::error::RecvError;

const HELP: &str = "\
Inspect and modify card_table storage

USAGE:
  ct_admin [OPTIONS] COMMAND [ARGS]

COMMANDS:
  schema                     Create the store tables
  register VALUE             Mint a card  [--token N] [--uri S]
  card ID                    Show a card record
  deal ADDRESS               Deal a shuffled deck for a participant
  decks TABLE                List the decks of a table
  cards TABLE DECK           List the card ids of a deck, top first
  draw TABLE FROM TO         Draw the top card of FROM into TO
  clear-owned ADDRESS        Forget a participant's owned cards

OPTIONS:
  --db-url     URL           Database connection string  [default: env DATABASE_URL or postgres://postgres@localhost/card_table]
  --token      N             Ledger token id for register  [default: -1]
  --uri        S             Metadata location for register  [default: empty]

FLAGS:
  --memory                   Use an in-memory store instead of PostgreSQL
  -h, --help                 Print help information

ENVIRONMENT:
  DATABASE_URL               PostgreSQL connection string
  TOTAL_CARDS                Cards per dealt deck  [default: 78]
  STORE_TIMEOUT_MS           Store operation timeout  [default: 5000]
  CASCADE_CLEAR_OWNED        Also drop per-value ownership on clear-owned  [default: false]
  RUST_LOG                   Log filter (e.g., info, card_table=debug)
";

struct Args {
    database_url: String,
    memory: bool,
    command: AdminCommand,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let memory = pargs.contains("--memory");
    let database_url = pargs
        .opt_value_from_str("--db-url")?
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| DatabaseConfig::development().database_url);
    let command = AdminCommand::parse(&mut pargs)?;

    let remaining = pargs.finish();
    if !remaining.is_empty() {
        anyhow::bail!("Unexpected arguments: {:?}", remaining);
    }

    let args = Args {
        database_url,
        memory,
        command,
    };

    // Catching signals for exit.
    set_handler(|| std::process::exit(0))?;

    env_logger::builder().format_target(false).init();

    let config = CardTableConfig::from_env()?;

    let store: Arc<dyn Store> = if args.memory {
        info!("Using in-memory store, nothing will be persisted");
        Arc::new(MemoryStore::new())
    } else {
        info!("Connecting to database: {}", args.database_url);
        let db = Database::new(&DatabaseConfig::with_url(args.database_url)?)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
        if args.command.is_schema() {
            db.migrate().await?;
        }
        Arc::new(db.store())
    };

    let events = Arc::new(ChannelBroadcaster::new(config.event_channel_capacity));
    let mut rx = events.subscribe();
    let event_log = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(notification) => match serde_json::to_string(&notification) {
                    Ok(json) => info!("Event: {json}"),
                    Err(e) => warn!("Failed to encode event: {e}"),
                },
                Err(RecvError::Lagged(skipped)) => warn!("Event log lagged, {skipped} event(s) skipped"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let table = CardTable::new(store, events, &config);
    let result = commands::run(&table, args.command).await;

    // Dropping the last sender ends the event log once it has caught up.
    drop(table);
    event_log.await?;

    println!("{}", serde_json::to_string_pretty(&result?)?);

    Ok(())
}
