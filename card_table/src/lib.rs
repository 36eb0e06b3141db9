//! # Card Table
//!
//! Ownership and placement of uniquely identified cards at shared virtual
//! tables.
//!
//! Cards are minted with globally unique ids and never change. Participants
//! may own cards permanently; when a deck is dealt for them, their best owned
//! card of each value is used and missing values are filled with loaner cards.
//! At a table, cards live in decks (draw pile, discard, hands), ordered piles
//! that support adding, moving, drawing and counting. Every deck mutation is
//! one atomic store transaction and is announced to table observers.
//!
//! ## Core Modules
//!
//! - [`store`]: ordered key/value store contract, in-memory and PostgreSQL backends
//! - [`cards`]: card registry and ownership index
//! - [`deck`]: deck handles and table deck queries
//! - [`deal`]: shuffled deck construction
//! - [`events`]: table event broadcasting
//!
//! ## Example
//!
//! ```
//! use card_table::{CardTable, CardTableConfig, events::ChannelBroadcaster, store::MemoryStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), card_table::cards::CardError> {
//!     let config = CardTableConfig {
//!         total_cards: 22,
//!         ..Default::default()
//!     };
//!     let table = CardTable::new(
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(ChannelBroadcaster::new(config.event_channel_capacity)),
//!         &config,
//!     );
//!
//!     let cards = table.dealer().get_shuffled_deck("tz1player").await?;
//!     let draw = table.decks().init_deck("table:1", "draw").await?;
//!     draw.add(&cards).await?;
//!     assert_eq!(draw.num_cards().await?, 22);
//!     Ok(())
//! }
//! ```

pub mod cards;
pub mod config;
pub mod db;
pub mod deal;
pub mod deck;
pub mod events;
pub mod services;
pub mod store;

pub use cards::{Card, CardError, CardId, CardRegistry, CardResult, CardValue, OwnershipIndex};
pub use config::{CardTableConfig, ConfigError};
pub use deal::{Dealer, Shuffler, ThreadRngShuffler};
pub use deck::{Deck, DeckContents, DeckManager};
pub use events::{Broadcaster, ChannelBroadcaster, TableEvent, TableNotification};
pub use services::CardTable;
