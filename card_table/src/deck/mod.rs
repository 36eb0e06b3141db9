//! Table decks: ordered piles of card ids.
//!
//! A deck is identified by `(table_id, name)` and stored as a sorted set of
//! card ids scored by insertion position. The lowest score is the top of the
//! deck and is drawn first; new cards always land at the bottom.
//!
//! ## Example
//!
//! ```
//! use card_table::{CardTable, CardTableConfig, events::ChannelBroadcaster, store::MemoryStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), card_table::cards::CardError> {
//!     let table = CardTable::new(
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(ChannelBroadcaster::new(16)),
//!         &CardTableConfig::default(),
//!     );
//!
//!     let draw = table.decks().init_deck("table:1", "draw").await?;
//!     let hand = table.decks().init_deck("table:1", "hand").await?;
//!
//!     let card = table.registry().register_loaner(0).await?;
//!     draw.add(&[card.clone()]).await?;
//!
//!     assert_eq!(draw.draw_card(&hand).await?, Some(card));
//!     assert_eq!(draw.draw_card(&hand).await?, None);
//!     Ok(())
//! }
//! ```

mod handle;
pub mod manager;

pub use handle::Deck;
pub use manager::{DeckContents, DeckManager};
