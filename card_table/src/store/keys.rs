//! Storage key layout.
//!
//! Every piece of state lives under a single string key. Table-scoped keys
//! start with the table id so a table can be scanned or dropped as a unit.

use crate::cards::{CardId, CardValue};

/// Global card id counter
pub const NEXT_CARD_ID: &str = "nextCardId";

/// Hash holding one card record
pub fn card(id: CardId) -> String {
    format!("card:{id}")
}

/// Flat set of every card id owned by `address`
pub fn owned(address: &str) -> String {
    format!("{address}:owned")
}

/// Owned card ids of one value, scored by token id
pub fn owned_value(address: &str, value: CardValue) -> String {
    format!("{address}:owned:{value}")
}

/// Set of deck names created at a table
pub fn table_decks(table_id: &str) -> String {
    format!("{table_id}:decks")
}

/// Sorted set backing one deck
pub fn deck(table_id: &str, name: &str) -> String {
    format!("{table_id}:deck:{name}")
}
