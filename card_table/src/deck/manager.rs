//! Deck loading and table-level deck queries.

use super::handle::Deck;
use crate::{
    cards::{CardId, CardRegistry, CardResult, parse_ids},
    events::{Broadcaster, TableEvent},
    store::{Command, Store, keys},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Deck contents read without a handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckContents {
    pub key: String,
    pub ids: Vec<CardId>,
}

/// Creates deck handles and answers table-wide deck queries
#[derive(Clone)]
pub struct DeckManager {
    store: Arc<dyn Store>,
    events: Arc<dyn Broadcaster>,
    registry: CardRegistry,
}

impl DeckManager {
    pub fn new(store: Arc<dyn Store>, events: Arc<dyn Broadcaster>, registry: CardRegistry) -> Self {
        Self {
            store,
            events,
            registry,
        }
    }

    /// Load (or create) deck `name` at `table_id`
    ///
    /// Registers the name in the table's deck directory and announces the
    /// current contents with an `initDeck` event.
    ///
    /// # Arguments
    ///
    /// * `table_id` - Table the deck belongs to
    /// * `name` - Deck name, unique per table
    pub async fn init_deck(&self, table_id: &str, name: &str) -> CardResult<Deck> {
        let key = keys::deck(table_id, name);
        let mut replies = self
            .store
            .transaction(vec![
                Command::SetAdd {
                    key: keys::table_decks(table_id),
                    members: vec![name.to_string()],
                },
                Command::SortedRange {
                    key: key.clone(),
                    limit: None,
                },
                Command::SortedHighWater { key: key.clone() },
            ])
            .await?
            .into_iter()
            .skip(1);

        let entries = match replies.next() {
            Some(reply) => reply.into_scored()?,
            None => Vec::new(),
        };
        let high_water = match replies.next() {
            Some(reply) => reply.into_int()?,
            None => 0,
        };
        let max_score = entries
            .last()
            .map_or(high_water, |(_, score)| high_water.max(*score));
        let ids = parse_ids(&key, entries.into_iter().map(|(member, _)| member))?;

        log::debug!("Loaded deck {key} with {} card(s)", ids.len());
        self.events.publish(
            table_id,
            TableEvent::InitDeck {
                deck_key: key.clone(),
                ids,
            },
        );

        Ok(Deck::new(
            name.to_string(),
            key,
            table_id.to_string(),
            max_score,
            self.store.clone(),
            self.events.clone(),
            self.registry.clone(),
        ))
    }

    /// Names of every deck created at `table_id`
    pub async fn get_decks(&self, table_id: &str) -> CardResult<Vec<String>> {
        Ok(self
            .store
            .execute(Command::SetMembers {
                key: keys::table_decks(table_id),
            })
            .await?
            .into_members()?)
    }

    /// Contents of a deck, top to bottom, without loading a handle
    pub async fn get_cards(&self, table_id: &str, name: &str) -> CardResult<DeckContents> {
        let key = keys::deck(table_id, name);
        let entries = self
            .store
            .execute(Command::SortedRange {
                key: key.clone(),
                limit: None,
            })
            .await?
            .into_scored()?;
        let ids = parse_ids(&key, entries.into_iter().map(|(member, _)| member))?;
        Ok(DeckContents { key, ids })
    }
}
