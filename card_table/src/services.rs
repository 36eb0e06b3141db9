//! Wiring of the card components over one store and one broadcaster.

use crate::{
    cards::{CardRegistry, OwnershipIndex},
    config::CardTableConfig,
    deal::{Dealer, Shuffler},
    deck::DeckManager,
    events::Broadcaster,
    store::{Store, TimeoutStore},
};
use std::sync::Arc;

/// Registry, ownership index, deck manager and dealer sharing one store.
///
/// The store is wrapped in a [`TimeoutStore`] using the configured timeout.
#[derive(Clone)]
pub struct CardTable {
    registry: CardRegistry,
    ownership: OwnershipIndex,
    decks: DeckManager,
    dealer: Dealer,
}

impl CardTable {
    pub fn new(
        store: Arc<dyn Store>,
        events: Arc<dyn Broadcaster>,
        config: &CardTableConfig,
    ) -> Self {
        let store: Arc<dyn Store> = Arc::new(TimeoutStore::new(store, config.store_timeout));
        let registry = CardRegistry::new(store.clone(), config.total_cards);
        let ownership =
            OwnershipIndex::new(store.clone(), registry.clone(), config.cascade_clear_owned);
        let decks = DeckManager::new(store, events, registry.clone());
        let dealer = Dealer::new(ownership.clone(), registry.clone());

        Self {
            registry,
            ownership,
            decks,
            dealer,
        }
    }

    /// Replace the dealer's shuffle source
    pub fn with_shuffler(mut self, shuffler: Arc<dyn Shuffler>) -> Self {
        self.dealer = self.dealer.with_shuffler(shuffler);
        self
    }

    pub fn registry(&self) -> &CardRegistry {
        &self.registry
    }

    pub fn ownership(&self) -> &OwnershipIndex {
        &self.ownership
    }

    pub fn decks(&self) -> &DeckManager {
        &self.decks
    }

    pub fn dealer(&self) -> &Dealer {
        &self.dealer
    }
}
