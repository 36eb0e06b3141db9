//! Card registry: mints card identities and stores card records.

use super::{
    errors::{CardError, CardResult},
    models::{Card, CardId, CardValue, NO_TOKEN, TokenId},
};
use crate::store::{Command, Store, keys};
use futures_util::future::try_join_all;
use std::sync::Arc;

/// Card registry
#[derive(Clone)]
pub struct CardRegistry {
    store: Arc<dyn Store>,
    total_cards: CardValue,
}

impl CardRegistry {
    /// Create a registry minting values in `[0, total_cards)`
    pub fn new(store: Arc<dyn Store>, total_cards: CardValue) -> Self {
        Self { store, total_cards }
    }

    /// Number of logical card values
    pub fn total_cards(&self) -> CardValue {
        self.total_cards
    }

    /// Reject values outside `[0, total_cards)`
    pub fn check_value(&self, value: CardValue) -> CardResult<()> {
        if value < self.total_cards {
            Ok(())
        } else {
            Err(CardError::InvalidValue {
                value,
                total_cards: self.total_cards,
            })
        }
    }

    /// Mint a new card
    ///
    /// # Arguments
    ///
    /// * `value` - Logical card value
    /// * `token_id` - Ledger token id, or [`NO_TOKEN`]
    /// * `metadata_uri` - Metadata location, empty if none
    ///
    /// # Returns
    ///
    /// * `CardResult<Card>` - The stored card with its fresh id
    ///
    /// # Errors
    ///
    /// * `CardError::InvalidValue` - `value` is not below `total_cards`; no id is consumed
    pub async fn register(
        &self,
        value: CardValue,
        token_id: TokenId,
        metadata_uri: impl Into<String>,
    ) -> CardResult<Card> {
        self.check_value(value)?;

        let id = self
            .store
            .execute(Command::Incr {
                key: keys::NEXT_CARD_ID.to_string(),
            })
            .await?
            .into_int()?;

        let card = Card {
            id,
            value,
            token_id,
            metadata_uri: metadata_uri.into(),
        };

        self.store
            .execute(Command::HashSet {
                key: keys::card(id),
                fields: card.to_fields(),
            })
            .await?;

        log::debug!("Registered card {} (value {})", card.id, card.value);
        Ok(card)
    }

    /// Mint a card with no ledger token behind it
    pub async fn register_loaner(&self, value: CardValue) -> CardResult<Card> {
        self.register(value, NO_TOKEN, "").await
    }

    /// Fetch a card record
    ///
    /// # Errors
    ///
    /// * `CardError::NotFound` - The id was never registered
    /// * `CardError::CorruptCard` - The stored record is malformed
    pub async fn get(&self, id: CardId) -> CardResult<Card> {
        let fields = self
            .store
            .execute(Command::HashGetAll {
                key: keys::card(id),
            })
            .await?
            .into_hash()?;

        Card::from_fields(id, &fields)
    }

    /// Fetch several cards concurrently, in the order given
    pub async fn get_many(&self, ids: &[CardId]) -> CardResult<Vec<Card>> {
        try_join_all(ids.iter().map(|&id| self.get(id))).await
    }

    /// Whether a card id has been registered
    pub async fn exists(&self, id: CardId) -> CardResult<bool> {
        match self.get(id).await {
            Ok(_) => Ok(true),
            Err(CardError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn registry() -> CardRegistry {
        CardRegistry::new(Arc::new(MemoryStore::new()), 78)
    }

    #[tokio::test]
    async fn test_register_assigns_sequential_ids() {
        let registry = registry();

        let first = registry.register_loaner(3).await.unwrap();
        let second = registry
            .register(5, 1005, "ipfs://bafy/5.json")
            .await
            .unwrap();

        assert_eq!(first.id, 1, "First card should have id 1");
        assert_eq!(second.id, 2, "Second card should have id 2");
        assert_eq!(first.token_id, NO_TOKEN);
        assert!(first.metadata_uri.is_empty());
        assert_eq!(second.token_id, 1005);
    }

    #[tokio::test]
    async fn test_get_round_trips_all_fields() {
        let registry = registry();
        let card = registry
            .register(12, 4012, "ipfs://bafy/12.json")
            .await
            .unwrap();

        let fetched = registry.get(card.id).await.unwrap();
        assert_eq!(fetched, card);
    }

    #[tokio::test]
    async fn test_get_unknown_id_is_not_found() {
        let registry = registry();
        let result = registry.get(404).await;
        assert!(matches!(result, Err(CardError::NotFound(404))));
        assert!(!registry.exists(404).await.unwrap());
    }

    #[tokio::test]
    async fn test_get_many_preserves_order() {
        let registry = registry();
        let mut ids = Vec::new();
        for value in [4, 1, 9] {
            ids.push(registry.register_loaner(value).await.unwrap().id);
        }
        ids.reverse();

        let cards = registry.get_many(&ids).await.unwrap();
        let values: Vec<CardValue> = cards.iter().map(|card| card.value).collect();
        assert_eq!(values, vec![9, 1, 4]);
    }

    #[tokio::test]
    async fn test_concurrent_registration_ids_unique() {
        let registry = registry();
        let mut handles = Vec::new();
        for value in 0..40 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.register_loaner(value).await.unwrap().id
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 40, "Concurrent registrations must never share an id");
    }

    #[tokio::test]
    async fn test_register_rejects_out_of_range_value() {
        let registry = CardRegistry::new(Arc::new(MemoryStore::new()), 4);

        let result = registry.register(9, 5, "").await;
        assert!(matches!(
            result,
            Err(CardError::InvalidValue {
                value: 9,
                total_cards: 4
            })
        ));
        assert!(registry.register_loaner(4).await.is_err(), "Upper bound is exclusive");

        let card = registry.register_loaner(3).await.unwrap();
        assert_eq!(card.id, 1, "Rejected registrations consume no id");
    }
}
