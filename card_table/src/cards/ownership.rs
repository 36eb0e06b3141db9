//! Ownership index: which cards each participant owns permanently.

use super::{
    errors::CardResult,
    models::{Card, CardId, CardValue},
    parse_ids,
    registry::CardRegistry,
};
use crate::store::{Command, Store, keys};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Per-address ownership records.
///
/// Two structures are kept per address: a flat set of owned ids, and one
/// sorted set per card value scored by token id. Both are written in the same
/// transaction.
#[derive(Clone)]
pub struct OwnershipIndex {
    store: Arc<dyn Store>,
    registry: CardRegistry,
    cascade_clear: bool,
}

impl OwnershipIndex {
    /// Create a new ownership index
    ///
    /// # Arguments
    ///
    /// * `store` - Backing store
    /// * `registry` - Registry used to resolve best-owned cards; its
    ///   `total_cards` bounds the values accepted and cascade clearing
    /// * `cascade_clear` - Whether `clear_owned` also drops per-value indices
    pub fn new(store: Arc<dyn Store>, registry: CardRegistry, cascade_clear: bool) -> Self {
        Self {
            store,
            registry,
            cascade_clear,
        }
    }

    /// Drop the owned-id set for `address`.
    ///
    /// Without cascade clearing the per-value indices stay behind, so
    /// [`get_best_owned`](Self::get_best_owned) keeps answering from them.
    pub async fn clear_owned(&self, address: &str) -> CardResult<()> {
        let mut commands = vec![Command::Delete {
            key: keys::owned(address),
        }];
        if self.cascade_clear {
            commands.extend((0..self.registry.total_cards()).map(|value| Command::Delete {
                key: keys::owned_value(address, value),
            }));
        }

        self.store.transaction(commands).await?;
        log::info!(
            "Cleared ownership of {address} (cascade: {})",
            self.cascade_clear
        );
        Ok(())
    }

    /// Whether `address` owns any card
    pub async fn has_owned(&self, address: &str) -> CardResult<bool> {
        Ok(self
            .store
            .execute(Command::Exists {
                key: keys::owned(address),
            })
            .await?
            .into_bool()?)
    }

    /// Grant `cards` to `address`, all or nothing
    ///
    /// # Errors
    ///
    /// * `CardError::InvalidValue` - A card's value is not below `total_cards`;
    ///   nothing is granted
    pub async fn add_owned(&self, address: &str, cards: &[Card]) -> CardResult<()> {
        if cards.is_empty() {
            return Ok(());
        }
        for card in cards {
            self.registry.check_value(card.value)?;
        }

        let mut by_value: BTreeMap<CardValue, Vec<(i64, String)>> = BTreeMap::new();
        for card in cards {
            by_value
                .entry(card.value)
                .or_default()
                .push((card.token_id, card.id.to_string()));
        }

        let mut commands: Vec<Command> = by_value
            .into_iter()
            .map(|(value, entries)| Command::SortedAdd {
                key: keys::owned_value(address, value),
                entries,
            })
            .collect();
        commands.push(Command::SetAdd {
            key: keys::owned(address),
            members: cards.iter().map(|card| card.id.to_string()).collect(),
        });

        self.store.transaction(commands).await?;
        log::debug!("Granted {} card(s) to {address}", cards.len());
        Ok(())
    }

    /// Every owned card id, in no particular order
    pub async fn get_owned(&self, address: &str) -> CardResult<Vec<CardId>> {
        let key = keys::owned(address);
        let members = self
            .store
            .execute(Command::SetMembers { key: key.clone() })
            .await?
            .into_members()?;
        parse_ids(&key, members)
    }

    /// The owned card of `value` with the smallest token id, if any
    pub async fn get_best_owned(&self, address: &str, value: CardValue) -> CardResult<Option<Card>> {
        let key = keys::owned_value(address, value);
        let first = self
            .store
            .execute(Command::SortedRange {
                key: key.clone(),
                limit: Some(1),
            })
            .await?
            .into_scored()?;

        match parse_ids(&key, first.into_iter().map(|(member, _)| member))?.first() {
            Some(&id) => Ok(Some(self.registry.get(id).await?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::CardError;
    use crate::store::MemoryStore;

    const ADDRESS: &str = "tz1owner";

    fn index(cascade_clear: bool) -> (OwnershipIndex, CardRegistry) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let registry = CardRegistry::new(store.clone(), 78);
        (
            OwnershipIndex::new(store, registry.clone(), cascade_clear),
            registry,
        )
    }

    #[tokio::test]
    async fn test_add_and_get_owned() {
        let (index, registry) = index(false);
        assert!(!index.has_owned(ADDRESS).await.unwrap());

        let a = registry.register(3, 103, "uri:a").await.unwrap();
        let b = registry.register(4, 104, "uri:b").await.unwrap();
        index.add_owned(ADDRESS, &[a.clone(), b.clone()]).await.unwrap();

        assert!(index.has_owned(ADDRESS).await.unwrap());
        let mut owned = index.get_owned(ADDRESS).await.unwrap();
        owned.sort_unstable();
        assert_eq!(owned, vec![a.id, b.id]);
    }

    #[tokio::test]
    async fn test_best_owned_is_lowest_token() {
        let (index, registry) = index(false);
        let high = registry.register(10, 900, "").await.unwrap();
        let low = registry.register(10, 88, "").await.unwrap();
        let other = registry.register(11, 1, "").await.unwrap();
        index
            .add_owned(ADDRESS, &[high, low.clone(), other])
            .await
            .unwrap();

        let best = index.get_best_owned(ADDRESS, 10).await.unwrap();
        assert_eq!(best, Some(low));

        let none = index.get_best_owned(ADDRESS, 12).await.unwrap();
        assert!(none.is_none(), "No card of value 12 is owned");
    }

    #[tokio::test]
    async fn test_clear_without_cascade_leaves_value_index() {
        let (index, registry) = index(false);
        let card = registry.register(2, 50, "").await.unwrap();
        index.add_owned(ADDRESS, &[card.clone()]).await.unwrap();

        index.clear_owned(ADDRESS).await.unwrap();

        assert!(!index.has_owned(ADDRESS).await.unwrap());
        assert!(index.get_owned(ADDRESS).await.unwrap().is_empty());
        assert_eq!(index.get_best_owned(ADDRESS, 2).await.unwrap(), Some(card));
    }

    #[tokio::test]
    async fn test_clear_with_cascade_drops_value_index() {
        let (index, registry) = index(true);
        let card = registry.register(2, 50, "").await.unwrap();
        index.add_owned(ADDRESS, &[card]).await.unwrap();

        index.clear_owned(ADDRESS).await.unwrap();

        assert!(!index.has_owned(ADDRESS).await.unwrap());
        assert!(index.get_best_owned(ADDRESS, 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_add_empty_is_noop() {
        let (index, _) = index(false);
        index.add_owned(ADDRESS, &[]).await.unwrap();
        assert!(!index.has_owned(ADDRESS).await.unwrap());
    }

    #[tokio::test]
    async fn test_add_owned_rejects_out_of_range_value() {
        let (index, registry) = index(true);
        let valid = registry.register(2, 50, "").await.unwrap();
        let forged = Card {
            id: 999,
            value: 78,
            token_id: 5,
            metadata_uri: String::new(),
        };

        let result = index.add_owned(ADDRESS, &[valid, forged]).await;
        assert!(matches!(
            result,
            Err(CardError::InvalidValue { value: 78, .. })
        ));
        assert!(!index.has_owned(ADDRESS).await.unwrap(), "Nothing is granted");
    }
}
