//! Dealing a full deck for a participant.

use crate::cards::{Card, CardRegistry, CardResult, CardValue, OwnershipIndex};
use futures_util::future::try_join_all;
use rand::seq::SliceRandom;
use std::sync::Arc;

/// Source of the random permutation used when dealing
pub trait Shuffler: Send + Sync {
    fn shuffle(&self, values: &mut [CardValue]);
}

/// Uniform shuffle from the thread-local RNG
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngShuffler;

impl Shuffler for ThreadRngShuffler {
    fn shuffle(&self, values: &mut [CardValue]) {
        values.shuffle(&mut rand::rng());
    }
}

/// Builds a participant's deck: one card per value, owned cards first
#[derive(Clone)]
pub struct Dealer {
    ownership: OwnershipIndex,
    registry: CardRegistry,
    shuffler: Arc<dyn Shuffler>,
}

impl Dealer {
    /// Create a dealer for the registry's `total_cards` values
    pub fn new(ownership: OwnershipIndex, registry: CardRegistry) -> Self {
        Self {
            ownership,
            registry,
            shuffler: Arc::new(ThreadRngShuffler),
        }
    }

    /// Replace the shuffle source
    pub fn with_shuffler(mut self, shuffler: Arc<dyn Shuffler>) -> Self {
        self.shuffler = shuffler;
        self
    }

    pub fn total_cards(&self) -> CardValue {
        self.registry.total_cards()
    }

    /// Produce `total_cards` cards in random order, one per value.
    ///
    /// For each value the participant's best owned card is used; values they
    /// do not own get a freshly minted loaner card. Lookups for different
    /// values run concurrently.
    pub async fn get_shuffled_deck(&self, address: &str) -> CardResult<Vec<Card>> {
        let mut values: Vec<CardValue> = (0..self.total_cards()).collect();
        self.shuffler.shuffle(&mut values);

        let dealt = try_join_all(values.into_iter().map(|value| self.card_for(address, value))).await?;

        let owned = dealt.iter().filter(|(_, owned)| *owned).count();
        log::info!(
            "Dealt {} card(s) for {address}: {owned} owned, {} loaner(s)",
            dealt.len(),
            dealt.len() - owned
        );
        Ok(dealt.into_iter().map(|(card, _)| card).collect())
    }

    /// Best owned card of `value`, or a fresh loaner; the flag is true when owned
    async fn card_for(&self, address: &str, value: CardValue) -> CardResult<(Card, bool)> {
        match self.ownership.get_best_owned(address, value).await? {
            Some(card) => Ok((card, true)),
            None => Ok((self.registry.register_loaner(value).await?, false)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::NO_TOKEN;
    use crate::store::{MemoryStore, Store};

    struct Reversed;

    impl Shuffler for Reversed {
        fn shuffle(&self, values: &mut [CardValue]) {
            values.reverse();
        }
    }

    fn dealer(total_cards: CardValue) -> (Dealer, OwnershipIndex, CardRegistry) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let registry = CardRegistry::new(store.clone(), total_cards);
        let ownership = OwnershipIndex::new(store, registry.clone(), false);
        (
            Dealer::new(ownership.clone(), registry.clone()),
            ownership,
            registry,
        )
    }

    #[tokio::test]
    async fn test_deals_one_card_per_value() {
        let (dealer, _, _) = dealer(22);
        let cards = dealer.get_shuffled_deck("tz1nobody").await.unwrap();

        assert_eq!(cards.len(), 22);
        let mut values: Vec<CardValue> = cards.iter().map(|card| card.value).collect();
        values.sort_unstable();
        assert_eq!(values, (0..22).collect::<Vec<_>>());
        assert!(cards.iter().all(|card| !card.is_tokenized()));
    }

    #[tokio::test]
    async fn test_prefers_best_owned_cards() {
        let (dealer, ownership, registry) = dealer(4);
        let worse = registry.register(2, 700, "uri:700").await.unwrap();
        let best = registry.register(2, 12, "uri:12").await.unwrap();
        ownership
            .add_owned("tz1collector", &[worse, best.clone()])
            .await
            .unwrap();

        let dealer = dealer.with_shuffler(Arc::new(Reversed));
        let cards = dealer.get_shuffled_deck("tz1collector").await.unwrap();

        let values: Vec<CardValue> = cards.iter().map(|card| card.value).collect();
        assert_eq!(values, vec![3, 2, 1, 0], "Order follows the shuffler");
        assert_eq!(cards[1], best);
        assert!(!cards[0].is_tokenized(), "Unowned values get loaners");
    }

    #[tokio::test]
    async fn test_loaners_are_fresh_each_deal() {
        let (dealer, _, _) = dealer(3);
        let first = dealer.get_shuffled_deck("tz1a").await.unwrap();
        let second = dealer.get_shuffled_deck("tz1a").await.unwrap();

        let mut ids: Vec<_> = first.iter().chain(&second).map(|card| card.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 6);
    }

    #[tokio::test]
    async fn test_owned_untokenized_card_counts_as_owned() {
        let (dealer, ownership, registry) = dealer(2);
        let owned = registry.register(1, NO_TOKEN, "").await.unwrap();
        ownership
            .add_owned("tz1keeper", &[owned.clone()])
            .await
            .unwrap();

        let (card, is_owned) = dealer.card_for("tz1keeper", 1).await.unwrap();
        assert_eq!(card, owned);
        assert!(is_owned, "Ownership comes from the index, not the token id");

        let (loaner, is_owned) = dealer.card_for("tz1keeper", 0).await.unwrap();
        assert!(!is_owned);
        assert!(!loaner.is_tokenized());
    }
}
