//! Deck handle and its mutation protocol.

use crate::{
    cards::{Card, CardError, CardId, CardRegistry, CardResult, parse_ids, to_members},
    events::{Broadcaster, TableEvent},
    store::{Command, Score, Store},
};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Ordered pile of card ids at a table (draw pile, discard pile, a hand...).
///
/// A `Deck` is a lightweight handle; the contents live in the store under
/// [`key`](Self::key). Position scores are assigned by the store, so several
/// handles to the same key stay consistent. The handle only caches the
/// highest score it has seen, for inspection.
///
/// Every mutation is one store transaction followed by one [`TableEvent`].
pub struct Deck {
    name: String,
    key: String,
    table_id: String,
    max_score: AtomicI64,
    store: Arc<dyn Store>,
    events: Arc<dyn Broadcaster>,
    registry: CardRegistry,
}

impl Deck {
    pub(crate) fn new(
        name: String,
        key: String,
        table_id: String,
        max_score: Score,
        store: Arc<dyn Store>,
        events: Arc<dyn Broadcaster>,
        registry: CardRegistry,
    ) -> Self {
        Self {
            name,
            key,
            table_id,
            max_score: AtomicI64::new(max_score),
            store,
            events,
            registry,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Storage key of this deck
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn table_id(&self) -> &str {
        &self.table_id
    }

    /// Highest position score this handle has observed
    pub fn max_score(&self) -> Score {
        self.max_score.load(Ordering::Acquire)
    }

    fn observe(&self, score: Score) {
        self.max_score.fetch_max(score, Ordering::AcqRel);
    }

    fn publish(&self, event: TableEvent) {
        self.events.publish(&self.table_id, event);
    }

    /// Log and hand back a broken precondition; no state was changed
    fn reject(&self, error: CardError) -> CardError {
        if error.is_precondition() {
            log::error!("Deck {}: rejected mutation: {error}", self.key);
        }
        error
    }

    fn check_distinct(&self, ids: &[CardId]) -> CardResult<()> {
        let mut seen = HashSet::with_capacity(ids.len());
        match ids.iter().find(|id| !seen.insert(**id)) {
            Some(&id) => Err(self.reject(CardError::DuplicateInBatch(id))),
            None => Ok(()),
        }
    }

    fn check_other(&self, other: &Deck) -> CardResult<()> {
        if self.key == other.key {
            return Err(self.reject(CardError::SameDeck(self.key.clone())));
        }
        Ok(())
    }

    /// Add cards to the bottom of this deck
    pub async fn add(&self, cards: &[Card]) -> CardResult<()> {
        let ids: Vec<CardId> = cards.iter().map(|card| card.id).collect();
        self.add_ids(&ids).await
    }

    /// Add card ids to the bottom of this deck, in the order given
    ///
    /// # Errors
    ///
    /// * `CardError::AlreadyInDeck` - Some ids are already in this deck
    /// * `CardError::DuplicateInBatch` - An id appears twice in `ids`
    pub async fn add_ids(&self, ids: &[CardId]) -> CardResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.check_distinct(ids)?;

        let members = to_members(ids);
        let replies = self
            .store
            .transaction(vec![
                Command::RequireAbsent {
                    key: self.key.clone(),
                    members: members.clone(),
                },
                Command::SortedAppend {
                    key: self.key.clone(),
                    members,
                },
            ])
            .await
            .map_err(|e| self.reject(e.into()))?;

        if let Some(reply) = replies.into_iter().last() {
            self.observe(reply.into_int()?);
        }

        log::debug!("Deck {}: added {} card(s)", self.key, ids.len());
        self.publish(TableEvent::AddCards {
            deck_key: self.key.clone(),
            ids: ids.to_vec(),
        });
        Ok(())
    }

    /// Move cards from this deck to the bottom of `to`
    pub async fn move_cards(&self, cards: &[Card], to: &Deck) -> CardResult<()> {
        let ids: Vec<CardId> = cards.iter().map(|card| card.id).collect();
        self.move_ids(&ids, to).await
    }

    /// Move card ids from this deck to the bottom of `to`, in the order given
    ///
    /// Removal and insertion happen in one transaction: an id is never in
    /// both decks or in neither.
    ///
    /// # Errors
    ///
    /// * `CardError::NotInDeck` - Some ids are not in this deck
    /// * `CardError::AlreadyInDeck` - Some ids are already in `to`
    /// * `CardError::SameDeck` - `to` is this deck
    pub async fn move_ids(&self, ids: &[CardId], to: &Deck) -> CardResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.check_other(to)?;
        self.check_distinct(ids)?;

        let members = to_members(ids);
        let replies = self
            .store
            .transaction(vec![
                Command::RequirePresent {
                    key: self.key.clone(),
                    members: members.clone(),
                },
                Command::RequireAbsent {
                    key: to.key.clone(),
                    members: members.clone(),
                },
                Command::SortedRemove {
                    key: self.key.clone(),
                    members: members.clone(),
                },
                Command::SortedAppend {
                    key: to.key.clone(),
                    members,
                },
            ])
            .await
            .map_err(|e| self.reject(e.into()))?;

        if let Some(reply) = replies.into_iter().last() {
            to.observe(reply.into_int()?);
        }

        log::debug!("Deck {}: moved {} card(s) to {}", self.key, ids.len(), to.key);
        self.publish(TableEvent::MoveCards {
            destination_key: to.key.clone(),
            ids: ids.to_vec(),
        });
        Ok(())
    }

    /// Move every card to the bottom of `to`, keeping their order, and delete
    /// this deck's storage.
    ///
    /// The handle stays usable afterwards and sees an empty deck; adding to it
    /// starts a fresh pile under the same key.
    ///
    /// # Errors
    ///
    /// * `CardError::AlreadyInDeck` - `to` already holds some of the cards; nothing moves
    /// * `CardError::SameDeck` - `to` is this deck
    pub async fn move_all(&self, to: &Deck) -> CardResult<Vec<CardId>> {
        self.check_other(to)?;

        let moved = self
            .store
            .execute(Command::SortedMoveAll {
                source: self.key.clone(),
                destination: to.key.clone(),
            })
            .await
            .map_err(|e| self.reject(e.into()))?
            .into_scored()?;

        if let Some((_, score)) = moved.last() {
            to.observe(*score);
        }
        self.max_score.store(0, Ordering::Release);

        let ids = parse_ids(&to.key, moved.into_iter().map(|(member, _)| member))?;
        log::debug!(
            "Deck {}: moved all {} card(s) to {}, deck removed",
            self.key,
            ids.len(),
            to.key
        );
        self.publish(TableEvent::MoveCards {
            destination_key: to.key.clone(),
            ids: ids.clone(),
        });
        Ok(ids)
    }

    /// Gather every card of `decks` into this deck, one source at a time.
    ///
    /// Each source is drained atomically, the batch as a whole is not: if a
    /// later source fails, the earlier ones stay drained.
    pub async fn move_all_from(&self, decks: &[Deck]) -> CardResult<()> {
        for deck in decks {
            deck.move_all(self).await?;
        }
        Ok(())
    }

    /// Move the top (lowest-scored) card to the bottom of `to` and return it.
    ///
    /// Returns `Ok(None)` without publishing anything when this deck is empty.
    ///
    /// # Errors
    ///
    /// * `CardError::AlreadyInDeck` - `to` already holds the top card; nothing moves
    /// * `CardError::SameDeck` - `to` is this deck
    /// * `CardError::NotFound` / `CardError::CorruptCard` - the card record
    ///   could not be read back. The move has already committed and its
    ///   `moveCards` event was published; only the returned card is missing.
    pub async fn draw_card(&self, to: &Deck) -> CardResult<Option<Card>> {
        self.check_other(to)?;

        let popped = self
            .store
            .execute(Command::SortedPopMinInto {
                source: self.key.clone(),
                destination: to.key.clone(),
            })
            .await
            .map_err(|e| self.reject(e.into()))?
            .into_scored()?;

        let Some((member, score)) = popped.into_iter().next() else {
            return Ok(None);
        };
        to.observe(score);

        let ids = parse_ids(&to.key, [member])?;
        log::debug!("Deck {}: drew card {} into {}", self.key, ids[0], to.key);
        self.publish(TableEvent::MoveCards {
            destination_key: to.key.clone(),
            ids: ids.clone(),
        });

        Ok(Some(self.registry.get(ids[0]).await?))
    }

    /// Number of cards in this deck
    pub async fn num_cards(&self) -> CardResult<usize> {
        let count = self
            .store
            .execute(Command::SortedCount {
                key: self.key.clone(),
            })
            .await?
            .into_int()?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Card ids from top to bottom
    pub async fn ids(&self) -> CardResult<Vec<CardId>> {
        let entries = self
            .store
            .execute(Command::SortedRange {
                key: self.key.clone(),
                limit: None,
            })
            .await?
            .into_scored()?;
        parse_ids(&self.key, entries.into_iter().map(|(member, _)| member))
    }

    /// Cards from top to bottom
    pub async fn cards(&self) -> CardResult<Vec<Card>> {
        let ids = self.ids().await?;
        self.registry.get_many(&ids).await
    }
}

impl fmt::Debug for Deck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deck")
            .field("name", &self.name)
            .field("key", &self.key)
            .field("table_id", &self.table_id)
            .field("max_score", &self.max_score())
            .finish()
    }
}
