//! Card, ownership and deck error types.

use super::models::{CardId, CardValue};
use crate::store::StoreError;
use thiserror::Error;

/// Card errors
#[derive(Debug, Error)]
pub enum CardError {
    /// Storage error
    #[error("Store error: {0}")]
    Store(StoreError),

    /// Card id was never registered
    #[error("Card {0} not found")]
    NotFound(CardId),

    /// Card value outside `[0, total_cards)`
    #[error("Card value {value} out of range, expected 0..{total_cards}")]
    InvalidValue {
        value: CardValue,
        total_cards: CardValue,
    },

    /// Stored record is missing a field or holds an unparsable one
    #[error("Card {id} has a corrupt {field} field")]
    CorruptCard { id: CardId, field: &'static str },

    /// Stored member is not a card id
    #[error("Invalid card id {member:?} in {key}")]
    InvalidMember { key: String, member: String },

    /// Cards are already in the target deck
    #[error("Cards {ids:?} already in deck {deck}")]
    AlreadyInDeck { deck: String, ids: Vec<String> },

    /// Cards are not in the source deck
    #[error("Cards {ids:?} not in deck {deck}")]
    NotInDeck { deck: String, ids: Vec<String> },

    /// The same card id appears twice in one batch
    #[error("Card {0} appears more than once in the batch")]
    DuplicateInBatch(CardId),

    /// Source and destination are the same deck
    #[error("Cannot move cards from deck {0} into itself")]
    SameDeck(String),
}

impl CardError {
    /// Whether the caller broke an operation precondition
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            CardError::AlreadyInDeck { .. }
                | CardError::NotInDeck { .. }
                | CardError::DuplicateInBatch(_)
                | CardError::SameDeck(_)
                | CardError::InvalidValue { .. }
        )
    }

    /// Get a client-safe error message that doesn't leak storage internals
    pub fn client_message(&self) -> String {
        match self {
            CardError::Store(StoreError::Timeout(_)) => "Service busy, try again".to_string(),
            CardError::Store(_) | CardError::InvalidMember { .. } => {
                "Internal server error".to_string()
            }
            CardError::CorruptCard { id, .. } => format!("Card {id} is unavailable"),
            _ => self.to_string(),
        }
    }
}

impl From<StoreError> for CardError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::MembersPresent { key, members } => CardError::AlreadyInDeck {
                deck: key,
                ids: members,
            },
            StoreError::MembersMissing { key, members } => CardError::NotInDeck {
                deck: key,
                ids: members,
            },
            other => CardError::Store(other),
        }
    }
}

/// Result type for card operations
pub type CardResult<T> = Result<T, CardError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_guard_failures_become_precondition_errors() {
        let err = CardError::from(StoreError::MembersPresent {
            key: "t:deck:a".to_string(),
            members: vec!["3".to_string()],
        });
        assert!(matches!(err, CardError::AlreadyInDeck { ref deck, .. } if deck == "t:deck:a"));
        assert!(err.is_precondition());

        let err = CardError::from(StoreError::MembersMissing {
            key: "t:deck:a".to_string(),
            members: vec!["3".to_string()],
        });
        assert!(matches!(err, CardError::NotInDeck { .. }));
        assert!(err.is_precondition());
    }

    #[test]
    fn test_client_message_hides_storage() {
        let err = CardError::from(StoreError::WrongType {
            key: "secret:key".to_string(),
        });
        assert!(!err.is_precondition());
        assert_eq!(err.client_message(), "Internal server error");

        let err = CardError::from(StoreError::Timeout(Duration::from_secs(5)));
        assert_eq!(err.client_message(), "Service busy, try again");

        assert_eq!(CardError::NotFound(4).client_message(), "Card 4 not found");

        let err = CardError::InvalidValue {
            value: 80,
            total_cards: 78,
        };
        assert!(err.is_precondition());
        assert_eq!(
            err.client_message(),
            "Card value 80 out of range, expected 0..78"
        );
    }
}
