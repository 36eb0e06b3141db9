//! Card data models.

use super::errors::{CardError, CardResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Globally unique card identity
pub type CardId = i64;

/// Logical card value, in `[0, total_cards)`
pub type CardValue = u32;

/// Token id of a card in the external ledger
pub type TokenId = i64;

/// Token id of cards not backed by a ledger token
pub const NO_TOKEN: TokenId = -1;

/// Immutable card record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    /// Carries no information about the card itself
    pub id: CardId,
    pub value: CardValue,
    pub token_id: TokenId,
    /// Opaque metadata location, empty if none
    pub metadata_uri: String,
}

impl Card {
    /// Whether this card is backed by a ledger token
    pub fn is_tokenized(&self) -> bool {
        self.token_id != NO_TOKEN
    }

    /// Hash fields persisted for this card
    pub(crate) fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            ("id".to_string(), self.id.to_string()),
            ("value".to_string(), self.value.to_string()),
            ("token_id".to_string(), self.token_id.to_string()),
            ("metadata_uri".to_string(), self.metadata_uri.clone()),
        ]
    }

    /// Rebuild a card from its hash fields
    pub(crate) fn from_fields(id: CardId, fields: &BTreeMap<String, String>) -> CardResult<Self> {
        if fields.is_empty() {
            return Err(CardError::NotFound(id));
        }

        let stored_id: CardId = parse_field(id, fields, "id")?;
        if stored_id != id {
            return Err(CardError::CorruptCard { id, field: "id" });
        }

        Ok(Self {
            id,
            value: parse_field(id, fields, "value")?,
            token_id: parse_field(id, fields, "token_id")?,
            metadata_uri: fields
                .get("metadata_uri")
                .cloned()
                .ok_or(CardError::CorruptCard {
                    id,
                    field: "metadata_uri",
                })?,
        })
    }
}

fn parse_field<T: std::str::FromStr>(
    id: CardId,
    fields: &BTreeMap<String, String>,
    field: &'static str,
) -> CardResult<T> {
    fields
        .get(field)
        .and_then(|raw| raw.parse().ok())
        .ok_or(CardError::CorruptCard { id, field })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card() -> Card {
        Card {
            id: 7,
            value: 21,
            token_id: 1021,
            metadata_uri: "ipfs://bafy/21.json".to_string(),
        }
    }

    #[test]
    fn test_fields_round_trip() {
        let card = card();
        let fields: BTreeMap<String, String> = card.to_fields().into_iter().collect();
        assert_eq!(Card::from_fields(7, &fields).unwrap(), card);
    }

    #[test]
    fn test_empty_fields_are_not_found() {
        let result = Card::from_fields(99, &BTreeMap::new());
        assert!(matches!(result, Err(CardError::NotFound(99))));
    }

    #[test]
    fn test_malformed_fields_are_corrupt() {
        let mut fields: BTreeMap<String, String> = card().to_fields().into_iter().collect();
        fields.insert("value".to_string(), "high".to_string());
        let result = Card::from_fields(7, &fields);
        assert!(matches!(
            result,
            Err(CardError::CorruptCard { id: 7, field: "value" })
        ));

        fields.remove("value");
        assert!(Card::from_fields(7, &fields).is_err());
    }

    #[test]
    fn test_tokenized() {
        assert!(card().is_tokenized());
        let loaner = Card {
            token_id: NO_TOKEN,
            metadata_uri: String::new(),
            ..card()
        };
        assert!(!loaner.is_tokenized());
    }
}
