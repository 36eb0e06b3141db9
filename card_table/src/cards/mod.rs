//! Card registry and ownership index.
//!
//! Cards are minted once by the [`CardRegistry`] and never change. The
//! [`OwnershipIndex`] records which cards a participant owns permanently,
//! both as a flat set and per logical value ordered by ledger token id.

pub mod errors;
pub mod models;
pub mod ownership;
pub mod registry;

pub use errors::{CardError, CardResult};
pub use models::{Card, CardId, CardValue, NO_TOKEN, TokenId};
pub use ownership::OwnershipIndex;
pub use registry::CardRegistry;

/// Store members for a list of card ids
pub(crate) fn to_members(ids: &[CardId]) -> Vec<String> {
    ids.iter().map(CardId::to_string).collect()
}

/// Parse store members back into card ids
pub(crate) fn parse_ids<I>(key: &str, members: I) -> CardResult<Vec<CardId>>
where
    I: IntoIterator<Item = String>,
{
    members
        .into_iter()
        .map(|member| {
            member.parse().map_err(|_| CardError::InvalidMember {
                key: key.to_string(),
                member,
            })
        })
        .collect()
}
