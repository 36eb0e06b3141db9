//! Storage layer: an ordered key/value store with atomic command batches.
//!
//! All card, ownership and deck state is kept in a store exposing counters,
//! hashes, sets and sorted sets under string keys. A batch of [`Command`]s
//! passed to [`Store::transaction`] runs atomically: either every command
//! applies or none does. Guard commands (`RequirePresent`, `RequireAbsent`)
//! abort the batch when their condition fails, which is how check-then-mutate
//! operations stay safe without in-process locks.
//!
//! ## Backends
//!
//! - [`MemoryStore`]: in-process keyspace, used by tests and single-node tools
//! - [`PgStore`]: PostgreSQL via sqlx, serialized per key with advisory locks
//! - [`TimeoutStore`]: wraps another store and bounds every call
//!
//! ## Example
//!
//! ```
//! use card_table::store::{Command, MemoryStore, Store};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), card_table::store::StoreError> {
//!     let store = MemoryStore::new();
//!     let replies = store
//!         .transaction(vec![
//!             Command::Incr { key: "counter".to_string() },
//!             Command::Incr { key: "counter".to_string() },
//!         ])
//!         .await?;
//!     assert_eq!(replies.len(), 2);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use std::collections::BTreeMap;

pub mod errors;
pub mod keys;
pub mod memory;
pub mod postgres;
pub mod timeout;

pub use errors::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use timeout::TimeoutStore;

/// Sorted set score
pub type Score = i64;

/// A single store operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Increment a counter (created at zero), replies `Int` with the new value
    Incr { key: String },

    /// Set hash fields, replies `Unit`
    HashSet {
        key: String,
        fields: Vec<(String, String)>,
    },

    /// Read a whole hash, replies `Hash` (empty when the key is absent)
    HashGetAll { key: String },

    /// Add set members, replies `Int` with the number newly added
    SetAdd { key: String, members: Vec<String> },

    /// Read set members, replies `Members`
    SetMembers { key: String },

    /// Whether the key holds a non-empty value, replies `Bool`
    Exists { key: String },

    /// Remove the key and everything stored under it, replies `Bool`
    Delete { key: String },

    /// Insert members with explicit scores, replies `Int` with the number newly added
    SortedAdd {
        key: String,
        entries: Vec<(Score, String)>,
    },

    /// Insert members with store-assigned scores above the key's high-water
    /// mark, in order. Replies `Int` with the new high-water mark.
    SortedAppend { key: String, members: Vec<String> },

    /// Members by ascending score (ties by member), replies `Scored`
    SortedRange { key: String, limit: Option<usize> },

    /// Remove members, replies `Int` with the number removed
    SortedRemove { key: String, members: Vec<String> },

    /// Scores of the given members, replies `Scores` in request order
    SortedScores { key: String, members: Vec<String> },

    /// Member count, replies `Int`
    SortedCount { key: String },

    /// Highest score ever assigned under the key, replies `Int`
    SortedHighWater { key: String },

    /// Pop the lowest-scored member of `source` and append it to
    /// `destination`. Replies `Scored` with zero or one entry carrying the
    /// destination score. Fails with `MembersPresent` if `destination`
    /// already holds the popped member.
    SortedPopMinInto {
        source: String,
        destination: String,
    },

    /// Append every member of `source` to `destination` in score order, then
    /// delete `source`. Replies `Scored` with the destination scores. Fails
    /// with `MembersPresent` if `destination` already holds any of them.
    SortedMoveAll {
        source: String,
        destination: String,
    },

    /// Abort unless every member is in the sorted set, replies `Unit`
    RequirePresent { key: String, members: Vec<String> },

    /// Abort if any member is in the sorted set, replies `Unit`
    RequireAbsent { key: String, members: Vec<String> },
}

impl Command {
    /// Keys touched by this command
    pub fn keys(&self) -> Vec<&str> {
        match self {
            Command::Incr { key }
            | Command::HashSet { key, .. }
            | Command::HashGetAll { key }
            | Command::SetAdd { key, .. }
            | Command::SetMembers { key }
            | Command::Exists { key }
            | Command::Delete { key }
            | Command::SortedAdd { key, .. }
            | Command::SortedAppend { key, .. }
            | Command::SortedRange { key, .. }
            | Command::SortedRemove { key, .. }
            | Command::SortedScores { key, .. }
            | Command::SortedCount { key }
            | Command::SortedHighWater { key }
            | Command::RequirePresent { key, .. }
            | Command::RequireAbsent { key, .. } => vec![key.as_str()],
            Command::SortedPopMinInto {
                source,
                destination,
            }
            | Command::SortedMoveAll {
                source,
                destination,
            } => vec![source.as_str(), destination.as_str()],
        }
    }
}

/// Result of a single command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Unit,
    Int(i64),
    Bool(bool),
    Hash(BTreeMap<String, String>),
    Members(Vec<String>),
    Scored(Vec<(String, Score)>),
    Scores(Vec<Option<Score>>),
}

impl Reply {
    pub fn into_int(self) -> StoreResult<i64> {
        match self {
            Reply::Int(value) => Ok(value),
            _ => Err(StoreError::UnexpectedReply("integer")),
        }
    }

    pub fn into_bool(self) -> StoreResult<bool> {
        match self {
            Reply::Bool(value) => Ok(value),
            _ => Err(StoreError::UnexpectedReply("boolean")),
        }
    }

    pub fn into_hash(self) -> StoreResult<BTreeMap<String, String>> {
        match self {
            Reply::Hash(fields) => Ok(fields),
            _ => Err(StoreError::UnexpectedReply("hash")),
        }
    }

    pub fn into_members(self) -> StoreResult<Vec<String>> {
        match self {
            Reply::Members(members) => Ok(members),
            _ => Err(StoreError::UnexpectedReply("members")),
        }
    }

    pub fn into_scored(self) -> StoreResult<Vec<(String, Score)>> {
        match self {
            Reply::Scored(entries) => Ok(entries),
            _ => Err(StoreError::UnexpectedReply("scored members")),
        }
    }

    pub fn into_scores(self) -> StoreResult<Vec<Option<Score>>> {
        match self {
            Reply::Scores(scores) => Ok(scores),
            _ => Err(StoreError::UnexpectedReply("scores")),
        }
    }
}

/// Ordered key/value store
#[async_trait]
pub trait Store: Send + Sync {
    /// Run `commands` atomically, returning one reply per command
    async fn transaction(&self, commands: Vec<Command>) -> StoreResult<Vec<Reply>>;

    /// Run a single command
    async fn execute(&self, command: Command) -> StoreResult<Reply> {
        self.transaction(vec![command])
            .await?
            .pop()
            .ok_or(StoreError::UnexpectedReply("one reply"))
    }
}
