//! Table event broadcasting.
//!
//! Every structural deck change is announced to the table's observers after
//! the store transaction behind it has committed. Delivery is fire-and-forget:
//! a publish never fails the mutation that triggered it.

use crate::cards::CardId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Deck change announced to table observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum TableEvent {
    /// A deck handle was loaded, with its current contents
    #[serde(rename_all = "camelCase")]
    InitDeck { deck_key: String, ids: Vec<CardId> },

    /// Cards were added to a deck
    #[serde(rename_all = "camelCase")]
    AddCards { deck_key: String, ids: Vec<CardId> },

    /// Cards were moved into the destination deck
    #[serde(rename_all = "camelCase")]
    MoveCards {
        destination_key: String,
        ids: Vec<CardId>,
    },
}

impl TableEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            TableEvent::InitDeck { .. } => "initDeck",
            TableEvent::AddCards { .. } => "addCards",
            TableEvent::MoveCards { .. } => "moveCards",
        }
    }

    pub fn ids(&self) -> &[CardId] {
        match self {
            TableEvent::InitDeck { ids, .. }
            | TableEvent::AddCards { ids, .. }
            | TableEvent::MoveCards { ids, .. } => ids,
        }
    }
}

/// Event addressed to one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableNotification {
    pub table_id: String,
    #[serde(flatten)]
    pub event: TableEvent,
}

/// Fire-and-forget publisher of table events
pub trait Broadcaster: Send + Sync {
    fn publish(&self, table_id: &str, event: TableEvent);
}

/// Broadcaster fanning events out to tokio broadcast subscribers
#[derive(Clone)]
pub struct ChannelBroadcaster {
    sender: broadcast::Sender<TableNotification>,
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<TableNotification> {
        self.sender.subscribe()
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn publish(&self, table_id: &str, event: TableEvent) {
        let name = event.name();
        let notification = TableNotification {
            table_id: table_id.to_string(),
            event,
        };
        // Only fails when nobody is listening
        if self.sender.send(notification).is_err() {
            log::trace!("No observers for table {table_id}, dropped {name}");
        }
    }
}
