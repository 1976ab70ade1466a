//! Per-conversation turn guard.
//!
//! At most one turn may be in flight per conversation within a process.
//! A second turn on a guarded conversation is rejected immediately rather
//! than queued. Cross-process ordering is handled by the message log's
//! version check.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parley_types::error::TurnError;
use uuid::Uuid;

/// Shared set of conversations that currently have a turn in flight.
///
/// Cloning is cheap; clones share the same set.
#[derive(Debug, Clone, Default)]
pub struct TurnGuard {
    active: Arc<DashMap<Uuid, ()>>,
}

impl TurnGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the conversation for one turn.
    ///
    /// Returns `TurnError::Conflict` if another turn already holds it. The
    /// claim is released when the returned permit is dropped.
    pub fn acquire(&self, conversation_id: Uuid) -> Result<TurnPermit, TurnError> {
        match self.active.entry(conversation_id) {
            Entry::Occupied(_) => Err(TurnError::Conflict(conversation_id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(TurnPermit {
                    active: Arc::clone(&self.active),
                    conversation_id,
                })
            }
        }
    }

    /// Whether a turn is in flight for the conversation.
    #[cfg(test)]
    fn is_active(&self, conversation_id: &Uuid) -> bool {
        self.active.contains_key(conversation_id)
    }
}

/// Exclusive claim on one conversation; released on drop.
#[derive(Debug)]
pub struct TurnPermit {
    active: Arc<DashMap<Uuid, ()>>,
    conversation_id: Uuid,
}

impl Drop for TurnPermit {
    fn drop(&mut self) {
        self.active.remove(&self.conversation_id);
    }
}
