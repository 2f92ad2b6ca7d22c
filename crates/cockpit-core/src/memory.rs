//! Bounded per-(user, agent) conversation history.

use claude_agent::ChatMessage;

use crate::error::Result;
use crate::store::{KvStore, Txn};
use crate::types::Agent;

pub const DEFAULT_MAX_ENTRIES: usize = 10;

fn history_key(user: &str, agent: Agent) -> String {
    format!("{user}:{agent}")
}

fn last_active_key(user: &str) -> String {
    format!("{user}:last_active")
}

/// Keep only the most recent `max` entries, preserving order.
pub fn trim_history(history: &mut Vec<ChatMessage>, max: usize) {
    if history.len() > max {
        history.drain(..history.len() - max);
    }
}

/// A history that fails to decode is treated as empty rather than fatal.
fn read_history(txn_value: Option<serde_json::Value>, key: &str) -> Vec<ChatMessage> {
    match txn_value {
        None => Vec::new(),
        Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::warn!(key, error = %e, "discarding malformed conversation history");
            Vec::new()
        }),
    }
}

#[derive(Debug, Clone)]
pub struct MemoryStore {
    kv: KvStore,
    max_entries: usize,
}

impl MemoryStore {
    pub fn new(kv: KvStore, max_entries: usize) -> Self {
        Self { kv, max_entries }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// At most `max_entries` entries, oldest first.
    pub fn get(&self, user: &str, agent: Agent) -> Result<Vec<ChatMessage>> {
        let key = history_key(user, agent);
        let mut history = read_history(self.kv.get(&key)?, &key);
        trim_history(&mut history, self.max_entries);
        Ok(history)
    }

    /// Append one exchange and trim, as a single write transaction.
    ///
    /// Two appends for the same pair never overwrite each other: the second
    /// transaction reads the history the first one committed.
    pub fn append(
        &self,
        user: &str,
        agent: Agent,
        user_text: &str,
        assistant_text: &str,
    ) -> Result<Vec<ChatMessage>> {
        let key = history_key(user, agent);
        let max = self.max_entries;
        let history = self.kv.transact(|txn| {
            let mut history = read_history(txn.get(&key)?, &key);
            history.push(ChatMessage::user(user_text));
            history.push(ChatMessage::assistant(assistant_text));
            trim_history(&mut history, max);
            txn.set(&key, &history)?;
            Ok(history)
        })?;
        tracing::debug!(user, %agent, entries = history.len(), "conversation memory updated");
        Ok(history)
    }

    /// Forget every agent's history for `user` and the last-active pointer.
    pub fn clear(&self, user: &str) -> Result<()> {
        self.kv.transact(|txn| clear_in(txn, user))?;
        tracing::info!(user, "conversation memory cleared");
        Ok(())
    }

    pub fn last_active(&self, user: &str) -> Result<Option<Agent>> {
        let raw: Option<String> = self.kv.get(&last_active_key(user))?;
        Ok(raw.and_then(|name| name.parse().ok()))
    }

    pub fn set_last_active(&self, user: &str, agent: Agent) -> Result<()> {
        self.kv.set(&last_active_key(user), &agent.as_str())
    }
}

fn clear_in(txn: &mut Txn<'_>, user: &str) -> Result<()> {
    for agent in Agent::all() {
        txn.remove(&history_key(user, *agent))?;
    }
    txn.remove(&last_active_key(user))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
