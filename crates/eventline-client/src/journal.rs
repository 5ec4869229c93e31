//! Durable local journal of logged events.
//!
//! The journal is the client's source of truth for replay and
//! reconciliation. It is kept in memory and rewritten to local storage as a
//! JSON array on every append.

use eventline_types::JournalEntry;
use tracing::warn;

use crate::error::ClientError;
use crate::store::{JOURNAL_KEY, LocalStore};

/// Ordered, durable append log of [`JournalEntry`] values.
#[derive(Debug)]
pub struct LocalEventJournal {
    store: LocalStore,
    entries: Vec<JournalEntry>,
}

impl LocalEventJournal {
    /// Load the journal from `store`.
    ///
    /// Missing, unreadable, or unparsable state loads as an empty journal.
    pub async fn load(store: LocalStore) -> Self {
        let entries = match store.get(JOURNAL_KEY).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "local journal is corrupt, starting empty");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "local journal unreadable, starting empty");
                Vec::new()
            }
        };
        Self { store, entries }
    }

    /// Append `entry` and persist the whole journal.
    ///
    /// The entry is kept in memory even if persisting fails, so `all()`
    /// always reflects every logged event of this process.
    pub async fn append(&mut self, entry: JournalEntry) -> Result<(), ClientError> {
        self.entries.push(entry);
        self.persist().await
    }

    /// Every entry in append order.
    pub fn all(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Entries with a sequence number above `seq`, in append order.
    pub fn after(&self, seq: u64) -> impl Iterator<Item = &JournalEntry> {
        self.entries.iter().filter(move |entry| entry.seq > seq)
    }

    /// Highest sequence number in the journal, or 0 when empty.
    pub fn max_seq(&self) -> u64 {
        self.entries.iter().map(|entry| entry.seq).max().unwrap_or(0)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the journal has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Empty the journal in memory and remove it from storage.
    pub async fn clear(&mut self) -> Result<(), ClientError> {
        self.entries.clear();
        self.store.del(JOURNAL_KEY).await
    }

    async fn persist(&self) -> Result<(), ClientError> {
        let raw = serde_json::to_string(&self.entries)?;
        self.store.put(JOURNAL_KEY, &raw).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn entry(seq: u64) -> JournalEntry {
        JournalEntry {
            seq,
            event_type: None,
            message: format!("event {seq}"),
            local_time: String::from("2024-07-01T10:00:00.000Z"),
            extra: None,
        }
    }

    #[tokio::test]
    async fn append_then_all_ends_with_entry() {
        let mut journal = LocalEventJournal::load(LocalStore::memory()).await;

        journal.append(entry(1)).await.unwrap();
        journal.append(entry(2)).await.unwrap();

        let seqs: Vec<u64> = journal.all().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2]);
        assert_eq!(journal.all().last().unwrap(), &entry(2));
    }

    #[tokio::test]
    async fn appended_entries_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::fs(dir.path());
        {
            let mut journal = LocalEventJournal::load(store.clone()).await;
            journal.append(entry(1)).await.unwrap();
            journal.append(entry(2)).await.unwrap();
        }

        let journal = LocalEventJournal::load(store).await;
        assert_eq!(journal.len(), 2);
        assert_eq!(journal.max_seq(), 2);
        assert_eq!(journal.all()[1].message, "event 2");
    }

    #[tokio::test]
    async fn corrupt_state_loads_empty() {
        let store = LocalStore::memory();
        store.put(JOURNAL_KEY, "[{\"seq\":1,").await.unwrap();

        let journal = LocalEventJournal::load(store).await;
        assert!(journal.is_empty());
        assert_eq!(journal.max_seq(), 0);
    }

    #[tokio::test]
    async fn failed_persist_keeps_entry_in_memory() {
        let inner = MemoryStore::default();
        let mut journal = LocalEventJournal::load(LocalStore::Memory(inner.clone())).await;
        inner.set_fail_writes(true);

        let result = journal.append(entry(1)).await;

        assert!(matches!(result, Err(ClientError::StorageUnavailable(_))));
        assert_eq!(journal.len(), 1);
    }

    #[tokio::test]
    async fn after_filters_by_seq() {
        let mut journal = LocalEventJournal::load(LocalStore::memory()).await;
        for seq in 1..=4 {
            journal.append(entry(seq)).await.unwrap();
        }

        let pending: Vec<u64> = journal.after(2).map(|e| e.seq).collect();
        assert_eq!(pending, vec![3, 4]);
    }

    #[tokio::test]
    async fn clear_removes_stored_journal() {
        let store = LocalStore::memory();
        let mut journal = LocalEventJournal::load(store.clone()).await;
        journal.append(entry(1)).await.unwrap();

        journal.clear().await.unwrap();

        assert!(journal.is_empty());
        assert_eq!(store.get(JOURNAL_KEY).await.unwrap(), None);
    }
}
