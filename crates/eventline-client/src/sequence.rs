//! Monotonic local sequence numbers that survive restarts.

use tracing::warn;

use crate::error::ClientError;
use crate::store::{LocalStore, SEQUENCE_KEY};

/// Issues strictly increasing sequence numbers starting at 1.
///
/// On load the counter resumes from the greater of the stored counter and
/// the highest sequence number already in the journal, so a lost counter
/// write never leads to a reused number. A [`reset`](Self::reset) starts a
/// new journal epoch whose numbers are not comparable with earlier ones.
#[derive(Debug)]
pub struct SequenceAllocator {
    store: LocalStore,
    current: u64,
}

impl SequenceAllocator {
    /// Load the counter, merging it with the journal's highest `seq`.
    pub async fn load(store: LocalStore, journal_max_seq: u64) -> Self {
        let stored = store.get_counter(SEQUENCE_KEY).await.unwrap_or_else(|e| {
            warn!(error = %e, "sequence counter unreadable, using journal");
            0
        });
        Self {
            store,
            current: stored.max(journal_max_seq),
        }
    }

    /// Return the next sequence number.
    ///
    /// Only advances the in-memory counter; call [`save`](Self::save) to
    /// persist it.
    pub const fn next(&mut self) -> u64 {
        self.current = self.current.saturating_add(1);
        self.current
    }

    /// The most recently issued number, or 0 if none in this epoch.
    pub const fn current(&self) -> u64 {
        self.current
    }

    /// Persist the counter.
    pub async fn save(&self) -> Result<(), ClientError> {
        self.store
            .put(SEQUENCE_KEY, &self.current.to_string())
            .await
    }

    /// Start a new epoch: the next call to [`next`](Self::next) returns 1.
    pub async fn reset(&mut self) -> Result<(), ClientError> {
        self.current = 0;
        self.store.del(SEQUENCE_KEY).await
    }
}
