//! Persisted batch cursor.

use tracing::warn;

use crate::error::ClientError;
use crate::store::{BATCH_CURSOR_KEY, LocalStore};

/// Highest local sequence number confirmed as stored by a batch submission.
///
/// Never moves backwards except through [`reset`](Self::reset).
#[derive(Debug)]
pub struct BatchCursor {
    store: LocalStore,
    last: u64,
}

impl BatchCursor {
    /// Load the cursor; unreadable state loads as 0.
    pub async fn load(store: LocalStore) -> Self {
        let last = store.get_counter(BATCH_CURSOR_KEY).await.unwrap_or_else(|e| {
            warn!(error = %e, "batch cursor unreadable, resending from the start");
            0
        });
        Self { store, last }
    }

    /// The confirmed sequence number.
    pub const fn last(&self) -> u64 {
        self.last
    }

    /// Move the cursor to `seq` if that is ahead of it.
    ///
    /// Returns whether the cursor moved.
    pub const fn advance(&mut self, seq: u64) -> bool {
        if seq > self.last {
            self.last = seq;
            true
        } else {
            false
        }
    }

    /// Persist the cursor.
    pub async fn save(&self) -> Result<(), ClientError> {
        self.store
            .put(BATCH_CURSOR_KEY, &self.last.to_string())
            .await
    }

    /// Move the cursor back to 0 for a new journal epoch.
    pub async fn reset(&mut self) -> Result<(), ClientError> {
        self.last = 0;
        self.store.del(BATCH_CURSOR_KEY).await
    }
}
