//! Recording session facade.
//!
//! [`Session`] wires the allocator, journal, cursor, and the two delivery
//! queues together and owns the policy for failures the primitives report:
//! local persistence and delivery failures are logged and never stop event
//! recording.

use chrono::{SecondsFormat, Utc};
use eventline_types::{
    BatchId, BatchPayload, Channel, EventsSnapshot, InstantPayload, InstantRecord, JournalEntry,
    Metadata,
};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::cursor::BatchCursor;
use crate::delivery::{DeliveryHandle, DeliveryQueue};
use crate::error::ClientError;
use crate::http::EventsClient;
use crate::journal::LocalEventJournal;
use crate::reconcile::{Alignment, ReconciliationView};
use crate::sequence::SequenceAllocator;
use crate::store::LocalStore;

/// Most events one batch request carries; matches the server's default
/// `max_batch_events`.
pub const MAX_BATCH_EVENTS: usize = 5000;

/// Result of [`Session::log_event`].
#[derive(Debug)]
pub struct LoggedEvent {
    /// The journal entry that was recorded.
    pub entry: JournalEntry,
    /// Whether the counter and journal reached local storage.
    pub persisted: Result<(), ClientError>,
    /// Outcome of the instant-channel send.
    pub delivery: DeliveryHandle<InstantRecord>,
}

/// What happened to the batch flush during [`Session::close`].
#[derive(Debug)]
pub enum BatchOutcome {
    /// No journal entry was past the batch cursor.
    NothingPending,
    /// The server stored every pending entry and the cursor moved to
    /// `through_seq`.
    Sent {
        /// Id the server assigned to the last batch request.
        batch_id: BatchId,
        /// Batch requests sent.
        batches: usize,
        /// Records stored across all requests.
        stored: usize,
        /// New cursor position.
        through_seq: u64,
    },
    /// A batch request was not acknowledged. The cursor stays after the
    /// last acknowledged request.
    Failed(ClientError),
}

/// Result of [`Session::close`].
#[derive(Debug)]
pub struct CloseReport {
    /// Batch flush outcome.
    pub batch: BatchOutcome,
    /// Server state read back after the flush.
    pub snapshot: Result<EventsSnapshot, ClientError>,
    /// Server instant records paired with the local journal.
    pub view: ReconciliationView,
}

/// A client recording session.
#[derive(Debug)]
pub struct Session {
    client: EventsClient,
    sequence: SequenceAllocator,
    cursor: BatchCursor,
    journal: LocalEventJournal,
    instant: DeliveryQueue,
    batch: DeliveryQueue,
    alignment: Alignment,
    max_batch: usize,
}

impl Session {
    /// Open a session using file-backed state under `config.state_dir`.
    pub async fn open(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = EventsClient::new(&config.server_url, config.request_timeout)?;
        let store = LocalStore::fs(&config.state_dir);
        Ok(Self::with_store(store, client).await)
    }

    /// Open a session over an existing store and HTTP client.
    ///
    /// Restores the journal, then the sequence counter (merged with the
    /// journal's highest `seq`), then the batch cursor.
    pub async fn with_store(store: LocalStore, client: EventsClient) -> Self {
        let journal = LocalEventJournal::load(store.clone()).await;
        let sequence = SequenceAllocator::load(store.clone(), journal.max_seq()).await;
        let cursor = BatchCursor::load(store).await;

        info!(
            server = client.base_url(),
            entries = journal.len(),
            next_seq = sequence.current().saturating_add(1),
            batch_cursor = cursor.last(),
            "session opened"
        );

        Self {
            instant: DeliveryQueue::spawn(Channel::Instant, client.clone()),
            batch: DeliveryQueue::spawn(Channel::Batch, client.clone()),
            client,
            sequence,
            cursor,
            journal,
            alignment: Alignment::default(),
            max_batch: MAX_BATCH_EVENTS,
        }
    }

    /// Choose how [`close`](Self::close) pairs server and local rows.
    #[must_use]
    pub const fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Cap the number of events per batch request (at least 1).
    #[must_use]
    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch.max(1);
        self
    }

    /// The local journal.
    pub const fn journal(&self) -> &LocalEventJournal {
        &self.journal
    }

    /// The confirmed batch cursor.
    pub const fn batch_cursor(&self) -> u64 {
        self.cursor.last()
    }

    /// The most recently issued sequence number.
    pub const fn current_seq(&self) -> u64 {
        self.sequence.current()
    }

    /// Journal entries not yet confirmed by a batch.
    pub fn pending_batch(&self) -> usize {
        self.journal.after(self.cursor.last()).count()
    }

    /// Record one event.
    ///
    /// Trims `message` and refuses a blank one before any `seq` is
    /// allocated. Otherwise allocates the next `seq`, persists the counter,
    /// appends the journal entry stamped with the current UTC time, and
    /// enqueues the event on the instant channel. Persistence failures are
    /// logged and reported in the result; they never prevent the send.
    pub async fn log_event(
        &mut self,
        event_type: Option<&str>,
        message: &str,
        extra: Option<Metadata>,
    ) -> Result<LoggedEvent, ClientError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ClientError::EmptyMessage);
        }

        let entry = JournalEntry {
            seq: self.sequence.next(),
            event_type: event_type.map(ToOwned::to_owned),
            message: message.to_owned(),
            local_time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            extra,
        };

        let counter_saved = self.sequence.save().await;
        let journal_saved = self.journal.append(entry.clone()).await;
        let persisted = counter_saved.and(journal_saved);
        if let Err(ref e) = persisted {
            warn!(seq = entry.seq, error = %e, "event not persisted locally");
        }

        let delivery = self.instant.send_instant(InstantPayload::from(&entry));
        debug!(seq = entry.seq, "event logged");

        Ok(LoggedEvent {
            entry,
            persisted,
            delivery,
        })
    }

    /// Close the session.
    ///
    /// Waits for queued instant sends to settle, flushes every journal entry
    /// past the batch cursor in requests of at most `max_batch` events,
    /// moving the cursor after each acknowledged request, then reads back the server state and pairs
    /// its instant records with the local journal. A failed read-back
    /// reconciles against an empty server history.
    pub async fn close(&mut self) -> CloseReport {
        if let Err(e) = self.instant.drain().await {
            warn!(error = %e, "instant queue did not drain");
        }

        let batch = self.flush_batch().await;
        let snapshot = self.client.fetch_events().await;
        if let Err(ref e) = snapshot {
            warn!(error = %e, "could not read server events");
        }

        let server = snapshot
            .as_ref()
            .map(|s| s.instant.as_slice())
            .unwrap_or_default();
        let view = ReconciliationView::build(server, self.journal.all(), self.alignment);

        CloseReport {
            batch,
            snapshot,
            view,
        }
    }

    async fn flush_batch(&mut self) -> BatchOutcome {
        let since = self.cursor.last();
        let payloads: Vec<BatchPayload> = self
            .journal
            .after(since)
            .collect::<Vec<_>>()
            .chunks(self.max_batch)
            .map(|chunk| BatchPayload::from_entries(chunk.iter().copied()))
            .collect();

        let mut last = None;
        let mut batches = 0_usize;
        let mut stored = 0_usize;
        for payload in payloads {
            let Some(through_seq) = payload.events.iter().map(|item| item.seq).max() else {
                continue;
            };
            let count = payload.events.len();

            let ack = match self.batch.send_batch(payload).outcome().await {
                Ok(ack) => ack,
                Err(e) => {
                    warn!(since = self.cursor.last(), count, error = %e, "batch flush failed");
                    return BatchOutcome::Failed(e);
                }
            };

            self.cursor.advance(through_seq);
            if let Err(e) = self.cursor.save().await {
                warn!(error = %e, "batch cursor not persisted");
            }
            info!(batch_id = %ack.batch_id, stored = ack.stored, through_seq, "batch flushed");
            batches = batches.saturating_add(1);
            stored = stored.saturating_add(ack.stored);
            last = Some(ack.batch_id);
        }

        let through_seq = self.cursor.last();
        last.map_or(BatchOutcome::NothingPending, |batch_id| BatchOutcome::Sent {
            batch_id,
            batches,
            stored,
            through_seq,
        })
    }

    /// Start a new journal epoch and wipe the server logs.
    ///
    /// Resets the counter, cursor, and journal locally even if some of the
    /// storage removals fail, waits for queued instant sends, then sends
    /// `DELETE /api/events`. Returns the first failure encountered.
    pub async fn clear(&mut self) -> Result<(), ClientError> {
        let local = [
            self.sequence.reset().await,
            self.cursor.reset().await,
            self.journal.clear().await,
        ];
        if let Err(e) = self.instant.drain().await {
            warn!(error = %e, "instant queue did not drain");
        }
        let remote = self.client.clear().await;

        let mut first_error = None;
        for result in local.into_iter().chain(std::iter::once(remote)) {
            if let Err(e) = result {
                warn!(error = %e, "clear step failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
