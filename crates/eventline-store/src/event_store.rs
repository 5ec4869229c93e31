//! The two channel logs that back the ingest server.
//!
//! Requests touching different channels never contend: each log has its
//! own writer task and its own index lock.

use std::path::Path;

use eventline_types::{BatchRecord, Channel, InstantRecord};
use tracing::info;

use crate::append_log::{AppendLog, LoadReport};
use crate::error::StoreError;

/// File name of the instant-channel log inside the data directory.
pub const INSTANT_FILE: &str = "events-instant.ndjson";

/// File name of the batch-channel log inside the data directory.
pub const BATCH_FILE: &str = "events-batch.ndjson";

/// Instant and batch logs opened from one data directory.
pub struct EventStore {
    instant: AppendLog<InstantRecord>,
    batch: AppendLog<BatchRecord>,
}

impl EventStore {
    /// Open both channel logs inside `data_dir`, creating them if missing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if either log cannot be opened.
    pub async fn open(data_dir: &Path) -> Result<Self, StoreError> {
        let (instant, instant_report) =
            AppendLog::open(Channel::Instant, data_dir.join(INSTANT_FILE)).await?;
        let (batch, batch_report) = AppendLog::open(Channel::Batch, data_dir.join(BATCH_FILE)).await?;
        log_report(Channel::Instant, instant_report);
        log_report(Channel::Batch, batch_report);
        Ok(Self { instant, batch })
    }

    /// The instant-channel log.
    pub const fn instant(&self) -> &AppendLog<InstantRecord> {
        &self.instant
    }

    /// The batch-channel log.
    pub const fn batch(&self) -> &AppendLog<BatchRecord> {
        &self.batch
    }

    /// Truncate both logs, instant first.
    ///
    /// Each log's index is emptied only after its own file is truncated.
    ///
    /// # Errors
    ///
    /// Returns the first [`StoreError`] encountered. If the instant log
    /// fails, the batch log is left untouched.
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.instant.truncate().await?;
        self.batch.truncate().await?;
        info!("both channel logs cleared");
        Ok(())
    }
}

fn log_report(channel: Channel, report: LoadReport) {
    info!(
        %channel,
        loaded = report.loaded,
        skipped = report.skipped,
        torn_tail_removed = report.torn_tail_removed,
        "channel log loaded"
    );
}
