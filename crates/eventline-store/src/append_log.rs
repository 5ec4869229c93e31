//! One append-only NDJSON file per channel, written by a single task.
//!
//! Every [`AppendLog`] owns a background writer task that holds the open
//! file handle and drains an `mpsc` queue of commands in FIFO order. A write
//! is not started until the previous write (or truncation) has completed,
//! successfully or not, so concurrent callers can never interleave partial
//! lines. Multi-record appends are issued as one buffer, one write call.
//!
//! The in-memory index of parsed records is extended by the writer only
//! after the corresponding bytes have been synced, which keeps index order
//! identical to file order and keeps failed writes out of memory.
//!
//! # Recovery
//!
//! On open, each line is parsed on its own; lines that fail to parse are
//! skipped and counted. A final fragment without a trailing newline (a torn
//! write from a crash) is cut off if it does not parse, or terminated with a
//! newline if it does, so later appends always start on a fresh line.
//!
//! A failed write is cut back to the last synced length before the error
//! is returned. [`WriteFault`] forces such a failure on demand.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use eventline_types::Channel;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{RwLock, mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::error::StoreError;

/// Capacity of the command queue in front of each writer task.
///
/// Callers wait for queue space once this many commands are pending.
const COMMAND_CAPACITY: usize = 1024;

type Reply = oneshot::Sender<Result<(), StoreError>>;

enum Command<R> {
    Append {
        bytes: Vec<u8>,
        records: Vec<R>,
        reply: Reply,
    },
    Truncate {
        reply: Reply,
    },
}

/// What [`AppendLog::open`] found on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Records parsed and loaded into the index.
    pub loaded: usize,
    /// Complete lines that failed to parse and were skipped.
    pub skipped: usize,
    /// Whether an unparsable trailing fragment was cut from the file.
    pub torn_tail_removed: bool,
}

enum Tail {
    Clean,
    Unterminated,
    Torn { keep_len: usize },
}

struct Recovered<R> {
    records: Vec<R>,
    skipped: usize,
    tail: Tail,
}

/// Parse raw file contents line by line, tolerating damage.
fn recover<R: DeserializeOwned>(raw: &[u8]) -> Recovered<R> {
    let split_at = raw
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(0, |pos| pos.saturating_add(1));
    let (body, tail) = raw.split_at(split_at);

    let mut records = Vec::new();
    let mut skipped: usize = 0;
    for line in body.split(|b| *b == b'\n') {
        let line = line.trim_ascii();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_slice::<R>(line) {
            Ok(record) => records.push(record),
            Err(_) => skipped = skipped.saturating_add(1),
        }
    }

    let tail = if tail.is_empty() {
        Tail::Clean
    } else if let Ok(record) = serde_json::from_slice::<R>(tail.trim_ascii()) {
        records.push(record);
        Tail::Unterminated
    } else {
        Tail::Torn { keep_len: body.len() }
    };

    Recovered {
        records,
        skipped,
        tail,
    }
}

/// Serialize records into one newline-terminated buffer.
fn encode_lines<R: Serialize>(records: &[R]) -> Result<Vec<u8>, StoreError> {
    let mut bytes = Vec::new();
    for record in records {
        serde_json::to_writer(&mut bytes, record)?;
        bytes.push(b'\n');
    }
    Ok(bytes)
}

/// Makes a log's next write fail part-way through.
///
/// Clones share state. Once armed, the next append writes only the first
/// `bytes` bytes of its buffer and then fails with an I/O error, the same
/// shape as a full disk.
#[derive(Debug, Clone, Default)]
pub struct WriteFault(Arc<FaultState>);

#[derive(Debug, Default)]
struct FaultState {
    armed: AtomicBool,
    after: AtomicUsize,
}

impl WriteFault {
    /// Fail the next write after `bytes` bytes of it reach the file.
    pub fn fail_next_write_after(&self, bytes: usize) {
        self.0.after.store(bytes, Ordering::SeqCst);
        self.0.armed.store(true, Ordering::SeqCst);
    }

    /// Whether a failure is armed and not yet consumed.
    pub fn is_armed(&self) -> bool {
        self.0.armed.load(Ordering::SeqCst)
    }

    fn take(&self) -> Option<usize> {
        self.0
            .armed
            .swap(false, Ordering::SeqCst)
            .then(|| self.0.after.load(Ordering::SeqCst))
    }
}

/// An append-only, line-delimited JSON log for one channel.
pub struct AppendLog<R> {
    channel: Channel,
    path: PathBuf,
    commands: mpsc::Sender<Command<R>>,
    index: Arc<RwLock<Vec<R>>>,
    fault: WriteFault,
}

impl<R> AppendLog<R>
where
    R: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Open (or create) the log file at `path`, load it, and start its writer.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory or file cannot be
    /// created, read, repaired, or opened for appending.
    pub async fn open(channel: Channel, path: impl Into<PathBuf>) -> Result<(Self, LoadReport), StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io("creating data directory", parent, e))?;
        }

        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(StoreError::io("reading log", &path, e)),
        };
        let recovered = recover::<R>(&raw);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StoreError::io("opening log for append", &path, e))?;

        let mut report = LoadReport {
            loaded: recovered.records.len(),
            skipped: recovered.skipped,
            torn_tail_removed: false,
        };
        match recovered.tail {
            Tail::Clean => {}
            Tail::Unterminated => {
                file.write_all(b"\n")
                    .await
                    .map_err(|e| StoreError::io("terminating final line", &path, e))?;
                file.sync_data()
                    .await
                    .map_err(|e| StoreError::io("syncing log", &path, e))?;
                warn!(%channel, path = %path.display(), "terminated unterminated final line");
            }
            Tail::Torn { keep_len } => {
                let keep_len = u64::try_from(keep_len).unwrap_or(u64::MAX);
                file.set_len(keep_len)
                    .await
                    .map_err(|e| StoreError::io("cutting torn final line", &path, e))?;
                file.sync_data()
                    .await
                    .map_err(|e| StoreError::io("syncing log", &path, e))?;
                report.torn_tail_removed = true;
                warn!(%channel, path = %path.display(), keep_len, "removed torn final line");
            }
        }

        if report.skipped > 0 {
            warn!(%channel, skipped = report.skipped, "skipped malformed log lines");
        }

        let len = file
            .metadata()
            .await
            .map_err(|e| StoreError::io("reading log metadata", &path, e))?
            .len();

        let index = Arc::new(RwLock::new(recovered.records));
        let fault = WriteFault::default();
        let (commands, rx) = mpsc::channel(COMMAND_CAPACITY);
        let writer = Writer {
            channel,
            path: path.clone(),
            file,
            len,
            index: Arc::clone(&index),
            fault: fault.clone(),
            rx,
        };
        tokio::spawn(writer.run());

        debug!(%channel, path = %path.display(), loaded = report.loaded, "append log opened");

        Ok((
            Self {
                channel,
                path,
                commands,
                index,
                fault,
            },
            report,
        ))
    }

    /// Append one or more records as a single multi-line write.
    ///
    /// Returns once the bytes are synced and the records are visible in
    /// the index. An empty slice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] before anything is queued if a
    /// record cannot be encoded, [`StoreError::Io`] if the write fails (the
    /// index is left unchanged), or [`StoreError::WriterClosed`] if the
    /// writer task is gone.
    pub async fn append(&self, records: Vec<R>) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        let bytes = encode_lines(&records)?;
        let count = records.len();
        self.submit(|reply| Command::Append {
            bytes,
            records,
            reply,
        })
        .await?;
        Ok(count)
    }

    /// Truncate the file to zero length and empty the index.
    ///
    /// Ordered after every append queued before it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if truncation fails (the index is left
    /// unchanged), or [`StoreError::WriterClosed`] if the writer is gone.
    pub async fn truncate(&self) -> Result<(), StoreError> {
        self.submit(|reply| Command::Truncate { reply }).await
    }

    async fn submit(&self, build: impl FnOnce(Reply) -> Command<R>) -> Result<(), StoreError> {
        let (reply, outcome) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_closed| StoreError::WriterClosed(self.channel))?;
        outcome
            .await
            .map_err(|_closed| StoreError::WriterClosed(self.channel))?
    }

    /// Clone of every record currently in the index, in file order.
    pub async fn records(&self) -> Vec<R> {
        self.index.read().await.clone()
    }

    /// Number of records currently in the index.
    pub async fn len(&self) -> usize {
        self.index.read().await.len()
    }

    /// Whether the index is empty.
    pub async fn is_empty(&self) -> bool {
        self.index.read().await.is_empty()
    }

    /// The channel this log serves.
    pub const fn channel(&self) -> Channel {
        self.channel
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hook for forcing the next write to fail.
    pub const fn write_fault(&self) -> &WriteFault {
        &self.fault
    }
}

/// The single task allowed to touch a log file after open.
struct Writer<R> {
    channel: Channel,
    path: PathBuf,
    file: File,
    len: u64,
    index: Arc<RwLock<Vec<R>>>,
    fault: WriteFault,
    rx: mpsc::Receiver<Command<R>>,
}

impl<R: Send + Sync> Writer<R> {
    async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            match command {
                Command::Append {
                    bytes,
                    records,
                    reply,
                } => {
                    let outcome = self.write(&bytes).await;
                    if outcome.is_ok() {
                        self.index.write().await.extend(records);
                    }
                    // The caller may have gone away; the write stands regardless.
                    let _ = reply.send(outcome);
                }
                Command::Truncate { reply } => {
                    let outcome = self.truncate().await;
                    if outcome.is_ok() {
                        self.index.write().await.clear();
                    }
                    let _ = reply.send(outcome);
                }
            }
        }
        debug!(channel = %self.channel, "append log writer stopped");
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<(), StoreError> {
        let written = async {
            if let Some(after) = self.fault.take() {
                self.file.write_all(bytes.get(..after).unwrap_or(bytes)).await?;
                self.file.flush().await?;
                return Err(std::io::Error::new(ErrorKind::StorageFull, "injected write failure"));
            }
            self.file.write_all(bytes).await?;
            self.file.flush().await?;
            self.file.sync_data().await
        }
        .await;

        match written {
            Ok(()) => {
                let added = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
                self.len = self.len.saturating_add(added);
                Ok(())
            }
            Err(e) => {
                error!(channel = %self.channel, error = %e, "append failed");
                // Cut whatever part of the buffer reached the file.
                if let Err(cut) = self.file.set_len(self.len).await {
                    error!(channel = %self.channel, error = %cut, "failed to cut partial append");
                }
                Err(StoreError::io("appending records", &self.path, e))
            }
        }
    }

    async fn truncate(&mut self) -> Result<(), StoreError> {
        self.file
            .set_len(0)
            .await
            .map_err(|e| StoreError::io("truncating log", &self.path, e))?;
        self.file
            .sync_all()
            .await
            .map_err(|e| StoreError::io("syncing log", &self.path, e))?;
        self.len = 0;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Line {
        n: u32,
    }

    #[test]
    fn recover_skips_bad_lines_and_blank_lines() {
        let raw = b"{\"n\":1}\n\nnot json\r\n{\"n\":2}\r\n";
        let recovered = recover::<Line>(raw);
        assert_eq!(recovered.records, vec![Line { n: 1 }, Line { n: 2 }]);
        assert_eq!(recovered.skipped, 1);
        assert!(matches!(recovered.tail, Tail::Clean));
    }

    #[test]
    fn recover_marks_torn_tail_for_removal() {
        let raw = b"{\"n\":1}\n{\"n\":2}\n{\"n\":";
        let recovered = recover::<Line>(raw);
        assert_eq!(recovered.records.len(), 2);
        assert!(matches!(recovered.tail, Tail::Torn { keep_len: 16 }));
    }

    #[test]
    fn recover_keeps_complete_unterminated_tail() {
        let raw = b"{\"n\":1}\n{\"n\":2}";
        let recovered = recover::<Line>(raw);
        assert_eq!(recovered.records, vec![Line { n: 1 }, Line { n: 2 }]);
        assert!(matches!(recovered.tail, Tail::Unterminated));
    }

    #[test]
    fn recover_handles_empty_input() {
        let recovered = recover::<Line>(b"");
        assert!(recovered.records.is_empty());
        assert_eq!(recovered.skipped, 0);
        assert!(matches!(recovered.tail, Tail::Clean));
    }

    #[tokio::test]
    async fn failed_write_is_cut_back_and_next_append_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lines.ndjson");
        let (log, _) = AppendLog::<Line>::open(Channel::Instant, &path).await.unwrap();
        log.append(vec![Line { n: 1 }]).await.unwrap();
        let synced_len = std::fs::metadata(&path).unwrap().len();

        log.write_fault().fail_next_write_after(5);
        let err = log.append(vec![Line { n: 2 }, Line { n: 3 }]).await.unwrap_err();

        assert!(matches!(err, StoreError::Io { context: "appending records", .. }));
        assert!(!log.write_fault().is_armed());
        assert_eq!(log.len().await, 1);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), synced_len);

        log.append(vec![Line { n: 4 }]).await.unwrap();

        assert_eq!(log.records().await, vec![Line { n: 1 }, Line { n: 4 }]);
        assert_eq!(std::fs::read(&path).unwrap(), b"{\"n\":1}\n{\"n\":4}\n");
    }

    #[tokio::test]
    async fn fault_past_buffer_end_still_fails_the_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lines.ndjson");
        let (log, _) = AppendLog::<Line>::open(Channel::Batch, &path).await.unwrap();

        log.write_fault().fail_next_write_after(usize::MAX);

        assert!(log.append(vec![Line { n: 1 }]).await.is_err());
        assert!(log.is_empty().await);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);

        let (reopened, report) = AppendLog::<Line>::open(Channel::Batch, &path).await.unwrap();
        assert_eq!(report, LoadReport::default());
        assert!(reopened.is_empty().await);
    }

    #[test]
    fn encode_lines_writes_one_line_per_record() {
        let bytes = encode_lines(&[Line { n: 1 }, Line { n: 2 }]).unwrap();
        assert_eq!(bytes, b"{\"n\":1}\n{\"n\":2}\n");
    }
}
