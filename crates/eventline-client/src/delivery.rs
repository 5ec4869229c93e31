//! Per-channel ordered delivery.
//!
//! A [`DeliveryQueue`] owns one worker task that takes sends off an
//! unbounded channel and performs them one at a time, so sends for a
//! channel reach the server in the order they were enqueued and never
//! overlap. Enqueueing never blocks the caller.
//!
//! Each send yields a [`DeliveryHandle`] resolving to the typed outcome.
//! The queue itself neither retries nor drops anything on failure: a failed
//! send is reported on its handle and the next send proceeds.

use eventline_types::{BatchPayload, Channel, InstantPayload, InstantRecord};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::ClientError;
use crate::http::{BatchAck, EventsClient};

type Reply<T> = oneshot::Sender<Result<T, ClientError>>;

enum Job {
    Instant {
        payload: InstantPayload,
        reply: Reply<InstantRecord>,
    },
    Batch {
        payload: BatchPayload,
        reply: Reply<BatchAck>,
    },
    Barrier {
        reply: oneshot::Sender<()>,
    },
}

/// Pending outcome of one enqueued send.
///
/// Resolves to the stored [`InstantRecord`] for instant sends and to the
/// [`BatchAck`] for batch sends.
#[derive(Debug)]
pub struct DeliveryHandle<T> {
    channel: Channel,
    rx: oneshot::Receiver<Result<T, ClientError>>,
}

impl<T> DeliveryHandle<T> {
    /// Wait for the send to settle.
    pub async fn outcome(self) -> Result<T, ClientError> {
        self.rx
            .await
            .unwrap_or(Err(ClientError::QueueClosed(self.channel)))
    }
}

/// Strictly serial dispatcher for one channel.
#[derive(Debug, Clone)]
pub struct DeliveryQueue {
    channel: Channel,
    jobs: mpsc::UnboundedSender<Job>,
}

impl DeliveryQueue {
    /// Spawn the worker task for `channel`.
    ///
    /// The worker exits once every clone of the queue is dropped and the
    /// remaining jobs have run.
    pub fn spawn(channel: Channel, client: EventsClient) -> Self {
        let (jobs, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(channel, client, rx));
        Self { channel, jobs }
    }

    /// The channel this queue delivers on.
    pub const fn channel(&self) -> Channel {
        self.channel
    }

    /// Enqueue one event behind every send already queued.
    pub fn send_instant(&self, payload: InstantPayload) -> DeliveryHandle<InstantRecord> {
        let (reply, rx) = oneshot::channel();
        self.enqueue(Job::Instant { payload, reply });
        self.handle(rx)
    }

    /// Enqueue a batch behind every send already queued.
    pub fn send_batch(&self, payload: BatchPayload) -> DeliveryHandle<BatchAck> {
        let (reply, rx) = oneshot::channel();
        self.enqueue(Job::Batch { payload, reply });
        self.handle(rx)
    }

    /// Wait until every send enqueued before this call has settled.
    pub async fn drain(&self) -> Result<(), ClientError> {
        let (reply, rx) = oneshot::channel();
        self.jobs
            .send(Job::Barrier { reply })
            .map_err(|_closed| ClientError::QueueClosed(self.channel))?;
        rx.await
            .map_err(|_closed| ClientError::QueueClosed(self.channel))
    }

    fn enqueue(&self, job: Job) {
        // A closed worker drops the job, which resolves its handle as closed.
        if self.jobs.send(job).is_err() {
            debug!(channel = %self.channel, "delivery worker gone");
        }
    }

    const fn handle<T>(&self, rx: oneshot::Receiver<Result<T, ClientError>>) -> DeliveryHandle<T> {
        DeliveryHandle {
            channel: self.channel,
            rx,
        }
    }
}

async fn run_worker(channel: Channel, client: EventsClient, mut rx: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = rx.recv().await {
        // The caller may have dropped its handle, so reply errors are ignored.
        match job {
            Job::Instant { payload, reply } => {
                let outcome = client.post_instant(&payload).await;
                log_failure(channel, payload.seq, outcome.as_ref().err());
                let _ = reply.send(outcome);
            }
            Job::Batch { payload, reply } => {
                let outcome = client.post_batch(&payload).await;
                let first = payload.events.first().map_or(0, |item| item.seq);
                log_failure(channel, first, outcome.as_ref().err());
                let _ = reply.send(outcome);
            }
            Job::Barrier { reply } => {
                let _ = reply.send(());
            }
        }
    }
    debug!(channel = %channel, "delivery worker stopped");
}

fn log_failure(channel: Channel, seq: u64, error: Option<&ClientError>) {
    if let Some(e) = error {
        debug!(channel = %channel, seq, error = %e, "delivery failed");
    }
}
