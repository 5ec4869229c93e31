//! End-to-end tests of the recording session against a live ingest server.
//!
//! Each test spawns the real server on an ephemeral loopback port with its
//! own temporary data directory.

#![allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use eventline_client::store::MemoryStore;
use eventline_client::{Alignment, BatchOutcome, ClientError, EventsClient, LocalStore, Session};
use eventline_types::BatchId;
use eventline_server::{AppState, ServerConfig, spawn_server};
use tokio::net::TcpListener;

async fn start_server(dir: &Path) -> String {
    start_server_with(ServerConfig {
        data_dir: dir.join("data"),
        public_dir: dir.join("public"),
        ..ServerConfig::default()
    })
    .await
}

async fn start_server_with(config: ServerConfig) -> String {
    let state = Arc::new(AppState::open(&config).await.unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    spawn_server(listener, state);
    format!("http://{addr}")
}

fn client(base_url: &str) -> EventsClient {
    EventsClient::new(base_url, Duration::from_secs(5)).unwrap()
}

fn unreachable() -> EventsClient {
    EventsClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap()
}

#[tokio::test]
async fn test_logged_event_is_delivered_on_instant_channel() {
    let dir = tempfile::tempdir().unwrap();
    let url = start_server(dir.path()).await;
    let mut session = Session::with_store(LocalStore::memory(), client(&url)).await;

    let logged = session.log_event(Some("ui"), "Play clicked", None).await.unwrap();
    logged.persisted.unwrap();
    let record = logged.delivery.outcome().await.unwrap();

    assert_eq!(record.seq, 1);
    assert_eq!(record.message, "Play clicked");
    assert_eq!(record.event_type.as_deref(), Some("ui"));
    assert_eq!(record.client_time.as_deref(), Some(logged.entry.local_time.as_str()));

    let snapshot = client(&url).fetch_events().await.unwrap();
    assert_eq!(snapshot.instant.len(), 1);
    assert!(snapshot.batch.is_empty());
}

#[tokio::test]
async fn test_instant_sends_arrive_in_logged_order() {
    let dir = tempfile::tempdir().unwrap();
    let url = start_server(dir.path()).await;
    let mut session = Session::with_store(LocalStore::memory(), client(&url)).await;

    for i in 0..25 {
        session.log_event(None, &format!("step {i}"), None).await.unwrap();
    }
    let report = session.close().await;

    let seqs: Vec<u64> = report.snapshot.unwrap().instant.iter().map(|r| r.seq).collect();
    assert_eq!(seqs, (1..=25).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_close_flushes_pending_entries_as_one_batch() {
    let dir = tempfile::tempdir().unwrap();
    let url = start_server(dir.path()).await;
    let store = LocalStore::memory();
    let mut session = Session::with_store(store.clone(), client(&url)).await;

    for message in ["Start", "Bounce", "Stop"] {
        session.log_event(Some("anim"), message, None).await.unwrap();
    }
    let report = session.close().await;

    let BatchOutcome::Sent {
        batch_id,
        batches,
        stored,
        through_seq,
    } = report.batch
    else {
        panic!("expected batch to be sent, got {:?}", report.batch);
    };
    assert_eq!(batches, 1);
    assert_eq!(stored, 3);
    assert_eq!(through_seq, 3);
    assert_eq!(session.batch_cursor(), 3);
    assert_eq!(session.pending_batch(), 0);

    let snapshot = report.snapshot.unwrap();
    assert_eq!(snapshot.batch.len(), 3);
    assert!(snapshot.batch.iter().all(|r| r.batch_id == batch_id));
    assert_eq!(report.view.len(), 3);
    assert_eq!(report.view.unmatched(), 0);

    // The cursor is durable and nothing is resent.
    let mut reopened = Session::with_store(store, client(&url)).await;
    assert_eq!(reopened.batch_cursor(), 3);
    assert!(matches!(reopened.close().await.batch, BatchOutcome::NothingPending));
}

#[tokio::test]
async fn test_sequence_resumes_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let url = start_server(dir.path()).await;
    let state_dir = dir.path().join("client");

    {
        let mut session = Session::with_store(LocalStore::fs(&state_dir), client(&url)).await;
        session.log_event(None, "first", None).await.unwrap();
        session.log_event(None, "second", None).await.unwrap();
    }

    let mut session = Session::with_store(LocalStore::fs(&state_dir), client(&url)).await;
    let logged = session.log_event(None, "third", None).await.unwrap();

    assert_eq!(logged.entry.seq, 3);
    let seqs: Vec<u64> = session.journal().all().iter().map(|e| e.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_unreachable_server_keeps_events_for_next_close() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::memory();

    {
        let mut offline = Session::with_store(store.clone(), unreachable()).await;
        let logged = offline.log_event(None, "offline", None).await.unwrap();
        logged.persisted.unwrap();
        assert!(matches!(logged.delivery.outcome().await, Err(ClientError::Transport(_))));

        let report = offline.close().await;
        assert!(matches!(report.batch, BatchOutcome::Failed(_)));
        assert!(report.snapshot.is_err());
        assert_eq!(offline.batch_cursor(), 0);
        assert_eq!(report.view.len(), 1);
        assert!(report.view.rows()[0].server.is_none());
    }

    let url = start_server(dir.path()).await;
    let mut online = Session::with_store(store, client(&url)).await;
    online.log_event(None, "online", None).await.unwrap();
    let report = online.close().await;

    assert!(matches!(report.batch, BatchOutcome::Sent { stored: 2, through_seq: 2, .. }));
    let batch = report.snapshot.unwrap().batch;
    assert_eq!(batch[0].message, "offline");
    assert_eq!(batch[1].message, "online");
}

#[tokio::test]
async fn test_local_storage_failure_does_not_stop_delivery() {
    let dir = tempfile::tempdir().unwrap();
    let url = start_server(dir.path()).await;
    let inner = MemoryStore::default();
    let mut session = Session::with_store(LocalStore::Memory(inner.clone()), client(&url)).await;
    inner.set_fail_writes(true);

    let logged = session.log_event(None, "quota exceeded", None).await.unwrap();

    assert!(matches!(logged.persisted, Err(ClientError::StorageUnavailable(_))));
    assert_eq!(logged.delivery.outcome().await.unwrap().seq, 1);
    assert_eq!(session.journal().len(), 1);
}

#[tokio::test]
async fn test_clear_starts_new_epoch_and_wipes_server() {
    let dir = tempfile::tempdir().unwrap();
    let url = start_server(dir.path()).await;
    let store = LocalStore::memory();
    let mut session = Session::with_store(store.clone(), client(&url)).await;
    session.log_event(None, "a", None).await.unwrap();
    session.log_event(None, "b", None).await.unwrap();
    session.close().await;

    session.clear().await.unwrap();

    assert!(session.journal().is_empty());
    assert_eq!(session.batch_cursor(), 0);
    let snapshot = client(&url).fetch_events().await.unwrap();
    assert!(snapshot.instant.is_empty());
    assert!(snapshot.batch.is_empty());
    assert_eq!(
        std::fs::metadata(dir.path().join("data").join("events-instant.ndjson"))
            .unwrap()
            .len(),
        0
    );

    let logged = session.log_event(None, "fresh", None).await.unwrap();
    assert_eq!(logged.entry.seq, 1);

    let reopened = Session::with_store(store, client(&url)).await;
    assert_eq!(reopened.current_seq(), 1);
}

#[tokio::test]
async fn test_sequence_alignment_pairs_by_seq() {
    let dir = tempfile::tempdir().unwrap();
    let url = start_server(dir.path()).await;
    let store = LocalStore::memory();

    // Event 1 never reaches the instant channel.
    {
        let mut offline = Session::with_store(store.clone(), unreachable()).await;
        offline.log_event(None, "lost", None).await.unwrap().delivery.outcome().await.unwrap_err();
    }

    let mut session = Session::with_store(store, client(&url))
        .await
        .with_alignment(Alignment::Sequence);
    session.log_event(None, "kept", None).await.unwrap();
    let report = session.close().await;

    let rows = report.view.rows();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].server.is_none());
    assert_eq!(rows[0].local.as_ref().unwrap().seq, 1);
    assert_eq!(rows[1].server.as_ref().unwrap().seq, 2);
    assert_eq!(rows[1].local.as_ref().unwrap().seq, 2);
}

#[tokio::test]
async fn test_blank_message_is_refused_without_allocating_seq() {
    let dir = tempfile::tempdir().unwrap();
    let url = start_server(dir.path()).await;
    let mut session = Session::with_store(LocalStore::memory(), client(&url)).await;

    for blank in ["", "   ", "\t\n"] {
        let err = session.log_event(Some("ui"), blank, None).await.unwrap_err();
        assert!(matches!(err, ClientError::EmptyMessage));
    }
    assert_eq!(session.current_seq(), 0);
    assert!(session.journal().is_empty());

    let logged = session.log_event(None, "  padded  ", None).await.unwrap();
    assert_eq!(logged.entry.seq, 1);
    assert_eq!(logged.entry.message, "padded");
    let report = session.close().await;

    assert!(matches!(report.batch, BatchOutcome::Sent { stored: 1, through_seq: 1, .. }));
    assert_eq!(session.pending_batch(), 0);
    assert!(matches!(session.close().await.batch, BatchOutcome::NothingPending));
}

#[tokio::test]
async fn test_close_splits_backlog_into_bounded_batches() {
    let dir = tempfile::tempdir().unwrap();
    let url = start_server_with(ServerConfig {
        data_dir: dir.path().join("data"),
        public_dir: dir.path().join("public"),
        max_batch_events: 2,
        ..ServerConfig::default()
    })
    .await;
    let store = LocalStore::memory();
    let mut session = Session::with_store(store.clone(), client(&url))
        .await
        .with_max_batch(2);

    for i in 1..=5 {
        session.log_event(None, &format!("event {i}"), None).await.unwrap();
    }
    let report = session.close().await;

    assert!(matches!(
        report.batch,
        BatchOutcome::Sent { batches: 3, stored: 5, through_seq: 5, .. }
    ));
    let batch = report.snapshot.unwrap().batch;
    let seqs: Vec<u64> = batch.iter().map(|r| r.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
    let mut ids: Vec<BatchId> = batch.iter().map(|r| r.batch_id).collect();
    ids.dedup();
    assert_eq!(ids.len(), 3);

    let reopened = Session::with_store(store, client(&url)).await;
    assert_eq!(reopened.batch_cursor(), 5);
}

#[tokio::test]
async fn test_backlog_after_failed_flush_is_sent_in_bounded_batches() {
    let dir = tempfile::tempdir().unwrap();
    let url = start_server(dir.path()).await;
    let store = LocalStore::memory();

    {
        let mut offline = Session::with_store(store.clone(), unreachable())
            .await
            .with_max_batch(2);
        for i in 1..=3 {
            offline.log_event(None, &format!("event {i}"), None).await.unwrap();
        }
        assert!(matches!(offline.close().await.batch, BatchOutcome::Failed(_)));
        assert_eq!(offline.batch_cursor(), 0);
    }

    let mut online = Session::with_store(store, client(&url)).await.with_max_batch(2);
    let report = online.close().await;

    assert!(matches!(
        report.batch,
        BatchOutcome::Sent { batches: 2, stored: 3, through_seq: 3, .. }
    ));
    assert_eq!(online.pending_batch(), 0);
}
