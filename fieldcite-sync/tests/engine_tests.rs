use chrono::Utc;
use fieldcite_store::Store;
use fieldcite_sync::{
    open_store_in_memory, ConnectivityMonitor, EngineConfig, HttpRemoteApi, NoopDeferredSync,
    PassOutcome, RemoteConfig, StaticSession, SyncEngine, PHOTOS, SYNC_QUEUE, TICKETS,
};
use fieldcite_types::{
    EntityId, EntityKind, MutationPayload, Operation, PhotoKind, PhotoRecord, Priority,
    QueueStatus, SyncLogKind, SyncQueueItem, Ticket,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    engine: Arc<SyncEngine>,
    store: Store,
    connectivity: ConnectivityMonitor,
}

fn make_harness_with(remote: RemoteConfig) -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let store = open_store_in_memory().unwrap();
    let connectivity = ConnectivityMonitor::new(true);
    let session = Arc::new(StaticSession::new("test-token"));
    let api = Arc::new(HttpRemoteApi::new(remote, session));
    let engine = Arc::new(SyncEngine::new(
        store.clone(),
        api,
        connectivity.clone(),
        Arc::new(NoopDeferredSync),
        EngineConfig::default(),
    ));
    Harness {
        engine,
        store,
        connectivity,
    }
}

fn make_harness(server: &MockServer) -> Harness {
    let remote = RemoteConfig {
        base_url: server.uri(),
        ..Default::default()
    };
    make_harness_with(remote)
}

fn make_ticket() -> Ticket {
    Ticket {
        id: EntityId::new(),
        ticket_number: format!("GT-{}", EntityId::new()),
        status: "issued".to_string(),
        officer_id: "officer-7".to_string(),
        station_id: "station-2".to_string(),
        vehicle_reg: "GR 1234-24".to_string(),
        offence_code: "SPD-01".to_string(),
        amount_minor: 25_000,
        issued_at: Utc::now(),
        created_at: Utc::now(),
        is_synced: false,
        synced_at: None,
    }
}

fn make_photo(ticket_id: EntityId, bytes: Vec<u8>) -> PhotoRecord {
    PhotoRecord {
        id: EntityId::new(),
        ticket_id,
        kind: PhotoKind::Evidence,
        size: bytes.len() as u64,
        bytes,
        mime_type: "image/jpeg".to_string(),
        width: 640,
        height: 480,
        latitude: None,
        longitude: None,
        captured_at: Utc::now(),
        is_synced: false,
        synced_url: None,
        synced_at: None,
    }
}

fn queue_item(store: &Store, id: i64) -> SyncQueueItem {
    store
        .get::<SyncQueueItem>(SYNC_QUEUE, id)
        .unwrap()
        .expect("queue item should exist")
}

fn log_count(engine: &SyncEngine, kind: SyncLogKind) -> usize {
    engine
        .log()
        .recent(200)
        .unwrap()
        .iter()
        .filter(|e| e.kind == kind)
        .count()
}

// ── successful delivery ─────────────────────────────────────────

#[tokio::test]
async fn create_ticket_success_completes_item_and_stamps_ticket() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/tickets"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let h = make_harness(&server);
    let ticket = make_ticket();
    h.store.add(TICKETS, &ticket).unwrap();

    let item = h
        .engine
        .enqueue(
            Operation::Create,
            EntityKind::Ticket,
            ticket.id,
            MutationPayload::Ticket(ticket.clone()),
            Priority::new(2),
        )
        .unwrap();

    let outcome = h.engine.run_pass().await;
    assert_eq!(outcome, PassOutcome { success: 1, failed: 0 });

    let stored = queue_item(&h.store, item.id.unwrap());
    assert_eq!(stored.status, QueueStatus::Completed);
    assert!(stored.processed_at.is_some());

    let synced: Ticket = h.store.get(TICKETS, ticket.id).unwrap().unwrap();
    assert!(synced.is_synced);
    assert!(synced.synced_at.is_some());
}

#[tokio::test]
async fn second_pass_with_nothing_pending_is_an_empty_pass() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/tickets"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let h = make_harness(&server);
    let ticket = make_ticket();
    h.engine
        .enqueue(
            Operation::Create,
            EntityKind::Ticket,
            ticket.id,
            MutationPayload::Ticket(ticket),
            Priority::NORMAL,
        )
        .unwrap();

    assert_eq!(h.engine.run_pass().await, PassOutcome { success: 1, failed: 0 });
    assert_eq!(h.engine.run_pass().await, PassOutcome { success: 0, failed: 0 });

    // Both idle invocations ran a real pass, so each logged its own start.
    assert_eq!(log_count(&h.engine, SyncLogKind::SyncStart), 2);
    assert_eq!(log_count(&h.engine, SyncLogKind::SyncComplete), 2);
}

#[tokio::test]
async fn update_and_delete_use_entity_scoped_paths() {
    let server = MockServer::start().await;
    let ticket = make_ticket();

    Mock::given(method("PUT"))
        .and(path(format!("/api/tickets/{}", ticket.id)))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("/api/tickets/{}", ticket.id)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let h = make_harness(&server);
    h.engine
        .enqueue(
            Operation::Update,
            EntityKind::Ticket,
            ticket.id,
            MutationPayload::Ticket(ticket.clone()),
            Priority::NORMAL,
        )
        .unwrap();
    h.engine
        .enqueue(
            Operation::Delete,
            EntityKind::Ticket,
            ticket.id,
            MutationPayload::Empty,
            Priority::NORMAL,
        )
        .unwrap();

    let outcome = h.engine.run_pass().await;
    assert_eq!(outcome, PassOutcome { success: 2, failed: 0 });
}

#[tokio::test]
async fn upload_success_stamps_photo_with_synced_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/photos/upload"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "url": "https://cdn.example/p/1.jpg" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let h = make_harness(&server);
    let photo = make_photo(EntityId::new(), vec![0xFF, 0xD8, 0xFF, 0xE0]);
    h.store.add(PHOTOS, &photo).unwrap();

    h.engine
        .enqueue(
            Operation::Upload,
            EntityKind::Photo,
            photo.id,
            MutationPayload::Photo {
                ticket_id: photo.ticket_id,
                photo_kind: photo.kind,
            },
            Priority::HIGHEST,
        )
        .unwrap();

    let outcome = h.engine.run_pass().await;
    assert_eq!(outcome, PassOutcome { success: 1, failed: 0 });

    let synced: PhotoRecord = h.store.get(PHOTOS, photo.id).unwrap().unwrap();
    assert!(synced.is_synced);
    assert_eq!(
        synced.synced_url.as_deref(),
        Some("https://cdn.example/p/1.jpg")
    );
}

// ── guards ──────────────────────────────────────────────────────

#[tokio::test]
async fn offline_pass_is_a_noop() {
    let server = MockServer::start().await;
    let h = make_harness(&server);
    h.connectivity.set_online(false);

    let ticket = make_ticket();
    let item = h
        .engine
        .enqueue(
            Operation::Create,
            EntityKind::Ticket,
            ticket.id,
            MutationPayload::Ticket(ticket),
            Priority::NORMAL,
        )
        .unwrap();

    assert_eq!(h.engine.run_pass().await, PassOutcome::default());
    assert_eq!(queue_item(&h.store, item.id.unwrap()).status, QueueStatus::Pending);
    assert_eq!(log_count(&h.engine, SyncLogKind::SyncStart), 0);
}

#[tokio::test]
async fn concurrent_trigger_is_coalesced_into_one_pass() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/tickets"))
        .respond_with(
            ResponseTemplate::new(200).set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let h = make_harness(&server);
    let ticket = make_ticket();
    h.engine
        .enqueue(
            Operation::Create,
            EntityKind::Ticket,
            ticket.id,
            MutationPayload::Ticket(ticket),
            Priority::NORMAL,
        )
        .unwrap();

    let (first, second) = tokio::join!(h.engine.run_pass(), h.engine.run_pass());

    // Exactly one pass did the work; the overlapping trigger was dropped.
    let mut outcomes = [first, second];
    outcomes.sort_by_key(|o| o.success);
    assert_eq!(outcomes[0], PassOutcome::default());
    assert_eq!(outcomes[1], PassOutcome { success: 1, failed: 0 });
    assert_eq!(log_count(&h.engine, SyncLogKind::SyncStart), 1);
    assert_eq!(log_count(&h.engine, SyncLogKind::SyncComplete), 1);
}

// ── failure handling ────────────────────────────────────────────

#[tokio::test]
async fn transient_failure_requeues_with_last_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/tickets"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let h = make_harness(&server);
    let ticket = make_ticket();
    let item = h
        .engine
        .enqueue(
            Operation::Create,
            EntityKind::Ticket,
            ticket.id,
            MutationPayload::Ticket(ticket),
            Priority::NORMAL,
        )
        .unwrap();

    let outcome = h.engine.run_pass().await;
    // Transient requeues count toward neither success nor failed.
    assert_eq!(outcome, PassOutcome::default());

    let stored = queue_item(&h.store, item.id.unwrap());
    assert_eq!(stored.status, QueueStatus::Pending);
    assert_eq!(stored.attempts, 1);
    assert!(stored.last_error.as_deref().unwrap().contains("500"));
}

#[tokio::test]
async fn always_failing_item_becomes_terminal_after_exactly_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/tickets"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let h = make_harness(&server);
    let ticket = make_ticket();
    let item = h
        .engine
        .enqueue(
            Operation::Create,
            EntityKind::Ticket,
            ticket.id,
            MutationPayload::Ticket(ticket),
            Priority::NORMAL,
        )
        .unwrap();
    let max = item.max_attempts;

    for attempt in 1..max {
        h.engine.run_pass().await;
        let stored = queue_item(&h.store, item.id.unwrap());
        assert_eq!(stored.status, QueueStatus::Pending);
        assert_eq!(stored.attempts, attempt);
    }

    let outcome = h.engine.run_pass().await;
    assert_eq!(outcome, PassOutcome { success: 0, failed: 1 });
    let stored = queue_item(&h.store, item.id.unwrap());
    assert_eq!(stored.status, QueueStatus::Failed);
    assert_eq!(stored.attempts, max);

    // Terminal items are never auto-revived; further passes leave them alone.
    h.engine.run_pass().await;
    assert_eq!(queue_item(&h.store, item.id.unwrap()).attempts, max);
    assert_eq!(log_count(&h.engine, SyncLogKind::SyncError), 1);
}

#[tokio::test]
async fn permanent_rejection_fails_after_one_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/tickets"))
        .respond_with(ResponseTemplate::new(422).set_body_string("missing offence code"))
        .mount(&server)
        .await;

    let h = make_harness(&server);
    let ticket = make_ticket();
    let item = h
        .engine
        .enqueue(
            Operation::Create,
            EntityKind::Ticket,
            ticket.id,
            MutationPayload::Ticket(ticket),
            Priority::NORMAL,
        )
        .unwrap();

    let outcome = h.engine.run_pass().await;
    assert_eq!(outcome, PassOutcome { success: 0, failed: 1 });

    let stored = queue_item(&h.store, item.id.unwrap());
    assert_eq!(stored.status, QueueStatus::Failed);
    assert_eq!(stored.attempts, 1);
    let error = stored.last_error.unwrap();
    assert!(error.contains("422"), "got {error}");
    assert!(error.contains("missing offence code"), "got {error}");
}

#[tokio::test]
async fn upload_with_missing_blob_fails_immediately() {
    let server = MockServer::start().await;
    let h = make_harness(&server);

    // No photo record exists for this id.
    let item = h
        .engine
        .enqueue(
            Operation::Upload,
            EntityKind::Photo,
            EntityId::new(),
            MutationPayload::Empty,
            Priority::NORMAL,
        )
        .unwrap();

    let outcome = h.engine.run_pass().await;
    assert_eq!(outcome, PassOutcome { success: 0, failed: 1 });

    let stored = queue_item(&h.store, item.id.unwrap());
    assert_eq!(stored.status, QueueStatus::Failed);
    assert_eq!(stored.attempts, 1);
    assert_eq!(stored.last_error.as_deref(), Some("blob not found"));
}

#[tokio::test]
async fn unconfigured_endpoint_fails_the_item_but_not_the_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/tickets"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut remote = RemoteConfig {
        base_url: server.uri(),
        ..Default::default()
    };
    remote.endpoints.remove(&EntityKind::Payment);
    let h = make_harness_with(remote);

    let orphan = h
        .engine
        .enqueue(
            Operation::Delete,
            EntityKind::Payment,
            EntityId::new(),
            MutationPayload::Empty,
            Priority::HIGHEST,
        )
        .unwrap();
    let ticket = make_ticket();
    let delivered = h
        .engine
        .enqueue(
            Operation::Create,
            EntityKind::Ticket,
            ticket.id,
            MutationPayload::Ticket(ticket),
            Priority::NORMAL,
        )
        .unwrap();

    let outcome = h.engine.run_pass().await;
    assert_eq!(outcome, PassOutcome { success: 1, failed: 1 });
    assert_eq!(queue_item(&h.store, orphan.id.unwrap()).status, QueueStatus::Failed);
    assert_eq!(
        queue_item(&h.store, delivered.id.unwrap()).status,
        QueueStatus::Completed
    );
}

#[tokio::test]
async fn mismatched_payload_is_terminal() {
    let server = MockServer::start().await;
    let h = make_harness(&server);

    let ticket = make_ticket();
    let item = h
        .engine
        .enqueue(
            Operation::Create,
            EntityKind::Payment,
            EntityId::new(),
            MutationPayload::Ticket(ticket),
            Priority::NORMAL,
        )
        .unwrap();

    let outcome = h.engine.run_pass().await;
    assert_eq!(outcome, PassOutcome { success: 0, failed: 1 });
    let stored = queue_item(&h.store, item.id.unwrap());
    assert!(stored.last_error.unwrap().contains("payload"));
}

#[tokio::test]
async fn upload_is_only_supported_for_photos() {
    let server = MockServer::start().await;
    let h = make_harness(&server);

    let item = h
        .engine
        .enqueue(
            Operation::Upload,
            EntityKind::Ticket,
            EntityId::new(),
            MutationPayload::Empty,
            Priority::NORMAL,
        )
        .unwrap();

    let outcome = h.engine.run_pass().await;
    assert_eq!(outcome, PassOutcome { success: 0, failed: 1 });
    let stored = queue_item(&h.store, item.id.unwrap());
    assert!(stored.last_error.unwrap().contains("upload not supported"));
}

// ── manual retry ────────────────────────────────────────────────

#[tokio::test]
async fn retry_failed_revives_terminal_items_and_runs_a_pass() {
    let server = MockServer::start().await;
    // First delivery is rejected permanently; after the manual retry the
    // server accepts it.
    Mock::given(method("POST"))
        .and(path("/api/tickets"))
        .respond_with(ResponseTemplate::new(400).set_body_string("rejected"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/tickets"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let h = make_harness(&server);
    let ticket = make_ticket();
    let item = h
        .engine
        .enqueue(
            Operation::Create,
            EntityKind::Ticket,
            ticket.id,
            MutationPayload::Ticket(ticket),
            Priority::NORMAL,
        )
        .unwrap();

    assert_eq!(h.engine.run_pass().await, PassOutcome { success: 0, failed: 1 });
    assert_eq!(queue_item(&h.store, item.id.unwrap()).status, QueueStatus::Failed);

    let revived = h.engine.retry_failed().await.unwrap();
    assert_eq!(revived, 1);

    let stored = queue_item(&h.store, item.id.unwrap());
    assert_eq!(stored.status, QueueStatus::Completed);
    assert_eq!(stored.attempts, 0);
    assert_eq!(log_count(&h.engine, SyncLogKind::Retry), 1);
}

// ── status ──────────────────────────────────────────────────────

#[tokio::test]
async fn status_is_recomputed_from_the_store() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/tickets"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let h = make_harness(&server);
    let status = h.engine.status().unwrap();
    assert!(!status.is_running);
    assert_eq!(status.last_sync, None);
    assert_eq!(status.pending_count, 0);
    assert_eq!(status.failed_count, 0);

    for _ in 0..2 {
        let ticket = make_ticket();
        h.engine
            .enqueue(
                Operation::Create,
                EntityKind::Ticket,
                ticket.id,
                MutationPayload::Ticket(ticket),
                Priority::NORMAL,
            )
            .unwrap();
    }
    assert_eq!(h.engine.status().unwrap().pending_count, 2);

    h.engine.run_pass().await;
    let status = h.engine.status().unwrap();
    assert_eq!(status.pending_count, 0);
    assert!(status.last_sync.is_some());
}

#[tokio::test]
async fn subscribers_receive_status_snapshots() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/tickets"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let h = make_harness(&server);
    let ticket = make_ticket();
    h.engine
        .enqueue(
            Operation::Create,
            EntityKind::Ticket,
            ticket.id,
            MutationPayload::Ticket(ticket),
            Priority::NORMAL,
        )
        .unwrap();

    let mut rx = h.engine.subscribe();
    h.engine.run_pass().await;

    // First snapshot is emitted mid-pass, the last one after it finishes.
    let first = rx.recv().await.unwrap();
    assert!(first.is_running);
    let mut last = first;
    while let Ok(status) = rx.try_recv() {
        last = status;
    }
    assert!(!last.is_running);
    assert_eq!(last.pending_count, 0);
}
