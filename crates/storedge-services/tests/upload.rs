mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use storedge_core::{
    AppError, FieldName, FixedClock, IdempotencyKey, Limits, OwnerId, Reason, UlidGenerator,
};
use storedge_db::{Catalog, MemoryCatalog};
use storedge_services::{
    FileEventType, OrphanSweeper, RequestContext, RetrievalService, TracingEventPublisher,
    UploadService,
};
use storedge_storage::{ByteRange, ObjectStore};
use tokio::io::AsyncWriteExt;

#[tokio::test]
async fn test_upload_hello_and_read_back() {
    let h = Harness::new();

    let outcome = h
        .uploads
        .upload(&ctx(), spec("notes.txt", 5, None, &["report"]), &b"hello"[..])
        .await
        .unwrap();
    assert!(!outcome.replayed);

    let file = outcome.file;
    assert_eq!(file.checksum().as_str(), HELLO_SHA256);
    assert_eq!(file.size(), 5);
    assert_eq!(file.name(), "notes.txt");
    assert_eq!(file.owner_id().as_str(), "u1");
    assert_eq!(file.created_at(), base_time());
    assert_eq!(file.tags().len(), 1);

    let fetched = h
        .retrieval
        .get(&ctx(), &file.id().as_str().to_uppercase())
        .await
        .unwrap();
    assert_eq!(fetched, file);

    let (_, reader) = h.retrieval.open_file(&ctx(), file.id().as_str(), None).await.unwrap();
    assert_eq!(reader.len, 5);
    assert_eq!(reader.content_type, "text/plain");
    assert_eq!(read_all(reader.reader).await, b"hello");

    let reader = h
        .retrieval
        .open(&ctx(), file.storage_ref(), Some(ByteRange::new(1, 3)))
        .await
        .unwrap();
    assert_eq!(reader.len, 3);
    assert_eq!(read_all(reader.reader).await, b"ell");

    assert_eq!(h.store.committed_count(), 1);
    assert_eq!(h.store.temp_count(), 0);
}

#[tokio::test]
async fn test_upload_publishes_event() {
    let h = Harness::new();
    let mut events = h.events.subscribe();

    let file = h
        .uploads
        .upload(&ctx(), spec("notes.txt", 5, None, &[]), &b"hello"[..])
        .await
        .unwrap()
        .file;

    let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.event_type, FileEventType::FileUploaded);
    assert_eq!(&event.file_id, file.id());
    assert_eq!(event.file.as_ref(), Some(&file));
}

#[tokio::test]
async fn test_same_key_replays_without_touching_store() {
    let h = Harness::new();

    let first = h
        .uploads
        .upload(&ctx(), spec("a.txt", 5, Some("key-1"), &[]), &b"hello"[..])
        .await
        .unwrap();
    let second = h
        .uploads
        .upload(&ctx(), spec("a.txt", 5, Some(" key-1 "), &[]), &b"other"[..])
        .await
        .unwrap();

    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(first.file, second.file);
    assert_eq!(second.file.checksum().as_str(), HELLO_SHA256);
    assert_eq!(h.store.committed_count(), 1);
    assert_eq!(h.store.temp_count(), 0);
    assert_eq!(h.catalog.file_count().await, 1);
}

#[tokio::test]
async fn test_concurrent_same_key_converges() {
    let h = Harness::new();

    let handles = (0..8).map(|_| {
        let uploads = h.uploads.clone();
        tokio::spawn(async move {
            uploads
                .upload(&ctx(), spec("a.txt", 5, Some("shared"), &[]), &b"hello"[..])
                .await
        })
    });

    let files: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert!(files.windows(2).all(|w| w[0].file == w[1].file));
    assert_eq!(files.iter().filter(|o| !o.replayed).count(), 1);
    assert_eq!(h.catalog.file_count().await, 1);
    assert_eq!(h.store.committed_count(), 1);
    assert_eq!(h.store.temp_count(), 0);
}

#[tokio::test]
async fn test_claim_lost_discards_late_upload() {
    let h = Harness::new();

    // The slow upload passes the replay check before the fast one claims the key.
    let (mut client, body) = tokio::io::duplex(64);
    let uploads = h.uploads.clone();
    let slow = tokio::spawn(async move {
        uploads
            .upload(&ctx(), spec("slow.txt", 5, Some("k"), &[]), body)
            .await
    });
    let store = h.store.clone();
    assert!(eventually(|| store.temp_count() == 1).await);

    let fast = h
        .uploads
        .upload(&ctx(), spec("fast.txt", 5, Some("k"), &[]), &b"hello"[..])
        .await
        .unwrap();
    assert!(!fast.replayed);

    client.write_all(b"world").await.unwrap();
    drop(client);
    let slow = slow.await.unwrap().unwrap();

    assert!(slow.replayed);
    assert_eq!(slow.file, fast.file);
    assert_eq!(slow.file.name(), "fast.txt");
    assert_eq!(h.catalog.file_count().await, 1);
    assert_eq!(h.store.committed_count(), 1);
    assert_eq!(h.store.temp_count(), 0);
}

#[tokio::test]
async fn test_claim_lost_with_failed_delete_leaves_orphan() {
    let h = Harness::new();

    let (mut client, body) = tokio::io::duplex(64);
    let uploads = h.uploads.clone();
    let slow = tokio::spawn(async move {
        uploads
            .upload(&ctx(), spec("slow.txt", 5, Some("k"), &[]), body)
            .await
    });
    let store = h.store.clone();
    assert!(eventually(|| store.temp_count() == 1).await);

    let fast = h
        .uploads
        .upload(&ctx(), spec("fast.txt", 5, Some("k"), &[]), &b"hello"[..])
        .await
        .unwrap();

    h.store.set_fail_deletes(true);
    client.write_all(b"world").await.unwrap();
    drop(client);
    let slow = slow.await.unwrap().unwrap();

    assert_eq!(slow.file, fast.file);
    assert_eq!(h.catalog.file_count().await, 1);
    assert_eq!(h.store.committed_count(), 2);
}

#[tokio::test]
async fn test_too_many_tags_rejected_without_side_effects() {
    let h = Harness::new();
    let tags: Vec<String> = (0..17).map(|i| format!("t{i}")).collect();
    let tag_refs: Vec<&str> = tags.iter().map(String::as_str).collect();

    let err = h
        .uploads
        .upload(&ctx(), spec("a.txt", 5, Some("key-2"), &tag_refs), &b"hello"[..])
        .await
        .unwrap_err();

    assert!(err.is_invalid(FieldName::Tags, Reason::ExceedsLimit));
    assert_eq!(h.store.committed_count(), 0);
    assert_eq!(h.store.temp_count(), 0);
    assert_eq!(h.catalog.file_count().await, 0);
}

#[tokio::test]
async fn test_validation_failures() {
    let h = Harness::new();

    let cases = [
        (spec("a/b.txt", 5, None, &[]), FieldName::Name, Reason::InvalidChar),
        (spec("a.txt", 0, None, &[]), FieldName::Size, Reason::TooSmall),
        (spec("a.txt", 5, Some("   "), &[]), FieldName::IdempotencyKey, Reason::Empty),
    ];
    for (spec, field, reason) in cases {
        let err = h.uploads.upload(&ctx(), spec, &b"hello"[..]).await.unwrap_err();
        assert!(err.is_invalid(field, reason), "{err}");
    }

    let mut bad_type = spec("a.txt", 5, None, &[]);
    bad_type.content_type = "text/plain; charset=utf-8".to_string();
    let err = h.uploads.upload(&ctx(), bad_type, &b"hello"[..]).await.unwrap_err();
    assert!(err.is_invalid(FieldName::ContentType, Reason::BadFormat));

    assert_eq!(h.store.committed_count(), 0);
    assert_eq!(h.catalog.file_count().await, 0);
}

#[tokio::test]
async fn test_declared_size_over_limit_is_too_large() {
    let h = Harness::with_limits(Limits {
        max_upload_bytes: 8,
        ..Limits::default()
    });

    let err = h
        .uploads
        .upload(&ctx(), spec("a.txt", 9, None, &[]), &b"123456789"[..])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::TooLarge { limit: 8 }));
    assert_eq!(h.store.temp_count(), 0);
}

#[tokio::test]
async fn test_oversized_stream_aborts_and_cleans_up() {
    let h = Harness::with_limits(Limits {
        max_upload_bytes: 8,
        ..Limits::default()
    });

    let err = h
        .uploads
        .upload(&ctx(), spec("a.txt", 5, None, &[]), &[0u8; 20][..])
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::TooLarge { limit: 8 }));
    assert_eq!(h.store.temp_count(), 0);
    assert_eq!(h.store.committed_count(), 0);
    assert_eq!(h.catalog.file_count().await, 0);
}

#[tokio::test]
async fn test_size_mismatch_cleans_up() {
    let h = Harness::new();

    let err = h
        .uploads
        .upload(&ctx(), spec("a.txt", 10, Some("key-3"), &[]), &b"hello"[..])
        .await
        .unwrap_err();

    assert!(err.is_invalid(FieldName::Size, Reason::SizeMismatch));
    assert_eq!(h.store.temp_count(), 0);
    assert_eq!(h.store.committed_count(), 0);
    assert!(h
        .catalog
        .find_idempotency_key(
            &OwnerId::parse("u1").unwrap(),
            &IdempotencyKey::parse("key-3").unwrap()
        )
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_deadline_aborts_stalled_stream() {
    let h = Harness::new();
    let (_client, body) = tokio::io::duplex(64);

    let ctx = RequestContext::new(Duration::from_millis(50));
    let err = h
        .uploads
        .upload(&ctx, spec("a.txt", 5, None, &[]), body)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::DeadlineExceeded(ref stage) if stage == "streaming"));
    assert_eq!(h.store.temp_count(), 0);
    assert_eq!(h.catalog.file_count().await, 0);
}

#[tokio::test]
async fn test_cancellation_aborts_stalled_stream() {
    let h = Harness::new();
    let (_client, body) = tokio::io::duplex(64);

    let ctx = RequestContext::background();
    let canceller = ctx.clone();
    let store = h.store.clone();
    tokio::spawn(async move {
        eventually(|| store.temp_count() == 1).await;
        canceller.cancel();
    });

    let err = h
        .uploads
        .upload(&ctx, spec("a.txt", 5, None, &[]), body)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Cancelled(_)));
    assert_eq!(h.store.temp_count(), 0);
}

#[tokio::test]
async fn test_dropped_upload_schedules_cleanup() {
    let h = Harness::new();
    let (_client, body) = tokio::io::duplex(64);

    let uploads = h.uploads.clone();
    let task = tokio::spawn(async move {
        uploads
            .upload(&ctx(), spec("a.txt", 5, None, &[]), body)
            .await
    });

    let store = h.store.clone();
    assert!(eventually(|| store.temp_count() == 1).await);
    task.abort();

    let store = h.store.clone();
    assert!(eventually(|| store.temp_count() == 0).await);
    assert_eq!(h.catalog.file_count().await, 0);
}

#[tokio::test]
async fn test_transaction_failure_removes_committed_object() {
    let h = Harness::with_transactions(Arc::new(UnavailableCoordinator));

    let err = h
        .uploads
        .upload(&ctx(), spec("a.txt", 5, None, &[]), &b"hello"[..])
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Internal(_)));
    assert_eq!(h.store.committed_count(), 0);
    assert_eq!(h.store.temp_count(), 0);
}

#[tokio::test]
async fn test_invalid_range_never_reaches_store() {
    let store = CountingStore::default();
    let catalog = MemoryCatalog::new();
    let store_port: Arc<dyn ObjectStore> = Arc::new(store.clone());
    let uploads = UploadService::new(
        store_port.clone(),
        Arc::new(catalog.clone()),
        Arc::new(catalog.clone()),
        Arc::new(UlidGenerator::new()),
        Arc::new(FixedClock(base_time())),
        Arc::new(TracingEventPublisher),
        Limits::default(),
    );
    let retrieval = RetrievalService::new(Arc::new(catalog), store_port);

    let file = uploads
        .upload(&ctx(), spec("notes.txt", 5, None, &[]), &b"hello"[..])
        .await
        .unwrap()
        .file;

    for range in [ByteRange::new(10, 5), ByteRange::new(0, 5), ByteRange::new(3, 2)] {
        let err = retrieval
            .open(&ctx(), file.storage_ref(), Some(range))
            .await
            .unwrap_err();
        assert!(err.is_invalid(FieldName::Range, Reason::InvalidRange));
    }
    assert_eq!(store.open_count(), 0);

    let reader = retrieval
        .open(&ctx(), file.storage_ref(), Some(ByteRange::new(4, 4)))
        .await
        .unwrap();
    assert_eq!(read_all(reader.reader).await, b"o");
    assert_eq!(store.open_count(), 1);
}

#[tokio::test]
async fn test_upload_dropped_in_transaction_leaves_object_for_sweep() {
    let coordinator = StalledCoordinator::default();
    let h = Harness::with_transactions(Arc::new(coordinator.clone()));

    let uploads = h.uploads.clone();
    let task = tokio::spawn(async move {
        uploads
            .upload(&ctx(), spec("a.txt", 5, None, &[]), &b"hello"[..])
            .await
    });

    let entered = coordinator.entered.clone();
    assert!(eventually(|| entered.load(std::sync::atomic::Ordering::SeqCst)).await);
    task.abort();
    let _ = task.await;

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.store.committed_count(), 1);
    assert_eq!(h.catalog.file_count().await, 0);

    let sweeper = OrphanSweeper::new(
        Arc::new(h.store.clone()),
        Arc::new(h.catalog.clone()),
        Arc::new(FixedClock(chrono::Utc::now() + chrono::Duration::hours(2))),
        Duration::from_secs(3600),
    );
    let report = sweeper.sweep_once().await.unwrap();
    assert_eq!(report.deleted, 1);
    assert_eq!(h.store.committed_count(), 0);
}

#[tokio::test]
async fn test_idempotency_keys_are_scoped_per_owner() {
    let h = Harness::new();

    let first = h
        .uploads
        .upload(&ctx(), spec("a.txt", 5, Some("key-1"), &[]), &b"hello"[..])
        .await
        .unwrap();

    let mut other = spec("b.txt", 5, Some("key-1"), &[]);
    other.owner_id = "u2".to_string();
    let second = h.uploads.upload(&ctx(), other, &b"world"[..]).await.unwrap();

    assert!(!first.replayed);
    assert!(!second.replayed);
    assert_ne!(first.file.id(), second.file.id());
    assert_eq!(second.file.owner_id().as_str(), "u2");
    assert_eq!(h.catalog.file_count().await, 2);

    let again = h
        .uploads
        .upload(&ctx(), spec("a.txt", 5, Some("key-1"), &[]), &b"hello"[..])
        .await
        .unwrap();
    assert!(again.replayed);
    assert_eq!(again.file, first.file);
}

#[tokio::test]
async fn test_get_unknown_and_malformed_ids() {
    let h = Harness::new();

    let err = h
        .retrieval
        .get(&ctx(), "01arz3ndektsv4rrffq69g5fav")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = h.retrieval.get(&ctx(), "nope").await.unwrap_err();
    assert!(err.is_invalid(FieldName::Id, Reason::BadFormat));
}
