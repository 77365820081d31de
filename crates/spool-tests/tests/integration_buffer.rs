// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Buffer Integration Tests
//!
//! - `test_add_*`: Adding, overwriting and looking up records
//! - `test_flush_*`: Batching, eviction and failure handling
//! - `test_reap_*`: Stale record removal
//! - `test_service_*`: Owner resolution and read-through
//! - `test_concurrent_*`: Producers and the reaper racing a flush

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use spool_buffer::{
    BufferService, FetchSource, FlushEngine, StaleReaper, StaticOwnerResolver,
};
use spool_core::error::{BufferError, SpoolErrorKind};
use spool_core::types::OwnerId;

use spool_tests::common::{
    assert_buffered, assert_not_buffered, assert_pending, init_test_logging, BufferFixtures,
    BufferHarness, ConcurrentTestHelper, FailingSink, FaultyStore, FlushReportAssertions,
    InterleavingSink, ReapingSink, RecordFixtures, RecordingSink,
};

// =============================================================================
// Add
// =============================================================================

#[tokio::test]
async fn test_add_then_get() {
    init_test_logging();
    let buffer = BufferFixtures::memory();

    buffer
        .add(OwnerId::new(7), "item-1", b"hello".to_vec())
        .await
        .unwrap();

    let record = buffer.get("item-1").await.unwrap().unwrap();
    assert_eq!(record.owner_id, OwnerId::new(7));
    assert_eq!(record.payload, b"hello");
    assert!(record.updated_at <= Utc::now());
    assert_pending(&buffer, 1).await;
}

#[tokio::test]
async fn test_add_overwrite_keeps_one_entry() {
    let buffer = BufferFixtures::memory();

    for version in 0..5 {
        buffer
            .add(OwnerId::new(1), RecordFixtures::key(0), RecordFixtures::payload(0, version))
            .await
            .unwrap();
    }

    assert_pending(&buffer, 1).await;
    assert_buffered(&buffer, &RecordFixtures::key(0), &RecordFixtures::payload(0, 4)).await;
    assert_eq!(buffer.stats().records_added, 5);
}

#[tokio::test]
async fn test_add_unknown_key_is_none() {
    let buffer = BufferFixtures::memory();
    assert!(buffer.get("nope").await.unwrap().is_none());
    assert_pending(&buffer, 0).await;
}

#[tokio::test]
async fn test_add_store_failure_is_reported() {
    let store = Arc::new(FaultyStore::new());
    let buffer = BufferFixtures::over(store.clone());

    store.set_fail_writes(true);
    let err = buffer
        .add(OwnerId::UNLINKED, "item-1", b"x".to_vec())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), SpoolErrorKind::Store);
    assert_pending(&buffer, 0).await;

    store.set_fail_writes(false);
    store.set_fail_indexing(true);
    assert!(buffer.add(OwnerId::UNLINKED, "item-1", b"x".to_vec()).await.is_err());
    assert_not_buffered(&buffer, "item-1").await;
    assert_pending(&buffer, 0).await;
}

#[tokio::test]
async fn test_add_index_failure_leaves_nothing_stranded() {
    let store = Arc::new(FaultyStore::new());
    let harness = BufferHarness::over(store.clone());
    RecordFixtures::fill(&harness.buffer, 2).await;

    store.set_fail_indexing(true);
    let err = harness
        .buffer
        .add(OwnerId::new(5), "item-new", b"lost".to_vec())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), SpoolErrorKind::Store);
    store.set_fail_indexing(false);

    // Whatever is readable must also be reachable by flush.
    assert_not_buffered(&harness.buffer, "item-new").await;
    let report = harness.engine.flush_batch(100).await.unwrap();
    assert_eq!(report.flushed, 2);
    assert!(!harness.sink.distinct_keys().contains("item-new"));
    assert_pending(&harness.buffer, 0).await;
    assert_eq!(harness.buffer.stats().records_added, 2);
}

#[tokio::test]
async fn test_add_after_close_is_stopped() {
    let buffer = BufferFixtures::memory();
    buffer.close().await.unwrap();

    let err = buffer
        .add(OwnerId::UNLINKED, "item-1", b"x".to_vec())
        .await
        .unwrap_err();
    assert!(matches!(err, BufferError::Stopped));
}

// =============================================================================
// Flush
// =============================================================================

#[tokio::test]
async fn test_flush_empty_buffer() {
    let harness = BufferHarness::new();

    let report = harness.engine.flush_batch(100).await.unwrap();
    assert!(report.is_empty());
    assert_eq!(report.flushed, 0);
    assert_eq!(harness.sink.calls(), 0);
}

#[tokio::test]
async fn test_flush_zero_batch_selects_nothing() {
    let harness = BufferHarness::new();
    RecordFixtures::fill(&harness.buffer, 3).await;

    let report = harness.engine.flush_batch(0).await.unwrap();
    assert!(report.is_empty());
    assert_pending(&harness.buffer, 3).await;
}

#[tokio::test]
async fn test_flush_respects_batch_size() {
    init_test_logging();
    let harness = BufferHarness::new();
    RecordFixtures::fill(&harness.buffer, 25).await;

    let report = harness.engine.flush_batch(10).await.unwrap();
    assert_eq!(report.selected, 10);
    assert_eq!(report.flushed, 10);
    report.assert_fully_evicted();
    assert_eq!(harness.sink.batches().len(), 1);
    assert_eq!(harness.sink.batches()[0].len(), 10);
    assert_pending(&harness.buffer, 15).await;

    let reports = harness.flush_until_empty(10, 10).await;
    let flushed: usize = reports.iter().map(|r| r.flushed).sum();
    assert_eq!(flushed, 15);
    assert!(harness.sink.batches().iter().all(|b| b.len() <= 10));
    assert_eq!(harness.sink.distinct_keys().len(), 25);
    assert_pending(&harness.buffer, 0).await;
}

#[tokio::test]
async fn test_flush_persists_payload_unchanged() {
    let harness = BufferHarness::new();
    let payload: Vec<u8> = (0..=255u8).collect();
    harness
        .buffer
        .add(OwnerId::new(3), "binary", payload.clone())
        .await
        .unwrap();

    harness.engine.flush_batch(10).await.unwrap();

    let records = harness.sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].payload, payload);
    assert_eq!(records[0].owner_id, OwnerId::new(3));
}

#[tokio::test]
async fn test_flush_sink_failure_keeps_everything() {
    let harness = BufferHarness::new();
    RecordFixtures::fill(&harness.buffer, 5).await;

    harness.sink.fail_next(1);
    let err = harness.engine.flush_batch(10).await.unwrap_err();
    assert_eq!(err.kind(), SpoolErrorKind::TransientSink);
    assert!(err.is_retryable());
    assert_pending(&harness.buffer, 5).await;
    for i in 0..5 {
        assert_buffered(&harness.buffer, &RecordFixtures::key(i), &RecordFixtures::payload(i, 0)).await;
    }

    let stats = harness.buffer.stats();
    assert_eq!(stats.flush_errors, 1);
    assert_eq!(stats.records_flushed, 0);

    let report = harness.engine.flush_batch(10).await.unwrap();
    assert_eq!(report.flushed, 5);
    assert_pending(&harness.buffer, 0).await;
    assert!(harness.buffer.stats().flush_success_rate() < 1.0);
}

#[tokio::test]
async fn test_flush_rejecting_sink() {
    let buffer = BufferFixtures::memory();
    RecordFixtures::fill(&buffer, 2).await;
    let sink = Arc::new(FailingSink::rejecting());
    let engine = FlushEngine::new(buffer.clone(), sink.clone());

    for _ in 0..3 {
        let err = engine.flush_batch(10).await.unwrap_err();
        assert!(!err.is_retryable());
    }
    assert_eq!(sink.attempts(), 3);
    assert_pending(&buffer, 2).await;
}

#[tokio::test]
async fn test_flush_overwrite_during_persist_survives() {
    init_test_logging();
    let buffer = BufferFixtures::memory();
    RecordFixtures::fill(&buffer, 3).await;

    let newer = RecordFixtures::payload(1, 1);
    let sink = Arc::new(InterleavingSink::new(
        buffer.clone(),
        vec![(RecordFixtures::key(1), newer.clone())],
    ));
    let engine = FlushEngine::new(buffer.clone(), sink.clone());

    let report = engine.flush_batch(10).await.unwrap();
    assert_eq!(report.flushed, 3);
    assert_eq!(report.evicted, 2);
    assert_eq!(report.superseded, 1);
    report.assert_accounted();

    // The durable store saw the old value; the new one is still buffered.
    assert_eq!(
        sink.recorded().latest(&RecordFixtures::key(1)),
        Some(RecordFixtures::payload(1, 0))
    );
    assert_buffered(&buffer, &RecordFixtures::key(1), &newer).await;
    assert_not_buffered(&buffer, &RecordFixtures::key(0)).await;
    assert_pending(&buffer, 1).await;

    let report = engine.flush_batch(10).await.unwrap();
    assert_eq!(report.flushed, 1);
    report.assert_fully_evicted();
    assert_eq!(sink.recorded().latest(&RecordFixtures::key(1)), Some(newer));
    assert_pending(&buffer, 0).await;
}

#[tokio::test]
async fn test_flush_purges_corrupt_records() {
    let harness = BufferHarness::new();
    RecordFixtures::fill(&harness.buffer, 3).await;
    BufferFixtures::put_raw(&harness.buffer, "broken", b"{not json").await;

    let report = harness.engine.flush_batch(10).await.unwrap();
    assert_eq!(report.selected, 4);
    assert_eq!(report.corrupt, 1);
    assert_eq!(report.flushed, 3);
    report.assert_accounted();

    assert!(!harness.sink.distinct_keys().contains("broken"));
    assert_not_buffered(&harness.buffer, "broken").await;
    assert_pending(&harness.buffer, 0).await;
    assert_eq!(harness.buffer.stats().records_corrupt, 1);
}

#[tokio::test]
async fn test_flush_only_corrupt_records() {
    let harness = BufferHarness::new();
    BufferFixtures::put_raw(&harness.buffer, "broken-1", b"\x00\x01").await;
    BufferFixtures::put_raw(&harness.buffer, "broken-2", b"[]").await;

    let report = harness.engine.flush_batch(10).await.unwrap();
    assert_eq!(report.corrupt, 2);
    assert_eq!(report.flushed, 0);
    assert!(report.made_progress());
    assert_eq!(harness.sink.calls(), 0);
    assert_pending(&harness.buffer, 0).await;
}

#[tokio::test]
async fn test_flush_deindexes_orphans() {
    let harness = BufferHarness::new();
    RecordFixtures::fill(&harness.buffer, 1).await;
    BufferFixtures::put_orphan_index(&harness.buffer, "ghost").await;
    assert_pending(&harness.buffer, 2).await;

    let report = harness.engine.flush_batch(10).await.unwrap();
    assert_eq!(report.missing, 1);
    assert_eq!(report.flushed, 1);
    report.assert_accounted();
    assert_pending(&harness.buffer, 0).await;
}

#[tokio::test]
async fn test_flush_skips_unreadable_record() {
    let store = Arc::new(FaultyStore::new());
    let harness = BufferHarness::over(store.clone());
    RecordFixtures::fill(&harness.buffer, 4).await;

    store.make_unreadable(RecordFixtures::key(2));
    let report = harness.engine.flush_batch(10).await.unwrap();
    assert_eq!(report.selected, 4);
    assert_eq!(report.flushed, 3);
    assert_pending(&harness.buffer, 1).await;

    store.make_readable(&RecordFixtures::key(2));
    let report = harness.engine.flush_batch(10).await.unwrap();
    assert_eq!(report.flushed, 1);
    assert_pending(&harness.buffer, 0).await;
}

#[tokio::test]
async fn test_flush_selection_failure() {
    let store = Arc::new(FaultyStore::new());
    let harness = BufferHarness::over(store.clone());
    RecordFixtures::fill(&harness.buffer, 2).await;

    store.set_fail_selection(true);
    let err = harness.engine.flush_batch(10).await.unwrap_err();
    assert_eq!(err.kind(), SpoolErrorKind::Store);
    assert_eq!(harness.sink.calls(), 0);
}

#[tokio::test]
async fn test_flush_eviction_failure_redelivers() {
    let store = Arc::new(FaultyStore::new());
    let harness = BufferHarness::over(store.clone());
    RecordFixtures::fill(&harness.buffer, 2).await;

    store.set_fail_compare_delete(true);
    let report = harness.engine.flush_batch(10).await.unwrap();
    assert_eq!(report.flushed, 2);
    assert_eq!(report.evicted, 0);
    assert_pending(&harness.buffer, 2).await;

    store.set_fail_compare_delete(false);
    let report = harness.engine.flush_batch(10).await.unwrap();
    assert_eq!(report.evicted, 2);

    // At-least-once: both records reached the sink twice.
    assert_eq!(harness.sink.record_count(), 4);
    assert_pending(&harness.buffer, 0).await;
}

#[tokio::test]
async fn test_flush_updates_stats() {
    let harness = BufferHarness::new();
    RecordFixtures::fill(&harness.buffer, 6).await;

    harness.flush_until_empty(4, 5).await;

    let stats = harness.buffer.stats();
    assert_eq!(stats.records_added, 6);
    assert_eq!(stats.records_flushed, 6);
    assert_eq!(stats.records_evicted, 6);
    assert_eq!(stats.flush_count, 2);
    assert!(stats.last_flush_timestamp.is_some());
    assert!(stats.time_since_last_flush().is_some());
}

// =============================================================================
// Reap
// =============================================================================

#[tokio::test]
async fn test_reap_removes_only_stale() {
    init_test_logging();
    let buffer = BufferFixtures::memory();
    let now = Utc::now();

    buffer.put(&RecordFixtures::aged(0, 7200, now)).await.unwrap();
    buffer.put(&RecordFixtures::aged(1, 3700, now)).await.unwrap();
    buffer.put(&RecordFixtures::aged(2, 60, now)).await.unwrap();
    buffer.put(&RecordFixtures::aged(3, 0, now)).await.unwrap();

    let reaper = StaleReaper::new(buffer.clone());
    let report = reaper.reap_stale(Duration::from_secs(3600)).await.unwrap();

    assert_eq!(report.scanned, 4);
    assert_eq!(report.stale, 2);
    assert_not_buffered(&buffer, &RecordFixtures::key(0)).await;
    assert_not_buffered(&buffer, &RecordFixtures::key(1)).await;
    assert_pending(&buffer, 2).await;
    assert_eq!(buffer.stats().records_reaped, 2);
}

#[tokio::test]
async fn test_reap_threshold_boundary() {
    let buffer = BufferFixtures::memory();
    let now = Utc::now();
    buffer.put(&RecordFixtures::aged(0, 3601, now)).await.unwrap();
    buffer.put(&RecordFixtures::aged(1, 3599, now)).await.unwrap();

    let report = StaleReaper::new(buffer.clone())
        .reap_stale(Duration::from_secs(3600))
        .await
        .unwrap();

    assert_eq!(report.stale, 1);
    assert_not_buffered(&buffer, &RecordFixtures::key(0)).await;
    assert_buffered(&buffer, &RecordFixtures::key(1), &RecordFixtures::payload(1, 0)).await;
}

#[tokio::test]
async fn test_reap_removes_corrupt_and_orphans() {
    let buffer = BufferFixtures::memory();
    RecordFixtures::fill(&buffer, 2).await;
    BufferFixtures::put_raw(&buffer, "broken", b"nonsense").await;
    BufferFixtures::put_orphan_index(&buffer, "ghost").await;

    let report = StaleReaper::new(buffer.clone())
        .reap_stale(Duration::from_secs(3600))
        .await
        .unwrap();

    assert_eq!(report.stale, 0);
    assert_eq!(report.corrupt, 1);
    assert_eq!(report.missing, 1);
    assert_eq!(report.reaped(), 1);
    assert_pending(&buffer, 2).await;
}

#[tokio::test]
async fn test_reap_empty_buffer() {
    let buffer = BufferFixtures::memory();
    let report = StaleReaper::new(buffer)
        .reap_stale(Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(report.scanned, 0);
    assert_eq!(report.reaped(), 0);
}

#[tokio::test]
async fn test_reap_refreshed_record_survives() {
    let buffer = BufferFixtures::memory();
    let now = Utc::now();
    buffer.put(&RecordFixtures::aged(0, 7200, now)).await.unwrap();

    // A new add resets the age.
    buffer
        .add(OwnerId::new(1), RecordFixtures::key(0), RecordFixtures::payload(0, 1))
        .await
        .unwrap();

    let report = StaleReaper::new(buffer.clone())
        .reap_stale(Duration::from_secs(3600))
        .await
        .unwrap();
    assert_eq!(report.stale, 0);
    assert_buffered(&buffer, &RecordFixtures::key(0), &RecordFixtures::payload(0, 1)).await;
}

// =============================================================================
// Service
// =============================================================================

#[tokio::test]
async fn test_service_submit_and_fetch() {
    let buffer = BufferFixtures::memory();
    let resolver: StaticOwnerResolver = [("item-a", OwnerId::new(9))].into_iter().collect();
    let service = BufferService::new(buffer.clone()).with_resolver(Arc::new(resolver));

    assert_eq!(service.submit("item-a", b"a".to_vec()).await.unwrap(), OwnerId::new(9));
    assert_eq!(service.submit("item-b", b"b".to_vec()).await.unwrap(), OwnerId::UNLINKED);

    let fetched = service.fetch("item-a").await.unwrap().unwrap();
    assert_eq!(fetched.source, FetchSource::Buffer);
    assert_eq!(fetched.payload, b"a");

    let sink = Arc::new(RecordingSink::new());
    FlushEngine::new(buffer, sink.clone())
        .flush_batch(10)
        .await
        .unwrap();
    assert!(service.fetch("item-a").await.unwrap().is_none());

    let owners: HashMap<String, OwnerId> = sink
        .records()
        .into_iter()
        .map(|r| (r.item_key.into_inner(), r.owner_id))
        .collect();
    assert_eq!(owners["item-a"], OwnerId::new(9));
    assert!(owners["item-b"].is_unlinked());
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers_no_lost_update() {
    init_test_logging();
    const PRODUCERS: usize = 8;
    const KEYS_PER_PRODUCER: usize = 10;
    const VERSIONS: usize = 20;

    let harness = Arc::new(BufferHarness::new());
    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let flusher = {
        let harness = harness.clone();
        let stop = stop.clone();
        tokio::spawn(async move {
            while !stop.load(std::sync::atomic::Ordering::SeqCst) {
                harness.engine.flush_batch(7).await.expect("flush failed");
                tokio::task::yield_now().await;
            }
        })
    };

    let buffer = harness.buffer.clone();
    ConcurrentTestHelper::new(PRODUCERS)
        .timeout(Duration::from_secs(30))
        .run_all_succeed(move |p| {
            let buffer = buffer.clone();
            async move {
                for version in 0..VERSIONS {
                    for k in 0..KEYS_PER_PRODUCER {
                        let key = format!("p{}-k{}", p, k);
                        let payload = format!("v{}", version).into_bytes();
                        buffer.add(OwnerId::new(p as i64), key, payload).await.unwrap();
                    }
                    tokio::task::yield_now().await;
                }
            }
        })
        .await;

    stop.store(true, std::sync::atomic::Ordering::SeqCst);
    flusher.await.unwrap();
    harness.flush_until_empty(50, 100).await;

    let last = format!("v{}", VERSIONS - 1).into_bytes();
    for p in 0..PRODUCERS {
        for k in 0..KEYS_PER_PRODUCER {
            let key = format!("p{}-k{}", p, k);
            assert_eq!(
                harness.sink.latest(&key),
                Some(last.clone()),
                "Final value of {} was not the last one persisted",
                key
            );
        }
    }
    assert_pending(&harness.buffer, 0).await;
}

#[tokio::test]
async fn test_concurrent_reap_during_flush() {
    let buffer = BufferFixtures::memory();
    let now = Utc::now();
    for i in 0..20 {
        let age = if i % 2 == 0 { 7200 } else { 0 };
        buffer.put(&RecordFixtures::aged(i, age, now)).await.unwrap();
    }

    let sink = Arc::new(ReapingSink::new(buffer.clone(), Duration::from_secs(3600)));
    let engine = FlushEngine::new(buffer.clone(), sink.clone());

    let flush = engine.flush_batch(20).await.unwrap();
    let reaps = sink.reap_reports();
    assert_eq!(reaps.len(), 1);
    let reap = reaps[0];

    // The reaper ran against the same 20 keys the flush had snapshotted.
    assert_eq!(reap.scanned, 20);
    assert_eq!(reap.stale, 10);
    assert_eq!(flush.flushed, 20);
    assert_eq!(flush.evicted, 10);
    assert_eq!(flush.superseded, 10);
    flush.assert_accounted();

    // Each record left through exactly one successful compare-delete.
    assert_eq!(flush.evicted + reap.stale, 20);
    assert_pending(&buffer, 0).await;
    for i in 0..20 {
        assert_not_buffered(&buffer, &RecordFixtures::key(i)).await;
    }
    assert_eq!(sink.recorded().distinct_keys().len(), 20);
    assert_eq!(buffer.stats().records_superseded, 10);
}
