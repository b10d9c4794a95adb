mod common;

use relaysock::core::protocol::Response;
use relaysock::core::socket::SharedSocketRegistry;
use relaysock::core::{FaultClass, RelayError};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[tokio::test]
async fn test_inject_get_and_clear() {
    let registry = SharedSocketRegistry::new();
    assert!(registry.get().is_none());

    let (handle, _client) = common::socket_pair().await;
    registry.inject(handle.clone()).unwrap();
    assert!(registry.is_present());
    assert!(Arc::ptr_eq(&registry.get().unwrap(), &handle));

    let removed = registry.clear().unwrap();
    assert!(Arc::ptr_eq(&removed, &handle));
    assert!(registry.get().is_none());
}

#[tokio::test]
async fn test_clear_is_idempotent() {
    let registry = SharedSocketRegistry::new();
    let (handle, _client) = common::socket_pair().await;
    registry.inject(handle).unwrap();

    assert!(registry.clear().is_some());
    assert!(registry.clear().is_none());
    assert!(registry.get().is_none());
}

#[tokio::test]
async fn test_inject_into_occupied_slot_is_rejected() {
    let registry = SharedSocketRegistry::new();
    let (first, _c1) = common::socket_pair().await;
    let (second, _c2) = common::socket_pair().await;

    registry.inject(first.clone()).unwrap();
    assert_eq!(
        registry.inject(second).unwrap_err(),
        RelayError::AlreadyPresent
    );
    assert!(Arc::ptr_eq(&registry.get().unwrap(), &first));
}

#[tokio::test]
async fn test_slot_stays_empty_until_fresh_injection() {
    let registry = SharedSocketRegistry::new();
    let (first, _c1) = common::socket_pair().await;
    registry.inject(first.clone()).unwrap();
    registry.clear();
    assert!(registry.get().is_none());
    assert!(!registry.is_current(&first));

    let (second, _c2) = common::socket_pair().await;
    registry.inject(second.clone()).unwrap();
    assert!(registry.is_current(&second));
}

#[tokio::test]
async fn test_clear_if_current_ignores_stale_handle() {
    let registry = SharedSocketRegistry::new();
    let (stale, _c1) = common::socket_pair().await;
    let (fresh, _c2) = common::socket_pair().await;

    registry.inject(stale.clone()).unwrap();
    registry.clear();
    registry.inject(fresh.clone()).unwrap();

    assert!(!registry.clear_if_current(&stale));
    assert!(registry.is_current(&fresh));
    assert!(registry.clear_if_current(&fresh));
    assert!(registry.get().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_reader_sees_handle_after_clear_returns() {
    let registry = Arc::new(SharedSocketRegistry::new());
    let (handle, _client) = common::socket_pair().await;
    registry.inject(handle).unwrap();

    let cleared = Arc::new(AtomicBool::new(false));
    let mut readers = Vec::new();
    for _ in 0..2 {
        let registry = registry.clone();
        let cleared = cleared.clone();
        readers.push(tokio::task::spawn_blocking(move || {
            let mut stale_reads = 0;
            for _ in 0..200_000 {
                let was_cleared = cleared.load(Ordering::SeqCst);
                let observed = registry.get();
                if was_cleared && observed.is_some() {
                    stale_reads += 1;
                }
            }
            stale_reads
        }));
    }

    tokio::task::yield_now().await;
    registry.clear();
    cleared.store(true, Ordering::SeqCst);

    for reader in readers {
        assert_eq!(reader.await.unwrap(), 0);
    }
}

#[tokio::test]
async fn test_stalled_peer_bounds_send_and_close() {
    let registry = SharedSocketRegistry::new();
    let (handle, _client) =
        common::socket_pair_with_write_timeout(Duration::from_millis(100)).await;
    registry.inject(handle.clone()).unwrap();

    // The client never reads, so the socket buffers eventually fill up.
    let body = json!("x".repeat(256 * 1024));
    let mut stalled = None;
    for _ in 0..512 {
        if let Err(e) = handle.send(Response::ok(1, body.clone())).await {
            stalled = Some(e);
            break;
        }
    }

    let err = stalled.expect("send never stalled");
    assert!(matches!(&err, RelayError::Io(e) if e.kind() == std::io::ErrorKind::TimedOut));
    assert_eq!(err.fault_class(), FaultClass::TransportTransient);

    tokio::time::timeout(Duration::from_secs(2), registry.close(&handle))
        .await
        .expect("close waited on a stalled writer");
    assert!(!registry.is_present());
}
