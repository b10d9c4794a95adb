// tests/common/mod.rs

//! Shared helpers for tests that need real sockets.

#![allow(dead_code)]

use relaysock::config::ReceiverConfig;
use relaysock::core::protocol::DEFAULT_MAX_FRAME_BYTES;
use relaysock::core::socket::SocketHandle;
use relaysock::server::AnyStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tracing_subscriber::EnvFilter;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Installs a test-friendly subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("warn"))
        .with_test_writer()
        .try_init();
}

/// Opens a loopback TCP connection and wraps the server side in a `SocketHandle`.
/// Returns the handle together with the client end of the connection.
pub async fn socket_pair() -> (Arc<SocketHandle>, TcpStream) {
    socket_pair_with_limit(DEFAULT_MAX_FRAME_BYTES).await
}

pub async fn socket_pair_with_limit(max_frame_bytes: usize) -> (Arc<SocketHandle>, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
    let client = client.unwrap();
    let (server_side, peer) = accepted.unwrap();

    let id = NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed);
    let handle = SocketHandle::new(id, AnyStream::Tcp(server_side), peer, max_frame_bytes);
    (Arc::new(handle), client)
}

/// Like `socket_pair`, with a custom bound on writes to the client.
pub async fn socket_pair_with_write_timeout(
    write_timeout: Duration,
) -> (Arc<SocketHandle>, TcpStream) {
    let (handle, client) = socket_pair().await;
    let handle = Arc::into_inner(handle)
        .expect("fresh handle is not shared")
        .with_write_timeout(write_timeout);
    (Arc::new(handle), client)
}

/// Receiver timings short enough to keep tests fast.
pub fn fast_receiver_config() -> ReceiverConfig {
    ReceiverConfig {
        acquire_backoff: Duration::from_millis(10),
        poll_timeout: Duration::from_millis(20),
        iteration_delay: Duration::from_millis(1),
        ..ReceiverConfig::default()
    }
}
