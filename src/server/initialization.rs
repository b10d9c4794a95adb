// src/server/initialization.rs

//! Handles relay initialization: application context, TLS material, the
//! listener and the pipeline channels.

use super::context::{PipelineChannels, ServerContext};
use super::domain;
use crate::config::Config;
use anyhow::{Result, anyhow};
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio_rustls::{TlsAcceptor, rustls};
use tracing::info;

/// Initializes all relay components before starting the accept loop.
pub async fn setup(config: Config) -> Result<ServerContext> {
    log_startup_info(&config);
    let (shutdown_tx, _) = broadcast::channel(1);

    let acceptor = setup_tls(&config)?;

    let (request_tx, request_rx) = mpsc::channel(config.receiver.analyzer_queue);
    let (response_tx, response_rx) = mpsc::channel(config.receiver.analyzer_queue);

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!(
        "Relay listening on {} (TLS: {}).",
        listener.local_addr()?,
        acceptor.is_some()
    );

    let app = domain::init_app_context(config)?;
    info!("Application context initialized.");

    Ok(ServerContext {
        app,
        listener,
        acceptor,
        shutdown_tx,
        background_tasks: JoinSet::new(),
        request_tx,
        pipeline: Some(PipelineChannels {
            request_rx,
            response_tx,
            response_rx,
        }),
    })
}

/// Sets up the TLS acceptor if TLS is enabled in the configuration.
fn setup_tls(config: &Config) -> Result<Option<TlsAcceptor>> {
    if !config.tls.enabled {
        return Ok(None);
    }
    info!("TLS is enabled. Loading certificate and key.");
    let certs = load_certs(&config.tls.cert_path)?;
    let key = load_key(&config.tls.key_path)?;
    let server_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    Ok(Some(TlsAcceptor::from(Arc::new(server_config))))
}

/// Loads TLS certificates from a PEM file.
fn load_certs(path: &str) -> Result<Vec<rustls::pki_types::CertificateDer<'static>>> {
    let cert_file = File::open(path)
        .map_err(|e| anyhow!("Failed to open certificate file '{}': {}", path, e))?;
    let mut cert_reader = BufReader::new(cert_file);
    let certs = rustls_pemfile::certs(&mut cert_reader).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(anyhow!("No certificates found in '{}'", path));
    }
    Ok(certs)
}

/// Loads a private key from a PEM file.
fn load_key(path: &str) -> Result<rustls::pki_types::PrivateKeyDer<'static>> {
    let key_file = File::open(path)
        .map_err(|e| anyhow!("Failed to open private key file '{}': {}", path, e))?;
    let mut key_reader = BufReader::new(key_file);
    rustls_pemfile::private_key(&mut key_reader)?
        .ok_or_else(|| anyhow!("No private key found in key file '{}'", path))
}

fn log_startup_info(config: &Config) {
    let receiver = &config.receiver;
    info!(
        "Receiver timing: acquire backoff {}ms, poll timeout {}ms, iteration delay {}ms.",
        receiver.acquire_backoff.as_millis(),
        receiver.poll_timeout.as_millis(),
        receiver.iteration_delay.as_millis()
    );
    info!(
        "Frames are limited to {} bytes; {} consecutive unexpected errors close a connection.",
        receiver.max_frame_bytes, receiver.max_unclassified_faults
    );
}
