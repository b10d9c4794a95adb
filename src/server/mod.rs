// src/server/mod.rs

use crate::config::Config;
use anyhow::Result;
use std::future::Future;
use std::net::SocketAddr;

mod connection_loop;
mod context;
mod domain;
mod initialization;
mod spawner;
mod stream;

pub use domain::init_protocols;
pub use stream::AnyStream;

/// A bound relay whose pipeline tasks are already running.
pub struct Server {
    ctx: context::ServerContext,
}

impl Server {
    /// Initializes the relay and spawns its pipeline tasks. Connections are not
    /// accepted until `serve` is called.
    pub async fn bind(config: Config) -> Result<Self> {
        let mut ctx = initialization::setup(config).await?;
        spawner::spawn_all(&mut ctx)?;
        Ok(Self { ctx })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.ctx.listener.local_addr()?)
    }

    /// Runs the accept loop until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        connection_loop::run(self.ctx, shutdown).await;
        Ok(())
    }
}

/// The relay startup function: bind, then serve until SIGINT or SIGTERM.
pub async fn run(config: Config) -> Result<()> {
    let server = Server::bind(config).await?;
    let shutdown = connection_loop::shutdown_signal()?;
    server.serve(shutdown).await
}
