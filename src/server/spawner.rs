// src/server/spawner.rs

//! Spawns the long-running pipeline tasks that sit behind the receiver.

use super::context::ServerContext;
use crate::core::analyzer::CommandAnalyzer;
use crate::core::transmitter::Transmitter;
use anyhow::{Result, anyhow};
use tracing::info;

/// Spawns the command analyzer and the transmitter into the background JoinSet.
pub fn spawn_all(ctx: &mut ServerContext) -> Result<()> {
    let pipeline = ctx
        .pipeline
        .take()
        .ok_or_else(|| anyhow!("Pipeline tasks have already been spawned"))?;
    let shutdown_tx = &ctx.shutdown_tx;
    let background_tasks = &mut ctx.background_tasks;

    let analyzer = CommandAnalyzer::new(
        ctx.app.protocols.clone(),
        pipeline.request_rx,
        pipeline.response_tx,
    );
    let shutdown_rx_analyzer = shutdown_tx.subscribe();
    background_tasks.spawn(async move {
        analyzer.run(shutdown_rx_analyzer).await;
        Ok(())
    });

    let transmitter = Transmitter::new(ctx.app.sockets.clone(), pipeline.response_rx);
    let shutdown_rx_transmitter = shutdown_tx.subscribe();
    background_tasks.spawn(async move {
        transmitter.run(shutdown_rx_transmitter).await;
        Ok(())
    });

    info!("Pipeline tasks spawned.");
    Ok(())
}
