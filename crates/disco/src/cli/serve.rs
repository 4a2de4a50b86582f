use anyhow::Context;
use clap::Args;
use tokio_util::sync::CancellationToken;

use super::{Op, OpContext, Output};

#[derive(Args, Debug, Clone)]
pub struct Serve {
    /// [host]:port to listen on (default: listen_addr from the config)
    #[arg(long)]
    pub address: Option<String>,
}

#[async_trait::async_trait]
impl Op for Serve {
    async fn execute(&self, ctx: &OpContext) -> anyhow::Result<Output> {
        let node = ctx.open_node().await?;
        let server = node
            .bind(self.address.as_deref())
            .await
            .context("failed starting server")?;

        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            tracing::info!("shutdown signal received");
            trigger.cancel();
        });

        server.serve(shutdown).await?;
        node.close().await?;
        tracing::info!("server stopped");
        Ok(Output::Empty)
    }
}

/// Resolve on SIGINT or SIGTERM.
#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed installing SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
