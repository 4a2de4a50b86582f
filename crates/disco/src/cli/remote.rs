//! `disco remote add|ls|rm`

use std::time::{Duration, UNIX_EPOCH};

use anyhow::Context;
use clap::{Args, Subcommand};

use super::table;
use super::{Op, OpContext, Output};

#[derive(Args, Debug, Clone)]
pub struct Remotes {
    #[command(subcommand)]
    pub command: RemoteCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum RemoteCommand {
    /// Join a remote node with an invitation token
    Add {
        /// Local name for the remote node
        name: String,
        /// [host]:port of the remote node
        address: String,
        /// Invitation token printed by `disco invite user` on the remote node
        token: String,
    },
    /// List remote nodes
    Ls,
    /// Forget a remote node
    Rm {
        /// Local name of the remote node
        name: String,
    },
}

#[async_trait::async_trait]
impl Op for Remotes {
    async fn execute(&self, ctx: &OpContext) -> anyhow::Result<Output> {
        let node = ctx.open_node().await?;

        match &self.command {
            RemoteCommand::Add {
                name,
                address,
                token,
            } => {
                let remote = node
                    .join(name, address, token)
                    .await
                    .with_context(|| format!("failed joining remote node at {}", address))?;
                Ok(Output::Text(format!(
                    "Joined remote '{}' at {} (server name: {})",
                    remote.name, remote.address, remote.tls_server_san
                )))
            }
            RemoteCommand::Ls => {
                let remotes = node.catalog().remotes().await?;
                if remotes.is_empty() {
                    return Ok(Output::Empty);
                }
                let rows: Vec<Vec<String>> = remotes
                    .iter()
                    .map(|r| {
                        let created = UNIX_EPOCH
                            + Duration::from_millis(u64::try_from(r.created_at).unwrap_or(0));
                        vec![
                            r.name.clone(),
                            r.address.clone(),
                            r.tls_server_san.clone(),
                            humantime::format_rfc3339_seconds(created).to_string(),
                        ]
                    })
                    .collect();
                Ok(Output::Text(table::render(
                    &["Name", "Address", "Server Name", "Created"],
                    &rows,
                )))
            }
            RemoteCommand::Rm { name } => {
                node.catalog().delete_remote(name).await?;
                tracing::info!(remote = %name, "remote removed");
                Ok(Output::Empty)
            }
        }
    }
}
