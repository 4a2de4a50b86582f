//! `disco invite user|ls|rm|update`

use std::time::{Duration, UNIX_EPOCH};

use anyhow::Context;
use clap::{Args, Subcommand};

use disco::identity::{now_millis, Invite};
use disco::pair::CompositeToken;

use super::table;
use super::{Op, OpContext, Output};

#[derive(Args, Debug, Clone)]
pub struct Invites {
    #[command(subcommand)]
    pub command: InviteCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum InviteCommand {
    /// Create an invitation token for an existing user to access this node remotely
    User {
        /// Name of the user to invite
        name: String,
        /// How long the invite is valid for (default: invite_ttl from the config)
        #[arg(long, value_parser = humantime::parse_duration)]
        ttl: Option<Duration>,
    },
    /// List invites
    Ls {
        /// Also include expired invites
        #[arg(long)]
        all: bool,
    },
    /// Delete one or more invites
    Rm {
        /// Invite UUIDs; a unique prefix is enough
        #[arg(required = true)]
        uuids: Vec<String>,
    },
    /// Extend the validity of an invite
    Update {
        /// Invite UUID or a unique prefix
        uuid: String,
        /// How long from now the invite stays valid
        #[arg(long, value_parser = humantime::parse_duration)]
        ttl: Duration,
    },
}

/// `2024-05-01T10:00:00Z (59m 59s)`, or `(expired)` once past.
fn format_expiry(expires: i64, now: i64) -> String {
    let at = UNIX_EPOCH + Duration::from_millis(u64::try_from(expires).unwrap_or(0));
    let at = humantime::format_rfc3339_seconds(at);
    if expires > now {
        let left = Duration::from_secs(u64::try_from((expires - now + 500) / 1000).unwrap_or(0));
        format!("{} ({})", at, humantime::format_duration(left))
    } else {
        format!("{} (expired)", at)
    }
}

/// Active invites first, then a blank line, then expired ones.
fn rows(invites: &[Invite], now: i64) -> Vec<Vec<String>> {
    let row = |inv: &Invite| {
        vec![
            inv.uuid.clone(),
            inv.user.name.clone(),
            CompositeToken::from_invite(inv).to_string(),
            format_expiry(inv.expires, now),
        ]
    };
    let (expired, active): (Vec<&Invite>, Vec<&Invite>) =
        invites.iter().partition(|inv| inv.is_expired(now));

    let mut rows: Vec<Vec<String>> = active.into_iter().map(row).collect();
    if !expired.is_empty() && !rows.is_empty() {
        rows.push(Vec::new());
    }
    rows.extend(expired.into_iter().map(row));
    rows
}

#[async_trait::async_trait]
impl Op for Invites {
    async fn execute(&self, ctx: &OpContext) -> anyhow::Result<Output> {
        let node = ctx.open_node().await?;

        match &self.command {
            InviteCommand::User { name, ttl } => {
                let issued = node
                    .invite(name, *ttl)
                    .await
                    .with_context(|| format!("failed creating invite for user '{}'", name))?;
                Ok(Output::Text(format!(
                    "Token: {}\nExpires: {}",
                    issued.token,
                    format_expiry(issued.invite.expires, now_millis())
                )))
            }
            InviteCommand::Ls { all } => {
                let invites = node.catalog().invites(*all).await?;
                if invites.is_empty() {
                    return Ok(Output::Empty);
                }
                let rows = rows(&invites, now_millis());
                Ok(Output::Text(table::render(
                    &["UUID", "User", "Token", "Expiration"],
                    &rows,
                )))
            }
            InviteCommand::Rm { uuids } => {
                for uuid in uuids {
                    node.catalog().delete_invite(uuid).await?;
                    tracing::info!(uuid = %uuid, "invite removed");
                }
                Ok(Output::Empty)
            }
            InviteCommand::Update { uuid, ttl } => {
                node.extend_invite(uuid, *ttl).await?;
                Ok(Output::Empty)
            }
        }
    }
}
