//! `disco user add|update|rm|ls`

use clap::{Args, Subcommand};

use super::table;
use super::{Op, OpContext, Output};

#[derive(Args, Debug, Clone)]
pub struct Users {
    #[command(subcommand)]
    pub command: UserCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum UserCommand {
    /// Add a new remote user
    Add {
        /// Unique name of the user
        name: String,
        /// Roles to assign, comma-separated
        #[arg(long, value_delimiter = ',')]
        roles: Vec<String>,
    },
    /// Replace the roles of a user
    Update {
        /// Unique name of the user
        name: String,
        /// Roles to assign, comma-separated; existing roles are removed
        #[arg(long, value_delimiter = ',')]
        roles: Vec<String>,
    },
    /// Remove a user along with its invitations
    Rm {
        /// Unique name of the user
        name: String,
    },
    /// List users
    Ls,
}

#[async_trait::async_trait]
impl Op for Users {
    async fn execute(&self, ctx: &OpContext) -> anyhow::Result<Output> {
        let node = ctx.open_node().await?;

        match &self.command {
            UserCommand::Add { name, roles } => {
                node.add_user(name, roles).await?;
            }
            UserCommand::Update { name, roles } => {
                node.update_user(name, roles).await?;
            }
            UserCommand::Rm { name } => {
                node.remove_user(name).await?;
            }
            UserCommand::Ls => {
                let users = node.users().await?;
                if users.is_empty() {
                    return Ok(Output::Empty);
                }
                let rows: Vec<Vec<String>> = users
                    .iter()
                    .map(|u| vec![u.name.clone(), u.role_names().join(",")])
                    .collect();
                return Ok(Output::Text(table::render(&["Name", "Roles"], &rows)));
            }
        }
        Ok(Output::Empty)
    }
}
