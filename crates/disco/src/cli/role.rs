//! `disco role add|update|rm|ls`

use clap::{Args, Subcommand};

use disco::identity::{Permission, Role};
use disco::DiscoError;

use super::table;
use super::{Op, OpContext, Output};

#[derive(Args, Debug, Clone)]
pub struct Roles {
    #[command(subcommand)]
    pub command: RoleCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum RoleCommand {
    /// Add a new role
    Add {
        /// Unique name of the role
        name: String,
        /// Permissions as "<actions>:<namespaces>:<resource>:<target>", e.g. "rwd:dev,prod:store:myapp/*"
        #[arg(required = true)]
        permissions: Vec<Permission>,
    },
    /// Replace the permissions of a role
    Update {
        /// Unique name of the role
        name: String,
        /// The new permission set
        #[arg(required = true)]
        permissions: Vec<Permission>,
    },
    /// Remove a role
    Rm {
        /// Unique name of the role
        name: String,
        /// Remove the role even if users hold it
        #[arg(long)]
        force: bool,
    },
    /// List roles and their permissions
    Ls,
}

/// One row per permission; the role name only on the first.
fn rows(roles: &[Role]) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for role in roles {
        for (i, perm) in role.permissions.iter().enumerate() {
            let name = if i == 0 { role.name.clone() } else { String::new() };
            let namespaces: Vec<&str> = perm.namespaces().iter().map(String::as_str).collect();
            let actions: Vec<&str> = perm.actions().iter().map(|a| a.name()).collect();
            rows.push(vec![
                name,
                namespaces.join(","),
                actions.join(","),
                perm.target_column(),
            ]);
        }
    }
    rows
}

#[async_trait::async_trait]
impl Op for Roles {
    async fn execute(&self, ctx: &OpContext) -> anyhow::Result<Output> {
        let node = ctx.open_node().await?;
        let catalog = node.catalog();

        match &self.command {
            RoleCommand::Add { name, permissions } => {
                catalog
                    .create_role(&Role::new(name.clone(), permissions.clone()))
                    .await?;
                tracing::info!(role = %name, "role added");
            }
            RoleCommand::Update { name, permissions } => {
                catalog.update_role(name, permissions).await?;
            }
            RoleCommand::Rm { name, force } => {
                catalog
                    .delete_role(name, *force)
                    .await
                    .map_err(DiscoError::from)?;
                tracing::info!(role = %name, force = *force, "role removed");
            }
            RoleCommand::Ls => {
                let roles = catalog.roles().await?;
                let rows = rows(&roles);
                return Ok(Output::Text(table::render(
                    &["Name", "Namespaces", "Actions", "Target"],
                    &rows,
                )));
            }
        }
        Ok(Output::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_per_permission() {
        let role = Role::new(
            "ops",
            vec![
                "rw:dev,prod:store:myapp/*".parse().unwrap(),
                "r:*:user:*".parse().unwrap(),
            ],
        );
        assert_eq!(
            rows(&[role]),
            vec![
                vec!["ops", "dev,prod", "read,write", "store:myapp/*"],
                vec!["", "*", "read", "user:*"],
            ]
        );
    }
}
