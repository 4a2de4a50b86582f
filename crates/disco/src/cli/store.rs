//! Key-value commands, against the local store or a remote node.

use anyhow::bail;
use clap::Args;
use tokio::io::AsyncReadExt;

use disco::store::{Keys, ALL_NAMESPACES, DEFAULT_NAMESPACE};

use super::{Op, OpContext, Output};

fn reject_wildcard(namespace: &str, command: &str) -> anyhow::Result<()> {
    if namespace == ALL_NAMESPACES {
        bail!("namespace '*' is not supported for the {} command", command);
    }
    Ok(())
}

/// One key per line, prefixed with its namespace when listing all of them.
fn format_keys(keys: &Keys, namespace: &str) -> String {
    let mut lines = Vec::new();
    for (ns, names) in keys {
        for key in names {
            if namespace == ALL_NAMESPACES {
                lines.push(format!("{}:{}", ns, key));
            } else {
                lines.push(key.clone());
            }
        }
    }
    lines.join("\n")
}

#[derive(Args, Debug, Clone)]
pub struct Get {
    /// The key to look up
    pub key: String,

    /// Namespace to read from
    #[arg(long, default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Remote node to read from
    #[arg(long)]
    pub remote: Option<String>,
}

#[async_trait::async_trait]
impl Op for Get {
    async fn execute(&self, ctx: &OpContext) -> anyhow::Result<Output> {
        reject_wildcard(&self.namespace, "get")?;
        let node = ctx.open_node().await?;

        let value = match &self.remote {
            Some(remote) => {
                node.remote_client(remote)
                    .await?
                    .get(&self.namespace, &self.key)
                    .await?
            }
            None => node.store().get(&self.namespace, &self.key).await?,
        };
        match value {
            Some(value) => Ok(Output::Bytes(value)),
            None => bail!(
                "key '{}' doesn't exist in the '{}' namespace",
                self.key,
                self.namespace
            ),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct Set {
    /// The key to set
    pub key: String,

    /// The value, or `-` to read it from stdin
    pub value: String,

    /// Namespace to write to
    #[arg(long, default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Remote node to write to
    #[arg(long)]
    pub remote: Option<String>,
}

#[async_trait::async_trait]
impl Op for Set {
    async fn execute(&self, ctx: &OpContext) -> anyhow::Result<Output> {
        reject_wildcard(&self.namespace, "set")?;
        let value = if self.value == "-" {
            let mut buf = Vec::new();
            tokio::io::stdin().read_to_end(&mut buf).await?;
            buf
        } else {
            self.value.clone().into_bytes()
        };

        let node = ctx.open_node().await?;
        match &self.remote {
            Some(remote) => {
                node.remote_client(remote)
                    .await?
                    .set(&self.namespace, &self.key, &value)
                    .await?
            }
            None => node.store().set(&self.namespace, &self.key, &value).await?,
        }
        node.close().await?;
        Ok(Output::Empty)
    }
}

#[derive(Args, Debug, Clone)]
pub struct Ls {
    /// Only list keys starting with this prefix
    pub prefix: Option<String>,

    /// Namespace to list, or `*` for all of them
    #[arg(long, default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Remote node to list
    #[arg(long)]
    pub remote: Option<String>,
}

#[async_trait::async_trait]
impl Op for Ls {
    async fn execute(&self, ctx: &OpContext) -> anyhow::Result<Output> {
        let prefix = self.prefix.as_deref().unwrap_or("");
        let node = ctx.open_node().await?;

        let keys = match &self.remote {
            Some(remote) => {
                node.remote_client(remote)
                    .await?
                    .list(&self.namespace, prefix)
                    .await?
            }
            None => node.store().list(&self.namespace, prefix).await?,
        };
        Ok(Output::Text(format_keys(&keys, &self.namespace)))
    }
}

#[derive(Args, Debug, Clone)]
pub struct Rm {
    /// The key to delete
    pub key: String,

    /// Namespace to delete from
    #[arg(long, default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Remote node to delete from
    #[arg(long)]
    pub remote: Option<String>,
}

#[async_trait::async_trait]
impl Op for Rm {
    async fn execute(&self, ctx: &OpContext) -> anyhow::Result<Output> {
        reject_wildcard(&self.namespace, "rm")?;
        let node = ctx.open_node().await?;

        match &self.remote {
            Some(remote) => {
                node.remote_client(remote)
                    .await?
                    .delete(&self.namespace, &self.key)
                    .await?
            }
            None => node.store().delete(&self.namespace, &self.key).await?,
        }
        node.close().await?;
        Ok(Output::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_rejected() {
        let err = reject_wildcard("*", "get").unwrap_err();
        assert_eq!(err.to_string(), "namespace '*' is not supported for the get command");
        assert!(reject_wildcard("default", "get").is_ok());
    }

    #[test]
    fn test_format_keys() {
        let mut keys = Keys::new();
        keys.insert("default".into(), vec!["a".into(), "b".into()]);
        assert_eq!(format_keys(&keys, "default"), "a\nb");

        keys.insert("dev".into(), vec!["c".into()]);
        assert_eq!(format_keys(&keys, "*"), "default:a\ndefault:b\ndev:c");
    }
}
