use clap::Args;

use disco::{Node, NodeIdentity};

use super::{Op, OpContext, Output};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Name remote nodes verify this node's certificate against
    #[arg(long)]
    pub server_san: Option<String>,
}

#[async_trait::async_trait]
impl Op for Init {
    async fn execute(&self, ctx: &OpContext) -> anyhow::Result<Output> {
        let mut config = ctx.config.clone();
        if let Some(san) = &self.server_san {
            config.server_san = san.clone();
        }
        config.write_if_absent(&ctx.config_path)?;

        let identity = NodeIdentity::generate();
        let key = identity.encode();
        let node = Node::init_dir(&ctx.data_dir, identity, config).await?;
        node.close().await?;

        Ok(Output::Text(format!(
            "Initialized disco node in {}\n\
             - Local user: {}\n\
             - Server name: {}\n\
             - Config: {}\n\
             \n\
             Encryption key: {}\n\
             \n\
             Export it as DISCO_ENCRYPTION_KEY to use this node. The key is not\n\
             stored anywhere and cannot be recovered.",
            ctx.data_dir.display(),
            node.local_user().name,
            node.authority().server_san(),
            ctx.config_path.display(),
            key,
        )))
    }
}
