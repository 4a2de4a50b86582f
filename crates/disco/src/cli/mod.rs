//! Command-line interface.
//!
//! Every command is an [`Op`]: it runs against an [`OpContext`] and returns
//! [`Output`] for `main` to print. Commands other than `init` open the node
//! with the root key from `DISCO_ENCRYPTION_KEY`.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use disco::config::CONFIG_FILE_NAME;
use disco::{default_data_dir, DiscoError, Node, NodeConfig, NodeIdentity};

pub mod init;
pub mod invite;
pub mod remote;
pub mod role;
pub mod serve;
pub mod store;
pub mod table;
pub mod user;

#[derive(Parser, Debug)]
#[command(name = "disco", version, about = "Encrypted key-value store with remote, permission-scoped access")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding the node databases (default: $XDG_DATA_HOME/disco)
    #[arg(long, env = "DISCO_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Path to the config file (default: <data-dir>/disco.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "DISCO_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Root key printed by `disco init`
    #[arg(long, env = "DISCO_ENCRYPTION_KEY", hide = true, hide_env_values = true, global = true)]
    pub encryption_key: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a new node and print its encryption key
    Init(init::Init),
    /// Get the value of a key
    Get(store::Get),
    /// Set the value of a key
    Set(store::Set),
    /// List keys
    Ls(store::Ls),
    /// Delete a key
    Rm(store::Rm),
    /// Serve the store to remote nodes
    Serve(serve::Serve),
    /// Manage users
    User(user::Users),
    /// Manage roles
    Role(role::Roles),
    /// Manage invitations for remote users
    Invite(invite::Invites),
    /// Manage remote nodes this node has joined
    Remote(remote::Remotes),
}

impl Command {
    pub async fn execute(&self, ctx: &OpContext) -> anyhow::Result<Output> {
        match self {
            Command::Init(op) => op.execute(ctx).await,
            Command::Get(op) => op.execute(ctx).await,
            Command::Set(op) => op.execute(ctx).await,
            Command::Ls(op) => op.execute(ctx).await,
            Command::Rm(op) => op.execute(ctx).await,
            Command::Serve(op) => op.execute(ctx).await,
            Command::User(op) => op.execute(ctx).await,
            Command::Role(op) => op.execute(ctx).await,
            Command::Invite(op) => op.execute(ctx).await,
            Command::Remote(op) => op.execute(ctx).await,
        }
    }
}

/// A runnable command.
#[async_trait::async_trait]
pub trait Op {
    async fn execute(&self, ctx: &OpContext) -> anyhow::Result<Output>;
}

/// What a command prints on success.
#[derive(Debug, PartialEq, Eq)]
pub enum Output {
    Empty,
    /// Printed with a trailing newline.
    Text(String),
    /// Written as is, e.g. a stored value.
    Bytes(Vec<u8>),
}

impl Output {
    pub fn write(&self, out: &mut impl Write) -> std::io::Result<()> {
        match self {
            Output::Empty => Ok(()),
            Output::Text(text) if text.is_empty() => Ok(()),
            Output::Text(text) => writeln!(out, "{}", text),
            Output::Bytes(bytes) => out.write_all(bytes),
        }?;
        out.flush()
    }
}

/// Resolved paths and settings shared by all commands.
#[derive(Debug, Clone)]
pub struct OpContext {
    pub data_dir: PathBuf,
    pub config_path: PathBuf,
    pub config: NodeConfig,
    /// Effective log level: flag or env, else config.
    pub log_level: String,
    encryption_key: Option<String>,
}

impl OpContext {
    pub fn new(args: &Args) -> anyhow::Result<Self> {
        let data_dir = match &args.data_dir {
            Some(dir) => dir.clone(),
            None => default_data_dir()
                .context("could not determine the data directory; pass --data-dir")?,
        };
        let config_path = args
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join(CONFIG_FILE_NAME));
        let config = NodeConfig::load(&config_path)?;
        let log_level = args
            .log_level
            .clone()
            .unwrap_or_else(|| config.log_level.clone());

        Ok(Self {
            data_dir,
            config_path,
            config,
            log_level,
            encryption_key: args.encryption_key.clone(),
        })
    }

    /// The root key supplied through the environment.
    pub fn identity(&self) -> Result<NodeIdentity, DiscoError> {
        let key = self.encryption_key.as_deref().ok_or(DiscoError::MissingKey)?;
        NodeIdentity::decode(key)
    }

    pub async fn open_node(&self) -> anyhow::Result<Node> {
        let node = Node::open_dir(&self.data_dir, self.identity()?, self.config.clone()).await?;
        Ok(node)
    }
}

/// Print an error with its causes and, when one applies, a hint.
pub fn report(err: &anyhow::Error) {
    let hint = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<DiscoError>())
        .and_then(DiscoError::hint);
    match hint {
        Some(hint) => eprintln!("Error: {:#} ({})", err, hint),
        None => eprintln!("Error: {:#}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_parse() {
        Args::command().debug_assert();

        let args = Args::try_parse_from([
            "disco",
            "--data-dir",
            "/tmp/node",
            "role",
            "add",
            "reader",
            "r:default:store:*",
        ])
        .unwrap();
        assert_eq!(args.data_dir.as_deref(), Some(std::path::Path::new("/tmp/node")));
        assert!(matches!(args.command, Command::Role(_)));
    }

    #[test]
    fn test_context_paths() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args::try_parse_from([
            "disco",
            "ls",
            "--data-dir",
            dir.path().to_str().unwrap(),
            "--log-level",
            "debug",
        ])
        .unwrap();
        let ctx = OpContext::new(&args).unwrap();
        assert_eq!(ctx.config_path, dir.path().join("disco.toml"));
        assert_eq!(ctx.config, NodeConfig::default());
        assert_eq!(ctx.log_level, "debug");
    }

    #[test]
    fn test_output_write() {
        let mut out = Vec::new();
        Output::Text("hello".into()).write(&mut out).unwrap();
        Output::Bytes(vec![0, 1]).write(&mut out).unwrap();
        Output::Text(String::new()).write(&mut out).unwrap();
        assert_eq!(out, b"hello\n\x00\x01");
    }
}
