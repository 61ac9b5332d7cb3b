use anyhow::{Context, Result};
use clap::Args;
use env_file::EnvFile;

/// Public ZenChain testnet endpoint used when nothing else is configured.
pub const DEFAULT_RPC_URL: &str = "https://zenchain-testnet.api.onfinality.io/public";

/// ZenChain testnet chain id.
pub const DEFAULT_CHAIN_ID: u64 = 8408;

/// Chain connection arguments shared by every binary in the workspace.
#[derive(Args, Debug, Clone, Default)]
pub struct ChainArgs {
    /// RPC URL for the chain node (HTTP or WebSocket)
    #[arg(long, env = "RPC_URL")]
    pub rpc_url: Option<String>,

    /// Chain id used for EIP-155 transaction signing
    #[arg(long, env = "CHAIN_ID")]
    pub chain_id: Option<u64>,
}

/// Chain connection settings with all values resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub chain_id: u64,
}

impl ChainConfig {
    /// Resolve with priority: CLI/env -> env file -> defaults
    pub fn new(args: ChainArgs, env_file: &EnvFile) -> Result<Self> {
        let rpc_url = args
            .rpc_url
            .or_else(|| env_file.load_value("RPC_URL"))
            .unwrap_or_else(|| DEFAULT_RPC_URL.to_string());

        let chain_id = match args.chain_id {
            Some(id) => id,
            None => match env_file.load_value("CHAIN_ID") {
                Some(raw) => raw
                    .parse::<u64>()
                    .with_context(|| format!("Invalid CHAIN_ID in env file: {raw}"))?,
                None => DEFAULT_CHAIN_ID,
            },
        };

        Ok(Self { rpc_url, chain_id })
    }
}
