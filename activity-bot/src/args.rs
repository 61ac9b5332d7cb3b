use crate::ops::{ActivitySettings, UriCycle};
use crate::retry::RetryConfig;
use crate::runner::RunnerConfig;
use crate::tasks::{DEFAULT_SCRIPT, DelayRange, OrderMode, Schedule, Task};
use activity_clients::{ClientConfig, GasLimits};
use alloy::primitives::{U256, utils::parse_ether};
use anyhow::{Context, Result, bail};
use chain_args::{ChainArgs, ChainConfig};
use clap::Parser;
use env_file::EnvFile;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

const DEFAULT_ENV_FILE: &str = ".env";
const DEFAULT_ARTIFACTS_DIR: &str = "contracts/out";

/// Backoff between attempts of a task that failed before broadcast.
const TASK_RETRY_DELAY: Duration = Duration::from_secs(2);
const TASK_RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

/// CLI arguments for the activity bot
#[derive(Parser, Debug)]
#[command(name = "activity-bot")]
#[command(about = "Testnet activity bot - deploys a token and an NFT collection and keeps accounts busy", long_about = None)]
pub struct CliArgs {
    #[clap(flatten)]
    pub chain_args: ChainArgs,

    /// dotenv file holding accounts and chain settings
    #[arg(long, env = "ENV_FILE", default_value = DEFAULT_ENV_FILE)]
    pub env_file: PathBuf,

    /// Directory with compiled contract artifacts (Foundry `out/` layout)
    #[arg(long, env = "ARTIFACTS_DIR")]
    pub artifacts_dir: Option<PathBuf>,

    /// Whole tokens minted to the deployer when the token is created
    #[arg(long, default_value_t = 1_000_000)]
    pub initial_supply: u64,

    /// Native amount sent by `send-native`, in ether units
    #[arg(long, default_value = "0.0001")]
    pub native_amount: String,

    /// Symbol shown next to native balances
    #[arg(long, default_value = "ZCX")]
    pub native_symbol: String,

    /// Whole tokens sent by `transfer-token`
    #[arg(long, default_value_t = 100)]
    pub token_transfer: u64,

    /// Whole tokens burned by `burn-token`
    #[arg(long, default_value_t = 10)]
    pub token_burn: u64,

    /// Whole tokens minted by `mint-token`
    #[arg(long, default_value_t = 500)]
    pub token_mint: u64,

    /// Metadata URI for minted NFTs, cycled per mint within a pass (repeatable)
    #[arg(long = "nft-uri", default_values_t = ["ipfs://example".to_string(), "ipfs://example2".to_string()])]
    pub nft_uris: Vec<String>,

    /// Maximum NFTs transferred or burned by one task
    #[arg(long, default_value_t = 1)]
    pub nft_batch: usize,

    /// Comma separated task list run for every account
    #[arg(long, value_enum, value_delimiter = ',', default_values_t = DEFAULT_SCRIPT.to_vec())]
    pub script: Vec<Task>,

    /// Task order within an account pass
    #[arg(long, value_enum, default_value_t = OrderMode::Fixed)]
    pub order: OrderMode,

    /// Lower bound of the random delay between tasks
    #[arg(long, default_value_t = 0)]
    pub task_delay_min_ms: u64,

    /// Upper bound of the random delay between tasks
    #[arg(long, default_value_t = 0)]
    pub task_delay_max_ms: u64,

    /// Delay after each account
    #[arg(long, default_value_t = 10)]
    pub account_delay_secs: u64,

    /// Full passes over all accounts (0 = run until interrupted)
    #[arg(long, default_value_t = 0)]
    pub iterations: u64,

    /// Receipt wait limit (0 = wait indefinitely)
    #[arg(long, default_value_t = 120)]
    pub receipt_timeout_secs: u64,

    /// Gas limit for contract deployments
    #[arg(long, default_value_t = 2_000_000)]
    pub deploy_gas: u64,

    /// Gas limit for contract calls
    #[arg(long, default_value_t = 200_000)]
    pub call_gas: u64,

    /// Gas limit for native transfers
    #[arg(long, default_value_t = 21_000)]
    pub transfer_gas: u64,

    /// Attempts per task when the node did not accept the transaction
    #[arg(long, default_value_t = 1)]
    pub max_attempts: u32,

    /// Reconcile NFT ownership every N passes (0 = never)
    #[arg(long, default_value_t = 1)]
    pub reconcile_every: u64,
}

/// Bot configuration with all values resolved
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub chain: ChainConfig,
    pub artifacts_dir: PathBuf,
    pub native_amount: U256,
    pub native_symbol: String,
    pub initial_supply: u64,
    pub token_transfer: u64,
    pub token_burn: u64,
    pub token_mint: u64,
    pub nft_uris: UriCycle,
    pub nft_batch: usize,
    pub script: Vec<Task>,
    pub order: OrderMode,
    pub task_delay: DelayRange,
    pub account_delay: Duration,
    pub iterations: u64,
    pub receipt_timeout: Option<Duration>,
    pub gas: GasLimits,
    pub max_attempts: u32,
    pub reconcile_every: u64,
}

impl BotConfig {
    /// Load configuration with priority: CLI/env -> env file -> defaults
    pub fn load(cli_args: CliArgs, env_file: &EnvFile) -> Result<Self> {
        let chain = ChainConfig::new(cli_args.chain_args, env_file)?;

        let artifacts_dir = cli_args
            .artifacts_dir
            .or_else(|| env_file.load_value("ARTIFACTS_DIR").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ARTIFACTS_DIR));

        let native_amount = parse_ether(cli_args.native_amount.trim())
            .with_context(|| format!("Invalid native amount: {}", cli_args.native_amount))?;

        let nft_uris = UriCycle::new(cli_args.nft_uris)?;
        if cli_args.nft_batch == 0 {
            bail!("NFT batch size must be at least 1");
        }
        if cli_args.max_attempts == 0 {
            bail!("Max attempts must be at least 1");
        }

        let task_delay = DelayRange::new(
            Duration::from_millis(cli_args.task_delay_min_ms),
            Duration::from_millis(cli_args.task_delay_max_ms),
        )?;

        let receipt_timeout = match cli_args.receipt_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let config = BotConfig {
            chain,
            artifacts_dir,
            native_amount,
            native_symbol: cli_args.native_symbol,
            initial_supply: cli_args.initial_supply,
            token_transfer: cli_args.token_transfer,
            token_burn: cli_args.token_burn,
            token_mint: cli_args.token_mint,
            nft_uris,
            nft_batch: cli_args.nft_batch,
            script: cli_args.script,
            order: cli_args.order,
            task_delay,
            account_delay: Duration::from_secs(cli_args.account_delay_secs),
            iterations: cli_args.iterations,
            receipt_timeout,
            gas: GasLimits {
                deploy: cli_args.deploy_gas,
                call: cli_args.call_gas,
                native_transfer: cli_args.transfer_gas,
            },
            max_attempts: cli_args.max_attempts,
            reconcile_every: cli_args.reconcile_every,
        };

        info!(
            rpc_url = %config.chain.rpc_url,
            chain_id = config.chain.chain_id,
            artifacts_dir = %config.artifacts_dir.display(),
            tasks = config.script.len(),
            order = ?config.order,
            iterations = config.iterations,
            "Loaded BotConfig"
        );

        Ok(config)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.chain.rpc_url.clone(), self.chain.chain_id)
            .with_receipt_timeout(self.receipt_timeout)
            .with_gas_limits(self.gas)
    }

    pub fn schedule(&self) -> Result<Schedule> {
        Schedule::new(self.script.clone(), self.order)
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            iterations: self.iterations,
            task_delay: self.task_delay,
            account_delay: self.account_delay,
            task_retry: RetryConfig::doubling(TASK_RETRY_DELAY, self.max_attempts, TASK_RETRY_MAX_DELAY),
            reconcile_every: self.reconcile_every,
            read_retry: RetryConfig::for_reads(),
            native_symbol: self.native_symbol.clone(),
        }
    }

    pub fn activity_settings(&self) -> ActivitySettings {
        ActivitySettings {
            native_amount: self.native_amount,
            native_symbol: self.native_symbol.clone(),
            initial_supply: self.initial_supply,
            token_transfer: self.token_transfer,
            token_burn: self.token_burn,
            token_mint: self.token_mint,
            nft_uris: self.nft_uris.clone(),
            nft_batch: self.nft_batch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Result<BotConfig> {
        let mut argv = vec![
            "activity-bot",
            "--rpc-url",
            "http://127.0.0.1:8545",
            "--chain-id",
            "31337",
            "--artifacts-dir",
            "out",
        ];
        argv.extend_from_slice(extra);
        BotConfig::load(CliArgs::try_parse_from(argv)?, &EnvFile::default())
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).unwrap();

        assert_eq!(config.native_amount, U256::from(100_000_000_000_000u64));
        assert_eq!(config.initial_supply, 1_000_000);
        assert_eq!((config.token_transfer, config.token_burn, config.token_mint), (100, 10, 500));
        assert_eq!(
            config.nft_uris,
            UriCycle::new(vec!["ipfs://example".to_string(), "ipfs://example2".to_string()]).unwrap()
        );
        assert_eq!(config.script, DEFAULT_SCRIPT.to_vec());
        assert_eq!(config.order, OrderMode::Fixed);
        assert_eq!(config.account_delay, Duration::from_secs(10));
        assert_eq!(config.receipt_timeout, Some(Duration::from_secs(120)));
        assert_eq!(config.gas, GasLimits::default());
        assert_eq!(config.chain.chain_id, 31337);
    }

    #[test]
    fn test_script_and_order() {
        let config = parse(&["--script", "mint-nft,burn-nft", "--order", "shuffled"]).unwrap();
        assert_eq!(config.script, vec![Task::MintNft, Task::BurnNft]);
        assert_eq!(config.order, OrderMode::Shuffled);
    }

    #[test]
    fn test_unknown_task_rejected() {
        assert!(parse(&["--script", "mint-nft,teleport"]).is_err());
    }

    #[test]
    fn test_zero_receipt_timeout_waits_forever() {
        let config = parse(&["--receipt-timeout-secs", "0"]).unwrap();
        assert_eq!(config.receipt_timeout, None);
        assert_eq!(config.client_config().receipt_timeout, None);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(parse(&["--native-amount", "lots"]).is_err());
        assert!(parse(&["--nft-batch", "0"]).is_err());
        assert!(parse(&["--max-attempts", "0"]).is_err());
        assert!(parse(&["--task-delay-min-ms", "500", "--task-delay-max-ms", "100"]).is_err());
    }

    #[test]
    fn test_runner_config() {
        let config = parse(&["--max-attempts", "3", "--iterations", "2"]).unwrap();
        let runner = config.runner_config();
        assert_eq!(runner.iterations, 2);
        assert_eq!(runner.task_retry.max_attempts, 3);
        assert_eq!(runner.task_retry.delay_after(2), Duration::from_secs(4));
        assert_eq!(runner.native_symbol, "ZCX");
    }
}
