use alloy::primitives::{Address, B256, U256};
use anyhow::{Result, bail};
use clap::ValueEnum;
use rand::{Rng, seq::SliceRandom};
use std::fmt;
use std::time::Duration;

/// One scripted on-chain action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum Task {
    /// Send native currency to a fresh random address
    SendNative,
    /// Deploy a new storage contract instance
    DeployStorage,
    /// Send tokens to the pass receiver
    TransferToken,
    /// Mint an NFT to the account
    MintNft,
    /// Transfer owned NFTs to the pass receiver
    TransferNft,
    /// Burn tokens held by the account
    BurnToken,
    /// Burn owned NFTs
    BurnNft,
    /// Mint tokens to the account
    MintToken,
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Task::SendNative => "send-native",
            Task::DeployStorage => "deploy-storage",
            Task::TransferToken => "transfer-token",
            Task::MintNft => "mint-nft",
            Task::TransferNft => "transfer-nft",
            Task::BurnToken => "burn-token",
            Task::BurnNft => "burn-nft",
            Task::MintToken => "mint-token",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The per-account script run when `--script` is not given.
pub const DEFAULT_SCRIPT: [Task; 9] = [
    Task::SendNative,
    Task::DeployStorage,
    Task::TransferToken,
    Task::MintNft,
    Task::TransferNft,
    Task::BurnToken,
    Task::BurnNft,
    Task::MintToken,
    Task::MintNft,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OrderMode {
    /// Run the script in the configured order
    Fixed,
    /// Shuffle the script for every account on every pass
    Shuffled,
}

/// Per-task inputs shared by one account pass.
#[derive(Debug, Clone, Copy)]
pub struct TaskContext {
    /// Random receiver drawn once per account pass.
    pub receiver: Address,
    /// How many times the same task already ran earlier in this pass.
    pub occurrence: usize,
}

/// What a successful task produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Sent { tx_hash: B256 },
    Deployed { address: Address },
    Minted { token_id: U256 },
    Batch { succeeded: usize, failed: usize },
    Skipped { reason: &'static str },
}

impl TaskOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, TaskOutcome::Skipped { .. })
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOutcome::Sent { tx_hash } => write!(f, "sent {tx_hash}"),
            TaskOutcome::Deployed { address } => write!(f, "deployed at {address}"),
            TaskOutcome::Minted { token_id } => write!(f, "minted #{token_id}"),
            TaskOutcome::Batch { succeeded, failed } => {
                write!(f, "{succeeded} succeeded, {failed} failed")
            }
            TaskOutcome::Skipped { reason } => write!(f, "skipped: {reason}"),
        }
    }
}

/// Produces the task order for each account pass.
#[derive(Debug, Clone)]
pub struct Schedule {
    script: Vec<Task>,
    order: OrderMode,
}

impl Schedule {
    pub fn new(script: Vec<Task>, order: OrderMode) -> Result<Self> {
        if script.is_empty() {
            bail!("Task script is empty");
        }
        Ok(Self { script, order })
    }

    pub fn next<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Task> {
        let mut tasks = self.script.clone();
        if self.order == OrderMode::Shuffled {
            tasks.shuffle(rng);
        }
        tasks
    }
}

/// Inclusive delay range; `min == max` is a fixed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    min: Duration,
    max: Duration,
}

impl DelayRange {
    pub fn new(min: Duration, max: Duration) -> Result<Self> {
        if min > max {
            bail!("Delay minimum {min:?} exceeds maximum {max:?}");
        }
        Ok(Self { min, max })
    }

    pub fn fixed(delay: Duration) -> Self {
        Self {
            min: delay,
            max: delay,
        }
    }

    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let millis = rng.random_range(self.min.as_millis()..=self.max.as_millis());
        Duration::from_millis(millis as u64)
    }
}
