use crate::report::{self, BalanceStage};
use crate::retry::{Cancelled, RetryConfig, pause, until_cancelled};
use crate::tasks::{DelayRange, Schedule, Task, TaskContext, TaskOutcome};
use activity_clients::{Account, TxError, random_address};
use alloy::primitives::U256;
use async_trait::async_trait;
use rand::{SeedableRng, rngs::StdRng};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// The chain side of the loop. One implementation talks to the network,
/// tests plug in fakes.
#[async_trait]
pub trait ActivityOps: Send {
    async fn native_balance(&self, account: &Account) -> Result<U256, TxError>;

    async fn execute(
        &mut self,
        account: &Account,
        task: Task,
        ctx: &TaskContext,
    ) -> Result<TaskOutcome, TxError>;

    /// Correct local bookkeeping for `account` against the chain.
    async fn reconcile(&mut self, account: &Account) -> Result<usize, TxError>;
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Full passes over all accounts. 0 runs until cancelled.
    pub iterations: u64,
    pub task_delay: DelayRange,
    pub account_delay: Duration,
    /// Retry policy for tasks failing with a retryable error.
    pub task_retry: RetryConfig,
    /// Reconcile NFT ownership every N passes. 0 disables it.
    pub reconcile_every: u64,
    pub read_retry: RetryConfig,
    pub native_symbol: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            iterations: 0,
            task_delay: DelayRange::fixed(Duration::ZERO),
            account_delay: Duration::from_secs(10),
            task_retry: RetryConfig::once(),
            reconcile_every: 1,
            read_retry: RetryConfig::for_reads(),
            native_symbol: "ZCX".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
}

/// Success and failure counters accumulated over the whole run.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    per_task: BTreeMap<Task, TaskStats>,
    errors: BTreeMap<&'static str, u64>,
}

impl RunStats {
    pub fn record(&mut self, task: Task, result: &Result<TaskOutcome, TxError>) {
        let entry = self.per_task.entry(task).or_default();
        match result {
            Ok(outcome) if outcome.is_skipped() => entry.skipped += 1,
            Ok(_) => entry.succeeded += 1,
            Err(e) => {
                entry.failed += 1;
                *self.errors.entry(e.kind()).or_default() += 1;
            }
        }
    }

    pub fn per_task(&self) -> &BTreeMap<Task, TaskStats> {
        &self.per_task
    }

    pub fn task(&self, task: Task) -> TaskStats {
        self.per_task.get(&task).copied().unwrap_or_default()
    }

    pub fn errors(&self) -> &BTreeMap<&'static str, u64> {
        &self.errors
    }

    pub fn total_invocations(&self) -> u64 {
        self.per_task
            .values()
            .map(|s| s.succeeded + s.failed + s.skipped)
            .sum()
    }
}

#[derive(Debug)]
pub struct RunSummary {
    pub iterations_completed: u64,
    pub stats: RunStats,
    pub cancelled: bool,
}

/// Drives the scripted tasks over every account, one at a time.
pub struct Runner<O> {
    ops: O,
    accounts: Vec<Account>,
    schedule: Schedule,
    config: RunnerConfig,
    shutdown: CancellationToken,
    rng: StdRng,
    stats: RunStats,
}

impl<O: ActivityOps> Runner<O> {
    pub fn new(
        ops: O,
        accounts: Vec<Account>,
        schedule: Schedule,
        config: RunnerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            ops,
            accounts,
            schedule,
            config,
            shutdown,
            rng: StdRng::from_os_rng(),
            stats: RunStats::default(),
        }
    }

    /// Use a deterministic task order and delay sequence.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn ops(&self) -> &O {
        &self.ops
    }

    /// Run until the iteration budget is spent or shutdown is requested.
    pub async fn run(&mut self) -> RunSummary {
        let mut completed = 0u64;
        let mut cancelled = false;

        while self.config.iterations == 0 || completed < self.config.iterations {
            let iteration = completed + 1;
            info!(iteration, accounts = self.accounts.len(), "🔁 Starting pass");

            if self.run_pass(iteration).await.is_err() {
                cancelled = true;
                break;
            }
            completed = iteration;
            report::display_stats(iteration, &self.stats);
        }

        RunSummary {
            iterations_completed: completed,
            stats: self.stats.clone(),
            cancelled,
        }
    }

    async fn run_pass(&mut self, iteration: u64) -> Result<(), Cancelled> {
        let accounts = self.accounts.clone();
        let last_pass = self.config.iterations != 0 && iteration == self.config.iterations;

        for (idx, account) in accounts.iter().enumerate() {
            info!(
                iteration,
                account_index = idx + 1,
                address = %account.address(),
                "👤 Processing account"
            );
            self.run_account(account, iteration).await?;

            let last_account = idx + 1 == accounts.len();
            if !(last_pass && last_account) {
                debug!(delay_secs = self.config.account_delay.as_secs(), "Sleeping before next account");
                self.sleep(self.config.account_delay).await?;
            }
        }
        Ok(())
    }

    async fn run_account(&mut self, account: &Account, iteration: u64) -> Result<(), Cancelled> {
        self.show_balance(account, BalanceStage::Start).await?;

        let receiver = random_address();
        let tasks = self.schedule.next(&mut self.rng);
        let mut occurrences: HashMap<Task, usize> = HashMap::new();

        for (position, task) in tasks.into_iter().enumerate() {
            if position > 0 {
                let delay = self.config.task_delay.draw(&mut self.rng);
                self.sleep(delay).await?;
            }

            let occurrence = occurrences.entry(task).or_default();
            let ctx = TaskContext {
                receiver,
                occurrence: *occurrence,
            };
            *occurrence += 1;

            let result = self.run_task(account, task, &ctx).await?;
            match &result {
                Ok(outcome) if outcome.is_skipped() => {
                    info!(task = %task, address = %account.address(), "⏭️ {outcome}")
                }
                Ok(outcome) => info!(task = %task, address = %account.address(), "✅ {outcome}"),
                Err(e) => error!(
                    task = %task,
                    address = %account.address(),
                    kind = e.kind(),
                    error = %e,
                    "❌ Task failed"
                ),
            }
            self.stats.record(task, &result);
        }

        if self.config.reconcile_every > 0 && iteration % self.config.reconcile_every == 0 {
            match until_cancelled(&self.shutdown, self.ops.reconcile(account)).await? {
                Ok(0) => {}
                Ok(corrected) => info!(address = %account.address(), corrected, "NFT index reconciled"),
                Err(e) => warn!(address = %account.address(), error = %e, "NFT reconciliation failed"),
            }
        }

        self.show_balance(account, BalanceStage::Final).await
    }

    /// Run `task`, repeating it only while the error says nothing was accepted.
    async fn run_task(
        &mut self,
        account: &Account,
        task: Task,
        ctx: &TaskContext,
    ) -> Result<Result<TaskOutcome, TxError>, Cancelled> {
        let mut attempts = self.config.task_retry.attempts(&self.shutdown);

        loop {
            let result = until_cancelled(&self.shutdown, self.ops.execute(account, task, ctx)).await?;
            match result {
                Err(e) => {
                    if !attempts.retry_after(task.name(), &e).await? {
                        return Ok(Err(e));
                    }
                }
                ok => return Ok(ok),
            }
        }
    }

    async fn show_balance(&self, account: &Account, stage: BalanceStage) -> Result<(), Cancelled> {
        let address = account.address();
        let mut attempts = self.config.read_retry.attempts(&self.shutdown);

        loop {
            match until_cancelled(&self.shutdown, self.ops.native_balance(account)).await? {
                Ok(balance) => {
                    report::display_balance(stage, address, balance, &self.config.native_symbol);
                    return Ok(());
                }
                Err(e) => {
                    if !attempts.retry_after("native_balance", &e).await? {
                        warn!(address = %address, error = %e, "Could not read native balance");
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn sleep(&self, delay: Duration) -> Result<(), Cancelled> {
        pause(&self.shutdown, delay).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{DEFAULT_SCRIPT, OrderMode};
    use activity_clients::token::{check_sufficient, scale_units};
    use alloy::primitives::Address;

    const KEYS: [&str; 2] = [
        "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
        "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a",
    ];

    fn accounts(n: usize) -> Vec<Account> {
        KEYS[..n]
            .iter()
            .map(|key| Account::from_private_key(key).unwrap())
            .collect()
    }

    fn quick_config(iterations: u64) -> RunnerConfig {
        RunnerConfig {
            iterations,
            account_delay: Duration::ZERO,
            read_retry: RetryConfig::once(),
            ..Default::default()
        }
    }

    /// Records every call and fails every task.
    #[derive(Default)]
    struct FailingOps {
        calls: Vec<(Address, Task)>,
        reconciled: usize,
    }

    #[async_trait]
    impl ActivityOps for FailingOps {
        async fn native_balance(&self, _account: &Account) -> Result<U256, TxError> {
            Err(TxError::Network("connection refused".to_string()))
        }

        async fn execute(
            &mut self,
            account: &Account,
            task: Task,
            _ctx: &TaskContext,
        ) -> Result<TaskOutcome, TxError> {
            self.calls.push((account.address(), task));
            Err(TxError::Reverted {
                method: task.name().to_string(),
                reason: "always".to_string(),
            })
        }

        async fn reconcile(&mut self, _account: &Account) -> Result<usize, TxError> {
            self.reconciled += 1;
            Ok(0)
        }
    }

    /// Token balances kept in memory, following the contract's rules.
    struct LedgerOps {
        decimals: u8,
        balances: HashMap<Address, U256>,
        total_supply: U256,
        amounts: (u64, u64, u64),
    }

    impl LedgerOps {
        fn new(holder: Address, initial_supply: u64) -> Self {
            let supply = scale_units(initial_supply, 18);
            Self {
                decimals: 18,
                balances: HashMap::from([(holder, supply)]),
                total_supply: supply,
                amounts: (100, 10, 500),
            }
        }

        fn balance(&self, owner: Address) -> U256 {
            self.balances.get(&owner).copied().unwrap_or_default()
        }
    }

    #[async_trait]
    impl ActivityOps for LedgerOps {
        async fn native_balance(&self, _account: &Account) -> Result<U256, TxError> {
            Ok(U256::from(1))
        }

        async fn execute(
            &mut self,
            account: &Account,
            task: Task,
            ctx: &TaskContext,
        ) -> Result<TaskOutcome, TxError> {
            let owner = account.address();
            let (transfer, burn, mint) = self.amounts;
            match task {
                Task::TransferToken => {
                    let value = scale_units(transfer, self.decimals);
                    check_sufficient("transfer", self.balance(owner), value)?;
                    *self.balances.entry(owner).or_default() -= value;
                    *self.balances.entry(ctx.receiver).or_default() += value;
                }
                Task::BurnToken => {
                    let value = scale_units(burn, self.decimals);
                    check_sufficient("burn", self.balance(owner), value)?;
                    *self.balances.entry(owner).or_default() -= value;
                    self.total_supply -= value;
                }
                Task::MintToken => {
                    let value = scale_units(mint, self.decimals);
                    *self.balances.entry(owner).or_default() += value;
                    self.total_supply += value;
                }
                _ => return Ok(TaskOutcome::Skipped { reason: "not a token task" }),
            }
            Ok(TaskOutcome::Sent {
                tx_hash: Default::default(),
            })
        }

        async fn reconcile(&mut self, _account: &Account) -> Result<usize, TxError> {
            Ok(0)
        }
    }

    /// Fails with `error` until `failures` attempts were made.
    struct FlakyOps {
        failures: u32,
        attempts: u32,
        error: fn() -> TxError,
    }

    impl FlakyOps {
        fn underpriced(failures: u32) -> Self {
            Self {
                failures,
                attempts: 0,
                error: || TxError::Underpriced("replacement transaction underpriced".to_string()),
            }
        }
    }

    #[async_trait]
    impl ActivityOps for FlakyOps {
        async fn native_balance(&self, _account: &Account) -> Result<U256, TxError> {
            Ok(U256::ZERO)
        }

        async fn execute(
            &mut self,
            _account: &Account,
            _task: Task,
            _ctx: &TaskContext,
        ) -> Result<TaskOutcome, TxError> {
            self.attempts += 1;
            if self.attempts <= self.failures {
                return Err((self.error)());
            }
            Ok(TaskOutcome::Deployed {
                address: Address::repeat_byte(0x01),
            })
        }

        async fn reconcile(&mut self, _account: &Account) -> Result<usize, TxError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_every_task_runs_once_per_account_despite_failures() {
        let accounts = accounts(2);
        let schedule = Schedule::new(DEFAULT_SCRIPT.to_vec(), OrderMode::Shuffled).unwrap();
        let mut runner = Runner::new(
            FailingOps::default(),
            accounts.clone(),
            schedule,
            quick_config(2),
            CancellationToken::new(),
        )
        .with_seed(11);

        let summary = runner.run().await;

        assert_eq!(summary.iterations_completed, 2);
        assert!(!summary.cancelled);
        assert_eq!(runner.ops().calls.len(), 2 * 2 * DEFAULT_SCRIPT.len());
        assert_eq!(runner.ops().reconciled, 4);

        for account in &accounts {
            let mut ran: Vec<Task> = runner
                .ops()
                .calls
                .iter()
                .filter(|(address, _)| *address == account.address())
                .map(|(_, task)| *task)
                .collect();
            let mut expected: Vec<Task> = DEFAULT_SCRIPT.iter().chain(DEFAULT_SCRIPT.iter()).copied().collect();
            ran.sort();
            expected.sort();
            assert_eq!(ran, expected);
        }

        assert_eq!(summary.stats.task(Task::MintNft).failed, 8);
        assert_eq!(summary.stats.errors().get("reverted"), Some(&36));
    }

    #[tokio::test]
    async fn test_token_supply_scenario() {
        let account = accounts(1).remove(0);
        let mut ops = LedgerOps::new(account.address(), 1000);
        ops.amounts = (100, 10, 500);
        let schedule = Schedule::new(vec![Task::MintToken, Task::BurnToken], OrderMode::Fixed).unwrap();
        let mut runner = Runner::new(
            ops,
            vec![account.clone()],
            schedule,
            quick_config(1),
            CancellationToken::new(),
        );

        let summary = runner.run().await;

        assert_eq!(summary.stats.task(Task::MintToken).succeeded, 1);
        assert_eq!(summary.stats.task(Task::BurnToken).succeeded, 1);
        assert_eq!(runner.ops().balance(account.address()), scale_units(1490, 18));
        assert_eq!(runner.ops().total_supply, scale_units(1490, 18));
    }

    #[tokio::test]
    async fn test_insufficient_balance_leaves_ledger_untouched() {
        let account = accounts(1).remove(0);
        let ops = LedgerOps::new(account.address(), 5);
        let schedule = Schedule::new(vec![Task::BurnToken, Task::TransferToken], OrderMode::Fixed).unwrap();
        let mut runner = Runner::new(
            ops,
            vec![account.clone()],
            schedule,
            quick_config(1),
            CancellationToken::new(),
        );

        let summary = runner.run().await;

        assert_eq!(summary.stats.task(Task::BurnToken).failed, 1);
        assert_eq!(summary.stats.task(Task::TransferToken).failed, 1);
        assert_eq!(summary.stats.errors().get("insufficient_funds"), Some(&2));
        assert_eq!(runner.ops().balance(account.address()), scale_units(5, 18));
        assert_eq!(runner.ops().total_supply, scale_units(5, 18));
    }

    #[tokio::test]
    async fn test_retryable_errors_are_retried_within_budget() {
        let schedule = Schedule::new(vec![Task::DeployStorage], OrderMode::Fixed).unwrap();
        let config = RunnerConfig {
            task_retry: RetryConfig::fixed(Duration::ZERO, 3),
            ..quick_config(1)
        };
        let mut runner = Runner::new(
            FlakyOps::underpriced(2),
            accounts(1),
            schedule,
            config,
            CancellationToken::new(),
        );

        let summary = runner.run().await;

        assert_eq!(runner.ops().attempts, 3);
        assert_eq!(summary.stats.task(Task::DeployStorage).succeeded, 1);
        assert_eq!(summary.stats.total_invocations(), 1);
    }

    #[tokio::test]
    async fn test_no_retry_by_default() {
        let schedule = Schedule::new(vec![Task::DeployStorage], OrderMode::Fixed).unwrap();
        let mut runner = Runner::new(
            FlakyOps::underpriced(5),
            accounts(1),
            schedule,
            quick_config(1),
            CancellationToken::new(),
        );

        let summary = runner.run().await;

        assert_eq!(runner.ops().attempts, 1);
        assert_eq!(summary.stats.errors().get("underpriced"), Some(&1));
    }

    #[tokio::test]
    async fn test_broadcast_failures_are_not_resent() {
        let schedule = Schedule::new(vec![Task::TransferToken], OrderMode::Fixed).unwrap();
        let config = RunnerConfig {
            task_retry: RetryConfig::fixed(Duration::ZERO, 3),
            ..quick_config(1)
        };
        let ops = FlakyOps {
            failures: 5,
            attempts: 0,
            error: || TxError::Unconfirmed {
                method: "transfer".to_string(),
                tx_hash: Default::default(),
                reason: "connection reset by peer".to_string(),
            },
        };
        let mut runner = Runner::new(ops, accounts(1), schedule, config, CancellationToken::new());

        let summary = runner.run().await;

        assert_eq!(runner.ops().attempts, 1);
        assert_eq!(summary.stats.errors().get("unconfirmed"), Some(&1));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let schedule = Schedule::new(DEFAULT_SCRIPT.to_vec(), OrderMode::Fixed).unwrap();
        let mut runner = Runner::new(
            FailingOps::default(),
            accounts(1),
            schedule,
            quick_config(0),
            shutdown,
        );

        let summary = runner.run().await;

        assert!(summary.cancelled);
        assert_eq!(summary.iterations_completed, 0);
        assert!(runner.ops().calls.is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_disabled() {
        let schedule = Schedule::new(vec![Task::MintNft], OrderMode::Fixed).unwrap();
        let config = RunnerConfig {
            reconcile_every: 0,
            ..quick_config(3)
        };
        let mut runner = Runner::new(
            FailingOps::default(),
            accounts(1),
            schedule,
            config,
            CancellationToken::new(),
        );

        runner.run().await;

        assert_eq!(runner.ops().reconciled, 0);
        assert_eq!(runner.ops().calls.len(), 3);
    }
}
