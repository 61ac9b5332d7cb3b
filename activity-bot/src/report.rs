use crate::runner::RunStats;
use alloy::primitives::{Address, U256, utils::format_ether};
use term_table::row::Row;
use term_table::table_cell::{Alignment as CellAlignment, TableCell};
use term_table::{Table, TableStyle};
use tracing::{info, warn};

/// When the banner is shown within an account pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceStage {
    Start,
    Final,
}

impl BalanceStage {
    fn header(&self) -> &'static str {
        match self {
            BalanceStage::Start => "💳 ACCOUNT",
            BalanceStage::Final => "🏁 FINAL BALANCE",
        }
    }
}

pub fn render_balance(stage: BalanceStage, address: Address, balance: U256, symbol: &str) -> String {
    let mut table = Table::new();
    table.style = TableStyle::extended();

    table.add_row(Row::new(vec![
        TableCell::builder(stage.header())
            .col_span(2)
            .alignment(CellAlignment::Center)
            .build(),
    ]));
    table.add_row(Row::new(vec![
        TableCell::builder("Address")
            .alignment(CellAlignment::Right)
            .build(),
        TableCell::builder(address.to_string())
            .alignment(CellAlignment::Left)
            .build(),
    ]));
    table.add_row(Row::new(vec![
        TableCell::builder("Balance")
            .alignment(CellAlignment::Right)
            .build(),
        TableCell::builder(format!("{} {symbol}", format_ether(balance)))
            .alignment(CellAlignment::Left)
            .build(),
    ]));

    table.render()
}

/// Log the account banner. An empty account is logged as a warning.
pub fn display_balance(stage: BalanceStage, address: Address, balance: U256, symbol: &str) {
    let rendered = render_balance(stage, address, balance, symbol);
    if balance.is_zero() {
        warn!("\n{rendered}");
    } else {
        info!("\n{rendered}");
    }
}

pub fn render_stats(stats: &RunStats) -> String {
    let mut table = Table::new();
    table.style = TableStyle::extended();

    table.add_row(Row::new(vec![
        TableCell::new("Task"),
        TableCell::new("Succeeded"),
        TableCell::new("Failed"),
        TableCell::new("Skipped"),
    ]));
    for (task, counts) in stats.per_task() {
        table.add_row(Row::new(vec![
            TableCell::new(task.name()),
            TableCell::builder(counts.succeeded)
                .alignment(CellAlignment::Right)
                .build(),
            TableCell::builder(counts.failed)
                .alignment(CellAlignment::Right)
                .build(),
            TableCell::builder(counts.skipped)
                .alignment(CellAlignment::Right)
                .build(),
        ]));
    }

    let errors = stats.errors();
    if !errors.is_empty() {
        let summary = errors
            .iter()
            .map(|(kind, count)| format!("{kind}: {count}"))
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(Row::new(vec![
            TableCell::builder(format!("Errors by kind: {summary}"))
                .col_span(4)
                .alignment(CellAlignment::Left)
                .build(),
        ]));
    }

    table.render()
}

pub fn display_stats(iteration: u64, stats: &RunStats) {
    info!(iteration, "📊 Task totals\n{}", render_stats(stats));
}
