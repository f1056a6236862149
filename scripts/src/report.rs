//! Per-step gas accounting and the summary logged after a pipeline run

use std::time::Duration;

use alloy::primitives::{utils::format_ether, U256};
use itertools::Itertools;
use tracing::info;

use crate::{chain::TxOutcome, config::GasReporterConfig};

/// How a step produced its deployment record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// New contracts were deployed
    Deployed,
    /// A persisted record was returned unchanged
    Reused,
    /// Transactions were simulated, never broadcast
    Simulated,
}

impl StepOutcome {
    /// A short label for the outcome
    pub fn label(&self) -> &'static str {
        match self {
            StepOutcome::Deployed => "deployed",
            StepOutcome::Reused => "reused",
            StepOutcome::Simulated => "simulated",
        }
    }
}

/// The gas spent by a single step
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepReport {
    /// The logical name of the step
    pub contract: String,
    /// How the step produced its record
    pub outcome: StepOutcome,
    /// The number of transactions the step sent
    pub transactions: usize,
    /// The gas used across the step's transactions
    pub gas_used: u64,
    /// The amount paid for that gas, in wei
    pub cost: U256,
    /// The wall-clock time the step took
    pub elapsed: Duration,
}

impl StepReport {
    /// An empty report for `contract`
    pub fn new(contract: &str, outcome: StepOutcome) -> Self {
        Self {
            contract: contract.to_string(),
            outcome,
            transactions: 0,
            gas_used: 0,
            cost: U256::ZERO,
            elapsed: Duration::ZERO,
        }
    }

    /// Account for a transaction sent by the step
    pub fn add_tx(&mut self, tx: &TxOutcome) {
        self.transactions += 1;
        self.gas_used += tx.gas_used;
        self.cost += U256::from(tx.gas_used) * U256::from(tx.effective_gas_price);
    }
}

/// The gas spent by a pipeline run, step by step
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GasReport {
    /// The reports of each step, in execution order
    pub steps: Vec<StepReport>,
}

impl GasReport {
    /// Append a step's report
    pub fn push(&mut self, step: StepReport) {
        self.steps.push(step);
    }

    /// The number of steps with the given outcome
    pub fn count(&self, outcome: StepOutcome) -> usize {
        self.steps.iter().filter(|s| s.outcome == outcome).count()
    }

    /// The number of transactions sent across the run
    pub fn transactions(&self) -> usize {
        self.steps.iter().map(|s| s.transactions).sum()
    }

    /// The gas used across the run
    pub fn total_gas(&self) -> u64 {
        self.steps.iter().map(|s| s.gas_used).sum()
    }

    /// The amount paid across the run, in wei
    pub fn total_cost(&self) -> U256 {
        self.steps.iter().fold(U256::ZERO, |acc, s| acc + s.cost)
    }

    /// The lines of the summary table
    pub fn lines(&self, config: &GasReporterConfig) -> Vec<String> {
        let header = format!("{:<24} {:<10} {:>12} {:>22}", "contract", "outcome", "gas", "cost");
        let rows = self.steps.iter().map(|step| {
            let row = format!(
                "{:<24} {:<10} {:>12} {:>22}",
                step.contract,
                step.outcome.label(),
                step.gas_used,
                format_ether(step.cost),
            );

            if config.show_time_spent {
                format!("{row} {:>8}ms", step.elapsed.as_millis())
            } else {
                row
            }
        });

        let totals = format!(
            "{:<24} {:<10} {:>12} {:>22}",
            "total",
            format!("{} tx", self.transactions()),
            self.total_gas(),
            format_ether(self.total_cost()),
        );

        std::iter::once(header).chain(rows).chain(std::iter::once(totals)).collect()
    }

    /// Log the summary table
    pub fn log(&self, config: &GasReporterConfig) {
        info!(
            "gas report ({} deployed, {} reused, {} simulated):\n{}",
            self.count(StepOutcome::Deployed),
            self.count(StepOutcome::Reused),
            self.count(StepOutcome::Simulated),
            self.lines(config).iter().join("\n"),
        );
    }
}
