use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::findings::{Finding, ValidationReporter};
use crate::statements::PeriodState;
use crate::types::{tolerance, Money};

/// Closes each period's balance sheet and tracks the cumulative equity plug.
///
/// The balance sheet arrives with equity carried forward from the prior
/// period plus net income. Re-deriving total assets from the flow statements
/// should land on the same number; any residual is plugged through equity so
/// downstream periods stay computable, and the plug is reported when it
/// exceeds tolerance.
#[derive(Debug, Default)]
pub struct Reconciler {
    cumulative_plug: Money,
}

const SUSPECT_PLUG_RATIO: Decimal = dec!(0.01);

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reconcile_period(
        &mut self,
        period: &mut PeriodState,
        prev: &PeriodState,
        reporter: &mut ValidationReporter,
    ) {
        let year = period.year;
        let eps = tolerance(period.balance.total_assets);

        // Cash continuity against the flow statement
        let expected_cash = prev.balance.cash + period.cash_flow.net_change_in_cash;
        let cash_gap = period.balance.cash - expected_cash;
        if cash_gap.abs() > eps {
            reporter.push(
                Finding::warning(
                    "reconciliation_warning",
                    format!("Cash does not tie to the flow statement (off by {cash_gap})"),
                )
                .in_year(year)
                .with_delta(cash_gap),
            );
        }

        // Per-instrument endings must add up to total debt
        let instrument_total: Money = period.balance.instrument_debt.iter().sum::<Money>()
            + period.balance.revolver_balance;
        let debt_gap = period.balance.total_debt - instrument_total;
        if debt_gap.abs() > eps {
            reporter.push(
                Finding::warning(
                    "reconciliation_warning",
                    format!("Total debt does not tie to instrument balances (off by {debt_gap})"),
                )
                .in_year(year)
                .with_delta(debt_gap),
            );
        }

        // Balance the sheet on the equity line
        let liabilities_and_equity =
            period.balance.accounts_payable + period.balance.total_debt + period.balance.equity;
        let plug = period.balance.total_assets - liabilities_and_equity;
        if plug.abs() > eps {
            reporter.push(
                Finding::warning(
                    "reconciliation_warning",
                    format!("Balance sheet off by {plug}; plugged through equity"),
                )
                .in_year(year)
                .with_delta(plug),
            );
        }
        period.balance.equity += plug;
        period.balance.total_liabilities_and_equity = period.balance.total_assets;
        self.cumulative_plug += plug.abs();
    }

    /// Report the cumulative plug and decide whether the run is suspect.
    pub fn finalize(&self, final_equity: Money, reporter: &mut ValidationReporter) -> bool {
        if self.cumulative_plug.is_zero() {
            return false;
        }

        reporter.push(
            Finding::info(
                "reconciliation_summary",
                format!("Cumulative reconciliation plug: {}", self.cumulative_plug),
            )
            .with_delta(self.cumulative_plug),
        );

        let suspect = !final_equity.is_zero()
            && (self.cumulative_plug / final_equity.abs()) > SUSPECT_PLUG_RATIO;
        if suspect {
            reporter.push(
                Finding::warning(
                    "reconciliation_plug_excessive",
                    format!(
                        "Cumulative plug {} exceeds 1% of final equity {final_equity}",
                        self.cumulative_plug
                    ),
                )
                .with_delta(self.cumulative_plug),
            );
        }
        suspect
    }
}
