pub mod debt_schedule;
pub mod opening_balance;
pub mod projector;
pub mod reconciler;
pub mod returns;
pub mod sources_uses;

use std::time::Instant;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::assumptions::Assumptions;
use crate::findings::{Finding, PaymentScenario, ValidationReporter};
use crate::statements::{BalanceLine, CashFlowLine, IncomeLine, PeriodState, TrancheSchedule};
use crate::types::{tolerance, with_metadata, ComputationOutput, Money};
use crate::LboResult;

use debt_schedule::DebtState;
use returns::ReturnsSummary;
use sources_uses::SourcesUses;

/// The immutable result bundle handed to consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LboModelOutput {
    pub assumptions: Assumptions,
    pub sources_uses: SourcesUses,
    /// Period 0 is the opening balance sheet; 1..=exit_year are projections
    pub periods: Vec<PeriodState>,
    pub debt_schedule: Vec<TrancheSchedule>,
    pub returns: ReturnsSummary,
    pub findings: Vec<Finding>,
    pub scenario_tags: Vec<PaymentScenario>,
    /// Set when the cumulative reconciliation plug exceeds 1% of final equity
    pub suspect: bool,
}

/// Build the complete LBO model from entry through exit.
///
/// Pipeline: sources & uses, opening balance sheet, then one pass per year
/// of projector, debt solver, and reconciler, finishing with the returns
/// bridge. The component order within a period is fixed; interest uses
/// beginning balances only, so no intra-period iteration is needed.
pub fn build_model(assumptions: &Assumptions) -> LboResult<ComputationOutput<LboModelOutput>> {
    let start = Instant::now();
    assumptions.validate()?;

    let mut reporter = ValidationReporter::new();

    let tranches = debt_schedule::resolve_stack(assumptions)?;
    let stack: Vec<(String, Money)> = tranches
        .iter()
        .map(|t| (t.name.clone(), t.original_amount))
        .collect();
    let su = sources_uses::build(assumptions, &stack, &mut reporter)?;
    let opening = opening_balance::build(assumptions, &tranches, &su, &mut reporter)?;

    let mut schedules: Vec<TrancheSchedule> = tranches
        .iter()
        .map(|t| TrancheSchedule::new(&t.name))
        .collect();
    let mut state = DebtState::at_close(&tranches);
    let mut reconciler = reconciler::Reconciler::new();
    let mut periods: Vec<PeriodState> = Vec::with_capacity(assumptions.exit_year as usize + 1);
    periods.push(opening);
    let mut total_sweep = Decimal::ZERO;

    for year in 1..=assumptions.exit_year {
        let prev = periods.last().expect("opening period always present").clone();
        let plan = projector::project(&prev, assumptions, year, &mut reporter);
        let solution = debt_schedule::solve_period(
            &tranches,
            &mut state,
            &plan,
            assumptions,
            prev.balance.cash,
            &mut reporter,
        )?;
        total_sweep += solution.sweep_total;

        for (schedule, row) in schedules.iter_mut().zip(&solution.rows) {
            schedule.push(row.clone());
        }

        let income = IncomeLine {
            revenue: plan.revenue,
            cogs: plan.cogs,
            gross_profit: plan.gross_profit,
            sganda: plan.sganda,
            ebitda: plan.ebitda,
            d_and_a: plan.d_and_a,
            ebit: plan.ebit,
            interest_expense: solution.interest_expense,
            pretax_income: solution.pretax_income,
            tax: solution.tax,
            net_income: solution.net_income,
        };

        let cfi = -plan.capex;
        let cff = solution.revolver_drawn - solution.principal_repaid;
        let cash_flow = CashFlowLine {
            net_income: solution.net_income,
            d_and_a: plan.d_and_a,
            change_in_working_capital: plan.change_in_working_capital,
            cfo: solution.cfo,
            capex: plan.capex,
            cfi,
            debt_issued: solution.revolver_drawn,
            debt_repaid: solution.principal_repaid,
            cff,
            net_change_in_cash: solution.cfo + cfi + cff,
        };

        let ppe_gross = prev.balance.ppe_gross + plan.capex;
        let ppe_net = prev.balance.ppe_net + plan.capex - plan.d_and_a;
        let goodwill = prev.balance.goodwill;
        let total_debt = state.total();
        let equity = prev.balance.equity + solution.net_income;
        let total_assets = solution.cash_end
            + plan.accounts_receivable
            + plan.inventory
            + ppe_net
            + goodwill;

        let balance = BalanceLine {
            cash: solution.cash_end,
            accounts_receivable: plan.accounts_receivable,
            inventory: plan.inventory,
            ppe_gross,
            ppe_net,
            goodwill,
            total_assets,
            accounts_payable: plan.accounts_payable,
            instrument_debt: state.balances.clone(),
            revolver_balance: state.revolver,
            total_debt,
            equity,
            total_liabilities_and_equity: plan.accounts_payable + total_debt + equity,
        };

        let mut period = PeriodState {
            year,
            income,
            balance,
            cash_flow,
        };
        reconciler.reconcile_period(&mut period, &prev, &mut reporter);
        periods.push(period);
    }

    for (tranche, schedule) in tranches.iter().zip(&schedules) {
        debt_schedule::verify_schedule(tranche, &schedule.rows)?;
    }

    let exit_period = periods.last().expect("at least one projected period");
    let returns = returns::calculate(
        exit_period,
        assumptions,
        su.sponsor_equity,
        su.total_new_debt,
        &mut reporter,
    )?;

    let residual_debt = exit_period.balance.total_debt;
    if residual_debt > tolerance(su.total_new_debt) {
        reporter.push(
            Finding::warning(
                "residual_exit_debt",
                format!("Debt of {residual_debt} remains outstanding at exit"),
            )
            .in_year(assumptions.exit_year)
            .with_delta(residual_debt),
        );
    }

    debt_schedule::tag_scenarios(&tranches, total_sweep, &mut reporter);
    let suspect = reconciler.finalize(exit_period.balance.equity, &mut reporter);

    let warnings = reporter.warning_strings();
    let (findings, scenario_tags) = reporter.into_parts();

    let output = LboModelOutput {
        assumptions: assumptions.clone(),
        sources_uses: su,
        periods,
        debt_schedule: schedules,
        returns,
        findings,
        scenario_tags,
        suspect,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Leveraged Buyout Projection Model",
        &serde_json::json!({
            "entry_ebitda": assumptions.entry_ebitda.to_string(),
            "entry_multiple": assumptions.entry_multiple.to_string(),
            "exit_year": assumptions.exit_year,
            "exit_multiple": assumptions.exit_multiple.to_string(),
            "num_tranches": assumptions.debt_instruments.len(),
        }),
        warnings,
        elapsed,
        output,
    ))
}
