use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::assumptions::Assumptions;
use crate::engine::debt_schedule::ResolvedTranche;
use crate::engine::sources_uses::SourcesUses;
use crate::findings::{Finding, ValidationReporter};
use crate::statements::{BalanceLine, PeriodState};
use crate::types::{tolerance, Money, DAYS_IN_YEAR};
use crate::LboResult;

/// Rule of thumb when PP&E is not supplied: ten years of steady-state capex.
const STEADY_STATE_PPE_YEARS: Decimal = dec!(10);

/// Build the post-transaction opening balance sheet (period 0).
///
/// Working-capital balances come from the day ratios against LTM revenue,
/// PP&E from the capex rule of thumb, goodwill as the excess of EV over net
/// identifiable assets. Fees are expensed at close against equity. Whatever
/// gap remains is plugged through goodwill and reported.
pub fn build(
    assumptions: &Assumptions,
    tranches: &[ResolvedTranche],
    sources_uses: &SourcesUses,
    reporter: &mut ValidationReporter,
) -> LboResult<PeriodState> {
    let ltm_revenue = assumptions.resolved_starting_revenue()?;
    let ltm_cogs = ltm_revenue * assumptions.cogs_pct;

    let cash = assumptions.min_cash_balance;
    let accounts_receivable = assumptions.initial_ar.unwrap_or_else(|| {
        ltm_revenue * Decimal::from(assumptions.days_sales_outstanding) / DAYS_IN_YEAR
    });
    let inventory = assumptions.initial_inventory.unwrap_or_else(|| {
        ltm_cogs * Decimal::from(assumptions.days_inventory_outstanding) / DAYS_IN_YEAR
    });
    let accounts_payable = assumptions.initial_ap.unwrap_or_else(|| {
        ltm_cogs * Decimal::from(assumptions.days_payable_outstanding) / DAYS_IN_YEAR
    });
    let ppe = assumptions
        .initial_ppe
        .unwrap_or_else(|| assumptions.capex_pct * ltm_revenue * STEADY_STATE_PPE_YEARS);

    let net_identifiable_assets = ppe + accounts_receivable + inventory - accounts_payable;
    let goodwill_formula = sources_uses.enterprise_value - net_identifiable_assets;

    let instrument_debt: Vec<Money> = tranches.iter().map(|t| t.original_amount).collect();
    let total_debt: Money = instrument_debt.iter().sum();

    // Fees are expensed at close, so they come straight out of opening equity.
    let equity = sources_uses.sponsor_equity
        - sources_uses.transaction_expenses
        - sources_uses.financing_fees;

    // Force the identity to hold through goodwill; anything beyond tolerance
    // is worth the consumer's attention.
    let liabilities_and_equity = accounts_payable + total_debt + equity;
    let assets_ex_goodwill = cash + accounts_receivable + inventory + ppe;
    let goodwill = liabilities_and_equity - assets_ex_goodwill;

    let plug = goodwill - goodwill_formula;
    if plug.abs() > tolerance(sources_uses.enterprise_value) {
        reporter.push(
            Finding::warning(
                "opening_goodwill_plug",
                format!(
                    "Opening balance sheet required a goodwill plug of {plug} to balance"
                ),
            )
            .in_year(0)
            .with_delta(plug),
        );
    }

    let total_assets = assets_ex_goodwill + goodwill;

    let balance = BalanceLine {
        cash,
        accounts_receivable,
        inventory,
        ppe_gross: ppe,
        ppe_net: ppe,
        goodwill,
        total_assets,
        accounts_payable,
        instrument_debt,
        revolver_balance: Decimal::ZERO,
        total_debt,
        equity,
        total_liabilities_and_equity: liabilities_and_equity,
    };

    Ok(PeriodState::opening(balance, ltm_revenue))
}
