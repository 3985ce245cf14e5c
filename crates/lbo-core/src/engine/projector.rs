use rust_decimal::Decimal;

use crate::assumptions::Assumptions;
use crate::findings::{Finding, ValidationReporter};
use crate::statements::PeriodState;
use crate::types::{Money, Rate, DAYS_IN_YEAR};

/// Pre-debt operating results for one year: the income statement down to
/// EBIT plus working-capital targets and capex. Interest, tax, and net
/// income are finished by the debt solver once beginning balances are known.
#[derive(Debug, Clone)]
pub struct OperatingPlan {
    pub year: u32,
    pub revenue: Money,
    pub cogs: Money,
    pub gross_profit: Money,
    pub sganda: Money,
    pub ebitda: Money,
    pub d_and_a: Money,
    pub ebit: Money,
    pub accounts_receivable: Money,
    pub inventory: Money,
    pub accounts_payable: Money,
    pub change_in_working_capital: Money,
    pub capex: Money,
}

/// Growth applied in `year` (1-based). Year 1 is the transaction-year base
/// and carries no growth; the vector indexes years 2.. and its last entry
/// repeats beyond the provided horizon.
pub fn growth_for_year(rates: &[Rate], year: u32) -> Rate {
    if year <= 1 || rates.is_empty() {
        return Decimal::ZERO;
    }
    let idx = ((year - 2) as usize).min(rates.len() - 1);
    rates[idx]
}

/// Project operating performance for `year` from the prior period's state.
pub fn project(
    prev: &PeriodState,
    assumptions: &Assumptions,
    year: u32,
    reporter: &mut ValidationReporter,
) -> OperatingPlan {
    let growth = growth_for_year(&assumptions.revenue_growth_rate, year);
    let revenue = prev.income.revenue * (Decimal::ONE + growth);

    let cogs = revenue * assumptions.cogs_pct;
    let gross_profit = revenue - cogs;
    let sganda = revenue * assumptions.sganda_pct;
    let ebitda = gross_profit - sganda;

    if ebitda <= Decimal::ZERO {
        reporter.push(
            Finding::warning(
                "negative_ebitda",
                format!("Projected EBITDA is non-positive ({ebitda})"),
            )
            .in_year(year)
            .with_delta(ebitda),
        );
    }

    // Depreciation runs off the prior year's net PP&E
    let d_and_a = assumptions.depreciation_pct_of_ppe * prev.balance.ppe_net;
    let ebit = ebitda - d_and_a;

    let accounts_receivable =
        revenue * Decimal::from(assumptions.days_sales_outstanding) / DAYS_IN_YEAR;
    let inventory = cogs * Decimal::from(assumptions.days_inventory_outstanding) / DAYS_IN_YEAR;
    let accounts_payable = cogs * Decimal::from(assumptions.days_payable_outstanding) / DAYS_IN_YEAR;

    let change_in_working_capital = (accounts_receivable - prev.balance.accounts_receivable)
        + (inventory - prev.balance.inventory)
        - (accounts_payable - prev.balance.accounts_payable);

    let capex = revenue * assumptions.capex_pct;

    OperatingPlan {
        year,
        revenue,
        cogs,
        gross_profit,
        sganda,
        ebitda,
        d_and_a,
        ebit,
        accounts_receivable,
        inventory,
        accounts_payable,
        change_in_working_capital,
        capex,
    }
}
