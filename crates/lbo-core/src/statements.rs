use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Money;

/// Income statement for one projected year.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncomeLine {
    pub revenue: Money,
    pub cogs: Money,
    pub gross_profit: Money,
    pub sganda: Money,
    pub ebitda: Money,
    pub d_and_a: Money,
    pub ebit: Money,
    pub interest_expense: Money,
    pub pretax_income: Money,
    pub tax: Money,
    pub net_income: Money,
}

/// Balance sheet at the end of one year.
///
/// `instrument_debt` is positionally aligned with the instrument list in the
/// assumptions; `revolver_balance` is the auxiliary zero-rate facility drawn
/// when mandatory debt service exceeds available cash.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BalanceLine {
    pub cash: Money,
    pub accounts_receivable: Money,
    pub inventory: Money,
    pub ppe_gross: Money,
    pub ppe_net: Money,
    pub goodwill: Money,
    pub total_assets: Money,
    pub accounts_payable: Money,
    pub instrument_debt: Vec<Money>,
    pub revolver_balance: Money,
    pub total_debt: Money,
    pub equity: Money,
    pub total_liabilities_and_equity: Money,
}

/// Cash flow statement for one year.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CashFlowLine {
    pub net_income: Money,
    pub d_and_a: Money,
    pub change_in_working_capital: Money,
    pub cfo: Money,
    pub capex: Money,
    pub cfi: Money,
    pub debt_issued: Money,
    pub debt_repaid: Money,
    pub cff: Money,
    pub net_change_in_cash: Money,
}

/// One projection period. Year 0 is the opening balance sheet; its income
/// line carries only the LTM revenue used to seed working-capital ratios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodState {
    pub year: u32,
    pub income: IncomeLine,
    pub balance: BalanceLine,
    pub cash_flow: CashFlowLine,
}

impl PeriodState {
    pub fn opening(balance: BalanceLine, ltm_revenue: Money) -> Self {
        PeriodState {
            year: 0,
            income: IncomeLine {
                revenue: ltm_revenue,
                ..IncomeLine::default()
            },
            balance,
            cash_flow: CashFlowLine::default(),
        }
    }
}

/// One (instrument, year) row of the debt schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtScheduleRow {
    pub year: u32,
    pub beginning: Money,
    pub interest: Money,
    pub scheduled_principal: Money,
    pub sweep_principal: Money,
    pub ending: Money,
}

impl DebtScheduleRow {
    pub fn total_principal(&self) -> Money {
        self.scheduled_principal + self.sweep_principal
    }
}

/// Full schedule for one tranche across the projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrancheSchedule {
    pub name: String,
    pub rows: Vec<DebtScheduleRow>,
    pub total_interest_paid: Money,
    pub total_principal_paid: Money,
}

impl TrancheSchedule {
    pub fn new(name: &str) -> Self {
        TrancheSchedule {
            name: name.to_string(),
            rows: Vec::new(),
            total_interest_paid: Decimal::ZERO,
            total_principal_paid: Decimal::ZERO,
        }
    }

    pub fn push(&mut self, row: DebtScheduleRow) {
        self.total_interest_paid += row.interest;
        self.total_principal_paid += row.total_principal();
        self.rows.push(row);
    }

    pub fn ending_balance(&self) -> Money {
        self.rows.last().map(|r| r.ending).unwrap_or(Decimal::ZERO)
    }
}
