use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::LboError;
use crate::types::{Money, Multiple, Rate};
use crate::LboResult;

/// Repayment shape for a debt tranche
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmortizationSchedule {
    /// No repayment until maturity (lump sum at the exit year)
    Bullet,
    /// Level principal over `amortization_periods` years
    Amortizing,
    /// Repaid only from excess free cash flow
    CashFlowSweep,
}

/// One tranche of the debt stack at close.
///
/// Exactly one of `amount` / `ebitda_multiple` must be set; a multiple is
/// resolved against `entry_ebitda` when the stack is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DebtInstrument {
    pub name: String,
    pub interest_rate: Rate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ebitda_multiple: Option<Multiple>,
    pub amortization_schedule: AmortizationSchedule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amortization_periods: Option<u32>,
    /// Lower = repaid first by the sweep; default is position in the stack
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seniority: Option<u32>,
    /// Opt a bullet tranche into sweep prepayment before maturity
    #[serde(default)]
    pub bullet_sweep_allowed: bool,
}

/// Core model assumptions. Immutable after validation; field names are the
/// stable input-record contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Assumptions {
    // Transaction
    pub entry_ebitda: Money,
    pub entry_multiple: Multiple,
    #[serde(default)]
    pub existing_debt: Money,
    #[serde(default)]
    pub existing_cash: Money,
    #[serde(default = "defaults::transaction_expenses_pct")]
    pub transaction_expenses_pct: Rate,
    #[serde(default = "defaults::financing_fees_pct")]
    pub financing_fees_pct: Rate,

    // Debt structure
    pub debt_instruments: Vec<DebtInstrument>,
    /// Fixed sponsor equity; derived from sources & uses when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equity_amount: Option<Money>,

    // Operating assumptions
    /// Growth per projection year from year 2 onward; the last entry repeats
    /// when the horizon is longer than the vector
    pub revenue_growth_rate: Vec<Rate>,
    /// LTM revenue; 0 means derive from entry EBITDA and the cost structure
    #[serde(default)]
    pub starting_revenue: Money,
    #[serde(default = "defaults::cogs_pct")]
    pub cogs_pct: Rate,
    #[serde(default = "defaults::sganda_pct")]
    pub sganda_pct: Rate,
    #[serde(default = "defaults::depreciation_pct_of_ppe")]
    pub depreciation_pct_of_ppe: Rate,
    #[serde(default = "defaults::capex_pct")]
    pub capex_pct: Rate,
    #[serde(default = "defaults::tax_rate")]
    pub tax_rate: Rate,

    // Working capital
    #[serde(default = "defaults::dso")]
    pub days_sales_outstanding: u32,
    #[serde(default = "defaults::dio")]
    pub days_inventory_outstanding: u32,
    #[serde(default = "defaults::dpo")]
    pub days_payable_outstanding: u32,

    // Opening balance sheet overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_ppe: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_ar: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_inventory: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_ap: Option<Money>,
    #[serde(default)]
    pub min_cash_balance: Money,

    // Exit
    #[serde(default = "defaults::exit_year")]
    pub exit_year: u32,
    pub exit_multiple: Multiple,
}

mod defaults {
    use super::*;

    pub fn transaction_expenses_pct() -> Rate {
        dec!(0.03)
    }
    pub fn financing_fees_pct() -> Rate {
        dec!(0.02)
    }
    pub fn cogs_pct() -> Rate {
        dec!(0.70)
    }
    pub fn sganda_pct() -> Rate {
        dec!(0.15)
    }
    pub fn depreciation_pct_of_ppe() -> Rate {
        dec!(0.10)
    }
    pub fn capex_pct() -> Rate {
        dec!(0.03)
    }
    pub fn tax_rate() -> Rate {
        dec!(0.25)
    }
    pub fn dso() -> u32 {
        45
    }
    pub fn dio() -> u32 {
        30
    }
    pub fn dpo() -> u32 {
        30
    }
    pub fn exit_year() -> u32 {
        5
    }
}

const MAX_WORKING_CAPITAL_DAYS: u32 = 365;

impl Assumptions {
    /// Parse the JSON input record. Unknown fields are rejected with the
    /// `unknown_field` error code; the parsed value is validated before use.
    pub fn from_json_str(raw: &str) -> LboResult<Self> {
        let parsed: Assumptions = serde_json::from_str(raw)?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Same contract as [`from_json_str`](Self::from_json_str) for an
    /// already-parsed JSON value.
    pub fn from_json_value(raw: serde_json::Value) -> LboResult<Self> {
        let parsed: Assumptions = serde_json::from_value(raw)?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// EBITDA margin implied by the cost structure.
    pub fn ebitda_margin(&self) -> Rate {
        Decimal::ONE - self.cogs_pct - self.sganda_pct
    }

    /// LTM revenue, deriving it from entry EBITDA when not supplied.
    pub fn resolved_starting_revenue(&self) -> LboResult<Money> {
        if self.starting_revenue > Decimal::ZERO {
            return Ok(self.starting_revenue);
        }
        let margin = self.ebitda_margin();
        if margin <= Decimal::ZERO {
            return Err(LboError::InvalidInput {
                field: "starting_revenue".into(),
                reason: format!(
                    "Cannot derive revenue: cost structure implies a {margin} EBITDA margin"
                ),
            });
        }
        Ok(self.entry_ebitda / margin)
    }

    /// Fail-fast structural validation of the input record.
    pub fn validate(&self) -> LboResult<()> {
        if self.entry_ebitda <= Decimal::ZERO {
            return Err(invalid("entry_ebitda", "must be positive"));
        }
        if self.entry_multiple <= Decimal::ZERO {
            return Err(invalid("entry_multiple", "must be positive"));
        }
        if self.exit_multiple <= Decimal::ZERO {
            return Err(invalid("exit_multiple", "must be positive"));
        }
        if self.exit_year == 0 {
            return Err(invalid("exit_year", "must be at least 1"));
        }

        validate_non_negative("existing_debt", self.existing_debt)?;
        validate_non_negative("existing_cash", self.existing_cash)?;
        validate_non_negative("starting_revenue", self.starting_revenue)?;
        validate_non_negative("min_cash_balance", self.min_cash_balance)?;

        validate_rate("transaction_expenses_pct", self.transaction_expenses_pct)?;
        validate_rate("financing_fees_pct", self.financing_fees_pct)?;
        validate_rate("cogs_pct", self.cogs_pct)?;
        validate_rate("sganda_pct", self.sganda_pct)?;
        validate_rate("depreciation_pct_of_ppe", self.depreciation_pct_of_ppe)?;
        validate_rate("capex_pct", self.capex_pct)?;
        validate_rate("tax_rate", self.tax_rate)?;

        validate_wc_days("days_sales_outstanding", self.days_sales_outstanding)?;
        validate_wc_days("days_inventory_outstanding", self.days_inventory_outstanding)?;
        validate_wc_days("days_payable_outstanding", self.days_payable_outstanding)?;

        if self.revenue_growth_rate.is_empty() {
            return Err(invalid("revenue_growth_rate", "cannot be empty"));
        }
        for (i, rate) in self.revenue_growth_rate.iter().enumerate() {
            if *rate < dec!(-1) || *rate > Decimal::ONE {
                return Err(invalid(
                    &format!("revenue_growth_rate[{i}]"),
                    "must be between -1 and 1",
                ));
            }
        }

        if let Some(equity) = self.equity_amount {
            if equity <= Decimal::ZERO {
                return Err(invalid("equity_amount", "must be positive when specified"));
            }
        }

        if self.debt_instruments.is_empty() {
            return Err(invalid(
                "debt_instruments",
                "at least one debt tranche is required",
            ));
        }
        for (i, debt) in self.debt_instruments.iter().enumerate() {
            debt.validate(i)?;
        }
        for (i, debt) in self.debt_instruments.iter().enumerate() {
            if self.debt_instruments[..i].iter().any(|d| d.name == debt.name) {
                return Err(invalid(
                    &format!("debt_instruments[{i}].name"),
                    "duplicate tranche name",
                ));
            }
        }

        Ok(())
    }
}

impl DebtInstrument {
    fn validate(&self, index: usize) -> LboResult<()> {
        let field = |name: &str| format!("debt_instruments[{index}].{name}");

        if self.name.trim().is_empty() {
            return Err(invalid(&field("name"), "cannot be empty"));
        }
        validate_rate(&field("interest_rate"), self.interest_rate)?;

        match (self.amount, self.ebitda_multiple) {
            (Some(_), Some(_)) => {
                return Err(invalid(
                    &field("amount"),
                    "set exactly one of amount / ebitda_multiple, not both",
                ));
            }
            (None, None) => {
                return Err(invalid(
                    &field("amount"),
                    "one of amount / ebitda_multiple is required",
                ));
            }
            (Some(amount), None) if amount <= Decimal::ZERO => {
                return Err(invalid(&field("amount"), "must be positive"));
            }
            (None, Some(multiple)) if multiple <= Decimal::ZERO => {
                return Err(invalid(&field("ebitda_multiple"), "must be positive"));
            }
            _ => {}
        }

        if self.amortization_schedule == AmortizationSchedule::Amortizing {
            match self.amortization_periods {
                Some(periods) if periods >= 1 => {}
                _ => {
                    return Err(invalid(
                        &field("amortization_periods"),
                        "required and must be at least 1 for amortizing debt",
                    ));
                }
            }
        }

        Ok(())
    }

    /// Principal at close, resolving an EBITDA multiple against entry EBITDA.
    pub fn resolved_amount(&self, entry_ebitda: Money) -> Money {
        match (self.amount, self.ebitda_multiple) {
            (Some(amount), _) => amount,
            (None, Some(multiple)) => multiple * entry_ebitda,
            (None, None) => Decimal::ZERO,
        }
    }
}

fn invalid(field: &str, reason: &str) -> LboError {
    LboError::InvalidInput {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_rate(field: &str, value: Rate) -> LboResult<()> {
    if value < Decimal::ZERO {
        return Err(invalid(field, &format!("must be non-negative, got {value}")));
    }
    if value > Decimal::ONE {
        return Err(LboError::InvalidInput {
            field: field.to_string(),
            reason: format!("must be a decimal in [0, 1], got {value} — did you mean {}%?", value),
        });
    }
    Ok(())
}

fn validate_non_negative(field: &str, value: Money) -> LboResult<()> {
    if value < Decimal::ZERO {
        return Err(invalid(field, &format!("must be non-negative, got {value}")));
    }
    Ok(())
}

fn validate_wc_days(field: &str, value: u32) -> LboResult<()> {
    if value > MAX_WORKING_CAPITAL_DAYS {
        return Err(invalid(
            field,
            &format!("must be between 0 and {MAX_WORKING_CAPITAL_DAYS} days"),
        ));
    }
    Ok(())
}
