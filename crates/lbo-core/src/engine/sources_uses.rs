use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::assumptions::Assumptions;
use crate::error::LboError;
use crate::findings::{Finding, ValidationReporter};
use crate::types::{tolerance, Money};
use crate::LboResult;

/// Resolved transaction funding table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcesUses {
    pub enterprise_value: Money,
    /// EV less existing debt plus existing cash (net-debt convention)
    pub equity_purchase_price: Money,
    pub transaction_expenses: Money,
    pub financing_fees: Money,
    pub total_new_debt: Money,
    pub sponsor_equity: Money,
    pub sources: Vec<(String, Money)>,
    pub uses: Vec<(String, Money)>,
    pub total_sources: Money,
    pub total_uses: Money,
    pub balanced: bool,
}

/// Build the sources & uses table for the transaction.
///
/// `debt_stack` carries resolved tranche amounts in stack order. Sponsor
/// equity is derived as the funding gap unless the assumptions fix it, in
/// which case any imbalance beyond tolerance is a hard error.
pub fn build(
    assumptions: &Assumptions,
    debt_stack: &[(String, Money)],
    reporter: &mut ValidationReporter,
) -> LboResult<SourcesUses> {
    let enterprise_value = assumptions.entry_ebitda * assumptions.entry_multiple;
    let equity_purchase_price =
        enterprise_value - assumptions.existing_debt + assumptions.existing_cash;

    let total_new_debt: Money = debt_stack.iter().map(|(_, amount)| *amount).sum();
    let transaction_expenses = enterprise_value * assumptions.transaction_expenses_pct;
    let financing_fees = total_new_debt * assumptions.financing_fees_pct;

    let total_uses =
        equity_purchase_price + assumptions.existing_debt + transaction_expenses + financing_fees;

    let sponsor_equity = match assumptions.equity_amount {
        Some(fixed) => {
            let total_sources = fixed + total_new_debt;
            let gap = (total_sources - total_uses).abs();
            if gap > tolerance(total_uses) {
                return Err(LboError::SourcesUsesMismatch {
                    sources: total_sources,
                    uses: total_uses,
                });
            }
            if gap > Decimal::ZERO {
                reporter.push(
                    Finding::warning(
                        "sources_uses_unbalanced",
                        format!(
                            "Sources ({total_sources}) and uses ({total_uses}) differ within tolerance"
                        ),
                    )
                    .with_delta(total_sources - total_uses),
                );
            }
            fixed
        }
        None => {
            let derived = total_uses - total_new_debt;
            if derived <= Decimal::ZERO {
                return Err(LboError::SourcesUsesMismatch {
                    sources: total_new_debt,
                    uses: total_uses,
                });
            }
            derived
        }
    };

    let mut sources: Vec<(String, Money)> = Vec::with_capacity(debt_stack.len() + 1);
    sources.push(("Sponsor Equity".into(), sponsor_equity));
    for (name, amount) in debt_stack {
        sources.push((name.clone(), *amount));
    }

    let mut uses: Vec<(String, Money)> = Vec::with_capacity(4);
    uses.push(("Equity Purchase Price".into(), equity_purchase_price));
    if assumptions.existing_debt > Decimal::ZERO {
        uses.push(("Refinance Existing Debt".into(), assumptions.existing_debt));
    }
    if transaction_expenses > Decimal::ZERO {
        uses.push(("Transaction Expenses".into(), transaction_expenses));
    }
    if financing_fees > Decimal::ZERO {
        uses.push(("Financing Fees".into(), financing_fees));
    }

    let total_sources: Money = sources.iter().map(|(_, v)| *v).sum();
    let balanced = (total_sources - total_uses).abs() <= tolerance(total_uses);

    Ok(SourcesUses {
        enterprise_value,
        equity_purchase_price,
        transaction_expenses,
        financing_fees,
        total_new_debt,
        sponsor_equity,
        sources,
        uses,
        total_sources,
        total_uses,
        balanced,
    })
}
