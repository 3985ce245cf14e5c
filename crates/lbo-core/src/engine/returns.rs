use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::assumptions::Assumptions;
use crate::findings::{Finding, ValidationReporter};
use crate::statements::PeriodState;
use crate::time_value;
use crate::types::{Money, Multiple, Rate};
use crate::LboResult;

/// Investor returns at exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnsSummary {
    pub exit_year: u32,
    pub exit_ebitda: Money,
    pub exit_ev: Money,
    pub exit_debt: Money,
    pub exit_cash: Money,
    pub exit_equity: Money,
    pub equity_invested: Money,
    pub moic: Multiple,
    /// None when the solve fails or exit equity is non-positive
    pub irr: Option<Rate>,
    pub entry_leverage: Multiple,
    /// None when exit EBITDA is zero
    pub exit_leverage: Option<Multiple>,
}

/// Annualized equity IRR for the sponsor cash-flow profile.
///
/// With no interim distributions the closed form `moic^(1/T) - 1` applies;
/// any non-zero interim distribution switches to the bisection root-finder.
pub fn irr(
    equity_invested: Money,
    interim_distributions: &[Money],
    exit_equity: Money,
    exit_year: u32,
) -> LboResult<Option<Rate>> {
    let has_interim = interim_distributions.iter().any(|d| !d.is_zero());
    if !has_interim {
        if equity_invested <= Decimal::ZERO || exit_equity <= Decimal::ZERO {
            return Ok(None);
        }
        let moic = exit_equity / equity_invested;
        return Ok(time_value::annualized_rate(moic, exit_year));
    }

    let mut flows: Vec<Money> = Vec::with_capacity(exit_year as usize + 1);
    flows.push(-equity_invested);
    for t in 1..=exit_year {
        let distribution = interim_distributions
            .get(t as usize - 1)
            .copied()
            .unwrap_or(Decimal::ZERO);
        if t == exit_year {
            flows.push(distribution + exit_equity);
        } else {
            flows.push(distribution);
        }
    }
    time_value::irr_bisection(&flows)
}

/// Calculate the exit bridge and returns metrics from the exit-year state.
pub fn calculate(
    exit_period: &PeriodState,
    assumptions: &Assumptions,
    sponsor_equity: Money,
    entry_debt: Money,
    reporter: &mut ValidationReporter,
) -> LboResult<ReturnsSummary> {
    let exit_year = assumptions.exit_year;
    let exit_ebitda = exit_period.income.ebitda;
    let exit_ev = assumptions.exit_multiple * exit_ebitda;
    let exit_debt = exit_period.balance.total_debt;
    let exit_cash = exit_period.balance.cash;
    // cash returns to equity at exit: a net-debt bridge
    let exit_equity = exit_ev - exit_debt + exit_cash;

    let moic = if sponsor_equity.is_zero() {
        Decimal::ZERO
    } else {
        exit_equity / sponsor_equity
    };

    let irr_value = irr(sponsor_equity, &[], exit_equity, exit_year)?;
    if irr_value.is_none() {
        if exit_equity <= Decimal::ZERO {
            reporter.push(
                Finding::warning(
                    "indeterminate",
                    format!("Exit equity {exit_equity} is non-positive; IRR undefined"),
                )
                .in_year(exit_year),
            );
        } else {
            reporter.push(
                Finding::warning("irr_not_found", "IRR solve did not converge")
                    .in_year(exit_year),
            );
        }
    }

    let entry_leverage = if assumptions.entry_ebitda.is_zero() {
        Decimal::ZERO
    } else {
        entry_debt / assumptions.entry_ebitda
    };
    let exit_leverage = if exit_ebitda.is_zero() {
        reporter.push(Finding::warning(
            "exit_leverage_undefined",
            "Exit EBITDA is zero; exit leverage undefined",
        ));
        None
    } else {
        Some((exit_debt - exit_cash) / exit_ebitda)
    };

    Ok(ReturnsSummary {
        exit_year,
        exit_ebitda,
        exit_ev,
        exit_debt,
        exit_cash,
        exit_equity,
        equity_invested: sponsor_equity,
        moic,
        irr: irr_value,
        entry_leverage,
        exit_leverage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statements::{BalanceLine, IncomeLine, PeriodState};
    use rust_decimal_macros::dec;

    fn assumptions() -> Assumptions {
        serde_json::from_value(serde_json::json!({
            "entry_ebitda": 10_000,
            "entry_multiple": 8.0,
            "exit_multiple": 9.0,
            "exit_year": 5,
            "revenue_growth_rate": [0.05],
            "debt_instruments": [
                {"name": "Senior", "interest_rate": 0.07, "amount": 40_000,
                 "amortization_schedule": "bullet"}
            ]
        }))
        .unwrap()
    }

    fn exit_period(ebitda: Money, debt: Money, cash: Money) -> PeriodState {
        PeriodState {
            year: 5,
            income: IncomeLine {
                ebitda,
                ..IncomeLine::default()
            },
            balance: BalanceLine {
                total_debt: debt,
                cash,
                ..BalanceLine::default()
            },
            cash_flow: Default::default(),
        }
    }

    #[test]
    fn test_exit_bridge() {
        let mut r = ValidationReporter::new();
        let summary = calculate(
            &exit_period(dec!(15_000), dec!(10_000), dec!(2_000)),
            &assumptions(),
            dec!(50_000),
            dec!(40_000),
            &mut r,
        )
        .unwrap();

        assert_eq!(summary.exit_ev, dec!(135_000));
        assert_eq!(summary.exit_equity, dec!(127_000));
        assert_eq!(summary.moic, dec!(2.54));
        assert_eq!(summary.entry_leverage, dec!(4.0));
        // net-debt leverage at exit: (10k - 2k) / 15k
        assert!((summary.exit_leverage.unwrap() - dec!(0.5333)).abs() < dec!(0.001));
    }

    #[test]
    fn test_irr_identity_against_moic() {
        let mut r = ValidationReporter::new();
        let summary = calculate(
            &exit_period(dec!(15_000), Decimal::ZERO, Decimal::ZERO),
            &assumptions(),
            dec!(50_000),
            dec!(40_000),
            &mut r,
        )
        .unwrap();

        // (1 + irr)^T must reproduce MOIC
        let irr = summary.irr.unwrap();
        let mut compounded = Decimal::ONE;
        for _ in 0..5 {
            compounded *= Decimal::ONE + irr;
        }
        assert!(
            (compounded - summary.moic).abs() < dec!(0.000001),
            "(1+irr)^5 = {compounded} vs moic {}",
            summary.moic
        );
    }

    #[test]
    fn test_negative_exit_equity_yields_indeterminate() {
        let mut r = ValidationReporter::new();
        let summary = calculate(
            &exit_period(dec!(1_000), dec!(50_000), Decimal::ZERO),
            &assumptions(),
            dec!(50_000),
            dec!(40_000),
            &mut r,
        )
        .unwrap();

        assert!(summary.exit_equity < Decimal::ZERO);
        assert!(summary.moic < Decimal::ZERO);
        assert!(summary.irr.is_none());
        assert!(r.has_code("indeterminate"));
    }

    #[test]
    fn test_sub_one_moic_gives_negative_finite_irr() {
        let mut r = ValidationReporter::new();
        let summary = calculate(
            &exit_period(dec!(5_000), dec!(10_000), Decimal::ZERO),
            &assumptions(),
            dec!(50_000),
            dec!(40_000),
            &mut r,
        )
        .unwrap();

        // exit equity 35k on 50k invested: MOIC 0.7
        assert_eq!(summary.moic, dec!(0.7));
        let irr = summary.irr.unwrap();
        assert!(irr < Decimal::ZERO && irr > dec!(-1));
    }

    #[test]
    fn test_zero_exit_ebitda_flags_leverage() {
        let mut r = ValidationReporter::new();
        let summary = calculate(
            &exit_period(Decimal::ZERO, dec!(10_000), dec!(1_000)),
            &assumptions(),
            dec!(50_000),
            dec!(40_000),
            &mut r,
        )
        .unwrap();
        assert!(summary.exit_leverage.is_none());
        assert!(r.has_code("exit_leverage_undefined"));
    }

    #[test]
    fn test_interim_distributions_use_bisection() {
        // -1000 now, +400 for years 1..4, +400 + 0 exit equity year 5 has no
        // closed form; the bisection result must price the flows to ~zero NPV
        let irr = irr(dec!(1_000), &[dec!(400); 5], Decimal::ZERO, 5)
            .unwrap()
            .unwrap();
        let flows = vec![
            dec!(-1_000),
            dec!(400),
            dec!(400),
            dec!(400),
            dec!(400),
            dec!(400),
        ];
        let npv = crate::time_value::npv(irr, &flows).unwrap();
        assert!(npv.abs() < dec!(0.01), "NPV at IRR should be ~0, got {npv}");
    }

    #[test]
    fn test_closed_form_matches_bisection_for_terminal_only() {
        let closed = irr(dec!(1_000), &[], dec!(2_500), 4).unwrap().unwrap();
        let flows = vec![
            dec!(-1_000),
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO,
            dec!(2_500),
        ];
        let bisected = crate::time_value::irr_bisection(&flows).unwrap().unwrap();
        assert!((closed - bisected).abs() < dec!(0.0001));
    }
}
