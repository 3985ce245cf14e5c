use rust_decimal::Decimal;

use crate::assumptions::{AmortizationSchedule, Assumptions};
use crate::engine::projector::OperatingPlan;
use crate::error::LboError;
use crate::findings::{Finding, ValidationReporter};
use crate::statements::DebtScheduleRow;
use crate::types::{tolerance, Money, Rate};
use crate::LboResult;

/// A debt tranche with its principal resolved against entry EBITDA and its
/// sweep standing settled.
#[derive(Debug, Clone)]
pub struct ResolvedTranche {
    pub name: String,
    pub original_amount: Money,
    pub interest_rate: Rate,
    pub schedule: AmortizationSchedule,
    pub amortization_periods: u32,
    pub seniority: u32,
    pub sweep_eligible: bool,
}

/// Resolve the instrument list into sized tranches, in stack order.
pub fn resolve_stack(assumptions: &Assumptions) -> LboResult<Vec<ResolvedTranche>> {
    let mut tranches = Vec::with_capacity(assumptions.debt_instruments.len());
    for (index, instrument) in assumptions.debt_instruments.iter().enumerate() {
        let amount = instrument.resolved_amount(assumptions.entry_ebitda);
        if amount <= Decimal::ZERO {
            return Err(LboError::InvalidInput {
                field: format!("debt_instruments[{index}].amount"),
                reason: format!("resolved amount must be positive, got {amount}"),
            });
        }
        let sweep_eligible = match instrument.amortization_schedule {
            AmortizationSchedule::Amortizing | AmortizationSchedule::CashFlowSweep => true,
            AmortizationSchedule::Bullet => instrument.bullet_sweep_allowed,
        };
        tranches.push(ResolvedTranche {
            name: instrument.name.clone(),
            original_amount: amount,
            interest_rate: instrument.interest_rate,
            schedule: instrument.amortization_schedule,
            amortization_periods: instrument.amortization_periods.unwrap_or(0),
            seniority: instrument.seniority.unwrap_or(index as u32 + 1),
            sweep_eligible,
        });
    }
    Ok(tranches)
}

/// Per-tranche balances carried across periods, plus the auxiliary revolver.
#[derive(Debug, Clone)]
pub struct DebtState {
    pub balances: Vec<Money>,
    pub revolver: Money,
}

impl DebtState {
    pub fn at_close(tranches: &[ResolvedTranche]) -> Self {
        DebtState {
            balances: tranches.iter().map(|t| t.original_amount).collect(),
            revolver: Decimal::ZERO,
        }
    }

    pub fn total(&self) -> Money {
        self.balances.iter().sum::<Money>() + self.revolver
    }
}

/// Everything the solver settles for one period: the finished income tail,
/// free cash flow, per-tranche rows, and ending cash.
#[derive(Debug, Clone)]
pub struct PeriodSolution {
    pub rows: Vec<DebtScheduleRow>,
    pub interest_expense: Money,
    pub scheduled_total: Money,
    pub sweep_total: Money,
    pub revolver_repaid: Money,
    pub revolver_drawn: Money,
    pub pretax_income: Money,
    pub tax: Money,
    pub net_income: Money,
    pub cfo: Money,
    pub fcf_available_for_debt: Money,
    pub principal_repaid: Money,
    pub cash_end: Money,
}

/// Solve one period of the debt schedule.
///
/// Interest accrues on beginning balances only, so the ordering is strict
/// and needs no intra-period iteration: interest and scheduled principal
/// first, then the income tail and free cash flow, then the sweep in
/// seniority order. The sweep pool retires any outstanding revolver before
/// touching the tranches. A cash deficit after mandatory principal draws the
/// zero-rate revolver and floors cash at zero.
pub fn solve_period(
    tranches: &[ResolvedTranche],
    state: &mut DebtState,
    plan: &OperatingPlan,
    assumptions: &Assumptions,
    cash_begin: Money,
    reporter: &mut ValidationReporter,
) -> LboResult<PeriodSolution> {
    let year = plan.year;
    let horizon = assumptions.exit_year;
    let beginnings = state.balances.clone();

    // 1-2: interest on beginning balances; the revolver carries a 0% rate
    let interest_expense: Money = beginnings
        .iter()
        .zip(tranches)
        .map(|(balance, tranche)| *balance * tranche.interest_rate)
        .sum();

    // 3: scheduled principal by contract
    let mut scheduled: Vec<Money> = Vec::with_capacity(tranches.len());
    for (tranche, beginning) in tranches.iter().zip(&beginnings) {
        let amount = match tranche.schedule {
            AmortizationSchedule::Amortizing => {
                if year <= tranche.amortization_periods {
                    let level = tranche.original_amount
                        / Decimal::from(tranche.amortization_periods);
                    level.min(*beginning)
                } else {
                    Decimal::ZERO
                }
            }
            AmortizationSchedule::Bullet => {
                if year == horizon {
                    *beginning
                } else {
                    Decimal::ZERO
                }
            }
            AmortizationSchedule::CashFlowSweep => Decimal::ZERO,
        };
        scheduled.push(amount);
    }
    let scheduled_total: Money = scheduled.iter().sum();

    // 4: finish the income statement now that interest is known
    let pretax_income = plan.ebit - interest_expense;
    let tax = if pretax_income > Decimal::ZERO {
        pretax_income * assumptions.tax_rate
    } else {
        Decimal::ZERO
    };
    let net_income = pretax_income - tax;

    let cfo = net_income + plan.d_and_a - plan.change_in_working_capital;
    let min_cash_top_up = (assumptions.min_cash_balance - cash_begin).max(Decimal::ZERO);
    let fcf_available_for_debt = cfo - plan.capex - min_cash_top_up;

    // 5: sweep pool, revolver first, then tranches by seniority
    let mut pool = (fcf_available_for_debt - scheduled_total).max(Decimal::ZERO);
    let revolver_repaid = state.revolver.min(pool);
    state.revolver -= revolver_repaid;
    pool -= revolver_repaid;

    let mut order: Vec<usize> = (0..tranches.len()).collect();
    order.sort_by_key(|&i| tranches[i].seniority);

    let mut sweeps = vec![Decimal::ZERO; tranches.len()];
    for i in order {
        if pool <= Decimal::ZERO {
            break;
        }
        if !tranches[i].sweep_eligible {
            continue;
        }
        let headroom = beginnings[i] - scheduled[i];
        let sweep = headroom.min(pool);
        if sweep > Decimal::ZERO {
            sweeps[i] = sweep;
            pool -= sweep;
        }
    }
    let sweep_total: Money = sweeps.iter().sum();

    // 6: ending balances
    let mut rows = Vec::with_capacity(tranches.len());
    for (i, tranche) in tranches.iter().enumerate() {
        let ending = beginnings[i] - scheduled[i] - sweeps[i];
        if ending < Decimal::ZERO {
            return Err(LboError::Calculation {
                year,
                detail: format!(
                    "{}: ending balance {ending} went negative (beginning {}, principal {})",
                    tranche.name,
                    beginnings[i],
                    scheduled[i] + sweeps[i]
                ),
            });
        }
        state.balances[i] = ending;
        rows.push(DebtScheduleRow {
            year,
            beginning: beginnings[i],
            interest: beginnings[i] * tranche.interest_rate,
            scheduled_principal: scheduled[i],
            sweep_principal: sweeps[i],
            ending,
        });
    }

    // Cash roll-forward and the liquidity fallback
    let principal_repaid = scheduled_total + sweep_total + revolver_repaid;
    let mut cash_end = cash_begin + cfo - plan.capex - principal_repaid;
    let mut revolver_drawn = Decimal::ZERO;

    if cash_end < assumptions.min_cash_balance {
        reporter.push(
            Finding::warning(
                "liquidity_shortfall",
                format!(
                    "Free cash flow cannot cover scheduled principal and the {} cash floor",
                    assumptions.min_cash_balance
                ),
            )
            .in_year(year)
            .with_delta(assumptions.min_cash_balance - cash_end),
        );
    }
    if cash_end < Decimal::ZERO {
        revolver_drawn = -cash_end;
        state.revolver += revolver_drawn;
        cash_end = Decimal::ZERO;
        reporter.push(
            Finding::warning(
                "revolver_draw",
                format!("Drew {revolver_drawn} on the revolver to keep cash at zero"),
            )
            .in_year(year)
            .with_delta(revolver_drawn),
        );
    }

    Ok(PeriodSolution {
        rows,
        interest_expense,
        scheduled_total,
        sweep_total,
        revolver_repaid,
        revolver_drawn,
        pretax_income,
        tax,
        net_income,
        cfo,
        fcf_available_for_debt,
        principal_repaid,
        cash_end,
    })
}

/// Re-check every solved row against the schedule invariants. Violations
/// indicate an engine defect and surface as calculation errors rather than
/// silently corrupt output.
pub fn verify_schedule(
    tranche: &ResolvedTranche,
    rows: &[DebtScheduleRow],
) -> LboResult<()> {
    let mut expected_beginning = tranche.original_amount;
    for row in rows {
        let eps = tolerance(tranche.original_amount);
        if (row.beginning - expected_beginning).abs() > eps {
            return Err(schedule_defect(tranche, row.year, "beginning balance continuity"));
        }
        if (row.beginning - row.scheduled_principal - row.sweep_principal - row.ending).abs() > eps
        {
            return Err(schedule_defect(tranche, row.year, "balance equation"));
        }
        if row.total_principal() > row.beginning + eps {
            return Err(schedule_defect(tranche, row.year, "principal exceeds beginning"));
        }
        if row.ending < -eps {
            return Err(schedule_defect(tranche, row.year, "negative ending balance"));
        }
        if (row.interest - row.beginning * tranche.interest_rate).abs() > eps {
            return Err(schedule_defect(tranche, row.year, "interest off beginning balance"));
        }
        expected_beginning = row.ending;
    }
    Ok(())
}

fn schedule_defect(tranche: &ResolvedTranche, year: u32, what: &str) -> LboError {
    LboError::Calculation {
        year,
        detail: format!("{}: debt schedule failed {what} check", tranche.name),
    }
}

/// Tag the payment scenarios this debt stack exercises.
pub fn tag_scenarios(
    tranches: &[ResolvedTranche],
    total_sweep_applied: Money,
    reporter: &mut ValidationReporter,
) {
    use crate::findings::PaymentScenario;

    let mut has_amortizing = false;
    let mut has_bullet = false;
    for tranche in tranches {
        match tranche.schedule {
            AmortizationSchedule::Amortizing => {
                has_amortizing = true;
                reporter.tag(PaymentScenario::Amortizing);
            }
            AmortizationSchedule::Bullet => {
                has_bullet = true;
                reporter.tag(PaymentScenario::Bullet);
            }
            AmortizationSchedule::CashFlowSweep => reporter.tag(PaymentScenario::CashFlowSweep),
        }
    }
    if total_sweep_applied > Decimal::ZERO {
        reporter.tag(PaymentScenario::CashFlowSweep);
    }
    if has_amortizing && has_bullet {
        reporter.tag(PaymentScenario::MixedStructure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::projector::OperatingPlan;
    use rust_decimal_macros::dec;

    fn assumptions(json: serde_json::Value) -> Assumptions {
        serde_json::from_value(json).unwrap()
    }

    fn two_tranche() -> Assumptions {
        assumptions(serde_json::json!({
            "entry_ebitda": 10_000,
            "entry_multiple": 8.0,
            "exit_multiple": 8.0,
            "exit_year": 5,
            "revenue_growth_rate": [0.05],
            "starting_revenue": 50_000,
            "min_cash_balance": 0,
            "debt_instruments": [
                {"name": "Senior", "interest_rate": 0.06, "ebitda_multiple": 3.0,
                 "amortization_schedule": "amortizing", "amortization_periods": 5,
                 "seniority": 1},
                {"name": "Mezzanine", "interest_rate": 0.10, "ebitda_multiple": 1.0,
                 "amortization_schedule": "bullet", "seniority": 2}
            ]
        }))
    }

    fn plan(year: u32, ebit: Money, d_and_a: Money, dwc: Money, capex: Money) -> OperatingPlan {
        OperatingPlan {
            year,
            revenue: Decimal::ZERO,
            cogs: Decimal::ZERO,
            gross_profit: Decimal::ZERO,
            sganda: Decimal::ZERO,
            ebitda: ebit + d_and_a,
            d_and_a,
            ebit,
            accounts_receivable: Decimal::ZERO,
            inventory: Decimal::ZERO,
            accounts_payable: Decimal::ZERO,
            change_in_working_capital: dwc,
            capex,
        }
    }

    #[test]
    fn test_resolve_stack_sizes_and_seniority() {
        let a = two_tranche();
        let tranches = resolve_stack(&a).unwrap();
        assert_eq!(tranches[0].original_amount, dec!(30_000));
        assert_eq!(tranches[1].original_amount, dec!(10_000));
        assert_eq!(tranches[0].seniority, 1);
        assert!(tranches[0].sweep_eligible);
        assert!(!tranches[1].sweep_eligible);
    }

    #[test]
    fn test_interest_on_beginning_balances_only() {
        let a = two_tranche();
        let tranches = resolve_stack(&a).unwrap();
        let mut state = DebtState::at_close(&tranches);
        let mut r = ValidationReporter::new();

        let sol = solve_period(
            &tranches,
            &mut state,
            &plan(1, dec!(10_000), dec!(1_000), Decimal::ZERO, dec!(1_000)),
            &a,
            Decimal::ZERO,
            &mut r,
        )
        .unwrap();

        // 30k * 6% + 10k * 10% = 2,800 regardless of repayments this year
        assert_eq!(sol.interest_expense, dec!(2_800));
        assert_eq!(sol.rows[0].interest, dec!(1_800));
        assert_eq!(sol.rows[1].interest, dec!(1_000));
    }

    #[test]
    fn test_scheduled_amortization_and_income_tail() {
        let a = two_tranche();
        let tranches = resolve_stack(&a).unwrap();
        let mut state = DebtState::at_close(&tranches);
        let mut r = ValidationReporter::new();

        let sol = solve_period(
            &tranches,
            &mut state,
            &plan(1, dec!(10_000), dec!(1_000), Decimal::ZERO, dec!(1_000)),
            &a,
            Decimal::ZERO,
            &mut r,
        )
        .unwrap();

        // level principal 30k / 5
        assert_eq!(sol.scheduled_total, dec!(6_000));
        // pretax 7,200; tax 1,800; NI 5,400
        assert_eq!(sol.pretax_income, dec!(7_200));
        assert_eq!(sol.tax, dec!(1_800));
        assert_eq!(sol.net_income, dec!(5_400));
        // CFO 6,400; FCF 5,400; pool empty; shortfall of 600 covered by revolver
        assert_eq!(sol.fcf_available_for_debt, dec!(5_400));
        assert_eq!(sol.sweep_total, Decimal::ZERO);
        assert_eq!(sol.revolver_drawn, dec!(600));
        assert_eq!(sol.cash_end, Decimal::ZERO);
        assert!(r.has_code("liquidity_shortfall"));
        assert!(r.has_code("revolver_draw"));
        assert_eq!(state.revolver, dec!(600));
        assert_eq!(state.total(), dec!(34_600));
    }

    #[test]
    fn test_sweep_respects_seniority_and_bullet_exclusion() {
        let a = two_tranche();
        let tranches = resolve_stack(&a).unwrap();
        let mut state = DebtState::at_close(&tranches);
        let mut r = ValidationReporter::new();

        // plenty of cash: EBIT 20k, no capex
        let sol = solve_period(
            &tranches,
            &mut state,
            &plan(1, dec!(20_000), Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
            &a,
            Decimal::ZERO,
            &mut r,
        )
        .unwrap();

        // pretax 17,200; NI 12,900; pool = 12,900 - 6,000 = 6,900, all to Senior
        assert_eq!(sol.sweep_total, dec!(6_900));
        assert_eq!(sol.rows[0].sweep_principal, dec!(6_900));
        assert_eq!(sol.rows[1].sweep_principal, Decimal::ZERO);
        assert_eq!(sol.rows[0].ending, dec!(17_100));
        // bullet untouched until maturity
        assert_eq!(sol.rows[1].ending, dec!(10_000));
        assert_eq!(sol.cash_end, Decimal::ZERO);
    }

    #[test]
    fn test_bullet_sweep_allowed_flag() {
        let mut a = two_tranche();
        a.debt_instruments[1].bullet_sweep_allowed = true;
        // make the senior a sweep-only tranche so the pool reaches the bullet
        a.debt_instruments[0].amortization_schedule = AmortizationSchedule::CashFlowSweep;
        a.debt_instruments[0].amortization_periods = None;
        a.debt_instruments[0].ebitda_multiple = Some(dec!(0.5));

        let tranches = resolve_stack(&a).unwrap();
        let mut state = DebtState::at_close(&tranches);
        let mut r = ValidationReporter::new();

        let sol = solve_period(
            &tranches,
            &mut state,
            &plan(1, dec!(20_000), Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
            &a,
            Decimal::ZERO,
            &mut r,
        )
        .unwrap();

        // senior (5k sweep tranche) retires first, remainder prepays the bullet
        assert_eq!(sol.rows[0].ending, Decimal::ZERO);
        assert!(sol.rows[1].sweep_principal > Decimal::ZERO);
    }

    #[test]
    fn test_bullet_repaid_at_horizon() {
        let a = two_tranche();
        let tranches = resolve_stack(&a).unwrap();
        let mut state = DebtState {
            balances: vec![Decimal::ZERO, dec!(10_000)],
            revolver: Decimal::ZERO,
        };
        let mut r = ValidationReporter::new();

        let sol = solve_period(
            &tranches,
            &mut state,
            &plan(5, dec!(20_000), Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
            &a,
            Decimal::ZERO,
            &mut r,
        )
        .unwrap();

        assert_eq!(sol.rows[1].scheduled_principal, dec!(10_000));
        assert_eq!(sol.rows[1].ending, Decimal::ZERO);
    }

    #[test]
    fn test_min_cash_reserved_before_sweep() {
        let mut a = two_tranche();
        a.min_cash_balance = dec!(2_000);
        let tranches = resolve_stack(&a).unwrap();
        let mut state = DebtState::at_close(&tranches);
        let mut r = ValidationReporter::new();

        let sol = solve_period(
            &tranches,
            &mut state,
            &plan(1, dec!(20_000), Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
            &a,
            Decimal::ZERO,
            &mut r,
        )
        .unwrap();

        // NI 12,900 minus the 2,000 floor top-up leaves 10,900 for debt;
        // sweep 4,900 after 6,000 scheduled; cash lands on the floor
        assert_eq!(sol.fcf_available_for_debt, dec!(10_900));
        assert_eq!(sol.sweep_total, dec!(4_900));
        assert_eq!(sol.cash_end, dec!(2_000));
        assert!(!r.has_code("liquidity_shortfall"));
    }

    #[test]
    fn test_revolver_repaid_before_tranche_sweep() {
        let a = two_tranche();
        let tranches = resolve_stack(&a).unwrap();
        let mut state = DebtState::at_close(&tranches);
        state.revolver = dec!(3_000);
        let mut r = ValidationReporter::new();

        let sol = solve_period(
            &tranches,
            &mut state,
            &plan(1, dec!(20_000), Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
            &a,
            Decimal::ZERO,
            &mut r,
        )
        .unwrap();

        // pool 6,900: 3,000 retires the revolver, 3,900 sweeps the senior
        assert_eq!(sol.revolver_repaid, dec!(3_000));
        assert_eq!(sol.sweep_total, dec!(3_900));
        assert_eq!(state.revolver, Decimal::ZERO);
    }

    #[test]
    fn test_verify_schedule_catches_corruption() {
        let a = two_tranche();
        let tranches = resolve_stack(&a).unwrap();
        let good = vec![DebtScheduleRow {
            year: 1,
            beginning: dec!(30_000),
            interest: dec!(1_800),
            scheduled_principal: dec!(6_000),
            sweep_principal: Decimal::ZERO,
            ending: dec!(24_000),
        }];
        verify_schedule(&tranches[0], &good).unwrap();

        let mut bad = good.clone();
        bad[0].ending = dec!(25_000);
        assert!(verify_schedule(&tranches[0], &bad).is_err());

        let mut bad = good.clone();
        bad[0].interest = dec!(999);
        assert!(verify_schedule(&tranches[0], &bad).is_err());
    }
}
