use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::LboError;
use crate::types::{Money, Rate};
use crate::LboResult;

const BISECTION_LO: Decimal = dec!(-0.99);
const BISECTION_HI: Decimal = dec!(10.0);
const BISECTION_TOLERANCE: Decimal = dec!(0.000001);
const MAX_BISECTION_ITERATIONS: u32 = 200;
const NTH_ROOT_ITERATIONS: u32 = 60;

/// Net Present Value of annual cash flows (index = period).
pub fn npv(rate: Rate, cash_flows: &[Money]) -> LboResult<Money> {
    if rate <= dec!(-1) {
        return Err(LboError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }

    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;
    let mut result = Decimal::ZERO;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            match discount.checked_mul(one_plus_r) {
                Some(d) => discount = d,
                // discount factor overflowed: later flows contribute nothing
                None => break,
            }
        }
        if discount.is_zero() {
            return Err(LboError::DivisionByZero {
                context: format!("NPV discount factor at period {t}"),
            });
        }
        let term = cf.checked_div(discount).ok_or_else(|| LboError::DivisionByZero {
            context: format!("NPV discount factor underflow at period {t}"),
        })?;
        result += term;
    }

    Ok(result)
}

/// Internal Rate of Return by bisection on [-0.99, 10.0].
///
/// Returns None when no sign change exists in the bracket or the solve does
/// not converge; the caller decides how to report that.
pub fn irr_bisection(cash_flows: &[Money]) -> LboResult<Option<Rate>> {
    if cash_flows.len() < 2 {
        return Err(LboError::InvalidInput {
            field: "cash_flows".into(),
            reason: "IRR requires at least 2 cash flows".into(),
        });
    }

    let mut lo = BISECTION_LO;
    let mut hi = BISECTION_HI;
    let mut npv_lo = npv(lo, cash_flows)?;
    let npv_hi = npv(hi, cash_flows)?;

    if npv_lo.is_zero() {
        return Ok(Some(lo));
    }
    if npv_hi.is_zero() {
        return Ok(Some(hi));
    }
    if (npv_lo.is_sign_positive() && npv_hi.is_sign_positive())
        || (npv_lo.is_sign_negative() && npv_hi.is_sign_negative())
    {
        return Ok(None);
    }

    for _ in 0..MAX_BISECTION_ITERATIONS {
        let mid = (lo + hi) / Decimal::TWO;
        let npv_mid = npv(mid, cash_flows)?;

        if npv_mid.is_zero() || (hi - lo) <= BISECTION_TOLERANCE {
            return Ok(Some(mid));
        }

        if npv_mid.is_sign_positive() == npv_lo.is_sign_positive() {
            lo = mid;
            npv_lo = npv_mid;
        } else {
            hi = mid;
        }
    }

    Ok(None)
}

/// Annualized rate implied by a total return multiple over `years` periods:
/// multiple^(1/years) - 1, solved as an n-th root with Newton's method.
pub fn annualized_rate(multiple: Decimal, years: u32) -> Option<Rate> {
    if multiple <= Decimal::ZERO || years == 0 {
        return None;
    }
    if years == 1 {
        return Some(multiple - Decimal::ONE);
    }

    let n = Decimal::from(years);
    let mut x = if multiple > Decimal::ONE {
        Decimal::ONE + (multiple - Decimal::ONE) / n
    } else {
        multiple
    };

    for _ in 0..NTH_ROOT_ITERATIONS {
        // x_{k+1} = x_k - (x_k^n - multiple) / (n * x_k^(n-1))
        let mut x_pow_nm1 = Decimal::ONE;
        for _ in 0..(years - 1) {
            x_pow_nm1 = x_pow_nm1.checked_mul(x)?;
        }
        let x_pow_n = x_pow_nm1.checked_mul(x)?;

        let denom = n * x_pow_nm1;
        if denom.is_zero() {
            return None;
        }

        let step = (x_pow_n - multiple) / denom;
        x -= step;
        if x <= Decimal::ZERO {
            x = dec!(0.000001);
        }
        if step.abs() < dec!(0.000000000001) {
            break;
        }
    }

    Some(x - Decimal::ONE)
}
