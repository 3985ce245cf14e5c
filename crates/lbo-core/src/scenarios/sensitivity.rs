use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::assumptions::Assumptions;
use crate::engine;
use crate::error::LboError;
use crate::types::{with_metadata, ComputationOutput};
use crate::LboResult;

/// Assumption fields the driver can sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepParameter {
    EntryMultiple,
    ExitMultiple,
    /// Replaces every year's growth rate with the swept value
    RevenueGrowth,
    CogsPct,
    TaxRate,
    MinCashBalance,
}

impl SweepParameter {
    pub fn name(&self) -> &'static str {
        match self {
            SweepParameter::EntryMultiple => "entry_multiple",
            SweepParameter::ExitMultiple => "exit_multiple",
            SweepParameter::RevenueGrowth => "revenue_growth",
            SweepParameter::CogsPct => "cogs_pct",
            SweepParameter::TaxRate => "tax_rate",
            SweepParameter::MinCashBalance => "min_cash_balance",
        }
    }
}

/// Output metric extracted from each cell's run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMetric {
    Moic,
    Irr,
    ExitEquity,
}

/// One sweep dimension: min..=max in `step` increments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepAxis {
    pub parameter: SweepParameter,
    pub min: Decimal,
    pub max: Decimal,
    pub step: Decimal,
}

/// Input for a 2-way sensitivity analysis over full engine re-runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityInput {
    pub variable_1: SweepAxis,
    pub variable_2: SweepAxis,
    pub output_metric: OutputMetric,
}

/// Dense result grid.
///
/// `matrix[i][j]` holds the metric at `variable_1_values[i]`,
/// `variable_2_values[j]`; None marks a failed, indeterminate, or skipped
/// cell. `cancelled` is set when a cancellation signal cut the run short,
/// in which case unevaluated cells are None.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityOutput {
    pub variable_1_name: String,
    pub variable_2_name: String,
    pub variable_1_values: Vec<Decimal>,
    pub variable_2_values: Vec<Decimal>,
    pub output_metric: OutputMetric,
    pub matrix: Vec<Vec<Option<Decimal>>>,
    pub base_case_value: Option<Decimal>,
    pub base_case_position: (usize, usize),
    pub cancelled: bool,
}

/// Generate the sweep values for an axis from min to max with step.
fn generate_sweep_values(axis: &SweepAxis) -> LboResult<Vec<Decimal>> {
    if axis.step <= Decimal::ZERO {
        return Err(LboError::InvalidInput {
            field: format!("variable:{}", axis.parameter.name()),
            reason: "Step must be positive".into(),
        });
    }
    if axis.min > axis.max {
        return Err(LboError::InvalidInput {
            field: format!("variable:{}", axis.parameter.name()),
            reason: "Min must be <= max".into(),
        });
    }

    let mut values = Vec::new();
    let mut current = axis.min;
    while current <= axis.max {
        values.push(current);
        current += axis.step;
    }
    if let Some(&last) = values.last() {
        if last < axis.max {
            values.push(axis.max);
        }
    }
    if values.is_empty() {
        values.push(axis.min);
    }

    Ok(values)
}

/// Clone the base assumptions with one parameter overridden.
fn apply_override(base: &Assumptions, parameter: SweepParameter, value: Decimal) -> Assumptions {
    let mut perturbed = base.clone();
    match parameter {
        SweepParameter::EntryMultiple => perturbed.entry_multiple = value,
        SweepParameter::ExitMultiple => perturbed.exit_multiple = value,
        SweepParameter::RevenueGrowth => {
            perturbed.revenue_growth_rate = vec![value; base.revenue_growth_rate.len()];
        }
        SweepParameter::CogsPct => perturbed.cogs_pct = value,
        SweepParameter::TaxRate => perturbed.tax_rate = value,
        SweepParameter::MinCashBalance => perturbed.min_cash_balance = value,
    }
    perturbed
}

fn extract_metric(output: &engine::LboModelOutput, metric: OutputMetric) -> Option<Decimal> {
    match metric {
        OutputMetric::Moic => Some(output.returns.moic),
        OutputMetric::Irr => output.returns.irr,
        OutputMetric::ExitEquity => Some(output.returns.exit_equity),
    }
}

enum CellOutcome {
    Value(Option<Decimal>),
    Failed(String),
    Skipped,
}

fn closest_index(values: &[Decimal], target: Decimal) -> usize {
    values
        .iter()
        .enumerate()
        .min_by_key(|(_, v)| (**v - target).abs())
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Evaluate the grid, one full engine run per cell.
///
/// Cells are independent and run in parallel; each result lands at its grid
/// coordinates, so the matrix is identical across runs regardless of
/// scheduling. `cancel` is checked before each cell; once set, remaining
/// cells are skipped and the output is marked cancelled.
pub fn evaluate_grid(
    base: &Assumptions,
    input: &SensitivityInput,
    cancel: Option<&AtomicBool>,
) -> LboResult<ComputationOutput<SensitivityOutput>> {
    let start = Instant::now();
    base.validate()?;

    let v1_values = generate_sweep_values(&input.variable_1)?;
    let v2_values = generate_sweep_values(&input.variable_2)?;

    let cells: Vec<(usize, usize)> = (0..v1_values.len())
        .flat_map(|i| (0..v2_values.len()).map(move |j| (i, j)))
        .collect();

    let outcomes: Vec<((usize, usize), CellOutcome)> = cells
        .par_iter()
        .map(|&(i, j)| {
            if cancel.map(|c| c.load(Ordering::Relaxed)).unwrap_or(false) {
                return ((i, j), CellOutcome::Skipped);
            }
            let perturbed = apply_override(
                &apply_override(base, input.variable_1.parameter, v1_values[i]),
                input.variable_2.parameter,
                v2_values[j],
            );
            match engine::build_model(&perturbed) {
                Ok(run) => (
                    (i, j),
                    CellOutcome::Value(extract_metric(&run.result, input.output_metric)),
                ),
                Err(e) => ((i, j), CellOutcome::Failed(e.to_string())),
            }
        })
        .collect();

    let mut matrix = vec![vec![None; v2_values.len()]; v1_values.len()];
    let mut warnings: Vec<String> = Vec::new();
    let mut cancelled = false;
    for ((i, j), outcome) in outcomes {
        match outcome {
            CellOutcome::Value(v) => matrix[i][j] = v,
            CellOutcome::Failed(e) => {
                warnings.push(format!(
                    "Evaluation failed at ({}, {}): {e}",
                    v1_values[i], v2_values[j]
                ));
            }
            CellOutcome::Skipped => cancelled = true,
        }
    }
    warnings.sort();

    let mid1 = (input.variable_1.min + input.variable_1.max) / Decimal::TWO;
    let mid2 = (input.variable_2.min + input.variable_2.max) / Decimal::TWO;
    let base_row = closest_index(&v1_values, mid1);
    let base_col = closest_index(&v2_values, mid2);
    let base_case_value = matrix[base_row][base_col];

    let output = SensitivityOutput {
        variable_1_name: input.variable_1.parameter.name().to_string(),
        variable_2_name: input.variable_2.parameter.name().to_string(),
        variable_1_values: v1_values,
        variable_2_values: v2_values,
        output_metric: input.output_metric,
        matrix,
        base_case_value,
        base_case_position: (base_row, base_col),
        cancelled,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "2-Way LBO Sensitivity Grid",
        &serde_json::json!({
            "variable_1": output.variable_1_name.clone(),
            "variable_2": output.variable_2_name.clone(),
            "output_metric": input.output_metric,
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base() -> Assumptions {
        serde_json::from_value(serde_json::json!({
            "entry_ebitda": 10_000,
            "entry_multiple": 8.0,
            "exit_multiple": 8.0,
            "exit_year": 5,
            "revenue_growth_rate": [0.05, 0.05, 0.05, 0.05, 0.05],
            "starting_revenue": 36_500,
            "cogs_pct": 0.55,
            "sganda_pct": 0.15,
            "debt_instruments": [
                {"name": "Senior", "interest_rate": 0.06, "amount": 30_000,
                 "amortization_schedule": "amortizing", "amortization_periods": 5}
            ]
        }))
        .unwrap()
    }

    fn grid() -> SensitivityInput {
        SensitivityInput {
            variable_1: SweepAxis {
                parameter: SweepParameter::EntryMultiple,
                min: dec!(7.0),
                max: dec!(9.0),
                step: dec!(1.0),
            },
            variable_2: SweepAxis {
                parameter: SweepParameter::ExitMultiple,
                min: dec!(7.0),
                max: dec!(9.0),
                step: dec!(1.0),
            },
            output_metric: OutputMetric::Moic,
        }
    }

    #[test]
    fn test_grid_dimensions_and_base_position() {
        let out = evaluate_grid(&base(), &grid(), None).unwrap().result;
        assert_eq!(out.variable_1_values.len(), 3);
        assert_eq!(out.variable_2_values.len(), 3);
        assert_eq!(out.matrix.len(), 3);
        assert_eq!(out.matrix[0].len(), 3);
        assert_eq!(out.base_case_position, (1, 1));
        assert!(out.base_case_value.is_some());
        assert!(!out.cancelled);
    }

    #[test]
    fn test_moic_strictly_increases_with_exit_multiple() {
        let out = evaluate_grid(&base(), &grid(), None).unwrap().result;
        for row in &out.matrix {
            for j in 1..row.len() {
                assert!(
                    row[j].unwrap() > row[j - 1].unwrap(),
                    "MOIC must rise with exit multiple: {row:?}"
                );
            }
        }
    }

    #[test]
    fn test_grid_is_deterministic() {
        let first = evaluate_grid(&base(), &grid(), None).unwrap().result;
        let second = evaluate_grid(&base(), &grid(), None).unwrap().result;
        assert_eq!(first.matrix, second.matrix);
        assert_eq!(first.base_case_value, second.base_case_value);
    }

    #[test]
    fn test_cancellation_marks_partial_result() {
        let cancel = AtomicBool::new(true);
        let out = evaluate_grid(&base(), &grid(), Some(&cancel)).unwrap().result;
        assert!(out.cancelled);
        assert!(out
            .matrix
            .iter()
            .all(|row| row.iter().all(|cell| cell.is_none())));
    }

    #[test]
    fn test_invalid_step_rejected() {
        let mut g = grid();
        g.variable_1.step = Decimal::ZERO;
        assert!(evaluate_grid(&base(), &g, None).is_err());
    }

    #[test]
    fn test_failed_cells_become_none_with_warning() {
        let mut g = grid();
        // an entry multiple of zero fails validation inside the cell
        g.variable_1 = SweepAxis {
            parameter: SweepParameter::EntryMultiple,
            min: dec!(0.0),
            max: dec!(8.0),
            step: dec!(8.0),
        };
        let envelope = evaluate_grid(&base(), &g, None).unwrap();
        let out = &envelope.result;
        assert!(out.matrix[0].iter().all(|cell| cell.is_none()));
        assert!(out.matrix[1].iter().all(|cell| cell.is_some()));
        assert!(!envelope.warnings.is_empty());
    }

    #[test]
    fn test_non_exact_step_includes_max() {
        let axis = SweepAxis {
            parameter: SweepParameter::ExitMultiple,
            min: dec!(0),
            max: dec!(1),
            step: dec!(0.3),
        };
        let vals = generate_sweep_values(&axis).unwrap();
        assert_eq!(vals.len(), 5);
        assert_eq!(*vals.last().unwrap(), dec!(1));
    }
}
