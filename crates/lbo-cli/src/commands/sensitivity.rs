use clap::Args;
use serde::Deserialize;
use serde_json::Value;

use lbo_core::scenarios::{self, SensitivityInput};
use lbo_core::Assumptions;

use crate::input;

/// Arguments for the sensitivity grid
#[derive(Args)]
pub struct SensitivityArgs {
    /// Path to a JSON file holding the base assumptions and the grid spec
    #[arg(long)]
    pub input: Option<String>,
}

/// Input file shape: the base input record plus the two sweep axes.
#[derive(Deserialize)]
struct SensitivityRequest {
    assumptions: Value,
    #[serde(flatten)]
    grid: SensitivityInput,
}

pub fn run_sensitivity(args: SensitivityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let raw = if let Some(ref path) = args.input {
        input::file::read_json_value(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        data
    } else {
        return Err("--input is required (or pipe the request to stdin)".into());
    };

    let request: SensitivityRequest = serde_json::from_value(raw)?;
    let assumptions = Assumptions::from_json_value(request.assumptions)?;
    let result = scenarios::evaluate_grid(&assumptions, &request.grid, None)?;
    Ok(serde_json::to_value(result)?)
}
