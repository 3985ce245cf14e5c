use clap::Args;
use serde_json::Value;

use lbo_core::engine;
use lbo_core::Assumptions;

use crate::input;

/// Arguments for building a full LBO model
#[derive(Args)]
pub struct ModelArgs {
    /// Path to the JSON input record (reads piped stdin when omitted)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_model(args: ModelArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let raw = if let Some(ref path) = args.input {
        input::file::read_json_value(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        data
    } else {
        return Err("--input is required (or pipe the input record to stdin)".into());
    };

    let assumptions = Assumptions::from_json_value(raw)?;
    let result = engine::build_model(&assumptions)?;
    Ok(serde_json::to_value(result)?)
}
