use serde_json::Value;
use tabled::{builder::Builder, Table};

use super::scalar;

/// Format output as tables: a returns summary plus a per-year statement
/// digest for model runs, the metric grid for sensitivity runs, a flat
/// field/value table for anything else.
pub fn print_table(value: &Value) {
    let result = value.get("result").unwrap_or(value);

    if result.get("returns").is_some() {
        print_model_tables(result);
    } else if result.get("matrix").is_some() {
        print_sensitivity_table(result);
    } else if let Value::Object(map) = result {
        print_flat(map);
    } else {
        println!("{}", value);
    }

    if let Some(Value::Array(warnings)) = value.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }
    if let Some(Value::String(methodology)) = value.get("methodology") {
        println!("\nMethodology: {}", methodology);
    }
}

fn print_model_tables(result: &Value) {
    if let Some(Value::Object(returns)) = result.get("returns") {
        println!("Returns");
        print_flat(returns);
    }

    if let Some(Value::Array(periods)) = result.get("periods") {
        let mut builder = Builder::default();
        builder.push_record([
            "year",
            "revenue",
            "ebitda",
            "net_income",
            "cfo",
            "cash",
            "total_debt",
            "equity",
        ]);
        for p in periods {
            builder.push_record([
                scalar(&p["year"]),
                scalar(&p["income"]["revenue"]),
                scalar(&p["income"]["ebitda"]),
                scalar(&p["income"]["net_income"]),
                scalar(&p["cash_flow"]["cfo"]),
                scalar(&p["balance"]["cash"]),
                scalar(&p["balance"]["total_debt"]),
                scalar(&p["balance"]["equity"]),
            ]);
        }
        println!("\nProjection");
        println!("{}", Table::from(builder));
    }

    if let Some(Value::Array(tags)) = result.get("scenario_tags") {
        if !tags.is_empty() {
            let rendered: Vec<String> = tags.iter().map(scalar).collect();
            println!("\nPayment scenarios: {}", rendered.join(", "));
        }
    }
}

fn print_sensitivity_table(result: &Value) {
    let v1 = result["variable_1_values"].as_array().cloned().unwrap_or_default();
    let v2 = result["variable_2_values"].as_array().cloned().unwrap_or_default();
    let empty = Vec::new();

    let mut builder = Builder::default();
    let mut header = vec![format!(
        "{} \\ {}",
        scalar(&result["variable_1_name"]),
        scalar(&result["variable_2_name"])
    )];
    header.extend(v2.iter().map(scalar));
    builder.push_record(header);

    if let Some(Value::Array(rows)) = result.get("matrix") {
        for (i, row) in rows.iter().enumerate() {
            let cells = row.as_array().unwrap_or(&empty);
            let mut record = vec![v1.get(i).map(scalar).unwrap_or_default()];
            record.extend(cells.iter().map(scalar));
            builder.push_record(record);
        }
    }
    println!("{}", Table::from(builder));
}

fn print_flat(map: &serde_json::Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        if val.is_array() || val.is_object() {
            continue;
        }
        builder.push_record([key.clone(), scalar(val)]);
    }
    println!("{}", Table::from(builder));
}
