use serde_json::Value;
use std::io;

use super::scalar;

/// Write output as CSV to stdout: the per-year projection for model runs,
/// the metric grid for sensitivity runs, field/value pairs otherwise.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());
    let result = value.get("result").unwrap_or(value);

    if let Some(Value::Array(periods)) = result.get("periods") {
        let _ = wtr.write_record([
            "year",
            "revenue",
            "ebitda",
            "interest_expense",
            "net_income",
            "cfo",
            "capex",
            "debt_repaid",
            "cash",
            "total_debt",
            "equity",
        ]);
        for p in periods {
            let _ = wtr.write_record([
                scalar(&p["year"]),
                scalar(&p["income"]["revenue"]),
                scalar(&p["income"]["ebitda"]),
                scalar(&p["income"]["interest_expense"]),
                scalar(&p["income"]["net_income"]),
                scalar(&p["cash_flow"]["cfo"]),
                scalar(&p["cash_flow"]["capex"]),
                scalar(&p["cash_flow"]["debt_repaid"]),
                scalar(&p["balance"]["cash"]),
                scalar(&p["balance"]["total_debt"]),
                scalar(&p["balance"]["equity"]),
            ]);
        }
    } else if let Some(Value::Array(rows)) = result.get("matrix") {
        let v2: Vec<String> = result["variable_2_values"]
            .as_array()
            .map(|v| v.iter().map(scalar).collect())
            .unwrap_or_default();
        let mut header = vec![scalar(&result["variable_1_name"])];
        header.extend(v2);
        let _ = wtr.write_record(&header);

        let v1 = result["variable_1_values"].as_array().cloned().unwrap_or_default();
        let empty = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            let mut record = vec![v1.get(i).map(scalar).unwrap_or_default()];
            record.extend(row.as_array().unwrap_or(&empty).iter().map(scalar));
            let _ = wtr.write_record(&record);
        }
    } else if let Value::Object(map) = result {
        let _ = wtr.write_record(["field", "value"]);
        for (key, val) in map {
            if !val.is_array() && !val.is_object() {
                let _ = wtr.write_record([key.clone(), scalar(val)]);
            }
        }
    }

    let _ = wtr.flush();
}
