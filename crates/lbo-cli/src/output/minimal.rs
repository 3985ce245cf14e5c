use serde_json::Value;

use super::scalar;

/// Print just the headline answer: MOIC and IRR for a model run, the base
/// case value for a sensitivity grid.
pub fn print_minimal(value: &Value) {
    let result = value.get("result").unwrap_or(value);

    if let Some(returns) = result.get("returns") {
        let moic = scalar(&returns["moic"]);
        let irr = scalar(&returns["irr"]);
        println!("moic: {moic}");
        println!("irr: {irr}");
        return;
    }

    if result.get("matrix").is_some() {
        println!("base_case: {}", scalar(&result["base_case_value"]));
        return;
    }

    // Fall back to the first scalar field
    if let Value::Object(map) = result {
        if let Some((key, val)) = map.iter().find(|(_, v)| !v.is_array() && !v.is_object()) {
            println!("{}: {}", key, scalar(val));
            return;
        }
    }
    println!("{}", scalar(result));
}
