use serde_json::Value;

/// Print just the key answer value from the output.
pub fn print_minimal(value: &Value) {
    println!("{}", minimal_value(value));
}

/// Looks up well-known scalar fields in priority order, then falls back to
/// the first field in the result object.
fn minimal_value(value: &Value) -> String {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    // Risk-aversion results carry a scalar here; dashboards nest it, so the
    // tangency weight answers for them
    let priority_paths = ["/risk_aversion", "/portfolios/max_utility/tangency_weight"];

    for path in &priority_paths {
        if let Some(val) = result_obj.pointer(path) {
            if is_scalar(val) {
                return format_minimal(val);
            }
        }
    }

    if let Value::Object(map) = result_obj {
        if let Some((key, val)) = map.iter().next() {
            return format!("{}: {}", key, format_minimal(val));
        }
    }

    format_minimal(result_obj)
}

fn is_scalar(value: &Value) -> bool {
    !(value.is_null() || value.is_object() || value.is_array())
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
