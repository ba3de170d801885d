use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

/// Format output as tables using the tabled crate.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(result) = map.get("result") {
                print_result_tables(result, map);
            } else {
                print_field_table(&flatten(value));
            }
        }
        Value::Array(arr) => print_array_table(arr),
        _ => println!("{}", value),
    }
}

fn print_result_tables(result: &Value, envelope: &Map<String, Value>) {
    print_field_table(&flatten(result));

    // Per-lottery breakdown and the frontier sweep get their own tables
    if let Some(Value::Array(scores)) = find(result, &["lottery_scores"])
        .or_else(|| find(result, &["risk_aversion", "lottery_scores"]))
    {
        println!("\nLottery scores:");
        print_array_table(scores);
    }
    if let Some(Value::Array(points)) = find(result, &["portfolios", "frontier", "points"]) {
        println!("\nEfficient frontier ({} points):", points.len());
        let rows: Vec<Value> = points
            .iter()
            .map(|p| {
                serde_json::json!({
                    "target_volatility": p.get("target_volatility").cloned().unwrap_or(Value::Null),
                    "volatility": p.get("volatility").cloned().unwrap_or(Value::Null),
                    "expected_return": p.get("expected_return").cloned().unwrap_or(Value::Null),
                    "sharpe_ratio": p.get("sharpe_ratio").cloned().unwrap_or(Value::Null),
                })
            })
            .collect();
        print_array_table(&rows);
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_field_table(rows: &[(String, String)]) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in rows {
        builder.push_record([key.as_str(), val.as_str()]);
    }
    println!("{}", Table::from(builder));
}

fn print_array_table(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<String> = first.keys().cloned().collect();
        let mut builder = Builder::default();
        builder.push_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(h.as_str()).map(format_value).unwrap_or_default())
                    .collect();
                builder.push_record(row);
            }
        }

        println!("{}", Table::from(builder));
    } else {
        for item in arr {
            println!("{}", format_value(item));
        }
    }
}

/// Dotted `field -> value` rows. Arrays of objects collapse to a count; the
/// chart is left to the csv formatter.
fn flatten(value: &Value) -> Vec<(String, String)> {
    let mut rows = Vec::new();
    flatten_into("", value, &mut rows);
    rows
}

fn flatten_into(prefix: &str, value: &Value, rows: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, val) in map {
                if key == "chart" {
                    continue;
                }
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_into(&path, val, rows);
            }
        }
        Value::Array(arr) if arr.iter().any(Value::is_object) => {
            rows.push((prefix.to_string(), format!("[{} rows]", arr.len())));
        }
        _ => rows.push((prefix.to_string(), format_value(value))),
    }
}

fn find<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, key| v.get(*key))
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
