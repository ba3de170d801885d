use serde_json::Value;
use std::io;

/// Write output as CSV to stdout.
///
/// Dashboard results are written as one row per chart point so the plot can be
/// redrawn elsewhere; other results become `field,value` pairs.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    match value {
        Value::Object(map) => match map.get("result") {
            Some(result) if result.pointer("/chart/series").is_some() => {
                write_chart_csv(&mut wtr, result);
            }
            Some(Value::Object(result)) => {
                let _ = wtr.write_record(["field", "value"]);
                for (key, val) in result {
                    let _ = wtr.write_record([key.as_str(), &format_csv_value(val)]);
                }
            }
            _ => {
                let _ = wtr.write_record(["field", "value"]);
                for (key, val) in map {
                    let _ = wtr.write_record([key.as_str(), &format_csv_value(val)]);
                }
            }
        },
        Value::Array(arr) => write_array_csv(&mut wtr, arr),
        _ => {
            let _ = wtr.write_record([&format_csv_value(value)]);
        }
    }

    let _ = wtr.flush();
}

fn write_chart_csv<W: io::Write>(wtr: &mut csv::Writer<W>, result: &Value) {
    let _ = wtr.write_record(["series", "x", "y", "label"]);
    let series = match result.pointer("/chart/series") {
        Some(Value::Array(s)) => s,
        _ => return,
    };
    for s in series {
        let name = s.get("name").map(format_csv_value).unwrap_or_default();
        if let Some(Value::Array(points)) = s.get("points") {
            for p in points {
                let _ = wtr.write_record([
                    name.as_str(),
                    &p.get("x").map(format_csv_value).unwrap_or_default(),
                    &p.get("y").map(format_csv_value).unwrap_or_default(),
                    &p.get("label").map(format_csv_value).unwrap_or_default(),
                ]);
            }
        }
    }
}

fn write_array_csv<W: io::Write>(wtr: &mut csv::Writer<W>, arr: &[Value]) {
    if arr.is_empty() {
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
        let _ = wtr.write_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(*h).map(format_csv_value).unwrap_or_default())
                    .collect();
                let _ = wtr.write_record(&row);
            }
        }
    } else {
        for item in arr {
            let _ = wtr.write_record([&format_csv_value(item)]);
        }
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
