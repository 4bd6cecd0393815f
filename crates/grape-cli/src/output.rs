//! Rendering query results as a table, JSON or CSV

use crate::config::OutputFormat;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use grape_core::{LabelId, Oid, VertexValue};
use serde::Serialize;
use serde_json::Value;

/// One result line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    /// Original id
    pub oid: Oid,
    /// Vertex label
    pub label: LabelId,
    /// App-specific value
    pub value: Value,
}

impl ResultRow {
    /// Row for an unsigned or signed integer value
    pub fn from_int<T: Into<i128> + Copy>(v: &VertexValue<T>) -> Self {
        let value: i128 = v.value.into();
        let value = i64::try_from(value)
            .map(Value::from)
            .or_else(|_| u64::try_from(value).map(Value::from))
            .unwrap_or_else(|_| Value::String(value.to_string()));
        Self {
            oid: v.oid,
            label: v.label,
            value,
        }
    }

    /// Row for a float value; non-finite values become strings
    pub fn from_float(v: &VertexValue<f64>) -> Self {
        let value = serde_json::Number::from_f64(v.value)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(float_label(v.value)));
        Self {
            oid: v.oid,
            label: v.label,
            value,
        }
    }
}

fn float_label(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value > 0.0 {
        "inf".to_string()
    } else {
        "-inf".to_string()
    }
}

fn value_to_string(v: &Value) -> String {
    match v {
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render rows in the requested format
pub fn render(rows: &[ResultRow], format: OutputFormat) -> anyhow::Result<String> {
    let columns = ["oid", "label", "value"];
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(rows)?),
        OutputFormat::Csv => {
            let mut out = columns.join(",");
            out.push('\n');
            for row in rows {
                out.push_str(&format!(
                    "{},{},{}\n",
                    row.oid,
                    row.label,
                    value_to_string(&row.value)
                ));
            }
            Ok(out)
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(columns);
            for row in rows {
                table.add_row(vec![
                    row.oid.to_string(),
                    row.label.to_string(),
                    value_to_string(&row.value),
                ]);
            }
            Ok(table.to_string())
        }
    }
}
