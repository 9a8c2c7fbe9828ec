use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};

use super::{Dataset, RawRow, Scalar};

const WRAPPER_KEYS: &[&str] = &["data", "rows", "records"];

/// Decode a JSON upload: either a top-level array of objects or an object
/// wrapping one under `data`, `rows` or `records`.
pub fn decode_json(name: &str, bytes: &[u8]) -> Result<Dataset> {
    let root: Value =
        serde_json::from_slice(bytes).with_context(|| format!("parsing JSON in {}", name))?;

    let items = match &root {
        Value::Array(items) => items,
        Value::Object(obj) => match WRAPPER_KEYS
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_array))
        {
            Some(items) => items,
            None => bail!(
                "`{}` is a JSON object without a data/rows/records array",
                name
            ),
        },
        _ => bail!("`{}` must contain an array of records", name),
    };

    let mut objects: Vec<&Map<String, Value>> = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        match item.as_object() {
            Some(obj) => objects.push(obj),
            None => bail!("record {} in `{}` is not an object", idx, name),
        }
    }

    // union of keys in first-seen order
    let mut headers: Vec<String> = Vec::new();
    for obj in &objects {
        for key in obj.keys() {
            if !headers.iter().any(|h| h == key) {
                headers.push(key.clone());
            }
        }
    }

    let rows = objects
        .iter()
        .map(|obj| {
            RawRow(
                headers
                    .iter()
                    .map(|h| obj.get(h).map(value_to_scalar).unwrap_or_default())
                    .collect(),
            )
        })
        .collect();

    Ok(Dataset::new(name, headers, rows))
}

fn value_to_scalar(value: &Value) -> Scalar {
    match value {
        Value::Null => Scalar::Empty,
        Value::Bool(b) => Scalar::Bool(*b),
        Value::Number(n) => n.as_f64().map(Scalar::Number).unwrap_or_default(),
        Value::String(s) => Scalar::from_text(s),
        nested => Scalar::Text(nested.to_string()),
    }
}
