//! Conversion between native attribute mappings and the API's
//! `{attrName, attrValue, attrType}` lists.

use crate::errors::ClientError;
use crate::models::{AttrType, AttrValue, LeadAttribute, OneOrMany};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Attribute as it arrives from the transport, before coercion.
#[derive(Debug, Deserialize)]
struct RawAttribute {
    #[serde(rename = "attrName")]
    name: String,
    #[serde(rename = "attrValue", default)]
    value: Value,
    #[serde(rename = "attrType", default)]
    declared_type: Option<AttrType>,
}

/// Encodes a native mapping into the attribute list, keeping input order.
///
/// Booleans must travel as `"1"`/`"0"` tagged `boolean`; every other value is
/// sent untyped so the remote side infers its type.
pub fn encode<I, K>(attributes: I) -> Vec<LeadAttribute>
where
    I: IntoIterator<Item = (K, AttrValue)>,
    K: Into<String>,
{
    attributes
        .into_iter()
        .map(|(name, value)| match value {
            AttrValue::Boolean(b) => LeadAttribute {
                name: name.into(),
                value: AttrValue::String(if b { "1" } else { "0" }.to_string()),
                declared_type: Some(AttrType::Boolean),
            },
            other => LeadAttribute {
                name: name.into(),
                value: other,
                declared_type: None,
            },
        })
        .collect()
}

/// Decodes an attribute list (or a lone attribute object) into a flat mapping.
///
/// List items that are not objects are skipped. Values declared `integer`, `string`, `boolean` or `float` are coerced to
/// that type; other declared types keep whatever the transport decoded.
/// Repeated names resolve to the last occurrence.
pub fn decode(raw: &Value) -> Result<BTreeMap<String, AttrValue>, ClientError> {
    if raw.is_null() {
        return Ok(BTreeMap::new());
    }

    let items = OneOrMany::<Value>::deserialize(raw)
        .map_err(|e| ClientError::MalformedReply(format!("invalid attribute list: {}", e)))?
        .into_vec();

    let mut flat = BTreeMap::new();
    for item in items.iter().filter(|item| item.is_object()) {
        let attribute = RawAttribute::deserialize(item)
            .map_err(|e| ClientError::MalformedReply(format!("invalid attribute: {}", e)))?;
        let value = match &attribute.declared_type {
            Some(ty) if ty.is_coercible() => coerce(&attribute.value, ty),
            _ => passthrough(&attribute.value),
        };
        flat.insert(attribute.name, value);
    }

    Ok(flat)
}

/// Converts a transported value to the declared scalar type.
pub fn coerce(value: &Value, ty: &AttrType) -> AttrValue {
    match ty {
        AttrType::Integer => AttrValue::Integer(to_integer(value)),
        AttrType::Float => AttrValue::Float(to_float(value)),
        AttrType::Boolean => AttrValue::Boolean(to_boolean(value)),
        AttrType::String => AttrValue::String(to_text(value)),
        AttrType::Other(_) => passthrough(value),
    }
}

fn passthrough(value: &Value) -> AttrValue {
    match value {
        Value::Null => AttrValue::Null,
        Value::Bool(b) => AttrValue::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => AttrValue::Integer(i),
            None => AttrValue::Float(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => AttrValue::String(s.clone()),
        other => AttrValue::String(other.to_string()),
    }
}

fn to_integer(value: &Value) -> i64 {
    match value {
        Value::Bool(b) => i64::from(*b),
        Value::Number(n) => n.as_i64().unwrap_or_else(|| n.as_f64().unwrap_or_default() as i64),
        Value::String(s) => {
            let prefix = numeric_prefix(s);
            prefix
                .parse::<i64>()
                .unwrap_or_else(|_| prefix.parse::<f64>().map(|f| f as i64).unwrap_or(0))
        }
        _ => 0,
    }
}

fn to_float(value: &Value) -> f64 {
    match value {
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64().unwrap_or_default(),
        Value::String(s) => numeric_prefix(s).parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn to_boolean(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => String::new(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Longest leading slice of `s` that reads as a decimal number
/// (`"12abc"` -> `"12"`, `" -3.5e2x"` -> `"-3.5e2"`).
fn numeric_prefix(s: &str) -> &str {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if digits > 0 || frac_end > frac_start {
            digits += frac_end - frac_start;
            end = frac_end;
        }
    }

    if digits == 0 {
        return "";
    }

    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    &s[..end]
}
