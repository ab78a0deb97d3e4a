//! JSON to DynamoDB attribute value encoding
//!
//! Records arrive as plain JSON and leave as typed [`AttributeValue`]s. The
//! encoding is kind-dispatched over [`serde_json::Value`]:
//!
//! | JSON            | Attribute |
//! |-----------------|-----------|
//! | string          | `S`       |
//! | boolean         | `BOOL`    |
//! | number          | `N` (exact source text) |
//! | null            | `NULL`    |
//! | array           | `L`       |
//! | object          | `M`, unless already encoded |
//!
//! An object carrying any of the tags `S`, `N`, `B`, `BOOL`, `NULL`, `M`, `L`
//! is taken to be in DynamoDB JSON form already and is passed through, so
//! partially encoded input can be fed through the encoder safely.

use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Number, Value};

use crate::store::Item;

/// Tags that mark an object as already encoded
pub const ENCODED_TAGS: [&str; 7] = ["S", "N", "B", "BOOL", "NULL", "M", "L"];

/// Encode a JSON value as a DynamoDB attribute value
///
/// Never fails. A tagged object that cannot be decoded (several keys, a
/// payload of the wrong kind, invalid base64) is stored as `S` holding its
/// compact JSON text.
///
/// # Example
///
/// ```
/// use aws_sdk_dynamodb::types::AttributeValue;
/// use dynamo_transfer::encode::encode;
/// use serde_json::json;
///
/// assert_eq!(encode(&json!("abc")), AttributeValue::S("abc".into()));
/// assert_eq!(encode(&json!({"N": "42"})), AttributeValue::N("42".into()));
/// ```
pub fn encode(value: &Value) -> AttributeValue {
    match value {
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::Null => AttributeValue::Null(true),
        Value::Array(values) => AttributeValue::L(values.iter().map(encode).collect()),
        Value::Object(fields) if is_encoded(fields) => {
            decode_tagged(fields).unwrap_or_else(|| AttributeValue::S(value.to_string()))
        }
        Value::Object(fields) => AttributeValue::M(encode_item(fields)),
    }
}

/// Encode every field of a JSON record
pub fn encode_item(record: &Map<String, Value>) -> Item {
    record
        .iter()
        .map(|(name, value)| (name.clone(), encode(value)))
        .collect()
}

/// Whether the object already looks like an encoded attribute value
pub fn is_encoded(fields: &Map<String, Value>) -> bool {
    fields.keys().any(|key| ENCODED_TAGS.contains(&key.as_str()))
}

fn decode_tagged(fields: &Map<String, Value>) -> Option<AttributeValue> {
    if fields.len() != 1 {
        return None;
    }

    let (tag, payload) = fields.iter().next()?;

    match (tag.as_str(), payload) {
        ("S", Value::String(s)) => Some(AttributeValue::S(s.clone())),
        ("N", Value::String(s)) => s
            .parse::<Number>()
            .ok()
            .map(|_| AttributeValue::N(s.clone())),
        ("N", Value::Number(n)) => Some(AttributeValue::N(n.to_string())),
        ("BOOL", Value::Bool(b)) => Some(AttributeValue::Bool(*b)),
        ("NULL", _) => Some(AttributeValue::Null(true)),
        ("B", Value::String(s)) => STANDARD
            .decode(s)
            .ok()
            .map(|bytes| AttributeValue::B(Blob::new(bytes))),
        ("L", Value::Array(values)) => Some(AttributeValue::L(values.iter().map(encode).collect())),
        ("M", Value::Object(members)) => Some(AttributeValue::M(encode_item(members))),
        _ => None,
    }
}

/// Render an attribute value in DynamoDB JSON form
///
/// Feeding the result back through [`encode`] yields the same value.
pub fn to_json(value: &AttributeValue) -> Value {
    let (tag, payload) = match value {
        AttributeValue::S(s) => ("S", Value::String(s.clone())),
        AttributeValue::N(n) => ("N", Value::String(n.clone())),
        AttributeValue::Bool(b) => ("BOOL", Value::Bool(*b)),
        AttributeValue::Null(b) => ("NULL", Value::Bool(*b)),
        AttributeValue::B(blob) => ("B", Value::String(STANDARD.encode(blob.as_ref()))),
        AttributeValue::L(values) => ("L", Value::Array(values.iter().map(to_json).collect())),
        AttributeValue::M(members) => ("M", item_to_json(members)),
        AttributeValue::Ss(values) => (
            "SS",
            Value::Array(values.iter().cloned().map(Value::String).collect()),
        ),
        AttributeValue::Ns(values) => (
            "NS",
            Value::Array(values.iter().cloned().map(Value::String).collect()),
        ),
        AttributeValue::Bs(values) => (
            "BS",
            Value::Array(
                values
                    .iter()
                    .map(|blob| Value::String(STANDARD.encode(blob.as_ref())))
                    .collect(),
            ),
        ),
        // Variants added by newer service models
        _ => ("NULL", Value::Bool(true)),
    };

    Value::Object([(tag.to_string(), payload)].into_iter().collect())
}

/// Render a whole item as a JSON object of DynamoDB JSON values
pub fn item_to_json(item: &Item) -> Value {
    Value::Object(
        item.iter()
            .map(|(name, value)| (name.clone(), to_json(value)))
            .collect(),
    )
}
