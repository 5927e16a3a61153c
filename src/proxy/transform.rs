//! Per-route reshaping of HAL+JSON responses.
//!
//! Shaping is opt-in: a route without a `transform` relays the upstream body as-is.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseTransform {
    #[default]
    Passthrough,
    /// `_embedded[rel]`, or `[]` when the relation is absent.
    Embedded { rel: String },
    /// Items of `_embedded[rel]` whose `field` equals `equals`.
    FilterEmbedded {
        rel: String,
        field: String,
        equals: Value,
    },
    /// The value at a JSON pointer (RFC 6901), or `null`.
    Pointer { pointer: String },
}

impl ResponseTransform {
    pub fn apply(&self, body: Value) -> Value {
        match self {
            ResponseTransform::Passthrough => body,
            ResponseTransform::Embedded { rel } => embedded(body, rel),
            ResponseTransform::FilterEmbedded { rel, field, equals } => match embedded(body, rel) {
                Value::Array(items) => Value::Array(
                    items
                        .into_iter()
                        .filter(|item| item.get(field) == Some(equals))
                        .collect(),
                ),
                other => other,
            },
            ResponseTransform::Pointer { pointer } => {
                body.pointer(pointer).cloned().unwrap_or(Value::Null)
            }
        }
    }
}

fn embedded(mut body: Value, rel: &str) -> Value {
    body.get_mut("_embedded")
        .and_then(|e| e.get_mut(rel))
        .map(Value::take)
        .unwrap_or_else(|| Value::Array(Vec::new()))
}
