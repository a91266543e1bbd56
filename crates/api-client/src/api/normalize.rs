//! Response normalization for heterogeneous upstream envelopes.
//!
//! Providers return either `{"confidence_score": ..., "data": {...}}` or
//! `{"confidence_score": ..., <fields...>}`; older sources send the payload
//! with no envelope at all. Normalizing here means every other component
//! sees one logical shape.

use super::types::Envelope;
use serde_json::Value;

/// Metadata key carried by both known envelope shapes.
pub const CONFIDENCE_KEY: &str = "confidence_score";

const DATA_KEY: &str = "data";

/// Classify a raw payload into exactly one envelope shape.
pub fn classify(raw: &Value) -> Envelope {
    match raw.as_object() {
        Some(map) if map.contains_key(CONFIDENCE_KEY) => {
            if map.contains_key(DATA_KEY) {
                Envelope::Wrapped
            } else {
                Envelope::Direct
            }
        }
        _ => Envelope::Bare,
    }
}

/// Extract the logical payload and confidence score from a raw payload.
///
/// Never fails on well-formed JSON; malformed bodies are rejected by the
/// HTTP layer before this point. Idempotent: a payload that has already
/// been normalized carries no `confidence_score` key and passes through
/// unchanged with confidence 1.0.
pub fn normalize(raw: Value) -> (Value, f64) {
    match raw {
        Value::Object(mut map) => {
            if !map.contains_key(CONFIDENCE_KEY) {
                return (Value::Object(map), 1.0);
            }

            let confidence = map
                .remove(CONFIDENCE_KEY)
                .as_ref()
                .and_then(Value::as_f64)
                .map_or(1.0, |score| score.clamp(0.0, 1.0));

            match map.remove(DATA_KEY) {
                Some(data) => (data, confidence),
                None => (Value::Object(map), confidence),
            }
        }
        other => (other, 1.0),
    }
}
