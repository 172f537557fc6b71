//! The Serializer contract (spec.md §4.1): a total, type-directed mapping
//! between Rust values and the JSON tree carried on the wire.
//!
//! `serde` already gives us the record/list/optional/enum-by-name rules of
//! the wire-shape table for free, so this module only adds the two knobs
//! spec.md calls out as per-endpoint-family choices: whether unknown object
//! keys are an error, and a stable `SchemaError{expected, got, path}` shape
//! for reporting. "Enum serialized by its declared wire value" is handled
//! directly on the enum types via `#[serde(rename = "...")]`, not here.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::SchemaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownFields {
    Ignore,
    Reject,
}

/// A constructor-time choice of serializer behavior, shared by both ends of
/// one endpoint family (spec.md §4.1 "Ignorance mode").
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    pub unknown_fields: UnknownFields,
}

impl Default for Codec {
    fn default() -> Self {
        Self {
            unknown_fields: UnknownFields::Ignore,
        }
    }
}

impl Codec {
    pub fn strict() -> Self {
        Self {
            unknown_fields: UnknownFields::Reject,
        }
    }

    pub fn lenient() -> Self {
        Self::default()
    }

    pub fn encode<T: Serialize>(&self, value: &T) -> Value {
        serde_json::to_value(value).expect("wire DTOs must always serialize")
    }

    pub fn decode<T>(&self, raw: Value) -> Result<T, SchemaError>
    where
        T: Serialize + DeserializeOwned,
    {
        let type_name = std::any::type_name::<T>();
        let value: T = serde_json::from_value(raw.clone())
            .map_err(|e| SchemaError::new(type_name, raw.to_string(), e.to_string()))?;

        if self.unknown_fields == UnknownFields::Reject {
            if let (Value::Object(orig), Ok(Value::Object(round))) =
                (&raw, serde_json::to_value(&value).map(|v| v))
            {
                for key in orig.keys() {
                    if !round.contains_key(key) {
                        return Err(SchemaError::new(type_name, key.clone(), "<unknown field>"));
                    }
                }
            }
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn round_trip_is_lossless() {
        let codec = Codec::lenient();
        let p = Point { x: 1, y: 2 };
        let wire = codec.encode(&p);
        let back: Point = codec.decode(wire).unwrap();
        assert_eq!(p, back);
    }

    #[test]
    fn lenient_drops_unknown_fields() {
        let codec = Codec::lenient();
        let wire = serde_json::json!({"x": 1, "y": 2, "z": 3});
        let p: Point = codec.decode(wire).unwrap();
        assert_eq!(p, Point { x: 1, y: 2 });
    }

    #[test]
    fn strict_rejects_unknown_fields() {
        let codec = Codec::strict();
        let wire = serde_json::json!({"x": 1, "y": 2, "z": 3});
        let err = codec.decode::<Point>(wire).unwrap_err();
        assert_eq!(err.got, "z");
    }
}
