//! MongoDB extended JSON helpers.
//!
//! Output is always canonical (type-preserving) extended JSON, e.g. integers
//! become `{"$numberInt": "1"}`. Input may be canonical or relaxed.

use bson::Bson;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtJsonError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid extended JSON: {0}")]
    ExtJson(#[from] bson::extjson::de::Error),
    #[error("failed to encode BSON: {0}")]
    Encode(#[from] bson::ser::Error),
    #[error("failed to decode BSON: {0}")]
    Decode(#[from] bson::de::Error),
}

/// Serialize `value` as canonical extended JSON
pub fn to_canonical_value<T: Serialize>(value: &T) -> Result<serde_json::Value, ExtJsonError> {
    Ok(bson::to_bson(value)?.into_canonical_extjson())
}

pub fn to_canonical_string<T: Serialize>(value: &T) -> Result<String, ExtJsonError> {
    Ok(serde_json::to_string(&to_canonical_value(value)?)?)
}

/// Canonical extended JSON, indented by two spaces
pub fn to_canonical_string_pretty<T: Serialize>(value: &T) -> Result<String, ExtJsonError> {
    Ok(serde_json::to_string_pretty(&to_canonical_value(value)?)?)
}

/// Parse extended JSON text into BSON
pub fn parse(text: &str) -> Result<Bson, ExtJsonError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    Ok(Bson::try_from(value)?)
}

/// Parse extended JSON text straight into `T`
pub fn from_str<T: DeserializeOwned>(text: &str) -> Result<T, ExtJsonError> {
    Ok(bson::from_bson(parse(text)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_numbers_are_canonical() {
        let text = to_canonical_string(&doc! { "version": 1_i32, "big": 5_000_000_000_i64 })
            .unwrap();
        assert_eq!(
            text,
            r#"{"version":{"$numberInt":"1"},"big":{"$numberLong":"5000000000"}}"#
        );
    }

    #[test]
    fn test_parse_accepts_relaxed_and_canonical() {
        let relaxed = parse(r#"{"version": 1}"#).unwrap();
        let canonical = parse(r#"{"version": {"$numberInt": "1"}}"#).unwrap();
        assert_eq!(relaxed, canonical);
        assert_eq!(relaxed, Bson::Document(doc! { "version": 1_i32 }));
    }

    #[test]
    fn test_dates_round_trip() {
        let now = bson::DateTime::from_millis(1_700_000_000_000);
        let text = to_canonical_string(&doc! { "lastUsed": now }).unwrap();
        assert!(text.contains(r#""$date":{"$numberLong":"1700000000000"}"#));
        assert_eq!(parse(&text).unwrap(), Bson::Document(doc! { "lastUsed": now }));
    }

    #[test]
    fn test_invalid_text_is_json_error() {
        assert!(matches!(parse("{not json"), Err(ExtJsonError::Json(_))));
        assert!(matches!(parse(""), Err(ExtJsonError::Json(_))));
    }
}
