//! Schema-checked decoding of JSON entry content.
//!
//! Content is first split into top-level fields as raw JSON. Field names are
//! checked against the record's schema before any value is typed, so an
//! unknown field is reported even when other fields are also bad.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ValidationError;

/// Opaque JSON metadata, preserved byte for byte and never interpreted.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawMetadata(Bytes);

impl RawMetadata {
    /// Wrap raw JSON text.
    pub fn from_raw_json(raw: &RawValue) -> Self {
        Self(Bytes::copy_from_slice(raw.get().as_bytes()))
    }

    /// Wrap bytes previously taken from [`RawMetadata::as_bytes`].
    pub fn from_bytes(bytes: Bytes) -> Self {
        Self(bytes)
    }

    /// Get the raw JSON bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The raw JSON text, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }
}

impl fmt::Debug for RawMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => write!(f, "RawMetadata({})", s),
            None => write!(f, "RawMetadata({} bytes)", self.0.len()),
        }
    }
}

/// A JSON object split into raw top-level fields.
pub(crate) struct ContentObject {
    fields: BTreeMap<String, Box<RawValue>>,
}

impl ContentObject {
    /// Parse content as a JSON object whose keys are all in `allowed`.
    pub(crate) fn parse(content: &[u8], allowed: &[&str]) -> Result<Self, ValidationError> {
        if content.is_empty() {
            return Err(ValidationError::MalformedContent("no content".into()));
        }

        let fields: BTreeMap<String, Box<RawValue>> = serde_json::from_slice(content)
            .map_err(|e| ValidationError::MalformedContent(e.to_string()))?;

        if let Some(field) = fields.keys().find(|k| !allowed.contains(&k.as_str())) {
            return Err(ValidationError::UnrecognizedField {
                field: field.clone(),
            });
        }

        Ok(Self { fields })
    }

    fn present(&self, field: &str) -> Option<&RawValue> {
        self.fields
            .get(field)
            .map(|raw| raw.as_ref())
            .filter(|raw| raw.get().trim() != "null")
    }

    /// Decode a field that must be present.
    pub(crate) fn required<T: DeserializeOwned>(
        &self,
        field: &'static str,
        expected: &'static str,
    ) -> Result<T, ValidationError> {
        match self.fields.get(field) {
            Some(raw) => decode_field(raw, field, expected),
            None => Err(ValidationError::MissingField { field }),
        }
    }

    /// Decode a field that may be absent or null.
    pub(crate) fn optional<T: DeserializeOwned>(
        &self,
        field: &'static str,
        expected: &'static str,
    ) -> Result<Option<T>, ValidationError> {
        self.present(field)
            .map(|raw| decode_field(raw, field, expected))
            .transpose()
    }

    /// Keep a field as opaque JSON.
    pub(crate) fn raw(&self, field: &str) -> Option<RawMetadata> {
        self.present(field).map(RawMetadata::from_raw_json)
    }
}

fn decode_field<T: DeserializeOwned>(
    raw: &RawValue,
    field: &'static str,
    expected: &'static str,
) -> Result<T, ValidationError> {
    serde_json::from_str(raw.get()).map_err(|_| ValidationError::InvalidFieldType { field, expected })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: &[&str] = &["a", "b", "metadata"];

    #[test]
    fn test_rejects_unknown_field() {
        let err = ContentObject::parse(br#"{"a":1,"zzz":2}"#, FIELDS)
            .err()
            .unwrap();
        assert_eq!(
            err,
            ValidationError::UnrecognizedField {
                field: "zzz".into()
            }
        );
    }

    #[test]
    fn test_rejects_non_object() {
        for content in [&b""[..], b"[1,2]", b"42", b"{not json"] {
            assert!(matches!(
                ContentObject::parse(content, FIELDS),
                Err(ValidationError::MalformedContent(_))
            ));
        }
    }

    #[test]
    fn test_typed_fields() {
        let obj = ContentObject::parse(br#"{"a":7,"b":null}"#, FIELDS).unwrap();
        assert_eq!(obj.required::<u64>("a", "integer").unwrap(), 7);
        assert_eq!(obj.optional::<String>("b", "string").unwrap(), None);
        assert_eq!(
            obj.required::<String>("a", "string"),
            Err(ValidationError::InvalidFieldType {
                field: "a",
                expected: "string"
            })
        );
        assert_eq!(
            obj.required::<u64>("metadata", "integer"),
            Err(ValidationError::MissingField { field: "metadata" })
        );
    }

    #[test]
    fn test_metadata_preserved_verbatim() {
        let obj = ContentObject::parse(br#"{"metadata":{"z": [1, 2],"a":"x"}}"#, FIELDS).unwrap();
        let meta = obj.raw("metadata").unwrap();
        assert_eq!(meta.as_str(), Some(r#"{"z": [1, 2],"a":"x"}"#));
        assert!(obj.raw("a").is_none());
    }
}
