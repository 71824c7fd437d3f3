use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;

/// Field holding the temporary identifier assigned by the cache.
pub const TEMP_ID_FIELD: &str = "cid";
/// Prefix reserved for temporary identifiers.
pub const TEMP_ID_PREFIX: char = 'c';
/// Field used as the permanent identity unless configured otherwise.
pub const DEFAULT_IDENTIFIER_FIELD: &str = "id";

/// Open mapping of field names to JSON values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Create a record without any fields.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value. Returns `None` unless the value is an object.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    /// Builder-style field assignment.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Read a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Overwrite a field, returning the previous value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    /// Remove a field, returning its value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    /// Borrow the underlying field map.
    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Unwrap into a JSON object value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Index key held by `field`, if that field carries an identity.
    #[must_use]
    pub fn key_of(&self, field: &str) -> Option<RecordKey> {
        self.get(field).and_then(RecordKey::from_value)
    }

    /// Temporary identifier, if one has been assigned.
    #[must_use]
    pub fn cid(&self) -> Option<RecordKey> {
        self.key_of(TEMP_ID_FIELD)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        record.into_value()
    }
}

/// Textual key under which a record is indexed.
///
/// Identifier values are normalised to text so that `1` and `"1"` address
/// the same entry. Keys that start with [`TEMP_ID_PREFIX`] followed by a
/// digit are temporary identifiers; everything else is permanent.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(String);

impl RecordKey {
    /// Key for the temporary identifier with the given numeric suffix.
    #[must_use]
    pub fn temporary(suffix: u64) -> Self {
        Self(format!("{TEMP_ID_PREFIX}{suffix}"))
    }

    /// Derive a key from an identifier value.
    ///
    /// Strings, numbers and booleans carry an identity; `null`, blank
    /// strings, arrays and objects do not.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) if !text.is_empty() => Some(Self(text.clone())),
            Value::Number(number) => Some(Self(render_number(number))),
            Value::Bool(flag) => Some(Self(flag.to_string())),
            _ => None,
        }
    }

    /// Whether the key lexically belongs to the temporary identifier space.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        let mut chars = self.0.chars();
        chars.next() == Some(TEMP_ID_PREFIX) && chars.next().is_some_and(|c| c.is_ascii_digit())
    }

    /// Borrow the key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// JSON value stored in a record field for this key.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::String(self.0.clone())
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordKey {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for RecordKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&String> for RecordKey {
    fn from(value: &String) -> Self {
        Self(value.clone())
    }
}

impl From<&Self> for RecordKey {
    fn from(value: &Self) -> Self {
        value.clone()
    }
}

macro_rules! integer_keys {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for RecordKey {
                fn from(value: $ty) -> Self {
                    Self(value.to_string())
                }
            }
        )*
    };
}

integer_keys!(i32, i64, u32, u64, usize);

/// Render a number the way it reads as an index key: integral values
/// without a fractional part.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn render_number(number: &Number) -> String {
    if let Some(int) = number.as_i64() {
        return int.to_string();
    }
    if let Some(uint) = number.as_u64() {
        return uint.to_string();
    }
    match number.as_f64() {
        Some(float) if float.fract() == 0.0 && float.abs() < 9_007_199_254_740_992.0 => {
            (float as i64).to_string()
        }
        _ => number.to_string(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_and_textual_identifiers_share_keys() {
        assert_eq!(RecordKey::from_value(&json!(1)), Some(RecordKey::from(1)));
        assert_eq!(RecordKey::from_value(&json!("1")), Some(RecordKey::from(1)));
        assert_eq!(RecordKey::from_value(&json!(4.0)), Some(RecordKey::from("4")));
        assert_eq!(RecordKey::from_value(&json!(2.5)).unwrap().as_str(), "2.5");
    }

    #[test]
    fn null_blank_and_compound_values_are_not_identities() {
        assert!(RecordKey::from_value(&json!(null)).is_none());
        assert!(RecordKey::from_value(&json!("")).is_none());
        assert!(RecordKey::from_value(&json!([1])).is_none());
        assert!(RecordKey::from_value(&json!({"id": 1})).is_none());
    }

    #[test]
    fn classifies_temporary_keys_by_shape() {
        assert!(RecordKey::temporary(0).is_temporary());
        assert!(RecordKey::from("c12").is_temporary());
        assert!(RecordKey::from("c3x").is_temporary());
        assert!(!RecordKey::from("cat").is_temporary());
        assert!(!RecordKey::from("c").is_temporary());
        assert!(!RecordKey::from(12).is_temporary());
    }

    #[test]
    fn record_reads_identity_fields() {
        let record = Record::from_value(json!({"thing_id": 7, "cid": "c2", "name": "Q"}))
            .expect("object");
        assert_eq!(record.key_of("thing_id"), Some(RecordKey::from(7)));
        assert_eq!(record.cid(), Some(RecordKey::temporary(2)));
        assert!(record.key_of("id").is_none());
    }

    #[test]
    fn from_value_rejects_non_objects() {
        assert!(Record::from_value(json!([1, 2])).is_none());
        assert!(Record::from_value(json!("record")).is_none());
    }
}
