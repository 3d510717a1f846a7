//! Dynamic record representation.
//!
//! Records differ in shape per object and per org, so they are carried as
//! untyped JSON objects rather than generated structs. `serde_json::Value`
//! already draws the line between `null` and "key absent" that the spec
//! requires, so there is no need for a bespoke sum type.

use serde_json::Value;

/// A single source or target record: field name -> value.
pub type Record = serde_json::Map<String, Value>;

/// Returns the value of `field` in `record`, or `None` if the field is
/// absent. A present `null` is returned as `Some(&Value::Null)`.
pub fn field<'a>(record: &'a Record, field: &str) -> Option<&'a Value> {
    record.get(field)
}

/// True if `record` has `field` present and non-null.
pub fn has_non_null(record: &Record, field: &str) -> bool {
    matches!(record.get(field), Some(v) if !v.is_null())
}

/// Extracts the `Id` field of a record as a string, if present.
pub fn id_of(record: &Record) -> Option<String> {
    record.get("Id").and_then(Value::as_str).map(str::to_owned)
}
