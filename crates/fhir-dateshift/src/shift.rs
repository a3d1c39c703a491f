//! The date-shift traversal.

use serde_json::Value;
use tracing::warn;

use crate::schema::{PropertyKind, Schema};

/// Recursion limit for the walk. The resource model is a finite tree, so
/// this only trips on malformed, unexpectedly cyclic input.
const MAX_DEPTH: usize = 128;

/// Shifts every date-bearing property of `resource` by `years`, in place.
///
/// The resource is dispatched on its `resourceType`; resources the schema
/// does not know are left untouched. Properties are the union across the
/// type's base lineage. Absent values, explicit nulls, and non-string values
/// (extension-only elements) are skipped silently — a partially populated
/// node is a legitimate state, not an error.
///
/// Year arithmetic is textual on the leading 4-digit year, so month, day,
/// time, and offset are preserved exactly and `shift_years(.., -k)` undoes
/// `shift_years(.., k)` bit for bit.
///
/// # Example
///
/// ```rust
/// use fhir_dateshift::{shift_years, Schema};
/// use serde_json::json;
///
/// let schema = Schema::fhir();
/// let mut patient = json!({ "resourceType": "Patient", "birthDate": "1980-06-01" });
/// shift_years(&schema, &mut patient, 5);
/// assert_eq!(patient["birthDate"], "1985-06-01");
/// ```
pub fn shift_years(schema: &Schema, resource: &mut Value, years: i32) {
    shift_resource(schema, resource, years, 0);
}

/// Dispatches a resource value on its `resourceType` property.
fn shift_resource(schema: &Schema, resource: &mut Value, years: i32, depth: usize) {
    let Some(type_name) = resource
        .get("resourceType")
        .and_then(Value::as_str)
        .map(str::to_owned)
    else {
        return;
    };
    shift_typed(schema, resource, &type_name, years, depth);
}

fn shift_typed(schema: &Schema, value: &mut Value, type_name: &str, years: i32, depth: usize) {
    if depth > MAX_DEPTH {
        warn!(type_name, "date shift aborted at depth limit; cyclic input?");
        return;
    }
    if !value.is_object() {
        return;
    }
    for (property, kind) in schema.properties_of(type_name) {
        if let Some(slot) = value.get_mut(&property) {
            apply(schema, slot, &kind, years, depth);
        }
    }
}

fn apply(schema: &Schema, slot: &mut Value, kind: &PropertyKind, years: i32, depth: usize) {
    match slot {
        Value::Array(items) => {
            for item in items {
                apply(schema, item, kind, years, depth);
            }
        }
        Value::Null => {}
        _ => match kind {
            PropertyKind::Date => {
                if let Value::String(text) = slot {
                    if let Some(shifted) = shift_year_component(text, years) {
                        *text = shifted;
                    }
                }
            }
            PropertyKind::Composite(type_name) => {
                shift_typed(schema, slot, type_name, years, depth + 1);
            }
            PropertyKind::Resource => {
                shift_resource(schema, slot, years, depth + 1);
            }
        },
    }
}

/// Adds `years` to the leading 4-digit year of a date-like string.
///
/// Returns `None` for values that do not start with a plausible year
/// (leaving them untouched) and for shifts that would leave `0000..=9999`.
fn shift_year_component(value: &str, years: i32) -> Option<String> {
    let bytes = value.as_bytes();
    if bytes.len() < 4 || !bytes[..4].iter().all(u8::is_ascii_digit) {
        return None;
    }
    // "2020", "2020-03", "2020-03-01T…" — anything else is not a date.
    if bytes.len() > 4 && bytes[4] != b'-' {
        return None;
    }

    let year: i32 = value[..4].parse().ok()?;
    let shifted = year.checked_add(years)?;
    if !(0..=9999).contains(&shifted) {
        return None;
    }
    Some(format!("{:04}{}", shifted, &value[4..]))
}
