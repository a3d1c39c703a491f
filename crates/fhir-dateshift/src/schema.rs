//! Declarative type schemas driving the date-shift traversal.
//!
//! Each schema entry maps a type name to an optional base type and a list of
//! `(property, kind)` pairs. A type's effective property set is the union
//! across its entire base lineage, which reproduces walking inherited
//! properties without any runtime reflection.

use std::collections::HashMap;

use crate::error::SchemaError;

/// How a declared property participates in the traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyKind {
    /// A date, dateTime, or instant leaf carrying a shiftable year.
    Date,
    /// A complex element of the named type; the walk recurses into it.
    Composite(String),
    /// A nested resource; the walk re-dispatches on its `resourceType`.
    Resource,
}

#[derive(Debug, Clone)]
struct TypeSpec {
    base: Option<String>,
    properties: Vec<(String, PropertyKind)>,
}

/// Registry of type schemas.
///
/// Comes with a built-in FHIR R4 table covering the resource types common in
/// measure test fixtures; callers can register further types, or start from
/// [`Schema::new`] with a fully custom table.
///
/// # Example
///
/// ```rust
/// use fhir_dateshift::{PropertyKind, Schema};
///
/// let mut schema = Schema::fhir();
/// schema
///     .register(
///         "CarePlan",
///         Some("DomainResource"),
///         vec![
///             ("created".to_string(), PropertyKind::Date),
///             ("period".to_string(), PropertyKind::Composite("Period".to_string())),
///         ],
///     )
///     .unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct Schema {
    types: HashMap<String, TypeSpec>,
}

impl Schema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the built-in FHIR R4 schema.
    pub fn fhir() -> Self {
        let mut schema = Self::new();
        for (name, base, properties) in fhir_table() {
            let properties = properties
                .into_iter()
                .map(|(prop, kind)| (prop.to_string(), kind))
                .collect();
            schema.insert(name.to_string(), base.map(str::to_string), properties);
        }
        schema
    }

    /// Registers a type, overwriting any existing entry with the same name.
    ///
    /// The base type, when given, must already be registered.
    pub fn register(
        &mut self,
        name: &str,
        base: Option<&str>,
        properties: Vec<(String, PropertyKind)>,
    ) -> Result<(), SchemaError> {
        if name.is_empty() {
            return Err(SchemaError::EmptyTypeName);
        }
        if let Some(base) = base {
            if !self.types.contains_key(base) {
                return Err(SchemaError::UnknownBaseType {
                    type_name: name.to_string(),
                    base: base.to_string(),
                });
            }
        }
        self.insert(name.to_string(), base.map(str::to_string), properties);
        Ok(())
    }

    /// Returns true when the schema knows the given type.
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Returns the effective properties of a type: its own plus every
    /// property inherited along the base lineage, own properties first.
    pub fn properties_of(&self, name: &str) -> Vec<(String, PropertyKind)> {
        let mut properties = Vec::new();
        let mut current = self.types.get(name);
        // Lineages are short chains; the hop cap guards against an
        // accidentally cyclic registration.
        let mut hops = 0;
        while let Some(spec) = current {
            properties.extend(spec.properties.iter().cloned());
            hops += 1;
            if hops > 32 {
                break;
            }
            current = spec.base.as_deref().and_then(|b| self.types.get(b));
        }
        properties
    }

    fn insert(&mut self, name: String, base: Option<String>, properties: Vec<(String, PropertyKind)>) {
        self.types.insert(name, TypeSpec { base, properties });
    }
}

fn date(prop: &'static str) -> (&'static str, PropertyKind) {
    (prop, PropertyKind::Date)
}

fn composite(prop: &'static str, type_name: &str) -> (&'static str, PropertyKind) {
    (prop, PropertyKind::Composite(type_name.to_string()))
}

type TableRow = (
    &'static str,
    Option<&'static str>,
    Vec<(&'static str, PropertyKind)>,
);

/// Built-in FHIR R4 table. Base types first so lineage lookups resolve.
fn fhir_table() -> Vec<TableRow> {
    vec![
        ("Meta", None, vec![date("lastUpdated")]),
        ("Period", None, vec![date("start"), date("end")]),
        (
            "Extension",
            None,
            vec![
                date("valueDate"),
                date("valueDateTime"),
                date("valueInstant"),
                composite("valuePeriod", "Period"),
            ],
        ),
        ("Resource", None, vec![composite("meta", "Meta")]),
        (
            "DomainResource",
            Some("Resource"),
            vec![
                ("contained", PropertyKind::Resource),
                composite("extension", "Extension"),
                composite("modifierExtension", "Extension"),
            ],
        ),
        (
            "Patient",
            Some("DomainResource"),
            vec![date("birthDate"), date("deceasedDateTime")],
        ),
        (
            "Encounter",
            Some("DomainResource"),
            vec![composite("period", "Period")],
        ),
        (
            "Condition",
            Some("DomainResource"),
            vec![
                date("onsetDateTime"),
                date("abatementDateTime"),
                date("recordedDate"),
                composite("onsetPeriod", "Period"),
            ],
        ),
        (
            "Observation",
            Some("DomainResource"),
            vec![
                date("effectiveDateTime"),
                date("issued"),
                composite("effectivePeriod", "Period"),
            ],
        ),
        (
            "Procedure",
            Some("DomainResource"),
            vec![
                date("performedDateTime"),
                composite("performedPeriod", "Period"),
            ],
        ),
        (
            "MedicationRequest",
            Some("DomainResource"),
            vec![date("authoredOn")],
        ),
        (
            "Immunization",
            Some("DomainResource"),
            vec![date("occurrenceDateTime"), date("recorded")],
        ),
        (
            "Coverage",
            Some("DomainResource"),
            vec![composite("period", "Period")],
        ),
        (
            "BundleEntry",
            None,
            vec![("resource", PropertyKind::Resource)],
        ),
        (
            "Bundle",
            Some("Resource"),
            vec![date("timestamp"), composite("entry", "BundleEntry")],
        ),
    ]
}
