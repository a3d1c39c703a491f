//! # fhir-dateshift
//!
//! Schema-driven calendar-year shifting for FHIR test fixtures.
//!
//! Measure test bundles age: a fixture authored against the 2020 measurement
//! period needs its clinical dates moved forward wholesale to stay inside a
//! later period. This crate walks a FHIR resource (as JSON) and shifts the
//! year component of every date-bearing property, recursing through complex
//! elements, lists, contained resources, and bundle entries.
//!
//! The walk is driven by a declarative [`Schema`]: a table mapping each type
//! name to its base type and its `(property, kind)` pairs. A type's
//! effective property set is the union across its base lineage, so
//! properties inherited from `Resource` and `DomainResource` are covered
//! without any runtime reflection.
//!
//! ## Guarantees
//!
//! - **In place**: resources are mutated directly.
//! - **Reversible**: year arithmetic is textual on the leading 4-digit
//!   year, so shifting by `-k` undoes shifting by `k` bit for bit.
//! - **Null-safe**: absent values, explicit nulls, and extension-only
//!   elements are skipped silently; partially populated nodes are a
//!   legitimate state, not an error.
//!
//! ## Quick Start
//!
//! ```rust
//! use fhir_dateshift::{shift_years, Schema};
//! use serde_json::json;
//!
//! let schema = Schema::fhir();
//! let mut bundle = json!({
//!     "resourceType": "Bundle",
//!     "entry": [
//!         { "resource": { "resourceType": "Patient", "birthDate": "1980-06-01" } }
//!     ]
//! });
//!
//! shift_years(&schema, &mut bundle, 5);
//! assert_eq!(bundle["entry"][0]["resource"]["birthDate"], "1985-06-01");
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod error;
mod schema;
mod shift;

pub use error::SchemaError;
pub use schema::{PropertyKind, Schema};
pub use shift::shift_years;
