//! # cql-manifest
//!
//! Terminology dependency extraction and manifest assembly for CQL measure
//! libraries.
//!
//! This crate turns one CQL document (plus optionally the manifests of
//! previously published dependencies) into a canonical, deduplicated,
//! deterministically ordered dependency manifest ready for embedding into a
//! publishable document.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        cql-manifest                          │
//! │                                                              │
//! │  DependencyExtractor                                         │
//! │  ├── parse source → TreeNode            (cql-tree)           │
//! │  ├── collect definitions                (one DFS pass)       │
//! │  ├── classify retrieves by shape        (second pass)        │
//! │  └── aggregate artifacts + catalog      (pure mapping)       │
//! │                                                              │
//! │  ManifestAssembler                                           │
//! │  ├── merge primary + prior manifests                         │
//! │  ├── dedup by key, first occurrence wins                     │
//! │  └── sort artifacts by URI → CanonicalManifest               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ordering Guarantees
//!
//! | Output | Duplicates | Order |
//! |--------|-----------|-------|
//! | Related artifacts | full structural equality | ascending by URI |
//! | Data requirements | `(type, path, referent identity)` | first occurrence |
//!
//! ## Quick Start
//!
//! ```rust
//! use cql_manifest::{DependencyExtractor, ManifestAssembler};
//!
//! let extractor = DependencyExtractor::new();
//! let extraction = extractor
//!     .extract(
//!         "library Demo version '1.0.0'\n\
//!          valueset \"Inpatient\": 'urn:oid:1.2.3'\n\
//!          define \"Encounters\": [Encounter: \"Inpatient\"]",
//!     )
//!     .unwrap();
//!
//! let manifest = ManifestAssembler::new().with_primary(&extraction).assemble();
//! assert_eq!(manifest.artifact_count(), 1);
//! assert_eq!(manifest.data_requirements[0].resource_type, "Encounter");
//! ```
//!
//! ## Error Model
//!
//! Only syntax errors from the parser propagate. Constructs the extractor
//! does not interpret — aliased includes, derived retrieves, unresolved
//! referents — are skipped and reported as [`Diagnostic`] values (and as
//! `tracing` events); extraction always completes, and an empty manifest is
//! a valid result.
//!
//! ## Feature Flags
//!
//! - `parallel` - Enables batch extraction across a rayon thread pool

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod artifacts;
mod assembler;
mod classifier;
mod config;
mod definitions;
mod diagnostics;
mod error;
mod extractor;
mod requirement;

// Public re-exports
pub use artifacts::{
    CodeSummary, RelatedArtifact, RelationKind, TerminologyCatalog, ValueSetSummary,
};
pub use assembler::{CanonicalManifest, ManifestAssembler};
pub use config::{ExtractorConfig, ExtractorConfigBuilder};
pub use definitions::{
    CodeDefinition, CodeSystemDefinition, CollectedDefinitions, InclusionReference,
    LibraryIdentity, ValueSetDefinition,
};
pub use diagnostics::{Diagnostic, Severity};
pub use error::{ManifestError, ManifestResult};
pub use extractor::{DependencyExtractor, ExtractionStats, LibraryExtraction};
pub use requirement::{
    CodeReference, DataRequirement, Referent, RequirementFilter, RequirementKey,
    ValueSetReference,
};

// Re-export the parse tree types for callers that walk trees themselves.
pub use cql_tree::{parse, NodeKind, TreeNode};
