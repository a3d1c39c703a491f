//! Related artifacts and the terminology catalog.
//!
//! The aggregation stage is a pure mapping: every declaration becomes one
//! depends-on artifact (textual duplicates included — they collapse at
//! assembly), and every classified requirement feeds the catalog used by the
//! human-readable rendering side channel.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::ExtractorConfig;
use crate::definitions::CollectedDefinitions;
use crate::requirement::{DataRequirement, Referent};

/// Relation carried by a related artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    /// The document depends on the referenced artifact.
    DependsOn,
}

/// A dependency declaration destined for the published document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelatedArtifact {
    /// Relation tag; always depends-on for harvested dependencies.
    pub relation: RelationKind,
    /// Canonical URI of the dependency.
    pub uri: String,
}

impl RelatedArtifact {
    /// Creates a depends-on artifact for the given URI.
    pub fn depends_on(uri: impl Into<String>) -> Self {
        Self {
            relation: RelationKind::DependsOn,
            uri: uri.into(),
        }
    }
}

/// Value set entry in the terminology catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSetSummary {
    /// Local name the document used.
    pub name: String,
    /// Canonical value set URI.
    pub uri: String,
    /// Explicit version, when declared.
    pub version: Option<String>,
}

/// Code entry in the terminology catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSummary {
    /// Local name the document used.
    pub name: String,
    /// The coded value.
    pub code: String,
    /// Display text, when declared.
    pub display: Option<String>,
    /// Local name of the code's system.
    pub system_name: String,
    /// Canonical URI of the code's system.
    pub system_uri: String,
    /// Code system version, when declared.
    pub system_version: Option<String>,
}

/// Terminology referenced by a document's classified retrieves.
///
/// This feeds human-readable rendering, not the published document itself.
/// Entries are sets: value sets are keyed by `(uri, version)` and codes by
/// `(code, system_uri)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TerminologyCatalog {
    /// Distinct value sets, in first-reference order.
    pub value_sets: Vec<ValueSetSummary>,
    /// Distinct codes, in first-reference order.
    pub codes: Vec<CodeSummary>,
}

impl TerminologyCatalog {
    /// Looks up a value set summary by local name.
    pub fn value_set_by_name(&self, name: &str) -> Option<&ValueSetSummary> {
        self.value_sets.iter().find(|vs| vs.name == name)
    }

    /// Looks up a code summary by local name.
    pub fn code_by_name(&self, name: &str) -> Option<&CodeSummary> {
        self.codes.iter().find(|c| c.name == name)
    }

    /// Returns true when the catalog holds no entries.
    pub fn is_empty(&self) -> bool {
        self.value_sets.is_empty() && self.codes.is_empty()
    }
}

/// Maps collected definitions and classified requirements to related
/// artifacts and the terminology catalog.
pub(crate) fn aggregate(
    defs: &CollectedDefinitions,
    requirements: &[DataRequirement],
    config: &ExtractorConfig,
) -> (Vec<RelatedArtifact>, TerminologyCatalog) {
    let mut artifacts = Vec::new();

    for vs in defs.value_set_declarations() {
        artifacts.push(RelatedArtifact::depends_on(vs.uri.clone()));
    }
    for code in defs.code_declarations() {
        artifacts.push(RelatedArtifact::depends_on(versioned_uri(
            &code.system.system_uri,
            code.system.version_uri.as_deref(),
        )));
    }
    for system in defs.code_system_declarations() {
        artifacts.push(RelatedArtifact::depends_on(versioned_uri(
            &system.system_uri,
            system.version_uri.as_deref(),
        )));
    }
    for inclusion in defs.inclusions() {
        artifacts.push(RelatedArtifact::depends_on(format!(
            "{}/{}|{}",
            config.library_base(),
            inclusion.referenced_name,
            inclusion.referenced_version
        )));
    }

    (artifacts, build_catalog(requirements))
}

/// Appends `|version` only when a version was declared.
fn versioned_uri(uri: &str, version: Option<&str>) -> String {
    match version {
        Some(version) => format!("{uri}|{version}"),
        None => uri.to_string(),
    }
}

fn build_catalog(requirements: &[DataRequirement]) -> TerminologyCatalog {
    let mut catalog = TerminologyCatalog::default();
    let mut seen_value_sets: HashSet<(String, Option<String>)> = HashSet::new();
    let mut seen_codes: HashSet<(String, String)> = HashSet::new();

    for requirement in requirements {
        let Some(filter) = &requirement.filter else {
            continue;
        };
        match &filter.referent {
            Referent::ValueSet(vs) => {
                if seen_value_sets.insert((vs.uri.clone(), vs.version.clone())) {
                    catalog.value_sets.push(ValueSetSummary {
                        name: vs.name.clone(),
                        uri: vs.uri.clone(),
                        version: vs.version.clone(),
                    });
                }
            }
            Referent::Code(code) => {
                if seen_codes.insert((code.code.clone(), code.system_uri.clone())) {
                    catalog.codes.push(CodeSummary {
                        name: code.name.clone(),
                        code: code.code.clone(),
                        display: code.display.clone(),
                        system_name: code.system_name.clone(),
                        system_uri: code.system_uri.clone(),
                        system_version: code.system_version.clone(),
                    });
                }
            }
        }
    }

    catalog
}
