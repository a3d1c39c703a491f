//! Data requirement records produced by the retrieve classifier.

use serde::{Deserialize, Serialize};

/// Reference to a value set, resolved from a retrieve's referent name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSetReference {
    /// Local name the document used for the value set.
    pub name: String,
    /// Canonical value set URI.
    pub uri: String,
    /// Explicit version, when the declaration carried one.
    pub version: Option<String>,
}

/// Reference to a directly declared code, resolved from a retrieve's
/// referent name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeReference {
    /// Local name the document used for the code.
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

/// What a retrieve's filter points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Referent {
    /// A value set binding.
    ValueSet(ValueSetReference),
    /// A direct code binding.
    Code(CodeReference),
}

/// Terminology filter on a data requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementFilter {
    /// Element path the filter applies to. Code-filtered retrieves carry the
    /// implicit path `code`.
    pub path: String,
    /// The resolved terminology reference.
    pub referent: Referent,
}

/// One classified retrieve: a clinical data type plus an optional
/// terminology filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRequirement {
    /// The retrieved resource type.
    pub resource_type: String,
    /// Terminology filter; `None` for type-only retrieves.
    pub filter: Option<RequirementFilter>,
}

impl DataRequirement {
    /// Creates a type-only requirement.
    pub fn type_only(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            filter: None,
        }
    }

    /// Creates a filtered requirement.
    pub fn filtered(
        resource_type: impl Into<String>,
        path: impl Into<String>,
        referent: Referent,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            filter: Some(RequirementFilter {
                path: path.into(),
                referent,
            }),
        }
    }

    /// Identity used for duplicate detection during assembly.
    ///
    /// Two requirements are duplicates when the resource type matches and
    /// their filters match: both absent, or both present with the same path
    /// and the same referent identity (value set URI, or code value). This
    /// is deliberately narrower than full structural equality; two retrieves
    /// with the same semantic shape are duplicates even when declaration
    /// details such as display text differ.
    pub fn dedup_key(&self) -> RequirementKey {
        RequirementKey {
            resource_type: self.resource_type.clone(),
            filter: self.filter.as_ref().map(|f| {
                let identity = match &f.referent {
                    Referent::ValueSet(vs) => FilterIdentity::ValueSetUri(vs.uri.clone()),
                    Referent::Code(code) => FilterIdentity::CodeValue(code.code.clone()),
                };
                (f.path.clone(), identity)
            }),
        }
    }
}

/// Hashable duplicate-detection key for a [`DataRequirement`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequirementKey {
    resource_type: String,
    filter: Option<(String, FilterIdentity)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum FilterIdentity {
    ValueSetUri(String),
    CodeValue(String),
}
