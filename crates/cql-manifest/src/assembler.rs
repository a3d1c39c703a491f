//! Manifest assembly: deduplication and canonical ordering.
//!
//! Duplicate detection is key-based set insertion, first occurrence wins.
//! Related artifacts dedup by full structural equality and are then sorted
//! ascending by URI; data requirements dedup by their narrower
//! [`dedup_key`](crate::DataRequirement::dedup_key) and keep
//! first-occurrence order. The asymmetry is deliberate: duplicate artifacts
//! come from textually repeated declarations, duplicate requirements from
//! semantically equivalent but textually distinct retrieves.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::artifacts::RelatedArtifact;
use crate::error::{ManifestError, ManifestResult};
use crate::extractor::LibraryExtraction;
use crate::requirement::DataRequirement;

/// The final, deduplicated, deterministically ordered dependency manifest.
///
/// Produced once per assembly call and immutable afterward; the external
/// document builder embeds it into the publishable resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalManifest {
    /// Depends-on artifacts, sorted ascending by URI.
    pub related_artifacts: Vec<RelatedArtifact>,
    /// Data requirements, in first-occurrence order.
    pub data_requirements: Vec<DataRequirement>,
    /// Timestamp of assembly.
    pub assembled_at: DateTime<Utc>,
}

impl CanonicalManifest {
    /// Returns the number of related artifacts.
    pub fn artifact_count(&self) -> usize {
        self.related_artifacts.len()
    }

    /// Returns the number of data requirements.
    pub fn requirement_count(&self) -> usize {
        self.data_requirements.len()
    }

    /// Returns true when the manifest holds no entries.
    ///
    /// An empty manifest is a valid outcome for a document that declares no
    /// dependencies, distinct from a parse failure.
    pub fn is_empty(&self) -> bool {
        self.related_artifacts.is_empty() && self.data_requirements.is_empty()
    }

    /// Saves the manifest to a JSON file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> ManifestResult<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| ManifestError::io_error(path, e))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| ManifestError::Serialization(e.to_string()))?;
        Ok(())
    }

    /// Loads a manifest from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> ManifestResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ManifestError::io_error(path, e))?;
        let reader = BufReader::new(file);
        let manifest: Self = serde_json::from_reader(reader)
            .map_err(|e| ManifestError::Deserialization(e.to_string()))?;
        Ok(manifest)
    }
}

impl std::fmt::Display for CanonicalManifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Dependency Manifest")?;
        writeln!(f, "  Assembled:         {}", self.assembled_at)?;
        writeln!(f, "  Related Artifacts: {}", self.artifact_count())?;
        writeln!(f, "  Data Requirements: {}", self.requirement_count())?;
        Ok(())
    }
}

/// Accumulates extraction output and previously assembled manifests, then
/// produces the canonical manifest.
///
/// # Example
///
/// ```rust
/// use cql_manifest::{DependencyExtractor, ManifestAssembler};
///
/// let extractor = DependencyExtractor::new();
/// let extraction = extractor
///     .extract("valueset \"VS\": 'urn:oid:1.2.3'\ndefine \"E\": [Encounter: \"VS\"]")
///     .unwrap();
///
/// let manifest = ManifestAssembler::new().with_primary(&extraction).assemble();
/// assert_eq!(manifest.requirement_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct ManifestAssembler {
    artifacts: Vec<RelatedArtifact>,
    requirements: Vec<DataRequirement>,
}

impl ManifestAssembler {
    /// Creates an empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the primary document's extraction output.
    pub fn with_primary(mut self, extraction: &LibraryExtraction) -> Self {
        self.artifacts
            .extend(extraction.related_artifacts.iter().cloned());
        self.requirements
            .extend(extraction.requirements.iter().cloned());
        self
    }

    /// Adds a previously assembled manifest. Its entries rank after anything
    /// added earlier, so the primary document wins first-occurrence ties.
    pub fn with_prior(mut self, manifest: &CanonicalManifest) -> Self {
        self.artifacts
            .extend(manifest.related_artifacts.iter().cloned());
        self.requirements
            .extend(manifest.data_requirements.iter().cloned());
        self
    }

    /// Assembles the canonical manifest. Never fails; inputs are assumed
    /// valid from the earlier stages.
    pub fn assemble(self) -> CanonicalManifest {
        let mut seen_artifacts = HashSet::new();
        let mut related_artifacts = Vec::new();
        for artifact in self.artifacts {
            if seen_artifacts.insert(artifact.clone()) {
                related_artifacts.push(artifact);
            }
        }
        related_artifacts.sort_by(|a, b| a.uri.cmp(&b.uri));

        let mut seen_requirements = HashSet::new();
        let mut data_requirements = Vec::new();
        for requirement in self.requirements {
            if seen_requirements.insert(requirement.dedup_key()) {
                data_requirements.push(requirement);
            }
        }

        CanonicalManifest {
            related_artifacts,
            data_requirements,
            assembled_at: Utc::now(),
        }
    }
}
