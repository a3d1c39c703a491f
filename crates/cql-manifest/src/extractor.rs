//! The extraction façade: parse, collect, classify, aggregate.

use std::time::{Duration, Instant};

use crate::artifacts::{self, RelatedArtifact, TerminologyCatalog};
use crate::classifier;
use crate::config::ExtractorConfig;
use crate::definitions::{self, CollectedDefinitions, LibraryIdentity};
use crate::diagnostics::Diagnostic;
use crate::error::ManifestResult;
use crate::requirement::DataRequirement;

/// Counters from one extraction call.
#[derive(Debug, Clone, Default)]
pub struct ExtractionStats {
    /// Wall-clock duration of the call.
    pub duration: Duration,
    /// Parse tree nodes visited by the definition pass.
    pub nodes_visited: usize,
    /// Retrieve expressions encountered.
    pub retrieves_seen: usize,
    /// Retrieves that produced a data requirement.
    pub retrieves_classified: usize,
    /// Retrieves skipped (unrecognized shape or unresolved referent).
    pub retrieves_skipped: usize,
}

/// Everything harvested from one document.
#[derive(Debug, Clone)]
pub struct LibraryExtraction {
    /// Definitions collected by the first pass.
    pub definitions: CollectedDefinitions,
    /// Classified data requirements, in retrieve order.
    pub requirements: Vec<DataRequirement>,
    /// Depends-on artifacts, one per declaration, undeduplicated.
    pub related_artifacts: Vec<RelatedArtifact>,
    /// Terminology referenced by the classified retrieves.
    pub catalog: TerminologyCatalog,
    /// Non-fatal findings; empty for a clean document.
    pub diagnostics: Vec<Diagnostic>,
    /// Extraction counters.
    pub stats: ExtractionStats,
}

impl LibraryExtraction {
    /// Returns the extracted library identity.
    pub fn library(&self) -> &LibraryIdentity {
        self.definitions.library()
    }
}

/// Extracts terminology dependencies from CQL documents.
///
/// Each call parses its document and builds its own lookup tables; nothing
/// is shared across calls, so one extractor may serve many threads.
///
/// # Example
///
/// ```rust
/// use cql_manifest::DependencyExtractor;
///
/// let extractor = DependencyExtractor::new();
/// let extraction = extractor
///     .extract(
///         "library Demo version '1.0.0'\n\
///          valueset \"Inpatient\": 'urn:oid:1.2.3'\n\
///          define \"Encounters\": [Encounter: \"Inpatient\"]",
///     )
///     .unwrap();
///
/// assert_eq!(extraction.library().name, "Demo");
/// assert_eq!(extraction.requirements.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DependencyExtractor {
    config: ExtractorConfig,
}

impl DependencyExtractor {
    /// Creates an extractor with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an extractor with the given configuration.
    pub fn with_config(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Returns the extractor's configuration.
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extracts dependencies from one CQL document.
    ///
    /// Only syntax errors propagate. Constructs the extractor does not
    /// recognize are skipped with diagnostics; a document that declares no
    /// dependencies yields a valid, empty extraction.
    pub fn extract(&self, source: &str) -> ManifestResult<LibraryExtraction> {
        let started = Instant::now();
        let tree = cql_tree::parse(source)?;

        let mut diagnostics = Vec::new();
        let mut stats = ExtractionStats::default();

        let definitions = definitions::collect(&tree, &mut diagnostics, &mut stats);
        let requirements =
            classifier::classify_retrieves(&tree, &definitions, &mut diagnostics, &mut stats);
        let (related_artifacts, catalog) =
            artifacts::aggregate(&definitions, &requirements, &self.config);

        stats.duration = started.elapsed();
        Ok(LibraryExtraction {
            definitions,
            requirements,
            related_artifacts,
            catalog,
            diagnostics,
            stats,
        })
    }

    /// Extracts many documents on the rayon thread pool.
    ///
    /// Results keep the order of `sources`. Each extraction is independent,
    /// so failures are per-document.
    #[cfg(feature = "parallel")]
    pub fn extract_batch(&self, sources: &[&str]) -> Vec<ManifestResult<LibraryExtraction>> {
        use rayon::prelude::*;
        sources.par_iter().map(|s| self.extract(s)).collect()
    }
}
