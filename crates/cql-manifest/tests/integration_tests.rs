//! End-to-end extraction and assembly tests over complete CQL documents.

use cql_manifest::{
    DependencyExtractor, ExtractorConfig, ManifestAssembler, Referent, RelationKind, Severity,
};

fn extractor_with_base(base: &str) -> DependencyExtractor {
    DependencyExtractor::with_config(
        ExtractorConfig::builder().with_library_base_url(base).build(),
    )
}

#[test]
fn single_valueset_retrieve_yields_one_requirement_and_one_artifact() {
    let source = "library Demo version '1.0.0'\n\
                  valueset \"VS1\": 'urn:oid:1.2.3'\n\
                  define \"Encounters\": [Encounter: \"VS1\"]";
    let extraction = DependencyExtractor::new().extract(source).unwrap();
    let manifest = ManifestAssembler::new().with_primary(&extraction).assemble();

    assert_eq!(manifest.requirement_count(), 1);
    let requirement = &manifest.data_requirements[0];
    assert_eq!(requirement.resource_type, "Encounter");
    let filter = requirement.filter.as_ref().unwrap();
    assert_eq!(filter.path, "code");
    match &filter.referent {
        Referent::ValueSet(vs) => assert_eq!(vs.uri, "urn:oid:1.2.3"),
        other => panic!("expected value set referent, got {other:?}"),
    }

    assert_eq!(manifest.artifact_count(), 1);
    assert_eq!(manifest.related_artifacts[0].relation, RelationKind::DependsOn);
    assert_eq!(manifest.related_artifacts[0].uri, "urn:oid:1.2.3");
}

#[test]
fn identical_retrieves_collapse_to_one_requirement() {
    let source = "library Demo version '1.0.0'\n\
                  valueset \"VS1\": 'urn:oid:1.2.3'\n\
                  define \"A\": [Encounter: \"VS1\"]\n\
                  define \"B\": [Encounter: \"VS1\"]";
    let extraction = DependencyExtractor::new().extract(source).unwrap();
    assert_eq!(extraction.requirements.len(), 2);

    let manifest = ManifestAssembler::new().with_primary(&extraction).assemble();
    assert_eq!(manifest.requirement_count(), 1);
}

#[test]
fn include_composes_artifact_uri_from_base_url() {
    let source = "library Demo version '1.0.0'\n\
                  include Common version '1.0.0'";
    let extraction = extractor_with_base("https://x/Library").extract(source).unwrap();
    let manifest = ManifestAssembler::new().with_primary(&extraction).assemble();

    assert_eq!(manifest.artifact_count(), 1);
    assert_eq!(manifest.related_artifacts[0].uri, "https://x/Library/Common|1.0.0");
}

#[test]
fn unresolvable_referent_yields_zero_requirements_and_one_diagnostic() {
    let source = "library Demo version '1.0.0'\n\
                  define \"E\": [Encounter: \"Nowhere\"]";
    let extraction = DependencyExtractor::new().extract(source).unwrap();

    assert!(extraction.requirements.is_empty());
    assert_eq!(extraction.diagnostics.len(), 1);
    assert_eq!(extraction.diagnostics[0].severity, Severity::Warning);
}

#[test]
fn inclusion_count_matches_canonical_declarations() {
    let source = "library Demo version '1.0.0'\n\
                  include A version '1.0.0'\n\
                  include B version '2.0.0'\n\
                  include Aliased version '3.0.0' called AL\n\
                  include C version '4.0.0'";
    let extraction = DependencyExtractor::new().extract(source).unwrap();

    // Three canonical 4-token includes; the aliased one is skipped.
    let names: Vec<&str> = extraction
        .definitions
        .inclusions()
        .iter()
        .map(|i| i.referenced_name.as_str())
        .collect();
    assert_eq!(names, vec!["A", "B", "C"]);
}

#[test]
fn related_artifacts_sort_by_uri_requirements_keep_order() {
    let source = "library Demo version '1.0.0'\n\
                  valueset \"Zeta\": 'urn:oid:9.9.9'\n\
                  valueset \"Alpha\": 'urn:oid:1.1.1'\n\
                  define \"Z\": [Encounter: \"Zeta\"]\n\
                  define \"A\": [Condition: \"Alpha\"]";
    let extraction = DependencyExtractor::new().extract(source).unwrap();
    let manifest = ManifestAssembler::new().with_primary(&extraction).assemble();

    let artifact_uris: Vec<&str> = manifest
        .related_artifacts
        .iter()
        .map(|a| a.uri.as_str())
        .collect();
    assert_eq!(artifact_uris, vec!["urn:oid:1.1.1", "urn:oid:9.9.9"]);

    let requirement_types: Vec<&str> = manifest
        .data_requirements
        .iter()
        .map(|r| r.resource_type.as_str())
        .collect();
    assert_eq!(requirement_types, vec!["Encounter", "Condition"]);
}

#[test]
fn assembly_with_prior_manifest_dedups_across_documents() {
    let common = "library Common version '1.0.0'\n\
                  valueset \"Shared\": 'urn:oid:5.5.5'\n\
                  define \"S\": [Procedure: \"Shared\"]";
    let prior_extraction = DependencyExtractor::new().extract(common).unwrap();
    let prior = ManifestAssembler::new().with_primary(&prior_extraction).assemble();

    let primary = "library Main version '2.0.0'\n\
                   valueset \"Shared\": 'urn:oid:5.5.5'\n\
                   valueset \"Own\": 'urn:oid:6.6.6'\n\
                   define \"S\": [Procedure: \"Shared\"]\n\
                   define \"O\": [Observation: \"Own\"]";
    let primary_extraction = DependencyExtractor::new().extract(primary).unwrap();

    let manifest = ManifestAssembler::new()
        .with_primary(&primary_extraction)
        .with_prior(&prior)
        .assemble();

    // Shared entries survive once.
    assert_eq!(manifest.requirement_count(), 2);
    assert_eq!(manifest.artifact_count(), 2);
}

#[test]
fn full_document_exercises_every_stage() {
    let source = "library CMS146 version '0.4.0'\n\
                  using FHIR version '4.0.1'\n\
                  include Shared version '1.2.0'\n\
                  valueset \"Pharyngitis\": 'urn:oid:2.16.840.1.113883.3.464.1003.102.12.1011'\n\
                  valueset \"Antibiotics\": 'urn:oid:2.16.840.1.113883.3.464.1003.196.12.1001'\n\
                  codesystem \"SNOMED\": 'http://snomed.info/sct'\n\
                  code \"Finished\": '36309004' from \"SNOMED\" display 'Finished'\n\
                  context Patient\n\
                  define \"Pharyngitis Episodes\": [Condition: \"Pharyngitis\"]\n\
                  define \"Antibiotics Ordered\": [MedicationRequest: \"Antibiotics\"]\n\
                  define \"Finished Encounters\": [Encounter: status in \"Finished\"]\n\
                  define \"All Patients\": [Patient]";
    let extraction = extractor_with_base("https://hub/Library").extract(source).unwrap();

    assert!(extraction.diagnostics.is_empty());
    assert_eq!(extraction.requirements.len(), 4);
    assert_eq!(extraction.catalog.value_sets.len(), 2);
    assert_eq!(extraction.catalog.codes.len(), 1);

    let status_filtered = extraction
        .requirements
        .iter()
        .find(|r| r.resource_type == "Encounter")
        .unwrap();
    let filter = status_filtered.filter.as_ref().unwrap();
    assert_eq!(filter.path, "status");
    assert!(matches!(filter.referent, Referent::Code(_)));

    let manifest = ManifestAssembler::new().with_primary(&extraction).assemble();
    // 2 valuesets + code's system + codesystem (same URI, deduped) + include
    assert_eq!(manifest.artifact_count(), 4);
    assert!(manifest
        .related_artifacts
        .iter()
        .any(|a| a.uri == "https://hub/Library/Shared|1.2.0"));

    let uris: Vec<&str> = manifest
        .related_artifacts
        .iter()
        .map(|a| a.uri.as_str())
        .collect();
    let mut sorted = uris.clone();
    sorted.sort();
    assert_eq!(uris, sorted);
}

#[test]
fn empty_document_assembles_into_empty_manifest() {
    let extraction = DependencyExtractor::new().extract("library Empty").unwrap();
    let manifest = ManifestAssembler::new().with_primary(&extraction).assemble();
    assert!(manifest.is_empty());
}
