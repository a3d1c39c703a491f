//! Retrieve classification: the second pass over the parse tree.
//!
//! Retrieves are recognized purely by shape — child count plus the literal
//! tokens at fixed positions — and their referent names are resolved against
//! the tables the first pass collected. The three shapes are mutually
//! exclusive by child count, so match order does not matter.

use cql_tree::{NodeKind, TreeNode};
use tracing::{debug, warn};

use crate::definitions::{strip_delimiters, CollectedDefinitions};
use crate::diagnostics::Diagnostic;
use crate::extractor::ExtractionStats;
use crate::requirement::{CodeReference, DataRequirement, Referent, ValueSetReference};

/// Path implied by a code-filtered retrieve (`[Type: "VS"]`).
const IMPLICIT_CODE_PATH: &str = "code";

/// Walks the tree and classifies every retrieve expression.
pub(crate) fn classify_retrieves(
    tree: &TreeNode,
    defs: &CollectedDefinitions,
    diagnostics: &mut Vec<Diagnostic>,
    stats: &mut ExtractionStats,
) -> Vec<DataRequirement> {
    let mut requirements = Vec::new();
    visit(tree, defs, diagnostics, stats, &mut requirements);
    requirements
}

fn visit(
    node: &TreeNode,
    defs: &CollectedDefinitions,
    diagnostics: &mut Vec<Diagnostic>,
    stats: &mut ExtractionStats,
    requirements: &mut Vec<DataRequirement>,
) {
    if node.kind() == NodeKind::Retrieve {
        stats.retrieves_seen += 1;
        match classify(node, defs, diagnostics) {
            Some(requirement) => {
                stats.retrieves_classified += 1;
                requirements.push(requirement);
            }
            None => stats.retrieves_skipped += 1,
        }
        return;
    }
    for child in node.children() {
        visit(child, defs, diagnostics, stats, requirements);
    }
}

/// Classifies one retrieve node, or skips it.
///
/// Shapes:
/// - 7 children, tokens `[` `:` `in` `]` at 0/2/4/6 — path-filtered; the
///   path is the third child's raw text, no delimiter stripping.
/// - 5 children, tokens `[` `:` `]` at 0/2/4 — code-filtered with the
///   implicit path `code`.
/// - 3 children, tokens `[` `]` at 0/2 — type-only.
///
/// Anything else is not a terminology-bound retrieve and is skipped with a
/// debug trace.
fn classify(
    node: &TreeNode,
    defs: &CollectedDefinitions,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<DataRequirement> {
    match node.children() {
        [open, rtype, colon, path, kw_in, referent, close]
            if open.text() == "["
                && colon.text() == ":"
                && kw_in.text() == "in"
                && close.text() == "]" =>
        {
            let resource_type = strip_delimiters(&rtype.text()).to_string();
            let referent = resolve_referent(&referent.text(), defs, diagnostics)?;
            Some(DataRequirement::filtered(resource_type, path.text(), referent))
        }
        [open, rtype, colon, referent, close]
            if open.text() == "[" && colon.text() == ":" && close.text() == "]" =>
        {
            let resource_type = strip_delimiters(&rtype.text()).to_string();
            let referent = resolve_referent(&referent.text(), defs, diagnostics)?;
            Some(DataRequirement::filtered(
                resource_type,
                IMPLICIT_CODE_PATH,
                referent,
            ))
        }
        [open, rtype, close] if open.text() == "[" && close.text() == "]" => {
            let resource_type = strip_delimiters(&rtype.text()).to_string();
            Some(DataRequirement::type_only(resource_type))
        }
        _ => {
            debug!(retrieve = %node.text(), "skipping retrieve outside the recognized shapes");
            None
        }
    }
}

/// Resolves a referent name: value set table first, then code table.
///
/// Unresolved names are diagnosed and the retrieve skipped. Qualified names
/// point into an included library; resolving across documents is not
/// supported, so they are diagnosed and skipped as well.
fn resolve_referent(
    raw_name: &str,
    defs: &CollectedDefinitions,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<Referent> {
    let name = strip_delimiters(raw_name);

    if let Some(vs) = defs.value_set(name) {
        return Some(Referent::ValueSet(ValueSetReference {
            name: vs.local_name.clone(),
            uri: vs.uri.clone(),
            version: vs.version.clone(),
        }));
    }

    if let Some(code) = defs.code(name) {
        return Some(Referent::Code(CodeReference {
            name: code.local_name.clone(),
            code: code.code_value.clone(),
            display: code.display.clone(),
            system_name: code.system.local_name.clone(),
            system_uri: code.system.system_uri.clone(),
            system_version: code.system.version_uri.clone(),
        }));
    }

    let diag = if name.contains('.') {
        Diagnostic::warning(format!(
            "referent \"{name}\" points into an included library; cross-library resolution \
             is not supported"
        ))
    } else {
        Diagnostic::warning(format!(
            "referent \"{name}\" matches no declared value set or code"
        ))
    };
    warn!(%diag, "skipping retrieve");
    diagnostics.push(diag);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions;

    fn classify_source(source: &str) -> (Vec<DataRequirement>, Vec<Diagnostic>, ExtractionStats) {
        let tree = cql_tree::parse(source).unwrap();
        let mut diagnostics = Vec::new();
        let mut stats = ExtractionStats::default();
        let defs = definitions::collect(&tree, &mut diagnostics, &mut stats);
        let requirements = classify_retrieves(&tree, &defs, &mut diagnostics, &mut stats);
        (requirements, diagnostics, stats)
    }

    const PREAMBLE: &str = "library Demo version '1.0.0'\n\
                            valueset \"Inpatient\": 'urn:oid:1.2.3'\n\
                            codesystem \"SNOMED\": 'http://snomed.info/sct'\n\
                            code \"Dead\": '419099009' from \"SNOMED\" display 'Dead'\n";

    #[test]
    fn test_code_filtered_retrieve_gets_implicit_path() {
        let source = format!("{PREAMBLE}define \"E\": [Encounter: \"Inpatient\"]");
        let (requirements, diagnostics, _) = classify_source(&source);
        assert!(diagnostics.is_empty());
        assert_eq!(requirements.len(), 1);

        let req = &requirements[0];
        assert_eq!(req.resource_type, "Encounter");
        let filter = req.filter.as_ref().unwrap();
        assert_eq!(filter.path, "code");
        match &filter.referent {
            Referent::ValueSet(vs) => assert_eq!(vs.uri, "urn:oid:1.2.3"),
            other => panic!("expected value set referent, got {other:?}"),
        }
    }

    #[test]
    fn test_path_filtered_retrieve_keeps_raw_path() {
        let source = format!("{PREAMBLE}define \"E\": [Encounter: class in \"Inpatient\"]");
        let (requirements, _, _) = classify_source(&source);
        let filter = requirements[0].filter.as_ref().unwrap();
        assert_eq!(filter.path, "class");
    }

    #[test]
    fn test_type_only_retrieve_has_no_filter() {
        let source = format!("{PREAMBLE}define \"P\": [Patient]");
        let (requirements, _, _) = classify_source(&source);
        assert_eq!(requirements[0].resource_type, "Patient");
        assert!(requirements[0].filter.is_none());
    }

    #[test]
    fn test_code_referent_resolves_through_code_table() {
        let source = format!("{PREAMBLE}define \"D\": [Observation: \"Dead\"]");
        let (requirements, diagnostics, _) = classify_source(&source);
        assert!(diagnostics.is_empty());

        match &requirements[0].filter.as_ref().unwrap().referent {
            Referent::Code(code) => {
                assert_eq!(code.code, "419099009");
                assert_eq!(code.system_uri, "http://snomed.info/sct");
                assert_eq!(code.display.as_deref(), Some("Dead"));
            }
            other => panic!("expected code referent, got {other:?}"),
        }
    }

    #[test]
    fn test_value_set_table_is_checked_before_codes() {
        // Same local name declared as both; the value set wins.
        let source = "library D\n\
                      valueset \"X\": 'urn:oid:9.9.9'\n\
                      codesystem \"CS\": 'http://cs'\n\
                      code \"X\": '1' from \"CS\"\n\
                      define \"E\": [Condition: \"X\"]";
        let (requirements, _, _) = classify_source(source);
        match &requirements[0].filter.as_ref().unwrap().referent {
            Referent::ValueSet(vs) => assert_eq!(vs.uri, "urn:oid:9.9.9"),
            other => panic!("expected value set referent, got {other:?}"),
        }
    }

    #[test]
    fn test_unresolved_referent_is_diagnosed_and_skipped() {
        let source = format!("{PREAMBLE}define \"E\": [Encounter: \"Missing\"]");
        let (requirements, diagnostics, stats) = classify_source(&source);
        assert!(requirements.is_empty());
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("Missing"));
        assert_eq!(stats.retrieves_seen, 1);
        assert_eq!(stats.retrieves_skipped, 1);
    }

    #[test]
    fn test_qualified_referent_is_diagnosed_and_skipped() {
        let source = format!("{PREAMBLE}define \"E\": [Encounter: Common.\"Inpatient\"]");
        let (requirements, diagnostics, _) = classify_source(&source);
        assert!(requirements.is_empty());
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("included library"));
    }

    #[test]
    fn test_duplicate_retrieves_both_classify() {
        // Dedup happens at assembly, not here.
        let source = format!(
            "{PREAMBLE}define \"A\": [Encounter: \"Inpatient\"]\n\
             define \"B\": [Encounter: \"Inpatient\"]"
        );
        let (requirements, _, stats) = classify_source(&source);
        assert_eq!(requirements.len(), 2);
        assert_eq!(stats.retrieves_classified, 2);
    }

    #[test]
    fn test_stats_count_visited_nodes() {
        let source = format!("{PREAMBLE}define \"E\": [Encounter: \"Inpatient\"]");
        let (_, _, stats) = classify_source(&source);
        assert!(stats.nodes_visited > 0);
    }
}
