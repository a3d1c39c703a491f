//! Definition collection: the first pass over the parse tree.
//!
//! A single depth-first traversal gathers the library identity, inclusion
//! declarations, and the value set / code system / code tables that the
//! retrieve classifier resolves names against. The accumulator is an
//! explicit struct threaded through the walk; nothing is global, so
//! extraction stays reentrant.

use std::collections::HashMap;

use cql_tree::{NodeKind, TreeNode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::diagnostics::Diagnostic;
use crate::extractor::ExtractionStats;

/// Strips one surrounding pair of quote delimiters from declaration text.
///
/// Only text longer than two characters that is actually wrapped in matching
/// single or double quotes is trimmed; anything else passes through
/// unchanged, which makes the operation idempotent and a no-op on strings of
/// length two or less.
pub(crate) fn strip_delimiters(text: &str) -> &str {
    if text.len() > 2 {
        let bytes = text.as_bytes();
        let first = bytes[0];
        let last = bytes[text.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &text[1..text.len() - 1];
        }
    }
    text
}

/// Name and version of the library being extracted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryIdentity {
    /// Library name, delimiters stripped.
    pub name: String,
    /// Declared version; empty when the declaration carries none.
    pub version: String,
}

/// One `include <name> version '<v>'` declaration.
///
/// Inclusions are kept in declaration order and are not deduplicated here;
/// duplicate includes collapse later, at assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionReference {
    /// Name of the included library.
    pub referenced_name: String,
    /// Version of the included library.
    pub referenced_version: String,
}

/// One `valueset` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSetDefinition {
    /// Local name the document binds the value set to.
    pub local_name: String,
    /// Canonical value set URI.
    pub uri: String,
    /// Explicit version, when declared.
    pub version: Option<String>,
}

/// One `codesystem` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSystemDefinition {
    /// Local name the document binds the code system to.
    pub local_name: String,
    /// Canonical code system URI.
    pub system_uri: String,
    /// Version URI, when declared.
    pub version_uri: Option<String>,
}

/// One `code` declaration, with its code system already resolved.
///
/// Codes whose `from` clause names an unknown code system are dropped at
/// collection time with a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeDefinition {
    /// Local name the document binds the code to.
    pub local_name: String,
    /// The coded value.
    pub code_value: String,
    /// Display text, when declared.
    pub display: Option<String>,
    /// The resolved code system declaration.
    pub system: CodeSystemDefinition,
}

/// Everything the first pass collects from one document.
///
/// Declarations are kept twice: in declaration order (the aggregator emits
/// one related artifact per textual declaration, duplicates included) and in
/// name-keyed tables for resolution, where a repeated name overwrites the
/// earlier entry.
#[derive(Debug, Clone, Default)]
pub struct CollectedDefinitions {
    library: LibraryIdentity,
    inclusions: Vec<InclusionReference>,
    value_set_decls: Vec<ValueSetDefinition>,
    code_system_decls: Vec<CodeSystemDefinition>,
    code_decls: Vec<CodeDefinition>,
    value_sets: HashMap<String, usize>,
    code_systems: HashMap<String, usize>,
    codes: HashMap<String, usize>,
}

impl CollectedDefinitions {
    /// Returns the library identity.
    pub fn library(&self) -> &LibraryIdentity {
        &self.library
    }

    /// Returns inclusion declarations in source order.
    pub fn inclusions(&self) -> &[InclusionReference] {
        &self.inclusions
    }

    /// Returns value set declarations in source order.
    pub fn value_set_declarations(&self) -> &[ValueSetDefinition] {
        &self.value_set_decls
    }

    /// Returns code system declarations in source order.
    pub fn code_system_declarations(&self) -> &[CodeSystemDefinition] {
        &self.code_system_decls
    }

    /// Returns code declarations in source order.
    pub fn code_declarations(&self) -> &[CodeDefinition] {
        &self.code_decls
    }

    /// Looks up a value set by local name. The last declaration wins.
    pub fn value_set(&self, local_name: &str) -> Option<&ValueSetDefinition> {
        self.value_sets
            .get(local_name)
            .map(|&idx| &self.value_set_decls[idx])
    }

    /// Looks up a code system by local name. The last declaration wins.
    pub fn code_system(&self, local_name: &str) -> Option<&CodeSystemDefinition> {
        self.code_systems
            .get(local_name)
            .map(|&idx| &self.code_system_decls[idx])
    }

    /// Looks up a code by local name. The last declaration wins.
    pub fn code(&self, local_name: &str) -> Option<&CodeDefinition> {
        self.codes.get(local_name).map(|&idx| &self.code_decls[idx])
    }

    fn add_value_set(&mut self, def: ValueSetDefinition) {
        let idx = self.value_set_decls.len();
        self.value_sets.insert(def.local_name.clone(), idx);
        self.value_set_decls.push(def);
    }

    fn add_code_system(&mut self, def: CodeSystemDefinition) {
        let idx = self.code_system_decls.len();
        self.code_systems.insert(def.local_name.clone(), idx);
        self.code_system_decls.push(def);
    }

    fn add_code(&mut self, def: CodeDefinition) {
        let idx = self.code_decls.len();
        self.codes.insert(def.local_name.clone(), idx);
        self.code_decls.push(def);
    }
}

/// Collects definitions from a parse tree in one depth-first pass.
///
/// Never fails: node shapes the collector does not recognize are skipped,
/// and reference problems become diagnostics.
pub(crate) fn collect(
    tree: &TreeNode,
    diagnostics: &mut Vec<Diagnostic>,
    stats: &mut ExtractionStats,
) -> CollectedDefinitions {
    let mut defs = CollectedDefinitions::default();
    visit(tree, &mut defs, diagnostics, stats);
    defs
}

fn visit(
    node: &TreeNode,
    defs: &mut CollectedDefinitions,
    diagnostics: &mut Vec<Diagnostic>,
    stats: &mut ExtractionStats,
) {
    stats.nodes_visited += 1;
    match node.kind() {
        NodeKind::LibraryDefinition => collect_library(node, defs),
        NodeKind::IncludeDefinition => collect_inclusion(node, defs),
        NodeKind::ValuesetDefinition => collect_value_set(node, defs),
        NodeKind::CodesystemDefinition => collect_code_system(node, defs),
        NodeKind::CodeDefinition => collect_code(node, defs, diagnostics),
        _ => {
            for child in node.children() {
                visit(child, defs, diagnostics, stats);
            }
        }
    }
}

fn collect_library(node: &TreeNode, defs: &mut CollectedDefinitions) {
    match node.children() {
        [_, name] => {
            defs.library.name = strip_delimiters(&name.text()).to_string();
        }
        [_, name, _, version] => {
            defs.library.name = strip_delimiters(&name.text()).to_string();
            defs.library.version = strip_delimiters(&version.text()).to_string();
        }
        _ => {}
    }
}

/// Inclusions must match the exact 4-token `include <name> version <v>`
/// shape; aliased or versionless includes are skipped on purpose.
fn collect_inclusion(node: &TreeNode, defs: &mut CollectedDefinitions) {
    match node.children() {
        [kw, name, version_kw, version]
            if kw.text() == "include" && version_kw.text() == "version" =>
        {
            defs.inclusions.push(InclusionReference {
                referenced_name: strip_delimiters(&name.text()).to_string(),
                referenced_version: strip_delimiters(&version.text()).to_string(),
            });
        }
        _ => {
            debug!(
                include = %node.text(),
                "skipping include declaration outside the canonical shape"
            );
        }
    }
}

fn collect_value_set(node: &TreeNode, defs: &mut CollectedDefinitions) {
    let (name, uri, version) = match node.children() {
        [_, name, _, uri] => (name, uri, None),
        [_, name, _, uri, version_kw, version] if version_kw.text() == "version" => {
            (name, uri, Some(version))
        }
        _ => return,
    };
    defs.add_value_set(ValueSetDefinition {
        local_name: strip_delimiters(&name.text()).to_string(),
        uri: strip_delimiters(&uri.text()).to_string(),
        version: version.map(|v| strip_delimiters(&v.text()).to_string()),
    });
}

fn collect_code_system(node: &TreeNode, defs: &mut CollectedDefinitions) {
    let (name, uri, version) = match node.children() {
        [_, name, _, uri] => (name, uri, None),
        [_, name, _, uri, version_kw, version] if version_kw.text() == "version" => {
            (name, uri, Some(version))
        }
        _ => return,
    };
    defs.add_code_system(CodeSystemDefinition {
        local_name: strip_delimiters(&name.text()).to_string(),
        system_uri: strip_delimiters(&uri.text()).to_string(),
        version_uri: version.map(|v| strip_delimiters(&v.text()).to_string()),
    });
}

fn collect_code(node: &TreeNode, defs: &mut CollectedDefinitions, diagnostics: &mut Vec<Diagnostic>) {
    let (name, value, system, display) = match node.children() {
        [_, name, _, value, _, system] => (name, value, system, None),
        [_, name, _, value, _, system, display_kw, display]
            if display_kw.text() == "display" =>
        {
            (name, value, system, Some(display))
        }
        _ => return,
    };

    let local_name = strip_delimiters(&name.text()).to_string();
    let system_name = strip_delimiters(&system.text()).to_string();

    // A code needs its code system declared earlier in the document.
    let Some(system) = defs.code_system(&system_name).cloned() else {
        let diag = Diagnostic::warning(format!(
            "code \"{local_name}\" references undeclared code system \"{system_name}\""
        ));
        tracing::warn!(%diag, "dropping code declaration");
        diagnostics.push(diag);
        return;
    };

    defs.add_code(CodeDefinition {
        local_name,
        code_value: strip_delimiters(&value.text()).to_string(),
        display: display.map(|d| strip_delimiters(&d.text()).to_string()),
        system,
    });
}
