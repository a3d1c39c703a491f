//! CQL subset parser implementation using nom.
//!
//! The grammar covers the declaration and retrieve forms that carry
//! terminology dependencies. `define` bodies are tokenized into generic
//! expression nodes so retrieves can be found at any nesting depth without
//! interpreting the surrounding logic.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while, take_while1},
    character::complete::{char, digit1, multispace1},
    combinator::{all_consuming, map, opt, recognize},
    multi::{many0, many1, separated_list1},
    sequence::{delimited, pair, preceded},
    IResult,
};

use crate::error::{CqlSyntaxError, TreeResult};
use crate::node::{NodeKind, TreeNode};

/// Parse a CQL document into a concrete parse tree.
///
/// # Arguments
/// * `input` - The CQL source text
///
/// # Returns
/// The root `Library` node, or a syntax error with the failing position.
///
/// # Examples
///
/// ```rust
/// use cql_tree::parse;
///
/// let tree = parse("library Demo version '1.0.0'").unwrap();
/// assert_eq!(tree.child_count(), 1);
/// ```
pub fn parse(input: &str) -> TreeResult<TreeNode> {
    if input.trim().is_empty() {
        return Err(CqlSyntaxError::EmptyDocument);
    }

    match all_consuming(document)(input) {
        Ok((_, tree)) => Ok(tree),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let position = input.len() - e.input.len();
            Err(CqlSyntaxError::ParseError {
                position,
                message: format!("unexpected input at: '{}'", truncate(e.input, 24)),
            })
        }
        Err(nom::Err::Incomplete(_)) => Err(CqlSyntaxError::Incomplete("document".to_string())),
    }
}

fn truncate(s: &str, max_len: usize) -> &str {
    match s.char_indices().nth(max_len) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ============================================================================
// Whitespace and comments
// ============================================================================

fn line_comment(input: &str) -> IResult<&str, &str> {
    recognize(pair(tag("//"), take_while(|c| c != '\n')))(input)
}

fn block_comment(input: &str) -> IResult<&str, &str> {
    recognize(delimited(tag("/*"), take_until("*/"), tag("*/")))(input)
}

/// Optional whitespace, including comments.
fn ws(input: &str) -> IResult<&str, &str> {
    recognize(many0(alt((multispace1, line_comment, block_comment))))(input)
}

/// Mandatory whitespace, including comments.
fn mws(input: &str) -> IResult<&str, &str> {
    recognize(many1(alt((multispace1, line_comment, block_comment))))(input)
}

// ============================================================================
// Terminals
// ============================================================================

/// Matches a keyword at a word boundary and yields it as a `Token` terminal.
fn keyword(kw: &'static str) -> impl Fn(&str) -> IResult<&str, TreeNode> {
    move |input: &str| {
        let (rest, matched) = tag(kw)(input)?;
        if rest
            .chars()
            .next()
            .map_or(false, |c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Tag,
            )));
        }
        Ok((rest, TreeNode::terminal(NodeKind::Token, matched)))
    }
}

/// Matches punctuation and yields it as a `Token` terminal.
fn symbol(sym: &'static str) -> impl Fn(&str) -> IResult<&str, TreeNode> {
    move |input: &str| {
        map(tag(sym), |s: &str| TreeNode::terminal(NodeKind::Token, s))(input)
    }
}

fn plain_identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

fn quoted_identifier(input: &str) -> IResult<&str, &str> {
    recognize(delimited(char('"'), take_while(|c| c != '"'), char('"')))(input)
}

fn identifier_part(input: &str) -> IResult<&str, &str> {
    alt((quoted_identifier, plain_identifier))(input)
}

/// A possibly dot-qualified identifier, kept as one terminal with its raw
/// source text (`Common."Inpatient"` stays exactly that).
fn qualified_identifier(input: &str) -> IResult<&str, &str> {
    recognize(separated_list1(char('.'), identifier_part))(input)
}

fn identifier_node(input: &str) -> IResult<&str, TreeNode> {
    map(qualified_identifier, |s| {
        TreeNode::terminal(NodeKind::Identifier, s)
    })(input)
}

/// A single-quoted string literal, quotes preserved.
fn string_literal(input: &str) -> IResult<&str, &str> {
    recognize(delimited(char('\''), take_while(|c| c != '\''), char('\'')))(input)
}

fn literal_node(input: &str) -> IResult<&str, TreeNode> {
    map(string_literal, |s| TreeNode::terminal(NodeKind::Literal, s))(input)
}

fn number_literal(input: &str) -> IResult<&str, &str> {
    recognize(pair(digit1, opt(pair(char('.'), digit1))))(input)
}

/// `@2020-01-01` style date/time literals.
fn date_literal(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        char('@'),
        take_while1(|c: char| {
            c.is_ascii_digit() || matches!(c, '-' | ':' | 'T' | '.' | 'Z' | '+')
        }),
    ))(input)
}

// ============================================================================
// Declarations
// ============================================================================

/// `version '<v>'` tail shared by several declarations.
fn version_clause(input: &str) -> IResult<&str, (TreeNode, TreeNode)> {
    let (input, kw) = preceded(mws, keyword("version"))(input)?;
    let (input, lit) = preceded(mws, literal_node)(input)?;
    Ok((input, (kw, lit)))
}

fn library_definition(input: &str) -> IResult<&str, TreeNode> {
    let (input, kw) = keyword("library")(input)?;
    let (input, name) = preceded(mws, identifier_node)(input)?;
    let (input, version) = opt(version_clause)(input)?;

    let mut children = vec![kw, name];
    if let Some((vkw, vlit)) = version {
        children.push(vkw);
        children.push(vlit);
    }
    Ok((input, TreeNode::interior(NodeKind::LibraryDefinition, children)))
}

fn using_definition(input: &str) -> IResult<&str, TreeNode> {
    let (input, kw) = keyword("using")(input)?;
    let (input, name) = preceded(mws, identifier_node)(input)?;
    let (input, version) = opt(version_clause)(input)?;

    let mut children = vec![kw, name];
    if let Some((vkw, vlit)) = version {
        children.push(vkw);
        children.push(vlit);
    }
    Ok((input, TreeNode::interior(NodeKind::UsingDefinition, children)))
}

fn include_definition(input: &str) -> IResult<&str, TreeNode> {
    let (input, kw) = keyword("include")(input)?;
    let (input, name) = preceded(mws, identifier_node)(input)?;
    let (input, version) = opt(version_clause)(input)?;
    let (input, called) = opt(pair(
        preceded(mws, keyword("called")),
        preceded(mws, identifier_node),
    ))(input)?;

    let mut children = vec![kw, name];
    if let Some((vkw, vlit)) = version {
        children.push(vkw);
        children.push(vlit);
    }
    if let Some((ckw, alias)) = called {
        children.push(ckw);
        children.push(alias);
    }
    Ok((input, TreeNode::interior(NodeKind::IncludeDefinition, children)))
}

fn valueset_definition(input: &str) -> IResult<&str, TreeNode> {
    let (input, kw) = keyword("valueset")(input)?;
    let (input, name) = preceded(mws, identifier_node)(input)?;
    let (input, colon) = preceded(ws, symbol(":"))(input)?;
    let (input, uri) = preceded(ws, literal_node)(input)?;
    let (input, version) = opt(version_clause)(input)?;

    let mut children = vec![kw, name, colon, uri];
    if let Some((vkw, vlit)) = version {
        children.push(vkw);
        children.push(vlit);
    }
    Ok((
        input,
        TreeNode::interior(NodeKind::ValuesetDefinition, children),
    ))
}

fn codesystem_definition(input: &str) -> IResult<&str, TreeNode> {
    let (input, kw) = keyword("codesystem")(input)?;
    let (input, name) = preceded(mws, identifier_node)(input)?;
    let (input, colon) = preceded(ws, symbol(":"))(input)?;
    let (input, uri) = preceded(ws, literal_node)(input)?;
    let (input, version) = opt(version_clause)(input)?;

    let mut children = vec![kw, name, colon, uri];
    if let Some((vkw, vlit)) = version {
        children.push(vkw);
        children.push(vlit);
    }
    Ok((
        input,
        TreeNode::interior(NodeKind::CodesystemDefinition, children),
    ))
}

fn code_definition(input: &str) -> IResult<&str, TreeNode> {
    let (input, kw) = keyword("code")(input)?;
    let (input, name) = preceded(mws, identifier_node)(input)?;
    let (input, colon) = preceded(ws, symbol(":"))(input)?;
    let (input, value) = preceded(ws, literal_node)(input)?;
    let (input, from_kw) = preceded(mws, keyword("from"))(input)?;
    let (input, system) = preceded(mws, identifier_node)(input)?;
    let (input, display) = opt(pair(
        preceded(mws, keyword("display")),
        preceded(mws, literal_node),
    ))(input)?;

    let mut children = vec![kw, name, colon, value, from_kw, system];
    if let Some((dkw, dlit)) = display {
        children.push(dkw);
        children.push(dlit);
    }
    Ok((input, TreeNode::interior(NodeKind::CodeDefinition, children)))
}

fn context_definition(input: &str) -> IResult<&str, TreeNode> {
    let (input, kw) = keyword("context")(input)?;
    let (input, name) = preceded(mws, identifier_node)(input)?;
    Ok((
        input,
        TreeNode::interior(NodeKind::ContextDefinition, vec![kw, name]),
    ))
}

fn expression_definition(input: &str) -> IResult<&str, TreeNode> {
    let (input, kw) = keyword("define")(input)?;
    let (input, name) = preceded(mws, identifier_node)(input)?;
    let (input, colon) = preceded(ws, symbol(":"))(input)?;
    let (input, body) = preceded(ws, expression)(input)?;
    Ok((
        input,
        TreeNode::interior(NodeKind::ExpressionDefinition, vec![kw, name, colon, body]),
    ))
}

fn statement(input: &str) -> IResult<&str, TreeNode> {
    alt((
        using_definition,
        include_definition,
        valueset_definition,
        codesystem_definition,
        code_definition,
        context_definition,
        expression_definition,
    ))(input)
}

fn document(input: &str) -> IResult<&str, TreeNode> {
    let (input, _) = ws(input)?;
    let (input, lib) = opt(library_definition)(input)?;
    let (input, stmts) = many0(preceded(ws, statement))(input)?;
    let (input, _) = ws(input)?;

    let mut children = Vec::new();
    if let Some(l) = lib {
        children.push(l);
    }
    children.extend(stmts);
    Ok((input, TreeNode::interior(NodeKind::Library, children)))
}

// ============================================================================
// Retrieves and expressions
// ============================================================================

fn retrieve(input: &str) -> IResult<&str, TreeNode> {
    let (input, open) = symbol("[")(input)?;
    let (input, rtype) = preceded(ws, identifier_node)(input)?;
    let (input, filter) = opt(retrieve_filter)(input)?;
    let (input, close) = preceded(ws, symbol("]"))(input)?;

    let mut children = vec![open, rtype];
    if let Some(f) = filter {
        children.extend(f);
    }
    children.push(close);
    Ok((input, TreeNode::interior(NodeKind::Retrieve, children)))
}

/// `: "VS"` or `: path in "VS"` inside a retrieve.
fn retrieve_filter(input: &str) -> IResult<&str, Vec<TreeNode>> {
    let (input, colon) = preceded(ws, symbol(":"))(input)?;
    let (input, first) = preceded(ws, identifier_node)(input)?;
    let (input, tail) = opt(pair(
        preceded(mws, keyword("in")),
        preceded(mws, identifier_node),
    ))(input)?;

    Ok(match tail {
        Some((kw_in, referent)) => (input, vec![colon, first, kw_in, referent]),
        None => (input, vec![colon, first]),
    })
}

/// True when the input continues with a statement-starting keyword, which
/// ends the current expression body.
fn at_statement_start(input: &str) -> bool {
    const STARTERS: [&str; 8] = [
        "library",
        "using",
        "include",
        "valueset",
        "codesystem",
        "code",
        "context",
        "define",
    ];
    STARTERS.iter().any(|kw| keyword(kw)(input).is_ok())
}

fn expression_element(input: &str) -> IResult<&str, TreeNode> {
    if at_statement_start(input) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Eof,
        )));
    }
    alt((
        retrieve,
        paren_group,
        literal_node,
        map(date_literal, |s| TreeNode::terminal(NodeKind::Literal, s)),
        map(number_literal, |s| TreeNode::terminal(NodeKind::Literal, s)),
        identifier_node,
        operator,
    ))(input)
}

fn operator(input: &str) -> IResult<&str, TreeNode> {
    map(
        alt((
            tag("<="),
            tag(">="),
            tag("!="),
            tag("="),
            tag("<"),
            tag(">"),
            tag("+"),
            tag("-"),
            tag("*"),
            tag("/"),
            tag(","),
            tag("."),
        )),
        |s: &str| TreeNode::terminal(NodeKind::Token, s),
    )(input)
}

fn paren_group(input: &str) -> IResult<&str, TreeNode> {
    let (input, open) = symbol("(")(input)?;
    let (input, elems) = many0(preceded(ws, expression_element))(input)?;
    let (input, close) = preceded(ws, symbol(")"))(input)?;

    let mut children = vec![open];
    children.extend(elems);
    children.push(close);
    Ok((input, TreeNode::interior(NodeKind::Expression, children)))
}

fn expression(input: &str) -> IResult<&str, TreeNode> {
    let (input, elems) = many1(preceded(ws, expression_element))(input)?;
    Ok((input, TreeNode::interior(NodeKind::Expression, elems)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find_all<'a>(node: &'a TreeNode, kind: NodeKind, out: &mut Vec<&'a TreeNode>) {
        if node.kind() == kind {
            out.push(node);
        }
        for child in node.children() {
            find_all(child, kind, out);
        }
    }

    fn collect(tree: &TreeNode, kind: NodeKind) -> Vec<&TreeNode> {
        let mut out = Vec::new();
        find_all(tree, kind, &mut out);
        out
    }

    #[test]
    fn test_parse_library_declaration() {
        let tree = parse("library Demo version '1.0.0'").unwrap();
        assert_eq!(tree.kind(), NodeKind::Library);

        let lib = tree.child(0).unwrap();
        assert_eq!(lib.kind(), NodeKind::LibraryDefinition);
        assert_eq!(lib.child_count(), 4);
        assert_eq!(lib.child(1).unwrap().text(), "Demo");
        assert_eq!(lib.child(3).unwrap().text(), "'1.0.0'");
    }

    #[test]
    fn test_parse_library_without_version() {
        let tree = parse("library Demo").unwrap();
        let lib = tree.child(0).unwrap();
        assert_eq!(lib.child_count(), 2);
    }

    #[test]
    fn test_parse_include_canonical_shape() {
        let tree = parse("library D\ninclude Common version '2.1.0'").unwrap();
        let includes = collect(&tree, NodeKind::IncludeDefinition);
        assert_eq!(includes.len(), 1);

        let inc = includes[0];
        assert_eq!(inc.child_count(), 4);
        assert_eq!(inc.child(0).unwrap().text(), "include");
        assert_eq!(inc.child(1).unwrap().text(), "Common");
        assert_eq!(inc.child(2).unwrap().text(), "version");
        assert_eq!(inc.child(3).unwrap().text(), "'2.1.0'");
    }

    #[test]
    fn test_parse_include_with_alias_has_six_children() {
        let tree = parse("library D\ninclude Common version '2.1.0' called C").unwrap();
        let includes = collect(&tree, NodeKind::IncludeDefinition);
        assert_eq!(includes[0].child_count(), 6);
        assert_eq!(includes[0].child(4).unwrap().text(), "called");
    }

    #[test]
    fn test_parse_include_without_version_has_two_children() {
        let tree = parse("library D\ninclude Common").unwrap();
        let includes = collect(&tree, NodeKind::IncludeDefinition);
        assert_eq!(includes[0].child_count(), 2);
    }

    #[test]
    fn test_parse_valueset_declaration() {
        let tree = parse("valueset \"Inpatient\": 'urn:oid:1.2.3'").unwrap();
        let vs = collect(&tree, NodeKind::ValuesetDefinition);
        assert_eq!(vs.len(), 1);
        assert_eq!(vs[0].child_count(), 4);
        assert_eq!(vs[0].child(1).unwrap().text(), "\"Inpatient\"");
        assert_eq!(vs[0].child(3).unwrap().text(), "'urn:oid:1.2.3'");
    }

    #[test]
    fn test_parse_valueset_with_version() {
        let tree = parse("valueset \"VS\": 'urn:oid:1.2.3' version '20210505'").unwrap();
        let vs = collect(&tree, NodeKind::ValuesetDefinition);
        assert_eq!(vs[0].child_count(), 6);
        assert_eq!(vs[0].child(5).unwrap().text(), "'20210505'");
    }

    #[test]
    fn test_parse_codesystem_and_code() {
        let source = "codesystem \"SNOMED\": 'http://snomed.info/sct'\n\
                      code \"Dead\": '419099009' from \"SNOMED\" display 'Dead'";
        let tree = parse(source).unwrap();

        let cs = collect(&tree, NodeKind::CodesystemDefinition);
        assert_eq!(cs[0].child_count(), 4);

        let code = collect(&tree, NodeKind::CodeDefinition);
        assert_eq!(code[0].child_count(), 8);
        assert_eq!(code[0].child(3).unwrap().text(), "'419099009'");
        assert_eq!(code[0].child(5).unwrap().text(), "\"SNOMED\"");
        assert_eq!(code[0].child(7).unwrap().text(), "'Dead'");
    }

    #[test]
    fn test_parse_code_without_display() {
        let tree =
            parse("codesystem \"LOINC\": 'http://loinc.org'\ncode \"HR\": '8867-4' from \"LOINC\"")
                .unwrap();
        let code = collect(&tree, NodeKind::CodeDefinition);
        assert_eq!(code[0].child_count(), 6);
    }

    #[test]
    fn test_retrieve_type_only_has_three_children() {
        let tree = parse("define \"E\": [Encounter]").unwrap();
        let retrieves = collect(&tree, NodeKind::Retrieve);
        assert_eq!(retrieves.len(), 1);
        assert_eq!(retrieves[0].child_count(), 3);
        assert_eq!(retrieves[0].child(0).unwrap().text(), "[");
        assert_eq!(retrieves[0].child(1).unwrap().text(), "Encounter");
        assert_eq!(retrieves[0].child(2).unwrap().text(), "]");
    }

    #[test]
    fn test_retrieve_code_filtered_has_five_children() {
        let tree = parse("define \"E\": [Encounter: \"Inpatient\"]").unwrap();
        let retrieves = collect(&tree, NodeKind::Retrieve);
        assert_eq!(retrieves[0].child_count(), 5);
        assert_eq!(retrieves[0].child(2).unwrap().text(), ":");
        assert_eq!(retrieves[0].child(3).unwrap().text(), "\"Inpatient\"");
    }

    #[test]
    fn test_retrieve_path_filtered_has_seven_children() {
        let tree = parse("define \"E\": [Encounter: class in \"Inpatient\"]").unwrap();
        let retrieves = collect(&tree, NodeKind::Retrieve);
        assert_eq!(retrieves[0].child_count(), 7);
        assert_eq!(retrieves[0].child(3).unwrap().text(), "class");
        assert_eq!(retrieves[0].child(4).unwrap().text(), "in");
        assert_eq!(retrieves[0].child(5).unwrap().text(), "\"Inpatient\"");
    }

    #[test]
    fn test_retrieve_nested_in_expression() {
        let source = "define \"Count\": Count([Condition: \"Diabetes\"]) + 1";
        let tree = parse(source).unwrap();
        let retrieves = collect(&tree, NodeKind::Retrieve);
        assert_eq!(retrieves.len(), 1);
        assert_eq!(retrieves[0].child_count(), 5);
    }

    #[test]
    fn test_multiple_defines() {
        let source = "library D\n\
                      define \"A\": [Encounter]\n\
                      define \"B\": [Condition]";
        let tree = parse(source).unwrap();
        let defines = collect(&tree, NodeKind::ExpressionDefinition);
        assert_eq!(defines.len(), 2);
    }

    #[test]
    fn test_qualified_identifier_kept_raw() {
        let tree = parse("define \"X\": [Encounter: Common.\"Inpatient\"]").unwrap();
        let retrieves = collect(&tree, NodeKind::Retrieve);
        assert_eq!(retrieves[0].child(3).unwrap().text(), "Common.\"Inpatient\"");
    }

    #[test]
    fn test_comments_are_skipped() {
        let source = "// header comment\n\
                      library Demo version '1.0.0'\n\
                      /* block\n comment */\n\
                      define \"E\": [Encounter] // trailing";
        let tree = parse(source).unwrap();
        assert_eq!(collect(&tree, NodeKind::Retrieve).len(), 1);
    }

    #[test]
    fn test_date_and_number_literals_in_expression() {
        let source = "define \"X\": [Encounter] where 1.5 < 2 and start >= @2020-01-01";
        let tree = parse(source).unwrap();
        assert_eq!(collect(&tree, NodeKind::Retrieve).len(), 1);
    }

    #[test]
    fn test_empty_document_is_an_error() {
        assert_eq!(parse("   \n  "), Err(CqlSyntaxError::EmptyDocument));
    }

    #[test]
    fn test_syntax_error_reports_position() {
        let err = parse("library Demo version '1.0.0'\n???").unwrap_err();
        match err {
            CqlSyntaxError::ParseError { position, .. } => assert_eq!(position, 29),
            other => panic!("expected ParseError, got {other:?}"),
        }
    }

    #[test]
    fn test_comment_only_document_yields_empty_library() {
        let tree = parse("// nothing here").unwrap();
        assert_eq!(tree.kind(), NodeKind::Library);
        assert_eq!(tree.child_count(), 0);
    }
}
