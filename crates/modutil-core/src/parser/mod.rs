// Java parser built on tree-sitter-java.
//
// Produces the declaration arena in `crate::ast`; everything the rewriter
// does not look at (method bodies, initializer blocks, comments) stays in
// the original text untouched.

use tree_sitter::Node;

use crate::ast::{
    DeclId, DeclKind, FieldDecl, Import, Initializer, Modifiers, SourceUnit, Tag, TagArg,
    TypeDecl,
};

pub mod literal;

/// Java parsing errors
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("Failed to load Java grammar: {0}")]
    Language(String),

    #[error("Parser produced no syntax tree")]
    NoTree,

    #[error("Syntax error at line {line}, column {column}: `{snippet}`")]
    Syntax {
        line: usize,
        column: usize,
        snippet: String,
    },

    #[error("{path}: {source}")]
    InFile {
        path: String,
        #[source]
        source: Box<SourceError>,
    },
}

impl SourceError {
    pub fn in_file(self, path: impl Into<String>) -> Self {
        SourceError::InFile {
            path: path.into(),
            source: Box::new(self),
        }
    }
}

/// Java compilation unit parser
pub struct JavaParser {
    parser: tree_sitter::Parser,
}

impl JavaParser {
    pub fn new() -> Result<Self, SourceError> {
        let mut parser = tree_sitter::Parser::new();
        let language: tree_sitter::Language = tree_sitter_java::LANGUAGE.into();
        parser
            .set_language(&language)
            .map_err(|e| SourceError::Language(e.to_string()))?;

        Ok(Self { parser })
    }

    /// Parse a compilation unit. Any syntax error fails the whole unit.
    pub fn parse(&mut self, source: &str) -> Result<SourceUnit, SourceError> {
        let tree = self.parser.parse(source, None).ok_or(SourceError::NoTree)?;
        let root = tree.root_node();
        if root.has_error() {
            return Err(syntax_error(root, source));
        }

        let mut builder = UnitBuilder {
            source,
            unit: SourceUnit::new(source),
        };
        builder.collect_header(root);
        builder.collect_top_level(root);
        Ok(builder.unit)
    }
}

fn syntax_error(root: Node, source: &str) -> SourceError {
    let node = first_error(root).unwrap_or(root);
    let position = node.start_position();
    let snippet = source
        .lines()
        .nth(position.row)
        .unwrap_or_default()
        .trim()
        .chars()
        .take(60)
        .collect();
    SourceError::Syntax {
        line: position.row + 1,
        column: position.column + 1,
        snippet,
    }
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_error(child) {
            return Some(found);
        }
    }
    None
}

fn decl_kind(kind: &str) -> Option<DeclKind> {
    match kind {
        "class_declaration" => Some(DeclKind::Class),
        "interface_declaration" => Some(DeclKind::Interface),
        "enum_declaration" => Some(DeclKind::Enum),
        "record_declaration" => Some(DeclKind::Record),
        "annotation_type_declaration" => Some(DeclKind::AnnotationType),
        _ => None,
    }
}

fn is_comment(kind: &str) -> bool {
    matches!(kind, "line_comment" | "block_comment" | "comment")
}

struct UnitBuilder<'s> {
    source: &'s str,
    unit: SourceUnit,
}

impl<'s> UnitBuilder<'s> {
    fn text(&self, node: Node) -> &'s str {
        &self.source[node.byte_range()]
    }

    /// Dotted name with any interior whitespace or comments removed
    fn name_text(&self, node: Node) -> String {
        self.text(node)
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect()
    }

    fn find_name(&self, node: Node) -> Option<String> {
        let mut cursor = node.walk();
        let found = node
            .named_children(&mut cursor)
            .find(|child| matches!(child.kind(), "identifier" | "scoped_identifier"));
        found.map(|name| self.name_text(name))
    }

    // Imports are needed to resolve tag names, so they go first
    fn collect_header(&mut self, root: Node) {
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            match child.kind() {
                "package_declaration" => {
                    self.unit.package = self.find_name(child);
                }
                "import_declaration" => {
                    let Some(name) = self.find_name(child) else {
                        continue;
                    };
                    let mut inner = child.walk();
                    let mut is_static = false;
                    let mut is_wildcard = false;
                    for part in child.children(&mut inner) {
                        match part.kind() {
                            "static" => is_static = true,
                            "asterisk" => is_wildcard = true,
                            _ => {}
                        }
                    }
                    self.unit.imports.push(Import {
                        name,
                        is_static,
                        is_wildcard,
                    });
                }
                _ => {}
            }
        }
    }

    fn collect_top_level(&mut self, root: Node) {
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            if let Some(kind) = decl_kind(child.kind()) {
                self.collect_decl(child, kind, None);
            }
        }
    }

    fn collect_decl(&mut self, node: Node, kind: DeclKind, parent: Option<DeclId>) {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n).to_string())
            .unwrap_or_default();
        let id = self.unit.add_decl(
            TypeDecl {
                name,
                kind,
                fields: Vec::new(),
                nested: Vec::new(),
            },
            parent,
        );
        if let Some(body) = node.child_by_field_name("body") {
            self.collect_members(body, id, kind);
        }
    }

    fn collect_members(&mut self, body: Node, id: DeclId, kind: DeclKind) {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            match member.kind() {
                "field_declaration" | "constant_declaration" => {
                    let fields = self.fields(member, kind);
                    self.unit.decl_mut(id).fields.extend(fields);
                }
                "enum_body_declarations" => self.collect_members(member, id, kind),
                other => {
                    if let Some(nested_kind) = decl_kind(other) {
                        self.collect_decl(member, nested_kind, Some(id));
                    }
                }
            }
        }
    }

    fn fields(&self, node: Node, owner: DeclKind) -> Vec<FieldDecl> {
        let implicit = owner.implicit_constants();
        let mut modifiers = Modifiers {
            is_static: implicit,
            is_final: implicit,
        };
        let mut tags = Vec::new();

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() != "modifiers" {
                continue;
            }
            let mut inner = child.walk();
            for modifier in child.children(&mut inner) {
                match modifier.kind() {
                    "static" => modifiers.is_static = true,
                    "final" => modifiers.is_final = true,
                    "annotation" | "marker_annotation" => tags.push(self.tag(modifier)),
                    _ => {}
                }
            }
        }

        let declared_type = node
            .child_by_field_name("type")
            .map(|t| self.text(t).trim().to_string())
            .unwrap_or_default();

        let mut fields = Vec::new();
        let mut cursor = node.walk();
        for declarator in node.children_by_field_name("declarator", &mut cursor) {
            let Some(name) = declarator.child_by_field_name("name") else {
                continue;
            };
            let initializer = match declarator.child_by_field_name("value") {
                Some(value) => Initializer::Present {
                    span: value.byte_range(),
                    text: self.text(value).to_string(),
                },
                None => {
                    let end = declarator
                        .child_by_field_name("dimensions")
                        .unwrap_or(name)
                        .end_byte();
                    Initializer::Absent { insert_at: end }
                }
            };
            fields.push(FieldDecl::new(
                self.text(name),
                modifiers,
                declared_type.clone(),
                initializer,
                tags.clone(),
            ));
        }
        fields
    }

    fn tag(&self, node: Node) -> Tag {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.name_text(n))
            .unwrap_or_default();
        let candidates = self.unit.resolve_type_name(&name);

        let mut args = Vec::new();
        if let Some(arguments) = node.child_by_field_name("arguments") {
            let mut cursor = arguments.walk();
            for arg in arguments.named_children(&mut cursor) {
                match arg.kind() {
                    kind if is_comment(kind) => {}
                    "element_value_pair" => {
                        let key = arg.child_by_field_name("key");
                        let value = arg.child_by_field_name("value");
                        if let (Some(key), Some(value)) = (key, value) {
                            args.push((self.text(key).to_string(), self.tag_arg(value)));
                        }
                    }
                    _ => args.push(("value".to_string(), self.tag_arg(arg))),
                }
            }
        }

        Tag {
            name,
            candidates,
            args,
        }
    }

    fn tag_arg(&self, node: Node) -> TagArg {
        let text = self.text(node);
        if node.kind() == "string_literal" {
            if let Some(value) = literal::unquote_string(text) {
                return TagArg::Str(value);
            }
        }
        TagArg::Expr(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"package com.example;

import net.tags.Inject;
import static java.lang.Math.max;

public class Sample {
    @Inject("version")
    public static final String VERSION = "dev";

    @Inject(value = "build", note = "x")
    private static final int BUILD = 0, OTHER;

    @com.example.Marker
    static String notFinal = "a";

    interface Keys {
        @Inject("key") String KEY = "k";
    }

    enum Mode {
        A, B;
        @Inject("mode") static final long MODE = 1L;
    }
}
"#;

    #[test]
    fn test_parse_structure() {
        let mut parser = JavaParser::new().unwrap();
        let unit = parser.parse(SAMPLE).unwrap();

        assert_eq!(unit.package.as_deref(), Some("com.example"));
        assert_eq!(unit.imports.len(), 2);
        assert!(unit.imports[1].is_static);

        let names: Vec<_> = unit
            .walk()
            .into_iter()
            .map(|id| unit.decl(id).name.clone())
            .collect();
        assert_eq!(names, ["Sample", "Keys", "Mode"]);

        let version = unit.field("Sample", "VERSION").unwrap();
        assert!(version.modifiers.is_constant());
        assert!(version.is_string_typed());
        assert_eq!(version.initializer_text(), Some("\"dev\""));
        assert!(version.tags[0].is("net.tags.Inject"));
        assert_eq!(version.tags[0].string_arg("value"), Some("version"));
    }

    #[test]
    fn test_multiple_declarators_share_tags() {
        let mut parser = JavaParser::new().unwrap();
        let unit = parser.parse(SAMPLE).unwrap();

        let build = unit.field("Sample", "BUILD").unwrap();
        let other = unit.field("Sample", "OTHER").unwrap();
        assert_eq!(build.tags, other.tags);
        assert_eq!(build.tags[0].string_arg("value"), Some("build"));
        assert_eq!(build.tags[0].string_arg("note"), Some("x"));
        assert!(matches!(other.initializer, Initializer::Absent { .. }));
    }

    #[test]
    fn test_implicit_and_explicit_modifiers() {
        let mut parser = JavaParser::new().unwrap();
        let unit = parser.parse(SAMPLE).unwrap();

        assert!(unit.field("Keys", "KEY").unwrap().modifiers.is_constant());
        assert!(unit.field("Mode", "MODE").unwrap().modifiers.is_constant());

        let not_final = unit.field("Sample", "notFinal").unwrap();
        assert!(not_final.modifiers.is_static);
        assert!(!not_final.modifiers.is_final);
        assert!(not_final.tags[0].is("com.example.Marker"));
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let mut parser = JavaParser::new().unwrap();
        let err = parser
            .parse("class Broken {\n    static final int X = ;\n}\n")
            .unwrap_err();
        match err {
            SourceError::Syntax { line, .. } => assert!((1..=3).contains(&line)),
            other => panic!("Expected syntax error, got {other:?}"),
        }
    }
}
