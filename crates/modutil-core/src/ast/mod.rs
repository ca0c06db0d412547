// Structural view of a Java compilation unit.
//
// Declarations live in an arena and refer to nested declarations by index,
// so rewriting never needs parent pointers. Every node keeps the byte spans
// it was parsed from; rendering splices replacements into the original text.

use std::ops::Range;

pub mod render;

/// Index of a declaration in [`SourceUnit`]'s arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Class,
    Interface,
    Enum,
    Record,
    AnnotationType,
}

impl DeclKind {
    /// Fields of interfaces and annotation types are implicitly static final
    pub fn implicit_constants(self) -> bool {
        matches!(self, DeclKind::Interface | DeclKind::AnnotationType)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub is_static: bool,
    pub is_final: bool,
}

impl Modifiers {
    pub fn is_constant(&self) -> bool {
        self.is_static && self.is_final
    }
}

/// Import declaration of the unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Dotted name without the trailing `.*`
    pub name: String,
    pub is_static: bool,
    pub is_wildcard: bool,
}

/// An argument of a tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagArg {
    /// A string literal, already unescaped
    Str(String),
    /// Any other expression, kept as source text
    Expr(String),
}

/// A declarative marker (annotation) attached to a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Name as written in source, e.g. `Inject` or `com.example.Inject`
    pub name: String,
    /// Qualified names the written name may refer to
    pub candidates: Vec<String>,
    /// Named arguments; a lone unnamed argument is stored as `value`
    pub args: Vec<(String, TagArg)>,
}

impl Tag {
    pub fn is(&self, qualified_name: &str) -> bool {
        self.candidates.iter().any(|c| c == qualified_name)
    }

    /// String content of the named argument, if it is a string literal
    pub fn string_arg(&self, name: &str) -> Option<&str> {
        self.args.iter().find_map(|(arg, value)| match value {
            TagArg::Str(s) if arg == name => Some(s.as_str()),
            _ => None,
        })
    }
}

/// Where a field's initializer sits in the source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Initializer {
    /// Span of the existing initializer expression
    Present { span: Range<usize>, text: String },
    /// No initializer; a new one is inserted at this offset
    Absent { insert_at: usize },
}

/// One declared variable of a field declaration
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub modifiers: Modifiers,
    /// Declared type as written, e.g. `String` or `java.lang.String`
    pub declared_type: String,
    pub initializer: Initializer,
    pub tags: Vec<Tag>,
    replacement: Option<String>,
}

impl FieldDecl {
    pub fn new(
        name: impl Into<String>,
        modifiers: Modifiers,
        declared_type: impl Into<String>,
        initializer: Initializer,
        tags: Vec<Tag>,
    ) -> Self {
        Self {
            name: name.into(),
            modifiers,
            declared_type: declared_type.into(),
            initializer,
            tags,
            replacement: None,
        }
    }

    pub fn is_string_typed(&self) -> bool {
        matches!(self.declared_type.as_str(), "String" | "java.lang.String")
    }

    /// Initializer text as it will be rendered
    pub fn initializer_text(&self) -> Option<&str> {
        match (&self.replacement, &self.initializer) {
            (Some(text), _) => Some(text),
            (None, Initializer::Present { text, .. }) => Some(text),
            (None, Initializer::Absent { .. }) => None,
        }
    }

    /// Replace the initializer with a literal expression
    pub fn set_literal_initializer(&mut self, literal: impl Into<String>) {
        self.replacement = Some(literal.into());
    }

    pub fn is_modified(&self) -> bool {
        self.replacement.is_some()
    }

    pub(crate) fn replacement(&self) -> Option<&str> {
        self.replacement.as_deref()
    }
}

/// A type declaration with its fields and member types
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: String,
    pub kind: DeclKind,
    pub fields: Vec<FieldDecl>,
    pub nested: Vec<DeclId>,
}

/// Parsed compilation unit
#[derive(Debug, Clone)]
pub struct SourceUnit {
    text: String,
    pub package: Option<String>,
    pub imports: Vec<Import>,
    decls: Vec<TypeDecl>,
    roots: Vec<DeclId>,
}

impl SourceUnit {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            package: None,
            imports: Vec::new(),
            decls: Vec::new(),
            roots: Vec::new(),
        }
    }

    /// Original text the unit was parsed from
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Add a declaration to the arena; `parent` of `None` makes it top-level
    pub fn add_decl(&mut self, decl: TypeDecl, parent: Option<DeclId>) -> DeclId {
        let id = DeclId(self.decls.len());
        self.decls.push(decl);
        match parent {
            Some(parent) => self.decls[parent.0].nested.push(id),
            None => self.roots.push(id),
        }
        id
    }

    pub fn roots(&self) -> &[DeclId] {
        &self.roots
    }

    pub fn decl(&self, id: DeclId) -> &TypeDecl {
        &self.decls[id.0]
    }

    pub fn decl_mut(&mut self, id: DeclId) -> &mut TypeDecl {
        &mut self.decls[id.0]
    }

    pub fn decls(&self) -> impl Iterator<Item = (DeclId, &TypeDecl)> {
        self.decls.iter().enumerate().map(|(i, d)| (DeclId(i), d))
    }

    /// Find a declaration by its simple name
    pub fn find_decl(&self, name: &str) -> Option<DeclId> {
        self.decls().find(|(_, d)| d.name == name).map(|(id, _)| id)
    }

    /// Find a field by declaration and field name
    pub fn field(&self, decl: &str, field: &str) -> Option<&FieldDecl> {
        let id = self.find_decl(decl)?;
        self.decl(id).fields.iter().find(|f| f.name == field)
    }

    /// Declarations in depth-first pre-order
    pub fn walk(&self) -> Vec<DeclId> {
        let mut order = Vec::with_capacity(self.decls.len());
        let mut stack: Vec<DeclId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.decls[id.0].nested.iter().rev().copied());
        }
        order
    }

    /// Candidate qualified names for a type name as written in this unit
    pub fn resolve_type_name(&self, written: &str) -> Vec<String> {
        if written.contains('.') {
            return vec![written.to_string()];
        }
        let suffix = format!(".{written}");
        if let Some(import) = self
            .imports
            .iter()
            .find(|i| !i.is_wildcard && i.name.ends_with(&suffix))
        {
            return vec![import.name.clone()];
        }
        let mut candidates: Vec<String> = self
            .imports
            .iter()
            .filter(|i| i.is_wildcard)
            .map(|i| format!("{}.{written}", i.name))
            .collect();
        candidates.push(match &self.package {
            Some(package) => format!("{package}.{written}"),
            None => written.to_string(),
        });
        candidates
    }
}
