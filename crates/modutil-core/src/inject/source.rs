/*!
# Source Rewriter

Injects constants into tagged `static final` fields of Java sources.

A field such as

```java
@Inject("greeting")
public static final String GREETING = "dev";
```

gets its initializer replaced by the literal the provider chain resolves
`greeting` to. Fields without the configured tag, or not both static and
final, are left alone.
*/

use tracing::{debug, warn};

use super::FileRewriter;
use crate::ast::render::{quote_string, ToJavaLiteral};
use crate::ast::{FieldDecl, SourceUnit, Tag};
use crate::constants::{Constant, ConsumedConstants, ProviderChain};
use crate::parser::{JavaParser, SourceError};

/// Argument consulted when the configured one is missing
pub const DEFAULT_TAG_ARGUMENT: &str = "value";

/// Selects the tag and argument that carry constant keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMatcher {
    name: String,
    argument: String,
}

impl TagMatcher {
    /// Match `name` and read the key from its `value` argument
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_argument(name, DEFAULT_TAG_ARGUMENT)
    }

    pub fn with_argument(name: impl Into<String>, argument: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            argument: argument.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn argument(&self) -> &str {
        &self.argument
    }

    /// Lookup key carried by the first matching tag.
    ///
    /// Falls back to the `value` argument when the configured argument is
    /// missing; a matching tag without either counts as absent.
    pub fn lookup_key<'t>(&self, tags: &'t [Tag]) -> Option<&'t str> {
        let tag = tags.iter().find(|tag| tag.is(&self.name))?;
        let key = tag
            .string_arg(&self.argument)
            .or_else(|| tag.string_arg(DEFAULT_TAG_ARGUMENT));
        if key.is_none() {
            warn!(
                tag = %tag.name,
                argument = %self.argument,
                "tag without a string argument, skipping field"
            );
        }
        key
    }
}

/// Literal to write for a resolved constant, if the field accepts it
fn literal_for(field: &FieldDecl, value: &Constant) -> Option<String> {
    match value {
        Constant::String(_)
        | Constant::Int(_)
        | Constant::Long(_)
        | Constant::Float(_)
        | Constant::Double(_) => Some(value.to_java_literal()),
        other if field.is_string_typed() => Some(quote_string(&other.to_string())),
        _ => None,
    }
}

/// Rewrite every tagged constant field of `unit`, depth first through
/// nested declarations. Returns every key consulted with its resolution,
/// including keys that resolved to nothing.
pub fn rewrite_unit(
    unit: &mut SourceUnit,
    matcher: &TagMatcher,
    chain: &ProviderChain,
) -> ConsumedConstants {
    let mut consumed = ConsumedConstants::new();
    for id in unit.walk() {
        for field in unit.decl_mut(id).fields.iter_mut() {
            if !field.modifiers.is_constant() {
                continue;
            }
            let Some(key) = matcher.lookup_key(&field.tags) else {
                continue;
            };
            let key = key.to_string();
            let value = chain.resolve_constant(&key);
            consumed.record(key.as_str(), value.as_ref());

            let Some(value) = value else {
                debug!(key = %key, field = %field.name, "constant unresolved, keeping initializer");
                continue;
            };
            match literal_for(field, &value) {
                Some(literal) => {
                    debug!(key = %key, field = %field.name, literal = %literal, "injecting constant");
                    field.set_literal_initializer(literal);
                }
                None => debug!(
                    key = %key,
                    field = %field.name,
                    value_type = value.type_name(),
                    "constant type not applicable to field"
                ),
            }
        }
    }
    consumed
}

/// Rewriter for `.java` compilation units
pub struct SourceRewriter {
    parser: JavaParser,
    matcher: TagMatcher,
}

impl SourceRewriter {
    pub fn new(matcher: TagMatcher) -> Result<Self, SourceError> {
        Ok(Self {
            parser: JavaParser::new()?,
            matcher,
        })
    }

    pub fn matcher(&self) -> &TagMatcher {
        &self.matcher
    }

    /// Parse, rewrite and render one compilation unit
    pub fn rewrite_source(
        &mut self,
        source: &str,
        chain: &ProviderChain,
    ) -> Result<(String, ConsumedConstants), SourceError> {
        let mut unit = self.parser.parse(source)?;
        let consumed = rewrite_unit(&mut unit, &self.matcher, chain);
        let injected = unit
            .decls()
            .flat_map(|(_, decl)| decl.fields.iter())
            .filter(|field| field.is_modified())
            .count();
        debug!(fields = injected, keys = consumed.len(), "rewrote compilation unit");
        Ok((unit.render(), consumed))
    }
}

impl FileRewriter for SourceRewriter {
    fn name(&self) -> &'static str {
        "SourceRewriter"
    }

    fn matches(&self, relative_path: &str) -> bool {
        relative_path.ends_with(".java")
    }

    fn rewrite(
        &mut self,
        relative_path: &str,
        content: &str,
        chain: &ProviderChain,
        consumed: &mut ConsumedConstants,
    ) -> crate::Result<String> {
        let (rendered, keys) = self
            .rewrite_source(content, chain)
            .map_err(|e| e.in_file(relative_path))?;
        consumed.merge(keys);
        Ok(rendered)
    }
}
