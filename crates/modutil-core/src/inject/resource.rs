/*!
# Resource Rewriter

Regex substitution of constants in non-source files.

Each rule pairs a path pattern (matched against the whole relative path)
with a content pattern. Every match of the content pattern is replaced by
the constant named by its first participating capture group, or by the
whole match when the pattern has no group that took part.
*/

use regex::Regex;
use tracing::debug;

use super::FileRewriter;
use crate::constants::{ConsumedConstants, ProviderChain};

#[derive(thiserror::Error, Debug)]
pub enum ResourceError {
    #[error("Invalid {which} pattern `{pattern}`: {source}")]
    InvalidPattern {
        which: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// One path-pattern / content-pattern rule
#[derive(Debug, Clone)]
pub struct ResourcePattern {
    path_source: String,
    path: Regex,
    content: Regex,
}

impl ResourcePattern {
    pub fn new(path: &str, content: &str) -> Result<Self, ResourceError> {
        let anchored = Regex::new(&format!("^(?:{path})$")).map_err(|source| {
            ResourceError::InvalidPattern {
                which: "path",
                pattern: path.to_string(),
                source,
            }
        })?;
        let content_regex =
            Regex::new(content).map_err(|source| ResourceError::InvalidPattern {
                which: "content",
                pattern: content.to_string(),
                source,
            })?;
        Ok(Self {
            path_source: path.to_string(),
            path: anchored,
            content: content_regex,
        })
    }

    pub fn path_pattern(&self) -> &str {
        &self.path_source
    }

    pub fn content_pattern(&self) -> &str {
        self.content.as_str()
    }

    /// Whether the whole path matches
    pub fn matches_path(&self, path: &str) -> bool {
        self.path.is_match(path)
    }

    /// Single forward pass over `content`; substituted text is never rescanned.
    pub fn apply(
        &self,
        content: &str,
        chain: &ProviderChain,
        consumed: &mut ConsumedConstants,
    ) -> String {
        let mut out = String::with_capacity(content.len());
        let mut last = 0;
        for caps in self.content.captures_iter(content) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let key = caps
                .iter()
                .skip(1)
                .flatten()
                .next()
                .unwrap_or(whole)
                .as_str();

            let value = chain.resolve_constant(key);
            consumed.record(key, value.as_ref());

            out.push_str(&content[last..whole.start()]);
            match value {
                Some(value) => out.push_str(&value.to_string()),
                None => out.push_str(whole.as_str()),
            }
            last = whole.end();
        }
        out.push_str(&content[last..]);
        out
    }
}

/// Applies all resource rules matching a file's path, in registration order
#[derive(Debug, Clone, Default)]
pub struct ResourceRewriter {
    patterns: Vec<ResourcePattern>,
}

impl ResourceRewriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule after all existing ones
    pub fn pattern(&mut self, path: &str, content: &str) -> Result<(), ResourceError> {
        self.patterns.push(ResourcePattern::new(path, content)?);
        Ok(())
    }

    pub fn patterns(&self) -> &[ResourcePattern] {
        &self.patterns
    }

    /// Rewrite `content` of the file at `path`. Each matching rule works on
    /// the previous rule's output.
    pub fn rewrite_resource(
        &self,
        path: &str,
        content: &str,
        chain: &ProviderChain,
    ) -> (String, ConsumedConstants) {
        let mut consumed = ConsumedConstants::new();
        let mut current = content.to_string();
        for pattern in self.patterns.iter().filter(|p| p.matches_path(path)) {
            debug!(path, pattern = pattern.path_pattern(), "applying resource pattern");
            current = pattern.apply(&current, chain, &mut consumed);
        }
        (current, consumed)
    }
}

impl FileRewriter for ResourceRewriter {
    fn name(&self) -> &'static str {
        "ResourceRewriter"
    }

    fn matches(&self, relative_path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches_path(relative_path))
    }

    fn rewrite(
        &mut self,
        relative_path: &str,
        content: &str,
        chain: &ProviderChain,
        consumed: &mut ConsumedConstants,
    ) -> crate::Result<String> {
        let (rewritten, keys) = self.rewrite_resource(relative_path, content, chain);
        consumed.merge(keys);
        Ok(rewritten)
    }
}
