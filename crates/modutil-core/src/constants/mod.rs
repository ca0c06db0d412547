/*!
# Constant Providers

Ordered chain of named lookup functions resolving a constant key to a value.
The first source returning a value wins; later sources are not consulted.

Sources are evaluated lazily per lookup, so a source may be backed by
something that cannot enumerate its keys (environment, closures).
*/

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

pub mod sources;
pub mod value;

pub use sources::{EnvConstants, FnConstants, MapConstants, PropertiesConstants, SingleConstant};
pub use value::{Constant, Deferred, ProvidedValue};

/// A named source of constants
///
/// Implementations must be safe to call concurrently and must not mutate
/// shared state as a side effect of a lookup.
pub trait ConstantSource: Send + Sync {
    /// Human-readable name for diagnostics
    fn name(&self) -> &str;

    /// Look up a key, returning `None` when this source does not know it
    fn lookup(&self, key: &str) -> Option<ProvidedValue>;
}

/// Ordered list of constant sources, first match wins
#[derive(Default)]
pub struct ProviderChain {
    sources: Vec<Box<dyn ConstantSource>>,
}

impl ProviderChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source after all previously registered ones
    pub fn push(&mut self, source: impl ConstantSource + 'static) {
        self.sources.push(Box::new(source));
    }

    pub fn with(mut self, source: impl ConstantSource + 'static) -> Self {
        self.push(source);
        self
    }

    /// Register a single named constant
    pub fn constant(&mut self, key: impl Into<String>, value: impl Into<Constant>) {
        self.push(SingleConstant::new(key, value.into()));
    }

    /// Register a closure as a source
    pub fn constants_fn<F>(&mut self, name: impl Into<String>, lookup: F)
    where
        F: Fn(&str) -> Option<ProvidedValue> + Send + Sync + 'static,
    {
        self.push(FnConstants::new(name, lookup));
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Names of registered sources in resolution order
    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.name())
    }

    /// Resolve a key without forcing deferred values.
    pub fn resolve(&self, key: &str) -> Option<ProvidedValue> {
        for source in &self.sources {
            if let Some(value) = source.lookup(key) {
                debug!(key, source = source.name(), "resolved constant");
                return Some(value);
            }
        }
        None
    }

    /// Resolve a key and force the result into a concrete constant
    pub fn resolve_constant(&self, key: &str) -> Option<Constant> {
        self.resolve(key).and_then(ProvidedValue::force)
    }
}

impl fmt::Debug for ProviderChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.source_names()).finish()
    }
}

/// Keys consumed during a run with the text form of what they resolved to.
///
/// Later records for the same key overwrite earlier ones. Iteration is
/// ordered by key so persisted caches are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumedConstants {
    entries: BTreeMap<String, Option<String>>,
}

impl ConsumedConstants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: impl Into<String>, value: Option<&Constant>) {
        self.entries
            .insert(key.into(), value.map(|constant| constant.to_string()));
    }

    pub fn merge(&mut self, other: ConsumedConstants) {
        self.entries.extend(other.entries);
    }

    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.entries.get(key).map(|value| value.as_deref())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_deref()))
    }
}

impl IntoIterator for ConsumedConstants {
    type Item = (String, Option<String>);
    type IntoIter = btree_map::IntoIter<String, Option<String>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<(String, Option<String>)> for ConsumedConstants {
    fn from_iter<I: IntoIterator<Item = (String, Option<String>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
