/*!
# Constant Cache

Persists the constants consumed by the last injection run so the next run
can be skipped when none of them resolve differently.

The file holds one `key[=value]` line per entry. A line without a
separator records a key that resolved to nothing. Inside keys `=` is
written as `\=`; backslashes, carriage returns and newlines are escaped
as `\\`, `\r` and `\n` in both keys and values.
*/

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::debug;

use crate::constants::{ConsumedConstants, ProviderChain};

/// File name of the cache inside the task's build directory
pub const CACHE_FILE_NAME: &str = "constantscache.txt";

#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("Failed to read constant cache {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write constant cache {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Key to value-or-null mapping from a previous run.
///
/// Equality ignores entry order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheRecord {
    entries: IndexMap<String, Option<String>>,
}

impl CacheRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record built from the constants consumed by a run
    pub fn persist(consumed: &ConsumedConstants) -> Self {
        Self {
            entries: consumed
                .iter()
                .map(|(key, value)| (key.to_string(), value.map(str::to_string)))
                .collect(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Option<String>) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.entries.get(key).map(|value| value.as_deref())
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

    /// Whether every recorded key still resolves to the recorded value.
    ///
    /// Keys the previous run did not consume are not considered.
    pub fn is_up_to_date(&self, chain: &ProviderChain) -> bool {
        for (key, cached) in self.iter() {
            let current = chain.resolve_constant(key).map(|value| value.to_string());
            if current.as_deref() != cached {
                debug!(key, ?cached, ?current, "cached constant changed");
                return false;
            }
        }
        true
    }

    pub fn parse(text: &str) -> Self {
        let mut record = Self::new();
        for line in text.lines() {
            let (key, value) = split_line(line);
            record.entries.insert(key, value);
        }
        record
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            escape_into(&mut out, key, true);
            if let Some(value) = value {
                out.push('=');
                escape_into(&mut out, value, false);
            }
            out.push('\n');
        }
        out
    }
}

fn escape_into(out: &mut String, text: &str, is_key: bool) {
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '=' if is_key => out.push_str("\\="),
            c => out.push(c),
        }
    }
}

// Splits at the first unescaped `=`, unescaping both halves
fn split_line(line: &str) -> (String, Option<String>) {
    let mut key = String::new();
    let mut value: Option<String> = None;
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c == '=' && value.is_none() {
            value = Some(String::new());
            continue;
        }
        let decoded = if c == '\\' {
            match chars.next() {
                Some('n') => '\n',
                Some('r') => '\r',
                Some(other) => other,
                None => '\\',
            }
        } else {
            c
        };
        value.as_mut().unwrap_or(&mut key).push(decoded);
    }
    (key, value)
}

/// Reads and writes the cache file of one injection task
#[derive(Debug, Clone)]
pub struct CacheGuard {
    path: PathBuf,
}

impl CacheGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Cache for task `task_name` under `build_dir`
    pub fn for_task(build_dir: &Path, task_name: &str) -> Self {
        Self::new(build_dir.join(task_name).join(CACHE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Previous record, or `None` when no cache has been written yet
    pub fn load(&self) -> Result<Option<CacheRecord>, CacheError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path).map_err(|source| CacheError::Read {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(CacheRecord::parse(&text)))
    }

    /// Whether the previous run is still valid. `ignore_cache` always
    /// forces a run, as does a missing cache file.
    pub fn is_up_to_date(
        &self,
        chain: &ProviderChain,
        ignore_cache: bool,
    ) -> Result<bool, CacheError> {
        if ignore_cache {
            return Ok(false);
        }
        Ok(self
            .load()?
            .is_some_and(|record| record.is_up_to_date(chain)))
    }

    /// Overwrite the cache with the constants consumed by this run
    pub fn store(&self, consumed: &ConsumedConstants) -> Result<CacheRecord, CacheError> {
        let record = CacheRecord::persist(consumed);
        let write_error = |source| CacheError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        fs::write(&self.path, record.serialize()).map_err(write_error)?;
        debug!(path = %self.path.display(), entries = record.len(), "wrote constant cache");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::constants::Constant;

    fn consumed() -> ConsumedConstants {
        let mut consumed = ConsumedConstants::new();
        consumed.record("version", Some(&Constant::from("1.0")));
        consumed.record("build", Some(&Constant::Int(12)));
        consumed.record("missing", None);
        consumed
    }

    fn chain() -> ProviderChain {
        let mut chain = ProviderChain::new();
        chain.constant("version", "1.0");
        chain.constant("build", 12);
        chain
    }

    #[test]
    fn test_serialized_format() {
        let text = CacheRecord::persist(&consumed()).serialize();
        assert_eq!(text, "build=12\nmissing\nversion=1.0\n");
    }

    #[test]
    fn test_round_trip_is_up_to_date() {
        let record = CacheRecord::parse(&CacheRecord::persist(&consumed()).serialize());

        assert_eq!(record, CacheRecord::persist(&consumed()));
        assert!(record.is_up_to_date(&chain()));
    }

    #[test]
    fn test_changed_value_invalidates() {
        let record = CacheRecord::persist(&consumed());

        let mut changed = ProviderChain::new();
        changed.constant("version", "1.1");
        changed.constant("build", 12);
        assert!(!record.is_up_to_date(&changed));

        // a key that resolved to nothing before and now resolves
        let mut appeared = chain();
        appeared.constant("missing", "now");
        assert!(!record.is_up_to_date(&appeared));

        // a key that resolved before and now does not
        let mut gone = ProviderChain::new();
        gone.constant("version", "1.0");
        assert!(!record.is_up_to_date(&gone));
    }

    #[test]
    fn test_empty_record_is_up_to_date() {
        assert!(CacheRecord::new().is_up_to_date(&ProviderChain::new()));
    }

    #[test]
    fn test_escaping_round_trip() {
        let mut record = CacheRecord::new();
        record.insert("a=b", Some("c=d".to_string()));
        record.insert("back\\slash", Some("multi\nline".to_string()));
        record.insert("x=", None);

        let text = record.serialize();
        assert!(text.starts_with("a\\=b=c=d\n"));
        assert_eq!(CacheRecord::parse(&text), record);
    }

    #[test]
    fn test_equality_ignores_order() {
        let first = CacheRecord::parse("a=1\nb\n");
        let second = CacheRecord::parse("b\na=1\n");
        assert_eq!(first, second);
        assert_ne!(first, CacheRecord::parse("a=1\nb=\n"));
    }

    #[test]
    fn test_guard_store_and_check() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let guard = CacheGuard::for_task(dir.path(), "injectConstants");

        assert!(guard.load()?.is_none());
        assert!(!guard.is_up_to_date(&chain(), false)?);

        guard.store(&consumed())?;
        assert!(guard.path().ends_with("injectConstants/constantscache.txt"));
        assert!(guard.is_up_to_date(&chain(), false)?);
        assert!(!guard.is_up_to_date(&chain(), true)?);
        Ok(())
    }
}
