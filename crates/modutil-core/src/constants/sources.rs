use std::collections::HashMap;
use std::path::Path;

use indexmap::IndexMap;

use super::{Constant, ConstantSource, ProvidedValue};
use crate::config::ConfigError;

/// One constant under one key
pub struct SingleConstant {
    name: String,
    key: String,
    value: ProvidedValue,
}

impl SingleConstant {
    pub fn new(key: impl Into<String>, value: impl Into<ProvidedValue>) -> Self {
        let key = key.into();
        Self {
            name: format!("constant:{key}"),
            key,
            value: value.into(),
        }
    }
}

impl ConstantSource for SingleConstant {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, key: &str) -> Option<ProvidedValue> {
        (key == self.key).then(|| self.value.clone())
    }
}

/// A fixed table of constants
pub struct MapConstants {
    name: String,
    values: IndexMap<String, Constant>,
}

impl MapConstants {
    pub fn new(name: impl Into<String>, values: IndexMap<String, Constant>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ConstantSource for MapConstants {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, key: &str) -> Option<ProvidedValue> {
        self.values.get(key).cloned().map(ProvidedValue::Immediate)
    }
}

/// Arbitrary lookup closure
pub struct FnConstants<F>
where
    F: Fn(&str) -> Option<ProvidedValue> + Send + Sync,
{
    name: String,
    lookup: F,
}

impl<F> FnConstants<F>
where
    F: Fn(&str) -> Option<ProvidedValue> + Send + Sync,
{
    pub fn new(name: impl Into<String>, lookup: F) -> Self {
        Self {
            name: name.into(),
            lookup,
        }
    }
}

impl<F> ConstantSource for FnConstants<F>
where
    F: Fn(&str) -> Option<ProvidedValue> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, key: &str) -> Option<ProvidedValue> {
        (self.lookup)(key)
    }
}

/// Project properties read from a `key=value` file.
///
/// Accepts `=` or `:` separators and `#`/`!` comment lines. Values are
/// always strings.
pub struct PropertiesConstants {
    name: String,
    values: HashMap<String, String>,
}

impl PropertiesConstants {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(format!("properties:{}", path.display()), &text))
    }

    pub fn parse(name: impl Into<String>, text: &str) -> Self {
        let mut values = HashMap::new();
        for line in text.lines() {
            let line = line.trim_start();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let (key, value) = match line.find(['=', ':']) {
                Some(at) => (&line[..at], &line[at + 1..]),
                None => (line, ""),
            };
            values.insert(key.trim_end().to_string(), value.trim_start().to_string());
        }
        Self {
            name: name.into(),
            values,
        }
    }
}

impl ConstantSource for PropertiesConstants {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, key: &str) -> Option<ProvidedValue> {
        self.values
            .get(key)
            .map(|value| ProvidedValue::Immediate(Constant::String(value.clone())))
    }
}

/// Environment variables under a prefix.
///
/// Key `mod.version` with prefix `MODUTIL_` reads `MODUTIL_MOD_VERSION`.
/// Values are read at lookup time.
pub struct EnvConstants {
    name: String,
    prefix: String,
}

impl EnvConstants {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            name: format!("env:{prefix}"),
            prefix,
        }
    }

    pub fn variable_name(&self, key: &str) -> String {
        let mut name = self.prefix.clone();
        name.extend(key.chars().map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        }));
        name
    }
}

impl ConstantSource for EnvConstants {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, key: &str) -> Option<ProvidedValue> {
        std::env::var(self.variable_name(key))
            .ok()
            .map(|value| ProvidedValue::Immediate(Constant::String(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_properties_parsing() {
        let props = PropertiesConstants::parse(
            "test",
            "# comment\n! also comment\nmod_version = 1.2.3\nname:Example\nempty\n  spaced.key=a=b\n",
        );

        let get = |key: &str| props.lookup(key).and_then(ProvidedValue::force);
        assert_eq!(get("mod_version"), Some(Constant::from("1.2.3")));
        assert_eq!(get("name"), Some(Constant::from("Example")));
        assert_eq!(get("empty"), Some(Constant::from("")));
        assert_eq!(get("spaced.key"), Some(Constant::from("a=b")));
        assert_eq!(get("comment"), None);
    }

    #[test]
    fn test_env_variable_name() {
        let env = EnvConstants::new("MODUTIL_");
        assert_eq!(env.variable_name("mod.version"), "MODUTIL_MOD_VERSION");
        assert_eq!(env.variable_name("buildNumber"), "MODUTIL_BUILDNUMBER");
    }

    #[test]
    fn test_map_constants_lookup() {
        let mut values = IndexMap::new();
        values.insert("count".to_string(), Constant::Int(3));
        let map = MapConstants::new("inline", values);

        assert_eq!(map.len(), 1);
        assert_eq!(
            map.lookup("count").and_then(ProvidedValue::force),
            Some(Constant::Int(3))
        );
        assert!(map.lookup("missing").is_none());
    }
}
