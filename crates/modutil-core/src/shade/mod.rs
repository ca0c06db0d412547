/*!
# Shading

Namespace renaming inside compiled class files packaged in a jar.

## Architecture

- `ShadeRemapper`: ordered rename rules over `/`-separated internal names
- `signature`: descriptor and generic signature rewriting
- `classfile`: constant pool level rewriting of a single class file
- `archive`: entry-by-entry jar transform
*/

use std::borrow::Cow;
use std::path::PathBuf;

pub mod archive;
pub mod classfile;
pub mod mutf8;
pub mod signature;

pub use classfile::{ClassFile, ClassFileError};
pub use signature::SignatureError;

#[derive(thiserror::Error, Debug)]
pub enum ShadeError {
    #[error("Invalid rename rule `{from}` -> `{to}`: {reason}")]
    InvalidRule {
        from: String,
        to: String,
        reason: &'static str,
    },

    #[error("Corrupt class file {entry}: {source}")]
    Corrupt {
        entry: String,
        #[source]
        source: ClassFileError,
    },

    #[error("Two entries map to {name}")]
    DuplicateEntry { name: String },

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error on entry {entry}: {source}")]
    Entry {
        entry: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Replace one package prefix with another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameRule {
    from: String,
    to: String,
}

impl RenameRule {
    /// Rule from `from` to `to`. Dotted package names are accepted and
    /// converted to `/` form.
    pub fn new(from: &str, to: &str) -> Result<Self, ShadeError> {
        let from_slashed = from.replace('.', "/");
        let to_slashed = to.replace('.', "/");
        let invalid = |reason| ShadeError::InvalidRule {
            from: from.to_string(),
            to: to.to_string(),
            reason,
        };
        for prefix in [&from_slashed, &to_slashed] {
            if prefix.is_empty() {
                return Err(invalid("empty package"));
            }
            if prefix.split('/').any(str::is_empty) {
                return Err(invalid("empty package segment"));
            }
        }
        Ok(Self {
            from: from_slashed,
            to: to_slashed,
        })
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    /// Renamed form of `name`, if `from` is a whole-segment prefix of it
    pub fn apply(&self, name: &str) -> Option<String> {
        let rest = name.strip_prefix(self.from.as_str())?;
        rest.starts_with('/').then(|| format!("{}{rest}", self.to))
    }

    /// The same rule in the opposite direction
    pub fn reversed(&self) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
        }
    }
}

/// Ordered set of rename rules; the first matching rule wins
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShadeRemapper {
    rules: Vec<RenameRule>,
}

impl ShadeRemapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rename(&mut self, from: &str, to: &str) -> Result<(), ShadeError> {
        self.add_rule(RenameRule::new(from, to)?);
        Ok(())
    }

    pub fn add_rule(&mut self, rule: RenameRule) {
        self.rules.push(rule);
    }

    pub fn with_rename(mut self, from: &str, to: &str) -> Result<Self, ShadeError> {
        self.add_rename(from, to)?;
        Ok(self)
    }

    pub fn rules(&self) -> &[RenameRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Remapper undoing this one, rules kept in order
    pub fn reversed(&self) -> Self {
        Self {
            rules: self.rules.iter().map(RenameRule::reversed).collect(),
        }
    }

    /// Map an internal name (or entry path); unmatched names are borrowed back
    pub fn map<'a>(&self, name: &'a str) -> Cow<'a, str> {
        self.rules
            .iter()
            .find_map(|rule| rule.apply(name))
            .map_or(Cow::Borrowed(name), Cow::Owned)
    }
}
