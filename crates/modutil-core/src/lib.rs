//! # ModUtil Core
//!
//! Build-time transformation engines used while packaging a module:
//! - Constant provider chain resolving keys to injectable values
//! - Java source rewriting of tagged `static final` fields
//! - Regex driven substitution in resource files
//! - Constant cache guard for skipping unaffected runs
//! - Jar shading (namespace renaming inside compiled class files)
//!
//! The engines are synchronous and operate on in-memory inputs; the
//! [`inject::InjectionTask`] and [`shade::ShadeTask`] types wire them to
//! the filesystem for a host build tool or the `modutil` binary.

#![warn(clippy::all)]

pub mod ast;
pub mod config;
pub mod constants;
pub mod inject;
pub mod parser;
pub mod shade;

// Re-export commonly used types
pub use ast::{DeclId, FieldDecl, Modifiers, SourceUnit, Tag, TypeDecl};
pub use config::{ConfigError, ModutilConfig};
pub use constants::{
    Constant, ConstantSource, ConsumedConstants, ProvidedValue, ProviderChain,
};
pub use inject::{
    cache::{CacheError, CacheGuard, CacheRecord},
    resource::{ResourcePattern, ResourceError, ResourceRewriter},
    source::{SourceRewriter, TagMatcher},
    task::{InjectionSummary, InjectionTask, SourceMapping, TaskOutcome},
    FileRewriter,
};
pub use parser::{JavaParser, SourceError};
pub use shade::{
    archive::{remap_archive, remap_entries, ArchiveEntry, ShadeSummary, ShadeTask},
    RenameRule, ShadeError, ShadeRemapper,
};

/// ModUtil version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for ModUtil components
///
/// Honors `RUST_LOG`, falling back to `modutil_core=info`. Calling this more
/// than once is harmless.
pub fn init_tracing() {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "modutil_core=info".parse() {
        filter = filter.add_directive(directive);
    }
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Error types for ModUtil operations
#[derive(thiserror::Error, Debug)]
pub enum ModutilError {
    /// Source parsing or rendering error
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Resource substitution error
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    /// Constant cache error
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Archive remapping error
    #[error("Shade error: {0}")]
    Shade(#[from] ShadeError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Filesystem error outside of the engines above
    #[error("I/O error on {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ModutilError {
    pub(crate) fn io(path: impl Into<std::path::PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for ModUtil operations
pub type Result<T> = std::result::Result<T, ModutilError>;
