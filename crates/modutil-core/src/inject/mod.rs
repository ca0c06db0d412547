/*!
# Constant Injection

Rewrites copied source and resource files with constants resolved from a
[`ProviderChain`](crate::constants::ProviderChain).

## Architecture

- `FileRewriter`: trait for per-file rewriting rules
- `SourceRewriter`: structural rewriting of tagged Java fields
- `ResourceRewriter`: regex substitution in resource text
- `CacheGuard`: decides whether a previous run is still valid
- `InjectionTask`: copies source trees through the rewriters
*/

pub mod cache;
pub mod resource;
pub mod source;
pub mod task;

use crate::constants::{ConsumedConstants, ProviderChain};

/// A rule that rewrites the content of files it claims
pub trait FileRewriter: Send {
    /// Human-readable name for this rewriter
    fn name(&self) -> &'static str;

    /// Whether this rewriter handles the file at `relative_path`
    /// (`/`-separated, relative to the source root)
    fn matches(&self, relative_path: &str) -> bool;

    /// Rewrite file content, recording every constant key consulted
    fn rewrite(
        &mut self,
        relative_path: &str,
        content: &str,
        chain: &ProviderChain,
        consumed: &mut ConsumedConstants,
    ) -> crate::Result<String>;
}

/// Per-rewriter execution statistics
#[derive(Debug, Default, Clone)]
pub struct RewriteStats {
    pub rewriter: String,
    pub files: u64,
    pub files_changed: u64,
    pub errors: u64,
}

impl RewriteStats {
    pub fn new(rewriter: impl Into<String>) -> Self {
        Self {
            rewriter: rewriter.into(),
            ..Default::default()
        }
    }

    pub fn change_rate(&self) -> f64 {
        if self.files == 0 {
            0.0
        } else {
            (self.files_changed as f64) / (self.files as f64)
        }
    }
}
