/*!
# Injection Task

Copies one or more source trees into a destination directory, passing
every file through the first [`FileRewriter`] that claims it. Files no
rewriter claims are copied byte for byte.

The constants consumed by a run are stored through a [`CacheGuard`]; the
next run is skipped when all of them still resolve to the stored values.
*/

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use super::cache::CacheGuard;
use super::resource::ResourceRewriter;
use super::source::{SourceRewriter, TagMatcher};
use super::{FileRewriter, RewriteStats};
use crate::constants::{ConsumedConstants, ProviderChain};
use crate::{ModutilError, Result};

/// Task name used when none is configured
pub const DEFAULT_TASK_NAME: &str = "injectConstants";

/// Copy `from` into `<destination>/<into>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMapping {
    pub from: PathBuf,
    pub into: PathBuf,
}

impl SourceMapping {
    pub fn new(from: impl Into<PathBuf>, into: impl Into<PathBuf>) -> Self {
        Self {
            from: from.into(),
            into: into.into(),
        }
    }
}

/// Result of [`InjectionTask::run`]
#[derive(Debug)]
pub enum TaskOutcome {
    /// Cached constants are unchanged and the destination exists
    UpToDate,
    Executed(InjectionSummary),
}

impl TaskOutcome {
    pub fn is_up_to_date(&self) -> bool {
        matches!(self, TaskOutcome::UpToDate)
    }

    pub fn summary(&self) -> Option<&InjectionSummary> {
        match self {
            TaskOutcome::UpToDate => None,
            TaskOutcome::Executed(summary) => Some(summary),
        }
    }
}

/// Counts and consumed constants of one executed run
#[derive(Debug, Default)]
pub struct InjectionSummary {
    pub files_processed: u64,
    pub files_rewritten: u64,
    pub files_copied: u64,
    pub directories_created: u64,
    pub consumed: ConsumedConstants,
    pub cache_written: bool,
}

impl InjectionSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn did_work(&self) -> bool {
        self.files_processed > 0 || self.directories_created > 0
    }
}

pub struct InjectionTask {
    name: String,
    sources: Vec<SourceMapping>,
    destination: PathBuf,
    build_dir: PathBuf,
    ignore_cache: bool,
    rewriters: Vec<Box<dyn FileRewriter>>,
    stats: HashMap<String, RewriteStats>,
}

impl InjectionTask {
    /// Task without sources or rewriters
    pub fn new(
        name: impl Into<String>,
        destination: impl Into<PathBuf>,
        build_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            sources: Vec::new(),
            destination: destination.into(),
            build_dir: build_dir.into(),
            ignore_cache: false,
            rewriters: Vec::new(),
            stats: HashMap::new(),
        }
    }

    /// Task with the source rewriter for `matcher` followed by `resources`
    pub fn with_rewriters(
        name: impl Into<String>,
        destination: impl Into<PathBuf>,
        build_dir: impl Into<PathBuf>,
        matcher: TagMatcher,
        resources: ResourceRewriter,
    ) -> Result<Self> {
        let mut task = Self::new(name, destination, build_dir);
        task.add_rewriter(Box::new(SourceRewriter::new(matcher)?));
        task.add_rewriter(Box::new(resources));
        Ok(task)
    }

    pub fn source(mut self, from: impl Into<PathBuf>, into: impl Into<PathBuf>) -> Self {
        self.sources.push(SourceMapping::new(from, into));
        self
    }

    pub fn ignore_cache(mut self, ignore: bool) -> Self {
        self.ignore_cache = ignore;
        self
    }

    /// Add a rewriter after the existing ones; earlier rewriters win
    pub fn add_rewriter(&mut self, rewriter: Box<dyn FileRewriter>) {
        self.stats
            .entry(rewriter.name().to_string())
            .or_insert_with(|| RewriteStats::new(rewriter.name()));
        self.rewriters.push(rewriter);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sources(&self) -> &[SourceMapping] {
        &self.sources
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn cache_guard(&self) -> CacheGuard {
        CacheGuard::for_task(&self.build_dir, &self.name)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.cache_guard().path().to_path_buf()
    }

    pub fn stats(&self) -> &HashMap<String, RewriteStats> {
        &self.stats
    }

    /// Run the task unless the cache shows nothing changed
    pub fn run(&mut self, chain: &ProviderChain) -> Result<TaskOutcome> {
        let guard = self.cache_guard();
        if self.destination.exists() && guard.is_up_to_date(chain, self.ignore_cache)? {
            info!(task = %self.name, "constants unchanged, task is up to date");
            return Ok(TaskOutcome::UpToDate);
        }

        let mut summary = self.execute(chain)?;
        for stats in self.stats.values().filter(|stats| stats.files > 0) {
            debug!(
                rewriter = %stats.rewriter,
                files = stats.files,
                changed = stats.files_changed,
                change_rate = stats.change_rate(),
                "rewriter statistics"
            );
        }
        if summary.did_work() && !self.ignore_cache {
            guard.store(&summary.consumed)?;
            summary.cache_written = true;
        }

        info!(
            task = %self.name,
            files = summary.files_processed,
            rewritten = summary.files_rewritten,
            constants = summary.consumed.len(),
            "constant injection finished"
        );
        Ok(TaskOutcome::Executed(summary))
    }

    /// Copy and rewrite every source tree without consulting the cache
    pub fn execute(&mut self, chain: &ProviderChain) -> Result<InjectionSummary> {
        let mut summary = InjectionSummary::new();
        let sources = self.sources.clone();

        for mapping in &sources {
            if !mapping.from.exists() {
                debug!(from = %mapping.from.display(), "source directory missing, skipping");
                continue;
            }
            let target_root = self.destination.join(&mapping.into);

            for entry in WalkDir::new(&mapping.from).sort_by_file_name() {
                let entry = entry.map_err(walk_error)?;
                let relative = entry
                    .path()
                    .strip_prefix(&mapping.from)
                    .unwrap_or(entry.path());
                let target = target_root.join(relative);

                if entry.file_type().is_dir() {
                    if !target.exists() {
                        fs::create_dir_all(&target)
                            .map_err(|e| ModutilError::io(&target, e))?;
                        summary.directories_created += 1;
                    }
                    continue;
                }

                let path = slash_path(&mapping.into.join(relative));
                self.process_file(entry.path(), &path, &target, chain, &mut summary)?;
            }
        }

        Ok(summary)
    }

    fn process_file(
        &mut self,
        source: &Path,
        relative_path: &str,
        target: &Path,
        chain: &ProviderChain,
        summary: &mut InjectionSummary,
    ) -> Result<()> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| ModutilError::io(parent, e))?;
        }

        let Some(rewriter) = self.rewriters.iter_mut().find(|r| r.matches(relative_path)) else {
            debug!(path = relative_path, "copying");
            fs::copy(source, target).map_err(|e| ModutilError::io(source, e))?;
            summary.files_processed += 1;
            summary.files_copied += 1;
            return Ok(());
        };

        let bytes = fs::read(source).map_err(|e| ModutilError::io(source, e))?;
        // binary files cannot hold a textual match, copy them unchanged
        let content = match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(err) => {
                debug!(path = relative_path, rewriter = rewriter.name(), "not UTF-8, copying");
                fs::write(target, err.into_bytes()).map_err(|e| ModutilError::io(target, e))?;
                summary.files_processed += 1;
                summary.files_copied += 1;
                return Ok(());
            }
        };

        let stats = self
            .stats
            .entry(rewriter.name().to_string())
            .or_insert_with(|| RewriteStats::new(rewriter.name()));
        stats.files += 1;

        debug!(path = relative_path, rewriter = rewriter.name(), "rewriting");
        let output = match rewriter.rewrite(relative_path, &content, chain, &mut summary.consumed) {
            Ok(output) => output,
            Err(e) => {
                stats.errors += 1;
                return Err(e);
            }
        };

        if output != content {
            stats.files_changed += 1;
            summary.files_rewritten += 1;
        }
        fs::write(target, output).map_err(|e| ModutilError::io(target, e))?;
        summary.files_processed += 1;
        Ok(())
    }
}

fn walk_error(err: walkdir::Error) -> ModutilError {
    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
    ModutilError::io(path, source)
}

// `/`-separated form used by rewriter path matching
fn slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
