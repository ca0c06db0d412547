//! JSON configuration for the injection and shading tasks.
//!
//! Relative paths are resolved against the directory holding the
//! configuration file.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;

use crate::constants::{Constant, EnvConstants, MapConstants, PropertiesConstants, ProviderChain};
use crate::inject::resource::ResourceRewriter;
use crate::inject::source::{TagMatcher, DEFAULT_TAG_ARGUMENT};
use crate::inject::task::{InjectionTask, DEFAULT_TASK_NAME};
use crate::shade::archive::ShadeTask;
use crate::shade::ShadeRemapper;
use crate::Result;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Missing required setting `{0}`")]
    Missing(&'static str),
}

/// Root configuration document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModutilConfig {
    /// Tag, constant sources and resource rules
    #[serde(default)]
    pub constants: ConstantsConfig,
    /// Injection task settings
    #[serde(default)]
    pub inject: Option<InjectConfig>,
    /// Shading task settings
    #[serde(default)]
    pub shade: Option<ShadeConfig>,
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConstantsConfig {
    /// Fully qualified tag name, e.g. `net.example.Inject`
    pub annotation: Option<String>,
    /// Tag argument holding the constant key
    pub annotation_field: String,
    /// Inline constants, consulted first
    pub values: IndexMap<String, ConstantSpec>,
    /// `key=value` files, consulted in order after inline values
    pub properties_files: Vec<PathBuf>,
    /// Prefix of environment variables consulted last
    pub env_prefix: Option<String>,
    /// Resource rules in registration order
    pub patterns: Vec<PatternConfig>,
}

impl Default for ConstantsConfig {
    fn default() -> Self {
        Self {
            annotation: None,
            annotation_field: DEFAULT_TAG_ARGUMENT.to_string(),
            values: IndexMap::new(),
            properties_files: Vec::new(),
            env_prefix: None,
            patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatternConfig {
    pub path: String,
    pub content: String,
}

/// Inline constant as written in JSON
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ConstantSpec {
    Typed(TypedConstant),
    Boolean(bool),
    Integer(i64),
    Fractional(f64),
    Text(String),
}

/// `{"long": 5}` style constant with an explicit type
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypedConstant {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Boolean(bool),
}

impl From<ConstantSpec> for Constant {
    fn from(spec: ConstantSpec) -> Self {
        match spec {
            ConstantSpec::Typed(TypedConstant::Int(v)) => Constant::Int(v),
            ConstantSpec::Typed(TypedConstant::Long(v)) => Constant::Long(v),
            ConstantSpec::Typed(TypedConstant::Float(v)) => Constant::Float(v),
            ConstantSpec::Typed(TypedConstant::Double(v)) => Constant::Double(v),
            ConstantSpec::Typed(TypedConstant::String(v)) => Constant::String(v),
            ConstantSpec::Typed(TypedConstant::Boolean(v)) => Constant::Boolean(v),
            ConstantSpec::Boolean(v) => Constant::Boolean(v),
            ConstantSpec::Integer(v) => match i32::try_from(v) {
                Ok(small) => Constant::Int(small),
                Err(_) => Constant::Long(v),
            },
            ConstantSpec::Fractional(v) => Constant::Double(v),
            ConstantSpec::Text(v) => Constant::String(v),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceMappingConfig {
    pub from: PathBuf,
    #[serde(default)]
    pub into: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InjectConfig {
    pub sources: Vec<SourceMappingConfig>,
    pub destination: PathBuf,
    pub build_dir: PathBuf,
    #[serde(default = "default_task_name")]
    pub task_name: String,
    #[serde(default)]
    pub ignore_cache: bool,
}

fn default_task_name() -> String {
    DEFAULT_TASK_NAME.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenameConfig {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShadeConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    #[serde(default)]
    pub renames: Vec<RenameConfig>,
}

impl ModutilConfig {
    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(config)
    }

    /// Parse a JSON document; relative paths stay relative to the working directory
    pub fn from_json(text: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Provider chain: inline values, then property files, then environment
    pub fn build_chain(&self) -> std::result::Result<ProviderChain, ConfigError> {
        let constants = &self.constants;
        let mut chain = ProviderChain::new();

        if !constants.values.is_empty() {
            let values = constants
                .values
                .iter()
                .map(|(key, spec)| (key.clone(), Constant::from(spec.clone())))
                .collect();
            chain.push(MapConstants::new("values", values));
        }
        for file in &constants.properties_files {
            chain.push(PropertiesConstants::from_file(self.resolve(file))?);
        }
        if let Some(prefix) = &constants.env_prefix {
            chain.push(EnvConstants::new(prefix.clone()));
        }
        Ok(chain)
    }

    pub fn tag_matcher(&self) -> std::result::Result<TagMatcher, ConfigError> {
        let annotation = self
            .constants
            .annotation
            .as_ref()
            .ok_or(ConfigError::Missing("constants.annotation"))?;
        Ok(TagMatcher::with_argument(
            annotation.clone(),
            self.constants.annotation_field.clone(),
        ))
    }

    pub fn resource_rewriter(&self) -> Result<ResourceRewriter> {
        let mut rewriter = ResourceRewriter::new();
        for pattern in &self.constants.patterns {
            rewriter.pattern(&pattern.path, &pattern.content)?;
        }
        Ok(rewriter)
    }

    pub fn build_injection_task(&self) -> Result<InjectionTask> {
        let inject = self.inject.as_ref().ok_or(ConfigError::Missing("inject"))?;
        let mut task = InjectionTask::with_rewriters(
            inject.task_name.clone(),
            self.resolve(&inject.destination),
            self.resolve(&inject.build_dir),
            self.tag_matcher()?,
            self.resource_rewriter()?,
        )?
        .ignore_cache(inject.ignore_cache);
        for mapping in &inject.sources {
            task = task.source(self.resolve(&mapping.from), mapping.into.clone());
        }
        Ok(task)
    }

    pub fn build_shade_task(&self) -> Result<ShadeTask> {
        let shade = self.shade.as_ref().ok_or(ConfigError::Missing("shade"))?;
        let mut remapper = ShadeRemapper::new();
        for rename in &shade.renames {
            remapper.add_rename(&rename.from, &rename.to)?;
        }
        Ok(ShadeTask::new(
            self.resolve(&shade.input),
            self.resolve(&shade.output),
            remapper,
        ))
    }
}
