use crate::compiler::{CompilerOptions, PatternCompiler, UnknownPatternPolicy, DEFAULT_MAX_DEPTH};
use crate::error::CompilationError;
use crate::loader;
use crate::pipeline::chain::FilterChain;
use crate::pipeline::grok::{GrokFilter, GrokFilterConfig};
use crate::registry::PatternRegistry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for pipeline behavior
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub error_strategy: ErrorStrategy,
    pub max_line_length: usize,
    /// Match batches of lines on the rayon thread pool
    pub parallel: bool,
    /// Lines per batch
    pub batch_size: usize,
    /// Add `path` and `line_number` fields to every event
    pub add_source_fields: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            error_strategy: ErrorStrategy::Skip,
            max_line_length: 1048576, // 1MB
            parallel: false,
            batch_size: 1024,
            add_source_fields: false,
        }
    }
}

/// Simple error handling strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorStrategy {
    /// Skip problematic lines and continue processing
    Skip,
    /// Stop processing on first error
    FailFast,
}

/// Grok configuration file: where patterns come from and which filters run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GrokConfig {
    /// Files or directories of additional pattern definitions
    pub patterns_dir: Vec<PathBuf>,
    /// Inline `NAME BODY` lines, applied after `patterns_dir`
    pub additional_patterns: Option<String>,
    pub unknown_patterns: UnknownPatternPolicy,
    pub max_depth: usize,
    pub filters: Vec<GrokFilterConfig>,
}

impl Default for GrokConfig {
    fn default() -> Self {
        GrokConfig {
            patterns_dir: Vec::new(),
            additional_patterns: None,
            unknown_patterns: UnknownPatternPolicy::Strict,
            max_depth: DEFAULT_MAX_DEPTH,
            filters: Vec::new(),
        }
    }
}

impl GrokConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, CompilationError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load a YAML file. Relative `patterns_dir` entries resolve against the
    /// file's directory.
    pub fn from_file(path: &Path) -> Result<Self, CompilationError> {
        let text = std::fs::read_to_string(path).map_err(|source| CompilationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml_str(&text)?;
        if let Some(base) = path.parent() {
            for dir in &mut config.patterns_dir {
                if dir.is_relative() {
                    *dir = base.join(&*dir);
                }
            }
        }
        Ok(config)
    }

    pub fn compiler_options(&self) -> CompilerOptions {
        CompilerOptions {
            max_depth: self.max_depth,
            unknown_patterns: self.unknown_patterns,
            ..CompilerOptions::default()
        }
    }

    /// Layer `patterns_dir` and then `additional_patterns` over `registry`.
    /// Both are registered as one batch: a malformed line anywhere leaves
    /// `registry` untouched.
    pub fn extend_registry(&self, registry: &mut PatternRegistry) -> Result<usize, CompilationError> {
        let mut text = loader::read_pattern_paths(&self.patterns_dir)?;
        if let Some(extra) = &self.additional_patterns {
            text.push_str(extra);
        }
        let count = registry.register_bulk(&text)?;
        tracing::debug!(count, "registered configured grok patterns");
        Ok(count)
    }

    /// Compile every configured filter into a chain, in file order
    pub fn build_chain(&self, compiler: &PatternCompiler<'_>) -> Result<FilterChain, CompilationError> {
        let mut chain = FilterChain::new();
        for (index, filter_config) in self.filters.iter().enumerate() {
            let name = format!("grok_{}", index + 1);
            let filter = GrokFilter::new(&name, compiler, filter_config.clone())?;
            chain.add_filter(Box::new(filter));
        }
        Ok(chain)
    }
}
