// src/lib.rs
pub mod compiler;
pub mod error;
pub mod event;
pub mod loader;
pub mod matcher;
pub mod pipeline;
pub mod registry;

pub use error::*;
pub use pipeline::*;

pub use compiler::{CompilerOptions, PatternCompiler, UnknownPatternPolicy};
pub use event::{Event, OverwritePolicy};
pub use matcher::{apply, CompiledMatcher, FieldBinding, FieldType, MatchOutcome, TypeCoercionWarning};
pub use pipeline::chain::{ChainReport, FilterChain};
pub use pipeline::config::{ErrorStrategy, GrokConfig, PipelineConfig};
pub use pipeline::context::ProcessingStats;
pub use pipeline::filter::{ExternalFilter, Filter, FilterOutcome};
pub use pipeline::grok::{GrokFilter, GrokFilterConfig, NoMatchPolicy};
pub use pipeline::stream::StreamPipeline;
pub use registry::{PatternDefinition, PatternRegistry};
