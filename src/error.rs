use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Line too long: {length} > {max_length}")]
    LineTooLong { length: usize, max_length: usize },

    #[error("Failed to serialize event at line {line}: {source}")]
    Serialize {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum CompilationError {
    #[error("Malformed pattern line {line_number}: '{line}' (expected NAME<whitespace>BODY)")]
    MalformedPatternLine { line_number: usize, line: String },

    #[error("Unknown pattern '{name}'{}", referenced_from_suffix(.referenced_from))]
    UnknownPattern {
        name: String,
        referenced_from: Option<String>,
    },

    #[error("Cyclic pattern reference: {}", .chain.join(" -> "))]
    CyclicPattern { chain: Vec<String> },

    #[error("Pattern expansion deeper than {max_depth} levels: {}", .chain.join(" -> "))]
    PatternTooDeep { max_depth: usize, chain: Vec<String> },

    #[error("Unknown field type '{field_type}' for field '{field}'. Supported types: int, float, bool, string")]
    InvalidFieldType { field: String, field_type: String },

    #[error("Malformed pattern reference near '{fragment}'")]
    MalformedToken { fragment: String },

    #[error("Failed to compile expanded pattern '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Capture for field '{field}' is missing from the expanded pattern")]
    MissingCapture { field: String },

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn referenced_from_suffix(referenced_from: &Option<String>) -> String {
    match referenced_from {
        Some(parent) => format!(" referenced from '{}'", parent),
        None => String::new(),
    }
}

impl From<serde_yaml::Error> for CompilationError {
    fn from(err: serde_yaml::Error) -> Self {
        CompilationError::ConfigError(err.to_string())
    }
}
