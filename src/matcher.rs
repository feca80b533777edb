// src/matcher.rs - Compiled grok matchers and their runtime application
use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;
use std::fmt;

/// Field type declared by the third part of a `%{SYNTAX:SEMANTIC:TYPE}` token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldType {
    #[default]
    String,
    Int,
    Float,
    Bool,
}

impl FieldType {
    /// Parse a token type name; `None` for unsupported names
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(FieldType::String),
            "int" => Some(FieldType::Int),
            "float" => Some(FieldType::Float),
            "bool" => Some(FieldType::Bool),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Bool => "bool",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Association between a capture group and an output field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBinding {
    pub field_name: String,
    pub field_type: FieldType,
    pub capture_index: usize,
}

/// A fully expanded pattern ready for matching.
///
/// Immutable once built; share it behind an `Arc` across threads.
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    source_pattern_name: String,
    expanded_expression: String,
    bindings: Vec<FieldBinding>,
    regex: Regex,
}

impl CompiledMatcher {
    pub(crate) fn new(
        source_pattern_name: String,
        expanded_expression: String,
        bindings: Vec<FieldBinding>,
        regex: Regex,
    ) -> Self {
        CompiledMatcher {
            source_pattern_name,
            expanded_expression,
            bindings,
            regex,
        }
    }

    pub fn source_pattern_name(&self) -> &str {
        &self.source_pattern_name
    }

    pub fn expanded_expression(&self) -> &str {
        &self.expanded_expression
    }

    pub fn bindings(&self) -> &[FieldBinding] {
        &self.bindings
    }

    /// Quick test without extracting any field
    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }

    pub fn apply(&self, line: &str) -> MatchOutcome {
        apply(self, line)
    }
}

impl PartialEq for CompiledMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.source_pattern_name == other.source_pattern_name
            && self.expanded_expression == other.expanded_expression
            && self.bindings == other.bindings
    }
}

impl Eq for CompiledMatcher {}

/// A captured value that could not be converted to its declared type.
/// The field is still delivered, as text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Cannot convert '{value}' to {target} for field '{field}'; keeping it as text")]
pub struct TypeCoercionWarning {
    pub field: String,
    pub value: String,
    pub target: FieldType,
}

/// Result of applying a matcher to one line
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Matched {
        fields: IndexMap<String, Value>,
        warnings: Vec<TypeCoercionWarning>,
    },
    NoMatch,
}

impl MatchOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchOutcome::Matched { .. })
    }

    /// Extracted fields, if the line matched
    pub fn fields(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            MatchOutcome::Matched { fields, .. } => Some(fields),
            MatchOutcome::NoMatch => None,
        }
    }

    pub fn warnings(&self) -> &[TypeCoercionWarning] {
        match self {
            MatchOutcome::Matched { warnings, .. } => warnings,
            MatchOutcome::NoMatch => &[],
        }
    }
}

/// Apply a compiled matcher to a line.
///
/// Captures that did not take part in the match are left out of the result.
/// When several bindings share a field name the last participating capture wins.
pub fn apply(matcher: &CompiledMatcher, line: &str) -> MatchOutcome {
    let Some(captures) = matcher.regex.captures(line) else {
        return MatchOutcome::NoMatch;
    };

    let mut fields = IndexMap::with_capacity(matcher.bindings.len());
    let mut warnings = Vec::new();

    for binding in &matcher.bindings {
        if let Some(capture) = captures.get(binding.capture_index) {
            let text = capture.as_str();
            let value = match convert_capture(text, binding.field_type) {
                Some(value) => value,
                None => {
                    warnings.push(TypeCoercionWarning {
                        field: binding.field_name.clone(),
                        value: text.to_string(),
                        target: binding.field_type,
                    });
                    Value::String(text.to_string())
                }
            };
            fields.insert(binding.field_name.clone(), value);
        }
    }

    MatchOutcome::Matched { fields, warnings }
}

/// Convert captured text to the JSON value of its declared type
fn convert_capture(text: &str, field_type: FieldType) -> Option<Value> {
    match field_type {
        FieldType::String => Some(Value::String(text.to_string())),
        FieldType::Int => text.parse::<i64>().ok().map(Value::from),
        FieldType::Float => text
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        FieldType::Bool => match text.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
    }
}
