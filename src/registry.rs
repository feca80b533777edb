// src/registry.rs - Named pattern store
use crate::error::CompilationError;
use std::collections::HashMap;

/// Built-in pattern library loaded by `PatternRegistry::with_base_patterns`
pub const BASE_PATTERNS: &str = include_str!("patterns/grok-patterns");

/// A named pattern body as registered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternDefinition {
    pub name: String,
    pub body: String,
}

/// Mapping from pattern name to raw pattern body.
///
/// Bodies are not validated on insertion; a bad body only surfaces when a
/// pattern that references it is compiled.
#[derive(Debug, Clone, Default)]
pub struct PatternRegistry {
    patterns: HashMap<String, PatternDefinition>,
}

impl PatternRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the built-in grok vocabulary
    pub fn with_base_patterns() -> Self {
        let mut registry = Self::new();
        registry
            .register_bulk(BASE_PATTERNS)
            .expect("built-in pattern library is well-formed");
        registry
    }

    /// Insert a pattern, replacing any previous body under the same name
    pub fn register(&mut self, name: impl Into<String>, body: impl Into<String>) {
        let name = name.into();
        let definition = PatternDefinition {
            name: name.clone(),
            body: body.into(),
        };
        self.patterns.insert(name, definition);
    }

    /// Register every `NAME<whitespace>BODY` line of `text`.
    ///
    /// Blank lines and `#` comments are skipped. All lines are parsed before
    /// anything is inserted, so a malformed line leaves the registry untouched.
    /// Returns the number of patterns registered.
    pub fn register_bulk(&mut self, text: &str) -> Result<usize, CompilationError> {
        let parsed = parse_pattern_lines(text)?;
        let count = parsed.len();
        for (name, body) in parsed {
            self.register(name, body);
        }
        Ok(count)
    }

    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.patterns.get(name).map(|def| def.body.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&PatternDefinition> {
        self.patterns.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.patterns.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.patterns.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Split pattern text into (name, body) pairs without touching any registry
fn parse_pattern_lines(text: &str) -> Result<Vec<(String, String)>, CompilationError> {
    let mut parsed = Vec::new();

    for (index, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let malformed = || CompilationError::MalformedPatternLine {
            line_number: index + 1,
            line: raw_line.to_string(),
        };

        let (name, body) = line.split_once(char::is_whitespace).ok_or_else(malformed)?;
        let body = body.trim();
        if body.is_empty() || !is_valid_pattern_name(name) {
            return Err(malformed());
        }

        parsed.push((name.to_string(), body.to_string()));
    }

    Ok(parsed)
}

/// Names the `%{NAME}` token syntax is able to reference
pub(crate) fn is_valid_pattern_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = PatternRegistry::new();
        registry.register("WORD", r"\w+");

        assert_eq!(registry.lookup("WORD"), Some(r"\w+"));
        assert_eq!(registry.lookup("NUMBER"), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_overwrites() {
        let mut registry = PatternRegistry::new();
        registry.register("IP", r"\S+");
        registry.register("IP", r"\d{1,3}(\.\d{1,3}){3}");

        assert_eq!(registry.lookup("IP"), Some(r"\d{1,3}(\.\d{1,3}){3}"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_bulk_skips_blank_and_comment_lines() {
        let mut registry = PatternRegistry::new();
        let text = "# comment\n\nWORD \\w+\n   \nINT\t[+-]?\\d+  \n";

        let count = registry.register_bulk(text).unwrap();
        assert_eq!(count, 2);
        assert_eq!(registry.lookup("WORD"), Some(r"\w+"));
        assert_eq!(registry.lookup("INT"), Some(r"[+-]?\d+"));
    }

    #[test]
    fn test_register_bulk_keeps_inner_whitespace_of_body() {
        let mut registry = PatternRegistry::new();
        registry
            .register_bulk("PAIR %{WORD:key} = %{WORD:value}")
            .unwrap();

        assert_eq!(registry.lookup("PAIR"), Some("%{WORD:key} = %{WORD:value}"));
    }

    #[test]
    fn test_register_bulk_is_atomic() {
        let mut registry = PatternRegistry::new();
        registry.register("WORD", r"\w+");

        let err = registry
            .register_bulk("NUMBER \\d+\nBROKEN\nOTHER .*")
            .unwrap_err();

        match err {
            CompilationError::MalformedPatternLine { line_number, line } => {
                assert_eq!(line_number, 2);
                assert_eq!(line, "BROKEN");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(registry.len(), 1);
        assert!(!registry.contains("NUMBER"));
    }

    #[test]
    fn test_register_bulk_rejects_invalid_names() {
        let mut registry = PatternRegistry::new();
        assert!(registry.register_bulk("BAD-NAME \\w+").is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_base_patterns_load() {
        let registry = PatternRegistry::with_base_patterns();
        for name in ["WORD", "INT", "NUMBER", "IP", "IPV4", "HOSTNAME", "TIMESTAMP_ISO8601"] {
            assert!(registry.contains(name), "missing base pattern {name}");
        }
    }

    #[test]
    fn test_names_sorted() {
        let mut registry = PatternRegistry::new();
        registry.register("B", "b");
        registry.register("A", "a");
        assert_eq!(registry.names(), vec!["A", "B"]);
    }
}
