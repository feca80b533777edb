// src/pipeline/grok.rs - The grok filter: match a field, merge captures into the event
use crate::compiler::PatternCompiler;
use crate::error::CompilationError;
use crate::event::{Event, OverwritePolicy, MESSAGE_FIELD};
use crate::matcher::{CompiledMatcher, MatchOutcome};
use crate::pipeline::filter::{Filter, FilterOutcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Tag added when no expression matched and `on_no_match` is `tag`
pub const DEFAULT_FAILURE_TAG: &str = "_grokparsefailure";

/// What a grok filter does with an event none of its expressions match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoMatchPolicy {
    /// Leave the event unchanged
    #[default]
    Ignore,
    /// Add the failure tags to the event
    Tag,
}

/// Options of one grok filter, as written in a configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GrokFilterConfig {
    /// Field whose text is matched
    pub source: String,
    /// Expressions tried in order
    #[serde(rename = "match")]
    pub patterns: Vec<String>,
    /// Stop at the first matching expression
    pub break_on_match: bool,
    pub on_no_match: NoMatchPolicy,
    pub tag_on_failure: Vec<String>,
    pub overwrite: OverwritePolicy,
    /// Keep captures that matched the empty string
    pub keep_empty_captures: bool,
}

impl Default for GrokFilterConfig {
    fn default() -> Self {
        GrokFilterConfig {
            source: MESSAGE_FIELD.to_string(),
            patterns: Vec::new(),
            break_on_match: true,
            on_no_match: NoMatchPolicy::Ignore,
            tag_on_failure: vec![DEFAULT_FAILURE_TAG.to_string()],
            overwrite: OverwritePolicy::Allow,
            keep_empty_captures: false,
        }
    }
}

impl GrokFilterConfig {
    pub fn with_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        GrokFilterConfig {
            patterns: patterns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// Filter that applies compiled grok matchers to one field of the event
#[derive(Debug, Clone)]
pub struct GrokFilter {
    name: String,
    matchers: Vec<Arc<CompiledMatcher>>,
    config: GrokFilterConfig,
}

impl GrokFilter {
    /// Compile every expression of `config`. Any compile error fails the whole filter.
    pub fn new(
        name: &str,
        compiler: &PatternCompiler<'_>,
        config: GrokFilterConfig,
    ) -> Result<Self, CompilationError> {
        if config.patterns.is_empty() {
            return Err(CompilationError::ConfigError(format!(
                "grok filter '{}' has no match expressions",
                name
            )));
        }

        let matchers = config
            .patterns
            .iter()
            .map(|pattern| compiler.compile_expression(pattern))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::from_matchers(name, matchers, config))
    }

    /// Build from matchers compiled elsewhere; `config.patterns` is informational
    pub fn from_matchers(
        name: &str,
        matchers: Vec<Arc<CompiledMatcher>>,
        config: GrokFilterConfig,
    ) -> Self {
        GrokFilter {
            name: name.to_string(),
            matchers,
            config,
        }
    }

    pub fn config(&self) -> &GrokFilterConfig {
        &self.config
    }

    pub fn matchers(&self) -> &[Arc<CompiledMatcher>] {
        &self.matchers
    }

    fn merge(&self, event: &mut Event, outcome: MatchOutcome) {
        let MatchOutcome::Matched { fields, warnings } = outcome else {
            return;
        };

        for warning in &warnings {
            tracing::warn!(filter = %self.name, "{}", warning);
        }

        for (field, value) in fields {
            if !self.config.keep_empty_captures && value.as_str() == Some("") {
                continue;
            }
            event.insert_with_policy(field, value, self.config.overwrite);
        }
    }

    fn no_match(&self, event: &mut Event) -> FilterOutcome {
        if self.config.on_no_match == NoMatchPolicy::Tag {
            for tag in &self.config.tag_on_failure {
                event.add_tag(tag);
            }
        }
        FilterOutcome::NoOp
    }
}

impl Filter for GrokFilter {
    fn apply(&self, event: &mut Event) -> FilterOutcome {
        let Some(text) = event.get_str(&self.config.source).map(str::to_owned) else {
            tracing::debug!(
                filter = %self.name,
                field = %self.config.source,
                "source field missing or not a string"
            );
            return self.no_match(event);
        };

        let mut matched = false;
        for matcher in &self.matchers {
            let outcome = matcher.apply(&text);
            if !outcome.is_match() {
                continue;
            }
            matched = true;
            self.merge(event, outcome);
            if self.config.break_on_match {
                break;
            }
        }

        if matched {
            FilterOutcome::Applied
        } else {
            self.no_match(event)
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PatternRegistry;
    use serde_json::json;

    fn filter(registry: &PatternRegistry, config: GrokFilterConfig) -> GrokFilter {
        let compiler = PatternCompiler::new(registry);
        GrokFilter::new("grok", &compiler, config).unwrap()
    }

    #[test]
    fn test_grok_filter_merges_fields() {
        let registry = PatternRegistry::with_base_patterns();
        let grok = filter(
            &registry,
            GrokFilterConfig::with_patterns(["%{IP:client} %{WORD:method} %{INT:status:int}"]),
        );

        let mut event = Event::from_message("10.0.0.1 GET 200");
        assert_eq!(grok.apply(&mut event), FilterOutcome::Applied);
        assert_eq!(event.get("client"), Some(&json!("10.0.0.1")));
        assert_eq!(event.get("method"), Some(&json!("GET")));
        assert_eq!(event.get("status"), Some(&json!(200)));
    }

    #[test]
    fn test_grok_filter_no_match_ignore() {
        let registry = PatternRegistry::with_base_patterns();
        let grok = filter(&registry, GrokFilterConfig::with_patterns(["^%{INT:n}$"]));

        let mut event = Event::from_message("abc");
        assert_eq!(grok.apply(&mut event), FilterOutcome::NoOp);
        assert_eq!(event, Event::from_message("abc"));
    }

    #[test]
    fn test_grok_filter_no_match_tag() {
        let registry = PatternRegistry::with_base_patterns();
        let config = GrokFilterConfig {
            on_no_match: NoMatchPolicy::Tag,
            ..GrokFilterConfig::with_patterns(["^%{INT:n}$"])
        };
        let grok = filter(&registry, config);

        let mut event = Event::from_message("abc");
        assert_eq!(grok.apply(&mut event), FilterOutcome::NoOp);
        assert!(event.has_tag(DEFAULT_FAILURE_TAG));
    }

    #[test]
    fn test_break_on_match() {
        let registry = PatternRegistry::with_base_patterns();
        let patterns = ["^%{WORD:first}", "%{WORD:last}$"];

        let grok = filter(&registry, GrokFilterConfig::with_patterns(patterns));
        let mut event = Event::from_message("alpha beta");
        grok.apply(&mut event);
        assert!(event.contains("first"));
        assert!(!event.contains("last"));

        let config = GrokFilterConfig {
            break_on_match: false,
            ..GrokFilterConfig::with_patterns(patterns)
        };
        let grok = filter(&registry, config);
        let mut event = Event::from_message("alpha beta");
        grok.apply(&mut event);
        assert_eq!(event.get("first"), Some(&json!("alpha")));
        assert_eq!(event.get("last"), Some(&json!("beta")));
    }

    #[test]
    fn test_empty_captures_dropped_by_default() {
        let mut registry = PatternRegistry::new();
        registry.register("ANY", ".*");
        let patterns = ["^x%{ANY:rest}$"];

        let grok = filter(&registry, GrokFilterConfig::with_patterns(patterns));
        let mut event = Event::from_message("x");
        assert_eq!(grok.apply(&mut event), FilterOutcome::Applied);
        assert!(!event.contains("rest"));

        let config = GrokFilterConfig {
            keep_empty_captures: true,
            ..GrokFilterConfig::with_patterns(patterns)
        };
        let grok = filter(&registry, config);
        let mut event = Event::from_message("x");
        grok.apply(&mut event);
        assert_eq!(event.get("rest"), Some(&json!("")));
    }

    #[test]
    fn test_custom_source_field() {
        let registry = PatternRegistry::with_base_patterns();
        let config = GrokFilterConfig {
            source: "request".to_string(),
            ..GrokFilterConfig::with_patterns(["%{WORD:verb}"])
        };
        let grok = filter(&registry, config);

        let mut event = Event::from_message("ignored");
        assert_eq!(grok.apply(&mut event), FilterOutcome::NoOp);

        event.set("request", json!("POST /x"));
        assert_eq!(grok.apply(&mut event), FilterOutcome::Applied);
        assert_eq!(event.get("verb"), Some(&json!("POST")));
    }

    #[test]
    fn test_filter_without_patterns_rejected() {
        let registry = PatternRegistry::new();
        let compiler = PatternCompiler::new(&registry);
        let err = GrokFilter::new("empty", &compiler, GrokFilterConfig::default()).unwrap_err();
        assert!(matches!(err, CompilationError::ConfigError(_)));
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
match: ["%{IP:client}"]
on_no_match: tag
overwrite: keep-first
"#;
        let config: GrokFilterConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.patterns, vec!["%{IP:client}"]);
        assert_eq!(config.on_no_match, NoMatchPolicy::Tag);
        assert_eq!(config.overwrite, OverwritePolicy::KeepFirst);
        assert_eq!(config.source, MESSAGE_FIELD);
        assert!(config.break_on_match);
    }
}
