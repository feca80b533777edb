// src/compiler.rs - Recursive expansion of grok patterns into compiled matchers
use crate::error::CompilationError;
use crate::matcher::{CompiledMatcher, FieldBinding, FieldType};
use crate::registry::PatternRegistry;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Default ceiling on nested pattern references
pub const DEFAULT_MAX_DEPTH: usize = 50;

/// Default limit on the size of a compiled regex program (32 MiB)
pub const DEFAULT_REGEX_SIZE_LIMIT: usize = 32 * (1 << 20);

/// `%{SYNTAX}`, `%{SYNTAX:SEMANTIC}` or `%{SYNTAX:SEMANTIC:TYPE}`
static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"%\{(?P<syntax>[A-Za-z0-9_]+)(?::(?P<semantic>[^:{}]+))?(?::(?P<type>[A-Za-z]+))?\}")
        .expect("token regex is valid")
});

/// Prefix of the capture group names the compiler generates for bindings
const CAPTURE_PREFIX: &str = "__grok";

/// What to do with a `%{NAME}` reference the registry does not know
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownPatternPolicy {
    /// Fail compilation
    #[default]
    Strict,
    /// Drop the token from the expression and log a warning
    Lenient,
}

#[derive(Debug, Clone)]
pub struct CompilerOptions {
    pub max_depth: usize,
    pub unknown_patterns: UnknownPatternPolicy,
    pub regex_size_limit: usize,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions {
            max_depth: DEFAULT_MAX_DEPTH,
            unknown_patterns: UnknownPatternPolicy::Strict,
            regex_size_limit: DEFAULT_REGEX_SIZE_LIMIT,
        }
    }
}

/// Compiles named patterns and ad-hoc expressions against a registry.
///
/// The compiler borrows the registry for its whole lifetime, so the registry
/// is frozen while any compilation can happen and the memoized matchers can
/// never go stale. To compile against a changed registry, drop the compiler,
/// update the registry, and build a new one. Matchers handed out earlier keep
/// their original expansion.
pub struct PatternCompiler<'r> {
    registry: &'r PatternRegistry,
    options: CompilerOptions,
    cache: Mutex<HashMap<CacheKey, Arc<CompiledMatcher>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheKey {
    Pattern(String),
    Expression(String),
}

/// Output of an expansion in progress
#[derive(Default)]
struct Expansion {
    expression: String,
    bindings: Vec<PendingBinding>,
}

struct PendingBinding {
    field_name: String,
    field_type: FieldType,
}

impl<'r> PatternCompiler<'r> {
    pub fn new(registry: &'r PatternRegistry) -> Self {
        Self::with_options(registry, CompilerOptions::default())
    }

    pub fn with_options(registry: &'r PatternRegistry, options: CompilerOptions) -> Self {
        PatternCompiler {
            registry,
            options,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &'r PatternRegistry {
        self.registry
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Compile the registered pattern `name`
    pub fn compile(&self, name: &str) -> Result<Arc<CompiledMatcher>, CompilationError> {
        let key = CacheKey::Pattern(name.to_string());
        if let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }

        let body = self
            .registry
            .lookup(name)
            .ok_or_else(|| CompilationError::UnknownPattern {
                name: name.to_string(),
                referenced_from: None,
            })?;

        let mut stack = vec![name.to_string()];
        let compiled = self.build(name, body, &mut stack)?;
        Ok(self.store(key, compiled))
    }

    /// Compile an ad-hoc expression such as `%{IP:client} %{WORD:verb}`
    pub fn compile_expression(
        &self,
        expression: &str,
    ) -> Result<Arc<CompiledMatcher>, CompilationError> {
        let key = CacheKey::Expression(expression.to_string());
        if let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }

        let mut stack = Vec::new();
        let compiled = self.build(expression, expression, &mut stack)?;
        Ok(self.store(key, compiled))
    }

    /// Number of memoized matchers
    pub fn cached_len(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    fn cached(&self, key: &CacheKey) -> Option<Arc<CompiledMatcher>> {
        let cache = self.cache.lock().ok()?;
        cache.get(key).cloned()
    }

    fn store(&self, key: CacheKey, compiled: CompiledMatcher) -> Arc<CompiledMatcher> {
        let compiled = Arc::new(compiled);
        if let Ok(mut cache) = self.cache.lock() {
            // Another thread may have won the race; keep the first entry
            return cache.entry(key).or_insert(compiled).clone();
        }
        compiled
    }

    fn build(
        &self,
        source_name: &str,
        body: &str,
        stack: &mut Vec<String>,
    ) -> Result<CompiledMatcher, CompilationError> {
        let mut expansion = Expansion::default();
        self.expand(body, stack, &mut expansion)?;

        let regex = RegexBuilder::new(&expansion.expression)
            .size_limit(self.options.regex_size_limit)
            .build()
            .map_err(|source| CompilationError::InvalidRegex {
                pattern: source_name.to_string(),
                source,
            })?;

        let bindings = resolve_bindings(&regex, expansion.bindings)?;

        tracing::debug!(
            pattern = source_name,
            bindings = bindings.len(),
            "compiled grok pattern"
        );

        Ok(CompiledMatcher::new(
            source_name.to_string(),
            expansion.expression,
            bindings,
            regex,
        ))
    }

    /// Append the expansion of `body` to `out`. `stack` holds the names being
    /// expanded, outermost first.
    fn expand(
        &self,
        body: &str,
        stack: &mut Vec<String>,
        out: &mut Expansion,
    ) -> Result<(), CompilationError> {
        let mut last_end = 0;

        for token in TOKEN_RE.captures_iter(body) {
            let Some(whole) = token.get(0) else { continue };
            push_literal(&body[last_end..whole.start()], &mut out.expression)?;
            last_end = whole.end();

            let syntax = &token["syntax"];
            let semantic = token.name("semantic").map(|m| m.as_str());
            let field_type = match token.name("type") {
                Some(type_name) => FieldType::from_name(type_name.as_str()).ok_or_else(|| {
                    CompilationError::InvalidFieldType {
                        field: semantic.unwrap_or(syntax).to_string(),
                        field_type: type_name.as_str().to_string(),
                    }
                })?,
                None => FieldType::String,
            };

            let Some(sub_body) = self.registry.lookup(syntax) else {
                let referenced_from = stack.last().cloned();
                match self.options.unknown_patterns {
                    UnknownPatternPolicy::Strict => {
                        return Err(CompilationError::UnknownPattern {
                            name: syntax.to_string(),
                            referenced_from,
                        });
                    }
                    UnknownPatternPolicy::Lenient => {
                        tracing::warn!(
                            pattern = syntax,
                            referenced_from = referenced_from.as_deref().unwrap_or("<expression>"),
                            "skipping unknown grok pattern"
                        );
                        // Empty group keeps any following quantifier on this token
                        out.expression.push_str("(?:)");
                        continue;
                    }
                }
            };

            if stack.iter().any(|name| name == syntax) {
                let mut chain = stack.clone();
                chain.push(syntax.to_string());
                return Err(CompilationError::CyclicPattern { chain });
            }

            if stack.len() >= self.options.max_depth {
                let mut chain = stack.clone();
                chain.push(syntax.to_string());
                return Err(CompilationError::PatternTooDeep {
                    max_depth: self.options.max_depth,
                    chain,
                });
            }

            // The parent binding is allocated before recursing: its group opens
            // first, so it also comes first in capture order.
            match semantic {
                Some(field_name) => {
                    let slot = out.bindings.len();
                    out.bindings.push(PendingBinding {
                        field_name: field_name.to_string(),
                        field_type,
                    });
                    out.expression
                        .push_str(&format!("(?P<{}{}>", CAPTURE_PREFIX, slot));
                }
                None => out.expression.push_str("(?:"),
            }

            stack.push(syntax.to_string());
            self.expand(sub_body, stack, out)?;
            stack.pop();

            out.expression.push(')');
        }

        push_literal(&body[last_end..], &mut out.expression)
    }
}

/// Copy literal regex text, refusing anything that looks like a broken token
fn push_literal(literal: &str, expression: &mut String) -> Result<(), CompilationError> {
    if let Some(start) = literal.find("%{") {
        let fragment: String = literal[start..].chars().take(40).collect();
        return Err(CompilationError::MalformedToken { fragment });
    }
    expression.push_str(literal);
    Ok(())
}

/// Map each generated group name to its capture index in the final regex
fn resolve_bindings(
    regex: &Regex,
    pending: Vec<PendingBinding>,
) -> Result<Vec<FieldBinding>, CompilationError> {
    let mut index_by_slot: HashMap<usize, usize> = HashMap::new();
    for (capture_index, name) in regex.capture_names().enumerate() {
        if let Some(slot) = name
            .and_then(|n| n.strip_prefix(CAPTURE_PREFIX))
            .and_then(|n| n.parse::<usize>().ok())
        {
            index_by_slot.insert(slot, capture_index);
        }
    }

    pending
        .into_iter()
        .enumerate()
        .map(|(slot, binding)| {
            let capture_index = index_by_slot.get(&slot).copied().ok_or_else(|| {
                CompilationError::MissingCapture {
                    field: binding.field_name.clone(),
                }
            })?;
            Ok(FieldBinding {
                field_name: binding.field_name,
                field_type: binding.field_type,
                capture_index,
            })
        })
        .collect()
}
