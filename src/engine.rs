// Expression engine facade
//
// One entry point tying together the parser, the optional expression cache,
// the evaluator and the function registry.

use std::sync::Arc;

use thiserror::Error;

use crate::ast::Expression;
use crate::cache::{CacheStats, ExpressionCache};
use crate::config::{BindingErrorPolicy, EngineConfig};
use crate::context::DataContext;
use crate::evaluator::{Evaluator, EvaluatorError};
use crate::functions::{FunctionError, FunctionRegistry};
use crate::parser::{self, ParserError};
use crate::template::{self, TemplateError};
use crate::value::Value;

/// Failure of a source-to-value evaluation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParserError),

    #[error("Evaluation error: {0}")]
    Evaluate(#[from] EvaluatorError),
}

/// Parses (through the cache when enabled) and evaluates expressions.
///
/// The engine is `Send + Sync`; share it behind an `Arc` to let concurrent
/// callers reuse each other's parsed expressions. Registering functions
/// needs `&mut self`, so do it before sharing.
#[derive(Debug)]
pub struct ExpressionEngine {
    functions: FunctionRegistry,
    cache: Option<ExpressionCache>,
    config: EngineConfig,
}

impl ExpressionEngine {
    /// An engine with every built-in and a default-sized cache.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let cache = config
            .cache_enabled
            .then(|| ExpressionCache::from_config(&config.cache));
        ExpressionEngine {
            functions: FunctionRegistry::with_builtins(),
            cache,
            config,
        }
    }

    /// An engine that parses every source afresh.
    pub fn without_cache() -> Self {
        Self::with_config(EngineConfig {
            cache_enabled: false,
            ..EngineConfig::default()
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Register a host function; replaces any function of the same name,
    /// built-ins included.
    pub fn register_function<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        self.functions.register(name, function);
    }

    pub fn parse(&self, source: &str) -> Result<Arc<Expression>, ParserError> {
        match &self.cache {
            Some(cache) => cache.get_or_parse(source, parser::parse),
            None => parser::parse(source).map(Arc::new),
        }
    }

    pub fn evaluate(&self, source: &str, context: &DataContext) -> Result<Value, EngineError> {
        let expression = self.parse(source)?;
        Ok(self.evaluate_expression(&expression, context)?)
    }

    pub fn evaluate_expression(
        &self,
        expression: &Expression,
        context: &DataContext,
    ) -> Result<Value, EvaluatorError> {
        Evaluator::new(&self.functions).evaluate(expression, context)
    }

    /// Replace every `${...}` span in `template` with its evaluated display
    /// string.
    ///
    /// A span that fails to parse or evaluate is left as written, and so is
    /// everything from an unmatched `${` onwards.
    pub fn process_template(&self, template: &str, context: &DataContext) -> String {
        let policy = BindingErrorPolicy::KeepOriginal;
        match template::interpolate(self, template, context, policy) {
            Ok(result) => result,
            Err(TemplateError::UnmatchedBrace { position }) => {
                tracing::debug!(position, "unmatched brace in template, keeping the remainder");
                let (head, tail) = template.split_at(position);
                // Everything before the first unmatched `${` is well formed
                let mut result = template::interpolate(self, head, context, policy)
                    .unwrap_or_else(|_| head.to_string());
                result.push_str(tail);
                result
            }
            Err(error) => {
                tracing::debug!(%error, "template processing failed, keeping it as written");
                template.to_string()
            }
        }
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    /// Sweep expired cache entries; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.cache.as_ref().map_or(0, ExpressionCache::purge_expired)
    }

    /// Cache counters, or `None` when caching is disabled.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(ExpressionCache::stats)
    }
}

impl Default for ExpressionEngine {
    fn default() -> Self {
        Self::new()
    }
}
