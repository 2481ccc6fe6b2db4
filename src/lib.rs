// ac-templating - Expression language and template engine for data-bound cards
// Copyright (c) 2025 ac-templating contributors
// Licensed under the MIT License

//! # ac-templating
//!
//! A small expression language and the template expander built on it, for
//! binding data into JSON card documents.
//!
//! Strings in a template may contain `${...}` bindings; objects may carry a
//! `$when` condition; array elements may carry `$data` to repeat themselves
//! once per row of bound data.
//!
//! ```
//! use ac_templating::{value, TemplateEngine};
//!
//! let engine = TemplateEngine::new();
//! let card = value!({
//!     "type": "TextBlock",
//!     "text": "Hello, ${name}!"
//! });
//! let expanded = engine.expand(&card, &value!({"name": "World"})).unwrap();
//! assert_eq!(expanded.get("text"), Some(&value!("Hello, World!")));
//! ```
//!
//! ## Architecture
//!
//! - `value` - Dynamic value type shared by data, literals and results
//! - `utils` - Coercion rules (to number, to boolean, equality, display string)
//! - `context` - Data context that property paths resolve against
//! - `parser` - Tokenizer and recursive-descent parser
//! - `ast` - Abstract Syntax Tree definitions
//! - `evaluator` - Tree-walking evaluator
//! - `functions` - Function registry and built-in library
//! - `datetime` - Date built-ins
//! - `signature` - Arity contracts
//! - `cache` - Concurrent LRU cache of parsed expressions
//! - `config` - Engine and cache configuration
//! - `engine` - `ExpressionEngine` facade
//! - `template` - `TemplateEngine` and the `$when` / `$data` directives

pub mod value;
pub mod utils;
pub mod context;
pub mod ast;
pub mod parser;
pub mod evaluator;
pub mod functions;
pub mod datetime;
pub mod signature;
pub mod cache;
pub mod config;
pub mod engine;
pub mod template;

pub use ast::Expression;
pub use cache::{CacheStats, ExpressionCache};
pub use config::{BindingErrorPolicy, CacheConfig, ConfigError, EngineConfig};
pub use context::DataContext;
pub use engine::{EngineError, ExpressionEngine};
pub use evaluator::{ErrorKind, Evaluator, EvaluatorError};
pub use functions::{FunctionError, FunctionRegistry};
pub use parser::ParserError;
pub use template::{TemplateEngine, TemplateError};
pub use value::Value;

#[doc(hidden)]
pub use indexmap;

/// Parse an expression without caching it.
///
/// Compile once and evaluate the result against many contexts with
/// [`ExpressionEngine::evaluate_expression`].
pub fn compile(expression: &str) -> Result<Expression, ParserError> {
    parser::parse(expression)
}

/// Evaluate an expression against `data` with the built-in functions.
pub fn evaluate(expression: &str, data: &Value) -> Result<Value, EngineError> {
    let ast = compile(expression)?;
    let registry = FunctionRegistry::with_builtins();
    let context = DataContext::new(data.clone());
    Ok(Evaluator::new(&registry).evaluate(&ast, &context)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_and_evaluate() {
        let ast = compile("price * qty").unwrap();
        let engine = ExpressionEngine::new();
        let ctx = DataContext::new(value!({"price": 2.5, "qty": 4i64}));
        assert_eq!(engine.evaluate_expression(&ast, &ctx).unwrap(), value!(10i64));

        assert_eq!(
            evaluate("toUpper(name)", &value!({"name": "ada"})).unwrap(),
            value!("ADA")
        );
        assert!(matches!(evaluate("(", &Value::Null), Err(EngineError::Parse(_))));
    }
}
