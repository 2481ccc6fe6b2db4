// Template expansion
//
// Walks a JSON-shaped template, substituting `${...}` bindings inside strings
// and applying the `$when` / `$data` directives on objects.

use indexmap::IndexMap;
use thiserror::Error;
use tracing::debug;

use crate::config::BindingErrorPolicy;
use crate::context::DataContext;
use crate::engine::{EngineError, ExpressionEngine};
use crate::utils::{to_bool, to_display_string};
use crate::value::Value;

/// Object key holding a boolean condition for the enclosing object
pub const WHEN_KEY: &str = "$when";

/// Object key (on array elements) holding the data to repeat the element over
pub const DATA_KEY: &str = "$data";

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Unmatched brace in template expression starting at byte {position}")]
    UnmatchedBrace { position: usize },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Expands templates against data.
///
/// Individual bindings never abort an expansion: a failed `${...}` becomes
/// the empty string (or stays as written, per [`BindingErrorPolicy`]), and a
/// failed `$when` or `$data` drops its element. Only a `${` without a closing
/// brace is reported as an error.
#[derive(Debug, Default)]
pub struct TemplateEngine {
    engine: ExpressionEngine,
    policy: BindingErrorPolicy,
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self::with_engine(ExpressionEngine::new())
    }

    /// Wrap an existing engine, taking the binding policy from its config.
    pub fn with_engine(engine: ExpressionEngine) -> Self {
        let policy = engine.config().binding_errors;
        TemplateEngine { engine, policy }
    }

    pub fn with_policy(mut self, policy: BindingErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> BindingErrorPolicy {
        self.policy
    }

    pub fn engine(&self) -> &ExpressionEngine {
        &self.engine
    }

    /// Mutable access for registering host functions.
    pub fn engine_mut(&mut self) -> &mut ExpressionEngine {
        &mut self.engine
    }

    /// Expand any template value against `data`.
    pub fn expand(&self, template: &Value, data: &Value) -> Result<Value, TemplateError> {
        self.expand_with_context(template, &DataContext::new(data.clone()))
    }

    pub fn expand_with_context(
        &self,
        template: &Value,
        context: &DataContext,
    ) -> Result<Value, TemplateError> {
        self.expand_value(template, context)
    }

    /// Interpolate the bindings of a single string.
    pub fn expand_str(&self, template: &str, data: &Value) -> Result<String, TemplateError> {
        let context = DataContext::new(data.clone());
        interpolate(&self.engine, template, &context, self.policy)
    }

    /// Expand a JSON template document against a JSON data document.
    pub fn expand_json(&self, template: &str, data: &str) -> Result<String, TemplateError> {
        let template = Value::from_json_str(template)?;
        let data = Value::from_json_str(data)?;
        let expanded = self.expand(&template, &data)?;
        Ok(expanded.to_json_string()?)
    }

    fn expand_value(&self, value: &Value, context: &DataContext) -> Result<Value, TemplateError> {
        match value {
            Value::String(s) => Ok(Value::from(interpolate(
                &self.engine,
                s,
                context,
                self.policy,
            )?)),
            Value::Object(map) => self.expand_dictionary(map, context),
            Value::Array(items) => self.expand_array(items, context),
            other => Ok(other.clone()),
        }
    }

    fn expand_dictionary(
        &self,
        map: &IndexMap<String, Value>,
        context: &DataContext,
    ) -> Result<Value, TemplateError> {
        if let Some(condition) = map.get(WHEN_KEY) {
            if !self.condition_holds(condition, context) {
                return Ok(Value::empty_object());
            }
        }

        let mut expanded = IndexMap::with_capacity(map.len());
        for (key, value) in map {
            if key == WHEN_KEY {
                continue;
            }
            expanded.insert(key.clone(), self.expand_value(value, context)?);
        }
        Ok(Value::object(expanded))
    }

    fn expand_array(&self, items: &[Value], context: &DataContext) -> Result<Value, TemplateError> {
        let mut expanded = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::Object(map) if map.contains_key(DATA_KEY) => {
                    self.expand_repeated(map, context, &mut expanded)?;
                }
                Value::Object(map) => {
                    let element = self.expand_dictionary(map, context)?;
                    if !is_empty_object(&element) {
                        expanded.push(element);
                    }
                }
                other => expanded.push(self.expand_value(other, context)?),
            }
        }
        Ok(Value::array(expanded))
    }

    /// Expand an array element carrying `$data`, appending one result per
    /// bound row.
    fn expand_repeated(
        &self,
        map: &IndexMap<String, Value>,
        context: &DataContext,
        out: &mut Vec<Value>,
    ) -> Result<(), TemplateError> {
        let data = match map.get(DATA_KEY) {
            Some(Value::String(source)) => match self.evaluate_directive(source, context) {
                Ok(data) => data,
                Err(error) => {
                    debug!(binding = %source, %error, "dropping element with failed $data");
                    return Ok(());
                }
            },
            // Inline data
            Some(other) => self.expand_value(other, context)?,
            None => return Ok(()),
        };

        let mut body = map.clone();
        body.shift_remove(DATA_KEY);

        match data {
            Value::Array(rows) => {
                for (index, row) in rows.iter().enumerate() {
                    let child = context.create_child(row.clone(), index);
                    push_non_empty(out, self.expand_dictionary(&body, &child)?);
                }
            }
            Value::Null => {}
            scope => {
                let child = context.with_scope(scope);
                push_non_empty(out, self.expand_dictionary(&body, &child)?);
            }
        }
        Ok(())
    }

    fn condition_holds(&self, condition: &Value, context: &DataContext) -> bool {
        match condition {
            Value::String(source) => match self.evaluate_directive(source, context) {
                Ok(result) => to_bool(&result),
                Err(error) => {
                    debug!(binding = %source, %error, "dropping element with failed $when");
                    false
                }
            },
            other => to_bool(other),
        }
    }

    /// Evaluate a `$when` / `$data` expression, written bare or as a single
    /// `${...}` binding.
    fn evaluate_directive(&self, source: &str, context: &DataContext) -> Result<Value, EngineError> {
        self.engine.evaluate(unwrap_binding(source), context)
    }
}

fn push_non_empty(out: &mut Vec<Value>, element: Value) {
    if !is_empty_object(&element) {
        out.push(element);
    }
}

fn is_empty_object(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map.is_empty())
}

/// Strip `${` and `}` when the whole string is exactly one binding.
fn unwrap_binding(source: &str) -> &str {
    let trimmed = source.trim();
    if let Some(body) = trimmed.strip_prefix("${") {
        if find_closing_brace(trimmed, 2) == Some(trimmed.len() - 1) {
            return &body[..body.len() - 1];
        }
    }
    trimmed
}

/// Byte offset of the `}` closing a binding whose body starts at `from`.
fn find_closing_brace(text: &str, from: usize) -> Option<usize> {
    let mut depth = 1usize;
    for (offset, c) in text[from..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(from + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Evaluate the body of one `${...}` binding.
pub(crate) fn evaluate_span(
    engine: &ExpressionEngine,
    source: &str,
    context: &DataContext,
) -> Result<Value, EngineError> {
    engine.evaluate(source, context)
}

/// Replace every `${...}` binding in `text`, applying `policy` to failures.
///
/// Substituted text is not rescanned.
pub(crate) fn interpolate(
    engine: &ExpressionEngine,
    text: &str,
    context: &DataContext,
    policy: BindingErrorPolicy,
) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find("${") {
        let start = cursor + offset;
        let end = find_closing_brace(text, start + 2)
            .ok_or(TemplateError::UnmatchedBrace { position: start })?;

        out.push_str(&text[cursor..start]);
        let source = &text[start + 2..end];
        match evaluate_span(engine, source, context) {
            Ok(value) => out.push_str(&to_display_string(&value)),
            Err(error) => {
                debug!(binding = source, %error, "template binding failed");
                if policy == BindingErrorPolicy::KeepOriginal {
                    out.push_str(&text[start..=end]);
                }
            }
        }
        cursor = end + 1;
    }

    out.push_str(&text[cursor..]);
    Ok(out)
}
