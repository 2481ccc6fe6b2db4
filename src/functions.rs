// Function registry and built-in function library
//
// Built-ins are grouped by category in inline modules. Each module exposes a
// `register` hook that installs its functions under their expression names.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::signature::{Arity, SignatureError};
use crate::utils::{to_bool, to_display_string, to_integer, to_number};
use crate::value::Value;

/// Function errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FunctionError {
    #[error(transparent)]
    Arity(#[from] SignatureError),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Type coercion failed: {0}")]
    TypeCoercion(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Callable stored in the registry.
pub type BuiltinFn = Arc<dyn Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync>;

/// Name to implementation table consulted by the evaluator.
///
/// Registration is last-write-wins with a flat namespace, so a host function
/// registered under a built-in's name replaces it.
#[derive(Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, BuiltinFn>,
}

impl FunctionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        FunctionRegistry {
            functions: HashMap::new(),
        }
    }

    /// A registry pre-populated with every built-in.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        string::register(&mut registry);
        numeric::register(&mut registry);
        collection::register(&mut registry);
        logic::register(&mut registry);
        conversion::register(&mut registry);
        crate::datetime::register(&mut registry);
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
    }

    pub fn get(&self, name: &str) -> Option<&BuiltinFn> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Registered names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .finish()
    }
}

/// Built-in string functions
pub mod string {
    use super::*;

    pub fn register(registry: &mut FunctionRegistry) {
        registry.register("toLower", to_lower);
        registry.register("toUpper", to_upper);
        registry.register("substring", substring);
        registry.register("indexOf", index_of);
        registry.register("length", length);
        registry.register("replace", replace);
        registry.register("split", split);
        registry.register("join", join);
        registry.register("trim", trim);
        registry.register("startsWith", starts_with);
        registry.register("endsWith", ends_with);
        registry.register("contains", contains);
        registry.register("format", format);
        registry.register("concat", concat);
        registry.register("string", string);
    }

    /// toLower(s) - non-strings pass through unchanged
    pub fn to_lower(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(1).validate(args.len())?;
        Ok(match args[0].as_str() {
            Some(s) => Value::from(s.to_lowercase()),
            None => args[0].clone(),
        })
    }

    /// toUpper(s) - non-strings pass through unchanged
    pub fn to_upper(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(1).validate(args.len())?;
        Ok(match args[0].as_str() {
            Some(s) => Value::from(s.to_uppercase()),
            None => args[0].clone(),
        })
    }

    /// substring(s, start[, length])
    ///
    /// An out-of-range start returns `s` unchanged; the length is clamped to
    /// what is available. Offsets count characters, not bytes.
    pub fn substring(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Range(2, 3).validate(args.len())?;
        let s = match args[0].as_str() {
            Some(s) => s,
            None => return Ok(args[0].clone()),
        };

        let char_count = s.chars().count() as i64;
        let start = to_integer(&args[1]);
        if start < 0 || start >= char_count {
            return Ok(args[0].clone());
        }

        let available = char_count - start;
        let take = match args.get(2) {
            Some(length) => to_integer(length).clamp(0, available),
            None => available,
        };

        let result: String = s.chars().skip(start as usize).take(take as usize).collect();
        Ok(Value::from(result))
    }

    /// indexOf(s, search) - character offset of the first match, or -1
    pub fn index_of(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(2).validate(args.len())?;
        let index = match (args[0].as_str(), args[1].as_str()) {
            (Some(s), Some(search)) => s
                .find(search)
                .map(|byte| s[..byte].chars().count() as f64)
                .unwrap_or(-1.0),
            _ => -1.0,
        };
        Ok(Value::Number(index))
    }

    /// length(x) - characters of a string, elements of an array or object
    pub fn length(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(1).validate(args.len())?;
        Ok(Value::from(args[0].len().unwrap_or(0)))
    }

    pub fn replace(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(3).validate(args.len())?;
        Ok(match (args[0].as_str(), args[1].as_str(), args[2].as_str()) {
            (Some(s), Some(search), Some(replacement)) => {
                Value::from(s.replace(search, replacement))
            }
            _ => args[0].clone(),
        })
    }

    /// split(s, delimiter) - a non-string input yields a one-element array
    pub fn split(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(2).validate(args.len())?;
        let parts = match (args[0].as_str(), args[1].as_str()) {
            (Some(s), Some(delimiter)) => s.split(delimiter).map(Value::from).collect(),
            _ => vec![args[0].clone()],
        };
        Ok(Value::array(parts))
    }

    pub fn join(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(2).validate(args.len())?;
        let joined = match (args[0].as_array(), args[1].as_str()) {
            (Some(items), Some(delimiter)) => items
                .iter()
                .map(to_display_string)
                .collect::<Vec<_>>()
                .join(delimiter),
            _ => String::new(),
        };
        Ok(Value::from(joined))
    }

    pub fn trim(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(1).validate(args.len())?;
        Ok(match args[0].as_str() {
            Some(s) => Value::from(s.trim()),
            None => args[0].clone(),
        })
    }

    pub fn starts_with(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(2).validate(args.len())?;
        let result = match (args[0].as_str(), args[1].as_str()) {
            (Some(s), Some(prefix)) => s.starts_with(prefix),
            _ => false,
        };
        Ok(Value::Bool(result))
    }

    pub fn ends_with(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(2).validate(args.len())?;
        let result = match (args[0].as_str(), args[1].as_str()) {
            (Some(s), Some(suffix)) => s.ends_with(suffix),
            _ => false,
        };
        Ok(Value::Bool(result))
    }

    /// contains(container, item) - substring test for strings, membership
    /// by display string for arrays
    pub fn contains(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(2).validate(args.len())?;
        let result = match &args[0] {
            Value::String(s) => args[1].as_str().is_some_and(|search| s.contains(search)),
            Value::Array(items) => {
                let needle = to_display_string(&args[1]);
                items.iter().any(|item| to_display_string(item) == needle)
            }
            _ => false,
        };
        Ok(Value::Bool(result))
    }

    /// format(pattern, args...) - replaces `{0}`, `{1}`, ... placeholders
    pub fn format(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::AtLeast(1).validate(args.len())?;
        let mut result = match args[0].as_str() {
            Some(s) => s.to_string(),
            None => return Ok(args[0].clone()),
        };
        for (i, arg) in args[1..].iter().enumerate() {
            let placeholder = format!("{{{}}}", i);
            result = result.replace(&placeholder, &to_display_string(arg));
        }
        Ok(Value::from(result))
    }

    pub fn concat(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::AtLeast(1).validate(args.len())?;
        let result: String = args.iter().map(to_display_string).collect();
        Ok(Value::from(result))
    }

    /// string(x) - display string of any value
    pub fn string(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(1).validate(args.len())?;
        Ok(Value::from(to_display_string(&args[0])))
    }
}

/// Built-in numeric functions
pub mod numeric {
    use super::*;

    pub fn register(registry: &mut FunctionRegistry) {
        registry.register("add", add);
        registry.register("sub", sub);
        registry.register("mul", mul);
        registry.register("div", div);
        registry.register("mod", modulo);
        registry.register("min", min);
        registry.register("max", max);
        registry.register("round", round);
        registry.register("floor", floor);
        registry.register("ceil", ceil);
        registry.register("abs", abs);
    }

    pub fn add(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::AtLeast(2).validate(args.len())?;
        Ok(Value::Number(args.iter().map(to_number).sum()))
    }

    pub fn sub(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(2).validate(args.len())?;
        Ok(Value::Number(to_number(&args[0]) - to_number(&args[1])))
    }

    pub fn mul(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::AtLeast(2).validate(args.len())?;
        Ok(Value::Number(args.iter().map(to_number).product()))
    }

    pub fn div(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(2).validate(args.len())?;
        let divisor = to_number(&args[1]);
        if divisor == 0.0 {
            return Err(FunctionError::DivisionByZero);
        }
        Ok(Value::Number(to_number(&args[0]) / divisor))
    }

    pub fn modulo(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(2).validate(args.len())?;
        let divisor = to_number(&args[1]);
        if divisor == 0.0 {
            return Err(FunctionError::DivisionByZero);
        }
        Ok(Value::Number(to_number(&args[0]) % divisor))
    }

    pub fn min(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::AtLeast(1).validate(args.len())?;
        let result = args.iter().map(to_number).fold(f64::INFINITY, f64::min);
        Ok(Value::Number(result))
    }

    pub fn max(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::AtLeast(1).validate(args.len())?;
        let result = args.iter().map(to_number).fold(f64::NEG_INFINITY, f64::max);
        Ok(Value::Number(result))
    }

    /// round(n) - halves round to the nearest even integer
    pub fn round(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(1).validate(args.len())?;
        Ok(Value::Number(to_number(&args[0]).round_ties_even()))
    }

    pub fn floor(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(1).validate(args.len())?;
        Ok(Value::Number(to_number(&args[0]).floor()))
    }

    pub fn ceil(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(1).validate(args.len())?;
        Ok(Value::Number(to_number(&args[0]).ceil()))
    }

    pub fn abs(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(1).validate(args.len())?;
        Ok(Value::Number(to_number(&args[0]).abs()))
    }
}

/// Built-in collection functions
pub mod collection {
    use std::cmp::Ordering;
    use std::collections::HashSet;

    use super::*;

    pub fn register(registry: &mut FunctionRegistry) {
        registry.register("count", count);
        registry.register("first", first);
        registry.register("last", last);
        registry.register("filter", filter);
        registry.register("sort", sort);
        registry.register("flatten", flatten);
        registry.register("union", union);
        registry.register("intersection", intersection);
    }

    /// count(x) - length of a string, array or object; 0 for anything else
    pub fn count(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(1).validate(args.len())?;
        Ok(Value::from(args[0].len().unwrap_or(0)))
    }

    pub fn first(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(1).validate(args.len())?;
        Ok(args[0]
            .as_array()
            .and_then(|items| items.first())
            .cloned()
            .unwrap_or(Value::Null))
    }

    pub fn last(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(1).validate(args.len())?;
        Ok(args[0]
            .as_array()
            .and_then(|items| items.last())
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// filter(array) - drops null elements and empty strings
    pub fn filter(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::AtLeast(1).validate(args.len())?;
        let kept = match args[0].as_array() {
            Some(items) => items
                .iter()
                .filter(|item| match item {
                    Value::Null => false,
                    Value::String(s) => !s.is_empty(),
                    _ => true,
                })
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        Ok(Value::array(kept))
    }

    /// sort(array)
    ///
    /// Numeric order when every element is a number, lexical order when every
    /// element is a string, otherwise ordered by display string.
    pub fn sort(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(1).validate(args.len())?;
        let mut items = match args[0].as_array() {
            Some(items) => items.clone(),
            None => return Ok(Value::array(Vec::new())),
        };

        if items.iter().all(Value::is_number) {
            items.sort_by(|a, b| to_number(a).total_cmp(&to_number(b)));
        } else if items.iter().all(Value::is_string) {
            items.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
        } else {
            items.sort_by(|a, b| by_display(a, b));
        }
        Ok(Value::array(items))
    }

    fn by_display(a: &Value, b: &Value) -> Ordering {
        to_display_string(a).cmp(&to_display_string(b))
    }

    /// flatten(array) - one level only
    pub fn flatten(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(1).validate(args.len())?;
        let flat = match args[0].as_array() {
            Some(items) => crate::utils::flatten(items),
            None => Vec::new(),
        };
        Ok(Value::array(flat))
    }

    /// union(a, b) - `a` followed by the elements of `b` not already present,
    /// compared by display string
    pub fn union(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(2).validate(args.len())?;
        let (left, right) = match (args[0].as_array(), args[1].as_array()) {
            (Some(l), Some(r)) => (l, r),
            _ => return Ok(Value::array(Vec::new())),
        };

        let mut seen: HashSet<String> = left.iter().map(to_display_string).collect();
        let mut result = left.clone();
        for item in right.iter() {
            if seen.insert(to_display_string(item)) {
                result.push(item.clone());
            }
        }
        Ok(Value::array(result))
    }

    /// intersection(a, b) - elements of `a` whose display string occurs in `b`
    pub fn intersection(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(2).validate(args.len())?;
        let (left, right) = match (args[0].as_array(), args[1].as_array()) {
            (Some(l), Some(r)) => (l, r),
            _ => return Ok(Value::array(Vec::new())),
        };

        let present: HashSet<String> = right.iter().map(to_display_string).collect();
        let result = left
            .iter()
            .filter(|item| present.contains(&to_display_string(item)))
            .cloned()
            .collect();
        Ok(Value::array(result))
    }
}

/// Built-in logic and comparison functions
pub mod logic {
    use parking_lot::Mutex;
    use regex::Regex;

    use super::*;
    use crate::utils::loose_equals;

    pub fn register(registry: &mut FunctionRegistry) {
        registry.register("if", if_);
        registry.register("equals", equals);
        registry.register("not", not);
        registry.register("and", and);
        registry.register("or", or);
        registry.register("greaterThan", greater_than);
        registry.register("lessThan", less_than);
        registry.register("exists", exists);
        registry.register("empty", empty);
        let patterns = PatternCache::default();
        registry.register("isMatch", move |args: &[Value]| patterns.is_match(args));
    }

    /// if(cond, a, b) - both branches are already evaluated by the caller
    pub fn if_(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(3).validate(args.len())?;
        Ok(if to_bool(&args[0]) {
            args[1].clone()
        } else {
            args[2].clone()
        })
    }

    pub fn equals(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(2).validate(args.len())?;
        Ok(Value::Bool(loose_equals(&args[0], &args[1])))
    }

    pub fn not(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(1).validate(args.len())?;
        Ok(Value::Bool(!to_bool(&args[0])))
    }

    pub fn and(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::AtLeast(2).validate(args.len())?;
        Ok(Value::Bool(args.iter().all(to_bool)))
    }

    pub fn or(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::AtLeast(2).validate(args.len())?;
        Ok(Value::Bool(args.iter().any(to_bool)))
    }

    pub fn greater_than(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(2).validate(args.len())?;
        Ok(Value::Bool(to_number(&args[0]) > to_number(&args[1])))
    }

    pub fn less_than(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(2).validate(args.len())?;
        Ok(Value::Bool(to_number(&args[0]) < to_number(&args[1])))
    }

    pub fn exists(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(1).validate(args.len())?;
        Ok(Value::Bool(!args[0].is_null()))
    }

    /// empty(x) - true for null and for empty strings, arrays and objects
    pub fn empty(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(1).validate(args.len())?;
        let result = match &args[0] {
            Value::Null => true,
            other => other.len() == Some(0),
        };
        Ok(Value::Bool(result))
    }

    /// Maximum number of compiled `isMatch` patterns kept per registry
    pub const MAX_CACHED_PATTERNS: usize = 100;

    /// Compiled `isMatch` patterns, keyed by the pattern as written.
    ///
    /// Invalid patterns are cached as `None` so they are not recompiled either.
    #[derive(Default)]
    pub struct PatternCache {
        compiled: Mutex<HashMap<String, Option<Regex>>>,
    }

    impl PatternCache {
        /// isMatch(s, pattern) - whole-string regex match; an invalid pattern
        /// never matches
        pub fn is_match(&self, args: &[Value]) -> Result<Value, FunctionError> {
            Arity::Exact(2).validate(args.len())?;
            let (s, pattern) = match (args[0].as_str(), args[1].as_str()) {
                (Some(s), Some(pattern)) => (s, pattern),
                _ => return Ok(Value::Bool(false)),
            };
            let matched = self
                .compile(pattern)
                .is_some_and(|re| re.is_match(s));
            Ok(Value::Bool(matched))
        }

        pub fn len(&self) -> usize {
            self.compiled.lock().len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }

        fn compile(&self, pattern: &str) -> Option<Regex> {
            let mut compiled = self.compiled.lock();
            if let Some(cached) = compiled.get(pattern) {
                return cached.clone();
            }

            let regex = Regex::new(&format!("^(?:{})$", pattern)).ok();
            if compiled.len() >= MAX_CACHED_PATTERNS {
                if let Some(key) = compiled.keys().next().cloned() {
                    compiled.remove(&key);
                }
            }
            compiled.insert(pattern.to_string(), regex.clone());
            regex
        }
    }
}

/// Built-in type conversion functions
pub mod conversion {
    use super::*;
    use crate::utils::parse_number;

    pub fn register(registry: &mut FunctionRegistry) {
        registry.register("parseInt", parse_int);
        registry.register("int", parse_int);
        registry.register("parseFloat", parse_float);
        registry.register("float", parse_float);
        registry.register("toNumber", parse_float);
        registry.register("toString", super::string::string);
        registry.register("toBool", to_bool_fn);
    }

    fn strict_number(value: &Value, target: &str) -> Result<f64, FunctionError> {
        match value {
            Value::Number(n) => Ok(*n),
            Value::String(s) => parse_number(s).ok_or_else(|| {
                FunctionError::TypeCoercion(format!("cannot parse '{}' as {}", s, target))
            }),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Null => Ok(0.0),
            other => Err(FunctionError::TypeCoercion(format!(
                "cannot convert {} to {}",
                other.type_name(),
                target
            ))),
        }
    }

    /// parseInt(x) - truncates toward zero
    pub fn parse_int(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(1).validate(args.len())?;
        Ok(Value::Number(strict_number(&args[0], "integer")?.trunc()))
    }

    /// parseFloat(x), also installed as `float` and `toNumber`
    pub fn parse_float(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(1).validate(args.len())?;
        Ok(Value::Number(strict_number(&args[0], "number")?))
    }

    /// toBool(x) - "true"/"1"/"yes" and "false"/"0"/"no"/"" are recognised
    /// case-insensitively; other values use truthiness
    pub fn to_bool_fn(args: &[Value]) -> Result<Value, FunctionError> {
        Arity::Exact(1).validate(args.len())?;
        let result = match &args[0] {
            Value::String(s) => match s.to_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" | "" => false,
                _ => true,
            },
            Value::Object(_) => true,
            other => to_bool(other),
        };
        Ok(Value::Bool(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value;
    use pretty_assertions::assert_eq;

    fn call(name: &str, args: Vec<Value>) -> Result<Value, FunctionError> {
        let registry = FunctionRegistry::with_builtins();
        let function = registry.get(name).unwrap();
        function(&args)
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(call("toUpper", vec![value!("abc")]).unwrap(), value!("ABC"));
        assert_eq!(call("toLower", vec![value!(5i64)]).unwrap(), value!(5i64));
        assert_eq!(call("trim", vec![value!("  x ")]).unwrap(), value!("x"));
        assert_eq!(
            call("replace", vec![value!("a-b-c"), value!("-"), value!("+")]).unwrap(),
            value!("a+b+c")
        );
        assert_eq!(
            call("split", vec![value!("a,b"), value!(",")]).unwrap(),
            value!(["a", "b"])
        );
        assert_eq!(
            call("join", vec![value!([1i64, "x", null]), value!("|")]).unwrap(),
            value!("1|x|")
        );
        assert_eq!(
            call("indexOf", vec![value!("héllo"), value!("llo")]).unwrap(),
            value!(2i64)
        );
        assert_eq!(
            call("indexOf", vec![value!("abc"), value!(1i64)]).unwrap(),
            value!(-1i64)
        );
        assert_eq!(call("length", vec![value!("héllo")]).unwrap(), value!(5i64));
        assert_eq!(
            call("startsWith", vec![value!("hello"), value!("he")]).unwrap(),
            value!(true)
        );
        assert_eq!(
            call("endsWith", vec![value!("hello"), value!(1i64)]).unwrap(),
            value!(false)
        );
    }

    #[test]
    fn test_substring_clamping() {
        let s = value!("Hello World");
        assert_eq!(
            call("substring", vec![s.clone(), value!(6i64)]).unwrap(),
            value!("World")
        );
        assert_eq!(
            call("substring", vec![s.clone(), value!(0i64), value!(5i64)]).unwrap(),
            value!("Hello")
        );
        assert_eq!(
            call("substring", vec![s.clone(), value!(6i64), value!(100i64)]).unwrap(),
            value!("World")
        );
        assert_eq!(
            call("substring", vec![s.clone(), value!(-1i64)]).unwrap(),
            s.clone()
        );
        assert_eq!(
            call("substring", vec![s.clone(), value!(50i64)]).unwrap(),
            s
        );
    }

    #[test]
    fn test_contains_format_concat() {
        assert_eq!(
            call("contains", vec![value!("haystack"), value!("st")]).unwrap(),
            value!(true)
        );
        assert_eq!(
            call("contains", vec![value!([1i64, 2i64]), value!("2")]).unwrap(),
            value!(true)
        );
        assert_eq!(
            call("contains", vec![value!(null), value!("x")]).unwrap(),
            value!(false)
        );
        assert_eq!(
            call("format", vec![value!("{0} of {1}"), value!(3i64), value!(10i64)]).unwrap(),
            value!("3 of 10")
        );
        assert_eq!(
            call("concat", vec![value!("a"), value!(1i64), value!(null), value!(true)]).unwrap(),
            value!("a1true")
        );
        assert_eq!(call("string", vec![value!(2.0)]).unwrap(), value!("2"));
        assert_eq!(call("toString", vec![value!(null)]).unwrap(), value!(""));
    }

    #[test]
    fn test_numeric_functions() {
        assert_eq!(
            call("add", vec![value!(1i64), value!("2"), value!(true)]).unwrap(),
            value!(4i64)
        );
        assert_eq!(call("sub", vec![value!(5i64), value!(7i64)]).unwrap(), value!(-2i64));
        assert_eq!(
            call("mul", vec![value!(2i64), value!(3i64), value!(4i64)]).unwrap(),
            value!(24i64)
        );
        assert_eq!(call("div", vec![value!(7i64), value!(2i64)]).unwrap(), value!(3.5));
        assert_eq!(call("mod", vec![value!(7i64), value!(3i64)]).unwrap(), value!(1i64));
        assert_eq!(
            call("min", vec![value!(3i64), value!(-1i64), value!(2i64)]).unwrap(),
            value!(-1i64)
        );
        assert_eq!(call("max", vec![value!("9"), value!(4i64)]).unwrap(), value!(9i64));
        assert_eq!(call("round", vec![value!(2.5)]).unwrap(), value!(2i64));
        assert_eq!(call("round", vec![value!(3.5)]).unwrap(), value!(4i64));
        assert_eq!(call("floor", vec![value!(-1.5)]).unwrap(), value!(-2i64));
        assert_eq!(call("ceil", vec![value!(1.2)]).unwrap(), value!(2i64));
        assert_eq!(call("abs", vec![value!(-3i64)]).unwrap(), value!(3i64));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            call("div", vec![value!(1i64), value!(0i64)]),
            Err(FunctionError::DivisionByZero)
        );
        assert_eq!(
            call("mod", vec![value!(1i64), value!("abc")]),
            Err(FunctionError::DivisionByZero)
        );
    }

    #[test]
    fn test_collection_functions() {
        assert_eq!(call("count", vec![value!([1i64, 2i64, 3i64])]).unwrap(), value!(3i64));
        assert_eq!(call("count", vec![value!({"a": 1i64})]).unwrap(), value!(1i64));
        assert_eq!(call("count", vec![value!("abcd")]).unwrap(), value!(4i64));
        assert_eq!(call("count", vec![value!(42i64)]).unwrap(), value!(0i64));
        assert_eq!(call("first", vec![value!([])]).unwrap(), Value::Null);
        assert_eq!(call("last", vec![value!(["a", "b"])]).unwrap(), value!("b"));
        assert_eq!(
            call("filter", vec![value!([1i64, null, "", "x", false])]).unwrap(),
            value!([1i64, "x", false])
        );
        assert_eq!(
            call("flatten", vec![value!([1i64, [2i64, [3i64]]])]).unwrap(),
            value!([1i64, 2i64, [3i64]])
        );
        assert_eq!(
            call("union", vec![value!([1i64, 2i64]), value!(["2", 3i64])]).unwrap(),
            value!([1i64, 2i64, 3i64])
        );
        assert_eq!(
            call("intersection", vec![value!([1i64, 2i64, 3i64]), value!(["3", 1i64])]).unwrap(),
            value!([1i64, 3i64])
        );
        assert_eq!(
            call("union", vec![value!(null), value!([1i64])]).unwrap(),
            value!([])
        );
    }

    #[test]
    fn test_sort_modes() {
        assert_eq!(
            call("sort", vec![value!([10i64, 2i64, 33i64])]).unwrap(),
            value!([2i64, 10i64, 33i64])
        );
        assert_eq!(
            call("sort", vec![value!(["pear", "apple", "fig"])]).unwrap(),
            value!(["apple", "fig", "pear"])
        );
        // Mixed: ordered by display string, so 10 sorts before 9
        assert_eq!(
            call("sort", vec![value!([9i64, "10", true])]).unwrap(),
            value!(["10", 9i64, true])
        );
    }

    #[test]
    fn test_logic_functions() {
        assert_eq!(
            call("if", vec![value!(""), value!("yes"), value!("no")]).unwrap(),
            value!("no")
        );
        assert_eq!(call("equals", vec![value!(1i64), value!("1")]).unwrap(), value!(true));
        assert_eq!(call("not", vec![value!(0i64)]).unwrap(), value!(true));
        assert_eq!(
            call("and", vec![value!(true), value!(1i64), value!("x")]).unwrap(),
            value!(true)
        );
        assert_eq!(call("or", vec![value!(false), value!(null)]).unwrap(), value!(false));
        assert_eq!(
            call("greaterThan", vec![value!("10"), value!(9i64)]).unwrap(),
            value!(true)
        );
        assert_eq!(call("lessThan", vec![value!(1i64), value!(1i64)]).unwrap(), value!(false));
        assert_eq!(call("exists", vec![value!(false)]).unwrap(), value!(true));
        assert_eq!(call("exists", vec![value!(null)]).unwrap(), value!(false));
        assert_eq!(call("empty", vec![value!([])]).unwrap(), value!(true));
        assert_eq!(call("empty", vec![value!(0i64)]).unwrap(), value!(false));
    }

    #[test]
    fn test_is_match() {
        assert_eq!(
            call("isMatch", vec![value!("abc123"), value!("[a-z]+\\d+")]).unwrap(),
            value!(true)
        );
        // Whole-string match only
        assert_eq!(
            call("isMatch", vec![value!("xabc"), value!("abc")]).unwrap(),
            value!(false)
        );
        assert_eq!(
            call("isMatch", vec![value!("abc"), value!("(unclosed")]).unwrap(),
            value!(false)
        );
    }

    #[test]
    fn test_is_match_compiles_each_pattern_once() {
        use logic::{PatternCache, MAX_CACHED_PATTERNS};

        let patterns = PatternCache::default();
        for row in ["a1", "b22", "c333", "nope"] {
            let expected = row != "nope";
            assert_eq!(
                patterns.is_match(&[value!(row), value!("[a-z]\\d+")]).unwrap(),
                value!(expected)
            );
        }
        patterns.is_match(&[value!("x"), value!("(")]).unwrap();
        patterns.is_match(&[value!("y"), value!("(")]).unwrap();
        assert_eq!(patterns.len(), 2);

        for i in 0..MAX_CACHED_PATTERNS + 10 {
            let pattern = format!("p{}", i);
            assert_eq!(
                patterns.is_match(&[Value::from(pattern.clone()), Value::from(pattern)]).unwrap(),
                value!(true)
            );
        }
        assert_eq!(patterns.len(), MAX_CACHED_PATTERNS);
    }

    #[test]
    fn test_conversion_functions() {
        assert_eq!(call("parseInt", vec![value!("42.9")]).unwrap(), value!(42i64));
        assert_eq!(call("int", vec![value!(-3.7)]).unwrap(), value!(-3i64));
        assert_eq!(call("parseFloat", vec![value!("2.5")]).unwrap(), value!(2.5));
        assert_eq!(call("toNumber", vec![value!(true)]).unwrap(), value!(1i64));
        assert!(matches!(
            call("toNumber", vec![value!("abc")]),
            Err(FunctionError::TypeCoercion(_))
        ));
        assert!(matches!(
            call("parseInt", vec![value!([1i64])]),
            Err(FunctionError::TypeCoercion(_))
        ));
        assert_eq!(call("toBool", vec![value!("YES")]).unwrap(), value!(true));
        assert_eq!(call("toBool", vec![value!("no")]).unwrap(), value!(false));
        assert_eq!(call("toBool", vec![value!("0")]).unwrap(), value!(false));
        assert_eq!(call("toBool", vec![value!("maybe")]).unwrap(), value!(true));
        assert_eq!(call("toBool", vec![Value::empty_object()]).unwrap(), value!(true));
    }

    #[test]
    fn test_arity_is_checked_first() {
        let err = call("substring", vec![value!("x")]).unwrap_err();
        assert_eq!(
            err,
            FunctionError::Arity(SignatureError::ArgumentCountMismatch {
                expected: Arity::Range(2, 3),
                actual: 1
            })
        );
        assert!(call("add", vec![value!(1i64)]).is_err());
        assert!(call("count", vec![]).is_err());
    }

    #[test]
    fn test_registration_is_last_write_wins() {
        let mut registry = FunctionRegistry::with_builtins();
        assert!(registry.contains("toUpper"));
        let before = registry.len();

        registry.register("toUpper", |_args: &[Value]| Ok(Value::from("overridden")));
        registry.register("double", |args: &[Value]| {
            Arity::Exact(1).validate(args.len())?;
            Ok(Value::Number(to_number(&args[0]) * 2.0))
        });

        assert_eq!(registry.len(), before + 1);
        let upper = registry.get("toUpper").unwrap();
        assert_eq!(upper(&[value!("a")]).unwrap(), value!("overridden"));
        let double = registry.get("double").unwrap();
        assert_eq!(double(&[value!(21i64)]).unwrap(), value!(42i64));
    }

    #[test]
    fn test_registry_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FunctionRegistry>();
    }
}
