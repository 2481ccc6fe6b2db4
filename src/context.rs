// Data context: the chained scope that property paths resolve against

use std::sync::Arc;

use crate::value::Value;

/// Immutable scope exposing the current value, the document root, an
/// optional iteration index and a parent link.
///
/// A fresh context is created per top-level expansion; every `$data`
/// iteration step derives a child with [`DataContext::create_child`]. The
/// root is shared by every link of the chain.
#[derive(Debug, Clone)]
pub struct DataContext {
    value: Value,
    root: Value,
    index: Option<usize>,
    parent: Option<Arc<DataContext>>,
}

impl DataContext {
    /// Create a root context whose current value is also the root.
    pub fn new(data: Value) -> Self {
        DataContext {
            root: data.clone(),
            value: data,
            index: None,
            parent: None,
        }
    }

    /// Create a child context for one iteration step.
    pub fn create_child(&self, value: Value, index: usize) -> Self {
        DataContext {
            value,
            root: self.root.clone(),
            index: Some(index),
            parent: Some(Arc::new(self.clone())),
        }
    }

    /// Create a child scope rebinding `$data` without an iteration index.
    pub fn with_scope(&self, value: Value) -> Self {
        DataContext {
            value,
            root: self.root.clone(),
            index: None,
            parent: Some(Arc::new(self.clone())),
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn parent(&self) -> Option<&DataContext> {
        self.parent.as_deref()
    }

    /// Resolve a dotted property path.
    ///
    /// `$data`, `$root` and `$index` are reserved; `$root.` and `$data.`
    /// prefixes pick the base the remainder is walked against. Absence is
    /// reported as `Value::Null`, never as an error.
    pub fn resolve(&self, path: &str) -> Value {
        match path {
            "$data" => return self.value.clone(),
            "$root" => return self.root.clone(),
            "$index" => return self.index.map(Value::from).unwrap_or(Value::Null),
            _ => {}
        }

        if let Some(rest) = path.strip_prefix("$root.") {
            return resolve_path(rest, &self.root);
        }
        if let Some(rest) = path.strip_prefix("$data.") {
            return resolve_path(rest, &self.value);
        }

        resolve_path(path, &self.value)
    }
}

impl Default for DataContext {
    fn default() -> Self {
        Self::new(Value::Null)
    }
}

fn resolve_path(path: &str, base: &Value) -> Value {
    let mut current = base;
    for segment in path.split('.') {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(arr) => segment.parse::<usize>().ok().and_then(|i| arr.get(i)),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return Value::Null,
        }
    }
    current.clone()
}
