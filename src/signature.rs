// Arity contracts for registry functions
//
// Every built-in checks its argument count before touching its arguments.

use std::fmt;

use thiserror::Error;

/// Signature validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Argument count mismatch: expected {expected}, got {actual}")]
    ArgumentCountMismatch { expected: Arity, actual: usize },
}

/// Number of arguments a function accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    /// Inclusive bounds
    Range(usize, usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, actual: usize) -> bool {
        match self {
            Arity::Exact(n) => actual == n,
            Arity::Range(min, max) => actual >= min && actual <= max,
            Arity::AtLeast(min) => actual >= min,
        }
    }

    /// Validate argument count
    pub fn validate(self, actual: usize) -> Result<(), SignatureError> {
        if self.accepts(actual) {
            Ok(())
        } else {
            Err(SignatureError::ArgumentCountMismatch {
                expected: self,
                actual,
            })
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{}", n),
            Arity::Range(min, max) => write!(f, "{} to {}", min, max),
            Arity::AtLeast(min) => write!(f, "at least {}", min),
        }
    }
}
