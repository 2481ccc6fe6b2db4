// Abstract Syntax Tree definitions

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Expression AST node.
///
/// Immutable once built. A parsed expression holds no references into the
/// source or the data it is evaluated against, so the same tree can be
/// evaluated any number of times, from any thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// String, number or boolean literal
    Literal(Value),

    /// Dotted property path (e.g. `user.name`, `$root.title`, `items.0`)
    ///
    /// Chained `.ident` segments fold into one path rather than nesting.
    PropertyAccess(String),

    /// Call of a registry function by name
    FunctionCall { name: String, args: Vec<Expression> },

    /// Binary operation
    Binary {
        op: BinaryOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },

    /// Unary operation
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },

    /// Conditional expression (`cond ? a : b`)
    Ternary {
        condition: Box<Expression>,
        when_true: Box<Expression>,
        when_false: Box<Expression>,
    },
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,

    // Logical
    And,
    Or,

    // Membership (parsed, not evaluated)
    In,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Negation (-)
    Negate,

    /// Logical NOT (!)
    Not,
}

impl BinaryOp {
    /// Source spelling of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::In => "in",
        }
    }
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::Not => "!",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl Expression {
    /// Create a literal node
    pub fn literal(value: impl Into<Value>) -> Self {
        Expression::Literal(value.into())
    }

    /// Create a property access node
    pub fn path(path: impl Into<String>) -> Self {
        Expression::PropertyAccess(path.into())
    }

    /// Create a function call node
    pub fn call(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::FunctionCall {
            name: name.into(),
            args,
        }
    }

    /// Create a binary operation node
    pub fn binary(op: BinaryOp, lhs: Expression, rhs: Expression) -> Self {
        Expression::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Create a unary operation node
    pub fn unary(op: UnaryOp, operand: Expression) -> Self {
        Expression::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    /// Create a ternary node
    pub fn ternary(condition: Expression, when_true: Expression, when_false: Expression) -> Self {
        Expression::Ternary {
            condition: Box::new(condition),
            when_true: Box::new(when_true),
            when_false: Box::new(when_false),
        }
    }

    /// Whether the tree contains no property access anywhere.
    ///
    /// Such an expression evaluates to the same result under every context.
    pub fn is_context_free(&self) -> bool {
        match self {
            Expression::Literal(_) => true,
            Expression::PropertyAccess(_) => false,
            Expression::FunctionCall { args, .. } => args.iter().all(Expression::is_context_free),
            Expression::Binary { lhs, rhs, .. } => lhs.is_context_free() && rhs.is_context_free(),
            Expression::Unary { operand, .. } => operand.is_context_free(),
            Expression::Ternary {
                condition,
                when_true,
                when_false,
            } => {
                condition.is_context_free()
                    && when_true.is_context_free()
                    && when_false.is_context_free()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_creation() {
        let node = Expression::literal("hello");
        assert!(matches!(node, Expression::Literal(Value::String(_))));

        let node = Expression::path("a.b");
        assert_eq!(node, Expression::PropertyAccess("a.b".to_string()));

        let node = Expression::binary(
            BinaryOp::Add,
            Expression::literal(1.0),
            Expression::literal(2.0),
        );
        assert!(matches!(node, Expression::Binary { op: BinaryOp::Add, .. }));
    }

    #[test]
    fn test_context_free() {
        let call = Expression::call("toUpper", vec![Expression::literal("x")]);
        assert!(call.is_context_free());

        let ternary = Expression::ternary(
            Expression::literal(true),
            Expression::literal(1.0),
            Expression::path("fallback"),
        );
        assert!(!ternary.is_context_free());
    }

    #[test]
    fn test_operator_symbols() {
        assert_eq!(BinaryOp::GreaterThanOrEqual.to_string(), ">=");
        assert_eq!(BinaryOp::In.to_string(), "in");
        assert_eq!(UnaryOp::Not.to_string(), "!");
    }
}
