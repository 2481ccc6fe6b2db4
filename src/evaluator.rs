// Expression evaluator
//
// Walks an AST against a DataContext, applying the coercion rules from
// `utils` and dispatching calls through a FunctionRegistry.

use thiserror::Error;

use crate::ast::{BinaryOp, Expression, UnaryOp};
use crate::context::DataContext;
use crate::functions::{FunctionError, FunctionRegistry};
use crate::signature::{Arity, SignatureError};
use crate::utils::{loose_equals, to_bool, to_display_string, to_number};
use crate::value::Value;

/// Evaluator errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluatorError {
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("{function} expects {expected} argument(s), got {actual}")]
    ArityMismatch {
        function: String,
        expected: Arity,
        actual: usize,
    },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("{function}: {source}")]
    Function {
        function: String,
        #[source]
        source: FunctionError,
    },
}

/// Coarse classification of an evaluation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnknownFunction,
    ArityMismatch,
    DivisionByZero,
    TypeCoercion,
    UnknownOperator,
}

impl EvaluatorError {
    /// Classify the error, looking through failures raised inside a
    /// function.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EvaluatorError::UnknownFunction(_) => ErrorKind::UnknownFunction,
            EvaluatorError::ArityMismatch { .. } => ErrorKind::ArityMismatch,
            EvaluatorError::DivisionByZero => ErrorKind::DivisionByZero,
            EvaluatorError::UnknownOperator(_) => ErrorKind::UnknownOperator,
            EvaluatorError::Function { source, .. } => match source {
                FunctionError::Arity(_) => ErrorKind::ArityMismatch,
                FunctionError::DivisionByZero => ErrorKind::DivisionByZero,
                FunctionError::TypeCoercion(_) | FunctionError::Runtime(_) => {
                    ErrorKind::TypeCoercion
                }
            },
        }
    }

    fn from_function(function: &str, error: FunctionError) -> Self {
        match error {
            FunctionError::Arity(SignatureError::ArgumentCountMismatch { expected, actual }) => {
                EvaluatorError::ArityMismatch {
                    function: function.to_string(),
                    expected,
                    actual,
                }
            }
            source => EvaluatorError::Function {
                function: function.to_string(),
                source,
            },
        }
    }
}

/// Tree-walking evaluator.
///
/// Holds only a borrowed registry, so one evaluator can serve any number of
/// evaluations (and threads) at once.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    functions: &'a FunctionRegistry,
}

impl<'a> Evaluator<'a> {
    pub fn new(functions: &'a FunctionRegistry) -> Self {
        Evaluator { functions }
    }

    /// Evaluate an expression against a context.
    pub fn evaluate(
        &self,
        expr: &Expression,
        context: &DataContext,
    ) -> Result<Value, EvaluatorError> {
        match expr {
            Expression::Literal(value) => Ok(value.clone()),

            Expression::PropertyAccess(path) => Ok(context.resolve(path)),

            Expression::FunctionCall { name, args } => {
                self.evaluate_function_call(name, args, context)
            }

            Expression::Binary { op, lhs, rhs } => {
                // Both operands are evaluated before the operator is applied,
                // including for && and ||.
                let left = self.evaluate(lhs, context)?;
                let right = self.evaluate(rhs, context)?;
                self.evaluate_binary_op(*op, &left, &right)
            }

            Expression::Unary { op, operand } => {
                let value = self.evaluate(operand, context)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!to_bool(&value)),
                    UnaryOp::Negate => Value::Number(-to_number(&value)),
                })
            }

            Expression::Ternary {
                condition,
                when_true,
                when_false,
            } => {
                let condition = self.evaluate(condition, context)?;
                if to_bool(&condition) {
                    self.evaluate(when_true, context)
                } else {
                    self.evaluate(when_false, context)
                }
            }
        }
    }

    fn evaluate_function_call(
        &self,
        name: &str,
        args: &[Expression],
        context: &DataContext,
    ) -> Result<Value, EvaluatorError> {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| EvaluatorError::UnknownFunction(name.to_string()))?;

        let values = args
            .iter()
            .map(|arg| self.evaluate(arg, context))
            .collect::<Result<Vec<_>, _>>()?;

        function(&values).map_err(|e| EvaluatorError::from_function(name, e))
    }

    fn evaluate_binary_op(
        &self,
        op: BinaryOp,
        left: &Value,
        right: &Value,
    ) -> Result<Value, EvaluatorError> {
        let result = match op {
            BinaryOp::Add => {
                if left.is_string() || right.is_string() {
                    let mut s = to_display_string(left);
                    s.push_str(&to_display_string(right));
                    Value::from(s)
                } else {
                    Value::Number(to_number(left) + to_number(right))
                }
            }
            BinaryOp::Subtract => Value::Number(to_number(left) - to_number(right)),
            BinaryOp::Multiply => Value::Number(to_number(left) * to_number(right)),
            BinaryOp::Divide => Value::Number(to_number(left) / nonzero(right)?),
            BinaryOp::Modulo => Value::Number(to_number(left) % nonzero(right)?),

            BinaryOp::Equal => Value::Bool(loose_equals(left, right)),
            BinaryOp::NotEqual => Value::Bool(!loose_equals(left, right)),
            BinaryOp::LessThan => Value::Bool(to_number(left) < to_number(right)),
            BinaryOp::LessThanOrEqual => Value::Bool(to_number(left) <= to_number(right)),
            BinaryOp::GreaterThan => Value::Bool(to_number(left) > to_number(right)),
            BinaryOp::GreaterThanOrEqual => Value::Bool(to_number(left) >= to_number(right)),

            BinaryOp::And => Value::Bool(to_bool(left) && to_bool(right)),
            BinaryOp::Or => Value::Bool(to_bool(left) || to_bool(right)),

            BinaryOp::In => return Err(EvaluatorError::UnknownOperator(op.to_string())),
        };
        Ok(result)
    }
}

fn nonzero(divisor: &Value) -> Result<f64, EvaluatorError> {
    let n = to_number(divisor);
    if n == 0.0 {
        Err(EvaluatorError::DivisionByZero)
    } else {
        Ok(n)
    }
}
