//! Abstract Syntax Tree for form expressions

use formflow_types::FieldValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// AST node representing an expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// Literal value (number, string, boolean)
    Literal(FieldValue),

    /// Variable reference (field name)
    Variable(String),

    /// Unary operation (-a, +a)
    UnaryOp { operator: UnaryOperator, operand: Box<Expression> },

    /// Arithmetic operation (a + b, a ** b, ...)
    BinaryOp { left: Box<Expression>, operator: BinaryOperator, right: Box<Expression> },

    /// Comparison chain (`0 <= x < 10` holds when every link holds)
    Compare { first: Box<Expression>, rest: Vec<(CompareOperator, Expression)> },

    /// Run of `and` / `or` operands
    BoolOp { operator: BoolOperator, operands: Vec<Expression> },

    /// Whitelisted function call (max(a, b), round(x, 2))
    Call { name: String, args: Vec<Expression> },

    /// Conditional expression (test ? then : else)
    Conditional { test: Box<Expression>, then_expr: Box<Expression>, else_expr: Box<Expression> },
}

/// Arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

/// Boolean connectives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolOperator {
    And,
    Or,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    /// Numeric negation (-x)
    Negate,
    /// Numeric identity (+x)
    Plus,
}

impl Expression {
    /// Create a literal integer expression
    pub fn int(value: i64) -> Self {
        Self::Literal(FieldValue::Integer(value))
    }

    /// Create a literal float expression
    pub fn float(value: f64) -> Self {
        Self::Literal(FieldValue::Float(value))
    }

    /// Create a literal string expression
    pub fn string(value: String) -> Self {
        Self::Literal(FieldValue::String(value))
    }

    /// Create a literal boolean expression
    pub fn bool(value: bool) -> Self {
        Self::Literal(FieldValue::Boolean(value))
    }

    /// Create a variable reference
    pub fn var(name: &str) -> Self {
        Self::Variable(name.to_string())
    }

    /// Create a binary operation
    pub fn binary(left: Expression, op: BinaryOperator, right: Expression) -> Self {
        Self::BinaryOp { left: Box::new(left), operator: op, right: Box::new(right) }
    }

    /// Create a unary operation
    pub fn unary(op: UnaryOperator, operand: Expression) -> Self {
        Self::UnaryOp { operator: op, operand: Box::new(operand) }
    }

    /// Create a comparison chain
    pub fn compare(first: Expression, rest: Vec<(CompareOperator, Expression)>) -> Self {
        Self::Compare { first: Box::new(first), rest }
    }

    /// Create a boolean operation over two or more operands
    pub fn bool_op(op: BoolOperator, operands: Vec<Expression>) -> Self {
        Self::BoolOp { operator: op, operands }
    }

    /// Create a function call
    pub fn call(name: &str, args: Vec<Expression>) -> Self {
        Self::Call { name: name.to_string(), args }
    }

    /// Create a conditional expression
    pub fn conditional(test: Expression, then_expr: Expression, else_expr: Expression) -> Self {
        Self::Conditional {
            test: Box::new(test),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
        }
    }

    /// Number of nodes on the longest root-to-leaf path; a lone literal is 1
    pub fn depth(&self) -> usize {
        let children = match self {
            Expression::Literal(_) | Expression::Variable(_) => 0,
            Expression::UnaryOp { operand, .. } => operand.depth(),
            Expression::BinaryOp { left, right, .. } => left.depth().max(right.depth()),
            Expression::Compare { first, rest } => rest
                .iter()
                .map(|(_, operand)| operand.depth())
                .fold(first.depth(), usize::max),
            Expression::BoolOp { operands, .. } => {
                operands.iter().map(Expression::depth).max().unwrap_or(0)
            }
            Expression::Call { args, .. } => args.iter().map(Expression::depth).max().unwrap_or(0),
            Expression::Conditional { test, then_expr, else_expr } => {
                test.depth().max(then_expr.depth()).max(else_expr.depth())
            }
        };
        children + 1
    }

    fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expression)) {
        visit(self);
        match self {
            Expression::Literal(_) | Expression::Variable(_) => {}
            Expression::UnaryOp { operand, .. } => operand.walk(visit),
            Expression::BinaryOp { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            Expression::Compare { first, rest } => {
                first.walk(visit);
                for (_, operand) in rest {
                    operand.walk(visit);
                }
            }
            Expression::BoolOp { operands, .. } => {
                for operand in operands {
                    operand.walk(visit);
                }
            }
            Expression::Call { args, .. } => {
                for arg in args {
                    arg.walk(visit);
                }
            }
            Expression::Conditional { test, then_expr, else_expr } => {
                test.walk(visit);
                then_expr.walk(visit);
                else_expr.walk(visit);
            }
        }
    }
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Power => "**",
        }
    }
}

impl CompareOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOperator::Equal => "==",
            CompareOperator::NotEqual => "!=",
            CompareOperator::LessThan => "<",
            CompareOperator::LessThanOrEqual => "<=",
            CompareOperator::GreaterThan => ">",
            CompareOperator::GreaterThanOrEqual => ">=",
        }
    }

    /// Equality operators are the only ones defined for booleans, lists and null
    pub fn is_equality(&self) -> bool {
        matches!(self, CompareOperator::Equal | CompareOperator::NotEqual)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(FieldValue::String(s)) => write!(f, "{s:?}"),
            Expression::Literal(value) => write!(f, "{value}"),
            Expression::Variable(name) => write!(f, "{name}"),
            Expression::UnaryOp { operator, operand } => match operator {
                UnaryOperator::Negate => write!(f, "-({operand})"),
                UnaryOperator::Plus => write!(f, "+({operand})"),
            },
            Expression::BinaryOp { left, operator, right } => {
                write!(f, "({left} {} {right})", operator.symbol())
            }
            Expression::Compare { first, rest } => {
                write!(f, "({first}")?;
                for (op, operand) in rest {
                    write!(f, " {} {operand}", op.symbol())?;
                }
                write!(f, ")")
            }
            Expression::BoolOp { operator, operands } => {
                let joiner = match operator {
                    BoolOperator::And => " and ",
                    BoolOperator::Or => " or ",
                };
                let parts: Vec<String> = operands.iter().map(ToString::to_string).collect();
                write!(f, "({})", parts.join(joiner))
            }
            Expression::Call { name, args } => {
                let parts: Vec<String> = args.iter().map(ToString::to_string).collect();
                write!(f, "{name}({})", parts.join(", "))
            }
            Expression::Conditional { test, then_expr, else_expr } => {
                write!(f, "({test} ? {then_expr} : {else_expr})")
            }
        }
    }
}

/// Extract all variable references from an expression, sorted and de-duplicated
pub fn extract_variables(expr: &Expression) -> Vec<String> {
    let mut variables = BTreeSet::new();
    expr.walk(&mut |node| {
        if let Expression::Variable(name) = node {
            variables.insert(name.clone());
        }
    });
    variables.into_iter().collect()
}

/// Extract all called function names from an expression, sorted and de-duplicated
pub fn extract_calls(expr: &Expression) -> Vec<String> {
    let mut calls = BTreeSet::new();
    expr.walk(&mut |node| {
        if let Expression::Call { name, .. } = node {
            calls.insert(name.clone());
        }
    });
    calls.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_variables() {
        // max(a, b) > c ? a : d
        let expr = Expression::conditional(
            Expression::compare(
                Expression::call("max", vec![Expression::var("a"), Expression::var("b")]),
                vec![(CompareOperator::GreaterThan, Expression::var("c"))],
            ),
            Expression::var("a"),
            Expression::var("d"),
        );

        assert_eq!(extract_variables(&expr), vec!["a", "b", "c", "d"]);
        assert_eq!(extract_calls(&expr), vec!["max"]);
    }

    #[test]
    fn test_depth() {
        assert_eq!(Expression::int(1).depth(), 1);

        let expr = Expression::binary(
            Expression::unary(UnaryOperator::Negate, Expression::var("x")),
            BinaryOperator::Add,
            Expression::int(2),
        );
        assert_eq!(expr.depth(), 3);
        assert_eq!(Expression::call("min", vec![]).depth(), 1);
    }

    #[test]
    fn test_display() {
        let expr = Expression::bool_op(
            BoolOperator::And,
            vec![
                Expression::compare(
                    Expression::int(0),
                    vec![
                        (CompareOperator::LessThanOrEqual, Expression::var("x")),
                        (CompareOperator::LessThan, Expression::int(10)),
                    ],
                ),
                Expression::string("a".to_string()),
            ],
        );
        assert_eq!(expr.to_string(), "((0 <= x < 10) and \"a\")");
    }
}
