//! Expression evaluator for form expressions
//!
//! Walks a parsed AST against the submission's current values. Evaluation is pure:
//! the only way out of the tree is the function registry, and every failure is a
//! typed [`EvalError`]. A name with no binding is an error wherever its value would
//! be used; it never silently becomes null.

use crate::calculator::EvaluationContext;
use crate::calculator::ast::{
    BinaryOperator, BoolOperator, CompareOperator, Expression, UnaryOperator,
};
use crate::calculator::functions::FunctionRegistry;
use crate::error::EvalError;
use formflow_types::FieldValue;
use std::cmp::Ordering;

/// Evaluate an expression in the given context
pub fn evaluate_expression(
    expr: &Expression,
    context: &EvaluationContext,
    functions: &FunctionRegistry,
) -> Result<FieldValue, EvalError> {
    let value = evaluate_to_value(expr, context, functions)?;
    ensure_finite(value, "expression")
}

/// Evaluate an expression to a single value
fn evaluate_to_value(
    expr: &Expression,
    context: &EvaluationContext,
    functions: &FunctionRegistry,
) -> Result<FieldValue, EvalError> {
    match expr {
        Expression::Literal(value) => Ok(value.clone()),

        Expression::Variable(name) => context
            .variables
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::DisallowedOperand { name: name.clone() }),

        Expression::UnaryOp { operator, operand } => {
            let operand_val = evaluate_to_value(operand, context, functions)?;
            evaluate_unary_op(*operator, &operand_val)
        }

        Expression::BinaryOp { left, operator, right } => {
            let left_val = evaluate_to_value(left, context, functions)?;
            let right_val = evaluate_to_value(right, context, functions)?;
            evaluate_binary_op(&left_val, *operator, &right_val)
        }

        Expression::Compare { first, rest } => {
            let mut left_val = evaluate_to_value(first, context, functions)?;
            for (operator, operand) in rest {
                let right_val = evaluate_to_value(operand, context, functions)?;
                if !compare_values(&left_val, *operator, &right_val)? {
                    return Ok(FieldValue::Boolean(false));
                }
                left_val = right_val;
            }
            Ok(FieldValue::Boolean(true))
        }

        Expression::BoolOp { operator, operands } => {
            // `and` stops at the first falsy operand, `or` at the first truthy one
            let stop_on = matches!(operator, BoolOperator::Or);
            for operand in operands {
                if evaluate_to_value(operand, context, functions)?.is_truthy() == stop_on {
                    return Ok(FieldValue::Boolean(stop_on));
                }
            }
            Ok(FieldValue::Boolean(!stop_on))
        }

        Expression::Call { name, args } => {
            if !functions.contains(name) {
                return Err(EvalError::DisallowedFunction { name: name.clone() });
            }
            let mut arg_values = Vec::with_capacity(args.len());
            for arg in args {
                arg_values.push(evaluate_to_value(arg, context, functions)?);
            }
            let result = functions.call_with_context(name, &arg_values, context)?;
            ensure_finite(result, &format!("{name}()"))
        }

        Expression::Conditional { test, then_expr, else_expr } => {
            if evaluate_to_value(test, context, functions)?.is_truthy() {
                evaluate_to_value(then_expr, context, functions)
            } else {
                evaluate_to_value(else_expr, context, functions)
            }
        }
    }
}

fn ensure_finite(value: FieldValue, operation: &str) -> Result<FieldValue, EvalError> {
    match value {
        FieldValue::Float(f) if !f.is_finite() => Err(EvalError::non_finite(operation)),
        other => Ok(other),
    }
}

fn float_result(value: f64, operator: BinaryOperator) -> Result<FieldValue, EvalError> {
    if value.is_finite() {
        Ok(FieldValue::Float(value))
    } else {
        Err(EvalError::non_finite(format!("'{}'", operator.symbol())))
    }
}

/// Remainder with the sign of the divisor
fn floored_mod(a: f64, b: f64) -> f64 {
    let remainder = a % b;
    if remainder != 0.0 && (remainder < 0.0) != (b < 0.0) { remainder + b } else { remainder }
}

fn evaluate_unary_op(operator: UnaryOperator, operand: &FieldValue) -> Result<FieldValue, EvalError> {
    match (operator, operand) {
        (UnaryOperator::Plus, FieldValue::Integer(_) | FieldValue::Float(_)) => Ok(operand.clone()),
        (UnaryOperator::Negate, FieldValue::Integer(n)) => {
            Ok(n.checked_neg().map_or(FieldValue::Float(-(*n as f64)), FieldValue::Integer))
        }
        (UnaryOperator::Negate, FieldValue::Float(f)) => Ok(FieldValue::Float(-f)),
        (op, other) => Err(EvalError::type_mismatch(format!(
            "unary '{}' is not defined for {}",
            match op {
                UnaryOperator::Negate => "-",
                UnaryOperator::Plus => "+",
            },
            other.type_name()
        ))),
    }
}

fn evaluate_binary_op(
    left: &FieldValue,
    operator: BinaryOperator,
    right: &FieldValue,
) -> Result<FieldValue, EvalError> {
    use BinaryOperator::*;
    use FieldValue::Integer;

    match (left, right, operator) {
        (FieldValue::String(a), FieldValue::String(b), Add) => {
            Ok(FieldValue::String(format!("{a}{b}")))
        }

        // Integer arithmetic stays integral until it would overflow
        (Integer(a), Integer(b), Add) => {
            a.checked_add(*b).map_or_else(|| float_result(*a as f64 + *b as f64, Add), |n| Ok(Integer(n)))
        }
        (Integer(a), Integer(b), Subtract) => a
            .checked_sub(*b)
            .map_or_else(|| float_result(*a as f64 - *b as f64, Subtract), |n| Ok(Integer(n))),
        (Integer(a), Integer(b), Multiply) => a
            .checked_mul(*b)
            .map_or_else(|| float_result(*a as f64 * *b as f64, Multiply), |n| Ok(Integer(n))),
        (Integer(a), Integer(b), Modulo) => {
            if *b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            match a.checked_rem(*b) {
                Some(r) if r != 0 && (r < 0) != (*b < 0) => Ok(Integer(r + b)),
                Some(r) => Ok(Integer(r)),
                // i64::MIN % -1
                None => Ok(Integer(0)),
            }
        }
        (Integer(a), Integer(b), Power) if *b >= 0 => {
            match u32::try_from(*b).ok().and_then(|exp| a.checked_pow(exp)) {
                Some(n) => Ok(Integer(n)),
                None => float_result((*a as f64).powf(*b as f64), Power),
            }
        }

        // Everything else numeric goes through f64
        (l, r, op) if l.is_numeric() && r.is_numeric() => {
            let a = l.as_f64().unwrap_or_default();
            let b = r.as_f64().unwrap_or_default();
            match op {
                Add => float_result(a + b, op),
                Subtract => float_result(a - b, op),
                Multiply => float_result(a * b, op),
                Divide => {
                    if b == 0.0 {
                        return Err(EvalError::DivisionByZero);
                    }
                    float_result(a / b, op)
                }
                Modulo => {
                    if b == 0.0 {
                        return Err(EvalError::DivisionByZero);
                    }
                    float_result(floored_mod(a, b), op)
                }
                Power => {
                    if a == 0.0 && b < 0.0 {
                        return Err(EvalError::DivisionByZero);
                    }
                    float_result(a.powf(b), op)
                }
            }
        }

        (l, r, op) => Err(EvalError::type_mismatch(format!(
            "'{}' is not defined for {} and {}",
            op.symbol(),
            l.type_name(),
            r.type_name()
        ))),
    }
}

/// One link of a comparison chain
fn compare_values(
    left: &FieldValue,
    operator: CompareOperator,
    right: &FieldValue,
) -> Result<bool, EvalError> {
    let mismatch = || {
        EvalError::type_mismatch(format!(
            "'{}' is not defined for {} and {}",
            operator.symbol(),
            left.type_name(),
            right.type_name()
        ))
    };

    let ordering = match (left, right) {
        (FieldValue::Integer(a), FieldValue::Integer(b)) => a.cmp(b),
        (l, r) if l.is_numeric() && r.is_numeric() => {
            let (a, b) = (l.as_f64().unwrap_or_default(), r.as_f64().unwrap_or_default());
            a.partial_cmp(&b).ok_or_else(mismatch)?
        }
        (FieldValue::String(a), FieldValue::String(b)) => a.cmp(b),

        // Equality-only kinds
        (FieldValue::Boolean(_), FieldValue::Boolean(_))
        | (FieldValue::Array(_), FieldValue::Array(_))
        | (FieldValue::Object(_), FieldValue::Object(_))
        | (FieldValue::Null, FieldValue::Null)
        | (FieldValue::Null, _)
        | (_, FieldValue::Null)
            if operator.is_equality() =>
        {
            let equal = left == right;
            return Ok(if operator == CompareOperator::Equal { equal } else { !equal });
        }

        _ => return Err(mismatch()),
    };

    Ok(match operator {
        CompareOperator::Equal => ordering == Ordering::Equal,
        CompareOperator::NotEqual => ordering != Ordering::Equal,
        CompareOperator::LessThan => ordering == Ordering::Less,
        CompareOperator::LessThanOrEqual => ordering != Ordering::Greater,
        CompareOperator::GreaterThan => ordering == Ordering::Greater,
        CompareOperator::GreaterThanOrEqual => ordering != Ordering::Less,
    })
}
