//! Built-in functions for form expressions
//!
//! The registry is the only way an expression can call anything. It is built once,
//! never mutated while shared, and handed to the evaluator explicitly. Financial and
//! date functions come from `formflow-calculator` and see the evaluation date through
//! the context.

use crate::calculator::EvaluationContext;
use crate::error::EvalError;
use formflow_calculator::{Calculator, CalculatorInputs, standard_calculators};
use formflow_types::FieldValue;
use std::collections::HashMap;
use std::fmt;

/// Accepted argument counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Range(usize, usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Exact(n) => count == n,
            Arity::Range(min, max) => (min..=max).contains(&count),
            Arity::AtLeast(min) => count >= min,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(1) => write!(f, "1 argument"),
            Arity::Exact(n) => write!(f, "{n} arguments"),
            Arity::Range(min, max) => write!(f, "{min} to {max} arguments"),
            Arity::AtLeast(min) => write!(f, "at least {min} argument(s)"),
        }
    }
}

/// Trait for functions that can be called from expressions
pub trait CalculatorFunction: Send + Sync {
    /// Call the function with already evaluated arguments
    fn call(&self, args: &[FieldValue]) -> Result<FieldValue, EvalError>;

    /// Accepted argument counts
    fn arity(&self) -> Arity;

    /// Get a description of this function
    fn description(&self) -> &'static str;
}

/// Trait for functions that need the evaluation context (e.g. today's date)
pub trait ContextAwareFunction: Send + Sync {
    /// Call the function with arguments and context
    fn call_with_context(
        &self,
        args: &[FieldValue],
        context: &EvaluationContext,
    ) -> Result<FieldValue, EvalError>;

    /// Accepted argument counts
    fn arity(&self) -> Arity;

    /// Get a description of this function
    fn description(&self) -> &'static str;
}

/// Registry for expression functions
#[derive(Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Box<dyn CalculatorFunction>>,
    context_functions: HashMap<String, Box<dyn ContextAwareFunction>>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry").field("functions", &self.list_functions()).finish()
    }
}

impl FunctionRegistry {
    /// Create a registry with no functions at all
    pub fn empty() -> Self {
        Self { functions: HashMap::new(), context_functions: HashMap::new() }
    }

    /// Create the standard library: math, financial and date functions
    pub fn standard() -> Self {
        let mut registry = Self::empty();

        // Mathematical functions
        registry.register("min", Box::new(MinFunction));
        registry.register("max", Box::new(MaxFunction));
        registry.register("abs", Box::new(AbsFunction));
        registry.register("round", Box::new(RoundFunction));
        registry.register("sum", Box::new(SumFunction));
        registry.register("floor", Box::new(FloorFunction));
        registry.register("ceil", Box::new(CeilFunction));

        // Financial and date functions
        for calculator in standard_calculators() {
            let name = calculator.name();
            registry.register_context_function(name, Box::new(CalculatorAdapter(calculator)));
        }

        registry
    }

    /// Register a new function, replacing any function of the same name
    pub fn register(&mut self, name: &str, function: Box<dyn CalculatorFunction>) {
        self.context_functions.remove(name);
        self.functions.insert(name.to_string(), function);
    }

    /// Register a new context-aware function, replacing any function of the same name
    pub fn register_context_function(
        &mut self,
        name: &str,
        function: Box<dyn ContextAwareFunction>,
    ) {
        self.functions.remove(name);
        self.context_functions.insert(name.to_string(), function);
    }

    /// The same registry without `name`
    pub fn without(mut self, name: &str) -> Self {
        self.functions.remove(name);
        self.context_functions.remove(name);
        self
    }

    /// Whether `name` is callable
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name) || self.context_functions.contains_key(name)
    }

    /// Accepted argument counts for `name`
    pub fn arity(&self, name: &str) -> Option<Arity> {
        self.functions
            .get(name)
            .map(|f| f.arity())
            .or_else(|| self.context_functions.get(name).map(|f| f.arity()))
    }

    /// Description of `name`
    pub fn description(&self, name: &str) -> Option<&'static str> {
        self.functions
            .get(name)
            .map(|f| f.description())
            .or_else(|| self.context_functions.get(name).map(|f| f.description()))
    }

    /// Call a function by name, checking that it exists and accepts `args.len()` arguments
    pub fn call_with_context(
        &self,
        name: &str,
        args: &[FieldValue],
        context: &EvaluationContext,
    ) -> Result<FieldValue, EvalError> {
        let arity = self
            .arity(name)
            .ok_or_else(|| EvalError::DisallowedFunction { name: name.to_string() })?;
        check_arity(name, arity, args.len())?;

        if let Some(function) = self.context_functions.get(name) {
            return function.call_with_context(args, context);
        }
        match self.functions.get(name) {
            Some(function) => function.call(args),
            None => Err(EvalError::DisallowedFunction { name: name.to_string() }),
        }
    }

    /// Names of all registered functions, sorted
    pub fn list_functions(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .functions
            .keys()
            .chain(self.context_functions.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names
    }
}

/// Verify an argument count against a function's arity
pub fn check_arity(name: &str, arity: Arity, count: usize) -> Result<(), EvalError> {
    if arity.accepts(count) {
        Ok(())
    } else {
        Err(EvalError::invalid_arguments(name, format!("expects {arity}, got {count}")))
    }
}

/// Exposes a `formflow-calculator` kernel as a context-aware function
struct CalculatorAdapter(Box<dyn Calculator>);

impl ContextAwareFunction for CalculatorAdapter {
    fn call_with_context(
        &self,
        args: &[FieldValue],
        context: &EvaluationContext,
    ) -> Result<FieldValue, EvalError> {
        let inputs = CalculatorInputs::new(args, context.today);
        self.0
            .calculate(&inputs)
            .map_err(|e| EvalError::invalid_arguments(self.0.name(), e.to_string()))
    }

    fn arity(&self) -> Arity {
        Arity::Exact(self.0.arity())
    }

    fn description(&self) -> &'static str {
        self.0.description()
    }
}

fn numeric<'a>(function: &str, value: &'a FieldValue) -> Result<&'a FieldValue, EvalError> {
    if value.is_numeric() {
        Ok(value)
    } else {
        Err(EvalError::invalid_arguments(
            function,
            format!("expected a number, got {}", value.type_name()),
        ))
    }
}

/// Whole-number result for `floor` / `ceil` / `round`
fn to_integer(function: &str, value: f64) -> Result<FieldValue, EvalError> {
    if value.is_finite() && value >= i64::MIN as f64 && value < i64::MAX as f64 {
        Ok(FieldValue::Integer(value as i64))
    } else {
        Err(EvalError::invalid_arguments(function, format!("{value} is out of integer range")))
    }
}

/// True when `candidate` should replace `current` for min (`Less`) or max (`Greater`)
fn beats(candidate: &FieldValue, current: &FieldValue, wanted: std::cmp::Ordering) -> bool {
    let ordering = match (candidate, current) {
        (FieldValue::Integer(a), FieldValue::Integer(b)) => Some(a.cmp(b)),
        _ => candidate.as_f64().zip(current.as_f64()).and_then(|(a, b)| a.partial_cmp(&b)),
    };
    ordering == Some(wanted)
}

/// `min` / `max` over the arguments, or over the elements of a single list argument
fn select_extreme(
    function: &str,
    args: &[FieldValue],
    wanted: std::cmp::Ordering,
) -> Result<FieldValue, EvalError> {
    let items = match args {
        [FieldValue::Array(items)] => items.as_slice(),
        _ => args,
    };

    let (first, rest) = items
        .split_first()
        .ok_or_else(|| EvalError::invalid_arguments(function, "empty sequence"))?;

    let mut best = numeric(function, first)?;
    for item in rest {
        let item = numeric(function, item)?;
        if beats(item, best, wanted) {
            best = item;
        }
    }

    Ok(best.clone())
}

// Mathematical functions

struct MinFunction;
impl CalculatorFunction for MinFunction {
    fn call(&self, args: &[FieldValue]) -> Result<FieldValue, EvalError> {
        select_extreme("min", args, std::cmp::Ordering::Less)
    }

    fn arity(&self) -> Arity {
        Arity::AtLeast(1)
    }
    fn description(&self) -> &'static str {
        "Returns the smallest argument, or the smallest element of a single list"
    }
}

struct MaxFunction;
impl CalculatorFunction for MaxFunction {
    fn call(&self, args: &[FieldValue]) -> Result<FieldValue, EvalError> {
        select_extreme("max", args, std::cmp::Ordering::Greater)
    }

    fn arity(&self) -> Arity {
        Arity::AtLeast(1)
    }
    fn description(&self) -> &'static str {
        "Returns the largest argument, or the largest element of a single list"
    }
}

struct AbsFunction;
impl CalculatorFunction for AbsFunction {
    fn call(&self, args: &[FieldValue]) -> Result<FieldValue, EvalError> {
        match numeric("abs", &args[0])? {
            FieldValue::Integer(n) => Ok(n
                .checked_abs()
                .map_or(FieldValue::Float((*n as f64).abs()), FieldValue::Integer)),
            other => Ok(FieldValue::Float(other.as_f64().unwrap_or_default().abs())),
        }
    }

    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }
    fn description(&self) -> &'static str {
        "Returns the absolute value of a number"
    }
}

/// Round an integer to a negative number of digits, half to even
fn round_integer(value: i64, digits: i64) -> Option<i64> {
    if digits >= 0 {
        return Some(value);
    }
    let Some(step) = u32::try_from(-digits).ok().and_then(|p| 10i64.checked_pow(p)) else {
        return Some(0);
    };
    let quotient = value.div_euclid(step);
    let remainder = value.rem_euclid(step);
    let twice = remainder.checked_mul(2)?;
    let quotient = if twice > step || (twice == step && quotient % 2 != 0) {
        quotient + 1
    } else {
        quotient
    };
    quotient.checked_mul(step)
}

struct RoundFunction;
impl CalculatorFunction for RoundFunction {
    fn call(&self, args: &[FieldValue]) -> Result<FieldValue, EvalError> {
        let value = numeric("round", &args[0])?;

        let Some(digits) = args.get(1) else {
            return match value {
                FieldValue::Integer(n) => Ok(FieldValue::Integer(*n)),
                other => to_integer("round", other.as_f64().unwrap_or_default().round_ties_even()),
            };
        };

        let digits = match digits {
            FieldValue::Integer(d) => *d,
            other => {
                return Err(EvalError::invalid_arguments(
                    "round",
                    format!("digits must be an integer, got {}", other.type_name()),
                ));
            }
        };

        match value {
            FieldValue::Integer(n) => round_integer(*n, digits)
                .map(FieldValue::Integer)
                .ok_or_else(|| EvalError::non_finite("round()")),
            other => {
                let x = other.as_f64().unwrap_or_default();
                let factor = 10f64.powi(digits.unsigned_abs().min(400) as i32);
                if digits >= 0 {
                    let scaled = x * factor;
                    if !scaled.is_finite() {
                        return Ok(FieldValue::Float(x));
                    }
                    Ok(FieldValue::Float(scaled.round_ties_even() / factor))
                } else {
                    if !factor.is_finite() {
                        return Ok(FieldValue::Float(0.0));
                    }
                    Ok(FieldValue::Float((x / factor).round_ties_even() * factor))
                }
            }
        }
    }

    fn arity(&self) -> Arity {
        Arity::Range(1, 2)
    }
    fn description(&self) -> &'static str {
        "Rounds half to even; round(x) gives an integer, round(x, n) keeps n decimals"
    }
}

struct SumFunction;
impl CalculatorFunction for SumFunction {
    fn call(&self, args: &[FieldValue]) -> Result<FieldValue, EvalError> {
        let items = match &args[0] {
            FieldValue::Array(items) => items,
            other => {
                return Err(EvalError::invalid_arguments(
                    "sum",
                    format!("expected a list, got {}", other.type_name()),
                ));
            }
        };
        let start = match args.get(1) {
            Some(start) => numeric("sum", start)?.clone(),
            None => FieldValue::Integer(0),
        };

        items.iter().try_fold(start, |total, item| {
            let item = numeric("sum", item)?;
            Ok(match (&total, item) {
                (FieldValue::Integer(a), FieldValue::Integer(b)) => a
                    .checked_add(*b)
                    .map_or(FieldValue::Float(*a as f64 + *b as f64), FieldValue::Integer),
                _ => FieldValue::Float(
                    total.as_f64().unwrap_or_default() + item.as_f64().unwrap_or_default(),
                ),
            })
        })
    }

    fn arity(&self) -> Arity {
        Arity::Range(1, 2)
    }
    fn description(&self) -> &'static str {
        "Sums the numbers of a list, plus an optional start value"
    }
}

struct FloorFunction;
impl CalculatorFunction for FloorFunction {
    fn call(&self, args: &[FieldValue]) -> Result<FieldValue, EvalError> {
        match numeric("floor", &args[0])? {
            FieldValue::Integer(n) => Ok(FieldValue::Integer(*n)),
            other => to_integer("floor", other.as_f64().unwrap_or_default().floor()),
        }
    }

    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }
    fn description(&self) -> &'static str {
        "Returns the largest integer less than or equal to the number"
    }
}

struct CeilFunction;
impl CalculatorFunction for CeilFunction {
    fn call(&self, args: &[FieldValue]) -> Result<FieldValue, EvalError> {
        match numeric("ceil", &args[0])? {
            FieldValue::Integer(n) => Ok(FieldValue::Integer(*n)),
            other => to_integer("ceil", other.as_f64().unwrap_or_default().ceil()),
        }
    }

    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }
    fn description(&self) -> &'static str {
        "Returns the smallest integer greater than or equal to the number"
    }
}
