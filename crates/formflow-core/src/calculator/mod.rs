//! Expression language for form conditions and formulas
//!
//! Administrators write small expressions such as `income > 0` or
//! `round(emi(loan, rate, years), 2)`. The language is:
//! - Safe: no attribute access, indexing, assignment or statements; calls only reach
//!   the functions in a [`FunctionRegistry`]
//! - Bounded: input length and nesting depth are capped at parse time
//! - Pure: evaluation reads the submission and the evaluation date, nothing else

pub mod ast;
pub mod evaluator;
pub mod functions;
pub mod parser;

use crate::cache::{CacheStats, LruCache};
use crate::error::{EvalError, ExpressionError, ParseError};
use chrono::NaiveDate;
use formflow_types::FieldValue;
use functions::FunctionRegistry;
use crate::constants::limits;
use parser::ParserLimits;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// A parsed expression together with its source
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    /// Original expression string
    pub source: String,
    /// Parsed abstract syntax tree
    pub ast: ast::Expression,
    /// Variables referenced in the expression, sorted
    pub variables: Vec<String>,
}

/// Context for evaluating expressions
#[derive(Debug, Clone)]
pub struct EvaluationContext<'a> {
    /// Current field values
    pub variables: &'a HashMap<String, FieldValue>,
    /// The date `age()` measures against
    pub today: NaiveDate,
}

impl<'a> EvaluationContext<'a> {
    /// Context over `variables`, dated today (local time)
    pub fn new(variables: &'a HashMap<String, FieldValue>) -> Self {
        Self { variables, today: chrono::Local::now().date_naive() }
    }

    /// Context over `variables` at a fixed date
    pub fn at(variables: &'a HashMap<String, FieldValue>, today: NaiveDate) -> Self {
        Self { variables, today }
    }

    /// Create an empty evaluation context for testing
    pub fn empty() -> EvaluationContext<'static> {
        use std::sync::LazyLock;

        static EMPTY_VARIABLES: LazyLock<HashMap<String, FieldValue>> =
            LazyLock::new(HashMap::new);

        EvaluationContext::new(&EMPTY_VARIABLES)
    }

    /// The same context at another date
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }
}

/// Parses and evaluates expressions against one function registry
#[derive(Debug)]
pub struct Calculator {
    /// Callable functions
    functions: FunctionRegistry,
    /// Parse limits
    limits: ParserLimits,
    /// Compiled expressions keyed by source, absent when caching is disabled.
    /// Only successful parses are kept; results never depend on an entry existing.
    expression_cache: Option<LruCache<String, Arc<CompiledExpression>>>,
}

impl Default for Calculator {
    fn default() -> Self {
        Self::new()
    }
}

impl Calculator {
    /// Create a calculator with the standard library, default limits and a cache
    pub fn new() -> Self {
        Self::with_registry(
            FunctionRegistry::standard(),
            ParserLimits::default(),
            Some(limits::EXPRESSION_CACHE_CAPACITY),
        )
    }

    /// `cache_capacity` of `None` disables the expression cache
    pub fn with_registry(
        functions: FunctionRegistry,
        limits: ParserLimits,
        cache_capacity: Option<usize>,
    ) -> Self {
        Self { functions, limits, expression_cache: cache_capacity.map(LruCache::new) }
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn limits(&self) -> ParserLimits {
        self.limits
    }

    /// Number of cached expressions (0 when caching is disabled)
    pub fn cached_expressions(&self) -> usize {
        self.expression_cache.as_ref().map_or(0, LruCache::len)
    }

    /// Expression cache occupancy, `None` when caching is disabled
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.expression_cache.as_ref().map(LruCache::stats)
    }

    /// Parse and compile an expression
    pub fn compile(&self, expression: &str) -> Result<Arc<CompiledExpression>, ParseError> {
        if let Some(cached) = self.expression_cache.as_ref().and_then(|c| c.get(expression)) {
            return Ok(cached);
        }

        let ast = parser::parse_with_limits(expression, self.limits)?;
        let variables = ast::extract_variables(&ast);
        let compiled = Arc::new(CompiledExpression { source: expression.to_string(), ast, variables });

        if let Some(cache) = &self.expression_cache {
            trace!(expression, "caching compiled expression");
            cache.insert(expression.to_string(), Arc::clone(&compiled));
        }

        Ok(compiled)
    }

    /// Evaluate a compiled expression in the given context
    pub fn evaluate(
        &self,
        expression: &CompiledExpression,
        context: &EvaluationContext,
    ) -> Result<FieldValue, EvalError> {
        evaluator::evaluate_expression(&expression.ast, context, &self.functions)
    }

    /// Convenience method to compile and evaluate in one step
    pub fn eval(
        &self,
        expression: &str,
        context: &EvaluationContext,
    ) -> Result<FieldValue, ExpressionError> {
        let compiled = self.compile(expression)?;
        Ok(self.evaluate(&compiled, context)?)
    }
}
