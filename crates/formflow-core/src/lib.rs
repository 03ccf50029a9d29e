#![deny(warnings)]
#![allow(missing_docs)]

//! Core functionality for the formflow form computation engine.
//!
//! This crate evaluates administrator-authored expressions against form submissions:
//! conditions decide field visibility, formulas derive values, and field rules validate
//! what the user typed. Expressions run in a small, bounded language that can only call
//! registered functions.

use tracing::{debug, instrument};

/// Bounded LRU cache for compiled expressions and patterns
pub mod cache;
/// Expression language: parser, evaluator and function registry
pub mod calculator;
/// Engine configuration loaded from TOML and the environment
pub mod config;
/// Default limits and configuration keys
pub mod constants;
/// Error types for parsing, evaluation and loading
pub mod error;
/// Two-pass submission processing
pub mod form_processor;
/// Template loading and authoring checks
pub mod template_validation;

pub use calculator::functions::{Arity, FunctionRegistry};
pub use calculator::parser::{ParserLimits, parse_expression};
pub use calculator::{Calculator, CompiledExpression, EvaluationContext};
pub use config::EngineConfig;
pub use error::{EvalError, ExpressionError, FormflowError, FormflowResult, ParseError};
pub use form_processor::{FormProcessor, ProcessOutcome, submission_from_json};
pub use template_validation::{
    TemplateIssue, TemplateIssueKind, TemplateValidator, load_template, load_template_value,
};

pub use formflow_types::{
    Field, FieldType, FieldValue, FormTemplate, Section, SubmissionData, ValidationError,
    ValidationErrorKind, ValidationRules,
};

/// Load the engine configuration and build a processor from it
#[instrument]
pub fn init() -> anyhow::Result<FormProcessor> {
    let config = EngineConfig::load()?;
    debug!(?config, "Initializing formflow core engine");
    Ok(FormProcessor::with_config(config))
}
