//! Error handling for the formflow core
//!
//! Expression problems are split by phase: [`ParseError`] for text the grammar does not
//! accept and [`EvalError`] for well-formed expressions that fail against a submission.
//! Neither ever escapes submission processing; the orchestrator turns them into a
//! visible field (conditions) or a `formula_error` (formulas). [`FormflowError`] covers
//! everything around the engine: loading templates, configuration and I/O.

use thiserror::Error;

/// Expression text the grammar rejects. Positions are byte offsets into the source.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected character '{ch}' at position {position}")]
    UnexpectedChar { ch: char, position: usize },

    #[error("unexpected token '{found}' at position {position}, expected {expected}")]
    UnexpectedToken { found: String, expected: String, position: usize },

    #[error("unexpected end of expression at position {position}, expected {expected}")]
    UnexpectedEnd { expected: String, position: usize },

    #[error("unterminated string literal starting at position {position}")]
    UnterminatedString { position: usize },

    #[error("invalid number literal '{literal}' at position {position}")]
    InvalidNumber { literal: String, position: usize },

    #[error("expression nests deeper than {max_depth} levels")]
    TooDeep { max_depth: usize },

    #[error("expression is {length} bytes long, the limit is {max_length}")]
    TooLong { length: usize, max_length: usize },

    #[error("{construct} is not allowed (position {position})")]
    Disallowed { construct: String, position: usize },
}

impl ParseError {
    /// Byte offset of the offending input, when the error has one
    pub fn position(&self) -> Option<usize> {
        match self {
            ParseError::UnexpectedChar { position, .. }
            | ParseError::UnexpectedToken { position, .. }
            | ParseError::UnexpectedEnd { position, .. }
            | ParseError::UnterminatedString { position }
            | ParseError::InvalidNumber { position, .. }
            | ParseError::Disallowed { position, .. } => Some(*position),
            ParseError::TooDeep { .. } | ParseError::TooLong { .. } => None,
        }
    }
}

/// Failure while evaluating a parsed expression
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("type mismatch: {message}")]
    TypeMismatch { message: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("function '{name}' is not allowed")]
    DisallowedFunction { name: String },

    #[error("'{name}' is not defined")]
    DisallowedOperand { name: String },

    #[error("invalid arguments for {function}(): {message}")]
    InvalidArguments { function: String, message: String },

    #[error("{operation} produced a non-finite number")]
    NonFinite { operation: String },
}

impl EvalError {
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        EvalError::TypeMismatch { message: message.into() }
    }

    pub fn invalid_arguments(function: &str, message: impl Into<String>) -> Self {
        EvalError::InvalidArguments { function: function.to_string(), message: message.into() }
    }

    pub fn non_finite(operation: impl Into<String>) -> Self {
        EvalError::NonFinite { operation: operation.into() }
    }
}

/// Either phase of running an expression from text
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("evaluation error: {0}")]
    Eval(#[from] EvalError),
}

/// Error type for everything around the expression engine
#[derive(Error, Debug, Clone)]
pub enum FormflowError {
    /// Template documents that cannot be loaded
    #[error("Template error: {message}")]
    Template { message: String, template: Option<String>, details: Option<String> },

    /// Configuration files and overrides
    #[error("Configuration error: {message}")]
    Configuration { message: String, setting: Option<String> },

    /// JSON / TOML encoding problems outside template loading
    #[error("Serialization error: {message}")]
    Serialization { message: String, data_type: Option<String> },

    /// File system access
    #[error("I/O error: {message}")]
    Io { message: String, path: Option<String> },
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl FormflowError {
    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            FormflowError::Template { .. } => "template",
            FormflowError::Configuration { .. } => "configuration",
            FormflowError::Serialization { .. } => "serialization",
            FormflowError::Io { .. } => "io",
        }
    }

    /// Get the error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            FormflowError::Template { .. } => ErrorSeverity::Medium,
            FormflowError::Configuration { .. } => ErrorSeverity::Critical,
            FormflowError::Serialization { .. } => ErrorSeverity::Low,
            FormflowError::Io { .. } => ErrorSeverity::High,
        }
    }

    /// Whether retrying with corrected input can succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            FormflowError::Template { .. } | FormflowError::Serialization { .. } => true,
            FormflowError::Configuration { .. } | FormflowError::Io { .. } => false,
        }
    }

    pub fn template(template: Option<&str>, message: impl Into<String>) -> Self {
        FormflowError::Template {
            message: message.into(),
            template: template.map(str::to_string),
            details: None,
        }
    }

    pub fn configuration(setting: &str, message: impl Into<String>) -> Self {
        FormflowError::Configuration { message: message.into(), setting: Some(setting.to_string()) }
    }

    pub fn io(path: &str, error: &std::io::Error) -> Self {
        FormflowError::Io { message: error.to_string(), path: Some(path.to_string()) }
    }
}

impl From<std::io::Error> for FormflowError {
    fn from(err: std::io::Error) -> Self {
        FormflowError::Io { message: err.to_string(), path: None }
    }
}

impl From<serde_json::Error> for FormflowError {
    fn from(err: serde_json::Error) -> Self {
        FormflowError::Serialization { message: err.to_string(), data_type: Some("json".into()) }
    }
}

impl From<toml::de::Error> for FormflowError {
    fn from(err: toml::de::Error) -> Self {
        FormflowError::Configuration { message: err.to_string(), setting: None }
    }
}

/// Result type alias for formflow operations
pub type FormflowResult<T> = Result<T, FormflowError>;
