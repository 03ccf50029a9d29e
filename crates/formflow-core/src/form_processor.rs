//! Submission processing: visibility, validation and formula computation
//!
//! A submission runs through two passes over the template's fields in declaration
//! order. The first decides visibility and validates (coercing numeric inputs in
//! place); the second evaluates formulas against the coerced values. Nothing here
//! fails: every problem becomes a per-field [`ValidationError`].
//!
//! A condition that cannot be parsed or evaluated leaves its field visible. Hiding a
//! field on error would silently drop required-field checks, so errors fail open.

use crate::cache::LruCache;
use crate::calculator::functions::FunctionRegistry;
use crate::calculator::{Calculator, EvaluationContext};
use crate::config::EngineConfig;
use crate::error::{FormflowError, FormflowResult};
use chrono::NaiveDate;
use formflow_calculator::dates::{is_date_shape, is_month_shape};
use formflow_types::{
    Field, FieldType, FieldValue, FormTemplate, SubmissionData, ValidationError,
    ValidationErrorKind,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// Final values and accumulated errors of one submission
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessOutcome {
    /// Submitted values, with numeric coercions and formula results applied
    pub data: SubmissionData,
    /// Per-field errors in the order they were found
    pub errors: Vec<ValidationError>,
}

impl ProcessOutcome {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Errors reported for `field`
    pub fn errors_for<'a>(&'a self, field: &'a str) -> impl Iterator<Item = ValidationErrorKind> + 'a {
        self.errors.iter().filter(move |e| e.field == field).map(|e| e.error)
    }
}

/// Processes submissions against templates.
///
/// Holds the calculator (function registry plus expression cache) and a bounded cache
/// of compiled validation patterns; it is `Send + Sync` and meant to be shared.
#[derive(Debug)]
pub struct FormProcessor {
    calculator: Calculator,
    patterns: LruCache<String, Option<Regex>>,
    config: EngineConfig,
}

impl Default for FormProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl FormProcessor {
    /// Processor with the standard function library and default configuration
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_registry(FunctionRegistry::standard(), config)
    }

    pub fn with_registry(functions: FunctionRegistry, config: EngineConfig) -> Self {
        let calculator =
            Calculator::with_registry(functions, config.parser_limits(), config.expression_cache());
        let patterns = LruCache::new(config.pattern_cache_capacity);
        Self { calculator, patterns, config }
    }

    pub fn calculator(&self) -> &Calculator {
        &self.calculator
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of compiled validation patterns currently held
    pub fn cached_patterns(&self) -> usize {
        self.patterns.len()
    }

    /// Process a submission, evaluating dates against today's local date
    pub fn process(&self, template: &FormTemplate, submitted: SubmissionData) -> ProcessOutcome {
        self.process_at(template, submitted, chrono::Local::now().date_naive())
    }

    /// Process a submission with a fixed evaluation date
    #[instrument(skip_all, fields(template = %template.key, version = template.version))]
    pub fn process_at(
        &self,
        template: &FormTemplate,
        submitted: SubmissionData,
        today: NaiveDate,
    ) -> ProcessOutcome {
        let mut data = submitted;
        let mut errors = Vec::new();

        for field in template.fields() {
            if !self.is_visible(field, &data, today) {
                continue;
            }
            self.validate_field(field, &mut data, &mut errors);
        }

        for field in template.fields() {
            let Some(formula) = non_blank(field.formula.as_deref()) else {
                continue;
            };
            if !self.is_visible(field, &data, today) {
                continue;
            }

            let context = EvaluationContext::at(&data, today);
            match self.calculator.eval(formula, &context) {
                Ok(value) => {
                    data.insert(field.name.clone(), value);
                }
                Err(error) => {
                    debug!(field = %field.name, %error, "formula failed");
                    errors.push(ValidationError::new(&field.name, ValidationErrorKind::FormulaError));
                }
            }
        }

        debug!(errors = errors.len(), "submission processed");
        ProcessOutcome { data, errors }
    }

    /// Evaluate a field's condition. Missing conditions and failing ones mean visible.
    pub fn is_visible(&self, field: &Field, data: &SubmissionData, today: NaiveDate) -> bool {
        let Some(condition) = non_blank(field.condition.as_deref()) else {
            return true;
        };

        let context = EvaluationContext::at(data, today);
        match self.calculator.eval(condition, &context) {
            Ok(value) => value.is_truthy(),
            Err(error) => {
                debug!(field = %field.name, %error, "condition failed, treating field as visible");
                true
            }
        }
    }

    fn validate_field(
        &self,
        field: &Field,
        data: &mut SubmissionData,
        errors: &mut Vec<ValidationError>,
    ) {
        let name = field.name.as_str();
        let mut report = |kind| errors.push(ValidationError::new(name, kind));

        let submitted = match data.get(name) {
            Some(value) => value.clone(),
            None => {
                if field.required {
                    report(ValidationErrorKind::Required);
                }
                return;
            }
        };

        if field.required && submitted.is_blank() {
            report(ValidationErrorKind::Required);
        }
        if submitted.is_null() {
            return;
        }

        if field.field_type.is_numeric() {
            match coerce_number(&submitted) {
                Some(number) => {
                    data.insert(name.to_string(), FieldValue::Float(number));
                }
                None => report(ValidationErrorKind::MustBeNumber),
            }
        }

        if field.field_type.is_list() && submitted.as_array().is_none() {
            report(ValidationErrorKind::MustBeList);
        }

        let rules = field.validation.as_ref();

        if let (Some(pattern), Some(text)) =
            (rules.and_then(|r| non_blank(r.pattern.as_deref())), submitted.as_str())
        {
            if !self.full_match(name, pattern, text) {
                report(ValidationErrorKind::PatternMismatch);
            }
        }

        if let Some(text) = submitted.as_str() {
            match field.field_type {
                FieldType::Date if !is_date_shape(text) => {
                    report(ValidationErrorKind::InvalidDateFormat)
                }
                FieldType::Month if !is_month_shape(text) => {
                    report(ValidationErrorKind::InvalidMonthFormat)
                }
                _ => {}
            }
        }

        // Ranges apply to values submitted as numbers; numeric strings are only coerced
        if let (Some(rules), Some(number)) = (rules, submitted_number(&submitted)) {
            if rules.min.is_some_and(|min| number < min) {
                report(ValidationErrorKind::Min);
            }
            if rules.max.is_some_and(|max| number > max) {
                report(ValidationErrorKind::Max);
            }
        }
    }

    /// Whole-string regex match. Invalid patterns never match.
    fn full_match(&self, field: &str, pattern: &str, text: &str) -> bool {
        let compiled = match self.patterns.get(pattern) {
            Some(compiled) => compiled,
            None => {
                let compiled = match Regex::new(&format!("^(?:{pattern})$")) {
                    Ok(regex) => Some(regex),
                    Err(error) => {
                        warn!(field, pattern, %error, "invalid validation pattern");
                        None
                    }
                };
                self.patterns.insert(pattern.to_string(), compiled.clone());
                compiled
            }
        };

        compiled.is_some_and(|regex| regex.is_match(text))
    }
}

/// Numeric coercion for number-like fields: numbers as is, booleans as 0/1 and
/// strings holding a finite decimal number. Surrounding whitespace is ignored and
/// single underscores may group digits (`1_000`).
pub fn coerce_number(value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Integer(_) | FieldValue::Float(_) | FieldValue::Boolean(_) => {
            submitted_number(value)
        }
        FieldValue::String(s) => parse_decimal(s.trim()),
        _ => None,
    }
}

/// Value of a submission that is already a number (booleans count as 0/1)
fn submitted_number(value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Integer(i) => Some(*i as f64),
        FieldValue::Float(f) => Some(*f),
        FieldValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn parse_decimal(text: &str) -> Option<f64> {
    let number = if text.contains('_') {
        let bytes = text.as_bytes();
        let grouped = bytes.iter().enumerate().all(|(i, b)| {
            *b != b'_'
                || (i > 0
                    && bytes[i - 1].is_ascii_digit()
                    && bytes.get(i + 1).is_some_and(u8::is_ascii_digit))
        });
        if !grouped {
            return None;
        }
        text.replace('_', "").parse::<f64>().ok()?
    } else {
        text.parse::<f64>().ok()?
    };
    number.is_finite().then_some(number)
}

/// Convert a decoded JSON document into submission data; it must be an object
pub fn submission_from_json(value: serde_json::Value) -> FormflowResult<SubmissionData> {
    match value {
        serde_json::Value::Object(map) => {
            Ok(map.into_iter().map(|(k, v)| (k, FieldValue::from(v))).collect())
        }
        other => Err(FormflowError::Serialization {
            message: format!("submission must be a JSON object, got {other}"),
            data_type: Some("submission".to_string()),
        }),
    }
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.trim().is_empty())
}
