use crate::value::FieldValue;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// An administrator-authored form definition.
///
/// Templates are immutable per `version`; the engine only ever reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormTemplate {
    /// Identifier assigned by the template store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Stable lookup key
    pub key: String,
    /// Human readable title
    pub title: String,
    /// Optional long description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Ordered sections
    pub sections: Vec<Section>,
    /// Whether the template was created by an administrator rather than shipped
    #[serde(default)]
    pub is_custom: bool,
    /// Monotonic template version
    #[serde(default = "default_version")]
    pub version: u32,
    /// Id of the creating administrator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<i64>,
    /// Creation timestamp (ISO-8601)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Last update timestamp (ISO-8601)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

fn default_version() -> u32 {
    1
}

impl FormTemplate {
    /// Create an empty template with the given key and title
    pub fn new(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: None,
            key: key.into(),
            title: title.into(),
            description: None,
            sections: Vec::new(),
            is_custom: false,
            version: default_version(),
            created_by: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Append a section (builder style)
    pub fn with_section(mut self, section: Section) -> Self {
        self.sections.push(section);
        self
    }

    /// Parse a template from its JSON document form.
    ///
    /// Unknown field `type` strings are rejected here rather than at evaluation time.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Parse a template from an already decoded JSON value
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// All fields flattened across sections, in declaration order
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.sections.iter().flat_map(|section| section.fields.iter())
    }

    /// Look up a field by its binding name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields().find(|field| field.name == name)
    }
}

/// Organizational grouping of fields. Sections carry no evaluation semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Section identifier
    #[serde(default)]
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Ordered fields
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Section {
    /// Create an empty section
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self { id: name.clone(), name, description: None, fields: Vec::new() }
    }

    /// Append a field (builder style)
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }
}

/// One input or derived slot of a form, bound to a variable `name` during evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Field identifier
    #[serde(default)]
    pub id: String,
    /// Binding name, unique within the template
    pub name: String,
    /// Display label
    #[serde(default)]
    pub label: String,
    /// Declared input type
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Whether a visible field must be supplied
    #[serde(default)]
    pub required: bool,
    /// Input placeholder text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Help text shown next to the input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    /// Value pre-filled by clients
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<FieldValue>,
    /// Choices for select-like types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<FieldValue>>,
    /// Range and pattern rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationRules>,
    /// Visibility expression; absent means always visible
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Derived-value expression; absent means the value comes from the submission
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    /// Field names the author declares this field depends on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,
}

impl Field {
    /// Create a field with the given name and type; everything else defaults
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            label: name.clone(),
            name,
            field_type,
            required: false,
            placeholder: None,
            help_text: None,
            default_value: None,
            options: None,
            validation: None,
            condition: None,
            formula: None,
            dependencies: None,
        }
    }

    /// Mark the field as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Attach a visibility condition
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Attach a formula
    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = Some(formula.into());
        self
    }

    /// Attach validation rules
    pub fn with_validation(mut self, validation: ValidationRules) -> Self {
        self.validation = Some(validation);
        self
    }

    /// Declare dependencies
    pub fn with_dependencies(mut self, dependencies: &[&str]) -> Self {
        self.dependencies = Some(dependencies.iter().map(|d| d.to_string()).collect());
        self
    }
}

/// Declared field type. The set is closed; unknown names fail template loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Single line text
    Text,
    /// Multi-line text
    Textarea,
    /// Email address
    Email,
    /// Phone number
    Phone,
    /// URL
    Url,
    /// Masked text
    Password,
    /// Arbitrary number
    Number,
    /// Whole number
    Integer,
    /// Monetary amount
    Currency,
    /// Percentage
    Percentage,
    /// Calendar date (`YYYY-MM-DD`)
    Date,
    /// Calendar month (`YYYY-MM`)
    Month,
    /// Time of day
    Time,
    /// Date and time
    Datetime,
    /// Single choice dropdown
    Select,
    /// Single choice radio group
    Radio,
    /// Multiple choice dropdown
    Multiselect,
    /// Multiple choice checkbox group
    Checkboxes,
    /// Single checkbox
    Checkbox,
    /// On/off switch
    Toggle,
    /// File reference
    File,
    /// Hidden value
    Hidden,
    /// Read-only computed value
    Calculated,
}

impl FieldType {
    /// Every supported type, in declaration order
    pub const ALL: [FieldType; 23] = [
        FieldType::Text,
        FieldType::Textarea,
        FieldType::Email,
        FieldType::Phone,
        FieldType::Url,
        FieldType::Password,
        FieldType::Number,
        FieldType::Integer,
        FieldType::Currency,
        FieldType::Percentage,
        FieldType::Date,
        FieldType::Month,
        FieldType::Time,
        FieldType::Datetime,
        FieldType::Select,
        FieldType::Radio,
        FieldType::Multiselect,
        FieldType::Checkboxes,
        FieldType::Checkbox,
        FieldType::Toggle,
        FieldType::File,
        FieldType::Hidden,
        FieldType::Calculated,
    ];

    /// Wire name of the type
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Textarea => "textarea",
            FieldType::Email => "email",
            FieldType::Phone => "phone",
            FieldType::Url => "url",
            FieldType::Password => "password",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Currency => "currency",
            FieldType::Percentage => "percentage",
            FieldType::Date => "date",
            FieldType::Month => "month",
            FieldType::Time => "time",
            FieldType::Datetime => "datetime",
            FieldType::Select => "select",
            FieldType::Radio => "radio",
            FieldType::Multiselect => "multiselect",
            FieldType::Checkboxes => "checkboxes",
            FieldType::Checkbox => "checkbox",
            FieldType::Toggle => "toggle",
            FieldType::File => "file",
            FieldType::Hidden => "hidden",
            FieldType::Calculated => "calculated",
        }
    }

    /// Types whose submitted values are coerced to numbers
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldType::Number | FieldType::Integer | FieldType::Currency | FieldType::Percentage
        )
    }

    /// Types whose submitted values must be lists
    pub fn is_list(&self) -> bool {
        matches!(self, FieldType::Multiselect | FieldType::Checkboxes)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a template names a field type outside the supported set
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown field type '{0}'")]
pub struct UnknownFieldType(pub String);

impl FromStr for FieldType {
    type Err = UnknownFieldType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        FieldType::ALL
            .iter()
            .copied()
            .find(|field_type| field_type.as_str() == lowered)
            .ok_or_else(|| UnknownFieldType(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Structured validation rules attached to a field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRules {
    /// Inclusive lower bound for numeric values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Inclusive upper bound for numeric values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Regular expression a string value must match in full
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Rules the engine does not interpret, kept for clients
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl ValidationRules {
    /// Numeric range rule
    pub fn range(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max, ..Self::default() }
    }

    /// Pattern rule
    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self { pattern: Some(pattern.into()), ..Self::default() }
    }
}

/// Kind of a per-field validation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    /// Visible required field absent or blank
    Required,
    /// Numeric field could not be coerced to a number
    MustBeNumber,
    /// List field was not a list
    MustBeList,
    /// String value did not fully match the field pattern
    PatternMismatch,
    /// Value below `validation.min`
    Min,
    /// Value above `validation.max`
    Max,
    /// Date field not shaped `YYYY-MM-DD`
    InvalidDateFormat,
    /// Month field not shaped `YYYY-MM`
    InvalidMonthFormat,
    /// Formula failed to parse or evaluate
    FormulaError,
}

impl ValidationErrorKind {
    /// Wire name of the error
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationErrorKind::Required => "required",
            ValidationErrorKind::MustBeNumber => "must_be_number",
            ValidationErrorKind::MustBeList => "must_be_list",
            ValidationErrorKind::PatternMismatch => "pattern_mismatch",
            ValidationErrorKind::Min => "min",
            ValidationErrorKind::Max => "max",
            ValidationErrorKind::InvalidDateFormat => "invalid_date_format",
            ValidationErrorKind::InvalidMonthFormat => "invalid_month_format",
            ValidationErrorKind::FormulaError => "formula_error",
        }
    }
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A per-field error reported by submission processing. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidationError {
    /// Offending field name
    pub field: String,
    /// What went wrong
    pub error: ValidationErrorKind,
}

impl ValidationError {
    /// Create a validation error for `field`
    pub fn new(field: impl Into<String>, error: ValidationErrorKind) -> Self {
        Self { field: field.into(), error }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.error)
    }
}
