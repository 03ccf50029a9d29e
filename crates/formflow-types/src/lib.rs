//! Formflow Types
//!
//! This crate defines the data structures shared by the formflow crates: the
//! `FieldValue` stored in a submission's evaluation environment, the form template
//! model administrators author (`FormTemplate` → `Section` → `Field`), and the
//! per-field `ValidationError` produced when a submission is processed.

#![deny(warnings)]
#![deny(missing_docs)]

mod template;
mod value;

pub use template::{
    Field, FieldType, FormTemplate, Section, UnknownFieldType, ValidationError,
    ValidationErrorKind, ValidationRules,
};
pub use value::{FieldValue, SubmissionData};
