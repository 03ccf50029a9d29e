//! Template loading and authoring checks
//!
//! [`TemplateValidator`] inspects a template before it is published: every condition
//! and formula must parse, call only registered functions and reference declared
//! fields. It also checks that formulas do not depend on each other in a loop.
//! The findings are advisory; submission processing never requires them.
//!
//! ## Formula graph
//!
//! ```text
//! subtotal = price * qty        total = subtotal * 1.1
//!     ^                             |
//!     +-------- reads --------------+
//! ```
//!
//! Formulas run once, in declaration order. A formula that reads a formula field
//! declared after it sees the submitted value, not the computed one, so it is
//! reported as a forward reference. Cycles are found with a depth-first search.

use crate::calculator::ast::{extract_calls, extract_variables};
use crate::calculator::functions::FunctionRegistry;
use crate::calculator::parser::{ParserLimits, parse_with_limits};
use crate::calculator::Calculator;
use crate::error::{FormflowError, FormflowResult};
use formflow_types::{Field, FormTemplate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, instrument, warn};

/// Load a template document, mapping decode failures to [`FormflowError::Template`]
pub fn load_template(json: &str) -> FormflowResult<FormTemplate> {
    FormTemplate::from_json(json).map_err(template_error)
}

/// Same as [`load_template`] for an already decoded JSON value
pub fn load_template_value(value: serde_json::Value) -> FormflowResult<FormTemplate> {
    FormTemplate::from_value(value).map_err(template_error)
}

fn template_error(error: serde_json::Error) -> FormflowError {
    FormflowError::Template {
        message: error.to_string(),
        template: None,
        details: Some(format!("line {}, column {}", error.line(), error.column())),
    }
}

/// Kind of authoring problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateIssueKind {
    /// Two fields share a name
    DuplicateField,
    /// Condition does not parse
    InvalidCondition,
    /// Formula does not parse
    InvalidFormula,
    /// Validation pattern is not a valid regex
    InvalidPattern,
    /// Expression calls a function the registry does not provide
    UnknownFunction,
    /// Expression reads a name no field declares
    UnknownReference,
    /// Formula reads a field missing from its declared dependencies
    UndeclaredDependency,
    /// Formulas depend on each other in a loop
    FormulaCycle,
    /// Formula reads a formula field that is computed later
    ForwardReference,
}

impl TemplateIssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateIssueKind::DuplicateField => "duplicate_field",
            TemplateIssueKind::InvalidCondition => "invalid_condition",
            TemplateIssueKind::InvalidFormula => "invalid_formula",
            TemplateIssueKind::InvalidPattern => "invalid_pattern",
            TemplateIssueKind::UnknownFunction => "unknown_function",
            TemplateIssueKind::UnknownReference => "unknown_reference",
            TemplateIssueKind::UndeclaredDependency => "undeclared_dependency",
            TemplateIssueKind::FormulaCycle => "formula_cycle",
            TemplateIssueKind::ForwardReference => "forward_reference",
        }
    }
}

impl fmt::Display for TemplateIssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finding about one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateIssue {
    pub field: String,
    pub kind: TemplateIssueKind,
    pub message: String,
}

impl TemplateIssue {
    fn new(field: &str, kind: TemplateIssueKind, message: impl Into<String>) -> Self {
        Self { field: field.to_string(), kind, message: message.into() }
    }
}

impl fmt::Display for TemplateIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.field, self.kind, self.message)
    }
}

/// Checks templates against a function registry and parse limits
#[derive(Debug, Clone, Copy)]
pub struct TemplateValidator<'a> {
    functions: &'a FunctionRegistry,
    limits: ParserLimits,
}

impl<'a> TemplateValidator<'a> {
    pub fn new(functions: &'a FunctionRegistry, limits: ParserLimits) -> Self {
        Self { functions, limits }
    }

    /// Validator matching what `calculator` will accept at runtime
    pub fn for_calculator(calculator: &'a Calculator) -> Self {
        Self::new(calculator.functions(), calculator.limits())
    }

    /// Collect every issue in the template, in field declaration order
    #[instrument(skip_all, fields(template = %template.key))]
    pub fn validate(&self, template: &FormTemplate) -> Vec<TemplateIssue> {
        let fields: Vec<&Field> = template.fields().collect();
        let mut issues = Vec::new();

        let mut position: HashMap<&str, usize> = HashMap::new();
        for (index, field) in fields.iter().enumerate() {
            if position.contains_key(field.name.as_str()) {
                issues.push(TemplateIssue::new(
                    &field.name,
                    TemplateIssueKind::DuplicateField,
                    "field name is declared more than once",
                ));
            } else {
                position.insert(&field.name, index);
            }
        }

        let formula_fields: HashSet<&str> = fields
            .iter()
            .filter(|f| has_text(f.formula.as_deref()))
            .map(|f| f.name.as_str())
            .collect();
        let mut formula_graph: HashMap<&str, Vec<String>> = HashMap::new();

        for (index, field) in fields.iter().enumerate() {
            if let Some(pattern) = field
                .validation
                .as_ref()
                .and_then(|rules| rules.pattern.as_deref())
                .filter(|p| !p.trim().is_empty())
            {
                if let Err(error) = Regex::new(&format!("^(?:{pattern})$")) {
                    issues.push(TemplateIssue::new(
                        &field.name,
                        TemplateIssueKind::InvalidPattern,
                        error.to_string(),
                    ));
                }
            }

            if let Some(condition) = field.condition.as_deref().filter(|c| !c.trim().is_empty()) {
                self.check_expression(
                    field,
                    condition,
                    TemplateIssueKind::InvalidCondition,
                    &position,
                    &mut issues,
                );
            }

            if let Some(formula) = field.formula.as_deref().filter(|f| !f.trim().is_empty()) {
                let Some(variables) = self.check_expression(
                    field,
                    formula,
                    TemplateIssueKind::InvalidFormula,
                    &position,
                    &mut issues,
                ) else {
                    continue;
                };

                if let Some(declared) = &field.dependencies {
                    for variable in variables.iter().filter(|v| !declared.contains(v)) {
                        issues.push(TemplateIssue::new(
                            &field.name,
                            TemplateIssueKind::UndeclaredDependency,
                            format!("formula reads '{variable}' which is not listed in dependencies"),
                        ));
                    }
                }

                for variable in &variables {
                    let later = position.get(variable.as_str()).is_some_and(|&p| p > index);
                    if later && formula_fields.contains(variable.as_str()) {
                        issues.push(TemplateIssue::new(
                            &field.name,
                            TemplateIssueKind::ForwardReference,
                            format!("formula reads '{variable}' before it is computed"),
                        ));
                    }
                }

                let edges = variables
                    .into_iter()
                    .filter(|v| formula_fields.contains(v.as_str()))
                    .collect();
                formula_graph.entry(field.name.as_str()).or_insert(edges);
            }
        }

        let order: Vec<&str> = fields
            .iter()
            .map(|f| f.name.as_str())
            .filter(|name| formula_graph.contains_key(name))
            .collect();
        for cycle in detect_formula_cycles(&order, &formula_graph) {
            let path = cycle.join(" -> ");
            issues.push(TemplateIssue::new(
                &cycle[0],
                TemplateIssueKind::FormulaCycle,
                format!("{path} -> {}", cycle[0]),
            ));
        }

        if issues.is_empty() {
            debug!(fields = fields.len(), "template is consistent");
        } else {
            warn!(issues = issues.len(), "template has authoring issues");
        }
        issues
    }

    /// Parse one expression and check its calls and references.
    /// Returns the referenced variables when it parses.
    fn check_expression(
        &self,
        field: &Field,
        source: &str,
        invalid: TemplateIssueKind,
        declared: &HashMap<&str, usize>,
        issues: &mut Vec<TemplateIssue>,
    ) -> Option<Vec<String>> {
        let ast = match parse_with_limits(source, self.limits) {
            Ok(ast) => ast,
            Err(error) => {
                issues.push(TemplateIssue::new(&field.name, invalid, error.to_string()));
                return None;
            }
        };

        for name in extract_calls(&ast) {
            if !self.functions.contains(&name) {
                issues.push(TemplateIssue::new(
                    &field.name,
                    TemplateIssueKind::UnknownFunction,
                    format!("'{name}' is not a registered function"),
                ));
            }
        }

        let variables = extract_variables(&ast);
        for name in &variables {
            if !declared.contains_key(name.as_str()) {
                issues.push(TemplateIssue::new(
                    &field.name,
                    TemplateIssueKind::UnknownReference,
                    format!("'{name}' is not a field of this template"),
                ));
            }
        }
        Some(variables)
    }
}

/// Cycles among formula fields, each reported once starting from its first node in `order`
fn detect_formula_cycles(order: &[&str], graph: &HashMap<&str, Vec<String>>) -> Vec<Vec<String>> {
    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut cycles = Vec::new();

    for &node in order {
        if !visited.contains(node) {
            detect_cycle_dfs(node, graph, &mut visited, &mut rec_stack, &mut Vec::new(), &mut cycles);
        }
    }
    cycles
}

fn detect_cycle_dfs(
    node: &str,
    graph: &HashMap<&str, Vec<String>>,
    visited: &mut HashSet<String>,
    rec_stack: &mut HashSet<String>,
    path: &mut Vec<String>,
    cycles: &mut Vec<Vec<String>>,
) {
    visited.insert(node.to_string());
    rec_stack.insert(node.to_string());
    path.push(node.to_string());

    if let Some(neighbors) = graph.get(node) {
        for neighbor in neighbors {
            if !visited.contains(neighbor) {
                detect_cycle_dfs(neighbor, graph, visited, rec_stack, path, cycles);
            } else if rec_stack.contains(neighbor) {
                if let Some(start) = path.iter().position(|n| n == neighbor) {
                    cycles.push(path[start..].to_vec());
                }
            }
        }
    }

    path.pop();
    rec_stack.remove(node);
}

fn has_text(text: Option<&str>) -> bool {
    text.is_some_and(|t| !t.trim().is_empty())
}
