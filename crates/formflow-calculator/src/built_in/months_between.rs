//! Months Between Calculator
//!
//! Whole calendar months from `start` to `end`, ignoring the day of month:
//! (y2 - y1) * 12 + (m2 - m1). Both inputs are `YYYY-MM` or `YYYY-MM-DD` strings;
//! anything else (including non-strings) counts as 0.

use crate::dates::normalize_date;
use crate::{Calculator, CalculatorInputs};
use anyhow::Result;
use chrono::Datelike;
use formflow_types::FieldValue;

/// Signed month difference, 0 when either date is unreadable
pub fn months_between(start: &str, end: &str) -> i64 {
    match (normalize_date(start), normalize_date(end)) {
        (Some(from), Some(to)) => {
            (to.year() as i64 - from.year() as i64) * 12 + (to.month() as i64 - from.month() as i64)
        }
        _ => 0,
    }
}

#[derive(Debug, Default)]
pub struct MonthsBetweenCalculator;

impl Calculator for MonthsBetweenCalculator {
    fn name(&self) -> &'static str {
        "months_between"
    }

    fn arity(&self) -> usize {
        2
    }

    fn description(&self) -> &'static str {
        "Calendar months between two YYYY-MM[-DD] dates"
    }

    fn calculate(&self, inputs: &CalculatorInputs) -> Result<FieldValue> {
        let months = match (inputs.get_str(0)?, inputs.get_str(1)?) {
            (Some(start), Some(end)) => months_between(start, end),
            _ => 0,
        };
        Ok(FieldValue::Integer(months))
    }
}
