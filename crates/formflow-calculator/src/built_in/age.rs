//! Age Calculator
//!
//! Completed years between a date of birth and the evaluation date. The count drops
//! by one while this year's birthday is still ahead, and never goes below 0. An
//! unreadable date of birth counts as 0.

use crate::dates::normalize_date;
use crate::{Calculator, CalculatorInputs};
use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use formflow_types::FieldValue;

/// Age in whole years on `today`
pub fn age(date_of_birth: &str, today: NaiveDate) -> i64 {
    let Some(born) = normalize_date(date_of_birth) else {
        return 0;
    };
    let mut years = today.year() as i64 - born.year() as i64;
    if (today.month(), today.day()) < (born.month(), born.day()) {
        years -= 1;
    }
    years.max(0)
}

#[derive(Debug, Default)]
pub struct AgeCalculator;

impl Calculator for AgeCalculator {
    fn name(&self) -> &'static str {
        "age"
    }

    fn arity(&self) -> usize {
        1
    }

    fn description(&self) -> &'static str {
        "Whole years from a YYYY-MM[-DD] birth date to today"
    }

    fn calculate(&self, inputs: &CalculatorInputs) -> Result<FieldValue> {
        let years = match inputs.get_str(0)? {
            Some(dob) => age(dob, inputs.today()),
            None => 0,
        };
        Ok(FieldValue::Integer(years))
    }
}
