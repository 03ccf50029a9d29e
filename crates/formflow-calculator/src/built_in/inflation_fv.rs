//! Inflation Future Value Calculator
//!
//! amount * (1 + pct / 100)^years, with fractional years allowed.

use crate::{Calculator, CalculatorInputs};
use anyhow::Result;
use formflow_types::FieldValue;

/// Future cost of `amount` after `years` of inflation
pub fn inflation_fv(amount: f64, annual_inflation_percent: f64, years: f64) -> f64 {
    amount * (1.0 + annual_inflation_percent / 100.0).powf(years)
}

#[derive(Debug, Default)]
pub struct InflationFvCalculator;

impl Calculator for InflationFvCalculator {
    fn name(&self) -> &'static str {
        "inflation_fv"
    }

    fn arity(&self) -> usize {
        3
    }

    fn description(&self) -> &'static str {
        "Inflated value of (amount, annual inflation %, years)"
    }

    fn calculate(&self, inputs: &CalculatorInputs) -> Result<FieldValue> {
        let amount = inputs.get_f64(0)?;
        let pct = inputs.get_f64(1)?;
        let years = inputs.get_f64(2)?;
        Ok(FieldValue::Float(inflation_fv(amount, pct, years)))
    }
}
