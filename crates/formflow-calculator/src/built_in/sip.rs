//! Systematic Investment Plan Calculator
//!
//! Monthly contribution needed to reach `future_value` after `years` at an
//! `annual_return_percent` compounded monthly.
//!
//! sip = FV * r / ((1 + r)^n - 1)

use crate::{Calculator, CalculatorInputs, monthly_terms};
use anyhow::Result;
use formflow_types::FieldValue;

/// Monthly contribution for a savings target
pub fn sip(future_value: f64, annual_return_percent: f64, years: f64) -> f64 {
    let (r, n) = monthly_terms(annual_return_percent, years);
    if n <= 0 {
        return 0.0;
    }
    if r == 0.0 {
        return future_value / n as f64;
    }
    let growth = (1.0 + r).powf(n as f64);
    future_value * r / (growth - 1.0)
}

#[derive(Debug, Default)]
pub struct SipCalculator;

impl Calculator for SipCalculator {
    fn name(&self) -> &'static str {
        "sip"
    }

    fn arity(&self) -> usize {
        3
    }

    fn description(&self) -> &'static str {
        "Monthly contribution for (target value, annual return %, years)"
    }

    fn calculate(&self, inputs: &CalculatorInputs) -> Result<FieldValue> {
        let future_value = inputs.get_f64(0)?;
        let rate = inputs.get_f64(1)?;
        let years = inputs.get_f64(2)?;
        Ok(FieldValue::Float(sip(future_value, rate, years)))
    }
}
