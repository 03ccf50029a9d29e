//! Equated Monthly Instalment Calculator
//!
//! Computes the fixed monthly payment that amortizes `principal` over
//! `tenure_years` at `annual_rate_percent`.
//!
//! emi = P * r * (1 + r)^n / ((1 + r)^n - 1)
//!
//! with r = rate / 12 / 100 and n = round(tenure * 12). Returns 0 when n <= 0 and
//! P / n when the rate is 0.

use crate::{Calculator, CalculatorInputs, monthly_terms};
use anyhow::Result;
use formflow_types::FieldValue;

/// Monthly instalment for a loan
pub fn emi(principal: f64, annual_rate_percent: f64, tenure_years: f64) -> f64 {
    let (r, n) = monthly_terms(annual_rate_percent, tenure_years);
    if n <= 0 {
        return 0.0;
    }
    if r == 0.0 {
        return principal / n as f64;
    }
    let growth = (1.0 + r).powf(n as f64);
    principal * r * growth / (growth - 1.0)
}

#[derive(Debug, Default)]
pub struct EmiCalculator;

impl Calculator for EmiCalculator {
    fn name(&self) -> &'static str {
        "emi"
    }

    fn arity(&self) -> usize {
        3
    }

    fn description(&self) -> &'static str {
        "Monthly instalment for (principal, annual rate %, tenure years)"
    }

    fn calculate(&self, inputs: &CalculatorInputs) -> Result<FieldValue> {
        let principal = inputs.get_f64(0)?;
        let rate = inputs.get_f64(1)?;
        let tenure = inputs.get_f64(2)?;
        Ok(FieldValue::Float(emi(principal, rate, tenure)))
    }
}
