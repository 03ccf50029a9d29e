//! Loan From EMI Calculator
//!
//! Inverse of the EMI calculator: the principal that a monthly instalment of `emi`
//! repays over `tenure_years` at `annual_rate_percent`.
//!
//! principal = emi * ((1 + r)^n - 1) / (r * (1 + r)^n)
//!
//! Returns 0 when n <= 0 and emi * n when the rate is 0.

use crate::{Calculator, CalculatorInputs, monthly_terms};
use anyhow::Result;
use formflow_types::FieldValue;

/// Principal affordable with a given monthly instalment
pub fn loan_from_emi(emi: f64, annual_rate_percent: f64, tenure_years: f64) -> f64 {
    let (r, n) = monthly_terms(annual_rate_percent, tenure_years);
    if n <= 0 {
        return 0.0;
    }
    if r == 0.0 {
        return emi * n as f64;
    }
    let growth = (1.0 + r).powf(n as f64);
    emi * (growth - 1.0) / (r * growth)
}

#[derive(Debug, Default)]
pub struct LoanFromEmiCalculator;

impl Calculator for LoanFromEmiCalculator {
    fn name(&self) -> &'static str {
        "loan_from_emi"
    }

    fn arity(&self) -> usize {
        3
    }

    fn description(&self) -> &'static str {
        "Principal repaid by (monthly instalment, annual rate %, tenure years)"
    }

    fn calculate(&self, inputs: &CalculatorInputs) -> Result<FieldValue> {
        let emi = inputs.get_f64(0)?;
        let rate = inputs.get_f64(1)?;
        let tenure = inputs.get_f64(2)?;
        Ok(FieldValue::Float(loan_from_emi(emi, rate, tenure)))
    }
}
