#![deny(warnings)]
//! The calculator kernels behind formflow's financial and date functions.
//!
//! Each built-in calculator is a stateless unit struct implementing [`Calculator`],
//! wrapping a plain numeric kernel that can also be called directly. Expressions reach
//! them through the function registry in `formflow-core`, which hands over the already
//! evaluated positional arguments as [`CalculatorInputs`].

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use formflow_types::FieldValue;

pub mod built_in;
pub mod dates;

/// A trait for all calculators.
/// Calculators are stateless and thread-safe.
pub trait Calculator: Send + Sync {
    /// Name the calculator is registered under
    fn name(&self) -> &'static str;

    /// Exact number of positional arguments
    fn arity(&self) -> usize;

    /// One-line description for listings
    fn description(&self) -> &'static str;

    /// Calculates a result from the provided inputs.
    fn calculate(&self, inputs: &CalculatorInputs) -> Result<FieldValue>;
}

/// Provides a safe interface for calculators to access positional arguments.
#[derive(Debug)]
pub struct CalculatorInputs<'a> {
    args: &'a [FieldValue],
    today: NaiveDate,
}

impl<'a> CalculatorInputs<'a> {
    /// Creates a new `CalculatorInputs`; `today` is the evaluation date.
    pub fn new(args: &'a [FieldValue], today: NaiveDate) -> Self {
        Self { args, today }
    }

    /// The evaluation date
    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Number of arguments supplied
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// True when no arguments were supplied
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Gets a raw argument.
    pub fn get(&self, index: usize) -> Result<&'a FieldValue> {
        self.args
            .get(index)
            .ok_or_else(|| anyhow!("Required argument {} was not supplied.", index + 1))
    }

    /// Gets a numeric argument. Only integers and floats qualify.
    pub fn get_f64(&self, index: usize) -> Result<f64> {
        match self.get(index)? {
            FieldValue::Float(f) => Ok(*f),
            FieldValue::Integer(i) => Ok(*i as f64),
            other => Err(anyhow!(
                "Argument {} was found, but it is not a number (got {}).",
                index + 1,
                other.type_name()
            )),
        }
    }

    /// Gets a string argument, `None` when the argument is not a string.
    pub fn get_str(&self, index: usize) -> Result<Option<&'a str>> {
        Ok(self.get(index)?.as_str())
    }
}

/// Every built-in calculator, ready for registration.
pub fn standard_calculators() -> Vec<Box<dyn Calculator>> {
    vec![
        Box::new(built_in::emi::EmiCalculator),
        Box::new(built_in::loan_from_emi::LoanFromEmiCalculator),
        Box::new(built_in::sip::SipCalculator),
        Box::new(built_in::inflation_fv::InflationFvCalculator),
        Box::new(built_in::months_between::MonthsBetweenCalculator),
        Box::new(built_in::age::AgeCalculator),
    ]
}

/// Converts an annual percentage and a tenure in years into the monthly rate and the
/// whole number of monthly periods (years * 12, rounded half to even).
pub(crate) fn monthly_terms(annual_rate_percent: f64, years: f64) -> (f64, i64) {
    let monthly_rate = annual_rate_percent / 12.0 / 100.0;
    let periods = (years * 12.0).round_ties_even() as i64;
    (monthly_rate, periods)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[test]
    fn test_inputs_accessors() {
        let args = [FieldValue::Integer(3), FieldValue::from("2020-01"), FieldValue::Null];
        let inputs = CalculatorInputs::new(&args, today());

        assert_eq!(inputs.len(), 3);
        assert_eq!(inputs.get_f64(0).unwrap(), 3.0);
        assert_eq!(inputs.get_str(1).unwrap(), Some("2020-01"));
        assert_eq!(inputs.get_str(2).unwrap(), None);
        assert!(inputs.get_f64(2).is_err());
        assert!(inputs.get(3).is_err());
    }

    #[test]
    fn test_monthly_terms_round_half_even() {
        // 1.5 months rounds up, 4.5 months rounds down
        assert_eq!(monthly_terms(12.0, 0.125), (0.01, 2));
        assert_eq!(monthly_terms(12.0, 0.375).1, 4);
        assert_eq!(monthly_terms(0.0, 20.0), (0.0, 240));
    }

    #[test]
    fn test_standard_calculators_are_unique() {
        let mut names: Vec<&str> = standard_calculators().iter().map(|c| c.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 6);
    }
}
