use chrono::NaiveDate;
use formflow_calculator::built_in::age::{AgeCalculator, age};
use formflow_calculator::built_in::emi::{EmiCalculator, emi};
use formflow_calculator::built_in::inflation_fv::inflation_fv;
use formflow_calculator::built_in::loan_from_emi::loan_from_emi;
use formflow_calculator::built_in::months_between::{MonthsBetweenCalculator, months_between};
use formflow_calculator::built_in::sip::sip;
use formflow_calculator::{Calculator, CalculatorInputs};
use formflow_types::FieldValue;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

fn calculate_with<C: Calculator>(calculator: C, args: &[FieldValue]) -> FieldValue {
    calculator.calculate(&CalculatorInputs::new(args, today())).unwrap()
}

fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected} ± {tolerance}, got {actual}"
    );
}

#[test]
fn emi_matches_reference_value() {
    assert_close(emi(1_000_000.0, 9.0, 20.0), 8997.26, 0.01);
}

#[test]
fn emi_edge_cases() {
    assert_eq!(emi(120_000.0, 0.0, 10.0), 1000.0);
    assert_eq!(emi(120_000.0, 9.0, 0.0), 0.0);
    assert_eq!(emi(120_000.0, 9.0, -3.0), 0.0);
    // 0.02 years rounds to 0 periods
    assert_eq!(emi(120_000.0, 9.0, 0.02), 0.0);
}

#[test]
fn emi_calculator_accepts_integers() {
    let result = calculate_with(
        EmiCalculator,
        &[FieldValue::Integer(1_000_000), FieldValue::Integer(9), FieldValue::Integer(20)],
    );
    match result {
        FieldValue::Float(value) => assert_close(value, 8997.26, 0.01),
        other => panic!("expected a float, got {other:?}"),
    }
}

#[test]
fn emi_calculator_rejects_strings() {
    let args = [FieldValue::from("1000000"), FieldValue::Integer(9), FieldValue::Integer(20)];
    let err = EmiCalculator.calculate(&CalculatorInputs::new(&args, today())).unwrap_err();
    assert!(err.to_string().contains("not a number"));
}

#[test]
fn loan_from_emi_edge_cases() {
    assert_eq!(loan_from_emi(1000.0, 0.0, 10.0), 120_000.0);
    assert_eq!(loan_from_emi(1000.0, 8.0, 0.0), 0.0);
}

#[test]
fn sip_values() {
    assert_eq!(sip(12_000.0, 0.0, 1.0), 1000.0);
    assert_eq!(sip(12_000.0, 12.0, 0.0), 0.0);
    // FV of 1000/month for 12 months at 1%/month is 12682.50
    assert_close(sip(12_682.503, 12.0, 1.0), 1000.0, 0.001);
}

#[test]
fn inflation_fv_values() {
    assert_close(inflation_fv(100.0, 10.0, 2.0), 121.0, 1e-9);
    assert_eq!(inflation_fv(100.0, 6.0, 0.0), 100.0);
    assert_close(inflation_fv(100.0, 21.0, 0.5), 110.0, 1e-9);
}

#[test]
fn months_between_values() {
    assert_eq!(months_between("2020-01", "2021-03"), 14);
    assert_eq!(months_between("2021-03-31", "2020-01-01"), -14);
    assert_eq!(months_between("2021-03-31", "2021-03-01"), 0);
    assert_eq!(months_between("2021-02-30", "2021-03-01"), 0);
    assert_eq!(months_between("yesterday", "2021-03"), 0);
}

#[test]
fn months_between_calculator_treats_non_strings_as_zero() {
    let result =
        calculate_with(MonthsBetweenCalculator, &[FieldValue::Integer(2020), FieldValue::from("2021-01")]);
    assert_eq!(result, FieldValue::Integer(0));
}

#[test]
fn age_counts_completed_years() {
    assert_eq!(age("2000-06-15", today()), 24);
    assert_eq!(age("2000-06-16", today()), 23);
    assert_eq!(age("2000-07", today()), 23);
    assert_eq!(age("2030-01-01", today()), 0);
    assert_eq!(age("not a date", today()), 0);
}

#[test]
fn age_calculator_uses_input_date() {
    let result = calculate_with(AgeCalculator, &[FieldValue::from("2006-06-15")]);
    assert_eq!(result, FieldValue::Integer(18));

    let result = calculate_with(AgeCalculator, &[FieldValue::Null]);
    assert_eq!(result, FieldValue::Integer(0));
}

proptest! {
    #[test]
    fn loan_from_emi_inverts_emi(
        principal in 1_000.0f64..10_000_000.0,
        rate in 0.0f64..30.0,
        tenure in 1u32..40,
    ) {
        let tenure = tenure as f64;
        let payment = emi(principal, rate, tenure);
        let recovered = loan_from_emi(payment, rate, tenure);
        prop_assert!((recovered - principal).abs() <= principal * 1e-9);
    }
}
