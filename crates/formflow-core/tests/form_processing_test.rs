use chrono::NaiveDate;
use formflow_core::*;
use pretty_assertions::assert_eq;
use serde_json::json;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

fn bonus_template() -> FormTemplate {
    load_template(
        r#"{
            "key": "bonus",
            "title": "Bonus calculator",
            "sections": [{
                "name": "Income",
                "fields": [
                    {"name": "income", "label": "Income", "type": "Number", "required": true},
                    {
                        "name": "bonus_pct",
                        "label": "Bonus",
                        "type": "percentage",
                        "condition": "income > 0",
                        "formula": "income * 0.1"
                    }
                ]
            }]
        }"#,
    )
    .unwrap()
}

fn run(template: &FormTemplate, data: serde_json::Value) -> serde_json::Value {
    let outcome = FormProcessor::new().process_at(template, submission_from_json(data).unwrap(), today());
    serde_json::to_value(&outcome).unwrap()
}

#[test]
fn test_numeric_string_is_coerced_and_formula_computed() {
    let outcome = run(&bonus_template(), json!({"income": "50000"}));

    assert_eq!(
        outcome,
        json!({
            "data": {"income": 50000.0, "bonus_pct": 5000.0},
            "errors": []
        })
    );
}

#[test]
fn test_bad_number_fails_open_into_formula_error() {
    let outcome = run(&bonus_template(), json!({"income": "abc"}));

    assert_eq!(
        outcome,
        json!({
            "data": {"income": "abc"},
            "errors": [
                {"field": "income", "error": "must_be_number"},
                {"field": "bonus_pct", "error": "formula_error"}
            ]
        })
    );
}

#[test]
fn test_negative_income_hides_bonus() {
    let outcome = run(&bonus_template(), json!({"income": -5}));

    assert_eq!(outcome, json!({"data": {"income": -5.0}, "errors": []}));
}

#[test]
fn test_missing_required_income() {
    let outcome = run(&bonus_template(), json!({}));

    // the condition fails open and the formula cannot read the missing value
    assert_eq!(
        outcome["errors"],
        json!([
            {"field": "income", "error": "required"},
            {"field": "bonus_pct", "error": "formula_error"}
        ])
    );
}

#[test]
fn test_pattern_is_matched_against_the_whole_value() {
    let template = FormTemplate::new("codes", "Codes").with_section(
        Section::new("main").with_field(
            Field::new("code", FieldType::Text)
                .with_validation(ValidationRules::pattern(r"^[A-Z]{3}\d{3}$")),
        ),
    );
    let processor = FormProcessor::new();

    for (value, expected) in [("ABC123", vec![]), ("abc123", vec![ValidationErrorKind::PatternMismatch])] {
        let data = SubmissionData::from([("code".to_string(), FieldValue::from(value))]);
        let outcome = processor.process_at(&template, data, today());
        assert_eq!(outcome.errors_for("code").collect::<Vec<_>>(), expected, "value {value}");
    }

    let anchored_only_at_start = FormTemplate::new("codes", "Codes").with_section(
        Section::new("main")
            .with_field(Field::new("code", FieldType::Text).with_validation(ValidationRules::pattern("[0-9]+"))),
    );
    let data = SubmissionData::from([("code".to_string(), FieldValue::from("123abc"))]);
    let outcome = processor.process_at(&anchored_only_at_start, data, today());
    assert_eq!(outcome.errors_for("code").collect::<Vec<_>>(), vec![ValidationErrorKind::PatternMismatch]);
}

#[test]
fn test_age_condition_with_missing_dob_stays_visible() {
    let template = FormTemplate::new("consent", "Consent").with_section(
        Section::new("main")
            .with_field(Field::new("dob", FieldType::Date))
            .with_field(Field::new("consent", FieldType::Checkbox).required().with_condition("age(dob) >= 18")),
    );
    let processor = FormProcessor::new();

    let outcome = processor.process_at(&template, SubmissionData::new(), today());
    assert_eq!(outcome.errors, vec![ValidationError::new("consent", ValidationErrorKind::Required)]);

    let minor = SubmissionData::from([("dob".to_string(), FieldValue::from("2010-01-01"))]);
    let outcome = processor.process_at(&template, minor, today());
    assert!(outcome.is_valid());
}

#[test]
fn test_loan_form_end_to_end() {
    let template = load_template_value(json!({
        "key": "loan",
        "title": "Loan",
        "version": 3,
        "sections": [
            {"name": "Applicant", "fields": [
                {"name": "dob", "type": "date", "required": true},
                {"name": "start", "type": "month"}
            ]},
            {"name": "Loan", "fields": [
                {"name": "amount", "type": "currency", "required": true,
                 "validation": {"min": 10000, "max": 5000000}},
                {"name": "rate", "type": "percentage", "required": true},
                {"name": "years", "type": "integer", "required": true},
                {"name": "installment", "type": "calculated",
                 "formula": "round(emi(amount, rate, years), 2)",
                 "dependencies": ["amount", "rate", "years"]},
                {"name": "co_signer", "type": "text", "required": true,
                 "condition": "age(dob) < 21 or installment > 50000"}
            ]}
        ]
    }))
    .unwrap();

    let calculator = Calculator::new();
    assert!(TemplateValidator::for_calculator(&calculator).validate(&template).is_empty());

    let outcome = FormProcessor::new().process_at(
        &template,
        submission_from_json(json!({
            "dob": "1990-04-01",
            "start": "2024-07",
            "amount": 1000000,
            "rate": "9.0",
            "years": 20
        }))
        .unwrap(),
        today(),
    );

    assert!(outcome.is_valid(), "unexpected errors: {:?}", outcome.errors);
    assert_eq!(outcome.data["installment"], FieldValue::Float(8997.26));
    assert_eq!(outcome.data["years"], FieldValue::Float(20.0));
    assert!(!outcome.data.contains_key("co_signer"));
}

#[test]
fn test_outcome_round_trips_through_json() {
    let outcome = FormProcessor::new().process_at(
        &bonus_template(),
        submission_from_json(json!({"income": "abc"})).unwrap(),
        today(),
    );
    let encoded = serde_json::to_string(&outcome).unwrap();
    let decoded: ProcessOutcome = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, outcome);
}

#[test]
fn test_processor_shared_across_threads() {
    let processor = std::sync::Arc::new(FormProcessor::new());
    let template = std::sync::Arc::new(bonus_template());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let processor = processor.clone();
            let template = template.clone();
            std::thread::spawn(move || {
                let data = SubmissionData::from([("income".to_string(), FieldValue::Integer(i * 1000))]);
                processor.process_at(&template, data, today())
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let outcome = handle.join().unwrap();
        assert!(outcome.is_valid());
        if i > 0 {
            assert_eq!(outcome.data["bonus_pct"], FieldValue::Float(i as f64 * 100.0));
        } else {
            assert!(!outcome.data.contains_key("bonus_pct"));
        }
    }
    assert!(processor.calculator().cached_expressions() >= 2);
}
