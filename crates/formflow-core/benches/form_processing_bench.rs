use chrono::NaiveDate;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use formflow_core::{
    Calculator, EngineConfig, EvaluationContext, Field, FieldType, FieldValue, FormProcessor,
    FormTemplate, Section, SubmissionData, ValidationRules, parse_expression,
};
use std::collections::HashMap;
use std::time::Duration;

const EXPRESSIONS: &[&str] = &[
    "income > 0",
    "round(emi(amount, rate, years) * 1.05, 2)",
    "'senior' if age(dob) >= 60 else 'adult' if age(dob) >= 18 else 'minor'",
    "0 <= score < 10 and (status == 'active' or max(a, b, c) > 100)",
];

fn generate_template(field_count: usize) -> FormTemplate {
    let mut section = Section::new("generated");
    for i in 0..field_count {
        let field = match i % 4 {
            0 => Field::new(format!("amount_{i}"), FieldType::Currency)
                .required()
                .with_validation(ValidationRules::range(Some(0.0), Some(1_000_000.0))),
            1 => Field::new(format!("code_{i}"), FieldType::Text)
                .with_validation(ValidationRules::pattern(r"[A-Z]{3}\d{3}")),
            2 => Field::new(format!("flag_{i}"), FieldType::Checkbox)
                .with_condition(format!("amount_{} > 100", i - 2)),
            _ => Field::new(format!("total_{i}"), FieldType::Calculated)
                .with_condition(format!("flag_{}", i - 1))
                .with_formula(format!("round(amount_{} * 1.18, 2)", i - 3)),
        };
        section = section.with_field(field);
    }
    FormTemplate::new("bench", "Benchmark").with_section(section)
}

fn generate_submission(field_count: usize) -> SubmissionData {
    (0..field_count)
        .filter_map(|i| match i % 4 {
            0 => Some((format!("amount_{i}"), FieldValue::from(format!("{}", i * 37)))),
            1 => Some((format!("code_{i}"), FieldValue::from("ABC123"))),
            2 => Some((format!("flag_{i}"), FieldValue::Boolean(i % 3 == 0))),
            _ => None,
        })
        .collect()
}

fn bench_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("expression_parsing");

    for (i, source) in EXPRESSIONS.iter().enumerate() {
        group.bench_with_input(BenchmarkId::new("parse", i), source, |b, source| {
            b.iter(|| black_box(parse_expression(source).unwrap()))
        });
    }
    group.finish();
}

fn bench_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("expression_evaluation");
    let calculator = Calculator::new();

    let variables: HashMap<String, FieldValue> = [
        ("income", FieldValue::Float(52_000.0)),
        ("amount", FieldValue::Float(1_000_000.0)),
        ("rate", FieldValue::Float(9.0)),
        ("years", FieldValue::Integer(20)),
        ("dob", FieldValue::from("1970-01-01")),
        ("score", FieldValue::Integer(4)),
        ("status", FieldValue::from("active")),
        ("a", FieldValue::Integer(1)),
        ("b", FieldValue::Integer(200)),
        ("c", FieldValue::Float(3.5)),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
    let context = EvaluationContext::at(&variables, today);

    for (i, source) in EXPRESSIONS.iter().enumerate() {
        let compiled = calculator.compile(source).unwrap();
        group.bench_with_input(BenchmarkId::new("evaluate", i), &compiled, |b, compiled| {
            b.iter(|| black_box(calculator.evaluate(compiled, &context).unwrap()))
        });
    }
    group.finish();
}

fn bench_form_processing(c: &mut Criterion) {
    let mut group = c.benchmark_group("form_processing");
    group.measurement_time(Duration::from_secs(10));
    let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();

    for (label, cache) in [("cached", true), ("uncached", false)] {
        let processor = FormProcessor::with_config(EngineConfig {
            cache_expressions: cache,
            ..EngineConfig::default()
        });

        for size in [20, 200].iter() {
            let template = generate_template(*size);
            group.bench_with_input(BenchmarkId::new(label, size), size, |b, &size| {
                b.iter_batched(
                    || generate_submission(size),
                    |data| black_box(processor.process_at(&template, data, today)),
                    criterion::BatchSize::SmallInput,
                );
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_parsing, bench_evaluation, bench_form_processing);
criterion_main!(benches);
