use formflow_core::*;
use proptest::prelude::*;
use std::collections::HashMap;

fn eval(expression: &str) -> Result<FieldValue, ExpressionError> {
    Calculator::new().eval(expression, &EvaluationContext::empty())
}

fn eval_with(expression: &str, variables: &[(&str, FieldValue)]) -> Result<FieldValue, ExpressionError> {
    let variables: HashMap<String, FieldValue> =
        variables.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
    Calculator::new().eval(expression, &EvaluationContext::new(&variables))
}

#[test]
fn test_constant_arithmetic() {
    assert_eq!(eval("2 + 3 * 4").unwrap(), FieldValue::Integer(14));
    assert_eq!(eval("2 ** 10").unwrap(), FieldValue::Integer(1024));
    assert_eq!(eval("(2 + 3) * 4").unwrap(), FieldValue::Integer(20));
    assert_eq!(eval("7 / 2").unwrap(), FieldValue::Float(3.5));
    assert_eq!(eval("-7 % 3").unwrap(), FieldValue::Integer(2));
    assert_eq!(eval("'a' + 'b'").unwrap(), FieldValue::from("ab"));
}

#[test]
fn test_division_by_zero_never_reaches_a_field() {
    assert!(matches!(eval("1 / 0"), Err(ExpressionError::Eval(EvalError::DivisionByZero))));
    assert!(matches!(eval("1.5 % 0"), Err(ExpressionError::Eval(EvalError::DivisionByZero))));
    assert!(matches!(eval("10.0 ** 400"), Err(ExpressionError::Eval(EvalError::NonFinite { .. }))));
}

#[test]
fn test_unregistered_calls_are_disallowed() {
    for source in ["__import__('os')", "eval(\"1\")", "open(\"f\")", "exec('x')"] {
        match eval(source) {
            Err(ExpressionError::Eval(EvalError::DisallowedFunction { .. })) => {}
            other => panic!("{source}: expected DisallowedFunction, got {other:?}"),
        }
    }
}

#[test]
fn test_escape_syntax_does_not_parse() {
    for source in [
        "income.__class__",
        "items[0]",
        "x = 1",
        "{'a': 1}",
        "lambda: 1",
        "not x",
        "1; 2",
        "(1).real",
    ] {
        assert!(
            matches!(eval(source), Err(ExpressionError::Parse(_))),
            "{source} should be rejected by the parser"
        );
    }
}

#[test]
fn test_undefined_names_are_disallowed_operands() {
    match eval_with("income > 0", &[]) {
        Err(ExpressionError::Eval(EvalError::DisallowedOperand { name })) => assert_eq!(name, "income"),
        other => panic!("expected DisallowedOperand, got {other:?}"),
    }
}

#[test]
fn test_type_mismatches() {
    let data = [("name", FieldValue::from("abc")), ("n", FieldValue::Integer(3))];
    for source in ["name > 0", "name * 2", "n + name", "-name"] {
        assert!(
            matches!(eval_with(source, &data), Err(ExpressionError::Eval(EvalError::TypeMismatch { .. }))),
            "{source}"
        );
    }
    assert_eq!(eval_with("name == 'abc'", &data).unwrap(), FieldValue::Boolean(true));
}

#[test]
fn test_conditional_forms_agree() {
    let data = [("income", FieldValue::Float(50000.0))];
    let python = eval_with("'high' if income > 40000 else 'low'", &data).unwrap();
    let ternary = eval_with("income > 40000 ? 'high' : 'low'", &data).unwrap();
    assert_eq!(python, FieldValue::from("high"));
    assert_eq!(python, ternary);
}

#[test]
fn test_nesting_limit() {
    let ok = format!("{}1{}", "(".repeat(64), ")".repeat(64));
    let too_deep = format!("{}1{}", "(".repeat(65), ")".repeat(65));

    assert_eq!(eval(&ok).unwrap(), FieldValue::Integer(1));
    assert!(matches!(
        eval(&too_deep),
        Err(ExpressionError::Parse(ParseError::TooDeep { max_depth: 64 }))
    ));
}

#[test]
fn test_configured_limits_are_honored() {
    let config = EngineConfig { max_expression_length: 8, ..EngineConfig::default() };
    let processor = FormProcessor::with_config(config);
    let result = processor.calculator().eval("1 + 2 + 3 + 4", &EvaluationContext::empty());
    assert!(matches!(result, Err(ExpressionError::Parse(ParseError::TooLong { .. }))));
}

#[test]
fn test_long_chain_with_generous_length_limit_is_too_deep() {
    let config = EngineConfig {
        max_expression_length: 65_536,
        ..EngineConfig::default()
    }
    .validated()
    .unwrap();
    let processor = FormProcessor::with_config(config);

    let chain = "1+".repeat(30_000) + "1";
    let result = processor.calculator().eval(&chain, &EvaluationContext::empty());
    assert!(matches!(result, Err(ExpressionError::Parse(ParseError::TooDeep { max_depth: 64 }))));
}

#[test]
fn test_expression_cache_stays_within_capacity() {
    let config = EngineConfig { expression_cache_capacity: 32, ..EngineConfig::default() };
    let processor = FormProcessor::with_config(config);
    let context = EvaluationContext::empty();

    for i in 0..5_000i64 {
        let value = processor.calculator().eval(&format!("{i} * 2"), &context).unwrap();
        assert_eq!(value, FieldValue::Integer(i * 2));
    }
    assert_eq!(processor.calculator().cached_expressions(), 32);
}

proptest! {
    #[test]
    fn chained_comparison_matches_conjunction(x in -1000i64..1000) {
        let data = [("x", FieldValue::Integer(x))];
        let chained = eval_with("0 <= x < 10", &data).unwrap();
        let explicit = eval_with("0 <= x and x < 10", &data).unwrap();
        prop_assert_eq!(chained, explicit);
    }

    #[test]
    fn chained_comparison_matches_conjunction_for_floats(x in -50.0f64..50.0) {
        let data = [("x", FieldValue::Float(x))];
        let chained = eval_with("0 <= x < 10", &data).unwrap();
        let explicit = eval_with("0 <= x and x < 10", &data).unwrap();
        prop_assert_eq!(chained, explicit);
    }

    #[test]
    fn integer_arithmetic_matches_rust(a in -10_000i64..10_000, b in 1i64..1000) {
        let data = [("a", FieldValue::Integer(a)), ("b", FieldValue::Integer(b))];
        prop_assert_eq!(eval_with("a + b * 2", &data).unwrap(), FieldValue::Integer(a + b * 2));
        prop_assert_eq!(eval_with("a % b", &data).unwrap(), FieldValue::Integer(a.rem_euclid(b)));
    }

    #[test]
    fn parser_never_panics(source in "\\PC{0,64}") {
        let _ = parse_expression(&source);
    }
}
