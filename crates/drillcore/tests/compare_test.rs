// crates/drillcore/tests/compare_test.rs

use drillcore::{evaluate, Compare, CompareError, Condition, Operand, OperandSource, Step};

#[test]
fn test_integer_comparisons() {
    let two = Operand::Int(2);
    let five = Operand::Int(5);

    assert!(evaluate(Compare::Less, &two, &five).unwrap());
    assert!(evaluate(Compare::LessOrEqual, &two, &two).unwrap());
    assert!(!evaluate(Compare::Greater, &two, &five).unwrap());
    assert!(evaluate(Compare::NotEqual, &two, &five).unwrap());
    assert!(evaluate(Compare::GreaterOrEqual, &five, &two).unwrap());
}

#[test]
fn test_float_equality_is_exact() {
    let a = Operand::Float(0.1 + 0.2);
    let b = Operand::Float(0.3);
    assert!(!evaluate(Compare::Equal, &a, &b).unwrap());
    assert!(evaluate(Compare::Equal, &b, &Operand::Float(0.3)).unwrap());
}

#[test]
fn test_vectors_compare_by_magnitude() {
    let a = Operand::from([3.0, 4.0]);
    let b = Operand::from([5.0, 0.0]);
    assert!(
        evaluate(Compare::Equal, &a, &b).unwrap(),
        "vectors of equal length should compare equal"
    );

    let short = Operand::from([1.0, 0.0]);
    let long = Operand::from([0.0, 2.0]);
    assert!(!evaluate(Compare::Greater, &short, &long).unwrap());
    assert!(evaluate(Compare::Less, &short, &long).unwrap());
}

#[test]
fn test_mismatched_types_are_rejected() {
    let err = evaluate(Compare::Equal, &Operand::Int(1), &Operand::Float(1.0)).unwrap_err();
    assert_eq!(
        err,
        CompareError::TypeMismatch {
            left: "int".to_string(),
            right: "float".to_string(),
        }
    );

    let err = evaluate(
        Compare::Less,
        &Operand::from([1.0, 2.0]),
        &Operand::from([1.0, 2.0, 3.0]),
    )
    .unwrap_err();
    assert!(err.to_string().contains("vector2"));
    assert!(err.to_string().contains("vector3"));
}

#[test]
fn test_int_is_never_widened_to_float() {
    for op in [Compare::Less, Compare::Equal, Compare::Greater] {
        assert!(evaluate(op, &Operand::Float(2.0), &Operand::Int(2)).is_err());
        assert!(evaluate(op, &Operand::Int(3), &Operand::from([3.0])).is_err());
    }
}

#[test]
fn test_compare_accepts_symbols_in_json() {
    let op: Compare = serde_json::from_str("\"<=\"").unwrap();
    assert_eq!(op, Compare::LessOrEqual);
    let op: Compare = serde_json::from_str("\"NotEqual\"").unwrap();
    assert_eq!(op, Compare::NotEqual);
    assert_eq!(Compare::GreaterOrEqual.symbol(), ">=");
}

#[test]
fn test_condition_step_from_json() {
    let json = r#"{
        "id": "check",
        "event_name": "CheckPressure",
        "linked_event_names": ["Safe"],
        "condition": {
            "compare": ">",
            "left": { "variable": "pressure" },
            "right": { "literal": { "type": "Int", "value": 40 } },
            "when_false": ["Unsafe"],
            "fallback": "stall"
        }
    }"#;
    let step: Step = serde_json::from_str(json).unwrap();

    let expected = Step::new("check", "CheckPressure")
        .with_links(["Safe"])
        .with_condition(
            Condition::new(
                Compare::Greater,
                OperandSource::variable("pressure"),
                OperandSource::literal(40),
            )
            .otherwise(["Unsafe"])
            .with_fallback(drillcore::Fallback::Stall),
        );
    assert_eq!(step, expected);
    assert!(!step.is_terminal());
}
