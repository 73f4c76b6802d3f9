use std::collections::BTreeMap;

use gspack::{
    Platform, RubricError, Value, Variables,
    grade::{FailureKind, Rubric, RubricDraft, TestDraft},
};
use serde_json::json;

fn rubric(value: serde_json::Value) -> Result<Rubric, RubricError> {
    Rubric::from_json_str(&value.to_string(), None)
}

#[test]
fn instructor_aliases_are_accepted() {
    let rubric = rubric(json!({
        "test_suite": [
            {
                "test_name": "Part A",
                "variable_name": "A1",
                "score": 2,
                "description": "the sum",
                "hint_wrong_size": "Check the orientation.",
                "hints": { "nans": "Avoid dividing by zero." }
            }
        ],
        "number_of_attempts": 3
    }))
    .expect("valid rubric");

    let test = &rubric.tests()[0];
    assert_eq!(test.name(), "Part A");
    assert_eq!(test.expected_variable(), "A1");
    assert_eq!(test.weight(), 2.0);
    assert_eq!(test.display_name(0), "1. Part A: the sum");
    assert_eq!(test.hint(FailureKind::ShapeMismatch, Platform::Python), Some("Check the orientation."));
    assert_eq!(test.hint(FailureKind::ContainsNaN, Platform::Python), Some("Avoid dividing by zero."));
    assert_eq!(rubric.attempt_limit(), Some(3));
    assert_eq!(rubric.supported_platforms(), &[Platform::Python]);
}

#[test]
fn weights_are_derived_from_the_total() {
    let rubric = rubric(json!({
        "total_score": 1.0,
        "tests": [
            { "name": "a", "expected_variable": "a" },
            { "name": "b", "expected_variable": "b" },
            { "name": "c", "expected_variable": "c" }
        ]
    }))
    .expect("valid rubric");

    for test in rubric.tests() {
        assert!((test.weight() - 1.0 / 3.0).abs() < 1e-12);
    }
    assert!((rubric.total_score() - 1.0).abs() < 1e-12);
    assert_eq!(rubric.tests()[1].display_name(1), "2. b");
}

#[test]
fn explicit_weights_must_agree_with_the_total() {
    let err = rubric(json!({
        "total_score": 3.0,
        "tests": [
            { "name": "a", "expected_variable": "a", "weight": 2.0 },
            { "name": "b", "expected_variable": "b" },
            { "name": "c", "expected_variable": "c" }
        ]
    }))
    .expect_err("2.0 is not 3.0/3");
    assert!(matches!(err, RubricError::InconsistentWeight { ref name, count: 3, .. } if name == "a"));

    let rubric = rubric(json!({
        "total_score": 3.0,
        "tests": [
            { "name": "a", "expected_variable": "a", "weight": 1.005 },
            { "name": "b", "expected_variable": "b" },
            { "name": "c", "expected_variable": "c" }
        ]
    }))
    .expect("within agreement tolerance");
    assert_eq!(rubric.tests()[0].weight(), 1.005);
}

#[test]
fn a_weight_is_required_without_a_total() {
    let err = rubric(json!({
        "tests": [
            { "name": "a", "expected_variable": "a", "weight": 1.0 },
            { "name": "b", "expected_variable": "b" }
        ]
    }))
    .expect_err("b has no weight");
    assert_eq!(err, RubricError::MissingWeight("b".to_string()));
}

#[test]
fn structural_problems_are_rejected() {
    let duplicate = rubric(json!({
        "tests": [
            { "name": "a", "expected_variable": "x", "weight": 1.0 },
            { "name": "a", "expected_variable": "y", "weight": 1.0 }
        ]
    }));
    assert_eq!(duplicate, Err(RubricError::DuplicateName("a".to_string())));

    assert_eq!(rubric(json!({ "tests": [] })), Err(RubricError::EmptyTestSuite));

    let platform = rubric(json!({
        "supported_platforms": ["python", "octave"],
        "tests": [{ "name": "a", "expected_variable": "x", "weight": 1.0 }]
    }));
    assert_eq!(platform, Err(RubricError::UnknownPlatform("octave".to_string())));

    let negative = rubric(json!({
        "tests": [{ "name": "a", "expected_variable": "x", "weight": -1.0 }]
    }));
    assert!(matches!(negative, Err(RubricError::InvalidWeight { .. })));

    let tolerance = rubric(json!({
        "tests": [{ "name": "a", "expected_variable": "x", "weight": 1.0, "rtol": -0.1 }]
    }));
    assert_eq!(tolerance, Err(RubricError::InvalidTolerance("a".to_string())));

    let empty_variable = rubric(json!({
        "tests": [{ "name": "a", "expected_variable": " ", "weight": 1.0 }]
    }));
    assert_eq!(empty_variable, Err(RubricError::MissingVariable("a".to_string())));

    assert!(matches!(
        Rubric::from_json_str("{ \"tests\": [", None),
        Err(RubricError::Malformed(_))
    ));
}

#[test]
fn non_positive_attempt_limits_mean_unlimited() {
    for limit in [-1, 0] {
        let rubric = rubric(json!({
            "number_of_attempts": limit,
            "tests": [{ "name": "a", "expected_variable": "x", "weight": 1.0 }]
        }))
        .expect("valid rubric");
        assert_eq!(rubric.attempt_limit(), None);
    }
}

#[test]
fn platforms_default_to_the_solution_platform() {
    let draft = RubricDraft::builder()
        .tests(vec![
            TestDraft::builder()
                .name("a")
                .expected_variable("x")
                .weight(1.0)
                .build(),
        ])
        .build();
    let rubric = draft.validate(Some(Platform::Jupyter)).expect("valid rubric");
    assert!(rubric.supports(Platform::Jupyter));
    assert!(!rubric.supports(Platform::Python));
}

#[test]
fn stored_rubric_reads_back_unchanged() {
    let original = rubric(json!({
        "total_score": 2.0,
        "number_of_attempts": 5,
        "extra_files": ["data.csv"],
        "main_file_name": "hw1",
        "supported_platforms": ["python", "jupyter"],
        "tests": [
            { "name": "a", "expected_variable": "x", "rtol": 0.0, "hints": { "wrong_type_jupyter": "Run every cell." } },
            { "name": "b", "expected_variable": "y", "atol": 0.5, "description": "second" }
        ]
    }))
    .expect("valid rubric");

    let text = original.to_json().expect("serialize");
    let stored: serde_json::Value = serde_json::from_str(&text).expect("json");
    assert_eq!(stored["attempt_limit"], json!(5));
    assert_eq!(stored["tests"][0]["weight"], json!(1.0));
    assert_eq!(stored["tests"][0]["rtol"], json!(0.0));

    let reread = Rubric::from_json_str(&text, None).expect("stored rubric is valid");
    assert_eq!(reread, original);
    assert_eq!(reread.extra_files(), &["data.csv".to_string()]);
    assert_eq!(reread.main_file_name(), Some("hw1"));
}

#[test]
fn unlimited_attempts_are_stored_as_minus_one() {
    let rubric = rubric(json!({
        "tests": [{ "name": "a", "expected_variable": "x", "weight": 1.0 }]
    }))
    .expect("valid rubric");
    let stored: serde_json::Value =
        serde_json::from_str(&rubric.to_json().expect("serialize")).expect("json");
    assert_eq!(stored["attempt_limit"], json!(-1));
}

#[test]
fn platform_hints_win_over_generic_ones() {
    let rubric = rubric(json!({
        "tests": [{
            "name": "a",
            "expected_variable": "x",
            "weight": 1.0,
            "hints": {
                "wrong_type": "Use a number.",
                "wrong_type_matlab": "Use a double, not a cell."
            }
        }]
    }))
    .expect("valid rubric");
    let test = &rubric.tests()[0];

    assert_eq!(test.hint(FailureKind::TypeMismatch, Platform::Matlab), Some("Use a double, not a cell."));
    assert_eq!(test.hint(FailureKind::TypeMismatch, Platform::Python), Some("Use a number."));
    assert_eq!(test.hint(FailureKind::DtypeMismatch, Platform::Python), Some("Use a number."));
    assert_eq!(test.hint(FailureKind::ToleranceExceeded, Platform::Python), None);
}

#[test]
fn expected_values_need_every_variable() {
    let rubric = rubric(json!({
        "tests": [
            { "name": "a", "expected_variable": "x", "weight": 1.0 },
            { "name": "b", "expected_variable": "y", "weight": 1.0 }
        ]
    }))
    .expect("valid rubric");

    let mut solution = Variables::new();
    solution.insert("x".to_string(), Value::Float(1.0));
    solution.insert("y".to_string(), Value::None);
    let err = rubric
        .capture_expected_values(&solution)
        .expect_err("y is None");
    assert!(matches!(err, RubricError::UndefinedExpectedVariable { ref variable, .. } if variable == "y"));

    solution.insert("y".to_string(), Value::float_list([1.0, 2.0]));
    solution.insert("unused".to_string(), Value::Int(0));
    let expected = rubric.capture_expected_values(&solution).expect("capture");
    assert_eq!(expected.len(), 2);
    assert_eq!(expected.get("x"), Some(&Value::Float(1.0)));
    assert_eq!(expected.get("unused"), None);
}

#[test]
fn rubric_variables_are_read_from_the_solution() {
    let test = |name: &str, variable: &str| {
        Value::Dict(BTreeMap::from([
            ("test_name".to_string(), Value::from(name)),
            ("variable_name".to_string(), Value::from(variable)),
            ("hint_tolerance".to_string(), Value::from("Keep more digits.")),
        ]))
    };
    let mut variables = Variables::new();
    variables.insert("test_suite".to_string(), Value::List(vec![test("A", "a"), test("B", "b")]));
    variables.insert("total_score".to_string(), Value::Int(10));
    variables.insert("number_of_attempts".to_string(), Value::Int(4));
    variables.insert("main_file_name".to_string(), Value::None);
    variables.insert("a".to_string(), Value::Float(1.0));

    let rubric = RubricDraft::from_solution_variables(&variables)
        .expect("draft")
        .validate(Some(Platform::Python))
        .expect("valid rubric");
    assert_eq!(rubric.tests().len(), 2);
    assert_eq!(rubric.tests()[1].weight(), 5.0);
    assert_eq!(rubric.attempt_limit(), Some(4));
    assert_eq!(rubric.main_file_name(), None);
    assert_eq!(
        rubric.tests()[0].hint(FailureKind::ToleranceExceeded, Platform::Python),
        Some("Keep more digits.")
    );

    variables.remove("test_suite");
    assert!(matches!(
        RubricDraft::from_solution_variables(&variables),
        Err(RubricError::Malformed(_))
    ));
}
