use std::collections::BTreeMap;

use gspack::{
    Value,
    grade::{Dtype, NormalizedValue, normalize},
    value::NdArray,
};

fn samples() -> Vec<Value> {
    vec![
        Value::Int(3),
        Value::Float(2.5),
        Value::Bool(true),
        Value::Complex { re: 1.0, im: 2.0 },
        Value::Complex { re: 3.0, im: 0.0 },
        Value::float_list([1.0, 2.0, 3.0]),
        Value::List(vec![Value::float_list([1.0, 2.0]), Value::float_list([3.0, 4.0])]),
        Value::array(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).expect("array"),
        Value::Set(vec![Value::Int(1), Value::Int(2)]),
        Value::Tuple(vec![Value::Int(7), Value::Float(8.5)]),
        Value::List(vec![Value::Complex { re: 1.0, im: 2.0 }, Value::Int(3)]),
        Value::List(vec![]),
        Value::Str("  Mixed Case  ".into()),
        Value::Dict(BTreeMap::from([("a".to_string(), Value::Int(1))])),
        Value::Opaque {
            type_name: "DataFrame".into(),
            repr:      "   a\n0  1".into(),
        },
    ]
}

#[test]
fn normalization_is_idempotent() {
    for value in samples() {
        let once = normalize(&value).expect("normalize");
        let twice = normalize(&once.clone().into_value()).expect("normalize again");
        assert_eq!(once, twice, "not idempotent for {value:?}");
    }
}

#[test]
fn single_element_containers_collapse_to_numbers() {
    let forms = [
        Value::Int(3),
        Value::Float(3.0),
        Value::float_list([3.0]),
        Value::Set(vec![Value::Int(3)]),
        Value::Tuple(vec![Value::Float(3.0)]),
        Value::array(vec![1], vec![3.0]).expect("array"),
        Value::array(vec![1, 1], vec![3.0]).expect("matrix"),
        Value::List(vec![Value::List(vec![Value::Int(3)])]),
    ];
    for form in &forms {
        assert_eq!(normalize(form).expect("normalize"), NormalizedValue::Number(3.0), "{form:?}");
    }
}

#[test]
fn lists_and_arrays_agree() {
    let nested = Value::List(vec![
        Value::float_list([1.0, 2.0, 3.0, 4.0]),
        Value::float_list([5.0, 6.0, 7.0, 8.0]),
        Value::float_list([9.0, 10.0, 11.0, 12.0]),
    ]);
    let array = Value::array(vec![3, 4], (1..=12).map(f64::from).collect()).expect("array");

    let from_list = normalize(&nested).expect("list");
    assert_eq!(from_list, normalize(&array).expect("array"));
    let NormalizedValue::Array(arr) = from_list else {
        panic!("expected an array");
    };
    assert_eq!(arr.shape(), &[3, 4]);
    assert_eq!(arr.dtype(), Dtype::Float64);
    assert_eq!(arr.shape_string(), "(3, 4)");
}

#[test]
fn integer_and_boolean_arrays_become_floats() {
    let ints = Value::Ndarray(NdArray {
        shape: vec![2],
        dtype: gspack::value::ElementType::Int64,
        data:  vec![1.0, 2.0],
        imag:  vec![],
    });
    let NormalizedValue::Array(arr) = normalize(&ints).expect("normalize") else {
        panic!("expected an array");
    };
    assert_eq!(arr.dtype(), Dtype::Float64);
    assert_eq!(arr.re(), &[1.0, 2.0]);
}

#[test]
fn complex_values_keep_their_dtype() {
    let scalar = normalize(&Value::Complex { re: 1.0, im: -1.0 }).expect("scalar");
    assert_eq!(scalar.describe(), "complex number");

    let mixed = Value::List(vec![Value::Complex { re: 0.0, im: 1.0 }, Value::Float(2.0)]);
    let NormalizedValue::Array(arr) = normalize(&mixed).expect("array") else {
        panic!("expected an array");
    };
    assert_eq!(arr.dtype(), Dtype::Complex128);
    assert_eq!(arr.im(0), 1.0);
    assert_eq!(arr.im(1), 0.0);
}

#[test]
fn strings_are_not_touched() {
    assert_eq!(
        normalize(&Value::Str("  Hello ".into())).expect("normalize"),
        NormalizedValue::Text("  Hello ".into())
    );
}

#[test]
fn non_numeric_elements_fail_conversion() {
    let value = Value::List(vec![Value::Int(1), Value::Str("two".into())]);
    let err = normalize(&value).expect_err("should not convert");
    assert_eq!(err.type_name, "list");
    assert!(err.reason.contains("str"), "{err}");
}

#[test]
fn everything_else_is_opaque() {
    let dict = Value::Dict(BTreeMap::new());
    assert_eq!(normalize(&dict).expect("normalize"), NormalizedValue::Opaque(dict.clone()));
    assert_eq!(normalize(&dict).expect("normalize").describe(), "dict");
}
