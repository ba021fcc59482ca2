//! Predictive template scenarios
//!
//! End-to-end behavior of a `heater_pc` section: options in, predicted
//! values out, with the fatal shutdown channel observed through a
//! `ShutdownController`.

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::sync::Arc;

use common::ShutdownController;
use heater_template::{ConfigError, EvalError, ExpressionBinding, Literal};
use tracing_test::traced_test;

const SECTION: &str = "heater_pc extruder";

fn bind(
    options: &[(&str, &str)],
) -> (Result<ExpressionBinding, ConfigError>, ShutdownController) {
    let controller = ShutdownController::new();
    let binding = ExpressionBinding::from_options(
        SECTION,
        options.iter().copied(),
        Arc::new(controller.clone()),
    );
    (binding, controller)
}

#[test]
fn test_offset_increments_across_calls() {
    let (binding, controller) = bind(&[
        ("func", "{{ set_var('offset', get_var('offset') + 1) }}"),
        ("variable_offset", "2.5"),
    ]);
    let binding = binding.unwrap();

    assert_eq!(binding.evaluate().unwrap(), 3.5);
    assert_eq!(binding.evaluate().unwrap(), 4.5);
    assert_eq!(
        binding.surface().get_var("offset").unwrap(),
        Literal::Float(4.5)
    );
    assert!(!controller.is_shutdown());
}

#[test]
#[traced_test]
fn test_log_does_not_change_result() {
    let (binding, _) = bind(&[("func", "{{ log('tick') }}7.0")]);
    let binding = binding.unwrap();

    assert_eq!(binding.render().unwrap(), "7.0");
    assert_eq!(binding.evaluate().unwrap(), 7.0);
    assert!(logs_contain("tick"));
}

#[test]
fn test_non_numeric_result() {
    let (binding, controller) = bind(&[("func", "abc")]);
    let binding = binding.unwrap();

    assert_eq!(
        binding.evaluate().unwrap_err(),
        EvalError::NonNumericResult {
            text: "abc".to_string()
        }
    );
    assert!(!controller.is_shutdown());
}

#[test]
fn test_undeclared_get_var_shuts_down() {
    let (binding, controller) = bind(&[("func", "{{ get_var('missing') }}")]);
    let binding = binding.unwrap();

    let err = binding.render().unwrap_err();
    assert_eq!(err, EvalError::undefined_variable("missing"));

    let reason = controller.reason().unwrap();
    assert!(reason.contains("missing"), "reason: {}", reason);
    assert!(reason.contains(SECTION), "reason: {}", reason);
}

#[test]
fn test_undeclared_set_var_shuts_down() {
    let (binding, controller) = bind(&[
        ("func", "{{ set_var('typo', 1) }}"),
        ("variable_value", "1"),
    ]);
    let binding = binding.unwrap();

    assert!(matches!(
        binding.evaluate(),
        Err(EvalError::UndefinedVariable { ref name }) if name == "typo"
    ));
    assert!(controller.is_shutdown());
    assert!(!binding.surface().store().lock().contains("typo"));
}

#[test]
fn test_unparseable_variable_prevents_binding() {
    let (binding, controller) = bind(&[
        ("func", "{{ get_var('x') }}"),
        ("variable_x", "not_a_literal"),
    ]);

    match binding.unwrap_err() {
        ConfigError::InvalidLiteral {
            section, option, ..
        } => {
            assert_eq!(section, SECTION);
            assert_eq!(option, "variable_x");
        },
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!controller.is_shutdown());
}

#[test]
fn test_literals_round_trip_through_get_var() {
    let cases = [
        ("'pla'", Literal::from("pla")),
        ("42", Literal::Int(42)),
        ("-0.25", Literal::Float(-0.25)),
        ("True", Literal::Bool(true)),
        ("None", Literal::Null),
        (
            "[1, 'two', [3.0]]",
            Literal::List(vec![
                Literal::Int(1),
                Literal::from("two"),
                Literal::List(vec![Literal::Float(3.0)]),
            ]),
        ),
        (
            "{'temps': (200, 210), 'on': false}",
            Literal::Map(
                [
                    ("on".to_string(), Literal::Bool(false)),
                    (
                        "temps".to_string(),
                        Literal::List(vec![Literal::Int(200), Literal::Int(210)]),
                    ),
                ]
                .into_iter()
                .collect(),
            ),
        ),
    ];

    for (text, expected) in cases {
        // `set_var` writes back whatever `get_var` produced
        let (binding, _) = bind(&[
            ("func", "{{ set_var('v', get_var('v')) }}"),
            ("variable_v", text),
        ]);
        let binding = binding.unwrap();
        binding.render().unwrap();

        assert_eq!(
            binding.surface().get_var("v").unwrap(),
            expected,
            "literal {}",
            text
        );
    }
}

#[test]
fn test_set_var_changes_type() {
    let (binding, _) = bind(&[
        ("func", "{{ set_var('mode', 'boost') }}{{ 1 if get_var('mode') == 'boost' else 0 }}"),
        ("variable_mode", "0"),
    ]);
    let binding = binding.unwrap();

    assert_eq!(binding.render().unwrap(), "boost1");
}

#[test]
fn test_template_reads_structured_variable() {
    let (binding, _) = bind(&[
        ("func", "{{ get_var('profile')['temps'][1] - get_var('profile')['temps'][0] }}"),
        ("variable_profile", "{'temps': [200, 215]}"),
    ]);

    assert_eq!(binding.unwrap().evaluate().unwrap(), 15.0);
}

#[test]
fn test_undefined_value_set_var_is_render_error() {
    let (binding, controller) = bind(&[
        ("func", "{{ set_var('v', nothing_here) }}"),
        ("variable_v", "1"),
    ]);
    let binding = binding.unwrap();

    assert!(matches!(binding.render(), Err(EvalError::Render(_))));
    assert_eq!(binding.surface().get_var("v").unwrap(), Literal::Int(1));
    assert!(!controller.is_shutdown());
}

#[test]
fn test_inexact_number_set_var_is_render_error() {
    for func in [
        "{{ set_var('v', 9223372036854775807 + 1) }}",
        "{{ set_var('v', 'nan'|float) }}",
        "{{ set_var('v', ['ok', 'inf'|float]) }}",
    ] {
        let (binding, controller) = bind(&[("func", func), ("variable_v", "1")]);
        let binding = binding.unwrap();

        assert!(matches!(binding.render(), Err(EvalError::Render(_))), "{}", func);
        assert_eq!(binding.surface().get_var("v").unwrap(), Literal::Int(1));
        assert!(!controller.is_shutdown());
    }
}
