//! Host lifecycle tests
//!
//! Config file -> host -> connect -> ticks, including the shutdown path.

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use heater_template::{ConfigError, EvalError};
use heatersrv::{BridgeState, HeaterError, Host, HostError};

fn sample_config() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/heatersrv.toml")
}

fn write_config(body: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {}, got {}",
        expected,
        actual
    );
}

#[test]
fn test_sample_config_runs() {
    let mut host = Host::load(sample_config()).unwrap();
    host.connect().unwrap();

    assert!(host
        .controls()
        .iter()
        .all(|control| control.state() == BridgeState::Active));

    let mut last_extruder = 0.0;
    for round in 1..=20 {
        let predictions = host.tick().unwrap();
        assert_eq!(predictions.len(), 2);

        let extruder = predictions.iter().find(|p| p.heater == "extruder").unwrap();
        let bed = predictions.iter().find(|p| p.heater == "heater_bed").unwrap();

        assert_close(extruder.value, (0.05 * round as f64).min(0.8));
        assert!(extruder.value >= last_extruder);
        last_extruder = extruder.value;
        assert_close(bed.value, 0.35);
        assert_close(bed.power, 0.35);
    }
    assert!(!host.shutdown().is_shutdown());
}

#[test]
fn test_offset_scenario_from_file() {
    let file = write_config(
        r#"
[heater.extruder]

[heater_pc.extruder]
func = "{{ set_var('offset', get_var('offset') + 1) }}"
variable_offset = 2.5
"#,
    );
    let mut host = Host::load(file.path()).unwrap();
    host.connect().unwrap();

    assert_eq!(host.tick().unwrap()[0].value, 3.5);
    assert_eq!(host.tick().unwrap()[0].value, 4.5);
}

#[test]
fn test_unknown_heater_aborts_connect() {
    let file = write_config(
        r#"
[heater.extruder]

[heater_pc.chamber]
func = "{{ 40 }}"
"#,
    );
    let mut host = Host::load(file.path()).unwrap();

    let err = host.connect().unwrap_err();
    assert!(matches!(
        err,
        HostError::Config(ConfigError::UnknownHeater { ref heater, .. }) if heater == "chamber"
    ));
    assert_eq!(
        err.to_string(),
        "Heater chamber is not registered (section 'heater_pc chamber')"
    );
    assert!(host.tick().unwrap().is_empty());
}

#[test]
fn test_invalid_variable_aborts_load() {
    let file = write_config(
        r#"
[heater.extruder]

[heater_pc.extruder]
func = "{{ get_var('x') }}"
variable_x = "not_a_literal"
"#,
    );

    match Host::load(file.path()).unwrap_err() {
        HostError::Config(ConfigError::InvalidLiteral { option, .. }) => {
            assert_eq!(option, "variable_x");
        },
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_missing_func_aborts_load() {
    let file = write_config("[heater.extruder]\n\n[heater_pc.extruder]\nvariable_x = 1\n");

    assert!(matches!(
        Host::load(file.path()),
        Err(HostError::Config(ConfigError::MissingOption { .. }))
    ));
}

#[tokio::test]
async fn test_non_numeric_result_stops_run_loop() {
    let file = write_config(
        r#"
[heater.extruder]

[heater_pc.extruder]
func = "{{ 'warming' }}"
"#,
    );
    let mut host = Host::load(file.path()).unwrap();
    host.connect().unwrap();

    let controller = host.shutdown().clone();
    let waiter = tokio::spawn(async move { controller.wait().await });

    let err = host.tick().unwrap_err();
    assert_eq!(
        err,
        HeaterError::Predict {
            heater: "extruder".to_string(),
            source: EvalError::NonNumericResult {
                text: "warming".to_string()
            },
        }
    );

    tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap();
    assert!(host
        .shutdown()
        .reason()
        .unwrap()
        .contains("Template result is not a number"));
}
