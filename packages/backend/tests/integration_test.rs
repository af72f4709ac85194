use std::io::Write;
use std::process::Command;

use aquastat_backend::config::Config;
use aquastat_backend::service::process;
use serde_json::{json, Value};

fn regression_rows(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            let pressure = (i % 11) as f64 * 0.3 + 1.0;
            let temperature = ((i * 7) % 13) as f64;
            json!({
                "collect_time": format!("2024-08-01 {:02}:{:02}:00", i / 60, i % 60),
                "pressure": pressure,
                "temperature": temperature.to_string(),
                "flow": 5.0 + 2.0 * pressure - 0.3 * temperature,
            })
        })
        .collect()
}

fn request(analysis: &str, extra: Value) -> String {
    let mut body = json!({
        "analysis_type": analysis,
        "x_fields": ["pressure", "temperature"],
        "y_field": "flow",
        "rows": regression_rows(80),
    });
    if let (Some(target), Some(source)) = (body.as_object_mut(), extra.as_object()) {
        for (k, v) in source {
            target.insert(k.clone(), v.clone());
        }
    }
    body.to_string()
}

#[test]
fn test_linear_request_round_trip() {
    let body = process(&request("linear", json!({})), &Config::default()).unwrap();
    assert_eq!(body["success"], true);
    let data = &body["data"];
    assert_eq!(data["type"], "regression");
    assert_eq!(data["sample_count"], 80);
    assert_eq!(data["train_count"], 64);
    assert!(data["test"]["r2"].as_f64().unwrap() > 0.999);
    assert!(data["equation"].as_str().unwrap().starts_with("flow ="));
    assert_eq!(data["scatter"].as_array().unwrap().len(), 16);
}

#[test]
fn test_polynomial_degree_out_of_range() {
    let err = process(
        &request("polynomial", json!({"options": {"degree": 9}})),
        &Config::default(),
    )
    .unwrap_err();
    assert_eq!(err.status, 400);
    assert_eq!(err.code, "INVALID_INPUT");
}

#[test]
fn test_unknown_analysis_type() {
    let err = process(&request("svm", json!({})), &Config::default()).unwrap_err();
    assert_eq!(err.code, "VALIDATION_ERROR");
}

#[test]
fn test_malformed_json() {
    let err = process("{not json", &Config::default()).unwrap_err();
    assert_eq!(err.status, 400);
    assert_eq!(err.code, "INVALID_JSON");
}

#[test]
fn test_too_few_rows() {
    let body = json!({
        "analysis_type": "linear",
        "x_fields": ["pressure"],
        "y_field": "flow",
        "rows": regression_rows(4),
    });
    let err = process(&body.to_string(), &Config::default()).unwrap_err();
    assert_eq!(err.code, "INSUFFICIENT_DATA");
    assert!(err.suggestion.is_some());
}

#[test]
fn test_config_train_fraction_applies() {
    let config = Config {
        train_fraction: 0.5,
        ..Default::default()
    };
    let body = process(&request("ridge", json!({})), &config).unwrap();
    assert_eq!(body["data"]["train_count"], 40);
    assert_eq!(body["data"]["kind"], "ridge");
}

#[test]
fn test_elastic_net_request() {
    let body = process(
        &request("elastic_net", json!({"options": {"alpha": 0.01, "l1_ratio": 0.5}})),
        &Config::default(),
    )
    .unwrap();
    let data = &body["data"];
    assert_eq!(data["kind"], "elastic_net");
    assert!(data["test"]["r2"].as_f64().unwrap() > 0.99);
    assert!(data["equation"].as_str().unwrap().contains("l1_ratio = 0.50"));
}

#[test]
fn test_did_request() {
    let rows: Vec<Value> = (0..28)
        .flat_map(|d| {
            [10.0, 90.0].into_iter().map(move |opening| {
                let lift = if opening > 50.0 && d >= 20 { 4.0 } else { 0.0 };
                json!({
                    "collect_time": format!("2024-08-{:02} 12:00:00", d + 1),
                    "valve": opening,
                    "flow": 30.0 + opening * 0.05 + (d % 3) as f64 * 0.1 + lift,
                })
            })
        })
        .collect();
    let body = json!({
        "analysis_type": "did",
        "y_field": "flow",
        "intervention_time": "2024-08-21 00:00:00",
        "options": {"grouping_field": "valve"},
        "rows": rows,
    });
    let response = process(&body.to_string(), &Config::default()).unwrap();
    let data = &response["data"];
    assert_eq!(data["type"], "did");
    assert!((data["did_effect"].as_f64().unwrap() - 4.0).abs() < 1e-9);
    assert_eq!(data["treatment_trend"].as_array().unwrap().len(), 56);
}

#[test]
fn test_binary_reads_request_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(request("linear", json!({})).as_bytes()).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_aquastat"))
        .arg(file.path())
        .env("RUST_LOG", "warn")
        .output()
        .unwrap();
    assert!(output.status.success());

    let body: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["kind"], "linear");
}

#[test]
fn test_binary_reports_failure_status() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"[]").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_aquastat"))
        .arg(file.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
    let body: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body["success"], false);
}
