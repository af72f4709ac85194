use aquastat_algo::{run_with_defaults, AnalysisOutcome};
use serde_json::Value;

use crate::config::Config;
use crate::request::AnalysisRequest;
use crate::response::{AppError, ErrorResponse, SuccessResponse};

/// 执行一次分析请求
pub fn run_request(request: &AnalysisRequest, config: &Config) -> Result<AnalysisOutcome, AppError> {
    let kind = request.kind()?;
    let options = request.resolved_options()?;
    let dataset = request.to_dataset()?;

    tracing::info!(
        analysis = kind.as_str(),
        rows = dataset.len(),
        features = ?dataset.features,
        target = %dataset.target,
        "analysis request received"
    );

    let outcome = run_with_defaults(&dataset, kind, &options, &config.regression_defaults())?;
    tracing::info!(description = %outcome.description(), "analysis finished");
    Ok(outcome)
}

/// 原始 JSON 输入 → 响应体
pub fn process(input: &str, config: &Config) -> Result<Value, ErrorResponse> {
    let result = AnalysisRequest::from_json(input)
        .and_then(|request| run_request(&request, config))
        .and_then(|outcome| {
            serde_json::to_value(SuccessResponse::new(outcome)).map_err(AppError::from)
        });

    result.map_err(|err| {
        tracing::warn!(error = %err, status = err.status(), "analysis request failed");
        err.into_response()
    })
}
