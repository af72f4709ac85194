//! JSON request parsing: loosely-typed rows into a time-ordered [`Dataset`].

use std::collections::BTreeSet;

use aquastat_algo::sanitize::coerce_value;
use aquastat_algo::{AnalysisKind, AnalysisOptions, Dataset, Observation};
use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::response::AppError;

/// 行内时间戳字段（按优先级）
pub const TIMESTAMP_FIELDS: [&str; 2] = ["collect_time", "timestamp"];

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisRequest {
    #[serde(alias = "analysis_type", alias = "type")]
    pub analysis: String,
    #[serde(default, alias = "x_fields")]
    pub features: Vec<String>,
    #[serde(default, alias = "y_field")]
    pub target: String,
    /// 覆盖 options.intervention_time，接受常见文本格式
    #[serde(default)]
    pub intervention_time: Option<String>,
    #[serde(default)]
    pub options: AnalysisOptions,
    pub rows: Vec<Map<String, Value>>,
}

impl AnalysisRequest {
    pub fn from_json(input: &str) -> Result<Self, AppError> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn kind(&self) -> Result<AnalysisKind, AppError> {
        self.analysis
            .parse::<AnalysisKind>()
            .map_err(|_| AppError::validation(format!("unknown analysis type: {}", self.analysis)))
    }

    pub fn resolved_options(&self) -> Result<AnalysisOptions, AppError> {
        let mut options = self.options.clone();
        if let Some(raw) = &self.intervention_time {
            options.intervention_time = Some(parse_timestamp(raw)?);
        }
        Ok(options)
    }

    /// 分析需要读取的数值字段
    fn numeric_fields(&self) -> BTreeSet<String> {
        let mut fields: BTreeSet<String> = self.features.iter().cloned().collect();
        if !self.target.is_empty() {
            fields.insert(self.target.clone());
        }
        for field in [
            &self.options.grouping_field,
            &self.options.primary_counter,
            &self.options.secondary_counter,
        ]
        .into_iter()
        .flatten()
        {
            fields.insert(field.clone());
        }
        fields
    }

    /// 构建按时间排序的数据集；空值与空字符串视为缺失
    pub fn to_dataset(&self) -> Result<Dataset, AppError> {
        if self.rows.is_empty() {
            return Err(AppError::bad_request("request contains no rows"));
        }
        let fields = self.numeric_fields();
        let mut rows = Vec::with_capacity(self.rows.len());

        for (index, raw) in self.rows.iter().enumerate() {
            let timestamp = row_timestamp(raw)
                .ok_or_else(|| AppError::validation(format!("row {index} has no timestamp")))??;
            let mut observation = Observation::new(timestamp);
            for field in &fields {
                if let Some(value) = raw.get(field) {
                    if let Some(v) = coerce_value(field, value)? {
                        observation = observation.with_field(field.clone(), v);
                    }
                }
            }
            rows.push(observation);
        }

        rows.sort_by_key(|r| r.timestamp);
        tracing::debug!(rows = rows.len(), fields = fields.len(), "request rows parsed");

        Ok(Dataset::new(rows, self.features.clone(), self.target.clone()))
    }
}

fn row_timestamp(raw: &Map<String, Value>) -> Option<Result<NaiveDateTime, AppError>> {
    let value = TIMESTAMP_FIELDS.iter().find_map(|key| raw.get(*key))?;
    Some(match value {
        Value::String(s) => parse_timestamp(s),
        other => Err(AppError::validation(format!(
            "timestamp must be a string, got {other}"
        ))),
    })
}

/// "YYYY-MM-DD HH:MM:SS"、ISO 8601 或 RFC 3339
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, AppError> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.naive_local());
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| AppError::validation(format!("unrecognised timestamp: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-07-01 08:30:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-07-01T08:30:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-07-01T08:30:00+08:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-07-01 08:30").unwrap(), expected);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_rows_are_coerced_and_sorted() {
        let request = AnalysisRequest::from_json(
            &json!({
                "analysis_type": "linear",
                "x_fields": ["pressure"],
                "y_field": "flow",
                "rows": [
                    {"collect_time": "2024-07-01 08:02:00", "pressure": "1.5", "flow": 3, "station": "east"},
                    {"collect_time": "2024-07-01 08:01:00", "pressure": null, "flow": 2},
                    {"timestamp": "2024-07-01 08:00:00", "pressure": 0.5, "flow": ""}
                ]
            })
            .to_string(),
        )
        .unwrap();
        assert_eq!(request.kind().unwrap(), AnalysisKind::Linear);

        let dataset = request.to_dataset().unwrap();
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.rows[0].value("pressure"), Some(0.5));
        assert_eq!(dataset.rows[0].value("flow"), None);
        assert_eq!(dataset.rows[1].value("pressure"), None);
        assert_eq!(dataset.rows[2].value("pressure"), Some(1.5));
        assert_eq!(dataset.rows[2].value("station"), None);
        assert_eq!(dataset.complete_rows().len(), 1);
    }

    #[test]
    fn test_non_numeric_selected_field_is_rejected() {
        let request = AnalysisRequest::from_json(
            &json!({
                "analysis": "linear",
                "features": ["pressure"],
                "target": "flow",
                "rows": [{"collect_time": "2024-07-01 08:00:00", "pressure": "high", "flow": 1}]
            })
            .to_string(),
        )
        .unwrap();
        let err = request.to_dataset().unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[test]
    fn test_missing_timestamp() {
        let request = AnalysisRequest::from_json(
            &json!({"analysis": "linear", "rows": [{"pressure": 1}]}).to_string(),
        )
        .unwrap();
        assert_eq!(request.to_dataset().unwrap_err().code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_empty_rows_rejected() {
        let request = AnalysisRequest::from_json(
            &json!({"analysis": "linear", "features": ["pressure"], "target": "flow", "rows": []})
                .to_string(),
        )
        .unwrap();
        let err = request.to_dataset().unwrap_err();
        assert_eq!(err.code(), "BAD_REQUEST");
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn test_intervention_time_override() {
        let request = AnalysisRequest::from_json(
            &json!({
                "analysis": "did",
                "target": "flow",
                "intervention_time": "2024-07-15 00:00:00",
                "options": {"grouping_field": "pressure"},
                "rows": []
            })
            .to_string(),
        )
        .unwrap();
        let options = request.resolved_options().unwrap();
        assert_eq!(
            options.intervention_time,
            Some(parse_timestamp("2024-07-15T00:00:00").unwrap())
        );
        assert_eq!(request.kind().unwrap(), AnalysisKind::Did);
    }

    #[test]
    fn test_penalized_kinds_and_options() {
        let request = AnalysisRequest::from_json(
            &json!({
                "analysis_type": "elastic_net",
                "x_fields": ["pressure"],
                "y_field": "flow",
                "options": {"alpha": 0.2, "l1_ratio": 0.7},
                "rows": []
            })
            .to_string(),
        )
        .unwrap();
        assert_eq!(request.kind().unwrap(), AnalysisKind::ElasticNet);
        let options = request.resolved_options().unwrap();
        assert_eq!(options.alpha, Some(0.2));
        assert_eq!(options.l1_ratio, Some(0.7));

        let lasso = AnalysisRequest::from_json(
            &json!({"analysis": "lasso", "rows": []}).to_string(),
        )
        .unwrap();
        assert_eq!(lasso.kind().unwrap(), AnalysisKind::Lasso);
    }
}
