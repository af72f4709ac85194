//! Data Sanitization
//!
//! Conditioning steps applied before any fit.
//!
//! Functions:
//! - Value coercion and validity checks
//! - Column standardization
//! - Sequential IQR outlier filtering
//! - Chronological train/test split

use serde_json::Value;

use crate::error::{AnalysisError, AnalysisResult};
use crate::types::{Observation, IQR_MULTIPLIER};

/// 检查数组是否包含无效值 (NaN 或 Inf)
pub fn has_invalid_values(arr: &[f64]) -> bool {
    arr.iter().any(|&x| x.is_nan() || x.is_infinite())
}

/// 将宿主提供的 JSON 值转换为浮点数
///
/// `null` 视为缺失；数字字符串按十进制解析；其他类型报 `InvalidInput`。
pub fn coerce_value(field: &str, value: &Value) -> AnalysisResult<Option<f64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed.parse::<f64>().map(Some).map_err(|_| {
                AnalysisError::invalid(format!("field {field}: {trimmed:?} is not numeric"))
            })
        }
        Value::Bool(_) | Value::Array(_) | Value::Object(_) => Err(AnalysisError::invalid(
            format!("field {field}: expected a number, got {value}"),
        )),
    }
}

/// 均值（空数组返回 0）
pub fn mean(arr: &[f64]) -> f64 {
    if arr.is_empty() {
        return 0.0;
    }
    arr.iter().sum::<f64>() / arr.len() as f64
}

/// 样本方差（n-1）
pub fn sample_variance(arr: &[f64]) -> f64 {
    if arr.len() < 2 {
        return 0.0;
    }
    let m = mean(arr);
    arr.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (arr.len() - 1) as f64
}

/// 中位数
pub fn median(arr: &[f64]) -> f64 {
    if arr.is_empty() {
        return 0.0;
    }
    let mut sorted = arr.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

/// 数值上是否为常量序列
pub fn is_constant(arr: &[f64]) -> bool {
    let (min, max) = arr
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if arr.is_empty() {
        return true;
    }
    (max - min) <= 1e-12 * max.abs().max(min.abs()).max(1.0)
}

// ==================== Standardization ====================

/// 标准化结果：数据 + 逆变换所需的均值/标准差
#[derive(Clone, Debug, PartialEq)]
pub struct Standardized {
    pub data: Vec<Vec<f64>>,
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl Standardized {
    /// 用已拟合的统计量变换一行
    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(self.std.iter()))
            .map(|(&v, (&m, &s))| (v - m) / s)
            .collect()
    }
}

/// 按列标准化（总体标准差；标准差为 0 时取 1）
pub fn standardize(x: &[Vec<f64>]) -> Standardized {
    let n = x.len();
    let m = x.first().map(|r| r.len()).unwrap_or(0);

    let mut mean = vec![0.0; m];
    let mut std = vec![0.0; m];
    if n == 0 {
        return Standardized {
            data: Vec::new(),
            mean,
            std: vec![1.0; m],
        };
    }

    for row in x {
        for (j, &v) in row.iter().enumerate() {
            mean[j] += v;
        }
    }
    for v in mean.iter_mut() {
        *v /= n as f64;
    }

    for row in x {
        for (j, &v) in row.iter().enumerate() {
            std[j] += (v - mean[j]).powi(2);
        }
    }
    for (j, s) in std.iter_mut().enumerate() {
        *s = (*s / n as f64).sqrt();
        if *s == 0.0 {
            tracing::warn!(column = j, "constant column, standardizing to zero");
            *s = 1.0;
        }
    }

    let stats = Standardized {
        data: Vec::new(),
        mean,
        std,
    };
    let data = x.iter().map(|row| stats.transform_row(row)).collect();
    Standardized { data, ..stats }
}

// ==================== Outlier Filtering ====================

/// IQR 异常值过滤
///
/// 按给定字段顺序依次过滤：每个字段的 Q1/Q3 基于当前剩余行计算
/// （升序排序后取下标 `floor(0.25n)` / `floor(0.75n)`，不插值），
/// 区间 `[Q1-1.5·IQR, Q3+1.5·IQR]` 之外的行被剔除。结果依赖字段顺序。
/// 缺失或非有限值的行无法比较，同样剔除。
pub fn remove_outliers<S: AsRef<str>>(rows: &[Observation], fields: &[S]) -> Vec<Observation> {
    let mut filtered: Vec<Observation> = rows.to_vec();

    for field in fields {
        let field = field.as_ref();
        filtered.retain(|row| row.value(field).is_some());
        if filtered.is_empty() {
            break;
        }

        let mut values: Vec<f64> = filtered.iter().filter_map(|r| r.value(field)).collect();
        values.sort_by(|a, b| a.total_cmp(b));
        let n = values.len();
        let q1 = values[(n as f64 * 0.25).floor() as usize];
        let q3 = values[((n as f64 * 0.75).floor() as usize).min(n - 1)];
        let iqr = q3 - q1;
        let lower = q1 - IQR_MULTIPLIER * iqr;
        let upper = q3 + IQR_MULTIPLIER * iqr;

        let before = filtered.len();
        filtered.retain(|row| {
            row.value(field)
                .map(|v| v >= lower && v <= upper)
                .unwrap_or(false)
        });
        tracing::debug!(
            field,
            lower,
            upper,
            removed = before - filtered.len(),
            "iqr filter pass"
        );
    }

    filtered
}

// ==================== Splitting ====================

/// 按时间顺序划分训练/测试集，分割点 `floor(n * train_fraction)`
pub fn chronological_split<T: Clone>(rows: &[T], train_fraction: f64) -> (Vec<T>, Vec<T>) {
    let split = split_index(rows.len(), train_fraction);
    (rows[..split].to_vec(), rows[split..].to_vec())
}

/// 分割下标（夹在 [0, n]）
pub fn split_index(n: usize, train_fraction: f64) -> usize {
    ((n as f64 * train_fraction).floor() as usize).min(n)
}
