//! Common Types and Constants
//!
//! Shared data structures used across all algorithm modules.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};

// ==================== Constants ====================

/// Numerical stability epsilon
pub const EPSILON: f64 = 1e-10;

/// Minimum rows for a regression pipeline run
pub const MIN_FIT_ROWS: usize = 10;

/// Minimum rows per DID period
pub const MIN_DID_PERIOD_ROWS: usize = 5;

/// Minimum rows per DID cell (sample variance needs two)
pub const MIN_DID_CELL_ROWS: usize = 2;

/// Minimum surviving rows for a flow bucketing pass
pub const MIN_FLOW_ROWS: usize = 10;

/// Minimum rows left after a positivity transform
pub const MIN_TRANSFORM_ROWS: usize = 3;

/// Default chronological train fraction
pub const DEFAULT_TRAIN_FRACTION: f64 = 0.8;

/// Polynomial degree bounds
pub const MIN_POLYNOMIAL_DEGREE: u32 = 1;
pub const MAX_POLYNOMIAL_DEGREE: u32 = 5;

/// Elastic net defaults (alpha on the standardized scale)
pub const DEFAULT_ELASTIC_NET_ALPHA: f64 = 0.1;
pub const DEFAULT_L1_RATIO: f64 = 0.5;
pub const ELASTIC_NET_MAX_ITERATIONS: usize = 10_000;
pub const ELASTIC_NET_TOLERANCE: f64 = 1e-10;

/// Flow bucket count bounds
pub const MIN_GROUP_COUNT: usize = 2;
pub const MAX_GROUP_COUNT: usize = 100;

/// Half-width of the flow rate window (rows on each side)
pub const FLOW_WINDOW: usize = 10;

/// Hard anomaly ceiling for derived total flow
pub const MAX_TOTAL_FLOW: f64 = 500.0;

/// IQR fence multiplier
pub const IQR_MULTIPLIER: f64 = 1.5;

/// Test rows sampled for perturbation importance
pub const IMPORTANCE_SAMPLE_LIMIT: usize = 100;

// ==================== Observations ====================

/// 单条观测：时间戳 + 字段值
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: NaiveDateTime,
    pub fields: BTreeMap<String, f64>,
}

impl Observation {
    pub fn new(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: f64) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// 字段值，缺失或非有限值返回 None
    pub fn value(&self, field: &str) -> Option<f64> {
        self.fields.get(field).copied().filter(|v| v.is_finite())
    }

    /// 所有字段均为有限值
    pub fn has_all<S: AsRef<str>>(&self, fields: &[S]) -> bool {
        fields.iter().all(|f| self.value(f.as_ref()).is_some())
    }
}

/// 分析数据集：按时间排序的观测 + 特征/目标字段选择
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Dataset {
    pub rows: Vec<Observation>,
    pub features: Vec<String>,
    pub target: String,
}

impl Dataset {
    pub fn new(rows: Vec<Observation>, features: Vec<String>, target: impl Into<String>) -> Self {
        Self {
            rows,
            features,
            target: target.into(),
        }
    }

    /// Same selection over a different row set.
    pub fn with_rows(&self, rows: Vec<Observation>) -> Self {
        Self {
            rows,
            features: self.features.clone(),
            target: self.target.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 校验特征/目标选择
    pub fn validate_selection(&self) -> AnalysisResult<()> {
        if self.features.is_empty() {
            return Err(AnalysisError::invalid("at least one feature field is required"));
        }
        if self.features.iter().any(|f| f.trim().is_empty()) {
            return Err(AnalysisError::invalid("feature field names must not be blank"));
        }
        if self.target.trim().is_empty() {
            return Err(AnalysisError::invalid("target field is required"));
        }
        Ok(())
    }

    /// 特征字段 + 目标字段（按此顺序）
    pub fn selected_fields(&self) -> Vec<String> {
        let mut fields = self.features.clone();
        fields.push(self.target.clone());
        fields
    }

    /// 所有选中字段均为有限值的行
    pub fn complete_rows(&self) -> Vec<Observation> {
        let fields = self.selected_fields();
        self.rows
            .iter()
            .filter(|row| row.has_all(&fields))
            .cloned()
            .collect()
    }

    /// 提取特征矩阵与目标向量（行须完整）
    pub fn to_xy(&self, rows: &[Observation]) -> (Vec<Vec<f64>>, Vec<f64>) {
        let x = rows
            .iter()
            .map(|row| {
                self.features
                    .iter()
                    .map(|f| row.value(f).unwrap_or(f64::NAN))
                    .collect()
            })
            .collect();
        let y = rows
            .iter()
            .map(|row| row.value(&self.target).unwrap_or(f64::NAN))
            .collect();
        (x, y)
    }
}

// ==================== Regression Types ====================

/// 回归模型类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Linear,
    Polynomial,
    Exponential,
    Logarithmic,
    Power,
    Ridge,
    Lasso,
    ElasticNet,
    Neural,
}

impl FromStr for ModelKind {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "linear" => Ok(ModelKind::Linear),
            "polynomial" => Ok(ModelKind::Polynomial),
            "exponential" => Ok(ModelKind::Exponential),
            "logarithmic" => Ok(ModelKind::Logarithmic),
            "power" => Ok(ModelKind::Power),
            "ridge" => Ok(ModelKind::Ridge),
            "lasso" => Ok(ModelKind::Lasso),
            "elastic_net" | "elastic-net" | "elasticnet" => Ok(ModelKind::ElasticNet),
            "neural" | "neural_network" => Ok(ModelKind::Neural),
            _ => Err(AnalysisError::invalid(format!("unknown model kind: {s}"))),
        }
    }
}

impl ModelKind {
    /// Lasso 与弹性网络共用坐标下降求解
    pub fn is_elastic_net(&self) -> bool {
        matches!(self, ModelKind::Lasso | ModelKind::ElasticNet)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Linear => "linear",
            ModelKind::Polynomial => "polynomial",
            ModelKind::Exponential => "exponential",
            ModelKind::Logarithmic => "logarithmic",
            ModelKind::Power => "power",
            ModelKind::Ridge => "ridge",
            ModelKind::Lasso => "lasso",
            ModelKind::ElasticNet => "elastic_net",
            ModelKind::Neural => "neural",
        }
    }
}

/// 训练/测试划分方式
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Partitioning {
    /// Fit and score on every conditioned row.
    Full,
    /// Leading `train_fraction` of rows trains, the tail tests.
    Chronological { train_fraction: f64 },
}

impl Default for Partitioning {
    fn default() -> Self {
        Partitioning::Chronological {
            train_fraction: DEFAULT_TRAIN_FRACTION,
        }
    }
}

/// 拟合模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMode {
    /// One fit on the train partition scores both partitions.
    SingleFit,
    /// Train and test partitions are fitted independently.
    SeparatePerPartition,
}

/// 单个划分上的评估指标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionMetrics {
    pub count: usize,
    /// None when the partition target is constant
    pub r2: Option<f64>,
    pub mse: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScatterPoint {
    pub actual: f64,
    pub predicted: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResidualPoint {
    pub predicted: f64,
    pub residual: f64,
}

/// 单变量曲线点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub x: f64,
    pub y_actual: f64,
    pub y_predicted: f64,
}

/// 正值约束排除的行（索引基于被评估行）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainExclusion {
    pub constraint: String,
    pub excluded_rows: Vec<usize>,
}
