//! Causal Effect Estimation
//!
//! Median-split difference-in-differences over a single intervention time.
//! Rows before the intervention form the pre period; the grouping covariate's
//! median over all rows separates control (≤ median) from treatment.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};
use crate::types::MIN_DID_CELL_ROWS;

pub mod estimator;

pub use estimator::estimate_did;

/// DID 配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DidConfig {
    /// 分组协变量字段
    pub grouping_field: String,
    /// 干预时间点（早于该时间为干预前）
    pub intervention_time: NaiveDateTime,
    /// 每个单元格最少行数
    #[serde(default = "default_min_cell_rows")]
    pub min_cell_rows: usize,
}

fn default_min_cell_rows() -> usize {
    MIN_DID_CELL_ROWS
}

impl DidConfig {
    pub fn new(grouping_field: impl Into<String>, intervention_time: NaiveDateTime) -> Self {
        Self {
            grouping_field: grouping_field.into(),
            intervention_time,
            min_cell_rows: MIN_DID_CELL_ROWS,
        }
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        if self.grouping_field.trim().is_empty() {
            return Err(AnalysisError::invalid("DID grouping field is required"));
        }
        if self.min_cell_rows < MIN_DID_CELL_ROWS {
            return Err(AnalysisError::invalid(format!(
                "minimum cell size must be at least {MIN_DID_CELL_ROWS}"
            )));
        }
        Ok(())
    }
}

/// 对照组 / 处理组
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DidGroup {
    Control,
    Treatment,
}

impl DidGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            DidGroup::Control => "control",
            DidGroup::Treatment => "treatment",
        }
    }
}

/// 干预前 / 干预后
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DidPeriod {
    Pre,
    Post,
}

impl DidPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DidPeriod::Pre => "pre",
            DidPeriod::Post => "post",
        }
    }
}

/// 每日均值点（用于趋势图）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// YYYY-MM-DD
    pub date: String,
    pub value: f64,
    pub group: DidGroup,
    pub period: DidPeriod,
}

/// 平行趋势检验
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParallelTrendTest {
    /// 干预前处理组首末变化
    pub treatment_change: f64,
    /// 干预前对照组首末变化
    pub control_change: f64,
    pub passed: bool,
}

/// 四个单元格的样本量
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellCounts {
    pub pre_control: usize,
    pub post_control: usize,
    pub pre_treatment: usize,
    pub post_treatment: usize,
}

impl CellCounts {
    pub fn total(&self) -> usize {
        self.pre_control + self.post_control + self.pre_treatment + self.post_treatment
    }
}

/// DID 估计结果
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CausalGroupSummary {
    pub target: String,
    pub grouping_field: String,
    /// 分组阈值（全部行的中位数）
    pub group_threshold: f64,
    pub pre_control_mean: f64,
    pub post_control_mean: f64,
    pub pre_treatment_mean: f64,
    pub post_treatment_mean: f64,
    /// (post_t - pre_t) - (post_c - pre_c)
    pub did_effect: f64,
    pub standard_error: f64,
    pub t_statistic: f64,
    /// 分档 p 值（0.01 / 0.05 / 0.1 / 0.2）
    pub p_value: f64,
    pub parallel_trend: ParallelTrendTest,
    pub counts: CellCounts,
    pub treatment_trend: Vec<TrendPoint>,
}

impl CausalGroupSummary {
    pub fn parallel_trends_passed(&self) -> bool {
        self.parallel_trend.passed
    }

    pub fn is_significant(&self) -> bool {
        self.p_value <= 0.05
    }

    pub fn description(&self) -> String {
        format!(
            "DID effect of {} on {}: {:.4} (p ≈ {}, {}), parallel trends {}",
            self.grouping_field,
            self.target,
            self.did_effect,
            self.p_value,
            if self.is_significant() { "significant" } else { "not significant" },
            if self.parallel_trends_passed() { "hold" } else { "violated" }
        )
    }
}
