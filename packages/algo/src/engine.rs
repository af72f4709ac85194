//! Analysis Engine
//!
//! Single entry point that maps an analysis kind plus loosely-typed options
//! onto the typed configuration of each component and runs it.

use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::causal::{estimate_did, CausalGroupSummary, DidConfig};
use crate::error::{AnalysisError, AnalysisResult};
use crate::flow::{bucket_observations, select_bucket, FlowBucketConfig, FlowBucketReport};
use crate::neural::NeuralConfig;
use crate::regression::{self, ElasticNetConfig, RegressionConfig, RegressionFit};
use crate::types::{Dataset, ModelKind, Partitioning};

/// 分析类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Linear,
    Polynomial,
    Exponential,
    Logarithmic,
    Power,
    Ridge,
    Lasso,
    ElasticNet,
    Neural,
    Did,
    FlowBucket,
}

impl FromStr for AnalysisKind {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "did" => Ok(AnalysisKind::Did),
            "flow-bucket" | "flow_bucket" | "flow-groups" => Ok(AnalysisKind::FlowBucket),
            other => other
                .parse::<ModelKind>()
                .map(AnalysisKind::from)
                .map_err(|_| AnalysisError::invalid(format!("unknown analysis type: {s}"))),
        }
    }
}

impl AnalysisKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::Did => "did",
            AnalysisKind::FlowBucket => "flow-bucket",
            _ => self.model_kind().map(|k| k.as_str()).unwrap_or("unknown"),
        }
    }

    /// 回归类分析对应的模型
    pub fn model_kind(&self) -> Option<ModelKind> {
        match self {
            AnalysisKind::Linear => Some(ModelKind::Linear),
            AnalysisKind::Polynomial => Some(ModelKind::Polynomial),
            AnalysisKind::Exponential => Some(ModelKind::Exponential),
            AnalysisKind::Logarithmic => Some(ModelKind::Logarithmic),
            AnalysisKind::Power => Some(ModelKind::Power),
            AnalysisKind::Ridge => Some(ModelKind::Ridge),
            AnalysisKind::Lasso => Some(ModelKind::Lasso),
            AnalysisKind::ElasticNet => Some(ModelKind::ElasticNet),
            AnalysisKind::Neural => Some(ModelKind::Neural),
            AnalysisKind::Did | AnalysisKind::FlowBucket => None,
        }
    }
}

impl From<ModelKind> for AnalysisKind {
    fn from(kind: ModelKind) -> Self {
        match kind {
            ModelKind::Linear => AnalysisKind::Linear,
            ModelKind::Polynomial => AnalysisKind::Polynomial,
            ModelKind::Exponential => AnalysisKind::Exponential,
            ModelKind::Logarithmic => AnalysisKind::Logarithmic,
            ModelKind::Power => AnalysisKind::Power,
            ModelKind::Ridge => AnalysisKind::Ridge,
            ModelKind::Lasso => AnalysisKind::Lasso,
            ModelKind::ElasticNet => AnalysisKind::ElasticNet,
            ModelKind::Neural => AnalysisKind::Neural,
        }
    }
}

/// 分析参数（宿主可省略的字段均为 Option）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// 多项式阶数
    pub degree: Option<u32>,
    pub ridge_alpha: Option<f64>,
    /// 弹性网络 / Lasso 正则化强度
    pub alpha: Option<f64>,
    /// L1 占比，Lasso 忽略
    pub l1_ratio: Option<f64>,
    pub hidden_layers: Option<Vec<usize>>,
    pub learning_rate: Option<f64>,
    pub neural_max_iterations: Option<usize>,
    pub neural_seed: Option<u64>,
    pub partitioning: Option<Partitioning>,
    pub separate_fit_per_partition: Option<bool>,
    pub remove_outliers: Option<bool>,
    /// DID 分组字段
    pub grouping_field: Option<String>,
    /// DID 干预时间
    pub intervention_time: Option<NaiveDateTime>,
    /// 流量分组数
    pub group_count: Option<usize>,
    pub primary_counter: Option<String>,
    pub secondary_counter: Option<String>,
    /// 指定后仅对该流量分组做回归
    pub bucket_id: Option<usize>,
}

impl AnalysisOptions {
    /// 在默认回归配置上叠加参数
    pub fn regression_config(&self, kind: ModelKind, base: &RegressionConfig) -> RegressionConfig {
        let defaults = &base.neural;
        RegressionConfig {
            kind,
            degree: self.degree.unwrap_or(base.degree),
            ridge_alpha: self.ridge_alpha.unwrap_or(base.ridge_alpha),
            elastic_net: ElasticNetConfig {
                alpha: self.alpha.unwrap_or(base.elastic_net.alpha),
                l1_ratio: self.l1_ratio.unwrap_or(base.elastic_net.l1_ratio),
                ..base.elastic_net
            },
            neural: NeuralConfig {
                hidden_layers: self
                    .hidden_layers
                    .clone()
                    .unwrap_or_else(|| defaults.hidden_layers.clone()),
                learning_rate: self.learning_rate.unwrap_or(defaults.learning_rate),
                max_iterations: self.neural_max_iterations.unwrap_or(defaults.max_iterations),
                seed: self.neural_seed.unwrap_or(defaults.seed),
                ..defaults.clone()
            },
            partitioning: self.partitioning.unwrap_or(base.partitioning),
            separate_fit_per_partition: self
                .separate_fit_per_partition
                .unwrap_or(base.separate_fit_per_partition),
            remove_outliers: self.remove_outliers.unwrap_or(base.remove_outliers),
        }
    }

    pub fn did_config(&self) -> AnalysisResult<DidConfig> {
        let grouping_field = self
            .grouping_field
            .clone()
            .ok_or_else(|| AnalysisError::invalid("DID analysis requires a grouping field"))?;
        let intervention_time = self
            .intervention_time
            .ok_or_else(|| AnalysisError::invalid("DID analysis requires an intervention time"))?;
        Ok(DidConfig::new(grouping_field, intervention_time))
    }

    pub fn flow_config(&self) -> AnalysisResult<FlowBucketConfig> {
        let primary = self
            .primary_counter
            .clone()
            .ok_or_else(|| AnalysisError::invalid("flow analysis requires a primary counter field"))?;
        let secondary = self
            .secondary_counter
            .clone()
            .ok_or_else(|| AnalysisError::invalid("flow analysis requires a secondary counter field"))?;
        let defaults = FlowBucketConfig::default();
        let config = FlowBucketConfig::new(
            primary,
            secondary,
            self.group_count.unwrap_or(defaults.group_count),
        );
        config.validate()?;
        Ok(config)
    }
}

/// 分析结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Regression(RegressionFit),
    Did(CausalGroupSummary),
    FlowBuckets(FlowBucketReport),
}

impl AnalysisOutcome {
    /// 人类可读的方程或描述
    pub fn description(&self) -> String {
        match self {
            AnalysisOutcome::Regression(fit) => fit.equation.clone(),
            AnalysisOutcome::Did(summary) => summary.description(),
            AnalysisOutcome::FlowBuckets(report) => format!(
                "{} samples in {} flow buckets ({} - {})",
                report.total_samples,
                report.group_count,
                report.flow_range.min,
                report.flow_range.max
            ),
        }
    }
}

/// 使用默认回归配置运行分析
pub fn run(dataset: &Dataset, kind: AnalysisKind, options: &AnalysisOptions) -> AnalysisResult<AnalysisOutcome> {
    run_with_defaults(dataset, kind, options, &RegressionConfig::default())
}

/// 运行分析；`base` 提供未在 options 中给出的回归参数
pub fn run_with_defaults(
    dataset: &Dataset,
    kind: AnalysisKind,
    options: &AnalysisOptions,
    base: &RegressionConfig,
) -> AnalysisResult<AnalysisOutcome> {
    tracing::debug!(kind = kind.as_str(), rows = dataset.len(), "running analysis");

    match kind {
        AnalysisKind::Did => {
            let config = options.did_config()?;
            estimate_did(dataset, &config).map(AnalysisOutcome::Did)
        }
        AnalysisKind::FlowBucket => {
            let config = options.flow_config()?;
            bucket_observations(&dataset.rows, &config).map(AnalysisOutcome::FlowBuckets)
        }
        _ => {
            let model = kind
                .model_kind()
                .ok_or_else(|| AnalysisError::invalid(format!("unsupported analysis {}", kind.as_str())))?;
            let config = options.regression_config(model, base);

            match options.bucket_id {
                Some(bucket_id) => {
                    let flow = options.flow_config()?;
                    let (rows, bucket) = select_bucket(&dataset.rows, &flow, bucket_id)?;
                    let mut fit = regression::analyze(&dataset.with_rows(rows), &config)?;
                    fit.bucket = Some(bucket);
                    Ok(AnalysisOutcome::Regression(fit))
                }
                None => regression::analyze(dataset, &config).map(AnalysisOutcome::Regression),
            }
        }
    }
}
