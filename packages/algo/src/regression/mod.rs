//! Regression Pipeline
//!
//! Conditions the dataset (complete rows, sequential IQR filtering over the
//! features and target), splits chronologically, fits the requested model on
//! the training partition and scores both partitions.
//!
//! - [`models`] - closed-form families (linear, ridge, polynomial, exponential,
//!   logarithmic, power) and the coordinate-descent elastic net / lasso
//! - [`metrics`] - R², MSE, scatter and residual series
//!
//! Neural fits go through [`crate::neural`] but are scored identically.

pub mod metrics;
pub mod models;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};
use crate::flow::BucketRange;
use crate::neural::{self, NeuralConfig, NeuralSummary};
use crate::sanitize::{is_constant, remove_outliers, split_index};
use crate::types::{
    CurvePoint, Dataset, DomainExclusion, FitMode, ModelKind, PartitionMetrics, Partitioning,
    ResidualPoint, ScatterPoint, MAX_POLYNOMIAL_DEGREE, MIN_FIT_ROWS, MIN_POLYNOMIAL_DEGREE,
};

pub use models::{ClosedFormFit, ClosedFormModel, ClosedFormOptions, ElasticNetConfig};

// ==================== Configuration ====================

/// 回归分析配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionConfig {
    pub kind: ModelKind,
    pub degree: u32,
    pub ridge_alpha: f64,
    /// Lasso 固定 l1_ratio = 1
    pub elastic_net: ElasticNetConfig,
    pub neural: NeuralConfig,
    pub partitioning: Partitioning,
    /// 训练集与测试集各自独立拟合
    pub separate_fit_per_partition: bool,
    pub remove_outliers: bool,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            kind: ModelKind::Linear,
            degree: 2,
            ridge_alpha: 1.0,
            elastic_net: ElasticNetConfig::default(),
            neural: NeuralConfig::default(),
            partitioning: Partitioning::default(),
            separate_fit_per_partition: false,
            remove_outliers: true,
        }
    }
}

impl RegressionConfig {
    pub fn for_kind(kind: ModelKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        if self.kind == ModelKind::Polynomial
            && !(MIN_POLYNOMIAL_DEGREE..=MAX_POLYNOMIAL_DEGREE).contains(&self.degree)
        {
            return Err(AnalysisError::invalid(format!(
                "polynomial degree must be between {MIN_POLYNOMIAL_DEGREE} and {MAX_POLYNOMIAL_DEGREE}, got {}",
                self.degree
            )));
        }
        if !self.ridge_alpha.is_finite() || self.ridge_alpha < 0.0 {
            return Err(AnalysisError::invalid("ridge alpha must be non-negative"));
        }
        if let Partitioning::Chronological { train_fraction } = self.partitioning {
            if !(train_fraction > 0.0 && train_fraction < 1.0) {
                return Err(AnalysisError::invalid(format!(
                    "train fraction must be in (0, 1), got {train_fraction}"
                )));
            }
        }
        if self.kind.is_elastic_net() {
            self.elastic_net.validate()?;
        }
        if self.kind == ModelKind::Neural {
            self.neural.validate()?;
        }
        Ok(())
    }

    fn fit_mode(&self) -> FitMode {
        if self.separate_fit_per_partition {
            FitMode::SeparatePerPartition
        } else {
            FitMode::SingleFit
        }
    }
}

// ==================== Results ====================

/// 模型参数：闭式系数或网络摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelParameters {
    ClosedForm(ClosedFormModel),
    Neural(NeuralSummary),
}

/// 回归分析结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionFit {
    pub kind: ModelKind,
    pub fit_mode: FitMode,
    pub features: Vec<String>,
    pub target: String,
    pub parameters: ModelParameters,
    /// Test-partition model when fitted separately.
    pub test_parameters: Option<ModelParameters>,
    pub equation: String,
    pub sample_count: usize,
    pub train_count: usize,
    pub test_count: usize,
    pub removed_outliers: usize,
    pub train: PartitionMetrics,
    pub test: Option<PartitionMetrics>,
    /// 与被评估行对齐（训练行在前、测试行在后）
    pub predictions: Vec<f64>,
    pub scatter: Vec<ScatterPoint>,
    pub residuals: Vec<ResidualPoint>,
    pub time_series: Option<Vec<CurvePoint>>,
    pub feature_importance: Option<BTreeMap<String, f64>>,
    pub domain_exclusion: Option<DomainExclusion>,
    pub bucket: Option<BucketRange>,
}

impl RegressionFit {
    pub fn r2_train(&self) -> Option<f64> {
        self.train.r2
    }

    pub fn r2_test(&self) -> Option<f64> {
        self.test.as_ref().and_then(|m| m.r2)
    }
}

// ==================== Pipeline ====================

/// 完整回归流程：清洗 → 划分 → 拟合 → 评估
pub fn analyze(dataset: &Dataset, config: &RegressionConfig) -> AnalysisResult<RegressionFit> {
    config.validate()?;
    dataset.validate_selection()?;

    let complete = dataset.complete_rows();
    let conditioned = if config.remove_outliers {
        remove_outliers(&complete, &dataset.selected_fields())
    } else {
        complete.clone()
    };
    let removed_outliers = complete.len() - conditioned.len();

    if conditioned.len() < MIN_FIT_ROWS {
        return Err(AnalysisError::insufficient(
            format!("{} regression", config.kind.as_str()),
            MIN_FIT_ROWS,
            conditioned.len(),
        ));
    }

    let (x, y) = dataset.to_xy(&conditioned);
    if is_constant(&y) {
        return Err(AnalysisError::DegenerateTarget {
            context: format!("target {}", dataset.target),
        });
    }

    let n = y.len();
    let split = match config.partitioning {
        Partitioning::Full => n,
        Partitioning::Chronological { train_fraction } => split_index(n, train_fraction),
    };
    if split == 0 {
        return Err(AnalysisError::insufficient("training partition", 1, 0));
    }
    if matches!(config.partitioning, Partitioning::Chronological { .. }) && split == n {
        return Err(AnalysisError::insufficient("test partition", 1, 0));
    }

    tracing::debug!(
        kind = config.kind.as_str(),
        rows = n,
        train = split,
        test = n - split,
        removed_outliers,
        "regression input conditioned"
    );

    let (x_train, x_test) = x.split_at(split);
    let (y_train, y_test) = y.split_at(split);

    let fitted = if config.kind == ModelKind::Neural {
        fit_neural(x_train, y_train, x_test, y_test, config)?
    } else {
        fit_closed(x_train, y_train, x_test, y_test, split, config)?
    };

    let train = metrics::partition_metrics(y_train, &fitted.train_predictions);
    let test = (!y_test.is_empty()).then(|| metrics::partition_metrics(y_test, &fitted.test_predictions));

    let (scatter, residuals) = if y_test.is_empty() {
        (
            metrics::scatter(y_train, &fitted.train_predictions),
            metrics::residuals(y_train, &fitted.train_predictions),
        )
    } else {
        (
            metrics::scatter(y_test, &fitted.test_predictions),
            metrics::residuals(y_test, &fitted.test_predictions),
        )
    };

    let mut predictions = fitted.train_predictions;
    predictions.extend(fitted.test_predictions);

    let time_series = (dataset.features.len() == 1).then(|| curve(&x, &y, &predictions));

    let feature_importance = fitted.importance.map(|values| {
        dataset
            .features
            .iter()
            .cloned()
            .zip(values)
            .collect::<BTreeMap<String, f64>>()
    });

    tracing::info!(
        kind = config.kind.as_str(),
        samples = n,
        r2_train = ?train.r2,
        r2_test = ?test.as_ref().and_then(|m| m.r2),
        "regression analysis complete"
    );

    let equation = match &fitted.parameters {
        ModelParameters::ClosedForm(model) => model.equation(&dataset.features, &dataset.target),
        ModelParameters::Neural(_) => fitted.description.clone().unwrap_or_default(),
    };

    Ok(RegressionFit {
        kind: config.kind,
        fit_mode: config.fit_mode(),
        features: dataset.features.clone(),
        target: dataset.target.clone(),
        parameters: fitted.parameters,
        test_parameters: fitted.test_parameters,
        equation,
        sample_count: n,
        train_count: split,
        test_count: n - split,
        removed_outliers,
        train,
        test,
        predictions,
        scatter,
        residuals,
        time_series,
        feature_importance,
        domain_exclusion: fitted.domain_exclusion,
        bucket: None,
    })
}

/// 单次拟合的中间结果
struct Fitted {
    parameters: ModelParameters,
    test_parameters: Option<ModelParameters>,
    description: Option<String>,
    train_predictions: Vec<f64>,
    test_predictions: Vec<f64>,
    importance: Option<Vec<f64>>,
    domain_exclusion: Option<DomainExclusion>,
}

fn fit_closed(
    x_train: &[Vec<f64>],
    y_train: &[f64],
    x_test: &[Vec<f64>],
    y_test: &[f64],
    split: usize,
    config: &RegressionConfig,
) -> AnalysisResult<Fitted> {
    let options = ClosedFormOptions {
        degree: config.degree,
        ridge_alpha: config.ridge_alpha,
        elastic_net: config.elastic_net,
    };
    let train_fit = models::fit_closed_form(config.kind, x_train, y_train, &options)?;
    let train_predictions = train_fit.model.predict_all(x_train);
    let mut excluded = train_fit.excluded_rows;

    let (test_parameters, test_predictions) = if config.separate_fit_per_partition && !x_test.is_empty() {
        let test_fit = models::fit_closed_form(config.kind, x_test, y_test, &options)?;
        excluded.extend(test_fit.excluded_rows.iter().map(|i| i + split));
        let predictions = test_fit.model.predict_all(x_test);
        (Some(ModelParameters::ClosedForm(test_fit.model)), predictions)
    } else {
        (None, train_fit.model.predict_all(x_test))
    };

    let domain_exclusion = train_fit.constraint.map(|constraint| DomainExclusion {
        constraint: constraint.to_string(),
        excluded_rows: excluded,
    });

    Ok(Fitted {
        importance: train_fit.model.coefficient_importance(),
        parameters: ModelParameters::ClosedForm(train_fit.model),
        test_parameters,
        description: None,
        train_predictions,
        test_predictions,
        domain_exclusion,
    })
}

fn fit_neural(
    x_train: &[Vec<f64>],
    y_train: &[f64],
    x_test: &[Vec<f64>],
    y_test: &[f64],
    config: &RegressionConfig,
) -> AnalysisResult<Fitted> {
    let network = neural::train(x_train, y_train, &config.neural)?;
    let train_predictions = network.predict_all(x_train);

    let (test_parameters, test_predictions) = if config.separate_fit_per_partition && !x_test.is_empty() {
        let test_network = neural::train(x_test, y_test, &config.neural)?;
        let predictions = test_network.predict_all(x_test);
        (Some(ModelParameters::Neural(test_network.summary())), predictions)
    } else {
        (None, network.predict_all(x_test))
    };

    // 无测试集时在训练行上评估重要性
    let importance_rows = if x_test.is_empty() { x_train } else { x_test };
    let importance = network.feature_importance(importance_rows, config.neural.importance_samples);

    Ok(Fitted {
        parameters: ModelParameters::Neural(network.summary()),
        test_parameters,
        description: Some(network.description()),
        train_predictions,
        test_predictions,
        importance: Some(importance),
        domain_exclusion: None,
    })
}

/// 单特征曲线：按 x 升序
fn curve(x: &[Vec<f64>], y: &[f64], predictions: &[f64]) -> Vec<CurvePoint> {
    let mut points: Vec<CurvePoint> = x
        .iter()
        .zip(y.iter().zip(predictions.iter()))
        .map(|(row, (&y_actual, &y_predicted))| CurvePoint {
            x: row[0],
            y_actual,
            y_predicted,
        })
        .collect();
    points.sort_by(|a, b| a.x.total_cmp(&b.x));
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Observation;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn dataset(points: &[(f64, f64)]) -> Dataset {
        let rows = points
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| {
                Observation::new(start() + Duration::minutes(i as i64))
                    .with_field("x", x)
                    .with_field("y", y)
            })
            .collect();
        Dataset::new(rows, vec!["x".to_string()], "y")
    }

    #[test]
    fn test_config_validation() {
        let mut config = RegressionConfig::for_kind(ModelKind::Polynomial);
        config.degree = 6;
        assert!(config.validate().is_err());
        config.degree = 0;
        assert!(config.validate().is_err());
        config.degree = 3;
        assert!(config.validate().is_ok());

        let mut config = RegressionConfig::default();
        config.partitioning = Partitioning::Chronological { train_fraction: 1.0 };
        assert!(config.validate().is_err());
        config.partitioning = Partitioning::Chronological { train_fraction: 0.5 };
        config.ridge_alpha = -0.1;
        assert!(config.validate().is_err());

        let mut config = RegressionConfig::for_kind(ModelKind::ElasticNet);
        config.elastic_net.l1_ratio = 1.2;
        assert!(config.validate().is_err());
        config.kind = ModelKind::Linear;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_counts_and_alignment() {
        let points: Vec<(f64, f64)> = (0..20).map(|i| (i as f64, 2.0 * i as f64 + 1.0)).collect();
        let fit = analyze(&dataset(&points), &RegressionConfig::default()).unwrap();
        assert_eq!(fit.sample_count, 20);
        assert_eq!(fit.train_count, 16);
        assert_eq!(fit.test_count, 4);
        assert_eq!(fit.predictions.len(), 20);
        assert_eq!(fit.scatter.len(), 4);
        assert_eq!(fit.residuals.len(), 4);
        assert_eq!(fit.fit_mode, FitMode::SingleFit);
        assert!(fit.r2_test().unwrap() > 0.999);
    }

    #[test]
    fn test_time_series_sorted_by_x() {
        let points: Vec<(f64, f64)> = (0..12)
            .map(|i| {
                let x = ((i * 7) % 12) as f64;
                (x, 3.0 * x - 2.0)
            })
            .collect();
        let config = RegressionConfig {
            partitioning: Partitioning::Full,
            ..Default::default()
        };
        let fit = analyze(&dataset(&points), &config).unwrap();
        let series = fit.time_series.unwrap();
        assert_eq!(series.len(), 12);
        assert!(series.windows(2).all(|w| w[0].x <= w[1].x));
        assert!(fit.test.is_none());
        assert_eq!(fit.scatter.len(), 12);
    }

    #[test]
    fn test_constant_target_is_degenerate() {
        let points: Vec<(f64, f64)> = (0..12).map(|i| (i as f64, 5.0)).collect();
        assert!(matches!(
            analyze(&dataset(&points), &RegressionConfig::default()),
            Err(AnalysisError::DegenerateTarget { .. })
        ));
    }

    #[test]
    fn test_constant_test_partition_has_no_r2() {
        // 后 20% 目标恒定
        let mut points: Vec<(f64, f64)> = (0..16).map(|i| (i as f64, i as f64)).collect();
        points.extend((16..20).map(|i| (i as f64, 15.0)));
        let config = RegressionConfig {
            remove_outliers: false,
            ..Default::default()
        };
        let fit = analyze(&dataset(&points), &config).unwrap();
        let test = fit.test.unwrap();
        assert_eq!(test.r2, None);
        assert!(test.mse > 0.0);
    }

    #[test]
    fn test_separate_fit_per_partition() {
        let mut points: Vec<(f64, f64)> = (0..16).map(|i| (i as f64, 2.0 * i as f64)).collect();
        points.extend((16..20).map(|i| (i as f64, -1.0 * i as f64 + 50.0)));
        let config = RegressionConfig {
            separate_fit_per_partition: true,
            remove_outliers: false,
            ..Default::default()
        };
        let fit = analyze(&dataset(&points), &config).unwrap();
        assert_eq!(fit.fit_mode, FitMode::SeparatePerPartition);
        assert!(fit.test_parameters.is_some());
        assert!(fit.r2_test().unwrap() > 0.999);

        let single = analyze(
            &dataset(&points),
            &RegressionConfig {
                remove_outliers: false,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(single.r2_test().unwrap() < 0.0);
    }

    #[test]
    fn test_exponential_exclusions_are_reported() {
        let mut points: Vec<(f64, f64)> = (0..20)
            .map(|i| (i as f64 * 0.1, (0.5 * i as f64 * 0.1).exp()))
            .collect();
        points[3].1 = -0.5;
        let config = RegressionConfig {
            kind: ModelKind::Exponential,
            remove_outliers: false,
            ..Default::default()
        };
        let fit = analyze(&dataset(&points), &config).unwrap();
        let exclusion = fit.domain_exclusion.unwrap();
        assert_eq!(exclusion.excluded_rows, vec![3]);
        assert_eq!(fit.predictions.len(), 20);
        assert!(fit.equation.contains("e^("));
    }

    #[test]
    fn test_linear_importance_present() {
        let points: Vec<(f64, f64)> = (0..15).map(|i| (i as f64, i as f64 * 0.5)).collect();
        let fit = analyze(&dataset(&points), &RegressionConfig::default()).unwrap();
        let importance = fit.feature_importance.unwrap();
        assert_eq!(importance.get("x"), Some(&1.0));
    }
}
