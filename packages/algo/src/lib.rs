//! # aquastat-algo - 水务传感数据分析算法库
//!
//! Pure Rust analysis engine for time-ordered sensor observations:
//!
//! - **Regression** - linear, ridge, polynomial, exponential, logarithmic and
//!   power fits via the normal equations, lasso / elastic net by coordinate
//!   descent, plus a small neural regressor
//! - **Causal Inference** - median-split difference-in-differences
//! - **Flow Bucketing** - sliding-window flow derivation and equal-width buckets
//!
//! Every analysis is a pure function of its inputs. Failures are reported as
//! [`AnalysisError`] values carrying an [`ErrorKind`] the host can map to its
//! own status codes.
//!
//! ## 模块结构
//!
//! - [`engine`] - 统一入口 (分析类别 → 配置 → 结果)
//! - [`regression`] - 回归流程、闭式模型、评估指标
//! - [`neural`] - 神经网络回归
//! - [`causal`] - 双重差分估计
//! - [`flow`] - 流量派生与分组
//! - [`matrix`] - 矩阵运算 (高斯消元、正规方程)
//! - [`sanitize`] - 数据清洗 (标准化、IQR 异常值、时间划分)
//! - [`types`] - 公共类型和常量
//!
//! ## 使用示例
//!
//! ```rust
//! use aquastat_algo::{run, AnalysisKind, AnalysisOptions, Dataset, Observation};
//! use chrono::{Duration, NaiveDate};
//!
//! let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
//! let rows = (0..20)
//!     .map(|i| {
//!         let x = i as f64;
//!         Observation::new(start + Duration::minutes(i))
//!             .with_field("pressure", x)
//!             .with_field("output", 2.0 * x + 1.0)
//!     })
//!     .collect();
//! let dataset = Dataset::new(rows, vec!["pressure".to_string()], "output");
//!
//! let outcome = run(&dataset, AnalysisKind::Linear, &AnalysisOptions::default()).unwrap();
//! println!("{}", outcome.description());
//! ```

// ============================================================================
// 模块声明
// ============================================================================

pub mod causal;
pub mod engine;
pub mod error;
pub mod flow;
pub mod matrix;
pub mod neural;
pub mod regression;
pub mod sanitize;
pub mod types;

// ============================================================================
// 重新导出
// ============================================================================

/// 重新导出所有公共类型
pub use types::*;

pub use error::{AnalysisError, AnalysisResult, ErrorKind};

/// 重新导出统一入口
pub use engine::{run, run_with_defaults, AnalysisKind, AnalysisOptions, AnalysisOutcome};

/// 重新导出回归模块
pub use regression::{
    analyze, ClosedFormModel, ElasticNetConfig, ModelParameters, RegressionConfig, RegressionFit,
};

pub use neural::{NeuralConfig, NeuralSummary, TrainedNetwork};

/// 重新导出因果推断模块
pub use causal::{estimate_did, CausalGroupSummary, DidConfig, DidGroup, DidPeriod, TrendPoint};

/// 重新导出流量分组模块
pub use flow::{
    bucket_observations, select_bucket, BucketRange, FlowBucket, FlowBucketConfig,
    FlowBucketReport,
};
