//! Closed-form regression models.
//!
//! Every model follows the same recipe: transform features and/or target,
//! build a design matrix, solve the normal equations, and invert the
//! transform when predicting in original units. Lasso and elastic net
//! replace the solve with cyclic coordinate descent on the same
//! standardized design.

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};
use crate::matrix::{solve_normal_equations, Matrix};
use crate::sanitize::{has_invalid_values, mean, standardize};
use crate::types::{
    ModelKind, DEFAULT_ELASTIC_NET_ALPHA, DEFAULT_L1_RATIO, ELASTIC_NET_MAX_ITERATIONS,
    ELASTIC_NET_TOLERANCE, MIN_TRANSFORM_ROWS,
};

/// 闭式回归模型参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClosedFormModel {
    Linear {
        intercept: f64,
        coefficients: Vec<f64>,
    },
    Ridge {
        alpha: f64,
        intercept: f64,
        coefficients: Vec<f64>,
    },
    /// l1_ratio = 1 即 Lasso
    ElasticNet {
        alpha: f64,
        l1_ratio: f64,
        intercept: f64,
        coefficients: Vec<f64>,
    },
    /// coefficients[0] 为截距，其后按特征依次为 x^1..x^d
    Polynomial {
        degree: u32,
        coefficients: Vec<f64>,
    },
    /// y = a · exp(Σ b_i·x_i)
    Exponential { a: f64, b: Vec<f64> },
    /// y = intercept + Σ c_i·ln(x_i)
    Logarithmic {
        intercept: f64,
        coefficients: Vec<f64>,
        fallback: f64,
    },
    /// y = a · Π x_i^b_i
    Power {
        a: f64,
        exponents: Vec<f64>,
        fallback: f64,
    },
}

/// 拟合结果 + 因定义域约束被排除的行
#[derive(Clone, Debug, PartialEq)]
pub struct ClosedFormFit {
    pub model: ClosedFormModel,
    pub excluded_rows: Vec<usize>,
    pub constraint: Option<&'static str>,
}

impl ClosedFormFit {
    fn unconstrained(model: ClosedFormModel) -> Self {
        Self {
            model,
            excluded_rows: Vec::new(),
            constraint: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClosedFormOptions {
    pub degree: u32,
    pub ridge_alpha: f64,
    pub elastic_net: ElasticNetConfig,
}

impl Default for ClosedFormOptions {
    fn default() -> Self {
        Self {
            degree: 2,
            ridge_alpha: 1.0,
            elastic_net: ElasticNetConfig::default(),
        }
    }
}

/// 弹性网络配置
///
/// 目标函数（标准化特征、目标按总体标准差缩放）：
/// (1/2n)·‖y - Zβ‖² + α·ρ·‖β‖₁ + (α(1-ρ)/2)·‖β‖²，其中 ρ 为 `l1_ratio`。
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElasticNetConfig {
    pub alpha: f64,
    /// 0 为纯岭回归，1 为 Lasso
    pub l1_ratio: f64,
    pub max_iterations: usize,
    /// 一轮坐标更新中最大系数变化的收敛阈值（相对目标标准差）
    pub tolerance: f64,
}

impl Default for ElasticNetConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ELASTIC_NET_ALPHA,
            l1_ratio: DEFAULT_L1_RATIO,
            max_iterations: ELASTIC_NET_MAX_ITERATIONS,
            tolerance: ELASTIC_NET_TOLERANCE,
        }
    }
}

impl ElasticNetConfig {
    pub fn lasso(alpha: f64) -> Self {
        Self {
            alpha,
            l1_ratio: 1.0,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        if !self.alpha.is_finite() || self.alpha < 0.0 {
            return Err(AnalysisError::invalid(format!(
                "elastic net alpha must be a non-negative number, got {}",
                self.alpha
            )));
        }
        if !(0.0..=1.0).contains(&self.l1_ratio) {
            return Err(AnalysisError::invalid(format!(
                "l1_ratio must be between 0 and 1, got {}",
                self.l1_ratio
            )));
        }
        if self.max_iterations == 0 {
            return Err(AnalysisError::invalid("max_iterations must be at least 1"));
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(AnalysisError::invalid("elastic net tolerance must be positive"));
        }
        Ok(())
    }
}

const EXPONENTIAL_CONSTRAINT: &str = "exponential fit requires target > 0";
const LOGARITHMIC_CONSTRAINT: &str = "logarithmic fit requires all features > 0";
const POWER_CONSTRAINT: &str = "power fit requires target > 0 and all features > 0";

/// 按模型类别分派拟合
pub fn fit_closed_form(
    kind: ModelKind,
    x: &[Vec<f64>],
    y: &[f64],
    options: &ClosedFormOptions,
) -> AnalysisResult<ClosedFormFit> {
    match kind {
        ModelKind::Linear => fit_linear(x, y).map(ClosedFormFit::unconstrained),
        ModelKind::Ridge => fit_ridge(x, y, options.ridge_alpha).map(ClosedFormFit::unconstrained),
        ModelKind::Lasso => fit_elastic_net(x, y, &ElasticNetConfig {
            l1_ratio: 1.0,
            ..options.elastic_net
        })
        .map(ClosedFormFit::unconstrained),
        ModelKind::ElasticNet => {
            fit_elastic_net(x, y, &options.elastic_net).map(ClosedFormFit::unconstrained)
        }
        ModelKind::Polynomial => {
            fit_polynomial(x, y, options.degree).map(ClosedFormFit::unconstrained)
        }
        ModelKind::Exponential => fit_exponential(x, y),
        ModelKind::Logarithmic => fit_logarithmic(x, y),
        ModelKind::Power => fit_power(x, y),
        ModelKind::Neural => Err(AnalysisError::invalid(
            "neural models are not closed-form",
        )),
    }
}

/// 线性回归：标准化特征 + 中心化目标，解正规方程后反标准化
pub fn fit_linear(x: &[Vec<f64>], y: &[f64]) -> AnalysisResult<ClosedFormModel> {
    let (intercept, coefficients) = fit_standardized(x, y, 0.0, "linear fit")?;
    Ok(ClosedFormModel::Linear {
        intercept,
        coefficients,
    })
}

/// 岭回归：(XᵀX + αnI)β = Xᵀy，标准化空间内求解
pub fn fit_ridge(x: &[Vec<f64>], y: &[f64], alpha: f64) -> AnalysisResult<ClosedFormModel> {
    if !alpha.is_finite() || alpha < 0.0 {
        return Err(AnalysisError::invalid(format!(
            "ridge alpha must be a non-negative number, got {alpha}"
        )));
    }
    let penalty = alpha * x.len() as f64;
    let (intercept, coefficients) = fit_standardized(x, y, penalty, "ridge fit")?;
    Ok(ClosedFormModel::Ridge {
        alpha,
        intercept,
        coefficients,
    })
}

fn fit_standardized(
    x: &[Vec<f64>],
    y: &[f64],
    penalty: f64,
    context: &str,
) -> AnalysisResult<(f64, Vec<f64>)> {
    let m = check_inputs(x, y)?;
    require_rows(context, x.len(), m + 1)?;

    let s = standardize(x);
    let y_mean = mean(y);
    let y_centered: Vec<f64> = y.iter().map(|v| v - y_mean).collect();

    let design = Matrix::from_rows(&s.data)?;
    let beta = solve_normal_equations(&design, &y_centered, penalty)?;

    let coefficients: Vec<f64> = beta.iter().zip(s.std.iter()).map(|(b, sd)| b / sd).collect();
    let intercept = y_mean
        - coefficients
            .iter()
            .zip(s.mean.iter())
            .map(|(c, m)| c * m)
            .sum::<f64>();

    Ok((intercept, coefficients))
}

/// 弹性网络：标准化特征上的循环坐标下降，再按线性回归的方式反标准化
///
/// 收缩阈值按目标的总体标准差缩放，等价于在标准化目标上求解后还原单位；
/// 因此 l1_ratio = 0 时与 [`fit_ridge`] 的解一致。
pub fn fit_elastic_net(
    x: &[Vec<f64>],
    y: &[f64],
    config: &ElasticNetConfig,
) -> AnalysisResult<ClosedFormModel> {
    config.validate()?;
    let m = check_inputs(x, y)?;
    require_rows("elastic net fit", x.len(), m + 1)?;

    let n = x.len() as f64;
    let s = standardize(x);
    let y_mean = mean(y);
    let mut residual: Vec<f64> = y.iter().map(|v| v - y_mean).collect();
    let y_scale = (residual.iter().map(|r| r * r).sum::<f64>() / n).sqrt();

    let l1_penalty = config.alpha * config.l1_ratio * y_scale;
    let l2_penalty = config.alpha * (1.0 - config.l1_ratio);
    let column_norms: Vec<f64> = (0..m)
        .map(|j| s.data.iter().map(|r| r[j] * r[j]).sum::<f64>() / n)
        .collect();
    let tolerance = config.tolerance * y_scale.max(f64::MIN_POSITIVE);

    let mut beta = vec![0.0; m];
    let mut iterations = 0;
    let mut converged = false;
    while iterations < config.max_iterations {
        iterations += 1;
        let mut max_change = 0.0_f64;
        for j in 0..m {
            let denominator = column_norms[j] + l2_penalty;
            let rho = s.data.iter().zip(&residual).map(|(r, e)| r[j] * e).sum::<f64>() / n
                + column_norms[j] * beta[j];
            let updated = if denominator > 0.0 {
                soft_threshold(rho, l1_penalty) / denominator
            } else {
                0.0
            };
            let delta = updated - beta[j];
            if delta != 0.0 {
                for (r, e) in s.data.iter().zip(residual.iter_mut()) {
                    *e -= r[j] * delta;
                }
                beta[j] = updated;
                max_change = max_change.max(delta.abs());
            }
        }
        if max_change <= tolerance {
            converged = true;
            break;
        }
    }

    if converged {
        tracing::debug!(iterations, "elastic net converged");
    } else {
        tracing::warn!(
            max_iterations = config.max_iterations,
            "elastic net did not converge, returning last iterate"
        );
    }

    let coefficients: Vec<f64> = beta.iter().zip(s.std.iter()).map(|(b, sd)| b / sd).collect();
    let intercept = y_mean
        - coefficients
            .iter()
            .zip(s.mean.iter())
            .map(|(c, m)| c * m)
            .sum::<f64>();

    Ok(ClosedFormModel::ElasticNet {
        alpha: config.alpha,
        l1_ratio: config.l1_ratio,
        intercept,
        coefficients,
    })
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

/// 多项式特征行 [1, x1..x1^d, x2..x2^d, ...]
pub fn polynomial_features(row: &[f64], degree: u32) -> Vec<f64> {
    let mut features = Vec::with_capacity(1 + row.len() * degree as usize);
    features.push(1.0);
    for &v in row {
        for d in 1..=degree {
            features.push(v.powi(d as i32));
        }
    }
    features
}

/// 多项式回归（原始系数，截距位于下标 0）
///
/// 在标准化特征 z = (x - μ)/σ 上求解，再按二项式展开还原为 x 的幂次系数。
pub fn fit_polynomial(x: &[Vec<f64>], y: &[f64], degree: u32) -> AnalysisResult<ClosedFormModel> {
    if degree == 0 {
        return Err(AnalysisError::invalid("polynomial degree must be at least 1"));
    }
    let m = check_inputs(x, y)?;
    require_rows("polynomial fit", x.len(), 1 + m * degree as usize)?;

    let s = standardize(x);
    let rows: Vec<Vec<f64>> = s.data.iter().map(|r| polynomial_features(r, degree)).collect();
    let design = Matrix::from_rows(&rows)?;
    let z_coefficients = solve_normal_equations(&design, y, 0.0)?;

    Ok(ClosedFormModel::Polynomial {
        degree,
        coefficients: unstandardize_polynomial(&z_coefficients, &s.mean, &s.std, degree),
    })
}

/// c·((x - μ)/σ)^d = (c/σ^d)·Σ_k C(d,k)·(-μ)^(d-k)·x^k
fn unstandardize_polynomial(z_coefficients: &[f64], mean: &[f64], std: &[f64], degree: u32) -> Vec<f64> {
    let degree = degree as usize;
    let mut raw = vec![0.0; z_coefficients.len()];
    raw[0] = z_coefficients[0];
    for (j, (mu, sigma)) in mean.iter().zip(std.iter()).enumerate() {
        let base = 1 + j * degree;
        for d in 1..=degree {
            let scaled = z_coefficients[base + d - 1] / sigma.powi(d as i32);
            for k in 0..=d {
                let term = scaled * binomial(d, k) * (-mu).powi((d - k) as i32);
                if k == 0 {
                    raw[0] += term;
                } else {
                    raw[base + k - 1] += term;
                }
            }
        }
    }
    raw
}

fn binomial(n: usize, k: usize) -> f64 {
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

/// 指数回归：ln(y) = ln(a) + Σ b_i·x_i，仅使用 y > 0 的行
pub fn fit_exponential(x: &[Vec<f64>], y: &[f64]) -> AnalysisResult<ClosedFormFit> {
    let m = check_inputs(x, y)?;
    let (valid, excluded): (Vec<usize>, Vec<usize>) = (0..x.len()).partition(|&i| y[i] > 0.0);
    require_domain_rows(EXPONENTIAL_CONSTRAINT, valid.len(), m + 1)?;

    let rows: Vec<Vec<f64>> = valid.iter().map(|&i| with_intercept(&x[i])).collect();
    let ln_y: Vec<f64> = valid.iter().map(|&i| y[i].ln()).collect();
    let beta = solve_normal_equations(&Matrix::from_rows(&rows)?, &ln_y, 0.0)?;

    log_exclusions(EXPONENTIAL_CONSTRAINT, &excluded);
    Ok(ClosedFormFit {
        model: ClosedFormModel::Exponential {
            a: beta[0].exp(),
            b: beta[1..].to_vec(),
        },
        excluded_rows: excluded,
        constraint: Some(EXPONENTIAL_CONSTRAINT),
    })
}

/// 对数回归：y = c0 + Σ c_i·ln(x_i)，仅使用所有特征 > 0 的行
pub fn fit_logarithmic(x: &[Vec<f64>], y: &[f64]) -> AnalysisResult<ClosedFormFit> {
    let m = check_inputs(x, y)?;
    let (valid, excluded): (Vec<usize>, Vec<usize>) =
        (0..x.len()).partition(|&i| x[i].iter().all(|&v| v > 0.0));
    require_domain_rows(LOGARITHMIC_CONSTRAINT, valid.len(), m + 1)?;

    let rows: Vec<Vec<f64>> = valid.iter().map(|&i| with_intercept(&ln_row(&x[i]))).collect();
    let y_valid: Vec<f64> = valid.iter().map(|&i| y[i]).collect();
    let beta = solve_normal_equations(&Matrix::from_rows(&rows)?, &y_valid, 0.0)?;

    log_exclusions(LOGARITHMIC_CONSTRAINT, &excluded);
    Ok(ClosedFormFit {
        model: ClosedFormModel::Logarithmic {
            intercept: beta[0],
            coefficients: beta[1..].to_vec(),
            fallback: mean(&y_valid),
        },
        excluded_rows: excluded,
        constraint: Some(LOGARITHMIC_CONSTRAINT),
    })
}

/// 幂函数回归：ln(y) = ln(a) + Σ b_i·ln(x_i)
pub fn fit_power(x: &[Vec<f64>], y: &[f64]) -> AnalysisResult<ClosedFormFit> {
    let m = check_inputs(x, y)?;
    let (valid, excluded): (Vec<usize>, Vec<usize>) =
        (0..x.len()).partition(|&i| y[i] > 0.0 && x[i].iter().all(|&v| v > 0.0));
    require_domain_rows(POWER_CONSTRAINT, valid.len(), m + 1)?;

    let rows: Vec<Vec<f64>> = valid.iter().map(|&i| with_intercept(&ln_row(&x[i]))).collect();
    let ln_y: Vec<f64> = valid.iter().map(|&i| y[i].ln()).collect();
    let beta = solve_normal_equations(&Matrix::from_rows(&rows)?, &ln_y, 0.0)?;
    let y_valid: Vec<f64> = valid.iter().map(|&i| y[i]).collect();

    log_exclusions(POWER_CONSTRAINT, &excluded);
    Ok(ClosedFormFit {
        model: ClosedFormModel::Power {
            a: beta[0].exp(),
            exponents: beta[1..].to_vec(),
            fallback: mean(&y_valid),
        },
        excluded_rows: excluded,
        constraint: Some(POWER_CONSTRAINT),
    })
}

impl ClosedFormModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            ClosedFormModel::Linear { .. } => ModelKind::Linear,
            ClosedFormModel::Ridge { .. } => ModelKind::Ridge,
            ClosedFormModel::ElasticNet { l1_ratio, .. } => {
                if *l1_ratio >= 1.0 {
                    ModelKind::Lasso
                } else {
                    ModelKind::ElasticNet
                }
            }
            ClosedFormModel::Polynomial { .. } => ModelKind::Polynomial,
            ClosedFormModel::Exponential { .. } => ModelKind::Exponential,
            ClosedFormModel::Logarithmic { .. } => ModelKind::Logarithmic,
            ClosedFormModel::Power { .. } => ModelKind::Power,
        }
    }

    /// 原始单位下的预测值
    pub fn predict(&self, row: &[f64]) -> f64 {
        match self {
            ClosedFormModel::Linear {
                intercept,
                coefficients,
            }
            | ClosedFormModel::Ridge {
                intercept,
                coefficients,
                ..
            }
            | ClosedFormModel::ElasticNet {
                intercept,
                coefficients,
                ..
            } => intercept + dot(coefficients, row),
            ClosedFormModel::Polynomial {
                degree,
                coefficients,
            } => dot(coefficients, &polynomial_features(row, *degree)),
            ClosedFormModel::Exponential { a, b } => a * dot(b, row).exp(),
            ClosedFormModel::Logarithmic {
                intercept,
                coefficients,
                fallback,
            } => {
                if row.iter().all(|&v| v > 0.0) {
                    intercept + dot(coefficients, &ln_row(row))
                } else {
                    *fallback
                }
            }
            ClosedFormModel::Power {
                a,
                exponents,
                fallback,
            } => {
                if row.iter().all(|&v| v > 0.0) {
                    a * row
                        .iter()
                        .zip(exponents.iter())
                        .map(|(x, b)| x.powf(*b))
                        .product::<f64>()
                } else {
                    *fallback
                }
            }
        }
    }

    pub fn predict_all(&self, x: &[Vec<f64>]) -> Vec<f64> {
        x.iter().map(|row| self.predict(row)).collect()
    }

    /// 系数绝对值占比（仅线性族）
    pub fn coefficient_importance(&self) -> Option<Vec<f64>> {
        match self {
            ClosedFormModel::Linear { coefficients, .. }
            | ClosedFormModel::Ridge { coefficients, .. }
            | ClosedFormModel::ElasticNet { coefficients, .. } => {
                let total: f64 = coefficients.iter().map(|c| c.abs()).sum();
                if total > 0.0 {
                    Some(coefficients.iter().map(|c| c.abs() / total).collect())
                } else {
                    Some(vec![0.0; coefficients.len()])
                }
            }
            _ => None,
        }
    }

    /// 以原始单位描述的方程
    pub fn equation(&self, features: &[String], target: &str) -> String {
        match self {
            ClosedFormModel::Linear {
                intercept,
                coefficients,
            } => linear_equation(target, features, coefficients, *intercept),
            ClosedFormModel::Ridge {
                alpha,
                intercept,
                coefficients,
            } => format!(
                "{} (α = {alpha:.4})",
                linear_equation(target, features, coefficients, *intercept)
            ),
            ClosedFormModel::ElasticNet {
                alpha,
                l1_ratio,
                intercept,
                coefficients,
            } => format!(
                "{} (α = {alpha:.4}, l1_ratio = {l1_ratio:.2})",
                linear_equation(target, features, coefficients, *intercept)
            ),
            ClosedFormModel::Polynomial {
                degree,
                coefficients,
            } => {
                let mut equation = format!("{target} = {:.4}", coefficients[0]);
                let mut idx = 1;
                for field in features {
                    for d in 1..=*degree {
                        let term = if d == 1 {
                            field.clone()
                        } else {
                            format!("{field}^{d}")
                        };
                        equation.push_str(&format!("{}·{term}", signed(coefficients[idx])));
                        idx += 1;
                    }
                }
                equation
            }
            ClosedFormModel::Exponential { a, b } => {
                let exponent = b
                    .iter()
                    .zip(features.iter())
                    .enumerate()
                    .map(|(i, (c, f))| {
                        if i == 0 {
                            format!("{c:.4}·{f}")
                        } else {
                            format!("{}·{f}", signed(*c))
                        }
                    })
                    .collect::<String>();
                format!("{target} = {a:.4} · e^({exponent})")
            }
            ClosedFormModel::Logarithmic {
                intercept,
                coefficients,
                ..
            } => {
                let mut equation = format!("{target} = {intercept:.4}");
                for (c, f) in coefficients.iter().zip(features.iter()) {
                    equation.push_str(&format!("{}·ln({f})", signed(*c)));
                }
                equation
            }
            ClosedFormModel::Power { a, exponents, .. } => {
                let mut equation = format!("{target} = {a:.4}");
                for (b, f) in exponents.iter().zip(features.iter()) {
                    equation.push_str(&format!(" · {f}^{b:.4}"));
                }
                equation
            }
        }
    }
}

// ==================== Helpers ====================

fn linear_equation(target: &str, features: &[String], coefficients: &[f64], intercept: f64) -> String {
    let mut equation = format!("{target} =");
    for (i, (c, f)) in coefficients.iter().zip(features.iter()).enumerate() {
        if i == 0 {
            equation.push_str(&format!(" {c:.4} × {f}"));
        } else {
            equation.push_str(&format!("{} × {f}", signed(*c)));
        }
    }
    equation.push_str(&signed(intercept));
    equation
}

/// " + 1.2345" / " - 1.2345"
fn signed(value: f64) -> String {
    if value < 0.0 {
        format!(" - {:.4}", value.abs())
    } else {
        format!(" + {value:.4}")
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn with_intercept(row: &[f64]) -> Vec<f64> {
    let mut result = Vec::with_capacity(row.len() + 1);
    result.push(1.0);
    result.extend_from_slice(row);
    result
}

fn ln_row(row: &[f64]) -> Vec<f64> {
    row.iter().map(|v| v.ln()).collect()
}

/// 校验输入形状，返回特征数
fn check_inputs(x: &[Vec<f64>], y: &[f64]) -> AnalysisResult<usize> {
    if x.len() != y.len() {
        return Err(AnalysisError::invalid(format!(
            "feature rows ({}) and target values ({}) differ in length",
            x.len(),
            y.len()
        )));
    }
    let m = x.first().map(|r| r.len()).unwrap_or(0);
    if x.is_empty() || m == 0 {
        return Err(AnalysisError::invalid("at least one feature column is required"));
    }
    if x.iter().any(|r| r.len() != m) {
        return Err(AnalysisError::invalid("feature rows have inconsistent widths"));
    }
    if has_invalid_values(y) || x.iter().any(|r| has_invalid_values(r)) {
        return Err(AnalysisError::invalid("fit inputs contain non-finite values"));
    }
    Ok(m)
}

fn require_rows(context: &str, actual: usize, required: usize) -> AnalysisResult<()> {
    if actual < required {
        return Err(AnalysisError::insufficient(context, required, actual));
    }
    Ok(())
}

fn require_domain_rows(constraint: &str, remaining: usize, params: usize) -> AnalysisResult<()> {
    let required = params.max(MIN_TRANSFORM_ROWS);
    if remaining < required {
        return Err(AnalysisError::TransformDomain {
            constraint: constraint.to_string(),
            remaining,
            required,
        });
    }
    Ok(())
}

fn log_exclusions(constraint: &str, excluded: &[usize]) {
    if !excluded.is_empty() {
        tracing::debug!(constraint, excluded = excluded.len(), "rows excluded from fit");
    }
}
