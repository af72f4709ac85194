//! Goodness-of-fit metrics in original target units.

use crate::sanitize::mean;
use crate::types::{PartitionMetrics, ResidualPoint, ScatterPoint};

/// R² = 1 - SS_res / SS_tot；SS_tot 为 0 时无定义
pub fn r_squared(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    if actual.is_empty() {
        return None;
    }
    let y_mean = mean(actual);
    let ss_tot: f64 = actual.iter().map(|y| (y - y_mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return None;
    }
    let ss_res: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(y, p)| (y - p).powi(2))
        .sum();
    Some(1.0 - ss_res / ss_tot)
}

/// 均方误差
pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    actual
        .iter()
        .zip(predicted.iter())
        .map(|(y, p)| (y - p).powi(2))
        .sum::<f64>()
        / actual.len() as f64
}

pub fn partition_metrics(actual: &[f64], predicted: &[f64]) -> PartitionMetrics {
    let r2 = r_squared(actual, predicted);
    if r2.is_none() && !actual.is_empty() {
        tracing::warn!(rows = actual.len(), "R² undefined: partition target is constant");
    }
    PartitionMetrics {
        count: actual.len(),
        r2,
        mse: mean_squared_error(actual, predicted),
    }
}

pub fn scatter(actual: &[f64], predicted: &[f64]) -> Vec<ScatterPoint> {
    actual
        .iter()
        .zip(predicted.iter())
        .map(|(&actual, &predicted)| ScatterPoint { actual, predicted })
        .collect()
}

/// residual = actual - predicted
pub fn residuals(actual: &[f64], predicted: &[f64]) -> Vec<ResidualPoint> {
    actual
        .iter()
        .zip(predicted.iter())
        .map(|(&actual, &predicted)| ResidualPoint {
            predicted,
            residual: actual - predicted,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_r_squared_perfect_fit() {
        let y = [1.0, 2.0, 3.0];
        assert_eq!(r_squared(&y, &y), Some(1.0));
    }

    #[test]
    fn test_r_squared_mean_predictor_is_zero() {
        let y = [1.0, 2.0, 3.0];
        let r2 = r_squared(&y, &[2.0, 2.0, 2.0]).unwrap();
        assert!(r2.abs() < 1e-12);
    }

    #[test]
    fn test_r_squared_constant_target_is_undefined() {
        assert_eq!(r_squared(&[4.0, 4.0, 4.0], &[4.0, 3.0, 5.0]), None);
        assert_eq!(r_squared(&[], &[]), None);
    }

    #[test]
    fn test_mse() {
        let mse = mean_squared_error(&[1.0, 2.0, 3.0], &[1.0, 3.0, 5.0]);
        assert!((mse - 5.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_residual_sign() {
        let points = residuals(&[5.0], &[3.0]);
        assert_eq!(points[0].residual, 2.0);
        assert_eq!(points[0].predicted, 3.0);
    }
}
