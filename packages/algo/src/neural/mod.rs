//! Neural Regression
//!
//! A small fully-connected network (tanh hidden layers, linear output) trained
//! with online per-sample gradient descent. Inputs and target are standardized
//! with training statistics; every reported value is in original units.
//!
//! Training is reproducible: weights are initialised from a `ChaCha8Rng`
//! seeded by [`NeuralConfig::seed`], and the per-epoch sample order is drawn
//! from the same generator.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};
use crate::sanitize::{has_invalid_values, mean, standardize};
use crate::types::IMPORTANCE_SAMPLE_LIMIT;

// ==================== Configuration ====================

/// 神经网络训练配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeuralConfig {
    pub hidden_layers: Vec<usize>,
    pub learning_rate: f64,
    /// 最大训练轮数
    pub max_iterations: usize,
    /// 相邻两轮平均误差变化小于该值时提前停止
    pub error_threshold: f64,
    pub importance_samples: usize,
    pub seed: u64,
}

impl Default for NeuralConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![100, 50],
            learning_rate: 0.01,
            max_iterations: 1000,
            error_threshold: 1e-5,
            importance_samples: IMPORTANCE_SAMPLE_LIMIT,
            seed: 42,
        }
    }
}

impl NeuralConfig {
    pub fn validate(&self) -> AnalysisResult<()> {
        if self.hidden_layers.is_empty() {
            return Err(AnalysisError::invalid("at least one hidden layer is required"));
        }
        if self.hidden_layers.iter().any(|&w| w == 0) {
            return Err(AnalysisError::invalid("hidden layer widths must be at least 1"));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(AnalysisError::invalid("learning rate must be positive"));
        }
        if self.max_iterations == 0 {
            return Err(AnalysisError::invalid("max_iterations must be at least 1"));
        }
        if !self.error_threshold.is_finite() || self.error_threshold < 0.0 {
            return Err(AnalysisError::invalid("error threshold must be non-negative"));
        }
        Ok(())
    }
}

/// 训练结果摘要（用于序列化输出）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuralSummary {
    pub layers: Vec<usize>,
    pub iterations: usize,
    pub converged: bool,
    pub final_error: f64,
}

// ==================== Network ====================

#[derive(Debug, Clone)]
struct Layer {
    inputs: usize,
    outputs: usize,
    /// outputs × inputs，行优先
    weights: Vec<f64>,
    biases: Vec<f64>,
}

impl Layer {
    /// Xavier 均匀初始化
    fn new(inputs: usize, outputs: usize, rng: &mut ChaCha8Rng) -> Self {
        let limit = (6.0 / (inputs + outputs) as f64).sqrt();
        let weights = (0..inputs * outputs)
            .map(|_| rng.gen_range(-limit..limit))
            .collect();
        Self {
            inputs,
            outputs,
            weights,
            biases: vec![0.0; outputs],
        }
    }

    fn forward(&self, input: &[f64], activate: bool) -> Vec<f64> {
        (0..self.outputs)
            .map(|j| {
                let row = &self.weights[j * self.inputs..(j + 1) * self.inputs];
                let z = self.biases[j] + row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>();
                if activate {
                    z.tanh()
                } else {
                    z
                }
            })
            .collect()
    }
}

/// 训练完成的网络（单次拟合内拥有）
#[derive(Debug, Clone)]
pub struct TrainedNetwork {
    layers: Vec<Layer>,
    x_mean: Vec<f64>,
    x_std: Vec<f64>,
    y_mean: f64,
    y_std: f64,
    iterations: usize,
    converged: bool,
    final_error: f64,
}

/// 在训练集上训练网络
pub fn train(x: &[Vec<f64>], y: &[f64], config: &NeuralConfig) -> AnalysisResult<TrainedNetwork> {
    config.validate()?;
    if x.len() != y.len() {
        return Err(AnalysisError::invalid(format!(
            "feature rows ({}) and target values ({}) differ in length",
            x.len(),
            y.len()
        )));
    }
    if x.is_empty() {
        return Err(AnalysisError::insufficient("neural training", 1, 0));
    }
    let n_features = x[0].len();
    if n_features == 0 || x.iter().any(|r| r.len() != n_features) {
        return Err(AnalysisError::invalid("feature rows must share a non-zero width"));
    }
    if has_invalid_values(y) || x.iter().any(|r| has_invalid_values(r)) {
        return Err(AnalysisError::invalid("training inputs contain non-finite values"));
    }

    let x_stats = standardize(x);
    let y_mean = mean(y);
    let y_std = {
        let var = y.iter().map(|v| (v - y_mean).powi(2)).sum::<f64>() / y.len() as f64;
        let sd = var.sqrt();
        if sd == 0.0 {
            1.0
        } else {
            sd
        }
    };
    let targets: Vec<f64> = y.iter().map(|v| (v - y_mean) / y_std).collect();

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut sizes = Vec::with_capacity(config.hidden_layers.len() + 2);
    sizes.push(n_features);
    sizes.extend_from_slice(&config.hidden_layers);
    sizes.push(1);
    let layers = sizes
        .windows(2)
        .map(|w| Layer::new(w[0], w[1], &mut rng))
        .collect();

    let mut network = TrainedNetwork {
        layers,
        x_mean: x_stats.mean,
        x_std: x_stats.std,
        y_mean,
        y_std,
        iterations: 0,
        converged: false,
        final_error: f64::INFINITY,
    };

    let mut order: Vec<usize> = (0..x.len()).collect();
    let mut previous_error = f64::INFINITY;

    for epoch in 0..config.max_iterations {
        order.shuffle(&mut rng);
        let mut total_error = 0.0;
        for &i in &order {
            total_error += network.backpropagate(&x_stats.data[i], targets[i], config.learning_rate);
        }
        let epoch_error = total_error / x.len() as f64;
        network.iterations = epoch + 1;
        network.final_error = epoch_error;

        if !epoch_error.is_finite() {
            tracing::warn!(epoch, "neural training diverged, stopping early");
            break;
        }
        if (previous_error - epoch_error).abs() < config.error_threshold {
            network.converged = true;
            tracing::debug!(epoch, error = epoch_error, "neural training converged");
            break;
        }
        previous_error = epoch_error;
    }

    if !network.converged {
        tracing::warn!(
            iterations = network.iterations,
            error = network.final_error,
            "neural training stopped at the iteration cap without converging"
        );
    }

    Ok(network)
}

impl TrainedNetwork {
    /// 各层激活值（含输入层），输入为标准化空间
    fn activations(&self, input: &[f64]) -> Vec<Vec<f64>> {
        let mut acts = Vec::with_capacity(self.layers.len() + 1);
        acts.push(input.to_vec());
        let last = self.layers.len() - 1;
        for (li, layer) in self.layers.iter().enumerate() {
            let next = layer.forward(&acts[li], li != last);
            acts.push(next);
        }
        acts
    }

    /// 标准化空间的网络输出
    fn output(&self, input: &[f64]) -> f64 {
        let last = self.layers.len() - 1;
        let mut current = input.to_vec();
        for (li, layer) in self.layers.iter().enumerate() {
            current = layer.forward(&current, li != last);
        }
        current[0]
    }

    /// 单样本反向传播，返回更新前的平方误差
    fn backpropagate(&mut self, input: &[f64], target: f64, learning_rate: f64) -> f64 {
        let acts = self.activations(input);
        let error = acts[self.layers.len()][0] - target;
        let mut delta = vec![error];

        for li in (0..self.layers.len()).rev() {
            let layer_input = &acts[li];
            let layer = &mut self.layers[li];

            // tanh'(z) = 1 - a²
            let previous_delta: Vec<f64> = if li > 0 {
                (0..layer.inputs)
                    .map(|i| {
                        let back: f64 = (0..layer.outputs)
                            .map(|j| layer.weights[j * layer.inputs + i] * delta[j])
                            .sum();
                        back * (1.0 - layer_input[i] * layer_input[i])
                    })
                    .collect()
            } else {
                Vec::new()
            };

            for j in 0..layer.outputs {
                let step = learning_rate * delta[j];
                for i in 0..layer.inputs {
                    layer.weights[j * layer.inputs + i] -= step * layer_input[i];
                }
                layer.biases[j] -= step;
            }

            delta = previous_delta;
        }

        error * error
    }

    fn standardize_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.x_mean.iter().zip(self.x_std.iter()))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }

    /// 原始单位下的预测值
    pub fn predict(&self, row: &[f64]) -> f64 {
        self.output(&self.standardize_row(row)) * self.y_std + self.y_mean
    }

    pub fn predict_all(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|r| self.predict(r)).collect()
    }

    /// 扰动重要性：逐个特征置零（标准化空间），统计输出的平均绝对变化，归一化为和 1
    pub fn feature_importance(&self, rows: &[Vec<f64>], sample_limit: usize) -> Vec<f64> {
        let n_features = self.x_mean.len();
        let sample: Vec<Vec<f64>> = rows
            .iter()
            .take(sample_limit)
            .map(|r| self.standardize_row(r))
            .collect();
        if sample.is_empty() {
            return vec![0.0; n_features];
        }

        let baseline: Vec<f64> = sample.iter().map(|r| self.output(r)).collect();
        let raw: Vec<f64> = (0..n_features)
            .into_par_iter()
            .map(|feature| {
                let total: f64 = sample
                    .iter()
                    .zip(baseline.iter())
                    .map(|(row, base)| {
                        let mut perturbed = row.clone();
                        perturbed[feature] = 0.0;
                        (base - self.output(&perturbed)).abs()
                    })
                    .sum();
                total / sample.len() as f64
            })
            .collect();

        let total: f64 = raw.iter().sum();
        if total > 0.0 && total.is_finite() {
            raw.iter().map(|v| v / total).collect()
        } else {
            vec![0.0; n_features]
        }
    }

    /// 各层宽度 [输入, 隐藏..., 1]
    pub fn layer_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![self.x_mean.len()];
        sizes.extend(self.layers.iter().map(|l| l.outputs));
        sizes
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn summary(&self) -> NeuralSummary {
        NeuralSummary {
            layers: self.layer_sizes(),
            iterations: self.iterations,
            converged: self.converged,
            final_error: self.final_error,
        }
    }

    /// "Neural network [2 → 8 → 1] (N iterations)"
    pub fn description(&self) -> String {
        let layers = self
            .layer_sizes()
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(" → ");
        format!("Neural network [{layers}] ({} iterations)", self.iterations)
    }
}
