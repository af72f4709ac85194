use aquastat_algo::{Partitioning, RegressionConfig, DEFAULT_TRAIN_FRACTION};

/// 进程级配置（环境变量，`.env` 由 dotenvy 预先加载）
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub log_level: String,
    pub file_logs: bool,
    pub log_dir: String,
    pub train_fraction: f64,
    pub neural_max_iterations: usize,
    pub neural_seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        let defaults = RegressionConfig::default();
        Self {
            log_level: "info".to_string(),
            file_logs: false,
            log_dir: "./logs".to_string(),
            train_fraction: DEFAULT_TRAIN_FRACTION,
            neural_max_iterations: defaults.neural.max_iterations,
            neural_seed: defaults.neural.seed,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源读取，无法解析的值回退为默认值
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let log_level = lookup("RUST_LOG").unwrap_or(defaults.log_level);

        let file_logs = lookup("ENABLE_FILE_LOGS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(defaults.file_logs);

        let log_dir = lookup("LOG_DIR").unwrap_or(defaults.log_dir);

        let train_fraction = lookup("ANALYSIS_TRAIN_FRACTION")
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|v| *v > 0.0 && *v < 1.0)
            .unwrap_or(defaults.train_fraction);

        let neural_max_iterations = lookup("ANALYSIS_NEURAL_MAX_ITERATIONS")
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.neural_max_iterations);

        let neural_seed = lookup("ANALYSIS_NEURAL_SEED")
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(defaults.neural_seed);

        Self {
            log_level,
            file_logs,
            log_dir,
            train_fraction,
            neural_max_iterations,
            neural_seed,
        }
    }

    /// 请求未指定时使用的回归参数
    pub fn regression_defaults(&self) -> RegressionConfig {
        let mut config = RegressionConfig {
            partitioning: Partitioning::Chronological {
                train_fraction: self.train_fraction,
            },
            ..Default::default()
        };
        config.neural.max_iterations = self.neural_max_iterations;
        config.neural.seed = self.neural_seed;
        config
    }
}
