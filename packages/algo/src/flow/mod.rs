//! Flow Bucketing
//!
//! Derives a per-row flow magnitude from two cumulative counters using a
//! clipped sliding window, then partitions the surviving rows into equal-width
//! flow buckets. The same bucket layout drives bucket-targeted regression.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};
use crate::types::{
    Observation, FLOW_WINDOW, MAX_GROUP_COUNT, MAX_TOTAL_FLOW, MIN_FLOW_ROWS, MIN_GROUP_COUNT,
};

/// Field attached to bucket-selected observations.
pub const TOTAL_FLOW_FIELD: &str = "total_flow";

// ==================== Configuration ====================

/// 流量分组配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowBucketConfig {
    pub primary_counter: String,
    pub secondary_counter: String,
    pub group_count: usize,
    /// 窗口半宽（行）
    pub window: usize,
    pub max_total_flow: f64,
}

impl Default for FlowBucketConfig {
    fn default() -> Self {
        Self {
            primary_counter: String::new(),
            secondary_counter: String::new(),
            group_count: 10,
            window: FLOW_WINDOW,
            max_total_flow: MAX_TOTAL_FLOW,
        }
    }
}

impl FlowBucketConfig {
    pub fn new(primary: impl Into<String>, secondary: impl Into<String>, group_count: usize) -> Self {
        Self {
            primary_counter: primary.into(),
            secondary_counter: secondary.into(),
            group_count,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        if self.primary_counter.trim().is_empty() || self.secondary_counter.trim().is_empty() {
            return Err(AnalysisError::invalid("both flow counter fields are required"));
        }
        if !(MIN_GROUP_COUNT..=MAX_GROUP_COUNT).contains(&self.group_count) {
            return Err(AnalysisError::invalid(format!(
                "group count must be between {MIN_GROUP_COUNT} and {MAX_GROUP_COUNT}, got {}",
                self.group_count
            )));
        }
        Ok(())
    }
}

// ==================== Types ====================

/// 单行派生流量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSample {
    /// 在计数器完整行中的下标
    pub row: usize,
    pub primary_rate: f64,
    pub secondary_rate: f64,
    pub total_flow: f64,
}

/// 分组区间 [min_flow, max_flow)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketRange {
    pub id: usize,
    pub min_flow: f64,
    pub max_flow: f64,
}

impl BucketRange {
    pub fn contains(&self, flow: f64) -> bool {
        flow >= self.min_flow && flow < self.max_flow
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowBucket {
    #[serde(rename = "group_id")]
    pub id: usize,
    pub min_flow: f64,
    pub max_flow: f64,
    pub count: usize,
    pub avg_flow: f64,
    /// 样本下标（对应 [`FlowBucketReport::samples`]）
    #[serde(skip)]
    pub members: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDistributionEntry {
    pub flow: i64,
    pub count: usize,
    pub frequency: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlowRange {
    pub min: f64,
    pub max: f64,
}

/// 流量分组报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowBucketReport {
    pub total_samples: usize,
    /// 非空分组数
    pub group_count: usize,
    pub flow_range: FlowRange,
    pub distribution: Vec<FlowDistributionEntry>,
    pub groups: Vec<FlowBucket>,
    #[serde(skip)]
    pub samples: Vec<FlowSample>,
}

// ==================== Derivation ====================

/// 两个计数器均有值的行
fn counter_rows<'a>(rows: &'a [Observation], config: &FlowBucketConfig) -> Vec<(&'a Observation, f64, f64)> {
    rows.iter()
        .filter_map(|row| {
            let primary = row.value(&config.primary_counter)?;
            let secondary = row.value(&config.secondary_counter)?;
            Some((row, primary, secondary))
        })
        .collect()
}

fn window_rate(values: &[f64]) -> f64 {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    (max - min) / values.len() as f64
}

/// 滑动窗口流量：窗口 [i-w, i+w] 截断到边界，rate = (max - min) / 窗口行数
pub fn derive_flow_samples(rows: &[Observation], config: &FlowBucketConfig) -> Vec<FlowSample> {
    let usable = counter_rows(rows, config);
    let primary: Vec<f64> = usable.iter().map(|(_, p, _)| *p).collect();
    let secondary: Vec<f64> = usable.iter().map(|(_, _, s)| *s).collect();
    let n = usable.len();

    let mut rejected = 0usize;
    let samples: Vec<FlowSample> = (0..n)
        .filter_map(|i| {
            let start = i.saturating_sub(config.window);
            let end = (i + config.window).min(n - 1);
            let primary_rate = window_rate(&primary[start..=end]);
            let secondary_rate = window_rate(&secondary[start..=end]);
            let total_flow = (primary_rate + secondary_rate).floor();

            if primary_rate < 0.0 || secondary_rate < 0.0 || total_flow > config.max_total_flow {
                rejected += 1;
                return None;
            }
            Some(FlowSample {
                row: i,
                primary_rate,
                secondary_rate,
                total_flow,
            })
        })
        .collect();

    tracing::debug!(
        rows = rows.len(),
        usable = n,
        accepted = samples.len(),
        rejected,
        "flow samples derived"
    );
    samples
}

/// 等宽分组布局，最后一组上界为 max + 1
pub fn bucket_layout(min_flow: f64, max_flow: f64, group_count: usize) -> Vec<BucketRange> {
    let width = (max_flow - min_flow) / group_count as f64;
    (0..group_count)
        .map(|i| BucketRange {
            id: i + 1,
            min_flow: min_flow + i as f64 * width,
            max_flow: if i == group_count - 1 {
                max_flow + 1.0
            } else {
                min_flow + (i + 1) as f64 * width
            },
        })
        .collect()
}

fn flow_range(samples: &[FlowSample]) -> FlowRange {
    let (min, max) = samples.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
        (lo.min(s.total_flow), hi.max(s.total_flow))
    });
    FlowRange { min, max }
}

fn require_samples(samples: &[FlowSample]) -> AnalysisResult<()> {
    if samples.len() < MIN_FLOW_ROWS {
        return Err(AnalysisError::insufficient(
            "flow bucketing",
            MIN_FLOW_ROWS,
            samples.len(),
        ));
    }
    Ok(())
}

/// 将样本分配到等宽分组（空组不输出，编号保持不变）
pub fn bucket_flows(samples: Vec<FlowSample>, group_count: usize) -> AnalysisResult<FlowBucketReport> {
    require_samples(&samples)?;
    if !(MIN_GROUP_COUNT..=MAX_GROUP_COUNT).contains(&group_count) {
        return Err(AnalysisError::invalid(format!(
            "group count must be between {MIN_GROUP_COUNT} and {MAX_GROUP_COUNT}, got {group_count}"
        )));
    }

    let range = flow_range(&samples);
    let layout = bucket_layout(range.min, range.max, group_count);
    let mut members: Vec<Vec<usize>> = vec![Vec::new(); layout.len()];

    for (index, sample) in samples.iter().enumerate() {
        match layout.iter().position(|b| b.contains(sample.total_flow)) {
            Some(bucket) => members[bucket].push(index),
            None => tracing::warn!(flow = sample.total_flow, "flow sample outside bucket layout"),
        }
    }

    let groups: Vec<FlowBucket> = layout
        .iter()
        .zip(members)
        .filter(|(_, m)| !m.is_empty())
        .map(|(bucket, members)| {
            let total: f64 = members.iter().map(|&i| samples[i].total_flow).sum();
            FlowBucket {
                id: bucket.id,
                min_flow: bucket.min_flow,
                max_flow: bucket.max_flow,
                count: members.len(),
                avg_flow: total / members.len() as f64,
                members,
            }
        })
        .collect();

    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for sample in &samples {
        *counts.entry(sample.total_flow as i64).or_insert(0) += 1;
    }
    let total = samples.len() as f64;
    let distribution = counts
        .into_iter()
        .map(|(flow, count)| FlowDistributionEntry {
            flow,
            count,
            frequency: count as f64 / total,
        })
        .collect();

    tracing::info!(
        samples = samples.len(),
        groups = groups.len(),
        min_flow = range.min,
        max_flow = range.max,
        "flow bucketing complete"
    );

    Ok(FlowBucketReport {
        total_samples: samples.len(),
        group_count: groups.len(),
        flow_range: range,
        distribution,
        groups,
        samples,
    })
}

/// 从观测数据派生流量并分组
pub fn bucket_observations(rows: &[Observation], config: &FlowBucketConfig) -> AnalysisResult<FlowBucketReport> {
    config.validate()?;
    let samples = derive_flow_samples(rows, config);
    bucket_flows(samples, config.group_count)
}

/// 选取某一分组的观测（附加 total_flow 字段），至少 10 行
pub fn select_bucket(
    rows: &[Observation],
    config: &FlowBucketConfig,
    bucket_id: usize,
) -> AnalysisResult<(Vec<Observation>, BucketRange)> {
    config.validate()?;
    if bucket_id == 0 || bucket_id > config.group_count {
        return Err(AnalysisError::invalid(format!(
            "bucket id must be between 1 and {}, got {bucket_id}",
            config.group_count
        )));
    }

    let samples = derive_flow_samples(rows, config);
    require_samples(&samples)?;
    let range = flow_range(&samples);
    let layout = bucket_layout(range.min, range.max, config.group_count);
    let bucket = layout[bucket_id - 1];

    let usable = counter_rows(rows, config);
    let selected: Vec<Observation> = samples
        .iter()
        .filter(|s| bucket.contains(s.total_flow))
        .map(|s| usable[s.row].0.clone().with_field(TOTAL_FLOW_FIELD, s.total_flow))
        .collect();

    if selected.len() < MIN_FLOW_ROWS {
        return Err(AnalysisError::insufficient(
            format!("flow bucket {bucket_id}"),
            MIN_FLOW_ROWS,
            selected.len(),
        ));
    }

    tracing::debug!(bucket_id, rows = selected.len(), "flow bucket selected");
    Ok((selected, bucket))
}
