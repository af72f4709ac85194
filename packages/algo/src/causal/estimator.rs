use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::*;
use crate::sanitize::{mean, median, sample_variance};
use crate::types::{Dataset, Observation, EPSILON, MIN_DID_PERIOD_ROWS};

/// 双侧临界值与对应的分档 p 值
const P_VALUE_BUCKETS: [(f64, f64); 3] = [(2.576, 0.01), (1.96, 0.05), (1.645, 0.1)];
/// 未达任何临界值时的 p 值
const P_VALUE_FLOOR: f64 = 0.2;
/// 平行趋势容忍度（相对 |DID|）
const PARALLEL_TREND_TOLERANCE: f64 = 0.5;

/// 单条可用观测
struct DidRow<'a> {
    row: &'a Observation,
    outcome: f64,
    group: DidGroup,
    period: DidPeriod,
}

/// 中位数分组的双重差分估计
pub fn estimate_did(dataset: &Dataset, config: &DidConfig) -> AnalysisResult<CausalGroupSummary> {
    config.validate()?;
    if dataset.target.trim().is_empty() {
        return Err(AnalysisError::invalid("target field is required"));
    }

    let usable: Vec<(&Observation, f64, f64)> = dataset
        .rows
        .iter()
        .filter_map(|row| {
            let outcome = row.value(&dataset.target)?;
            let covariate = row.value(&config.grouping_field)?;
            Some((row, outcome, covariate))
        })
        .collect();

    let pre_count = usable
        .iter()
        .filter(|(row, _, _)| row.timestamp < config.intervention_time)
        .count();
    let post_count = usable.len() - pre_count;
    if pre_count < MIN_DID_PERIOD_ROWS {
        return Err(AnalysisError::insufficient(
            "DID pre-intervention period",
            MIN_DID_PERIOD_ROWS,
            pre_count,
        ));
    }
    if post_count < MIN_DID_PERIOD_ROWS {
        return Err(AnalysisError::insufficient(
            "DID post-intervention period",
            MIN_DID_PERIOD_ROWS,
            post_count,
        ));
    }

    let covariates: Vec<f64> = usable.iter().map(|(_, _, c)| *c).collect();
    let threshold = median(&covariates);

    let rows: Vec<DidRow> = usable
        .iter()
        .map(|&(row, outcome, covariate)| DidRow {
            row,
            outcome,
            group: if covariate <= threshold {
                DidGroup::Control
            } else {
                DidGroup::Treatment
            },
            period: if row.timestamp < config.intervention_time {
                DidPeriod::Pre
            } else {
                DidPeriod::Post
            },
        })
        .collect();

    let cell = |group: DidGroup, period: DidPeriod| -> Vec<f64> {
        rows.iter()
            .filter(|r| r.group == group && r.period == period)
            .map(|r| r.outcome)
            .collect()
    };
    let pre_c = cell(DidGroup::Control, DidPeriod::Pre);
    let post_c = cell(DidGroup::Control, DidPeriod::Post);
    let pre_t = cell(DidGroup::Treatment, DidPeriod::Pre);
    let post_t = cell(DidGroup::Treatment, DidPeriod::Post);

    for (values, group, period) in [
        (&pre_c, DidGroup::Control, DidPeriod::Pre),
        (&post_c, DidGroup::Control, DidPeriod::Post),
        (&pre_t, DidGroup::Treatment, DidPeriod::Pre),
        (&post_t, DidGroup::Treatment, DidPeriod::Post),
    ] {
        if values.len() < config.min_cell_rows {
            return Err(AnalysisError::insufficient(
                format!("DID {} {} cell", period.as_str(), group.as_str()),
                config.min_cell_rows,
                values.len(),
            ));
        }
    }

    let pre_control_mean = mean(&pre_c);
    let post_control_mean = mean(&post_c);
    let pre_treatment_mean = mean(&pre_t);
    let post_treatment_mean = mean(&post_t);
    let did_effect =
        (post_treatment_mean - pre_treatment_mean) - (post_control_mean - pre_control_mean);

    // 处理组前后方差的均方根作为合并标准差
    let pooled_sd = ((sample_variance(&pre_t) + sample_variance(&post_t)) / 2.0).sqrt();
    let size_factor = [pre_c.len(), post_c.len(), pre_t.len(), post_t.len()]
        .iter()
        .map(|&n| 1.0 / n as f64)
        .sum::<f64>()
        .sqrt();
    let standard_error = pooled_sd * size_factor;

    let t_statistic = if standard_error <= EPSILON {
        if did_effect.abs() <= EPSILON {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        did_effect.abs() / standard_error
    };
    let p_value = bucketed_p_value(t_statistic);

    let parallel_trend = parallel_trend_test(&rows, did_effect);
    let treatment_trend = daily_trend(&rows);

    tracing::info!(
        grouping_field = %config.grouping_field,
        target = %dataset.target,
        did_effect,
        p_value,
        parallel_trends = parallel_trend.passed,
        "DID estimation complete"
    );

    Ok(CausalGroupSummary {
        target: dataset.target.clone(),
        grouping_field: config.grouping_field.clone(),
        group_threshold: threshold,
        pre_control_mean,
        post_control_mean,
        pre_treatment_mean,
        post_treatment_mean,
        did_effect,
        standard_error,
        t_statistic,
        p_value,
        parallel_trend,
        counts: CellCounts {
            pre_control: pre_c.len(),
            post_control: post_c.len(),
            pre_treatment: pre_t.len(),
            post_treatment: post_t.len(),
        },
        treatment_trend,
    })
}

/// |t| 分档映射为 p 值
pub fn bucketed_p_value(t: f64) -> f64 {
    let t = t.abs();
    P_VALUE_BUCKETS
        .iter()
        .find(|(critical, _)| t >= *critical)
        .map(|(_, p)| *p)
        .unwrap_or(P_VALUE_FLOOR)
}

/// 干预前各组按时间排序后的首末变化
fn parallel_trend_test(rows: &[DidRow], did_effect: f64) -> ParallelTrendTest {
    let change = |group: DidGroup| -> f64 {
        let mut series: Vec<&DidRow> = rows
            .iter()
            .filter(|r| r.group == group && r.period == DidPeriod::Pre)
            .collect();
        series.sort_by_key(|r| r.row.timestamp);
        match (series.first(), series.last()) {
            (Some(first), Some(last)) => last.outcome - first.outcome,
            _ => 0.0,
        }
    };
    let treatment_change = change(DidGroup::Treatment);
    let control_change = change(DidGroup::Control);
    let passed =
        (treatment_change - control_change).abs() < PARALLEL_TREND_TOLERANCE * did_effect.abs();

    tracing::debug!(treatment_change, control_change, passed, "parallel trend test");
    ParallelTrendTest {
        treatment_change,
        control_change,
        passed,
    }
}

/// 按日期、组、时期聚合的目标均值
fn daily_trend(rows: &[DidRow]) -> Vec<TrendPoint> {
    let mut buckets: BTreeMap<(NaiveDate, DidGroup, DidPeriod), (f64, usize)> = BTreeMap::new();
    for r in rows {
        let entry = buckets
            .entry((r.row.timestamp.date(), r.group, r.period))
            .or_insert((0.0, 0));
        entry.0 += r.outcome;
        entry.1 += 1;
    }
    buckets
        .into_iter()
        .map(|((date, group, period), (sum, count))| TrendPoint {
            date: date.format("%Y-%m-%d").to_string(),
            value: sum / count as f64,
            group,
            period,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDateTime};

    fn day(d: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            + Duration::days(d)
    }

    /// 处理组（pressure 高）在干预后提升 effect
    fn create_test_rows(effect: f64) -> Vec<Observation> {
        let mut rows = Vec::new();
        for d in 0..20 {
            for (pressure, base) in [(1.0, 10.0), (2.0, 10.5), (8.0, 20.0), (9.0, 20.5)] {
                let treated = pressure > 5.0;
                let lift = if treated && d >= 10 { effect } else { 0.0 };
                let noise = ((d * 7 + pressure as i64) % 5) as f64 * 0.1;
                rows.push(
                    Observation::new(day(d))
                        .with_field("pressure", pressure)
                        .with_field("output", base + 0.2 * d as f64 + lift + noise),
                );
            }
        }
        rows
    }

    fn dataset(rows: Vec<Observation>) -> Dataset {
        Dataset::new(rows, vec!["pressure".to_string()], "output")
    }

    #[test]
    fn test_bucketed_p_value() {
        assert_eq!(bucketed_p_value(3.0), 0.01);
        assert_eq!(bucketed_p_value(-2.0), 0.05);
        assert_eq!(bucketed_p_value(1.7), 0.1);
        assert_eq!(bucketed_p_value(0.5), 0.2);
        assert_eq!(bucketed_p_value(f64::INFINITY), 0.01);
    }

    #[test]
    fn test_did_recovers_effect() {
        let config = DidConfig::new("pressure", day(10));
        let summary = estimate_did(&dataset(create_test_rows(5.0)), &config).unwrap();
        assert!((summary.did_effect - 5.0).abs() < 0.2, "did = {}", summary.did_effect);
        assert_eq!(summary.p_value, 0.01);
        assert!(summary.is_significant());
        assert!(summary.description().contains("(p ≈ 0.01, significant)"));
        assert!(summary.parallel_trends_passed());
        assert_eq!(summary.counts.total(), 80);
        assert_eq!(summary.group_threshold, 5.0);
    }

    #[test]
    fn test_did_identity_from_means() {
        let config = DidConfig::new("pressure", day(7));
        let s = estimate_did(&dataset(create_test_rows(2.0)), &config).unwrap();
        let identity =
            (s.post_treatment_mean - s.pre_treatment_mean) - (s.post_control_mean - s.pre_control_mean);
        assert!((s.did_effect - identity).abs() < 1e-12);
    }

    #[test]
    fn test_no_effect_is_not_significant() {
        let config = DidConfig::new("pressure", day(10));
        let summary = estimate_did(&dataset(create_test_rows(0.0)), &config).unwrap();
        assert!(summary.did_effect.abs() < 0.2);
        assert!(summary.p_value >= 0.1);
        assert!(!summary.is_significant());
        assert!(summary.description().contains("not significant"));
    }

    #[test]
    fn test_short_pre_period() {
        // 仅 1 天（4 行）位于干预前
        let config = DidConfig::new("pressure", day(1));
        assert!(matches!(
            estimate_did(&dataset(create_test_rows(1.0)), &config),
            Err(AnalysisError::InsufficientData { required: 5, actual: 4, .. })
        ));
    }

    #[test]
    fn test_constant_grouping_leaves_treatment_empty() {
        let rows: Vec<Observation> = (0..20)
            .map(|d| {
                Observation::new(day(d))
                    .with_field("pressure", 3.0)
                    .with_field("output", d as f64)
            })
            .collect();
        let config = DidConfig::new("pressure", day(10));
        assert!(matches!(
            estimate_did(&dataset(rows), &config),
            Err(AnalysisError::InsufficientData { actual: 0, .. })
        ));
    }

    #[test]
    fn test_treatment_trend_is_daily_and_sorted() {
        let config = DidConfig::new("pressure", day(10));
        let summary = estimate_did(&dataset(create_test_rows(1.0)), &config).unwrap();
        // 20 天 × 2 组
        assert_eq!(summary.treatment_trend.len(), 40);
        assert!(summary
            .treatment_trend
            .windows(2)
            .all(|w| w[0].date <= w[1].date));
        let first = &summary.treatment_trend[0];
        assert_eq!(first.date, "2024-06-01");
        assert_eq!(first.period, DidPeriod::Pre);
        let last = summary.treatment_trend.last().unwrap();
        assert_eq!(last.period, DidPeriod::Post);
    }

    #[test]
    fn test_zero_variance_cells() {
        let mut rows = Vec::new();
        for d in 0..10 {
            for (pressure, value) in [(1.0, 1.0), (9.0, if d >= 5 { 4.0 } else { 2.0 })] {
                rows.push(
                    Observation::new(day(d))
                        .with_field("pressure", pressure)
                        .with_field("output", value),
                );
            }
        }
        let config = DidConfig::new("pressure", day(5));
        let summary = estimate_did(&dataset(rows), &config).unwrap();
        assert_eq!(summary.did_effect, 2.0);
        assert_eq!(summary.standard_error, 0.0);
        assert!(summary.t_statistic.is_infinite());
        assert_eq!(summary.p_value, 0.01);
    }
}
