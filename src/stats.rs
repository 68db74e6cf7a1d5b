use serde::Serialize;

use crate::models::MergedRecord;

/// 強調表示に使う下側パーセンタイル
pub const LOWER_PERCENTILE: f64 = 2.5;
/// 強調表示に使う上側パーセンタイル
pub const UPPER_PERCENTILE: f64 = 97.5;

pub fn log_ratio(ratio: f64) -> f64 {
    ratio.ln()
}

/// 線形補間によるパーセンタイル
///
/// `rank = p / 100 * (n - 1)` の位置を前後の値で補間する。
/// 有限でない値は無視し、残りが空なら `None`。
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() || !(0.0..=100.0).contains(&p) {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// 過熱・割安判定の閾値
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    pub lower: f64,
    pub upper: f64,
}

impl Thresholds {
    pub fn from_log_ratios(values: &[f64]) -> Option<Self> {
        Some(Self {
            lower: percentile(values, LOWER_PERCENTILE)?,
            upper: percentile(values, UPPER_PERCENTILE)?,
        })
    }

    pub fn classify(&self, log_ratio: f64) -> Zone {
        if !log_ratio.is_finite() {
            Zone::Neutral
        } else if log_ratio >= self.upper {
            Zone::Overheated
        } else if log_ratio <= self.lower {
            Zone::Undervalued
        } else {
            Zone::Neutral
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Zone {
    Overheated,
    Undervalued,
    Neutral,
}

/// 描画前の集計結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneCounts {
    pub overheated: usize,
    pub undervalued: usize,
}

pub fn count_zones(records: &[MergedRecord], thresholds: &Thresholds) -> ZoneCounts {
    let mut counts = ZoneCounts {
        overheated: 0,
        undervalued: 0,
    };
    for record in records {
        match thresholds.classify(record.log_ratio) {
            Zone::Overheated => counts.overheated += 1,
            Zone::Undervalued => counts.undervalued += 1,
            Zone::Neutral => {}
        }
    }
    counts
}
