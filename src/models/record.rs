use chrono::NaiveDate;
use serde::Serialize;

use crate::stats::log_ratio;

/// 価格と AVIV 比率を日付で結合した1行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRecord {
    pub date: NaiveDate,
    pub price: f64,
    pub ratio: f64,
    /// `ln(ratio)`
    pub log_ratio: f64,
}

impl MergedRecord {
    pub fn new(date: NaiveDate, price: f64, ratio: f64) -> Self {
        Self {
            date,
            price,
            ratio,
            log_ratio: log_ratio(ratio),
        }
    }
}
