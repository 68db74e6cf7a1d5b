use serde::{Deserialize, Serialize};
use std::fmt;

/// 数値または数値文字列として返される値
///
/// bitcoin-data.com は `"800.12"` のような文字列でも `800.12` のような数値でも返すため、
/// どちらも受け付けて結合後に変換する。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericValue {
    Number(f64),
    Text(String),
}

impl NumericValue {
    /// 有限な f64 として解釈できれば返す
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            NumericValue::Number(v) => *v,
            NumericValue::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            // i64::MAX as f64 は 2^63 なので上限は含まない
            NumericValue::Number(v)
                if v.fract() == 0.0 && *v >= i64::MIN as f64 && *v < i64::MAX as f64 =>
            {
                Some(*v as i64)
            }
            NumericValue::Number(_) => None,
            NumericValue::Text(s) => s.trim().parse::<i64>().ok(),
        }
    }
}

impl fmt::Display for NumericValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericValue::Number(v) => write!(f, "{}", v),
            NumericValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// 日付キーと値を持つ系列の1点
pub trait DatedValue {
    /// 変換エラーで報告するフィールド名
    const FIELD: &'static str;

    fn date_key(&self) -> &str;

    /// `null` または欠落している場合は `None`
    fn value(&self) -> Option<&NumericValue>;
}

/// `/api/v1/btc-price` の1要素
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub d: String,
    #[serde(default)]
    pub unix_ts: Option<NumericValue>,
    #[serde(default)]
    pub btc_price: Option<NumericValue>,
}

/// `/api/v1/aviv` の1要素
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatioPoint {
    pub d: String,
    #[serde(default)]
    pub unix_ts: Option<NumericValue>,
    #[serde(default)]
    pub aviv: Option<NumericValue>,
}

impl PricePoint {
    pub fn unix_timestamp(&self) -> Option<i64> {
        self.unix_ts.as_ref().and_then(NumericValue::as_i64)
    }
}

impl RatioPoint {
    pub fn unix_timestamp(&self) -> Option<i64> {
        self.unix_ts.as_ref().and_then(NumericValue::as_i64)
    }
}

impl DatedValue for PricePoint {
    const FIELD: &'static str = "btcPrice";

    fn date_key(&self) -> &str {
        &self.d
    }

    fn value(&self) -> Option<&NumericValue> {
        self.btc_price.as_ref()
    }
}

impl DatedValue for RatioPoint {
    const FIELD: &'static str = "aviv";

    fn date_key(&self) -> &str {
        &self.d
    }

    fn value(&self) -> Option<&NumericValue> {
        self.aviv.as_ref()
    }
}
