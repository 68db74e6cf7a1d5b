use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::error::{AvivError, Result};
use crate::models::{DatedValue, MergedRecord, NumericValue, PricePoint, RatioPoint};

/// 結合後に残す最初の日付（この日を含む）
pub const START_DATE: NaiveDate = match NaiveDate::from_ymd_opt(2014, 1, 1) {
    Some(date) => date,
    None => panic!("invalid start date"),
};

/// 価格系列と AVIV 系列を日付キーで内部結合する
///
/// - 日付キーは `d` の文字列完全一致で比較する（タイムゾーンや粒度の正規化はしない）
/// - 出力順は価格系列の順序に従う
/// - 同じ日付が複数ある場合は各系列で最初の値を採用する
/// - 値が `null` の点は結合に参加しない
/// - 結合した全行を数値に変換してから `START_DATE` より前を除外する
pub fn merge_price_and_aviv(
    prices: &[PricePoint],
    ratios: &[RatioPoint],
) -> Result<Vec<MergedRecord>> {
    let ratio_index = index_by_date(ratios);
    let mut seen: HashSet<&str> = HashSet::with_capacity(prices.len());
    let mut records = Vec::new();
    let mut joined = 0usize;
    let mut timestamp_mismatches = 0usize;

    for point in prices {
        let Some(price_value) = point.value() else {
            continue;
        };
        let key = point.date_key();
        if !seen.insert(key) {
            warn!(date_key = key, "duplicate date in price series, keeping the first");
            continue;
        }
        let Some(ratio_point) = ratio_index.get(key) else {
            continue;
        };
        let Some(ratio_value) = ratio_point.value() else {
            continue;
        };
        joined += 1;

        let date = parse_date_key(key)?;
        let price = coerce(price_value, PricePoint::FIELD, key)?;
        let ratio = coerce(ratio_value, RatioPoint::FIELD, key)?;

        let timestamps = [point.unix_timestamp(), ratio_point.unix_timestamp()];
        if timestamps
            .into_iter()
            .flatten()
            .any(|ts| !timestamp_matches_date(ts, date))
        {
            timestamp_mismatches += 1;
        }

        if date < START_DATE {
            continue;
        }
        records.push(MergedRecord::new(date, price, ratio));
    }

    if timestamp_mismatches > 0 {
        warn!(
            rows = timestamp_mismatches,
            "unixTs disagrees with the date key; joining on the date key"
        );
    }

    debug!(
        prices = prices.len(),
        ratios = ratios.len(),
        joined,
        kept = records.len(),
        "merged price and AVIV series"
    );

    if records.is_empty() {
        return Err(AvivError::EmptyJoin { start: START_DATE });
    }
    Ok(records)
}

fn index_by_date<T: DatedValue>(points: &[T]) -> HashMap<&str, &T> {
    let mut index = HashMap::with_capacity(points.len());
    for point in points {
        if point.value().is_none() {
            continue;
        }
        if index.contains_key(point.date_key()) {
            warn!(
                date_key = point.date_key(),
                field = T::FIELD,
                "duplicate date, keeping the first"
            );
            continue;
        }
        index.insert(point.date_key(), point);
    }
    index
}

/// UNIX 秒の UTC 日付が日付キーと一致するか
pub(crate) fn timestamp_matches_date(unix_ts: i64, date: NaiveDate) -> bool {
    DateTime::<Utc>::from_timestamp(unix_ts, 0).is_some_and(|dt| dt.date_naive() == date)
}

/// `YYYY-MM-DD` もしくは時刻付きの表記から日付を取り出す
pub fn parse_date_key(key: &str) -> Result<NaiveDate> {
    let trimmed = key.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(trimmed).map(|dt| dt.date_naive()))
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S").map(|dt| dt.date()))
        .map_err(|_| AvivError::TypeCoercion {
            field: "d",
            date_key: key.to_string(),
            value: key.to_string(),
        })
}

fn coerce(value: &NumericValue, field: &'static str, key: &str) -> Result<f64> {
    value.as_f64().ok_or_else(|| AvivError::TypeCoercion {
        field,
        date_key: key.to_string(),
        value: value.to_string(),
    })
}
