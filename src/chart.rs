use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use clap::ValueEnum;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

use crate::error::{AvivError, Result};
use crate::models::MergedRecord;
use crate::stats::{Thresholds, Zone, ZoneCounts, count_zones};

pub const TITLE: &str = "Log-Transformed AVIV Ratio and BTC Price Over Time";
pub const LOG_RATIO_LABEL: &str = "Log Transformed AVIV Ratio";
pub const OVERHEATED_LABEL: &str = "AVIV Ratio Z-Score > 1.96";
pub const UNDERVALUED_LABEL: &str = "AVIV Ratio Z-Score < -1.96";
pub const PRICE_LABEL: &str = "BTC Price";

/// 主軸（対数 AVIV 比率）の表示下限。データは切り捨てず表示だけを切る
pub const LOG_RATIO_FLOOR: f64 = 3.0;
/// 価格軸の目盛り
pub const PRICE_TICKS: [f64; 4] = [100.0, 1_000.0, 10_000.0, 100_000.0];

const ORANGE: RGBColor = RGBColor(255, 165, 0);

/// 出力画像の形式
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ImageFormat {
    Png,
    Svg,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Svg => "svg",
        }
    }
}

/// 描画処理の抽象
///
/// 取得・結合のテストで描画バックエンドを必要としないように分離している。
pub trait ChartRenderer {
    fn render(&self, chart: &AvivChart) -> Result<()>;
}

/// 描画に必要なデータ一式
#[derive(Debug, Clone)]
pub struct AvivChart {
    records: Vec<MergedRecord>,
    thresholds: Thresholds,
}

/// 描画後に表示する要約
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSummary {
    pub records: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub thresholds: Thresholds,
    pub zones: ZoneCounts,
}

impl fmt::Display for ChartSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} days ({} .. {}), log AVIV thresholds [{:.4}, {:.4}], overheated {} days, undervalued {} days",
            self.records,
            self.first_date,
            self.last_date,
            self.thresholds.lower,
            self.thresholds.upper,
            self.zones.overheated,
            self.zones.undervalued,
        )
    }
}

pub(crate) fn to_datetime(date: NaiveDate) -> DateTime<Utc> {
    DateTime::<Utc>::from_naive_utc_and_offset(date.and_time(NaiveTime::MIN), Utc)
}

impl AvivChart {
    pub fn new(records: Vec<MergedRecord>) -> Result<Self> {
        let log_ratios: Vec<f64> = records.iter().map(|r| r.log_ratio).collect();
        let thresholds = Thresholds::from_log_ratios(&log_ratios).ok_or_else(|| {
            AvivError::Chart("No finite log AVIV ratio to compute thresholds".to_string())
        })?;
        debug!(
            lower = thresholds.lower,
            upper = thresholds.upper,
            "computed log AVIV thresholds"
        );
        Ok(Self {
            records,
            thresholds,
        })
    }

    pub fn records(&self) -> &[MergedRecord] {
        &self.records
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn summary(&self) -> ChartSummary {
        let first_date = self.records.iter().map(|r| r.date).min();
        let last_date = self.records.iter().map(|r| r.date).max();
        ChartSummary {
            records: self.records.len(),
            first_date: first_date.unwrap_or_default(),
            last_date: last_date.unwrap_or_default(),
            thresholds: self.thresholds,
            zones: count_zones(&self.records, &self.thresholds),
        }
    }

    /// X軸の範囲。1日分しかない場合は幅を1日に広げる
    pub fn time_range(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let min = self.records.iter().map(|r| r.date).min().unwrap_or_default();
        let max = self.records.iter().map(|r| r.date).max().unwrap_or_default();
        let (start, end) = (to_datetime(min), to_datetime(max));
        if start == end {
            (start, end + Duration::days(1))
        } else {
            (start, end)
        }
    }

    /// 主軸の範囲。下限は `LOG_RATIO_FLOOR` で固定
    pub fn log_ratio_range(&self) -> (f64, f64) {
        let max = self
            .records
            .iter()
            .map(|r| r.log_ratio)
            .filter(|v| v.is_finite())
            .fold(LOG_RATIO_FLOOR, f64::max);
        let padding = ((max - LOG_RATIO_FLOOR) * 0.05).max(0.1);
        (LOG_RATIO_FLOOR, max + padding)
    }

    /// 価格軸の範囲。全ての目盛りが見えるように広げる
    pub fn price_range(&self) -> (f64, f64) {
        let prices = self.records.iter().map(|r| r.price).filter(|p| *p > 0.0);
        let (min, max) = prices.fold((PRICE_TICKS[0], PRICE_TICKS[3]), |(lo, hi), p| {
            (lo.min(p), hi.max(p))
        });
        (min / 1.5, max * 1.5)
    }

    /// 表示範囲内にある対数比率の連続区間
    pub fn visible_log_ratio_runs(&self) -> Vec<Vec<(DateTime<Utc>, f64)>> {
        self.runs(LOG_RATIO_FLOOR, f64::INFINITY)
    }

    /// 指定ゾーンに入る連続区間（表示下限より上の部分のみ）
    pub fn highlight_runs(&self, zone: Zone) -> Vec<Vec<(DateTime<Utc>, f64)>> {
        let Thresholds { lower, upper } = self.thresholds;
        match zone {
            Zone::Overheated => self.runs(LOG_RATIO_FLOOR.max(upper), f64::INFINITY),
            Zone::Undervalued => self.runs(LOG_RATIO_FLOOR, lower),
            Zone::Neutral => self.runs(LOG_RATIO_FLOOR.max(lower), upper),
        }
    }

    pub fn price_points(&self) -> Vec<(DateTime<Utc>, f64)> {
        self.records
            .iter()
            .filter(|r| r.price > 0.0)
            .map(|r| (to_datetime(r.date), r.price))
            .collect()
    }

    /// 折れ線のうち `lo..=hi` に入る部分を区間ごとに切り出す
    ///
    /// 境界をまたぐ線分は交点を補間して区間の端にする。
    /// 有限でない値の前後で線は途切れる。
    fn runs(&self, lo: f64, hi: f64) -> Vec<Vec<(DateTime<Utc>, f64)>> {
        let mut runs = Vec::new();
        if !(lo <= hi) {
            return runs;
        }

        let mut chain: Vec<(DateTime<Utc>, f64)> = Vec::new();
        for record in &self.records {
            if record.log_ratio.is_finite() {
                chain.push((to_datetime(record.date), record.log_ratio));
            } else {
                clip_chain(&chain, lo, hi, &mut runs);
                chain.clear();
            }
        }
        clip_chain(&chain, lo, hi, &mut runs);
        runs
    }
}

fn clip_chain(
    chain: &[(DateTime<Utc>, f64)],
    lo: f64,
    hi: f64,
    runs: &mut Vec<Vec<(DateTime<Utc>, f64)>>,
) {
    let inside = |v: f64| lo <= v && v <= hi;

    if let [point] = chain {
        if inside(point.1) {
            runs.push(vec![*point]);
        }
        return;
    }

    let mut current: Vec<(DateTime<Utc>, f64)> = Vec::new();
    // 直前の線分が終点まで範囲内だったか
    let mut open = false;
    for pair in chain.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let Some((s0, s1)) = clip_segment(a.1, b.1, lo, hi) else {
            if !current.is_empty() {
                runs.push(std::mem::take(&mut current));
            }
            open = false;
            continue;
        };

        if !(open && s0 == 0.0) && !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
        if current.is_empty() {
            current.push(interpolate(a, b, s0));
        }
        let end = interpolate(a, b, s1);
        if current.last() != Some(&end) {
            current.push(end);
        }
        open = s1 == 1.0;
    }
    if !current.is_empty() {
        runs.push(current);
    }
}

/// 線分 `va -> vb` のうち `lo..=hi` に入る媒介変数の範囲
fn clip_segment(va: f64, vb: f64, lo: f64, hi: f64) -> Option<(f64, f64)> {
    if va == vb {
        return (lo <= va && va <= hi).then_some((0.0, 1.0));
    }
    let at = |y: f64| (y - va) / (vb - va);
    let (from, to) = if vb > va { (at(lo), at(hi)) } else { (at(hi), at(lo)) };
    let (s0, s1) = (from.max(0.0), to.min(1.0));
    (s0 <= s1).then_some((s0, s1))
}

fn interpolate(a: (DateTime<Utc>, f64), b: (DateTime<Utc>, f64), s: f64) -> (DateTime<Utc>, f64) {
    if s == 0.0 {
        return a;
    }
    if s == 1.0 {
        return b;
    }
    let millis = ((b.0 - a.0).num_milliseconds() as f64 * s).round() as i64;
    (a.0 + Duration::milliseconds(millis), a.1 + (b.1 - a.1) * s)
}

/// 区間を基準線まで塗りつぶす多角形の頂点
pub fn band_polygon(run: &[(DateTime<Utc>, f64)], baseline: f64) -> Vec<(DateTime<Utc>, f64)> {
    let mut vertices = run.to_vec();
    if let (Some(first), Some(last)) = (run.first(), run.last()) {
        vertices.push((last.0, baseline));
        vertices.push((first.0, baseline));
    }
    vertices
}

/// 指数表記にしない価格目盛り
pub fn format_price_tick(value: f64) -> String {
    format!("{:.0}", value)
}

/// plotters による画像出力
pub struct PlottersRenderer {
    pub output_path: PathBuf,
    pub size: (u32, u32),
    pub format: ImageFormat,
}

impl ChartRenderer for PlottersRenderer {
    fn render(&self, chart: &AvivChart) -> Result<()> {
        debug!(path = %self.output_path.display(), format = ?self.format, "rendering chart");
        match self.format {
            ImageFormat::Png => {
                let root = BitMapBackend::new(&self.output_path, self.size).into_drawing_area();
                draw_chart(root, chart)
            }
            ImageFormat::Svg => {
                let root = SVGBackend::new(&self.output_path, self.size).into_drawing_area();
                draw_chart(root, chart)
            }
        }
    }
}

fn chart_error(step: &str, err: impl fmt::Display) -> AvivError {
    AvivError::Chart(format!("Failed to {}: {}", step, err))
}

fn draw_chart<DB: DrawingBackend>(root: DrawingArea<DB, Shift>, chart: &AvivChart) -> Result<()> {
    root.fill(&WHITE).map_err(|e| chart_error("fill background", e))?;

    let (start_time, end_time) = chart.time_range();
    let (ratio_min, ratio_max) = chart.log_ratio_range();
    let (price_min, price_max) = chart.price_range();

    let mut ctx = ChartBuilder::on(&root)
        .caption(TITLE, ("sans-serif", 24).into_font())
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .right_y_label_area_size(90)
        .build_cartesian_2d(start_time..end_time, ratio_min..ratio_max)
        .map_err(|e| chart_error("build chart", e))?
        .set_secondary_coord(
            start_time..end_time,
            (price_min..price_max)
                .log_scale()
                .with_key_points(PRICE_TICKS.to_vec()),
        );

    ctx.configure_mesh()
        .y_desc("Log AVIV Ratio")
        .x_label_formatter(&|x| x.format("%Y").to_string())
        .bold_line_style(BLACK.mix(0.3))
        .light_line_style(BLACK.mix(0.05))
        .draw()
        .map_err(|e| chart_error("configure mesh", e))?;

    ctx.configure_secondary_axes()
        .y_desc("BTC Price (Log Scale)")
        .label_style(("sans-serif", 14).into_font().color(&ORANGE))
        .y_label_formatter(&|v| format_price_tick(*v))
        .draw()
        .map_err(|e| chart_error("configure secondary axis", e))?;

    let line_color = BLUE.mix(0.7);
    ctx.draw_series(
        chart
            .visible_log_ratio_runs()
            .into_iter()
            .map(|run| PathElement::new(run, line_color)),
    )
    .map_err(|e| chart_error("draw log AVIV ratio", e))?
    .label(LOG_RATIO_LABEL)
    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], line_color));

    for (zone, color, label) in [
        (Zone::Overheated, RED.mix(0.3), OVERHEATED_LABEL),
        (Zone::Undervalued, GREEN.mix(0.3), UNDERVALUED_LABEL),
    ] {
        ctx.draw_series(
            chart
                .highlight_runs(zone)
                .into_iter()
                .map(|run| Polygon::new(band_polygon(&run, ratio_min), color.filled())),
        )
        .map_err(|e| chart_error("draw highlight band", e))?
        .label(label)
        .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 20, y + 5)], color.filled()));
    }

    let price_color = ORANGE.mix(0.7);
    ctx.draw_secondary_series(LineSeries::new(chart.price_points(), price_color))
        .map_err(|e| chart_error("draw BTC price", e))?
        .label(PRICE_LABEL)
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], price_color));

    ctx.configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .margin(10)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(|e| chart_error("draw legend", e))?;

    root.present().map_err(|e| chart_error("present chart", e))?;

    Ok(())
}

#[cfg(test)]
mod tests;
