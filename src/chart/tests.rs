use super::*;
use chrono::NaiveDate;
use tempfile::TempDir;

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// 対数比率が指定値になるレコード
fn record(day: &str, price: f64, log_ratio: f64) -> MergedRecord {
    MergedRecord::new(date(day), price, log_ratio.exp())
}

fn sample_chart() -> AvivChart {
    let logs = [3.5, 4.0, 4.5, 6.0, 6.5, 4.2, 2.0, 1.0, 4.1, 4.3];
    let records = logs
        .iter()
        .enumerate()
        .map(|(i, log)| {
            record(
                &format!("2020-01-{:02}", i + 1),
                1_000.0 * (i + 1) as f64,
                *log,
            )
        })
        .collect();
    AvivChart::new(records).unwrap()
}

// === AvivChart::new テスト ===

#[test]
fn test_new_requires_finite_log_ratio() {
    let records = vec![MergedRecord::new(date("2020-01-01"), 100.0, 0.0)];
    let err = AvivChart::new(records).unwrap_err();
    assert!(matches!(err, AvivError::Chart(_)));

    let err = AvivChart::new(vec![]).unwrap_err();
    assert!(matches!(err, AvivError::Chart(_)));
}

// === 範囲計算テスト ===

#[test]
fn test_time_range() {
    let chart = sample_chart();
    let (start, end) = chart.time_range();
    assert_eq!(start, to_datetime(date("2020-01-01")));
    assert_eq!(end, to_datetime(date("2020-01-10")));
}

#[test]
fn test_time_range_single_day_is_widened() {
    let chart = AvivChart::new(vec![record("2020-05-05", 100.0, 4.0)]).unwrap();
    let (start, end) = chart.time_range();
    assert_eq!(end - start, Duration::days(1));
}

#[test]
fn test_log_ratio_range_floor_is_fixed() {
    let chart = sample_chart();
    let (min, max) = chart.log_ratio_range();
    assert_eq!(min, LOG_RATIO_FLOOR);
    assert!(max > 6.5);

    // 全て下限未満でも下限は3のまま
    let low = AvivChart::new(vec![record("2020-01-01", 100.0, 0.5)]).unwrap();
    let (min, max) = low.log_ratio_range();
    assert_eq!(min, LOG_RATIO_FLOOR);
    assert!(max > LOG_RATIO_FLOOR);
}

#[test]
fn test_price_range_includes_all_ticks() {
    let chart = sample_chart();
    let (min, max) = chart.price_range();
    for tick in PRICE_TICKS {
        assert!(min < tick && tick < max, "tick {} outside {}..{}", tick, min, max);
    }

    let expensive = AvivChart::new(vec![
        record("2021-01-01", 50.0, 4.0),
        record("2021-01-02", 250_000.0, 4.0),
    ])
    .unwrap();
    let (min, max) = expensive.price_range();
    assert!(min < 50.0);
    assert!(max > 250_000.0);
}

// === 区間分割テスト ===

fn chart_from_logs(logs: &[f64]) -> AvivChart {
    let records = logs
        .iter()
        .enumerate()
        .map(|(i, log)| record(&format!("2020-02-{:02}", i + 1), 5_000.0, *log))
        .collect();
    AvivChart::new(records).unwrap()
}

#[test]
fn test_visible_runs_are_cut_at_the_floor_crossing() {
    let chart = sample_chart();
    let runs = chart.visible_log_ratio_runs();

    // 2.0 と 1.0 の2日で分断され、下限との交点が両端に加わる
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].len(), 7);
    assert_eq!(runs[1].len(), 3);

    let (leave_time, leave_value) = runs[0][6];
    assert!((leave_value - LOG_RATIO_FLOOR).abs() < 1e-9);
    assert!(leave_time > to_datetime(date("2020-01-06")));
    assert!(leave_time < to_datetime(date("2020-01-07")));

    let (enter_time, enter_value) = runs[1][0];
    assert!((enter_value - LOG_RATIO_FLOOR).abs() < 1e-9);
    assert!(enter_time > to_datetime(date("2020-01-08")));
    assert_eq!(runs[1][1].0, to_datetime(date("2020-01-09")));
}

#[test]
fn test_single_day_spike_above_floor_stays_visible() {
    let chart = chart_from_logs(&[2.0, 2.5, 3.8, 2.5, 2.0]);

    let runs = chart.visible_log_ratio_runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].len(), 3);
    assert!((runs[0][0].1 - LOG_RATIO_FLOOR).abs() < 1e-9);
    assert!((runs[0][1].1 - 3.8).abs() < 1e-9);
    assert!((runs[0][2].1 - LOG_RATIO_FLOOR).abs() < 1e-9);
    assert!(runs[0][0].0 < runs[0][1].0 && runs[0][1].0 < runs[0][2].0);

    // 上側の閾値との交点から塗りつぶすので面積を持つ
    let upper = chart.thresholds().upper;
    let overheated = chart.highlight_runs(Zone::Overheated);
    assert_eq!(overheated.len(), 1);
    assert_eq!(overheated[0].len(), 3);
    assert!((overheated[0][0].1 - upper).abs() < 1e-9);
    assert!((overheated[0][2].1 - upper).abs() < 1e-9);

    let polygon = band_polygon(&overheated[0], LOG_RATIO_FLOOR);
    let first_x = polygon[0].0;
    assert!(polygon.iter().any(|(x, _)| *x != first_x));
    assert!(polygon.iter().any(|(_, y)| *y > LOG_RATIO_FLOOR));
}

#[test]
fn test_runs_break_on_non_finite_values() {
    let mut records: Vec<MergedRecord> = [4.0, 4.5]
        .iter()
        .enumerate()
        .map(|(i, log)| record(&format!("2020-03-{:02}", i + 1), 5_000.0, *log))
        .collect();
    records.push(MergedRecord::new(date("2020-03-03"), 5_000.0, 0.0));
    records.push(record("2020-03-04", 5_000.0, 5.0));
    let chart = AvivChart::new(records).unwrap();

    let runs = chart.visible_log_ratio_runs();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].len(), 2);
    // 孤立した1点も区間として残る
    assert_eq!(runs[1], vec![(to_datetime(date("2020-03-04")), 5.0f64.exp().ln())]);
}

#[test]
fn test_highlight_runs_follow_thresholds() {
    let chart = sample_chart();
    let thresholds = *chart.thresholds();

    let overheated = chart.highlight_runs(Zone::Overheated);
    assert_eq!(overheated.len(), 1);
    assert_eq!(overheated[0].len(), 3);
    assert!(
        overheated[0]
            .iter()
            .all(|(_, v)| *v >= thresholds.upper - 1e-9)
    );
    assert!((overheated[0][1].1 - 6.5).abs() < 1e-9);

    // 下側の閾値は表示下限未満なので描画されない
    assert!(thresholds.lower < LOG_RATIO_FLOOR);
    assert!(chart.highlight_runs(Zone::Undervalued).is_empty());
}

#[test]
fn test_band_polygon_closes_at_baseline() {
    let t1 = to_datetime(date("2020-01-01"));
    let t2 = to_datetime(date("2020-01-02"));
    let polygon = band_polygon(&[(t1, 5.0), (t2, 6.0)], 3.0);
    assert_eq!(polygon, vec![(t1, 5.0), (t2, 6.0), (t2, 3.0), (t1, 3.0)]);

    assert!(band_polygon(&[], 3.0).is_empty());
}

// === 表示テスト ===

#[test]
fn test_format_price_tick_is_plain() {
    let labels: Vec<String> = PRICE_TICKS.iter().map(|v| format_price_tick(*v)).collect();
    assert_eq!(labels, vec!["100", "1000", "10000", "100000"]);
}

#[test]
fn test_summary() {
    let chart = sample_chart();
    let summary = chart.summary();

    assert_eq!(summary.records, 10);
    assert_eq!(summary.first_date, date("2020-01-01"));
    assert_eq!(summary.last_date, date("2020-01-10"));
    assert_eq!(summary.zones.overheated, 1);
    assert_eq!(summary.zones.undervalued, 1);
    assert!(summary.to_string().starts_with("10 days (2020-01-01 .. 2020-01-10)"));
}

#[test]
fn test_image_format_extension() {
    assert_eq!(ImageFormat::Png.extension(), "png");
    assert_eq!(ImageFormat::Svg.extension(), "svg");
}

// === 描画テスト ===

fn render_to(dir: &TempDir, format: ImageFormat) -> Result<PathBuf> {
    let output_path = dir.path().join(format!("chart.{}", format.extension()));
    let renderer = PlottersRenderer {
        output_path: output_path.clone(),
        size: (1200, 600),
        format,
    };
    renderer.render(&sample_chart())?;
    Ok(output_path)
}

/// SVG 内の `<text>` 要素の中身
fn svg_texts(svg: &str) -> Vec<String> {
    svg.split("<text")
        .skip(1)
        .filter_map(|element| {
            let body = &element[element.find('>')? + 1..];
            let end = body.find("</text>")?;
            Some(body[..end].trim().to_string())
        })
        .collect()
}

#[test]
fn test_render_svg_contains_legend_and_price_ticks() {
    let dir = TempDir::new().unwrap();
    let path = render_to(&dir, ImageFormat::Svg).unwrap();

    let svg = std::fs::read_to_string(&path).unwrap();
    assert!(svg.contains(TITLE));
    assert!(svg.contains(LOG_RATIO_LABEL));
    assert!(svg.contains("AVIV Ratio Z-Score &gt; 1.96"));
    assert!(svg.contains("AVIV Ratio Z-Score &lt; -1.96"));
    assert!(svg.contains(PRICE_LABEL));
    let texts = svg_texts(&svg);
    for tick in ["100", "1000", "10000", "100000"] {
        assert!(texts.iter().any(|t| t == tick), "missing tick {}", tick);
    }
    assert!(!svg.contains("1e5"));
}

#[test]
fn test_render_png_writes_image() {
    let dir = TempDir::new().unwrap();
    let path = render_to(&dir, ImageFormat::Png).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));
}

#[test]
fn test_render_into_missing_directory_is_chart_error() {
    let dir = TempDir::new().unwrap();
    let renderer = PlottersRenderer {
        output_path: dir.path().join("missing").join("chart.svg"),
        size: (800, 400),
        format: ImageFormat::Svg,
    };

    let err = renderer.render(&sample_chart()).unwrap_err();
    assert!(matches!(err, AvivError::Chart(_)), "{err:?}");
}
