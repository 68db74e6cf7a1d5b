use tracing::info;

use crate::api::bitcoin_data::BitcoinDataClient;
use crate::chart::{AvivChart, ChartRenderer, ChartSummary};
use crate::error::Result;
use crate::merge::merge_price_and_aviv;
use crate::models::MergedRecord;

/// 2系列を順番に取得して結合する
///
/// 2つの取得は互いに独立しており、片方が失敗してももう片方は実行する。
/// どちらかが失敗した場合は結合に進まずにエラーを返す。
pub async fn load_merged_records(client: &BitcoinDataClient) -> Result<Vec<MergedRecord>> {
    info!(base_url = client.base_url(), "fetching BTC price and AVIV ratio");
    let prices = client.fetch_btc_price_list().await;
    let ratios = client.fetch_aviv_ratio_list().await;
    let (prices, ratios) = (prices?, ratios?);
    info!(
        prices = prices.len(),
        ratios = ratios.len(),
        "fetched both series"
    );

    let records = merge_price_and_aviv(&prices, &ratios)?;
    info!(records = records.len(), "merged series");
    Ok(records)
}

/// 取得 → 結合 → 描画
pub async fn run_pipeline<R: ChartRenderer>(
    client: &BitcoinDataClient,
    renderer: &R,
) -> Result<ChartSummary> {
    let records = load_merged_records(client).await?;
    let chart = AvivChart::new(records)?;
    renderer.render(&chart)?;
    Ok(chart.summary())
}
