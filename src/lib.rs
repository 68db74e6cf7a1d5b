pub mod api;
pub mod chart;
pub mod commands;
pub mod error;
pub mod logging;
pub mod merge;
pub mod models;
pub mod pipeline;
pub mod stats;
pub mod utils;

use anyhow::Result;
use clap::Parser;

pub use error::AvivError;

#[derive(Parser)]
#[clap(name = "aviv_chart")]
#[clap(about = "Chart the log AVIV ratio against the BTC price from bitcoin-data.com")]
#[clap(version)]
pub struct Cli {
    #[clap(flatten)]
    pub chart: commands::chart::ChartArgs,
}

pub async fn run(cli: Cli) -> Result<()> {
    commands::chart::run_chart(cli.chart).await
}
