use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio::fs;
use tracing::info;

use crate::api::bitcoin_data::BitcoinDataClient;
use crate::chart::{ImageFormat, PlottersRenderer};
use crate::pipeline::run_pipeline;
use crate::utils::config::Config;
use crate::utils::file::sanitize_filename;

pub const DEFAULT_OUTPUT_NAME: &str = "aviv_ratio_btc_price";

#[derive(Debug, Args)]
pub struct ChartArgs {
    /// 出力ディレクトリ
    #[arg(short, long, default_value = "charts")]
    pub output: PathBuf,

    /// ベースディレクトリ（AVIV_CHART_BASE_DIRをオーバーライド）
    #[arg(long)]
    pub base_dir: Option<PathBuf>,

    /// 出力ファイル名（拡張子なし）
    #[arg(long)]
    pub output_name: Option<String>,

    /// 画像サイズ (WIDTHxHEIGHT)
    #[arg(long, default_value = "1200x600")]
    pub size: String,

    /// 画像形式
    #[arg(long, value_enum, default_value = "png")]
    pub format: ImageFormat,

    /// API のベースURL（BITCOIN_DATA_URLをオーバーライド）
    #[arg(long)]
    pub base_url: Option<String>,

    /// 既存ファイルを強制上書き
    #[arg(long)]
    pub force: bool,

    /// 詳細ログ出力
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Invalid size format: {0}. Expected format: WIDTHxHEIGHT")]
    InvalidSizeFormat(String),
    #[error("Chart file already exists: {0}. Use --force to overwrite")]
    OutputExists(PathBuf),
}

pub async fn run_chart(args: ChartArgs) -> Result<()> {
    let config = Config::from_env();
    let size = parse_size(&args.size)?;
    let output_path = generate_output_path(&args, &config);

    if args.verbose {
        println!("📤 Output path: {}", output_path.display());
    }

    if output_path.exists() && !args.force {
        return Err(CommandError::OutputExists(output_path).into());
    }

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }

    let base_url = args.base_url.clone().unwrap_or(config.base_url);
    let client = BitcoinDataClient::new_with_url(base_url);
    let renderer = PlottersRenderer {
        output_path: output_path.clone(),
        size,
        format: args.format,
    };

    let summary = run_pipeline(&client, &renderer).await.map_err(|err| {
        let step = if err.is_fetch_error() {
            "Failed to fetch series from bitcoin-data API"
        } else {
            "Failed to generate AVIV chart"
        };
        anyhow::Error::new(err).context(step)
    })?;
    info!(%summary, "chart rendered");

    if args.verbose {
        println!("📊 {}", summary);
    }
    println!("✅ Chart generated: {}", output_path.display());

    Ok(())
}

fn generate_output_path(args: &ChartArgs, config: &Config) -> PathBuf {
    let base_dir = args
        .base_dir
        .clone()
        .unwrap_or_else(|| config.base_dir.clone());

    let name = args
        .output_name
        .as_deref()
        .map(sanitize_filename)
        .unwrap_or_else(|| DEFAULT_OUTPUT_NAME.to_string());

    base_dir
        .join(&args.output)
        .join(format!("{}.{}", name, args.format.extension()))
}

fn parse_size(size_str: &str) -> Result<(u32, u32)> {
    let invalid = || CommandError::InvalidSizeFormat(size_str.to_string());

    let parts: Vec<&str> = size_str.split('x').collect();
    if parts.len() != 2 {
        return Err(invalid().into());
    }

    let width = parts[0].parse::<u32>().map_err(|_| invalid())?;
    let height = parts[1].parse::<u32>().map_err(|_| invalid())?;

    if width == 0 || height == 0 {
        return Err(invalid().into());
    }

    Ok((width, height))
}
