use std::env;
use std::path::PathBuf;

use crate::api::bitcoin_data::DEFAULT_BASE_URL;

pub struct Config {
    pub base_url: String,
    pub base_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            base_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            base_url: env::var("BITCOIN_DATA_URL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(default.base_url),
            base_dir: env::var("AVIV_CHART_BASE_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(default.base_dir),
        }
    }
}
