use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use crate::error::{AvivError, Result};
use crate::models::{PricePoint, RatioPoint};

pub const DEFAULT_BASE_URL: &str = "https://bitcoin-data.com";
pub const BTC_PRICE_PATH: &str = "/api/v1/btc-price";
pub const AVIV_PATH: &str = "/api/v1/aviv";

/// bitcoin-data.com の時系列 API クライアント
///
/// リトライやタイムアウト設定は行わず、reqwest の既定値に任せる。
pub struct BitcoinDataClient {
    client: Client,
    base_url: String,
}

impl Default for BitcoinDataClient {
    fn default() -> Self {
        Self::new()
    }
}

impl BitcoinDataClient {
    pub fn new() -> Self {
        Self::new_with_url(DEFAULT_BASE_URL.to_string())
    }

    pub fn new_with_url(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn fetch_btc_price_list(&self) -> Result<Vec<PricePoint>> {
        self.fetch_list(BTC_PRICE_PATH).await
    }

    pub async fn fetch_aviv_ratio_list(&self) -> Result<Vec<RatioPoint>> {
        self.fetch_list(AVIV_PATH).await
    }

    async fn fetch_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let url = format!("{}{}", self.base_url, path);
        match self.get_list(&url).await {
            Ok(items) => {
                debug!(%url, count = items.len(), "fetched series");
                Ok(items)
            }
            Err(err) => {
                error!(%url, error = %err, "failed to fetch series");
                Err(err)
            }
        }
    }

    async fn get_list<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>> {
        let network = |source| AvivError::Network {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(network)?;
        let status = response.status();
        let body = response.text().await.map_err(network)?;

        if !status.is_success() {
            return Err(AvivError::bad_status(url, status, &body));
        }

        parse_list(url, &body)
    }
}

/// 空でない JSON 配列を要素型の Vec に変換する
pub(crate) fn parse_list<T: DeserializeOwned>(url: &str, body: &str) -> Result<Vec<T>> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| AvivError::bad_body(url, format!("invalid JSON: {}", e)))?;

    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(AvivError::bad_body(
                url,
                format!("expected a JSON array, got {}", json_kind(&other)),
            ));
        }
    };
    if items.is_empty() {
        return Err(AvivError::bad_body(url, "empty JSON array"));
    }

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value(item)
                .map_err(|e| AvivError::bad_body(url, format!("element {}: {}", i, e)))
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
