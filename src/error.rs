use reqwest::StatusCode;

/// パイプライン各段階のエラー
#[derive(Debug, thiserror::Error)]
pub enum AvivError {
    #[error("Request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Bad response from {url}: {reason}")]
    BadResponse { url: String, reason: String },
    #[error("Cannot parse {field} for date key {date_key:?}: {value:?}")]
    TypeCoercion {
        field: &'static str,
        date_key: String,
        value: String,
    },
    #[error("No dates on or after {start} are shared by the price and AVIV series")]
    EmptyJoin { start: chrono::NaiveDate },
    #[error("Chart generation error: {0}")]
    Chart(String),
}

impl AvivError {
    pub(crate) fn bad_status(url: &str, status: StatusCode, body: &str) -> Self {
        const MAX_BODY: usize = 200;
        let excerpt: String = body.chars().take(MAX_BODY).collect();
        AvivError::BadResponse {
            url: url.to_string(),
            reason: format!("HTTP {}: {}", status, excerpt.trim()),
        }
    }

    pub(crate) fn bad_body(url: &str, reason: impl Into<String>) -> Self {
        AvivError::BadResponse {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// 取得段階のエラー（描画前に中断すべきもの）か
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            AvivError::Network { .. } | AvivError::BadResponse { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AvivError>;
