use serde::{Deserialize, Serialize};

use super::report::ThemeMode;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000/analyze";
pub const DEFAULT_ERROR_DISMISS_MS: u64 = 6000;

pub const ENV_ENDPOINT: &str = "TA_ENDPOINT";
pub const ENV_ERROR_DISMISS_MS: &str = "TA_ERROR_DISMISS_MS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "TA_REQUEST_TIMEOUT_SECS";
pub const ENV_THEME: &str = "TA_THEME";

/// アプリケーション設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// 解析サービスの URL（POST 先）
    pub endpoint: String,
    /// エラー通知の自動消去までの時間（ミリ秒）
    pub error_dismiss_ms: u64,
    /// リクエストタイムアウト秒数。None ならトランスポート既定値。
    pub request_timeout_secs: Option<u64>,
    /// 表示テーマ
    pub theme: ThemeMode,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            error_dismiss_ms: DEFAULT_ERROR_DISMISS_MS,
            request_timeout_secs: None,
            theme: ThemeMode::Light,
        }
    }
}

impl AppSettings {
    /// 既定値に環境変数を重ねる
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// 任意のソースから上書きする。不正な値は警告して無視する。
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup(ENV_ENDPOINT).filter(|v| !v.trim().is_empty()) {
            self.endpoint = endpoint.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_ERROR_DISMISS_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.error_dismiss_ms = ms,
                Err(e) => log::warn!("{ENV_ERROR_DISMISS_MS}={raw:?} ignored: {e}"),
            }
        }
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.request_timeout_secs = Some(secs),
                Err(e) => log::warn!("{ENV_REQUEST_TIMEOUT_SECS}={raw:?} ignored: {e}"),
            }
        }
        if let Some(raw) = lookup(ENV_THEME) {
            match raw.parse::<ThemeMode>() {
                Ok(theme) => self.theme = theme,
                Err(e) => log::warn!("{ENV_THEME} ignored: {e}"),
            }
        }
        self
    }
}
