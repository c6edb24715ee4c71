use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::AppError;

/// クライアント設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSettings {
    /// パイプラインサーバーのベースURL
    pub base_url: String,
    /// 進捗ドキュメントのパス
    pub document_path: String,
    /// 制御APIのパス
    pub api_base: String,
    /// ポーリング間隔（ミリ秒）
    pub poll_interval_ms: u64,
    /// リクエストごとのタイムアウト秒数
    pub request_timeout_secs: u64,
    /// パイプラインのフェーズ数
    pub max_phases: u32,
    /// 起動時に自動更新を有効にするか
    pub auto_refresh: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            document_path: "/batch-progress.json".to_string(),
            api_base: "/api/pipeline".to_string(),
            poll_interval_ms: 2000,
            request_timeout_secs: 10,
            max_phases: 11,
            auto_refresh: true,
        }
    }
}

impl ClientSettings {
    /// デフォルト値に `BP_*` 環境変数を上書きする
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意のキー解決関数から設定を組み立てる（解釈できない値は無視）
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();

        if let Some(v) = lookup("BP_BASE_URL") {
            settings.base_url = v;
        }
        if let Some(v) = lookup("BP_DOCUMENT_PATH") {
            settings.document_path = v;
        }
        if let Some(v) = lookup("BP_API_BASE") {
            settings.api_base = v;
        }
        apply_parsed(&lookup, "BP_POLL_INTERVAL_MS", &mut settings.poll_interval_ms);
        apply_parsed(
            &lookup,
            "BP_REQUEST_TIMEOUT_SECS",
            &mut settings.request_timeout_secs,
        );
        apply_parsed(&lookup, "BP_MAX_PHASES", &mut settings.max_phases);
        apply_parsed(&lookup, "BP_AUTO_REFRESH", &mut settings.auto_refresh);

        settings
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.poll_interval_ms == 0 {
            return Err(AppError::invalid_input("poll_interval_ms must be > 0"));
        }
        if self.request_timeout_secs == 0 {
            return Err(AppError::invalid_input("request_timeout_secs must be > 0"));
        }
        if self.max_phases == 0 {
            return Err(AppError::invalid_input("max_phases must be > 0"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn apply_parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) {
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(v) => *target = v,
            Err(_) => log::warn!("Ignoring invalid value for {key}: {raw:?}"),
        }
    }
}
