use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use bp_core::domain::error::AppError;
use bp_core::domain::view::BatchView;
use bp_core::usecase::app_service::ActionOutcome;

/// イベント名定数
pub const BATCH_STATE_CHANGED: &str = "batch_state_changed";
pub const SERVER_STATUS: &str = "server_status";
pub const ACTION_DONE: &str = "action_done";
pub const ERROR: &str = "error";

#[derive(Serialize)]
struct Envelope<'a, S: Serialize> {
    event: &'a str,
    payload: S,
}

/// 統一イベント送信関数（標準出力に JSON 1行）
pub fn emit_event<S: Serialize>(event_name: &str, payload: S) {
    let envelope = Envelope {
        event: event_name,
        payload,
    };
    let line = match serde_json::to_string(&envelope) {
        Ok(line) => line,
        Err(e) => {
            log::error!("イベント送信失敗 [{event_name}]: {e}");
            return;
        }
    };
    let mut stdout = std::io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{line}") {
        log::error!("イベント送信失敗 [{event_name}]: {e}");
    }
}

/// batch_state_changed ペイロード
#[derive(Debug, Clone, Serialize)]
pub struct BatchStateChangedPayload {
    pub loading: bool,
    pub server_available: bool,
    pub auto_refresh: bool,
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<AppError>,
    pub view: BatchView,
}

/// server_status ペイロード
#[derive(Debug, Clone, Serialize)]
pub struct ServerStatusPayload {
    pub available: bool,
    pub base_url: String,
}

/// action_done ペイロード
#[derive(Debug, Clone, Serialize)]
pub struct ActionDonePayload {
    pub action: String,
    pub target: String,
    pub result: ActionOutcome,
}

/// error ペイロード
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl ErrorPayload {
    pub fn from_app_error(e: &AppError, target: Option<&str>) -> Self {
        Self {
            code: e.code.as_str().to_string(),
            message: e.message.clone(),
            recoverable: e.recoverable,
            target: target.map(str::to_string),
        }
    }
}

impl ActionDonePayload {
    /// `action` は play/pause/retry/add のいずれか
    pub fn new(action: &str, target: &str, result: ActionOutcome) -> Self {
        Self {
            action: action.to_string(),
            target: target.to_string(),
            result,
        }
    }
}
