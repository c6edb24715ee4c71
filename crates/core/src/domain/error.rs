use serde::Serialize;

/// アプリケーション共通エラーコード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    #[serde(rename = "E_NETWORK")]
    Network,
    #[serde(rename = "E_TIMEOUT")]
    Timeout,
    #[serde(rename = "E_HTTP_STATUS")]
    HttpStatus,
    #[serde(rename = "E_DECODE")]
    Decode,
    #[serde(rename = "E_SERVER_OFFLINE")]
    ServerOffline,
    #[serde(rename = "E_INVALID_INPUT")]
    InvalidInput,
    #[serde(rename = "E_INTERNAL")]
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "E_NETWORK",
            Self::Timeout => "E_TIMEOUT",
            Self::HttpStatus => "E_HTTP_STATUS",
            Self::Decode => "E_DECODE",
            Self::ServerOffline => "E_SERVER_OFFLINE",
            Self::InvalidInput => "E_INVALID_INPUT",
            Self::Internal => "E_INTERNAL",
        }
    }
}

/// アプリケーションエラー（イベントペイロード兼用）
///
/// ネットワーク障害・非2xx・JSON不正はすべてここに畳み込まれる。
/// 呼び出し側は `code` でメッセージを出し分ける。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    pub recoverable: bool,
}

impl AppError {
    pub fn network(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Network,
            message: msg.into(),
            recoverable: true,
        }
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Timeout,
            message: msg.into(),
            recoverable: true,
        }
    }

    pub fn http_status(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::HttpStatus,
            message: msg.into(),
            recoverable: true,
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Decode,
            message: msg.into(),
            recoverable: false,
        }
    }

    pub fn server_offline(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::ServerOffline,
            message: msg.into(),
            recoverable: true,
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidInput,
            message: msg.into(),
            recoverable: true,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Internal,
            message: msg.into(),
            recoverable: false,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}
