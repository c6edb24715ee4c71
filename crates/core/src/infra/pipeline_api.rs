use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::domain::batch::{BatchDocument, NewJob};
use crate::domain::error::{AppError, ErrorCode};
use crate::domain::settings::ClientSettings;

/// パイプラインAPIエラー
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request timeout")]
    Timeout,
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Response parse error: {0}")]
    Decode(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::Network(_) => ErrorCode::Network,
            ApiError::Timeout => ErrorCode::Timeout,
            ApiError::Status { .. } => ErrorCode::HttpStatus,
            ApiError::Decode(_) => ErrorCode::Decode,
            ApiError::InvalidUrl(_) => ErrorCode::Internal,
        }
    }
}

impl From<ApiError> for AppError {
    fn from(e: ApiError) -> Self {
        let msg = e.to_string();
        match e.code() {
            ErrorCode::Network => AppError::network(msg),
            ErrorCode::Timeout => AppError::timeout(msg),
            ErrorCode::HttpStatus => AppError::http_status(msg),
            ErrorCode::Decode => AppError::decode(msg),
            _ => AppError::internal(msg),
        }
    }
}

/// パイプラインサーバーへのアクセス trait（読み取り + 制御）
#[async_trait]
pub trait PipelineApi: Send + Sync {
    /// 進捗ドキュメントを取得する（キャッシュ回避トークン付き）
    async fn fetch_document(&self) -> Result<BatchDocument, ApiError>;

    /// ヘルスチェック。2xx のみ Ok
    async fn check_health(&self) -> Result<(), ApiError>;

    async fn play(&self, slug: &str) -> Result<Value, ApiError>;

    async fn pause(&self, slug: &str) -> Result<Value, ApiError>;

    async fn retry(&self, slug: &str, from_phase: u32) -> Result<Value, ApiError>;

    async fn add(&self, job: &NewJob) -> Result<Value, ApiError>;
}

#[derive(Serialize)]
struct RetryRequest {
    from_phase: u32,
}

/// reqwest を使用した HTTP 実装
pub struct HttpPipelineApi {
    client: reqwest::Client,
    base_url: String,
    document_path: String,
    api_base: String,
}

impl HttpPipelineApi {
    pub fn new(settings: &ClientSettings) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            document_path: settings.document_path.clone(),
            api_base: settings.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> Result<reqwest::Url, ApiError> {
        reqwest::Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| ApiError::InvalidUrl(format!("{path}: {e}")))
    }

    /// `{api_base}/books/{slug}/{action}`（slug はパーセントエンコードされる）
    fn book_url(&self, slug: &str, action: &str) -> Result<reqwest::Url, ApiError> {
        let mut url = self.url(&self.api_base)?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(["books", slug, action]);
        Ok(url)
    }

    async fn post(&self, url: reqwest::Url, body: Option<Value>) -> Result<Value, ApiError> {
        log::debug!("POST {url}");
        let mut request = self.client.post(url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        read_json(response).await
    }
}

/// 非2xx は Status エラー、空ボディは Null として扱う
async fn read_json(response: reqwest::Response) -> Result<Value, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let text = response.text().await?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
}

#[async_trait]
impl PipelineApi for HttpPipelineApi {
    async fn fetch_document(&self) -> Result<BatchDocument, ApiError> {
        let url = self.url(&self.document_path)?;
        let cache_buster = chrono::Utc::now().timestamp_millis().to_string();
        log::debug!("GET {url}?t={cache_buster}");

        let response = self
            .client
            .get(url)
            .query(&[("t", cache_buster.as_str())])
            .send()
            .await?;

        let value = read_json(response).await?;
        let document: BatchDocument =
            serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(document.normalize())
    }

    async fn check_health(&self) -> Result<(), ApiError> {
        let url = self.url(&format!("{}/", self.api_base))?;
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ApiError::Status {
                status: status.as_u16(),
                body: String::new(),
            })
        }
    }

    async fn play(&self, slug: &str) -> Result<Value, ApiError> {
        let url = self.book_url(slug, "play")?;
        self.post(url, None).await
    }

    async fn pause(&self, slug: &str) -> Result<Value, ApiError> {
        let url = self.book_url(slug, "pause")?;
        self.post(url, None).await
    }

    async fn retry(&self, slug: &str, from_phase: u32) -> Result<Value, ApiError> {
        let url = self.book_url(slug, "retry")?;
        let body = serde_json::to_value(RetryRequest { from_phase })
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        self.post(url, Some(body)).await
    }

    async fn add(&self, job: &NewJob) -> Result<Value, ApiError> {
        let url = self.url(&format!("{}/books", self.api_base))?;
        let body = serde_json::to_value(job).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.post(url, Some(body)).await
    }
}
