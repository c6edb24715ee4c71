use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;

use crate::domain::batch::{BatchDocument, NewJob};
use crate::domain::error::AppError;
use crate::infra::metrics::{Metrics, MetricsSummary};
use crate::infra::pipeline_api::{ApiError, PipelineApi};

/// クライアントが公開する状態（UIは読むだけ）
#[derive(Debug, Clone, Serialize)]
pub struct BatchState {
    pub document: Option<BatchDocument>,
    pub loading: bool,
    pub error: Option<AppError>,
    pub server_available: bool,
    pub auto_refresh: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

impl BatchState {
    fn initial(auto_refresh: bool) -> Self {
        Self {
            document: None,
            loading: true,
            error: None,
            server_available: false,
            auto_refresh,
            last_updated: None,
        }
    }
}

/// バッチ進捗のポーリングクライアント。
///
/// ドキュメントとサーバー可用性フラグを排他的に所有し、変更のたびに
/// watch チャネルで購読者へ通知する。変更系アクションは成功後に必ず
/// 再取得して状態を合わせる（楽観的更新はしない）。
pub struct BatchClient {
    api: Arc<dyn PipelineApi>,
    state_tx: watch::Sender<BatchState>,
    /// 発行済みフェッチの連番
    issued_seq: AtomicU64,
    /// 適用済みの最新成功フェッチの連番（watch のロック内でのみ更新）
    applied_seq: AtomicU64,
    metrics: Metrics,
}

impl BatchClient {
    pub fn new(api: Arc<dyn PipelineApi>, auto_refresh: bool) -> Self {
        let (state_tx, _) = watch::channel(BatchState::initial(auto_refresh));
        Self {
            api,
            state_tx,
            issued_seq: AtomicU64::new(0),
            applied_seq: AtomicU64::new(0),
            metrics: Metrics::new(),
        }
    }

    /// 状態変更の購読
    pub fn subscribe(&self) -> watch::Receiver<BatchState> {
        self.state_tx.subscribe()
    }

    /// 現在の状態のスナップショット
    pub fn snapshot(&self) -> BatchState {
        self.state_tx.borrow().clone()
    }

    pub fn metrics(&self) -> MetricsSummary {
        self.metrics.summary()
    }

    pub fn auto_refresh(&self) -> bool {
        self.state_tx.borrow().auto_refresh
    }

    /// 自動更新の切替。現在の状態は破棄しない
    pub fn set_auto_refresh(&self, enabled: bool) {
        let changed = self.state_tx.send_if_modified(|state| {
            if state.auto_refresh == enabled {
                return false;
            }
            state.auto_refresh = enabled;
            true
        });
        if changed {
            log::info!("Auto refresh {}", if enabled { "enabled" } else { "paused" });
        }
    }

    /// ドキュメントとヘルスを同時に取得する（ポーリング1回分）
    pub async fn refresh(&self) {
        tokio::join!(self.fetch_document(), self.check_server_health());
    }

    /// 手動再取得
    pub async fn refetch(&self) {
        self.fetch_document().await;
    }

    /// 進捗ドキュメントを取得して状態を丸ごと置き換える。
    ///
    /// 失敗時はエラーを記録するが、直前のドキュメントは保持する。
    /// 後から発行されたフェッチがすでに適用済みなら、この応答は捨てる。
    pub async fn fetch_document(&self) {
        let seq = self.issued_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let started = Instant::now();
        let result = self.api.fetch_document().await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let mut discarded = false;
        self.state_tx.send_if_modified(|state| {
            if seq < self.applied_seq.load(Ordering::SeqCst) {
                discarded = true;
                let was_loading = state.loading;
                state.loading = false;
                return was_loading;
            }

            match &result {
                Ok(document) => {
                    self.applied_seq.store(seq, Ordering::SeqCst);
                    if !document.summary.is_consistent() {
                        log::debug!("Summary drift from server: {:?}", document.summary);
                    }
                    state.document = Some(document.clone());
                    state.last_updated = Some(Utc::now());
                    state.error = None;
                }
                Err(e) => {
                    log::warn!("Batch data fetch failed (keeping last data): {e}");
                    state.error = Some(AppError::from(e.clone()));
                }
            }
            state.loading = false;
            true
        });

        if discarded {
            log::debug!("Discarding stale fetch #{seq}");
            self.metrics.record_fetch_discarded(elapsed_ms);
        } else {
            self.metrics
                .record_fetch(result.as_ref().err().map(ApiError::code), elapsed_ms);
        }
    }

    /// ヘルスチェック。データ取得の成否とは独立
    pub async fn check_server_health(&self) {
        let started = Instant::now();
        let available = match self.api.check_health().await {
            Ok(()) => true,
            Err(e) => {
                log::debug!("Health check failed: {e}");
                false
            }
        };
        self.metrics
            .record_health(available, started.elapsed().as_millis() as u64);

        let changed = self.state_tx.send_if_modified(|state| {
            if state.server_available == available {
                return false;
            }
            state.server_available = available;
            true
        });
        if changed {
            if available {
                log::info!("Pipeline server online");
            } else {
                log::warn!("Pipeline server offline");
            }
        }
    }

    pub async fn play(&self, slug: &str) -> Result<Value, AppError> {
        let started = Instant::now();
        let result = self.api.play(slug).await;
        self.finish_action("play", slug, started, result).await
    }

    pub async fn pause(&self, slug: &str) -> Result<Value, AppError> {
        let started = Instant::now();
        let result = self.api.pause(slug).await;
        self.finish_action("pause", slug, started, result).await
    }

    pub async fn retry(&self, slug: &str, from_phase: u32) -> Result<Value, AppError> {
        let started = Instant::now();
        let result = self.api.retry(slug, from_phase).await;
        self.finish_action("retry", slug, started, result).await
    }

    /// 新規ジョブ追加。入力検証はネットワーク送信前に行う
    pub async fn add(
        &self,
        title: &str,
        author: &str,
        slug: Option<&str>,
    ) -> Result<Value, AppError> {
        let job = NewJob::new(title, author, slug)?;
        let started = Instant::now();
        let result = self.api.add(&job).await;
        let target = job.slug.clone().unwrap_or_else(|| job.title.clone());
        self.finish_action("add", &target, started, result).await
    }

    /// 成功時は再取得してから返す。失敗は自動リトライせず呼び出し側へ返す
    async fn finish_action(
        &self,
        action: &str,
        target: &str,
        started: Instant,
        result: Result<Value, ApiError>,
    ) -> Result<Value, AppError> {
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(response) => {
                self.metrics.record_action(action, None, elapsed_ms);
                log::info!("Action {action} sent for {target}");
                self.fetch_document().await;
                Ok(response)
            }
            Err(e) => {
                self.metrics
                    .record_action(action, Some(e.to_string()), elapsed_ms);
                log::error!("Action {action} failed for {target}: {e}");
                Err(e.into())
            }
        }
    }
}
