use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::domain::batch::NewJob;
use crate::domain::error::AppError;
use crate::domain::settings::ClientSettings;
use crate::domain::view::{action_gate, ActionGate, BatchView, JobAction, StatusFilter};
use crate::infra::metrics::MetricsSummary;
use crate::infra::pipeline_api::{HttpPipelineApi, PipelineApi};
use crate::usecase::batch_client::{BatchClient, BatchState};
use crate::usecase::poller::Poller;

/// 操作の結果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "response", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// サーバーへ送信し、成功応答を受けた
    Executed(Value),
    /// デモ表示中のため送信せずに成功扱い
    Simulated,
}

/// アプリケーションサービス（表示層から唯一触れる入口）
pub struct AppService {
    settings: ClientSettings,
    client: Arc<BatchClient>,
    poller: Mutex<Option<Poller>>,
}

impl AppService {
    pub fn new(settings: ClientSettings, api: Arc<dyn PipelineApi>) -> Self {
        let client = Arc::new(BatchClient::new(api, settings.auto_refresh));
        Self {
            settings,
            client,
            poller: Mutex::new(None),
        }
    }

    /// 設定を検証して HTTP クライアント付きで構築する
    pub fn from_settings(settings: ClientSettings) -> Result<Self, AppError> {
        settings.validate()?;
        let api = HttpPipelineApi::new(&settings)?;
        log::info!(
            "Pipeline client configured: base_url={} interval={}ms",
            settings.base_url,
            settings.poll_interval_ms
        );
        Ok(Self::new(settings, Arc::new(api)))
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn client(&self) -> &Arc<BatchClient> {
        &self.client
    }

    pub fn state(&self) -> BatchState {
        self.client.snapshot()
    }

    pub fn metrics(&self) -> MetricsSummary {
        self.client.metrics()
    }

    // ==================== Polling ====================

    /// ポーリング開始（実行中なら何もしない）。tokio ランタイム内で呼ぶこと
    pub fn start_polling(&self) {
        let mut poller = self.poller.lock();
        if poller.as_ref().is_some_and(Poller::is_running) {
            return;
        }
        *poller = Some(Poller::start(
            self.client.clone(),
            self.settings.poll_interval(),
        ));
    }

    pub fn stop_polling(&self) {
        if let Some(mut poller) = self.poller.lock().take() {
            poller.stop();
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller.lock().as_ref().is_some_and(Poller::is_running)
    }

    pub fn set_auto_refresh(&self, enabled: bool) {
        self.client.set_auto_refresh(enabled);
    }

    /// 自動更新を反転し、新しい値を返す
    pub fn toggle_auto_refresh(&self) -> bool {
        let enabled = !self.client.auto_refresh();
        self.client.set_auto_refresh(enabled);
        enabled
    }

    /// 取得とヘルスチェックを1回だけ行う
    pub async fn refresh_once(&self) {
        self.client.refresh().await;
    }

    pub async fn refetch(&self) {
        self.client.refetch().await;
    }

    /// 現在の状態から表示用ビューモデルを組み立てる（実データがなければデモ）
    pub fn view(&self, search_query: &str, filter: StatusFilter) -> BatchView {
        let state = self.client.snapshot();
        BatchView::build(
            state.document.as_ref(),
            search_query,
            filter,
            self.settings.max_phases,
        )
    }

    // ==================== Actions ====================

    fn gate(&self) -> ActionGate {
        let state = self.client.snapshot();
        action_gate(state.document.is_some(), state.server_available)
    }

    /// play/pause/retry をサーバー状態に応じて実行・シミュレート・拒否する
    pub async fn run_action(
        &self,
        action: JobAction,
        slug: &str,
        from_phase: u32,
    ) -> Result<ActionOutcome, AppError> {
        match self.gate() {
            ActionGate::Blocked => Err(AppError::server_offline(
                "Inicie o backend Python para executar ações.",
            )),
            ActionGate::Simulate => {
                log::info!("Simulated {} for {slug} (demo mode)", action.as_str());
                Ok(ActionOutcome::Simulated)
            }
            ActionGate::Execute => {
                let response = match action {
                    JobAction::Play => self.client.play(slug).await?,
                    JobAction::Pause => self.client.pause(slug).await?,
                    JobAction::Retry => self.client.retry(slug, from_phase).await?,
                };
                Ok(ActionOutcome::Executed(response))
            }
        }
    }

    /// 新規ジョブ追加。入力検証はゲート判定より先に行う
    pub async fn add_job(
        &self,
        title: &str,
        author: &str,
        slug: Option<&str>,
    ) -> Result<ActionOutcome, AppError> {
        NewJob::new(title, author, slug)?;

        match self.gate() {
            ActionGate::Blocked => Err(AppError::server_offline(
                "Inicie o backend Python para adicionar livros.",
            )),
            ActionGate::Simulate => {
                log::info!("Simulated add for {title} (demo mode)");
                Ok(ActionOutcome::Simulated)
            }
            ActionGate::Execute => {
                let response = self.client.add(title, author, slug).await?;
                Ok(ActionOutcome::Executed(response))
            }
        }
    }
}

impl Drop for AppService {
    fn drop(&mut self) {
        self.stop_polling();
    }
}
