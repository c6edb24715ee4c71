use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use super::batch_client::BatchClient;

/// ポーリングのライフサイクル（start/stop を明示的に所有する）
///
/// 開始直後に1回取得し、自動更新が有効な間は一定間隔で取得とヘルス
/// チェックを繰り返す。stop/drop で将来の取得だけを止め、実行中の
/// リクエストはそのまま完了させる。
pub struct Poller {
    handle: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Poller {
    /// tokio ランタイム上でポーリングタスクを開始する
    pub fn start(client: Arc<BatchClient>, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(Self::polling_loop(client, interval, shutdown_rx));
        Self {
            handle: Some(handle),
            shutdown_tx,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// ポーリングを停止する。タスクは実行中の取得を終えてから抜ける
    pub fn stop(&mut self) {
        if self.handle.take().is_some() {
            self.shutdown_tx.send_replace(true);
            log::debug!("Poller stopped");
        }
    }

    async fn polling_loop(
        client: Arc<BatchClient>,
        interval: Duration,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut state_rx = client.subscribe();
        let mut auto_refresh = state_rx.borrow_and_update().auto_refresh;

        client.refresh().await;

        loop {
            if auto_refresh {
                let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        // 停止と無効化をティックより優先する
                        biased;
                        _ = shutdown_rx.changed() => return,
                        changed = state_rx.changed() => {
                            if changed.is_err() {
                                return;
                            }
                            if !state_rx.borrow_and_update().auto_refresh {
                                auto_refresh = false;
                                break;
                            }
                        }
                        _ = ticker.tick() => {
                            log::debug!("Poll tick");
                            client.refresh().await;
                        }
                    }
                }
            } else {
                // 再有効化を待つ
                loop {
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.changed() => return,
                        changed = state_rx.changed() => {
                            if changed.is_err() {
                                return;
                            }
                            if state_rx.borrow_and_update().auto_refresh {
                                break;
                            }
                        }
                    }
                }
                auto_refresh = true;
                client.refresh().await;
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::batch::{BatchJob, JobStatus};
    use crate::usecase::batch_client::tests::FakeApi;
    use std::sync::atomic::Ordering;

    const INTERVAL: Duration = Duration::from_millis(2000);

    fn setup(auto_refresh: bool) -> (Arc<FakeApi>, Arc<BatchClient>) {
        let api = Arc::new(FakeApi::with_jobs(vec![BatchJob::new(
            "Atomic Habits",
            "James Clear",
            JobStatus::Pending,
        )]));
        let client = Arc::new(BatchClient::new(api.clone(), auto_refresh));
        (api, client)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetches_immediately_on_start() {
        let (api, client) = setup(true);
        let _poller = Poller::start(client.clone(), INTERVAL);

        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(api.fetch_count(), 1);
        assert_eq!(api.health_checks.load(Ordering::SeqCst), 1);
        assert!(client.snapshot().document.is_some());
        assert!(client.snapshot().server_available);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_on_interval() {
        let (api, client) = setup(true);
        let _poller = Poller::start(client, INTERVAL);

        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(api.fetch_count(), 1);

        time::sleep(INTERVAL).await;
        assert_eq!(api.fetch_count(), 2);

        time::sleep(INTERVAL * 2).await;
        assert_eq!(api.fetch_count(), 4);
        assert_eq!(api.health_checks.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabling_auto_refresh_stops_fetches() {
        let (api, client) = setup(true);
        let _poller = Poller::start(client.clone(), INTERVAL);

        time::sleep(INTERVAL + Duration::from_millis(10)).await;
        assert_eq!(api.fetch_count(), 2);

        client.set_auto_refresh(false);
        let before = api.fetch_count();
        time::sleep(INTERVAL * 2 + Duration::from_millis(100)).await;
        assert_eq!(api.fetch_count(), before);
        // 状態は破棄されない
        assert!(client.snapshot().document.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reenabling_resumes_immediately() {
        let (api, client) = setup(false);
        let _poller = Poller::start(client.clone(), INTERVAL);

        time::sleep(INTERVAL * 3).await;
        // 開始時の1回のみ
        assert_eq!(api.fetch_count(), 1);

        client.set_auto_refresh(true);
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(api.fetch_count(), 2);

        time::sleep(INTERVAL).await;
        assert_eq!(api.fetch_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_clears_timer() {
        let (api, client) = setup(true);
        let poller = Poller::start(client, INTERVAL);
        time::sleep(Duration::from_millis(10)).await;
        assert!(poller.is_running());

        drop(poller);
        let before = api.fetch_count();
        time::sleep(INTERVAL * 3).await;
        assert_eq!(api.fetch_count(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_keeps_polling() {
        let (api, client) = setup(true);
        let _poller = Poller::start(client.clone(), INTERVAL);
        time::sleep(Duration::from_millis(10)).await;

        api.fail_fetch.store(true, Ordering::SeqCst);
        time::sleep(INTERVAL).await;
        let state = client.snapshot();
        assert!(state.error.is_some());
        assert!(state.document.is_some());

        api.fail_fetch.store(false, Ordering::SeqCst);
        time::sleep(INTERVAL).await;
        assert!(client.snapshot().error.is_none());
        assert_eq!(api.fetch_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_lets_in_flight_fetch_finish() {
        let (api, client) = setup(true);
        *api.fetch_delay.lock() = Some(Duration::from_millis(500));
        let mut poller = Poller::start(client.clone(), INTERVAL);

        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(api.fetch_count(), 1);
        assert!(client.snapshot().loading);

        poller.stop();
        assert!(!poller.is_running());

        time::sleep(INTERVAL * 2).await;
        let state = client.snapshot();
        assert!(!state.loading);
        assert!(state.document.is_some());
        assert_eq!(api.fetch_count(), 1);
        assert_eq!(client.metrics().fetch.ok, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_during_tick_fetch_completes_it() {
        let (api, client) = setup(true);
        let poller = Poller::start(client.clone(), INTERVAL);
        time::sleep(Duration::from_millis(10)).await;

        *api.fetch_delay.lock() = Some(Duration::from_millis(500));
        time::sleep(INTERVAL + Duration::from_millis(100)).await;
        assert_eq!(api.fetch_count(), 2);

        drop(poller);
        time::sleep(INTERVAL * 3).await;
        assert_eq!(api.fetch_count(), 2);
        assert_eq!(client.metrics().fetch.ok, 2);
        assert!(!client.snapshot().loading);
    }
}
