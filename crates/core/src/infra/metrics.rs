use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::domain::error::ErrorCode;

/// レイテンシ記録の保持上限
const LATENCY_CAPACITY: usize = 1000;
/// サマリーに載せる直近レイテンシ件数
const RECENT_LATENCIES: usize = 20;

/// リクエスト種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Fetch,
    Health,
    Action,
}

#[derive(Debug, Clone, Serialize)]
pub struct LatencyRecord {
    pub kind: RequestKind,
    pub duration_ms: u64,
    pub at: DateTime<Utc>,
}

/// 直近のフェッチ結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchOutcome {
    pub at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchStats {
    pub ok: u64,
    pub failed: u64,
    /// 後発リクエストに追い越されて破棄された応答数
    pub discarded: u64,
    pub last: Option<FetchOutcome>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HealthStats {
    pub online: u64,
    pub offline: u64,
    /// online/offline が切り替わった回数（初回判定は含めない）
    pub transitions: u64,
    pub last_available: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ActionStats {
    pub ok: u64,
    pub failed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvgLatency {
    pub fetch: Option<f64>,
    pub health: Option<f64>,
    pub action: Option<f64>,
}

/// メトリクスサマリー（`metrics` コマンドで出力）
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub fetch: FetchStats,
    pub health: HealthStats,
    /// 操作名（play, pause, retry, add）ごとの集計
    pub actions: BTreeMap<String, ActionStats>,
    pub avg_latency_ms: AvgLatency,
    pub recent_latencies: Vec<LatencyRecord>,
}

#[derive(Default)]
struct MetricsInner {
    fetch: FetchStats,
    health: HealthStats,
    actions: BTreeMap<String, ActionStats>,
    latencies: VecDeque<LatencyRecord>,
}

impl MetricsInner {
    fn push_latency(&mut self, kind: RequestKind, duration_ms: u64) {
        if self.latencies.len() == LATENCY_CAPACITY {
            self.latencies.pop_front();
        }
        self.latencies.push_back(LatencyRecord {
            kind,
            duration_ms,
            at: Utc::now(),
        });
    }

    fn avg(&self, kind: RequestKind) -> Option<f64> {
        let (count, sum) = self
            .latencies
            .iter()
            .filter(|r| r.kind == kind)
            .fold((0u64, 0u64), |(n, s), r| (n + 1, s + r.duration_ms));
        (count > 0).then(|| sum as f64 / count as f64)
    }
}

/// パイプライン通信のメトリクス収集器
#[derive(Default)]
pub struct Metrics {
    inner: Mutex<MetricsInner>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 適用されたフェッチ結果を記録する
    pub fn record_fetch(&self, error_code: Option<ErrorCode>, duration_ms: u64) {
        let mut inner = self.inner.lock();
        if error_code.is_some() {
            inner.fetch.failed += 1;
        } else {
            inner.fetch.ok += 1;
        }
        inner.fetch.last = Some(FetchOutcome {
            at: Utc::now(),
            error_code,
        });
        inner.push_latency(RequestKind::Fetch, duration_ms);
    }

    /// 古い応答として捨てたフェッチ。`last` は更新しない
    pub fn record_fetch_discarded(&self, duration_ms: u64) {
        let mut inner = self.inner.lock();
        inner.fetch.discarded += 1;
        inner.push_latency(RequestKind::Fetch, duration_ms);
    }

    pub fn record_health(&self, available: bool, duration_ms: u64) {
        let mut inner = self.inner.lock();
        if available {
            inner.health.online += 1;
        } else {
            inner.health.offline += 1;
        }
        if inner.health.last_available.is_some_and(|prev| prev != available) {
            inner.health.transitions += 1;
        }
        inner.health.last_available = Some(available);
        inner.push_latency(RequestKind::Health, duration_ms);
    }

    pub fn record_action(&self, action: &str, error: Option<String>, duration_ms: u64) {
        let mut inner = self.inner.lock();
        let stats = inner.actions.entry(action.to_string()).or_default();
        match error {
            Some(message) => {
                stats.failed += 1;
                stats.last_error = Some(message);
            }
            None => stats.ok += 1,
        }
        inner.push_latency(RequestKind::Action, duration_ms);
    }

    pub fn summary(&self) -> MetricsSummary {
        let inner = self.inner.lock();
        MetricsSummary {
            fetch: inner.fetch.clone(),
            health: inner.health.clone(),
            actions: inner.actions.clone(),
            avg_latency_ms: AvgLatency {
                fetch: inner.avg(RequestKind::Fetch),
                health: inner.avg(RequestKind::Health),
                action: inner.avg(RequestKind::Action),
            },
            recent_latencies: inner
                .latencies
                .iter()
                .rev()
                .take(RECENT_LATENCIES)
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_stats_track_last_outcome() {
        let m = Metrics::new();
        m.record_fetch(None, 10);
        m.record_fetch(Some(ErrorCode::Timeout), 1000);
        m.record_fetch_discarded(5);

        let s = m.summary();
        assert_eq!(s.fetch.ok, 1);
        assert_eq!(s.fetch.failed, 1);
        assert_eq!(s.fetch.discarded, 1);
        assert_eq!(
            s.fetch.last.as_ref().and_then(|l| l.error_code),
            Some(ErrorCode::Timeout)
        );
    }

    #[test]
    fn test_health_transitions() {
        let m = Metrics::new();
        m.record_health(false, 1);
        m.record_health(false, 1);
        m.record_health(true, 1);
        m.record_health(false, 1);

        let s = m.summary();
        assert_eq!(s.health.online, 1);
        assert_eq!(s.health.offline, 3);
        assert_eq!(s.health.transitions, 2);
        assert_eq!(s.health.last_available, Some(false));
    }

    #[test]
    fn test_actions_broken_down_by_name() {
        let m = Metrics::new();
        m.record_action("play", None, 30);
        m.record_action("play", Some("HTTP 409: already completed".into()), 20);
        m.record_action("retry", None, 40);

        let s = m.summary();
        assert_eq!(s.actions["play"].ok, 1);
        assert_eq!(s.actions["play"].failed, 1);
        assert_eq!(
            s.actions["play"].last_error.as_deref(),
            Some("HTTP 409: already completed")
        );
        assert_eq!(s.actions["retry"].ok, 1);
        assert!(!s.actions.contains_key("pause"));
        assert!((s.avg_latency_ms.action.unwrap() - 30.0).abs() < f64::EPSILON);
        assert!(s.avg_latency_ms.health.is_none());
    }

    #[test]
    fn test_latency_window_is_bounded() {
        let m = Metrics::new();
        for i in 0..1100 {
            m.record_fetch(None, i);
        }
        assert_eq!(m.inner.lock().latencies.len(), LATENCY_CAPACITY);

        let s = m.summary();
        assert_eq!(s.recent_latencies.len(), RECENT_LATENCIES);
        assert_eq!(s.recent_latencies[0].duration_ms, 1099);
        // 残っているのは 100..1100
        assert!((s.avg_latency_ms.fetch.unwrap() - 599.5).abs() < f64::EPSILON);
    }
}
