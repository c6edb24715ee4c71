//! 表示用ビューモデルの導出。
//!
//! すべて純粋関数で、状態は持たない。入力ドキュメントは変更しない。

use std::borrow::Cow;

use chrono::NaiveDateTime;
use serde::Serialize;

use super::batch::{BatchDocument, BatchJob, BatchSummary, JobStatus};
use super::demo;

/// 状態フィルタ（"all" または単一ステータス）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(JobStatus),
}

impl StatusFilter {
    pub fn parse(s: &str) -> Option<Self> {
        if s == "all" {
            return Some(Self::All);
        }
        JobStatus::parse(s).map(Self::Only)
    }

    pub fn matches(&self, status: JobStatus) -> bool {
        match self {
            Self::All => true,
            Self::Only(expected) => *expected == status,
        }
    }
}

/// タイトル・著者・slug の部分一致（大文字小文字無視）と状態一致の AND で絞り込む。
/// 元の順序を保つ。
pub fn filter_jobs(jobs: &[BatchJob], search_query: &str, filter: StatusFilter) -> Vec<BatchJob> {
    let query = search_query.to_lowercase();
    jobs.iter()
        .filter(|job| {
            let matches_search = job.title.to_lowercase().contains(&query)
                || job.author.to_lowercase().contains(&query)
                || job.slug.to_lowercase().contains(&query);
            matches_search && filter.matches(job.status)
        })
        .cloned()
        .collect()
}

/// 全体進捗（%）。total == 0 なら 0。集計値のドリフトで 100 を超えないよう丸める
pub fn compute_overall_progress(summary: &BatchSummary) -> u32 {
    if summary.total == 0 {
        return 0;
    }
    let pct = (f64::from(summary.completed) / f64::from(summary.total) * 100.0).round();
    pct.min(100.0) as u32
}

/// ジョブ単位の進捗（%）。completed は current_phase に関係なく常に 100
pub fn compute_phase_progress(job: &BatchJob, max_phases: u32) -> u32 {
    if job.status == JobStatus::Completed {
        return 100;
    }
    let phase = job.phase();
    if phase == 0 || max_phases == 0 {
        return 0;
    }
    let pct = (f64::from(phase) / f64::from(max_phases) * 100.0).round();
    pct.min(100.0) as u32
}

/// バッジ表示設定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusConfig {
    pub label: &'static str,
    pub variant: &'static str,
}

pub fn status_config(status: JobStatus) -> StatusConfig {
    match status {
        JobStatus::InProgress => StatusConfig {
            label: "Em Progresso",
            variant: "warning",
        },
        JobStatus::Completed => StatusConfig {
            label: "Concluído",
            variant: "success",
        },
        JobStatus::Failed => StatusConfig {
            label: "Falhou",
            variant: "destructive",
        },
        JobStatus::Pending => StatusConfig {
            label: "Pendente",
            variant: "secondary",
        },
    }
}

/// ジョブに対する操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobAction {
    Play,
    Pause,
    Retry,
}

impl JobAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Retry => "retry",
        }
    }
}

/// 状態ごとに実行可能な操作
pub fn available_actions(status: JobStatus) -> &'static [JobAction] {
    match status {
        JobStatus::Pending => &[JobAction::Play],
        JobStatus::InProgress => &[JobAction::Pause],
        JobStatus::Failed => &[JobAction::Play, JobAction::Retry],
        JobStatus::Completed => &[],
    }
}

/// 操作を実行してよいかの判定結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionGate {
    /// サーバーへ送信する
    Execute,
    /// デモ表示中かつオフライン: 送信せず成功扱いで通知のみ
    Simulate,
    /// 実データ表示中だがサーバーがオフライン
    Blocked,
}

pub fn action_gate(has_live_data: bool, server_available: bool) -> ActionGate {
    match (has_live_data, server_available) {
        (_, true) => ActionGate::Execute,
        (false, false) => ActionGate::Simulate,
        (true, false) => ActionGate::Blocked,
    }
}

/// 「更新」列の文言
pub fn updated_text(job: &BatchJob) -> String {
    if job.status == JobStatus::InProgress {
        return "Em execução...".to_string();
    }
    if job.completed_at.is_some() {
        return "Concluído".to_string();
    }
    match job.started_at.as_deref().and_then(parse_timestamp) {
        Some(started) => started.format("%Y-%m-%d").to_string(),
        None => "Nunca iniciado".to_string(),
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_utc())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").ok())
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok())
}

pub fn phase_label(job: &BatchJob, max_phases: u32) -> String {
    format!("{}/{}", job.phase(), max_phases)
}

pub fn next_action_text(job: &BatchJob) -> &str {
    job.next_action.as_deref().unwrap_or("Aguardando...")
}

pub fn filter_count_text(filtered: usize, summary: &BatchSummary) -> String {
    format!("{} de {} livros", filtered, summary.total)
}

/// 表示データの出所
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplaySource {
    Live,
    Demo,
}

/// 実データがあればそれを、なければデモデータを返す
pub fn display_document(document: Option<&BatchDocument>) -> (Cow<'_, BatchDocument>, DisplaySource) {
    match document {
        Some(doc) => (Cow::Borrowed(doc), DisplaySource::Live),
        None => (Cow::Owned(demo::demo_document()), DisplaySource::Demo),
    }
}

/// テーブル1行分
#[derive(Debug, Clone, Serialize)]
pub struct JobRow {
    pub slug: String,
    pub title: String,
    pub author: String,
    pub status: JobStatus,
    pub status_label: &'static str,
    pub variant: &'static str,
    pub phase: String,
    pub next_action: String,
    pub progress: u32,
    pub updated: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub actions: Vec<JobAction>,
}

impl JobRow {
    pub fn from_job(job: &BatchJob, max_phases: u32) -> Self {
        let config = status_config(job.status);
        Self {
            slug: job.slug.clone(),
            title: job.title.clone(),
            author: job.author.clone(),
            status: job.status,
            status_label: config.label,
            variant: config.variant,
            phase: phase_label(job, max_phases),
            next_action: next_action_text(job).to_string(),
            progress: compute_phase_progress(job, max_phases),
            updated: updated_text(job),
            last_error: job.last_error.clone(),
            actions: available_actions(job.status).to_vec(),
        }
    }
}

/// 画面全体のビューモデル
#[derive(Debug, Clone, Serialize)]
pub struct BatchView {
    pub source: DisplaySource,
    pub summary: BatchSummary,
    pub overall_progress: u32,
    pub count_text: String,
    pub rows: Vec<JobRow>,
}

impl BatchView {
    pub fn build(
        document: Option<&BatchDocument>,
        search_query: &str,
        filter: StatusFilter,
        max_phases: u32,
    ) -> Self {
        let (doc, source) = display_document(document);
        let filtered = filter_jobs(&doc.books, search_query, filter);
        Self {
            source,
            summary: doc.summary,
            overall_progress: compute_overall_progress(&doc.summary),
            count_text: filter_count_text(filtered.len(), &doc.summary),
            rows: filtered
                .iter()
                .map(|job| JobRow::from_job(job, max_phases))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jobs() -> Vec<BatchJob> {
        let mut a = BatchJob::new("Atomic Habits", "James Clear", JobStatus::Pending);
        a.slug = "atomic_habits".into();
        let mut b = BatchJob::new("Deep Work", "Cal Newport", JobStatus::Completed);
        b.current_phase = Some(11);
        let mut c = BatchJob::new("Digital Minimalism", "Cal Newport", JobStatus::Failed);
        c.current_phase = Some(3);
        vec![a, b, c]
    }

    #[test]
    fn test_filter_passthrough() {
        assert!(filter_jobs(&[], "", StatusFilter::All).is_empty());
        let all = jobs();
        assert_eq!(filter_jobs(&all, "", StatusFilter::All), all);
    }

    #[test]
    fn test_filter_case_insensitive_fields() {
        let all = jobs();
        let by_author = filter_jobs(&all, "NEWPORT", StatusFilter::All);
        assert_eq!(by_author.len(), 2);
        assert_eq!(by_author[0].title, "Deep Work");
        assert_eq!(by_author[1].title, "Digital Minimalism");

        let by_slug = filter_jobs(&all, "atomic_", StatusFilter::All);
        assert_eq!(by_slug.len(), 1);
    }

    #[test]
    fn test_filter_and_status() {
        let all = jobs();
        let failed = filter_jobs(&all, "newport", StatusFilter::Only(JobStatus::Failed));
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].title, "Digital Minimalism");
        assert!(filter_jobs(&all, "habits", StatusFilter::Only(JobStatus::Failed)).is_empty());
    }

    #[test]
    fn test_filter_idempotent() {
        let all = jobs();
        let once = filter_jobs(&all, "cal", StatusFilter::Only(JobStatus::Completed));
        let twice = filter_jobs(&once, "cal", StatusFilter::Only(JobStatus::Completed));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_status_filter_parse() {
        assert_eq!(StatusFilter::parse("all"), Some(StatusFilter::All));
        assert_eq!(
            StatusFilter::parse("failed"),
            Some(StatusFilter::Only(JobStatus::Failed))
        );
        assert_eq!(StatusFilter::parse("bogus"), None);
    }

    #[test]
    fn test_overall_progress() {
        let summary = BatchSummary {
            total: 10,
            completed: 3,
            pending: 5,
            in_progress: 1,
            failed: 1,
        };
        assert_eq!(compute_overall_progress(&summary), 30);
        assert_eq!(compute_overall_progress(&BatchSummary::default()), 0);

        let drifted = BatchSummary {
            total: 2,
            completed: 5,
            ..Default::default()
        };
        assert_eq!(compute_overall_progress(&drifted), 100);
    }

    #[test]
    fn test_overall_progress_bounds() {
        for total in 0..20u32 {
            for completed in 0..25u32 {
                let summary = BatchSummary {
                    total,
                    completed,
                    ..Default::default()
                };
                assert!(compute_overall_progress(&summary) <= 100);
            }
        }
    }

    #[test]
    fn test_phase_progress() {
        let mut job = BatchJob::new("X", "Y", JobStatus::Failed);
        job.current_phase = Some(3);
        assert_eq!(compute_phase_progress(&job, 11), 27);

        job.current_phase = Some(1);
        assert_eq!(compute_phase_progress(&job, 11), 9);

        job.current_phase = None;
        assert_eq!(compute_phase_progress(&job, 11), 0);
    }

    #[test]
    fn test_phase_progress_completed_always_full() {
        let mut job = BatchJob::new("X", "Y", JobStatus::Completed);
        for phase in [None, Some(0), Some(4), Some(11)] {
            job.current_phase = phase;
            for max in [0, 1, 11, 20] {
                assert_eq!(compute_phase_progress(&job, max), 100);
            }
        }
    }

    #[test]
    fn test_available_actions() {
        assert_eq!(available_actions(JobStatus::Pending), &[JobAction::Play]);
        assert_eq!(available_actions(JobStatus::InProgress), &[JobAction::Pause]);
        assert_eq!(
            available_actions(JobStatus::Failed),
            &[JobAction::Play, JobAction::Retry]
        );
        assert!(available_actions(JobStatus::Completed).is_empty());
    }

    #[test]
    fn test_action_gate() {
        assert_eq!(action_gate(true, true), ActionGate::Execute);
        assert_eq!(action_gate(false, true), ActionGate::Execute);
        assert_eq!(action_gate(false, false), ActionGate::Simulate);
        assert_eq!(action_gate(true, false), ActionGate::Blocked);
    }

    #[test]
    fn test_updated_text() {
        let mut job = BatchJob::new("X", "Y", JobStatus::InProgress);
        assert_eq!(updated_text(&job), "Em execução...");

        job.status = JobStatus::Completed;
        job.completed_at = Some("2023-10-24T15:30:00".into());
        assert_eq!(updated_text(&job), "Concluído");

        job.status = JobStatus::Failed;
        job.completed_at = None;
        job.started_at = Some("2023-10-24T09:00:00".into());
        assert_eq!(updated_text(&job), "2023-10-24");

        job.started_at = Some("2023-10-23T14:00:00Z".into());
        assert_eq!(updated_text(&job), "2023-10-23");

        job.started_at = None;
        assert_eq!(updated_text(&job), "Nunca iniciado");
    }

    #[test]
    fn test_labels() {
        let mut job = BatchJob::new("X", "Y", JobStatus::Pending);
        assert_eq!(phase_label(&job, 11), "0/11");
        assert_eq!(next_action_text(&job), "Aguardando...");
        job.current_phase = Some(4);
        job.next_action = Some("Refinement".into());
        assert_eq!(phase_label(&job, 11), "4/11");
        assert_eq!(next_action_text(&job), "Refinement");

        let summary = BatchSummary {
            total: 85,
            ..Default::default()
        };
        assert_eq!(filter_count_text(3, &summary), "3 de 85 livros");
    }

    #[test]
    fn test_view_falls_back_to_demo() {
        let view = BatchView::build(None, "", StatusFilter::All, 11);
        assert_eq!(view.source, DisplaySource::Demo);
        assert!(!view.rows.is_empty());
        assert_eq!(view.count_text, "8 de 85 livros");
    }

    #[test]
    fn test_view_from_live_document() {
        let doc = BatchDocument {
            summary: BatchSummary::tally(&jobs()),
            books: jobs(),
            ..Default::default()
        };
        let view = BatchView::build(Some(&doc), "", StatusFilter::Only(JobStatus::Failed), 11);
        assert_eq!(view.source, DisplaySource::Live);
        assert_eq!(view.overall_progress, 33);
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.rows[0].progress, 27);
        assert_eq!(view.rows[0].status_label, "Falhou");
        assert_eq!(view.rows[0].actions, vec![JobAction::Play, JobAction::Retry]);
    }
}
