//! デモ用データセット。
//!
//! 実ドキュメントが取得できない間も画面を空にしないための固定データ。

use super::batch::{BatchDocument, BatchJob, BatchMetadata, BatchSummary, JobStatus};

pub const DEMO_PIPELINE_VERSION: &str = "2.2.0";

fn job(title: &str, author: &str, slug: &str, status: JobStatus) -> BatchJob {
    let mut job = BatchJob::new(title, author, status);
    job.slug = slug.to_string();
    job
}

/// デモ用ドキュメントを生成する（タイムスタンプは生成時刻）
pub fn demo_document() -> BatchDocument {
    let now = chrono::Utc::now().to_rfc3339();

    let mut obstacle = job(
        "The Obstacle Is The Way",
        "Ryan Holiday",
        "obstacle_way",
        JobStatus::InProgress,
    );
    obstacle.current_phase = Some(9);
    obstacle.phases_completed = Some("1-8".into());
    obstacle.next_action = Some("Final Writer (Pro)".into());
    obstacle.started_at = Some("2023-10-25T10:00:00".into());

    let mut lessons = job(
        "21 Lições Para O Século 21",
        "Yuval Noah Harari",
        "21_lessons",
        JobStatus::Failed,
    );
    lessons.current_phase = Some(3);
    lessons.last_error = Some("Rate limit exceeded (429) - aguarde 60s".into());
    lessons.phases_completed = Some("1-2".into());
    lessons.next_action = Some("Retry".into());
    lessons.started_at = Some("2023-10-24T09:00:00".into());

    let mut steve_jobs = job(
        "A Cabeça de Steve Jobs",
        "Leander Kahney",
        "steve_jobs_head",
        JobStatus::Failed,
    );
    steve_jobs.current_phase = Some(1);
    steve_jobs.last_error = Some("API key inválida ou expirada".into());
    steve_jobs.started_at = Some("2023-10-24T08:30:00".into());

    let mut advertising = job(
        "A Ciência da Publicidade",
        "Claude Hopkins",
        "scientific_advertising",
        JobStatus::Failed,
    );
    advertising.current_phase = Some(8);
    advertising.last_error = Some("Timeout na fase 8 (Refinement)".into());
    advertising.started_at = Some("2023-10-23T14:00:00".into());

    let mut rich = job(
        "A Ciência de Ficar Rico",
        "Wallace D. Wattles",
        "science_getting_rich",
        JobStatus::Failed,
    );
    rich.current_phase = Some(1);
    rich.last_error = Some("Erro de leitura do PDF (Corrompido)".into());

    let mut integrity = job(
        "A Era da Integridade",
        "Luiz Fernando Lucas",
        "age_integrity",
        JobStatus::Failed,
    );
    integrity.current_phase = Some(1);
    integrity.last_error = Some("Phases 1-8 failed with code 1".into());

    let mut habits = job("Atomic Habits", "James Clear", "atomic_habits", JobStatus::Pending);
    habits.next_action = Some("Aguardando início".into());

    let mut deep_work = job("Deep Work", "Cal Newport", "deep_work", JobStatus::Completed);
    deep_work.current_phase = Some(11);
    deep_work.score = Some(98.0);
    deep_work.completed_at = Some("2023-10-24T15:30:00".into());
    deep_work.next_action = Some("Concluído".into());

    BatchDocument {
        books: vec![
            obstacle,
            lessons,
            steve_jobs,
            advertising,
            rich,
            integrity,
            habits,
            deep_work,
        ],
        // デモの集計値は一覧と一致しない（実運用のドリフトを模したまま）
        summary: BatchSummary {
            total: 85,
            pending: 67,
            in_progress: 6,
            completed: 0,
            failed: 12,
        },
        metadata: BatchMetadata {
            description: "Demo Pipeline Data".to_string(),
            last_updated: now.clone(),
            pipeline_version: DEMO_PIPELINE_VERSION.to_string(),
        },
        sync_timestamp: now,
    }
}
