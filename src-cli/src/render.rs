//! 端末向けのテキスト描画。

use std::fmt::Write;

use bp_core::domain::view::{BatchView, DisplaySource, JobAction};
use bp_core::usecase::batch_client::BatchState;

const BAR_WIDTH: usize = 20;

pub const DEMO_BANNER: &str = "Modo de Demonstração (Dados Fictícios)";
pub const OFFLINE_HINT: &str = "Para controlar o pipeline (iniciar, pausar, adicionar), o servidor FastAPI Python precisa estar rodando localmente.";
pub const OFFLINE_COMMAND: &str =
    "cd expansion-packs/book-summary && python -m uvicorn server.main:app --reload --port 8001";

fn bar(pct: u32) -> String {
    let filled = (pct.min(100) as usize * BAR_WIDTH) / 100;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// ダッシュボード全体を描画する
pub fn dashboard(state: &BatchState, view: &BatchView) -> String {
    let mut out = String::new();
    header(&mut out, state, view);
    summary(&mut out, view);
    table(&mut out, view);
    banners(&mut out, state, view);
    out
}

fn header(out: &mut String, state: &BatchState, view: &BatchView) {
    let server = if state.server_available || view.source == DisplaySource::Demo {
        "Online"
    } else {
        "Offline"
    };
    let refresh = if state.auto_refresh { "Auto" } else { "Manual" };
    let updated = state
        .last_updated
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());

    let _ = writeln!(out, "Pipeline (Batch)  servidor: {server}  atualização: {refresh}  última: {updated}");
    if state.loading && state.document.is_none() {
        let _ = writeln!(out, "Carregando dados...");
    }
}

fn summary(out: &mut String, view: &BatchView) {
    let s = &view.summary;
    let _ = writeln!(
        out,
        "Total {}  |  Pendente {}  |  Em Progresso {}  |  Concluído {}  |  Falhou {}",
        s.total, s.pending, s.in_progress, s.completed, s.failed
    );
    let _ = writeln!(
        out,
        "{} {} de {} concluídos ({}%)",
        bar(view.overall_progress),
        s.completed,
        s.total,
        view.overall_progress
    );
    let _ = writeln!(out, "{}", view.count_text);
}

fn table(out: &mut String, view: &BatchView) {
    if view.rows.is_empty() {
        let _ = writeln!(out, "Nenhum livro encontrado.");
        return;
    }

    let _ = writeln!(
        out,
        "{:<32} {:<14} {:<6} {:<24} {:>5} {:<16} Ações",
        "Livro", "Status", "Fase", "Próxima ação", "%", "Atualizado"
    );
    for row in &view.rows {
        let actions: Vec<&str> = row.actions.iter().map(JobAction::as_str).collect();
        let _ = writeln!(
            out,
            "{:<32} {:<14} {:<6} {:<24} {:>4}% {:<16} {}",
            truncate(&row.title, 32),
            row.status_label,
            row.phase,
            truncate(&row.next_action, 24),
            row.progress,
            truncate(&row.updated, 16),
            actions.join(",")
        );
        let _ = writeln!(out, "  {} · {}", row.author, row.slug);
        if let Some(err) = &row.last_error {
            let _ = writeln!(out, "  Erro: {err}");
        }
    }
}

fn banners(out: &mut String, state: &BatchState, view: &BatchView) {
    if view.source == DisplaySource::Demo && !state.server_available {
        let _ = writeln!(out, "\n{DEMO_BANNER}");
    }
    if view.source == DisplaySource::Live && !state.server_available {
        let _ = writeln!(out, "\nServidor Offline");
        let _ = writeln!(out, "{OFFLINE_HINT}");
        let _ = writeln!(out, "  {OFFLINE_COMMAND}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bp_core::domain::batch::{BatchDocument, BatchJob, BatchSummary, JobStatus};
    use bp_core::domain::view::StatusFilter;

    fn state(document: Option<BatchDocument>, server_available: bool) -> BatchState {
        BatchState {
            document,
            loading: false,
            error: None,
            server_available,
            auto_refresh: true,
            last_updated: None,
        }
    }

    fn live_document() -> BatchDocument {
        let mut failed = BatchJob::new("Digital Minimalism", "Cal Newport", JobStatus::Failed);
        failed.current_phase = Some(3);
        failed.last_error = Some("Timeout na fase 3".into());
        let books = vec![failed];
        BatchDocument {
            summary: BatchSummary::tally(&books),
            books,
            ..Default::default()
        }
    }

    #[test]
    fn test_bar() {
        assert_eq!(bar(0), format!("[{}]", "-".repeat(20)));
        assert_eq!(bar(50), format!("[{}{}]", "#".repeat(10), "-".repeat(10)));
        assert_eq!(bar(150), format!("[{}]", "#".repeat(20)));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("A Ciência da Publicidade", 10), "A Ciência…");
    }

    #[test]
    fn test_demo_banner_when_no_data() {
        let st = state(None, false);
        let view = BatchView::build(None, "", StatusFilter::All, 11);
        let text = dashboard(&st, &view);
        assert!(text.contains(DEMO_BANNER));
        assert!(text.contains("8 de 85 livros"));
        assert!(!text.contains("Servidor Offline"));
    }

    #[test]
    fn test_offline_banner_with_live_data() {
        let doc = live_document();
        let view = BatchView::build(Some(&doc), "", StatusFilter::All, 11);
        let text = dashboard(&state(Some(doc), false), &view);
        assert!(text.contains("Servidor Offline"));
        assert!(text.contains(OFFLINE_COMMAND));
        assert!(text.contains("Erro: Timeout na fase 3"));
        assert!(text.contains("3/11"));
        assert!(text.contains("play,retry"));
    }

    #[test]
    fn test_online_live_has_no_banner() {
        let doc = live_document();
        let view = BatchView::build(Some(&doc), "", StatusFilter::All, 11);
        let text = dashboard(&state(Some(doc), true), &view);
        assert!(!text.contains(DEMO_BANNER));
        assert!(!text.contains("Servidor Offline"));
        assert!(text.contains("0 de 1 concluídos (0%)"));
    }

    #[test]
    fn test_empty_filter_result() {
        let doc = live_document();
        let view = BatchView::build(Some(&doc), "nothing-matches", StatusFilter::All, 11);
        let text = dashboard(&state(Some(doc), true), &view);
        assert!(text.contains("Nenhum livro encontrado."));
        assert!(text.contains("0 de 1 livros"));
    }
}
