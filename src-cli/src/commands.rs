use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};

use bp_core::domain::error::AppError;
use bp_core::domain::view::{JobAction, StatusFilter};
use bp_core::usecase::app_service::{ActionOutcome, AppService};
use bp_core::usecase::batch_client::BatchState;

use crate::events::{
    self, ActionDonePayload, BatchStateChangedPayload, ErrorPayload, ServerStatusPayload,
    ACTION_DONE, BATCH_STATE_CHANGED, ERROR, SERVER_STATUS,
};
use crate::render;

/// コマンドエラー型
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{0}")]
    App(#[from] AppError),
    #[error("Invalid status filter: {0} (use all, pending, in_progress, completed, failed)")]
    InvalidFilter(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CmdResult<T> = Result<T, CommandError>;

/// 出力モード（人間向けテキスト or JSON イベント）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Text,
    Json,
}

fn parse_filter(status: &str) -> CmdResult<StatusFilter> {
    StatusFilter::parse(status).ok_or_else(|| CommandError::InvalidFilter(status.to_string()))
}

fn print_line(line: &str) -> CmdResult<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}")?;
    Ok(())
}

fn publish_state(
    service: &AppService,
    state: &BatchState,
    search: &str,
    filter: StatusFilter,
    output: Output,
) -> CmdResult<()> {
    let view = service.view(search, filter);
    match output {
        Output::Json => {
            events::emit_event(
                BATCH_STATE_CHANGED,
                BatchStateChangedPayload {
                    loading: state.loading,
                    server_available: state.server_available,
                    auto_refresh: state.auto_refresh,
                    last_updated: state.last_updated,
                    error: state.error.clone(),
                    view,
                },
            );
            Ok(())
        }
        Output::Text => print_line(&render::dashboard(state, &view)),
    }
}

// --- Commands ---

/// 1回取得して表示する
pub async fn status(
    service: &AppService,
    search: &str,
    status: &str,
    output: Output,
) -> CmdResult<()> {
    let filter = parse_filter(status)?;
    service.refresh_once().await;
    let state = service.state();
    if let Some(err) = &state.error {
        log::warn!("Showing demo data: {err}");
    }
    publish_state(service, &state, search, filter, output)
}

/// ポーリングしながら状態変化のたびに再描画する。
///
/// 標準入力: `a` 自動更新の切替, `r` 手動再取得, `q` 終了。Ctrl-C でも終了。
pub async fn watch(
    service: &AppService,
    search: &str,
    status: &str,
    manual: bool,
    output: Output,
) -> CmdResult<()> {
    let filter = parse_filter(status)?;
    if manual {
        service.set_auto_refresh(false);
    }

    let mut state_rx = service.client().subscribe();
    service.start_polling();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = state_rx.borrow_and_update().clone();
                publish_state(service, &state, search, filter, output)?;
            }
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => match line.trim() {
                        "a" => {
                            let enabled = service.toggle_auto_refresh();
                            log::info!("Auto refresh: {}", if enabled { "Auto" } else { "Manual" });
                        }
                        "r" => service.refetch().await,
                        "q" => break,
                        "" => {}
                        other => log::warn!("Unknown key: {other} (a = auto, r = refresh, q = quit)"),
                    },
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        log::warn!("stdin closed: {e}");
                        stdin_open = false;
                    }
                }
            }
            _ = &mut ctrl_c => break,
        }
    }

    service.stop_polling();
    Ok(())
}

/// サーバー可用性の確認
pub async fn health(service: &AppService, output: Output) -> CmdResult<()> {
    service.client().check_server_health().await;
    let available = service.state().server_available;
    match output {
        Output::Json => {
            events::emit_event(
                SERVER_STATUS,
                ServerStatusPayload {
                    available,
                    base_url: service.settings().base_url.clone(),
                },
            );
            Ok(())
        }
        Output::Text => print_line(if available {
            "Servidor Online"
        } else {
            "Servidor Offline"
        }),
    }
}

fn report_outcome(
    label: &str,
    action: JobAction,
    target: &str,
    result: Result<ActionOutcome, AppError>,
    output: Output,
) -> CmdResult<()> {
    match result {
        Ok(outcome) => {
            match output {
                Output::Json => events::emit_event(
                    ACTION_DONE,
                    ActionDonePayload::new(action.as_str(), target, outcome),
                ),
                Output::Text => match outcome {
                    ActionOutcome::Simulated => {
                        print_line(&format!("Simulação: {label} simulada para {target}"))?;
                    }
                    ActionOutcome::Executed(_) => {
                        print_line(&format!("Sucesso: {label} enviada para {target}"))?;
                    }
                },
            }
            Ok(())
        }
        Err(e) => {
            if output == Output::Json {
                events::emit_event(ERROR, ErrorPayload::from_app_error(&e, Some(target)));
            }
            Err(e.into())
        }
    }
}

/// play/pause/retry 共通
pub async fn job_action(
    service: &AppService,
    action: JobAction,
    slug: &str,
    from_phase: u32,
    output: Output,
) -> CmdResult<()> {
    // 実データ有無とサーバー可用性を判定するため、先に1回取得する
    service.refresh_once().await;
    let result = service.run_action(action, slug, from_phase).await;
    let label = format!("Ação {}", action.as_str());
    report_outcome(&label, action, slug, result, output)
}

pub async fn add(
    service: &AppService,
    title: &str,
    author: &str,
    slug: Option<&str>,
    output: Output,
) -> CmdResult<()> {
    service.refresh_once().await;
    let result = service.add_job(title, author, slug).await;
    match result {
        Ok(outcome) => {
            match output {
                Output::Json => events::emit_event(
                    ACTION_DONE,
                    ActionDonePayload::new("add", title, outcome),
                ),
                Output::Text => match outcome {
                    ActionOutcome::Simulated => print_line("Simulação: Livro adicionado (Simulado)")?,
                    ActionOutcome::Executed(_) => print_line(
                        "Livro Adicionado: adicionado à fila de processamento.",
                    )?,
                },
            }
            Ok(())
        }
        Err(e) => {
            if output == Output::Json {
                events::emit_event(ERROR, ErrorPayload::from_app_error(&e, Some(title)));
            }
            Err(e.into())
        }
    }
}

/// 収集済みメトリクスを JSON で出力
pub async fn metrics(service: &AppService) -> CmdResult<()> {
    service.refresh_once().await;
    let summary = service.metrics();
    let json = serde_json::to_string_pretty(&summary)
        .map_err(|e| AppError::internal(e.to_string()))?;
    print_line(&json)
}
