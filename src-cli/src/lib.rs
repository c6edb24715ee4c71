mod commands;
mod events;
mod render;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use bp_core::domain::settings::ClientSettings;
use bp_core::domain::view::JobAction;
use bp_core::usecase::app_service::AppService;

use commands::{CmdResult, Output};

/// バッチパイプラインの進捗表示と操作
#[derive(Debug, Parser)]
#[command(name = "batch-progress", version, about)]
struct Cli {
    /// パイプラインサーバーのベース URL（BP_BASE_URL より優先）
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// ログレベル（RUST_LOG が設定されていればそちらを優先）
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// 人間向け表示の代わりに JSON イベントを1行ずつ出力する
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 1回取得してダッシュボードを表示
    Status {
        #[arg(short, long, default_value = "")]
        search: String,
        #[arg(long, default_value = "all")]
        status: String,
    },
    /// ポーリングしながら表示を更新（a: 自動更新切替, r: 再取得, q: 終了）
    Watch {
        #[arg(short, long, default_value = "")]
        search: String,
        #[arg(long, default_value = "all")]
        status: String,
        /// 自動更新を無効にして開始する
        #[arg(long)]
        manual: bool,
    },
    /// サーバーのヘルスチェック
    Health,
    Play {
        slug: String,
    },
    Pause {
        slug: String,
    },
    Retry {
        slug: String,
        #[arg(long, default_value_t = 1)]
        from_phase: u32,
    },
    /// 新しい本をキューに追加
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        author: String,
        #[arg(long)]
        slug: Option<String>,
    },
    /// 取得・ヘルスチェック・操作のメトリクスを表示
    Metrics,
}

async fn dispatch(service: &AppService, command: Command, output: Output) -> CmdResult<()> {
    match command {
        Command::Status { search, status } => {
            commands::status(service, &search, &status, output).await
        }
        Command::Watch {
            search,
            status,
            manual,
        } => commands::watch(service, &search, &status, manual, output).await,
        Command::Health => commands::health(service, output).await,
        Command::Play { slug } => {
            commands::job_action(service, JobAction::Play, &slug, 1, output).await
        }
        Command::Pause { slug } => {
            commands::job_action(service, JobAction::Pause, &slug, 1, output).await
        }
        Command::Retry { slug, from_phase } => {
            commands::job_action(service, JobAction::Retry, &slug, from_phase, output).await
        }
        Command::Add {
            title,
            author,
            slug,
        } => commands::add(service, &title, &author, slug.as_deref(), output).await,
        Command::Metrics => commands::metrics(service).await,
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    let mut settings = ClientSettings::from_env();
    if let Some(base_url) = cli.base_url {
        settings.base_url = base_url;
    }

    let service = match AppService::from_settings(settings) {
        Ok(service) => service,
        Err(e) => {
            log::error!("設定エラー: {e}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("tokio ランタイムの初期化に失敗しました: {e}");
            return ExitCode::FAILURE;
        }
    };

    let output = if cli.json { Output::Json } else { Output::Text };
    let result = runtime.block_on(async {
        let result = dispatch(&service, cli.command, output).await;
        service.stop_polling();
        result
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
