//! # obslink
//!
//! 게임 UI 영역을 OBS 블러 필터로 가리고, 전투에 맞춰 녹화를 자동 제어하는 에이전트.
//! 어댑터 조립, 라이프사이클 관리, 프레임 스케줄러 실행.

use anyhow::{Context, Result};
use clap::Parser;
use obslink_app::commands::read_stdin;
use obslink_app::lifecycle::Lifecycle;
use obslink_app::notifier::LogNotifier;
use obslink_app::replay::FrameReplay;
use obslink_app::scheduler::{Components, FrameScheduler};
use obslink_core::config_manager::ConfigManager;
use obslink_core::ports::notifier::OperatorNotifier;
use obslink_core::session::SessionContext;
use obslink_network::client::ObsClient;
use obslink_network::connection::ConnectionManager;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// OBS 오버레이/녹화 자동화 에이전트
#[derive(Parser, Debug)]
#[command(name = "obslink")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 설정 파일 경로 (기본: 플랫폼별 설정 디렉토리의 config.json)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// 프레임 녹화(JSON Lines) 재생 경로
    #[arg(long, short = 'r')]
    replay: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,

    /// obs-websocket 주소 (예: ws://127.0.0.1:4455). 설정에 저장된다
    #[arg(long, short = 'a')]
    address: Option<String>,

    /// obs-websocket 비밀번호. 설정에 저장된다
    #[arg(long)]
    password: Option<String>,

    /// 프레임 간격 (밀리초)
    #[arg(long)]
    frame_interval: Option<u64>,

    /// 재생이 끝나도 종료하지 않고 명령을 계속 받는다
    #[arg(long)]
    hold: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = &args.log_level;
    let log_filter = format!(
        "obslink={level},obslink_app={level},obslink_core={level},obslink_overlay={level},obslink_network={level},obslink_automation={level}"
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .init();

    info!("obslink 시작");

    let config = match &args.config {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    }
    .context("설정 로드 실패")?;
    info!("설정 파일: {}", config.config_path().display());

    if args.address.is_some() || args.password.is_some() {
        config
            .update_with(|c| {
                if let Some(address) = &args.address {
                    c.connection.address = address.clone();
                }
                if let Some(password) = &args.password {
                    c.connection.password = password.clone();
                }
            })
            .context("연결 설정 저장 실패")?;
    }

    let app_config = config.get();
    let session = Arc::new(SessionContext::new());
    let notifier: Arc<dyn OperatorNotifier> = Arc::new(LogNotifier);
    let client = Arc::new(ObsClient::new(app_config.request_timeout()));
    let connection = Arc::new(ConnectionManager::new(
        client.clone(),
        config.clone(),
        session.clone(),
        notifier.clone(),
    ));

    if let Err(e) = connection.connect().await {
        warn!("초기 연결 실패: {e} (명령 `connect`로 재시도)");
    }

    let replay = match &args.replay {
        Some(path) => Some(Arc::new(FrameReplay::load(path).context("프레임 녹화 로드 실패")?)),
        None => None,
    };
    let replaying = replay.is_some();

    let interval = args
        .frame_interval
        .map(Duration::from_millis)
        .unwrap_or_else(|| app_config.frame_interval());

    let scheduler = FrameScheduler::new(
        Components {
            config,
            session,
            filters: client.clone(),
            outputs: client,
            guard: connection.clone(),
            notifier,
            connection: Some(connection),
        },
        replay,
    )
    .with_interval(interval)
    .exit_on_replay_end(replaying && !args.hold);

    let lifecycle = Arc::new(Lifecycle::new());
    let (command_tx, command_rx) = mpsc::channel(32);
    tokio::spawn(read_stdin(command_tx));

    let signal_lifecycle = lifecycle.clone();
    tokio::spawn(async move {
        if let Err(e) = signal_lifecycle.watch_signals().await {
            error!("시그널 핸들러 등록 실패: {e}");
        }
    });

    info!("obslink 실행 중 (Ctrl+C로 종료)");
    scheduler.run(command_rx, lifecycle.subscribe()).await;

    match lifecycle.reason() {
        Some(reason) => info!(?reason, "obslink 종료"),
        None => info!("obslink 종료"),
    }
    Ok(())
}
