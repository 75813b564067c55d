//! 프레임 스케줄러.
//!
//! 하나의 폴링 태스크가 프레임 간격마다 UI 트리와 활동 신호를 샘플링한다.
//! 오버레이 파이프라인의 유일한 생산자이자 녹화 자동화의 유일한 구동자다.
//! 운영자 명령도 같은 태스크에서 처리된다.

use obslink_automation::controller::CombatAutomationController;
use obslink_core::config_manager::ConfigManager;
use obslink_core::error::CoreError;
use obslink_core::models::activity::ActivitySignal;
use obslink_core::ports::activity::ActivitySource;
use obslink_core::ports::notifier::OperatorNotifier;
use obslink_core::ports::remote::{ConnectionGuard, FilterControl, OutputControl};
use obslink_core::session::SessionContext;
use obslink_network::connection::ConnectionManager;
use obslink_overlay::snapshot::UiSnapshot;
use obslink_overlay::synchronizer::OverlaySynchronizer;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::commands::{Command, OutputAction, ReplayAction};
use crate::lifecycle::ShutdownListener;
use crate::replay::{FrameReplay, IdleActivity};

/// 종료 시 파이프라인 큐를 비우며 기다리는 최대 시간
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// 스케줄러가 쓰는 어댑터 묶음
pub struct Components {
    pub config: ConfigManager,
    pub session: Arc<SessionContext>,
    pub filters: Arc<dyn FilterControl>,
    pub outputs: Arc<dyn OutputControl>,
    pub guard: Arc<dyn ConnectionGuard>,
    pub notifier: Arc<dyn OperatorNotifier>,
    /// 수동 connect/disconnect와 종료 정리에 쓰인다
    pub connection: Option<Arc<ConnectionManager>>,
}

/// 틱 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// 프레임 녹화 재생 끝
    ReplayFinished,
}

/// 프레임 스케줄러
pub struct FrameScheduler {
    config: ConfigManager,
    session: Arc<SessionContext>,
    outputs: Arc<dyn OutputControl>,
    guard: Arc<dyn ConnectionGuard>,
    connection: Option<Arc<ConnectionManager>>,
    overlay: OverlaySynchronizer,
    automation: CombatAutomationController,
    replay: Option<Arc<FrameReplay>>,
    activity: Arc<dyn ActivitySource>,
    interval: Duration,
    exit_on_replay_end: bool,
    last_frame: Option<UiSnapshot>,
    last_activity: ActivitySignal,
}

impl FrameScheduler {
    /// 스케줄러 생성. 파이프라인 태스크를 띄우므로 tokio 런타임 안에서 호출한다.
    pub fn new(components: Components, replay: Option<Arc<FrameReplay>>) -> Self {
        let Components {
            config,
            session,
            filters,
            outputs,
            guard,
            notifier,
            connection,
        } = components;

        let overlay = OverlaySynchronizer::new(config.clone(), session.clone(), filters, notifier);
        let automation = CombatAutomationController::new(
            config.clone(),
            session.clone(),
            outputs.clone(),
            guard.clone(),
        );
        let activity: Arc<dyn ActivitySource> = match &replay {
            Some(replay) => replay.clone(),
            None => Arc::new(IdleActivity),
        };
        let interval = config.get().frame_interval();

        Self {
            config,
            session,
            outputs,
            guard,
            connection,
            overlay,
            automation,
            replay,
            activity,
            interval,
            exit_on_replay_end: true,
            last_frame: None,
            last_activity: ActivitySignal::default(),
        }
    }

    /// 프레임 간격 지정
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    /// 재생이 끝나도 계속 실행할지
    pub fn exit_on_replay_end(mut self, exit: bool) -> Self {
        self.exit_on_replay_end = exit;
        self
    }

    pub fn overlay(&self) -> &OverlaySynchronizer {
        &self.overlay
    }

    pub fn automation(&self) -> &CombatAutomationController {
        &self.automation
    }

    /// 프레임 하나 처리
    pub async fn tick(&mut self) -> TickOutcome {
        if let Some(replay) = &self.replay {
            match replay.advance() {
                Some(frame) => self.last_frame = Some(frame),
                None => return TickOutcome::ReplayFinished,
            }
        }

        let activity = match self.activity.poll() {
            Ok(activity) => activity,
            Err(e) => {
                warn!("활동 신호 조회 실패: {e}");
                return TickOutcome::Continue;
            }
        };

        if let Some(frame) = &self.last_frame {
            self.overlay.on_frame(frame, &activity).await;
        }
        self.automation.on_signal(&activity).await;
        self.last_activity = activity;
        TickOutcome::Continue
    }

    /// 운영자 명령 실행. 결과 메시지를 돌려준다.
    pub async fn execute(&mut self, command: Command) -> Result<String, CoreError> {
        match command {
            Command::On => self.set_overlay_enabled(|_| true),
            Command::Off => self.set_overlay_enabled(|_| false),
            Command::Toggle => self.set_overlay_enabled(|enabled| !enabled),
            Command::Update => {
                let Some(frame) = &self.last_frame else {
                    return Err(CoreError::Internal("아직 받은 UI 프레임이 없습니다".to_string()));
                };
                self.guard.ensure_connected().await?;
                self.overlay.sync_now(frame, &self.last_activity).await;
                Ok("UI 동기화 완료".to_string())
            }
            Command::Connect => {
                let connection = self.connection_manager()?;
                self.session.set_connection_failed(false);
                connection.connect().await?;
                Ok(format!("연결 상태: {}", self.guard.is_connected()))
            }
            Command::Disconnect => {
                self.connection_manager()?.disconnect().await;
                Ok("연결 해제".to_string())
            }
            Command::Status => Ok(self.status_line()),
            Command::Record(action) => {
                self.guard.ensure_connected().await?;
                match action {
                    OutputAction::Start => self.automation.start_recording().await,
                    OutputAction::Stop => self.automation.stop_recording().await,
                    OutputAction::Toggle => self.outputs.toggle_record().await?,
                }
                Ok(format!("녹화 {action:?}"))
            }
            Command::Stream(action) => {
                self.guard.ensure_connected().await?;
                match action {
                    OutputAction::Start => self.outputs.start_stream().await?,
                    OutputAction::Stop => self.outputs.stop_stream().await?,
                    OutputAction::Toggle => self.outputs.toggle_stream().await?,
                }
                Ok(format!("스트림 {action:?}"))
            }
            Command::Replay(action) => {
                self.guard.ensure_connected().await?;
                match action {
                    ReplayAction::Start => self.outputs.start_replay_buffer().await?,
                    ReplayAction::Stop => self.outputs.stop_replay_buffer().await?,
                    ReplayAction::Save => self.outputs.save_replay_buffer().await?,
                }
                Ok(format!("리플레이 버퍼 {action:?}"))
            }
            Command::Scene(name) => {
                self.guard.ensure_connected().await?;
                self.outputs.set_current_scene(&name).await?;
                Ok(format!("장면 전환: {name}"))
            }
            Command::Mute(input) => {
                self.guard.ensure_connected().await?;
                self.outputs.set_input_mute(&input, true).await?;
                Ok(format!("음소거: {input}"))
            }
            Command::Unmute(input) => {
                self.guard.ensure_connected().await?;
                self.outputs.set_input_mute(&input, false).await?;
                Ok(format!("음소거 해제: {input}"))
            }
        }
    }

    fn set_overlay_enabled(&self, f: impl FnOnce(bool) -> bool) -> Result<String, CoreError> {
        let config = self
            .config
            .update_with(|c| c.overlay.enabled = f(c.overlay.enabled))?;
        Ok(format!("오버레이 동기화: {}", config.overlay.enabled))
    }

    fn connection_manager(&self) -> Result<Arc<ConnectionManager>, CoreError> {
        self.connection
            .clone()
            .ok_or_else(|| CoreError::Internal("연결 관리자가 없습니다".to_string()))
    }

    fn status_line(&self) -> String {
        let status = self.session.status();
        let stats = status.stream_stats.unwrap_or_default();
        format!(
            "connected={} failed={} stream={:?} record={:?} replay={:?} automation={} ui_errors={} timecode={} regions={}",
            self.guard.is_connected(),
            self.session.connection_failed(),
            status.stream,
            status.record,
            status.replay_buffer,
            self.automation.state().name(),
            self.session.ui_error_count(),
            stats.timecode,
            self.overlay.cache().len(),
        )
    }

    /// 종료 신호나 재생 끝까지 실행한 뒤 정리
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>, mut shutdown: ShutdownListener) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(interval_ms = self.interval.as_millis() as u64, "프레임 스케줄러 시작");

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                Some(command) = commands.recv() => {
                    let label = command.to_string();
                    match self.execute(command).await {
                        Ok(reply) => info!("{label}: {reply}"),
                        Err(e) => warn!("{label} 실패: {e}"),
                    }
                }
                _ = ticker.tick() => {
                    if self.tick().await == TickOutcome::ReplayFinished && self.exit_on_replay_end {
                        info!("프레임 녹화 재생 완료");
                        break;
                    }
                }
            }
        }

        self.shutdown().await;
    }

    /// 자동화 작업 취소, 파이프라인 정리, 연결 정리
    pub async fn shutdown(&mut self) {
        self.automation.shutdown().await;
        self.overlay.shutdown(DRAIN_TIMEOUT).await;
        if let Some(connection) = &self.connection {
            connection.teardown().await;
        }
        debug!("스케줄러 정리 완료");
    }
}
