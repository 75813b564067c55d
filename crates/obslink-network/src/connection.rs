//! 연결 관리.
//!
//! 동시 연결 시도는 세션의 비재진입 잠금으로 하나로 합쳐진다. 인증 실패는 "연결 실패"
//! 상태를 고정하며, 운영자가 직접 `connect`할 때까지 자동 재시도하지 않는다.
//! 연결 후에는 버전 확인, 초기 출력 상태 조회, 상태 폴러와 이벤트 리스너 기동을 수행한다.

use async_trait::async_trait;
use obslink_core::cancel::CancelToken;
use obslink_core::config_manager::ConfigManager;
use obslink_core::error::CoreError;
use obslink_core::models::output::OutputState;
use obslink_core::ports::notifier::OperatorNotifier;
use obslink_core::ports::remote::{ConnectionGuard, OutputControl};
use obslink_core::session::SessionContext;
use parking_lot::Mutex;
use semver::Version;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::ObsClient;
use crate::protocol::ObsEvent;

/// 연결마다 새로 뜨는 백그라운드 작업
struct BackgroundTasks {
    cancel: CancelToken,
    handles: Vec<JoinHandle<()>>,
}

/// 연결 관리자
pub struct ConnectionManager {
    client: Arc<ObsClient>,
    config: ConfigManager,
    session: Arc<SessionContext>,
    notifier: Arc<dyn OperatorNotifier>,
    tasks: Mutex<Option<BackgroundTasks>>,
}

impl ConnectionManager {
    pub fn new(
        client: Arc<ObsClient>,
        config: ConfigManager,
        session: Arc<SessionContext>,
        notifier: Arc<dyn OperatorNotifier>,
    ) -> Self {
        Self {
            client,
            config,
            session,
            notifier,
            tasks: Mutex::new(None),
        }
    }

    pub fn client(&self) -> &Arc<ObsClient> {
        &self.client
    }

    /// 연결 시도.
    ///
    /// 다른 시도가 진행 중이면 즉시 `Ok(())`로 돌아온다 (그 시도에 합쳐짐).
    pub async fn connect(&self) -> Result<(), CoreError> {
        let Some(_attempt) = self.session.begin_connect() else {
            debug!("연결 시도가 이미 진행 중");
            return Ok(());
        };

        let connection = self.config.get().connection;
        match self.client.connect(&connection.address, &connection.password).await {
            Ok(_) => self.session.set_connection_failed(false),
            Err(CoreError::Auth(reason)) => {
                self.client.disconnect().await;
                self.session.set_connection_failed(true);
                self.notifier
                    .error(&format!("obs-websocket 인증 실패: {reason}"));
                return Err(CoreError::Auth(reason));
            }
            Err(e) => {
                warn!("obs-websocket 연결 실패: {e}");
                return Err(e);
            }
        }

        if let Err(e) = self.on_connected(&connection.min_websocket_version).await {
            self.stop_background().await;
            self.client.disconnect().await;
            self.session.set_connected(false);
            return Err(e);
        }
        Ok(())
    }

    async fn on_connected(&self, min_version: &str) -> Result<(), CoreError> {
        let version = self.client.get_version().await?;
        if let Err(e) = check_version(&version.websocket_version, min_version) {
            self.notifier.error(&e.to_string());
            return Err(e);
        }
        info!(
            obs = %version.obs_version,
            websocket = %version.websocket_version,
            "OBS 연결됨"
        );

        let stream = self.client.stream_status().await?;
        let record = self.client.record_status().await?;
        let replay = match self.client.replay_buffer_active().await {
            Ok(active) => active,
            Err(e) => {
                // 리플레이 버퍼가 설정되지 않은 경우
                debug!("리플레이 버퍼 상태 조회 실패: {e}");
                false
            }
        };
        self.session.update_status(|status| {
            status.stream = OutputState::from_active(stream.active);
            status.record = OutputState::from_active(record.active);
            status.replay_buffer = OutputState::from_active(replay);
            status.stream_stats = Some(stream);
            status.version = Some(version);
        });
        self.session.set_connected(true);

        if self.config.get().recording.record_dir.is_empty() {
            let dir = self.client.get_record_directory().await?;
            info!("녹화 디렉토리 저장: {dir}");
            self.config.update_with(|config| config.recording.record_dir = dir)?;
        }

        self.start_background().await;
        Ok(())
    }

    /// 상태 폴러와 이벤트 리스너 기동
    async fn start_background(&self) {
        self.stop_background().await;

        let cancel = CancelToken::new();
        let poller = tokio::spawn(status_poll_loop(
            self.client.clone(),
            self.session.clone(),
            self.config.get().status_poll_interval(),
            cancel.clone(),
        ));
        let listener = tokio::spawn(event_loop(
            self.client.subscribe(),
            self.client.clone(),
            self.session.clone(),
            cancel.clone(),
        ));
        *self.tasks.lock() = Some(BackgroundTasks {
            cancel,
            handles: vec![poller, listener],
        });
    }

    async fn stop_background(&self) {
        let taken = self.tasks.lock().take();
        if let Some(tasks) = taken {
            tasks.cancel.cancel();
            for handle in tasks.handles {
                let _ = handle.await;
            }
        }
    }

    /// 연결 해제
    pub async fn disconnect(&self) {
        self.stop_background().await;
        self.client.disconnect().await;
        self.session.set_connected(false);
    }

    /// 세션 종료. 녹화 디렉토리를 설정값으로 되돌린 뒤 연결을 끊는다.
    pub async fn teardown(&self) {
        self.stop_background().await;
        if self.client.is_connected() {
            let record_dir = self.config.get().recording.record_dir;
            if !record_dir.is_empty() {
                if let Err(e) = self.client.set_record_directory(&record_dir).await {
                    warn!("녹화 디렉토리 복원 실패: {e}");
                }
            }
        }
        self.client.disconnect().await;
        self.session.set_connected(false);
    }
}

#[async_trait]
impl ConnectionGuard for ConnectionManager {
    async fn ensure_connected(&self) -> Result<(), CoreError> {
        if self.is_connected() {
            return Ok(());
        }
        if self.session.connection_failed() {
            return Err(CoreError::Auth(
                "이전 인증 실패. 수동 연결이 필요합니다".to_string(),
            ));
        }
        self.connect().await?;
        if self.is_connected() {
            Ok(())
        } else {
            Err(CoreError::NotConnected)
        }
    }

    fn is_connected(&self) -> bool {
        self.session.is_connected() && self.client.is_connected()
    }
}

/// 원격 플러그인 버전이 최소 버전 이상인지 확인
pub fn check_version(actual: &str, minimum: &str) -> Result<(), CoreError> {
    let parse = |field: &str, value: &str| {
        Version::parse(value).map_err(|e| CoreError::Validation {
            field: field.to_string(),
            message: format!("{value}: {e}"),
        })
    };
    let actual_version = parse("websocket_version", actual)?;
    let minimum_version = parse("min_websocket_version", minimum)?;
    if actual_version < minimum_version {
        return Err(CoreError::Validation {
            field: "websocket_version".to_string(),
            message: format!("obs-websocket {minimum} 이상이 필요합니다 (현재 {actual})"),
        });
    }
    Ok(())
}

/// 스트림 통계 주기 조회
async fn status_poll_loop(
    client: Arc<ObsClient>,
    session: Arc<SessionContext>,
    interval: Duration,
    cancel: CancelToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        match client.stream_status().await {
            Ok(stats) => session.update_status(|status| status.stream_stats = Some(stats)),
            Err(CoreError::NotConnected) => break,
            Err(e) => debug!("스트림 상태 조회 실패: {e}"),
        }
    }
    debug!("상태 폴러 종료");
}

/// 원격 이벤트를 세션 상태에 반영
async fn event_loop(
    mut events: broadcast::Receiver<ObsEvent>,
    client: Arc<ObsClient>,
    session: Arc<SessionContext>,
    cancel: CancelToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => event,
        };
        match event {
            Ok(event) => {
                if !apply_event(&session, &client, event) {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("이벤트 {skipped}개 유실");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    debug!("이벤트 리스너 종료");
}

/// 이벤트 하나 반영. 연결이 끝났으면 false.
fn apply_event(session: &SessionContext, client: &ObsClient, event: ObsEvent) -> bool {
    match event {
        ObsEvent::StreamStateChanged(state) => {
            debug!(?state, "스트림 상태 변경");
            session.update_status(|status| status.stream = state);
        }
        ObsEvent::RecordStateChanged { state, output_path } => {
            debug!(?state, ?output_path, "녹화 상태 변경");
            session.update_status(|status| status.record = state);
        }
        ObsEvent::ReplayBufferStateChanged(state) => {
            session.update_status(|status| status.replay_buffer = state);
        }
        ObsEvent::ExitStarted => {
            info!("OBS 종료 시작");
        }
        ObsEvent::ConnectionClosed => {
            // 재연결 직후 이전 연결의 종료 신호일 수 있다
            if !client.is_connected() {
                info!("OBS 연결 끊김");
                session.set_connected(false);
                return false;
            }
        }
        ObsEvent::Other(event_type) => debug!(event_type = %event_type, "무시하는 이벤트"),
    }
    true
}
