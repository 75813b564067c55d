//! 전투 기반 녹화 자동화 제어기.
//!
//! 폴링마다 활동 신호를 받아 전투 시작/종료, 카운트다운 시작 에지를 감지한다.
//! 원격 명령 실패는 로그만 남기고 명령이 실행된 것처럼 상태를 진행한다.
//! 다음 에지에서 자연스럽게 다시 시도된다.

use obslink_core::cancel::CancelToken;
use obslink_core::config::RecordingConfig;
use obslink_core::config_manager::ConfigManager;
use obslink_core::models::activity::ActivitySignal;
use obslink_core::models::automation::AutomationState;
use obslink_core::ports::remote::{ConnectionGuard, OutputControl};
use obslink_core::session::SessionContext;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::delayed::{delayed_replay_save, delayed_stop, StopPlan};
use crate::recording_dir::recording_target;

/// 녹화 자동화 제어기
pub struct CombatAutomationController {
    config: ConfigManager,
    session: Arc<SessionContext>,
    outputs: Arc<dyn OutputControl>,
    guard: Arc<dyn ConnectionGuard>,
    state: Arc<Mutex<AutomationState>>,
    generation: u64,
    cutscene: watch::Sender<bool>,
    was_in_combat: bool,
    last_count_down: f32,
    territory: Option<String>,
    shutdown: CancelToken,
    tasks: Vec<JoinHandle<()>>,
}

impl CombatAutomationController {
    pub fn new(
        config: ConfigManager,
        session: Arc<SessionContext>,
        outputs: Arc<dyn OutputControl>,
        guard: Arc<dyn ConnectionGuard>,
    ) -> Self {
        let (cutscene, _) = watch::channel(false);
        Self {
            config,
            session,
            outputs,
            guard,
            state: Arc::new(Mutex::new(AutomationState::Idle)),
            generation: 0,
            cutscene,
            was_in_combat: false,
            last_count_down: 0.0,
            territory: None,
            shutdown: CancelToken::new(),
            tasks: Vec::new(),
        }
    }

    /// 현재 상태 (복제본)
    pub fn state(&self) -> AutomationState {
        self.state.lock().clone()
    }

    /// 폴링 한 번의 활동 신호 반영
    pub async fn on_signal(&mut self, signal: &ActivitySignal) {
        self.cutscene.send_replace(signal.in_cutscene);
        if signal.territory.is_some() {
            self.territory = signal.territory.clone();
        }

        if signal.in_combat != self.was_in_combat {
            self.was_in_combat = signal.in_combat;
            if signal.in_combat {
                self.on_combat_start().await;
            } else {
                self.on_combat_end().await;
            }
        }

        if signal.count_down_value != self.last_count_down {
            let fresh = signal.counting_down && signal.count_down_value > self.last_count_down;
            self.last_count_down = signal.count_down_value;
            if fresh {
                self.on_countdown_start().await;
            }
        }

        self.tasks.retain(|handle| !handle.is_finished());
    }

    async fn on_combat_start(&mut self) {
        let recording = self.config.get().recording;
        if !recording.start_on_combat {
            return;
        }
        if let Err(e) = self.guard.ensure_connected().await {
            warn!("OBS 미연결, 자동 녹화 시작 건너뜀: {e}");
            return;
        }
        if recording.cancel_stop_on_resume && self.cancel_pending_stop() {
            info!("전투 재개, 지연 정지 취소");
            return;
        }
        info!("자동 녹화 시작");
        self.start_recording().await;
    }

    async fn on_combat_end(&mut self) {
        let recording = self.config.get().recording;
        if !recording.stop_on_combat && !recording.save_replay_on_combat_end {
            return;
        }
        if let Err(e) = self.guard.ensure_connected().await {
            warn!("OBS 미연결, 전투 종료 처리 건너뜀: {e}");
            return;
        }
        if recording.stop_on_combat {
            self.schedule_stop(&recording);
        }
        if recording.save_replay_on_combat_end {
            let handle = tokio::spawn(delayed_replay_save(
                self.outputs.clone(),
                recording.replay_save_delay(),
                self.shutdown.clone(),
            ));
            self.tasks.push(handle);
        }
    }

    async fn on_countdown_start(&mut self) {
        if !self.config.get().recording.start_on_countdown {
            return;
        }
        if let Err(e) = self.guard.ensure_connected().await {
            warn!("OBS 미연결, 카운트다운 녹화 건너뜀: {e}");
            return;
        }
        if self.session.is_recording() {
            debug!("이미 녹화 중");
            return;
        }
        info!("카운트다운 감지, 자동 녹화 시작");
        self.start_recording().await;
    }

    /// 녹화 디렉토리를 맞춘 뒤 녹화 시작.
    ///
    /// 지연 정지 대기 중이면 그 대기를 건드리지 않는다.
    pub async fn start_recording(&self) {
        self.apply_recording_target().await;
        if let Err(e) = self.outputs.start_record().await {
            warn!("녹화 시작 실패: {e}");
        }
        let mut state = self.state.lock();
        if !state.is_pending() {
            *state = AutomationState::Recording;
        }
    }

    /// 녹화 정지 (운영자 명령). 대기 중인 지연 정지는 취소된다.
    pub async fn stop_recording(&self) {
        let previous = std::mem::take(&mut *self.state.lock());
        if let AutomationState::StoppingPending { token, .. } = previous {
            token.cancel();
        }
        match self.outputs.stop_record().await {
            Ok(Some(path)) => info!("녹화 저장: {path}"),
            Ok(None) => {}
            Err(e) => warn!("녹화 정지 실패: {e}"),
        }
    }

    async fn apply_recording_target(&self) {
        let recording = self.config.get().recording;
        let target = recording_target(&recording, self.territory.as_deref());
        if !target.directory.is_empty() {
            if let Err(e) = self.outputs.set_record_directory(&target.directory).await {
                warn!("녹화 디렉토리 설정 실패: {e}");
            }
        }
        if let Err(e) = self.outputs.set_filename_format(&target.filename_format).await {
            warn!("파일명 형식 설정 실패: {e}");
        }
    }

    /// 대기 중인 지연 정지를 취소하고 `Recording`으로 되돌린다. 취소했으면 true.
    fn cancel_pending_stop(&self) -> bool {
        let mut state = self.state.lock();
        let token = match &*state {
            AutomationState::StoppingPending { token, .. } => token.clone(),
            _ => return false,
        };
        token.cancel();
        *state = AutomationState::Recording;
        true
    }

    fn schedule_stop(&mut self, recording: &RecordingConfig) {
        let active = !matches!(*self.state.lock(), AutomationState::Idle);
        if !active && !self.session.is_recording() {
            debug!("녹화 중이 아님, 지연 정지 생략");
            return;
        }

        self.generation += 1;
        let token = CancelToken::new();
        let delay = recording.stop_delay();
        let tick = recording.poll_tick();
        let ticks = delay.as_millis().div_ceil(tick.as_millis()) as u64;

        let previous = std::mem::replace(
            &mut *self.state.lock(),
            AutomationState::StoppingPending {
                token: token.clone(),
                generation: self.generation,
                deadline: Instant::now() + delay,
            },
        );
        if let AutomationState::StoppingPending { token: stale, .. } = previous {
            stale.cancel();
        }

        info!(delay_secs = recording.stop_delay_secs, "전투 종료, 지연 정지 예약");
        let handle = tokio::spawn(delayed_stop(
            self.outputs.clone(),
            self.state.clone(),
            StopPlan {
                generation: self.generation,
                ticks,
                tick,
                dont_stop_in_cutscene: recording.dont_stop_in_cutscene,
            },
            token,
            self.cutscene.subscribe(),
        ));
        self.tasks.push(handle);
    }

    /// 모든 지연 작업 취소 후 종료 대기
    pub async fn shutdown(&mut self) {
        let previous = std::mem::take(&mut *self.state.lock());
        if let AutomationState::StoppingPending { token, .. } = previous {
            token.cancel();
        }
        self.shutdown.cancel();
        for handle in self.tasks.drain(..) {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use obslink_core::error::CoreError;
    use obslink_core::models::output::{OutputState, RecordStatus, StreamStats};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Default)]
    struct MockOutputs {
        calls: parking_lot::Mutex<Vec<String>>,
        fail_start: AtomicBool,
    }

    impl MockOutputs {
        fn record(&self, call: impl Into<String>) {
            self.calls.lock().push(call.into());
        }

        fn count(&self, name: &str) -> usize {
            self.calls.lock().iter().filter(|c| c.as_str() == name).count()
        }

        fn has(&self, call: &str) -> bool {
            self.calls.lock().iter().any(|c| c == call)
        }
    }

    #[async_trait]
    impl OutputControl for MockOutputs {
        async fn get_record_directory(&self) -> Result<String, CoreError> {
            Ok(String::new())
        }
        async fn set_record_directory(&self, dir: &str) -> Result<(), CoreError> {
            self.record(format!("set_record_directory:{dir}"));
            Ok(())
        }
        async fn set_filename_format(&self, format: &str) -> Result<(), CoreError> {
            self.record(format!("set_filename_format:{format}"));
            Ok(())
        }
        async fn start_record(&self) -> Result<(), CoreError> {
            self.record("start_record");
            if self.fail_start.load(Ordering::SeqCst) {
                return Err(CoreError::Remote {
                    request: "StartRecord".to_string(),
                    code: 500,
                    comment: "injected".to_string(),
                });
            }
            Ok(())
        }
        async fn stop_record(&self) -> Result<Option<String>, CoreError> {
            self.record("stop_record");
            Ok(None)
        }
        async fn toggle_record(&self) -> Result<(), CoreError> {
            self.record("toggle_record");
            Ok(())
        }
        async fn record_status(&self) -> Result<RecordStatus, CoreError> {
            Ok(RecordStatus::default())
        }
        async fn start_replay_buffer(&self) -> Result<(), CoreError> {
            self.record("start_replay_buffer");
            Ok(())
        }
        async fn stop_replay_buffer(&self) -> Result<(), CoreError> {
            self.record("stop_replay_buffer");
            Ok(())
        }
        async fn save_replay_buffer(&self) -> Result<(), CoreError> {
            self.record("save_replay_buffer");
            Ok(())
        }
        async fn replay_buffer_active(&self) -> Result<bool, CoreError> {
            Ok(false)
        }
        async fn start_stream(&self) -> Result<(), CoreError> {
            Ok(())
        }
        async fn stop_stream(&self) -> Result<(), CoreError> {
            Ok(())
        }
        async fn toggle_stream(&self) -> Result<(), CoreError> {
            Ok(())
        }
        async fn stream_status(&self) -> Result<StreamStats, CoreError> {
            Ok(StreamStats::default())
        }
        async fn set_current_scene(&self, _scene: &str) -> Result<(), CoreError> {
            Ok(())
        }
        async fn set_input_mute(&self, _input: &str, _muted: bool) -> Result<(), CoreError> {
            Ok(())
        }
    }

    struct MockGuard {
        connected: AtomicBool,
    }

    #[async_trait]
    impl ConnectionGuard for MockGuard {
        async fn ensure_connected(&self) -> Result<(), CoreError> {
            if self.is_connected() {
                Ok(())
            } else {
                Err(CoreError::NotConnected)
            }
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
    }

    struct Harness {
        controller: CombatAutomationController,
        outputs: Arc<MockOutputs>,
        session: Arc<SessionContext>,
        _dir: TempDir,
    }

    fn harness(connected: bool, configure: impl FnOnce(&mut RecordingConfig)) -> Harness {
        let dir = TempDir::new().unwrap();
        let config = ConfigManager::with_path(dir.path().join("config.json")).unwrap();
        config
            .update_with(|c| {
                c.recording.start_on_combat = true;
                c.recording.stop_on_combat = true;
                configure(&mut c.recording);
            })
            .unwrap();
        let outputs = Arc::new(MockOutputs::default());
        let session = Arc::new(SessionContext::new());
        let guard = Arc::new(MockGuard {
            connected: AtomicBool::new(connected),
        });
        let controller =
            CombatAutomationController::new(config, session.clone(), outputs.clone(), guard);
        Harness {
            controller,
            outputs,
            session,
            _dir: dir,
        }
    }

    fn idle() -> ActivitySignal {
        ActivitySignal::default()
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[tokio::test(start_paused = true)]
    async fn combat_end_stops_after_delay() {
        let mut h = harness(true, |_| {});

        h.controller.on_signal(&ActivitySignal::combat()).await;
        assert_eq!(h.outputs.count("start_record"), 1);
        assert_matches!(h.controller.state(), AutomationState::Recording);

        h.controller.on_signal(&idle()).await;
        assert_matches!(h.controller.state(), AutomationState::StoppingPending { .. });

        tokio::time::sleep(Duration::from_millis(4500)).await;
        assert_eq!(h.outputs.count("stop_record"), 0);

        tokio::time::sleep(secs(1)).await;
        assert_eq!(h.outputs.count("stop_record"), 1);
        assert_matches!(h.controller.state(), AutomationState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn combat_resume_cancels_pending_stop() {
        let mut h = harness(true, |_| {});

        h.controller.on_signal(&ActivitySignal::combat()).await;
        h.controller.on_signal(&idle()).await;
        tokio::time::sleep(secs(2)).await;

        h.controller.on_signal(&ActivitySignal::combat()).await;
        assert_matches!(h.controller.state(), AutomationState::Recording);

        tokio::time::sleep(secs(30)).await;
        assert_eq!(h.outputs.count("stop_record"), 0);
        // 재개 시 새 녹화를 시작하지 않는다
        assert_eq!(h.outputs.count("start_record"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_without_cancel_keeps_pending_stop() {
        let mut h = harness(true, |r| r.cancel_stop_on_resume = false);

        h.controller.on_signal(&ActivitySignal::combat()).await;
        h.controller.on_signal(&idle()).await;
        tokio::time::sleep(secs(2)).await;
        h.controller.on_signal(&ActivitySignal::combat()).await;

        tokio::time::sleep(secs(10)).await;
        assert_eq!(h.outputs.count("stop_record"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn second_combat_end_replaces_pending_stop() {
        let mut h = harness(true, |r| r.cancel_stop_on_resume = false);

        h.controller.on_signal(&ActivitySignal::combat()).await;
        h.controller.on_signal(&idle()).await;
        let first = match h.controller.state() {
            AutomationState::StoppingPending { token, generation, .. } => {
                assert_eq!(generation, 1);
                token
            }
            other => panic!("unexpected state {other:?}"),
        };

        tokio::time::sleep(secs(2)).await;
        h.controller.on_signal(&ActivitySignal::combat()).await;
        tokio::time::sleep(secs(1)).await;
        h.controller.on_signal(&idle()).await;

        assert!(first.is_cancelled());
        assert_matches!(h.controller.state(), AutomationState::StoppingPending { generation: 2, .. });

        // 첫 예약의 마감(5초)이 지나도 정지하지 않는다
        tokio::time::sleep(secs(3)).await;
        assert_eq!(h.outputs.count("stop_record"), 0);

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(h.outputs.count("stop_record"), 1);
        assert_matches!(h.controller.state(), AutomationState::Idle);

        tokio::time::sleep(secs(30)).await;
        assert_eq!(h.outputs.count("stop_record"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_generation_task_leaves_newer_state() {
        let outputs = Arc::new(MockOutputs::default());
        let newer = CancelToken::new();
        let state = Arc::new(parking_lot::Mutex::new(AutomationState::StoppingPending {
            token: newer.clone(),
            generation: 2,
            deadline: Instant::now() + secs(5),
        }));
        let (_cutscene_tx, cutscene_rx) = watch::channel(false);

        delayed_stop(
            outputs.clone(),
            state.clone(),
            StopPlan {
                generation: 1,
                ticks: 2,
                tick: Duration::from_millis(500),
                dont_stop_in_cutscene: true,
            },
            CancelToken::new(),
            cutscene_rx,
        )
        .await;

        assert_eq!(outputs.count("stop_record"), 0);
        assert_matches!(*state.lock(), AutomationState::StoppingPending { generation: 2, .. });
        assert!(!newer.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn cutscene_defers_stop_until_it_ends() {
        let mut h = harness(true, |_| {});

        h.controller.on_signal(&ActivitySignal::combat()).await;
        let cutscene = ActivitySignal {
            in_cutscene: true,
            ..ActivitySignal::default()
        };
        h.controller.on_signal(&cutscene).await;

        tokio::time::sleep(secs(20)).await;
        assert_eq!(h.outputs.count("stop_record"), 0);
        assert_matches!(h.controller.state(), AutomationState::StoppingPending { .. });

        h.controller.on_signal(&idle()).await;
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(h.outputs.count("stop_record"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cutscene_ignored_without_guard() {
        let mut h = harness(true, |r| r.dont_stop_in_cutscene = false);

        h.controller.on_signal(&ActivitySignal::combat()).await;
        let cutscene = ActivitySignal {
            in_cutscene: true,
            ..ActivitySignal::default()
        };
        h.controller.on_signal(&cutscene).await;

        tokio::time::sleep(secs(6)).await;
        assert_eq!(h.outputs.count("stop_record"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_starts_recording_on_fresh_countdown() {
        let mut h = harness(true, |r| {
            r.start_on_combat = false;
            r.start_on_countdown = true;
        });
        let countdown = |value: f32| ActivitySignal {
            counting_down: value > 0.0,
            count_down_value: value,
            ..ActivitySignal::default()
        };

        h.controller.on_signal(&countdown(15.0)).await;
        assert_eq!(h.outputs.count("start_record"), 1);

        // 줄어드는 값은 새 카운트다운이 아니다
        h.controller.on_signal(&countdown(14.5)).await;
        h.controller.on_signal(&countdown(3.0)).await;
        assert_eq!(h.outputs.count("start_record"), 1);

        // 이미 녹화 중이면 다시 시작하지 않는다
        h.session
            .update_status(|s| s.record = OutputState::Started);
        h.controller.on_signal(&countdown(10.0)).await;
        assert_eq!(h.outputs.count("start_record"), 1);

        h.session
            .update_status(|s| s.record = OutputState::Stopped);
        h.controller.on_signal(&countdown(0.0)).await;
        h.controller.on_signal(&countdown(10.0)).await;
        assert_eq!(h.outputs.count("start_record"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn replay_saved_after_combat_end() {
        let mut h = harness(true, |r| {
            r.stop_on_combat = false;
            r.save_replay_on_combat_end = true;
        });

        h.controller.on_signal(&ActivitySignal::combat()).await;
        h.controller.on_signal(&idle()).await;
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(h.outputs.count("save_replay_buffer"), 0);

        tokio::time::sleep(secs(1)).await;
        assert_eq!(h.outputs.count("save_replay_buffer"), 1);
        assert_eq!(h.outputs.count("stop_record"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnected_skips_commands() {
        let mut h = harness(false, |_| {});

        h.controller.on_signal(&ActivitySignal::combat()).await;
        h.controller.on_signal(&idle()).await;
        tokio::time::sleep(secs(10)).await;

        assert!(h.outputs.calls.lock().is_empty());
        assert_matches!(h.controller.state(), AutomationState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_start_still_advances_state() {
        let mut h = harness(true, |_| {});
        h.outputs.fail_start.store(true, Ordering::SeqCst);

        h.controller.on_signal(&ActivitySignal::combat()).await;
        assert_matches!(h.controller.state(), AutomationState::Recording);
    }

    #[tokio::test(start_paused = true)]
    async fn recording_directory_follows_territory() {
        let mut h = harness(true, |r| r.record_dir = "/videos".to_string());

        let signal = ActivitySignal {
            in_combat: true,
            territory: Some("Limsa Lominsa".to_string()),
            ..ActivitySignal::default()
        };
        h.controller.on_signal(&signal).await;

        let expected = std::path::Path::new("/videos").join("Limsa Lominsa");
        assert!(h
            .outputs
            .has(&format!("set_record_directory:{}", expected.to_string_lossy())));
        assert!(h.outputs.has("set_filename_format:%CCYY-%MM-%DD %hh-%mm-%ss"));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_work() {
        let mut h = harness(true, |r| r.save_replay_on_combat_end = true);

        h.controller.on_signal(&ActivitySignal::combat()).await;
        h.controller.on_signal(&idle()).await;
        h.controller.shutdown().await;

        tokio::time::sleep(secs(30)).await;
        assert_eq!(h.outputs.count("stop_record"), 0);
        assert_eq!(h.outputs.count("save_replay_buffer"), 0);
    }
}
