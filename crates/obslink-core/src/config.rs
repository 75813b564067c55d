//! 애플리케이션 설정 구조체.
//!
//! 원격 연결 주소/자격증명, 블러 영역 토글, 녹화 자동화, 프레임 주기 등
//! 런타임 설정을 정의한다. [`crate::config_manager::ConfigManager`]가 JSON 파일로 로드/저장.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::region::RegionFamily;

/// 블러 강도 하한
pub const MIN_BLUR_SIZE: i32 = 1;
/// 블러 강도 상한
pub const MAX_BLUR_SIZE: i32 = 128;
/// 네임플레이트 블러 최대 개수 상한
pub const MAX_NAME_PLATE_LIMIT: usize = 50;

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 원격 연결 설정
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// 오버레이(블러 영역) 설정
    #[serde(default)]
    pub overlay: OverlayConfig,
    /// 녹화 자동화 설정
    #[serde(default)]
    pub recording: RecordingConfig,
    /// 프레임 스케줄러 설정
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

// ============================================================
// 연결 설정
// ============================================================

/// 원격 연결 설정: obs-websocket 주소, 비밀번호, 상태 폴링 주기
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// WebSocket 주소 (ws://host:port)
    #[serde(default = "default_address")]
    pub address: String,
    /// 인증 비밀번호 (비어 있으면 시작 시 자동 연결하지 않음)
    #[serde(default)]
    pub password: String,
    /// 허용하는 최소 obs-websocket 버전
    #[serde(default = "default_min_websocket_version")]
    pub min_websocket_version: String,
    /// 스트림 상태 폴링 주기 (밀리초)
    #[serde(default = "default_status_poll_interval_ms")]
    pub status_poll_interval_ms: u64,
    /// 요청 응답 타임아웃 (밀리초)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            password: String::new(),
            min_websocket_version: default_min_websocket_version(),
            status_poll_interval_ms: default_status_poll_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

// ============================================================
// 오버레이 설정
// ============================================================

/// 오버레이 설정: UI 감지, 대상 소스, 영역 계열별 토글
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// 오버레이 동기화 전체 활성화
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 매 프레임 UI 감지 여부 (끄면 수동 `update` 명령으로만 동기화)
    #[serde(default = "default_true")]
    pub ui_detection: bool,
    /// 블러 필터를 붙일 원격 비디오 소스 이름
    #[serde(default = "default_source_name")]
    pub source_name: String,
    /// 블러 강도 (패스 수)
    #[serde(default = "default_blur_size")]
    pub blur_size: i32,
    /// 비동기 파이프라인 사용 여부 (끄면 폴링 스레드에서 즉시 적용)
    #[serde(default = "default_true")]
    pub blur_async: bool,
    /// 파이프라인 큐 용량
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// UI 감지를 끄기 전까지 허용하는 누적 에러 수
    #[serde(default = "default_ui_error_threshold")]
    pub ui_error_threshold: u32,
    /// 채팅 로그
    #[serde(default = "default_true")]
    pub chat_log: bool,
    /// 파티 리스트
    #[serde(default = "default_true")]
    pub party_list: bool,
    /// 대상
    #[serde(default)]
    pub target: bool,
    /// 대상의 대상
    #[serde(default = "default_true")]
    pub target_target: bool,
    /// 포커스 대상
    #[serde(default)]
    pub focus_target: bool,
    /// 네임플레이트 (성능 부담이 큼)
    #[serde(default)]
    pub name_plate: bool,
    /// 블러할 네임플레이트 최대 개수 (화면 중심 거리순)
    #[serde(default = "default_max_name_plate_count")]
    pub max_name_plate_count: usize,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ui_detection: true,
            source_name: default_source_name(),
            blur_size: default_blur_size(),
            blur_async: true,
            queue_capacity: default_queue_capacity(),
            ui_error_threshold: default_ui_error_threshold(),
            chat_log: true,
            party_list: true,
            target: false,
            target_target: true,
            focus_target: false,
            name_plate: false,
            max_name_plate_count: default_max_name_plate_count(),
        }
    }
}

impl OverlayConfig {
    /// 영역 계열 활성화 여부
    pub fn family_enabled(&self, family: RegionFamily) -> bool {
        match family {
            RegionFamily::ChatLog => self.chat_log,
            RegionFamily::PartyList => self.party_list,
            RegionFamily::Target => self.target,
            RegionFamily::TargetTarget => self.target_target,
            RegionFamily::FocusTarget => self.focus_target,
            RegionFamily::NamePlate => self.name_plate,
        }
    }

    /// 영역 계열 토글 설정
    pub fn set_family_enabled(&mut self, family: RegionFamily, enabled: bool) {
        match family {
            RegionFamily::ChatLog => self.chat_log = enabled,
            RegionFamily::PartyList => self.party_list = enabled,
            RegionFamily::Target => self.target = enabled,
            RegionFamily::TargetTarget => self.target_target = enabled,
            RegionFamily::FocusTarget => self.focus_target = enabled,
            RegionFamily::NamePlate => self.name_plate = enabled,
        }
    }

    /// 허용 범위로 보정된 블러 강도
    pub fn effective_blur_size(&self) -> i32 {
        self.blur_size.clamp(MIN_BLUR_SIZE, MAX_BLUR_SIZE)
    }

    /// 허용 범위로 보정된 네임플레이트 개수
    pub fn effective_name_plate_count(&self) -> usize {
        self.max_name_plate_count.clamp(1, MAX_NAME_PLATE_LIMIT)
    }
}

// ============================================================
// 녹화 설정
// ============================================================

/// 녹화 자동화 설정: 전투/카운트다운 기반 시작/중지, 리플레이 버퍼 저장
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// 녹화 기본 디렉토리 (비어 있으면 첫 연결 시 원격 값으로 채움)
    #[serde(default)]
    pub record_dir: String,
    /// 녹화 파일명 형식
    #[serde(default = "default_filename_format")]
    pub filename_format: String,
    /// 지역 이름을 하위 디렉토리로 사용
    #[serde(default = "default_true")]
    pub include_territory: bool,
    /// 지역 이름을 하위 디렉토리 대신 파일명 접미사로 사용
    #[serde(default)]
    pub zone_as_suffix: bool,
    /// 카운트다운 시작 시 녹화 시작
    #[serde(default)]
    pub start_on_countdown: bool,
    /// 전투 시작 시 녹화 시작
    #[serde(default)]
    pub start_on_combat: bool,
    /// 전투 종료 시 녹화 중지
    #[serde(default)]
    pub stop_on_combat: bool,
    /// 전투 종료 후 녹화 중지까지 대기 (초)
    #[serde(default = "default_stop_delay_secs")]
    pub stop_delay_secs: u64,
    /// 대기 중 전투가 재개되면 중지를 취소
    #[serde(default = "default_true")]
    pub cancel_stop_on_resume: bool,
    /// 컷신 시청 중에는 중지를 미룸
    #[serde(default = "default_true")]
    pub dont_stop_in_cutscene: bool,
    /// 전투 종료 후 리플레이 버퍼 저장
    #[serde(default)]
    pub save_replay_on_combat_end: bool,
    /// 전투 종료 후 리플레이 저장까지 대기 (초)
    #[serde(default = "default_replay_save_delay_secs")]
    pub replay_save_delay_secs: u64,
    /// 지연 작업 폴링 간격 (밀리초)
    #[serde(default = "default_poll_tick_ms")]
    pub poll_tick_ms: u64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            record_dir: String::new(),
            filename_format: default_filename_format(),
            include_territory: true,
            zone_as_suffix: false,
            start_on_countdown: false,
            start_on_combat: false,
            stop_on_combat: false,
            stop_delay_secs: default_stop_delay_secs(),
            cancel_stop_on_resume: true,
            dont_stop_in_cutscene: true,
            save_replay_on_combat_end: false,
            replay_save_delay_secs: default_replay_save_delay_secs(),
            poll_tick_ms: default_poll_tick_ms(),
        }
    }
}

impl RecordingConfig {
    /// 녹화 중지 지연
    pub fn stop_delay(&self) -> Duration {
        Duration::from_secs(self.stop_delay_secs)
    }

    /// 리플레이 저장 지연
    pub fn replay_save_delay(&self) -> Duration {
        Duration::from_secs(self.replay_save_delay_secs)
    }

    /// 지연 작업 폴링 간격 (0이면 1ms로 보정)
    pub fn poll_tick(&self) -> Duration {
        Duration::from_millis(self.poll_tick_ms.max(1))
    }
}

// ============================================================
// 스케줄러 설정
// ============================================================

/// 프레임 스케줄러 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// 프레임 폴링 주기 (밀리초)
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_interval_ms(),
        }
    }
}

impl AppConfig {
    /// 기본 설정 생성
    pub fn default_config() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            overlay: OverlayConfig::default(),
            recording: RecordingConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }

    /// 요청 타임아웃을 Duration으로 반환
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.connection.request_timeout_ms)
    }

    /// 상태 폴링 주기를 Duration으로 반환
    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.connection.status_poll_interval_ms.max(1))
    }

    /// 프레임 폴링 주기를 Duration으로 반환
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.scheduler.frame_interval_ms.max(1))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

// ============================================================
// 기본값 함수
// ============================================================

fn default_true() -> bool {
    true
}

fn default_address() -> String {
    "ws://127.0.0.1:4455".to_string()
}
fn default_min_websocket_version() -> String {
    "5.0.0".to_string()
}
fn default_status_poll_interval_ms() -> u64 {
    500
}
fn default_request_timeout_ms() -> u64 {
    5_000
}
fn default_source_name() -> String {
    "FFXIV".to_string()
}
fn default_blur_size() -> i32 {
    3
}
fn default_queue_capacity() -> usize {
    256
}
fn default_ui_error_threshold() -> u32 {
    1_000
}
fn default_max_name_plate_count() -> usize {
    1
}
fn default_filename_format() -> String {
    "%CCYY-%MM-%DD %hh-%mm-%ss".to_string()
}
fn default_stop_delay_secs() -> u64 {
    5
}
fn default_replay_save_delay_secs() -> u64 {
    3
}
fn default_poll_tick_ms() -> u64 {
    1_000
}
fn default_frame_interval_ms() -> u64 {
    16 // ~60fps
}
