//! 원격 출력(스트림/녹화/리플레이 버퍼) 상태 모델.

use serde::{Deserialize, Serialize};

/// 출력 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputState {
    #[default]
    Stopped,
    Starting,
    Started,
    Stopping,
    Paused,
    Resumed,
    Unknown,
}

impl OutputState {
    /// obs-websocket `outputState` 문자열에서 변환
    pub fn from_ws(value: &str) -> Self {
        match value {
            "OBS_WEBSOCKET_OUTPUT_STARTING" => OutputState::Starting,
            "OBS_WEBSOCKET_OUTPUT_STARTED" => OutputState::Started,
            "OBS_WEBSOCKET_OUTPUT_STOPPING" => OutputState::Stopping,
            "OBS_WEBSOCKET_OUTPUT_STOPPED" => OutputState::Stopped,
            "OBS_WEBSOCKET_OUTPUT_PAUSED" => OutputState::Paused,
            "OBS_WEBSOCKET_OUTPUT_RESUMED" => OutputState::Resumed,
            _ => OutputState::Unknown,
        }
    }

    /// `outputActive` 불리언에서 변환
    pub fn from_active(active: bool) -> Self {
        if active {
            OutputState::Started
        } else {
            OutputState::Stopped
        }
    }

    /// 출력이 동작 중인지 (시작됨/일시정지/재개)
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            OutputState::Started | OutputState::Paused | OutputState::Resumed
        )
    }
}

/// 스트림 통계 (`GetStreamStatus`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamStats {
    pub active: bool,
    pub reconnecting: bool,
    pub timecode: String,
    pub bytes: u64,
    pub skipped_frames: u64,
    pub total_frames: u64,
}

/// 녹화 상태 (`GetRecordStatus`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordStatus {
    pub active: bool,
    pub paused: bool,
    pub timecode: String,
    pub bytes: u64,
}

/// 원격 필터 정보 (`GetSourceFilter`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterInfo {
    pub name: String,
    pub kind: String,
    pub enabled: bool,
    pub settings: serde_json::Value,
}

/// 원격 버전 정보 (`GetVersion`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub obs_version: String,
    pub websocket_version: String,
    pub rpc_version: u32,
}

/// 세션이 추적하는 출력 상태 묶음
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputStatus {
    pub stream: OutputState,
    pub record: OutputState,
    pub replay_buffer: OutputState,
    pub stream_stats: Option<StreamStats>,
    pub version: Option<VersionInfo>,
}
