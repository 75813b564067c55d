//! 원격 제어 포트.
//!
//! 구현: `obslink-network` crate (obs-websocket v5 over tokio-tungstenite)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::output::{FilterInfo, RecordStatus, StreamStats};

/// 원격 마스크 필터 제어 (소스별 이름 있는 필터)
#[async_trait]
pub trait FilterControl: Send + Sync {
    /// 필터 조회. 필터가 없으면 `Ok(None)`, 소스가 없으면 `NotFound { "Source" }`.
    async fn get_filter(&self, source: &str, name: &str)
        -> Result<Option<FilterInfo>, CoreError>;

    /// 필터 생성
    async fn create_filter(
        &self,
        source: &str,
        name: &str,
        kind: &str,
        settings: serde_json::Value,
    ) -> Result<(), CoreError>;

    /// 필터 설정 갱신 (기존 설정 위에 덮어쓰기)
    async fn set_filter_settings(
        &self,
        source: &str,
        name: &str,
        settings: serde_json::Value,
    ) -> Result<(), CoreError>;

    /// 필터 활성화/비활성화
    async fn set_filter_enabled(
        &self,
        source: &str,
        name: &str,
        enabled: bool,
    ) -> Result<(), CoreError>;

    /// 필터 삭제. 삭제했으면 true, 원래 없었으면 false.
    async fn remove_filter(&self, source: &str, name: &str) -> Result<bool, CoreError>;
}

/// 녹화/스트림/리플레이 버퍼/장면/오디오 제어
#[async_trait]
pub trait OutputControl: Send + Sync {
    /// 녹화 디렉토리 조회
    async fn get_record_directory(&self) -> Result<String, CoreError>;

    /// 녹화 디렉토리 설정
    async fn set_record_directory(&self, dir: &str) -> Result<(), CoreError>;

    /// 녹화 파일명 형식 설정
    async fn set_filename_format(&self, format: &str) -> Result<(), CoreError>;

    async fn start_record(&self) -> Result<(), CoreError>;

    /// 녹화 중지. 저장된 파일 경로를 반환한다.
    async fn stop_record(&self) -> Result<Option<String>, CoreError>;

    async fn toggle_record(&self) -> Result<(), CoreError>;

    async fn record_status(&self) -> Result<RecordStatus, CoreError>;

    async fn start_replay_buffer(&self) -> Result<(), CoreError>;

    async fn stop_replay_buffer(&self) -> Result<(), CoreError>;

    async fn save_replay_buffer(&self) -> Result<(), CoreError>;

    /// 리플레이 버퍼 동작 여부
    async fn replay_buffer_active(&self) -> Result<bool, CoreError>;

    async fn start_stream(&self) -> Result<(), CoreError>;

    async fn stop_stream(&self) -> Result<(), CoreError>;

    async fn toggle_stream(&self) -> Result<(), CoreError>;

    async fn stream_status(&self) -> Result<StreamStats, CoreError>;

    /// 현재 프로그램 장면 변경
    async fn set_current_scene(&self, scene: &str) -> Result<(), CoreError>;

    /// 오디오 입력 음소거 설정
    async fn set_input_mute(&self, input: &str, muted: bool) -> Result<(), CoreError>;
}

/// 연결 보장. 명령 전에 호출되며 동시 호출은 하나의 연결 시도로 합쳐진다.
#[async_trait]
pub trait ConnectionGuard: Send + Sync {
    /// 연결되어 있지 않으면 연결 시도
    async fn ensure_connected(&self) -> Result<(), CoreError>;

    /// 현재 연결 여부
    fn is_connected(&self) -> bool;
}
