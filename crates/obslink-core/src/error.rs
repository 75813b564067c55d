//! obslink 핵심 에러 타입.
//!
//! 모든 어댑터 crate는 이 에러 타입을 그대로 반환하거나 `#[from]`으로 래핑한다.

use thiserror::Error;

/// 코어 레이어 에러.
/// 연결, 원격 명령, UI 프로브, 설정 등 도메인 공통 에러를 정의한다.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// 필드 유효성 검증 실패
    #[error("유효성 검증 실패 ({field}): {message}")]
    Validation {
        /// 검증 실패한 필드명
        field: String,
        /// 실패 사유
        message: String,
    },

    /// 인증 실패 (비밀번호 오류, 인증 거부).
    /// 연결을 끊고 "연결 실패" 상태를 고정한다.
    #[error("인증 에러: {0}")]
    Auth(String),

    /// 네트워크 에러 (연결 실패, 타임아웃, 소켓 종료).
    /// 로그만 남기고 이전 연결 상태는 유지한다.
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 원격 연결이 없음
    #[error("원격 연결 없음")]
    NotConnected,

    /// 원격 리소스를 찾을 수 없음.
    /// 생성/갱신 분기 또는 삭제 no-op 판단에 쓰이는 비에러 신호.
    #[error("{resource_type} 미발견: {id}")]
    NotFound {
        /// 리소스 종류 (예: "Source", "Filter")
        resource_type: String,
        /// 리소스 식별자
        id: String,
    },

    /// 원격 명령 실패 (재시도 없이 로그 후 진행)
    #[error("원격 명령 실패 {request} (code {code}): {comment}")]
    Remote {
        /// 요청 타입 (예: "StartRecord")
        request: String,
        /// 원격 상태 코드
        code: u16,
        /// 원격 설명
        comment: String,
    },

    /// UI 영역 지오메트리 해석 실패 (영역별로 격리)
    #[error("UI 프로브 에러 ({region}): {message}")]
    UiProbe {
        /// 실패한 영역 계열 (예: "PartyList")
        region: String,
        /// 실패 사유
        message: String,
    },

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// 원격 리소스 미발견 여부
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound { .. })
    }

    /// 원격 소스(비디오 소스) 자체가 없는 경우
    pub fn is_missing_source(&self) -> bool {
        matches!(self, CoreError::NotFound { resource_type, .. } if resource_type == "Source")
    }
}
