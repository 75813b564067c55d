//! obs-websocket v5 프로토콜.
//!
//! 모든 메시지는 `{ "op": <opcode>, "d": <payload> }` JSON 텍스트 프레임이다.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use obslink_core::error::CoreError;
use obslink_core::models::output::OutputState;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// 지원하는 RPC 버전
pub const RPC_VERSION: u32 = 1;

/// opcode
pub mod op {
    pub const HELLO: u8 = 0;
    pub const IDENTIFY: u8 = 1;
    pub const IDENTIFIED: u8 = 2;
    pub const EVENT: u8 = 5;
    pub const REQUEST: u8 = 6;
    pub const REQUEST_RESPONSE: u8 = 7;
}

/// 이벤트 구독 비트
pub mod subscription {
    pub const GENERAL: u32 = 1 << 0;
    pub const OUTPUTS: u32 = 1 << 6;
}

/// 인증 실패 close 코드
pub const CLOSE_AUTHENTICATION_FAILED: u16 = 4009;

/// 요청 상태 코드
pub const STATUS_SUCCESS: u16 = 100;
pub const STATUS_RESOURCE_NOT_FOUND: u16 = 600;

/// 최상위 메시지
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub op: u8,
    #[serde(default)]
    pub d: Value,
}

impl Envelope {
    /// 페이로드를 직렬화해 텍스트 프레임으로
    pub fn encode<T: Serialize>(op: u8, payload: &T) -> Result<String, CoreError> {
        let envelope = Envelope {
            op,
            d: serde_json::to_value(payload)?,
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    /// 페이로드 역직렬화
    pub fn payload<T: DeserializeOwned>(self) -> Result<T, CoreError> {
        Ok(serde_json::from_value(self.d)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    pub obs_web_socket_version: String,
    pub rpc_version: u32,
    #[serde(default)]
    pub authentication: Option<AuthChallenge>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthChallenge {
    pub challenge: String,
    pub salt: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identify {
    pub rpc_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<String>,
    pub event_subscriptions: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identified {
    pub negotiated_rpc_version: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request<'a> {
    pub request_type: &'a str,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_data: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    pub request_type: String,
    pub request_id: String,
    pub request_status: RequestStatus,
    #[serde(default)]
    pub response_data: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestStatus {
    pub result: bool,
    pub code: u16,
    #[serde(default)]
    pub comment: Option<String>,
}

impl RequestResponse {
    /// 상태를 검사해 응답 데이터 또는 에러로 변환.
    ///
    /// 600(ResourceNotFound)은 설명에 "filter"가 있으면 필터, 없으면 소스 미발견으로 본다.
    pub fn into_result(self) -> Result<Value, CoreError> {
        if self.request_status.result {
            return Ok(self.response_data.unwrap_or(Value::Null));
        }
        let comment = self.request_status.comment.unwrap_or_default();
        if self.request_status.code == STATUS_RESOURCE_NOT_FOUND {
            let resource_type = if comment.to_lowercase().contains("filter") {
                "Filter"
            } else {
                "Source"
            };
            return Err(CoreError::NotFound {
                resource_type: resource_type.to_string(),
                id: comment,
            });
        }
        Err(CoreError::Remote {
            request: self.request_type,
            code: self.request_status.code,
            comment,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    pub event_type: String,
    #[serde(default)]
    pub event_data: Option<Value>,
}

/// 세션이 관심 있는 원격 이벤트
#[derive(Debug, Clone, PartialEq)]
pub enum ObsEvent {
    StreamStateChanged(OutputState),
    RecordStateChanged {
        state: OutputState,
        output_path: Option<String>,
    },
    ReplayBufferStateChanged(OutputState),
    ExitStarted,
    /// 소켓이 닫힘 (원격 이벤트가 아닌 클라이언트 내부 신호)
    ConnectionClosed,
    Other(String),
}

impl From<RawEvent> for ObsEvent {
    fn from(raw: RawEvent) -> Self {
        let data = raw.event_data.unwrap_or(Value::Null);
        let state = || {
            data.get("outputState")
                .and_then(Value::as_str)
                .map(OutputState::from_ws)
                .unwrap_or(OutputState::Unknown)
        };
        match raw.event_type.as_str() {
            "StreamStateChanged" => ObsEvent::StreamStateChanged(state()),
            "RecordStateChanged" => ObsEvent::RecordStateChanged {
                state: state(),
                output_path: data
                    .get("outputPath")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            "ReplayBufferStateChanged" => ObsEvent::ReplayBufferStateChanged(state()),
            "ExitStarted" => ObsEvent::ExitStarted,
            _ => ObsEvent::Other(raw.event_type),
        }
    }
}

/// 챌린지 인증 문자열.
/// `base64(sha256(base64(sha256(password + salt)) + challenge))`
pub fn auth_response(password: &str, challenge: &AuthChallenge) -> String {
    let secret = STANDARD.encode(Sha256::digest(format!("{}{}", password, challenge.salt)));
    STANDARD.encode(Sha256::digest(format!("{}{}", secret, challenge.challenge)))
}
