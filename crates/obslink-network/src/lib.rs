//! # obslink-network
//!
//! obs-websocket v5 원격 제어 어댑터.
//!
//! - [`protocol`]: 메시지 형식, opcode, 챌린지 인증, 상태 코드 매핑
//! - [`client`]: `tokio-tungstenite` 기반 [`client::ObsClient`] (필터/출력 제어 포트 구현)
//! - [`connection`]: [`connection::ConnectionManager`] (연결 잠금, 인증 실패 고정, 버전 확인, 상태 폴링)

pub mod client;
pub mod connection;
pub mod protocol;
