//! # obslink-core
//!
//! obslink 도메인 모델, 포트(trait) 정의, 에러 타입.
//! 모든 크레이트가 공유하는 핵심 타입과 인터페이스를 제공한다.
//!
//! ## 구조
//!
//! - [`models`]: 도메인 데이터 구조체 (영역 디스크립터, 지오메트리, 활동 신호, 출력 상태)
//! - [`ports`]: Hexagonal Architecture 포트 인터페이스 (UI 트리, 활동 신호, 원격 제어)
//! - [`error`]: 핵심 에러 타입 (thiserror)
//! - [`config`]: 애플리케이션 설정 구조체
//! - [`config_manager`]: 설정 파일 관리 (로드/저장)
//! - [`session`]: 세션 범위 공유 상태 (연결 플래그, UI 에러 카운터)
//! - [`cancel`]: 협조적 취소 토큰

pub mod cancel;
pub mod config;
pub mod config_manager;
pub mod error;
pub mod models;
pub mod ports;
pub mod session;
