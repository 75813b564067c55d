//! # obslink-app
//!
//! 어댑터 조립과 실행 루프.
//!
//! - [`scheduler`]: 프레임 폴링 루프. 오버레이 동기화와 녹화 자동화의 단일 구동자
//! - [`commands`]: 운영자 텍스트 명령 파싱과 stdin 수신
//! - [`replay`]: JSON Lines 프레임 녹화 재생 (UI 트리, 활동 신호 수집기)
//! - [`lifecycle`]: 종료 신호와 OS 시그널 처리
//! - [`notifier`]: 로그 기반 운영자 알림

pub mod commands;
pub mod lifecycle;
pub mod notifier;
pub mod replay;
pub mod scheduler;
