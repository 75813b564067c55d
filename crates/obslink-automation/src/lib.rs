//! # obslink-automation
//!
//! 활동 신호(전투/카운트다운/컷신)에 반응해 원격 녹화를 시작하고 멈춘다.
//!
//! - [`controller`]: [`controller::CombatAutomationController`] 상태 머신
//! - [`delayed`]: 취소 가능한 지연 정지, 지연 리플레이 저장 작업
//! - [`recording_dir`]: 지역 이름을 반영한 녹화 디렉토리/파일명 정책

pub mod controller;
pub mod delayed;
pub mod recording_dir;
