//! 포트 인터페이스 (trait).
//!
//! Hexagonal Architecture의 포트 레이어.
//! 어댑터 crate가 이 trait들을 구현하며, `obslink-app`에서 `Arc<dyn T>`로 와이어링한다.
//!
//! 원격 제어처럼 I/O가 있는 trait은 `async_trait`으로 object safety를 보장하고,
//! 프레임마다 동기적으로 읽는 UI 트리/활동 신호는 동기 trait이다.

pub mod activity;
pub mod notifier;
pub mod remote;
pub mod ui_tree;
