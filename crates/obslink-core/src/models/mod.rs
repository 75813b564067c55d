//! obslink 도메인 모델.
//!
//! 어댑터 crate 간에 주고받는 데이터 구조체를 정의한다.
//! 대부분 `serde` Serialize/Deserialize를 구현한다 (프레임 녹화 재생, 설정, 원격 응답).

pub mod activity;
pub mod automation;
pub mod geometry;
pub mod output;
pub mod region;
pub mod ui;
