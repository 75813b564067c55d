//! # obslink-overlay
//!
//! 호스트 UI 트리를 매 프레임 읽어 원격 블러 필터와 동기화한다.
//!
//! 데이터 흐름: [`UiTree`](obslink_core::ports::ui_tree::UiTree) →
//! [`geometry::GeometryResolver`] → [`collectors`] → [`cache::RegionCache`] →
//! [`pipeline::SyncPipeline`] → [`applier::RegionApplier`] → 원격 필터.
//!
//! - [`geometry`]: 부모 체인을 따라 절대 사각형과 가시성 계산
//! - [`cache`]: 이름별 마지막 디스크립터, 변경 감지, 스윕
//! - [`pipeline`]: upsert/remove 큐와 전용 소비 루프 (오래된 쓰기 거부)
//! - [`applier`]: 원격 필터 생성/갱신/삭제
//! - [`collectors`]: 영역 계열별 UI 노드 수집
//! - [`snapshot`]: 직렬화 가능한 UI 트리 스냅샷
//! - [`synchronizer`]: 프레임 단위 오케스트레이션과 에러 격리

pub mod applier;
pub mod cache;
pub mod collectors;
pub mod geometry;
pub mod pipeline;
pub mod snapshot;
pub mod synchronizer;

#[cfg(test)]
mod testing;
