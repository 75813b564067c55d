//! 호스트 UI 트리 포트.
//!
//! 구현: `obslink-overlay::snapshot::UiSnapshot` (프레임 녹화 재생)

use crate::models::geometry::Viewport;
use crate::models::ui::{NodeId, UiNode};

/// 읽기 전용 UI 트리 핸들.
///
/// 존재하지 않는 노드는 `None`으로 표현한다. 호출자는 어느 단계에서든 `None`을
/// "보이지 않음"으로 취급해야 한다.
pub trait UiTree: Send + Sync {
    /// 현재 화면 크기
    fn viewport(&self) -> Viewport;

    /// 이름으로 애드온(UI 루트) 조회. 로드되지 않았으면 None.
    fn addon(&self, name: &str) -> Option<NodeId>;

    /// 노드 조회
    fn node(&self, id: NodeId) -> Option<UiNode>;

    /// 자식 노드 목록 (호스트 노드 리스트 순서)
    fn children(&self, id: NodeId) -> Vec<NodeId>;
}
