//! 호스트 UI 트리 노드 모델.
//!
//! 호스트의 retained-mode UI 그래프를 읽기 전용 핸들로 표현한다.
//! 코어는 트리를 소유하거나 변경하지 않는다.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 프레임 내에서 안정적인 노드 식별자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::UpperHex for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::UpperHex::fmt(&self.0, f)
    }
}

/// 노드 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Res,
    Image,
    Text,
    NineGrid,
    Counter,
    Collision,
    /// 컴포넌트 노드 (호스트 정의 타입 번호)
    Component(u32),
}

/// 파티 리스트 멤버 컴포넌트 타입 번호
pub const PARTY_MEMBER_COMPONENT: u32 = 1006;
/// 네임플레이트 컴포넌트 타입 번호
pub const NAME_PLATE_COMPONENT: u32 = 1001;

/// UI 노드의 로컬 변환과 가시성
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiNode {
    pub id: NodeId,
    pub kind: NodeKind,
    /// 부모 기준 위치
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    /// 스케일 적용 전 크기
    #[serde(default)]
    pub width: f32,
    #[serde(default)]
    pub height: f32,
    #[serde(default = "one")]
    pub scale_x: f32,
    #[serde(default = "one")]
    pub scale_y: f32,
    #[serde(default = "visible_default")]
    pub visible: bool,
    /// 부모 노드 (루트면 None)
    #[serde(default)]
    pub parent: Option<NodeId>,
}

fn one() -> f32 {
    1.0
}

fn visible_default() -> bool {
    true
}

impl UiNode {
    /// 스케일 1, 보이는 상태의 노드 생성
    pub fn new(id: u64, kind: NodeKind, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            id: NodeId(id),
            kind,
            x,
            y,
            width,
            height,
            scale_x: 1.0,
            scale_y: 1.0,
            visible: true,
            parent: None,
        }
    }

    /// 부모 지정
    pub fn with_parent(mut self, parent: u64) -> Self {
        self.parent = Some(NodeId(parent));
        self
    }

    /// 스케일 지정
    pub fn with_scale(mut self, scale_x: f32, scale_y: f32) -> Self {
        self.scale_x = scale_x;
        self.scale_y = scale_y;
        self
    }

    /// 가시성 지정
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// 특정 타입 번호의 컴포넌트인지
    pub fn is_component(&self, component: u32) -> bool {
        self.kind == NodeKind::Component(component)
    }
}
