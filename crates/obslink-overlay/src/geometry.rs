//! UI 노드 지오메트리 해석.
//!
//! 노드의 부모 체인을 루트 방향으로 따라가며 로컬 변환을 누적해
//! 절대 픽셀 사각형과 가시성을 계산한다.

use obslink_core::error::CoreError;
use obslink_core::models::geometry::{AbsoluteRect, RegionBounds};
use obslink_core::models::ui::{NodeId, UiNode};
use obslink_core::ports::ui_tree::UiTree;

/// 부모 체인 최대 깊이. 순환 참조가 있는 트리에서 무한 루프를 막는다.
const MAX_DEPTH: usize = 64;

/// 해석 결과
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResolvedNode {
    pub rect: AbsoluteRect,
    pub visible: bool,
}

/// UI 트리 위의 지오메트리 해석기
pub struct GeometryResolver<'a> {
    tree: &'a dyn UiTree,
}

impl<'a> GeometryResolver<'a> {
    pub fn new(tree: &'a dyn UiTree) -> Self {
        Self { tree }
    }

    /// 노드의 절대 사각형과 가시성.
    ///
    /// 체인 어디서든 노드가 없으면 보이지 않는 0 사각형을 돌려준다.
    /// `floating`이면 각 노드의 오프셋을 자기 스케일로 늘어난 크기만큼 보정한다
    /// (가로는 절반, 세로는 전체: 하단 중앙 기준 앵커).
    pub fn resolve(&self, node: Option<NodeId>, floating: bool) -> ResolvedNode {
        let Some(chain) = node.and_then(|id| self.chain(id)) else {
            return ResolvedNode::default();
        };
        let leaf = &chain[0];

        let (scale_x, scale_y) = chain
            .iter()
            .fold((1.0, 1.0), |(sx, sy), n| (sx * n.scale_x, sy * n.scale_y));
        let visible = chain.iter().all(|n| n.visible);
        let (x, y) = if floating {
            floating_position(&chain)
        } else {
            position(&chain)
        };

        ResolvedNode {
            rect: AbsoluteRect::new(x, y, leaf.width * scale_x, leaf.height * scale_y),
            visible,
        }
    }

    /// 뷰포트 대비 퍼센트 경계와 가시성
    pub fn resolve_bounds(
        &self,
        node: Option<NodeId>,
        floating: bool,
    ) -> Result<(RegionBounds, bool), CoreError> {
        let resolved = self.resolve(node, floating);
        let bounds = RegionBounds::from_rect(resolved.rect, self.tree.viewport())?;
        Ok((bounds, resolved.visible))
    }

    /// 노드 자신과 모든 조상의 가시성
    pub fn is_visible(&self, node: Option<NodeId>) -> bool {
        node.and_then(|id| self.chain(id))
            .is_some_and(|chain| chain.iter().all(|n| n.visible))
    }

    /// 노드부터 루트까지의 체인. 중간에 끊기거나 너무 깊으면 None.
    fn chain(&self, id: NodeId) -> Option<Vec<UiNode>> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(id) = current {
            if chain.len() >= MAX_DEPTH {
                return None;
            }
            let node = self.tree.node(id)?;
            current = node.parent;
            chain.push(node);
        }
        Some(chain)
    }
}

/// 일반 위치: 조상마다 누적 위치에 조상 스케일을 곱한 뒤 조상 위치를 더한다
fn position(chain: &[UiNode]) -> (f32, f32) {
    let leaf = &chain[0];
    chain[1..]
        .iter()
        .fold((leaf.x, leaf.y), |(x, y), parent| {
            (x * parent.scale_x + parent.x, y * parent.scale_y + parent.y)
        })
}

/// 플로팅 위치: 각 노드의 보정 오프셋에 직계 부모 스케일만 곱해 합산한다
fn floating_position(chain: &[UiNode]) -> (f32, f32) {
    chain
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(x, y), (i, node)| {
            let corrected_x = node.x - node.width * ((node.scale_x - 1.0) / 2.0);
            let corrected_y = node.y - node.height * (node.scale_y - 1.0);
            let (psx, psy) = chain
                .get(i + 1)
                .map(|p| (p.scale_x, p.scale_y))
                .unwrap_or((1.0, 1.0));
            (x + corrected_x * psx, y + corrected_y * psy)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::UiSnapshot;
    use obslink_core::models::geometry::Viewport;
    use obslink_core::models::ui::NodeKind;

    fn tree() -> UiSnapshot {
        UiSnapshot::new(Viewport::new(1920.0, 1080.0))
            .with_node(UiNode::new(1, NodeKind::Res, 100.0, 50.0, 800.0, 600.0).with_scale(2.0, 2.0))
            .with_node(
                UiNode::new(2, NodeKind::Res, 10.0, 20.0, 300.0, 200.0)
                    .with_parent(1)
                    .with_scale(0.5, 1.0),
            )
            .with_node(UiNode::new(3, NodeKind::Text, 4.0, 6.0, 40.0, 10.0).with_parent(2))
    }

    #[test]
    fn scale_then_translate_per_ancestor() {
        let tree = tree();
        let resolved = GeometryResolver::new(&tree).resolve(Some(NodeId(3)), false);

        // (4,6) * (0.5,1) + (10,20) = (12,26); * (2,2) + (100,50) = (124,102)
        assert_eq!(resolved.rect.x, 124.0);
        assert_eq!(resolved.rect.y, 102.0);
        // 40 * 0.5 * 2, 10 * 1 * 2
        assert_eq!(resolved.rect.width, 40.0);
        assert_eq!(resolved.rect.height, 20.0);
        assert!(resolved.visible);
    }

    #[test]
    fn hidden_ancestor_hides_subtree() {
        let mut tree = tree();
        tree.insert(
            UiNode::new(2, NodeKind::Res, 10.0, 20.0, 300.0, 200.0)
                .with_parent(1)
                .with_visible(false),
        );
        let resolver = GeometryResolver::new(&tree);
        assert!(!resolver.resolve(Some(NodeId(3)), false).visible);
        assert!(!resolver.is_visible(Some(NodeId(3))));
        assert!(resolver.is_visible(Some(NodeId(1))));
    }

    #[test]
    fn missing_node_is_neutral() {
        let tree = tree();
        let resolver = GeometryResolver::new(&tree);
        assert_eq!(resolver.resolve(None, false), ResolvedNode::default());
        assert_eq!(resolver.resolve(Some(NodeId(42)), true), ResolvedNode::default());

        let dangling = UiSnapshot::new(Viewport::new(100.0, 100.0))
            .with_node(UiNode::new(5, NodeKind::Text, 1.0, 1.0, 1.0, 1.0).with_parent(77));
        let resolved = GeometryResolver::new(&dangling).resolve(Some(NodeId(5)), false);
        assert!(!resolved.visible);
        assert_eq!(resolved.rect, AbsoluteRect::default());
    }

    #[test]
    fn cycle_does_not_hang() {
        let tree = UiSnapshot::new(Viewport::new(100.0, 100.0))
            .with_node(UiNode::new(1, NodeKind::Res, 0.0, 0.0, 1.0, 1.0).with_parent(2))
            .with_node(UiNode::new(2, NodeKind::Res, 0.0, 0.0, 1.0, 1.0).with_parent(1));
        assert!(!GeometryResolver::new(&tree).resolve(Some(NodeId(1)), false).visible);
    }

    #[test]
    fn floating_corrects_for_own_scale() {
        let tree = UiSnapshot::new(Viewport::new(1920.0, 1080.0))
            .with_node(UiNode::new(1, NodeKind::Res, 0.0, 0.0, 1920.0, 1080.0))
            .with_node(
                UiNode::new(2, NodeKind::Collision, 500.0, 400.0, 100.0, 20.0)
                    .with_parent(1)
                    .with_scale(1.5, 1.5),
            );
        let resolver = GeometryResolver::new(&tree);
        let plain = resolver.resolve(Some(NodeId(2)), false);
        let floating = resolver.resolve(Some(NodeId(2)), true);

        assert_eq!(plain.rect.x, 500.0);
        // 500 - 100 * 0.5 / 2, 400 - 20 * 0.5
        assert_eq!(floating.rect.x, 475.0);
        assert_eq!(floating.rect.y, 390.0);
        assert_eq!(floating.rect.width, plain.rect.width);
    }

    #[test]
    fn bounds_use_tree_viewport() {
        let tree = UiSnapshot::new(Viewport::new(1920.0, 1080.0))
            .with_node(UiNode::new(1, NodeKind::Text, 100.0, 100.0, 200.0, 50.0));
        let (bounds, visible) = GeometryResolver::new(&tree)
            .resolve_bounds(Some(NodeId(1)), false)
            .unwrap();
        assert!(visible);
        assert!((bounds.top - 9.26).abs() < 0.01);
        assert!((bounds.left - 5.21).abs() < 0.01);
    }
}
