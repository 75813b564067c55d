//! 직렬화 가능한 UI 트리 스냅샷.
//!
//! 한 프레임의 노드 목록과 애드온 루트 이름을 담는다.
//! JSON Lines 프레임 녹화 재생과 테스트에서 [`UiTree`] 구현으로 쓰인다.

use obslink_core::models::geometry::Viewport;
use obslink_core::models::ui::{NodeId, UiNode};
use obslink_core::ports::ui_tree::UiTree;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 스냅샷 직렬화 형식
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotData {
    viewport: Viewport,
    #[serde(default)]
    nodes: Vec<UiNode>,
    #[serde(default)]
    addons: HashMap<String, NodeId>,
}

/// 한 프레임의 UI 트리.
///
/// 자식 순서는 `nodes` 배열에서의 순서를 따른다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "SnapshotData", into = "SnapshotData")]
pub struct UiSnapshot {
    viewport: Viewport,
    nodes: Vec<UiNode>,
    addons: HashMap<String, NodeId>,
    index: HashMap<NodeId, usize>,
    children: HashMap<NodeId, Vec<NodeId>>,
}

impl From<SnapshotData> for UiSnapshot {
    fn from(data: SnapshotData) -> Self {
        let mut snapshot = UiSnapshot::new(data.viewport);
        for node in data.nodes {
            snapshot.insert(node);
        }
        snapshot.addons = data.addons;
        snapshot
    }
}

impl From<UiSnapshot> for SnapshotData {
    fn from(snapshot: UiSnapshot) -> Self {
        SnapshotData {
            viewport: snapshot.viewport,
            nodes: snapshot.nodes,
            addons: snapshot.addons,
        }
    }
}

impl UiSnapshot {
    /// 빈 스냅샷
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            nodes: Vec::new(),
            addons: HashMap::new(),
            index: HashMap::new(),
            children: HashMap::new(),
        }
    }

    /// 노드 추가. 같은 id가 있으면 교체한다.
    pub fn insert(&mut self, node: UiNode) {
        if let Some(&i) = self.index.get(&node.id) {
            let old_parent = self.nodes[i].parent;
            if old_parent != node.parent {
                if let Some(parent) = old_parent {
                    if let Some(list) = self.children.get_mut(&parent) {
                        list.retain(|c| *c != node.id);
                    }
                }
                if let Some(parent) = node.parent {
                    self.children.entry(parent).or_default().push(node.id);
                }
            }
            self.nodes[i] = node;
            return;
        }

        if let Some(parent) = node.parent {
            self.children.entry(parent).or_default().push(node.id);
        }
        self.index.insert(node.id, self.nodes.len());
        self.nodes.push(node);
    }

    /// 노드 추가 (빌더)
    pub fn with_node(mut self, node: UiNode) -> Self {
        self.insert(node);
        self
    }

    /// 애드온 루트 등록
    pub fn with_addon(mut self, name: impl Into<String>, root: u64) -> Self {
        self.addons.insert(name.into(), NodeId(root));
        self
    }

    /// 노드 수
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl UiTree for UiSnapshot {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn addon(&self, name: &str) -> Option<NodeId> {
        self.addons.get(name).copied()
    }

    fn node(&self, id: NodeId) -> Option<UiNode> {
        self.index.get(&id).map(|&i| self.nodes[i].clone())
    }

    fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.children.get(&id).cloned().unwrap_or_default()
    }
}
