//! 영역 계열별 UI 노드 수집.
//!
//! 각 계열은 이름 있는 애드온(UI 루트) 하나를 읽어 이번 프레임의 디스크립터 목록을 만든다.
//! 애드온이 로드되지 않았으면 `None`을 돌려준다 (이번 프레임은 아무것도 하지 않음).

use obslink_core::config::OverlayConfig;
use obslink_core::error::CoreError;
use obslink_core::models::region::{RegionDescriptor, RegionFamily};
use obslink_core::models::ui::{NodeId, NodeKind, NAME_PLATE_COMPONENT, PARTY_MEMBER_COMPONENT};
use obslink_core::ports::ui_tree::UiTree;

use crate::geometry::GeometryResolver;

pub const CHAT_LOG_ADDON: &str = "ChatLog";
pub const PARTY_LIST_ADDON: &str = "_PartyList";
pub const TARGET_INFO_ADDON: &str = "_TargetInfo";
pub const FOCUS_TARGET_ADDON: &str = "_FocusTargetInfo";
pub const NAME_PLATE_ADDON: &str = "NamePlate";

/// 파티 리스트 최대 인원
pub const MAX_PARTY_MEMBERS: usize = 8;

/// 계열이 읽는 애드온 이름
pub fn addon_name(family: RegionFamily) -> &'static str {
    match family {
        RegionFamily::ChatLog => CHAT_LOG_ADDON,
        RegionFamily::PartyList => PARTY_LIST_ADDON,
        RegionFamily::Target | RegionFamily::TargetTarget => TARGET_INFO_ADDON,
        RegionFamily::FocusTarget => FOCUS_TARGET_ADDON,
        RegionFamily::NamePlate => NAME_PLATE_ADDON,
    }
}

/// 계열 하나 수집. 실패는 해당 계열 이름의 `UiProbe` 에러로 감싼다.
pub fn collect(
    tree: &dyn UiTree,
    family: RegionFamily,
    overlay: &OverlayConfig,
) -> Result<Option<Vec<RegionDescriptor>>, CoreError> {
    let size = overlay.effective_blur_size();
    let result = match family {
        RegionFamily::ChatLog => chat_log(tree, size),
        RegionFamily::PartyList => party_list(tree, size),
        RegionFamily::Target => target_text(tree, family, 1, size),
        RegionFamily::TargetTarget => target_text(tree, family, 2, size),
        RegionFamily::FocusTarget => focus_target(tree, size),
        RegionFamily::NamePlate => name_plates(tree, size, overlay.effective_name_plate_count()),
    };
    result.map_err(|e| match e {
        CoreError::UiProbe { .. } => e,
        other => CoreError::UiProbe {
            region: family.key().to_string(),
            message: other.to_string(),
        },
    })
}

/// 노드 하나를 디스크립터로. 면적이 없으면 비활성.
fn describe(
    resolver: &GeometryResolver<'_>,
    node: NodeId,
    name: String,
    floating: bool,
    size: i32,
) -> Result<RegionDescriptor, CoreError> {
    let (bounds, visible) = resolver.resolve_bounds(Some(node), floating)?;
    let mut desc = RegionDescriptor::visible(name, bounds, size);
    desc.enabled = visible && bounds.has_area();
    Ok(desc)
}

/// 자신과 조상이 모두 보이는 특정 종류의 자식들
fn visible_children<'t>(
    tree: &'t dyn UiTree,
    resolver: &'t GeometryResolver<'t>,
    parent: NodeId,
    accept: impl Fn(NodeKind) -> bool + 't,
) -> impl Iterator<Item = NodeId> + 't {
    tree.children(parent).into_iter().filter(move |id| {
        tree.node(*id).is_some_and(|n| accept(n.kind)) && resolver.is_visible(Some(*id))
    })
}

fn chat_log(tree: &dyn UiTree, size: i32) -> Result<Option<Vec<RegionDescriptor>>, CoreError> {
    let Some(root) = tree.addon(CHAT_LOG_ADDON) else {
        return Ok(None);
    };
    let Some(first) = tree.children(root).into_iter().next() else {
        return Ok(None);
    };
    let resolver = GeometryResolver::new(tree);
    let desc = describe(&resolver, first, RegionFamily::ChatLog.key().to_string(), false, size)?;
    Ok(Some(vec![desc]))
}

fn party_list(tree: &dyn UiTree, size: i32) -> Result<Option<Vec<RegionDescriptor>>, CoreError> {
    let Some(root) = tree.addon(PARTY_LIST_ADDON) else {
        return Ok(None);
    };
    let resolver = GeometryResolver::new(tree);
    let mut regions = Vec::new();

    let members = visible_children(tree, &resolver, root, |kind| {
        kind == NodeKind::Component(PARTY_MEMBER_COMPONENT)
    });
    for member in members {
        if regions.len() >= MAX_PARTY_MEMBERS {
            break;
        }
        let name_text = visible_children(tree, &resolver, member, |kind| kind == NodeKind::Text).next();
        if let Some(text) = name_text {
            let name = RegionFamily::PartyList.slot_name(regions.len());
            regions.push(describe(&resolver, text, name, false, size)?);
        }
    }
    Ok(Some(regions))
}

/// `_TargetInfo`의 보이는 텍스트 중 `index`번째 (1: 대상, 2: 대상의 대상)
fn target_text(
    tree: &dyn UiTree,
    family: RegionFamily,
    index: usize,
    size: i32,
) -> Result<Option<Vec<RegionDescriptor>>, CoreError> {
    let Some(root) = tree.addon(TARGET_INFO_ADDON) else {
        return Ok(None);
    };
    let resolver = GeometryResolver::new(tree);
    let found = visible_children(tree, &resolver, root, |kind| kind == NodeKind::Text).nth(index);
    match found {
        Some(node) => Ok(Some(vec![describe(&resolver, node, family.key().to_string(), false, size)?])),
        None => Ok(Some(Vec::new())),
    }
}

fn focus_target(tree: &dyn UiTree, size: i32) -> Result<Option<Vec<RegionDescriptor>>, CoreError> {
    let Some(root) = tree.addon(FOCUS_TARGET_ADDON) else {
        return Ok(None);
    };
    let resolver = GeometryResolver::new(tree);
    let found = visible_children(tree, &resolver, root, |kind| kind == NodeKind::Text).next();
    match found {
        Some(node) => Ok(Some(vec![describe(
            &resolver,
            node,
            RegionFamily::FocusTarget.key().to_string(),
            false,
            size,
        )?])),
        None => Ok(Some(Vec::new())),
    }
}

/// 보이는 네임플레이트를 화면 중심에 가까운 순으로 `max`개.
///
/// 키는 충돌 노드 id에서 만든다. 프레임 슬롯 기반이라 빠른 장면 전환 시
/// 한 프레임 동안 다른 대상에 블러가 붙을 수 있다.
fn name_plates(
    tree: &dyn UiTree,
    size: i32,
    max: usize,
) -> Result<Option<Vec<RegionDescriptor>>, CoreError> {
    let Some(root) = tree.addon(NAME_PLATE_ADDON) else {
        return Ok(None);
    };
    let resolver = GeometryResolver::new(tree);
    let mut plates = Vec::new();

    let components = visible_children(tree, &resolver, root, |kind| {
        kind == NodeKind::Component(NAME_PLATE_COMPONENT)
    });
    for component in components {
        let Some(collision) = tree.children(component).into_iter().next() else {
            continue;
        };
        let is_collision = tree
            .node(collision)
            .is_some_and(|n| n.kind == NodeKind::Collision);
        if !is_collision || !resolver.is_visible(Some(collision)) {
            continue;
        }
        let name = RegionFamily::NamePlate.slot_name(format!("{:X}", collision));
        plates.push(describe(&resolver, collision, name, true, size)?);
    }

    plates.sort_by(|a, b| {
        a.bounds()
            .center_distance_sq()
            .total_cmp(&b.bounds().center_distance_sq())
    });
    plates.truncate(max);
    Ok(Some(plates))
}
