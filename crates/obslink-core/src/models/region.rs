//! 블러 영역 디스크립터와 영역 계열.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::geometry::RegionBounds;
use crate::error::CoreError;

/// 원격 블러 영역의 직렬화 가능한 스냅샷.
///
/// `name`은 조회 키이고, 동등성 비교([`RegionDescriptor::same_state`])는
/// `enabled`, 네 경계, `size`만 본다. `last_edit`는 이름별로 단조 증가하는 논리 카운터.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionDescriptor {
    /// 영역 이름 (원격 필터 이름으로도 쓰인다)
    pub name: String,
    /// 활성화 여부
    pub enabled: bool,
    /// 위쪽 가장자리까지 거리 (%)
    pub top: f32,
    /// 아래쪽 가장자리까지 거리 (%)
    pub bottom: f32,
    /// 왼쪽 가장자리까지 거리 (%)
    pub left: f32,
    /// 오른쪽 가장자리까지 거리 (%)
    pub right: f32,
    /// 블러 강도
    pub size: i32,
    /// 마지막 변경 스탬프
    #[serde(default)]
    pub last_edit: u64,
}

impl RegionDescriptor {
    /// 보이는 영역 디스크립터 생성 (스탬프는 캐시가 찍는다)
    pub fn visible(name: impl Into<String>, bounds: RegionBounds, size: i32) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            top: bounds.top,
            bottom: bounds.bottom,
            left: bounds.left,
            right: bounds.right,
            size,
            last_edit: 0,
        }
    }

    /// 경계값
    pub fn bounds(&self) -> RegionBounds {
        RegionBounds {
            top: self.top,
            bottom: self.bottom,
            left: self.left,
            right: self.right,
        }
    }

    /// `last_edit`와 이름을 제외한 구조적 동등성
    pub fn same_state(&self, other: &RegionDescriptor) -> bool {
        self.enabled == other.enabled
            && self.top == other.top
            && self.bottom == other.bottom
            && self.left == other.left
            && self.right == other.right
            && self.size == other.size
    }
}

/// UI 영역 계열. 설정 토글과 에러 격리의 단위.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegionFamily {
    ChatLog,
    PartyList,
    Target,
    TargetTarget,
    FocusTarget,
    NamePlate,
}

impl RegionFamily {
    /// 모든 계열 (수집 순서)
    pub const ALL: [RegionFamily; 6] = [
        RegionFamily::ChatLog,
        RegionFamily::PartyList,
        RegionFamily::Target,
        RegionFamily::TargetTarget,
        RegionFamily::FocusTarget,
        RegionFamily::NamePlate,
    ];

    /// 계열 이름. 단일 영역 계열은 이 이름이 곧 영역 이름.
    pub fn key(&self) -> &'static str {
        match self {
            RegionFamily::ChatLog => "ChatLog",
            RegionFamily::PartyList => "PartyList",
            RegionFamily::Target => "Target",
            RegionFamily::TargetTarget => "TargetTarget",
            RegionFamily::FocusTarget => "FocusTarget",
            RegionFamily::NamePlate => "NamePlate",
        }
    }

    /// 여러 영역을 가지는 계열 여부 (`{key}_{slot}` 이름)
    pub fn is_multi(&self) -> bool {
        matches!(self, RegionFamily::PartyList | RegionFamily::NamePlate)
    }

    /// 계열 내 슬롯 영역 이름
    pub fn slot_name(&self, slot: impl fmt::Display) -> String {
        format!("{}_{}", self.key(), slot)
    }

    /// 영역 이름이 이 계열에 속하는지.
    ///
    /// 단일 계열은 정확히 일치해야 한다 (`Target`이 `TargetTarget`을 잡지 않도록).
    pub fn matches(&self, name: &str) -> bool {
        if self.is_multi() {
            name.strip_prefix(self.key())
                .is_some_and(|rest| rest.starts_with('_'))
        } else {
            name == self.key()
        }
    }

    /// 영역 이름으로 계열 찾기
    pub fn of(name: &str) -> Option<RegionFamily> {
        Self::ALL.into_iter().find(|family| family.matches(name))
    }
}

impl fmt::Display for RegionFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for RegionFamily {
    type Err = CoreError;

    /// 대소문자와 `_`/`-`를 무시하고 파싱 (`party_list`, `PartyList`, `partylist`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        Self::ALL
            .into_iter()
            .find(|family| family.key().to_lowercase() == normalized)
            .ok_or_else(|| CoreError::Validation {
                field: "region".to_string(),
                message: format!("알 수 없는 영역 계열: {}", s),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_state_ignores_last_edit_and_name() {
        let bounds = RegionBounds {
            top: 1.0,
            bottom: 2.0,
            left: 3.0,
            right: 4.0,
        };
        let a = RegionDescriptor {
            last_edit: 1,
            ..RegionDescriptor::visible("PartyList_0", bounds, 3)
        };
        let mut b = RegionDescriptor {
            name: "PartyList_1".to_string(),
            last_edit: 99,
            ..a.clone()
        };
        assert!(a.same_state(&b));

        b.size = 4;
        assert!(!a.same_state(&b));
    }

    #[test]
    fn singleton_family_matches_exactly() {
        assert!(RegionFamily::Target.matches("Target"));
        assert!(!RegionFamily::Target.matches("TargetTarget"));
        assert_eq!(RegionFamily::of("TargetTarget"), Some(RegionFamily::TargetTarget));
    }

    #[test]
    fn multi_family_matches_slot_names() {
        let name = RegionFamily::NamePlate.slot_name("1F2A");
        assert_eq!(name, "NamePlate_1F2A");
        assert!(RegionFamily::NamePlate.matches(&name));
        assert!(!RegionFamily::NamePlate.matches("NamePlates"));
        assert_eq!(RegionFamily::of("PartyList_7"), Some(RegionFamily::PartyList));
        assert_eq!(RegionFamily::of("Unknown"), None);
    }

    #[test]
    fn family_parses_loosely() {
        assert_eq!(
            "party_list".parse::<RegionFamily>().unwrap(),
            RegionFamily::PartyList
        );
        assert_eq!(
            "TargetTarget".parse::<RegionFamily>().unwrap(),
            RegionFamily::TargetTarget
        );
        assert!("minimap".parse::<RegionFamily>().is_err());
    }
}
