//! 활동 신호 모델.
//!
//! 외부 활동 신호 수집기가 폴링마다 갱신하는 전투/카운트다운/컷신 상태.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 폴링 한 번의 활동 신호 스냅샷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySignal {
    /// 전투 중 여부
    #[serde(default)]
    pub in_combat: bool,
    /// 마지막 전투 시작 시각
    #[serde(default)]
    pub combat_start: Option<DateTime<Utc>>,
    /// 마지막 전투 종료 시각
    #[serde(default)]
    pub combat_end: Option<DateTime<Utc>>,
    /// 카운트다운 진행 중 여부
    #[serde(default)]
    pub counting_down: bool,
    /// 카운트다운 남은 값 (초)
    #[serde(default)]
    pub count_down_value: f32,
    /// 컷신 시청 중 여부
    #[serde(default)]
    pub in_cutscene: bool,
    /// 캐릭터 로그인 여부
    #[serde(default = "default_logged_in")]
    pub logged_in: bool,
    /// 현재 지역 이름
    #[serde(default)]
    pub territory: Option<String>,
}

fn default_logged_in() -> bool {
    true
}

impl Default for ActivitySignal {
    fn default() -> Self {
        Self {
            in_combat: false,
            combat_start: None,
            combat_end: None,
            counting_down: false,
            count_down_value: 0.0,
            in_cutscene: false,
            logged_in: true,
            territory: None,
        }
    }
}

impl ActivitySignal {
    /// 전투 중 신호
    pub fn combat() -> Self {
        Self {
            in_combat: true,
            ..Self::default()
        }
    }
}
