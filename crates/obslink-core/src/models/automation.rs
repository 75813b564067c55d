//! 녹화 자동화 상태.

use tokio::time::Instant;

use crate::cancel::CancelToken;

/// 전투 기반 녹화 자동화 상태.
///
/// `Idle → Recording → StoppingPending → Idle` 순서로 진행하며,
/// 지연 정지 대기 중 전투가 재개되면 `StoppingPending → Recording`으로 돌아간다.
#[derive(Debug, Clone, Default)]
pub enum AutomationState {
    #[default]
    Idle,
    Recording,
    /// 지연 정지 대기
    StoppingPending {
        /// 대기 작업 취소 토큰
        token: CancelToken,
        /// 대기 작업 세대. 오래된 작업이 새 상태를 건드리지 않도록 비교한다.
        generation: u64,
        /// 예정 정지 시각 (컷신 가드로 늦춰질 수 있음)
        deadline: Instant,
    },
}

impl AutomationState {
    /// 로그용 이름
    pub fn name(&self) -> &'static str {
        match self {
            AutomationState::Idle => "idle",
            AutomationState::Recording => "recording",
            AutomationState::StoppingPending { .. } => "stopping_pending",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, AutomationState::StoppingPending { .. })
    }

    /// 주어진 세대의 지연 정지가 아직 유효한지
    pub fn is_pending_generation(&self, expected: u64) -> bool {
        matches!(self, AutomationState::StoppingPending { generation, .. } if *generation == expected)
    }
}
