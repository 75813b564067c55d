//! 지연 작업.
//!
//! 전투 종료 후 녹화 정지와 리플레이 저장은 분리된 백그라운드 작업으로 돌아간다.
//! 두 작업 모두 틱마다 취소 토큰을 확인한다.

use obslink_core::cancel::CancelToken;
use obslink_core::models::automation::AutomationState;
use obslink_core::ports::remote::OutputControl;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// 지연 정지 작업 파라미터
#[derive(Debug, Clone)]
pub struct StopPlan {
    pub generation: u64,
    /// 남은 틱 수
    pub ticks: u64,
    pub tick: Duration,
    /// 컷신 중이면 정지를 미룬다
    pub dont_stop_in_cutscene: bool,
}

/// 지연 정지.
///
/// 최소 한 틱은 기다린 뒤, 남은 틱이 0이고 컷신 중이 아닐 때 녹화를 멈춘다.
/// 취소되었거나 더 새로운 세대가 상태를 가져갔으면 아무것도 하지 않는다.
pub async fn delayed_stop(
    outputs: Arc<dyn OutputControl>,
    state: Arc<Mutex<AutomationState>>,
    plan: StopPlan,
    token: CancelToken,
    cutscene: watch::Receiver<bool>,
) {
    let mut remaining = plan.ticks;
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!(generation = plan.generation, "지연 정지 취소");
                return;
            }
            _ = tokio::time::sleep(plan.tick) => {}
        }
        remaining = remaining.saturating_sub(1);
        let held_by_cutscene = plan.dont_stop_in_cutscene && *cutscene.borrow();
        if remaining == 0 && !held_by_cutscene {
            break;
        }
        if remaining == 0 {
            debug!("컷신 중, 정지 보류");
            if let AutomationState::StoppingPending {
                generation,
                deadline,
                ..
            } = &mut *state.lock()
            {
                if *generation == plan.generation {
                    *deadline = Instant::now() + plan.tick;
                }
            }
        }
    }

    {
        let mut current = state.lock();
        if token.is_cancelled() || !current.is_pending_generation(plan.generation) {
            debug!(generation = plan.generation, "지연 정지가 다른 상태로 대체됨");
            return;
        }
        *current = AutomationState::Idle;
    }

    info!("자동 녹화 정지");
    match outputs.stop_record().await {
        Ok(Some(path)) => info!("녹화 저장: {path}"),
        Ok(None) => {}
        Err(e) => warn!("녹화 정지 실패: {e}"),
    }
}

/// 지연 리플레이 버퍼 저장
pub async fn delayed_replay_save(outputs: Arc<dyn OutputControl>, delay: Duration, token: CancelToken) {
    tokio::select! {
        _ = token.cancelled() => return,
        _ = tokio::time::sleep(delay) => {}
    }
    match outputs.save_replay_buffer().await {
        Ok(()) => info!("리플레이 버퍼 저장"),
        Err(e) => warn!("리플레이 버퍼 저장 실패: {e}"),
    }
}
