//! 활동 신호 포트.
//!
//! 구현: `obslink-app::replay` (프레임 녹화 재생)

use crate::error::CoreError;
use crate::models::activity::ActivitySignal;

/// 활동 신호 수집기. 폴링마다 한 번 호출된다.
pub trait ActivitySource: Send + Sync {
    /// 현재 활동 신호 스냅샷
    fn poll(&self) -> Result<ActivitySignal, CoreError>;
}
