//! 로그 기반 운영자 알림.

use obslink_core::ports::notifier::OperatorNotifier;
use tracing::{error, warn};

/// 운영자 알림을 `[obslink]` 접두사와 함께 로그로 남긴다
#[derive(Debug, Default)]
pub struct LogNotifier;

impl OperatorNotifier for LogNotifier {
    fn warn(&self, message: &str) {
        warn!("[obslink] {message}");
    }

    fn error(&self, message: &str) {
        error!("[obslink] {message}");
    }
}
