//! 운영자 알림 포트.
//!
//! 구현: `obslink-app::notifier` (tracing 로그)

/// 운영자에게 보이는 경고/에러 알림.
/// 소스 누락, UI 감지 비활성화, 인증 실패, 버전 불일치 등에 쓰인다.
pub trait OperatorNotifier: Send + Sync {
    /// 경고 표시
    fn warn(&self, message: &str);

    /// 에러 표시
    fn error(&self, message: &str);
}
