//! 협조적 취소 토큰.
//!
//! `tokio::sync::watch` 채널 위의 얇은 래퍼. 작업은 루프 반복마다
//! [`CancelToken::is_cancelled`]를 확인하거나 `select!`에서 [`CancelToken::cancelled`]를 기다린다.

use std::sync::Arc;
use tokio::sync::watch;

/// 복제 가능한 취소 토큰. 복제본은 같은 신호를 공유한다.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    /// 새 토큰 생성 (취소되지 않은 상태)
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// 취소 신호 전송. 여러 번 호출해도 안전하다.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// 취소 여부
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// 취소될 때까지 대기
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // 송신자를 self가 쥐고 있으므로 채널이 닫히지 않는다
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancel_wakes_waiter() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
            waiter.is_cancelled()
        });

        tokio::time::sleep(Duration::from_millis(5)).await;
        token.cancel();
        assert!(handle.await.unwrap());
    }

    #[tokio::test]
    async fn already_cancelled_returns_immediately() {
        let token = CancelToken::new();
        token.cancel();
        token.cancel();
        tokio::time::timeout(Duration::from_millis(50), token.cancelled())
            .await
            .unwrap();
    }

    #[test]
    fn fresh_tokens_are_independent() {
        let a = CancelToken::new();
        let b = CancelToken::new();
        a.cancel();
        assert!(!b.is_cancelled());
        assert!(a.clone().is_cancelled());
    }
}
