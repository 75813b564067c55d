//! 종료 신호 전파.
//!
//! 첫 종료 요청의 사유만 기록되고, 모든 구독자가 같은 사유를 본다.

use std::io;
use tokio::sync::watch;
use tracing::info;

/// 종료 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// OS 시그널 (이름)
    Signal(&'static str),
    /// 프로세스 내부 요청
    Requested,
}

/// 종료 신호 발신자
pub struct Lifecycle {
    tx: watch::Sender<Option<ShutdownReason>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }

    /// 종료 요청. 이미 요청되었으면 무시하고 false.
    pub fn request(&self, reason: ShutdownReason) -> bool {
        let accepted = self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
        if accepted {
            info!(?reason, "종료 요청");
        }
        accepted
    }

    /// 기록된 종료 사유
    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.tx.borrow()
    }

    /// OS 시그널을 기다렸다가 종료를 요청한다. 핸들러 등록 실패는 그대로 돌려준다.
    pub async fn watch_signals(&self) -> io::Result<()> {
        #[cfg(unix)]
        let name = {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigint = signal(SignalKind::interrupt())?;
            let mut sigterm = signal(SignalKind::terminate())?;
            tokio::select! {
                _ = sigint.recv() => "SIGINT",
                _ = sigterm.recv() => "SIGTERM",
            }
        };

        #[cfg(not(unix))]
        let name = {
            tokio::signal::ctrl_c().await?;
            "Ctrl+C"
        };

        self.request(ShutdownReason::Signal(name));
        Ok(())
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// 종료 신호 수신자
#[derive(Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<Option<ShutdownReason>>,
}

impl ShutdownListener {
    pub fn is_shutdown(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// 종료가 요청될 때까지 대기. 발신자가 사라져도 종료로 본다.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(Option::is_some).await;
    }
}
