//! 세션 범위 공유 상태.
//!
//! 연결 플래그, 연결 시도 잠금, UI 에러 카운터, 원격 출력 상태를 한곳에 모은다.
//! 프로세스 전역 static 대신 이 컨텍스트를 `Arc`로 각 컴포넌트에 넘긴다.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::models::output::{OutputState, OutputStatus};

/// 세션 컨텍스트
#[derive(Debug, Default)]
pub struct SessionContext {
    connected: AtomicBool,
    connection_failed: AtomicBool,
    connect_in_flight: AtomicBool,
    ui_error_count: AtomicU32,
    status: RwLock<OutputStatus>,
}

/// 진행 중인 연결 시도. drop 시 잠금을 해제한다.
#[derive(Debug)]
pub struct ConnectAttempt<'a> {
    session: &'a SessionContext,
}

impl Drop for ConnectAttempt<'_> {
    fn drop(&mut self) {
        self.session.connect_in_flight.store(false, Ordering::Release);
    }
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 원격 연결 여부
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
        if !connected {
            let mut status = self.status.write();
            status.stream = OutputState::Stopped;
            status.record = OutputState::Stopped;
            status.replay_buffer = OutputState::Stopped;
        }
    }

    /// 인증 실패로 고정된 "연결 실패" 상태
    pub fn connection_failed(&self) -> bool {
        self.connection_failed.load(Ordering::Acquire)
    }

    pub fn set_connection_failed(&self, failed: bool) {
        self.connection_failed.store(failed, Ordering::Release);
    }

    /// 연결 시도 잠금 획득. 이미 다른 시도가 진행 중이면 None.
    pub fn begin_connect(&self) -> Option<ConnectAttempt<'_>> {
        self.connect_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ConnectAttempt { session: self })
    }

    /// 연결 시도 진행 중 여부
    pub fn connect_in_flight(&self) -> bool {
        self.connect_in_flight.load(Ordering::Acquire)
    }

    /// UI 에러 카운터 증가. 증가 후 값을 반환한다.
    pub fn record_ui_error(&self) -> u32 {
        self.ui_error_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn ui_error_count(&self) -> u32 {
        self.ui_error_count.load(Ordering::Acquire)
    }

    pub fn reset_ui_errors(&self) {
        self.ui_error_count.store(0, Ordering::Release);
    }

    /// 출력 상태 스냅샷
    pub fn status(&self) -> OutputStatus {
        self.status.read().clone()
    }

    /// 출력 상태 변경
    pub fn update_status(&self, f: impl FnOnce(&mut OutputStatus)) {
        f(&mut self.status.write());
    }

    /// 녹화 동작 여부
    pub fn is_recording(&self) -> bool {
        self.status.read().record.is_active()
    }
}
