//! 비동기 동기화 파이프라인.
//!
//! upsert 큐와 remove 큐를 각각 전용 소비 태스크 하나가 순서대로 비운다.
//! 같은 이름의 필터에 대한 원격 변경이 동시에 일어나지 않고 FIFO 순서가 유지된다.
//!
//! 소비자는 적용 직전에 캐시 스탬프와 비교해 이미 더 새로운 변경으로 대체된 항목을 버린다.
//! 버스트 입력에서도 항목별 취소 없이 최신 상태로 수렴한다.

use obslink_core::cancel::CancelToken;
use obslink_core::models::region::RegionDescriptor;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::applier::RegionApplier;
use crate::cache::RegionCache;

/// 파이프라인 카운터
#[derive(Debug, Default)]
pub struct PipelineStats {
    pending: AtomicUsize,
    idle: Notify,
    applied: AtomicU64,
    discarded: AtomicU64,
    failed: AtomicU64,
    removed: AtomicU64,
    dropped: AtomicU64,
}

/// 카운터 스냅샷
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineCounters {
    pub pending: usize,
    pub applied: u64,
    pub discarded: u64,
    pub failed: u64,
    pub removed: u64,
    pub dropped: u64,
}

impl PipelineStats {
    fn enqueued(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    fn finished(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }

    fn snapshot(&self) -> PipelineCounters {
        PipelineCounters {
            pending: self.pending.load(Ordering::Acquire),
            applied: self.applied.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// upsert/remove 큐와 소비 태스크
pub struct SyncPipeline {
    upsert_tx: mpsc::Sender<RegionDescriptor>,
    removal_tx: mpsc::Sender<RegionDescriptor>,
    cache: Arc<RegionCache>,
    stats: Arc<PipelineStats>,
    shutdown: CancelToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncPipeline {
    /// 소비 태스크 두 개를 띄우고 파이프라인 생성. tokio 런타임 안에서 호출해야 한다.
    pub fn start(cache: Arc<RegionCache>, applier: Arc<RegionApplier>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (upsert_tx, upsert_rx) = mpsc::channel(capacity);
        let (removal_tx, removal_rx) = mpsc::channel(capacity);
        let stats = Arc::new(PipelineStats::default());
        let shutdown = CancelToken::new();

        let upsert_task = tokio::spawn(upsert_loop(
            upsert_rx,
            removal_tx.clone(),
            cache.clone(),
            applier.clone(),
            stats.clone(),
            shutdown.clone(),
        ));
        let removal_task = tokio::spawn(removal_loop(
            removal_rx,
            cache.clone(),
            applier,
            stats.clone(),
            shutdown.clone(),
        ));
        info!("동기화 파이프라인 시작 (큐 용량 {})", capacity);

        Self {
            upsert_tx,
            removal_tx,
            cache,
            stats,
            shutdown,
            handles: Mutex::new(vec![upsert_task, removal_task]),
        }
    }

    /// upsert 큐에 넣기 (논블로킹).
    /// 큐가 가득 차면 캐시 항목을 미동기화로 표시해 다음 관측에서 다시 나오게 한다.
    pub fn enqueue_upsert(&self, desc: RegionDescriptor) -> bool {
        let (name, last_edit) = (desc.name.clone(), desc.last_edit);
        self.stats.enqueued();
        match self.upsert_tx.try_send(desc) {
            Ok(()) => true,
            Err(e) => {
                self.stats.finished();
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                self.cache.mark_unsynced(&name, last_edit);
                match e {
                    TrySendError::Full(_) => warn!(name = %name, "upsert 큐 가득 참, 다음 프레임에 재시도"),
                    TrySendError::Closed(_) => debug!(name = %name, "파이프라인 종료됨, upsert 무시"),
                }
                false
            }
        }
    }

    /// remove 큐에 넣기 (논블로킹).
    /// 큐가 가득 차면 묘비를 재시도 대기로 돌려 다음 스윕에서 다시 나오게 한다.
    pub fn enqueue_removal(&self, desc: RegionDescriptor) -> bool {
        enqueue_removal(&self.removal_tx, &self.cache, &self.stats, desc)
    }

    /// 카운터 스냅샷
    pub fn counters(&self) -> PipelineCounters {
        self.stats.snapshot()
    }

    /// 큐에 남은 항목이 모두 처리될 때까지 대기
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.stats.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.stats.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// 제한 시간 안에 큐를 비우고 소비 태스크 종료. 남은 항목은 버린다.
    pub async fn shutdown(&self, drain_timeout: Duration) {
        if tokio::time::timeout(drain_timeout, self.wait_idle())
            .await
            .is_err()
        {
            warn!(
                "파이프라인 드레인 시간 초과, 남은 항목 {}개 폐기",
                self.stats.pending.load(Ordering::Acquire)
            );
        }
        self.shutdown.cancel();
        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
        info!("동기화 파이프라인 종료");
    }

    /// 종료 여부
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl Drop for SyncPipeline {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn enqueue_removal(
    tx: &mpsc::Sender<RegionDescriptor>,
    cache: &RegionCache,
    stats: &PipelineStats,
    desc: RegionDescriptor,
) -> bool {
    let (name, last_edit) = (desc.name.clone(), desc.last_edit);
    stats.enqueued();
    match tx.try_send(desc) {
        Ok(()) => true,
        Err(e) => {
            stats.finished();
            stats.dropped.fetch_add(1, Ordering::Relaxed);
            cache.mark_removal_failed(&name, last_edit);
            match e {
                TrySendError::Full(_) => warn!(name = %name, "remove 큐 가득 참, 다음 스윕에 재시도"),
                TrySendError::Closed(_) => debug!(name = %name, "파이프라인 종료됨, 삭제 무시"),
            }
            false
        }
    }
}

async fn upsert_loop(
    mut rx: mpsc::Receiver<RegionDescriptor>,
    removal_tx: mpsc::Sender<RegionDescriptor>,
    cache: Arc<RegionCache>,
    applier: Arc<RegionApplier>,
    stats: Arc<PipelineStats>,
    shutdown: CancelToken,
) {
    loop {
        let desc = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            item = rx.recv() => match item {
                Some(desc) => desc,
                None => break,
            },
        };

        if !cache.is_current(&desc.name, desc.last_edit) {
            trace!(name = %desc.name, last_edit = desc.last_edit, "오래된 upsert 폐기");
            stats.discarded.fetch_add(1, Ordering::Relaxed);
            stats.finished();
            continue;
        }

        match applier.apply(&desc).await {
            Ok(()) => {
                stats.applied.fetch_add(1, Ordering::Relaxed);
                // 적용 중에 스윕되었다면 삭제가 먼저 끝났을 수 있다
                if let Some(removal) = cache.reinstate_removal(desc) {
                    enqueue_removal(&removal_tx, &cache, &stats, removal);
                }
            }
            Err(_) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                cache.mark_unsynced(&desc.name, desc.last_edit);
            }
        }
        stats.finished();
    }
    debug!("upsert 소비 루프 종료");
}

async fn removal_loop(
    mut rx: mpsc::Receiver<RegionDescriptor>,
    cache: Arc<RegionCache>,
    applier: Arc<RegionApplier>,
    stats: Arc<PipelineStats>,
    shutdown: CancelToken,
) {
    loop {
        let desc = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            item = rx.recv() => match item {
                Some(desc) => desc,
                None => break,
            },
        };

        if cache.is_superseded(&desc.name, desc.last_edit) {
            trace!(name = %desc.name, "재등장한 영역, 삭제 생략");
            stats.discarded.fetch_add(1, Ordering::Relaxed);
            stats.finished();
            continue;
        }

        if applier.remove(&desc).await.is_ok() {
            stats.removed.fetch_add(1, Ordering::Relaxed);
            cache.confirm_removal(&desc.name, desc.last_edit);
        } else {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            cache.mark_removal_failed(&desc.name, desc.last_edit);
        }
        // 삭제 중에 재등장했다면 원격 상태를 알 수 없으므로 다시 동기화한다
        if cache.is_superseded(&desc.name, desc.last_edit) {
            cache.mark_unsynced_any(&desc.name);
        }
        stats.finished();
    }
    debug!("remove 소비 루프 종료");
}
