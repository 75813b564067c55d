//! 프레임 단위 오버레이 동기화.
//!
//! 폴링 태스크가 매 프레임 [`OverlaySynchronizer::on_frame`]을 호출한다.
//! 설정 변경(계열 토글, 블러 강도)을 반영하고, 켜진 계열마다 UI를 수집해
//! 변경분은 upsert로, 사라진 영역은 삭제로 내보낸다.
//!
//! 계열 하나의 실패는 그 계열만 끄고 에러 카운터를 올린다.
//! 카운터가 임계값을 넘으면 UI 감지 전체를 끈다.

use obslink_core::config::{AppConfig, OverlayConfig};
use obslink_core::config_manager::ConfigManager;
use obslink_core::error::CoreError;
use obslink_core::models::activity::ActivitySignal;
use obslink_core::models::region::{RegionDescriptor, RegionFamily};
use obslink_core::ports::notifier::OperatorNotifier;
use obslink_core::ports::remote::FilterControl;
use obslink_core::ports::ui_tree::UiTree;
use obslink_core::session::SessionContext;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::applier::RegionApplier;
use crate::cache::RegionCache;
use crate::collectors;
use crate::pipeline::{PipelineCounters, SyncPipeline};

/// 직전 프레임에 본 오버레이 설정
#[derive(Debug, Clone, PartialEq)]
struct OverlayFlags {
    families: [bool; RegionFamily::ALL.len()],
    blur_size: i32,
    ui_detection: bool,
}

impl OverlayFlags {
    fn from_config(overlay: &OverlayConfig) -> Self {
        Self {
            families: RegionFamily::ALL.map(|f| overlay.family_enabled(f)),
            blur_size: overlay.effective_blur_size(),
            ui_detection: overlay.ui_detection,
        }
    }
}

/// 오버레이 동기화기
pub struct OverlaySynchronizer {
    config: ConfigManager,
    session: Arc<SessionContext>,
    notifier: Arc<dyn OperatorNotifier>,
    cache: Arc<RegionCache>,
    applier: Arc<RegionApplier>,
    pipeline: SyncPipeline,
    last_flags: Option<OverlayFlags>,
    was_connected: bool,
}

impl OverlaySynchronizer {
    /// 동기화기 생성. 파이프라인 소비 태스크를 띄우므로 tokio 런타임 안에서 호출한다.
    pub fn new(
        config: ConfigManager,
        session: Arc<SessionContext>,
        filters: Arc<dyn FilterControl>,
        notifier: Arc<dyn OperatorNotifier>,
    ) -> Self {
        let capacity = config.get().overlay.queue_capacity;
        let cache = Arc::new(RegionCache::new());
        let applier = Arc::new(RegionApplier::new(filters, config.clone(), notifier.clone()));
        let pipeline = SyncPipeline::start(cache.clone(), applier.clone(), capacity);

        Self {
            config,
            session,
            notifier,
            cache,
            applier,
            pipeline,
            last_flags: None,
            was_connected: false,
        }
    }

    /// 프레임 하나 처리
    pub async fn on_frame(&mut self, tree: &dyn UiTree, activity: &ActivitySignal) {
        let config = self.config.get();
        self.reconcile(&config).await;

        if config.overlay.ui_detection {
            self.sync_if_ready(tree, activity, &config).await;
        }
    }

    /// 수동 동기화 한 번 (UI 감지가 꺼져 있어도 수행)
    pub async fn sync_now(&mut self, tree: &dyn UiTree, activity: &ActivitySignal) {
        let config = self.config.get();
        self.reconcile(&config).await;
        self.sync_if_ready(tree, activity, &config).await;
    }

    async fn sync_if_ready(&mut self, tree: &dyn UiTree, activity: &ActivitySignal, config: &AppConfig) {
        if !config.overlay.enabled || !self.session.is_connected() || !activity.logged_in {
            return;
        }
        self.sync(tree, config).await;
    }

    /// 설정 변경 반영: 꺼진 계열 비활성화, 블러 강도 재적용, 재연결 후 재동기화
    async fn reconcile(&mut self, config: &AppConfig) {
        let connected = self.session.is_connected();
        if connected && !self.was_connected && !self.cache.is_empty() {
            debug!("재연결 감지, 캐시된 영역 재동기화 예약");
            self.cache.invalidate_all();
        }
        self.was_connected = connected;

        let flags = OverlayFlags::from_config(&config.overlay);
        let Some(previous) = self.last_flags.replace(flags.clone()) else {
            return;
        };
        if previous == flags {
            return;
        }

        for (i, family) in RegionFamily::ALL.into_iter().enumerate() {
            if previous.families[i] && !flags.families[i] {
                let disabled = self.cache.disable_family(family);
                info!("{} 블러 끔 ({}개 영역)", family, disabled.len());
                for desc in disabled {
                    self.dispatch_upsert(desc, config).await;
                }
            }
        }

        if previous.blur_size != flags.blur_size {
            let resized = self.cache.resize_all(flags.blur_size);
            info!("블러 강도 변경 {} → {} ({}개 영역)", previous.blur_size, flags.blur_size, resized.len());
            for desc in resized {
                self.dispatch_upsert(desc, config).await;
            }
        }

        if !previous.ui_detection && flags.ui_detection {
            self.session.reset_ui_errors();
            debug!("UI 감지 재활성화, 에러 카운터 초기화");
        }
    }

    async fn sync(&mut self, tree: &dyn UiTree, config: &AppConfig) {
        let mut failed_addons = HashSet::new();
        for family in RegionFamily::ALL {
            // 같은 프레임의 에러 처리로 꺼진 계열은 건너뛴다
            if !self.config.get().overlay.family_enabled(family) {
                continue;
            }
            let addon = collectors::addon_name(family);
            if failed_addons.contains(addon) {
                continue;
            }
            match collectors::collect(tree, family, &config.overlay) {
                Ok(None) => {}
                Ok(Some(regions)) => self.publish(family, regions, config).await,
                Err(e) => {
                    failed_addons.insert(addon);
                    self.on_probe_error(family, e, config);
                }
            }
        }
    }

    async fn publish(&mut self, family: RegionFamily, regions: Vec<RegionDescriptor>, config: &AppConfig) {
        let present: HashSet<String> = regions.iter().map(|r| r.name.clone()).collect();
        for desc in regions {
            if let Some(changed) = self.cache.observe(desc) {
                self.dispatch_upsert(changed, config).await;
            }
        }
        for removal in self.cache.sweep(family, &present) {
            debug!(name = %removal.name, "영역 사라짐, 삭제 예약");
            self.dispatch_removal(removal, config).await;
        }
    }

    async fn dispatch_upsert(&self, desc: RegionDescriptor, config: &AppConfig) {
        if config.overlay.blur_async {
            self.pipeline.enqueue_upsert(desc);
        } else if self.applier.apply(&desc).await.is_err() {
            self.cache.mark_unsynced(&desc.name, desc.last_edit);
        }
    }

    async fn dispatch_removal(&self, desc: RegionDescriptor, config: &AppConfig) {
        if config.overlay.blur_async {
            self.pipeline.enqueue_removal(desc);
        } else if self.applier.remove(&desc).await.is_ok() {
            self.cache.confirm_removal(&desc.name, desc.last_edit);
        } else {
            self.cache.mark_removal_failed(&desc.name, desc.last_edit);
        }
    }

    fn on_probe_error(&self, family: RegionFamily, err: CoreError, config: &AppConfig) {
        error!("{} UI 갱신 실패: {}", family, err);

        let update = self.config.update_with(|c| match family {
            RegionFamily::Target | RegionFamily::TargetTarget => {
                c.overlay.target = false;
                c.overlay.target_target = false;
            }
            other => c.overlay.set_family_enabled(other, false),
        });
        if let Err(e) = update {
            warn!("설정 저장 실패: {e}");
        }

        let count = self.session.record_ui_error();
        let threshold = config.overlay.ui_error_threshold;
        if count > threshold && self.config.get().overlay.ui_detection {
            if let Err(e) = self.config.update_with(|c| c.overlay.ui_detection = false) {
                warn!("설정 저장 실패: {e}");
            }
            self.notifier.error(&format!(
                "UI 에러가 {threshold}회를 넘어 UI 감지를 끕니다. 로그를 확인해 주세요."
            ));
        }
    }

    /// 영역 캐시
    pub fn cache(&self) -> &Arc<RegionCache> {
        &self.cache
    }

    /// 파이프라인 카운터
    pub fn counters(&self) -> PipelineCounters {
        self.pipeline.counters()
    }

    /// 큐가 빌 때까지 대기
    pub async fn wait_idle(&self) {
        self.pipeline.wait_idle().await;
    }

    /// 파이프라인 종료
    pub async fn shutdown(&self, drain_timeout: Duration) {
        self.pipeline.shutdown(drain_timeout).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::{CHAT_LOG_ADDON, PARTY_LIST_ADDON, TARGET_INFO_ADDON};
    use crate::snapshot::UiSnapshot;
    use crate::testing::{temp_config, MockFilters, RecordingNotifier};
    use obslink_core::models::geometry::Viewport;
    use obslink_core::models::ui::{NodeKind, UiNode, PARTY_MEMBER_COMPONENT};
    use tempfile::TempDir;

    struct Harness {
        sync: OverlaySynchronizer,
        filters: Arc<MockFilters>,
        notifier: Arc<RecordingNotifier>,
        session: Arc<SessionContext>,
        config: ConfigManager,
        _dir: TempDir,
    }

    fn harness(blur_async: bool) -> Harness {
        let (config, dir) = temp_config();
        config
            .update_with(|c| {
                c.overlay.blur_async = blur_async;
                c.overlay.target = true;
            })
            .unwrap();
        let filters = MockFilters::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let session = Arc::new(SessionContext::new());
        session.set_connected(true);
        let sync = OverlaySynchronizer::new(config.clone(), session.clone(), filters.clone(), notifier.clone());
        Harness {
            sync,
            filters,
            notifier,
            session,
            config,
            _dir: dir,
        }
    }

    fn frame(party_members: usize) -> UiSnapshot {
        let mut tree = UiSnapshot::new(Viewport::new(1920.0, 1080.0))
            .with_addon(CHAT_LOG_ADDON, 1)
            .with_node(UiNode::new(1, NodeKind::Res, 0.0, 0.0, 1920.0, 1080.0))
            .with_node(UiNode::new(2, NodeKind::Res, 20.0, 700.0, 600.0, 300.0).with_parent(1))
            .with_addon(PARTY_LIST_ADDON, 10)
            .with_node(UiNode::new(10, NodeKind::Res, 40.0, 200.0, 300.0, 400.0))
            .with_addon(TARGET_INFO_ADDON, 30)
            .with_node(UiNode::new(30, NodeKind::Res, 0.0, 0.0, 1920.0, 100.0))
            .with_node(UiNode::new(31, NodeKind::Text, 0.0, 0.0, 10.0, 10.0).with_parent(30))
            .with_node(UiNode::new(32, NodeKind::Text, 100.0, 100.0, 200.0, 50.0).with_parent(30));
        for i in 0..party_members as u64 {
            tree.insert(
                UiNode::new(100 + i, NodeKind::Component(PARTY_MEMBER_COMPONENT), 0.0, i as f32 * 40.0, 300.0, 40.0)
                    .with_parent(10),
            );
            tree.insert(UiNode::new(200 + i, NodeKind::Text, 30.0, 5.0, 150.0, 20.0).with_parent(100 + i));
        }
        tree
    }

    #[tokio::test]
    async fn first_frame_creates_every_visible_region() {
        let mut h = harness(true);
        h.sync.on_frame(&frame(2), &ActivitySignal::default()).await;
        h.sync.wait_idle().await;

        let mut created = h.filters.created();
        created.sort();
        assert_eq!(created, vec!["ChatLog", "PartyList_0", "PartyList_1", "Target"]);

        // 같은 프레임을 다시 보내면 원격 호출이 없다
        let calls = h.filters.calls();
        h.sync.on_frame(&frame(2), &ActivitySignal::default()).await;
        h.sync.wait_idle().await;
        assert_eq!(h.filters.calls(), calls);
    }

    #[tokio::test]
    async fn party_member_leaving_removes_its_slot() {
        let mut h = harness(true);
        h.sync.on_frame(&frame(3), &ActivitySignal::default()).await;
        h.sync.wait_idle().await;

        h.sync.on_frame(&frame(2), &ActivitySignal::default()).await;
        h.sync.on_frame(&frame(2), &ActivitySignal::default()).await;
        h.sync.wait_idle().await;

        assert_eq!(h.filters.removed(), vec!["PartyList_2"]);
        assert!(h.sync.cache().get("PartyList_2").is_none());
    }

    #[tokio::test]
    async fn nothing_happens_when_disconnected_or_logged_out() {
        let mut h = harness(true);
        h.session.set_connected(false);
        h.sync.on_frame(&frame(1), &ActivitySignal::default()).await;

        h.session.set_connected(true);
        let logged_out = ActivitySignal {
            logged_in: false,
            ..ActivitySignal::default()
        };
        h.sync.on_frame(&frame(1), &logged_out).await;
        h.sync.wait_idle().await;
        assert_eq!(h.filters.calls(), 0);
    }

    #[tokio::test]
    async fn manual_sync_ignores_ui_detection_flag() {
        let mut h = harness(false);
        h.config.update_with(|c| c.overlay.ui_detection = false).unwrap();

        h.sync.on_frame(&frame(0), &ActivitySignal::default()).await;
        assert_eq!(h.filters.calls(), 0);

        h.sync.sync_now(&frame(0), &ActivitySignal::default()).await;
        assert!(h.filters.filter("ChatLog").is_some());
    }

    #[tokio::test]
    async fn toggling_family_off_disables_its_filters() {
        let mut h = harness(false);
        h.sync.on_frame(&frame(2), &ActivitySignal::default()).await;
        assert!(h.filters.filter("PartyList_0").unwrap().enabled);

        h.config.update_with(|c| c.overlay.party_list = false).unwrap();
        h.sync.on_frame(&frame(2), &ActivitySignal::default()).await;

        assert!(!h.filters.filter("PartyList_0").unwrap().enabled);
        assert!(!h.filters.filter("PartyList_1").unwrap().enabled);
        assert!(h.filters.filter("ChatLog").unwrap().enabled);
    }

    #[tokio::test]
    async fn blur_size_change_reapplies_all() {
        let mut h = harness(false);
        h.sync.on_frame(&frame(1), &ActivitySignal::default()).await;

        h.config.update_with(|c| c.overlay.blur_size = 9).unwrap();
        h.sync.on_frame(&frame(1), &ActivitySignal::default()).await;

        for name in ["ChatLog", "PartyList_0", "Target"] {
            assert_eq!(h.filters.filter(name).unwrap().settings["Filter.Blur.Size"], 9);
        }
    }

    #[tokio::test]
    async fn probe_error_disables_only_that_family() {
        let mut h = harness(false);
        let mut tree = frame(1);
        tree.insert(UiNode::new(32, NodeKind::Text, f32::NAN, 0.0, 200.0, 50.0).with_parent(30));

        h.sync.on_frame(&tree, &ActivitySignal::default()).await;

        let overlay = h.config.get().overlay;
        assert!(!overlay.target);
        assert!(!overlay.target_target);
        assert!(overlay.party_list);
        assert!(overlay.ui_detection);
        assert_eq!(h.session.ui_error_count(), 1);
        assert!(h.filters.filter("ChatLog").is_some());
        assert!(h.filters.filter("PartyList_0").is_some());
    }

    #[tokio::test]
    async fn error_threshold_turns_off_ui_detection() {
        let mut h = harness(false);
        h.config.update_with(|c| c.overlay.ui_error_threshold = 2).unwrap();
        let mut tree = frame(1);
        tree.insert(UiNode::new(32, NodeKind::Text, f32::NAN, 0.0, 200.0, 50.0).with_parent(30));

        for _ in 0..3 {
            h.config.update_with(|c| c.overlay.target = true).unwrap();
            h.sync.on_frame(&tree, &ActivitySignal::default()).await;
        }

        assert!(!h.config.get().overlay.ui_detection);
        assert_eq!(h.notifier.messages.lock().len(), 1);

        // 꺼진 동안 프레임이 지나간 뒤 다시 켜면 카운터가 초기화된다
        h.sync.on_frame(&frame(1), &ActivitySignal::default()).await;
        h.config.update_with(|c| c.overlay.ui_detection = true).unwrap();
        h.sync.on_frame(&frame(1), &ActivitySignal::default()).await;
        assert_eq!(h.session.ui_error_count(), 0);
    }

    #[tokio::test]
    async fn missing_source_turns_off_ui_detection() {
        let mut h = harness(false);
        h.filters.set_missing_source(true);
        h.sync.on_frame(&frame(0), &ActivitySignal::default()).await;

        assert!(!h.config.get().overlay.ui_detection);
        assert_eq!(h.notifier.messages.lock().len(), 1);
    }

    #[tokio::test]
    async fn broken_target_addon_counts_one_error() {
        let mut h = harness(false);
        let mut tree = frame(1);
        tree.insert(UiNode::new(32, NodeKind::Text, f32::NAN, 0.0, 200.0, 50.0).with_parent(30));
        tree.insert(UiNode::new(33, NodeKind::Text, f32::NAN, 0.0, 200.0, 50.0).with_parent(30));

        h.sync.on_frame(&tree, &ActivitySignal::default()).await;

        assert_eq!(h.session.ui_error_count(), 1);
        assert!(h.filters.filter("Target").is_none());
        assert!(h.filters.filter("TargetTarget").is_none());
        assert!(h.filters.filter("PartyList_0").is_some());
    }

    #[tokio::test]
    async fn failed_sync_removal_is_retried_next_frame() {
        let mut h = harness(false);
        h.sync.on_frame(&frame(3), &ActivitySignal::default()).await;

        h.filters.fail_next(1);
        h.sync.on_frame(&frame(2), &ActivitySignal::default()).await;
        assert!(h.filters.filter("PartyList_2").is_some());

        h.sync.on_frame(&frame(2), &ActivitySignal::default()).await;
        h.sync.on_frame(&frame(2), &ActivitySignal::default()).await;
        assert_eq!(h.filters.removed(), vec!["PartyList_2"]);
        assert_eq!(h.sync.cache().pending_removals(), 0);
    }
}
