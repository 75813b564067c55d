//! 단위 테스트용 목 어댑터.

use async_trait::async_trait;
use obslink_core::config_manager::ConfigManager;
use obslink_core::error::CoreError;
use obslink_core::models::geometry::RegionBounds;
use obslink_core::models::output::FilterInfo;
use obslink_core::models::region::RegionDescriptor;
use obslink_core::ports::notifier::OperatorNotifier;
use obslink_core::ports::remote::FilterControl;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::watch;

use crate::applier::RegionApplier;

pub fn desc(name: &str, top: f32) -> RegionDescriptor {
    RegionDescriptor::visible(
        name,
        RegionBounds {
            top,
            bottom: 10.0,
            left: 10.0,
            right: 10.0,
        },
        3,
    )
}

pub fn temp_config() -> (ConfigManager, TempDir) {
    let dir = TempDir::new().unwrap();
    let config = ConfigManager::with_path(dir.path().join("config.json")).unwrap();
    (config, dir)
}

pub fn applier_with(filters: Arc<MockFilters>) -> (Arc<RegionApplier>, TempDir) {
    let (config, dir) = temp_config();
    let applier = RegionApplier::new(filters, config, Arc::new(RecordingNotifier::default()));
    (Arc::new(applier), dir)
}

/// 메모리 필터 저장소
pub struct MockFilters {
    filters: Mutex<HashMap<String, FilterInfo>>,
    created: Mutex<Vec<String>>,
    removed: Mutex<Vec<String>>,
    calls: AtomicUsize,
    fail_next: AtomicUsize,
    missing_source: AtomicBool,
    gate: watch::Sender<bool>,
}

impl MockFilters {
    pub fn new() -> Arc<Self> {
        let (gate, _) = watch::channel(true);
        Arc::new(Self {
            filters: Mutex::new(HashMap::new()),
            created: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            fail_next: AtomicUsize::new(0),
            missing_source: AtomicBool::new(false),
            gate,
        })
    }

    pub fn pause(&self) {
        self.gate.send_replace(false);
    }

    pub fn resume(&self) {
        self.gate.send_replace(true);
    }

    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn set_missing_source(&self, missing: bool) {
        self.missing_source.store(missing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> Vec<String> {
        self.created.lock().clone()
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().clone()
    }

    pub fn filter(&self, name: &str) -> Option<FilterInfo> {
        self.filters.lock().get(name).cloned()
    }

    async fn enter(&self, source: &str) -> Result<(), CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut rx = self.gate.subscribe();
        let _ = rx.wait_for(|open| *open).await;

        if self.missing_source.load(Ordering::SeqCst) {
            return Err(CoreError::NotFound {
                resource_type: "Source".to_string(),
                id: source.to_string(),
            });
        }
        let remaining = self.fail_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next.store(remaining - 1, Ordering::SeqCst);
            return Err(CoreError::Remote {
                request: "Mock".to_string(),
                code: 500,
                comment: "injected".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl FilterControl for MockFilters {
    async fn get_filter(&self, source: &str, name: &str) -> Result<Option<FilterInfo>, CoreError> {
        self.enter(source).await?;
        Ok(self.filter(name))
    }

    async fn create_filter(
        &self,
        source: &str,
        name: &str,
        kind: &str,
        settings: serde_json::Value,
    ) -> Result<(), CoreError> {
        self.enter(source).await?;
        self.filters.lock().insert(
            name.to_string(),
            FilterInfo {
                name: name.to_string(),
                kind: kind.to_string(),
                enabled: true,
                settings,
            },
        );
        self.created.lock().push(name.to_string());
        Ok(())
    }

    async fn set_filter_settings(
        &self,
        source: &str,
        name: &str,
        settings: serde_json::Value,
    ) -> Result<(), CoreError> {
        self.enter(source).await?;
        match self.filters.lock().get_mut(name) {
            Some(info) => {
                info.settings = settings;
                Ok(())
            }
            None => Err(CoreError::NotFound {
                resource_type: "Filter".to_string(),
                id: name.to_string(),
            }),
        }
    }

    async fn set_filter_enabled(&self, source: &str, name: &str, enabled: bool) -> Result<(), CoreError> {
        self.enter(source).await?;
        if let Some(info) = self.filters.lock().get_mut(name) {
            info.enabled = enabled;
        }
        Ok(())
    }

    async fn remove_filter(&self, source: &str, name: &str) -> Result<bool, CoreError> {
        self.enter(source).await?;
        let removed = self.filters.lock().remove(name).is_some();
        if removed {
            self.removed.lock().push(name.to_string());
        }
        Ok(removed)
    }
}

/// 알림 기록기
#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<String>>,
}

impl OperatorNotifier for RecordingNotifier {
    fn warn(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}
