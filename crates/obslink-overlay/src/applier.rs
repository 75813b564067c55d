//! 원격 블러 필터 적용.
//!
//! 디스크립터 하나를 원격 마스크 필터 생성/갱신/활성화 또는 삭제로 바꾼다.
//! 비동기 파이프라인 소비자와 동기 폴백 경로가 같은 로직을 공유한다.

use obslink_core::config_manager::ConfigManager;
use obslink_core::error::CoreError;
use obslink_core::models::region::RegionDescriptor;
use obslink_core::ports::notifier::OperatorNotifier;
use obslink_core::ports::remote::FilterControl;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// 원격 블러 필터 종류
pub const BLUR_FILTER_KIND: &str = "streamfx-filter-blur";

/// 디스크립터를 마스크 필터 설정으로 변환
pub fn blur_settings(desc: &RegionDescriptor) -> serde_json::Value {
    json!({
        "Filter.Blur.Mask": true,
        "Filter.Blur.Mask.Region.Top": desc.top,
        "Filter.Blur.Mask.Region.Bottom": desc.bottom,
        "Filter.Blur.Mask.Region.Left": desc.left,
        "Filter.Blur.Mask.Region.Right": desc.right,
        "Filter.Blur.Mask.Type": 0,
        "Filter.Blur.Size": desc.size,
    })
}

/// 원격 필터 적용기
pub struct RegionApplier {
    filters: Arc<dyn FilterControl>,
    config: ConfigManager,
    notifier: Arc<dyn OperatorNotifier>,
}

impl RegionApplier {
    pub fn new(
        filters: Arc<dyn FilterControl>,
        config: ConfigManager,
        notifier: Arc<dyn OperatorNotifier>,
    ) -> Self {
        Self {
            filters,
            config,
            notifier,
        }
    }

    fn source_name(&self) -> String {
        self.config.get().overlay.source_name
    }

    /// 필터 생성 또는 갱신 후 활성 상태 맞추기.
    ///
    /// 원격 소스 자체가 없으면 UI 감지를 끄고 운영자에게 알린 뒤 에러를 돌려준다.
    pub async fn apply(&self, desc: &RegionDescriptor) -> Result<(), CoreError> {
        let result = self.create_or_update(desc).await;
        match &result {
            Ok(()) => debug!(name = %desc.name, enabled = desc.enabled, "블러 갱신"),
            Err(e) if e.is_missing_source() => self.on_missing_source(),
            Err(e) => error!(name = %desc.name, "블러 갱신 실패: {e}"),
        }
        result
    }

    async fn create_or_update(&self, desc: &RegionDescriptor) -> Result<(), CoreError> {
        let source = self.source_name();
        let existing = match self.filters.get_filter(&source, &desc.name).await {
            Ok(info) => info,
            Err(e) if e.is_not_found() && !e.is_missing_source() => None,
            Err(e) => return Err(e),
        };

        let settings = blur_settings(desc);
        let needs_toggle = match &existing {
            None => {
                self.filters
                    .create_filter(&source, &desc.name, BLUR_FILTER_KIND, settings)
                    .await?;
                // 새 필터는 활성 상태로 만들어진다
                !desc.enabled
            }
            Some(info) => {
                self.filters
                    .set_filter_settings(&source, &desc.name, settings)
                    .await?;
                info.enabled != desc.enabled
            }
        };

        if needs_toggle {
            self.filters
                .set_filter_enabled(&source, &desc.name, desc.enabled)
                .await?;
        }
        Ok(())
    }

    /// 필터 삭제. 원격에 없으면 no-op.
    pub async fn remove(&self, desc: &RegionDescriptor) -> Result<bool, CoreError> {
        let source = self.source_name();
        match self.filters.remove_filter(&source, &desc.name).await {
            Ok(removed) => {
                debug!(name = %desc.name, removed, "블러 삭제");
                Ok(removed)
            }
            Err(e) if e.is_not_found() && !e.is_missing_source() => Ok(false),
            Err(e) => {
                error!(name = %desc.name, "블러 삭제 실패: {e}");
                Err(e)
            }
        }
    }

    fn on_missing_source(&self) {
        let source = self.source_name();
        let already_off = !self.config.get().overlay.ui_detection;
        if let Err(e) = self.config.update_with(|c| c.overlay.ui_detection = false) {
            warn!("설정 저장 실패: {e}");
        }
        if !already_off {
            self.notifier.error(&format!(
                "소스 \"{source}\"를 찾을 수 없습니다. 소스 이름을 확인해 주세요. UI 감지를 끕니다."
            ));
        }
    }
}
