//! 프레임 녹화 재생.
//!
//! JSON Lines 파일 한 줄이 한 프레임이다:
//!
//! ```json
//! {"viewport":{"width":1920,"height":1080},
//!  "nodes":[{"id":1,"kind":"res","x":10,"y":700,"width":600,"height":300}],
//!  "addons":{"ChatLog":1},
//!  "activity":{"in_combat":true}}
//! ```
//!
//! 빈 줄과 `#`으로 시작하는 줄은 건너뛴다. 재생기는 UI 트리와 활동 신호 수집기 역할을 함께 한다.

use obslink_core::error::CoreError;
use obslink_core::models::activity::ActivitySignal;
use obslink_core::models::geometry::Viewport;
use obslink_core::models::ui::UiNode;
use obslink_core::ports::activity::ActivitySource;
use obslink_overlay::snapshot::UiSnapshot;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// 녹화된 프레임 하나
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayFrame {
    pub viewport: Viewport,
    #[serde(default)]
    pub nodes: Vec<UiNode>,
    #[serde(default)]
    pub addons: HashMap<String, u64>,
    #[serde(default)]
    pub activity: ActivitySignal,
}

impl ReplayFrame {
    /// UI 트리 스냅샷으로 변환
    pub fn snapshot(&self) -> UiSnapshot {
        let mut snapshot = UiSnapshot::new(self.viewport);
        for node in &self.nodes {
            snapshot.insert(node.clone());
        }
        self.addons
            .iter()
            .fold(snapshot, |snapshot, (name, root)| snapshot.with_addon(name.as_str(), *root))
    }
}

/// 프레임 재생기
pub struct FrameReplay {
    frames: Vec<ReplayFrame>,
    cursor: Mutex<usize>,
    current: Mutex<Option<ActivitySignal>>,
}

impl FrameReplay {
    /// 파일에서 로드
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path)?;
        let replay = Self::parse(&text)?;
        info!("프레임 녹화 로드: {} ({}프레임)", path.display(), replay.len());
        Ok(replay)
    }

    /// JSON Lines 텍스트 파싱. 잘못된 줄은 줄 번호와 함께 에러.
    pub fn parse(text: &str) -> Result<Self, CoreError> {
        let mut frames = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let frame: ReplayFrame =
                serde_json::from_str(line).map_err(|e| CoreError::Validation {
                    field: format!("line {}", i + 1),
                    message: e.to_string(),
                })?;
            frames.push(frame);
        }
        Ok(Self {
            frames,
            cursor: Mutex::new(0),
            current: Mutex::new(None),
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// 다음 프레임으로 진행. 끝이면 None.
    pub fn advance(&self) -> Option<UiSnapshot> {
        let mut cursor = self.cursor.lock();
        let frame = self.frames.get(*cursor)?;
        *cursor += 1;
        *self.current.lock() = Some(frame.activity.clone());
        Some(frame.snapshot())
    }

    /// 모든 프레임을 재생했는지
    pub fn is_finished(&self) -> bool {
        *self.cursor.lock() >= self.frames.len()
    }
}

impl ActivitySource for FrameReplay {
    fn poll(&self) -> Result<ActivitySignal, CoreError> {
        Ok(self.current.lock().clone().unwrap_or_default())
    }
}

/// 수집기가 없을 때 쓰는 고정 신호 (로그인, 비전투)
#[derive(Debug, Default)]
pub struct IdleActivity;

impl ActivitySource for IdleActivity {
    fn poll(&self) -> Result<ActivitySignal, CoreError> {
        Ok(ActivitySignal::default())
    }
}
