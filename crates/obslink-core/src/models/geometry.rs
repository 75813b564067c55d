//! 화면 지오메트리 모델.
//!
//! 절대 픽셀 사각형과 뷰포트, 그리고 원격 마스크 필터가 이해하는
//! 가장자리 기준 퍼센트 경계(crop 형식)를 정의한다.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// 절대 픽셀 좌표 사각형 (좌상단 기준)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AbsoluteRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl AbsoluteRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 모든 좌표가 유한한지
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }
}

/// 호스트 화면 크기 (픽셀)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// 양수 크기인지 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
        {
            Ok(())
        } else {
            Err(CoreError::Validation {
                field: "viewport".to_string(),
                message: format!("유효하지 않은 크기 {}x{}", self.width, self.height),
            })
        }
    }
}

/// 뷰포트 대비 퍼센트 경계 (0~100).
///
/// 각 값은 프레임의 해당 가장자리에서 영역의 가까운 가장자리까지의 거리.
/// 해상도가 바뀌어도 같은 값이 같은 영역을 가리킨다.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RegionBounds {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl RegionBounds {
    /// 절대 사각형을 퍼센트 경계로 변환
    pub fn from_rect(rect: AbsoluteRect, viewport: Viewport) -> Result<Self, CoreError> {
        viewport.validate()?;
        if !rect.is_finite() {
            return Err(CoreError::Validation {
                field: "rect".to_string(),
                message: format!("유한하지 않은 좌표 {:?}", rect),
            });
        }
        let (w, h) = (viewport.width, viewport.height);
        Ok(Self {
            top: rect.y / h * 100.0,
            left: rect.x / w * 100.0,
            bottom: (h - rect.y - rect.height) / h * 100.0,
            right: (w - rect.x - rect.width) / w * 100.0,
        })
    }

    /// 영역이 양의 면적을 가지는지 (top+bottom < 100, left+right < 100)
    pub fn has_area(&self) -> bool {
        self.top + self.bottom < 100.0 && self.left + self.right < 100.0
    }

    /// 뷰포트 중심으로부터의 거리 제곱 (퍼센트 단위)
    pub fn center_distance_sq(&self) -> f32 {
        let dy = (self.top - self.bottom) / 2.0;
        let dx = (self.left - self.right) / 2.0;
        dy * dy + dx * dx
    }
}
