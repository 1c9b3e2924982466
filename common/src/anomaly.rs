//! 異常領域（アノマリ）の型定義
//!
//! 座標 `x, y, w, h` は保守（サーモ）画像の自然ピクセル座標。

use crate::geometry::Rect;
use serde::{Deserialize, Serialize};

/// 手動アノマリで選択できる分類
pub const MANUAL_CLASSIFICATIONS: &[&str] = &[
    "Loose Joint",
    "Point Overload",
    "Full Wire Overload",
    "Other",
];

/// AI解析結果で分類が欠落していた場合の既定値
pub const UNKNOWN_CLASSIFICATION: &str = "Unknown";

/// 手動描画の最小サイズ（自然ピクセル）
pub const MIN_MANUAL_SIZE: f32 = 5.0;

/// 生成元。作成後は変更されない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySource {
    Ai,
    User,
}

impl AnomalySource {
    /// 解析ログの表示名
    pub fn label(&self) -> &'static str {
        match self {
            AnomalySource::Ai => "AI",
            AnomalySource::User => "Manual",
        }
    }
}

impl Default for AnomalySource {
    fn default() -> Self {
        AnomalySource::Ai
    }
}

/// 色分け用の重大度区分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeverityTier {
    Faulty,
    PotentiallyFaulty,
    Unrated,
}

impl SeverityTier {
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(str::trim) {
            Some("Faulty") => SeverityTier::Faulty,
            Some("Potentially Faulty") => SeverityTier::PotentiallyFaulty,
            _ => SeverityTier::Unrated,
        }
    }

    /// 枠線色 (RGBA)
    pub fn rgba(&self) -> [u8; 4] {
        match self {
            SeverityTier::Faulty => [220, 53, 69, 230],
            SeverityTier::PotentiallyFaulty => [253, 126, 20, 230],
            SeverityTier::Unrated => [255, 200, 0, 242],
        }
    }
}

/// 1件の異常領域
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    #[serde(deserialize_with = "crate::parser::de_opaque_id")]
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,

    /// AI由来のみ [0, 1]
    #[serde(default)]
    pub confidence: Option<f32>,

    /// 手動アノマリは未分類 (`None`) から始まる
    #[serde(default)]
    pub classification: Option<String>,

    #[serde(default)]
    pub severity: Option<String>,

    #[serde(default, deserialize_with = "crate::parser::de_null_as_empty")]
    pub comment: String,

    #[serde(default)]
    pub source: AnomalySource,

    #[serde(default)]
    pub deleted: bool,
}

impl Anomaly {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.w, self.h)
    }

    pub fn is_ai(&self) -> bool {
        self.source == AnomalySource::Ai
    }

    pub fn severity_tier(&self) -> SeverityTier {
        SeverityTier::from_label(self.severity.as_deref())
    }

    /// 信頼度（%表記、四捨五入）
    pub fn confidence_percent(&self) -> Option<u32> {
        self.confidence
            .filter(|c| c.is_finite())
            .map(|c| (c.clamp(0.0, 1.0) * 100.0).round() as u32)
    }
}
