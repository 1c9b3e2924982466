//! レビュー進捗ステートマシン
//!
//! 3段階（サーモ画像アップロード → AI解析 → 人によるレビュー）をそれぞれ
//! `Pending / InProgress / Completed / Failed` で保持する。
//!
//! 旧データでは `progressStatus` が単一文字列のことがあるため、
//! 読み込み時に3段階オブジェクトへ正規化する。

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// 各段階の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StageStatus {
    #[default]
    Pending,
    #[serde(rename = "In Progress", alias = "InProgress")]
    InProgress,
    Completed,
    Failed,
}

impl StageStatus {
    pub fn label(&self) -> &'static str {
        match self {
            StageStatus::Pending => "Pending",
            StageStatus::InProgress => "In Progress",
            StageStatus::Completed => "Completed",
            StageStatus::Failed => "Failed",
        }
    }

    /// 進捗表示の色 (RGB)
    pub fn rgb(&self) -> [u8; 3] {
        match self {
            StageStatus::Pending => [128, 128, 128],
            StageStatus::InProgress => [255, 165, 0],
            StageStatus::Completed => [0, 128, 0],
            StageStatus::Failed => [255, 0, 0],
        }
    }
}

/// 検査全体のステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InspectionStatus {
    #[default]
    Pending,
    #[serde(rename = "In Progress", alias = "InProgress")]
    InProgress,
    Completed,
}

impl InspectionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            InspectionStatus::Pending => "Pending",
            InspectionStatus::InProgress => "In Progress",
            InspectionStatus::Completed => "Completed",
        }
    }
}

/// 3段階の進捗
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "ProgressRepr")]
pub struct ProgressStatus {
    pub thermal_upload: StageStatus,
    pub ai_analysis: StageStatus,
    pub review: StageStatus,
}

/// 読み込み時の表現（オブジェクト or 旧形式の文字列）
#[derive(Deserialize)]
#[serde(untagged)]
enum ProgressRepr {
    Stages(StageFields),
    Legacy(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StageFields {
    thermal_upload: StageStatus,
    ai_analysis: StageStatus,
    review: StageStatus,
}

impl Default for StageFields {
    fn default() -> Self {
        Self {
            thermal_upload: StageStatus::Pending,
            ai_analysis: StageStatus::Pending,
            review: StageStatus::Pending,
        }
    }
}

impl From<ProgressRepr> for ProgressStatus {
    fn from(repr: ProgressRepr) -> Self {
        match repr {
            ProgressRepr::Stages(s) => ProgressStatus {
                thermal_upload: s.thermal_upload,
                ai_analysis: s.ai_analysis,
                review: s.review,
            },
            ProgressRepr::Legacy(s) => ProgressStatus::from_legacy(&s),
        }
    }
}

impl ProgressStatus {
    pub fn new(thermal_upload: StageStatus, ai_analysis: StageStatus, review: StageStatus) -> Self {
        Self { thermal_upload, ai_analysis, review }
    }

    /// 保存済み状態がない検査の初期値
    pub fn initial(has_maintenance_image: bool) -> Self {
        if has_maintenance_image {
            Self::new(StageStatus::Completed, StageStatus::InProgress, StageStatus::InProgress)
        } else {
            Self::default()
        }
    }

    /// 旧形式（単一文字列）からの変換
    pub fn from_legacy(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "completed" => Self::new(
                StageStatus::Completed,
                StageStatus::Completed,
                StageStatus::Completed,
            ),
            "in progress" | "inprogress" | "in_progress" => Self::initial(true),
            _ => Self::default(),
        }
    }

    /// サーモ画像のアップロード（再アップロード含む）
    ///
    /// 未解析なら AI解析・レビューは `Pending` のまま。解析が一度でも走っていれば
    /// 以前の結果は無効になり、両方 `InProgress` に戻る（レビュー完了も取り消し）。
    pub fn maintenance_attached(&self) -> Self {
        let (ai_analysis, review) = match self.ai_analysis {
            StageStatus::Pending => (StageStatus::Pending, StageStatus::Pending),
            _ => (StageStatus::InProgress, StageStatus::InProgress),
        };
        Self::new(StageStatus::Completed, ai_analysis, review)
    }

    /// 解析リクエスト送信
    pub fn analysis_started(&self) -> Result<Self> {
        if self.thermal_upload != StageStatus::Completed {
            return Err(Error::UploadRequired);
        }
        Ok(Self::new(StageStatus::Completed, StageStatus::InProgress, StageStatus::InProgress))
    }

    /// 解析成功
    pub fn analysis_succeeded(&self) -> Self {
        Self::new(StageStatus::Completed, StageStatus::Completed, StageStatus::InProgress)
    }

    /// 解析失敗（ユーザーが再実行すれば `InProgress` に戻る）
    pub fn analysis_failed(&self) -> Self {
        Self::new(self.thermal_upload, StageStatus::Failed, StageStatus::Pending)
    }

    /// 「レビュー完了」操作
    pub fn review_completed(&self) -> Result<Self> {
        if self.ai_analysis != StageStatus::Completed {
            return Err(Error::ReviewNotReady);
        }
        Ok(Self::new(self.thermal_upload, StageStatus::Completed, StageStatus::Completed))
    }

    pub fn can_complete_review(&self) -> bool {
        self.ai_analysis == StageStatus::Completed
    }

    pub fn is_completed(&self) -> bool {
        self.ai_analysis == StageStatus::Completed && self.review == StageStatus::Completed
    }

    /// 進捗から導出した全体ステータス
    pub fn overall(&self) -> InspectionStatus {
        if self.is_completed() {
            InspectionStatus::Completed
        } else if self.thermal_upload == StageStatus::Completed {
            InspectionStatus::InProgress
        } else {
            InspectionStatus::Pending
        }
    }

    /// 表示用の段階一覧
    pub fn stages(&self) -> [(&'static str, StageStatus); 3] {
        [
            ("Thermal Image Upload", self.thermal_upload),
            ("AI Analysis", self.ai_analysis),
            ("Thermal Image Review", self.review),
        ]
    }
}
