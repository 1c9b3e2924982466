//! 検査レコード（レビューで読み書きする項目のみ）

use crate::anomaly::Anomaly;
use crate::progress::{InspectionStatus, ProgressStatus};
use serde::{Deserialize, Serialize};

/// 撮影時の天候
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Weather {
    #[default]
    Sunny,
    Rainy,
    Cloudy,
}

impl Weather {
    pub const ALL: [Weather; 3] = [Weather::Sunny, Weather::Rainy, Weather::Cloudy];

    pub fn label(&self) -> &'static str {
        match self {
            Weather::Sunny => "Sunny",
            Weather::Rainy => "Rainy",
            Weather::Cloudy => "Cloudy",
        }
    }
}

/// 検査レコード
///
/// 画像は参照（ファイルパス・URL・data URI）のみ保持する。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inspection {
    #[serde(deserialize_with = "crate::parser::de_opaque_id")]
    pub id: String,

    #[serde(default)]
    pub inspector: Option<String>,

    /// 予定日
    #[serde(default)]
    pub date: Option<String>,

    /// レビュー完了時に記録
    #[serde(default)]
    pub inspected_date: Option<String>,

    #[serde(default)]
    pub baseline_image: Option<String>,
    #[serde(default)]
    pub baseline_weather: Weather,
    #[serde(default)]
    pub baseline_upload_date: Option<String>,

    #[serde(default)]
    pub maintenance_image: Option<String>,
    #[serde(default)]
    pub maintenance_weather: Weather,
    #[serde(default)]
    pub maintenance_upload_date: Option<String>,

    /// 解析サーバーが返した枠入り画像（表示専用）
    #[serde(default)]
    pub annotated_image: Option<String>,

    #[serde(default)]
    pub anomalies: Vec<Anomaly>,

    /// 欠落時は `normalize` で画像の有無から補完する
    #[serde(default)]
    pub progress_status: Option<ProgressStatus>,

    #[serde(default)]
    pub status: InspectionStatus,
}

impl Inspection {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// 読み込み直後の正規化
    ///
    /// - 進捗が欠落していれば保守画像の有無から初期値を作る
    ///   （旧形式の文字列はデシリアライズ時点で変換済み）
    /// - 完了フラグが立っていない限り全体ステータスは進捗から導出
    pub fn normalize(mut self) -> Self {
        let progress = self
            .progress_status
            .unwrap_or_else(|| ProgressStatus::initial(self.maintenance_image.is_some()));
        self.progress_status = Some(progress);
        if self.status != InspectionStatus::Completed || !progress.is_completed() {
            self.status = progress.overall();
        }
        self
    }

    pub fn progress(&self) -> ProgressStatus {
        self.progress_status
            .unwrap_or_else(|| ProgressStatus::initial(self.maintenance_image.is_some()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::StageStatus;

    #[test]
    fn test_deserialize_minimal_numeric_id() {
        let insp: Inspection = serde_json::from_str(r#"{"id": 12}"#).unwrap();
        assert_eq!(insp.id, "12");
        assert!(insp.anomalies.is_empty());
        assert_eq!(insp.baseline_weather, Weather::Sunny);
    }

    #[test]
    fn test_normalize_missing_progress_with_image() {
        let insp: Inspection =
            serde_json::from_str(r#"{"id": "a", "maintenanceImage": "thermal.png"}"#).unwrap();
        let insp = insp.normalize();
        let p = insp.progress_status.unwrap();
        assert_eq!(p.thermal_upload, StageStatus::Completed);
        assert_eq!(p.ai_analysis, StageStatus::InProgress);
        assert_eq!(insp.status, InspectionStatus::InProgress);
    }

    #[test]
    fn test_normalize_legacy_string_progress() {
        let insp: Inspection =
            serde_json::from_str(r#"{"id": 3, "progressStatus": "Pending", "status": "Pending"}"#).unwrap();
        let insp = insp.normalize();
        assert_eq!(insp.progress_status, Some(ProgressStatus::default()));
        assert_eq!(insp.status, InspectionStatus::Pending);
    }

    #[test]
    fn test_normalize_inconsistent_completed_status() {
        // 進捗が未完了なのに status だけ Completed の旧データ
        let insp: Inspection = serde_json::from_str(
            r#"{"id": 3, "status": "Completed",
                "progressStatus": {"thermalUpload":"Completed","aiAnalysis":"Completed","review":"In Progress"}}"#,
        )
        .unwrap();
        assert_eq!(insp.normalize().status, InspectionStatus::InProgress);
    }

    #[test]
    fn test_serialize_round_trip_fields() {
        let mut insp = Inspection::new("7");
        insp.maintenance_weather = Weather::Cloudy;
        let json = serde_json::to_string(&insp).unwrap();
        assert!(json.contains("\"maintenanceWeather\":\"Cloudy\""));
        assert!(json.contains("\"progressStatus\":null"));
    }
}
