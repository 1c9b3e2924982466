use crate::error::{Result, ReviewError};
use crate::image_payload::ImagePayload;
use thermal_review_common::validate_threshold;

/// 解析サーバーに送る1件分
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub inspection_id: String,
    pub baseline: ImagePayload,
    pub maintenance: ImagePayload,
    pub threshold: f32,
}

impl AnalysisRequest {
    /// 送信前の検証（画像が空でない・しきい値が範囲内）
    pub fn validate(&self) -> Result<()> {
        if self.baseline.bytes.is_empty() {
            return Err(ReviewError::MissingInput(format!(
                "ベースライン画像が空です: {}",
                self.baseline.file_name
            )));
        }
        if self.maintenance.bytes.is_empty() {
            return Err(ReviewError::MissingInput(format!(
                "保守画像が空です: {}",
                self.maintenance.file_name
            )));
        }
        validate_threshold(self.threshold).map_err(|_| ReviewError::InvalidThreshold(self.threshold))?;
        Ok(())
    }
}
