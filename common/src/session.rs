//! 1検査分のレビューセッション
//!
//! ストア・進捗・操作モードをまとめて持ち、UIやCLIからの操作を受け付ける。
//! 解析リクエストは `begin_analysis` で発行したチケットを `finish_analysis` に
//! 返す形で完了させる。セッションを閉じる・保守画像を差し替えると世代が進み、
//! 古いチケットの結果は状態を変えずに破棄される。

use crate::anomaly::Anomaly;
use crate::error::{Error, Result};
use crate::geometry::{Point, Rect, Size};
use crate::inspection::{Inspection, Weather};
use crate::interaction::InteractionMode;
use crate::parser::{build_save_request, AnalysisResponse, SaveAnnotationsRequest};
use crate::progress::{InspectionStatus, ProgressStatus};
use crate::store::AnomalyStore;

/// 既定の検出しきい値
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// UIスライダーの刻み
pub const THRESHOLD_STEP: f32 = 0.05;

/// 発行済みの解析リクエスト
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisTicket {
    pub inspection_id: String,
    pub generation: u64,
    pub baseline: String,
    pub maintenance: String,
    pub threshold: f32,
}

/// `finish_analysis` の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// 結果を反映した（AI由来の件数）
    Applied(usize),
    /// 古いチケットなので捨てた
    Discarded,
}

#[derive(Debug, Clone)]
pub struct ReviewSession {
    inspection: Inspection,
    store: AnomalyStore,
    progress: ProgressStatus,
    mode: InteractionMode,
    maintenance_size: Size,
    threshold: f32,
    generation: u64,
    in_flight: Option<u64>,
}

pub fn validate_threshold(threshold: f32) -> Result<f32> {
    if threshold.is_finite() && (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(Error::InvalidThreshold(threshold))
    }
}

impl ReviewSession {
    /// 検査レコードから開始（旧形式の進捗はここで正規化される）
    pub fn from_inspection(inspection: Inspection) -> Self {
        let mut inspection = inspection.normalize();
        let progress = inspection.progress();
        let anomalies = std::mem::take(&mut inspection.anomalies);
        log::debug!(
            "session opened for inspection {} ({} anomalies)",
            inspection.id,
            anomalies.len()
        );
        Self {
            inspection,
            store: AnomalyStore::from_anomalies(anomalies),
            progress,
            mode: InteractionMode::default(),
            maintenance_size: Size::unknown(),
            threshold: DEFAULT_THRESHOLD,
            generation: 0,
            in_flight: None,
        }
    }

    pub fn inspection_id(&self) -> &str {
        &self.inspection.id
    }

    pub fn store(&self) -> &AnomalyStore {
        &self.store
    }

    pub fn visible_anomalies(&self) -> Vec<&Anomaly> {
        self.store.visible().collect()
    }

    pub fn progress(&self) -> ProgressStatus {
        self.progress
    }

    pub fn status(&self) -> InspectionStatus {
        self.inspection.status
    }

    pub fn baseline_image(&self) -> Option<&str> {
        self.inspection.baseline_image.as_deref()
    }

    pub fn maintenance_image(&self) -> Option<&str> {
        self.inspection.maintenance_image.as_deref()
    }

    pub fn annotated_image(&self) -> Option<&str> {
        self.inspection.annotated_image.as_deref()
    }

    pub fn inspection(&self) -> &Inspection {
        &self.inspection
    }

    pub fn mode(&self) -> &InteractionMode {
        &self.mode
    }

    pub fn mode_mut(&mut self) -> &mut InteractionMode {
        &mut self.mode
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f32) -> Result<()> {
        self.threshold = validate_threshold(threshold)?;
        Ok(())
    }

    pub fn is_analyzing(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 保守画像の自然サイズ（デコード完了後に設定）
    pub fn maintenance_size(&self) -> Size {
        self.maintenance_size
    }

    pub fn set_maintenance_size(&mut self, size: Size) {
        self.maintenance_size = size;
    }

    pub fn attach_baseline(&mut self, image: impl Into<String>, uploaded_at: &str, weather: Weather) {
        self.inspection.baseline_image = Some(image.into());
        self.inspection.baseline_upload_date = Some(uploaded_at.to_string());
        self.inspection.baseline_weather = weather;
    }

    pub fn remove_baseline(&mut self) {
        self.inspection.baseline_image = None;
        self.inspection.baseline_upload_date = None;
        self.inspection.baseline_weather = Weather::default();
    }

    /// 保守（サーモ）画像のアップロード・差し替え
    ///
    /// 実行中の解析があればその結果は破棄対象になる。
    pub fn attach_maintenance(&mut self, image: impl Into<String>, uploaded_at: &str, weather: Weather) {
        self.inspection.maintenance_image = Some(image.into());
        self.inspection.maintenance_upload_date = Some(uploaded_at.to_string());
        self.inspection.maintenance_weather = weather;
        self.maintenance_size = Size::unknown();
        self.invalidate_in_flight();
        self.set_progress(self.progress.maintenance_attached());
    }

    /// 解析リクエストを発行
    pub fn begin_analysis(&mut self) -> Result<AnalysisTicket> {
        let baseline = self
            .inspection
            .baseline_image
            .clone()
            .ok_or_else(|| Error::MissingInput("baseline image".into()))?;
        let maintenance = self
            .inspection
            .maintenance_image
            .clone()
            .ok_or_else(|| Error::MissingInput("maintenance image".into()))?;
        if self.in_flight.is_some() {
            return Err(Error::AnalysisInFlight(self.inspection.id.clone()));
        }
        let threshold = validate_threshold(self.threshold)?;
        let progress = self.progress.analysis_started()?;

        self.set_progress(progress);
        self.in_flight = Some(self.generation);
        log::info!(
            "analysis requested for inspection {} (threshold {:.2})",
            self.inspection.id,
            threshold
        );
        Ok(AnalysisTicket {
            inspection_id: self.inspection.id.clone(),
            generation: self.generation,
            baseline,
            maintenance,
            threshold,
        })
    }

    /// 解析結果を反映
    ///
    /// 失敗時は進捗を `Failed` にして `AnalysisFailed` を返す。
    /// 古いチケットは成否にかかわらず何もせず `Discarded`。
    pub fn finish_analysis(
        &mut self,
        ticket: &AnalysisTicket,
        outcome: std::result::Result<AnalysisResponse, String>,
    ) -> Result<AnalysisOutcome> {
        let current = ticket.inspection_id == self.inspection.id
            && ticket.generation == self.generation
            && self.in_flight == Some(ticket.generation);
        if !current {
            log::info!(
                "discarding stale analysis result for inspection {} (generation {})",
                ticket.inspection_id,
                ticket.generation
            );
            return Ok(AnalysisOutcome::Discarded);
        }
        self.in_flight = None;

        match outcome {
            Ok(response) => {
                let count = response.anomalies.len();
                self.store = self
                    .store
                    .apply_ai_result_within(response.anomalies, self.maintenance_size);
                if response.annotated_image.is_some() {
                    self.inspection.annotated_image = response.annotated_image;
                }
                self.set_progress(self.progress.analysis_succeeded());
                log::info!("analysis finished: {} anomalies", count);
                Ok(AnalysisOutcome::Applied(count))
            }
            Err(message) => {
                self.set_progress(self.progress.analysis_failed());
                log::warn!("analysis failed for inspection {}: {}", self.inspection.id, message);
                Err(Error::AnalysisFailed(message))
            }
        }
    }

    /// 手動矩形を追加（保守画像の自然サイズで切り詰める）
    pub fn add_manual(&mut self, rect: Rect) -> Result<String> {
        let (store, id) = self.store.add_manual(rect, self.maintenance_size)?;
        self.store = store;
        Ok(id)
    }

    /// 描画モードでボタンを離した
    ///
    /// 描画が完了しなければ `None`。小さすぎる矩形は `Some(Err)` で、
    /// ストアは変わらない。
    pub fn finish_drawing(&mut self, at: Point) -> Option<Result<String>> {
        let rect = self.mode.pointer_up(at)?;
        Some(self.add_manual(rect))
    }

    pub fn delete(&mut self, id: &str, reason: Option<&str>) -> Result<()> {
        self.store = self.store.delete(id, reason)?;
        if self.mode.hovered() == Some(id) {
            self.mode.unhover();
        }
        Ok(())
    }

    pub fn restore(&mut self, id: &str) -> Result<()> {
        self.store = self.store.restore(id)?;
        Ok(())
    }

    pub fn set_comment(&mut self, id: &str, text: &str) -> Result<()> {
        self.store = self.store.set_comment(id, text)?;
        Ok(())
    }

    /// 手動アノマリの分類変更（AI由来は読み取り専用）
    pub fn set_classification(&mut self, id: &str, value: Option<&str>) -> Result<()> {
        let anomaly = self
            .store
            .get(id)
            .ok_or_else(|| Error::UnknownAnomaly(id.to_string()))?;
        if anomaly.is_ai() {
            return Err(Error::ClassificationLocked(id.to_string()));
        }
        self.store = self.store.set_classification(id, value)?;
        Ok(())
    }

    /// 全注釈の消去（確認は呼び出し側で行う）
    pub fn clear_annotations(&mut self) {
        self.store = self.store.clear();
        self.mode.cancel();
        log::info!("annotations cleared for inspection {}", self.inspection.id);
    }

    /// 「レビュー完了」
    pub fn complete_review(&mut self, inspected_date: &str) -> Result<()> {
        let progress = self.progress.review_completed()?;
        self.set_progress(progress);
        self.inspection.inspected_date = Some(inspected_date.to_string());
        log::info!("review completed for inspection {}", self.inspection.id);
        Ok(())
    }

    /// 画面を閉じた。実行中の解析結果はこれ以降破棄される。
    pub fn close(&mut self) {
        self.invalidate_in_flight();
        self.mode.cancel();
    }

    /// 保存用の検査レコード（削除済みを含む全件）
    pub fn to_inspection(&self) -> Inspection {
        let mut inspection = self.inspection.clone();
        inspection.anomalies = self.store.all().to_vec();
        inspection.progress_status = Some(self.progress);
        inspection
    }

    pub fn save_request(&self) -> SaveAnnotationsRequest {
        build_save_request(&self.inspection.id, self.store.all())
    }

    fn set_progress(&mut self, progress: ProgressStatus) {
        self.progress = progress;
        self.inspection.progress_status = Some(progress);
        self.inspection.status = progress.overall();
    }

    fn invalidate_in_flight(&mut self) {
        self.generation += 1;
        if self.in_flight.take().is_some() {
            log::info!(
                "in-flight analysis for inspection {} will be discarded",
                self.inspection.id
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::RawAnomaly;
    use crate::progress::StageStatus;

    fn ready_session() -> ReviewSession {
        let mut s = ReviewSession::from_inspection(Inspection::new("insp-1"));
        s.attach_baseline("baseline.png", "2024-05-01T10:00:00", Weather::Sunny);
        s.attach_maintenance("thermal.png", "2024-05-02T10:00:00", Weather::Cloudy);
        s.set_maintenance_size(Size::new(800.0, 600.0));
        s
    }

    fn two_anomalies() -> AnalysisResponse {
        AnalysisResponse {
            annotated_image: Some("data:image/png;base64,AAAA".into()),
            anomalies: vec![
                RawAnomaly {
                    id: Some("ai_1".into()),
                    x: 50.0,
                    y: 40.0,
                    w: 100.0,
                    h: 80.0,
                    confidence: Some(0.9),
                    severity: Some("Faulty".into()),
                    classification: Some("Loose Joint".into()),
                    ..Default::default()
                },
                RawAnomaly {
                    id: Some("ai_2".into()),
                    x: 200.0,
                    y: 120.0,
                    w: 60.0,
                    h: 60.0,
                    ..Default::default()
                },
            ],
        }
    }

    #[test]
    fn test_end_to_end_review() {
        let mut s = ready_session();
        let ticket = s.begin_analysis().unwrap();
        assert_eq!(ticket.threshold, 0.5);
        assert!(s.is_analyzing());

        let outcome = s.finish_analysis(&ticket, Ok(two_anomalies())).unwrap();
        assert_eq!(outcome, AnalysisOutcome::Applied(2));
        assert_eq!(s.visible_anomalies().len(), 2);
        assert_eq!(s.progress().ai_analysis, StageStatus::Completed);
        assert!(s.annotated_image().is_some());

        s.delete("ai_1", Some("shadow artifact")).unwrap();
        assert_eq!(s.visible_anomalies().len(), 1);

        let request = s.save_request();
        assert_eq!(request.inspection_id, "insp-1");
        assert_eq!(request.anomalies.len(), 2);
        assert!(request.anomalies[0].deleted);
        assert!(!request.anomalies[1].deleted);
        assert_eq!(
            request.anomalies[0].comment.as_deref(),
            Some("Deleted by user. Reason: shadow artifact")
        );

        s.complete_review("2024-05-03").unwrap();
        assert_eq!(s.status(), InspectionStatus::Completed);
        assert_eq!(s.to_inspection().inspected_date.as_deref(), Some("2024-05-03"));
    }

    #[test]
    fn test_begin_requires_both_images() {
        let mut s = ReviewSession::from_inspection(Inspection::new("x"));
        s.attach_maintenance("thermal.png", "now", Weather::Sunny);
        assert!(matches!(s.begin_analysis(), Err(Error::MissingInput(_))));
        assert!(!s.is_analyzing());

        s.attach_baseline("base.png", "now", Weather::Sunny);
        s.remove_baseline();
        assert!(matches!(s.begin_analysis(), Err(Error::MissingInput(_))));
    }

    #[test]
    fn test_duplicate_request_rejected() {
        let mut s = ready_session();
        let _ticket = s.begin_analysis().unwrap();
        assert!(matches!(s.begin_analysis(), Err(Error::AnalysisInFlight(_))));
    }

    #[test]
    fn test_threshold_validation() {
        let mut s = ready_session();
        assert!(matches!(s.set_threshold(1.2), Err(Error::InvalidThreshold(_))));
        assert!(s.set_threshold(f32::NAN).is_err());
        assert_eq!(s.threshold(), DEFAULT_THRESHOLD);
        s.set_threshold(0.75).unwrap();
        assert_eq!(s.begin_analysis().unwrap().threshold, 0.75);
    }

    #[test]
    fn test_failure_marks_progress_and_allows_retry() {
        let mut s = ready_session();
        let ticket = s.begin_analysis().unwrap();
        let err = s.finish_analysis(&ticket, Err("model unavailable".into())).unwrap_err();
        assert!(matches!(err, Error::AnalysisFailed(ref m) if m == "model unavailable"));
        assert_eq!(s.progress().ai_analysis, StageStatus::Failed);
        assert!(s.store().is_empty());
        assert!(s.complete_review("d").is_err());

        let retry = s.begin_analysis().unwrap();
        s.finish_analysis(&retry, Ok(two_anomalies())).unwrap();
        assert_eq!(s.visible_anomalies().len(), 2);
    }

    #[test]
    fn test_reupload_discards_late_result() {
        let mut s = ready_session();
        let ticket = s.begin_analysis().unwrap();
        s.attach_maintenance("thermal-2.png", "later", Weather::Rainy);
        assert!(!s.is_analyzing());

        let outcome = s.finish_analysis(&ticket, Ok(two_anomalies())).unwrap();
        assert_eq!(outcome, AnalysisOutcome::Discarded);
        assert!(s.store().is_empty());
        assert_eq!(s.maintenance_size(), Size::unknown());
    }

    #[test]
    fn test_close_discards_failure_too() {
        let mut s = ready_session();
        let ticket = s.begin_analysis().unwrap();
        let before = s.progress();
        s.close();
        let outcome = s.finish_analysis(&ticket, Err("timeout".into())).unwrap();
        assert_eq!(outcome, AnalysisOutcome::Discarded);
        assert_eq!(s.progress(), before);
    }

    #[test]
    fn test_reupload_after_completion_reverts_status() {
        let mut s = ready_session();
        let ticket = s.begin_analysis().unwrap();
        s.finish_analysis(&ticket, Ok(two_anomalies())).unwrap();
        s.complete_review("2024-05-03").unwrap();

        s.attach_maintenance("thermal-2.png", "later", Weather::Sunny);
        assert_eq!(s.status(), InspectionStatus::InProgress);
        assert_eq!(s.progress().review, StageStatus::InProgress);
    }

    #[test]
    fn test_manual_draw_and_classification_lock() {
        let mut s = ready_session();
        let ticket = s.begin_analysis().unwrap();
        s.finish_analysis(&ticket, Ok(two_anomalies())).unwrap();

        s.mode_mut().toggle_drawing();
        s.mode_mut().pointer_down(Point::new(300.0, 300.0));
        let id = s.finish_drawing(Point::new(340.0, 330.0)).unwrap().unwrap();
        assert_eq!(s.visible_anomalies().len(), 3);

        s.set_classification(&id, Some("Point Overload")).unwrap();
        assert_eq!(
            s.store().get(&id).unwrap().classification.as_deref(),
            Some("Point Overload")
        );
        assert!(matches!(
            s.set_classification("ai_1", Some("Other")),
            Err(Error::ClassificationLocked(_))
        ));

        // 手動分は理由なしで削除できる
        s.delete(&id, None).unwrap();
        assert_eq!(s.visible_anomalies().len(), 2);
    }

    #[test]
    fn test_tiny_drawing_rejected() {
        let mut s = ready_session();
        s.mode_mut().toggle_drawing();
        s.mode_mut().pointer_down(Point::new(10.0, 10.0));
        let result = s.finish_drawing(Point::new(12.0, 12.0)).unwrap();
        assert!(matches!(result, Err(Error::InvalidManualRect { .. })));
        assert!(s.store().is_empty());
    }

    #[test]
    fn test_manual_needs_decoded_size() {
        let mut s = ready_session();
        s.set_maintenance_size(Size::unknown());
        assert!(s.add_manual(Rect::new(0.0, 0.0, 50.0, 50.0)).is_err());
    }

    #[test]
    fn test_round_trip_through_inspection() {
        let mut s = ready_session();
        let ticket = s.begin_analysis().unwrap();
        s.finish_analysis(&ticket, Ok(two_anomalies())).unwrap();
        s.delete("ai_2", Some("reflection")).unwrap();

        let reopened = ReviewSession::from_inspection(s.to_inspection());
        assert_eq!(reopened.store().len(), 2);
        assert_eq!(reopened.visible_anomalies().len(), 1);
        assert_eq!(reopened.progress(), s.progress());
        assert!(!reopened.is_analyzing());
    }

    #[test]
    fn test_clear_annotations() {
        let mut s = ready_session();
        let ticket = s.begin_analysis().unwrap();
        s.finish_analysis(&ticket, Ok(two_anomalies())).unwrap();
        s.clear_annotations();
        assert!(s.store().is_empty());
        assert!(s.save_request().anomalies.is_empty());
    }
}
