use eframe::egui::{self, Color32, Pos2};
use std::path::PathBuf;

use thermal_review_common::{
    AnalysisResponse, AnalysisTicket, Point, Rect, ReviewSession, Size, Weather, ZoomLimits,
    ZoomPanViewer,
};

/// 表示中の画像1枚
#[derive(Default)]
pub struct ImageSlot {
    pub reference: Option<String>,
    pub texture: Option<egui::TextureHandle>,
    pub natural: Size,
    pub error: Option<String>,
    /// デコード待ち
    pub pending: bool,
}

impl ImageSlot {
    /// 参照を差し替える（古いテクスチャはここで破棄される）
    pub fn replace(&mut self, reference: Option<String>) {
        self.reference = reference;
        self.texture = None;
        self.natural = Size::unknown();
        self.error = None;
        self.pending = false;
    }

    pub fn is_loaded(&self) -> bool {
        self.texture.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Baseline,
    Maintenance,
    Annotated,
}

pub struct DecodedImage {
    pub kind: SlotKind,
    pub reference: String,
    pub result: Result<([usize; 2], Vec<u8>), String>,
}

pub enum UiMessage {
    AnalysisDone {
        ticket: AnalysisTicket,
        result: Result<AnalysisResponse, String>,
    },
    SaveDone {
        message: String,
    },
}

/// AIアノマリ削除時の理由入力
#[derive(Debug, Clone)]
pub struct DeletePrompt {
    pub id: String,
    pub number: usize,
    pub reason: String,
}

pub struct AppState {
    pub session: ReviewSession,
    pub source_path: Option<PathBuf>,
    pub baseline: ImageSlot,
    pub maintenance: ImageSlot,
    pub annotated: ImageSlot,
    pub baseline_weather: Weather,
    pub maintenance_weather: Weather,
    pub inline_zoom: f32,
    pub inspector_open: bool,
    pub inspector_needs_fit: bool,
    pub inspector: ZoomPanViewer,
    pub delete_prompt: Option<DeletePrompt>,
    pub confirm_clear: bool,
    pub dirty: bool,
}

impl AppState {
    pub fn new(session: ReviewSession, source_path: Option<PathBuf>) -> Self {
        let inspection = session.inspection();
        let mut state = Self {
            baseline_weather: inspection.baseline_weather,
            maintenance_weather: inspection.maintenance_weather,
            baseline: ImageSlot::default(),
            maintenance: ImageSlot::default(),
            annotated: ImageSlot::default(),
            inline_zoom: ZoomLimits::INLINE.min,
            inspector_open: false,
            inspector_needs_fit: true,
            inspector: ZoomPanViewer::default(),
            delete_prompt: None,
            confirm_clear: false,
            dirty: false,
            session,
            source_path,
        };
        state.sync_slots();
        state
    }

    /// セッションの画像参照とスロットを揃える（変わったスロットだけ破棄）
    pub fn sync_slots(&mut self) {
        let baseline = self.session.baseline_image().map(str::to_string);
        let maintenance = self.session.maintenance_image().map(str::to_string);
        let annotated = self.session.annotated_image().map(str::to_string);
        if self.baseline.reference != baseline {
            self.baseline.replace(baseline);
        }
        if self.maintenance.reference != maintenance {
            self.maintenance.replace(maintenance);
        }
        if self.annotated.reference != annotated {
            self.annotated.replace(annotated);
        }
    }

    pub fn slot_mut(&mut self, kind: SlotKind) -> &mut ImageSlot {
        match kind {
            SlotKind::Baseline => &mut self.baseline,
            SlotKind::Maintenance => &mut self.maintenance,
            SlotKind::Annotated => &mut self.annotated,
        }
    }

    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent())
            .map(|p| p.to_path_buf())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(
            ReviewSession::from_inspection(thermal_review_common::Inspection::new("new")),
            None,
        )
    }
}

pub fn to_pos(origin: Pos2, p: Point) -> Pos2 {
    Pos2::new(origin.x + p.x, origin.y + p.y)
}

pub fn to_point(origin: Pos2, pos: Pos2) -> Point {
    Point::new(pos.x - origin.x, pos.y - origin.y)
}

pub fn to_egui_rect(origin: Pos2, r: Rect) -> egui::Rect {
    egui::Rect::from_min_size(
        Pos2::new(origin.x + r.x, origin.y + r.y),
        egui::vec2(r.w, r.h),
    )
}

pub fn to_size(v: egui::Vec2) -> Size {
    Size::new(v.x, v.y)
}

pub fn rgba(c: [u8; 4]) -> Color32 {
    Color32::from_rgba_unmultiplied(c[0], c[1], c[2], c[3])
}

pub fn rgb(c: [u8; 3]) -> Color32 {
    Color32::from_rgb(c[0], c[1], c[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_conversion_offsets_by_origin() {
        let r = to_egui_rect(Pos2::new(10.0, 20.0), Rect::new(5.0, 5.0, 30.0, 40.0));
        assert_eq!(r.min, Pos2::new(15.0, 25.0));
        assert_eq!(r.size(), egui::vec2(30.0, 40.0));
        assert_eq!(to_point(Pos2::new(10.0, 20.0), Pos2::new(15.0, 25.0)), Point::new(5.0, 5.0));
    }

    #[test]
    fn test_sync_slots_replaces_changed_reference() {
        let mut state = AppState::default();
        assert!(state.maintenance.reference.is_none());
        state.session.attach_maintenance("thermal.png", "now", Weather::Sunny);
        state.sync_slots();
        assert_eq!(state.maintenance.reference.as_deref(), Some("thermal.png"));
        assert!(!state.maintenance.is_loaded());
    }
}
