//! オーバーレイ描画と解析ログの表示データ
//!
//! 表示対象（未削除）のアノマリだけを挿入順に並べ、1始まりの番号を振る。
//! 枠の番号と解析ログの番号は一致する。

use crate::anomaly::{Anomaly, SeverityTier};
use crate::geometry::{Rect, ScreenMapping};
use crate::store::AnomalyStore;

/// 画面上の枠1つ
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayBox {
    pub id: String,
    pub number: usize,
    pub screen: Rect,
    pub rgba: [u8; 4],
    pub highlighted: bool,
}

/// 表示対象を画面座標の枠へ変換
pub fn overlay_boxes<M: ScreenMapping>(
    store: &AnomalyStore,
    mapping: &M,
    hovered: Option<&str>,
) -> Vec<OverlayBox> {
    store
        .visible()
        .enumerate()
        .map(|(i, a)| OverlayBox {
            id: a.id.clone(),
            number: i + 1,
            screen: mapping.rect_to_screen(a.rect()),
            rgba: a.severity_tier().rgba(),
            highlighted: hovered == Some(a.id.as_str()),
        })
        .collect()
}

/// 画面座標での当たり判定（後に描いた枠を優先）
pub fn hit_test(boxes: &[OverlayBox], x: f32, y: f32) -> Option<&OverlayBox> {
    boxes
        .iter()
        .rev()
        .find(|b| b.screen.contains(crate::geometry::Point::new(x, y)))
}

/// 解析ログの1行
#[derive(Debug, Clone, PartialEq)]
pub struct LogRow {
    pub number: usize,
    pub id: String,
    /// "AI" / "Manual"
    pub origin: &'static str,
    /// 重大度（手動は "Manual"）
    pub badge: String,
    pub classification: String,
    pub editable_classification: bool,
    pub position: (i64, i64),
    pub size: (i64, i64),
    /// AI行のみ。信頼度がなければ "N/A"
    pub confidence: Option<String>,
    pub comment: String,
    pub tier: SeverityTier,
}

impl LogRow {
    fn from_anomaly(number: usize, a: &Anomaly) -> Self {
        let badge = if a.is_ai() {
            a.severity.clone().unwrap_or_default()
        } else {
            "Manual".to_string()
        };
        let confidence = if a.is_ai() {
            Some(
                a.confidence_percent()
                    .map(|p| format!("{}%", p))
                    .unwrap_or_else(|| "N/A".to_string()),
            )
        } else {
            None
        };
        LogRow {
            number,
            id: a.id.clone(),
            origin: a.source.label(),
            badge,
            classification: a.classification.clone().unwrap_or_default(),
            editable_classification: !a.is_ai(),
            position: (a.x.round() as i64, a.y.round() as i64),
            size: (a.w.round() as i64, a.h.round() as i64),
            confidence,
            comment: a.comment.clone(),
            tier: a.severity_tier(),
        }
    }

    /// 「Pos: (x, y) / Size: wxh px」形式の詳細
    pub fn details(&self) -> String {
        let mut text = format!(
            "Pos: ({}, {})  Size: {}x{} px",
            self.position.0, self.position.1, self.size.0, self.size.1
        );
        if let Some(conf) = &self.confidence {
            text.push_str(&format!("  Conf: {}", conf));
        }
        text
    }
}

pub fn log_rows(store: &AnomalyStore) -> Vec<LogRow> {
    store
        .visible()
        .enumerate()
        .map(|(i, a)| LogRow::from_anomaly(i + 1, a))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{FitMapping, Size};
    use crate::parser::RawAnomaly;

    fn store() -> AnomalyStore {
        AnomalyStore::new()
            .apply_ai_result(vec![
                RawAnomaly {
                    id: Some("a".into()),
                    x: 50.0,
                    y: 40.0,
                    w: 100.0,
                    h: 80.0,
                    confidence: Some(0.914),
                    severity: Some("Faulty".into()),
                    ..Default::default()
                },
                RawAnomaly {
                    id: Some("b".into()),
                    x: 200.0,
                    y: 120.0,
                    w: 60.0,
                    h: 60.0,
                    ..Default::default()
                },
            ])
    }

    #[test]
    fn test_overlay_boxes_scaled() {
        let fit = FitMapping::new(Size::new(800.0, 600.0), Size::new(400.0, 300.0));
        let boxes = overlay_boxes(&store(), &fit, Some("b"));
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].screen, Rect::new(25.0, 20.0, 50.0, 40.0));
        assert_eq!(boxes[0].rgba, SeverityTier::Faulty.rgba());
        assert!(!boxes[0].highlighted);
        assert!(boxes[1].highlighted);
        assert_eq!(boxes[1].number, 2);
    }

    #[test]
    fn test_numbers_skip_deleted() {
        let s = store().delete("a", Some("shadow")).unwrap();
        let fit = FitMapping::new(Size::new(800.0, 600.0), Size::new(800.0, 600.0));
        let boxes = overlay_boxes(&s, &fit, None);
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].id, "b");
        assert_eq!(boxes[0].number, 1);
        assert_eq!(log_rows(&s)[0].number, 1);
    }

    #[test]
    fn test_hit_test_prefers_topmost() {
        let fit = FitMapping::new(Size::new(800.0, 600.0), Size::new(800.0, 600.0));
        let s = AnomalyStore::new().apply_ai_result(vec![
            RawAnomaly { id: Some("under".into()), x: 0.0, y: 0.0, w: 100.0, h: 100.0, ..Default::default() },
            RawAnomaly { id: Some("over".into()), x: 50.0, y: 50.0, w: 100.0, h: 100.0, ..Default::default() },
        ]);
        let boxes = overlay_boxes(&s, &fit, None);
        assert_eq!(hit_test(&boxes, 75.0, 75.0).map(|b| b.id.as_str()), Some("over"));
        assert_eq!(hit_test(&boxes, 10.0, 10.0).map(|b| b.id.as_str()), Some("under"));
        assert!(hit_test(&boxes, 500.0, 500.0).is_none());
    }

    #[test]
    fn test_zoom_and_pan_leave_stored_geometry_unchanged() {
        use crate::geometry::Point;
        use crate::viewer::{ViewTransform, Viewport, ZoomPanViewer};

        let s = store();
        let before = s.all().to_vec();

        let mut viewer = ZoomPanViewer::default();
        viewer.set_natural(Size::new(800.0, 600.0));
        viewer.set_container(Size::new(1000.0, 500.0));
        let mut frames = Vec::new();
        viewer.zoom_by(2.0, Some(Point::new(300.0, 200.0)));
        frames.push(overlay_boxes(&s, &viewer, None));
        viewer.begin_drag(Point::new(500.0, 250.0));
        viewer.pan_by(-120.0, 45.0);
        viewer.end_drag();
        frames.push(overlay_boxes(&s, &viewer, Some("a")));
        viewer.set_zoom(5.0, None);
        frames.push(overlay_boxes(&s, &viewer, None));
        viewer.fit_to_container();
        frames.push(overlay_boxes(&s, &viewer, None));

        let mut fit = FitMapping::new(Size::new(800.0, 600.0), Size::new(400.0, 300.0));
        fit.resize(Size::new(640.0, 200.0));
        let viewport = Viewport::new(fit, ViewTransform::identity().zoomed_about(3.0, Point::new(320.0, 100.0)));
        frames.push(overlay_boxes(&s, &viewport, None));

        assert_eq!(s.all(), before.as_slice());
        // 画面上の枠を自然座標に戻すと保存値に一致する
        let last = &frames[frames.len() - 1][0];
        let back = viewport.rect_from_screen_corners(
            Point::new(last.screen.x, last.screen.y),
            Point::new(last.screen.right(), last.screen.bottom()),
        );
        assert!((back.x - 50.0).abs() < 1e-3 && (back.y - 40.0).abs() < 1e-3);
        assert!((back.w - 100.0).abs() < 1e-3 && (back.h - 80.0).abs() < 1e-3);
        assert!(frames.iter().all(|f| f.len() == 2));
    }

    #[test]
    fn test_log_rows_details() {
        let rows = log_rows(&store());
        assert_eq!(rows[0].origin, "AI");
        assert_eq!(rows[0].confidence.as_deref(), Some("91%"));
        assert_eq!(rows[1].confidence.as_deref(), Some("N/A"));
        assert_eq!(rows[0].details(), "Pos: (50, 40)  Size: 100x80 px  Conf: 91%");
        assert!(!rows[0].editable_classification);
        assert_eq!(rows[1].classification, "Unknown");
    }
}
