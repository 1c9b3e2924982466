//! キャンバス上の操作モード
//!
//! 「描画中」「ホバー中」を個別のフラグではなく1つの状態として持つ。

use crate::geometry::{Point, Rect};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum InteractionMode {
    #[default]
    Idle,
    /// 描画ツール選択中。`start` はボタン押下位置（自然座標）
    Drawing { start: Option<Point> },
    /// オーバーレイ上にポインタがある
    Hovering(String),
}

impl InteractionMode {
    pub fn is_drawing(&self) -> bool {
        matches!(self, InteractionMode::Drawing { .. })
    }

    pub fn hovered(&self) -> Option<&str> {
        match self {
            InteractionMode::Hovering(id) => Some(id),
            _ => None,
        }
    }

    /// 描画途中の開始点
    pub fn draw_start(&self) -> Option<Point> {
        match self {
            InteractionMode::Drawing { start } => *start,
            _ => None,
        }
    }

    /// 「手動で追加」ボタン。描画中なら取り消し。
    pub fn toggle_drawing(&mut self) {
        *self = if self.is_drawing() {
            InteractionMode::Idle
        } else {
            InteractionMode::Drawing { start: None }
        };
    }

    pub fn pointer_down(&mut self, at: Point) {
        if let InteractionMode::Drawing { start } = self {
            *start = Some(at);
        }
    }

    /// ボタンを離した。描画が完了すれば矩形を返して `Idle` に戻る。
    ///
    /// 大きさの判定はストア側で行う（小さすぎれば黙って破棄される）。
    pub fn pointer_up(&mut self, at: Point) -> Option<Rect> {
        match self {
            InteractionMode::Drawing { start: Some(start) } => {
                let rect = Rect::from_corners(*start, at);
                *self = InteractionMode::Idle;
                Some(rect)
            }
            _ => None,
        }
    }

    /// 描画中はホバー強調を無視する
    pub fn hover(&mut self, id: &str) {
        if !self.is_drawing() {
            *self = InteractionMode::Hovering(id.to_string());
        }
    }

    pub fn unhover(&mut self) {
        if matches!(self, InteractionMode::Hovering(_)) {
            *self = InteractionMode::Idle;
        }
    }

    pub fn cancel(&mut self) {
        *self = InteractionMode::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_cycle() {
        let mut mode = InteractionMode::default();
        mode.toggle_drawing();
        assert!(mode.is_drawing());

        mode.pointer_down(Point::new(40.0, 30.0));
        assert_eq!(mode.draw_start(), Some(Point::new(40.0, 30.0)));

        let rect = mode.pointer_up(Point::new(10.0, 50.0)).unwrap();
        assert_eq!(rect, Rect::new(10.0, 30.0, 30.0, 20.0));
        assert_eq!(mode, InteractionMode::Idle);
    }

    #[test]
    fn test_pointer_up_without_press() {
        let mut mode = InteractionMode::default();
        mode.toggle_drawing();
        assert_eq!(mode.pointer_up(Point::new(1.0, 1.0)), None);
        assert!(mode.is_drawing());
    }

    #[test]
    fn test_idle_ignores_pointer() {
        let mut mode = InteractionMode::default();
        mode.pointer_down(Point::new(1.0, 1.0));
        assert_eq!(mode.pointer_up(Point::new(9.0, 9.0)), None);
    }

    #[test]
    fn test_toggle_cancels() {
        let mut mode = InteractionMode::default();
        mode.toggle_drawing();
        mode.pointer_down(Point::new(1.0, 1.0));
        mode.toggle_drawing();
        assert_eq!(mode, InteractionMode::Idle);
    }

    #[test]
    fn test_hover_suppressed_while_drawing() {
        let mut mode = InteractionMode::default();
        mode.hover("ai_1");
        assert_eq!(mode.hovered(), Some("ai_1"));
        mode.unhover();
        assert_eq!(mode.hovered(), None);

        mode.toggle_drawing();
        mode.hover("ai_1");
        assert!(mode.is_drawing());
        mode.unhover();
        assert!(mode.is_drawing());
    }
}
