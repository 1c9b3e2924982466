//! ズーム・パン
//!
//! 表示専用の変換。保存済みの自然座標には一切触れない。
//!
//! - `ViewTransform`: ズーム倍率 + 平行移動（表示ピクセル）
//! - `Viewport`: contain フィットの上にユーザーズームを重ねた合成変換（インライン表示）
//! - `ZoomPanViewer`: インスペクタ用の対話状態（ドラッグ・ホイール・フィット）

use crate::geometry::{FitMapping, Point, Rect, ScreenMapping, Size};

/// ズーム倍率の下限・上限
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomLimits {
    pub min: f32,
    pub max: f32,
}

impl ZoomLimits {
    /// インスペクタ既定値
    pub const DEFAULT: ZoomLimits = ZoomLimits { min: 0.1, max: 5.0 };
    /// インライン表示のズームスライダー
    pub const INLINE: ZoomLimits = ZoomLimits { min: 1.0, max: 3.0 };

    pub fn clamp(&self, zoom: f32) -> f32 {
        zoom.clamp(self.min, self.max)
    }
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// ズーム・パン変換: `screen = pan + zoom * content`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub zoom: f32,
    pub pan: Point,
}

impl ViewTransform {
    pub fn new(zoom: f32, pan: Point) -> Self {
        Self { zoom, pan }
    }

    pub fn identity() -> Self {
        Self::new(1.0, Point::ORIGIN)
    }

    pub fn apply(&self, content: Point) -> Point {
        Point::new(self.pan.x + content.x * self.zoom, self.pan.y + content.y * self.zoom)
    }

    pub fn invert(&self, screen: Point) -> Point {
        Point::new((screen.x - self.pan.x) / self.zoom, (screen.y - self.pan.y) / self.zoom)
    }

    /// `pivot` の直下にある点を動かさずにズーム倍率を変更
    ///
    /// `pan' = pan - (pivot - pan) * (new / old - 1)`
    pub fn zoomed_about(&self, new_zoom: f32, pivot: Point) -> ViewTransform {
        let ratio = new_zoom / self.zoom;
        let local = Point::new(pivot.x - self.pan.x, pivot.y - self.pan.y);
        ViewTransform {
            zoom: new_zoom,
            pan: Point::new(
                self.pan.x - local.x * (ratio - 1.0),
                self.pan.y - local.y * (ratio - 1.0),
            ),
        }
    }

    pub fn panned(&self, dx: f32, dy: f32) -> ViewTransform {
        ViewTransform {
            zoom: self.zoom,
            pan: Point::new(self.pan.x + dx, self.pan.y + dy),
        }
    }
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// contain フィット → ユーザーズームの合成（倍率は乗算で合成される）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub fit: FitMapping,
    pub view: ViewTransform,
}

impl Viewport {
    pub fn new(fit: FitMapping, view: ViewTransform) -> Self {
        Self { fit, view }
    }

    /// 自然ピクセル1つあたりの表示ピクセル数
    pub fn effective_scale(&self) -> f32 {
        self.fit.scale() * self.view.zoom
    }
}

impl ScreenMapping for Viewport {
    fn to_screen(&self, natural: Point) -> Point {
        if !self.fit.is_ready() {
            return Point::ORIGIN;
        }
        self.view.apply(self.fit.to_display(natural))
    }

    fn to_natural(&self, screen: Point) -> Point {
        if !self.fit.is_ready() {
            return Point::ORIGIN;
        }
        self.fit.to_natural(self.view.invert(screen))
    }
}

/// インスペクタ（全画面表示）の対話状態
///
/// コンテンツ座標 = 自然ピクセル座標。パンはドラッグ中のみ有効。
#[derive(Debug, Clone, PartialEq)]
pub struct ZoomPanViewer {
    transform: ViewTransform,
    limits: ZoomLimits,
    natural: Size,
    container: Size,
    drag_anchor: Option<Point>,
}

impl ZoomPanViewer {
    pub fn new(limits: ZoomLimits) -> Self {
        Self {
            transform: ViewTransform::identity(),
            limits,
            natural: Size::unknown(),
            container: Size::unknown(),
            drag_anchor: None,
        }
    }

    pub fn transform(&self) -> ViewTransform {
        self.transform
    }

    pub fn zoom(&self) -> f32 {
        self.transform.zoom
    }

    pub fn pan(&self) -> Point {
        self.transform.pan
    }

    pub fn limits(&self) -> ZoomLimits {
        self.limits
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_anchor.is_some()
    }

    pub fn set_natural(&mut self, natural: Size) {
        self.natural = natural;
    }

    pub fn set_container(&mut self, container: Size) {
        self.container = container;
    }

    /// 倍率を `factor` 倍する。`pivot`（コンテナ座標）指定時はその点を固定。
    pub fn zoom_by(&mut self, factor: f32, pivot: Option<Point>) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        self.set_zoom(self.transform.zoom * factor, pivot);
    }

    /// 倍率を直接指定（上下限でクランプ）
    pub fn set_zoom(&mut self, zoom: f32, pivot: Option<Point>) {
        let new_zoom = self.limits.clamp(zoom);
        self.transform = match pivot {
            Some(p) => self.transform.zoomed_about(new_zoom, p),
            None => ViewTransform::new(new_zoom, self.transform.pan),
        };
    }

    /// ドラッグ開始
    pub fn begin_drag(&mut self, at: Point) {
        self.drag_anchor = Some(at);
    }

    /// ドラッグ中のポインタ移動。前回位置との差分だけパンする。
    pub fn drag_to(&mut self, at: Point) {
        if let Some(anchor) = self.drag_anchor {
            self.transform = self.transform.panned(at.x - anchor.x, at.y - anchor.y);
            self.drag_anchor = Some(at);
        }
    }

    /// ドラッグ中でなければ無視
    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        if self.drag_anchor.is_none() {
            return;
        }
        self.transform = self.transform.panned(dx, dy);
    }

    pub fn end_drag(&mut self) {
        self.drag_anchor = None;
    }

    /// 画像の幅がコンテナに収まる最大倍率にし、パンを原点へ戻す
    pub fn fit_to_container(&mut self) {
        let zoom = if self.natural.is_known() && self.container.is_known() {
            self.limits.clamp(self.container.width / self.natural.width)
        } else {
            1.0
        };
        self.transform = ViewTransform::new(zoom, Point::ORIGIN);
        self.drag_anchor = None;
    }

    /// 等倍・原点
    pub fn reset(&mut self) {
        self.transform = ViewTransform::new(self.limits.clamp(1.0), Point::ORIGIN);
        self.drag_anchor = None;
    }

    /// 表示上の矩形（コンテナ座標）
    pub fn visible_rect(&self) -> Rect {
        let top_left = self.transform.apply(Point::ORIGIN);
        Rect::new(
            top_left.x,
            top_left.y,
            self.natural.width * self.transform.zoom,
            self.natural.height * self.transform.zoom,
        )
    }
}

impl Default for ZoomPanViewer {
    fn default() -> Self {
        Self::new(ZoomLimits::DEFAULT)
    }
}

impl ScreenMapping for ZoomPanViewer {
    fn to_screen(&self, natural: Point) -> Point {
        self.transform.apply(natural)
    }

    fn to_natural(&self, screen: Point) -> Point {
        self.transform.invert(screen)
    }
}
