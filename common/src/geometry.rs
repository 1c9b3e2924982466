//! 座標変換（自然ピクセル座標 ⇔ 表示座標）
//!
//! 画像をコンテナ内に「アスペクト比を保ったまま収める」（object-fit: contain）
//! 際の倍率とレターボックス余白を計算し、ポインタ位置と保存座標を相互変換する。
//!
//! 保存される異常領域は常に自然ピクセル座標。ここでの変換は表示専用。

use serde::{Deserialize, Serialize};

/// 2D座標
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// 幅・高さ
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// 画像デコード前など、寸法がまだ分からない状態
    pub fn unknown() -> Self {
        Self::default()
    }

    /// 寸法が確定しているか（正の有限値）
    pub fn is_known(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// 軸平行な矩形（左上 + 幅・高さ）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// 2点（ドラッグ開始・終了）から正規化した矩形を作成
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            w: (a.x - b.x).abs(),
            h: (a.y - b.y).abs(),
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    /// `[0, width] × [0, height]` に収まるよう切り詰める
    pub fn clamp_to(&self, bounds: Size) -> Rect {
        let x0 = self.x.clamp(0.0, bounds.width);
        let y0 = self.y.clamp(0.0, bounds.height);
        let x1 = self.right().clamp(0.0, bounds.width);
        let y1 = self.bottom().clamp(0.0, bounds.height);
        Rect::new(x0, y0, x1 - x0, y1 - y0)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.w.is_finite() && self.h.is_finite()
    }
}

/// 表示座標 ⇔ 自然座標の変換を提供する型
///
/// fit のみ（インライン表示）、ユーザーズーム付き（インスペクタ）の
/// どちらもこのトレイト越しにオーバーレイ描画・ポインタ変換を行う。
pub trait ScreenMapping {
    /// 自然座標 → 表示座標
    fn to_screen(&self, natural: Point) -> Point;

    /// 表示座標 → 自然座標
    fn to_natural(&self, screen: Point) -> Point;

    /// 自然座標の矩形を表示座標の矩形へ
    fn rect_to_screen(&self, rect: Rect) -> Rect {
        let top_left = self.to_screen(Point::new(rect.x, rect.y));
        let bottom_right = self.to_screen(Point::new(rect.right(), rect.bottom()));
        Rect::from_corners(top_left, bottom_right)
    }

    /// 表示座標の2点（ドラッグ）から自然座標の矩形へ
    fn rect_from_screen_corners(&self, a: Point, b: Point) -> Rect {
        Rect::from_corners(self.to_natural(a), self.to_natural(b))
    }
}

/// contain フィットの倍率とレターボックス余白
///
/// `scale = min(cw / nw, ch / nh)`、`offset = (c - n * scale) / 2`。
/// コンテナのリサイズ時・画像ロード完了時に再計算する。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FitMapping {
    natural: Size,
    container: Size,
    scale: f32,
    offset: Point,
}

impl FitMapping {
    pub fn new(natural: Size, container: Size) -> Self {
        let mut mapping = Self {
            natural,
            container,
            scale: 0.0,
            offset: Point::ORIGIN,
        };
        mapping.recompute();
        mapping
    }

    /// コンテナのリサイズ
    pub fn resize(&mut self, container: Size) {
        self.container = container;
        self.recompute();
    }

    /// 画像のロード完了で自然サイズが判明した
    pub fn set_natural(&mut self, natural: Size) {
        self.natural = natural;
        self.recompute();
    }

    fn recompute(&mut self) {
        if !self.natural.is_known() || !self.container.is_known() {
            self.scale = 0.0;
            self.offset = Point::ORIGIN;
            return;
        }
        let scale = (self.container.width / self.natural.width)
            .min(self.container.height / self.natural.height);
        self.scale = scale;
        self.offset = Point::new(
            (self.container.width - self.natural.width * scale) / 2.0,
            (self.container.height - self.natural.height * scale) / 2.0,
        );
    }

    /// 自然サイズ・コンテナサイズの両方が確定しているか
    pub fn is_ready(&self) -> bool {
        self.scale > 0.0
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn offset(&self) -> Point {
        self.offset
    }

    pub fn natural(&self) -> Size {
        self.natural
    }

    pub fn container(&self) -> Size {
        self.container
    }

    /// 実際に描画される画像サイズ（レターボックスを除く）
    pub fn rendered_size(&self) -> Size {
        Size::new(self.natural.width * self.scale, self.natural.height * self.scale)
    }

    /// ポインタ位置 → 自然座標。自然サイズ未確定なら原点。
    pub fn to_natural(&self, pointer: Point) -> Point {
        if !self.is_ready() {
            return Point::ORIGIN;
        }
        Point::new(
            (pointer.x - self.offset.x) / self.scale,
            (pointer.y - self.offset.y) / self.scale,
        )
    }

    /// 自然座標 → 表示座標。自然サイズ未確定なら原点。
    pub fn to_display(&self, natural: Point) -> Point {
        if !self.is_ready() {
            return Point::ORIGIN;
        }
        Point::new(
            natural.x * self.scale + self.offset.x,
            natural.y * self.scale + self.offset.y,
        )
    }

    pub fn rect_to_display(&self, rect: Rect) -> Rect {
        if !self.is_ready() {
            return Rect::default();
        }
        let origin = self.to_display(Point::new(rect.x, rect.y));
        Rect::new(origin.x, origin.y, rect.w * self.scale, rect.h * self.scale)
    }

    pub fn rect_from_display_corners(&self, a: Point, b: Point) -> Rect {
        Rect::from_corners(self.to_natural(a), self.to_natural(b))
    }
}

impl ScreenMapping for FitMapping {
    fn to_screen(&self, natural: Point) -> Point {
        self.to_display(natural)
    }

    fn to_natural(&self, screen: Point) -> Point {
        FitMapping::to_natural(self, screen)
    }

    fn rect_to_screen(&self, rect: Rect) -> Rect {
        self.rect_to_display(rect)
    }
}
