use kurbo::{Affine, BezPath, Point, Rect, Shape, Vec2};

use crate::overlay::block::{BBox, MIN_BLOCK_DIM, TextBlock, normalize_angle};

pub const CORNER_HANDLE_SIZE: f64 = 10.0;
pub const ROTATION_HANDLE_OFFSET: f64 = 20.0;

/// Maps base-image pixels onto the display: `display = offset + image * scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayMapping {
    pub offset: Vec2,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl Default for DisplayMapping {
    fn default() -> Self {
        Self::identity()
    }
}

impl DisplayMapping {
    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    pub fn new(offset_x: f64, offset_y: f64, scale_x: f64, scale_y: f64) -> Self {
        Self {
            offset: Vec2::new(offset_x, offset_y),
            scale_x,
            scale_y,
        }
    }

    /// Letterboxes an image inside a view, preserving its aspect ratio.
    pub fn fit(image_width: u32, image_height: u32, view_width: f64, view_height: f64) -> Self {
        if image_width == 0 || image_height == 0 || view_width <= 0.0 || view_height <= 0.0 {
            return Self::identity();
        }
        let image_w = image_width as f64;
        let image_h = image_height as f64;
        let scale = (view_width / image_w).min(view_height / image_h);
        Self::new(
            (view_width - image_w * scale) / 2.0,
            (view_height - image_h * scale) / 2.0,
            scale,
            scale,
        )
    }

    pub fn to_display(&self, point: Point) -> Point {
        Point::new(
            self.offset.x + point.x * self.scale_x,
            self.offset.y + point.y * self.scale_y,
        )
    }

    pub fn to_image(&self, point: Point) -> Point {
        let local = point - self.offset;
        Point::new(
            divide_or_keep(local.x, self.scale_x),
            divide_or_keep(local.y, self.scale_y),
        )
    }

    pub fn delta_to_image(&self, delta: Vec2) -> Vec2 {
        Vec2::new(
            if self.scale_x != 0.0 { delta.x / self.scale_x } else { 0.0 },
            if self.scale_y != 0.0 { delta.y / self.scale_y } else { 0.0 },
        )
    }

    fn handle_scale_y(&self) -> f64 {
        if self.scale_y > 0.001 { self.scale_y } else { 1.0 }
    }
}

fn divide_or_keep(value: f64, scale: f64) -> f64 {
    if scale != 0.0 { value / scale } else { value }
}

/// Block size in local space, never below one pixel.
fn local_rect(block: &TextBlock) -> Rect {
    let width = block.bbox.width().max(1.0);
    let height = block.bbox.height().max(1.0);
    Rect::new(-width / 2.0, -height / 2.0, width / 2.0, height / 2.0)
}

pub fn display_center(block: &TextBlock, mapping: &DisplayMapping) -> Point {
    let (x, y) = block.bbox.center();
    mapping.to_display(Point::new(x, y))
}

/// Maps block-local content space (origin at the block center) to display
/// space: `translate(display_center) * rotate(angle) * scale(sx, sy)`.
pub fn block_transform(block: &TextBlock, mapping: &DisplayMapping) -> Affine {
    Affine::translate(display_center(block, mapping).to_vec2())
        * Affine::rotate(block.angle.to_radians())
        * Affine::scale_non_uniform(mapping.scale_x, mapping.scale_y)
}

/// Corners in display space: top-left, top-right, bottom-right, bottom-left.
pub fn block_quad(block: &TextBlock, mapping: &DisplayMapping) -> [Point; 4] {
    let transform = block_transform(block, mapping);
    let rect = local_rect(block);
    Corner::ALL.map(|corner| transform * corner.of(rect))
}

pub fn hit_test(block: &TextBlock, mapping: &DisplayMapping, point: Point) -> bool {
    let quad = block_quad(block, mapping);
    let mut path = BezPath::new();
    path.move_to(quad[0]);
    for corner in &quad[1..] {
        path.line_to(*corner);
    }
    path.close_path();
    path.winding(point) != 0
}

/// Index of the topmost block under `point`; later blocks draw on top.
pub fn block_at(blocks: &[TextBlock], mapping: &DisplayMapping, point: Point) -> Option<usize> {
    blocks
        .iter()
        .rposition(|block| hit_test(block, mapping, point))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomRight,
        Corner::BottomLeft,
    ];

    pub fn opposite(self) -> Self {
        match self {
            Corner::TopLeft => Corner::BottomRight,
            Corner::TopRight => Corner::BottomLeft,
            Corner::BottomRight => Corner::TopLeft,
            Corner::BottomLeft => Corner::TopRight,
        }
    }

    fn of(self, rect: Rect) -> Point {
        match self {
            Corner::TopLeft => Point::new(rect.x0, rect.y0),
            Corner::TopRight => Point::new(rect.x1, rect.y0),
            Corner::BottomRight => Point::new(rect.x1, rect.y1),
            Corner::BottomLeft => Point::new(rect.x0, rect.y1),
        }
    }

    fn of_bbox(self, bbox: &BBox) -> Point {
        self.of(Rect::new(bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max))
    }

    fn is_left(self) -> bool {
        matches!(self, Corner::TopLeft | Corner::BottomLeft)
    }

    fn is_top(self) -> bool {
        matches!(self, Corner::TopLeft | Corner::TopRight)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    Corner(Corner),
    Rotate,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Handles {
    pub corners: [Rect; 4],
    pub rotation: Rect,
    /// Top edge midpoint, where the rotation handle's stem starts.
    pub stem_base: Point,
}

pub fn handles(block: &TextBlock, mapping: &DisplayMapping) -> Handles {
    let transform = block_transform(block, mapping);
    let rect = local_rect(block);
    let size = kurbo::Size::new(CORNER_HANDLE_SIZE, CORNER_HANDLE_SIZE);
    let corners =
        Corner::ALL.map(|corner| Rect::from_center_size(transform * corner.of(rect), size));
    let offset = ROTATION_HANDLE_OFFSET / mapping.handle_scale_y();
    let rotation_center = transform * Point::new(0.0, rect.y0 - offset);
    Handles {
        corners,
        rotation: Rect::from_center_size(rotation_center, size),
        stem_base: transform * Point::new(0.0, rect.y0),
    }
}

/// The rotation handle wins over corners when they overlap.
pub fn handle_at(block: &TextBlock, mapping: &DisplayMapping, point: Point) -> Option<Handle> {
    let handles = handles(block, mapping);
    if handles.rotation.contains(point) {
        return Some(Handle::Rotate);
    }
    Corner::ALL
        .iter()
        .zip(handles.corners.iter())
        .find(|(_, rect)| rect.contains(point))
        .map(|(corner, _)| Handle::Corner(*corner))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    Move {
        start_mouse: Point,
        start_bbox: BBox,
    },
    Resize {
        corner: Corner,
        /// Opposite corner of the pre-drag bbox, in image space.
        anchor: Point,
    },
    Rotate {
        center: Point,
        start_mouse: Point,
        start_angle: f64,
    },
}

impl Gesture {
    pub fn begin_move(block: &TextBlock, mouse: Point) -> Self {
        Gesture::Move {
            start_mouse: mouse,
            start_bbox: block.bbox,
        }
    }

    pub fn begin_resize(block: &TextBlock, corner: Corner) -> Self {
        Gesture::Resize {
            corner,
            anchor: corner.opposite().of_bbox(&block.bbox),
        }
    }

    pub fn begin_rotate(block: &TextBlock, mapping: &DisplayMapping, mouse: Point) -> Self {
        Gesture::Rotate {
            center: display_center(block, mapping),
            start_mouse: mouse,
            start_angle: block.angle,
        }
    }

    pub fn begin(
        block: &TextBlock,
        mapping: &DisplayMapping,
        handle: Option<Handle>,
        mouse: Point,
    ) -> Self {
        match handle {
            Some(Handle::Rotate) => Self::begin_rotate(block, mapping, mouse),
            Some(Handle::Corner(corner)) => Self::begin_resize(block, corner),
            None => Self::begin_move(block, mouse),
        }
    }

    /// Applies the gesture for the current display-space mouse position.
    pub fn update(&self, block: &mut TextBlock, mapping: &DisplayMapping, mouse: Point) {
        match *self {
            Gesture::Move {
                start_mouse,
                start_bbox,
            } => {
                let delta = mapping.delta_to_image(mouse - start_mouse);
                block.bbox = start_bbox.translated(delta.x, delta.y);
            }
            Gesture::Resize { corner, anchor } => {
                block.bbox = resize_bbox(corner, anchor, mapping.to_image(mouse));
            }
            Gesture::Rotate {
                center,
                start_mouse,
                start_angle,
            } => {
                block.angle = rotated_angle(center, start_mouse, mouse, start_angle);
            }
        }
    }

    /// Rotation does not change the rasterized content.
    pub fn changes_pixels(&self) -> bool {
        matches!(self, Gesture::Resize { .. })
    }
}

/// Rebuilds the bbox from the fixed anchor and the dragged corner, keeping at
/// least `MIN_BLOCK_DIM` per axis and growing away from the anchored edge.
pub fn resize_bbox(corner: Corner, anchor: Point, mouse: Point) -> BBox {
    let (mut x0, mut x1) = if corner.is_left() {
        (mouse.x, anchor.x)
    } else {
        (anchor.x, mouse.x)
    };
    let (mut y0, mut y1) = if corner.is_top() {
        (mouse.y, anchor.y)
    } else {
        (anchor.y, mouse.y)
    };
    if x0 > x1 {
        std::mem::swap(&mut x0, &mut x1);
    }
    if y0 > y1 {
        std::mem::swap(&mut y0, &mut y1);
    }
    if x1 - x0 < MIN_BLOCK_DIM {
        if corner.is_left() {
            x0 = x1 - MIN_BLOCK_DIM;
        } else {
            x1 = x0 + MIN_BLOCK_DIM;
        }
    }
    if y1 - y0 < MIN_BLOCK_DIM {
        if corner.is_top() {
            y0 = y1 - MIN_BLOCK_DIM;
        } else {
            y1 = y0 + MIN_BLOCK_DIM;
        }
    }
    BBox {
        x_min: x0,
        y_min: y0,
        x_max: x1,
        y_max: y1,
    }
}

pub fn rotated_angle(center: Point, start_mouse: Point, mouse: Point, start_angle: f64) -> f64 {
    let initial = (start_mouse - center).atan2();
    let current = (mouse - center).atan2();
    normalize_angle(start_angle + (current - initial).to_degrees())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorShape {
    Arrow,
    Move,
    PointingHand,
    Cross,
    /// `\` shaped.
    ResizeForwardDiagonal,
    /// `/` shaped.
    ResizeBackwardDiagonal,
}

/// A corner's drag axis turns with the block, so the diagonal flips between
/// 45..135 and 225..315 degrees.
pub fn resize_cursor(corner: Corner, angle: f64) -> CursorShape {
    let base_forward = matches!(corner, Corner::TopLeft | Corner::BottomRight);
    let angle = normalize_angle(angle);
    let swapped = (45.0..135.0).contains(&angle) || (225.0..315.0).contains(&angle);
    if base_forward != swapped {
        CursorShape::ResizeForwardDiagonal
    } else {
        CursorShape::ResizeBackwardDiagonal
    }
}

/// Cursor to show while hovering with no button pressed.
pub fn hover_cursor(
    blocks: &[TextBlock],
    selected: Option<usize>,
    mapping: &DisplayMapping,
    point: Point,
) -> CursorShape {
    if let Some(block) = selected.and_then(|idx| blocks.get(idx)) {
        match handle_at(block, mapping, point) {
            Some(Handle::Rotate) => return CursorShape::Cross,
            Some(Handle::Corner(corner)) => return resize_cursor(corner, block.angle),
            None => {}
        }
    }
    match block_at(blocks, mapping, point) {
        Some(idx) if Some(idx) == selected => CursorShape::Move,
        Some(_) => CursorShape::PointingHand,
        None => CursorShape::Arrow,
    }
}
