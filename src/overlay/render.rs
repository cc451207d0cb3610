use image::RgbaImage;
use tiny_skia::{
    FillRule, FilterQuality, Paint, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke, Transform,
};
use tracing::warn;

use super::block::{Orientation, Rgba, ShapeType, TextAlign, TextBlock};
use super::engine::{Segment, WrapSpacing, WrappedText, rotates_in_vertical, wrap_text};
use super::font::{Font, Typeface};
use super::style::{ResolvedColors, Style};

/// Share of the padded content box used for wrapping inside a bubble.
pub const BUBBLE_CONTENT_RATIO: f32 = 0.75;
/// Outline stamps cost `(2t + 1)^2` fills; thicker values are capped.
pub const MAX_OUTLINE_THICKNESS: u32 = 20;

const PLACEHOLDER_FILL: Rgba = Rgba([255, 0, 0, 100]);

/// Rasterizes one block into a transparent surface of exactly its unrotated
/// bbox size. Never fails: a missing face yields a marked placeholder.
pub fn render_block(block: &TextBlock, style: &Style, face: Option<&dyn Typeface>) -> RgbaImage {
    let (width, height) = block.bbox.pixel_size();
    let Some(mut pixmap) = Pixmap::new(width, height) else {
        return RgbaImage::new(width, height);
    };
    let colors = style.resolve(block);

    if !block.has_text() {
        draw_background(&mut pixmap, block.shape_type, colors.background);
        return into_image(pixmap);
    }
    let Some(face) = face else {
        warn!("no font available for block {}, drawing placeholder", block.id);
        draw_placeholder(&mut pixmap);
        return into_image(pixmap);
    };

    let font = Font::new(face, block.font_size_pixels as f32);
    let spacing = WrapSpacing::from(style.spacing(block.orientation));
    let content = ContentBox::new(width, height, style.padding, block.shape_type);
    let max_dim = if block.orientation.is_vertical() {
        content.height
    } else {
        content.width
    };
    let mut wrapped = wrap_text(
        &block.translated_text,
        &font,
        max_dim,
        block.orientation,
        spacing,
    );
    if wrapped.is_degenerate() {
        warn!(
            "wrapping block {} produced no extent, drawing unwrapped",
            block.id
        );
        wrapped = unwrapped(&block.translated_text, &font, block.orientation, spacing);
    }

    draw_background(&mut pixmap, block.shape_type, colors.background);
    if wrapped.is_degenerate() {
        return into_image(pixmap);
    }

    let painter = GlyphPainter {
        font,
        colors,
        char_spacing: spacing.char_spacing,
    };
    let (group_width, _) = wrapped.content_size(block.orientation);
    let start_x = content.x + align_offset(block.text_align, content.width, group_width);
    if block.orientation.is_vertical() {
        draw_columns(
            &mut pixmap,
            &painter,
            &wrapped,
            block,
            start_x,
            content.y,
            group_width,
            spacing,
        );
    } else {
        draw_lines(
            &mut pixmap,
            &painter,
            &wrapped,
            block.text_align,
            start_x,
            content.y,
            group_width,
            spacing,
        );
    }
    into_image(pixmap)
}

/// Padded area the text is laid out in, in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ContentBox {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

impl ContentBox {
    fn new(width: u32, height: u32, padding: u32, shape: ShapeType) -> Self {
        let padded_w = (width as i64 - 2 * padding as i64).max(1) as f32;
        let padded_h = (height as i64 - 2 * padding as i64).max(1) as f32;
        let mut content = Self {
            x: padding as f32,
            y: padding as f32,
            width: padded_w,
            height: padded_h,
        };
        if shape == ShapeType::Bubble {
            content.width = (padded_w * BUBBLE_CONTENT_RATIO).floor().max(1.0);
            content.height = (padded_h * BUBBLE_CONTENT_RATIO).floor().max(1.0);
            content.x += (padded_w - content.width) / 2.0;
            content.y += (padded_h - content.height) / 2.0;
        }
        content
    }
}

fn align_offset(align: TextAlign, available: f32, used: f32) -> f32 {
    match align {
        TextAlign::Left => 0.0,
        TextAlign::Center => (available - used) / 2.0,
        TextAlign::Right => available - used,
    }
}

/// The whole text as a single line or column.
fn unwrapped(
    text: &str,
    font: &Font<'_>,
    orientation: Orientation,
    spacing: WrapSpacing,
) -> WrappedText {
    let segments = vec![Segment::Text(text.to_string())];
    if orientation.is_vertical() {
        let step = font.line_height() + spacing.char_spacing;
        WrappedText {
            segments,
            stacked_extent: font.em_width(),
            step,
            run_extent: text.chars().count() as f32 * step,
        }
    } else {
        let step = font.line_height() + spacing.line_spacing;
        WrappedText {
            segments,
            stacked_extent: step,
            step,
            run_extent: font.text_width(text, spacing.char_spacing),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_lines(
    pixmap: &mut Pixmap,
    painter: &GlyphPainter<'_>,
    wrapped: &WrappedText,
    align: TextAlign,
    start_x: f32,
    start_y: f32,
    group_width: f32,
    spacing: WrapSpacing,
) {
    let mut y = start_y;
    for segment in &wrapped.segments {
        match segment {
            Segment::Text(line) => {
                let line_width = painter.font.text_width(line, spacing.char_spacing);
                let x = start_x + align_offset(align, group_width, line_width);
                painter.draw_run(pixmap, line, x, y);
                y += wrapped.step;
            }
            Segment::ManualBreak => {
                y += wrapped.step + spacing.manual_break_extra;
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_columns(
    pixmap: &mut Pixmap,
    painter: &GlyphPainter<'_>,
    wrapped: &WrappedText,
    block: &TextBlock,
    start_x: f32,
    start_y: f32,
    group_width: f32,
    spacing: WrapSpacing,
) {
    let em = painter.font.em_width();
    let rtl = block.orientation == Orientation::VerticalRtl;
    let mut column_x = if rtl {
        start_x + group_width - em
    } else {
        start_x
    };
    let last = wrapped.segments.len().saturating_sub(1);
    for (idx, segment) in wrapped.segments.iter().enumerate() {
        if let Segment::Text(column) = segment {
            let column_height = column.chars().count() as f32 * wrapped.step;
            let mut y = start_y;
            if block.text_align == TextAlign::Center {
                y += (wrapped.run_extent - column_height) / 2.0;
            }
            for ch in column.chars() {
                if rotates_in_vertical(ch) {
                    painter.draw_turned_char(
                        pixmap,
                        ch,
                        column_x + em / 2.0,
                        y + wrapped.step / 2.0,
                    );
                } else {
                    let x = column_x + (em - painter.font.advance(ch)) / 2.0;
                    let mut buf = [0u8; 4];
                    painter.draw_run(pixmap, ch.encode_utf8(&mut buf), x, y);
                }
                y += wrapped.step;
            }
        }
        if idx < last {
            let mut advance = em + spacing.line_spacing;
            if segment.is_manual_break() {
                advance += spacing.manual_break_extra;
            }
            if rtl {
                column_x -= advance;
            } else {
                column_x += advance;
            }
        }
    }
}

struct GlyphPainter<'a> {
    font: Font<'a>,
    colors: ResolvedColors,
    char_spacing: f32,
}

impl GlyphPainter<'_> {
    /// Draws `text` with its line box's top-left corner at `(x, y)`.
    fn draw_run(&self, pixmap: &mut Pixmap, text: &str, x: f32, y: f32) {
        if let Some(path) = self.font.glyph_run(text, self.char_spacing) {
            self.stamp(pixmap, &path, x, y);
        }
    }

    /// Outline passes at every offset in `[-t, t]^2` except the origin,
    /// then one pass in the main color.
    fn stamp(&self, pixmap: &mut Pixmap, path: &tiny_skia::Path, x: f32, y: f32) {
        if self.colors.draws_outline() {
            let paint = solid_paint(self.colors.outline);
            let thickness = self.colors.outline_thickness.min(MAX_OUTLINE_THICKNESS) as i32;
            for dx in -thickness..=thickness {
                for dy in -thickness..=thickness {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let transform = Transform::from_translate(x + dx as f32, y + dy as f32);
                    pixmap.fill_path(path, &paint, FillRule::Winding, transform, None);
                }
            }
        }
        let paint = solid_paint(self.colors.main);
        pixmap.fill_path(
            path,
            &paint,
            FillRule::Winding,
            Transform::from_translate(x, y),
            None,
        );
    }

    /// Draws `ch` centered in a square scratch surface, then turns the
    /// scratch 90 degrees clockwise onto the slot centered at
    /// `(center_x, center_y)`.
    fn draw_turned_char(&self, target: &mut Pixmap, ch: char, center_x: f32, center_y: f32) {
        let Some(path) = self.font.glyph_path(ch) else {
            return;
        };
        let size = (self.font.px() * 1.5) as u32;
        let Some(mut scratch) = Pixmap::new(size.max(1), size.max(1)) else {
            return;
        };
        let half = scratch.width() as f32 / 2.0;
        let bounds = path.bounds();
        let ink_center_x = (bounds.left() + bounds.right()) / 2.0;
        let ink_center_y = (bounds.top() + bounds.bottom()) / 2.0;
        self.stamp(&mut scratch, &path, half - ink_center_x, half - ink_center_y);

        let transform = Transform::from_translate(center_x - half, center_y - half)
            .pre_concat(Transform::from_rotate_at(90.0, half, half));
        let paint = PixmapPaint {
            quality: FilterQuality::Bicubic,
            ..PixmapPaint::default()
        };
        target.draw_pixmap(0, 0, scratch.as_ref(), &paint, transform, None);
    }
}

fn solid_paint(color: Rgba) -> Paint<'static> {
    let [r, g, b, a] = color.0;
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, a);
    paint.anti_alias = true;
    paint
}

fn draw_background(pixmap: &mut Pixmap, shape: ShapeType, color: Rgba) {
    if !color.is_visible() {
        return;
    }
    let Some(rect) = Rect::from_xywh(0.0, 0.0, pixmap.width() as f32, pixmap.height() as f32)
    else {
        return;
    };
    let paint = solid_paint(color);
    match shape {
        ShapeType::Box => {
            pixmap.fill_rect(rect, &paint, Transform::identity(), None);
        }
        ShapeType::Bubble => {
            if let Some(oval) = PathBuilder::from_oval(rect) {
                pixmap.fill_path(&oval, &paint, FillRule::Winding, Transform::identity(), None);
            }
        }
    }
}

/// Translucent red surface crossed in white.
fn draw_placeholder(pixmap: &mut Pixmap) {
    let width = pixmap.width() as f32;
    let height = pixmap.height() as f32;
    if let Some(rect) = Rect::from_xywh(0.0, 0.0, width, height) {
        pixmap.fill_rect(rect, &solid_paint(PLACEHOLDER_FILL), Transform::identity(), None);
    }
    let mut builder = PathBuilder::new();
    builder.move_to(0.0, 0.0);
    builder.line_to(width, height);
    builder.move_to(width, 0.0);
    builder.line_to(0.0, height);
    if let Some(cross) = builder.finish() {
        let stroke = Stroke {
            width: 2.0,
            ..Stroke::default()
        };
        pixmap.stroke_path(
            &cross,
            &solid_paint(Rgba::WHITE),
            &stroke,
            Transform::identity(),
            None,
        );
    }
}

/// Converts tiny-skia's premultiplied pixels to a straight-alpha image.
pub(crate) fn into_image(pixmap: Pixmap) -> RgbaImage {
    let mut image = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in image.pixels_mut().zip(pixmap.pixels()) {
        let color = src.demultiply();
        *dst = image::Rgba([color.red(), color.green(), color.blue(), color.alpha()]);
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::block::BBox;
    use crate::test_util::BoxFace;

    fn plain_style() -> Style {
        Style {
            background_color: Rgba::TRANSPARENT,
            outline_thickness: 0,
            ..Style::default()
        }
    }

    fn block(text: &str, bbox: [f64; 4]) -> TextBlock {
        let mut block = TextBlock::new(
            "r1",
            text,
            BBox::new(bbox[0], bbox[1], bbox[2], bbox[3]).unwrap(),
        );
        block.font_size_pixels = 20;
        block
    }

    fn alpha(image: &RgbaImage, x: u32, y: u32) -> u8 {
        image.get_pixel(x, y).0[3]
    }

    #[test]
    fn surface_matches_bbox_size() {
        let face = BoxFace::default();
        let image = render_block(
            &block("a very long line that overflows", [10.0, 10.0, 60.5, 40.9]),
            &plain_style(),
            Some(&face),
        );
        assert_eq!(image.dimensions(), (50, 30));
    }

    #[test]
    fn empty_bubble_draws_only_the_ellipse() {
        let mut target = block("", [0.0, 0.0, 100.0, 50.0]);
        target.shape_type = ShapeType::Bubble;
        let style = Style {
            background_color: Rgba([0, 0, 0, 128]),
            ..Style::default()
        };
        let image = render_block(&target, &style, None);
        assert_eq!(image.dimensions(), (100, 50));
        assert_eq!(image.get_pixel(50, 25).0, [0, 0, 0, 128]);
        assert_eq!(image.get_pixel(5, 25).0[3], 128);
        assert_eq!(alpha(&image, 0, 0), 0);
        assert_eq!(alpha(&image, 99, 49), 0);
        assert_eq!(alpha(&image, 99, 0), 0);
    }

    #[test]
    fn empty_text_without_background_is_transparent() {
        let image = render_block(&block("  ", [0.0, 0.0, 40.0, 20.0]), &plain_style(), None);
        assert!(image.pixels().all(|px| px.0[3] == 0));
    }

    #[test]
    fn missing_font_draws_placeholder() {
        let image = render_block(&block("text", [0.0, 0.0, 100.0, 50.0]), &plain_style(), None);
        assert_eq!(image.get_pixel(50, 5).0, [255, 0, 0, 100]);
        // the white cross runs through the center
        assert!(image.get_pixel(50, 25).0[1] > 200);
    }

    #[test]
    fn zero_advance_font_falls_back_to_one_line() {
        let face = BoxFace { advance: 0 };
        let mut style = plain_style();
        style.horizontal.char_spacing = 50;
        let target = block("abc", [0.0, 0.0, 40.0, 30.0]);

        let font = Font::new(&face, 20.0);
        let spacing = WrapSpacing::from(style.spacing(Orientation::Horizontal));
        let wrapped = wrap_text("abc", &font, 34.0, Orientation::Horizontal, spacing);
        assert!(wrapped.is_degenerate());
        let fallback = unwrapped("abc", &font, Orientation::Horizontal, spacing);
        assert_eq!(fallback.line_count(), 1);
        assert!(!fallback.is_degenerate());

        let image = render_block(&target, &style, Some(&face));
        // 'a' is a 2px bar centered on x = 3
        assert_eq!(image.get_pixel(3, 10).0, [255, 255, 255, 255]);
    }

    #[test]
    fn left_aligned_glyph_starts_after_padding() {
        let face = BoxFace::default();
        let image = render_block(&block("a", [0.0, 0.0, 100.0, 30.0]), &plain_style(), Some(&face));
        // ink spans x 4..12, y 5..19
        assert_eq!(image.get_pixel(8, 12).0, [255, 255, 255, 255]);
        assert_eq!(alpha(&image, 2, 12), 0);
        assert_eq!(alpha(&image, 14, 12), 0);
        assert_eq!(alpha(&image, 8, 3), 0);
    }

    #[test]
    fn right_alignment_moves_each_line() {
        let face = BoxFace::default();
        let mut target = block("a", [0.0, 0.0, 100.0, 30.0]);
        target.text_align = TextAlign::Right;
        let image = render_block(&target, &plain_style(), Some(&face));
        assert_eq!(alpha(&image, 92, 12), 255);
        assert_eq!(alpha(&image, 8, 12), 0);
    }

    #[test]
    fn centered_lines_align_individually() {
        let face = BoxFace::default();
        let style = Style {
            padding: 0,
            ..plain_style()
        };
        let mut target = block("abcd\nab", [0.0, 0.0, 40.0, 60.0]);
        target.text_align = TextAlign::Center;
        let image = render_block(&target, &style, Some(&face));
        // second line is 20px wide, centered in the 40px group, drawn after
        // the manual break slot
        assert_eq!(alpha(&image, 5, 50), 0);
        assert_eq!(alpha(&image, 15, 50), 255);
        assert_eq!(alpha(&image, 25, 50), 255);
        assert_eq!(alpha(&image, 35, 50), 0);
        assert_eq!(alpha(&image, 35, 10), 255);
    }

    #[test]
    fn outline_surrounds_the_glyph() {
        let face = BoxFace::default();
        let style = Style {
            outline_thickness: 2,
            ..plain_style()
        };
        let image = render_block(&block("a", [0.0, 0.0, 100.0, 30.0]), &style, Some(&face));
        assert_eq!(image.get_pixel(3, 12).0, [0, 0, 0, 255]);
        assert_eq!(image.get_pixel(8, 12).0, [255, 255, 255, 255]);
        assert_eq!(alpha(&image, 0, 12), 0);
    }

    #[test]
    fn block_override_wins_over_global_color() {
        let face = BoxFace::default();
        let mut target = block("a", [0.0, 0.0, 100.0, 30.0]);
        target.overrides.main_color = Some(Rgba([255, 0, 0, 255]));
        let image = render_block(&target, &plain_style(), Some(&face));
        assert_eq!(image.get_pixel(8, 12).0, [255, 0, 0, 255]);
    }

    #[test]
    fn vertical_rtl_stacks_characters_in_a_column() {
        let face = BoxFace::default();
        let style = Style {
            padding: 0,
            ..plain_style()
        };
        let target = block("ab", [0.0, 0.0, 40.0, 60.0]).with_orientation(Orientation::VerticalRtl);
        let image = render_block(&target, &style, Some(&face));
        assert_eq!(alpha(&image, 35, 10), 255);
        assert_eq!(alpha(&image, 35, 30), 255);
        assert_eq!(alpha(&image, 35, 19), 0);
        assert_eq!(alpha(&image, 5, 10), 0);
    }

    #[test]
    fn vertical_rtl_starts_from_the_right() {
        let face = BoxFace::default();
        let style = Style {
            padding: 0,
            ..plain_style()
        };
        // two 40px columns: "ab" right, "cd" left of it
        let target =
            block("abcd", [0.0, 0.0, 20.0, 40.0]).with_orientation(Orientation::VerticalRtl);
        let image = render_block(&target, &style, Some(&face));
        let mut wide = target.clone();
        wide.bbox = BBox::new(0.0, 0.0, 40.0, 40.0).unwrap();
        let image_wide = render_block(&wide, &style, Some(&face));
        assert_eq!(image.dimensions(), (20, 40));
        assert_eq!(alpha(&image_wide, 35, 10), 255);
        assert_eq!(alpha(&image_wide, 25, 10), 255);
        assert_eq!(alpha(&image_wide, 5, 10), 0);
        assert_eq!(alpha(&image, 15, 10), 255);
    }

    #[test]
    fn bracket_turns_in_vertical_text() {
        let face = BoxFace::default();
        let style = Style {
            padding: 0,
            ..plain_style()
        };
        let mut target =
            block("（", [0.0, 0.0, 60.0, 60.0]).with_orientation(Orientation::VerticalLtr);
        target.text_align = TextAlign::Center;
        let image = render_block(&target, &style, Some(&face));
        // upright ink would cover x 26..34, y 2..16; turned it covers
        // x 23..37, y 6..14
        assert!(alpha(&image, 30, 10) > 200);
        assert!(alpha(&image, 35, 10) > 100);
        assert_eq!(alpha(&image, 30, 2), 0);
    }

    #[test]
    fn bubble_shrinks_the_wrapping_box() {
        let face = BoxFace::default();
        let style = Style {
            padding: 0,
            ..plain_style()
        };
        let mut target = block("abcd", [0.0, 0.0, 40.0, 60.0]);
        let boxed = render_block(&target, &style, Some(&face));
        // the whole word fits on one line in a box
        assert_eq!(alpha(&boxed, 35, 10), 255);

        target.shape_type = ShapeType::Bubble;
        let bubble = render_block(&target, &style, Some(&face));
        // 30px content starting at x = 5: "abc" then "d" on a second line
        assert_eq!(alpha(&bubble, 10, 19), 255);
        assert_eq!(alpha(&bubble, 10, 39), 255);
        assert_eq!(alpha(&bubble, 37, 19), 0);
    }
}
