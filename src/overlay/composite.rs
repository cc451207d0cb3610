use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, bail};
use image::RgbaImage;
use tiny_skia::{FilterQuality, Pixmap, PixmapPaint, Transform};
use tracing::{debug, warn};

use super::block::TextBlock;
use super::font::Typeface;
use super::render::{into_image, render_block};
use super::style::Style;

/// Renders every block carrying text and composites it over a copy of `base`
/// in collection order, so later blocks land on top. `cancel` is polled
/// between blocks.
pub fn composite_blocks(
    base: &RgbaImage,
    blocks: &[TextBlock],
    style: &Style,
    face: Option<&dyn Typeface>,
    cancel: Option<&AtomicBool>,
) -> Result<RgbaImage> {
    if base.width() == 0 || base.height() == 0 {
        bail!("base image is empty");
    }
    let mut output = base.clone();
    let mut drawn = 0usize;
    for block in blocks {
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            bail!("rendering cancelled");
        }
        if !block.has_text() || block.font_size_pixels == 0 {
            continue;
        }
        let surface = render_block(block, style, face);
        composite_block(&mut output, block, &surface);
        drawn += 1;
    }
    debug!("composited {} of {} blocks", drawn, blocks.len());
    Ok(output)
}

/// Rotates `surface` by the block angle and blends it so its center lands on
/// the bbox center.
pub fn composite_block(base: &mut RgbaImage, block: &TextBlock, surface: &RgbaImage) {
    let angle = block.normalized_angle();
    let rotated = if angle == 0.0 {
        None
    } else {
        let rotated = rotate_expanded(surface, angle);
        if rotated.is_none() {
            warn!(
                "rotating block {} by {} failed, pasting unrotated",
                block.id, angle
            );
        }
        rotated
    };
    let layer = rotated.as_ref().unwrap_or(surface);
    let (x, y) = placement(block, layer.width(), layer.height());
    blend_over(base, layer, x, y);
}

/// Top-left corner that centers a `width` x `height` layer on the bbox.
pub fn placement(block: &TextBlock, width: u32, height: u32) -> (i64, i64) {
    let (center_x, center_y) = block.bbox.center();
    (
        (center_x - width as f64 / 2.0).round() as i64,
        (center_y - height as f64 / 2.0).round() as i64,
    )
}

/// Rotates clockwise by `angle` degrees, growing the canvas so no corner is
/// cropped.
pub fn rotate_expanded(surface: &RgbaImage, angle: f64) -> Option<RgbaImage> {
    let (width, height) = (surface.width() as f64, surface.height() as f64);
    let radians = angle.to_radians();
    let (sin, cos) = (radians.sin().abs(), radians.cos().abs());
    let out_w = expanded_dim(width * cos + height * sin);
    let out_h = expanded_dim(width * sin + height * cos);

    let source = to_pixmap(surface)?;
    let mut target = Pixmap::new(out_w, out_h)?;
    let transform = Transform::from_translate(out_w as f32 / 2.0, out_h as f32 / 2.0)
        .pre_concat(Transform::from_rotate(angle as f32))
        .pre_concat(Transform::from_translate(
            -(width as f32) / 2.0,
            -(height as f32) / 2.0,
        ));
    let paint = PixmapPaint {
        quality: FilterQuality::Bicubic,
        ..PixmapPaint::default()
    };
    target.draw_pixmap(0, 0, source.as_ref(), &paint, transform, None);
    Some(into_image(target))
}

fn expanded_dim(value: f64) -> u32 {
    ((value - 1e-6).ceil() as u32).max(1)
}

fn to_pixmap(image: &RgbaImage) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(image.width(), image.height())?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = tiny_skia::ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Some(pixmap)
}

/// Straight-alpha source-over of `layer` onto `base` at `(x, y)`, clipped to
/// the base bounds.
pub fn blend_over(base: &mut RgbaImage, layer: &RgbaImage, x: i64, y: i64) {
    let (base_w, base_h) = (base.width() as i64, base.height() as i64);
    for (lx, ly, src) in layer.enumerate_pixels() {
        let src_a = src.0[3];
        if src_a == 0 {
            continue;
        }
        let bx = x + lx as i64;
        let by = y + ly as i64;
        if bx < 0 || by < 0 || bx >= base_w || by >= base_h {
            continue;
        }
        let dst = base.get_pixel_mut(bx as u32, by as u32);
        dst.0 = over(src.0, dst.0);
    }
}

fn over(src: [u8; 4], dst: [u8; 4]) -> [u8; 4] {
    if src[3] == 255 || dst[3] == 0 {
        return src;
    }
    let sa = src[3] as f32 / 255.0;
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    let mut out = [0u8; 4];
    for channel in 0..3 {
        let value = (src[channel] as f32 * sa + dst[channel] as f32 * da * (1.0 - sa)) / out_a;
        out[channel] = value.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::block::{BBox, Rgba, StyleOverrides};
    use crate::overlay::engine::{DisplayMapping, block_transform};
    use crate::test_util::BoxFace;
    use kurbo::Point;

    /// A block whose glyphs, outline and background share one color, so its
    /// surface is a solid rectangle.
    fn solid(bbox: [f64; 4], angle: f64, color: Rgba) -> TextBlock {
        let mut block = TextBlock::new(
            "c1",
            "x",
            BBox::new(bbox[0], bbox[1], bbox[2], bbox[3]).unwrap(),
        );
        block.angle = angle;
        block.overrides = StyleOverrides {
            main_color: Some(color),
            outline_color: Some(color),
            background_color: Some(color),
            outline_thickness: Some(0),
        };
        block
    }

    fn opaque_box(bbox: [f64; 4], angle: f64) -> TextBlock {
        solid(bbox, angle, Rgba::BLACK)
    }

    fn run(
        base: &RgbaImage,
        blocks: &[TextBlock],
        cancel: Option<&AtomicBool>,
    ) -> Result<RgbaImage> {
        let face = BoxFace::default();
        composite_blocks(base, blocks, &Style::default(), Some(&face), cancel)
    }

    fn white(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, image::Rgba([255, 255, 255, 255]))
    }

    #[test]
    fn unrotated_surface_is_centered_on_the_bbox() {
        let block = opaque_box([100.0, 100.0, 200.0, 150.0], 0.0);
        assert_eq!(placement(&block, 100, 50), (100, 100));

        let output = run(&white(300, 300), &[block], None).unwrap();
        assert_eq!(output.get_pixel(100, 100).0, [0, 0, 0, 255]);
        assert_eq!(output.get_pixel(199, 149).0, [0, 0, 0, 255]);
        assert_eq!(output.get_pixel(99, 99).0, [255, 255, 255, 255]);
        assert_eq!(output.get_pixel(200, 150).0, [255, 255, 255, 255]);
    }

    #[test]
    fn rotation_expands_around_the_same_center() {
        let surface = RgbaImage::from_pixel(100, 50, image::Rgba([0, 0, 0, 255]));
        let rotated = rotate_expanded(&surface, 90.0).unwrap();
        assert_eq!(rotated.dimensions(), (50, 100));

        let block = opaque_box([100.0, 100.0, 200.0, 150.0], 90.0);
        assert_eq!(placement(&block, 50, 100), (125, 75));
        let output = run(&white(300, 300), &[block], None).unwrap();
        assert!(output.get_pixel(150, 80).0[0] < 10);
        assert!(output.get_pixel(150, 125).0[0] < 10);
        assert_eq!(output.get_pixel(110, 125).0, [255, 255, 255, 255]);
    }

    #[test]
    fn rotation_direction_matches_the_block_transform() {
        let mut surface = RgbaImage::new(100, 60);
        for y in 0..8 {
            for x in 0..8 {
                surface.put_pixel(x, y, image::Rgba([255, 0, 0, 255]));
            }
        }
        let mut block = TextBlock::new(
            "m1",
            "x",
            BBox::new(50.0, 50.0, 150.0, 110.0).unwrap(),
        );
        block.angle = 30.0;
        let mut base = white(200, 160);
        composite_block(&mut base, &block, &surface);

        // marker center in block-local coordinates
        let marker = Point::new(-46.0, -26.0);
        let landed = block_transform(&block, &DisplayMapping::identity()) * marker;
        let px = base.get_pixel(landed.x.floor() as u32, landed.y.floor() as u32).0;
        assert!(px[0] > 200 && px[1] < 60 && px[2] < 60, "{:?} at {:?}", px, landed);

        let mut mirrored = block.clone();
        mirrored.angle = -30.0;
        let wrong = block_transform(&mirrored, &DisplayMapping::identity()) * marker;
        assert_eq!(
            base.get_pixel(wrong.x.floor() as u32, wrong.y.floor() as u32).0,
            [255, 255, 255, 255]
        );
    }

    #[test]
    fn translucent_layers_blend_with_straight_alpha() {
        let mut base = white(4, 4);
        let layer = RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 0, 128]));
        blend_over(&mut base, &layer, 1, 1);
        assert_eq!(base.get_pixel(1, 1).0, [127, 127, 127, 255]);
        assert_eq!(base.get_pixel(0, 0).0, [255, 255, 255, 255]);

        let mut clear = RgbaImage::new(2, 2);
        blend_over(&mut clear, &layer, 0, 0);
        assert_eq!(clear.get_pixel(0, 0).0, [0, 0, 0, 128]);
    }

    #[test]
    fn layers_are_clipped_to_the_base() {
        let mut base = white(4, 4);
        let layer = RgbaImage::from_pixel(3, 3, image::Rgba([0, 0, 0, 255]));
        blend_over(&mut base, &layer, -2, 3);
        assert_eq!(base.get_pixel(0, 3).0, [0, 0, 0, 255]);
        assert_eq!(base.get_pixel(1, 3).0, [255, 255, 255, 255]);
    }

    #[test]
    fn compositing_is_deterministic() {
        let blocks = vec![
            opaque_box([10.0, 10.0, 60.0, 40.0], 33.0),
            opaque_box([30.0, 20.0, 80.0, 70.0], 200.0),
        ];
        let base = white(100, 100);
        let first = run(&base, &blocks, None).unwrap();
        let second = run(&base.clone(), &blocks, None).unwrap();
        assert_eq!(first.as_raw(), second.as_raw());
    }

    #[test]
    fn later_blocks_draw_on_top() {
        let red = solid([0.0, 0.0, 20.0, 20.0], 0.0, Rgba([255, 0, 0, 255]));
        let blue = solid([10.0, 10.0, 30.0, 30.0], 0.0, Rgba([0, 0, 255, 255]));
        let output = run(&white(40, 40), &[red, blue], None).unwrap();
        assert_eq!(output.get_pixel(15, 15).0, [0, 0, 255, 255]);
        assert_eq!(output.get_pixel(5, 5).0, [255, 0, 0, 255]);
    }

    #[test]
    fn cancellation_stops_between_blocks() {
        let flag = AtomicBool::new(true);
        let blocks = vec![opaque_box([0.0, 0.0, 20.0, 20.0], 0.0)];
        let err = run(&white(40, 40), &blocks, Some(&flag)).unwrap_err();
        assert_eq!(err.to_string(), "rendering cancelled");
    }

    #[test]
    fn blank_blocks_are_skipped() {
        let mut blank = opaque_box([0.0, 0.0, 20.0, 20.0], 0.0);
        blank.translated_text = "  ".to_string();
        let base = white(40, 40);
        let output = run(&base, &[blank], None).unwrap();
        assert_eq!(output.as_raw(), base.as_raw());
    }
}
