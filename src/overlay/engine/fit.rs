use tracing::debug;

use super::layout::{WrapSpacing, wrap_text};
use crate::overlay::BUBBLE_CONTENT_RATIO;
use crate::overlay::block::{BBox, MIN_BLOCK_DIM, ShapeType, TextBlock};
use crate::overlay::font::{Font, Typeface};
use crate::overlay::style::Style;

/// Resizes `block.bbox` around its center so the wrapped text fits inside the
/// padded content box, or inside the shrunken bubble area for bubbles.
/// Returns whether the bbox was changed.
pub fn fit_block(block: &mut TextBlock, style: &Style, face: Option<&dyn Typeface>) -> bool {
    if !style.auto_fit || !block.has_text() {
        return false;
    }
    let Some(face) = face else {
        return false;
    };
    let font = Font::new(face, block.font_size_pixels as f32);
    let padding = style.padding as f64;
    let ratio = content_ratio(block.shape_type);
    let content_w = ((block.bbox.width() - 2.0 * padding).max(1.0) * ratio)
        .floor()
        .max(1.0);
    let content_h = ((block.bbox.height() - 2.0 * padding).max(1.0) * ratio)
        .floor()
        .max(1.0);
    let max_dim = if block.orientation.is_vertical() {
        content_h
    } else {
        content_w
    };
    let wrapped = wrap_text(
        &block.translated_text,
        &font,
        max_dim as f32,
        block.orientation,
        WrapSpacing::from(style.spacing(block.orientation)),
    );
    let (needed_w, needed_h) = wrapped.content_size(block.orientation);
    if needed_w <= 0.0 || needed_h <= 0.0 {
        debug!(
            "fit skipped for block {}: measured {}x{}",
            block.id, needed_w, needed_h
        );
        return false;
    }

    let width = (padded_extent(needed_w, ratio) + 2.0 * padding)
        .ceil()
        .max(MIN_BLOCK_DIM);
    let height = (padded_extent(needed_h, ratio) + 2.0 * padding)
        .ceil()
        .max(MIN_BLOCK_DIM);
    let (center_x, center_y) = block.bbox.center();
    let fitted = BBox::from_center(center_x, center_y, width, height);
    if fitted == block.bbox {
        return false;
    }
    block.bbox = fitted;
    true
}

fn content_ratio(shape: ShapeType) -> f64 {
    match shape {
        ShapeType::Box => 1.0,
        ShapeType::Bubble => BUBBLE_CONTENT_RATIO as f64,
    }
}

/// Padded extent whose floored `ratio` share still holds `needed` pixels.
fn padded_extent(needed: f32, ratio: f64) -> f64 {
    if ratio < 1.0 {
        ((needed as f64).ceil() / ratio).ceil()
    } else {
        needed as f64
    }
}

pub fn fit_blocks(blocks: &mut [TextBlock], style: &Style, face: Option<&dyn Typeface>) -> usize {
    let mut changed = 0;
    for block in blocks.iter_mut() {
        if fit_block(block, style, face) {
            changed += 1;
        }
    }
    changed
}
