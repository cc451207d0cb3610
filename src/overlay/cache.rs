use std::collections::HashMap;
use std::sync::Arc;

use image::RgbaImage;
use serde::Serialize;
use tracing::debug;

use super::block::{BlockId, Orientation, ShapeType, TextAlign, TextBlock};
use super::font::Typeface;
use super::render::render_block;
use super::style::{ResolvedColors, Spacing, Style};

/// Everything that changes a block's pixels. Position and angle are left out:
/// the compositor applies them to the finished surface.
#[derive(Serialize)]
struct VisualKey<'a> {
    text: &'a str,
    font_size_pixels: u32,
    orientation: Orientation,
    text_align: TextAlign,
    shape_type: ShapeType,
    width: f64,
    height: f64,
    colors: ResolvedColors,
    padding: u32,
    horizontal: Spacing,
    vertical: Spacing,
    font_name: &'a str,
    font_path: Option<&'a str>,
}

pub fn visual_hash(block: &TextBlock, style: &Style) -> String {
    let key = VisualKey {
        text: &block.translated_text,
        font_size_pixels: block.font_size_pixels,
        orientation: block.orientation,
        text_align: block.text_align,
        shape_type: block.shape_type,
        width: block.bbox.width(),
        height: block.bbox.height(),
        colors: style.resolve(block),
        padding: style.padding,
        horizontal: style.horizontal,
        vertical: style.vertical,
        font_name: &style.font_name,
        font_path: style.font_path.as_deref(),
    };
    let encoded = serde_json::to_vec(&key).unwrap_or_default();
    format!("{:x}", md5::compute(&encoded))
}

struct CacheEntry {
    hash: String,
    surface: Arc<RgbaImage>,
}

/// Rasterized surfaces per block id, reused while the visual hash holds.
#[derive(Default)]
pub struct RenderCache {
    entries: HashMap<BlockId, CacheEntry>,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get_or_render(
        &mut self,
        block: &TextBlock,
        style: &Style,
        face: Option<&dyn Typeface>,
    ) -> Arc<RgbaImage> {
        let hash = visual_hash(block, style);
        if let Some(entry) = self.entries.get(&block.id) {
            if entry.hash == hash {
                return Arc::clone(&entry.surface);
            }
        }
        debug!("rendering block {}", block.id);
        let surface = Arc::new(render_block(block, style, face));
        self.entries.insert(
            block.id.clone(),
            CacheEntry {
                hash,
                surface: Arc::clone(&surface),
            },
        );
        surface
    }

    pub fn invalidate(&mut self, id: &BlockId) -> bool {
        self.entries.remove(id).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
