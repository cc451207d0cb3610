use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::Result;
use image::RgbaImage;
use kurbo::{Affine, Point};
use tracing::{debug, info};

use crate::descriptor::apply_font_sizes;
use crate::overlay::engine::{
    CursorShape, DisplayMapping, Gesture, Handle, block_at, block_transform, fit_block,
    fit_blocks, handle_at, hover_cursor,
};
use crate::overlay::{
    BBox, BlockId, FontSizeCategory, RenderCache, Style, TextBlock, Typeface, composite_blocks,
    save_image,
};

pub const MANUAL_BLOCK_WIDTH: f64 = 150.0;
pub const MANUAL_BLOCK_HEIGHT: f64 = 50.0;
pub const MANUAL_BLOCK_TEXT: &str = "New text";

struct ActiveGesture {
    id: BlockId,
    gesture: Gesture,
}

/// Owns the blocks of one image together with their render cache. Every
/// mutation goes through this type so cache entries are evicted with it.
pub struct EditingSession {
    blocks: Vec<TextBlock>,
    cache: RenderCache,
    style: Style,
    face: Option<Box<dyn Typeface>>,
    mapping: DisplayMapping,
    selected: Option<BlockId>,
    active: Option<ActiveGesture>,
    manual_count: u64,
}

impl EditingSession {
    pub fn new(style: Style, face: Option<Box<dyn Typeface>>) -> Self {
        Self {
            blocks: Vec::new(),
            cache: RenderCache::new(),
            style,
            face,
            mapping: DisplayMapping::identity(),
            selected: None,
            active: None,
            manual_count: 0,
        }
    }

    fn face(&self) -> Option<&dyn Typeface> {
        self.face.as_deref()
    }

    pub fn blocks(&self) -> &[TextBlock] {
        &self.blocks
    }

    pub fn block(&self, id: &BlockId) -> Option<&TextBlock> {
        self.blocks.iter().find(|block| &block.id == id)
    }

    fn index_of(&self, id: &BlockId) -> Option<usize> {
        self.blocks.iter().position(|block| &block.id == id)
    }

    pub fn style(&self) -> &Style {
        &self.style
    }

    pub fn mapping(&self) -> &DisplayMapping {
        &self.mapping
    }

    pub fn set_mapping(&mut self, mapping: DisplayMapping) {
        self.mapping = mapping;
    }

    pub fn selected(&self) -> Option<&BlockId> {
        self.selected.as_ref()
    }

    /// Replaces the whole collection, fitting each block when auto-fit is on.
    pub fn set_blocks(&mut self, mut blocks: Vec<TextBlock>) {
        let fitted = fit_blocks(&mut blocks, &self.style, self.face());
        debug!("loaded {} blocks, {} refitted", blocks.len(), fitted);
        self.blocks = blocks;
        self.cache.clear();
        self.selected = None;
        self.active = None;
    }

    /// Applies `edit` to one block and evicts its cached surface.
    pub fn update_block<F>(&mut self, id: &BlockId, edit: F) -> bool
    where
        F: FnOnce(&mut TextBlock),
    {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        edit(&mut self.blocks[idx]);
        self.cache.invalidate(id);
        true
    }

    pub fn set_text(&mut self, id: &BlockId, text: &str) -> bool {
        self.update_block(id, |block| block.translated_text = text.to_string())
    }

    /// Runs the fitter on one block. Returns whether its bbox changed.
    pub fn fit(&mut self, id: &BlockId) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        let changed = fit_block(&mut self.blocks[idx], &self.style, self.face.as_deref());
        if changed {
            self.cache.invalidate(id);
        }
        changed
    }

    pub fn remove_block(&mut self, id: &BlockId) -> Option<TextBlock> {
        let idx = self.index_of(id)?;
        let removed = self.blocks.remove(idx);
        self.cache.invalidate(id);
        if self.selected.as_ref() == Some(id) {
            self.selected = None;
        }
        if self.active.as_ref().is_some_and(|active| &active.id == id) {
            self.active = None;
        }
        Some(removed)
    }

    /// Swaps in a new global style and face; pixel sizes are re-resolved and
    /// every cached surface is dropped.
    pub fn reload_style(&mut self, style: Style, face: Option<Box<dyn Typeface>>) {
        self.style = style;
        self.face = face;
        apply_font_sizes(&mut self.blocks, &self.style);
        self.cache.clear();
        info!("style reloaded for {} blocks", self.blocks.len());
    }

    /// Creates a default block centered on a display point and selects it.
    pub fn add_block_at(&mut self, display_point: Point) -> BlockId {
        let center = self.mapping.to_image(display_point);
        let id = self.next_manual_id();
        let bbox = BBox::from_center(center.x, center.y, MANUAL_BLOCK_WIDTH, MANUAL_BLOCK_HEIGHT);
        let mut block = TextBlock::new(id.clone(), MANUAL_BLOCK_TEXT, bbox);
        block.font_size_pixels = self.style.font_size_for(FontSizeCategory::Medium);
        self.blocks.push(block);
        self.selected = Some(id.clone());
        id
    }

    fn next_manual_id(&mut self) -> BlockId {
        loop {
            self.manual_count += 1;
            let id = BlockId::new(format!("manual_block_{}", self.manual_count));
            if self.index_of(&id).is_none() {
                return id;
            }
        }
    }

    /// Selects the topmost block under the point, or clears the selection.
    pub fn select_at(&mut self, display_point: Point) -> Option<&BlockId> {
        self.selected = block_at(&self.blocks, &self.mapping, display_point)
            .map(|idx| self.blocks[idx].id.clone());
        self.selected.as_ref()
    }

    pub fn cursor_at(&self, display_point: Point) -> CursorShape {
        let selected = self.selected.as_ref().and_then(|id| self.index_of(id));
        hover_cursor(&self.blocks, selected, &self.mapping, display_point)
    }

    /// Starts a gesture: a handle of the selected block resizes or rotates
    /// it, anywhere on a block selects and moves it. Returns whether a
    /// gesture started.
    pub fn press(&mut self, display_point: Point) -> bool {
        if let Some(idx) = self.selected.as_ref().and_then(|id| self.index_of(id)) {
            let block = &self.blocks[idx];
            if let Some(handle) = handle_at(block, &self.mapping, display_point) {
                self.begin(idx, Some(handle), display_point);
                return true;
            }
        }
        match block_at(&self.blocks, &self.mapping, display_point) {
            Some(idx) => {
                self.selected = Some(self.blocks[idx].id.clone());
                self.begin(idx, None, display_point);
                true
            }
            None => {
                self.selected = None;
                self.active = None;
                false
            }
        }
    }

    fn begin(&mut self, idx: usize, handle: Option<Handle>, display_point: Point) {
        let block = &self.blocks[idx];
        self.active = Some(ActiveGesture {
            id: block.id.clone(),
            gesture: Gesture::begin(block, &self.mapping, handle, display_point),
        });
    }

    pub fn drag(&mut self, display_point: Point) -> bool {
        let Some(active) = &self.active else {
            return false;
        };
        let Some(idx) = self.index_of(&active.id) else {
            return false;
        };
        active
            .gesture
            .update(&mut self.blocks[idx], &self.mapping, display_point);
        if active.gesture.changes_pixels() {
            self.cache.invalidate(&active.id);
        }
        true
    }

    pub fn release(&mut self) {
        self.active = None;
    }

    /// Cached surface for live display.
    pub fn surface(&mut self, id: &BlockId) -> Option<Arc<RgbaImage>> {
        let idx = self.index_of(id)?;
        let face = self.face.as_deref();
        Some(self.cache.get_or_render(&self.blocks[idx], &self.style, face))
    }

    /// Block-local to display transform for live display.
    pub fn transform(&self, id: &BlockId) -> Option<Affine> {
        self.block(id)
            .map(|block| block_transform(block, &self.mapping))
    }

    /// Freshly renders every block over `base`, bypassing the cache.
    pub fn render(&self, base: &RgbaImage, cancel: Option<&AtomicBool>) -> Result<RgbaImage> {
        composite_blocks(base, &self.blocks, &self.style, self.face(), cancel)
    }

    pub fn export(&self, base: &RgbaImage, path: &Path) -> Result<()> {
        let output = self.render(base, None)?;
        save_image(&output, path)?;
        info!("exported {} blocks to {}", self.blocks.len(), path.display());
        Ok(())
    }
}
