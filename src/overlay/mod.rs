pub mod block;
mod cache;
mod composite;
pub mod engine;
mod export;
pub mod font;
mod render;
pub mod style;

pub use block::{
    BBox, BlockId, FontSizeCategory, MIN_BLOCK_DIM, Orientation, Rgba, ShapeType,
    StyleOverrides, TextAlign, TextBlock,
};
pub use cache::{RenderCache, visual_hash};
pub use composite::{blend_over, composite_block, composite_blocks, placement, rotate_expanded};
pub use export::{
    encode_image, encode_image_for_mime, flatten, image_format_from_mime, image_format_from_path,
    is_opaque_format, save_image,
};
pub use font::{FontFace, ResolvedFont, Typeface, resolve_font};
pub use render::{BUBBLE_CONTENT_RATIO, MAX_OUTLINE_THICKNESS, render_block};
pub use style::{FontSizeMapping, ResolvedColors, Spacing, Style};
