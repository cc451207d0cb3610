mod fit;
mod geom;
mod layout;

pub use fit::{fit_block, fit_blocks};
pub use geom::{
    CORNER_HANDLE_SIZE, Corner, CursorShape, DisplayMapping, Gesture, Handle, Handles,
    ROTATION_HANDLE_OFFSET, block_at, block_quad, block_transform, display_center, handle_at,
    handles, hit_test, hover_cursor, resize_bbox, resize_cursor, rotated_angle,
};
pub use layout::{Segment, WrapSpacing, WrappedText, rotates_in_vertical, wrap_text};
