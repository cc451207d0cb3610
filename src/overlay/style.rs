use serde::Serialize;

use super::block::{FontSizeCategory, Orientation, Rgba, TextBlock};

/// Spacing for one orientation. For vertical text `line_spacing` is the gap
/// between columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Spacing {
    pub char_spacing: i32,
    pub line_spacing: i32,
    pub manual_break_extra: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FontSizeMapping {
    pub very_small: u32,
    pub small: u32,
    pub medium: u32,
    pub large: u32,
    pub very_large: u32,
}

impl Default for FontSizeMapping {
    fn default() -> Self {
        Self {
            very_small: 12,
            small: 16,
            medium: 22,
            large: 28,
            very_large: 36,
        }
    }
}

impl FontSizeMapping {
    pub fn pixels(&self, category: FontSizeCategory) -> u32 {
        match category {
            FontSizeCategory::VerySmall => self.very_small,
            FontSizeCategory::Small => self.small,
            FontSizeCategory::Medium => self.medium,
            FontSizeCategory::Large => self.large,
            FontSizeCategory::VeryLarge => self.very_large,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Style {
    pub font_name: String,
    pub font_path: Option<String>,
    pub main_color: Rgba,
    pub outline_color: Rgba,
    pub background_color: Rgba,
    pub outline_thickness: u32,
    pub padding: u32,
    pub horizontal: Spacing,
    pub vertical: Spacing,
    pub auto_fit: bool,
    pub fixed_font_size: u32,
    pub font_sizes: FontSizeMapping,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            font_name: "msyh.ttc".to_string(),
            font_path: None,
            main_color: Rgba::WHITE,
            outline_color: Rgba::BLACK,
            background_color: Rgba([0, 0, 0, 128]),
            outline_thickness: 2,
            padding: 3,
            horizontal: Spacing::default(),
            vertical: Spacing::default(),
            auto_fit: true,
            fixed_font_size: 0,
            font_sizes: FontSizeMapping::default(),
        }
    }
}

impl Style {
    pub fn spacing(&self, orientation: Orientation) -> Spacing {
        if orientation.is_vertical() {
            self.vertical
        } else {
            self.horizontal
        }
    }

    /// Fixed override wins over the category mapping when set.
    pub fn font_size_for(&self, category: FontSizeCategory) -> u32 {
        if self.fixed_font_size > 0 {
            self.fixed_font_size
        } else {
            self.font_sizes.pixels(category)
        }
    }

    pub fn resolve(&self, block: &TextBlock) -> ResolvedColors {
        let overrides = &block.overrides;
        ResolvedColors {
            main: overrides.main_color.unwrap_or(self.main_color),
            outline: overrides.outline_color.unwrap_or(self.outline_color),
            background: overrides.background_color.unwrap_or(self.background_color),
            outline_thickness: overrides
                .outline_thickness
                .unwrap_or(self.outline_thickness),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedColors {
    pub main: Rgba,
    pub outline: Rgba,
    pub background: Rgba,
    pub outline_thickness: u32,
}

impl ResolvedColors {
    pub fn draws_outline(&self) -> bool {
        self.outline_thickness > 0 && self.outline.is_visible()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::block::{BBox, StyleOverrides};

    #[test]
    fn overrides_take_precedence_over_defaults() {
        let style = Style::default();
        let mut block = TextBlock::new("a", "text", BBox::new(0.0, 0.0, 10.0, 10.0).unwrap());
        let resolved = style.resolve(&block);
        assert_eq!(resolved.main, Rgba::WHITE);
        assert_eq!(resolved.outline_thickness, 2);

        block.overrides = StyleOverrides {
            main_color: Some(Rgba([255, 0, 0, 255])),
            outline_thickness: Some(0),
            ..StyleOverrides::default()
        };
        let resolved = style.resolve(&block);
        assert_eq!(resolved.main, Rgba([255, 0, 0, 255]));
        assert_eq!(resolved.background, Rgba([0, 0, 0, 128]));
        assert!(!resolved.draws_outline());
    }

    #[test]
    fn fixed_font_size_overrides_category_mapping() {
        let mut style = Style::default();
        assert_eq!(style.font_size_for(FontSizeCategory::Large), 28);
        style.fixed_font_size = 40;
        assert_eq!(style.font_size_for(FontSizeCategory::VerySmall), 40);
    }
}
