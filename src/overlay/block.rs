use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MIN_BLOCK_DIM: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for BlockId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Axis-aligned, unrotated content rectangle in base-image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl BBox {
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Result<Self> {
        let values = [x_min, y_min, x_max, y_max];
        if values.iter().any(|value| !value.is_finite()) {
            return Err(anyhow!("bbox has non-finite coordinates: {:?}", values));
        }
        if x_max <= x_min || y_max <= y_min {
            return Err(anyhow!(
                "bbox must satisfy x_max > x_min and y_max > y_min: {:?}",
                values
            ));
        }
        Ok(Self {
            x_min,
            y_min,
            x_max,
            y_max,
        })
    }

    pub fn from_center(center_x: f64, center_y: f64, width: f64, height: f64) -> Self {
        Self {
            x_min: center_x - width / 2.0,
            y_min: center_y - height / 2.0,
            x_max: center_x + width / 2.0,
            y_max: center_y + height / 2.0,
        }
    }

    /// Scales a `[0,1]` normalized box into pixel space.
    pub fn denormalize(norm: [f64; 4], image_width: u32, image_height: u32) -> Result<Self> {
        if image_width == 0 || image_height == 0 {
            return Err(anyhow!("image has no pixels to map the bbox onto"));
        }
        let w = image_width as f64;
        let h = image_height as f64;
        Self::new(norm[0] * w, norm[1] * h, norm[2] * w, norm[3] * h)
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self {
            x_min: self.x_min + dx,
            y_min: self.y_min + dy,
            x_max: self.x_max + dx,
            y_max: self.y_max + dy,
        }
    }

    /// Integer surface size used by the rasterizer.
    pub fn pixel_size(&self) -> (u32, u32) {
        (to_pixels(self.width()), to_pixels(self.height()))
    }
}

fn to_pixels(value: f64) -> u32 {
    if value.is_finite() && value >= 1.0 {
        value as u32
    } else {
        1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Horizontal,
    VerticalLtr,
    VerticalRtl,
}

impl Orientation {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "horizontal" => Some(Self::Horizontal),
            "vertical_ltr" => Some(Self::VerticalLtr),
            "vertical_rtl" => Some(Self::VerticalRtl),
            _ => None,
        }
    }

    pub fn is_vertical(self) -> bool {
        !matches!(self, Self::Horizontal)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Horizontal => "horizontal",
            Self::VerticalLtr => "vertical_ltr",
            Self::VerticalRtl => "vertical_rtl",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

impl TextAlign {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Self::Left),
            "center" => Some(Self::Center),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    /// Vertical columns read toward the spine, so they hug the right edge.
    pub fn default_for(orientation: Orientation) -> Self {
        match orientation {
            Orientation::Horizontal => Self::Left,
            Orientation::VerticalLtr | Orientation::VerticalRtl => Self::Right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeType {
    #[default]
    Box,
    Bubble,
}

impl ShapeType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "box" => Some(Self::Box),
            "bubble" => Some(Self::Bubble),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontSizeCategory {
    VerySmall,
    Small,
    #[default]
    Medium,
    Large,
    VeryLarge,
}

impl FontSizeCategory {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "very_small" => Some(Self::VerySmall),
            "small" => Some(Self::Small),
            "medium" => Some(Self::Medium),
            "large" => Some(Self::Large),
            "very_large" => Some(Self::VeryLarge),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba([0, 0, 0, 0]);
    pub const WHITE: Rgba = Rgba([255, 255, 255, 255]);
    pub const BLACK: Rgba = Rgba([0, 0, 0, 255]);

    /// Parses `"R,G,B"` or `"R,G,B,A"` with channels in 0..=255.
    pub fn parse(value: &str) -> Result<Self> {
        let parts = value
            .split(',')
            .map(|part| part.trim().parse::<u8>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| anyhow!("invalid color '{}': {}", value, err))?;
        match parts.as_slice() {
            [r, g, b] => Ok(Self([*r, *g, *b, 255])),
            [r, g, b, a] => Ok(Self([*r, *g, *b, *a])),
            _ => Err(anyhow!(
                "invalid color '{}': expected 3 or 4 channels",
                value
            )),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.0[3] > 0
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.0;
        write!(f, "{},{},{},{}", r, g, b, a)
    }
}

/// Per-block style; `None` means the global default applies.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StyleOverrides {
    pub main_color: Option<Rgba>,
    pub outline_color: Option<Rgba>,
    pub background_color: Option<Rgba>,
    pub outline_thickness: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub id: BlockId,
    pub original_text: String,
    pub translated_text: String,
    pub bbox: BBox,
    pub orientation: Orientation,
    pub text_align: TextAlign,
    pub font_size_category: FontSizeCategory,
    pub font_size_pixels: u32,
    pub angle: f64,
    pub shape_type: ShapeType,
    #[serde(default)]
    pub overrides: StyleOverrides,
}

impl TextBlock {
    pub fn new(id: impl Into<BlockId>, translated_text: impl Into<String>, bbox: BBox) -> Self {
        Self {
            id: id.into(),
            original_text: String::new(),
            translated_text: translated_text.into(),
            bbox,
            orientation: Orientation::Horizontal,
            text_align: TextAlign::Left,
            font_size_category: FontSizeCategory::Medium,
            font_size_pixels: 22,
            angle: 0.0,
            shape_type: ShapeType::Box,
            overrides: StyleOverrides::default(),
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self.text_align = TextAlign::default_for(orientation);
        self
    }

    pub fn has_text(&self) -> bool {
        !self.translated_text.trim().is_empty()
    }

    pub fn normalized_angle(&self) -> f64 {
        normalize_angle(self.angle)
    }
}

pub fn normalize_angle(angle: f64) -> f64 {
    let normalized = angle.rem_euclid(360.0);
    if normalized >= 360.0 { 0.0 } else { normalized }
}
