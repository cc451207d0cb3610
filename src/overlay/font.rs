use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use tiny_skia::PathBuilder;
use ttf_parser::{Face, OutlineBuilder, name_id};
use tracing::debug;
use usvg::fontdb;

/// Unit-space metrics and outlines of a face. Scaled to pixels by [`Font`].
pub trait Typeface {
    fn family(&self) -> Option<&str>;
    fn units_per_em(&self) -> u16;
    fn ascender(&self) -> i16;
    fn descender(&self) -> i16;
    fn advance(&self, ch: char) -> u16;
    fn outline(&self, ch: char, builder: &mut dyn OutlineBuilder) -> Option<ttf_parser::Rect>;
}

#[derive(Clone)]
pub struct FontFace {
    data: Arc<Vec<u8>>,
    face_index: u32,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    space_advance: u16,
    family: Option<String>,
}

impl FontFace {
    fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.data, self.face_index).ok()
    }
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontFace")
            .field("family", &self.family)
            .field("face_index", &self.face_index)
            .field("units_per_em", &self.units_per_em)
            .finish()
    }
}

impl Typeface for FontFace {
    fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    fn ascender(&self) -> i16 {
        self.ascender
    }

    fn descender(&self) -> i16 {
        self.descender
    }

    fn advance(&self, ch: char) -> u16 {
        if ch.is_control() {
            return 0;
        }
        let Some(face) = self.face() else {
            return self.space_advance;
        };
        face.glyph_index(ch)
            .and_then(|glyph| face.glyph_hor_advance(glyph))
            .unwrap_or(self.space_advance)
    }

    fn outline(&self, ch: char, builder: &mut dyn OutlineBuilder) -> Option<ttf_parser::Rect> {
        let face = self.face()?;
        let glyph = face.glyph_index(ch)?;
        face.outline_glyph(glyph, builder)
    }
}

/// A typeface at a pixel size. Drawing positions are the top of the line box,
/// with the baseline `ascent()` pixels below.
#[derive(Clone, Copy)]
pub struct Font<'a> {
    face: &'a dyn Typeface,
    px: f32,
}

impl<'a> Font<'a> {
    pub fn new(face: &'a dyn Typeface, px: f32) -> Self {
        Self {
            face,
            px: px.max(1.0),
        }
    }

    pub fn px(&self) -> f32 {
        self.px
    }

    fn scale(&self) -> f32 {
        self.px / self.face.units_per_em().max(1) as f32
    }

    pub fn advance(&self, ch: char) -> f32 {
        self.face.advance(ch) as f32 * self.scale()
    }

    /// Width of a run with `char_spacing` inserted between characters.
    pub fn text_width(&self, text: &str, char_spacing: f32) -> f32 {
        let mut width = 0.0;
        let mut count = 0usize;
        for ch in text.chars() {
            width += self.advance(ch);
            count += 1;
        }
        if count > 1 {
            width += char_spacing * (count - 1) as f32;
        }
        width
    }

    pub fn ascent(&self) -> f32 {
        self.face.ascender() as f32 * self.scale()
    }

    pub fn line_height(&self) -> f32 {
        let units = self.face.ascender() as i32 - self.face.descender() as i32;
        if units > 0 {
            units as f32 * self.scale()
        } else {
            self.px
        }
    }

    /// Column width for vertical text.
    pub fn em_width(&self) -> f32 {
        let width = self.advance('M');
        if width > 0.0 { width } else { self.px }
    }

    pub fn glyph_path(&self, ch: char) -> Option<tiny_skia::Path> {
        let mut builder = PathBuilder::new();
        self.append_glyph(&mut builder, ch, 0.0);
        builder.finish()
    }

    /// Outlines of `text` laid out from x = 0, each character advanced
    /// individually so that `char_spacing` applies between them.
    pub fn glyph_run(&self, text: &str, char_spacing: f32) -> Option<tiny_skia::Path> {
        let mut builder = PathBuilder::new();
        let mut x = 0.0;
        for ch in text.chars() {
            self.append_glyph(&mut builder, ch, x);
            x += self.advance(ch) + char_spacing;
        }
        builder.finish()
    }

    fn append_glyph(&self, builder: &mut PathBuilder, ch: char, x: f32) {
        let mut sink = OutlineSink {
            builder,
            scale: self.scale(),
            origin_x: x,
            baseline: self.ascent(),
        };
        self.face.outline(ch, &mut sink);
    }
}

struct OutlineSink<'b> {
    builder: &'b mut PathBuilder,
    scale: f32,
    origin_x: f32,
    baseline: f32,
}

impl OutlineSink<'_> {
    fn x(&self, x: f32) -> f32 {
        self.origin_x + x * self.scale
    }

    fn y(&self, y: f32) -> f32 {
        self.baseline - y * self.scale
    }
}

impl OutlineBuilder for OutlineSink<'_> {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = (self.x(x), self.y(y));
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = (self.x(x), self.y(y));
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1, x, y) = (self.x(x1), self.y(y1), self.x(x), self.y(y));
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = (self.x(x1), self.y(y1));
        let (x2, y2) = (self.x(x2), self.y(y2));
        let (x, y) = (self.x(x), self.y(y));
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

pub fn load_font_face(path: &Path) -> Result<FontFace> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    load_font_face_from_data(data, None)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

pub struct ResolvedFont {
    pub face: FontFace,
    pub family: String,
}

/// Resolves the overlay font from an explicit path, a font file name known to
/// the system font database, a family name, and finally the fallbacks.
pub fn resolve_font(
    font_path: Option<&Path>,
    font_name: Option<&str>,
    fallback: &[&str],
) -> Result<ResolvedFont> {
    if let Some(path) = font_path {
        let face = load_font_face(path)?;
        let family = face
            .family
            .clone()
            .or_else(|| font_name.map(|name| name.to_string()))
            .unwrap_or_else(|| "sans-serif".to_string());
        return Ok(ResolvedFont { face, family });
    }

    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    debug!("font database holds {} faces", db.len());

    if let Some(name) = font_name.map(str::trim).filter(|name| !name.is_empty()) {
        let attempt = if looks_like_font_file(name) {
            load_font_face_from_file_name(&db, name)
        } else {
            load_font_face_from_family(&db, name)
        };
        match attempt {
            Ok(resolved) => return Ok(resolved),
            Err(err) => debug!("font '{}' unavailable: {}", name, err),
        }
    }

    for candidate in fallback {
        if let Ok(resolved) = load_font_face_from_family(&db, candidate) {
            return Ok(resolved);
        }
    }

    Err(anyhow!("no fallback fonts found"))
}

#[cfg(target_os = "macos")]
pub fn default_fallback_fonts() -> &'static [&'static str] {
    &["Hiragino Sans", "PingFang SC", "NotoSansCJK", "sans-serif"]
}

#[cfg(target_os = "windows")]
pub fn default_fallback_fonts() -> &'static [&'static str] {
    &["Microsoft YaHei", "Arial Unicode", "sans-serif"]
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub fn default_fallback_fonts() -> &'static [&'static str] {
    &["Noto Sans CJK SC", "NotoSans", "DejaVu Sans", "sans-serif"]
}

fn looks_like_font_file(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    [".ttf", ".ttc", ".otf", ".otc"]
        .iter()
        .any(|ext| lower.ends_with(ext))
}

fn load_font_face_from_data(data: Vec<u8>, preferred_family: Option<&str>) -> Result<FontFace> {
    let data = Arc::new(data);
    let mut fallback = None;
    let count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
    for index in 0..count {
        let Some(face) = build_face(&data, index) else {
            continue;
        };
        if let (Some(preferred), Some(found)) = (preferred_family, face.family.as_deref()) {
            if found.eq_ignore_ascii_case(preferred) {
                return Ok(face);
            }
        }
        if fallback.is_none() {
            fallback = Some(face);
        }
    }
    fallback.ok_or_else(|| anyhow!("failed to parse font data"))
}

fn build_face(data: &Arc<Vec<u8>>, index: u32) -> Option<FontFace> {
    let face = Face::parse(data, index).ok()?;
    let units_per_em = face.units_per_em().max(1);
    let space_advance = face
        .glyph_index(' ')
        .and_then(|id| face.glyph_hor_advance(id))
        .unwrap_or(units_per_em / 2);
    Some(FontFace {
        data: Arc::clone(data),
        face_index: index,
        units_per_em,
        ascender: face.ascender(),
        descender: face.descender(),
        space_advance,
        family: extract_family_name(&face),
    })
}

fn load_font_face_from_file_name(db: &fontdb::Database, file_name: &str) -> Result<ResolvedFont> {
    let id = db
        .faces()
        .find(|info| match &info.source {
            fontdb::Source::File(path) => path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.eq_ignore_ascii_case(file_name)),
            _ => false,
        })
        .map(|info| info.id)
        .ok_or_else(|| anyhow!("font file not found: {}", file_name))?;
    load_from_database(db, id, file_name)
}

fn load_font_face_from_family(db: &fontdb::Database, family: &str) -> Result<ResolvedFont> {
    let is_sans = family.eq_ignore_ascii_case("sans-serif");
    let families = if is_sans {
        vec![fontdb::Family::SansSerif]
    } else {
        vec![fontdb::Family::Name(family)]
    };
    let query = fontdb::Query {
        families: &families,
        ..Default::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| anyhow!("font not found: {}", family))?;
    load_from_database(db, id, family)
}

fn load_from_database(db: &fontdb::Database, id: fontdb::ID, label: &str) -> Result<ResolvedFont> {
    let (data, face_index) = db
        .with_face_data(id, |data, index| (data.to_vec(), index))
        .ok_or_else(|| anyhow!("failed to load font data: {}", label))?;
    let data = Arc::new(data);
    let face = build_face(&data, face_index)
        .ok_or_else(|| anyhow!("failed to parse font data: {}", label))?;
    let family = face
        .family
        .clone()
        .unwrap_or_else(|| label.to_string());
    Ok(ResolvedFont { face, family })
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}
