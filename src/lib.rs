use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub mod descriptor;
pub mod logging;
pub mod overlay;
pub mod session;
pub mod settings;
#[cfg(test)]
mod test_util;

pub use descriptor::{ParsedDescriptors, RejectedEntry, parse_descriptors};
pub use overlay::{Style, TextBlock};
pub use session::EditingSession;

use overlay::Typeface;
use overlay::font::{default_fallback_fonts, resolve_font};

#[derive(Debug, Clone)]
pub struct Config {
    pub image: PathBuf,
    pub blocks: PathBuf,
    pub output: PathBuf,
    pub settings_path: Option<PathBuf>,
    /// Font file path or family name; overrides the settings.
    pub font: Option<String>,
    pub no_auto_fit: bool,
    pub dump_blocks: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub output: PathBuf,
    pub drawn: usize,
    pub rejected: Vec<RejectedEntry>,
}

/// Loads settings and font, overlays every descriptor block on the image and
/// writes the result.
pub fn run(config: Config) -> Result<RunReport> {
    let mut style = settings::load_settings(config.settings_path.as_deref())?;
    if let Some(font) = config.font.as_deref().map(str::trim) {
        if Path::new(font).is_file() {
            style.font_path = Some(font.to_string());
        } else if !font.is_empty() {
            style.font_path = None;
            style.font_name = font.to_string();
        }
    }
    if config.no_auto_fit {
        style.auto_fit = false;
    }

    let face = load_face(&style);
    let base = image::open(&config.image)
        .with_context(|| format!("failed to decode image: {}", config.image.display()))?
        .to_rgba8();
    let json = fs::read_to_string(&config.blocks)
        .with_context(|| format!("failed to read descriptors: {}", config.blocks.display()))?;
    let parsed = parse_descriptors(&json, base.width(), base.height(), &style)?;
    info!(
        "{}x{} image, {} blocks, {} rejected",
        base.width(),
        base.height(),
        parsed.blocks.len(),
        parsed.rejected.len()
    );

    let mut session = EditingSession::new(style, face);
    session.set_blocks(parsed.blocks);
    session.export(&base, &config.output)?;

    if let Some(path) = &config.dump_blocks {
        let json = serde_json::to_string_pretty(session.blocks())
            .with_context(|| "failed to serialize blocks")?;
        fs::write(path, json)
            .with_context(|| format!("failed to write blocks: {}", path.display()))?;
    }

    let drawn = session
        .blocks()
        .iter()
        .filter(|block| block.has_text() && block.font_size_pixels > 0)
        .count();
    Ok(RunReport {
        output: config.output,
        drawn,
        rejected: parsed.rejected,
    })
}

fn load_face(style: &Style) -> Option<Box<dyn Typeface>> {
    let path = style.font_path.as_deref().map(Path::new);
    let name = Some(style.font_name.as_str()).filter(|name| !name.trim().is_empty());
    match resolve_font(path, name, default_fallback_fonts()) {
        Ok(resolved) => {
            info!("using font {}", resolved.family);
            Some(Box::new(resolved.face))
        }
        Err(err) => {
            warn!("no usable font, blocks render as placeholders: {:#}", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::with_temp_home;
    use image::{Rgba, RgbaImage};

    #[test]
    fn run_writes_the_output_and_reports_rejections() {
        with_temp_home(|home| {
            let image = home.join("page.png");
            RgbaImage::from_pixel(40, 20, Rgba([10, 20, 30, 255]))
                .save(&image)
                .unwrap();
            let blocks = home.join("blocks.json");
            fs::write(
                &blocks,
                r#"[
                    {"id": "a", "translated_text": "", "bbox_norm": [0.1, 0.1, 0.5, 0.9]},
                    {"id": "b", "translated_text": "x", "bbox_norm": [0.5, 0.1, 0.4, 0.9]}
                ]"#,
            )
            .unwrap();
            let output = home.join("out.jpg");
            let dump = home.join("dump.json");

            let report = run(Config {
                image,
                blocks,
                output: output.clone(),
                settings_path: None,
                font: None,
                no_auto_fit: true,
                dump_blocks: Some(dump.clone()),
            })
            .unwrap();

            assert_eq!(report.drawn, 0);
            assert_eq!(report.rejected.len(), 1);
            assert_eq!(report.rejected[0].index, 1);
            let written = image::open(&output).unwrap();
            assert_eq!((written.width(), written.height()), (40, 20));
            let dumped: serde_json::Value =
                serde_json::from_str(&fs::read_to_string(&dump).unwrap()).unwrap();
            assert_eq!(dumped.as_array().map(Vec::len), Some(1));
        });
    }

    #[test]
    fn unreadable_image_is_an_error() {
        with_temp_home(|home| {
            let blocks = home.join("blocks.json");
            fs::write(&blocks, "[]").unwrap();
            let err = run(Config {
                image: home.join("missing.png"),
                blocks,
                output: home.join("out.png"),
                settings_path: None,
                font: None,
                no_auto_fit: false,
                dump_blocks: None,
            })
            .unwrap_err();
            assert!(err.to_string().contains("failed to decode image"));
        });
    }
}
