use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::overlay::{Rgba, Style};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    font: Option<FontSettings>,
    style: Option<StyleSettings>,
    horizontal: Option<HorizontalSettings>,
    vertical: Option<VerticalSettings>,
    font_size: Option<FontSizeSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct FontSettings {
    name: Option<String>,
    path: Option<String>,
    fixed_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct StyleSettings {
    main_color: Option<String>,
    outline_color: Option<String>,
    background_color: Option<String>,
    outline_thickness: Option<u32>,
    padding: Option<u32>,
    auto_fit: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct HorizontalSettings {
    char_spacing: Option<i32>,
    line_spacing: Option<i32>,
    manual_break_extra: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
struct VerticalSettings {
    char_spacing: Option<i32>,
    column_spacing: Option<i32>,
    manual_break_extra: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
struct FontSizeSettings {
    very_small: Option<u32>,
    small: Option<u32>,
    medium: Option<u32>,
    large: Option<u32>,
    very_large: Option<u32>,
}

/// Builds the global style from the embedded defaults, then the working
/// directory and home settings files, then `extra_path` if given.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Style> {
    let mut style = Style::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    merge(&mut style, parse_settings(DEFAULT_SETTINGS_TOML, "embedded settings")?);
    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed = parse_settings(&content, &path.display().to_string())?;
            merge(&mut style, parsed);
        }
    }

    Ok(style)
}

fn parse_settings(content: &str, origin: &str) -> Result<SettingsFile> {
    toml::from_str(content).with_context(|| format!("failed to parse settings: {}", origin))
}

fn merge(style: &mut Style, incoming: SettingsFile) {
    if let Some(font) = incoming.font {
        if let Some(name) = font.name {
            if !name.trim().is_empty() {
                style.font_name = name.trim().to_string();
            }
        }
        if let Some(path) = font.path {
            if !path.trim().is_empty() {
                style.font_path = Some(path.trim().to_string());
            }
        }
        if let Some(size) = font.fixed_size {
            style.fixed_font_size = size;
        }
    }
    if let Some(section) = incoming.style {
        merge_color(&mut style.main_color, section.main_color, "main_color");
        merge_color(&mut style.outline_color, section.outline_color, "outline_color");
        merge_color(
            &mut style.background_color,
            section.background_color,
            "background_color",
        );
        if let Some(thickness) = section.outline_thickness {
            style.outline_thickness = thickness;
        }
        if let Some(padding) = section.padding {
            style.padding = padding;
        }
        if let Some(auto_fit) = section.auto_fit {
            style.auto_fit = auto_fit;
        }
    }
    if let Some(horizontal) = incoming.horizontal {
        let spacing = &mut style.horizontal;
        if let Some(value) = horizontal.char_spacing {
            spacing.char_spacing = value;
        }
        if let Some(value) = horizontal.line_spacing {
            spacing.line_spacing = value;
        }
        if let Some(value) = horizontal.manual_break_extra {
            spacing.manual_break_extra = value;
        }
    }
    if let Some(vertical) = incoming.vertical {
        let spacing = &mut style.vertical;
        if let Some(value) = vertical.char_spacing {
            spacing.char_spacing = value;
        }
        if let Some(value) = vertical.column_spacing {
            spacing.line_spacing = value;
        }
        if let Some(value) = vertical.manual_break_extra {
            spacing.manual_break_extra = value;
        }
    }
    if let Some(sizes) = incoming.font_size {
        let mapping = &mut style.font_sizes;
        for (slot, value) in [
            (&mut mapping.very_small, sizes.very_small),
            (&mut mapping.small, sizes.small),
            (&mut mapping.medium, sizes.medium),
            (&mut mapping.large, sizes.large),
            (&mut mapping.very_large, sizes.very_large),
        ] {
            if let Some(value) = value {
                if value > 0 {
                    *slot = value;
                }
            }
        }
    }
}

fn merge_color(slot: &mut Rgba, value: Option<String>, key: &str) {
    let Some(value) = value else {
        return;
    };
    if value.trim().is_empty() {
        return;
    }
    match Rgba::parse(&value) {
        Ok(color) => *slot = color,
        Err(err) => warn!("keeping {} = {}: {}", key, slot, err),
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".text-overlay-rust"))
        }
    })
}
