use std::collections::HashSet;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::overlay::{
    BBox, BlockId, FontSizeCategory, Orientation, Rgba, ShapeType, Style, TextAlign, TextBlock,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedEntry {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedDescriptors {
    pub blocks: Vec<TextBlock>,
    pub rejected: Vec<RejectedEntry>,
}

/// Parses a block descriptor document into pixel-space blocks for an image
/// of the given size. Malformed entries are collected in `rejected`; only an
/// unreadable document is an error.
pub fn parse_descriptors(
    json: &str,
    image_width: u32,
    image_height: u32,
    style: &Style,
) -> Result<ParsedDescriptors> {
    let value: Value =
        serde_json::from_str(json).with_context(|| "failed to parse block descriptors")?;
    let entries =
        descriptor_entries(&value).ok_or_else(|| anyhow!("no block list found in descriptors"))?;

    let mut parsed = ParsedDescriptors::default();
    let mut seen = HashSet::new();
    for (index, entry) in entries.iter().enumerate() {
        match parse_entry(index, entry, image_width, image_height, style) {
            Ok(block) if !seen.insert(block.id.clone()) => {
                reject(&mut parsed, index, format!("duplicate id '{}'", block.id));
            }
            Ok(block) => parsed.blocks.push(block),
            Err(err) => reject(&mut parsed, index, err.to_string()),
        }
    }
    Ok(parsed)
}

fn reject(parsed: &mut ParsedDescriptors, index: usize, reason: String) {
    warn!("skipping block descriptor {}: {}", index, reason);
    parsed.rejected.push(RejectedEntry { index, reason });
}

/// The entry list: a top-level array, or an object holding it under
/// `blocks`, `text_blocks`, or else its first array value.
pub fn descriptor_entries(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(map) => ["blocks", "text_blocks"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .or_else(|| map.values().find_map(Value::as_array)),
        _ => None,
    }
}

pub fn parse_entry(
    index: usize,
    entry: &Value,
    image_width: u32,
    image_height: u32,
    style: &Style,
) -> Result<TextBlock> {
    let map = entry
        .as_object()
        .ok_or_else(|| anyhow!("entry is not an object"))?;
    let translated_text = map
        .get("translated_text")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("missing translated_text"))?;
    let norm = parse_bbox_norm(map.get("bbox_norm"))?;
    let bbox = BBox::denormalize(norm, image_width, image_height)?;

    let id = match map.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => BlockId::new(id.trim()),
        Some(Value::Number(id)) => BlockId::new(id.to_string()),
        _ => BlockId::new(format!("block_{}", index)),
    };
    let orientation = tag(map, "orientation")
        .and_then(Orientation::parse)
        .unwrap_or_default();
    let category = tag(map, "font_size_category")
        .and_then(FontSizeCategory::parse)
        .unwrap_or_default();

    let mut block = TextBlock::new(id, translated_text, bbox).with_orientation(orientation);
    block.original_text = tag(map, "original_text").unwrap_or_default().to_string();
    if let Some(align) = tag(map, "text_align").and_then(TextAlign::parse) {
        block.text_align = align;
    }
    block.shape_type = tag(map, "shape_type")
        .and_then(ShapeType::parse)
        .unwrap_or_default();
    block.font_size_category = category;
    block.font_size_pixels = style.font_size_for(category);
    if let Some(angle) = map.get("angle").and_then(Value::as_f64) {
        if angle.is_finite() {
            block.angle = angle;
        }
    }
    block.overrides.main_color = color_field(&block.id, map, "main_color");
    block.overrides.outline_color = color_field(&block.id, map, "outline_color");
    block.overrides.background_color = color_field(&block.id, map, "background_color");
    block.overrides.outline_thickness = map
        .get("outline_thickness")
        .and_then(Value::as_u64)
        .map(|value| value.min(u32::MAX as u64) as u32);
    Ok(block)
}

fn tag<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}

fn parse_bbox_norm(value: Option<&Value>) -> Result<[f64; 4]> {
    let items = value
        .ok_or_else(|| anyhow!("missing bbox_norm"))?
        .as_array()
        .ok_or_else(|| anyhow!("bbox_norm is not an array"))?;
    if items.len() != 4 {
        return Err(anyhow!(
            "bbox_norm must have 4 values, got {}",
            items.len()
        ));
    }
    let mut norm = [0.0; 4];
    for (slot, item) in norm.iter_mut().zip(items) {
        let value = item
            .as_f64()
            .ok_or_else(|| anyhow!("bbox_norm values must be numbers"))?;
        if !(0.0..=1.0).contains(&value) {
            return Err(anyhow!("bbox_norm value {} is outside [0, 1]", value));
        }
        *slot = value;
    }
    if norm[2] <= norm[0] || norm[3] <= norm[1] {
        return Err(anyhow!("bbox_norm must be increasing: {:?}", norm));
    }
    Ok(norm)
}

/// Accepts `"R,G,B[,A]"` strings or 3/4-element arrays. Bad values are
/// dropped with a warning rather than rejecting the block.
fn color_field(id: &BlockId, map: &Map<String, Value>, key: &str) -> Option<Rgba> {
    let value = map.get(key)?;
    let parsed = match value {
        Value::Null => return None,
        Value::String(text) => Rgba::parse(text),
        Value::Array(items) => {
            let joined = items
                .iter()
                .map(|item| item.to_string())
                .collect::<Vec<_>>()
                .join(",");
            Rgba::parse(&joined)
        }
        other => Err(anyhow!("unsupported color value {}", other)),
    };
    match parsed {
        Ok(color) => Some(color),
        Err(err) => {
            warn!("block {}: ignoring {}: {}", id, key, err);
            None
        }
    }
}

/// Re-resolves pixel sizes from categories, e.g. after the mapping or the
/// fixed override changed.
pub fn apply_font_sizes(blocks: &mut [TextBlock], style: &Style) {
    for block in blocks {
        block.font_size_pixels = style.font_size_for(block.font_size_category);
    }
}
