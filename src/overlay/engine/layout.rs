use crate::overlay::block::Orientation;
use crate::overlay::font::Font;
use crate::overlay::style::Spacing;

/// Glyphs whose horizontal shape reads wrong when stacked in a column; they
/// are drawn turned 90 degrees clockwise in vertical text.
const VERTICAL_ROTATED: &[char] = &[
    '…', '—', '–', '-', '_', '(', ')', '[', ']', '{', '}', '<', '>', '（', '）', '【', '】',
    '《', '》', '「', '」', '『', '』', '〈', '〉', '～', '〜',
];

pub fn rotates_in_vertical(ch: char) -> bool {
    VERTICAL_ROTATED.contains(&ch)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    /// An explicit break: takes a line/column slot but draws nothing.
    ManualBreak,
}

impl Segment {
    pub fn text(&self) -> &str {
        match self {
            Segment::Text(text) => text,
            Segment::ManualBreak => "",
        }
    }

    pub fn is_manual_break(&self) -> bool {
        matches!(self, Segment::ManualBreak)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WrapSpacing {
    pub char_spacing: f32,
    /// Gap between lines, or between columns for vertical text.
    pub line_spacing: f32,
    pub manual_break_extra: f32,
}

impl From<Spacing> for WrapSpacing {
    fn from(spacing: Spacing) -> Self {
        Self {
            char_spacing: spacing.char_spacing as f32,
            line_spacing: spacing.line_spacing as f32,
            manual_break_extra: spacing.manual_break_extra as f32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WrappedText {
    pub segments: Vec<Segment>,
    /// Total extent across the stack: height of all lines, or width of all
    /// columns for vertical text.
    pub stacked_extent: f32,
    /// Advance between lines, or between characters inside a column.
    pub step: f32,
    /// Widest line, or tallest column.
    pub run_extent: f32,
}

impl WrappedText {
    /// Unpadded `(width, height)` the text needs.
    pub fn content_size(&self, orientation: Orientation) -> (f32, f32) {
        if orientation.is_vertical() {
            (self.stacked_extent, self.run_extent)
        } else {
            (self.run_extent, self.stacked_extent)
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.segments.is_empty() || self.run_extent <= 0.0 || self.stacked_extent <= 0.0
    }

    pub fn line_count(&self) -> usize {
        self.segments.len()
    }
}

/// Greedily wraps `text` so each line (or column) stays within `max_dim`
/// pixels along the wrapping axis. A single character wider than `max_dim`
/// takes a line of its own.
pub fn wrap_text(
    text: &str,
    font: &Font<'_>,
    max_dim: f32,
    orientation: Orientation,
    spacing: WrapSpacing,
) -> WrappedText {
    if text.is_empty() {
        return WrappedText::default();
    }
    let max_dim = if max_dim.is_finite() && max_dim > 0.0 {
        max_dim
    } else {
        1.0
    };

    let mut segments = Vec::new();
    for (idx, paragraph) in split_paragraphs(text).into_iter().enumerate() {
        if idx > 0 {
            segments.push(Segment::ManualBreak);
        }
        let lines = if orientation.is_vertical() {
            wrap_column(paragraph, font, max_dim, spacing)
        } else {
            wrap_line(paragraph, font, max_dim, spacing.char_spacing)
        };
        segments.extend(lines.into_iter().map(Segment::Text));
    }

    let breaks = segments.iter().filter(|seg| seg.is_manual_break()).count() as f32;
    let count = segments.len() as f32;
    if orientation.is_vertical() {
        let step = font.line_height() + spacing.char_spacing;
        let run_extent = segments
            .iter()
            .map(|seg| seg.text().chars().count() as f32 * step)
            .fold(0.0, f32::max);
        let stacked_extent = if segments.is_empty() {
            0.0
        } else {
            count * font.em_width()
                + (count - 1.0) * spacing.line_spacing
                + breaks * spacing.manual_break_extra
        };
        WrappedText {
            segments,
            stacked_extent,
            step,
            run_extent,
        }
    } else {
        let step = font.line_height() + spacing.line_spacing;
        let run_extent = segments
            .iter()
            .map(|seg| font.text_width(seg.text(), spacing.char_spacing))
            .fold(0.0, f32::max);
        let stacked_extent = count * step + breaks * spacing.manual_break_extra;
        WrappedText {
            segments,
            stacked_extent,
            step,
            run_extent,
        }
    }
}

fn split_paragraphs(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(|part| part.strip_suffix('\r').unwrap_or(part))
        .collect()
}

fn wrap_line(paragraph: &str, font: &Font<'_>, max_width: f32, char_spacing: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut width = 0.0;

    for ch in paragraph.chars() {
        let advance = font.advance(ch);
        if !current.is_empty() && width + char_spacing + advance > max_width {
            let split = if ch.is_whitespace() {
                None
            } else {
                split_at_last_space(&current)
            };
            match split {
                Some((head, tail)) => {
                    lines.push(head);
                    current = tail;
                    width = font.text_width(&current, char_spacing);
                    if !current.is_empty() && width + char_spacing + advance > max_width {
                        push_line(&mut lines, &mut current);
                        width = 0.0;
                    }
                }
                None => {
                    push_line(&mut lines, &mut current);
                    width = 0.0;
                }
            }
        }
        if current.is_empty() {
            if ch.is_whitespace() && !lines.is_empty() {
                continue;
            }
            width = advance;
        } else {
            width += char_spacing + advance;
        }
        current.push(ch);
    }
    push_line(&mut lines, &mut current);
    lines
}

fn split_at_last_space(current: &str) -> Option<(String, String)> {
    let split = current.rfind(' ')?;
    let head = current[..split].trim_end();
    if head.is_empty() {
        return None;
    }
    let tail = current[split..].trim_start();
    Some((head.to_string(), tail.to_string()))
}

fn push_line(lines: &mut Vec<String>, current: &mut String) {
    let line = current.trim_end();
    if !line.is_empty() {
        lines.push(line.to_string());
    }
    current.clear();
}

fn wrap_column(
    paragraph: &str,
    font: &Font<'_>,
    max_height: f32,
    spacing: WrapSpacing,
) -> Vec<String> {
    let step = font.line_height() + spacing.char_spacing;
    let mut columns = Vec::new();
    let mut current = String::new();
    let mut count = 0usize;

    for ch in paragraph.chars() {
        if count > 0 && (count + 1) as f32 * step > max_height {
            push_line(&mut columns, &mut current);
            count = 0;
        }
        if count == 0 && ch.is_whitespace() && !columns.is_empty() {
            continue;
        }
        current.push(ch);
        count += 1;
    }
    push_line(&mut columns, &mut current);
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::BoxFace;

    fn font(face: &BoxFace) -> Font<'_> {
        Font::new(face, 20.0)
    }

    #[test]
    fn empty_text_yields_nothing() {
        let face = BoxFace::default();
        let wrapped = wrap_text(
            "",
            &font(&face),
            40.0,
            Orientation::Horizontal,
            WrapSpacing::default(),
        );
        assert!(wrapped.segments.is_empty());
        assert_eq!(wrapped.stacked_extent, 0.0);
        assert_eq!(wrapped.run_extent, 0.0);
        assert!(wrapped.is_degenerate());
    }

    #[test]
    fn hello_wraps_into_forty_pixel_lines() {
        let face = BoxFace::default();
        let font = font(&face);
        let wrapped = wrap_text(
            "Hello",
            &font,
            40.0,
            Orientation::Horizontal,
            WrapSpacing::default(),
        );
        let texts: Vec<&str> = wrapped.segments.iter().map(Segment::text).collect();
        assert_eq!(texts, vec!["Hell", "o"]);
        let total = font.text_width("Hello", 0.0);
        let expected = (total / 40.0).ceil() as usize;
        assert!(wrapped.line_count().abs_diff(expected) <= 1);
        for seg in &wrapped.segments {
            assert!(font.text_width(seg.text(), 0.0) <= 40.0);
        }
        assert_eq!(wrapped.step, 20.0);
        assert_eq!(wrapped.stacked_extent, 40.0);
        assert_eq!(wrapped.run_extent, 40.0);
    }

    #[test]
    fn lines_never_exceed_max_width_except_lone_characters() {
        let face = BoxFace::default();
        let font = font(&face);
        let text = "the quick brown fox jumps over the lazy dog 一二三四五六七八九十";
        for max in [1.0, 9.0, 10.0, 25.0, 33.0, 70.0, 130.0] {
            for spacing in [0.0, 3.0] {
                let wrapped = wrap_text(
                    text,
                    &font,
                    max,
                    Orientation::Horizontal,
                    WrapSpacing {
                        char_spacing: spacing,
                        ..WrapSpacing::default()
                    },
                );
                for seg in &wrapped.segments {
                    let line = seg.text();
                    let width = font.text_width(line, spacing);
                    assert!(
                        width <= max || line.chars().count() == 1,
                        "line '{}' is {}px wide at max {}",
                        line,
                        width,
                        max
                    );
                }
            }
        }
    }

    #[test]
    fn words_move_whole_to_the_next_line() {
        let face = BoxFace::default();
        let wrapped = wrap_text(
            "ab cd ef",
            &font(&face),
            55.0,
            Orientation::Horizontal,
            WrapSpacing::default(),
        );
        let texts: Vec<&str> = wrapped.segments.iter().map(Segment::text).collect();
        assert_eq!(texts, vec!["ab cd", "ef"]);
    }

    #[test]
    fn non_positive_max_dim_is_clamped() {
        let face = BoxFace::default();
        let wrapped = wrap_text(
            "abc",
            &font(&face),
            -5.0,
            Orientation::Horizontal,
            WrapSpacing::default(),
        );
        assert_eq!(wrapped.line_count(), 3);
        assert_eq!(wrapped.run_extent, 10.0);
    }

    #[test]
    fn manual_breaks_take_a_slot_and_extra_spacing() {
        let face = BoxFace::default();
        let spacing = WrapSpacing {
            line_spacing: 2.0,
            manual_break_extra: 5.0,
            ..WrapSpacing::default()
        };
        let wrapped = wrap_text("ab\r\ncd", &font(&face), 100.0, Orientation::Horizontal, spacing);
        assert_eq!(
            wrapped.segments,
            vec![
                Segment::Text("ab".to_string()),
                Segment::ManualBreak,
                Segment::Text("cd".to_string()),
            ]
        );
        assert_eq!(wrapped.step, 22.0);
        assert_eq!(wrapped.stacked_extent, 3.0 * 22.0 + 5.0);
    }

    #[test]
    fn vertical_text_fills_columns_by_height() {
        let face = BoxFace::default();
        let font = font(&face);
        let wrapped = wrap_text(
            "一二三四五",
            &font,
            45.0,
            Orientation::VerticalRtl,
            WrapSpacing::default(),
        );
        let texts: Vec<&str> = wrapped.segments.iter().map(Segment::text).collect();
        assert_eq!(texts, vec!["一二", "三四", "五"]);
        assert_eq!(wrapped.step, 20.0);
        assert_eq!(wrapped.run_extent, 40.0);
        assert_eq!(wrapped.stacked_extent, 3.0 * font.em_width());
        assert_eq!(wrapped.content_size(Orientation::VerticalRtl), (30.0, 40.0));
    }

    #[test]
    fn vertical_column_spacing_counts_between_columns() {
        let face = BoxFace::default();
        let spacing = WrapSpacing {
            char_spacing: 5.0,
            line_spacing: 4.0,
            manual_break_extra: 0.0,
        };
        let wrapped = wrap_text("一二三", &font(&face), 50.0, Orientation::VerticalLtr, spacing);
        assert_eq!(wrapped.step, 25.0);
        assert_eq!(wrapped.line_count(), 2);
        assert_eq!(wrapped.stacked_extent, 2.0 * 10.0 + 4.0);
    }

    #[test]
    fn oversized_glyph_sits_alone() {
        let face = BoxFace::default();
        let big = Font::new(&face, 200.0);
        let wrapped = wrap_text("ab", &big, 40.0, Orientation::Horizontal, WrapSpacing::default());
        assert_eq!(wrapped.line_count(), 2);
        let columns = wrap_text("ab", &big, 40.0, Orientation::VerticalLtr, WrapSpacing::default());
        assert_eq!(columns.line_count(), 2);
    }

    #[test]
    fn bracket_and_dash_glyphs_rotate_in_columns() {
        assert!(rotates_in_vertical('…'));
        assert!(rotates_in_vertical('「'));
        assert!(rotates_in_vertical('～'));
        assert!(!rotates_in_vertical('あ'));
        assert!(!rotates_in_vertical('。'));
    }
}
