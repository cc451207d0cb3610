#[cfg(test)]
use crate::overlay::font::Typeface;

#[cfg(test)]
pub(crate) fn with_temp_home<F, R>(func: F) -> R
where
    F: FnOnce(&std::path::Path) -> R,
{
    static HOME_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
    let _guard = HOME_MUTEX.lock().unwrap_or_else(|err| err.into_inner());
    let dir = tempfile::tempdir().expect("tempdir");
    let old_home = std::env::var("HOME").ok();
    // Serialized by HOME_MUTEX.
    unsafe { std::env::set_var("HOME", dir.path()) };
    let result = func(dir.path());
    match old_home {
        Some(old) => unsafe { std::env::set_var("HOME", old) },
        None => unsafe { std::env::remove_var("HOME") },
    }
    result
}

/// Synthetic face: every visible character is a filled box, 1000 units per
/// em, so at 20px each glyph advances exactly 10px and a line is 20px tall.
#[cfg(test)]
#[derive(Debug, Clone)]
pub(crate) struct BoxFace {
    pub(crate) advance: u16,
}

#[cfg(test)]
impl Default for BoxFace {
    fn default() -> Self {
        Self { advance: 500 }
    }
}

#[cfg(test)]
impl Typeface for BoxFace {
    fn family(&self) -> Option<&str> {
        Some("Box")
    }

    fn units_per_em(&self) -> u16 {
        1000
    }

    fn ascender(&self) -> i16 {
        800
    }

    fn descender(&self) -> i16 {
        -200
    }

    fn advance(&self, ch: char) -> u16 {
        if ch.is_control() { 0 } else { self.advance }
    }

    fn outline(
        &self,
        ch: char,
        builder: &mut dyn ttf_parser::OutlineBuilder,
    ) -> Option<ttf_parser::Rect> {
        if ch.is_whitespace() || ch.is_control() {
            return None;
        }
        let right = self.advance as f32 - 50.0;
        builder.move_to(50.0, 0.0);
        builder.line_to(right, 0.0);
        builder.line_to(right, 700.0);
        builder.line_to(50.0, 700.0);
        builder.close();
        Some(ttf_parser::Rect {
            x_min: 50,
            y_min: 0,
            x_max: right as i16,
            y_max: 700,
        })
    }
}
