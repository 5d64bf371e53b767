use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::geometry::Size;

/// Font weight/slant requested from the host text API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FontStyle {
    #[default]
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

/// Font request passed to the metrics provider and carried by glyph runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontSpec {
    pub family: String,
    pub size_pt: f32,
    #[serde(default)]
    pub style: FontStyle,
}

impl FontSpec {
    pub fn new(family: impl Into<String>, size_pt: f32) -> Self {
        Self {
            family: family.into(),
            size_pt,
            style: FontStyle::Regular,
        }
    }

    pub fn with_style(mut self, style: FontStyle) -> Self {
        self.style = style;
        self
    }

    pub fn monospace(size_pt: f32) -> Self {
        Self::new("monospace", size_pt)
    }

    pub fn sans_serif(size_pt: f32) -> Self {
        Self::new("sans-serif", size_pt)
    }
}

impl Default for FontSpec {
    fn default() -> Self {
        Self::monospace(8.0)
    }
}

/// Answer to a single "lay this text out in that box" query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Rendered size of the text at the requested width.
    pub size: Size,
    /// Characters placed on the lines that fit inside the box height.
    pub chars_fitted: usize,
    /// Visual lines the text needs at the box width, regardless of the box height.
    pub lines_filled: usize,
}

impl Measurement {
    /// The text does not fit on a single visual line.
    pub fn wraps(&self) -> bool {
        self.lines_filled > 1
    }
}

/// Host text-measurement API consumed by reflow and header/footer layout.
///
/// Implementations must answer concurrent read-only queries; reflows of different
/// documents may share one provider across worker threads.
pub trait MetricsProvider: Send + Sync {
    fn measure(&self, text: &str, font: &FontSpec, bounds: Size) -> Measurement;

    fn line_height(&self, font: &FontSpec) -> f32;

    /// Width of `text` on a single unbounded line.
    fn text_width(&self, text: &str, font: &FontSpec) -> f32 {
        self.measure(text, font, Size::new(f32::INFINITY, f32::INFINITY))
            .size
            .width
    }
}

/// Deterministic metrics driven by a per-character advance table.
///
/// Advances are expressed as a fraction of the font size, so one table serves every
/// point size. Wrapping happens at character boundaries.
#[derive(Debug, Clone)]
pub struct AdvanceTableMetrics {
    default_advance: f32,
    overrides: HashMap<char, f32>,
    line_spacing: f32,
}

impl AdvanceTableMetrics {
    pub fn new(default_advance: f32, line_spacing: f32) -> Self {
        Self {
            default_advance,
            overrides: HashMap::new(),
            line_spacing,
        }
    }

    /// Fixed pitch: every glyph advances 0.5em, lines are 1.25em apart.
    pub fn monospace() -> Self {
        Self::new(0.5, 1.25)
    }

    /// A rough proportional face: narrow punctuation and `i`/`l`, wide `m`/`w`/capitals.
    pub fn proportional() -> Self {
        let mut metrics = Self::new(0.5, 1.25);
        for ch in ['i', 'l', 'j', '.', ',', ':', ';', '\'', '!', '|'] {
            metrics = metrics.with_advance(ch, 0.25);
        }
        for ch in ['m', 'w', 'M', 'W'] {
            metrics = metrics.with_advance(ch, 0.875);
        }
        for ch in 'A'..='Z' {
            if !metrics.overrides.contains_key(&ch) {
                metrics = metrics.with_advance(ch, 0.625);
            }
        }
        metrics.with_advance(' ', 0.25)
    }

    pub fn with_advance(mut self, ch: char, advance: f32) -> Self {
        self.overrides.insert(ch, advance);
        self
    }

    pub fn advance(&self, ch: char, font: &FontSpec) -> f32 {
        let ratio = self
            .overrides
            .get(&ch)
            .copied()
            .unwrap_or(self.default_advance);
        ratio * font.size_pt
    }
}

impl Default for AdvanceTableMetrics {
    fn default() -> Self {
        Self::monospace()
    }
}

impl MetricsProvider for AdvanceTableMetrics {
    fn measure(&self, text: &str, font: &FontSpec, bounds: Size) -> Measurement {
        let line_height = self.line_height(font);
        let max_lines = if bounds.height.is_finite() && line_height > 0.0 {
            ((bounds.height / line_height).floor() as usize).max(1)
        } else {
            usize::MAX
        };

        let mut lines = 1usize;
        let mut line_width = 0.0f32;
        let mut widest = 0.0f32;
        let mut fitted = 0usize;
        let mut chars_on_line = 0usize;

        for ch in text.chars() {
            let advance = self.advance(ch, font);
            // Every line takes at least one glyph so overly wide glyphs still advance.
            if chars_on_line > 0 && line_width + advance > bounds.width {
                widest = widest.max(line_width);
                lines += 1;
                line_width = 0.0;
                chars_on_line = 0;
            }
            line_width += advance;
            chars_on_line += 1;
            if lines <= max_lines {
                fitted += 1;
            }
        }
        widest = widest.max(line_width);

        Measurement {
            size: Size::new(widest, line_height * lines as f32),
            chars_fitted: fitted,
            lines_filled: lines,
        }
    }

    fn line_height(&self, font: &FontSpec) -> f32 {
        font.size_pt * self.line_spacing
    }
}
