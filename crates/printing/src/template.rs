use serde::Serialize;

use crate::geometry::{Point, Rect, Size};
use crate::macros::{macro_names, substitute, MacroContext};
use crate::metrics::{FontSpec, MetricsProvider};

/// Header/footer text with `{Name[:format]}` macros and `|` or tab segment separators.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderFooterTemplate {
    pub text: String,
}

impl HeaderFooterTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Substitutes macros, then splits the result into left, center and right.
    pub fn render(&self, context: &MacroContext) -> RenderedHeaderFooter {
        RenderedHeaderFooter::split(&substitute(&self.text, context))
    }

    pub fn macros_used(&self) -> Vec<String> {
        macro_names(&self.text)
    }
}

/// Rendered header/footer strings for each alignment slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderedHeaderFooter {
    pub left: String,
    pub center: String,
    pub right: String,
}

impl RenderedHeaderFooter {
    /// Splits on the first two separators; any later separator stays in the right segment.
    pub fn split(text: &str) -> Self {
        let mut parts = text.splitn(3, ['\t', '|']);
        Self {
            left: parts.next().unwrap_or_default().to_string(),
            center: parts.next().unwrap_or_default().to_string(),
            right: parts.next().unwrap_or_default().to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty() && self.center.is_empty() && self.right.is_empty()
    }
}

/// Alignment slot of a header/footer segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Segment {
    Left,
    Center,
    Right,
}

/// Vertical placement of the text line inside its band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandAlign {
    Top,
    Bottom,
}

/// A segment after truncation, positioned in sheet coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedSegment {
    pub segment: Segment,
    pub text: String,
    pub position: Point,
    pub width: f32,
}

/// Positions the three segments inside `bounds`.
///
/// The center segment is laid out first; left and right each get half of what remains
/// and are cut to the characters that fit, then trimmed at the end.
pub fn layout_segments(
    rendered: &RenderedHeaderFooter,
    bounds: Rect,
    font: &FontSpec,
    metrics: &dyn MetricsProvider,
    align: BandAlign,
) -> Vec<PlacedSegment> {
    let line_height = metrics.line_height(font);
    let y = match align {
        BandAlign::Top => bounds.top(),
        BandAlign::Bottom => bounds.bottom() - line_height,
    };
    let mut placed = Vec::with_capacity(3);

    let center = fit(&rendered.center, bounds.width, line_height, font, metrics);
    let center_width = metrics.text_width(&center, font).min(bounds.width);
    if !center.is_empty() {
        placed.push(PlacedSegment {
            segment: Segment::Center,
            position: Point::new(bounds.left() + (bounds.width - center_width) / 2.0, y),
            width: center_width,
            text: center,
        });
    }

    let side_width = (bounds.width - center_width) / 2.0;
    let left = fit(&rendered.left, side_width, line_height, font, metrics);
    if !left.is_empty() {
        placed.push(PlacedSegment {
            segment: Segment::Left,
            position: Point::new(bounds.left(), y),
            width: metrics.text_width(&left, font),
            text: left,
        });
    }

    let right = fit(&rendered.right, side_width, line_height, font, metrics);
    if !right.is_empty() {
        let width = metrics.text_width(&right, font);
        placed.push(PlacedSegment {
            segment: Segment::Right,
            position: Point::new(bounds.right() - width, y),
            width,
            text: right,
        });
    }

    placed
}

/// Longest prefix of `text` that fits on one line of `width`, end-trimmed once cut.
fn fit(
    text: &str,
    width: f32,
    line_height: f32,
    font: &FontSpec,
    metrics: &dyn MetricsProvider,
) -> String {
    if text.is_empty() || !(width > 0.0) {
        return String::new();
    }
    let measured = metrics.measure(text, font, Size::new(width, line_height));
    if !measured.wraps() {
        return text.to_string();
    }
    let cut: String = text.chars().take(measured.chars_fitted).collect();
    cut.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::AdvanceTableMetrics;

    fn font() -> FontSpec {
        FontSpec::monospace(10.0)
    }

    #[test]
    fn render_substitutes_then_splits() {
        let template = HeaderFooterTemplate::new("{FileName}||Page {Page} of {NumPages}");
        let context = MacroContext {
            file_name: "main.rs".into(),
            page: 3,
            num_pages: 10,
            ..MacroContext::default()
        };
        let rendered = template.render(&context);
        assert_eq!(rendered.left, "main.rs");
        assert!(rendered.center.is_empty());
        assert_eq!(rendered.right, "Page 3 of 10");
        assert_eq!(template.macros_used(), vec!["FileName", "Page", "NumPages"]);
    }

    #[test]
    fn tabs_split_like_pipes_and_extras_stay_right() {
        let rendered = RenderedHeaderFooter::split("a\tb|c|d");
        assert_eq!(rendered.left, "a");
        assert_eq!(rendered.center, "b");
        assert_eq!(rendered.right, "c|d");

        let single = RenderedHeaderFooter::split("only");
        assert_eq!(single.left, "only");
        assert!(single.center.is_empty() && single.right.is_empty());
        assert!(RenderedHeaderFooter::split("").is_empty());
    }

    #[test]
    fn substituted_values_containing_separators_split_too() {
        let context = MacroContext {
            full_path: "left|right".into(),
            ..MacroContext::default()
        };
        let rendered = HeaderFooterTemplate::new("{FullPath}").render(&context);
        assert_eq!(rendered.left, "left");
        assert_eq!(rendered.center, "right");
    }

    #[test]
    fn center_has_priority_and_sides_align_to_edges() {
        let metrics = AdvanceTableMetrics::monospace();
        let rendered = RenderedHeaderFooter {
            left: "LL".into(),
            center: "CCCC".into(),
            right: "RRR".into(),
        };
        let bounds = Rect::new(10.0, 100.0, 100.0, 20.0);
        let placed = layout_segments(&rendered, bounds, &font(), &metrics, BandAlign::Top);

        assert_eq!(placed[0].segment, Segment::Center);
        assert_eq!(placed[0].position, Point::new(50.0, 100.0));
        assert_eq!(placed[1].segment, Segment::Left);
        assert_eq!(placed[1].position, Point::new(10.0, 100.0));
        assert_eq!(placed[2].segment, Segment::Right);
        assert_eq!(placed[2].position, Point::new(95.0, 100.0));
    }

    #[test]
    fn long_sides_are_truncated_and_trimmed() {
        let metrics = AdvanceTableMetrics::monospace();
        let rendered = RenderedHeaderFooter {
            left: "abcd efghijklmnop".into(),
            center: "0123456789".into(),
            right: String::new(),
        };
        // 100 wide, center takes 50, each side gets 25: five glyphs.
        let bounds = Rect::new(0.0, 0.0, 100.0, 20.0);
        let placed = layout_segments(&rendered, bounds, &font(), &metrics, BandAlign::Bottom);
        let left = placed.iter().find(|p| p.segment == Segment::Left).unwrap();
        assert_eq!(left.text, "abcd");
        assert_eq!(left.position.y, 7.5);
        assert!(left.position.x + left.width <= placed[0].position.x);
    }

    #[test]
    fn center_wider_than_the_band_leaves_no_room_for_sides() {
        let metrics = AdvanceTableMetrics::monospace();
        let rendered = RenderedHeaderFooter {
            left: "left".into(),
            center: "x".repeat(40),
            right: "right".into(),
        };
        let bounds = Rect::new(0.0, 0.0, 50.0, 20.0);
        let placed = layout_segments(&rendered, bounds, &font(), &metrics, BandAlign::Top);
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].text.chars().count(), 10);
        assert_eq!(placed[0].position.x, 0.0);
    }
}
