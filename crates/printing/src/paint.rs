use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::content::{Content, ContentError, ContentServices, Pagination};
use crate::display::{Color, DisplayCommand, PrintDisplayList, Stroke};
use crate::geometry::{Point, Rect, Size};
use crate::layout::{Edge, LayoutError, SheetFrame, SheetSnapshot, TileLayout};
use crate::macros::MacroContext;
use crate::metrics::{FontSpec, MetricsProvider};
use crate::reflow::ReflowOutput;
use crate::sheet::HeaderFooterDefinition;
use crate::template::{layout_segments, BandAlign, HeaderFooterTemplate};

/// Space between the right edge of a line number and the text.
pub const LINE_NUMBER_GAP: f32 = 2.0;

const MARGIN_WARNING_TEXT: &str = "Margins are outside of the printable area";

/// Errors raised while painting a sheet.
/// 繪製整張紙時可能發生的錯誤。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PaintError {
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Content(#[from] ContentError),
}

/// Overlay switches for layout debugging.
/// 版面除錯用的疊加圖層開關。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticOptions {
    /// Outline of every tile with its logical page number in the middle.
    pub page_bounds: bool,
    pub margins: bool,
    pub hard_margins: bool,
    pub paper_size: bool,
    pub header_footer_bounds: bool,
    pub content_bounds: bool,
    pub printable_area: bool,
    /// Dashed red rules and a message where a margin reaches into the unprintable region.
    pub margin_warnings: bool,
}

impl DiagnosticOptions {
    pub fn all() -> Self {
        Self {
            page_bounds: true,
            margins: true,
            hard_margins: true,
            paper_size: true,
            header_footer_bounds: true,
            content_bounds: true,
            printable_area: true,
            margin_warnings: true,
        }
    }
}

/// Top-left corner of a right-aligned line number inside the gutter.
pub(crate) fn line_number_origin(output: &ReflowOutput, number: &str, y: f32) -> Point {
    let width = output.digit_width * number.chars().count() as f32;
    Point::new(output.gutter_width - LINE_NUMBER_GAP - width, y)
}

/// Calls `draw(text, x, y)` for every line number and line on 1-based `page`.
///
/// Coordinates are page-local; `(x, y)` is the top-left corner of the text.
/// 以頁面區域座標逐行呼叫 `draw(text, x, y)`。
pub fn paint_page<F>(output: &ReflowOutput, page: usize, mut draw: F)
where
    F: FnMut(&str, f32, f32),
{
    for (row, line) in output.lines_for_page(page).iter().enumerate() {
        let y = row as f32 * output.line_height;
        if output.gutter_width > 0.0 && !line.is_continuation() {
            let number = line.line_number.to_string();
            let origin = line_number_origin(output, &number, y);
            draw(&number, origin.x, origin.y);
        }
        if !line.text.is_empty() {
            draw(&line.text, output.gutter_width, y);
        }
    }
}

/// Everything needed to paint one physical sheet.
pub struct SheetPaintRequest<'a> {
    pub frame: &'a SheetFrame,
    pub snapshot: &'a SheetSnapshot,
    pub content: &'a Content,
    pub pagination: &'a Pagination,
    pub services: &'a ContentServices,
    /// Document values; the sheet number and count are filled in per sheet.
    pub macros: &'a MacroContext,
    pub sheet_number: usize,
    pub diagnostics: DiagnosticOptions,
}

/// Paints header, footer, tiles, separators and overlays of one sheet in paper coordinates.
/// 以紙張座標繪製一張紙的頁首、頁尾、各邏輯頁、分隔線與診斷圖層。
pub fn paint_sheet(request: &SheetPaintRequest<'_>) -> Result<PrintDisplayList, PaintError> {
    let frame = request.frame;
    let sheet = &request.snapshot.definition;
    let metrics = request.services.metrics.as_ref();
    let page_count = request.pagination.page_count();
    let layout = frame.compose(page_count, request.sheet_number)?;
    let context = request
        .macros
        .clone()
        .with_pages(request.sheet_number, frame.sheet_count(page_count));

    let mut out = PrintDisplayList::default();
    for (band, bounds, align) in [
        (&sheet.header, layout.header_bounds, BandAlign::Top),
        (&sheet.footer, layout.footer_bounds, BandAlign::Bottom),
    ] {
        paint_band(band, bounds, align, &context, metrics, &mut out);
    }

    for tile in &layout.tiles {
        let mut page = PrintDisplayList::default();
        request.content.paint_page(
            request.pagination,
            tile.logical_page,
            Size::new(tile.width, tile.height),
            &sheet.content,
            request.services,
            &mut page,
        )?;
        trace!(
            sheet = request.sheet_number,
            page = tile.logical_page,
            commands = page.len(),
            "painted tile"
        );
        out.push(DisplayCommand::PushClip(tile.bounds()));
        out.extend_translated(page, tile.x, tile.y);
        out.push(DisplayCommand::PopClip);
    }

    if sheet.page_separator {
        paint_separators(frame, &mut out);
    }
    paint_diagnostics(frame, &layout, request.diagnostics, metrics, &mut out);
    Ok(out)
}

fn paint_band(
    band: &HeaderFooterDefinition,
    bounds: Rect,
    align: BandAlign,
    context: &MacroContext,
    metrics: &dyn MetricsProvider,
    out: &mut PrintDisplayList,
) {
    if !band.enabled {
        return;
    }
    let rendered = HeaderFooterTemplate::new(band.text.as_str()).render(context);
    for segment in layout_segments(&rendered, bounds, &band.font, metrics, align) {
        out.push_text(&segment.text, &band.font, segment.position, Color::BLACK);
    }

    let stroke = Stroke::solid(0.75, Color::BLACK);
    let (left, top) = (bounds.left(), bounds.top());
    let (right, bottom) = (bounds.right(), bounds.bottom());
    if band.borders.left {
        out.push_rule(Point::new(left, top), Point::new(left, bottom), stroke);
    }
    if band.borders.top {
        out.push_rule(Point::new(left, top), Point::new(right, top), stroke);
    }
    if band.borders.right {
        out.push_rule(Point::new(right, top), Point::new(right, bottom), stroke);
    }
    if band.borders.bottom {
        out.push_rule(Point::new(left, bottom), Point::new(right, bottom), stroke);
    }
}

/// Rules centred in the padding between neighbouring tiles.
fn paint_separators(frame: &SheetFrame, out: &mut PrintDisplayList) {
    let content = frame.content_bounds;
    let stroke = Stroke::solid(0.5, Color::DARK_GRAY);
    for column in 1..frame.columns {
        let x = content.x + column as f32 * (frame.tile_size.width + frame.padding)
            - frame.padding / 2.0;
        out.push_rule(
            Point::new(x, content.top()),
            Point::new(x, content.bottom()),
            stroke,
        );
    }
    for row in 1..frame.rows {
        let y = content.y + row as f32 * (frame.tile_size.height + frame.padding)
            - frame.padding / 2.0;
        out.push_rule(
            Point::new(content.left(), y),
            Point::new(content.right(), y),
            stroke,
        );
    }
}

fn paint_diagnostics(
    frame: &SheetFrame,
    layout: &TileLayout,
    options: DiagnosticOptions,
    metrics: &dyn MetricsProvider,
    out: &mut PrintDisplayList,
) {
    let paper = frame.paper;

    if options.page_bounds {
        let font = FontSpec::sans_serif(24.0);
        let line_height = metrics.line_height(&font);
        for tile in &layout.tiles {
            out.push_outline(tile.bounds(), Stroke::solid(0.5, Color::LIGHT_GRAY));
            let label = tile.logical_page.to_string();
            let width = metrics.text_width(&label, &font);
            out.push_text(
                &label,
                &font,
                Point::new(
                    tile.x + (tile.width - width) / 2.0,
                    tile.y + (tile.height - line_height) / 2.0,
                ),
                Color::LIGHT_GRAY,
            );
        }
    }

    if options.margins {
        let m = frame.margins;
        let insets = [m.left, m.top, m.right, m.bottom];
        paint_edge_rules(paper, insets, Stroke::dashed(0.5, Color::BLUE), out);
    }

    if options.hard_margins {
        let h = frame.hard_margins;
        let insets = [h.left, h.top, h.right, h.bottom];
        paint_edge_rules(paper, insets, Stroke::solid(0.5, Color::ORANGE), out);
    }

    if options.paper_size {
        out.push_outline(Rect::from_size(paper), Stroke::solid(0.5, Color::GREEN));
    }

    if options.header_footer_bounds {
        let stroke = Stroke::dashed(0.5, Color::DARK_GRAY);
        for bounds in [layout.header_bounds, layout.footer_bounds] {
            if bounds.height > 0.0 {
                out.push_outline(bounds, stroke);
            }
        }
    }

    if options.content_bounds {
        out.push_outline(layout.content_bounds, Stroke::dashed(0.5, Color::GREEN));
    }

    if options.printable_area {
        out.push_outline(frame.printable_area, Stroke::dashed(0.5, Color::ORANGE));
    }

    if options.margin_warnings {
        let warnings = frame.margin_warnings();
        if warnings.is_empty() {
            return;
        }
        let stroke = Stroke::dashed(1.0, Color::RED);
        for warning in &warnings {
            let (start, end) = edge_line(paper, warning.edge, warning.minimum);
            out.push_rule(start, end, stroke);
        }
        let font = FontSpec::sans_serif(10.0);
        let width = metrics.text_width(MARGIN_WARNING_TEXT, &font);
        let area = frame.printable_area;
        out.push_text(
            MARGIN_WARNING_TEXT,
            &font,
            Point::new(area.x + (area.width - width) / 2.0, area.y),
            Color::RED,
        );
    }
}

/// Full-length rules inset from the left, top, right and bottom paper edges.
fn paint_edge_rules(paper: Size, insets: [f32; 4], stroke: Stroke, out: &mut PrintDisplayList) {
    let edges = [Edge::Left, Edge::Top, Edge::Right, Edge::Bottom];
    for (edge, inset) in edges.into_iter().zip(insets) {
        let (start, end) = edge_line(paper, edge, inset);
        out.push_rule(start, end, stroke);
    }
}

fn edge_line(paper: Size, edge: Edge, inset: f32) -> (Point, Point) {
    match edge {
        Edge::Left => (Point::new(inset, 0.0), Point::new(inset, paper.height)),
        Edge::Top => (Point::new(0.0, inset), Point::new(paper.width, inset)),
        Edge::Right => {
            let x = paper.width - inset;
            (Point::new(x, 0.0), Point::new(x, paper.height))
        }
        Edge::Bottom => {
            let y = paper.height - inset;
            (Point::new(0.0, y), Point::new(paper.width, y))
        }
    }
}
