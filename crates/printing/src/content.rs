use std::fmt;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::display::{Color, DisplayCommand, PrintDisplayList, Rectangle, Stroke};
use crate::document::Document;
use crate::geometry::{Point, Rect, Size};
use crate::metrics::{FontSpec, MetricsProvider};
use crate::paint::{line_number_origin, LINE_NUMBER_GAP};
use crate::reflow::{
    expand_tabs, reflow_with_cancel, split_source_lines, ContentSettings, Line, PageGeometry,
    ReflowError, ReflowOutput,
};
use crate::session::CancelToken;

const PLAIN_TEXT: &str = "text/plain";
const HTML: &str = "text/html";

/// How a document is paginated and painted.
/// 文件的分頁與繪製方式。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub enum ContentKind {
    #[default]
    PlainText,
    /// Source code, optionally coloured by an external highlighter.
    Code { language: String },
    /// Laid out by an external HTML engine and sliced by page height.
    Html,
}

impl ContentKind {
    /// Resolves a content type such as `text/plain`, `text/html` or a language id.
    pub fn from_content_type(content_type: &str) -> Self {
        let content_type = content_type.trim();
        if content_type.is_empty() || content_type.eq_ignore_ascii_case(PLAIN_TEXT) {
            ContentKind::PlainText
        } else if content_type.eq_ignore_ascii_case(HTML) {
            ContentKind::Html
        } else {
            let language = content_type
                .strip_prefix("text/x-")
                .unwrap_or(content_type)
                .to_ascii_lowercase();
            ContentKind::Code { language }
        }
    }

    /// Resolves a file extension (without the dot, any case).
    pub fn from_extension(extension: &str) -> Self {
        let extension = extension.to_ascii_lowercase();
        let language = match extension.as_str() {
            "htm" | "html" | "xhtml" => return ContentKind::Html,
            "rs" => "rust",
            "py" | "pyw" => "python",
            "c" | "h" => "c",
            "cc" | "cpp" | "cxx" | "hpp" | "hh" => "cpp",
            "cs" => "csharp",
            "js" | "mjs" | "cjs" => "javascript",
            "ts" | "tsx" => "typescript",
            "json" => "json",
            "toml" => "toml",
            "yml" | "yaml" => "yaml",
            "md" | "markdown" => "markdown",
            "sh" | "bash" | "zsh" => "shell",
            "ps1" => "powershell",
            "go" => "go",
            "java" => "java",
            "xml" | "xsd" | "svg" => "xml",
            "css" => "css",
            "sql" => "sql",
            _ => return ContentKind::PlainText,
        };
        ContentKind::Code {
            language: language.to_string(),
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(ContentKind::PlainText)
    }

    /// Display name used by the `{FileType}` and `{ContentTypeName}` macros.
    pub fn name(&self) -> &str {
        match self {
            ContentKind::PlainText => PLAIN_TEXT,
            ContentKind::Code { language } => language,
            ContentKind::Html => HTML,
        }
    }

    pub fn language(&self) -> Option<&str> {
        match self {
            ContentKind::Code { language } => Some(language),
            _ => None,
        }
    }
}

/// Highlight span metadata used by renderers to colourise glyph runs.
/// 供繪製器為字元序列著色的語法標示區段資訊。
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightSpan {
    /// Char range inside the tab-expanded source line.
    pub range: Range<usize>,
    pub foreground: Color,
    pub background: Option<Color>,
}

impl HighlightSpan {
    pub fn new(start: usize, end: usize, foreground: Color, background: Option<Color>) -> Self {
        Self {
            range: start..end,
            foreground,
            background,
        }
    }
}

/// External syntax highlighter.
/// 外部語法標示器。
pub trait Highlighter: Send + Sync {
    /// Returns one span list per input line.
    fn highlight(&self, language: &str, lines: &[&str]) -> Result<Vec<Vec<HighlightSpan>>, String>;
}

/// External HTML layout engine.
/// 外部 HTML 版面引擎。
pub trait HtmlLayoutEngine: Send + Sync {
    /// Lays out `html` at `width` and returns the total content height.
    fn render(&self, html: &str, width: f32) -> Result<f32, String>;

    /// Draws the part of the content starting at `y_offset` into `clip`.
    fn draw_region(
        &self,
        html: &str,
        width: f32,
        y_offset: f32,
        clip: Rect,
        out: &mut PrintDisplayList,
    ) -> Result<(), String>;
}

/// Collaborators a content adapter may call.
#[derive(Clone)]
pub struct ContentServices {
    pub metrics: Arc<dyn MetricsProvider>,
    pub highlighter: Option<Arc<dyn Highlighter>>,
    pub html_engine: Option<Arc<dyn HtmlLayoutEngine>>,
}

impl ContentServices {
    pub fn new(metrics: Arc<dyn MetricsProvider>) -> Self {
        Self {
            metrics,
            highlighter: None,
            html_engine: None,
        }
    }

    pub fn with_highlighter(mut self, highlighter: Arc<dyn Highlighter>) -> Self {
        self.highlighter = Some(highlighter);
        self
    }

    pub fn with_html_engine(mut self, engine: Arc<dyn HtmlLayoutEngine>) -> Self {
        self.html_engine = Some(engine);
        self
    }

    /// Adds the built-in [`TextHtmlEngine`] sharing these metrics.
    pub fn with_text_html_engine(self, font: FontSpec) -> Self {
        let engine = TextHtmlEngine::new(Arc::clone(&self.metrics), font);
        self.with_html_engine(Arc::new(engine))
    }
}

impl fmt::Debug for ContentServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentServices")
            .field("highlighter", &self.highlighter.is_some())
            .field("html_engine", &self.html_engine.is_some())
            .finish_non_exhaustive()
    }
}

/// Errors raised while paginating or painting content.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContentError {
    #[error(transparent)]
    Reflow(#[from] ReflowError),
    #[error("HTML content needs an HTML layout engine")]
    MissingHtmlEngine,
    #[error("HTML layout failed: {0}")]
    Html(String),
}

/// Pagination of one document at one tile size.
/// 文件在特定頁面大小下的分頁結果。
#[derive(Debug, Clone, PartialEq)]
pub enum Pagination {
    Lines {
        output: ReflowOutput,
        /// Highlight spans per source line; empty when the content is not highlighted.
        spans: Vec<Vec<HighlightSpan>>,
    },
    Slices {
        content_height: f32,
        page_width: f32,
        page_height: f32,
        page_count: usize,
    },
}

impl Pagination {
    pub fn page_count(&self) -> usize {
        match self {
            Pagination::Lines { output, .. } => output.page_count,
            Pagination::Slices { page_count, .. } => *page_count,
        }
    }

    pub fn lines(&self) -> Option<&ReflowOutput> {
        match self {
            Pagination::Lines { output, .. } => Some(output),
            Pagination::Slices { .. } => None,
        }
    }
}

/// A document bound to the adapter that paginates it.
/// 文件與負責其分頁的內容轉接器。
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    pub kind: ContentKind,
    pub document: Document,
}

impl Content {
    pub fn new(document: Document) -> Self {
        Self {
            kind: document.kind.clone(),
            document,
        }
    }

    pub fn with_kind(mut self, kind: ContentKind) -> Self {
        self.kind = kind;
        self
    }

    /// Reflows text kinds into lines; measures HTML and slices it by page height.
    /// 文字類內容重新排版為行；HTML 內容則量測高度並依頁高切分。
    pub fn reflow_or_measure(
        &self,
        geometry: &PageGeometry,
        services: &ContentServices,
        cancel: &CancelToken,
    ) -> Result<Pagination, ContentError> {
        let text = &self.document.text;
        match &self.kind {
            ContentKind::PlainText => {
                let output = reflow_with_cancel(text, geometry, services.metrics.as_ref(), cancel)?;
                Ok(Pagination::Lines {
                    output,
                    spans: Vec::new(),
                })
            }
            ContentKind::Code { language } => {
                let output = reflow_with_cancel(text, geometry, services.metrics.as_ref(), cancel)?;
                let spans = match &services.highlighter {
                    Some(highlighter) => {
                        highlight(highlighter.as_ref(), language, text, geometry.tab_spaces)
                    }
                    None => Vec::new(),
                };
                Ok(Pagination::Lines { output, spans })
            }
            ContentKind::Html => {
                let engine = services
                    .html_engine
                    .as_ref()
                    .ok_or(ContentError::MissingHtmlEngine)?;
                let valid = |v: f32| v.is_finite() && v > 0.0;
                if !(valid(geometry.width) && valid(geometry.height)) {
                    return Err(ReflowError::InvalidGeometry {
                        width: geometry.width,
                        height: geometry.height,
                    }
                    .into());
                }
                if cancel.is_cancelled() {
                    return Err(ReflowError::Cancelled.into());
                }
                let content_height = engine
                    .render(text, geometry.width)
                    .map_err(ContentError::Html)?
                    .max(0.0);
                let page_count = ((content_height / geometry.height).ceil() as usize).max(1);
                debug!(content_height, page_count, "measured html content");
                Ok(Pagination::Slices {
                    content_height,
                    page_width: geometry.width,
                    page_height: geometry.height,
                    page_count,
                })
            }
        }
    }

    /// Paints 1-based logical `page` in page-local coordinates into `out`.
    pub fn paint_page(
        &self,
        pagination: &Pagination,
        page: usize,
        size: Size,
        settings: &ContentSettings,
        services: &ContentServices,
        out: &mut PrintDisplayList,
    ) -> Result<(), ContentError> {
        match pagination {
            Pagination::Lines { output, spans } => {
                paint_lines(output, spans, page, size, settings, services.metrics.as_ref(), out);
                Ok(())
            }
            Pagination::Slices {
                page_width,
                page_height,
                ..
            } => {
                let engine = services
                    .html_engine
                    .as_ref()
                    .ok_or(ContentError::MissingHtmlEngine)?;
                let clip = Rect::new(0.0, 0.0, *page_width, *page_height);
                let y_offset = page.saturating_sub(1) as f32 * page_height;
                out.push(DisplayCommand::PushClip(clip));
                let drawn = engine.draw_region(&self.document.text, *page_width, y_offset, clip, out);
                out.push(DisplayCommand::PopClip);
                drawn.map_err(ContentError::Html)
            }
        }
    }
}

fn highlight(
    highlighter: &dyn Highlighter,
    language: &str,
    text: &str,
    tab_spaces: usize,
) -> Vec<Vec<HighlightSpan>> {
    let expanded: Vec<String> = split_source_lines(text)
        .into_iter()
        .map(|line| expand_tabs(line, tab_spaces))
        .collect();
    let lines: Vec<&str> = expanded.iter().map(String::as_str).collect();
    match highlighter.highlight(language, &lines) {
        Ok(spans) => spans,
        Err(err) => {
            warn!(language, error = %err, "highlighter failed; printing plain text");
            Vec::new()
        }
    }
}

fn paint_lines(
    output: &ReflowOutput,
    spans: &[Vec<HighlightSpan>],
    page: usize,
    size: Size,
    settings: &ContentSettings,
    metrics: &dyn MetricsProvider,
    out: &mut PrintDisplayList,
) {
    let font = &settings.font;
    let line_height = output.line_height;
    let text_x = output.gutter_width;

    for (row, line) in output.lines_for_page(page).iter().enumerate() {
        let y = row as f32 * line_height;
        if output.gutter_width > 0.0 && !line.is_continuation() {
            let number = line.line_number.to_string();
            out.push_text(
                &number,
                font,
                line_number_origin(output, &number, y),
                Color::GRAY,
            );
        }

        let line_spans = spans.get(line.source_line).map(Vec::as_slice).unwrap_or(&[]);
        paint_fragment(line, line_spans, Point::new(text_x, y), font, metrics, line_height, out);

        if settings.diagnostics {
            out.push_outline(
                Rect::new(text_x, y, size.width - text_x, line_height),
                Stroke::dashed(0.25, Color::LIGHT_GRAY),
            );
        }
    }

    if output.gutter_width > 0.0 && settings.line_number_separator {
        let x = output.gutter_width - LINE_NUMBER_GAP / 2.0;
        out.push_rule(
            Point::new(x, 0.0),
            Point::new(x, size.height),
            Stroke::solid(0.5, Color::GRAY),
        );
    }
}

/// Paints one wrapped fragment, splitting it into runs at highlight span boundaries.
fn paint_fragment(
    line: &Line,
    spans: &[HighlightSpan],
    origin: Point,
    font: &FontSpec,
    metrics: &dyn MetricsProvider,
    line_height: f32,
    out: &mut PrintDisplayList,
) {
    let chars: Vec<char> = line.text.chars().collect();
    let fragment = line.column..line.column + chars.len();

    let mut runs: Vec<(Range<usize>, Color, Option<Color>)> = Vec::new();
    let mut cursor = 0;
    for span in spans {
        let start = span.range.start.max(fragment.start).min(fragment.end) - fragment.start;
        let end = span.range.end.max(fragment.start).min(fragment.end) - fragment.start;
        if start >= end || end <= cursor {
            continue;
        }
        let start = start.max(cursor);
        if start > cursor {
            runs.push((cursor..start, Color::BLACK, None));
        }
        runs.push((start..end, span.foreground, span.background));
        cursor = end;
    }
    if cursor < chars.len() {
        runs.push((cursor..chars.len(), Color::BLACK, None));
    }

    for (range, foreground, background) in runs {
        let prefix: String = chars[..range.start].iter().collect();
        let text: String = chars[range.clone()].iter().collect();
        let x = origin.x + metrics.text_width(&prefix, font);
        if let Some(color) = background {
            out.push(DisplayCommand::BackgroundRect(Rectangle {
                origin: Point::new(x, origin.y),
                size: Size::new(metrics.text_width(&text, font), line_height),
                color,
            }));
        }
        out.push_text(&text, font, Point::new(x, origin.y), foreground);
    }
}

static TAG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<(/?)([A-Za-z][A-Za-z0-9]*)[^>]*>|<!--.*?-->")
        .expect("built-in tag pattern must compile")
});

static ENTITY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[0-9]+|#[xX][0-9A-Fa-f]+|[A-Za-z]+);")
        .expect("built-in entity pattern must compile")
});

/// Minimal HTML engine: drops markup, breaks lines at block elements and wraps the text
/// with the metrics provider.
/// 簡易 HTML 引擎：移除標記、於區塊元素換行，並以字型度量換行。
pub struct TextHtmlEngine {
    metrics: Arc<dyn MetricsProvider>,
    font: FontSpec,
}

impl TextHtmlEngine {
    pub fn new(metrics: Arc<dyn MetricsProvider>, font: FontSpec) -> Self {
        Self { metrics, font }
    }

    fn layout(&self, html: &str, width: f32) -> Result<ReflowOutput, String> {
        let line_height = self.metrics.line_height(&self.font);
        let geometry = PageGeometry {
            width,
            height: line_height,
            font: self.font.clone(),
            line_numbers: false,
            line_number_separator: false,
            tab_spaces: 4,
            new_page_on_form_feed: false,
        };
        reflow_with_cancel(&html_to_text(html), &geometry, self.metrics.as_ref(), &CancelToken::new())
            .map_err(|err| err.to_string())
    }
}

impl HtmlLayoutEngine for TextHtmlEngine {
    fn render(&self, html: &str, width: f32) -> Result<f32, String> {
        let output = self.layout(html, width)?;
        Ok(output.lines.len() as f32 * output.line_height)
    }

    fn draw_region(
        &self,
        html: &str,
        width: f32,
        y_offset: f32,
        clip: Rect,
        out: &mut PrintDisplayList,
    ) -> Result<(), String> {
        let output = self.layout(html, width)?;
        let line_height = output.line_height;
        for (index, line) in output.lines.iter().enumerate() {
            let y = clip.top() + index as f32 * line_height - y_offset;
            if y + line_height <= clip.top() || y >= clip.bottom() {
                continue;
            }
            out.push_text(&line.text, &self.font, Point::new(clip.left(), y), Color::BLACK);
        }
        Ok(())
    }
}

fn html_to_text(html: &str) -> String {
    let stripped = TAG_PATTERN.replace_all(html, |caps: &regex::Captures<'_>| {
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        let name = caps
            .get(2)
            .map(|m| m.as_str().to_ascii_lowercase())
            .unwrap_or_default();
        match name.as_str() {
            "br" => "\n",
            "p" | "div" | "li" | "tr" | "pre" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
                if closing =>
            {
                "\n"
            }
            _ => "",
        }
    });
    ENTITY_PATTERN
        .replace_all(&stripped, |caps: &regex::Captures<'_>| {
            let entity = &caps[1];
            decode_entity(entity).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn decode_entity(entity: &str) -> Option<String> {
    let ch = match entity {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        _ => {
            let code = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                entity.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)?
        }
    };
    Some(ch.to_string())
}
