use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::geometry::Size;
use crate::metrics::{FontSpec, MetricsProvider};
use crate::session::CancelToken;

const FORM_FEED: char = '\u{000C}';

/// Widest line number the gutter is sized for.
const GUTTER_SAMPLE: &str = "0000";

/// Errors raised by the reflow engine.
/// 重新排版流程可能回報的錯誤。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReflowError {
    #[error("invalid page geometry {width}x{height}: both dimensions must be positive")]
    InvalidGeometry { width: f32, height: f32 },
    #[error("line height {line_height} exceeds page height {page_height}")]
    LineExceedsPage { line_height: f32, page_height: f32 },
    #[error("document is empty")]
    EmptyDocument,
    #[error("reflow cancelled")]
    Cancelled,
}

/// One visual line produced by reflow.
/// 重新排版後的一條可視行。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Line {
    pub text: String,
    /// 1-based number of the source line; 0 for wrap continuations and form-feed padding.
    /// 原始行號（從 1 起算）；換行延續或換頁補白時為 0。
    pub line_number: usize,
    /// 0-based index of the source line this text came from, set for continuations too.
    pub source_line: usize,
    /// Char offset of `text` inside the tab-expanded source line.
    pub column: usize,
}

impl Line {
    pub fn is_continuation(&self) -> bool {
        self.line_number == 0
    }
}

/// Per-sheet text content options.
/// 每個版面設定的文字內容選項。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSettings {
    #[serde(default)]
    pub font: FontSpec,
    #[serde(default = "default_true")]
    pub line_numbers: bool,
    #[serde(default = "default_true")]
    pub line_number_separator: bool,
    #[serde(default = "default_tab_spaces")]
    pub tab_spaces: usize,
    #[serde(default)]
    pub new_page_on_form_feed: bool,
    /// Outlines every painted line; a layout debugging aid.
    #[serde(default)]
    pub diagnostics: bool,
}

fn default_true() -> bool {
    true
}

fn default_tab_spaces() -> usize {
    4
}

impl Default for ContentSettings {
    fn default() -> Self {
        Self {
            font: FontSpec::default(),
            line_numbers: true,
            line_number_separator: true,
            tab_spaces: default_tab_spaces(),
            new_page_on_form_feed: false,
            diagnostics: false,
        }
    }
}

impl ContentSettings {
    pub fn sanitize(&mut self) {
        if !(self.font.size_pt > 0.0) {
            self.font.size_pt = FontSpec::default().size_pt;
        }
        self.font.size_pt = self.font.size_pt.clamp(1.0, 144.0);
        self.tab_spaces = self.tab_spaces.min(16);
    }

    /// Freezes these options for one reflow over a content box of `size`.
    pub fn page_geometry(&self, size: Size) -> PageGeometry {
        PageGeometry {
            width: size.width,
            height: size.height,
            font: self.font.clone(),
            line_numbers: self.line_numbers,
            line_number_separator: self.line_number_separator,
            tab_spaces: self.tab_spaces,
            new_page_on_form_feed: self.new_page_on_form_feed,
        }
    }
}

/// Immutable input describing the content box of one logical page.
/// 單一邏輯頁面內容區的不可變描述。
#[derive(Debug, Clone, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub font: FontSpec,
    pub line_numbers: bool,
    pub line_number_separator: bool,
    pub tab_spaces: usize,
    pub new_page_on_form_feed: bool,
}

impl PageGeometry {
    fn validate(&self) -> Result<(), ReflowError> {
        let valid = |v: f32| v.is_finite() && v > 0.0;
        if valid(self.width) && valid(self.height) {
            Ok(())
        } else {
            Err(ReflowError::InvalidGeometry {
                width: self.width,
                height: self.height,
            })
        }
    }
}

/// Lines and page metrics produced by a reflow run.
/// 重新排版的結果：所有行與頁面度量。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReflowOutput {
    pub lines: Vec<Line>,
    pub page_count: usize,
    pub lines_per_page: usize,
    pub line_height: f32,
    /// Width reserved left of the text for line numbers (0 when disabled).
    pub gutter_width: f32,
    pub digit_width: f32,
    pub source_line_count: usize,
}

impl ReflowOutput {
    /// Lines shown on the 1-based logical `page`; empty when out of range.
    pub fn lines_for_page(&self, page: usize) -> &[Line] {
        if page == 0 {
            return &[];
        }
        let start = (page - 1).saturating_mul(self.lines_per_page);
        if start >= self.lines.len() {
            return &[];
        }
        let end = (start + self.lines_per_page).min(self.lines.len());
        &self.lines[start..end]
    }

    /// Rejects a result that came from an empty document.
    pub fn into_non_empty(self) -> Result<Self, ReflowError> {
        if self.source_line_count == 0 {
            Err(ReflowError::EmptyDocument)
        } else {
            Ok(self)
        }
    }
}

/// Wraps `document` into lines that fit the content box and counts pages.
/// 依內容區大小將文件換行並計算頁數。
pub fn reflow(
    document: &str,
    geometry: &PageGeometry,
    metrics: &dyn MetricsProvider,
) -> Result<ReflowOutput, ReflowError> {
    reflow_with_cancel(document, geometry, metrics, &CancelToken::new())
}

/// Same as [`reflow`], aborting with [`ReflowError::Cancelled`] once `cancel` fires.
/// 與 [`reflow`] 相同，但在取消權杖觸發後中止。
pub fn reflow_with_cancel(
    document: &str,
    geometry: &PageGeometry,
    metrics: &dyn MetricsProvider,
    cancel: &CancelToken,
) -> Result<ReflowOutput, ReflowError> {
    geometry.validate()?;

    let font = &geometry.font;
    let line_height = metrics.line_height(font);
    if !(line_height.is_finite() && line_height > 0.0) {
        return Err(ReflowError::InvalidGeometry {
            width: geometry.width,
            height: line_height,
        });
    }
    if line_height > geometry.height {
        return Err(ReflowError::LineExceedsPage {
            line_height,
            page_height: geometry.height,
        });
    }
    let lines_per_page = ((geometry.height / line_height).floor() as usize).max(1);

    let gutter_width = if geometry.line_numbers {
        metrics.text_width(GUTTER_SAMPLE, font)
    } else {
        0.0
    };
    let text_width = geometry.width - gutter_width;
    if !(text_width > 0.0) {
        return Err(ReflowError::InvalidGeometry {
            width: text_width,
            height: geometry.height,
        });
    }

    let wide_glyph = metrics.text_width("W", font);
    let estimate = if wide_glyph > 0.0 {
        (text_width / wide_glyph).floor() as usize
    } else {
        0
    };

    let wrapper = Wrapper {
        metrics,
        font,
        bounds: Size::new(text_width, line_height * 1.5),
        estimate,
    };

    let source_lines = split_source_lines(document);
    let mut lines = Vec::with_capacity(source_lines.len());
    // Logical lines started by mid-line form feeds so far.
    let mut extra_lines = 0;
    for (index, raw) in source_lines.iter().enumerate() {
        if cancel.is_cancelled() {
            debug!(source_line = index, "reflow cancelled");
            return Err(ReflowError::Cancelled);
        }

        let expanded = expand_tabs(raw, geometry.tab_spaces);
        let line_number = index + 1 + extra_lines;
        if geometry.new_page_on_form_feed && expanded.contains(FORM_FEED) {
            extra_lines += push_form_fed(
                &wrapper,
                &expanded,
                line_number,
                index,
                lines_per_page,
                &mut lines,
            );
        } else {
            wrapper.push_wrapped(&expanded, line_number, index, 0, &mut lines);
        }
    }

    if lines.is_empty() {
        lines.push(Line {
            text: String::new(),
            line_number: 1,
            source_line: 0,
            column: 0,
        });
    }

    let page_count = lines.len().div_ceil(lines_per_page);
    debug!(
        pages = page_count,
        lines_per_page,
        lines = lines.len(),
        "reflowed document"
    );

    Ok(ReflowOutput {
        lines,
        page_count,
        lines_per_page,
        line_height,
        gutter_width,
        digit_width: metrics.text_width("0", font),
        source_line_count: source_lines.len(),
    })
}

/// Splits on `\n`, `\r\n` and `\r`; a trailing terminator does not start a new line.
pub(crate) fn split_source_lines(document: &str) -> Vec<&str> {
    let bytes = document.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            b'\n' => {
                lines.push(&document[start..index]);
                index += 1;
                start = index;
            }
            b'\r' => {
                lines.push(&document[start..index]);
                index += 1;
                if bytes.get(index) == Some(&b'\n') {
                    index += 1;
                }
                start = index;
            }
            _ => index += 1,
        }
    }
    if start < document.len() {
        lines.push(&document[start..]);
    }
    lines
}

pub(crate) fn expand_tabs(line: &str, tab_spaces: usize) -> String {
    if tab_spaces == 0 || !line.contains('\t') {
        return line.to_string();
    }
    line.replace('\t', &" ".repeat(tab_spaces))
}

/// Text before each form feed stays on the current page; padding pushes the rest to the
/// top of the next one. Text following a form feed that ends a non-empty segment starts a
/// new logical line. Returns how many such lines were started.
fn push_form_fed(
    wrapper: &Wrapper<'_>,
    line: &str,
    line_number: usize,
    source_line: usize,
    lines_per_page: usize,
    out: &mut Vec<Line>,
) -> usize {
    let segments: Vec<&str> = line.split(FORM_FEED).collect();
    let mut number = line_number;
    let mut column = 0;
    for (index, segment) in segments.iter().enumerate() {
        if index > 0 {
            let previous = segments[index - 1];
            let at_end = index == segments.len() - 1 && segment.is_empty();
            if !previous.is_empty() && !at_end {
                number += 1;
            }
            while out.len() % lines_per_page != 0 {
                out.push(Line {
                    text: String::new(),
                    line_number: 0,
                    source_line,
                    column,
                });
            }
            column += 1;
        }
        if !segment.is_empty() {
            wrapper.push_wrapped(segment, number, source_line, column, out);
        }
        column += segment.chars().count();
    }
    number - line_number
}

struct Wrapper<'a> {
    metrics: &'a dyn MetricsProvider,
    font: &'a FontSpec,
    bounds: Size,
    estimate: usize,
}

impl Wrapper<'_> {
    fn wraps(&self, text: &str) -> bool {
        self.metrics.measure(text, self.font, self.bounds).wraps()
    }

    fn push_wrapped(
        &self,
        text: &str,
        line_number: usize,
        source_line: usize,
        column: usize,
        out: &mut Vec<Line>,
    ) {
        let mut rest = text;
        let mut number = line_number;
        let mut column = column;
        loop {
            if !self.wraps(rest) {
                out.push(Line {
                    text: rest.to_string(),
                    line_number: number,
                    source_line,
                    column,
                });
                return;
            }

            // Byte offset just past the n-th char sits at ends[n - 1].
            let ends: Vec<usize> = rest
                .char_indices()
                .skip(1)
                .map(|(idx, _)| idx)
                .chain(std::iter::once(rest.len()))
                .collect();
            let fitted = self.wrap_point(rest, &ends);
            let split = ends[fitted - 1];
            trace!(source_line, fitted, "wrapped line");

            out.push(Line {
                text: rest[..split].to_string(),
                line_number: number,
                source_line,
                column,
            });
            if split == rest.len() {
                return;
            }
            rest = &rest[split..];
            number = 0;
            column += fitted;
        }
    }

    /// Longest prefix (in chars, at least one) that does not wrap, found by a linear probe
    /// from the estimate.
    fn wrap_point(&self, text: &str, ends: &[usize]) -> usize {
        let prefix = |chars: usize| &text[..ends[chars - 1]];
        let len = ends.len();
        let mut fitted = self.estimate.clamp(1, len);

        if self.wraps(prefix(fitted)) {
            while fitted > 1 {
                fitted -= 1;
                if !self.wraps(prefix(fitted)) {
                    return fitted;
                }
            }
            return 1;
        }

        while fitted < len {
            if self.wraps(prefix(fitted + 1)) {
                return fitted;
            }
            fitted += 1;
        }
        len
    }
}
