//! Pagination and print engine: reflows documents into logical pages, composes them onto
//! physical sheets, expands header/footer templates and paints display lists for preview
//! and spooling.
//! 分頁與列印引擎：將文件重新排版為邏輯頁、組合至實體紙張、展開頁首頁尾範本，並繪製
//! 供預覽與列印使用的顯示清單。

pub mod content;
pub mod controller;
pub mod display;
pub mod document;
pub mod geometry;
pub mod job;
pub mod layout;
pub mod macros;
pub mod metrics;
pub mod paint;
pub mod platform;
pub mod preview;
pub mod reflow;
pub mod session;
pub mod sheet;
pub mod template;

pub use content::{
    Content, ContentError, ContentKind, ContentServices, HighlightSpan, Highlighter,
    HtmlLayoutEngine, Pagination, TextHtmlEngine,
};
pub use controller::{
    count_sheets, prepare, run_print_job, PreparedJob, PreviewConfig, PrintJobError,
    PrintJobResult, PrintRequest,
};
pub use display::{Color, DisplayCommand, GlyphRun, PrintDisplayList, Rectangle, Stroke};
pub use document::{Document, DocumentError};
pub use geometry::{Point, Rect, Size};
pub use job::{
    Margin, Orientation, PageRange, PaperId, PaperSize, PrintJobControllerState, PrintJobId,
    PrintJobOptions, PrintTarget,
};
pub use layout::{
    check_margins, compose_sheet, resolve_frame, sheet_count, Edge, HardMargins, LayoutError,
    MarginWarning, PhysicalPageGeometry, Rotation, SheetFrame, SheetSnapshot, Tile, TileLayout,
};
pub use macros::{macro_names, substitute, MacroContext, MacroValue};
pub use metrics::{AdvanceTableMetrics, FontSpec, FontStyle, Measurement, MetricsProvider};
pub use paint::{paint_page, paint_sheet, DiagnosticOptions, PaintError, SheetPaintRequest};
pub use platform::{PlatformAdapter, PlatformJobHandle, SpoolSheet};
pub use preview::{render_preview_png, PreviewCache, PreviewEntry, PreviewError, PrintPreviewKey};
pub use reflow::{
    reflow, reflow_with_cancel, ContentSettings, Line, PageGeometry, ReflowError, ReflowOutput,
};
pub use session::{CancelToken, Committed, ReflowCoordinator, ReflowTicket, SheetChange};
pub use sheet::{BorderFlags, HeaderFooterDefinition, SheetDefinition};
pub use template::{
    layout_segments, BandAlign, HeaderFooterTemplate, PlacedSegment, RenderedHeaderFooter,
    Segment,
};
