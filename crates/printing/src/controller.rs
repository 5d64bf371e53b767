use std::fmt::Display;

use thiserror::Error;
use tracing::debug;

use crate::content::{Content, ContentError, ContentServices, Pagination};
use crate::display::PrintDisplayList;
use crate::job::{PrintJobControllerState, PrintJobOptions};
use crate::layout::{resolve_frame, LayoutError, PhysicalPageGeometry, SheetFrame, SheetSnapshot};
use crate::macros::MacroContext;
use crate::paint::{paint_sheet, DiagnosticOptions, PaintError, SheetPaintRequest};
use crate::platform::{PlatformAdapter, PlatformJobHandle, SpoolSheet};
use crate::preview::{render_preview_png, PreviewCache, PreviewError, PrintPreviewKey};
use crate::session::CancelToken;
use crate::sheet::SheetDefinition;

/// Result produced after executing a print job.
/// 列印作業完成後所產生的結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintJobResult {
    pub page_count: usize,
    pub sheet_count: usize,
    pub sheets_printed: usize,
    pub state: PrintJobControllerState,
}

/// Configuration for preview generation.
/// 建立預覽時所需的設定資訊。
#[derive(Debug)]
pub struct PreviewConfig<'a> {
    pub cache: &'a mut PreviewCache,
    pub zoom_levels: &'a [u32],
    pub base_dpi: u32,
}

/// Errors raised while running the print pipeline.
/// 列印管線執行時可能發生的錯誤。
#[derive(Debug, Error)]
pub enum PrintJobError {
    #[error("layout failed: {0}")]
    Layout(#[from] LayoutError),
    #[error("content failed: {0}")]
    Content(#[from] ContentError),
    #[error("preview rendering failed: {0}")]
    Preview(#[from] PreviewError),
    #[error("platform adapter failed: {0}")]
    Platform(String),
}

impl From<PaintError> for PrintJobError {
    fn from(err: PaintError) -> Self {
        match err {
            PaintError::Layout(err) => PrintJobError::Layout(err),
            PaintError::Content(err) => PrintJobError::Content(err),
        }
    }
}

/// Inputs shared by every sheet of one job.
/// 同一列印作業中所有紙張共用的輸入。
#[derive(Debug, Clone, Copy)]
pub struct PrintRequest<'a> {
    pub content: &'a Content,
    pub sheet: &'a SheetDefinition,
    pub physical: &'a PhysicalPageGeometry,
    pub services: &'a ContentServices,
    pub macros: &'a MacroContext,
    pub diagnostics: DiagnosticOptions,
}

/// Frame and pagination computed once per job.
/// 每個作業只計算一次的版面與分頁結果。
#[derive(Debug, Clone)]
pub struct PreparedJob {
    pub snapshot: SheetSnapshot,
    pub frame: SheetFrame,
    pub pagination: Pagination,
}

impl PreparedJob {
    pub fn page_count(&self) -> usize {
        self.pagination.page_count()
    }

    pub fn sheet_count(&self) -> usize {
        self.frame.sheet_count(self.page_count())
    }

    /// Paints 1-based `sheet_number` in paper coordinates.
    pub fn paint(
        &self,
        request: &PrintRequest<'_>,
        sheet_number: usize,
    ) -> Result<PrintDisplayList, PrintJobError> {
        let display_list = paint_sheet(&SheetPaintRequest {
            frame: &self.frame,
            snapshot: &self.snapshot,
            content: request.content,
            pagination: &self.pagination,
            services: request.services,
            macros: request.macros,
            sheet_number,
            diagnostics: request.diagnostics,
        })?;
        Ok(display_list)
    }
}

/// Resolves the sheet frame and reflows the content at the tile size.
/// 計算紙張版面，並以邏輯頁大小重新排版內容。
pub fn prepare(
    request: &PrintRequest<'_>,
    cancel: &CancelToken,
) -> Result<PreparedJob, PrintJobError> {
    let mut definition = request.sheet.clone();
    definition.sanitize();
    let snapshot = SheetSnapshot::new(&definition, request.services.metrics.as_ref());
    let frame = resolve_frame(&snapshot, request.physical)?;
    let geometry = definition.content.page_geometry(frame.tile_size);
    let pagination = request
        .content
        .reflow_or_measure(&geometry, request.services, cancel)?;
    Ok(PreparedJob {
        snapshot,
        frame,
        pagination,
    })
}

/// Logical page and physical sheet counts for `request`.
pub fn count_sheets(request: &PrintRequest<'_>) -> Result<(usize, usize), PrintJobError> {
    let prepared = prepare(request, &CancelToken::new())?;
    Ok((prepared.page_count(), prepared.sheet_count()))
}

/// Executes the print pipeline end-to-end: paginate, paint every sheet in range, render
/// previews and spool through `adapter`.
/// 端到端執行列印管線：分頁、繪製範圍內的每張紙、產生預覽並送入列印佇列。
pub fn run_print_job<A>(
    request: &PrintRequest<'_>,
    options: &PrintJobOptions,
    adapter: &A,
    mut preview: Option<PreviewConfig<'_>>,
) -> Result<PrintJobResult, PrintJobError>
where
    A: PlatformAdapter,
    A::Error: Display,
{
    let prepared = prepare(request, &CancelToken::new())?;
    let sheet_count = prepared.sheet_count();

    let mut handle = adapter
        .begin_job(options)
        .map_err(|err| PrintJobError::Platform(err.to_string()))?;

    let mut sheets_printed = 0;
    for sheet_number in 1..=sheet_count {
        if !options.sheet_range.contains(sheet_number as u32) {
            continue;
        }
        let spooled = prepared
            .paint(request, sheet_number)
            .and_then(|display_list| {
                if let Some(config) = preview.as_mut() {
                    let target = PreviewTarget {
                        options,
                        prepared: &prepared,
                        request,
                        sheet_number,
                    };
                    cache_previews(config, &target, &display_list)?;
                }
                Ok(display_list)
            })
            .and_then(|display_list| {
                handle
                    .submit_sheet(SpoolSheet {
                        job_id: options.job_id,
                        sheet_number,
                        paper: prepared.frame.paper,
                        device_offset: prepared.frame.device_offset,
                        display_list,
                    })
                    .map_err(|err| PrintJobError::Platform(err.to_string()))
            });
        if let Err(err) = spooled {
            handle.abort(&err.to_string());
            return Err(err);
        }
        sheets_printed += 1;
        debug!(job = %options.job_id, sheet_number, sheet_count, "spooled sheet");
    }

    handle
        .finish()
        .map_err(|err| PrintJobError::Platform(err.to_string()))?;

    Ok(PrintJobResult {
        page_count: prepared.page_count(),
        sheet_count,
        sheets_printed,
        state: PrintJobControllerState::Completed,
    })
}

struct PreviewTarget<'a> {
    options: &'a PrintJobOptions,
    prepared: &'a PreparedJob,
    request: &'a PrintRequest<'a>,
    sheet_number: usize,
}

fn cache_previews(
    config: &mut PreviewConfig<'_>,
    target: &PreviewTarget<'_>,
    display_list: &PrintDisplayList,
) -> Result<(), PrintJobError> {
    for zoom in config.zoom_levels {
        let entry = render_preview_png(
            display_list,
            target.prepared.frame.paper,
            *zoom,
            config.base_dpi,
            target.request.services.metrics.as_ref(),
        )?;
        let key = PrintPreviewKey {
            job_id: target.options.job_id,
            sheet: target.sheet_number,
            zoom_percent: *zoom,
        };
        config.cache.insert(key, entry);
    }
    Ok(())
}
