use std::collections::hash_map::Entry;
use std::collections::HashMap;

use image::{codecs::png::PngEncoder, ColorType, ImageBuffer, ImageEncoder, ImageError, Rgba};
use thiserror::Error;

use crate::display::{Color, DisplayCommand, GlyphRun, PrintDisplayList, Stroke};
use crate::geometry::{Point, Rect, Size};
use crate::job::PrintJobId;
use crate::metrics::MetricsProvider;

/// Cache key for preview bitmaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrintPreviewKey {
    pub job_id: PrintJobId,
    /// Physical sheet number, 1-based.
    pub sheet: usize,
    pub zoom_percent: u32,
}

/// A rasterised sheet, PNG encoded.
#[derive(Debug, Clone)]
pub struct PreviewEntry {
    pub width_px: u32,
    pub height_px: u32,
    pub dpi: u32,
    pub data: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("failed to encode preview: {0}")]
    Encode(#[from] ImageError),
}

/// In-memory LRU cache for preview sheets.
#[derive(Debug, Default)]
pub struct PreviewCache {
    entries: HashMap<PrintPreviewKey, PreviewEntry>,
    order: Vec<PrintPreviewKey>,
    capacity: usize,
}

impl PreviewCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            capacity,
        }
    }

    pub fn insert(&mut self, key: PrintPreviewKey, entry: PreviewEntry) {
        if self.capacity == 0 {
            return;
        }
        let exists = self.entries.contains_key(&key);
        if !exists && self.order.len() >= self.capacity && !self.order.is_empty() {
            let oldest = self.order.remove(0);
            self.entries.remove(&oldest);
        }

        match self.entries.entry(key) {
            Entry::Occupied(mut occ) => {
                occ.insert(entry);
                self.touch(key);
            }
            Entry::Vacant(vac) => {
                vac.insert(entry);
                self.order.push(key);
            }
        }
    }

    pub fn get(&mut self, key: &PrintPreviewKey) -> Option<&PreviewEntry> {
        if self.entries.contains_key(key) {
            self.touch(*key);
            self.entries.get(key)
        } else {
            None
        }
    }

    pub fn remove_job(&mut self, job_id: PrintJobId) {
        self.entries.retain(|key, _| key.job_id != job_id);
        self.order.retain(|key| key.job_id != job_id);
    }

    /// Drops the previews of sheets `start..=end` of `job_id`, e.g. after a repaint-only edit.
    pub fn invalidate_sheet_range(&mut self, job_id: PrintJobId, start: usize, end: usize) {
        let stale =
            |key: &PrintPreviewKey| key.job_id == job_id && key.sheet >= start && key.sheet <= end;
        self.entries.retain(|key, _| !stale(key));
        self.order.retain(|key| !stale(key));
    }

    fn touch(&mut self, key: PrintPreviewKey) {
        if let Some(idx) = self.order.iter().position(|k| *k == key) {
            let key = self.order.remove(idx);
            self.order.push(key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Rasterises a sheet's display list to PNG at `base_dpi * zoom_percent / 100` (min 72).
///
/// Glyphs are drawn as one filled box per visible character.
pub fn render_preview_png(
    display_list: &PrintDisplayList,
    paper: Size,
    zoom_percent: u32,
    base_dpi: u32,
    metrics: &dyn MetricsProvider,
) -> Result<PreviewEntry, PreviewError> {
    let dpi = ((base_dpi as u64 * zoom_percent as u64) / 100).max(72) as u32;
    let scale = dpi as f32 / 72.0;
    let width_px = (paper.width * scale).ceil().max(1.0) as u32;
    let height_px = (paper.height * scale).ceil().max(1.0) as u32;

    let mut canvas = Canvas {
        image: ImageBuffer::from_pixel(width_px, height_px, Rgba([255, 255, 255, 255])),
        clips: Vec::new(),
        scale,
    };

    for command in &display_list.commands {
        match command {
            DisplayCommand::BackgroundRect(rect) => {
                let bounds = Rect::new(
                    rect.origin.x,
                    rect.origin.y,
                    rect.size.width,
                    rect.size.height,
                );
                canvas.fill(bounds, rect.color);
            }
            DisplayCommand::GlyphRun(run) => canvas.glyphs(run, metrics),
            DisplayCommand::Rule { start, end, stroke } => canvas.line(*start, *end, stroke),
            DisplayCommand::Outline { rect, stroke } => {
                let corners = [
                    Point::new(rect.left(), rect.top()),
                    Point::new(rect.right(), rect.top()),
                    Point::new(rect.right(), rect.bottom()),
                    Point::new(rect.left(), rect.bottom()),
                ];
                for (i, corner) in corners.iter().enumerate() {
                    canvas.line(*corner, corners[(i + 1) % 4], stroke);
                }
            }
            DisplayCommand::PushClip(rect) => canvas.push_clip(*rect),
            DisplayCommand::PopClip => {
                canvas.clips.pop();
            }
        }
    }

    let mut data = Vec::new();
    PngEncoder::new(&mut data).write_image(
        canvas.image.as_raw(),
        width_px,
        height_px,
        ColorType::Rgba8,
    )?;

    Ok(PreviewEntry {
        width_px,
        height_px,
        dpi,
        data,
    })
}

/// Pixel bounds as `(x0, y0, x1, y1)`, end-exclusive.
type PixelBox = (i32, i32, i32, i32);

struct Canvas {
    image: ImageBuffer<Rgba<u8>, Vec<u8>>,
    clips: Vec<PixelBox>,
    scale: f32,
}

impl Canvas {
    fn to_px(&self, value: f32) -> i32 {
        (value * self.scale).round() as i32
    }

    fn bounds(&self) -> PixelBox {
        let full = (0, 0, self.image.width() as i32, self.image.height() as i32);
        self.clips.last().copied().unwrap_or(full)
    }

    fn push_clip(&mut self, rect: Rect) {
        let (cx0, cy0, cx1, cy1) = self.bounds();
        let clip = (
            self.to_px(rect.left()).max(cx0),
            self.to_px(rect.top()).max(cy0),
            self.to_px(rect.right()).min(cx1),
            self.to_px(rect.bottom()).min(cy1),
        );
        self.clips.push(clip);
    }

    fn fill_px(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: Color) {
        let (cx0, cy0, cx1, cy1) = self.bounds();
        let (x0, y0) = (x0.max(cx0), y0.max(cy0));
        let (x1, y1) = (x1.min(cx1), y1.min(cy1));
        if x0 >= x1 || y0 >= y1 {
            return;
        }
        let rgba = color_to_rgba(color);
        for yy in y0..y1 {
            for xx in x0..x1 {
                self.image.put_pixel(xx as u32, yy as u32, rgba);
            }
        }
    }

    fn fill(&mut self, rect: Rect, color: Color) {
        let x0 = self.to_px(rect.left());
        let y0 = self.to_px(rect.top());
        let x1 = x0 + (rect.width * self.scale).ceil() as i32;
        let y1 = y0 + (rect.height * self.scale).ceil() as i32;
        self.fill_px(x0, y0, x1, y1, color);
    }

    fn glyphs(&mut self, run: &GlyphRun, metrics: &dyn MetricsProvider) {
        if let Some(background) = run.background {
            let width = metrics.text_width(&run.text, &run.font);
            let height = metrics.line_height(&run.font);
            self.fill(
                Rect::new(run.position.x, run.position.y, width, height),
                background,
            );
        }
        let size = run.font.size_pt;
        let mut x = run.position.x;
        let mut buf = [0u8; 4];
        for ch in run.text.chars() {
            let advance = metrics.text_width(ch.encode_utf8(&mut buf), &run.font);
            if !ch.is_whitespace() {
                let top = self.to_px(run.position.y + size * 0.25);
                let bottom = self.to_px(run.position.y + size);
                let left = self.to_px(x);
                let right = self.to_px(x + advance * 0.8).max(left + 1);
                self.fill_px(left, top, right, bottom.max(top + 1), run.color);
            }
            x += advance;
        }
    }

    fn line(&mut self, start: Point, end: Point, stroke: &Stroke) {
        let (x0, y0) = (self.to_px(start.x), self.to_px(start.y));
        let (x1, y1) = (self.to_px(end.x), self.to_px(end.y));
        let thickness = ((stroke.width * self.scale).round() as i32).max(1);
        let half = thickness / 2;
        let dash = ((4.0 * self.scale).round() as i32).max(1);
        let steps = (x1 - x0).abs().max((y1 - y0).abs());

        for step in 0..=steps {
            if stroke.dashed && (step / dash) % 2 == 1 {
                continue;
            }
            let t = if steps == 0 {
                0.0
            } else {
                step as f32 / steps as f32
            };
            let x = x0 + ((x1 - x0) as f32 * t).round() as i32;
            let y = y0 + ((y1 - y0) as f32 * t).round() as i32;
            self.fill_px(
                x - half,
                y - half,
                x - half + thickness,
                y - half + thickness,
                stroke.color,
            );
        }
    }
}

fn color_to_rgba(color: Color) -> Rgba<u8> {
    Rgba([
        clamp_to_u8(color.r),
        clamp_to_u8(color.g),
        clamp_to_u8(color.b),
        clamp_to_u8(color.a),
    ])
}

fn clamp_to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}
