use std::fmt;

use serde::Serialize;

use crate::geometry::{Point, Rect, Size};
use crate::metrics::FontSpec;

/// Drawing instructions for one physical sheet, consumed by platform adapters and the
/// preview rasteriser.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PrintDisplayList {
    pub commands: Vec<DisplayCommand>,
}

impl PrintDisplayList {
    /// Append a command to the display list.
    pub fn push(&mut self, command: DisplayCommand) {
        self.commands.push(command);
    }

    /// Returns true if the display list is empty.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Appends `other`, shifting every coordinate by `(dx, dy)`.
    pub fn extend_translated(&mut self, other: PrintDisplayList, dx: f32, dy: f32) {
        self.commands
            .extend(other.commands.into_iter().map(|cmd| cmd.translated(dx, dy)));
    }

    pub fn glyph_runs(&self) -> impl Iterator<Item = &GlyphRun> {
        self.commands.iter().filter_map(|cmd| match cmd {
            DisplayCommand::GlyphRun(run) => Some(run),
            _ => None,
        })
    }

    pub fn push_text(&mut self, text: &str, font: &FontSpec, position: Point, color: Color) {
        if text.is_empty() {
            return;
        }
        self.push(DisplayCommand::GlyphRun(GlyphRun {
            text: text.to_string(),
            font: font.clone(),
            position,
            color,
            background: None,
        }));
    }

    pub fn push_rule(&mut self, start: Point, end: Point, stroke: Stroke) {
        self.push(DisplayCommand::Rule { start, end, stroke });
    }

    pub fn push_outline(&mut self, rect: Rect, stroke: Stroke) {
        self.push(DisplayCommand::Outline { rect, stroke });
    }
}

/// Low-level drawing commands emitted by the paint stage.
#[derive(Debug, Clone, Serialize)]
pub enum DisplayCommand {
    GlyphRun(GlyphRun),
    BackgroundRect(Rectangle),
    /// Straight line in any direction.
    Rule {
        start: Point,
        end: Point,
        stroke: Stroke,
    },
    Outline {
        rect: Rect,
        stroke: Stroke,
    },
    /// Restricts subsequent commands to `rect` until the matching `PopClip`.
    PushClip(Rect),
    PopClip,
}

impl DisplayCommand {
    pub fn translated(self, dx: f32, dy: f32) -> Self {
        match self {
            DisplayCommand::GlyphRun(mut run) => {
                run.position = run.position.offset(dx, dy);
                DisplayCommand::GlyphRun(run)
            }
            DisplayCommand::BackgroundRect(mut rect) => {
                rect.origin = rect.origin.offset(dx, dy);
                DisplayCommand::BackgroundRect(rect)
            }
            DisplayCommand::Rule { start, end, stroke } => DisplayCommand::Rule {
                start: start.offset(dx, dy),
                end: end.offset(dx, dy),
                stroke,
            },
            DisplayCommand::Outline { rect, stroke } => DisplayCommand::Outline {
                rect: rect.translated(dx, dy),
                stroke,
            },
            DisplayCommand::PushClip(rect) => DisplayCommand::PushClip(rect.translated(dx, dy)),
            DisplayCommand::PopClip => DisplayCommand::PopClip,
        }
    }
}

/// A run of text drawn with a single font and colour; `position` is the top-left corner.
#[derive(Debug, Clone, Serialize)]
pub struct GlyphRun {
    pub text: String,
    pub font: FontSpec,
    pub position: Point,
    pub color: Color,
    pub background: Option<Color>,
}

/// Represents a filled rectangular region (e.g. for line background).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Rectangle {
    pub origin: Point,
    pub size: Size,
    pub color: Color,
}

/// RGBA color stored in normalized floating-point form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);
    pub const GRAY: Color = Color::new(0.5, 0.5, 0.5, 1.0);
    pub const DARK_GRAY: Color = Color::new(0.2, 0.2, 0.2, 1.0);
    pub const LIGHT_GRAY: Color = Color::new(0.83, 0.83, 0.83, 1.0);
    pub const RED: Color = Color::new(1.0, 0.0, 0.0, 1.0);
    pub const GREEN: Color = Color::new(0.0, 0.5, 0.0, 1.0);
    pub const BLUE: Color = Color::new(0.0, 0.0, 1.0, 1.0);
    pub const ORANGE: Color = Color::new(1.0, 0.65, 0.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

/// Stroke descriptor for simple line drawing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stroke {
    pub width: f32,
    pub color: Color,
    pub dashed: bool,
}

impl Stroke {
    pub const fn solid(width: f32, color: Color) -> Self {
        Self {
            width,
            color,
            dashed: false,
        }
    }

    pub const fn dashed(width: f32, color: Color) -> Self {
        Self {
            width,
            color,
            dashed: true,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rgba({:.3}, {:.3}, {:.3}, {:.3})",
            self.r, self.g, self.b, self.a
        )
    }
}
