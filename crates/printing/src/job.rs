use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Opaque identifier for a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrintJobId(u64);

impl PrintJobId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for PrintJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PrintJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "print-job-{}", self.0)
    }
}

/// Orientation of a physical sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn from_landscape(landscape: bool) -> Self {
        if landscape {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }
}

/// Inclusive range of physical sheets to emit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PageRange {
    #[default]
    All,
    Range {
        start: u32,
        end: u32,
    },
    Selection(Vec<u32>),
}

impl PageRange {
    pub fn contains(&self, page: u32) -> bool {
        match self {
            PageRange::All => true,
            PageRange::Range { start, end } => *start <= page && page <= *end,
            PageRange::Selection(set) => set.contains(&page),
        }
    }
}

/// Margin values expressed in points (1/72").
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Margin {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl Margin {
    pub const fn zero() -> Self {
        Self::uniform(0.0)
    }

    pub const fn uniform(value: f32) -> Self {
        Self {
            top: value,
            bottom: value,
            left: value,
            right: value,
        }
    }

    /// Clamps negative edges to zero.
    pub fn non_negative(self) -> Self {
        Self {
            top: self.top.max(0.0),
            bottom: self.bottom.max(0.0),
            left: self.left.max(0.0),
            right: self.right.max(0.0),
        }
    }
}

/// Supported paper identifiers for quick selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaperId {
    A4,
    Letter,
    Legal,
    A3,
}

/// Represents a paper size in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaperSize {
    pub id: PaperId,
    pub width_mm: f32,
    pub height_mm: f32,
}

impl PaperSize {
    pub const fn new(id: PaperId, width_mm: f32, height_mm: f32) -> Self {
        Self {
            id,
            width_mm,
            height_mm,
        }
    }

    pub const fn a4() -> Self {
        Self::new(PaperId::A4, 210.0, 297.0)
    }

    pub const fn letter() -> Self {
        Self::new(PaperId::Letter, 215.9, 279.4)
    }

    pub const fn legal() -> Self {
        Self::new(PaperId::Legal, 215.9, 355.6)
    }

    pub const fn a3() -> Self {
        Self::new(PaperId::A3, 297.0, 420.0)
    }

    pub fn from_id(id: PaperId) -> Self {
        match id {
            PaperId::A4 => Self::a4(),
            PaperId::Letter => Self::letter(),
            PaperId::Legal => Self::legal(),
            PaperId::A3 => Self::a3(),
        }
    }

    pub fn to_points(&self, orientation: Orientation) -> (f32, f32) {
        const MM_PER_INCH: f32 = 25.4;
        let width_in = self.width_mm / MM_PER_INCH;
        let height_in = self.height_mm / MM_PER_INCH;
        let width_pt = width_in * 72.0;
        let height_pt = height_in * 72.0;
        match orientation {
            Orientation::Portrait => (width_pt, height_pt),
            Orientation::Landscape => (height_pt, width_pt),
        }
    }
}

/// Printer target metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintTarget {
    pub name: String,
}

impl PrintTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Options supplied when requesting a print job.
#[derive(Debug, Clone)]
pub struct PrintJobOptions {
    pub job_id: PrintJobId,
    pub target: Option<PrintTarget>,
    pub copies: u32,
    pub sheet_range: PageRange,
}

impl PrintJobOptions {
    pub fn new(target: Option<PrintTarget>, copies: u32, sheet_range: PageRange) -> Self {
        Self {
            job_id: PrintJobId::new(),
            target,
            copies: copies.max(1),
            sheet_range,
        }
    }
}

impl Default for PrintJobOptions {
    fn default() -> Self {
        Self::new(None, 1, PageRange::All)
    }
}

/// Controller state for UI markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintJobControllerState {
    Idle,
    Layout,
    Render,
    Spooling,
    Completed,
    Failed,
}
