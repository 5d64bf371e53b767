use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::geometry::{Point, Rect, Size};
use crate::job::{Margin, Orientation, PaperSize};
use crate::metrics::{FontSpec, MetricsProvider};
use crate::sheet::SheetDefinition;

/// Errors raised by the sheet compositor.
/// 版面合成器可能回報的錯誤。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("invalid {what} geometry {width}x{height}: both dimensions must be positive")]
    InvalidGeometry {
        what: &'static str,
        width: f32,
        height: f32,
    },
    #[error("sheet must hold at least one page, got {rows} rows x {columns} columns")]
    InvalidSheet { rows: u32, columns: u32 },
    #[error("tile padding must not be negative, got {0}")]
    NegativePadding(f32),
    #[error("sheet numbers start at 1")]
    InvalidSheetNumber,
    #[error("unsupported landscape rotation angle {0}; devices report 0, 90 or 270")]
    RotationAngleUnsupported(u32),
}

/// Edge of a sheet.
/// 紙張的四個邊。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Edge {
    Left,
    Top,
    Right,
    Bottom,
}

impl Edge {
    /// Edges in clockwise order, starting from the left.
    const CLOCKWISE: [Edge; 4] = [Edge::Left, Edge::Top, Edge::Right, Edge::Bottom];

    fn clockwise_index(self) -> usize {
        match self {
            Edge::Left => 0,
            Edge::Top => 1,
            Edge::Right => 2,
            Edge::Bottom => 3,
        }
    }

    pub fn opposite(self) -> Edge {
        Self::CLOCKWISE[(self.clockwise_index() + 2) % 4]
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Edge::Left => "left",
            Edge::Top => "top",
            Edge::Right => "right",
            Edge::Bottom => "bottom",
        };
        f.write_str(name)
    }
}

/// Landscape rotation reported by the device.
/// 裝置回報的橫向旋轉角度。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Rotation {
    Deg0,
    Deg90,
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg270 => 270,
        }
    }

    fn quarter_turns(self) -> usize {
        (self.degrees() / 90) as usize
    }

    /// Where a device edge ends up after rotating the sheet clockwise by this angle.
    pub fn map_edge(self, edge: Edge) -> Edge {
        Edge::CLOCKWISE[(edge.clockwise_index() + self.quarter_turns()) % 4]
    }
}

impl TryFrom<u32> for Rotation {
    type Error = LayoutError;

    fn try_from(degrees: u32) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            270 => Ok(Rotation::Deg270),
            other => Err(LayoutError::RotationAngleUnsupported(other)),
        }
    }
}

/// Device-reported geometry of the physical page, in portrait device orientation.
/// 以直向裝置座標表示的實體頁面幾何資訊。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhysicalPageGeometry {
    pub paper_size: Size,
    pub printable_area: Rect,
    /// Unprintable offset along the device X axis (the left edge in portrait).
    pub hard_margin_x: f32,
    /// Unprintable offset along the device Y axis (the top edge in portrait).
    pub hard_margin_y: f32,
    pub landscape_angle: u32,
    pub resolution: f32,
}

impl PhysicalPageGeometry {
    /// Paper with the same hard margin on every edge.
    pub fn from_paper(paper: PaperSize, hard_margin: f32, landscape_angle: u32) -> Self {
        let (width, height) = paper.to_points(Orientation::Portrait);
        let hard_margin = hard_margin.max(0.0);
        Self {
            paper_size: Size::new(width, height),
            printable_area: Rect::new(
                hard_margin,
                hard_margin,
                width - 2.0 * hard_margin,
                height - 2.0 * hard_margin,
            ),
            hard_margin_x: hard_margin,
            hard_margin_y: hard_margin,
            landscape_angle,
            resolution: 72.0,
        }
    }

    /// A preview surface: the whole paper is printable.
    pub fn viewport(paper: PaperSize) -> Self {
        Self::from_paper(paper, 0.0, 90)
    }
}

/// Hard-margin offsets after rotation; edges the device reports nothing for stay at zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct HardMargins {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl HardMargins {
    fn set(&mut self, edge: Edge, value: f32) {
        match edge {
            Edge::Left => self.left = value,
            Edge::Top => self.top = value,
            Edge::Right => self.right = value,
            Edge::Bottom => self.bottom = value,
        }
    }

    pub fn get(&self, edge: Edge) -> f32 {
        match edge {
            Edge::Left => self.left,
            Edge::Top => self.top,
            Edge::Right => self.right,
            Edge::Bottom => self.bottom,
        }
    }
}

/// A configured margin that reaches into the unprintable region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarginWarning {
    pub edge: Edge,
    pub configured: f32,
    pub minimum: f32,
}

/// Compares each configured margin to the printable-area offset on the same edge.
/// 檢查每個邊的設定邊界是否小於裝置的最小可列印邊界。
pub fn check_margins(margins: &Margin, paper: Size, printable: Rect) -> Vec<MarginWarning> {
    let checks = [
        (Edge::Left, margins.left, printable.left()),
        (Edge::Top, margins.top, printable.top()),
        (Edge::Right, margins.right, paper.width - printable.right()),
        (Edge::Bottom, margins.bottom, paper.height - printable.bottom()),
    ];
    checks
        .into_iter()
        .filter(|(_, configured, minimum)| configured < minimum)
        .map(|(edge, configured, minimum)| {
            warn!(%edge, configured, minimum, "margin intrudes into the unprintable region");
            MarginWarning {
                edge,
                configured,
                minimum,
            }
        })
        .collect()
}

/// Physical sheets needed for `page_count` logical pages.
pub fn sheet_count(page_count: usize, rows: u32, columns: u32) -> usize {
    let per_sheet = (rows as usize).saturating_mul(columns as usize);
    if per_sheet == 0 {
        return 0;
    }
    page_count.div_ceil(per_sheet)
}

/// Read-only sheet definition with its band heights measured once.
/// 凍結的版面設定，並預先量測頁首頁尾高度。
#[derive(Debug, Clone, PartialEq)]
pub struct SheetSnapshot {
    pub definition: SheetDefinition,
    pub header_height: f32,
    pub footer_height: f32,
}

impl SheetSnapshot {
    pub fn new(definition: &SheetDefinition, metrics: &dyn MetricsProvider) -> Self {
        let band = |enabled: bool, font: &FontSpec, padding: f32| {
            if enabled {
                metrics.line_height(font) + padding
            } else {
                0.0
            }
        };
        Self {
            header_height: band(
                definition.header.enabled,
                &definition.header.font,
                definition.header.vertical_padding,
            ),
            footer_height: band(
                definition.footer.enabled,
                &definition.footer.font,
                definition.footer.vertical_padding,
            ),
            definition: definition.clone(),
        }
    }
}

/// Every placement on a sheet that does not depend on the sheet number.
/// 與頁次無關的整張紙版面資訊。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetFrame {
    pub rotation: Rotation,
    pub paper: Size,
    pub printable_area: Rect,
    pub hard_margins: HardMargins,
    pub margins: Margin,
    pub header_bounds: Rect,
    pub footer_bounds: Rect,
    pub content_bounds: Rect,
    pub tile_size: Size,
    pub rows: u32,
    pub columns: u32,
    pub padding: f32,
    /// Subtract from sheet coordinates when drawing on a device whose origin is the
    /// printable-area corner.
    pub device_offset: Point,
}

/// One logical page placed on a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tile {
    pub logical_page: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Tile {
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// Tile placements for one physical sheet.
/// 單張實體紙的邏輯頁面配置。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileLayout {
    pub sheet_number: usize,
    pub tiles: Vec<Tile>,
    pub header_bounds: Rect,
    pub footer_bounds: Rect,
    pub content_bounds: Rect,
}

fn positive(what: &'static str, size: Size) -> Result<Size, LayoutError> {
    if size.width.is_finite() && size.height.is_finite() && size.is_positive() {
        Ok(size)
    } else {
        Err(LayoutError::InvalidGeometry {
            what,
            width: size.width,
            height: size.height,
        })
    }
}

/// Applies rotation, margins and band heights to the physical page.
/// 套用旋轉、邊界與頁首頁尾高度，計算整張紙的版面。
pub fn resolve_frame(
    snapshot: &SheetSnapshot,
    physical: &PhysicalPageGeometry,
) -> Result<SheetFrame, LayoutError> {
    let sheet = &snapshot.definition;
    if sheet.rows == 0 || sheet.columns == 0 {
        return Err(LayoutError::InvalidSheet {
            rows: sheet.rows,
            columns: sheet.columns,
        });
    }
    if !(sheet.padding >= 0.0) {
        return Err(LayoutError::NegativePadding(sheet.padding));
    }

    let device_rotation = Rotation::try_from(physical.landscape_angle)?;
    let (rotation, paper, printable_area) = if sheet.landscape {
        (
            device_rotation,
            physical.paper_size.transposed(),
            physical.printable_area.transposed(),
        )
    } else {
        (Rotation::Deg0, physical.paper_size, physical.printable_area)
    };
    positive("paper", paper)?;

    let mut hard_margins = HardMargins::default();
    hard_margins.set(rotation.map_edge(Edge::Left), physical.hard_margin_x);
    hard_margins.set(rotation.map_edge(Edge::Top), physical.hard_margin_y);

    let margins = sheet.margins;
    let band_width = paper.width - margins.left - margins.right;
    let header_bounds = Rect::new(
        margins.left,
        margins.top,
        band_width,
        snapshot.header_height,
    );
    let footer_bounds = Rect::new(
        margins.left,
        paper.height - margins.bottom - snapshot.footer_height,
        band_width,
        snapshot.footer_height,
    );
    let content_bounds = Rect::new(
        margins.left,
        margins.top + snapshot.header_height,
        band_width,
        paper.height
            - margins.top
            - margins.bottom
            - snapshot.header_height
            - snapshot.footer_height,
    );
    positive("content", content_bounds.size())?;

    let columns = sheet.columns as f32;
    let rows = sheet.rows as f32;
    let tile_size = positive(
        "tile",
        Size::new(
            content_bounds.width / columns - sheet.padding * (columns - 1.0) / columns,
            content_bounds.height / rows - sheet.padding * (rows - 1.0) / rows,
        ),
    )?;

    debug!(
        paper = ?paper,
        printable = ?printable_area,
        content = ?content_bounds,
        tile = ?tile_size,
        rotation = rotation.degrees(),
        "resolved sheet frame"
    );

    Ok(SheetFrame {
        rotation,
        paper,
        printable_area,
        hard_margins,
        margins,
        header_bounds,
        footer_bounds,
        content_bounds,
        tile_size,
        rows: sheet.rows,
        columns: sheet.columns,
        padding: sheet.padding,
        device_offset: printable_area.origin(),
    })
}

impl SheetFrame {
    pub fn pages_per_sheet(&self) -> usize {
        (self.rows as usize) * (self.columns as usize)
    }

    pub fn sheet_count(&self, page_count: usize) -> usize {
        sheet_count(page_count, self.rows, self.columns)
    }

    pub fn margin_warnings(&self) -> Vec<MarginWarning> {
        check_margins(&self.margins, self.paper, self.printable_area)
    }

    /// Top-left corner of the slot holding 1-based `logical_page`.
    pub fn tile_origin(&self, logical_page: usize) -> Point {
        let index = logical_page.saturating_sub(1);
        let columns = self.columns as usize;
        let column = index % columns;
        let row = (index % self.pages_per_sheet()) / columns;
        Point::new(
            self.content_bounds.x + column as f32 * (self.tile_size.width + self.padding),
            self.content_bounds.y + row as f32 * (self.tile_size.height + self.padding),
        )
    }

    /// Places the logical pages that belong to 1-based `sheet_number`.
    pub fn compose(&self, page_count: usize, sheet_number: usize) -> Result<TileLayout, LayoutError> {
        if sheet_number == 0 {
            return Err(LayoutError::InvalidSheetNumber);
        }
        let per_sheet = self.pages_per_sheet();
        let first = (sheet_number - 1).saturating_mul(per_sheet) + 1;
        let last = sheet_number.saturating_mul(per_sheet).min(page_count);

        let tiles = (first..=last)
            .map(|page| {
                let origin = self.tile_origin(page);
                Tile {
                    logical_page: page,
                    x: origin.x,
                    y: origin.y,
                    width: self.tile_size.width,
                    height: self.tile_size.height,
                }
            })
            .collect();

        Ok(TileLayout {
            sheet_number,
            tiles,
            header_bounds: self.header_bounds,
            footer_bounds: self.footer_bounds,
            content_bounds: self.content_bounds,
        })
    }
}

/// Places logical pages on physical sheet `sheet_number` (1-based).
/// 計算第 `sheet_number` 張實體紙上各邏輯頁面的位置。
pub fn compose_sheet(
    snapshot: &SheetSnapshot,
    physical: &PhysicalPageGeometry,
    page_count: usize,
    sheet_number: usize,
) -> Result<TileLayout, LayoutError> {
    resolve_frame(snapshot, physical)?.compose(page_count, sheet_number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::AdvanceTableMetrics;
    use crate::sheet::HeaderFooterDefinition;

    fn bare_sheet(rows: u32, columns: u32, padding: f32) -> SheetDefinition {
        SheetDefinition {
            rows,
            columns,
            padding,
            landscape: false,
            margins: Margin::uniform(20.0),
            header: HeaderFooterDefinition::disabled(),
            footer: HeaderFooterDefinition::disabled(),
            ..SheetDefinition::default_one_up()
        }
    }

    fn snapshot(sheet: &SheetDefinition) -> SheetSnapshot {
        SheetSnapshot::new(sheet, &AdvanceTableMetrics::monospace())
    }

    fn letter(hard_margin: f32, angle: u32) -> PhysicalPageGeometry {
        PhysicalPageGeometry::from_paper(PaperSize::letter(), hard_margin, angle)
    }

    fn custom(width: f32, height: f32) -> PhysicalPageGeometry {
        PhysicalPageGeometry {
            paper_size: Size::new(width, height),
            printable_area: Rect::new(0.0, 0.0, width, height),
            hard_margin_x: 0.0,
            hard_margin_y: 0.0,
            landscape_angle: 90,
            resolution: 72.0,
        }
    }

    #[test]
    fn two_by_two_with_five_pages_needs_two_sheets() {
        let sheet = bare_sheet(2, 2, 0.0);
        let snap = snapshot(&sheet);
        let physical = custom(240.0, 240.0);

        let first = compose_sheet(&snap, &physical, 5, 1).unwrap();
        let pages: Vec<usize> = first.tiles.iter().map(|t| t.logical_page).collect();
        assert_eq!(pages, vec![1, 2, 3, 4]);
        // 200x200 content split into four 100x100 tiles, row-major.
        assert_eq!((first.tiles[1].x, first.tiles[1].y), (120.0, 20.0));
        assert_eq!((first.tiles[2].x, first.tiles[2].y), (20.0, 120.0));

        let second = compose_sheet(&snap, &physical, 5, 2).unwrap();
        assert_eq!(second.tiles.len(), 1);
        assert_eq!(second.tiles[0].logical_page, 5);
        assert_eq!((second.tiles[0].x, second.tiles[0].y), (20.0, 20.0));
        assert_eq!(sheet_count(5, 2, 2), 2);
    }

    #[test]
    fn padding_is_distributed_between_tiles() {
        let sheet = bare_sheet(1, 3, 6.0);
        let frame = resolve_frame(&snapshot(&sheet), &custom(340.0, 140.0)).unwrap();
        // 300 wide: 300/3 - 6*2/3 = 96.
        assert_eq!(frame.tile_size, Size::new(96.0, 100.0));
        let layout = frame.compose(3, 1).unwrap();
        assert_eq!(layout.tiles[2].x + layout.tiles[2].width, 320.0);
        assert_eq!(layout.tiles[1].x - (layout.tiles[0].x + 96.0), 6.0);
    }

    #[test]
    fn zero_pages_keep_bands_but_no_tiles() {
        let sheet = SheetDefinition::default_two_up();
        let layout = compose_sheet(&snapshot(&sheet), &letter(12.0, 90), 0, 1).unwrap();
        assert!(layout.tiles.is_empty());
        assert!(layout.header_bounds.height > 0.0);
        assert!(layout.footer_bounds.height > 0.0);
    }

    #[test]
    fn sheet_beyond_the_last_is_empty_and_sheet_zero_is_rejected() {
        let snap = snapshot(&bare_sheet(1, 2, 0.0));
        let physical = letter(0.0, 90);
        assert!(compose_sheet(&snap, &physical, 3, 3).unwrap().tiles.is_empty());
        assert_eq!(
            compose_sheet(&snap, &physical, 3, 0),
            Err(LayoutError::InvalidSheetNumber)
        );
    }

    #[test]
    fn header_and_footer_reserve_band_height() {
        let mut sheet = bare_sheet(1, 1, 0.0);
        sheet.header = HeaderFooterDefinition::header();
        sheet.footer = HeaderFooterDefinition::footer();
        sheet.header.vertical_padding = 5.0;
        sheet.footer.vertical_padding = 5.0;
        let snap = snapshot(&sheet);
        // 10pt font with 1.25 line spacing plus padding.
        assert_eq!(snap.header_height, 17.5);

        let frame = resolve_frame(&snap, &custom(240.0, 300.0)).unwrap();
        assert_eq!(frame.header_bounds, Rect::new(20.0, 20.0, 200.0, 17.5));
        assert_eq!(frame.footer_bounds, Rect::new(20.0, 262.5, 200.0, 17.5));
        assert_eq!(frame.content_bounds, Rect::new(20.0, 37.5, 200.0, 225.0));
    }

    #[test]
    fn rotation_angles_are_validated() {
        assert_eq!(Rotation::try_from(90), Ok(Rotation::Deg90));
        assert_eq!(
            Rotation::try_from(180),
            Err(LayoutError::RotationAngleUnsupported(180))
        );
        let snap = snapshot(&bare_sheet(1, 1, 0.0));
        assert_eq!(
            resolve_frame(&snap, &letter(0.0, 45)),
            Err(LayoutError::RotationAngleUnsupported(45))
        );
    }

    #[test]
    fn hard_margin_edges_follow_the_rotation_table() {
        let cases = [
            (Rotation::Deg0, Edge::Left, Edge::Top),
            (Rotation::Deg90, Edge::Top, Edge::Right),
            (Rotation::Deg270, Edge::Bottom, Edge::Left),
        ];
        for (rotation, x_edge, y_edge) in cases {
            assert_eq!(rotation.map_edge(Edge::Left), x_edge, "{rotation:?}");
            assert_eq!(rotation.map_edge(Edge::Top), y_edge, "{rotation:?}");
        }
    }

    #[test]
    fn ninety_then_two_seventy_is_not_a_half_turn() {
        for edge in Edge::CLOCKWISE {
            let turned = Rotation::Deg270.map_edge(Rotation::Deg90.map_edge(edge));
            assert_eq!(turned, edge);
            assert_ne!(turned, edge.opposite());
        }
    }

    #[test]
    fn landscape_frame_places_hard_margins_by_angle() {
        let mut sheet = bare_sheet(1, 1, 0.0);
        sheet.landscape = true;
        let snap = snapshot(&sheet);
        let mut physical = letter(0.0, 90);
        physical.hard_margin_x = 12.0;
        physical.hard_margin_y = 18.0;

        let frame = resolve_frame(&snap, &physical).unwrap();
        assert_eq!(frame.hard_margins.top, 12.0);
        assert_eq!(frame.hard_margins.right, 18.0);
        assert_eq!(frame.hard_margins.left, 0.0);
        assert!(frame.paper.width > frame.paper.height);

        physical.landscape_angle = 270;
        let frame = resolve_frame(&snap, &physical).unwrap();
        assert_eq!(frame.hard_margins.bottom, 12.0);
        assert_eq!(frame.hard_margins.left, 18.0);

        sheet.landscape = false;
        let frame = resolve_frame(&snapshot(&sheet), &physical).unwrap();
        assert_eq!(frame.rotation, Rotation::Deg0);
        assert_eq!(frame.hard_margins.left, 12.0);
        assert_eq!(frame.hard_margins.top, 18.0);
    }

    #[test]
    fn margin_warning_fires_only_below_the_printable_offset() {
        let paper = Size::new(200.0, 300.0);
        let printable = Rect::new(10.0, 10.0, 180.0, 280.0);
        assert!(check_margins(&Margin::uniform(10.0), paper, printable).is_empty());
        assert!(check_margins(&Margin::uniform(11.0), paper, printable).is_empty());

        let warnings = check_margins(
            &Margin {
                left: 9.5,
                ..Margin::uniform(10.0)
            },
            paper,
            printable,
        );
        assert_eq!(
            warnings,
            vec![MarginWarning {
                edge: Edge::Left,
                configured: 9.5,
                minimum: 10.0
            }]
        );
    }

    #[test]
    fn frame_offsets_into_printable_coordinates() {
        let snap = snapshot(&bare_sheet(1, 1, 0.0));
        let frame = resolve_frame(&snap, &letter(24.0, 90)).unwrap();
        assert_eq!(frame.device_offset, Point::new(24.0, 24.0));
        assert_eq!(frame.margin_warnings().len(), 4);
    }

    #[test]
    fn degenerate_sheets_are_rejected() {
        let snap = snapshot(&bare_sheet(0, 2, 0.0));
        assert_eq!(
            resolve_frame(&snap, &custom(100.0, 100.0)),
            Err(LayoutError::InvalidSheet { rows: 0, columns: 2 })
        );

        let mut sheet = bare_sheet(1, 1, 0.0);
        sheet.margins = Margin::uniform(60.0);
        assert!(matches!(
            resolve_frame(&snapshot(&sheet), &custom(100.0, 100.0)),
            Err(LayoutError::InvalidGeometry { what: "content", .. })
        ));

        let crowded = bare_sheet(1, 4, 100.0);
        assert!(matches!(
            resolve_frame(&snapshot(&crowded), &custom(300.0, 300.0)),
            Err(LayoutError::InvalidGeometry { what: "tile", .. })
        ));
    }
}
