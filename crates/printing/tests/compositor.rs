use std::collections::BTreeSet;

use sheetprint_printing::{
    resolve_frame, sheet_count, AdvanceTableMetrics, HeaderFooterDefinition, Margin, PaperSize,
    PhysicalPageGeometry, Rect, SheetDefinition, SheetSnapshot,
};

const EPSILON: f32 = 1e-3;

fn sheet(rows: u32, columns: u32, padding: f32, landscape: bool) -> SheetDefinition {
    SheetDefinition {
        name: format!("{rows}x{columns}"),
        rows,
        columns,
        padding,
        landscape,
        margins: Margin::uniform(36.0),
        ..SheetDefinition::default_one_up()
    }
}

fn overlaps(a: &Rect, b: &Rect) -> bool {
    a.left() + EPSILON < b.right()
        && b.left() + EPSILON < a.right()
        && a.top() + EPSILON < b.bottom()
        && b.top() + EPSILON < a.bottom()
}

fn inside(outer: &Rect, inner: &Rect) -> bool {
    inner.left() + EPSILON >= outer.left()
        && inner.top() + EPSILON >= outer.top()
        && inner.right() <= outer.right() + EPSILON
        && inner.bottom() <= outer.bottom() + EPSILON
}

#[test]
fn tiles_cover_every_page_once_without_overlap() {
    let metrics = AdvanceTableMetrics::monospace();
    let physical = PhysicalPageGeometry::from_paper(PaperSize::a4(), 12.0, 90);

    for rows in 1..=3 {
        for columns in 1..=3 {
            for padding in [0.0, 4.5] {
                let definition = sheet(rows, columns, padding, columns > rows);
                let snapshot = SheetSnapshot::new(&definition, &metrics);
                let frame = resolve_frame(&snapshot, &physical).unwrap();

                for page_count in [1usize, 5, 9, 17] {
                    let sheets = sheet_count(page_count, rows, columns);
                    assert_eq!(sheets, frame.sheet_count(page_count));

                    let mut seen = BTreeSet::new();
                    for sheet_number in 1..=sheets {
                        let layout = frame.compose(page_count, sheet_number).unwrap();
                        assert!(!layout.tiles.is_empty());
                        assert!(layout.tiles.len() <= (rows * columns) as usize);

                        for (index, tile) in layout.tiles.iter().enumerate() {
                            assert!(
                                seen.insert(tile.logical_page),
                                "page {} placed twice",
                                tile.logical_page
                            );
                            assert!(inside(&layout.content_bounds, &tile.bounds()));
                            for other in &layout.tiles[index + 1..] {
                                assert!(
                                    !overlaps(&tile.bounds(), &other.bounds()),
                                    "{rows}x{columns}: pages {} and {} overlap",
                                    tile.logical_page,
                                    other.logical_page
                                );
                            }
                        }
                    }
                    let expected: BTreeSet<usize> = (1..=page_count).collect();
                    assert_eq!(seen, expected, "{rows}x{columns} with {page_count} pages");
                }
            }
        }
    }
}

#[test]
fn pages_fill_rows_left_to_right() {
    let metrics = AdvanceTableMetrics::monospace();
    let definition = sheet(2, 2, 0.0, false);
    let snapshot = SheetSnapshot::new(&definition, &metrics);
    let frame = resolve_frame(&snapshot, &PhysicalPageGeometry::viewport(PaperSize::letter())).unwrap();

    let layout = frame.compose(7, 2).unwrap();
    let pages: Vec<usize> = layout.tiles.iter().map(|tile| tile.logical_page).collect();
    assert_eq!(pages, vec![5, 6, 7]);
    assert_eq!(layout.tiles[0].y, layout.tiles[1].y);
    assert!(layout.tiles[1].x > layout.tiles[0].x);
    assert_eq!(layout.tiles[2].x, layout.tiles[0].x);
    assert!(layout.tiles[2].y > layout.tiles[0].y);
}

#[test]
fn landscape_swaps_paper_dimensions() {
    let metrics = AdvanceTableMetrics::monospace();
    let physical = PhysicalPageGeometry::from_paper(PaperSize::legal(), 0.0, 270);

    let portrait = resolve_frame(
        &SheetSnapshot::new(&sheet(1, 1, 0.0, false), &metrics),
        &physical,
    )
    .unwrap();
    let landscape = resolve_frame(
        &SheetSnapshot::new(&sheet(1, 1, 0.0, true), &metrics),
        &physical,
    )
    .unwrap();

    assert_eq!(landscape.paper.width, portrait.paper.height);
    assert_eq!(landscape.paper.height, portrait.paper.width);
    assert_eq!(landscape.rotation.degrees(), 270);
    assert_eq!(portrait.rotation.degrees(), 0);
}

#[test]
fn bands_sit_between_margins_and_content() {
    let metrics = AdvanceTableMetrics::monospace();
    let definition = SheetDefinition::default_two_up();
    let snapshot = SheetSnapshot::new(&definition, &metrics);
    let frame = resolve_frame(&snapshot, &PhysicalPageGeometry::viewport(PaperSize::a4())).unwrap();

    assert!((frame.header_bounds.bottom() - frame.content_bounds.top()).abs() < EPSILON);
    assert!((frame.content_bounds.bottom() - frame.footer_bounds.top()).abs() < EPSILON);
    assert!((frame.header_bounds.top() - definition.margins.top).abs() < EPSILON);

    let disabled = SheetDefinition {
        header: HeaderFooterDefinition::disabled(),
        footer: HeaderFooterDefinition::disabled(),
        ..definition
    };
    let bare = resolve_frame(
        &SheetSnapshot::new(&disabled, &metrics),
        &PhysicalPageGeometry::viewport(PaperSize::a4()),
    )
    .unwrap();
    assert!(bare.tile_size.height > frame.tile_size.height);
    assert_eq!(bare.header_bounds.height, 0.0);
}

#[test]
fn landscape_tiles_are_portrait_tiles_transposed() {
    let metrics = AdvanceTableMetrics::monospace();
    for angle in [90, 270] {
        let physical = PhysicalPageGeometry::from_paper(PaperSize::letter(), 0.0, angle);
        for (rows, columns) in [(1, 1), (2, 2), (1, 2), (3, 2)] {
            let bare = |rows: u32, columns: u32, landscape: bool| SheetDefinition {
                header: HeaderFooterDefinition::disabled(),
                footer: HeaderFooterDefinition::disabled(),
                ..sheet(rows, columns, 3.0, landscape)
            };
            let portrait = resolve_frame(
                &SheetSnapshot::new(&bare(rows, columns, false), &metrics),
                &physical,
            )
            .unwrap();
            let landscape = resolve_frame(
                &SheetSnapshot::new(&bare(columns, rows, true), &metrics),
                &physical,
            )
            .unwrap();

            assert!((portrait.tile_size.width - landscape.tile_size.height).abs() < EPSILON);
            assert!((portrait.tile_size.height - landscape.tile_size.width).abs() < EPSILON);
        }
    }
}
