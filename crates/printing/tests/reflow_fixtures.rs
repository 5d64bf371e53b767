use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use sheetprint_printing::{reflow, AdvanceTableMetrics, FontSpec, MetricsProvider, PageGeometry};

#[derive(Debug, Deserialize)]
struct ReflowCase {
    name: String,
    width: f32,
    height: f32,
    line_numbers: bool,
    tab_spaces: usize,
    text: String,
    page_count: usize,
    lines: Vec<(String, usize)>,
}

fn load_cases() -> Vec<ReflowCase> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/reflow_cases.ron");
    let text = fs::read_to_string(&path)
        .unwrap_or_else(|err| panic!("failed to read fixture {:?}: {err}", path));
    ron::from_str(&text).expect("parse reflow fixtures")
}

#[test]
fn reflow_matches_fixtures() {
    let metrics = AdvanceTableMetrics::monospace();
    let cases = load_cases();
    assert!(!cases.is_empty());

    for case in cases {
        let geometry = PageGeometry {
            width: case.width,
            height: case.height,
            font: FontSpec::monospace(10.0),
            line_numbers: case.line_numbers,
            line_number_separator: case.line_numbers,
            tab_spaces: case.tab_spaces,
            new_page_on_form_feed: false,
        };
        let output = reflow(&case.text, &geometry, &metrics)
            .unwrap_or_else(|err| panic!("{}: reflow failed: {err}", case.name));

        let actual: Vec<(String, usize)> = output
            .lines
            .iter()
            .map(|line| (line.text.clone(), line.line_number))
            .collect();
        assert_eq!(actual, case.lines, "{}", case.name);
        assert_eq!(output.page_count, case.page_count, "{}", case.name);
    }
}

#[test]
fn every_line_fits_the_text_column() {
    let metrics = AdvanceTableMetrics::proportional();
    let text = "The quick brown fox jumps over the lazy dog. ".repeat(40);
    let geometry = PageGeometry {
        width: 180.0,
        height: 300.0,
        font: FontSpec::sans_serif(9.0),
        line_numbers: true,
        line_number_separator: true,
        tab_spaces: 4,
        new_page_on_form_feed: false,
    };
    let output = reflow(&text, &geometry, &metrics).unwrap();
    let column = geometry.width - output.gutter_width;

    let rejoined: String = output.lines.iter().map(|line| line.text.as_str()).collect();
    assert_eq!(rejoined, text);
    for line in &output.lines {
        assert!(
            metrics.text_width(&line.text, &geometry.font) <= column,
            "line {:?} overflows {column}",
            line.text
        );
    }
    assert_eq!(
        output.page_count,
        output.lines.len().div_ceil(output.lines_per_page)
    );
}
