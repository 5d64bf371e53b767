use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::{tempdir, TempDir};

fn numbered_lines(count: usize) -> String {
    (1..=count)
        .map(|n| format!("line {n}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A temp workspace with a settings path that does not exist yet, so defaults apply.
fn workspace() -> Result<(TempDir, PathBuf), Box<dyn Error>> {
    let dir = tempdir()?;
    let config = dir.path().join("sheets.json");
    Ok((dir, config))
}

fn cli(config: &Path) -> Result<Command, Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("sheetprint-cli")?;
    cmd.args(["--config", config.to_str().unwrap()]);
    Ok(cmd)
}

#[test]
fn count_reports_pages_and_two_up_sheets() -> Result<(), Box<dyn Error>> {
    let (dir, config) = workspace()?;
    let input = dir.path().join("long.txt");
    fs::write(&input, numbered_lines(120))?;

    cli(&config)?
        .args(["count", input.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("pages: 3"))
        .stdout(predicate::str::contains("sheets: 2"));

    cli(&config)?
        .args(["--sheet", "default-1up", "count", input.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("pages: 2"))
        .stdout(predicate::str::contains("sheets: 2"));

    assert!(!config.exists(), "read-only commands must not write settings");
    Ok(())
}

#[test]
fn reflow_prints_numbers_and_blank_continuations() -> Result<(), Box<dyn Error>> {
    let (dir, config) = workspace()?;
    let input = dir.path().join("wrap.txt");
    // 89 characters fit next to the gutter of a default 2-up tile.
    fs::write(&input, format!("alpha\n{}", "x".repeat(100)))?;

    let expected = format!(
        "    1  alpha\n    2  {}\n       {}\n",
        "x".repeat(89),
        "x".repeat(11)
    );
    cli(&config)?
        .args(["reflow", input.to_str().unwrap()])
        .assert()
        .success()
        .stdout(expected);
    Ok(())
}

#[test]
fn reflow_rejects_html_content() -> Result<(), Box<dyn Error>> {
    let (dir, config) = workspace()?;
    let input = dir.path().join("page.html");
    fs::write(&input, "<p>hello</p>")?;

    cli(&config)?
        .args(["reflow", input.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("only text content"));

    cli(&config)?
        .args(["count", input.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("pages: 1"));
    Ok(())
}

#[test]
fn layout_emits_json_tiles() -> Result<(), Box<dyn Error>> {
    let (dir, config) = workspace()?;
    let input = dir.path().join("long.txt");
    fs::write(&input, numbered_lines(120))?;

    let output = cli(&config)?
        .args(["layout", input.to_str().unwrap()])
        .output()?;
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(report["page_count"], 3);
    assert_eq!(report["sheet_count"], 2);
    assert_eq!(report["frame"]["columns"], 2);
    assert_eq!(report["sheets"].as_array().unwrap().len(), 2);
    assert_eq!(report["sheets"][1]["tiles"][0]["logical_page"], 3);
    assert!(report["margin_warnings"].as_array().unwrap().is_empty());

    let output = cli(&config)?
        .args(["layout", input.to_str().unwrap(), "--sheet-number", "2"])
        .output()?;
    let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let sheets = report["sheets"].as_array().unwrap();
    assert_eq!(sheets.len(), 1);
    assert_eq!(sheets[0]["sheet_number"], 2);
    Ok(())
}

#[test]
fn layout_reports_margin_warnings_for_large_hard_margins() -> Result<(), Box<dyn Error>> {
    let (dir, config) = workspace()?;
    let input = dir.path().join("short.txt");
    fs::write(&input, "hello")?;

    let output = cli(&config)?
        .args([
            "layout",
            input.to_str().unwrap(),
            "--paper",
            "a4",
            "--hard-margin",
            "30",
        ])
        .output()?;
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(report["margin_warnings"].as_array().unwrap().len(), 4);
    assert_eq!(report["margin_warnings"][0]["minimum"], 30.0);
    Ok(())
}

#[test]
fn out_of_range_sheet_number_fails() -> Result<(), Box<dyn Error>> {
    let (dir, config) = workspace()?;
    let input = dir.path().join("short.txt");
    fs::write(&input, "hello")?;

    cli(&config)?
        .args(["layout", input.to_str().unwrap(), "--sheet-number", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("sheet 5 is out of range"));
    Ok(())
}

#[test]
fn preview_writes_png_of_the_rotated_sheet() -> Result<(), Box<dyn Error>> {
    let (dir, config) = workspace()?;
    let input = dir.path().join("long.txt");
    fs::write(&input, numbered_lines(120))?;
    let out = dir.path().join("previews/sheet2.png");

    let output = cli(&config)?
        .args([
            "preview",
            input.to_str().unwrap(),
            "--out",
            out.to_str().unwrap(),
            "--sheet-number",
            "2",
            "--zoom",
            "200",
        ])
        .output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.starts_with("Wrote sheet 2 of 2"), "{stdout}");

    let image = image::open(&out)?;
    assert!(stdout.contains(&format!("({}x{} px)", image.width(), image.height())));
    assert!(image.width() > image.height(), "landscape sheet");
    assert!((1584..=1586).contains(&image.width()));
    Ok(())
}

#[test]
fn expand_substitutes_macros() -> Result<(), Box<dyn Error>> {
    let (dir, config) = workspace()?;
    let input = dir.path().join("notes.txt");
    fs::write(&input, "hello")?;

    cli(&config)?
        .args([
            "expand",
            "{FileName}||Page {Page} of {NumPages} {Nope} {Page:D3}",
            "--file",
            input.to_str().unwrap(),
            "--page",
            "2",
            "--pages",
            "5",
        ])
        .assert()
        .success()
        .stdout("notes.txt||Page 2 of 5 {Nope} 002\n");
    Ok(())
}

#[test]
fn unknown_sheet_is_reported() -> Result<(), Box<dyn Error>> {
    let (dir, config) = workspace()?;
    let input = dir.path().join("short.txt");
    fs::write(&input, "hello")?;

    cli(&config)?
        .args(["--sheet", "poster", "count", input.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no sheet definition named `poster`"));
    Ok(())
}

#[test]
fn custom_sheets_come_from_the_config_file() -> Result<(), Box<dyn Error>> {
    let (dir, config) = workspace()?;
    fs::write(
        &config,
        r#"{
            "default_sheet": "quad",
            "sheets": {
                "quad": { "name": "Quad", "rows": 2, "columns": 2, "padding": 4.0 }
            }
        }"#,
    )?;
    let input = dir.path().join("short.txt");
    fs::write(&input, "hello")?;

    cli(&config)?
        .arg("sheets")
        .assert()
        .success()
        .stdout(predicate::str::contains("* quad\tQuad\t2x2"));

    let output = cli(&config)?
        .args(["layout", input.to_str().unwrap()])
        .output()?;
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(report["frame"]["rows"], 2);
    assert_eq!(report["frame"]["columns"], 2);
    assert_eq!(report["sheets"][0]["tiles"].as_array().unwrap().len(), 1);
    Ok(())
}
