use sheetprint_settings::{Settings, SettingsError, SettingsStore, DEFAULT_ONE_UP_ID};
use std::fs;
use tempfile::tempdir;

#[test]
fn load_missing_file_returns_defaults() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("sheets.json");

    let store = SettingsStore::load(&path).expect("load defaults");
    assert_eq!(store.settings(), &Settings::default());
    assert!(!path.exists(), "loading must not create the file");
}

#[test]
fn save_creates_parent_directories_and_roundtrips() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("nested/config/sheets.json");

    let mut store = SettingsStore::new(path.clone(), Settings::default());
    store
        .update(|settings| {
            settings.default_sheet = DEFAULT_ONE_UP_ID.to_string();
            let sheet = settings.sheets.get_mut(DEFAULT_ONE_UP_ID).unwrap();
            sheet.header.text = "{Title}".to_string();
            sheet.content.line_numbers = false;
            settings.diagnostics.print.content_bounds = true;
        })
        .expect("save");

    let reloaded = SettingsStore::load(&path).expect("reload");
    let settings = reloaded.settings();
    assert_eq!(settings.default_sheet, DEFAULT_ONE_UP_ID);
    let sheet = settings.find_sheet(None).unwrap();
    assert_eq!(sheet.header.text, "{Title}");
    assert!(!sheet.content.line_numbers);
    assert!(settings.diagnostics.print.content_bounds);
}

#[test]
fn partial_file_takes_defaults_and_is_sanitized() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("sheets.json");
    fs::write(
        &path,
        r#"{
            "version": 0,
            "default_sheet": "poster",
            "sheets": {
                "poster": {
                    "name": "Poster 3x3",
                    "rows": 3,
                    "columns": 0,
                    "padding": -2.0
                }
            }
        }"#,
    )
    .expect("write settings");

    let store = SettingsStore::load(&path).expect("load partial file");
    let settings = store.settings();
    assert_eq!(settings.version, 1);
    assert_eq!(settings.default_sheet, "poster");

    let poster = settings.find_sheet(Some("poster 3X3")).unwrap();
    assert_eq!(poster.rows, 3);
    assert_eq!(poster.columns, 1);
    assert_eq!(poster.padding, 0.0);
    assert!(poster.header.enabled);
    assert_eq!(poster.margins.top, 21.6);
    assert!(settings.diagnostics.preview.margin_warnings);
}

#[test]
fn malformed_file_reports_parse_error_with_path() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("sheets.json");
    fs::write(&path, "{ not json").expect("write");

    let err = SettingsStore::load(&path).unwrap_err();
    match err {
        SettingsError::Parse { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("unexpected error: {other}"),
    }
}
