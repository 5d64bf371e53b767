use serde::{Deserialize, Serialize};
use sheetprint_printing::{DiagnosticOptions, SheetDefinition};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const SETTINGS_VERSION: u32 = 1;

/// Id of the built-in two-up landscape sheet.
pub const DEFAULT_TWO_UP_ID: &str = "default-2up";
/// Id of the built-in one-up portrait sheet.
pub const DEFAULT_ONE_UP_ID: &str = "default-1up";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse settings {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize settings {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write settings {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to prepare directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no sheet definition named `{name}`")]
    SheetNotFound { name: String },
}

/// Overlay switches applied to on-screen previews and to printed output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticSettings {
    #[serde(default = "default_preview_diagnostics")]
    pub preview: DiagnosticOptions,
    #[serde(default)]
    pub print: DiagnosticOptions,
}

fn default_preview_diagnostics() -> DiagnosticOptions {
    DiagnosticOptions {
        margin_warnings: true,
        ..DiagnosticOptions::default()
    }
}

impl Default for DiagnosticSettings {
    fn default() -> Self {
        Self {
            preview: default_preview_diagnostics(),
            print: DiagnosticOptions::default(),
        }
    }
}

/// Persisted sheet definitions and diagnostics switches.
/// 已儲存的版面定義與診斷圖層設定。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_sheet_id")]
    pub default_sheet: String,
    #[serde(default = "builtin_sheets")]
    pub sheets: BTreeMap<String, SheetDefinition>,
    #[serde(default)]
    pub diagnostics: DiagnosticSettings,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

fn default_sheet_id() -> String {
    DEFAULT_TWO_UP_ID.to_string()
}

fn builtin_sheets() -> BTreeMap<String, SheetDefinition> {
    BTreeMap::from([
        (
            DEFAULT_TWO_UP_ID.to_string(),
            SheetDefinition::default_two_up(),
        ),
        (
            DEFAULT_ONE_UP_ID.to_string(),
            SheetDefinition::default_one_up(),
        ),
    ])
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            default_sheet: default_sheet_id(),
            sheets: builtin_sheets(),
            diagnostics: DiagnosticSettings::default(),
        }
    }
}

impl Settings {
    pub fn sanitize(&mut self) {
        if self.version == 0 {
            self.version = SETTINGS_VERSION;
        }
        for sheet in self.sheets.values_mut() {
            sheet.sanitize();
        }
        if !self.sheets.contains_key(&self.default_sheet) {
            for (id, sheet) in builtin_sheets() {
                self.sheets.entry(id).or_insert(sheet);
            }
            self.default_sheet = default_sheet_id();
        }
    }

    /// Resolves `None` or `"default"` to the default sheet, then tries the id and finally
    /// a case-insensitive match on the sheet name.
    /// 依序以預設值、識別碼、名稱（不分大小寫）尋找版面定義。
    pub fn find_sheet(&self, name: Option<&str>) -> Result<&SheetDefinition, SettingsError> {
        let wanted = match name {
            None => self.default_sheet.as_str(),
            Some(name) if name.eq_ignore_ascii_case("default") => self.default_sheet.as_str(),
            Some(name) => name,
        };
        if let Some(sheet) = self.sheets.get(wanted) {
            return Ok(sheet);
        }
        self.sheets
            .iter()
            .find(|(id, sheet)| {
                id.eq_ignore_ascii_case(wanted) || sheet.name.eq_ignore_ascii_case(wanted)
            })
            .map(|(_, sheet)| sheet)
            .ok_or_else(|| SettingsError::SheetNotFound {
                name: wanted.to_string(),
            })
    }

    pub fn sheet_ids(&self) -> impl Iterator<Item = &str> {
        self.sheets.keys().map(String::as_str)
    }
}

#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    data: Settings,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>, settings: Settings) -> Self {
        Self {
            path: path.into(),
            data: settings,
        }
    }

    /// Loads `path`, falling back to the built-in defaults when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            let mut data = Settings::default();
            data.sanitize();
            return Ok(Self { path, data });
        }

        let contents = fs::read_to_string(&path).map_err(|source| SettingsError::Read {
            path: path.clone(),
            source,
        })?;
        let mut data: Settings =
            serde_json::from_str(&contents).map_err(|source| SettingsError::Parse {
                path: path.clone(),
                source,
            })?;
        data.sanitize();
        Ok(Self { path, data })
    }

    pub fn settings(&self) -> &Settings {
        &self.data
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.data
    }

    pub fn update<F>(&mut self, mut op: F) -> Result<(), SettingsError>
    where
        F: FnMut(&mut Settings),
    {
        op(&mut self.data);
        self.data.sanitize();
        self.save()
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| SettingsError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let payload = serde_json::to_string_pretty(&self.data).map_err(|source| {
            SettingsError::Serialize {
                path: self.path.clone(),
                source,
            }
        })?;

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, payload.as_bytes()).map_err(|source| SettingsError::Write {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|source| SettingsError::Write {
            path: self.path.clone(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_both_builtin_sheets() {
        let settings = Settings::default();
        assert_eq!(settings.default_sheet, DEFAULT_TWO_UP_ID);
        let ids: Vec<&str> = settings.sheet_ids().collect();
        assert_eq!(ids, vec![DEFAULT_ONE_UP_ID, DEFAULT_TWO_UP_ID]);
        assert!(settings.diagnostics.preview.margin_warnings);
        assert!(!settings.diagnostics.print.margin_warnings);
    }

    #[test]
    fn find_sheet_accepts_default_id_and_name() {
        let settings = Settings::default();
        assert_eq!(settings.find_sheet(None).unwrap().columns, 2);
        assert_eq!(settings.find_sheet(Some("DEFAULT")).unwrap().columns, 2);
        assert_eq!(settings.find_sheet(Some("default-1up")).unwrap().columns, 1);
        assert_eq!(settings.find_sheet(Some("default 1-up")).unwrap().columns, 1);
        assert!(matches!(
            settings.find_sheet(Some("poster")),
            Err(SettingsError::SheetNotFound { ref name }) if name == "poster"
        ));
    }

    #[test]
    fn sanitize_restores_a_missing_default_sheet() {
        let mut settings = Settings {
            default_sheet: "gone".into(),
            sheets: BTreeMap::new(),
            ..Settings::default()
        };
        settings.sanitize();
        assert_eq!(settings.default_sheet, DEFAULT_TWO_UP_ID);
        assert_eq!(settings.sheets.len(), 2);
    }

    #[test]
    fn sanitize_clamps_sheet_values() {
        let mut settings = Settings::default();
        let sheet = settings.sheets.get_mut(DEFAULT_ONE_UP_ID).unwrap();
        sheet.rows = 0;
        sheet.padding = -3.0;
        sheet.margins.left = -1.0;
        sheet.content.tab_spaces = 400;
        settings.sanitize();

        let sheet = &settings.sheets[DEFAULT_ONE_UP_ID];
        assert_eq!(sheet.rows, 1);
        assert_eq!(sheet.padding, 0.0);
        assert_eq!(sheet.margins.left, 0.0);
        assert_eq!(sheet.content.tab_spaces, 16);
    }
}
