//! Persisted sheet definitions for the print engine.
//! 列印引擎的版面定義設定檔。

pub mod sheets;

pub use sheets::{
    DiagnosticSettings, Settings, SettingsError, SettingsStore, DEFAULT_ONE_UP_ID,
    DEFAULT_TWO_UP_ID,
};
