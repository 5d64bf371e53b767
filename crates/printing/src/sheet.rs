use serde::{Deserialize, Serialize};

use crate::job::{Margin, Orientation};
use crate::metrics::{FontSpec, FontStyle};
use crate::reflow::ContentSettings;

pub const DEFAULT_HEADER_TEXT: &str = "{DateRevised:D}|{FullPath}|Type: {FileType}";
pub const DEFAULT_FOOTER_TEXT: &str = "{FileName}||Page {Page} of {NumPages}";

/// Thirty hundredths of an inch.
pub const DEFAULT_MARGIN_PT: f32 = 21.6;

/// Which edges of a header/footer band get a border line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BorderFlags {
    #[serde(default)]
    pub left: bool,
    #[serde(default)]
    pub top: bool,
    #[serde(default)]
    pub right: bool,
    #[serde(default)]
    pub bottom: bool,
}

impl BorderFlags {
    pub const fn none() -> Self {
        Self {
            left: false,
            top: false,
            right: false,
            bottom: false,
        }
    }

    pub const fn top_only() -> Self {
        Self {
            top: true,
            ..Self::none()
        }
    }

    pub const fn bottom_only() -> Self {
        Self {
            bottom: true,
            ..Self::none()
        }
    }
}

/// Header or footer band configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderFooterDefinition {
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_band_font")]
    pub font: FontSpec,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub borders: BorderFlags,
    /// Space added below the text line inside the band, in points.
    #[serde(default = "default_vertical_padding")]
    pub vertical_padding: f32,
}

fn default_true() -> bool {
    true
}

fn default_band_font() -> FontSpec {
    FontSpec::sans_serif(10.0).with_style(FontStyle::Bold)
}

fn default_vertical_padding() -> f32 {
    7.2
}

impl HeaderFooterDefinition {
    pub fn header() -> Self {
        Self {
            text: DEFAULT_HEADER_TEXT.to_string(),
            font: default_band_font(),
            enabled: true,
            borders: BorderFlags::bottom_only(),
            vertical_padding: default_vertical_padding(),
        }
    }

    pub fn footer() -> Self {
        Self {
            text: DEFAULT_FOOTER_TEXT.to_string(),
            borders: BorderFlags::top_only(),
            ..Self::header()
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::header()
        }
    }

    fn sanitize(&mut self) {
        if !(self.vertical_padding >= 0.0) {
            self.vertical_padding = 0.0;
        }
        if !(self.font.size_pt > 0.0) {
            self.font = default_band_font();
        }
    }
}

impl Default for HeaderFooterDefinition {
    fn default() -> Self {
        Self::header()
    }
}

/// User-configurable N-up sheet layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetDefinition {
    pub name: String,
    #[serde(default = "default_one")]
    pub rows: u32,
    #[serde(default = "default_one")]
    pub columns: u32,
    /// Gap between neighbouring tiles, in points.
    #[serde(default)]
    pub padding: f32,
    #[serde(default)]
    pub page_separator: bool,
    #[serde(default)]
    pub landscape: bool,
    #[serde(default = "default_margins")]
    pub margins: Margin,
    #[serde(default = "HeaderFooterDefinition::header")]
    pub header: HeaderFooterDefinition,
    #[serde(default = "HeaderFooterDefinition::footer")]
    pub footer: HeaderFooterDefinition,
    #[serde(default)]
    pub content: ContentSettings,
}

fn default_one() -> u32 {
    1
}

fn default_margins() -> Margin {
    Margin::uniform(DEFAULT_MARGIN_PT)
}

impl SheetDefinition {
    /// Two portrait pages side by side on a landscape sheet.
    pub fn default_two_up() -> Self {
        Self {
            name: "Default 2-Up".to_string(),
            rows: 1,
            columns: 2,
            padding: 2.16,
            page_separator: true,
            landscape: true,
            margins: default_margins(),
            header: HeaderFooterDefinition::header(),
            footer: HeaderFooterDefinition::footer(),
            content: ContentSettings::default(),
        }
    }

    pub fn default_one_up() -> Self {
        Self {
            name: "Default 1-Up".to_string(),
            columns: 1,
            padding: 0.0,
            page_separator: false,
            landscape: false,
            ..Self::default_two_up()
        }
    }

    pub fn orientation(&self) -> Orientation {
        Orientation::from_landscape(self.landscape)
    }

    pub fn pages_per_sheet(&self) -> u32 {
        self.rows.saturating_mul(self.columns)
    }

    /// Clamps counts to at least one and lengths to non-negative values.
    pub fn sanitize(&mut self) {
        self.rows = self.rows.max(1);
        self.columns = self.columns.max(1);
        if !(self.padding >= 0.0) {
            self.padding = 0.0;
        }
        self.margins = self.margins.non_negative();
        self.header.sanitize();
        self.footer.sanitize();
        self.content.sanitize();
    }
}

impl Default for SheetDefinition {
    fn default() -> Self {
        Self::default_two_up()
    }
}
