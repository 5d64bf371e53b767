use std::borrow::Cow;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

static MACRO_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{+(?P<name>[\w.\[\]]+)(?::(?P<format>[^}]+))?\}+")
        .expect("built-in macro pattern must compile")
});

/// Values a header/footer template may reference, for one sheet paint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MacroContext {
    pub file_name: String,
    pub full_path: String,
    pub file_extension: String,
    pub file_name_without_extension: String,
    pub file_directory_name: String,
    pub title: String,
    pub date_revised: Option<NaiveDateTime>,
    pub date_created: Option<NaiveDateTime>,
    pub date_printed: Option<NaiveDateTime>,
    /// Physical sheet number, 1-based.
    pub page: usize,
    /// Physical sheet count.
    pub num_pages: usize,
    pub content_type_name: String,
    pub language: String,
}

/// A resolved macro value before formatting.
#[derive(Debug, Clone, PartialEq)]
pub enum MacroValue {
    Text(String),
    Number(i64),
    Date(Option<NaiveDateTime>),
}

impl MacroContext {
    /// Names and file dates for `path`. Missing metadata leaves the dates empty.
    pub fn for_file(path: &Path) -> Self {
        let text = |value: Option<&std::ffi::OsStr>| {
            value
                .map(|v| v.to_string_lossy().into_owned())
                .unwrap_or_default()
        };
        let full_path = fs::canonicalize(path)
            .unwrap_or_else(|_| path.to_path_buf())
            .display()
            .to_string();
        let metadata = fs::metadata(path).ok();
        let local = |time: std::io::Result<std::time::SystemTime>| {
            time.ok()
                .map(|t| DateTime::<Local>::from(t).naive_local())
        };

        Self {
            file_name: text(path.file_name()),
            file_extension: path
                .extension()
                .map(|ext| format!(".{}", ext.to_string_lossy()))
                .unwrap_or_default(),
            file_name_without_extension: text(path.file_stem()),
            file_directory_name: text(path.parent().map(|p| p.as_os_str())),
            title: full_path.clone(),
            full_path,
            date_revised: metadata.as_ref().and_then(|m| local(m.modified())),
            date_created: metadata.as_ref().and_then(|m| local(m.created())),
            date_printed: Some(Local::now().naive_local()),
            ..Self::default()
        }
    }

    pub fn with_pages(mut self, page: usize, num_pages: usize) -> Self {
        self.page = page;
        self.num_pages = num_pages;
        self
    }

    pub fn with_content_type(mut self, name: impl Into<String>, language: impl Into<String>) -> Self {
        self.content_type_name = name.into();
        self.language = language.into();
        self
    }

    /// Resolves a macro identifier, case-insensitively.
    pub fn lookup(&self, name: &str) -> Option<MacroValue> {
        let text = |value: &str| Some(MacroValue::Text(value.to_string()));
        let or = |value: &str, fallback: &str| {
            if value.is_empty() {
                text(fallback)
            } else {
                text(value)
            }
        };
        match name.to_ascii_lowercase().as_str() {
            "filename" => or(&self.file_name, &self.title),
            "fullpath" | "fullyqualifiedpath" => text(&self.full_path),
            "fileextension" => text(&self.file_extension),
            "filenamewithoutextension" => text(&self.file_name_without_extension),
            "filedirectoryname" => text(&self.file_directory_name),
            "title" => or(&self.title, &self.full_path),
            "contenttypename" | "filetype" => text(&self.content_type_name),
            "language" => text(&self.language),
            "daterevised" => Some(MacroValue::Date(self.date_revised)),
            "datecreated" => Some(MacroValue::Date(self.date_created)),
            "dateprinted" => Some(MacroValue::Date(self.date_printed)),
            "page" => Some(MacroValue::Number(self.page as i64)),
            "numpages" => Some(MacroValue::Number(self.num_pages as i64)),
            _ => None,
        }
    }
}

/// Replaces every `{Name[:format]}` token in `template`.
///
/// Unknown names and unusable formats leave the token as literal text. Repeated braces
/// around a token are consumed with it; stray braces outside a token are kept.
pub fn substitute(template: &str, context: &MacroContext) -> String {
    let replaced: Cow<'_, str> = MACRO_PATTERN.replace_all(template, |caps: &Captures<'_>| {
        let literal = caps[0].to_string();
        let name = &caps["name"];
        let format = caps.name("format").map(|m| m.as_str());
        let Some(value) = context.lookup(name) else {
            debug!(name, "unknown macro left as literal");
            return literal;
        };
        match format_value(&value, format) {
            Some(rendered) => rendered,
            None => {
                debug!(name, format, "invalid macro format left as literal");
                literal
            }
        }
    });
    replaced.into_owned()
}

/// Identifiers referenced by `template`, in order of appearance.
pub fn macro_names(template: &str) -> Vec<String> {
    MACRO_PATTERN
        .captures_iter(template)
        .map(|caps| caps["name"].to_string())
        .collect()
}

fn format_value(value: &MacroValue, format: Option<&str>) -> Option<String> {
    match value {
        MacroValue::Text(text) => Some(text.clone()),
        MacroValue::Number(number) => format_number(*number, format.unwrap_or("G")),
        MacroValue::Date(None) => Some(String::new()),
        MacroValue::Date(Some(date)) => format_date(date, format.unwrap_or("G")),
    }
}

/// Standard numeric format strings: `D`, `N`, `F`, `X`/`x`, `G`, each with an optional
/// precision.
fn format_number(value: i64, format: &str) -> Option<String> {
    let mut chars = format.chars();
    let specifier = chars.next()?;
    let precision_text = chars.as_str();
    let precision = if precision_text.is_empty() {
        None
    } else {
        Some(precision_text.parse::<usize>().ok().filter(|p| *p <= 99)?)
    };

    let rendered = match specifier {
        'D' | 'd' => {
            let width = precision.unwrap_or(0);
            if value < 0 {
                format!("-{:0width$}", value.unsigned_abs())
            } else {
                format!("{value:0width$}")
            }
        }
        'F' | 'f' => format!("{:.*}", precision.unwrap_or(2), value as f64),
        'N' | 'n' => {
            let grouped = group_thousands(value.unsigned_abs());
            let sign = if value < 0 { "-" } else { "" };
            match precision.unwrap_or(2) {
                0 => format!("{sign}{grouped}"),
                p => format!("{sign}{grouped}.{}", "0".repeat(p)),
            }
        }
        'X' => format!("{:0width$X}", value, width = precision.unwrap_or(0)),
        'x' => format!("{:0width$x}", value, width = precision.unwrap_or(0)),
        'G' | 'g' => value.to_string(),
        _ => return None,
    };
    Some(rendered)
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn format_date(date: &NaiveDateTime, format: &str) -> Option<String> {
    let pattern = if format.contains('%') {
        format.to_string()
    } else if format.chars().count() == 1 {
        standard_date_pattern(format)?.to_string()
    } else {
        translate_custom_date(format)
    };
    strftime(date, &pattern)
}

/// Invariant-culture standard date formats.
fn standard_date_pattern(format: &str) -> Option<&'static str> {
    let pattern = match format {
        "d" => "%m/%d/%Y",
        "D" => "%A, %d %B %Y",
        "f" => "%A, %d %B %Y %H:%M",
        "F" => "%A, %d %B %Y %H:%M:%S",
        "g" => "%m/%d/%Y %H:%M",
        "G" => "%m/%d/%Y %H:%M:%S",
        "M" | "m" => "%B %d",
        "s" => "%Y-%m-%dT%H:%M:%S",
        "t" => "%H:%M",
        "T" => "%H:%M:%S",
        "u" => "%Y-%m-%d %H:%M:%SZ",
        "Y" | "y" => "%Y %B",
        _ => return None,
    };
    Some(pattern)
}

/// Converts a custom pattern such as `yyyy-MM-dd HH:mm` into strftime syntax.
fn translate_custom_date(format: &str) -> String {
    const TOKENS: &[(&str, &str)] = &[
        ("yyyy", "%Y"),
        ("yy", "%y"),
        ("MMMM", "%B"),
        ("MMM", "%b"),
        ("MM", "%m"),
        ("M", "%-m"),
        ("dddd", "%A"),
        ("ddd", "%a"),
        ("dd", "%d"),
        ("d", "%-d"),
        ("HH", "%H"),
        ("H", "%-H"),
        ("hh", "%I"),
        ("h", "%-I"),
        ("mm", "%M"),
        ("m", "%-M"),
        ("ss", "%S"),
        ("s", "%-S"),
        ("fff", "%3f"),
        ("tt", "%p"),
    ];

    let mut out = String::with_capacity(format.len() * 2);
    let mut rest = format;
    'outer: while let Some(ch) = rest.chars().next() {
        match ch {
            '\'' | '"' => {
                let body = &rest[1..];
                let end = body.find(ch).unwrap_or(body.len());
                out.push_str(&body[..end].replace('%', "%%"));
                rest = body.get(end + 1..).unwrap_or("");
                continue;
            }
            '\\' => {
                let mut escaped = rest[1..].chars();
                if let Some(next) = escaped.next() {
                    push_literal(&mut out, next);
                }
                rest = escaped.as_str();
                continue;
            }
            _ => {}
        }
        for (token, replacement) in TOKENS {
            if let Some(stripped) = rest.strip_prefix(token) {
                out.push_str(replacement);
                rest = stripped;
                continue 'outer;
            }
        }
        push_literal(&mut out, ch);
        rest = &rest[ch.len_utf8()..];
    }
    out
}

fn push_literal(out: &mut String, ch: char) {
    if ch == '%' {
        out.push_str("%%");
    } else {
        out.push(ch);
    }
}

fn strftime(date: &NaiveDateTime, pattern: &str) -> Option<String> {
    let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return None;
    }
    let mut out = String::new();
    write!(out, "{}", date.format_with_items(items.into_iter())).ok()?;
    Some(out)
}
