use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use sheetprint_printing::{
    prepare, render_preview_png, substitute, AdvanceTableMetrics, CancelToken, Content,
    ContentKind, ContentServices, DiagnosticOptions, Document, MacroContext, MarginWarning,
    PaperId, PaperSize, Pagination, PhysicalPageGeometry, PreparedJob, PrintRequest,
    SheetDefinition, SheetFrame, TileLayout,
};
use sheetprint_settings::{Settings, SettingsStore};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const PREVIEW_BASE_DPI: u32 = 72;

#[derive(Parser)]
#[command(
    name = "sheetprint-cli",
    about = "Paginate documents and lay them out on printed sheets",
    author,
    version
)]
struct Cli {
    /// 版面設定檔；預設為 .sheetprint/sheets.json。 / Sheet settings file (defaults to .sheetprint/sheets.json).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// 使用的版面識別碼或名稱。 / Sheet id or name to print with.
    #[arg(long, global = true, value_name = "NAME")]
    sheet: Option<String>,

    /// 輸出除錯紀錄。 / Log debug output to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 計算邏輯頁數與紙張數。 / Count logical pages and physical sheets.
    Count(DocumentArgs),
    /// 列出重新排版後的每一行。 / Print every reflowed line with its line number.
    Reflow(DocumentArgs),
    /// 以 JSON 輸出紙張版面。 / Print sheet layouts as JSON.
    Layout(LayoutArgs),
    /// 將一張紙輸出為 PNG 預覽。 / Render one sheet to a PNG preview.
    Preview(PreviewArgs),
    /// 展開頁首頁尾範本中的巨集。 / Expand the macros of a header/footer template.
    Expand(ExpandArgs),
    /// 列出已設定的版面。 / List the configured sheets.
    Sheets,
}

#[derive(Args)]
struct PageArgs {
    /// 紙張大小。 / Paper size.
    #[arg(long, value_enum, default_value_t = PaperChoice::Letter)]
    paper: PaperChoice,

    /// 裝置的橫向旋轉角度。 / Landscape rotation reported by the device.
    #[arg(long, value_enum, default_value_t = AngleChoice::Deg90)]
    landscape_angle: AngleChoice,

    /// 每個邊的不可列印邊界（點）。 / Unprintable margin on every edge, in points.
    #[arg(long, value_name = "PT", default_value_t = 0.0)]
    hard_margin: f32,

    /// 覆寫由副檔名推得的內容類型。 / Content type overriding the one derived from the extension.
    #[arg(long, value_name = "TYPE")]
    content_type: Option<String>,
}

#[derive(Args)]
struct DocumentArgs {
    /// 要分頁的文件。 / Document to paginate.
    file: PathBuf,

    #[command(flatten)]
    page: PageArgs,
}

#[derive(Args)]
struct LayoutArgs {
    #[command(flatten)]
    document: DocumentArgs,

    /// 只輸出這一張紙（從 1 起算）。 / Only report this sheet (1-based).
    #[arg(long, value_name = "N")]
    sheet_number: Option<usize>,
}

#[derive(Args)]
struct PreviewArgs {
    #[command(flatten)]
    document: DocumentArgs,

    /// PNG 輸出路徑。 / Output PNG path.
    #[arg(long, value_name = "PATH")]
    out: PathBuf,

    /// 要預覽的紙張（從 1 起算）。 / Sheet to render (1-based).
    #[arg(long, value_name = "N", default_value_t = 1)]
    sheet_number: usize,

    /// 縮放百分比。 / Zoom in percent.
    #[arg(long, value_name = "PERCENT", default_value_t = 100)]
    zoom: u32,
}

#[derive(Args)]
struct ExpandArgs {
    /// 範本文字，例如 "{FileName}||Page {Page} of {NumPages}"。 / Template text.
    template: String,

    /// 提供檔名與日期巨集的檔案。 / File supplying the name and date macros.
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// {Page} 的值。 / Value of {Page}.
    #[arg(long, default_value_t = 1)]
    page: usize,

    /// {NumPages} 的值。 / Value of {NumPages}.
    #[arg(long, default_value_t = 1)]
    pages: usize,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PaperChoice {
    A4,
    Letter,
    Legal,
    A3,
}

impl From<PaperChoice> for PaperId {
    fn from(choice: PaperChoice) -> Self {
        match choice {
            PaperChoice::A4 => PaperId::A4,
            PaperChoice::Letter => PaperId::Letter,
            PaperChoice::Legal => PaperId::Legal,
            PaperChoice::A3 => PaperId::A3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum AngleChoice {
    #[value(name = "90")]
    Deg90,
    #[value(name = "270")]
    Deg270,
}

impl AngleChoice {
    fn degrees(self) -> u32 {
        match self {
            AngleChoice::Deg90 => 90,
            AngleChoice::Deg270 => 270,
        }
    }
}

/// Everything a command needs to paginate one document.
struct LoadedJob {
    content: Content,
    sheet: SheetDefinition,
    physical: PhysicalPageGeometry,
    services: ContentServices,
    macros: MacroContext,
    diagnostics: DiagnosticOptions,
}

impl LoadedJob {
    fn request(&self) -> PrintRequest<'_> {
        PrintRequest {
            content: &self.content,
            sheet: &self.sheet,
            physical: &self.physical,
            services: &self.services,
            macros: &self.macros,
            diagnostics: self.diagnostics,
        }
    }

    fn prepare(&self) -> Result<PreparedJob> {
        prepare(&self.request(), &CancelToken::new())
            .with_context(|| format!("failed to paginate {}", self.content.document.title()))
    }
}

#[derive(Serialize)]
struct LayoutReport<'a> {
    page_count: usize,
    sheet_count: usize,
    frame: &'a SheetFrame,
    margin_warnings: Vec<MarginWarning>,
    sheets: Vec<TileLayout>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let Cli {
        config,
        sheet,
        verbose,
        command,
    } = Cli::parse();
    init_tracing(verbose);

    let settings = load_settings(config.as_deref())?;
    let sheet = sheet.as_deref();
    match command {
        Commands::Count(args) => execute_count(&load_job(&settings, sheet, &args)?),
        Commands::Reflow(args) => execute_reflow(&load_job(&settings, sheet, &args)?),
        Commands::Layout(args) => {
            let job = load_job(&settings, sheet, &args.document)?;
            execute_layout(&job, args.sheet_number)
        }
        Commands::Preview(args) => {
            let mut job = load_job(&settings, sheet, &args.document)?;
            job.diagnostics = settings.diagnostics.preview;
            execute_preview(&job, &args)
        }
        Commands::Expand(args) => execute_expand(&args),
        Commands::Sheets => {
            list_sheets(&settings);
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(config: Option<&Path>) -> Result<Settings> {
    let path = match config {
        Some(path) => resolve_input_path(path)?,
        None => default_settings_path()?,
    };
    let store = SettingsStore::load(&path)
        .with_context(|| format!("failed to load sheet settings from {}", path.display()))?;
    debug!(path = %path.display(), "loaded sheet settings");
    Ok(store.settings().clone())
}

fn load_job(settings: &Settings, sheet: Option<&str>, args: &DocumentArgs) -> Result<LoadedJob> {
    let sheet = settings
        .find_sheet(sheet)
        .context("failed to select a sheet")?
        .clone();
    let path = resolve_input_path(&args.file)?;
    let mut document = Document::load(&path)
        .with_context(|| format!("failed to load document {}", path.display()))?;
    if let Some(content_type) = &args.page.content_type {
        document = document.with_kind(ContentKind::from_content_type(content_type));
    }
    let content = Content::new(document);

    let mut services = ContentServices::new(Arc::new(AdvanceTableMetrics::monospace()));
    if content.kind == ContentKind::Html {
        services = services.with_text_html_engine(sheet.content.font.clone());
    }
    let macros = MacroContext::for_file(&path).with_content_type(
        content.kind.name(),
        content.kind.language().unwrap_or_default(),
    );
    let physical = PhysicalPageGeometry::from_paper(
        PaperSize::from_id(args.page.paper.into()),
        args.page.hard_margin,
        args.page.landscape_angle.degrees(),
    );

    Ok(LoadedJob {
        content,
        sheet,
        physical,
        services,
        macros,
        diagnostics: settings.diagnostics.print,
    })
}

fn execute_count(job: &LoadedJob) -> Result<()> {
    let prepared = job.prepare()?;
    println!("pages: {}", prepared.page_count());
    println!("sheets: {}", prepared.sheet_count());
    Ok(())
}

fn execute_reflow(job: &LoadedJob) -> Result<()> {
    let prepared = job.prepare()?;
    let Pagination::Lines { output, .. } = &prepared.pagination else {
        bail!("{} is HTML; only text content reflows into lines", job.content.document.title());
    };
    for line in &output.lines {
        if line.is_continuation() {
            println!("{:>5}  {}", "", line.text);
        } else {
            println!("{:>5}  {}", line.line_number, line.text);
        }
    }
    Ok(())
}

fn execute_layout(job: &LoadedJob, sheet_number: Option<usize>) -> Result<()> {
    let prepared = job.prepare()?;
    let page_count = prepared.page_count();
    let sheet_count = prepared.sheet_count();
    let numbers = match sheet_number {
        Some(number) => {
            check_sheet_number(number, sheet_count)?;
            number..=number
        }
        None => 1..=sheet_count,
    };
    let sheets = numbers
        .map(|number| prepared.frame.compose(page_count, number))
        .collect::<Result<Vec<_>, _>>()
        .context("failed to compose sheets")?;

    let report = LayoutReport {
        page_count,
        sheet_count,
        frame: &prepared.frame,
        margin_warnings: prepared.frame.margin_warnings(),
        sheets,
    };
    let json = serde_json::to_string_pretty(&report).context("failed to serialize layout")?;
    println!("{json}");
    Ok(())
}

fn execute_preview(job: &LoadedJob, args: &PreviewArgs) -> Result<()> {
    if args.zoom == 0 {
        bail!("--zoom must be at least 1 percent");
    }
    let prepared = job.prepare()?;
    let sheet_count = prepared.sheet_count();
    check_sheet_number(args.sheet_number, sheet_count)?;

    let display_list = prepared
        .paint(&job.request(), args.sheet_number)
        .with_context(|| format!("failed to paint sheet {}", args.sheet_number))?;
    let entry = render_preview_png(
        &display_list,
        prepared.frame.paper,
        args.zoom,
        PREVIEW_BASE_DPI,
        job.services.metrics.as_ref(),
    )
    .context("failed to render preview")?;

    let out = resolve_input_path(&args.out)?;
    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&out, &entry.data).with_context(|| format!("failed to write {}", out.display()))?;
    println!(
        "Wrote sheet {} of {} ({}x{} px) to {}",
        args.sheet_number,
        sheet_count,
        entry.width_px,
        entry.height_px,
        out.display()
    );
    Ok(())
}

fn execute_expand(args: &ExpandArgs) -> Result<()> {
    let context = match &args.file {
        Some(file) => {
            let path = resolve_input_path(file)?;
            if !path.exists() {
                bail!("file '{}' does not exist", path.display());
            }
            let kind = ContentKind::from_path(&path);
            MacroContext::for_file(&path)
                .with_content_type(kind.name(), kind.language().unwrap_or_default())
        }
        None => MacroContext::default(),
    };
    let context = context.with_pages(args.page, args.pages);
    println!("{}", substitute(&args.template, &context));
    Ok(())
}

fn list_sheets(settings: &Settings) {
    for (id, sheet) in &settings.sheets {
        let marker = if *id == settings.default_sheet { "*" } else { " " };
        println!(
            "{marker} {id}\t{}\t{}x{}{}",
            sheet.name,
            sheet.rows,
            sheet.columns,
            if sheet.landscape { " landscape" } else { "" }
        );
    }
}

fn check_sheet_number(number: usize, sheet_count: usize) -> Result<()> {
    if number == 0 || number > sheet_count {
        bail!("sheet {number} is out of range; the document has {sheet_count} sheet(s)");
    }
    Ok(())
}

fn default_settings_path() -> Result<PathBuf> {
    Ok(std::env::current_dir()
        .context("determine current directory")?
        .join(".sheetprint")
        .join("sheets.json"))
}

fn resolve_input_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()
            .context("determine current directory")?
            .join(path))
    }
}
