use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use printpdf::image_crate::{self, DynamicImage};
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference,
};
use tracing::{info, instrument, warn};

use crate::config::{AppConfig, ReportMode};
use crate::errors::ServiceError;
use crate::models::{format_thousands, ChartArtifact, ReportSummary};
use crate::services::uploads::secure_filename;

pub const FULL_REPORT_FILENAME: &str = "informe_ventas.pdf";
pub const SUMMARY_REPORT_FILENAME: &str = "analisis_ventas.pdf";

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 15.0;
const IMAGE_WIDTH: f32 = 180.0;
/// Helvetica averages roughly half an em per glyph.
const AVG_GLYPH_EM: f32 = 0.5;
const PT_TO_MM: f32 = 0.3528;

/// Builds the PDF report for an analysis run.
#[derive(Debug, Clone)]
pub struct ReportService {
    reports_dir: PathBuf,
    mode: ReportMode,
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    italic: IndirectFontRef,
}

/// Top-down writing position on the current page; opens a new page when content would not fit.
struct PageCursor<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
}

impl<'a> PageCursor<'a> {
    fn new(doc: &'a PdfDocumentReference, layer: PdfLayerReference) -> Self {
        Self {
            doc,
            layer,
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn reserve(&mut self, height: f32) {
        if self.y - height < MARGIN {
            let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT - MARGIN;
        }
    }

    fn line(&mut self, text: &str, size: f32, font: &IndirectFontRef, centered: bool) {
        let height = size * PT_TO_MM * 1.5;
        self.reserve(height);
        self.y -= size * PT_TO_MM;
        let x = if centered {
            ((PAGE_WIDTH - text_width(text, size)) / 2.0).max(MARGIN)
        } else {
            MARGIN
        };
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
        self.y -= height - size * PT_TO_MM;
    }

    fn paragraph(&mut self, text: &str, size: f32, font: &IndirectFontRef) {
        for line in wrap(text, chars_per_line(size)) {
            self.line(&line, size, font, false);
        }
    }

    fn gap(&mut self, height: f32) {
        self.y -= height;
    }

    fn image(&mut self, image: Image, width_px: u32, height_px: u32) {
        let dpi = width_px as f32 * 25.4 / IMAGE_WIDTH;
        let height = height_px as f32 * 25.4 / dpi;
        self.reserve(height);
        self.y -= height;
        image.add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm((PAGE_WIDTH - IMAGE_WIDTH) / 2.0)),
                translate_y: Some(Mm(self.y)),
                dpi: Some(dpi),
                ..Default::default()
            },
        );
    }
}

fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * AVG_GLYPH_EM * PT_TO_MM
}

fn chars_per_line(size: f32) -> usize {
    (((PAGE_WIDTH - 2.0 * MARGIN) / (size * AVG_GLYPH_EM * PT_TO_MM)) as usize).max(10)
}

/// Greedy word wrap on whitespace; words longer than a line are kept whole.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn report_error<E: std::fmt::Display>(err: E) -> ServiceError {
    ServiceError::ReportError(err.to_string())
}

impl ReportService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_mode(config.reports_dir.clone(), config.report.mode)
    }

    pub fn with_mode(reports_dir: PathBuf, mode: ReportMode) -> Self {
        Self { reports_dir, mode }
    }

    pub fn mode(&self) -> ReportMode {
        self.mode
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    /// File name the configured mode writes; every run overwrites it.
    pub fn report_filename(&self) -> &'static str {
        match self.mode {
            ReportMode::Full => FULL_REPORT_FILENAME,
            ReportMode::SummaryOnly => SUMMARY_REPORT_FILENAME,
        }
    }

    /// Existing report by name, for download. Names are sanitised so lookups stay in the reports directory.
    pub fn report_path(&self, filename: &str) -> Result<PathBuf, ServiceError> {
        let safe = secure_filename(filename).ok_or_else(|| {
            ServiceError::ValidationError(format!("invalid report name: {:?}", filename))
        })?;
        let path = self.reports_dir.join(safe);
        if !path.is_file() {
            return Err(ServiceError::NotFound(format!("report {}", filename)));
        }
        Ok(path)
    }

    /// Writes the report and returns its file name.
    #[instrument(skip(self, summary, charts), fields(mode = ?self.mode))]
    pub fn build(
        &self,
        summary: &ReportSummary,
        charts: &[ChartArtifact],
    ) -> Result<String, ServiceError> {
        fs::create_dir_all(&self.reports_dir)?;
        let filename = self.report_filename();
        let path = self.reports_dir.join(filename);

        match self.mode {
            ReportMode::Full => self.write_full(&path, summary, charts)?,
            ReportMode::SummaryOnly => self.write_summary_only(&path, summary)?,
        }

        info!(report = %path.display(), "report written");
        Ok(filename.to_string())
    }

    /// Copies available charts next to the report; missing ones are skipped.
    fn collect_charts(&self, charts: &[ChartArtifact]) -> Result<Vec<(PathBuf, String)>, ServiceError> {
        let mut collected = Vec::with_capacity(charts.len());
        for chart in charts {
            if !chart.path.is_file() {
                warn!(chart = %chart.path.display(), "chart missing, left out of report");
                continue;
            }
            let target = self.reports_dir.join(chart.file_name());
            if target != chart.path {
                fs::copy(&chart.path, &target)?;
            }
            collected.push((target, chart.caption.clone()));
        }
        Ok(collected)
    }

    fn write_full(
        &self,
        path: &Path,
        summary: &ReportSummary,
        charts: &[ChartArtifact],
    ) -> Result<(), ServiceError> {
        let charts = self.collect_charts(charts)?;
        let (doc, page, layer) =
            PdfDocument::new("Informe de Ventas", Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let fonts = builtin_fonts(&doc)?;
        let mut cursor = PageCursor::new(&doc, doc.get_page(page).get_layer(layer));

        cursor.line("Informe de Ventas", 20.0, &fonts.bold, true);
        cursor.gap(6.0);
        cursor.line("Resumen", 14.0, &fonts.bold, false);
        for (key, value) in summary.entries() {
            cursor.paragraph(&format!("{}: {}", key, value), 12.0, &fonts.regular);
        }
        cursor.gap(6.0);

        for (chart_path, caption) in &charts {
            let decoded = image_crate::open(chart_path).map_err(report_error)?;
            let rgb = decoded.to_rgb8();
            let (width, height) = rgb.dimensions();
            cursor.image(
                Image::from_dynamic_image(&DynamicImage::ImageRgb8(rgb)),
                width,
                height,
            );
            cursor.gap(3.0);
            cursor.paragraph(caption, 10.0, &fonts.italic);
            cursor.gap(6.0);
        }

        save(doc, path)
    }

    fn write_summary_only(&self, path: &Path, summary: &ReportSummary) -> Result<(), ServiceError> {
        let (doc, page, layer) =
            PdfDocument::new("Analisis de Ventas", Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let fonts = builtin_fonts(&doc)?;
        let mut cursor = PageCursor::new(&doc, doc.get_page(page).get_layer(layer));

        cursor.line("Analisis de Ventas", 20.0, &fonts.bold, true);
        cursor.gap(6.0);
        cursor.line("Resumen del analisis:", 14.0, &fonts.bold, false);
        cursor.line(
            &format!("Total de registros: {}", summary.registros),
            12.0,
            &fonts.regular,
            false,
        );
        cursor.line(
            &format!("Total de ventas: {}", format_thousands(summary.total_ventas)),
            12.0,
            &fonts.regular,
            false,
        );

        save(doc, path)
    }
}

fn builtin_fonts(doc: &PdfDocumentReference) -> Result<Fonts, ServiceError> {
    Ok(Fonts {
        regular: doc.add_builtin_font(BuiltinFont::Helvetica).map_err(report_error)?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(report_error)?,
        italic: doc
            .add_builtin_font(BuiltinFont::HelveticaOblique)
            .map_err(report_error)?,
    })
}

fn save(doc: PdfDocumentReference, path: &Path) -> Result<(), ServiceError> {
    let file = fs::File::create(path)?;
    doc.save(&mut BufWriter::new(file)).map_err(report_error)
}
