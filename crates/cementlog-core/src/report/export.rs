//! Paginated document export of a rendered report.
//!
//! Layout is expressed against [`DocumentWriter`], the handful of operations the
//! export needs. [`LopdfWriter`] backs it with `lopdf` using the built-in
//! Helvetica fonts, which only cover WinAnsi: Arabic text cannot be drawn
//! faithfully and every substituted glyph is counted in [`ExportSummary`].

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use thiserror::Error;

use super::{Direction, ReportView};

/// Page-space units are millimetres from the top-left corner.
pub const MARGIN_X: f32 = 14.0;
pub const TEXT_WIDTH: f32 = 180.0;
pub const LINE_PITCH: f32 = 5.0;
pub const TOP_MARGIN: f32 = 20.0;
pub const BOTTOM_MARGIN: f32 = 15.0;

const TABLE_WIDTHS: [f32; 4] = [30.0, 25.0, 82.0, 45.0];
const TABLE_HEADER_FILL: (u8, u8, u8) = (202, 138, 4);

/// Tabular block handed to [`DocumentWriter::write_table`], already in display order.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSpec {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub column_widths: Vec<f32>,
    pub header_fill: (u8, u8, u8),
}

/// Narrow document-generation interface used by [`export_report`].
pub trait DocumentWriter {
    fn begin(&mut self, title: &str);
    fn set_font_size(&mut self, points: f32);
    /// 0 is black, 255 white.
    fn set_text_gray(&mut self, level: u8);
    /// Reflow `text` into lines no wider than `width` at the current font size.
    fn split_to_width(&self, text: &str, width: f32) -> Vec<String>;
    /// Draw lines at `LINE_PITCH` spacing starting at baseline `y` on the current page.
    fn write_text(&mut self, lines: &[String], x: f32, y: f32);
    /// Draw a table starting at `y`, paginating as needed; updates [`Self::cursor_y`].
    fn write_table(&mut self, table: &TableSpec, y: f32);
    /// Vertical position just below the last table drawn.
    fn cursor_y(&self) -> f32;
    fn page_height(&self) -> f32;
    fn new_page(&mut self);
    fn save(&mut self) -> Result<Vec<u8>, ExportError>;
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to encode PDF document")]
    Pdf(#[from] lopdf::Error),
    #[error("failed to serialize PDF document")]
    Serialize(#[from] std::io::Error),
    #[error("failed to write report to {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of writing a report document to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub pages: usize,
    /// Characters the document font could not represent and replaced with `?`.
    pub substituted_glyphs: usize,
}

/// `CementLog_Report_<YYYY-MM-DD>.pdf`
pub fn report_file_name(date: NaiveDate) -> String {
    format!("CementLog_Report_{}.pdf", date.format("%Y-%m-%d"))
}

/// Zone table in display order; right-to-left reports reverse the columns.
pub fn zone_table(view: &ReportView<'_>) -> TableSpec {
    let mut headers: Vec<String> = view.columns.iter().map(|c| c.to_string()).collect();
    let mut widths = TABLE_WIDTHS.to_vec();
    let mut rows: Vec<Vec<String>> = view
        .rows
        .iter()
        .map(|row| {
            vec![
                row.depth.clone(),
                row.quality.to_string(),
                row.technical_description.to_string(),
                row.diagnosis.to_string(),
            ]
        })
        .collect();
    if view.direction == Direction::Rtl {
        headers.reverse();
        widths.reverse();
        rows.iter_mut().for_each(|row| row.reverse());
    }
    TableSpec {
        headers,
        rows,
        column_widths: widths,
        header_fill: TABLE_HEADER_FILL,
    }
}

/// Lay out the full report through `writer`.
pub fn export_report<W: DocumentWriter + ?Sized>(view: &ReportView<'_>, writer: &mut W) {
    writer.begin(view.title);

    writer.set_font_size(18.0);
    writer.write_text(&[view.title.to_string()], MARGIN_X, 22.0);
    writer.set_font_size(10.0);
    writer.set_text_gray(100);
    writer.write_text(&[format!("Log Type: {}", view.log_type)], MARGIN_X, 32.0);
    writer.write_text(&[format!("Generated: {}", view.generated_at)], MARGIN_X, 38.0);
    writer.write_text(&[format!("Units: {}", view.depth_unit)], MARGIN_X, 44.0);

    writer.set_font_size(14.0);
    writer.set_text_gray(0);
    writer.write_text(&[view.summary_title.to_string()], MARGIN_X, 60.0);
    writer.set_font_size(10.0);
    let summary = writer.split_to_width(view.summary, TEXT_WIDTH);
    let after_summary = write_flowing(writer, &summary, 68.0);

    writer.write_table(&zone_table(view), after_summary + 5.0);
    let final_y = writer.cursor_y();

    writer.set_font_size(14.0);
    let title_y = ensure_room(writer, final_y + 15.0, LINE_PITCH);
    writer.write_text(&[view.recommendations_title.to_string()], MARGIN_X, title_y);
    writer.set_font_size(10.0);
    let mut y = title_y + 8.0;
    for rec in view.recommendations {
        let lines = writer.split_to_width(&format!("• {rec}"), TEXT_WIDTH);
        let height = lines.len() as f32 * LINE_PITCH;
        y = if height <= usable_height(writer) {
            let top = ensure_room(writer, y, height);
            writer.write_text(&lines, MARGIN_X, top);
            top + height
        } else {
            write_flowing(writer, &lines, y)
        };
        y += 2.0;
    }
}

/// Write a PDF of `view` into `dir`, named after `date`.
pub fn save_pdf(view: &ReportView<'_>, dir: &Path, date: NaiveDate) -> Result<ExportSummary, ExportError> {
    let mut writer = LopdfWriter::a4();
    export_report(view, &mut writer);
    let bytes = writer.save()?;
    let path = dir.join(report_file_name(date));
    std::fs::write(&path, bytes).map_err(|source| ExportError::Io {
        path: path.clone(),
        source,
    })?;
    let summary = ExportSummary {
        path,
        pages: writer.page_count(),
        substituted_glyphs: writer.substituted_glyphs(),
    };
    if summary.substituted_glyphs > 0 {
        tracing::warn!(
            glyphs = summary.substituted_glyphs,
            path = %summary.path.display(),
            "document font lacks glyphs for this report; exported text is degraded"
        );
    }
    tracing::info!(path = %summary.path.display(), pages = summary.pages, "report exported");
    Ok(summary)
}

fn usable_height<W: DocumentWriter + ?Sized>(writer: &W) -> f32 {
    writer.page_height() - BOTTOM_MARGIN - TOP_MARGIN
}

/// Start a new page when a block of `height` would cross the bottom margin.
fn ensure_room<W: DocumentWriter + ?Sized>(writer: &mut W, y: f32, height: f32) -> f32 {
    if y + height > writer.page_height() - BOTTOM_MARGIN {
        writer.new_page();
        TOP_MARGIN
    } else {
        y
    }
}

/// Write lines from `y`, continuing on new pages; returns the position below the last line.
fn write_flowing<W: DocumentWriter + ?Sized>(writer: &mut W, lines: &[String], mut y: f32) -> f32 {
    let mut rest = lines;
    while !rest.is_empty() {
        y = ensure_room(writer, y, LINE_PITCH);
        let room = ((writer.page_height() - BOTTOM_MARGIN - y) / LINE_PITCH).floor() as usize;
        let take = room.clamp(1, rest.len());
        writer.write_text(&rest[..take], MARGIN_X, y);
        y += take as f32 * LINE_PITCH;
        rest = &rest[take..];
    }
    y
}

const PT_PER_MM: f32 = 72.0 / 25.4;
const CELL_PADDING: f32 = 1.5;

/// [`DocumentWriter`] producing an A4 PDF with `lopdf`.
#[derive(Debug)]
pub struct LopdfWriter {
    width: f32,
    height: f32,
    pages: Vec<Vec<Operation>>,
    title: String,
    font_size: f32,
    gray: u8,
    cursor_y: f32,
    substituted: usize,
}

impl LopdfWriter {
    pub fn a4() -> Self {
        Self {
            width: 210.0,
            height: 297.0,
            pages: vec![Vec::new()],
            title: String::new(),
            font_size: 10.0,
            gray: 0,
            cursor_y: TOP_MARGIN,
            substituted: 0,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn substituted_glyphs(&self) -> usize {
        self.substituted
    }

    fn ops(&mut self) -> &mut Vec<Operation> {
        if self.pages.is_empty() {
            self.pages.push(Vec::new());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn encode(&mut self, text: &str) -> Vec<u8> {
        let (bytes, missing) = encode_win_ansi(text);
        self.substituted += missing;
        bytes
    }

    fn draw_line(&mut self, font: &str, text: &str, x: f32, y: f32, gray: u8) {
        let bytes = self.encode(text);
        let size = self.font_size;
        let page_h = self.height;
        self.ops().extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![font.into(), real(size)]),
            Operation::new("g", vec![real(f32::from(gray) / 255.0)]),
            Operation::new("Td", vec![real(x * PT_PER_MM), real((page_h - y) * PT_PER_MM)]),
            Operation::new("Tj", vec![Object::String(bytes, StringFormat::Literal)]),
            Operation::new("ET", vec![]),
        ]);
    }

    fn cell_rect(&mut self, x: f32, y: f32, w: f32, h: f32, fill: Option<(u8, u8, u8)>) {
        let page_h = self.height;
        let rect = vec![
            real(x * PT_PER_MM),
            real((page_h - y - h) * PT_PER_MM),
            real(w * PT_PER_MM),
            real(h * PT_PER_MM),
        ];
        let ops = self.ops();
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new("w", vec![real(0.3)]));
        ops.push(Operation::new("G", vec![real(0.6)]));
        match fill {
            Some((r, g, b)) => {
                ops.push(Operation::new(
                    "rg",
                    vec![
                        real(f32::from(r) / 255.0),
                        real(f32::from(g) / 255.0),
                        real(f32::from(b) / 255.0),
                    ],
                ));
                ops.push(Operation::new("re", rect));
                ops.push(Operation::new("B", vec![]));
            }
            None => {
                ops.push(Operation::new("re", rect));
                ops.push(Operation::new("S", vec![]));
            }
        }
        ops.push(Operation::new("Q", vec![]));
    }

    fn line_height(&self) -> f32 {
        self.font_size * 1.15 / PT_PER_MM
    }

    fn row_height(&self, cells: &[Vec<String>]) -> f32 {
        let lines = cells.iter().map(Vec::len).max().unwrap_or(1).max(1);
        lines as f32 * self.line_height() + 2.0 * CELL_PADDING
    }

    fn draw_row(&mut self, cells: &[Vec<String>], widths: &[f32], y: f32, header: Option<(u8, u8, u8)>) -> f32 {
        let line_h = self.line_height();
        let row_h = self.row_height(cells);
        let (font, gray) = if header.is_some() { ("F2", 255) } else { ("F1", 0) };
        let mut x = MARGIN_X;
        for (cell, width) in cells.iter().zip(widths) {
            self.cell_rect(x, y, *width, row_h, header);
            for (idx, line) in cell.iter().enumerate() {
                let baseline = y + CELL_PADDING + line_h * (idx as f32 + 0.8);
                self.draw_line(font, line, x + CELL_PADDING, baseline, gray);
            }
            x += width;
        }
        y + row_h
    }

    fn wrap_cells(&self, cells: &[String], widths: &[f32]) -> Vec<Vec<String>> {
        cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| self.split_to_width(cell, width - 2.0 * CELL_PADDING))
            .collect()
    }
}

impl DocumentWriter for LopdfWriter {
    fn begin(&mut self, title: &str) {
        self.title = title.to_string();
        self.pages = vec![Vec::new()];
        self.cursor_y = TOP_MARGIN;
        self.substituted = 0;
    }

    fn set_font_size(&mut self, points: f32) {
        self.font_size = points;
    }

    fn set_text_gray(&mut self, level: u8) {
        self.gray = level;
    }

    fn split_to_width(&self, text: &str, width: f32) -> Vec<String> {
        let size = self.font_size;
        wrap_words(text, width, |s| text_width_mm(s, size))
    }

    fn write_text(&mut self, lines: &[String], x: f32, y: f32) {
        let gray = self.gray;
        for (idx, line) in lines.iter().enumerate() {
            self.draw_line("F1", line, x, y + idx as f32 * LINE_PITCH, gray);
        }
    }

    fn write_table(&mut self, table: &TableSpec, y: f32) {
        let saved_size = self.font_size;
        self.font_size = 9.0;
        let bottom = self.height - BOTTOM_MARGIN;
        let widths = &table.column_widths;
        let header = self.wrap_cells(&table.headers, widths);

        let mut y = y;
        if y + self.row_height(&header) > bottom {
            self.new_page();
            y = TOP_MARGIN;
        }
        y = self.draw_row(&header, widths, y, Some(table.header_fill));
        let page_room = bottom - TOP_MARGIN - self.row_height(&header);
        for row in &table.rows {
            let mut cells = self.wrap_cells(row, widths);
            // Rows taller than a page are split; shorter ones move whole to the next page.
            while y + self.row_height(&cells) > bottom {
                let room = ((bottom - y - 2.0 * CELL_PADDING) / self.line_height()).floor();
                if self.row_height(&cells) > page_room && room >= 1.0 {
                    let (head, tail) = split_cells(cells, room as usize);
                    self.draw_row(&head, widths, y, None);
                    cells = tail;
                }
                self.new_page();
                y = self.draw_row(&header, widths, TOP_MARGIN, Some(table.header_fill));
            }
            y = self.draw_row(&cells, widths, y, None);
        }
        self.cursor_y = y;
        self.font_size = saved_size;
    }

    fn cursor_y(&self) -> f32 {
        self.cursor_y
    }

    fn page_height(&self) -> f32 {
        self.height
    }

    fn new_page(&mut self) {
        self.pages.push(Vec::new());
    }

    fn save(&mut self) -> Result<Vec<u8>, ExportError> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let regular = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let bold = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => regular,
                "F2" => bold,
            },
        });

        let mut kids = Vec::with_capacity(self.pages.len());
        for operations in &self.pages {
            let content = Content {
                operations: operations.clone(),
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![
                    real(0.0),
                    real(0.0),
                    real(self.width * PT_PER_MM),
                    real(self.height * PT_PER_MM),
                ],
            }),
        );
        let title = self.title.clone();
        let title = self.encode(&title);
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::String(title, StringFormat::Literal),
            "Producer" => Object::string_literal("cementlog"),
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);
        doc.compress();

        let mut buf = Vec::new();
        doc.save_to(&mut buf)?;
        Ok(buf)
    }
}

/// Split every cell after its first `lines` wrapped lines.
fn split_cells(cells: Vec<Vec<String>>, lines: usize) -> (Vec<Vec<String>>, Vec<Vec<String>>) {
    cells
        .into_iter()
        .map(|mut cell| {
            let tail = cell.split_off(lines.min(cell.len()));
            (cell, tail)
        })
        .unzip()
}

fn real(value: f32) -> Object {
    Object::Real(value)
}

/// Encode for the WinAnsi base fonts. Returns the bytes and how many chars had no glyph.
fn encode_win_ansi(text: &str) -> (Vec<u8>, usize) {
    let mut missing = 0;
    let bytes = text
        .chars()
        .filter(|c| !matches!(c, '\u{200e}' | '\u{200f}'))
        .map(|c| match c {
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '€' => 0x80,
            c if (c as u32) < 0x80 || (0xa0..=0xff).contains(&(c as u32)) => c as u8,
            _ => {
                missing += 1;
                b'?'
            }
        })
        .collect();
    (bytes, missing)
}

/// Approximate Helvetica advance widths, in em.
fn glyph_em(c: char) -> f32 {
    match c {
        ' ' | 'i' | 'j' | 'l' | '.' | ',' | ':' | ';' | '\'' | '|' | '!' => 0.278,
        'f' | 't' | 'r' | '-' | '(' | ')' | '/' => 0.333,
        'm' | 'M' | 'W' => 0.833,
        'w' => 0.722,
        c if c.is_ascii_uppercase() => 0.667,
        c if c.is_ascii_digit() => 0.556,
        _ => 0.5,
    }
}

fn text_width_mm(text: &str, font_size: f32) -> f32 {
    text.chars().map(glyph_em).sum::<f32>() * font_size / PT_PER_MM
}

/// Greedy word wrap; words wider than `width` are split across lines.
fn wrap_words(text: &str, width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if measure(&candidate) <= width {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            for ch in word.chars() {
                current.push(ch);
                if measure(&current) > width && current.chars().count() > 1 {
                    current.pop();
                    lines.push(std::mem::take(&mut current));
                    current.push(ch);
                }
            }
        }
        lines.push(current);
    }
    lines
}
