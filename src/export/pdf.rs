//! PDF export: a plain table on A4 landscape with an optional letterhead

use chrono::{DateTime, Local};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{ExportOutcome, ExportTable};
use crate::errors::ExportError;

const PAGE_WIDTH: i64 = 842;
const PAGE_HEIGHT: i64 = 595;
const MARGIN: i64 = 36;
const ROW_HEIGHT: i64 = 14;
const BODY_FONT_SIZE: i64 = 8;
const LOGO_WIDTH: i64 = 72;

/// Printed above the table on the first page
#[derive(Debug, Clone)]
pub struct Letterhead {
    pub company_name: Option<String>,
    /// JPEG image placed in the top right corner
    pub logo_path: Option<PathBuf>,
    pub printed_at: DateTime<Local>,
}

impl Letterhead {
    pub fn new(printed_at: DateTime<Local>) -> Self {
        Self {
            company_name: None,
            logo_path: None,
            printed_at,
        }
    }

    pub fn with_company_name(mut self, name: Option<String>) -> Self {
        self.company_name = name;
        self
    }

    pub fn with_logo(mut self, path: Option<PathBuf>) -> Self {
        self.logo_path = path;
        self
    }
}

struct JpegInfo {
    width: i64,
    height: i64,
    components: u8,
}

/// Read the frame header of a baseline or progressive JPEG.
fn jpeg_info(bytes: &[u8]) -> Option<JpegInfo> {
    if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != 0xD8 {
        return None;
    }
    let mut pos = 2;
    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xFF {
            return None;
        }
        let marker = bytes[pos + 1];
        let length = u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]) as usize;
        let is_frame = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_frame {
            let frame = bytes.get(pos + 4..pos + 10)?;
            return Some(JpegInfo {
                height: u16::from_be_bytes([frame[1], frame[2]]) as i64,
                width: u16::from_be_bytes([frame[3], frame[4]]) as i64,
                components: frame[5],
            });
        }
        pos += 2 + length;
    }
    None
}

fn load_logo(doc: &mut Document, path: &Path) -> Result<(ObjectId, i64, i64), ExportError> {
    let bytes = std::fs::read(path)?;
    let info = jpeg_info(&bytes).ok_or_else(|| ExportError::Logo {
        path: path.display().to_string(),
        reason: "not a JPEG file".to_string(),
    })?;
    let color_space = match info.components {
        1 => "DeviceGray",
        3 => "DeviceRGB",
        4 => "DeviceCMYK",
        n => {
            return Err(ExportError::Logo {
                path: path.display().to_string(),
                reason: format!("unsupported component count {}", n),
            })
        }
    };

    let image = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => info.width,
            "Height" => info.height,
            "ColorSpace" => color_space,
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        bytes,
    );
    let id = doc.add_object(image);
    let height = if info.width > 0 {
        LOGO_WIDTH * info.height / info.width
    } else {
        LOGO_WIDTH
    };
    Ok((id, LOGO_WIDTH, height))
}

/// Standard-14 fonts only speak WinAnsi; anything outside Latin-1 becomes '?'.
fn pdf_text(text: &str) -> Object {
    let bytes: Vec<u8> = text
        .chars()
        .map(|c| if (c as u32) < 0x100 { c as u8 } else { b'?' })
        .collect();
    Object::string_literal(bytes)
}

fn fit(text: &str, width: i64, font_size: i64) -> String {
    // Helvetica averages a little over half an em per glyph
    let max_chars = ((width * 2) / font_size).max(1) as usize;
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max_chars.saturating_sub(2)).collect();
        cut.push_str("..");
        cut
    }
}

fn text_at(ops: &mut Vec<Operation>, font: &str, size: i64, x: i64, y: i64, text: &str) {
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new("Tf", vec![font.into(), Object::Integer(size)]));
    ops.push(Operation::new("Td", vec![Object::Integer(x), Object::Integer(y)]));
    ops.push(Operation::new("Tj", vec![pdf_text(text)]));
    ops.push(Operation::new("ET", vec![]));
}

fn rule(ops: &mut Vec<Operation>, y: i64) {
    ops.push(Operation::new("w", vec![Object::Integer(1)]));
    ops.push(Operation::new("m", vec![Object::Integer(MARGIN), Object::Integer(y)]));
    ops.push(Operation::new(
        "l",
        vec![Object::Integer(PAGE_WIDTH - MARGIN), Object::Integer(y)],
    ));
    ops.push(Operation::new("S", vec![]));
}

fn table_row(ops: &mut Vec<Operation>, font: &str, cells: &[String], column_width: i64, y: i64) {
    for (i, cell) in cells.iter().enumerate() {
        let x = MARGIN + i as i64 * column_width;
        text_at(
            ops,
            font,
            BODY_FONT_SIZE,
            x,
            y,
            &fit(cell, column_width - 4, BODY_FONT_SIZE),
        );
    }
}

/// Write the loaded page as a PDF table, continuing onto further PDF pages
/// when the rows do not fit on one.
pub fn export_pdf(
    table: &ExportTable,
    letterhead: &Letterhead,
    path: &Path,
) -> Result<ExportOutcome, ExportError> {
    if table.is_empty() {
        info!("{}: nothing to export", table.title);
        return Ok(ExportOutcome::NothingToExport);
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });

    let logo = match &letterhead.logo_path {
        Some(logo_path) => match load_logo(&mut doc, logo_path) {
            Ok(logo) => Some(logo),
            Err(e) => {
                warn!("Skipping letterhead logo: {}", e);
                None
            }
        },
        None => None,
    };

    let mut resources = dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    };
    if let Some((logo_id, _, _)) = logo {
        resources.set("XObject", dictionary! { "Im1" => logo_id });
    }
    let resources_id = doc.add_object(resources);

    let columns = table.headers.len().max(1) as i64;
    let column_width = (PAGE_WIDTH - 2 * MARGIN) / columns;

    let mut kids: Vec<Object> = Vec::new();
    let mut remaining = table.rows.as_slice();
    let mut first_page = true;

    while !remaining.is_empty() {
        let mut ops = Vec::new();
        let mut y = PAGE_HEIGHT - MARGIN;

        if first_page {
            if let Some((_, width, height)) = logo {
                ops.push(Operation::new("q", vec![]));
                ops.push(Operation::new(
                    "cm",
                    vec![
                        Object::Integer(width),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(height),
                        Object::Integer(PAGE_WIDTH - MARGIN - width),
                        Object::Integer(PAGE_HEIGHT - MARGIN - height),
                    ],
                ));
                ops.push(Operation::new("Do", vec!["Im1".into()]));
                ops.push(Operation::new("Q", vec![]));
            }
            if let Some(company) = &letterhead.company_name {
                y -= 16;
                text_at(&mut ops, "F2", 16, MARGIN, y, company);
            }
            y -= 18;
            text_at(&mut ops, "F2", 13, MARGIN, y, &table.title);
            y -= 13;
            let printed = format!(
                "Printed on {}",
                letterhead.printed_at.format("%Y-%m-%d %H:%M")
            );
            text_at(&mut ops, "F1", 9, MARGIN, y, &printed);
            y -= 12;
        }

        y -= ROW_HEIGHT;
        table_row(&mut ops, "F2", &table.headers, column_width, y);
        rule(&mut ops, y - 4);

        let capacity = ((y - MARGIN) / ROW_HEIGHT).max(1) as usize;
        let (page_rows, rest) = remaining.split_at(capacity.min(remaining.len()));
        for row in page_rows {
            y -= ROW_HEIGHT;
            table_row(&mut ops, "F1", row, column_width, y);
        }
        remaining = rest;
        first_page = false;

        let content = Content { operations: ops };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    let pages: Dictionary = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    doc.save(path)?;

    info!(
        "Exported {} rows of {} to {} ({} pages)",
        table.rows.len(),
        table.title,
        path.display(),
        page_count
    );
    Ok(ExportOutcome::Written {
        path: path.to_path_buf(),
        rows: table.rows.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn table(rows: usize) -> ExportTable {
        ExportTable::new(
            "Receipts",
            vec!["Number".to_string(), "Customer".to_string(), "Total".to_string()],
            (0..rows)
                .map(|i| vec![format!("R-{}", i), "Café Olé".to_string(), format!("{}", i * 10)])
                .collect(),
        )
    }

    /// Smallest frame a JPEG parser will accept: SOI, APP0 stub, SOF0 for 40x20 RGB.
    fn fake_jpeg() -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8];
        bytes.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x04, 0x00, 0x00]);
        bytes.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08, 0x00, 0x14, 0x00, 0x28, 0x03]);
        bytes.extend_from_slice(&[0u8; 9]);
        bytes.extend_from_slice(&[0xFF, 0xD9]);
        bytes
    }

    #[test]
    fn test_jpeg_info_reads_frame_header() {
        let info = jpeg_info(&fake_jpeg()).unwrap();
        assert_eq!((info.width, info.height, info.components), (40, 20, 3));
        assert!(jpeg_info(b"\x89PNG\r\n").is_none());
    }

    #[test]
    fn test_long_tables_span_pages() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("receipts.pdf");

        let letterhead = Letterhead::new(Local::now()).with_company_name(Some("Corner Cafe".to_string()));
        let outcome = export_pdf(&table(80), &letterhead, &path).unwrap();
        assert_eq!(outcome, ExportOutcome::Written { path: path.clone(), rows: 80 });

        let doc = Document::load(&path).unwrap();
        assert!(doc.get_pages().len() >= 2);
    }

    #[test]
    fn test_logo_is_embedded() {
        let dir = TempDir::new().unwrap();
        let logo = dir.path().join("logo.jpg");
        std::fs::write(&logo, fake_jpeg()).unwrap();
        let path = dir.path().join("with-logo.pdf");

        let letterhead = Letterhead::new(Local::now()).with_logo(Some(logo));
        export_pdf(&table(2), &letterhead, &path).unwrap();

        let doc = Document::load(&path).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        let has_image = doc.objects.values().any(|object| match object {
            Object::Stream(stream) => stream
                .dict
                .get(b"Subtype")
                .and_then(|s| s.as_name_str())
                .map(|name| name == "Image")
                .unwrap_or(false),
            _ => false,
        });
        assert!(has_image);
    }

    #[test]
    fn test_empty_page_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.pdf");
        let outcome = export_pdf(&table(0), &Letterhead::new(Local::now()), &path).unwrap();
        assert_eq!(outcome, ExportOutcome::NothingToExport);
        assert!(!path.exists());
    }

    #[test]
    fn test_fit_truncates_long_cells() {
        assert_eq!(fit("short", 100, 8), "short");
        let long = "x".repeat(100);
        let cut = fit(&long, 40, 8);
        assert_eq!(cut.chars().count(), 10);
        assert!(cut.ends_with(".."));
    }
}
