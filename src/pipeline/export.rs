//! Spreadsheet export: line items → `.xlsx` bytes.
//!
//! An `.xlsx` file is a zip archive of SpreadsheetML parts. The workbook
//! written here is the smallest one Excel, LibreOffice and calamine all open:
//! one sheet (`Sheet1`), a header row of column names, then one row per line
//! item. Strings are written as inline strings, so there is no shared-string
//! table to keep in sync. No cell styling is applied.
//!
//! | JSON value | Cell |
//! |------------|------|
//! | number     | numeric |
//! | string     | inline string |
//! | boolean    | boolean |
//! | null / missing | empty |
//! | array / object | inline string holding the compact JSON |

use crate::error::EstimatorError;
use crate::output::{Columns, LineItem};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;
use std::fmt::Write as _;
use std::io::{Cursor, Write};
use std::path::Path;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// File name offered for download.
pub const EXPORT_FILE_NAME: &str = "Rekapitulasi_Estimasi_Biaya.xlsx";

/// MIME type of an Office Open XML workbook.
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Name of the only worksheet.
pub const SHEET_NAME: &str = "Sheet1";

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

const CONTENT_TYPES: &str = r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

// Excel refuses a styles part without at least one font, two fills, one border and one xf.
const STYLES: &str = r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs><cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles></styleSheet>"#;

/// Build the workbook for `items` in memory.
pub fn write_xlsx(items: &[LineItem]) -> Result<Vec<u8>, EstimatorError> {
    let columns = Columns::from_items(items);
    let sheet = sheet_xml(&columns, items);
    let workbook = format!(
        r#"{XML_DECL}<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{SHEET_NAME}" sheetId="1" r:id="rId1"/></sheets></workbook>"#
    );

    let parts: [(&str, String); 6] = [
        ("[Content_Types].xml", format!("{XML_DECL}{CONTENT_TYPES}")),
        ("_rels/.rels", format!("{XML_DECL}{ROOT_RELS}")),
        ("xl/workbook.xml", workbook),
        ("xl/_rels/workbook.xml.rels", format!("{XML_DECL}{WORKBOOK_RELS}")),
        ("xl/styles.xml", format!("{XML_DECL}{STYLES}")),
        ("xl/worksheets/sheet1.xml", sheet),
    ];

    let export_failed = |reason: String| EstimatorError::ExportFailed { reason };
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in &parts {
        zip.start_file(*name, options)
            .map_err(|e| export_failed(format!("{name}: {e}")))?;
        zip.write_all(body.as_bytes())
            .map_err(|e| export_failed(format!("{name}: {e}")))?;
    }
    let bytes = zip
        .finish()
        .map_err(|e| export_failed(e.to_string()))?
        .into_inner();

    debug!(
        "Built workbook: {} rows x {} columns, {} bytes",
        items.len() + 1,
        columns.len(),
        bytes.len()
    );
    Ok(bytes)
}

/// Write the workbook to `path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn write_xlsx_file(items: &[LineItem], path: &Path) -> Result<(), EstimatorError> {
    let bytes = write_xlsx(items)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| EstimatorError::io(format!("Failed to create '{}'", parent.display()), e))?;
    }

    let tmp_path = path.with_extension("xlsx.tmp");
    tokio::fs::write(&tmp_path, &bytes)
        .await
        .map_err(|e| EstimatorError::io(format!("Failed to write '{}'", tmp_path.display()), e))?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(EstimatorError::io(format!("Failed to write '{}'", path.display()), e));
    }
    Ok(())
}

/// `data:` URI carrying the workbook, for a download link that needs no server state.
pub fn xlsx_data_uri(bytes: &[u8]) -> String {
    format!("data:{XLSX_MIME};base64,{}", STANDARD.encode(bytes))
}

fn sheet_xml(columns: &Columns, items: &[LineItem]) -> String {
    let mut xml = String::with_capacity(256 + items.len() * 256);
    xml.push_str(XML_DECL);
    xml.push_str(
        r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );

    xml.push_str(r#"<row r="1">"#);
    for (col, key) in columns.iter().enumerate() {
        push_string_cell(&mut xml, &cell_ref(col, 1), key);
    }
    xml.push_str("</row>");

    for (i, item) in items.iter().enumerate() {
        let row = i + 2;
        let _ = write!(xml, r#"<row r="{row}">"#);
        for (col, key) in columns.iter().enumerate() {
            let r = cell_ref(col, row);
            match item.get(key) {
                None | Some(Value::Null) => {}
                Some(Value::Number(n)) => {
                    let _ = write!(xml, r#"<c r="{r}"><v>{n}</v></c>"#);
                }
                Some(Value::Bool(b)) => {
                    let _ = write!(xml, r#"<c r="{r}" t="b"><v>{}</v></c>"#, u8::from(*b));
                }
                Some(Value::String(s)) => push_string_cell(&mut xml, &r, s),
                Some(other) => push_string_cell(&mut xml, &r, &other.to_string()),
            }
        }
        xml.push_str("</row>");
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

fn push_string_cell(xml: &mut String, r: &str, text: &str) {
    let _ = write!(
        xml,
        r#"<c r="{r}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
        escape_xml(text)
    );
}

/// A1-style reference for a 0-indexed column and 1-indexed row.
fn cell_ref(col: usize, row: usize) -> String {
    format!("{}{}", column_letters(col), row)
}

/// 0 → A, 25 → Z, 26 → AA, 701 → ZZ, 702 → AAA.
fn column_letters(mut col: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (col % 26) as u8);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Escape XML markup and drop characters XML 1.0 cannot carry.
fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if (c as u32) < 0x20 || c == '\u{FFFE}' || c == '\u{FFFF}' => {}
            _ => out.push(c),
        }
    }
    out
}
