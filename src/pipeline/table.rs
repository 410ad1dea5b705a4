//! Tabular views of an estimate: aligned plain text for the terminal and an
//! HTML `<table>` fragment for the browser.
//!
//! Both views use [`Columns::from_items`], so they show the same columns as
//! the spreadsheet. Cells are shown as the model sent them; nothing is summed
//! or converted.

use crate::output::{Columns, LineItem};
use std::fmt::Write as _;

/// Render `items` as a fixed-width text table.
///
/// ```text
/// kategori    item                satuan  estimasi_volume  catatan
/// ----------  ------------------  ------  ---------------  ----------------
/// Arsitektur  Dinding Bata Merah  m2      150              Asumsi tinggi 3m
/// ```
pub fn render_text(items: &[LineItem]) -> String {
    let columns = Columns::from_items(items);
    let header: Vec<String> = columns.iter().map(str::to_string).collect();
    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|item| columns.row(item).into_iter().map(|c| single_line(&c)).collect())
        .collect();

    let widths: Vec<usize> = (0..header.len())
        .map(|i| {
            rows.iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(header[i].chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    push_text_row(&mut out, &header, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_text_row(&mut out, &rule, &widths);
    for row in &rows {
        push_text_row(&mut out, row, &widths);
    }
    out
}

fn push_text_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let last = cells.len().saturating_sub(1);
    for (i, cell) in cells.iter().enumerate() {
        if i == last {
            out.push_str(cell);
        } else {
            let pad = widths[i] - cell.chars().count();
            out.push_str(cell);
            out.push_str(&" ".repeat(pad + 2));
        }
    }
    out.push('\n');
}

/// Newlines inside a cell would break the grid.
fn single_line(s: &str) -> String {
    s.split(['\r', '\n'])
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render `items` as an HTML `<table>` fragment with escaped cell text.
pub fn render_html(items: &[LineItem]) -> String {
    let columns = Columns::from_items(items);
    let mut out = String::from("<table class=\"estimate\">\n<thead><tr>");
    for key in columns.iter() {
        let _ = write!(out, "<th>{}</th>", escape_html(key));
    }
    out.push_str("</tr></thead>\n<tbody>\n");
    for item in items {
        out.push_str("<tr>");
        for cell in columns.row(item) {
            let _ = write!(out, "<td>{}</td>", escape_html(&cell));
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</tbody>\n</table>\n");
    out
}

/// Escape text for use in HTML element content and quoted attributes.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::normalize::normalize;

    fn sample() -> Vec<LineItem> {
        normalize(
            r#"[{"kategori":"Arsitektur","item":"Dinding Bata Merah","satuan":"m2","estimasi_volume":150,"catatan":"Asumsi tinggi 3m"},
                {"kategori":"MEP","item":"Titik Lampu","satuan":"titik","estimasi_volume":10,"catatan":"-"}]"#,
        )
        .unwrap()
    }

    #[test]
    fn text_table_has_header_rule_and_rows() {
        let out = render_text(&sample());
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("kategori"));
        assert!(lines[1].starts_with("----------"));
        assert!(lines[2].contains("Dinding Bata Merah"));
        assert!(lines[3].contains("Titik Lampu"));
    }

    #[test]
    fn text_columns_are_aligned() {
        let out = render_text(&sample());
        let lines: Vec<&str> = out.lines().collect();
        let col = lines[0].find("satuan").unwrap();
        assert_eq!(&lines[2][col..col + 2], "m2");
        assert_eq!(&lines[3][col..col + 5], "titik");
    }

    #[test]
    fn text_alignment_counts_chars_not_bytes() {
        let items = normalize(r#"[{"kategori":"Struktur","item":"Besi Ø12","satuan":"kg"}]"#).unwrap();
        let out = render_text(&items);
        let lines: Vec<&str> = out.lines().collect();
        // Header is ASCII, so its byte offset is also a char offset.
        let col = lines[0].find("satuan").unwrap();
        assert_eq!(lines[2].chars().nth(col), Some('k'));
    }

    #[test]
    fn empty_estimate_still_has_header() {
        let out = render_text(&[]);
        assert_eq!(out.lines().count(), 2);
    }

    #[test]
    fn multiline_cells_are_flattened() {
        let items = normalize(r#"[{"item":"Plester","catatan":"dua sisi\nacian"}]"#).unwrap();
        let out = render_text(&items);
        assert_eq!(out.lines().count(), 3);
        assert!(out.contains("dua sisi acian"));
    }

    #[test]
    fn html_table_escapes_cells() {
        let items = normalize(r#"[{"item":"<script>alert(1)</script>","catatan":"A & B"}]"#).unwrap();
        let html = render_html(&items);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("A &amp; B"));
    }

    #[test]
    fn html_table_has_one_row_per_item() {
        let html = render_html(&sample());
        assert_eq!(html.matches("<tr>").count(), 3);
        assert_eq!(html.matches("<th>").count(), 5);
        assert!(html.contains("<td>150</td>"));
    }

    #[test]
    fn escape_html_quotes() {
        assert_eq!(escape_html(r#"a"b'c"#), "a&quot;b&#39;c");
    }
}
