//! Minimal XLSX package writer: workbook, one worksheet, styles, packed into
//! the OOXML zip container. Strings are written inline so no shared-string
//! table is needed.

use crate::error::ApiError;
use crate::export::sheet::{CellValue, ColumnType, FinalizedSheet};
use chrono::NaiveDate;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
</Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="Export" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#;

/// Style 1 is the date format applied to date-typed columns.
const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<numFmts count="1"><numFmt numFmtId="164" formatCode="dd.mm.yyyy"/></numFmts>
<fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>
<fills count="1"><fill><patternFill patternType="none"/></fill></fills>
<borders count="1"><border/></borders>
<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
<cellXfs count="2">
<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
<xf numFmtId="164" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>
</cellXfs>
</styleSheet>"#;

/// Pack a finalized sheet into XLSX bytes.
pub fn write_package(sheet: &FinalizedSheet) -> Result<Vec<u8>, ApiError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    let entries: [(&str, String); 5] = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", ROOT_RELS.to_string()),
        ("xl/workbook.xml", WORKBOOK.to_string()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
        ("xl/styles.xml", STYLES.to_string()),
    ];
    for (name, content) in entries {
        zip.start_file(name, options).map_err(zip_err)?;
        zip.write_all(content.as_bytes()).map_err(io_err)?;
    }

    zip.start_file("xl/worksheets/sheet1.xml", options).map_err(zip_err)?;
    zip.write_all(worksheet_xml(sheet).as_bytes()).map_err(io_err)?;

    let cursor = zip.finish().map_err(zip_err)?;
    Ok(cursor.into_inner())
}

fn zip_err(e: zip::result::ZipError) -> ApiError {
    ApiError::Export(format!("xlsx packaging: {e}"))
}

fn io_err(e: std::io::Error) -> ApiError {
    ApiError::Export(format!("xlsx packaging: {e}"))
}

fn worksheet_xml(sheet: &FinalizedSheet) -> String {
    let mut xml = String::with_capacity(1024 + sheet.rows.len() * 64);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(
        r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    );

    if let Some(widths) = &sheet.column_widths {
        xml.push_str("<cols>");
        for (i, w) in widths.iter().enumerate() {
            let n = i + 1;
            xml.push_str(&format!(
                r#"<col min="{n}" max="{n}" width="{w}" customWidth="1"/>"#
            ));
        }
        xml.push_str("</cols>");
    }

    xml.push_str("<sheetData>");
    let mut row_num = 1usize;
    for row in &sheet.header {
        write_row(&mut xml, row_num, row, &[]);
        row_num += 1;
    }
    debug_assert_eq!(row_num, sheet.start_row);
    for row in &sheet.rows {
        write_row(&mut xml, row_num, row, &sheet.column_types);
        row_num += 1;
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

fn write_row(xml: &mut String, row_num: usize, cells: &[CellValue], types: &[(usize, ColumnType)]) {
    xml.push_str(&format!(r#"<row r="{row_num}">"#));
    for (col, cell) in cells.iter().enumerate() {
        let column_type = types
            .iter()
            .find(|(i, _)| *i == col)
            .map(|(_, t)| *t);
        write_cell(xml, row_num, col, cell, column_type);
    }
    xml.push_str("</row>");
}

fn write_cell(
    xml: &mut String,
    row_num: usize,
    col: usize,
    cell: &CellValue,
    column_type: Option<ColumnType>,
) {
    let r = format!("{}{}", column_letter(col), row_num);
    match (cell, column_type) {
        (CellValue::Empty, _) => {}
        // Date columns render as Excel serial numbers with the date style;
        // values that do not parse fall back to inline text.
        (CellValue::Text(s), Some(ColumnType::Date)) => match date_serial(s) {
            Some(serial) => xml.push_str(&format!(r#"<c r="{r}" s="1"><v>{serial}</v></c>"#)),
            None => push_inline_str(xml, &r, s),
        },
        // Text-forced columns always write inline strings.
        (CellValue::Number(n), Some(ColumnType::Text)) => {
            push_inline_str(xml, &r, &format!("{n}"));
        }
        (CellValue::Bool(b), Some(ColumnType::Text)) => {
            push_inline_str(xml, &r, if *b { "true" } else { "false" });
        }
        (CellValue::Text(s), _) => push_inline_str(xml, &r, s),
        (CellValue::Number(n), _) => xml.push_str(&format!(r#"<c r="{r}"><v>{n}</v></c>"#)),
        (CellValue::Bool(b), _) => {
            xml.push_str(&format!(r#"<c r="{r}" t="b"><v>{}</v></c>"#, u8::from(*b)));
        }
    }
}

fn push_inline_str(xml: &mut String, r: &str, s: &str) {
    xml.push_str(&format!(
        r#"<c r="{r}" t="inlineStr"><is><t>{}</t></is></c>"#,
        escape_xml(s)
    ));
}

/// Zero-based column index to A1-style letters.
fn column_letter(mut idx: usize) -> String {
    let mut out = String::new();
    loop {
        out.insert(0, (b'A' + (idx % 26) as u8) as char);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    out
}

/// Days since the Excel epoch (1899-12-30).
fn date_serial(s: &str) -> Option<i64> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| s.get(..10).and_then(|p| NaiveDate::parse_from_str(p, "%Y-%m-%d").ok()))?;
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    Some((date - epoch).num_days())
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
