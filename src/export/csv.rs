//! CSV rendition of a finalized sheet.

use crate::export::sheet::{CellValue, FinalizedSheet};

pub fn render(sheet: &FinalizedSheet) -> Vec<u8> {
    let mut out = String::new();
    for row in sheet.header.iter().chain(sheet.rows.iter()) {
        let line: Vec<String> = row.iter().map(field).collect();
        out.push_str(&line.join(","));
        out.push_str("\r\n");
    }
    out.into_bytes()
}

fn field(cell: &CellValue) -> String {
    let raw = match cell {
        CellValue::Empty => String::new(),
        CellValue::Bool(b) => b.to_string(),
        CellValue::Number(n) => format!("{n}"),
        CellValue::Text(s) => s.clone(),
    };
    if raw.contains(',') || raw.contains('"') || raw.contains('\n') || raw.contains('\r') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::sheet::SheetWriter;

    #[test]
    fn quotes_only_when_needed() {
        let mut w = SheetWriter::new();
        w.write_header(&[vec!["ID".into(), "Name".into()]]).unwrap();
        w.append_row(vec![
            CellValue::Number(1.0),
            CellValue::Text("plain".into()),
        ])
        .unwrap();
        w.append_row(vec![
            CellValue::Number(2.0),
            CellValue::Text("has \"quotes\", commas".into()),
        ])
        .unwrap();
        let sheet = w.finalize(false, &[]).unwrap();
        let csv = String::from_utf8(render(&sheet)).unwrap();
        assert_eq!(
            csv,
            "ID,Name\r\n1,plain\r\n2,\"has \"\"quotes\"\", commas\"\r\n"
        );
    }
}
