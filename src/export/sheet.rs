//! In-memory sheet model with an enforced write order:
//! Idle -> HeaderWritten -> StreamingRows -> Finalized.
//!
//! Rows arrive mapped, in chunk order; widths and per-column data types are
//! applied at finalize over the row range actually populated.

use crate::error::ApiError;
use serde_json::Value;

/// Per-column data type applied at finalize.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    /// Force cell content to text, even when it looks numeric.
    Text,
    /// Render as a date (dd.mm.yyyy in XLSX).
    Date,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => CellValue::Empty,
            Value::Bool(b) => CellValue::Bool(*b),
            Value::Number(n) => n
                .as_f64()
                .map(CellValue::Number)
                .unwrap_or(CellValue::Empty),
            Value::String(s) => CellValue::Text(s.clone()),
            other => CellValue::Text(other.to_string()),
        }
    }

    /// Displayed length, used for auto width.
    fn display_len(&self) -> usize {
        match self {
            CellValue::Empty => 0,
            CellValue::Bool(_) => 5,
            CellValue::Number(n) => format!("{n}").len(),
            CellValue::Text(s) => s.chars().count(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum WriterState {
    Idle,
    HeaderWritten,
    StreamingRows,
}

pub struct SheetWriter {
    state: WriterState,
    header: Vec<Vec<CellValue>>,
    rows: Vec<Vec<CellValue>>,
    column_count: usize,
}

/// Sheet with widths and column types resolved, ready for rendering.
pub struct FinalizedSheet {
    pub header: Vec<Vec<CellValue>>,
    pub rows: Vec<Vec<CellValue>>,
    pub column_count: usize,
    /// Character widths per column when auto width was requested.
    pub column_widths: Option<Vec<usize>>,
    pub column_types: Vec<(usize, ColumnType)>,
    /// First data row, 1-based (header height + 1).
    pub start_row: usize,
}

impl Default for SheetWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl SheetWriter {
    pub fn new() -> Self {
        SheetWriter {
            state: WriterState::Idle,
            header: Vec::new(),
            rows: Vec::new(),
            column_count: 0,
        }
    }

    /// Header rows must be written exactly once, before any data row.
    pub fn write_header(&mut self, header: &[Vec<String>]) -> Result<(), ApiError> {
        if self.state != WriterState::Idle {
            return Err(ApiError::Export("header already written".into()));
        }
        self.header = header
            .iter()
            .map(|row| row.iter().map(|s| CellValue::Text(s.clone())).collect())
            .collect();
        for row in &self.header {
            self.column_count = self.column_count.max(row.len());
        }
        self.state = WriterState::HeaderWritten;
        Ok(())
    }

    pub fn append_row(&mut self, cells: Vec<CellValue>) -> Result<(), ApiError> {
        match self.state {
            WriterState::Idle => Err(ApiError::Export("header must be written before rows".into())),
            WriterState::HeaderWritten | WriterState::StreamingRows => {
                self.column_count = self.column_count.max(cells.len());
                self.rows.push(cells);
                self.state = WriterState::StreamingRows;
                Ok(())
            }
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Consume the writer; compute auto widths and attach column types over
    /// the populated row range.
    pub fn finalize(
        self,
        auto_width: bool,
        column_types: &[(usize, ColumnType)],
    ) -> Result<FinalizedSheet, ApiError> {
        if self.state == WriterState::Idle {
            return Err(ApiError::Export("nothing written to sheet".into()));
        }
        let column_widths = auto_width.then(|| {
            let mut widths = vec![0usize; self.column_count];
            for row in self.header.iter().chain(self.rows.iter()) {
                for (i, cell) in row.iter().enumerate() {
                    widths[i] = widths[i].max(cell.display_len());
                }
            }
            // Padding so content does not touch the column edge.
            widths.iter().map(|w| w + 2).collect()
        });
        Ok(FinalizedSheet {
            start_row: self.header.len() + 1,
            header: self.header,
            rows: self.rows,
            column_count: self.column_count,
            column_widths,
            column_types: column_types.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_before_header_rejected() {
        let mut w = SheetWriter::new();
        let err = w.append_row(vec![CellValue::Text("x".into())]).unwrap_err();
        assert!(matches!(err, ApiError::Export(_)));
    }

    #[test]
    fn header_written_once() {
        let mut w = SheetWriter::new();
        w.write_header(&[vec!["ID".into()]]).unwrap();
        assert!(w.write_header(&[vec!["ID".into()]]).is_err());
    }

    #[test]
    fn start_row_follows_header_height() {
        let mut w = SheetWriter::new();
        w.write_header(&[vec!["Report".into()], vec!["ID".into(), "Name".into()]])
            .unwrap();
        w.append_row(vec![CellValue::Number(1.0), CellValue::Text("a".into())])
            .unwrap();
        let sheet = w.finalize(false, &[]).unwrap();
        assert_eq!(sheet.start_row, 3);
        assert_eq!(sheet.column_count, 2);
        assert!(sheet.column_widths.is_none());
    }

    #[test]
    fn auto_width_covers_header_and_rows() {
        let mut w = SheetWriter::new();
        w.write_header(&[vec!["ID".into(), "Name".into()]]).unwrap();
        w.append_row(vec![
            CellValue::Number(1.0),
            CellValue::Text("a much longer value".into()),
        ])
        .unwrap();
        let sheet = w.finalize(true, &[]).unwrap();
        let widths = sheet.column_widths.unwrap();
        assert_eq!(widths[0], 4); // "ID" + padding
        assert_eq!(widths[1], 21);
    }
}
