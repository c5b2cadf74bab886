//! Tabular export: pull filtered rows in fixed-size chunks, map them to sheet
//! rows, and package the result as a downloadable XLSX or CSV document.
//!
//! Memory of the read path is bounded by the chunk size; a chunk is released
//! as soon as its rows are mapped into the sheet.

pub mod csv;
pub mod sheet;
pub mod xlsx;

pub use sheet::{CellValue, ColumnType, FinalizedSheet, SheetWriter};

use crate::error::ApiError;
use crate::service::EntitySource;
use axum::http::{header, StatusCode};
use axum::response::Response;
use serde_json::Value;

pub const DEFAULT_CHUNK_SIZE: u32 = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportMode {
    Xlsx,
    Csv,
}

impl ExportMode {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportMode::Xlsx => "application/vnd.ms-excel",
            ExportMode::Csv => "text/csv",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportMode::Xlsx => "xlsx",
            ExportMode::Csv => "csv",
        }
    }
}

/// Sheet layout for one export request; discarded when the stream completes.
#[derive(Clone, Debug)]
pub struct ExportSpec {
    /// Header block, one or more rows of cell values.
    pub header: Vec<Vec<String>>,
    /// (zero-based column index, type) applied at finalize.
    pub column_types: Vec<(usize, ColumnType)>,
    pub auto_width: bool,
    pub chunk_size: u32,
    pub mode: ExportMode,
}

impl ExportSpec {
    pub fn new(header: Vec<Vec<String>>) -> Self {
        ExportSpec {
            header,
            column_types: Vec::new(),
            auto_width: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            mode: ExportMode::Xlsx,
        }
    }
}

/// Maps one entity to a sheet row; `None` skips the row (sparse filtering on
/// mapping, not a failure).
pub type ExportRowFn<'a> = &'a (dyn Fn(&Value) -> Option<Vec<Value>> + Send + Sync);

/// A fully built export document, ready to send.
#[derive(Debug)]
pub struct ExportDocument {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ExportDocument {
    pub fn into_response(self) -> Response {
        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, self.content_type)
            .header(
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", self.filename),
            )
            .body(self.bytes.into())
            .unwrap_or_default()
    }
}

/// Run the export pipeline. Zero matching rows is rejected before any sheet
/// object is constructed.
pub async fn export(
    source: &mut dyn EntitySource,
    spec: &ExportSpec,
    map: Option<ExportRowFn<'_>>,
    resource_name: &str,
) -> Result<ExportDocument, ApiError> {
    let total = source.count().await?;
    if total == 0 {
        return Err(ApiError::invalid("no exportable data found, change parameters?"));
    }

    let mut writer = SheetWriter::new();
    writer.write_header(&spec.header)?;

    let mut offset: u64 = 0;
    while offset < total {
        let chunk = source.fetch_chunk(spec.chunk_size, offset).await?;
        if chunk.is_empty() {
            break;
        }
        offset += chunk.len() as u64;
        for entity in &chunk {
            let cells = match map {
                Some(f) => match f(entity) {
                    Some(mapped) if !mapped.is_empty() => {
                        mapped.iter().map(CellValue::from_json).collect()
                    }
                    _ => continue,
                },
                None => default_row(entity),
            };
            writer.append_row(cells)?;
        }
    }

    let sheet = writer.finalize(spec.auto_width, &spec.column_types)?;
    let bytes = match spec.mode {
        ExportMode::Xlsx => xlsx::write_package(&sheet)?,
        ExportMode::Csv => csv::render(&sheet),
    };

    Ok(ExportDocument {
        filename: export_filename(resource_name, spec.mode),
        content_type: spec.mode.content_type(),
        bytes,
    })
}

/// Without a mapping function an entity exports as its attribute values.
fn default_row(entity: &Value) -> Vec<CellValue> {
    match entity {
        Value::Object(map) => map.values().map(CellValue::from_json).collect(),
        other => vec![CellValue::from_json(other)],
    }
}

fn export_filename(resource_name: &str, mode: ExportMode) -> String {
    let today = chrono::Utc::now().format("%Y-%m-%d_%H-%M-%S");
    format!("{resource_name}_export_{today}.{}", mode.extension())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::tests::FakeSource;
    use serde_json::json;

    fn rows(n: usize) -> Vec<Value> {
        (0..n).map(|i| json!({"id": i, "name": format!("row {i}")})).collect()
    }

    fn spec(chunk_size: u32) -> ExportSpec {
        let mut s = ExportSpec::new(vec![vec!["ID".into(), "Name".into()]]);
        s.chunk_size = chunk_size;
        s
    }

    #[tokio::test]
    async fn zero_rows_rejected_before_sheet_built() {
        let mut source = FakeSource::new(vec![]);
        let err = export(&mut source, &spec(100), None, "Order").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation { .. }));
        assert_eq!(source.chunk_calls, 0);
    }

    #[tokio::test]
    async fn chunk_reads_are_ceil_of_total_over_chunk_size() {
        let mut source = FakeSource::new(rows(2500));
        export(&mut source, &spec(1000), None, "Order").await.unwrap();
        assert_eq!(source.chunk_calls, 3);

        let mut source = FakeSource::new(rows(2000));
        export(&mut source, &spec(1000), None, "Order").await.unwrap();
        assert_eq!(source.chunk_calls, 2);
    }

    #[tokio::test]
    async fn mapping_skips_empty_rows() {
        let mut source = FakeSource::new(rows(4));
        let map: ExportRowFn = &|v| {
            let id = v["id"].as_u64()?;
            // Odd ids are filtered out by the mapping itself.
            (id % 2 == 0).then(|| vec![v["id"].clone(), v["name"].clone()])
        };
        let doc = export(&mut source, &spec(10), Some(map), "Order").await.unwrap();
        assert!(!doc.bytes.is_empty());

        let mut source = FakeSource::new(rows(4));
        let mut s = spec(10);
        s.mode = ExportMode::Csv;
        let doc = export(&mut source, &s, Some(map), "Order").await.unwrap();
        let csv = String::from_utf8(doc.bytes).unwrap();
        assert_eq!(csv.lines().count(), 3); // header + rows 0 and 2
    }

    #[tokio::test]
    async fn filename_and_content_type() {
        let mut source = FakeSource::new(rows(1));
        let doc = export(&mut source, &spec(10), None, "Product").await.unwrap();
        assert!(doc.filename.starts_with("Product_export_"));
        assert!(doc.filename.ends_with(".xlsx"));
        assert_eq!(doc.content_type, "application/vnd.ms-excel");
        // Documents are debug-printable for assertions and logging.
        assert!(format!("{doc:?}").contains("ExportDocument"));
    }
}
