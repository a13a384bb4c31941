//! Sheet loading
//!
//! Reads each configured sheet from CSV or Parquet into Arrow record batches
//! and turns them into raw admissions. CSV columns are all read as text;
//! Parquet columns are cast to text on extraction.

use arrow::csv::ReaderBuilder;
use arrow::csv::reader::Format;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use futures::future::try_join_all;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::collections::BTreeMap;
use std::io::{Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::config::SheetConfig;
use crate::error::util::safe_open_file;
use crate::error::{AnalysisError, Result};
use crate::models::{AdmissionField, RawSheet};
use crate::utils::arrow::{ColumnMap, extract_admissions};
use crate::utils::logging::{log_operation_complete, log_operation_start, log_warning};

/// Rows per record batch when reading CSV
pub const CSV_BATCH_SIZE: usize = 8192;

/// Supported sheet file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Csv,
    Parquet,
}

impl SheetFormat {
    /// Format from the file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("csv") => Ok(Self::Csv),
            Some("parquet") => Ok(Self::Parquet),
            _ => Err(AnalysisError::Config(format!(
                "cannot tell the format of {} (expected .csv or .parquet)",
                path.display()
            ))),
        }
    }
}

/// Read a CSV file with every column as nullable text
pub fn read_csv(path: &Path) -> Result<Vec<RecordBatch>> {
    let mut file = safe_open_file(path, "reading CSV sheet")?;
    let (inferred, _) = Format::default()
        .with_header(true)
        .infer_schema(&mut file, Some(0))?;
    file.seek(SeekFrom::Start(0))?;

    let schema: SchemaRef = Arc::new(Schema::new(
        inferred
            .fields()
            .iter()
            .map(|f| Field::new(f.name(), DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ));

    let reader = ReaderBuilder::new(schema)
        .with_header(true)
        .with_batch_size(CSV_BATCH_SIZE)
        .build(file)?;
    Ok(reader.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Read a Parquet file
pub fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>> {
    let file = safe_open_file(path, "reading parquet sheet")?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    Ok(reader.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Load one sheet
///
/// A sheet lacking a column that every record needs is a schema error. A
/// sheet lacking diagnosis codes or ICU hours is read as if every row left
/// them blank.
pub fn load_sheet(sheet: &SheetConfig, aliases: &BTreeMap<String, String>) -> Result<RawSheet> {
    let start = Instant::now();
    log_operation_start("Loading sheet from", &sheet.path);

    let batches = match SheetFormat::from_path(&sheet.path)? {
        SheetFormat::Csv => read_csv(&sheet.path)?,
        SheetFormat::Parquet => read_parquet(&sheet.path)?,
    };

    let mut raw = RawSheet::new(sheet.name.clone(), sheet.housing_status);
    let Some(first) = batches.first() else {
        log_warning("Sheet has no rows", Some(&sheet.path));
        return Ok(raw);
    };

    let columns = ColumnMap::resolve(&first.schema(), aliases);
    let missing = columns.missing();
    let (recoverable, required): (Vec<AdmissionField>, Vec<AdmissionField>) =
        missing.into_iter().partition(|f| f.is_recoverable());
    if !required.is_empty() {
        return Err(AnalysisError::Schema(format!(
            "sheet '{}' ({}) has no column for: {}",
            sheet.name,
            sheet.path.display(),
            required
                .iter()
                .map(|f| f.column_name())
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }
    for field in recoverable {
        log_warning(
            &format!("Sheet '{}' has no {field} column; treating it as blank", sheet.name),
            Some(&sheet.path),
        );
    }

    for batch in &batches {
        let rows = extract_admissions(batch, &columns, &sheet.name, raw.rows.len())?;
        raw.rows.extend(rows);
    }

    log_operation_complete("loaded", &sheet.path, raw.len(), Some(start.elapsed()));
    Ok(raw)
}

/// Load every sheet concurrently, preserving configuration order
pub async fn load_sheets(
    sheets: &[SheetConfig],
    aliases: &BTreeMap<String, String>,
) -> Result<Vec<RawSheet>> {
    let aliases = Arc::new(aliases.clone());
    let tasks = sheets.iter().cloned().map(|sheet| {
        let aliases = Arc::clone(&aliases);
        async move {
            tokio::task::spawn_blocking(move || load_sheet(&sheet, &aliases)).await?
        }
    });
    try_join_all(tasks).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_follows_extension() {
        assert_eq!(SheetFormat::from_path(Path::new("a/b.CSV")).unwrap(), SheetFormat::Csv);
        assert_eq!(
            SheetFormat::from_path(Path::new("b.parquet")).unwrap(),
            SheetFormat::Parquet
        );
        assert!(SheetFormat::from_path(Path::new("b.xlsx")).is_err());
    }
}
