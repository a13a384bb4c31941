//! Column resolution and value extraction for sheet record batches
//!
//! Sheets arrive with whatever headers the export produced. Headers are
//! normalized and matched against the canonical admission field names plus
//! configured aliases; values are read as text regardless of the physical
//! Arrow type so that validation sees exactly what the sheet contained.

use arrow::array::{Array, ArrayRef, StringArray};
use arrow::compute::kernels::cast::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{AnalysisError, Result};
use crate::models::{AdmissionField, RawAdmission};

/// Lowercase a header and collapse runs of non-alphanumerics to `_`
///
/// `"ICU Hours"` and `"icu-hours "` both become `icu_hours`.
#[must_use]
pub fn normalize_column_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut pending_separator = false;
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            if pending_separator && !normalized.is_empty() {
                normalized.push('_');
            }
            pending_separator = false;
            normalized.extend(c.to_lowercase());
        } else {
            pending_separator = true;
        }
    }
    normalized
}

/// Column index of each admission field within one sheet's schema
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnMap {
    indices: [Option<usize>; AdmissionField::ALL.len()],
}

impl ColumnMap {
    /// Match schema headers to admission fields
    ///
    /// `aliases` maps a normalized header to a canonical field name. The
    /// first matching header wins.
    #[must_use]
    pub fn resolve(schema: &Schema, aliases: &BTreeMap<String, String>) -> Self {
        let mut map = Self::default();
        for (index, schema_field) in schema.fields().iter().enumerate() {
            let header = normalize_column_name(schema_field.name());
            let canonical = aliases
                .get(&header)
                .map_or(header.as_str(), String::as_str);
            if let Some(position) = AdmissionField::ALL
                .iter()
                .position(|f| f.column_name() == canonical)
            {
                map.indices[position].get_or_insert(index);
            }
        }
        map
    }

    #[must_use]
    pub fn index(&self, field: AdmissionField) -> Option<usize> {
        AdmissionField::ALL
            .iter()
            .position(|&f| f == field)
            .and_then(|position| self.indices[position])
    }

    /// Fields with no matching column
    #[must_use]
    pub fn missing(&self) -> Vec<AdmissionField> {
        AdmissionField::ALL
            .iter()
            .copied()
            .filter(|&f| self.index(f).is_none())
            .collect()
    }
}

/// View any column as a `StringArray`, casting non-string columns
pub fn string_column(batch: &RecordBatch, index: usize) -> Result<StringArray> {
    let column = batch.column(index);
    let utf8: ArrayRef = if column.data_type() == &DataType::Utf8 {
        Arc::clone(column)
    } else {
        cast(column, &DataType::Utf8)?
    };
    utf8.as_any()
        .downcast_ref::<StringArray>()
        .cloned()
        .ok_or_else(|| {
            AnalysisError::Schema(format!(
                "column '{}' could not be read as text",
                batch.schema().field(index).name()
            ))
        })
}

/// Text of one cell, `None` when null or blank
#[must_use]
pub fn extract_string(array: &StringArray, row: usize) -> Option<String> {
    if row >= array.len() || array.is_null(row) {
        return None;
    }
    let value = array.value(row).trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Convert one batch to raw admissions
///
/// `first_row` is the sheet row index of the batch's first row.
pub fn extract_admissions(
    batch: &RecordBatch,
    columns: &ColumnMap,
    sheet: &str,
    first_row: usize,
) -> Result<Vec<RawAdmission>> {
    let mut arrays = Vec::with_capacity(AdmissionField::ALL.len());
    for field in AdmissionField::ALL {
        let array = match columns.index(field) {
            Some(index) => Some(string_column(batch, index)?),
            None => None,
        };
        arrays.push((field, array));
    }

    Ok((0..batch.num_rows())
        .map(|row| {
            let mut raw = RawAdmission {
                sheet: sheet.to_string(),
                row: first_row + row,
                ..RawAdmission::default()
            };
            for (field, array) in &arrays {
                raw.set_field(
                    *field,
                    array.as_ref().and_then(|a| extract_string(a, row)),
                );
            }
            raw
        })
        .collect())
}

/// Convert raw admissions back to an all-text batch with canonical headers
pub fn admissions_to_batch(rows: &[RawAdmission]) -> Result<RecordBatch> {
    let fields: Vec<Field> = AdmissionField::ALL
        .iter()
        .map(|f| Field::new(f.column_name(), DataType::Utf8, true))
        .collect();
    let columns: Vec<ArrayRef> = AdmissionField::ALL
        .iter()
        .map(|&f| {
            Arc::new(
                rows.iter()
                    .map(|raw| raw.field(f))
                    .collect::<StringArray>(),
            ) as ArrayRef
        })
        .collect();
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}
