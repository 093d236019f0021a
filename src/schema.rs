//! Profiled table and column metadata, plus the closed cell-value
//! variant that row data is normalized into during profiling.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Declared column type assigned by the profiling collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    String,
    Integer,
    Float,
    Date,
    DateTime,
    Boolean,
    Uuid,
    Email,
    Phone,
    Url,
}

impl ColumnType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, ColumnType::Date | ColumnType::DateTime)
    }

    /// Loose compatibility used by the detector pre-filter: identical
    /// types, numeric with numeric, date with datetime, or either side
    /// being a plain string (strings can encode anything).
    pub fn is_compatible_with(&self, other: &ColumnType) -> bool {
        self == other
            || (self.is_numeric() && other.is_numeric())
            || (self.is_temporal() && other.is_temporal())
            || *self == ColumnType::String
            || *other == ColumnType::String
    }
}

/// A single cell, typed once during profiling. Runtime type inspection
/// downstream reduces to matching on this variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Runtime type label used for type-histogram comparison.
    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Null => "null",
            CellValue::Bool(_) => "bool",
            CellValue::Int(_) => "int",
            CellValue::Float(_) => "float",
            CellValue::Text(_) => "text",
            CellValue::Date(_) => "date",
        }
    }

    /// Normalized string form for value-set comparison. Trimmed and
    /// lowercased so "ABC " and "abc" land in the same bucket; integral
    /// floats render without the fractional part so 42.0 matches 42.
    pub fn normalized(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::Bool(b) => Some(b.to_string()),
            CellValue::Int(i) => Some(i.to_string()),
            CellValue::Float(f) => {
                if f.fract() == 0.0 && f.is_finite() {
                    Some(format!("{}", *f as i64))
                } else {
                    Some(f.to_string())
                }
            }
            CellValue::Text(s) => Some(s.trim().to_lowercase()),
            CellValue::Date(d) => Some(d.to_string()),
        }
    }
}

/// Profiled metadata for one column. Immutable once profiled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Column name as it appears in the header.
    pub name: String,

    /// Declared (inferred) type.
    pub column_type: ColumnType,

    /// Whether any nulls were observed.
    pub nullable: bool,

    /// Whether every non-null value was distinct.
    pub unique: bool,

    /// Number of distinct non-null values.
    pub distinct_count: usize,

    /// Number of null cells.
    pub null_count: usize,

    /// Names of detected value-shape patterns (email, uuid, ...).
    pub patterns: Vec<String>,

    /// A few sample values for display.
    pub examples: Vec<String>,
}

impl ColumnSchema {
    /// Distinct values as a fraction of total rows; 0.0 for empty tables.
    pub fn distinct_ratio(&self, row_count: usize) -> f64 {
        if row_count == 0 {
            0.0
        } else {
            self.distinct_count as f64 / row_count as f64
        }
    }

    /// A column acts as a key side when declared unique or when every
    /// row carries a distinct value.
    pub fn is_effectively_unique(&self, row_count: usize) -> bool {
        self.unique || (row_count > 0 && self.distinct_count == row_count)
    }
}

/// Profiled metadata for one table. One per input file per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMeta {
    /// Source file path, kept for later row sampling.
    pub path: PathBuf,

    /// Table name (file stem by convention).
    pub name: String,

    /// Ordered column schemas.
    pub columns: Vec<ColumnSchema>,

    /// Total row count.
    pub row_count: usize,

    /// File size estimate in bytes.
    pub size_bytes: u64,

    /// Last modification time of the source file.
    pub modified: DateTime<Utc>,
}

impl TableMeta {
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_compatibility() {
        assert!(ColumnType::Integer.is_compatible_with(&ColumnType::Float));
        assert!(ColumnType::Date.is_compatible_with(&ColumnType::DateTime));
        assert!(ColumnType::String.is_compatible_with(&ColumnType::Uuid));
        assert!(!ColumnType::Integer.is_compatible_with(&ColumnType::Boolean));
    }

    #[test]
    fn test_cell_normalization() {
        assert_eq!(CellValue::Int(42).normalized().as_deref(), Some("42"));
        assert_eq!(CellValue::Float(42.0).normalized().as_deref(), Some("42"));
        assert_eq!(
            CellValue::Text("  ABC ".into()).normalized().as_deref(),
            Some("abc")
        );
        assert_eq!(CellValue::Null.normalized(), None);
    }

    #[test]
    fn test_effectively_unique() {
        let col = ColumnSchema {
            name: "id".into(),
            column_type: ColumnType::Integer,
            nullable: false,
            unique: false,
            distinct_count: 100,
            null_count: 0,
            patterns: vec![],
            examples: vec![],
        };
        assert!(col.is_effectively_unique(100));
        assert!(!col.is_effectively_unique(200));
    }
}
