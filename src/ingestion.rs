//! Profiling collaborators.
//!
//! The engine never parses files itself; it consumes `TableMeta` from a
//! `TableProfiler` and schema-aligned cell rows from a `RowProvider`.
//! This module defines those traits plus default CSV-backed
//! implementations so the crate works against plain CSV out of the box.

use crate::column_matcher::detect_shape_patterns;
use crate::error::{JoinError, Result};
use crate::schema::{CellValue, ColumnSchema, ColumnType, TableMeta};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Produces profiled table metadata from a file path.
pub trait TableProfiler {
    fn profile_table(&self, path: &Path) -> Result<TableMeta>;
}

/// Produces schema-aligned rows for a profiled table.
pub trait RowProvider {
    fn load_rows(&self, table: &TableMeta) -> Result<Vec<Vec<CellValue>>>;
}

const MAX_EXAMPLES: usize = 5;
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d-%m-%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
}

fn parse_datetime(raw: &str) -> Option<NaiveDate> {
    DATETIME_FORMATS
        .iter()
        .find_map(|f| chrono::NaiveDateTime::parse_from_str(raw, f).ok())
        .map(|dt| dt.date())
}

fn is_bool(raw: &str) -> bool {
    matches!(
        raw.to_lowercase().as_str(),
        "true" | "false" | "yes" | "no" | "0" | "1"
    ) && raw.len() <= 5
}

/// Candidate type flags tracked while scanning one column.
#[derive(Debug)]
struct TypeTracker {
    all_int: bool,
    all_float: bool,
    all_bool: bool,
    all_date: bool,
    all_datetime: bool,
    all_email: bool,
    all_uuid: bool,
    all_url: bool,
    all_phone: bool,
    seen: usize,
}

impl TypeTracker {
    fn new() -> Self {
        Self {
            all_int: true,
            all_float: true,
            all_bool: true,
            all_date: true,
            all_datetime: true,
            all_email: true,
            all_uuid: true,
            all_url: true,
            all_phone: true,
            seen: 0,
        }
    }

    fn observe(&mut self, raw: &str) {
        self.seen += 1;
        self.all_int &= raw.parse::<i64>().is_ok();
        self.all_float &= raw.parse::<f64>().is_ok();
        self.all_bool &= is_bool(raw);
        self.all_date &= parse_date(raw).is_some();
        self.all_datetime &= parse_datetime(raw).is_some();
        let shapes = detect_shape_patterns(raw);
        self.all_email &= shapes.contains(&"email");
        self.all_uuid &= shapes.contains(&"uuid");
        self.all_url &= shapes.contains(&"url");
        self.all_phone &= shapes.contains(&"phone");
    }

    /// Most specific type every non-null value satisfied. `0`/`1`
    /// columns parse as integers too, so numeric checks come first.
    fn resolve(&self) -> ColumnType {
        if self.seen == 0 {
            return ColumnType::String;
        }
        if self.all_int {
            ColumnType::Integer
        } else if self.all_float {
            ColumnType::Float
        } else if self.all_bool {
            ColumnType::Boolean
        } else if self.all_date {
            ColumnType::Date
        } else if self.all_datetime {
            ColumnType::DateTime
        } else if self.all_uuid {
            ColumnType::Uuid
        } else if self.all_email {
            ColumnType::Email
        } else if self.all_url {
            ColumnType::Url
        } else if self.all_phone {
            ColumnType::Phone
        } else {
            ColumnType::String
        }
    }
}

/// Default CSV profiler: header-based schema with per-column type
/// inference, distinct/null counting, shape patterns, and examples.
#[derive(Debug, Clone, Default)]
pub struct CsvProfiler;

impl CsvProfiler {
    pub fn new() -> Self {
        Self
    }
}

impl TableProfiler for CsvProfiler {
    fn profile_table(&self, path: &Path) -> Result<TableMeta> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                JoinError::InvalidTable(format!("Cannot derive table name from {}", path.display()))
            })?;

        let metadata = std::fs::metadata(path)?;
        let modified: DateTime<Utc> = metadata.modified().map(DateTime::from).unwrap_or_else(
            |_| Utc::now(),
        );

        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        if headers.is_empty() {
            return Err(JoinError::InvalidTable(format!(
                "No header row in {}",
                path.display()
            )));
        }

        let mut trackers: Vec<TypeTracker> = headers.iter().map(|_| TypeTracker::new()).collect();
        let mut distinct: Vec<HashSet<String>> = headers.iter().map(|_| HashSet::new()).collect();
        let mut null_counts = vec![0usize; headers.len()];
        let mut patterns: Vec<HashSet<&'static str>> =
            headers.iter().map(|_| HashSet::new()).collect();
        let mut examples: Vec<Vec<String>> = headers.iter().map(|_| Vec::new()).collect();
        let mut row_count = 0usize;

        for record in reader.records() {
            let record = record?;
            row_count += 1;
            for idx in 0..headers.len() {
                let raw = record.get(idx).unwrap_or("").trim();
                if raw.is_empty() {
                    null_counts[idx] += 1;
                    continue;
                }
                trackers[idx].observe(raw);
                distinct[idx].insert(raw.to_lowercase());
                for p in detect_shape_patterns(raw) {
                    patterns[idx].insert(p);
                }
                if examples[idx].len() < MAX_EXAMPLES && !examples[idx].contains(&raw.to_string())
                {
                    examples[idx].push(raw.to_string());
                }
            }
        }

        let columns = headers
            .iter()
            .enumerate()
            .map(|(idx, header)| {
                let distinct_count = distinct[idx].len();
                let non_null = row_count - null_counts[idx];
                ColumnSchema {
                    name: header.clone(),
                    column_type: trackers[idx].resolve(),
                    nullable: null_counts[idx] > 0,
                    unique: non_null > 0 && distinct_count == non_null,
                    distinct_count,
                    null_count: null_counts[idx],
                    patterns: patterns[idx].iter().map(|p| p.to_string()).collect(),
                    examples: std::mem::take(&mut examples[idx]),
                }
            })
            .collect();

        debug!(table = %name, rows = row_count, "profiled csv table");

        Ok(TableMeta {
            path: path.to_path_buf(),
            name,
            columns,
            row_count,
            size_bytes: metadata.len(),
            modified,
        })
    }
}

/// Default CSV row provider: re-reads the profiled file and types each
/// cell once according to the profiled column type.
#[derive(Debug, Clone, Default)]
pub struct CsvRowProvider;

impl CsvRowProvider {
    pub fn new() -> Self {
        Self
    }

    fn cell(raw: &str, column_type: ColumnType) -> CellValue {
        let raw = raw.trim();
        if raw.is_empty() {
            return CellValue::Null;
        }
        match column_type {
            ColumnType::Integer => raw
                .parse::<i64>()
                .map(CellValue::Int)
                .unwrap_or_else(|_| CellValue::Text(raw.to_string())),
            ColumnType::Float => raw
                .parse::<f64>()
                .map(CellValue::Float)
                .unwrap_or_else(|_| CellValue::Text(raw.to_string())),
            ColumnType::Boolean => match raw.to_lowercase().as_str() {
                "true" | "yes" | "1" => CellValue::Bool(true),
                "false" | "no" | "0" => CellValue::Bool(false),
                _ => CellValue::Text(raw.to_string()),
            },
            ColumnType::Date | ColumnType::DateTime => parse_date(raw)
                .or_else(|| parse_datetime(raw))
                .map(CellValue::Date)
                .unwrap_or_else(|| CellValue::Text(raw.to_string())),
            _ => CellValue::Text(raw.to_string()),
        }
    }
}

impl RowProvider for CsvRowProvider {
    fn load_rows(&self, table: &TableMeta) -> Result<Vec<Vec<CellValue>>> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&table.path)?;
        let mut rows = Vec::with_capacity(table.row_count.min(65_536));
        for record in reader.records() {
            let record = record?;
            let row = table
                .columns
                .iter()
                .enumerate()
                .map(|(idx, col)| Self::cell(record.get(idx).unwrap_or(""), col.column_type))
                .collect();
            rows.push(row);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_profile_types_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "customers.csv",
            "customer_id,email,signup_date,score\n\
             1,a@example.com,2024-01-01,1.5\n\
             2,b@example.com,2024-01-02,2.0\n\
             3,,2024-01-03,\n",
        );
        let table = CsvProfiler::new().profile_table(&path).unwrap();
        assert_eq!(table.name, "customers");
        assert_eq!(table.row_count, 3);
        assert_eq!(table.columns.len(), 4);

        let id = table.column("customer_id").unwrap();
        assert_eq!(id.column_type, ColumnType::Integer);
        assert!(id.unique);
        assert_eq!(id.distinct_count, 3);

        let email = table.column("email").unwrap();
        assert_eq!(email.column_type, ColumnType::Email);
        assert!(email.nullable);
        assert_eq!(email.null_count, 1);
        assert!(email.patterns.contains(&"email".to_string()));

        let date = table.column("signup_date").unwrap();
        assert_eq!(date.column_type, ColumnType::Date);

        let score = table.column("score").unwrap();
        assert_eq!(score.column_type, ColumnType::Float);
    }

    #[test]
    fn test_row_provider_types_cells_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "orders.csv",
            "order_id,amount,placed\n10,99.5,2024-02-01\n11,,2024-02-02\n",
        );
        let table = CsvProfiler::new().profile_table(&path).unwrap();
        let rows = CsvRowProvider::new().load_rows(&table).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], CellValue::Int(10));
        assert_eq!(rows[0][1], CellValue::Float(99.5));
        assert!(matches!(rows[0][2], CellValue::Date(_)));
        assert!(rows[1][1].is_null());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = CsvProfiler::new()
            .profile_table(Path::new("/nonexistent/nope.csv"))
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_TABLE");
    }
}
