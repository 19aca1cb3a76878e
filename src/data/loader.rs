use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;

use super::model::{FieldSeries, Values};

// ---------------------------------------------------------------------------
// Directory listing
// ---------------------------------------------------------------------------

/// List the `.csv` files (case-insensitive suffix) directly inside a
/// directory, sorted by name for a deterministic read order.
pub fn csv_filenames(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("listing directory {}", dir.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("listing directory {}", dir.display()))?;
        let path = entry.path();
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if path.is_file() && is_csv {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Whether a directory contains at least one CSV file.
pub fn directory_has_data_files(dir: &Path) -> bool {
    csv_filenames(dir).map(|f| !f.is_empty()).unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Per-file parsing
// ---------------------------------------------------------------------------

/// One CSV row: a timestamp combined from the date and time columns, plus
/// the remaining data cells.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub timestamp: NaiveDateTime,
    pub cells: Vec<String>,
}

/// One parsed CSV file, headers still untrimmed.
#[derive(Debug, Clone)]
pub struct FileTable {
    pub field_names: Vec<String>,
    pub records: Vec<RawRecord>,
}

/// Day-first formats accepted for the combined date + time columns.
const TIMESTAMP_FORMATS: [&str; 5] = [
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
];

fn parse_timestamp(date: &str, time: &str) -> Result<NaiveDateTime> {
    let combined = format!("{} {}", date.trim(), time.trim());
    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(&combined, format) {
            return Ok(ts);
        }
    }
    bail!("unparseable timestamp '{combined}'")
}

/// Parse a single logger CSV file. The layout convention is:
/// column 0 is a reference column (dropped), columns 1 and 2 are a
/// day-first date and a time (combined into the timestamp), and columns
/// 3.. are the data fields.
pub fn read_csv_file(path: &Path) -> Result<FileTable> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("reading headers of {}", path.display()))?;
    if headers.len() < 4 {
        bail!(
            "{}: expected at least 4 columns (reference, date, time, data...), found {}",
            path.display(),
            headers.len()
        );
    }
    let field_names: Vec<String> = headers.iter().skip(3).map(str::to_string).collect();

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("{} row {row}", path.display()))?;
        let date = record.get(1).unwrap_or("");
        let time = record.get(2).unwrap_or("");
        let timestamp =
            parse_timestamp(date, time).with_context(|| format!("{} row {row}", path.display()))?;
        let cells = record.iter().skip(3).map(str::to_string).collect();
        records.push(RawRecord { timestamp, cells });
    }

    Ok(FileTable {
        field_names,
        records,
    })
}

// ---------------------------------------------------------------------------
// Merge and split
// ---------------------------------------------------------------------------

/// All files of a directory concatenated and sorted by timestamp.
#[derive(Debug, Clone)]
pub struct MergedTable {
    pub field_names: Vec<String>,
    pub records: Vec<RawRecord>,
}

impl MergedTable {
    /// Strip incidental whitespace from the column names.
    pub fn trim_field_names(&mut self) {
        for name in &mut self.field_names {
            *name = name.trim().to_string();
        }
    }
}

/// Concatenate per-file tables and sort ascending by timestamp. The sort
/// is unstable; ties carry no ordering guarantee. All files must share the
/// same (trimmed) column layout.
pub fn merge(tables: Vec<FileTable>) -> Result<MergedTable> {
    let mut tables = tables.into_iter();
    let Some(first) = tables.next() else {
        bail!("no tables to merge");
    };

    let trimmed: Vec<&str> = first.field_names.iter().map(|n| n.trim()).collect();
    let mut records = first.records;
    for table in tables {
        let other: Vec<&str> = table.field_names.iter().map(|n| n.trim()).collect();
        if other != trimmed {
            bail!(
                "CSV files disagree on columns: {:?} vs {:?}",
                trimmed,
                other
            );
        }
        records.extend(table.records);
    }
    records.sort_unstable_by_key(|r| r.timestamp);

    Ok(MergedTable {
        field_names: first.field_names,
        records,
    })
}

/// Split the merged table into one series per field, classifying each
/// column as numeric when every non-empty cell parses as a number (empty
/// cells become NaN) and as text otherwise.
pub fn split_series(table: MergedTable) -> BTreeMap<String, FieldSeries> {
    let timestamps: Vec<NaiveDateTime> = table.records.iter().map(|r| r.timestamp).collect();

    let mut series = BTreeMap::new();
    for (col, name) in table.field_names.iter().enumerate() {
        let cells: Vec<&str> = table
            .records
            .iter()
            .map(|r| r.cells.get(col).map(String::as_str).unwrap_or(""))
            .collect();

        let mut numeric = Vec::with_capacity(cells.len());
        let mut seen_number = false;
        let mut is_numeric = true;
        for cell in &cells {
            let cell = cell.trim();
            if cell.is_empty() {
                numeric.push(f64::NAN);
            } else if let Ok(v) = cell.parse::<f64>() {
                numeric.push(v);
                seen_number = true;
            } else {
                is_numeric = false;
                break;
            }
        }

        let values = if is_numeric && seen_number {
            Values::Numeric(numeric)
        } else {
            Values::Text(cells.into_iter().map(str::to_string).collect())
        };
        series.insert(
            name.clone(),
            FieldSeries {
                timestamps: timestamps.clone(),
                values,
            },
        );
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn lists_only_csv_files_case_insensitively() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "a.csv", "x");
        write_file(&dir, "b.CSV", "x");
        write_file(&dir, "notes.txt", "x");
        let files = csv_filenames(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(directory_has_data_files(dir.path()));
    }

    #[test]
    fn parses_day_first_timestamps_and_drops_reference_column() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "log.csv",
            "Ref,Date,Time, Temperature ,Direction\n\
             1,02/03/2024,10:15:00,21.5,N\n\
             2,02/03/2024,10:16:00,21.9,NNE\n",
        );
        let table = read_csv_file(&path).unwrap();
        assert_eq!(table.field_names, vec![" Temperature ", "Direction"]);
        assert_eq!(table.records.len(), 2);
        // Day-first: 02/03 is the 2nd of March.
        assert_eq!(
            table.records[0].timestamp,
            chrono::NaiveDate::from_ymd_opt(2024, 3, 2)
                .unwrap()
                .and_hms_opt(10, 15, 0)
                .unwrap()
        );
        assert_eq!(table.records[1].cells, vec!["21.9", "NNE"]);
    }

    #[test]
    fn unparseable_timestamp_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "bad.csv",
            "Ref,Date,Time,Temperature\n1,not-a-date,10:15:00,21.5\n",
        );
        assert!(read_csv_file(&path).is_err());
    }

    #[test]
    fn merge_sorts_across_files() {
        let dir = TempDir::new().unwrap();
        let a = read_csv_file(&write_file(
            &dir,
            "a.csv",
            "Ref,Date,Time,Temperature\n\
             1,02/03/2024,12:00:00,2.0\n\
             2,02/03/2024,10:00:00,1.0\n",
        ))
        .unwrap();
        let b = read_csv_file(&write_file(
            &dir,
            "b.csv",
            "Ref,Date,Time,Temperature\n1,01/03/2024,23:00:00,0.5\n",
        ))
        .unwrap();

        let merged = merge(vec![a, b]).unwrap();
        let times: Vec<_> = merged.records.iter().map(|r| r.timestamp).collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
        assert_eq!(merged.records.len(), 3);
    }

    #[test]
    fn merge_rejects_mismatched_columns() {
        let dir = TempDir::new().unwrap();
        let a = read_csv_file(&write_file(
            &dir,
            "a.csv",
            "Ref,Date,Time,Temperature\n1,02/03/2024,12:00:00,2.0\n",
        ))
        .unwrap();
        let b = read_csv_file(&write_file(
            &dir,
            "b.csv",
            "Ref,Date,Time,Humidity\n1,02/03/2024,12:00:00,60\n",
        ))
        .unwrap();
        assert!(merge(vec![a, b]).is_err());
    }

    #[test]
    fn split_classifies_columns_and_trims_headers() {
        let dir = TempDir::new().unwrap();
        let table = read_csv_file(&write_file(
            &dir,
            "log.csv",
            "Ref,Date,Time, Temperature ,Direction\n\
             1,02/03/2024,10:00:00,21.5,N\n\
             2,02/03/2024,10:01:00,,NNE\n",
        ))
        .unwrap();
        let mut merged = merge(vec![table]).unwrap();
        merged.trim_field_names();
        let series = split_series(merged);

        let temperature = &series["Temperature"];
        let numbers = temperature.values.as_numeric().unwrap();
        assert_eq!(numbers[0], 21.5);
        assert!(numbers[1].is_nan());

        let direction = &series["Direction"];
        assert!(!direction.is_numeric());
        assert_eq!(direction.len(), 2);
    }
}
