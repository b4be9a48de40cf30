use std::path::Path;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, Float64Array};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{NamedSpectrum, StageEntry, StageTable};

/// Column holding the per-channel counts in pre-summed spectrum files.
pub const COUNTS_COLUMN: &str = "Counts";

// ---------------------------------------------------------------------------
// Raster scan inputs
// ---------------------------------------------------------------------------

/// Read a headerless `step, z_pulse, x_pulse` stage table.
///
/// Columns past the third are ignored; blank lines are skipped.
pub fn read_stage_table(path: &Path) -> Result<StageTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .context("opening stage table")?;

    let mut entries = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("stage table row {row_no}"))?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        if record.len() < 3 {
            bail!("stage table row {row_no}: expected 3 columns, found {}", record.len());
        }
        let step = parse_integer(&record[0], row_no, "step")?;
        if step < 1 {
            bail!("stage table row {row_no}: step numbers start at 1, found {step}");
        }
        entries.push(StageEntry {
            step: u32::try_from(step)
                .with_context(|| format!("stage table row {row_no}: step {step} out of range"))?,
            z_pulse: parse_integer(&record[1], row_no, "Z pulse")?,
            x_pulse: parse_integer(&record[2], row_no, "X pulse")?,
        });
    }
    Ok(StageTable::new(entries))
}

/// Read the first column of every non-blank line of a detector (`.mca`)
/// file, header and footer text included.
pub fn read_detector_records(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_path(path)
        .context("opening detector file")?;

    let mut records = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("detector file row {row_no}"))?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        records.push(record.get(0).unwrap_or("").trim().to_string());
    }
    Ok(records)
}

/// Parse a detector count cell. Whole numbers written as floats
/// (`"12.0"`) are truncated like an integer cast.
pub fn parse_count(cell: &str, channel: usize) -> Result<i64> {
    if let Ok(v) = cell.parse::<i64>() {
        return Ok(v);
    }
    match cell.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v as i64),
        _ => bail!("channel {channel}: '{cell}' is not a count"),
    }
}

fn parse_integer(cell: &str, row: usize, col: &str) -> Result<i64> {
    cell.parse::<i64>()
        .with_context(|| format!("stage table row {row}, {col}: '{cell}' is not an integer"))
}

// ---------------------------------------------------------------------------
// Pre-summed spectra
// ---------------------------------------------------------------------------

/// Load a pre-summed spectrum.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv` / `.txt` – a `Counts` column, one row per channel
/// * `.json`         – `{ "Counts": [...] }` or a bare number array
/// * `.parquet`      – a numeric `Counts` column
pub fn load_spectrum_file(path: &Path) -> Result<NamedSpectrum> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let counts = match ext.as_str() {
        "csv" | "txt" => load_counts_csv(path),
        "json" => load_counts_json(path),
        "parquet" | "pq" => load_counts_parquet(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading {}", path.display()))?;
    if counts.is_empty() {
        bail!("{} has no '{COUNTS_COLUMN}' values", path.display());
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(NamedSpectrum::new(name, counts))
}

fn load_counts_csv(path: &Path) -> Result<Vec<f64>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .context("opening CSV")?;
    let headers = reader.headers().context("reading CSV headers")?.clone();
    let idx = headers
        .iter()
        .position(|h| h == COUNTS_COLUMN)
        .with_context(|| format!("CSV missing '{COUNTS_COLUMN}' column"))?;

    let mut counts = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let cell = record.get(idx).unwrap_or("");
        let value = cell
            .parse::<f64>()
            .with_context(|| format!("Row {row_no}: '{cell}' is not a number"))?;
        counts.push(value);
    }
    Ok(counts)
}

fn load_counts_json(path: &Path) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let values = match &root {
        JsonValue::Array(arr) => arr,
        JsonValue::Object(obj) => obj
            .get(COUNTS_COLUMN)
            .and_then(|v| v.as_array())
            .with_context(|| format!("missing or invalid '{COUNTS_COLUMN}' array"))?,
        _ => bail!("Expected a JSON array or an object with '{COUNTS_COLUMN}'"),
    };

    values
        .iter()
        .enumerate()
        .map(|(j, v)| {
            v.as_f64()
                .with_context(|| format!("{COUNTS_COLUMN}[{j}]: not a number"))
        })
        .collect()
}

/// Works with files written by Pandas and Polars alike; any integer or
/// float `Counts` column is accepted.
fn load_counts_parquet(path: &Path) -> Result<Vec<f64>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut counts = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let idx = batch
            .schema()
            .index_of(COUNTS_COLUMN)
            .map_err(|_| anyhow::anyhow!("Parquet file missing '{COUNTS_COLUMN}' column"))?;

        let column = cast(batch.column(idx), &DataType::Float64)
            .with_context(|| format!("'{COUNTS_COLUMN}' is not numeric"))?;
        let values = column
            .as_any()
            .downcast_ref::<Float64Array>()
            .context("expected Float64Array after cast")?;
        if values.null_count() > 0 {
            bail!("'{COUNTS_COLUMN}' contains null values");
        }
        counts.extend(values.values().iter().copied());
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;

    use arrow::array::Int64Array;
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use tempfile::TempDir;

    #[test]
    fn stage_table_ignores_extra_columns() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("StageTable.csv");
        fs::write(&path, "1,0,100,extra\n2, 25, 100\n\n3,50,100\n").unwrap();

        let table = read_stage_table(&path).expect("stage table should parse");
        assert_eq!(table.len(), 3);
        assert_eq!(
            table.entries[1],
            StageEntry { step: 2, z_pulse: 25, x_pulse: 100 }
        );
    }

    #[test]
    fn stage_table_rejects_short_rows_and_zero_steps() {
        let temp = TempDir::new().expect("tempdir should be created");
        let short = temp.path().join("short.csv");
        fs::write(&short, "1,0\n").unwrap();
        assert!(read_stage_table(&short).is_err());

        let zero = temp.path().join("zero.csv");
        fs::write(&zero, "0,0,0\n").unwrap();
        let err = read_stage_table(&zero).unwrap_err();
        assert!(format!("{err:#}").contains("start at 1"));
    }

    #[test]
    fn detector_records_keep_header_text() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("1-1.mca");
        fs::write(&path, "<<PMCA SPECTRUM>>\r\nTAG - \"live\"\r\n\r\n5\r\n7,ignored\r\n").unwrap();

        let records = read_detector_records(&path).unwrap();
        assert_eq!(records, vec!["<<PMCA SPECTRUM>>", "TAG - \"live\"", "5", "7"]);
    }

    #[test]
    fn parse_count_accepts_float_notation() {
        assert_eq!(parse_count("42", 0).unwrap(), 42);
        assert_eq!(parse_count("42.0", 0).unwrap(), 42);
        assert!(parse_count("<<DATA>>", 3).is_err());
    }

    #[test]
    fn counts_csv_by_header() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("scan_01.csv");
        fs::write(&path, "Counts\n0\n3\n12\n").unwrap();

        let spectrum = load_spectrum_file(&path).unwrap();
        assert_eq!(spectrum.name, "scan_01.csv");
        assert_eq!(spectrum.counts, vec![0.0, 3.0, 12.0]);
    }

    #[test]
    fn counts_csv_without_counts_column_fails() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("bad.csv");
        fs::write(&path, "Energy\n1\n").unwrap();
        let err = load_spectrum_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("missing 'Counts'"));
    }

    #[test]
    fn header_only_csv_names_the_file() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("blank.csv");
        fs::write(&path, "Counts\n").unwrap();
        let err = load_spectrum_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("blank.csv"), "{err:#}");
    }

    #[test]
    fn counts_json_object_and_array() {
        let temp = TempDir::new().expect("tempdir should be created");
        let obj = temp.path().join("a.json");
        fs::write(&obj, r#"{"Counts": [1, 2.5, 3]}"#).unwrap();
        assert_eq!(load_spectrum_file(&obj).unwrap().counts, vec![1.0, 2.5, 3.0]);

        let arr = temp.path().join("b.json");
        fs::write(&arr, "[4, 5]").unwrap();
        assert_eq!(load_spectrum_file(&arr).unwrap().counts, vec![4.0, 5.0]);
    }

    #[test]
    fn counts_parquet_integer_column() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("scan.parquet");
        let schema = Arc::new(Schema::new(vec![Field::new(
            COUNTS_COLUMN,
            DataType::Int64,
            false,
        )]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![Arc::new(Int64Array::from(vec![7, 0, 9]))],
        )
        .unwrap();
        let file = fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        assert_eq!(load_spectrum_file(&path).unwrap().counts, vec![7.0, 0.0, 9.0]);
    }

    #[test]
    fn unsupported_extension() {
        let err = load_spectrum_file(Path::new("spectrum.xlsx")).unwrap_err();
        assert!(err.to_string().contains(".xlsx"));
    }
}
