use std::fs::{self, File, OpenOptions};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use thiserror::Error;
use tracing::info;

use super::row::RowBuffer;

/// Column headers, written once when the file is created. The doubled
/// percent sign in the humidity column is literal.
pub const COLUMN_HEADERS: [&str; 6] = [
    "Timestamp (UTC)",
    "Temperature (F)",
    "Humidity (%% air-water mix compared to dew point)",
    "Current (mA)",
    "Voltage (V)",
    "Power (mW)",
];

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Owns the output path. The file is created at most once with the header
/// row; every flush afterwards appends data rows only.
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: PathBuf) -> Self {
        CsvSink { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the output file with the header row if it does not exist yet.
    /// An existing file is left untouched, so the header appears exactly
    /// once over the file's lifetime.
    pub fn initialize(&self) -> Result<(), SinkError> {
        if self.path.exists() {
            info!("Output file {} already exists", self.path.display());
            return Ok(());
        }

        info!("Creating output file {}", self.path.display());
        let file = File::create(&self.path)?;
        // Field crews pull the CSV off the node under a different account,
        // so the file is left world-writable.
        let mut permissions = file.metadata()?.permissions();
        permissions.set_mode(0o666);
        fs::set_permissions(&self.path, permissions)?;

        let mut writer = WriterBuilder::new().from_writer(file);
        writer.write_record(COLUMN_HEADERS)?;
        writer.flush()?;
        Ok(())
    }

    /// Append every buffered row in insertion order, then clear the buffer.
    /// An empty buffer is a no-op append.
    pub fn flush(&self, buffer: &mut RowBuffer) -> Result<(), SinkError> {
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        for row in buffer.rows() {
            writer.serialize(row)?;
        }
        writer.flush()?;
        info!(
            "Flushed {} rows to {}",
            buffer.len(),
            self.path.display()
        );
        buffer.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::row::ReadingRow;
    use chrono::{TimeZone, Utc};

    fn sample_row(second: u32) -> ReadingRow {
        let at = Utc.with_ymd_and_hms(2022, 4, 1, 10, 0, second).unwrap();
        ReadingRow::new(at, 72.456, 45.123, 120.789, 5.001, 604.321)
    }

    fn read_back(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
        let mut reader = csv::Reader::from_path(path).unwrap();
        let headers = reader
            .headers()
            .unwrap()
            .iter()
            .map(str::to_string)
            .collect();
        let rows = reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect();
        (headers, rows)
    }

    #[test]
    fn initialize_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSink::new(dir.path().join("pi-t-temp-data.csv"));
        sink.initialize().unwrap();
        sink.initialize().unwrap();

        let contents = fs::read_to_string(sink.path()).unwrap();
        assert_eq!(contents.lines().count(), 1);
        let (headers, rows) = read_back(sink.path());
        assert_eq!(headers, COLUMN_HEADERS);
        assert!(rows.is_empty());
    }

    #[test]
    fn flush_appends_in_order_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSink::new(dir.path().join("pi-t-temp-data.csv"));
        sink.initialize().unwrap();

        let mut buffer = RowBuffer::new();
        for second in 0..3 {
            buffer.push(sample_row(second));
        }
        sink.flush(&mut buffer).unwrap();
        assert!(buffer.is_empty());

        let (_, rows) = read_back(sink.path());
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0], "04-01-2022 10:00:00");
        assert_eq!(rows[2][0], "04-01-2022 10:00:02");
    }

    #[test]
    fn flushed_rows_round_trip_as_strings() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSink::new(dir.path().join("pi-t-temp-data.csv"));
        sink.initialize().unwrap();

        let mut buffer = RowBuffer::new();
        buffer.push(sample_row(0));
        let expected: Vec<String> = buffer.rows()[0]
            .as_record()
            .iter()
            .map(|s| s.to_string())
            .collect();
        sink.flush(&mut buffer).unwrap();

        let (_, rows) = read_back(sink.path());
        assert_eq!(rows, vec![expected]);
    }

    #[test]
    fn empty_flush_leaves_only_the_header() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSink::new(dir.path().join("pi-t-temp-data.csv"));
        sink.initialize().unwrap();

        let mut buffer = RowBuffer::new();
        sink.flush(&mut buffer).unwrap();

        let contents = fs::read_to_string(sink.path()).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn successive_flushes_accumulate_rows() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSink::new(dir.path().join("pi-t-temp-data.csv"));
        sink.initialize().unwrap();

        let mut buffer = RowBuffer::new();
        buffer.push(sample_row(0));
        sink.flush(&mut buffer).unwrap();
        buffer.push(sample_row(1));
        sink.flush(&mut buffer).unwrap();

        let (_, rows) = read_back(sink.path());
        assert_eq!(rows.len(), 2);
    }
}
