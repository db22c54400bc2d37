//! Station identity and output path derivation.
//!
//! Every node carries a `pi.id` file next to the binary; the first
//! character of the id keys the CSV file name so data pulled off several
//! nodes stays distinguishable.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

/// Read the station id: first line of the id file, surrounding whitespace
/// trimmed. An absent or empty file is a startup error.
pub fn read_station_id(path: &Path) -> io::Result<String> {
    let contents = fs::read_to_string(path)?;
    let id = contents.lines().next().unwrap_or("").trim().to_string();
    if id.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("station id file {} is empty", path.display()),
        ));
    }
    info!("Station id: {}", id);
    Ok(id)
}

/// CSV file name for this station, keyed by the first character of the id.
pub fn data_file_name(station_id: &str) -> String {
    let key = station_id.chars().next().unwrap_or('x');
    format!("pi-{key}-temp-data.csv")
}

/// Full output path: the data file sits in the process's working directory.
pub fn output_path(station_id: &str) -> io::Result<PathBuf> {
    Ok(std::env::current_dir()?.join(data_file_name(station_id)))
}
