use chrono::{DateTime, Utc};
use serde::Serialize;

const TIMESTAMP_FORMAT: &str = "%m-%d-%Y %H:%M:%S";

/// One formatted reading. Fields are kept as the exact strings that land in
/// the CSV, so what was printed at collection time and what gets flushed
/// can never drift apart.
#[derive(Clone, Debug, Serialize)]
pub struct ReadingRow {
    #[serde(rename = "Timestamp (UTC)")]
    timestamp: String,
    #[serde(rename = "Temperature (F)")]
    temperature_f: String,
    #[serde(rename = "Humidity (%% air-water mix compared to dew point)")]
    humidity: String,
    #[serde(rename = "Current (mA)")]
    current_ma: String,
    #[serde(rename = "Voltage (V)")]
    voltage_v: String,
    #[serde(rename = "Power (mW)")]
    power_mw: String,
}

impl ReadingRow {
    pub fn new(
        at: DateTime<Utc>,
        temperature_f: f64,
        humidity: f64,
        current_ma: f64,
        voltage_v: f64,
        power_mw: f64,
    ) -> Self {
        ReadingRow {
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
            temperature_f: format_reading(temperature_f),
            humidity: format_reading(humidity),
            current_ma: format_reading(current_ma),
            voltage_v: format_reading(voltage_v),
            power_mw: format_reading(power_mw),
        }
    }

    /// The six fields in column order.
    pub fn as_record(&self) -> [&str; 6] {
        [
            &self.timestamp,
            &self.temperature_f,
            &self.humidity,
            &self.current_ma,
            &self.voltage_v,
            &self.power_mw,
        ]
    }
}

/// Ordered accumulator for rows between flushes. Owned by the collection
/// loop and handed around by mutable reference.
#[derive(Debug, Default)]
pub struct RowBuffer {
    rows: Vec<ReadingRow>,
}

impl RowBuffer {
    pub fn new() -> Self {
        RowBuffer::default()
    }

    pub fn push(&mut self, row: ReadingRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[ReadingRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

/// Round to two decimals and render the shortest decimal form, keeping at
/// least one fractional digit: 72.456 -> "72.46", 5.001 -> "5.0".
pub fn format_reading(value: f64) -> String {
    let mut s = format!("{:.2}", value);
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.push('0');
    }
    s
}
