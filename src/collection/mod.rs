//! The collection loop: one reading per second, buffered in memory, with a
//! guaranteed single flush to CSV on the way out.

pub mod row;
pub mod sink;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info};

use crate::sensor::{PowerSensor, SensorError, TemperatureSensor};
use row::{ReadingRow, RowBuffer};
use sink::CsvSink;

/// Fixed pacing between ticks.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LoopState {
    Running,
    Stopping,
    Done,
}

/// Why the loop left `Running`. Interrupts are the expected path; a failed
/// tick is reported but reaches the same flush.
#[derive(Debug)]
enum StopCause {
    Interrupt,
    TickFailed(SensorError),
}

/// Query both capabilities, stamp the current UTC time, print the row and
/// append it to the buffer. Any sensor error propagates before a row is
/// constructed, so a partial row can never be buffered.
pub fn build_row<T, P>(
    temp_sensor: &mut T,
    power_sensor: &mut P,
    buffer: &mut RowBuffer,
) -> Result<(), SensorError>
where
    T: TemperatureSensor,
    P: PowerSensor,
{
    let temperature_f = temp_sensor.get_temp()?;
    let humidity = temp_sensor.get_humidity()?;
    let (current_ma, voltage_v, power_mw) = power_sensor.get_cvp()?;

    let row = ReadingRow::new(
        Utc::now(),
        temperature_f,
        humidity,
        current_ma,
        voltage_v,
        power_mw,
    );
    println!("\t{:?}", row.as_record());
    buffer.push(row);
    Ok(())
}

/// Collect rows until the shutdown flag is raised or a tick fails, then
/// flush the buffer exactly once. Returns the output path; the only error
/// path is a failed flush.
pub fn run<T, P>(
    temp_sensor: &mut T,
    power_sensor: &mut P,
    sink: &CsvSink,
    shutdown: Arc<AtomicBool>,
) -> Result<PathBuf, String>
where
    T: TemperatureSensor,
    P: PowerSensor,
{
    run_with_interval(temp_sensor, power_sensor, sink, shutdown, POLL_INTERVAL)
}

fn run_with_interval<T, P>(
    temp_sensor: &mut T,
    power_sensor: &mut P,
    sink: &CsvSink,
    shutdown: Arc<AtomicBool>,
    interval: Duration,
) -> Result<PathBuf, String>
where
    T: TemperatureSensor,
    P: PowerSensor,
{
    let mut buffer = RowBuffer::new();
    let mut state = LoopState::Running;
    let mut cause = StopCause::Interrupt;

    while state != LoopState::Done {
        match state {
            LoopState::Running => {
                if shutdown.load(Ordering::SeqCst) {
                    cause = StopCause::Interrupt;
                    state = LoopState::Stopping;
                    continue;
                }
                match build_row(temp_sensor, power_sensor, &mut buffer) {
                    Ok(()) => std::thread::sleep(interval),
                    Err(e) => {
                        cause = StopCause::TickFailed(e);
                        state = LoopState::Stopping;
                    }
                }
            }
            LoopState::Stopping => {
                match &cause {
                    StopCause::Interrupt => {
                        info!("Stop requested, {} rows buffered", buffer.len());
                        println!("Stopping data collection...");
                    }
                    StopCause::TickFailed(e) => {
                        error!("Tick failed: {}", e);
                        println!("Error during data collection!!!  -->  {e}");
                    }
                }
                println!("Now writing data to .csv file:");
                sink.flush(&mut buffer)
                    .map_err(|e| format!("Failed to write CSV: {e}"))?;
                state = LoopState::Done;
            }
            LoopState::Done => {}
        }
    }

    Ok(sink.path().to_path_buf())
}
