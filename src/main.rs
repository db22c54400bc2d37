mod collection;
mod devices;
mod sensor;
mod station;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use linux_embedded_hal::I2cdev;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::fmt;

use collection::sink::CsvSink;
use devices::{Dht22, Ina260, ina260};

// Node wiring: the DHT22 data line on BCM GPIO 4, the INA260 on the
// primary I2C bus at its factory-default address.
const DHT22_GPIO_PIN: u8 = 4;
const I2C_BUS: &str = "/dev/i2c-1";
const STATION_ID_FILE: &str = "pi.id";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _guard = setup_logging();
    info!("Starting WSN data logger");

    // The output path is derived once, before any hardware is touched.
    let station_id = station::read_station_id(Path::new(STATION_ID_FILE))?;
    let output_path = station::output_path(&station_id)?;
    let sink = CsvSink::new(output_path);
    sink.initialize()?;

    // Bring up both sensors.
    let mut temp_sensor = Dht22::new(DHT22_GPIO_PIN)?;
    let i2c = I2cdev::new(I2C_BUS)?;
    let mut power_sensor = Ina260::new(i2c, ina260::DEFAULT_ADDRESS);
    match power_sensor.manufacturer_id() {
        Ok(id) if id == ina260::MANUFACTURER_TI => {
            info!("INA260 identified, manufacturer id {:#06x}", id)
        }
        Ok(id) => warn!("Unexpected INA260 manufacturer id {:#06x}", id),
        Err(e) => warn!("Could not probe INA260 manufacturer id: {}", e),
    }

    // Ctrl-c raises a flag the loop checks between ticks.
    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_flag = shutdown.clone();
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })?;

    println!(
        "Now gathering data from sensors [timestamp (UTC), temp (F), humidity (%), current (mA), voltage (V), power (mW)]:"
    );
    match collection::run(&mut temp_sensor, &mut power_sensor, &sink, shutdown) {
        Ok(path) => {
            info!("Data collection finished, rows saved to {}", path.display());
            println!("Data saved to: {}", path.display());
        }
        Err(e) => {
            error!("Data collection failed: {}", e);
            eprintln!("Data collection failed: {e}");
            return Err(e.into());
        }
    }

    println!("\n\n********************************************************************");
    println!("*                                                                  *");
    println!("*                        Program complete!!                        *");
    println!("*                                                                  *");
    println!("********************************************************************");
    Ok(())
}

fn setup_logging() -> WorkerGuard {
    let file_appender = rolling::daily("logs", "wsn-datalogger.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    fmt()
        .with_writer(non_blocking)
        .with_ansi(false) // plain text in log files
        .with_level(true)
        .init();

    guard
}
