//! DHT22 temperature/humidity driver.
//!
//! The part speaks a single-wire protocol on one GPIO pin: the host holds
//! the line low for at least 1 ms, releases it, the sensor answers with an
//! 80 us low / 80 us high handshake and then clocks out 40 bits. Every bit
//! is a ~50 us low preamble followed by a high pulse whose length encodes
//! the value (~26 us for 0, ~70 us for 1). The payload is humidity hi/lo,
//! temperature hi/lo and a checksum byte.

use std::time::{Duration, Instant};

use rppal::gpio::{Gpio, IoPin, Level, Mode};
use tracing::{info, warn};

use crate::sensor::{Result, SensorError, TemperatureSensor};

// Host start signal; the datasheet asks for at least 1 ms.
const START_SIGNAL_LOW: Duration = Duration::from_millis(3);

// High pulses longer than this are ones.
const BIT_THRESHOLD_US: u64 = 50;

// The sensor refuses to be sampled more often than every 2 s, so reads
// inside this window are served from the last good frame.
const MIN_SAMPLE_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug)]
struct Sample {
    temperature_c: f64,
    humidity: f64,
}

pub struct Dht22 {
    pin: IoPin,
    last_sample: Option<(Instant, Sample)>,
}

impl Dht22 {
    /// Claim the given BCM GPIO pin. The line idles as an input; the sensor
    /// board's pull-up keeps it high between transactions.
    pub fn new(bcm_pin: u8) -> Result<Self> {
        info!("Initializing DHT22 on GPIO {}", bcm_pin);
        let gpio = Gpio::new().map_err(|e| SensorError::Hardware(e.to_string()))?;
        let pin = gpio
            .get(bcm_pin)
            .map_err(|e| SensorError::Hardware(e.to_string()))?
            .into_io(Mode::Input);
        Ok(Dht22 {
            pin,
            last_sample: None,
        })
    }

    /// Busy-wait until the line reads `level`, returning the time spent
    /// waiting in microseconds.
    fn wait_for(&self, level: Level, timeout_us: u64) -> Result<u64> {
        let timeout = Duration::from_micros(timeout_us);
        let start = Instant::now();
        while self.pin.read() != level {
            if start.elapsed() > timeout {
                return Err(SensorError::Timeout);
            }
        }
        Ok(start.elapsed().as_micros() as u64)
    }

    /// Run one full bus transaction and decode the frame.
    fn read_frame(&mut self) -> Result<Sample> {
        // Start signal, then hand the line back to the sensor.
        self.pin.set_mode(Mode::Output);
        self.pin.set_low();
        std::thread::sleep(START_SIGNAL_LOW);
        self.pin.set_mode(Mode::Input);

        // Sensor handshake: ~80 us low, ~80 us high, then the first bit's
        // low preamble begins.
        self.wait_for(Level::Low, 250)?;
        self.wait_for(Level::High, 250)?;
        self.wait_for(Level::Low, 250)?;

        let mut frame = [0u8; 5];
        for bit in 0..40 {
            self.wait_for(Level::High, 200)?;
            let high_us = self.wait_for(Level::Low, 200)?;
            if high_us > BIT_THRESHOLD_US {
                frame[bit / 8] |= 1 << (7 - bit % 8);
            }
        }

        decode(frame)
    }

    fn sample(&mut self) -> Result<Sample> {
        if let Some((at, sample)) = self.last_sample {
            if at.elapsed() < MIN_SAMPLE_INTERVAL {
                return Ok(sample);
            }
        }
        let sample = self.read_frame()?;
        info!(
            "DHT22 frame: {:.1} C, {:.1} %RH",
            sample.temperature_c, sample.humidity
        );
        self.last_sample = Some((Instant::now(), sample));
        Ok(sample)
    }
}

impl TemperatureSensor for Dht22 {
    fn get_temp(&mut self) -> Result<f64> {
        Ok(c_to_f(self.sample()?.temperature_c))
    }

    fn get_humidity(&mut self) -> Result<f64> {
        Ok(self.sample()?.humidity)
    }
}

/// Decode a 5-byte DHT22 frame. Tenths of a unit, big-endian, the top bit
/// of the temperature word is a sign flag.
fn decode(frame: [u8; 5]) -> Result<Sample> {
    let sum = frame[..4].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    if sum != frame[4] {
        warn!(
            "DHT22 checksum mismatch: computed {:#04x}, frame carried {:#04x}",
            sum, frame[4]
        );
        return Err(SensorError::Checksum);
    }

    let humidity = u16::from_be_bytes([frame[0], frame[1]]) as f64 / 10.0;
    let raw_temp = u16::from_be_bytes([frame[2], frame[3]]);
    let magnitude = (raw_temp & 0x7FFF) as f64 / 10.0;
    let temperature_c = if raw_temp & 0x8000 != 0 {
        -magnitude
    } else {
        magnitude
    };

    if !(0.0..=100.0).contains(&humidity) {
        return Err(SensorError::OutOfRange(format!("humidity {humidity} %RH")));
    }
    if !(-40.0..=80.0).contains(&temperature_c) {
        return Err(SensorError::OutOfRange(format!(
            "temperature {temperature_c} C"
        )));
    }

    Ok(Sample {
        temperature_c,
        humidity,
    })
}

fn c_to_f(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}
