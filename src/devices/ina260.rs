//! INA260 current/voltage/power monitor driver.
//!
//! Register-level driver over any blocking embedded-hal I2C bus; on the Pi
//! this is `linux_embedded_hal::I2cdev` opened on `/dev/i2c-1`. The part
//! measures through an internal shunt, so current, bus voltage and power
//! are all plain 16-bit register reads.

use std::fmt::Debug;

use embedded_hal::blocking::i2c::WriteRead;
use tracing::info;

use crate::sensor::{PowerSensor, Result, SensorError};

/// Factory-default slave address (A0/A1 to GND).
pub const DEFAULT_ADDRESS: u8 = 0x40;

/// Manufacturer id register value, "TI" in ASCII.
pub const MANUFACTURER_TI: u16 = 0x5449;

const REG_CURRENT: u8 = 0x01;
const REG_BUS_VOLTAGE: u8 = 0x02;
const REG_POWER: u8 = 0x03;
const REG_MANUFACTURER_ID: u8 = 0xFE;

// Datasheet LSB weights.
const CURRENT_LSB_MA: f64 = 1.25;
const VOLTAGE_LSB_V: f64 = 0.00125;
const POWER_LSB_MW: f64 = 10.0;

pub struct Ina260<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C, E> Ina260<I2C>
where
    I2C: WriteRead<Error = E>,
    E: Debug,
{
    pub fn new(i2c: I2C, address: u8) -> Self {
        info!("Initializing INA260 at I2C address {:#04x}", address);
        Ina260 { i2c, address }
    }

    fn read_register(&mut self, register: u8) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.address, &[register], &mut buf)
            .map_err(|e| SensorError::Hardware(format!("{e:?}")))?;
        Ok(u16::from_be_bytes(buf))
    }

    /// Contents of the manufacturer id register; 0x5449 on a genuine part.
    pub fn manufacturer_id(&mut self) -> Result<u16> {
        self.read_register(REG_MANUFACTURER_ID)
    }

    /// Shunt current in milliamps. Signed: negative when current flows
    /// into the bus terminal.
    pub fn current_ma(&mut self) -> Result<f64> {
        let raw = self.read_register(REG_CURRENT)? as i16;
        Ok(raw as f64 * CURRENT_LSB_MA)
    }

    /// Bus voltage in volts.
    pub fn voltage_v(&mut self) -> Result<f64> {
        let raw = self.read_register(REG_BUS_VOLTAGE)?;
        Ok(raw as f64 * VOLTAGE_LSB_V)
    }

    /// Power in milliwatts.
    pub fn power_mw(&mut self) -> Result<f64> {
        let raw = self.read_register(REG_POWER)?;
        Ok(raw as f64 * POWER_LSB_MW)
    }
}

impl<I2C, E> PowerSensor for Ina260<I2C>
where
    I2C: WriteRead<Error = E>,
    E: Debug,
{
    fn get_cvp(&mut self) -> Result<(f64, f64, f64)> {
        let current = self.current_ma()?;
        let voltage = self.voltage_v()?;
        let power = self.power_mw()?;
        Ok((current, voltage, power))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fixed register file standing in for the bus.
    struct FakeBus {
        regs: Vec<(u8, [u8; 2])>,
    }

    impl WriteRead for FakeBus {
        type Error = ();

        fn write_read(
            &mut self,
            _address: u8,
            bytes: &[u8],
            buffer: &mut [u8],
        ) -> std::result::Result<(), ()> {
            let reg = bytes[0];
            let value = self
                .regs
                .iter()
                .find(|(r, _)| *r == reg)
                .map(|(_, v)| *v)
                .ok_or(())?;
            buffer.copy_from_slice(&value);
            Ok(())
        }
    }

    #[test]
    fn scales_measurement_registers() {
        let bus = FakeBus {
            regs: vec![
                (REG_CURRENT, 100u16.to_be_bytes()),     // 125 mA
                (REG_BUS_VOLTAGE, 4000u16.to_be_bytes()), // 5 V
                (REG_POWER, 60u16.to_be_bytes()),        // 600 mW
            ],
        };
        let mut ina = Ina260::new(bus, DEFAULT_ADDRESS);
        let (current, voltage, power) = ina.get_cvp().unwrap();
        assert_eq!(current, 125.0);
        assert_eq!(voltage, 5.0);
        assert_eq!(power, 600.0);
    }

    #[test]
    fn current_register_is_signed() {
        let bus = FakeBus {
            regs: vec![(REG_CURRENT, (-2i16 as u16).to_be_bytes())],
        };
        let mut ina = Ina260::new(bus, DEFAULT_ADDRESS);
        assert_eq!(ina.current_ma().unwrap(), -2.5);
    }

    #[test]
    fn reads_manufacturer_id() {
        let bus = FakeBus {
            regs: vec![(REG_MANUFACTURER_ID, MANUFACTURER_TI.to_be_bytes())],
        };
        let mut ina = Ina260::new(bus, DEFAULT_ADDRESS);
        assert_eq!(ina.manufacturer_id().unwrap(), MANUFACTURER_TI);
    }

    #[test]
    fn bus_failure_maps_to_hardware_error() {
        let bus = FakeBus { regs: vec![] };
        let mut ina = Ina260::new(bus, DEFAULT_ADDRESS);
        assert!(matches!(
            ina.current_ma().unwrap_err(),
            SensorError::Hardware(_)
        ));
    }
}
