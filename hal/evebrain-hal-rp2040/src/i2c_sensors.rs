//! Sensors on the shared I2C bus
//!
//! - HMC5883L magnetometer at 0x1E, single-shot mode. Its data registers
//!   come out in X, Z, Y order.
//! - PCF8591 four-channel 8-bit ADC at 0x48, read with auto-increment.
//!
//! Bus errors are logged and reported as zero readings.

use embedded_hal::i2c::I2c;

use evebrain_hal::{AnalogExpander, CompassReading, CompassSensor};

pub const HMC5883L_ADDRESS: u8 = 0x1E;
pub const PCF8591_ADDRESS: u8 = 0x48;

/// Config A: 8-sample average, 15 Hz; config B: gain 5; mode: single shot
const HMC5883L_SETUP: [u8; 4] = [0x00, 0x70, 0xA0, 0x01];
const HMC5883L_DATA_REGISTER: u8 = 0x03;

/// Channel 0 with auto-increment
const PCF8591_CONTROL: u8 = 0x04;

/// Convert HMC5883L data registers to axes
pub fn decode_compass(raw: [u8; 6]) -> CompassReading {
    CompassReading {
        x: i16::from_be_bytes([raw[0], raw[1]]),
        z: i16::from_be_bytes([raw[2], raw[3]]),
        y: i16::from_be_bytes([raw[4], raw[5]]),
    }
}

pub struct SensorBus<I> {
    i2c: I,
}

impl<I: I2c> SensorBus<I> {
    pub fn new(i2c: I) -> Self {
        Self { i2c }
    }

    fn read_compass(&mut self) -> Result<CompassReading, I::Error> {
        self.i2c.write(HMC5883L_ADDRESS, &HMC5883L_SETUP)?;
        let mut raw = [0u8; 6];
        self.i2c
            .write_read(HMC5883L_ADDRESS, &[HMC5883L_DATA_REGISTER], &mut raw)?;
        Ok(decode_compass(raw))
    }

    fn read_adc(&mut self) -> Result<[u8; 4], I::Error> {
        self.i2c.write(PCF8591_ADDRESS, &[PCF8591_CONTROL])?;
        // The first two bytes are the previous conversion
        let mut raw = [0u8; 6];
        self.i2c.read(PCF8591_ADDRESS, &mut raw)?;
        Ok([raw[2], raw[3], raw[4], raw[5]])
    }
}

impl<I: I2c> CompassSensor for SensorBus<I> {
    fn read(&mut self) -> CompassReading {
        self.read_compass().unwrap_or_else(|_| {
            #[cfg(feature = "defmt")]
            defmt::warn!("HMC5883L read failed");
            CompassReading::default()
        })
    }
}

impl<I: I2c> AnalogExpander for SensorBus<I> {
    fn read_channels(&mut self) -> [u8; 4] {
        self.read_adc().unwrap_or_else(|_| {
            #[cfg(feature = "defmt")]
            defmt::warn!("PCF8591 read failed");
            [0; 4]
        })
    }
}
