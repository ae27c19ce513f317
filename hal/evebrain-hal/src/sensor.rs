//! Sensor abstractions
//!
//! The core only cares about timing and results. Bus transactions for the
//! specific chips live behind these traits.

/// Combined temperature / humidity sensor
///
/// The sensor needs a settling window after [`begin`] before readings are
/// valid; the core waits for it before calling the read methods.
///
/// [`begin`]: ClimateSensor::begin
pub trait ClimateSensor {
    /// Power up / reinitialise the sensor
    fn begin(&mut self);

    /// Temperature in °C, NaN when the read failed
    fn temperature(&mut self) -> f32;

    /// Relative humidity in %, NaN when the read failed
    fn humidity(&mut self) -> f32;
}

/// Ultrasonic ranging sensor
pub trait RangeSensor {
    /// Fire a trigger pulse and return the echo high time in microseconds
    ///
    /// Returns 0 when no echo arrives within `timeout_us`.
    fn echo_duration_us(&mut self, timeout_us: u32) -> u32;
}

/// Raw magnetometer axes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CompassReading {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

/// Three-axis magnetometer
pub trait CompassSensor {
    /// Take a single-shot measurement
    fn read(&mut self) -> CompassReading;
}

/// Four-channel 8-bit ADC expander
pub trait AnalogExpander {
    /// Convert and return all four channels
    fn read_channels(&mut self) -> [u8; 4];
}
