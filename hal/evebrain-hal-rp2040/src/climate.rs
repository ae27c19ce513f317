//! DHT11 temperature / humidity sensor
//!
//! Single-wire protocol, bit-banged on a `Flex` pin. The host pulls the
//! line low for 18 ms, the sensor answers with an 80 µs low / 80 µs high
//! preamble and then 40 bits, each a 50 µs low followed by a high whose
//! length encodes the bit (~27 µs = 0, ~70 µs = 1).
//!
//! One transaction yields both values; it runs on the first read after
//! [`ClimateSensor::begin`] and the result is reused by the second.

use embassy_rp::gpio::{Flex, Pull};
use embassy_time::{block_for, Duration, Instant};

use evebrain_hal::ClimateSensor;

const START_LOW: Duration = Duration::from_millis(18);
const EDGE_TIMEOUT_US: u64 = 100;
const ONE_THRESHOLD_US: u64 = 40;

/// Decode a 5-byte frame into (temperature °C, humidity %)
pub fn decode_frame(frame: [u8; 5]) -> Option<(f32, f32)> {
    let sum = frame[..4].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    if sum != frame[4] {
        return None;
    }
    let humidity = frame[0] as f32 + frame[1] as f32 / 10.0;
    let magnitude = frame[2] as f32 + (frame[3] & 0x0F) as f32 / 10.0;
    let temperature = if frame[3] & 0x80 != 0 {
        -magnitude
    } else {
        magnitude
    };
    Some((temperature, humidity))
}

pub struct Dht11<'d> {
    pin: Flex<'d>,
    reading: Option<(f32, f32)>,
    sampled: bool,
}

impl<'d> Dht11<'d> {
    pub fn new(mut pin: Flex<'d>) -> Self {
        pin.set_pull(Pull::Up);
        pin.set_as_input();
        Self {
            pin,
            reading: None,
            sampled: false,
        }
    }

    /// Wait while the line sits at `high`; returns how long it stayed
    fn hold_time(&self, high: bool) -> Option<u64> {
        let start = Instant::now();
        while self.pin.is_high() == high {
            if start.elapsed().as_micros() > EDGE_TIMEOUT_US {
                return None;
            }
        }
        Some(start.elapsed().as_micros())
    }

    fn transact(&mut self) -> Option<[u8; 5]> {
        self.pin.set_low();
        self.pin.set_as_output();
        block_for(START_LOW);
        self.pin.set_as_input();

        // Line released high, then the sensor's preamble
        self.hold_time(true)?;
        self.hold_time(false)?;
        self.hold_time(true)?;

        let mut frame = [0u8; 5];
        for bit in 0..40 {
            self.hold_time(false)?;
            let high_us = self.hold_time(true)?;
            if high_us > ONE_THRESHOLD_US {
                frame[bit / 8] |= 0x80 >> (bit % 8);
            }
        }
        Some(frame)
    }

    fn sample(&mut self) -> Option<(f32, f32)> {
        if !self.sampled {
            self.sampled = true;
            self.reading = self.transact().and_then(decode_frame);
            if self.reading.is_none() {
                #[cfg(feature = "defmt")]
                defmt::warn!("DHT11 read failed");
            }
        }
        self.reading
    }
}

impl ClimateSensor for Dht11<'_> {
    fn begin(&mut self) {
        self.sampled = false;
        self.reading = None;
    }

    fn temperature(&mut self) -> f32 {
        self.sample().map(|(t, _)| t).unwrap_or(f32::NAN)
    }

    fn humidity(&mut self) -> f32 {
        self.sample().map(|(_, h)| h).unwrap_or(f32::NAN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid_frame() {
        // 40.2 %, 21.6 °C
        let frame = [40, 2, 21, 6, 69];
        let (t, h) = decode_frame(frame).unwrap();
        assert!((t - 21.6).abs() < 1e-4);
        assert!((h - 40.2).abs() < 1e-4);
    }

    #[test]
    fn test_decode_negative_temperature() {
        let frame = [55, 0, 3, 0x85, 55 + 3 + 0x85];
        let (t, _) = decode_frame(frame).unwrap();
        assert!((t + 3.5).abs() < 1e-4);
    }

    #[test]
    fn test_decode_bad_checksum() {
        assert_eq!(decode_frame([40, 2, 21, 6, 70]), None);
    }
}
