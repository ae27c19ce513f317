//! The complete RP2040 robot board
//!
//! Bundles every driver in this crate into one value so the core's
//! `Board` bound is met by a single type. The RP2040 carrier has no radio:
//! the network side reports `OFF`, answers scans with an empty list and
//! drops server traffic.

use embassy_rp::adc::{self, Adc, Blocking};
use embassy_rp::gpio::Output;
use embassy_rp::i2c::{self, I2c};
use embassy_rp::peripherals::I2C0;
use embassy_time::Instant;
use heapless::{String, Vec};

use evebrain_hal::{
    AnalogExpander, Buzzer, ClimateSensor, Clock, CoilDriver, CompassReading, CompassSensor,
    GpioBank, InterruptError, NetworkConfig, NetworkLink, PinInterrupts, PinMode, PinServoBank,
    PwmServo, RangeSensor, ScanEntry, SerialRx, ServerLink, ServoLine, WifiMode,
};

use crate::climate::Dht11;
use crate::coils::ShiftRegisterCoils;
use crate::i2c_sensors::SensorBus;
use crate::pins::UserPins;
use crate::pwm::{PwmBuzzer, PwmServoOutput};
use crate::range::Ultrasonic;
use crate::serial::PipeRx;
use crate::watch::WatchedPins;

/// Blocking I2C bus carrying the compass and ADC expander
pub type SensorI2c = I2c<'static, I2C0, i2c::Blocking>;

/// Initialised drivers handed over by the firmware
pub struct BoardParts {
    pub pins: UserPins,
    pub watched: &'static WatchedPins,
    pub adc: Adc<'static, Blocking>,
    pub analog: adc::Channel<'static>,
    pub coils: ShiftRegisterCoils<'static>,
    pub buzzer: PwmBuzzer<'static>,
    pub servo_line: Output<'static>,
    pub pwm_servo: PwmServoOutput<'static>,
    pub climate: Dht11<'static>,
    pub range: Ultrasonic<'static>,
    pub sensors: SensorBus<SensorI2c>,
    pub serial: PipeRx,
    /// Access point name used for factory settings
    pub ap_name: String<32>,
    /// Free heap reporter from the firmware's allocator
    pub free_heap: fn() -> u32,
}

pub struct Rp2040Board {
    parts: BoardParts,
    scan_pending: bool,
}

impl Rp2040Board {
    pub fn new(parts: BoardParts) -> Self {
        Self {
            parts,
            scan_pending: false,
        }
    }
}

impl Clock for Rp2040Board {
    fn now_ms(&self) -> u64 {
        Instant::now().as_millis()
    }

    fn now_us(&self) -> u64 {
        Instant::now().as_micros()
    }
}

impl GpioBank for Rp2040Board {
    fn set_mode(&mut self, pin: u8, mode: PinMode) {
        // Watched pins stay inputs owned by their edge task
        if !self.parts.watched.is_watched(pin) {
            self.parts.pins.set_mode(pin, mode);
        }
    }

    fn digital_write(&mut self, pin: u8, high: bool) {
        self.parts.pins.write(pin, high);
    }

    fn digital_read(&mut self, pin: u8) -> bool {
        if self.parts.watched.is_watched(pin) {
            self.parts.watched.level(pin)
        } else {
            self.parts.pins.read(pin)
        }
    }

    fn pwm_write(&mut self, pin: u8, duty: u8) {
        self.parts.pins.pwm_write(pin, duty);
    }

    fn analog_read(&mut self) -> u16 {
        // 12-bit conversion scaled to the 10-bit range clients expect
        match self.parts.adc.blocking_read(&mut self.parts.analog) {
            Ok(raw) => raw >> 2,
            Err(_) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("ADC read failed");
                0
            }
        }
    }
}

impl PinInterrupts for Rp2040Board {
    fn attach_interrupt(&mut self, pin: u8) -> Result<(), InterruptError> {
        self.parts.watched.enable(pin)
    }

    fn detach_interrupt(&mut self, pin: u8) -> Result<(), InterruptError> {
        self.parts.watched.disable(pin)
    }
}

impl CoilDriver for Rp2040Board {
    fn energize(&mut self, left: u8, right: u8) {
        self.parts.coils.energize(left, right);
    }
}

impl Buzzer for Rp2040Board {
    fn tone(&mut self, frequency_hz: u16) {
        self.parts.buzzer.tone(frequency_hz);
    }

    fn no_tone(&mut self) {
        self.parts.buzzer.no_tone();
    }
}

impl ServoLine for Rp2040Board {
    fn set_level(&mut self, high: bool) {
        if high {
            self.parts.servo_line.set_high();
        } else {
            self.parts.servo_line.set_low();
        }
    }
}

impl PwmServo for Rp2040Board {
    fn attach(&mut self, min_us: u16, max_us: u16) {
        self.parts.pwm_servo.attach(min_us, max_us);
    }

    fn write_angle(&mut self, angle: u16) {
        self.parts.pwm_servo.write_angle(angle);
    }

    fn detach(&mut self) {
        self.parts.pwm_servo.detach();
    }
}

impl PinServoBank for Rp2040Board {
    fn start_pin_servo(&mut self, pin: u8, angle: u16) -> bool {
        if self.parts.watched.is_watched(pin) {
            return false;
        }
        self.parts.pins.start_servo(pin, angle)
    }

    fn poll_pin_servos(&mut self) {
        self.parts.pins.poll_servos(Instant::now().as_micros());
    }
}

impl ClimateSensor for Rp2040Board {
    fn begin(&mut self) {
        self.parts.climate.begin();
    }

    fn temperature(&mut self) -> f32 {
        self.parts.climate.temperature()
    }

    fn humidity(&mut self) -> f32 {
        self.parts.climate.humidity()
    }
}

impl RangeSensor for Rp2040Board {
    fn echo_duration_us(&mut self, timeout_us: u32) -> u32 {
        self.parts.range.echo_duration_us(timeout_us)
    }
}

impl CompassSensor for Rp2040Board {
    fn read(&mut self) -> CompassReading {
        CompassSensor::read(&mut self.parts.sensors)
    }
}

impl AnalogExpander for Rp2040Board {
    fn read_channels(&mut self) -> [u8; 4] {
        self.parts.sensors.read_channels()
    }
}

impl NetworkLink for Rp2040Board {
    fn apply(&mut self, config: &NetworkConfig<'_>) {
        #[cfg(feature = "defmt")]
        defmt::debug!("No radio, ignoring network config for AP {}", config.ap_ssid);
        let _ = config;
    }

    fn default_ap_name(&self) -> String<32> {
        self.parts.ap_name.clone()
    }

    fn mode(&self) -> WifiMode {
        WifiMode::Off
    }

    fn station_rssi(&self) -> i8 {
        0
    }

    fn station_ip(&self) -> [u8; 4] {
        [0; 4]
    }

    fn start_scan(&mut self) {
        self.scan_pending = true;
    }

    fn take_scan_results(&mut self) -> Option<Vec<ScanEntry, 16>> {
        core::mem::take(&mut self.scan_pending).then(Vec::new)
    }

    fn take_network_changed(&mut self) -> bool {
        false
    }

    fn free_heap(&self) -> u32 {
        (self.parts.free_heap)()
    }
}

impl ServerLink for Rp2040Board {
    fn post(&mut self, url: &str, _body: &str) {
        #[cfg(feature = "defmt")]
        defmt::debug!("No radio, dropping post to {}", url);
        let _ = url;
    }

    fn fetch_command(&mut self, _url: &str) -> Option<String<256>> {
        None
    }
}

impl SerialRx for Rp2040Board {
    fn read_byte(&mut self) -> Option<u8> {
        self.parts.serial.read_byte()
    }
}
