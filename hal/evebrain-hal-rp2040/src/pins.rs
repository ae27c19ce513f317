//! User-facing GPIO by pin number
//!
//! Commands name pins by number at runtime, so the pins exposed to
//! clients are kept as `Flex` pins in a table indexed by GPIO number.
//! PWM-capable pins are registered separately with their slice.
//!
//! Servos on user pins are driven in software: every 20 ms frame the main
//! loop raises each active pin for its pulse width. A servo is held for
//! one second and then released.

use embassy_rp::gpio::{Flex, Pull};
use embassy_time::{block_for, Duration};
use heapless::Vec;

use evebrain_hal::PinMode;

use crate::pwm::{angle_to_pulse_us, PwmOutput, SERVO_FRAME_US};

/// Number of GPIOs on the RP2040
pub const GPIO_COUNT: usize = 30;

/// Frames a software servo is driven for after a move
pub const SERVO_HOLD_FRAMES: u8 = 50;

const MAX_PWM_PINS: usize = 4;
const MAX_PIN_SERVOS: usize = 4;
const PIN_SERVO_MIN_US: u16 = 500;
const PIN_SERVO_MAX_US: u16 = 2500;

/// Build a `(number, Flex)` table from named peripherals
///
/// ```ignore
/// let pins = user_pins!(p; 11 => PIN_11, 17 => PIN_17);
/// ```
#[macro_export]
macro_rules! user_pins {
    ($p:expr; $($num:literal => $name:ident),* $(,)?) => {
        [$(($num, embassy_rp::gpio::Flex::new($p.$name))),*]
    };
}

/// Error when registering a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinError {
    /// Pin number out of range (0-29 valid)
    InvalidPin,
    /// Pin registered twice
    AlreadyTaken,
    /// No room for another PWM pin
    Full,
}

struct SoftServo {
    pin: u8,
    pulse_us: u32,
    frames_left: u8,
}

pub struct UserPins {
    pins: [Option<Flex<'static>>; GPIO_COUNT],
    pwm: Vec<(u8, PwmOutput<'static>), MAX_PWM_PINS>,
    servos: Vec<SoftServo, MAX_PIN_SERVOS>,
    next_frame_us: u64,
}

impl UserPins {
    pub fn new<I>(pins: I) -> Result<Self, PinError>
    where
        I: IntoIterator<Item = (u8, Flex<'static>)>,
    {
        let mut bank = Self {
            pins: [const { None }; GPIO_COUNT],
            pwm: Vec::new(),
            servos: Vec::new(),
            next_frame_us: 0,
        };
        for (num, mut flex) in pins {
            let slot = bank
                .pins
                .get_mut(num as usize)
                .ok_or(PinError::InvalidPin)?;
            if slot.is_some() {
                return Err(PinError::AlreadyTaken);
            }
            flex.set_as_input();
            *slot = Some(flex);
        }
        Ok(bank)
    }

    /// Register a PWM-capable pin
    pub fn add_pwm(&mut self, pin: u8, output: PwmOutput<'static>) -> Result<(), PinError> {
        if pin as usize >= GPIO_COUNT {
            return Err(PinError::InvalidPin);
        }
        if self.is_available(pin) {
            return Err(PinError::AlreadyTaken);
        }
        self.pwm.push((pin, output)).map_err(|_| PinError::Full)
    }

    /// Whether `pin` is exposed to clients
    pub fn is_available(&self, pin: u8) -> bool {
        self.flex(pin).is_some() || self.pwm.iter().any(|(p, _)| *p == pin)
    }

    /// Enable the internal pull-up, for inputs sampled before any command
    pub fn set_pull_up(&mut self, pin: u8) {
        if let Some(flex) = self.flex_mut(pin) {
            flex.set_pull(Pull::Up);
        }
    }

    fn flex(&self, pin: u8) -> Option<&Flex<'static>> {
        self.pins.get(pin as usize).and_then(Option::as_ref)
    }

    fn flex_mut(&mut self, pin: u8) -> Option<&mut Flex<'static>> {
        self.pins.get_mut(pin as usize).and_then(Option::as_mut)
    }

    fn pwm_mut(&mut self, pin: u8) -> Option<&mut PwmOutput<'static>> {
        self.pwm
            .iter_mut()
            .find(|(p, _)| *p == pin)
            .map(|(_, output)| output)
    }

    pub fn set_mode(&mut self, pin: u8, mode: PinMode) {
        if let Some(flex) = self.flex_mut(pin) {
            match mode {
                PinMode::Input => flex.set_as_input(),
                PinMode::Output => flex.set_as_output(),
            }
        }
    }

    pub fn write(&mut self, pin: u8, high: bool) {
        if let Some(output) = self.pwm_mut(pin) {
            output.set_duty(if high { u8::MAX } else { 0 });
        } else if let Some(flex) = self.flex_mut(pin) {
            if high {
                flex.set_high();
            } else {
                flex.set_low();
            }
        }
    }

    pub fn read(&self, pin: u8) -> bool {
        if let Some((_, output)) = self.pwm.iter().find(|(p, _)| *p == pin) {
            return output.duty() > 0;
        }
        self.flex(pin).map(|flex| flex.is_high()).unwrap_or(false)
    }

    /// Duty-cycle write; plain pins fall back to on/off at half scale
    pub fn pwm_write(&mut self, pin: u8, duty: u8) {
        if let Some(output) = self.pwm_mut(pin) {
            output.set_duty(duty);
        } else if let Some(flex) = self.flex_mut(pin) {
            flex.set_as_output();
            if duty >= 128 {
                flex.set_high();
            } else {
                flex.set_low();
            }
        }
    }

    /// Start driving a software servo; false for pins that cannot carry one
    pub fn start_servo(&mut self, pin: u8, angle: u16) -> bool {
        let Some(flex) = self.flex_mut(pin) else {
            return false;
        };
        flex.set_low();
        flex.set_as_output();

        let pulse_us = angle_to_pulse_us(angle, PIN_SERVO_MIN_US, PIN_SERVO_MAX_US);
        if let Some(servo) = self.servos.iter_mut().find(|s| s.pin == pin) {
            servo.pulse_us = pulse_us;
            servo.frames_left = SERVO_HOLD_FRAMES;
            return true;
        }
        self.servos
            .push(SoftServo {
                pin,
                pulse_us,
                frames_left: SERVO_HOLD_FRAMES,
            })
            .is_ok()
    }

    /// Emit one frame of pulses when due
    pub fn poll_servos(&mut self, now_us: u64) {
        if self.servos.is_empty() || now_us < self.next_frame_us {
            return;
        }
        self.next_frame_us = now_us + SERVO_FRAME_US as u64;

        let Self { pins, servos, .. } = self;
        for servo in servos.iter_mut() {
            if let Some(flex) = pins.get_mut(servo.pin as usize).and_then(Option::as_mut) {
                flex.set_high();
                block_for(Duration::from_micros(servo.pulse_us as u64));
                flex.set_low();
            }
            servo.frames_left = servo.frames_left.saturating_sub(1);
        }
        servos.retain(|s| s.frames_left > 0);
    }
}
