//! PWM outputs: buzzer, hardware servo and duty-cycle pins
//!
//! Each output owns one channel of a PWM slice. Timing math is kept in
//! plain functions so it can be checked off target.

use embassy_rp::pwm::{Config, Pwm};
use fixed::types::U12F4;

use evebrain_hal::{Buzzer, PwmServo};

/// System clock feeding the PWM slices
pub const SYS_CLOCK_HZ: u32 = 125_000_000;

/// Servo frame period
pub const SERVO_FRAME_US: u32 = 20_000;

/// Clock divider for 50 Hz servo frames (1.953125 MHz tick)
const SERVO_DIVIDER: u8 = 64;

/// Clock divider for duty-cycle pins (~1.9 kHz at 8-bit resolution)
const DUTY_DIVIDER: u8 = 255;

/// Channel of a slice an output is wired to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PwmChannel {
    A,
    B,
}

/// Divider and wrap value producing `frequency_hz`
///
/// Picks the smallest integer divider that keeps the wrap value within 16
/// bits, for the best duty resolution. `None` for 0 Hz or frequencies out
/// of reach of the slice.
pub fn tone_timing(clock_hz: u32, frequency_hz: u16) -> Option<(u8, u16)> {
    if frequency_hz == 0 {
        return None;
    }
    let cycles = clock_hz / frequency_hz as u32;
    let divider = cycles.div_ceil(1 << 16).max(1);
    if divider > u8::MAX as u32 || cycles < 2 {
        return None;
    }
    let top = cycles / divider - 1;
    Some((divider as u8, top as u16))
}

/// Compare value for a servo pulse of `pulse_us`
pub fn servo_compare(pulse_us: u32) -> u16 {
    let ticks_per_ms = SYS_CLOCK_HZ / SERVO_DIVIDER as u32 / 1000;
    (pulse_us * ticks_per_ms / 1000).min(u16::MAX as u32) as u16
}

/// Pulse width for `angle` between the attach limits
pub fn angle_to_pulse_us(angle: u16, min_us: u16, max_us: u16) -> u32 {
    let angle = angle.min(180) as u32;
    min_us as u32 + angle * max_us.saturating_sub(min_us) as u32 / 180
}

/// One PWM channel and its current configuration
pub struct PwmOutput<'d> {
    pwm: Pwm<'d>,
    channel: PwmChannel,
    config: Config,
}

impl<'d> PwmOutput<'d> {
    /// Take over a slice created with `Pwm::new_output_a` / `new_output_b`
    ///
    /// The output starts disabled.
    pub fn new(pwm: Pwm<'d>, channel: PwmChannel) -> Self {
        let mut config = Config::default();
        config.enable = false;
        let mut output = Self {
            pwm,
            channel,
            config,
        };
        output.apply();
        output
    }

    fn apply(&mut self) {
        self.pwm.set_config(&self.config);
    }

    fn set_compare(&mut self, compare: u16) {
        match self.channel {
            PwmChannel::A => self.config.compare_a = compare,
            PwmChannel::B => self.config.compare_b = compare,
        }
    }

    fn start(&mut self, divider: u8, top: u16, compare: u16) {
        self.config.divider = U12F4::from_num(divider);
        self.config.top = top;
        self.set_compare(compare);
        self.config.enable = true;
        self.apply();
    }

    fn stop(&mut self) {
        self.set_compare(0);
        self.config.enable = false;
        self.apply();
    }

    /// Set an 8-bit duty cycle
    pub fn set_duty(&mut self, duty: u8) {
        if duty == 0 {
            self.stop();
        } else {
            self.start(DUTY_DIVIDER, u8::MAX as u16 - 1, duty as u16);
        }
    }

    /// Current compare value, 0 when stopped
    pub fn duty(&self) -> u16 {
        if !self.config.enable {
            return 0;
        }
        match self.channel {
            PwmChannel::A => self.config.compare_a,
            PwmChannel::B => self.config.compare_b,
        }
    }
}

/// Piezo buzzer on a PWM channel
pub struct PwmBuzzer<'d> {
    output: PwmOutput<'d>,
}

impl<'d> PwmBuzzer<'d> {
    pub fn new(output: PwmOutput<'d>) -> Self {
        Self { output }
    }
}

impl Buzzer for PwmBuzzer<'_> {
    fn tone(&mut self, frequency_hz: u16) {
        match tone_timing(SYS_CLOCK_HZ, frequency_hz) {
            Some((divider, top)) => self.output.start(divider, top, top / 2),
            None => self.output.stop(),
        }
    }

    fn no_tone(&mut self) {
        self.output.stop();
    }
}

/// Hardware-timed servo output
pub struct PwmServoOutput<'d> {
    output: PwmOutput<'d>,
    min_us: u16,
    max_us: u16,
    attached: bool,
}

impl<'d> PwmServoOutput<'d> {
    pub fn new(output: PwmOutput<'d>) -> Self {
        Self {
            output,
            min_us: 500,
            max_us: 2500,
            attached: false,
        }
    }
}

impl PwmServo for PwmServoOutput<'_> {
    fn attach(&mut self, min_us: u16, max_us: u16) {
        self.min_us = min_us;
        self.max_us = max_us;
        self.attached = true;
    }

    fn write_angle(&mut self, angle: u16) {
        if !self.attached {
            return;
        }
        let top = servo_compare(SERVO_FRAME_US) - 1;
        let pulse = angle_to_pulse_us(angle, self.min_us, self.max_us);
        self.output.start(SERVO_DIVIDER, top, servo_compare(pulse));
    }

    fn detach(&mut self) {
        self.attached = false;
        self.output.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_timing_a4() {
        let (divider, top) = tone_timing(SYS_CLOCK_HZ, 440).unwrap();
        assert_eq!(divider, 5);
        assert_eq!(top, 56_817);
    }

    #[test]
    fn test_tone_timing_high_note_needs_no_divider() {
        // D#8
        let (divider, top) = tone_timing(SYS_CLOCK_HZ, 4978).unwrap();
        assert_eq!(divider, 1);
        assert_eq!(top, 25_109);
    }

    #[test]
    fn test_tone_timing_rejects_zero() {
        assert_eq!(tone_timing(SYS_CLOCK_HZ, 0), None);
    }

    #[test]
    fn test_servo_frame() {
        assert_eq!(servo_compare(SERVO_FRAME_US), 39_060);
        assert_eq!(servo_compare(1000), 1953);
    }

    #[test]
    fn test_angle_to_pulse() {
        assert_eq!(angle_to_pulse_us(0, 500, 2200), 500);
        assert_eq!(angle_to_pulse_us(90, 500, 2200), 1350);
        assert_eq!(angle_to_pulse_us(180, 500, 2200), 2200);
        assert_eq!(angle_to_pulse_us(400, 500, 2200), 2200);
    }
}
