//! Primary servo pulse train
//!
//! The primary servo is moved by sending one pulse per degree of travel,
//! each pulse `500 + angle * 2000 / 180` µs wide in a 12 ms frame. Pulses
//! are generated from the main loop in two phases (line high, then low) so
//! nothing ever busy-waits. After the last pulse the line is left high.

use evebrain_hal::ServoLine;

/// Pulse repetition period
pub const SERVO_FRAME_US: u64 = 12_000;

/// Highest accepted angle
pub const SERVO_MAX_ANGLE: u16 = 180;

/// Pulse width for an angle
pub fn pulse_width_us(angle: u16) -> u64 {
    500 + u64::from(angle.min(SERVO_MAX_ANGLE)) * 2000 / u64::from(SERVO_MAX_ANGLE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Low,
    High { until_us: u64 },
}

/// Non-blocking servo pulse generator
#[derive(Debug, Clone)]
pub struct ServoPulseTrain {
    position: u16,
    pulses_remaining: u16,
    next_pulse_us: u64,
    phase: Phase,
}

impl Default for ServoPulseTrain {
    fn default() -> Self {
        Self::new()
    }
}

impl ServoPulseTrain {
    pub const fn new() -> Self {
        Self {
            position: 0,
            pulses_remaining: 0,
            next_pulse_us: 0,
            phase: Phase::Low,
        }
    }

    /// Start moving to `angle`
    pub fn start(&mut self, angle: u16) {
        let angle = angle.min(SERVO_MAX_ANGLE);
        self.pulses_remaining = self.position.abs_diff(angle);
        self.next_pulse_us = 0;
        self.position = angle;
    }

    /// Last commanded angle
    pub fn position(&self) -> u16 {
        self.position
    }

    pub fn pulses_remaining(&self) -> u16 {
        self.pulses_remaining
    }

    /// No pulses left and the line is not mid-pulse
    pub fn is_idle(&self) -> bool {
        self.pulses_remaining == 0 && self.phase == Phase::Low
    }

    /// Advance the pulse train
    pub fn service(&mut self, now_us: u64, line: &mut impl ServoLine) {
        match self.phase {
            Phase::High { until_us } => {
                if now_us >= until_us {
                    line.set_level(false);
                    self.phase = Phase::Low;
                    if self.pulses_remaining == 0 {
                        line.set_level(true);
                    }
                }
            }
            Phase::Low => {
                if self.pulses_remaining > 0 && now_us >= self.next_pulse_us {
                    self.pulses_remaining -= 1;
                    line.set_level(true);
                    self.phase = Phase::High {
                        until_us: now_us + pulse_width_us(self.position),
                    };
                    self.next_pulse_us = now_us + SERVO_FRAME_US;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Line {
        level: bool,
        rising: usize,
    }

    impl ServoLine for Line {
        fn set_level(&mut self, high: bool) {
            if high && !self.level {
                self.rising += 1;
            }
            self.level = high;
        }
    }

    #[test]
    fn test_pulse_width() {
        assert_eq!(pulse_width_us(0), 500);
        assert_eq!(pulse_width_us(90), 1500);
        assert_eq!(pulse_width_us(180), 2500);
        assert_eq!(pulse_width_us(250), 2500);
    }

    #[test]
    fn test_pulse_count_is_travel() {
        let mut servo = ServoPulseTrain::new();
        let mut line = Line::default();
        servo.start(30);
        assert_eq!(servo.pulses_remaining(), 30);

        let mut now = 0;
        while !servo.is_idle() {
            servo.service(now, &mut line);
            now += 100;
        }
        // 30 pulses plus the final hold-high edge
        assert_eq!(line.rising, 31);
        assert!(line.level);
        // Frames are spaced out, not back to back
        assert!(now >= 29 * SERVO_FRAME_US);

        servo.start(10);
        assert_eq!(servo.pulses_remaining(), 20);
    }

    #[test]
    fn test_pulse_phases() {
        let mut servo = ServoPulseTrain::new();
        let mut line = Line::default();
        servo.start(90);

        servo.service(0, &mut line);
        assert!(line.level);
        assert!(!servo.is_idle());

        servo.service(1499, &mut line);
        assert!(line.level);
        servo.service(1500, &mut line);
        assert!(!line.level);

        // Next pulse waits for the frame
        servo.service(11_999, &mut line);
        assert!(!line.level);
        servo.service(12_000, &mut line);
        assert!(line.level);
    }

    #[test]
    fn test_same_angle_is_immediately_idle() {
        let mut servo = ServoPulseTrain::new();
        servo.start(0);
        assert!(servo.is_idle());
    }
}
