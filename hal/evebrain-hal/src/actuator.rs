//! Actuator abstractions: wheel coils, buzzer and servos

/// Coil driver for the two wheel steppers
///
/// The robot drives both unipolar steppers from one shift register, so the
/// pair of coil patterns is latched together. Each pattern holds the four
/// coil bits in its low nibble.
pub trait CoilDriver {
    /// Latch new coil patterns for the left and right wheel
    fn energize(&mut self, left: u8, right: u8);
}

/// Piezo buzzer
pub trait Buzzer {
    /// Start a square wave at `frequency_hz`
    fn tone(&mut self, frequency_hz: u16);

    /// Silence the buzzer
    fn no_tone(&mut self);
}

/// Bit-banged servo signal line
///
/// The primary servo is driven by a pulse train generated from the main
/// loop; this is the raw line it toggles.
pub trait ServoLine {
    /// Drive the servo signal line
    fn set_level(&mut self, high: bool);
}

/// Hardware-PWM servo output
pub trait PwmServo {
    /// Start generating servo pulses between `min_us` and `max_us`
    fn attach(&mut self, min_us: u16, max_us: u16);

    /// Move to `angle` degrees (0-180)
    fn write_angle(&mut self, angle: u16);

    /// Stop generating pulses
    fn detach(&mut self);
}

/// Servos on arbitrary user pins
pub trait PinServoBank {
    /// Start driving a servo on `pin` towards `angle`
    ///
    /// Returns false when `pin` cannot carry a servo signal.
    fn start_pin_servo(&mut self, pin: u8, angle: u16) -> bool;

    /// Service active servo signals; called every main-loop iteration
    fn poll_pin_servos(&mut self);
}
