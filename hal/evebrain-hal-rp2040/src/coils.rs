//! Shift-register coil driver
//!
//! Both wheel steppers hang off one 74HC595. The register bits map to the
//! stepper wires as `R L L L L R R R` (MSB first): the left motor starts
//! one bit in, the right motor starts five bits in and wraps around.

use embassy_rp::gpio::Output;

use evebrain_hal::CoilDriver;

/// Pack two coil nibbles into the register byte
pub fn shift_pattern(left: u8, right: u8) -> u8 {
    ((left & 0x0F) << 3) | (right & 0x0F).rotate_right(1)
}

pub struct ShiftRegisterCoils<'d> {
    data: Output<'d>,
    clock: Output<'d>,
    latch: Output<'d>,
}

impl<'d> ShiftRegisterCoils<'d> {
    pub fn new(data: Output<'d>, clock: Output<'d>, latch: Output<'d>) -> Self {
        let mut coils = Self { data, clock, latch };
        // Coils off until the first move
        coils.shift_out(0);
        coils
    }

    fn shift_out(&mut self, byte: u8) {
        self.latch.set_low();
        for bit in (0..8).rev() {
            if byte & (1 << bit) != 0 {
                self.data.set_high();
            } else {
                self.data.set_low();
            }
            self.clock.set_high();
            self.clock.set_low();
        }
        self.latch.set_high();
    }
}

impl CoilDriver for ShiftRegisterCoils<'_> {
    fn energize(&mut self, left: u8, right: u8) {
        self.shift_out(shift_pattern(left, right));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_left_nibble_offset_by_one() {
        assert_eq!(shift_pattern(0b1000, 0), 0b0100_0000);
        assert_eq!(shift_pattern(0b0001, 0), 0b0000_1000);
    }

    #[test]
    fn test_right_nibble_wraps() {
        assert_eq!(shift_pattern(0, 0b1000), 0b0000_0100);
        assert_eq!(shift_pattern(0, 0b0001), 0b1000_0000);
        assert_eq!(shift_pattern(0, 0b1111), 0b1000_0111);
    }

    #[test]
    fn test_high_bits_ignored() {
        assert_eq!(shift_pattern(0xF0, 0xF0), 0);
        assert_eq!(shift_pattern(0x0F, 0x0F), 0xFF);
    }
}
