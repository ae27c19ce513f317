//! Board wiring for the RP2040 Evebrain carrier
//!
//! GPIO map:
//!
//! | GPIO | Function |
//! |------|----------|
//! | 0, 1 | UART0 TX / RX (command link) |
//! | 2, 3, 4 | Shift register data / clock / latch (wheel coils) |
//! | 5, 10, 16 | User PWM pins (`gpio_pwm_5/10/16`) |
//! | 6-9 | Edge-watched inputs (`digitalNotify`) |
//! | 11, 17, 22, 27, 28 | User GPIO; 22 is the reset input |
//! | 12 | Hardware-PWM servo (`servoII`) |
//! | 13 | DHT11 |
//! | 14 | Bit-banged servo line (`servo`) |
//! | 15 | Buzzer |
//! | 18, 19 | HC-SR04 trigger / echo |
//! | 20, 21 | I2C0 SDA / SCL (HMC5883L, PCF8591) |
//! | 26 | Analog input |
//!
//! PWM pins are fixed by their slice, so the typed peripherals are named
//! in `main`; the numbers here must agree with it.

use evebrain_core::config::DEFAULT_STEPS_PER_REVOLUTION;
use evebrain_core::RobotConfig;
use evebrain_protocol::HardwareVersion;

/// Number of edge-watched pins
pub const WATCHED_PIN_COUNT: usize = 4;

/// Edge-watched input pins
pub const WATCHED_PINS: [u8; WATCHED_PIN_COUNT] = [6, 7, 8, 9];

/// Pins reported in server status updates
pub const STATUS_PINS: [u8; 6] = [6, 7, 8, 9, 11, 17];

/// Input held low at boot to restore factory settings
pub const RESET_PIN: u8 = 22;

/// Emulated EEPROM size
pub const EEPROM_SIZE: usize = evebrain_core::settings::SETTINGS_REGION_SIZE;

/// Static board description
pub struct BoardConfig {
    pub hardware: HardwareVersion,
    pub steps_per_revolution: f32,
    pub reset_pin: u8,
    pub status_pins: &'static [u8],
    pub ap_name: &'static str,
}

impl BoardConfig {
    pub fn robot_config(&self) -> RobotConfig {
        RobotConfig {
            hardware: self.hardware,
            steps_per_revolution: self.steps_per_revolution,
            reset_pin: Some(self.reset_pin),
            status_pins: self.status_pins,
        }
    }
}

const fn hardware_from_env(hw: &str) -> HardwareVersion {
    match hw.as_bytes() {
        [b'1'] => HardwareVersion::V1,
        [b'2'] => HardwareVersion::V2,
        _ => HardwareVersion::V3,
    }
}

pub const BOARD: BoardConfig = BoardConfig {
    hardware: hardware_from_env(env!("EVEBRAIN_HW_VERSION")),
    steps_per_revolution: DEFAULT_STEPS_PER_REVOLUTION,
    reset_pin: RESET_PIN,
    status_pins: &STATUS_PINS,
    ap_name: env!("EVEBRAIN_AP_NAME"),
};
