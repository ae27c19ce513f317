//! Evebrain - Wheeled Robot Controller Firmware
//!
//! Main firmware binary for the RP2040 Evebrain carrier. Wires the board
//! drivers into the core `Robot` and spawns the tasks that feed it.

#![no_std]
#![no_main]

extern crate alloc;

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::adc::{self, Adc};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Flex, Input, Level, Output, Pull};
use embassy_rp::i2c::{self, I2c};
use embassy_rp::peripherals::UART0;
use embassy_rp::pwm::{self, Pwm};
use embassy_rp::uart::{BufferedInterruptHandler, Config as UartConfig, Uart};
use embedded_alloc::LlffHeap as Heap;
use heapless::String;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use evebrain_core::Robot;
use evebrain_hal_rp2040::board::BoardParts;
use evebrain_hal_rp2040::climate::Dht11;
use evebrain_hal_rp2040::coils::ShiftRegisterCoils;
use evebrain_hal_rp2040::i2c_sensors::SensorBus;
use evebrain_hal_rp2040::pins::UserPins;
use evebrain_hal_rp2040::pwm::{PwmBuzzer, PwmChannel, PwmOutput, PwmServoOutput};
use evebrain_hal_rp2040::range::Ultrasonic;
use evebrain_hal_rp2040::serial::{PipeRx, PipeTx};
use evebrain_hal_rp2040::{user_pins, EepromFlash, FlashEeprom, Rp2040Board};

use crate::board::{BOARD, EEPROM_SIZE};
use crate::channels::{EEPROM_COMMITS, PIN_EVENTS, RX_PIPE, TX_PIPE, WATCHED};
use crate::tasks::EveRobot;

mod board;
mod channels;
mod tasks;

// Heap for JSON documents and reply routing
#[global_allocator]
static HEAP: Heap = Heap::empty();

// Heap size: 48KB
const HEAP_SIZE: usize = 48 * 1024;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
});

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

static ROBOT: StaticCell<EveRobot> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Evebrain firmware starting...");

    init_heap();

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    // Settings image from flash; writes go through the EEPROM task
    let mut flash = EepromFlash::new(p.FLASH, p.DMA_CH0);
    let image = flash.load::<EEPROM_SIZE>().await;
    let eeprom = FlashEeprom::new(image, &EEPROM_COMMITS);
    info!("EEPROM image loaded");

    // UART0 for the command link
    let mut uart_config = UartConfig::default();
    uart_config.baudrate = BOARD.hardware.baud_rate();

    let tx_buf = TX_BUF.init([0u8; 256]);
    let rx_buf = RX_BUF.init([0u8; 256]);

    let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, uart_config);
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);
    let (tx, rx) = uart.split();
    info!("UART initialized at {} baud", BOARD.hardware.baud_rate());

    // User GPIO and PWM pins (slice/channel fixed by the pin number)
    let user = user_pins!(p;
        11 => PIN_11,
        17 => PIN_17,
        22 => PIN_22,
        27 => PIN_27,
        28 => PIN_28,
    );
    let mut pins = match UserPins::new(user) {
        Ok(pins) => pins,
        Err(e) => defmt::panic!("User pin table invalid: {:?}", e),
    };
    pins.set_pull_up(BOARD.reset_pin);

    let pwm_pins = [
        (
            5,
            PwmOutput::new(
                Pwm::new_output_b(p.PWM_SLICE2, p.PIN_5, pwm::Config::default()),
                PwmChannel::B,
            ),
        ),
        (
            10,
            PwmOutput::new(
                Pwm::new_output_a(p.PWM_SLICE5, p.PIN_10, pwm::Config::default()),
                PwmChannel::A,
            ),
        ),
        (
            16,
            PwmOutput::new(
                Pwm::new_output_a(p.PWM_SLICE0, p.PIN_16, pwm::Config::default()),
                PwmChannel::A,
            ),
        ),
    ];
    for (pin, output) in pwm_pins {
        if let Err(e) = pins.add_pwm(pin, output) {
            warn!("PWM pin {} not registered: {:?}", pin, e);
        }
    }

    // Actuators
    let coils = ShiftRegisterCoils::new(
        Output::new(p.PIN_2, Level::Low),
        Output::new(p.PIN_3, Level::Low),
        Output::new(p.PIN_4, Level::Low),
    );
    let buzzer = PwmBuzzer::new(PwmOutput::new(
        Pwm::new_output_b(p.PWM_SLICE7, p.PIN_15, pwm::Config::default()),
        PwmChannel::B,
    ));
    let pwm_servo = PwmServoOutput::new(PwmOutput::new(
        Pwm::new_output_a(p.PWM_SLICE6, p.PIN_12, pwm::Config::default()),
        PwmChannel::A,
    ));
    let servo_line = Output::new(p.PIN_14, Level::Low);

    // Sensors
    let climate = Dht11::new(Flex::new(p.PIN_13));
    let range = Ultrasonic::new(
        Output::new(p.PIN_18, Level::Low),
        Input::new(p.PIN_19, Pull::Down),
    );
    let i2c = I2c::new_blocking(p.I2C0, p.PIN_21, p.PIN_20, i2c::Config::default());
    let sensors = SensorBus::new(i2c);
    let adc = Adc::new_blocking(p.ADC, adc::Config::default());
    let analog = adc::Channel::new_pin(p.PIN_26, Pull::None);
    info!("Board drivers initialized");

    let parts = BoardParts {
        pins,
        watched: &WATCHED,
        adc,
        analog,
        coils,
        buzzer,
        servo_line,
        pwm_servo,
        climate,
        range,
        sensors,
        serial: PipeRx::new(&RX_PIPE),
        ap_name: String::try_from(BOARD.ap_name).unwrap_or_default(),
        free_heap,
    };

    let robot = ROBOT.init(Robot::new(
        Rp2040Board::new(parts),
        eeprom,
        BOARD.robot_config(),
        &PIN_EVENTS,
    ));
    robot.enable_serial(PipeTx::new(&TX_PIPE));

    // Edge-watched pins, one task each
    let watched = [
        (6, Input::new(p.PIN_6, Pull::Up)),
        (7, Input::new(p.PIN_7, Pull::Up)),
        (8, Input::new(p.PIN_8, Pull::Up)),
        (9, Input::new(p.PIN_9, Pull::Up)),
    ];

    // Spawn tasks
    spawner.spawn(tasks::eeprom_task(flash)).unwrap();
    spawner.spawn(tasks::uart_rx_task(rx)).unwrap();
    spawner.spawn(tasks::uart_tx_task(tx)).unwrap();
    for (pin, input) in watched {
        spawner.spawn(tasks::pin_watch_task(pin, input)).unwrap();
    }
    spawner.spawn(tasks::robot_task(robot)).unwrap();

    info!("All tasks spawned, firmware running");
}

/// Initialize the heap allocator
fn init_heap() {
    use core::mem::MaybeUninit;
    static mut HEAP_MEM: [MaybeUninit<u8>; HEAP_SIZE] = [MaybeUninit::uninit(); HEAP_SIZE];
    #[allow(static_mut_refs)]
    unsafe {
        HEAP.init(HEAP_MEM.as_ptr() as usize, HEAP_SIZE)
    }
}

/// Free heap reported to clients
fn free_heap() -> u32 {
    HEAP.free() as u32
}
