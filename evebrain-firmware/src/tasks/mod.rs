//! Embassy tasks for the robot firmware
//!
//! - `robot_task`: the cooperative main loop, polling the core
//! - `uart_rx_task` / `uart_tx_task`: UART0 <-> serial pipes
//! - `pin_watch_task`: one per edge-watched pin, feeding the event queue
//! - `eeprom_task`: writes committed EEPROM images to flash

mod eeprom;
mod pin_watch;
mod robot;
mod serial;

pub use eeprom::eeprom_task;
pub use pin_watch::pin_watch_task;
pub use robot::{robot_task, EveRobot};
pub use serial::{uart_rx_task, uart_tx_task};
