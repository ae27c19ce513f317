//! UART0 pump tasks
//!
//! Move bytes between the buffered UART and the serial pipes the robot
//! loop reads and writes without awaiting.

use defmt::*;
use embassy_rp::uart::{BufferedUartRx, BufferedUartTx};
use embedded_io_async::{Read, Write};

use crate::channels::{RX_PIPE, TX_PIPE};

/// Chunk size for each UART transfer
const CHUNK_SIZE: usize = 64;

/// UART RX task - forwards received bytes to the robot loop
#[embassy_executor::task]
pub async fn uart_rx_task(mut rx: BufferedUartRx) {
    info!("UART RX task started");

    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        match rx.read(&mut buf).await {
            Ok(n) if n > 0 => {
                trace!("RX: {} bytes", n);
                RX_PIPE.write_all(&buf[..n]).await;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("UART read error: {:?}", e);
            }
        }
    }
}

/// UART TX task - drains replies queued by the robot loop
#[embassy_executor::task]
pub async fn uart_tx_task(mut tx: BufferedUartTx) {
    info!("UART TX task started");

    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = TX_PIPE.read(&mut buf).await;
        if let Err(e) = tx.write_all(&buf[..n]).await {
            warn!("UART write error: {:?}", e);
        }
    }
}
