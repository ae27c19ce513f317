//! EEPROM flush task
//!
//! Waits for committed images and stores them in flash. Commits that
//! arrive while a write is in flight collapse to the newest image.

use defmt::*;

use evebrain_hal_rp2040::EepromFlash;

use crate::channels::EEPROM_COMMITS;

#[embassy_executor::task]
pub async fn eeprom_task(mut flash: EepromFlash<'static>) {
    info!("EEPROM task started");

    loop {
        let image = EEPROM_COMMITS.wait().await;
        match flash.store(&image).await {
            Ok(()) => debug!("EEPROM image stored"),
            Err(e) => error!("EEPROM store failed: {:?}", e),
        }
    }
}
