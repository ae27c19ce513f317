//! Flash-backed emulated EEPROM
//!
//! The settings record is addressed as a small byte array. Reads and
//! writes hit a RAM image; `commit` hands a copy of the image to the flash
//! task, which stores it with sequential-storage for wear leveling in the
//! last 64KB of flash.
//!
//! Flash writes stall XIP, so they never happen on the main loop.

use embassy_rp::dma::Channel;
use embassy_rp::flash::{Async, Flash};
use embassy_rp::peripherals::FLASH;
use embassy_rp::Peri;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use sequential_storage::cache::NoCache;
use sequential_storage::map;

use evebrain_hal::{NvStorage, StorageError};

/// Flash storage configuration
pub const FLASH_SIZE: usize = 2 * 1024 * 1024;
pub const EEPROM_PARTITION_SIZE: usize = 64 * 1024;
pub const EEPROM_PARTITION_START: usize = FLASH_SIZE - EEPROM_PARTITION_SIZE;

/// Flash range for the EEPROM partition
pub const EEPROM_RANGE: core::ops::Range<u32> =
    (EEPROM_PARTITION_START as u32)..(FLASH_SIZE as u32);

/// Map key of the EEPROM image
const IMAGE_KEY: u8 = 0;

/// Scratch buffer for sequential-storage item headers plus the image
const ITEM_BUFFER_SIZE: usize = 1024;

/// Image hand-off from the main loop to the flash task
pub type CommitSignal<const N: usize> = Signal<CriticalSectionRawMutex, [u8; N]>;

/// Errors from the flash side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// Image does not fit the item buffer
    TooLarge,
    /// sequential-storage rejected the operation
    Storage,
}

/// Byte-addressable EEPROM view used by the settings store
pub struct FlashEeprom<const N: usize> {
    image: [u8; N],
    commits: &'static CommitSignal<N>,
}

impl<const N: usize> FlashEeprom<N> {
    /// Wrap an image loaded by [`EepromFlash::load`]
    pub fn new(image: [u8; N], commits: &'static CommitSignal<N>) -> Self {
        Self { image, commits }
    }

    fn range(&self, offset: usize, len: usize) -> Result<core::ops::Range<usize>, StorageError> {
        let end = offset.checked_add(len).ok_or(StorageError::OutOfBounds)?;
        if end > N {
            return Err(StorageError::OutOfBounds);
        }
        Ok(offset..end)
    }
}

impl<const N: usize> NvStorage for FlashEeprom<N> {
    fn capacity(&self) -> usize {
        N
    }

    fn read(&mut self, offset: usize, buffer: &mut [u8]) -> Result<(), StorageError> {
        let range = self.range(offset, buffer.len())?;
        buffer.copy_from_slice(&self.image[range]);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        let range = self.range(offset, data.len())?;
        self.image[range].copy_from_slice(data);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        // Overwrites any image the flash task has not picked up yet
        self.commits.signal(self.image);
        Ok(())
    }
}

/// Flash owner used at boot and by the flush task
pub struct EepromFlash<'d> {
    flash: Flash<'d, FLASH, Async, FLASH_SIZE>,
}

impl<'d> EepromFlash<'d> {
    pub fn new(flash: Peri<'d, FLASH>, dma: Peri<'d, impl Channel>) -> Self {
        Self {
            flash: Flash::new(flash, dma),
        }
    }

    /// Read the stored image
    ///
    /// Bytes the flash has never held read as erased (0xFF), which the
    /// settings store treats as a missing record.
    pub async fn load<const N: usize>(&mut self) -> [u8; N] {
        let mut image = [0xFF; N];
        let mut data_buffer = [0u8; ITEM_BUFFER_SIZE];

        let result = map::fetch_item::<u8, &[u8], _>(
            &mut self.flash,
            EEPROM_RANGE,
            &mut NoCache::new(),
            &mut data_buffer,
            &IMAGE_KEY,
        )
        .await;

        match result {
            Ok(Some(data)) => {
                let len = data.len().min(N);
                image[..len].copy_from_slice(&data[..len]);
            }
            Ok(None) => {}
            Err(_) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("EEPROM partition unreadable, starting blank");
            }
        }
        image
    }

    /// Persist an image
    pub async fn store(&mut self, image: &[u8]) -> Result<(), FlashError> {
        if image.len() + 32 > ITEM_BUFFER_SIZE {
            return Err(FlashError::TooLarge);
        }
        let mut data_buffer = [0u8; ITEM_BUFFER_SIZE];

        map::store_item(
            &mut self.flash,
            EEPROM_RANGE,
            &mut NoCache::new(),
            &mut data_buffer,
            &IMAGE_KEY,
            &image,
        )
        .await
        .map_err(|_| FlashError::Storage)
    }
}
