//! Non-volatile storage abstractions
//!
//! The settings record lives at a fixed byte offset, so the storage is
//! modelled as a small byte-addressable EEPROM: reads and writes go to a
//! RAM image and `commit` flushes the image to the medium. Chips without a
//! real EEPROM emulate it on top of flash.

/// Errors from non-volatile storage operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// Address range falls outside the storage region
    OutOfBounds,
    /// Underlying medium rejected the operation
    Medium,
}

/// Byte-addressable non-volatile storage
pub trait NvStorage {
    /// Size of the addressable region in bytes
    fn capacity(&self) -> usize;

    /// Read `buffer.len()` bytes starting at `offset`
    fn read(&mut self, offset: usize, buffer: &mut [u8]) -> Result<(), StorageError>;

    /// Write `data` starting at `offset`
    ///
    /// Data is not guaranteed to survive a power cycle until [`commit`]
    /// returns.
    ///
    /// [`commit`]: NvStorage::commit
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError>;

    /// Flush pending writes to the medium
    fn commit(&mut self) -> Result<(), StorageError>;
}
