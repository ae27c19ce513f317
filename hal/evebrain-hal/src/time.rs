//! Monotonic time source

/// Monotonic clock since boot
///
/// Both resolutions must come from the same counter so deadlines computed
/// in milliseconds and step timing computed in microseconds agree.
pub trait Clock {
    /// Milliseconds since boot
    fn now_ms(&self) -> u64;

    /// Microseconds since boot
    fn now_us(&self) -> u64;
}
