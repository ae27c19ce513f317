//! Readiness scheduler
//!
//! Asynchronous commands start an operation and return. The scheduler
//! tracks what still has to happen before the deferred reply may be sent:
//! motion, servo pulses and a timed window. It also names the result the
//! reply must carry.

use evebrain_hal::CompassReading;

/// How long-running operations are waited for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExecutionMode {
    /// Operations spin until complete before returning
    Blocking,
    /// Operations return at once; completion is reported from the loop
    NonBlocking,
}

/// Which servo an outstanding servo operation drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServoKind {
    PulseTrain,
    Pwm,
}

/// Result owed to the client once the robot is ready
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PendingCompletion {
    #[default]
    None,
    Motion,
    /// Read at completion time
    Temperature,
    /// Read at completion time
    Humidity,
    /// Captured at start, in cm
    Distance(u32),
    Compass(CompassReading),
    Buzzer,
    Servo(ServoKind),
    /// Captured at start
    Analog(u8),
}

/// Timed window and pending result
#[derive(Debug, Clone)]
pub struct ReadinessScheduler {
    mode: ExecutionMode,
    deadline_ms: u64,
    pending: PendingCompletion,
}

impl Default for ReadinessScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessScheduler {
    pub const fn new() -> Self {
        Self {
            mode: ExecutionMode::Blocking,
            deadline_ms: 0,
            pending: PendingCompletion::None,
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ExecutionMode) {
        self.mode = mode;
    }

    pub fn is_blocking(&self) -> bool {
        self.mode == ExecutionMode::Blocking
    }

    /// Hold readiness off until at least `window_ms` from `now_ms`
    ///
    /// A longer window already running is kept.
    pub fn start_window(&mut self, now_ms: u64, window_ms: u64) {
        self.deadline_ms = self.deadline_ms.max(now_ms + window_ms);
    }

    pub fn deadline_ms(&self) -> u64 {
        self.deadline_ms
    }

    /// All outstanding work is done
    pub fn ready(&self, motion_idle: bool, servo_idle: bool, now_ms: u64) -> bool {
        motion_idle && servo_idle && now_ms >= self.deadline_ms
    }

    pub fn set_pending(&mut self, pending: PendingCompletion) {
        self.pending = pending;
    }

    pub fn pending(&self) -> PendingCompletion {
        self.pending
    }

    pub fn take_pending(&mut self) -> PendingCompletion {
        core::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_deadline_is_elapsed() {
        let s = ReadinessScheduler::new();
        assert!(s.ready(true, true, 0));
        assert!(s.is_blocking());
    }

    #[test]
    fn test_each_condition_blocks_readiness() {
        let mut s = ReadinessScheduler::new();
        s.start_window(1000, 250);

        assert!(s.ready(true, true, 1250));
        assert!(!s.ready(false, true, 1250));
        assert!(!s.ready(true, false, 1250));
        assert!(!s.ready(true, true, 1249));
    }

    #[test]
    fn test_shorter_window_keeps_longer_deadline() {
        let mut s = ReadinessScheduler::new();
        s.start_window(0, 1500);
        s.start_window(100, 150);
        assert_eq!(s.deadline_ms(), 1500);

        s.start_window(1400, 300);
        assert_eq!(s.deadline_ms(), 1700);
    }

    #[test]
    fn test_take_pending_clears() {
        let mut s = ReadinessScheduler::new();
        s.set_pending(PendingCompletion::Distance(42));
        assert_eq!(s.take_pending(), PendingCompletion::Distance(42));
        assert_eq!(s.pending(), PendingCompletion::None);
    }
}
