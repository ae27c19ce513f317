//! Interrupt-safe pin event queue
//!
//! Pin-change interrupts push the new level of their pin; the main loop
//! pops events and turns them into notifications. There is one slot per
//! interrupt-capable pin, so a burst of edges on one pin collapses to its
//! latest level and can never crowd out another pin.
//!
//! Every multi-field access happens inside a critical section, which is
//! the only locking in the firmware.

use core::cell::RefCell;
use critical_section::Mutex;

/// A level change on an input pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinEvent {
    pub pin: u8,
    pub level: bool,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    pin: u8,
    level: bool,
    has_data: bool,
}

struct Slots<const N: usize> {
    slots: [Slot; N],
    cursor: usize,
}

/// Queue seen by the main loop
///
/// Object-safe so the robot context does not carry the slot count.
pub trait PinEventQueue: Sync {
    /// Record the latest level of a pin; ISR-callable
    ///
    /// Returns false when the pin has no slot.
    fn push(&self, event: PinEvent) -> bool;

    /// Take one pending event
    fn pop(&self) -> Option<PinEvent>;

    /// Number of slots holding unread data
    fn number_of_elements(&self) -> usize;

    /// Whether `pin` can raise events
    fn has_slot(&self, pin: u8) -> bool;
}

/// Fixed-slot event queue for `N` interrupt-capable pins
pub struct EventQueue<const N: usize> {
    inner: Mutex<RefCell<Slots<N>>>,
}

impl<const N: usize> EventQueue<N> {
    /// Create a queue with one slot per listed pin
    pub const fn new(pins: [u8; N]) -> Self {
        let mut slots = [Slot {
            pin: 0,
            level: false,
            has_data: false,
        }; N];
        let mut i = 0;
        while i < N {
            slots[i].pin = pins[i];
            i += 1;
        }
        Self {
            inner: Mutex::new(RefCell::new(Slots { slots, cursor: 0 })),
        }
    }
}

impl<const N: usize> PinEventQueue for EventQueue<N> {
    fn push(&self, event: PinEvent) -> bool {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            match inner.slots.iter_mut().find(|s| s.pin == event.pin) {
                Some(slot) => {
                    slot.level = event.level;
                    slot.has_data = true;
                    true
                }
                None => false,
            }
        })
    }

    fn pop(&self) -> Option<PinEvent> {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            let start = inner.cursor;
            for offset in 0..N {
                let idx = (start + offset) % N;
                let slot = &mut inner.slots[idx];
                if slot.has_data {
                    slot.has_data = false;
                    let event = PinEvent {
                        pin: slot.pin,
                        level: slot.level,
                    };
                    inner.cursor = (idx + 1) % N;
                    return Some(event);
                }
            }
            None
        })
    }

    fn number_of_elements(&self) -> usize {
        critical_section::with(|cs| {
            self.inner
                .borrow_ref(cs)
                .slots
                .iter()
                .filter(|s| s.has_data)
                .count()
        })
    }

    fn has_slot(&self, pin: u8) -> bool {
        // Pins are fixed at construction
        critical_section::with(|cs| self.inner.borrow_ref(cs).slots.iter().any(|s| s.pin == pin))
    }
}
