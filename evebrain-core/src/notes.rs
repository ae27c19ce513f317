//! Buzzer note table
//!
//! Semitone 0 is B0, semitone 88 is D#8.

/// Highest playable semitone
pub const MAX_SEMITONE: usize = 88;

/// Note frequencies in Hz, B0 through D#8
pub const NOTE_FREQUENCIES_HZ: [u16; MAX_SEMITONE + 1] = [
    31, 33, 35, 37, 39, 41, 44, 46, 49, 52, 55, 58, // B0..AS1
    62, 65, 69, 73, 78, 82, 87, 93, 98, 104, 110, 117, // B1..AS2
    123, 131, 139, 147, 156, 165, 175, 185, 196, 208, 220, 233, // B2..AS3
    247, 262, 277, 294, 311, 330, 349, 370, 392, 415, 440, 466, // B3..AS4
    494, 523, 554, 587, 622, 659, 698, 740, 784, 831, 880, 932, // B4..AS5
    988, 1047, 1109, 1175, 1245, 1319, 1397, 1480, 1568, 1661, 1760, 1865, // B5..AS6
    1976, 2093, 2217, 2349, 2489, 2637, 2794, 2960, 3136, 3322, 3520, 3729, // B6..AS7
    3951, 4186, 4435, 4699, 4978, // B7..DS8
];

/// Frequency for a semitone, `None` when off the table
pub fn frequency(semitone: i32) -> Option<u16> {
    usize::try_from(semitone)
        .ok()
        .and_then(|i| NOTE_FREQUENCIES_HZ.get(i).copied())
}
