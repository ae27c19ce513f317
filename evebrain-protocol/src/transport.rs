//! Serial transport parameters per hardware generation

/// Board hardware generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HardwareVersion {
    V1,
    V2,
    V3,
}

impl HardwareVersion {
    /// Map a board number to a generation
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::V1),
            2 => Some(Self::V2),
            3 => Some(Self::V3),
            _ => None,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
            Self::V3 => 3,
        }
    }

    /// UART baud rate
    pub fn baud_rate(self) -> u32 {
        match self {
            Self::V1 | Self::V2 => 57_600,
            Self::V3 => 230_400,
        }
    }

    /// First generation boards speak WebSocket framing over serial
    pub fn uses_legacy_framing(self) -> bool {
        self == Self::V1
    }

    /// Whether a boot banner is printed when serial is enabled
    pub fn announces_boot(self) -> bool {
        self >= Self::V3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baud_rates() {
        assert_eq!(HardwareVersion::V1.baud_rate(), 57_600);
        assert_eq!(HardwareVersion::V2.baud_rate(), 57_600);
        assert_eq!(HardwareVersion::V3.baud_rate(), 230_400);
    }

    #[test]
    fn test_from_number() {
        assert_eq!(HardwareVersion::from_number(3), Some(HardwareVersion::V3));
        assert_eq!(HardwareVersion::from_number(0), None);
        assert_eq!(HardwareVersion::V2.number(), 2);
    }
}
