//! The input side of the decoder: logical signal samples and the 2-bit symbols carried on the RMII
//! data lines.

/// A 2-bit value transferred on the RMII data lines during one reference clock period.
///
/// `RXD[1]`/`TXD[1]` occupies bit 1 and `RXD[0]`/`TXD[0]` occupies bit 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dibit(u8);

impl Dibit {
    /// Constructs a [Dibit] from the levels of the two data lines.
    pub const fn from_lines(data1: bool, data0: bool) -> Dibit {
        Dibit(((data1 as u8) << 1) | data0 as u8)
    }

    /// Constructs a [Dibit] from the two least significant bits of `value`. Higher bits are
    /// ignored.
    pub const fn from_bits(value: u8) -> Dibit {
        Dibit(value & 0b11)
    }

    /// Returns the dibit as a value in `0..=3`.
    pub const fn value(self) -> u8 {
        self.0
    }

    /// The level of the `data0` line.
    pub const fn data0(self) -> bool {
        self.0 & 0b01 != 0
    }

    /// The level of the `data1` line.
    pub const fn data1(self) -> bool {
        self.0 & 0b10 != 0
    }
}

impl core::fmt::Display for Dibit {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // Written as the two line levels, D1 first.
        write!(f, "{:02b}", self.0)
    }
}

/// One capture tick, already resolved to the four logical RMII signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// The sample number (or timestamp) of this tick. Must strictly increase across a stream.
    pub index: u64,
    /// REF_CLK level.
    pub ref_clock: bool,
    /// CRS_DV or TX_EN level.
    pub ctrl: bool,
    /// The data lines.
    pub data: Dibit,
}

impl Sample {
    /// Constructs a new [Sample].
    pub const fn new(index: u64, ref_clock: bool, ctrl: bool, data: Dibit) -> Sample {
        Sample {
            index,
            ref_clock,
            ctrl,
            data,
        }
    }
}

/// One capture tick as delivered by a logic analyzer: a word with one bit per probed channel.
///
/// A [crate::ChannelMap] turns it into a [Sample].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    /// The sample number of this tick.
    pub index: u64,
    /// Channel levels, channel `n` in bit `n`.
    pub levels: u32,
}

impl RawSample {
    /// Returns the level of the given channel. Channels beyond bit 31 read as low.
    pub fn channel(&self, channel: u8) -> bool {
        self.levels.checked_shr(channel as u32).unwrap_or(0) & 1 != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The data1 line is the more significant bit of a dibit.
    #[test]
    fn dibit_from_lines() {
        assert_eq!(0b00, Dibit::from_lines(false, false).value());
        assert_eq!(0b01, Dibit::from_lines(false, true).value());
        assert_eq!(0b10, Dibit::from_lines(true, false).value());
        assert_eq!(0b11, Dibit::from_lines(true, true).value());
        assert!(Dibit::from_bits(0b10).data1());
        assert!(!Dibit::from_bits(0b10).data0());
    }

    #[test]
    fn dibit_from_bits_masks_high_bits() {
        assert_eq!(Dibit::from_bits(0b01), Dibit::from_bits(0b1111_0101));
        assert_eq!("01", Dibit::from_bits(0b01).to_string());
    }

    #[test]
    fn raw_sample_channel_levels() {
        let raw = RawSample {
            index: 7,
            levels: 0b1010,
        };
        assert!(!raw.channel(0));
        assert!(raw.channel(1));
        assert!(!raw.channel(2));
        assert!(raw.channel(3));
        assert!(!raw.channel(40));
    }
}
