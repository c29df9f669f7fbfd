//! The [Frame] aggregate assembled from a run of asserted control line symbols, and the constants
//! describing Ethernet's framing.

use crate::classifier::Anomaly;
use crate::sample::Dibit;

/// A preamble byte. On the wire (LSB first) it is an alternating `1, 0` bit pattern, i.e. four
/// `01` dibits.
pub const PREAMBLE_BYTE: u8 = 0b01010101;
/// The Start Frame Delimiter, which ends the preamble.
pub const SFD_BYTE: u8 = 0b11010101;
/// The byte seen while a PHY signals a false carrier: it drives the data lines to `10` for as long
/// as CRS_DV stays asserted.
pub const FALSE_CARRIER_BYTE: u8 = 0b10101010;
/// A full Ethernet packet preamble plus an SFD sequence.
pub const PREAMBLE_AND_SFD: [u8; 8] = [
    PREAMBLE_BYTE,
    PREAMBLE_BYTE,
    PREAMBLE_BYTE,
    PREAMBLE_BYTE,
    PREAMBLE_BYTE,
    PREAMBLE_BYTE,
    PREAMBLE_BYTE,
    SFD_BYTE,
];
/// The number of dibits making up a byte.
pub const DIBITS_PER_BYTE: usize = 4;
/// The minimum size of an Ethernet frame. 64 equals 12 bytes of destination and source addresses, 2
/// bytes of EtherType, 46 bytes of payload, and 4 bytes of FCS.
pub const MIN_FRAME_SIZE: usize = 64;
/// The maximum size of an untagged Ethernet frame. 1518 equals 12 bytes of destination and source
/// addresses, 2 bytes of EtherType, 1500 bytes of payload, and 4 bytes of FCS.
pub const MAX_FRAME_SIZE: usize = 1518;
/// The length of a frame's FCS sequence, in bytes.
pub const FCS_SIZE: usize = 4;

/// The 1 to 3 dibits left over when a frame ends between byte boundaries ("dribble bits").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Residual {
    bits: u8,
    len: u8,
}

impl Residual {
    /// Constructs a [Residual] from up to three dibits in the order they were received. Returns
    /// `None` for an empty or overly long sequence.
    pub fn new(dibits: &[Dibit]) -> Option<Residual> {
        if dibits.is_empty() || dibits.len() >= DIBITS_PER_BYTE {
            return None;
        }
        let bits = dibits
            .iter()
            .enumerate()
            .fold(0u8, |bits, (idx, dibit)| bits | dibit.value() << (2 * idx));
        Some(Residual {
            bits,
            len: dibits.len() as u8,
        })
    }

    pub(crate) const fn from_partial(bits: u8, len: usize) -> Residual {
        Residual {
            bits,
            len: len as u8,
        }
    }

    /// The number of leftover dibits, `1..=3`.
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    /// Always false: a residual holds at least one dibit.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The leftover bits packed LSB first, as they would have appeared in the incomplete byte.
    pub const fn bits(&self) -> u8 {
        self.bits
    }

    /// The leftover dibits in the order they were received.
    pub fn dibits(&self) -> impl Iterator<Item = Dibit> + '_ {
        (0..self.len).map(move |idx| Dibit::from_bits(self.bits >> (2 * idx)))
    }
}

/// The state a [Frame] was closed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameStatus {
    /// The frame is still open.
    InProgress,
    /// The control line deasserted on a byte boundary.
    CompleteAligned,
    /// The control line deasserted between byte boundaries. The leftover dibits are kept.
    CompleteUnaligned(Residual),
    /// The control line asserted too briefly (or the PHY signalled a false carrier) to constitute
    /// a frame.
    FalseCarrier,
    /// The capture ended while the frame was still open.
    Truncated,
}

impl FrameStatus {
    /// Returns true once the frame has been closed.
    pub const fn is_closed(&self) -> bool {
        !matches!(self, FrameStatus::InProgress)
    }

    /// Returns true for the two statuses of frames that ended normally.
    pub const fn is_complete(&self) -> bool {
        matches!(
            self,
            FrameStatus::CompleteAligned | FrameStatus::CompleteUnaligned(_)
        )
    }

    /// The leftover dibit count of an unaligned frame, zero otherwise.
    pub const fn residual_dibits(&self) -> usize {
        match self {
            FrameStatus::CompleteUnaligned(residual) => residual.len(),
            _ => 0,
        }
    }
}

impl core::fmt::Display for FrameStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FrameStatus::InProgress => f.write_str("in progress"),
            FrameStatus::CompleteAligned => f.write_str("complete"),
            FrameStatus::CompleteUnaligned(residual) => {
                write!(f, "complete, {} dribble dibit(s)", residual.len())
            }
            FrameStatus::FalseCarrier => f.write_str("false carrier"),
            FrameStatus::Truncated => f.write_str("truncated"),
        }
    }
}

/// What was seen between the start of carrier and the SFD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PreambleStats {
    /// Bytes completed before the SFD (or before the frame closed, if there was none).
    pub bytes: usize,
    /// Of those, bytes that were neither [PREAMBLE_BYTE] nor [FALSE_CARRIER_BYTE].
    pub malformed: usize,
    /// Of those, bytes equal to [FALSE_CARRIER_BYTE].
    pub false_carrier_codes: usize,
}

/// One assertion of the control line, from the first asserted clock edge to its closure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// A per-decoder sequence number.
    pub id: u64,
    /// The sample index of the first asserted clock edge.
    pub start_index: u64,
    /// The sample index at which the frame was closed.
    pub end_index: Option<u64>,
    /// Every completed byte, preamble and SFD included.
    pub bytes: Vec<u8>,
    /// The closing status.
    pub status: FrameStatus,
    /// The position of the SFD within [Frame::bytes], if one was seen.
    pub sfd_offset: Option<usize>,
    /// The number of dibits consumed while the frame was open.
    pub dibit_count: usize,
    /// Preamble statistics.
    pub preamble: PreambleStats,
    /// How often CRS_DV dropped on a carrier sense clock edge while data was still valid.
    pub carrier_toggles: u32,
    /// Diagnostics attached by the [crate::ErrorClassifier].
    pub diagnostics: Vec<Anomaly>,
}

impl Frame {
    /// Constructs a new, open [Frame].
    pub fn new(id: u64, start_index: u64) -> Frame {
        Frame {
            id,
            start_index,
            end_index: None,
            bytes: Vec::new(),
            status: FrameStatus::InProgress,
            sfd_offset: None,
            dibit_count: 0,
            preamble: PreambleStats::default(),
            carrier_toggles: 0,
            diagnostics: Vec::new(),
        }
    }

    /// The frame data following the SFD, i.e. the destination address through the FCS. Empty if
    /// no SFD was seen.
    pub fn payload(&self) -> &[u8] {
        match self.sfd_offset {
            Some(offset) => &self.bytes[offset + 1..],
            None => &[],
        }
    }

    /// The trailing dibits of an unaligned frame.
    pub fn residual(&self) -> Option<Residual> {
        match self.status {
            FrameStatus::CompleteUnaligned(residual) => Some(residual),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Dibits are packed into the residual in the order they were received, LSB first.
    #[test]
    fn residual_keeps_dibit_order() {
        let dibits = [Dibit::from_bits(0b01), Dibit::from_bits(0b11)];
        let residual = Residual::new(&dibits).unwrap();
        assert_eq!(2, residual.len());
        assert_eq!(0b1101, residual.bits());
        assert_eq!(dibits.to_vec(), residual.dibits().collect::<Vec<_>>());
    }

    #[test]
    fn residual_rejects_empty_and_full_bytes() {
        assert_eq!(None, Residual::new(&[]));
        assert_eq!(None, Residual::new(&[Dibit::default(); 4]));
    }

    #[test]
    fn status_helpers() {
        let residual = Residual::new(&[Dibit::from_bits(0b10)]).unwrap();
        assert!(!FrameStatus::InProgress.is_closed());
        assert!(FrameStatus::Truncated.is_closed());
        assert!(FrameStatus::CompleteUnaligned(residual).is_complete());
        assert!(!FrameStatus::FalseCarrier.is_complete());
        assert_eq!(1, FrameStatus::CompleteUnaligned(residual).residual_dibits());
        assert_eq!(0, FrameStatus::CompleteAligned.residual_dibits());
        assert_eq!(
            "complete, 1 dribble dibit(s)",
            FrameStatus::CompleteUnaligned(residual).to_string()
        );
    }

    #[test]
    fn payload_follows_sfd() {
        let mut frame = Frame::new(0, 0);
        assert!(frame.payload().is_empty());
        frame.bytes = vec![PREAMBLE_BYTE, SFD_BYTE, 0x01, 0x02];
        frame.sfd_offset = Some(1);
        assert_eq!(&[0x01, 0x02], frame.payload());
    }

    // The preamble and SFD are the same as the on-the-wire bit patterns 1010...1011.
    #[test]
    fn preamble_and_sfd_constants() {
        assert_eq!(0x55, PREAMBLE_BYTE);
        assert_eq!(0xD5, SFD_BYTE);
        assert_eq!(0xAA, FALSE_CARRIER_BYTE);
        assert_eq!(8, PREAMBLE_AND_SFD.len());
    }
}
