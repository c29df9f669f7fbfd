//! Provides synthetic captures for use in tests or demo binaries.

use crate::config::ChannelMap;
use crate::frame::{DIBITS_PER_BYTE, PREAMBLE_AND_SFD};
use crate::sample::{Dibit, RawSample, Sample};

/// A 64 byte Ethernet frame (the smallest size an Ethernet frame can have) containing an ARP
/// request asking for the MAC address of the device with link-local IPv4 address 169.254.172.115,
/// sent by a device with MAC address 12:34:56:78:90:12 (a "locally-administered" address) and IPv4
/// address 169.254.172.114. The last four bytes are a valid FCS.
//
// Any change to the frame data requires changing the FCS as well. The
// [tests::example_frame_arp_request_crc_valid] test will fail if the CRC does not match (and can be
// used to determine the updated CRC value).
pub const EXAMPLE_FRAME_ARP_REQUEST: [u8; 64] = [
    // Destination: broadcast.
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, //
    // Source.
    0x12, 0x34, 0x56, 0x78, 0x90, 0x12, //
    // EtherType: ARP.
    0x08, 0x06, //
    // Hardware type (Ethernet), protocol type (IPv4), address lengths, operation (request).
    0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01, //
    // Sender hardware and protocol address.
    0x12, 0x34, 0x56, 0x78, 0x90, 0x12, 0xA9, 0xFE, 0xAC, 0x72, //
    // Target hardware and protocol address.
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xA9, 0xFE, 0xAC, 0x73, //
    // Padding.
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, //
    // FCS.
    0x76, 0xE9, 0x85, 0xB4,
];

/// Returns the dibits of `byte` in the order they are transferred, least significant first.
pub fn byte_to_dibits(byte: u8) -> impl Iterator<Item = Dibit> {
    (0..DIBITS_PER_BYTE).map(move |idx| Dibit::from_bits(byte >> (2 * idx)))
}

/// Synthesizes an RMII capture one reference clock period at a time.
///
/// Each period is sampled `period` times: the clock is low for the first half and high for the
/// second, and the control and data lines hold their value for the whole period, so they are stable
/// around both clock edges.
#[derive(Debug, Clone)]
pub struct CaptureBuilder {
    period: u64,
    next_index: u64,
    samples: Vec<Sample>,
}

impl CaptureBuilder {
    /// Constructs a new [CaptureBuilder] using `period` samples per clock period (at least 2).
    pub fn new(period: u64) -> CaptureBuilder {
        CaptureBuilder {
            period: period.max(2),
            next_index: 0,
            samples: Vec::new(),
        }
    }

    /// The number of samples per clock period.
    pub fn period(&self) -> u64 {
        self.period
    }

    /// Appends one clock period with the given control and data levels.
    pub fn cycle(mut self, ctrl: bool, dibit: Dibit) -> Self {
        let low_samples = self.period / 2;
        for offset in 0..self.period {
            self.samples.push(Sample::new(
                self.next_index + offset,
                offset >= low_samples,
                ctrl,
                dibit,
            ));
        }
        self.next_index += self.period;
        self
    }

    /// Appends `cycles` clock periods with the control line deasserted.
    pub fn idle(self, cycles: usize) -> Self {
        (0..cycles).fold(self, |builder, _| builder.cycle(false, Dibit::default()))
    }

    /// Appends one clock period per dibit.
    pub fn dibits<I>(self, ctrl: bool, dibits: I) -> Self
    where
        I: IntoIterator<Item = Dibit>,
    {
        dibits
            .into_iter()
            .fold(self, |builder, dibit| builder.cycle(ctrl, dibit))
    }

    /// Appends the given bytes with the control line asserted.
    pub fn bytes(self, bytes: &[u8]) -> Self {
        self.dibits(true, bytes.iter().flat_map(|&byte| byte_to_dibits(byte)))
    }

    /// Appends a preamble, an SFD and the given frame data with the control line asserted.
    pub fn packet(self, frame: &[u8]) -> Self {
        self.bytes(&PREAMBLE_AND_SFD).bytes(frame)
    }

    /// Holds the clock low for `samples` extra samples, stretching the next clock period.
    pub fn clock_stall(mut self, samples: u64) -> Self {
        for offset in 0..samples {
            self.samples.push(Sample::new(
                self.next_index + offset,
                false,
                false,
                Dibit::default(),
            ));
        }
        self.next_index += samples;
        self
    }

    /// Returns the synthesized samples.
    pub fn build(self) -> Vec<Sample> {
        self.samples
    }

    /// Returns the synthesized samples encoded as capture words using the given channel map.
    pub fn build_raw(self, channels: &ChannelMap) -> Vec<RawSample> {
        self.samples
            .iter()
            .map(|sample| {
                let level = |on: bool, channel: u8| (on as u32) << channel;
                RawSample {
                    index: sample.index,
                    levels: level(sample.ref_clock, channels.ref_clock)
                        | level(sample.ctrl, channels.ctrl)
                        | level(sample.data.data0(), channels.data0)
                        | level(sample.data.data1(), channels.data1),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The frame must be exactly 64 bytes long, the minimum Ethernet frame size.
    #[test]
    fn example_frame_arp_request_len() {
        assert_eq!(crate::frame::MIN_FRAME_SIZE, EXAMPLE_FRAME_ARP_REQUEST.len());
    }

    // Ensures that the hardcoded CRC matches the actual data.
    #[test]
    fn example_frame_arp_request_crc_valid() {
        let data = &EXAMPLE_FRAME_ARP_REQUEST;
        let calculated_crc = crc32fast::hash(&data[0..data.len() - 4]);
        let frame_crc = u32::from_le_bytes([data[60], data[61], data[62], data[63]]);
        assert_eq!(
            calculated_crc, frame_crc,
            "calculated CRC: 0x{calculated_crc:08x} vs. frame's CRC: 0x{frame_crc:08x}"
        );
    }

    #[test]
    fn byte_to_dibits_lsb_first() {
        assert_eq!(
            vec![0b01, 0b01, 0b01, 0b11],
            byte_to_dibits(0xD5).map(Dibit::value).collect::<Vec<_>>()
        );
    }

    // Each cycle is low for half a period, then high.
    #[test]
    fn cycle_shape() {
        let samples = CaptureBuilder::new(4)
            .cycle(true, Dibit::from_bits(0b10))
            .cycle(false, Dibit::from_bits(0b01))
            .build();
        assert_eq!(
            vec![false, false, true, true, false, false, true, true],
            samples.iter().map(|s| s.ref_clock).collect::<Vec<_>>()
        );
        assert_eq!((0..8).collect::<Vec<u64>>(), samples.iter().map(|s| s.index).collect::<Vec<_>>());
        assert!(samples[..4].iter().all(|s| s.ctrl && s.data.value() == 0b10));
        assert!(samples[4..].iter().all(|s| !s.ctrl && s.data.value() == 0b01));
    }

    #[test]
    fn packet_length() {
        let builder = CaptureBuilder::new(2).packet(&[0x00; 4]);
        assert_eq!((8 + 4) * 4 * 2, builder.build().len());
    }

    #[test]
    fn clock_stall_extends_indices() {
        let samples = CaptureBuilder::new(2).idle(1).clock_stall(3).idle(1).build();
        assert_eq!(7, samples.len());
        assert_eq!(6, samples[6].index);
        assert!(!samples[2].ref_clock && !samples[4].ref_clock);
    }

    #[test]
    fn raw_samples_use_channel_map() {
        let channels = ChannelMap {
            ref_clock: 4,
            ctrl: 5,
            data0: 0,
            data1: 7,
        };
        let raw = CaptureBuilder::new(2)
            .cycle(true, Dibit::from_bits(0b11))
            .build_raw(&channels);
        assert_eq!(0b1010_0001, raw[0].levels);
        assert_eq!(0b1011_0001, raw[1].levels);
        assert_eq!(
            Dibit::from_bits(0b11),
            channels.resolve(raw[1]).data
        );
    }
}
