//! Construction-time configuration of a [crate::Decoder]: which capture channels carry which RMII
//! signal, how the control line is encoded, and the timing model used to sanity-check the clock.

use crate::sample::{Dibit, RawSample, Sample};

/// The RMII reference clock frequency, used unless overridden with
/// [DecoderConfig::with_ref_clock_hz].
pub const DEFAULT_REF_CLOCK_HZ: u64 = 50_000_000;

/// The default allowed deviation of a clock period from the nominal period, in percent.
pub const DEFAULT_SPACING_TOLERANCE_PERCENT: u32 = 25;

/// The number of channels a [RawSample] word can carry.
pub const MAX_CHANNELS: u8 = 32;

/// Errors returned when a [DecoderConfig] cannot describe a decodable capture.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A channel index does not fit in a [RawSample] word.
    #[error("channel {0} is out of range (captures carry at most 32 channels)")]
    ChannelOutOfRange(u8),
    /// Two logical signals were mapped onto the same capture channel.
    #[error("channel {0} is mapped to more than one signal")]
    DuplicateChannel(u8),
    /// The reference clock frequency was configured as zero.
    #[error("the reference clock frequency must be non-zero")]
    ZeroRefClock,
    /// The configured sample rate cannot resolve both phases of the reference clock.
    #[error(
        "a sample rate of {samplerate_hz} Hz cannot resolve a {ref_clock_hz} Hz reference clock \
         (at least two samples per period are required)"
    )]
    Undersampled {
        /// The configured sample rate.
        samplerate_hz: u64,
        /// The configured reference clock frequency.
        ref_clock_hz: u64,
    },
    /// The spacing tolerance is not a percentage in `0..=100`.
    #[error("invalid clock spacing tolerance of {0}% (must be within 0..=100)")]
    InvalidTolerance(u32),
}
pub type Result<T> = core::result::Result<T, ConfigError>;

/// Maps the logical RMII signals onto bit positions of a [RawSample] word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMap {
    /// REF_CLK.
    pub ref_clock: u8,
    /// CRS_DV (receive side) or TX_EN (transmit side).
    pub ctrl: u8,
    /// RXD0 or TXD0.
    pub data0: u8,
    /// RXD1 or TXD1.
    pub data1: u8,
}

impl Default for ChannelMap {
    fn default() -> Self {
        // REF_CLK, CRS_DV/TX_EN, D1, D0, the order in which logic analyzer probes are usually
        // attached to an RMII header.
        ChannelMap {
            ref_clock: 0,
            ctrl: 1,
            data1: 2,
            data0: 3,
        }
    }
}

impl ChannelMap {
    /// Resolves a raw capture word into the four logical signals.
    pub fn resolve(&self, raw: RawSample) -> Sample {
        Sample {
            index: raw.index,
            ref_clock: raw.channel(self.ref_clock),
            ctrl: raw.channel(self.ctrl),
            data: Dibit::from_lines(raw.channel(self.data1), raw.channel(self.data0)),
        }
    }

    fn validate(&self) -> Result<()> {
        let channels = [self.ref_clock, self.ctrl, self.data0, self.data1];
        for (idx, &channel) in channels.iter().enumerate() {
            if channel >= MAX_CHANNELS {
                return Err(ConfigError::ChannelOutOfRange(channel));
            }
            if channels[..idx].contains(&channel) {
                return Err(ConfigError::DuplicateChannel(channel));
            }
        }
        Ok(())
    }
}

/// How the control line should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlEncoding {
    /// The control line is a plain data-valid level, as with TX_EN on the transmit side. A frame
    /// ends on the first clock edge that samples it low.
    #[default]
    TxEn,
    /// The control line is the receive side's multiplexed CRS_DV. Towards the end of a frame the
    /// PHY may drop carrier sense before its FIFO has drained, toggling the line at the nibble
    /// rate: it then reads as carrier sense on the first dibit of each nibble and as data valid on
    /// the second.
    CrsDv,
}

/// Which reference clock transition marks the instant at which the other lines are sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgePolarity {
    /// Low to high.
    #[default]
    Rising,
    /// High to low.
    Falling,
}

/// A configuration struct for use with the [crate::Decoder] constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// The channel assignment used by [crate::Decoder::push_raw].
    pub channels: ChannelMap,
    /// The meaning of the control line.
    pub control: ControlEncoding,
    /// The sampling edge of the reference clock.
    pub edge: EdgePolarity,
    /// The capture's sample rate, if known. When set, the nominal clock period is derived from it
    /// rather than learned from the first two clock edges.
    pub samplerate_hz: Option<u64>,
    /// The reference clock frequency.
    pub ref_clock_hz: u64,
    /// How far (in percent of the nominal period) edge-to-edge spacing may deviate before an
    /// [crate::Anomaly::UnexpectedEdgeSpacing] is reported.
    pub spacing_tolerance_percent: u32,
    /// The number of bytes tolerated before the SFD before an
    /// [crate::Anomaly::ExcessivePreamble] is reported. `None` tolerates any preamble length.
    pub preamble_budget: Option<usize>,
    /// Whether [crate::EventKind::ClockEdge] events are emitted.
    pub report_clock_edges: bool,
    /// Whether [crate::EventKind::SymbolDecoded] events are emitted.
    pub report_symbols: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig {
            channels: ChannelMap::default(),
            control: ControlEncoding::default(),
            edge: EdgePolarity::default(),
            samplerate_hz: None,
            ref_clock_hz: DEFAULT_REF_CLOCK_HZ,
            spacing_tolerance_percent: DEFAULT_SPACING_TOLERANCE_PERCENT,
            preamble_budget: None,
            report_clock_edges: true,
            report_symbols: true,
        }
    }
}

impl DecoderConfig {
    /// Constructs a default configuration: TX_EN-style control line, rising edge sampling.
    pub fn new() -> DecoderConfig {
        DecoderConfig::default()
    }

    /// A configuration for captures of the PHY-to-MAC (receive) side: CRS_DV sampled on the
    /// rising edge.
    pub fn receive() -> DecoderConfig {
        DecoderConfig::default().with_control(ControlEncoding::CrsDv)
    }

    /// A configuration for captures of the MAC-to-PHY (transmit) side: TX_EN sampled on the
    /// falling edge, halfway through the period in which the MAC drives the lines.
    pub fn transmit() -> DecoderConfig {
        DecoderConfig::default()
            .with_control(ControlEncoding::TxEn)
            .with_edge(EdgePolarity::Falling)
    }

    /// Sets the channel assignment.
    pub fn with_channels(mut self, channels: ChannelMap) -> Self {
        self.channels = channels;
        self
    }

    /// Sets the control line encoding.
    pub fn with_control(mut self, control: ControlEncoding) -> Self {
        self.control = control;
        self
    }

    /// Sets the sampling edge.
    pub fn with_edge(mut self, edge: EdgePolarity) -> Self {
        self.edge = edge;
        self
    }

    /// Sets the capture sample rate.
    pub fn with_samplerate_hz(mut self, samplerate_hz: u64) -> Self {
        self.samplerate_hz = Some(samplerate_hz);
        self
    }

    /// Sets the reference clock frequency.
    pub fn with_ref_clock_hz(mut self, ref_clock_hz: u64) -> Self {
        self.ref_clock_hz = ref_clock_hz;
        self
    }

    /// Sets the clock spacing tolerance.
    pub fn with_spacing_tolerance_percent(mut self, percent: u32) -> Self {
        self.spacing_tolerance_percent = percent;
        self
    }

    /// Sets the preamble budget.
    pub fn with_preamble_budget(mut self, budget: Option<usize>) -> Self {
        self.preamble_budget = budget;
        self
    }

    /// Enables or disables [crate::EventKind::ClockEdge] and [crate::EventKind::SymbolDecoded]
    /// events.
    pub fn with_low_level_events(mut self, clock_edges: bool, symbols: bool) -> Self {
        self.report_clock_edges = clock_edges;
        self.report_symbols = symbols;
        self
    }

    /// Checks that the configuration describes a decodable capture.
    pub fn validate(&self) -> Result<()> {
        self.channels.validate()?;
        if self.ref_clock_hz == 0 {
            return Err(ConfigError::ZeroRefClock);
        }
        if let Some(samplerate_hz) = self.samplerate_hz {
            if samplerate_hz / self.ref_clock_hz < 2 {
                return Err(ConfigError::Undersampled {
                    samplerate_hz,
                    ref_clock_hz: self.ref_clock_hz,
                });
            }
        }
        if self.spacing_tolerance_percent > 100 {
            return Err(ConfigError::InvalidTolerance(self.spacing_tolerance_percent));
        }
        Ok(())
    }

    /// The nominal number of samples per reference clock period, if the sample rate is known.
    pub fn nominal_period(&self) -> Option<u64> {
        match self.samplerate_hz {
            Some(samplerate_hz) if self.ref_clock_hz > 0 => Some(samplerate_hz / self.ref_clock_hz),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(Ok(()), DecoderConfig::default().validate());
        assert_eq!(Ok(()), DecoderConfig::receive().validate());
        assert_eq!(Ok(()), DecoderConfig::transmit().validate());
    }

    #[test]
    fn presets() {
        assert_eq!(ControlEncoding::CrsDv, DecoderConfig::receive().control);
        assert_eq!(EdgePolarity::Rising, DecoderConfig::receive().edge);
        assert_eq!(ControlEncoding::TxEn, DecoderConfig::transmit().control);
        assert_eq!(EdgePolarity::Falling, DecoderConfig::transmit().edge);
    }

    #[test]
    fn rejects_duplicate_channels() {
        let config = DecoderConfig::new().with_channels(ChannelMap {
            ref_clock: 0,
            ctrl: 1,
            data0: 2,
            data1: 1,
        });
        assert_eq!(Err(ConfigError::DuplicateChannel(1)), config.validate());
    }

    #[test]
    fn rejects_out_of_range_channels() {
        let config = DecoderConfig::new().with_channels(ChannelMap {
            ref_clock: 32,
            ..ChannelMap::default()
        });
        assert_eq!(Err(ConfigError::ChannelOutOfRange(32)), config.validate());
    }

    // A 50 MHz clock needs at least 100 MS/s to see both of its phases.
    #[test]
    fn rejects_undersampled_captures() {
        let config = DecoderConfig::new().with_samplerate_hz(80_000_000);
        assert_eq!(
            Err(ConfigError::Undersampled {
                samplerate_hz: 80_000_000,
                ref_clock_hz: DEFAULT_REF_CLOCK_HZ
            }),
            config.validate()
        );
        let config = DecoderConfig::new().with_samplerate_hz(200_000_000);
        assert_eq!(Ok(()), config.validate());
        assert_eq!(Some(4), config.nominal_period());
    }

    #[test]
    fn rejects_zero_clock_and_bad_tolerance() {
        assert_eq!(
            Err(ConfigError::ZeroRefClock),
            DecoderConfig::new().with_ref_clock_hz(0).validate()
        );
        assert_eq!(
            Err(ConfigError::InvalidTolerance(101)),
            DecoderConfig::new()
                .with_spacing_tolerance_percent(101)
                .validate()
        );
    }

    // The default mapping puts D1 on channel 2 and D0 on channel 3.
    #[test]
    fn default_channel_map_resolves_raw_samples() {
        let sample = ChannelMap::default().resolve(RawSample {
            index: 3,
            levels: 0b1011,
        });
        assert_eq!(3, sample.index);
        assert!(sample.ref_clock);
        assert!(sample.ctrl);
        assert_eq!(Dibit::from_bits(0b01), sample.data);
    }

    #[test]
    fn config_error_messages() {
        assert_eq!(
            "channel 3 is mapped to more than one signal",
            ConfigError::DuplicateChannel(3).to_string()
        );
    }
}
