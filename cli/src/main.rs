//! Decodes RMII traffic from a raw logic analyzer capture and prints one line per event.
//!
//! The capture is a flat binary file holding one little-endian word per sample, with each bit of
//! the word carrying one logic channel (the format most logic analyzer tools export as "raw
//! binary").
//!
//! Usage:
//!   rmii-decode capture.bin --unitsize 1 --samplerate 200M --clk 0 --ctrl 1 --d1 2 --d0 3
//!   rmii-decode --demo --edges --symbols
//!
//! Log output goes to stderr and is controlled by `RUST_LOG`, or by `-v` when it is unset.

use anyhow::{bail, Context};
use byteorder::{LittleEndian, ReadBytesExt};
use clap::{Parser, ValueEnum};
use log::{info, warn};
use rmii_decode::config::{DEFAULT_REF_CLOCK_HZ, DEFAULT_SPACING_TOLERANCE_PERCENT};
use rmii_decode::debug_util::HexRows;
use rmii_decode::example_data::{CaptureBuilder, EXAMPLE_FRAME_ARP_REQUEST};
use rmii_decode::sample::{Dibit, RawSample};
use rmii_decode::{
    ChannelMap, ControlEncoding, DecodeStats, Decoder, DecoderConfig, EdgePolarity, Event,
    EventKind, EventSink,
};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Raw capture file
    #[arg(required_unless_present = "demo")]
    input: Option<PathBuf>,

    /// Bytes per sample word (1, 2 or 4)
    #[arg(long, default_value_t = 1, value_parser = parse_unitsize)]
    unitsize: usize,

    /// REF_CLK channel
    #[arg(long, default_value_t = 0)]
    clk: u8,

    /// CRS_DV or TX_EN channel
    #[arg(long, default_value_t = 1)]
    ctrl: u8,

    /// RXD1 or TXD1 channel
    #[arg(long, default_value_t = 2)]
    d1: u8,

    /// RXD0 or TXD0 channel
    #[arg(long, default_value_t = 3)]
    d0: u8,

    /// How the control line is encoded
    #[arg(long, value_enum, default_value_t = Mode::TxEn)]
    mode: Mode,

    /// Which reference clock edge to sample on
    #[arg(long, value_enum, default_value_t = Edge::Rising)]
    edge: Edge,

    /// Capture sample rate in Hz (accepts k, M and G suffixes)
    #[arg(long, value_parser = parse_frequency)]
    samplerate: Option<u64>,

    /// Reference clock frequency in Hz (accepts k, M and G suffixes)
    #[arg(long, default_value_t = DEFAULT_REF_CLOCK_HZ, value_parser = parse_frequency)]
    ref_clock: u64,

    /// Maximum number of bytes tolerated before the SFD
    #[arg(long)]
    preamble_budget: Option<usize>,

    /// Allowed clock period deviation, in percent
    #[arg(long, default_value_t = DEFAULT_SPACING_TOLERANCE_PERCENT)]
    tolerance: u32,

    /// Print an event for every clock edge
    #[arg(long)]
    edges: bool,

    /// Print the lines sampled at every clock edge
    #[arg(long)]
    symbols: bool,

    /// Print the bytes of each frame after its end event
    #[arg(long)]
    hex: bool,

    /// Decode a built-in synthetic capture instead of a file
    #[arg(long, conflicts_with = "input")]
    demo: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    /// Plain data valid (TX_EN, or a PHY with CRS_DV in non-multiplexed mode)
    TxEn,
    /// Receive-side CRS_DV multiplexing carrier sense and data valid
    CrsDv,
}

impl From<Mode> for ControlEncoding {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::TxEn => ControlEncoding::TxEn,
            Mode::CrsDv => ControlEncoding::CrsDv,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Edge {
    Rising,
    Falling,
}

impl From<Edge> for EdgePolarity {
    fn from(edge: Edge) -> Self {
        match edge {
            Edge::Rising => EdgePolarity::Rising,
            Edge::Falling => EdgePolarity::Falling,
        }
    }
}

fn parse_unitsize(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(size @ (1 | 2 | 4)) => Ok(size),
        _ => Err(format!("unsupported unit size {s:?} (must be 1, 2 or 4)")),
    }
}

fn parse_frequency(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let (digits, multiplier) = match s.char_indices().last() {
        Some((idx, 'k' | 'K')) => (&s[..idx], 1_000),
        Some((idx, 'M')) => (&s[..idx], 1_000_000),
        Some((idx, 'G')) => (&s[..idx], 1_000_000_000),
        _ => (s, 1),
    };
    digits
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|value| value.checked_mul(multiplier))
        .ok_or_else(|| format!("invalid frequency {s:?}"))
}

impl Args {
    fn channels(&self) -> ChannelMap {
        ChannelMap {
            ref_clock: self.clk,
            ctrl: self.ctrl,
            data0: self.d0,
            data1: self.d1,
        }
    }

    fn decoder_config(&self) -> DecoderConfig {
        let mut config = DecoderConfig::new()
            .with_channels(self.channels())
            .with_control(self.mode.into())
            .with_edge(self.edge.into())
            .with_ref_clock_hz(self.ref_clock)
            .with_spacing_tolerance_percent(self.tolerance)
            .with_preamble_budget(self.preamble_budget)
            .with_low_level_events(self.edges, self.symbols);
        if let Some(samplerate) = self.samplerate {
            config = config.with_samplerate_hz(samplerate);
        }
        config
    }
}

/// Reads fixed-size little-endian sample words.
struct CaptureReader<R> {
    reader: R,
    unitsize: usize,
    index: u64,
}

impl<R: Read> CaptureReader<R> {
    fn new(reader: R, unitsize: usize) -> Self {
        Self {
            reader,
            unitsize,
            index: 0,
        }
    }

    /// Returns the next sample, or `None` at the end of the input. A trailing partial word is
    /// ignored.
    fn next_sample(&mut self) -> io::Result<Option<RawSample>> {
        let word = match self.unitsize {
            1 => self.reader.read_u8().map(u32::from),
            2 => self.reader.read_u16::<LittleEndian>().map(u32::from),
            _ => self.reader.read_u32::<LittleEndian>(),
        };
        let levels = match word {
            Ok(levels) => levels,
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err),
        };
        let sample = RawSample {
            index: self.index,
            levels,
        };
        self.index += 1;
        Ok(Some(sample))
    }
}

/// Writes one line per event. Write errors are kept until [TextEmitter::finish] since sinks
/// can't fail.
struct TextEmitter<W> {
    out: W,
    hex: bool,
    error: Option<io::Error>,
}

impl<W: Write> TextEmitter<W> {
    fn new(out: W, hex: bool) -> Self {
        Self {
            out,
            hex,
            error: None,
        }
    }

    fn write_event(&mut self, event: &Event) -> io::Result<()> {
        writeln!(self.out, "{event}")?;
        if let EventKind::FrameEnd { frame } = &event.kind {
            if self.hex && !frame.bytes.is_empty() {
                writeln!(self.out, "{}", HexRows(&frame.bytes))?;
            }
        }
        Ok(())
    }

    fn finish(mut self, stats: &DecodeStats) -> io::Result<()> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        writeln!(
            self.out,
            "{} sample(s), {} clock edge(s), {} frame(s) ({} false carrier, {} truncated), {} \
             anomalie(s)",
            stats.samples,
            stats.clock_edges,
            stats.frames,
            stats.false_carriers,
            stats.truncated,
            stats.anomalies,
        )?;
        self.out.flush()
    }
}

impl<W: Write> EventSink for TextEmitter<W> {
    fn on_event(&mut self, event: Event) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = self.write_event(&event) {
            self.error = Some(err);
        }
    }
}

/// A short capture exercising the interesting cases: a clean frame, a false carrier, a frame with
/// dribble dibits, and a frame cut off by the end of the capture.
fn demo_capture(channels: &ChannelMap) -> Vec<RawSample> {
    let last = EXAMPLE_FRAME_ARP_REQUEST[EXAMPLE_FRAME_ARP_REQUEST.len() - 1];
    CaptureBuilder::new(4)
        .idle(8)
        .packet(&EXAMPLE_FRAME_ARP_REQUEST)
        .idle(12)
        .cycle(true, Dibit::from_bits(0b10))
        .idle(12)
        .packet(&EXAMPLE_FRAME_ARP_REQUEST[..EXAMPLE_FRAME_ARP_REQUEST.len() - 1])
        .dibits(true, [Dibit::from_bits(last), Dibit::from_bits(last >> 2)])
        .idle(12)
        .packet(&EXAMPLE_FRAME_ARP_REQUEST[..20])
        .build_raw(channels)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    let config = args.decoder_config();
    let width = args.unitsize * 8;
    for channel in [args.clk, args.ctrl, args.d0, args.d1] {
        if usize::from(channel) >= width {
            bail!("channel {channel} does not fit in a {}-byte sample word", args.unitsize);
        }
    }
    let mut decoder = Decoder::new(config).context("invalid decoder configuration")?;
    let mut emitter = TextEmitter::new(BufWriter::new(io::stdout().lock()), args.hex);

    if args.demo {
        info!("Decoding the built-in demo capture");
        for sample in demo_capture(&args.channels()) {
            decoder.push_raw(sample, &mut emitter);
        }
    } else if let Some(path) = &args.input {
        info!("Decoding {}", path.display());
        let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        let mut reader = CaptureReader::new(BufReader::new(file), args.unitsize);
        while let Some(sample) = reader
            .next_sample()
            .with_context(|| format!("failed to read {}", path.display()))?
        {
            decoder.push_raw(sample, &mut emitter);
        }
        if reader.index == 0 {
            warn!("{} contains no samples", path.display());
        }
    }
    decoder.finish(&mut emitter);

    emitter
        .finish(&decoder.stats())
        .context("failed to write decoded events")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequencies() {
        assert_eq!(Ok(200_000_000), parse_frequency("200M"));
        assert_eq!(Ok(50_000), parse_frequency("50k"));
        assert_eq!(Ok(1234), parse_frequency("1234"));
        assert!(parse_frequency("fast").is_err());
        assert!(parse_frequency("M").is_err());
    }

    #[test]
    fn unit_sizes() {
        assert_eq!(Ok(2), parse_unitsize("2"));
        assert!(parse_unitsize("3").is_err());
    }

    // Words are little-endian, and a trailing partial word is dropped.
    #[test]
    fn capture_reader() {
        let data: &[u8] = &[0x01, 0x02, 0x03, 0x04, 0x05];
        let mut reader = CaptureReader::new(data, 2);
        let mut words = Vec::new();
        while let Some(sample) = reader.next_sample().unwrap() {
            words.push((sample.index, sample.levels));
        }
        assert_eq!(vec![(0, 0x0201), (1, 0x0403)], words);
    }

    #[test]
    fn demo_capture_decodes() {
        let channels = ChannelMap::default();
        let mut decoder = Decoder::new(DecoderConfig::new().with_channels(channels)).unwrap();
        let mut events = Vec::new();
        for sample in demo_capture(&channels) {
            decoder.push_raw(sample, &mut events);
        }
        decoder.finish(&mut events);
        let stats = decoder.stats();
        assert_eq!(4, stats.frames);
        assert_eq!(1, stats.false_carriers);
        assert_eq!(1, stats.truncated);
    }

    #[test]
    fn emitter_writes_lines_and_stats() {
        let mut out = Vec::new();
        let mut emitter = TextEmitter::new(&mut out, false);
        emitter.on_event(Event::new(3, 3, EventKind::FrameStart { frame_id: 0 }));
        emitter.finish(&DecodeStats::default()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(2, lines.len());
        assert!(lines[0].ends_with("start #0"));
        assert!(lines[1].starts_with("0 sample(s)"));
    }
}
