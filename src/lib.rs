//! Decodes RMII (Reduced Media Independent Interface) traffic from logic analyzer captures.
//!
//! RMII connects an Ethernet MAC to its PHY using a 50 MHz reference clock, a control line (TX_EN
//! on the transmit side, CRS_DV on the receive side) and two data lines carrying one dibit per
//! clock edge, least significant dibit of each byte first. This crate reconstructs Ethernet frames
//! from sampled line levels:
//!
//! - [edge::EdgeDetector] finds the reference clock edges.
//! - [symbol::SymbolExtractor] reads the control and data lines at each edge.
//! - [FrameAssembler] packs dibits into bytes and infers frame boundaries from the control line.
//! - [ErrorClassifier] labels each closed frame with its [Anomaly]s.
//!
//! [Decoder] runs these stages over a stream of samples and reports [Event]s to an [EventSink].
//!
//! ```
//! use rmii_decode::example_data::{CaptureBuilder, EXAMPLE_FRAME_ARP_REQUEST};
//! use rmii_decode::{Decoder, DecoderConfig, FrameStatus};
//!
//! let samples = CaptureBuilder::new(4)
//!     .idle(2)
//!     .packet(&EXAMPLE_FRAME_ARP_REQUEST)
//!     .idle(2)
//!     .build();
//! let mut decoder = Decoder::new(DecoderConfig::new()).unwrap();
//! let frames: Vec<_> = decoder
//!     .decode(samples)
//!     .into_iter()
//!     .filter_map(|event| event.frame().cloned())
//!     .collect();
//! assert_eq!(FrameStatus::CompleteAligned, frames[0].status);
//! assert_eq!(&EXAMPLE_FRAME_ARP_REQUEST[..], frames[0].payload());
//! ```

pub mod assembler;
pub mod classifier;
pub mod config;
pub mod debug_util;
pub mod decoder;
pub mod edge;
pub mod event;
pub mod example_data;
pub mod frame;
pub mod sample;
pub mod symbol;

pub use assembler::{AssemblerState, FrameAssembler};
pub use classifier::{Anomaly, ErrorClassifier, Severity};
pub use config::{ChannelMap, ConfigError, ControlEncoding, DecoderConfig, EdgePolarity};
pub use decoder::{DecodeStats, Decoder};
pub use event::{Event, EventKind, EventSink};
pub use frame::{Frame, FrameStatus, Residual};
pub use sample::{Dibit, RawSample, Sample};
