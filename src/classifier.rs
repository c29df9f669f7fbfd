//! Labels closed frames with diagnostics describing what was unusual about them.
//!
//! None of these are fatal: a decoder's job is to reveal bus problems, so every anomaly is reported
//! as an event next to the frame it concerns, and decoding carries on.

use crate::frame::{Frame, FrameStatus, Residual, MAX_FRAME_SIZE, MIN_FRAME_SIZE};

/// Everything the decoder can find wrong (or merely noteworthy) about a capture.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Anomaly {
    /// The control line asserted too briefly to constitute a frame, or the PHY signalled a false
    /// carrier.
    #[error("false carrier ({dibits} dibit(s) while asserted)")]
    FalseCarrier {
        /// The number of dibits consumed while the control line was asserted.
        dibits: usize,
    },
    /// The frame closed without an SFD having been seen.
    #[error("no start frame delimiter after {preamble_bytes} preamble byte(s)")]
    MissingSfd {
        /// The number of bytes received without finding the SFD.
        preamble_bytes: usize,
    },
    /// More preamble bytes preceded the SFD than the configured budget allows.
    #[error("{preamble_bytes} preamble byte(s) exceed the budget of {budget}")]
    ExcessivePreamble {
        /// The number of bytes before the SFD.
        preamble_bytes: usize,
        /// The configured budget.
        budget: usize,
    },
    /// Bytes other than the preamble pattern were seen before the SFD.
    #[error("{bytes} malformed preamble byte(s)")]
    MalformedPreamble {
        /// The number of malformed bytes.
        bytes: usize,
    },
    /// The frame ended between byte boundaries. This is a normal artifact of half-duplex timing.
    #[error("{} dribble dibit(s) after the last full byte", .residual.len())]
    DribbleBits {
        /// The leftover dibits.
        residual: Residual,
    },
    /// The capture ended while the frame was still open.
    #[error("capture ended mid-frame after {bytes} byte(s)")]
    Truncated {
        /// The number of bytes received before the capture ended.
        bytes: usize,
    },
    /// Two consecutive clock edges were implausibly close together or far apart.
    #[error("clock edge after {actual} sample(s), expected {expected}")]
    UnexpectedEdgeSpacing {
        /// The nominal clock period, in samples.
        expected: u64,
        /// The observed distance, in samples.
        actual: u64,
    },
    /// A sample's index did not strictly increase. The sample was skipped.
    #[error("sample index {index} does not follow {previous}")]
    OutOfOrderSample {
        /// The index of the last accepted sample.
        previous: u64,
        /// The offending index.
        index: u64,
    },
    /// Fewer bytes than the minimum Ethernet frame size followed the SFD.
    #[error("runt frame of {len} byte(s) (minimum is {min})", min = MIN_FRAME_SIZE)]
    RuntFrame {
        /// The number of bytes after the SFD.
        len: usize,
    },
    /// More bytes than the maximum Ethernet frame size followed the SFD.
    #[error("oversize frame of {len} byte(s) (maximum is {max})", max = MAX_FRAME_SIZE)]
    OversizeFrame {
        /// The number of bytes after the SFD.
        len: usize,
    },
    /// CRS_DV dropped on a carrier sense edge while data was still valid, i.e. the PHY lost
    /// carrier before it finished delivering the frame.
    #[error("carrier sense dropped {count} time(s) while data was valid")]
    CarrierSenseToggle {
        /// The number of carrier sense drops.
        count: u32,
    },
}

/// How much attention an [Anomaly] deserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Legal but noteworthy.
    Info,
    /// Something went wrong on the bus or in the capture.
    Warning,
}

impl Anomaly {
    /// Returns the severity of this anomaly.
    pub const fn severity(&self) -> Severity {
        match self {
            Anomaly::DribbleBits { .. } | Anomaly::CarrierSenseToggle { .. } => Severity::Info,
            _ => Severity::Warning,
        }
    }

    /// Returns true for anomalies that concern the capture (clock timing, sample order) rather
    /// than the bus traffic.
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Anomaly::UnexpectedEdgeSpacing { .. } | Anomaly::OutOfOrderSample { .. }
        )
    }

    /// The level to log this anomaly at: problems with the capture itself are warnings, problems
    /// on the bus are informational, and legal oddities are only logged when debugging.
    pub const fn log_level(&self) -> log::Level {
        if self.is_structural() {
            return log::Level::Warn;
        }
        match self.severity() {
            Severity::Warning => log::Level::Info,
            Severity::Info => log::Level::Debug,
        }
    }
}

/// Attaches secondary diagnostics to closed frames.
#[derive(Debug, Clone, Default)]
pub struct ErrorClassifier {
    preamble_budget: Option<usize>,
}

impl ErrorClassifier {
    /// Constructs a new [ErrorClassifier]. A `preamble_budget` of `None` tolerates any number of
    /// bytes before the SFD.
    pub const fn new(preamble_budget: Option<usize>) -> ErrorClassifier {
        ErrorClassifier { preamble_budget }
    }

    /// Classifies a closed frame, appending its diagnostics to [Frame::diagnostics] and returning
    /// the newly added ones. The frame's bytes and status are left untouched.
    pub fn classify(&self, frame: &mut Frame) -> Vec<Anomaly> {
        let mut found = Vec::new();
        match frame.status {
            FrameStatus::InProgress => return found,
            FrameStatus::FalseCarrier => {
                // Nothing else about a false carrier is worth reporting.
                found.push(Anomaly::FalseCarrier {
                    dibits: frame.dibit_count,
                });
                frame.diagnostics.extend_from_slice(&found);
                return found;
            }
            FrameStatus::CompleteUnaligned(residual) => {
                found.push(Anomaly::DribbleBits { residual });
            }
            FrameStatus::Truncated => found.push(Anomaly::Truncated {
                bytes: frame.bytes.len(),
            }),
            FrameStatus::CompleteAligned => {}
        }

        match frame.sfd_offset {
            None => found.push(Anomaly::MissingSfd {
                preamble_bytes: frame.preamble.bytes,
            }),
            Some(_) => {
                if let Some(budget) = self.preamble_budget {
                    if frame.preamble.bytes > budget {
                        found.push(Anomaly::ExcessivePreamble {
                            preamble_bytes: frame.preamble.bytes,
                            budget,
                        });
                    }
                }
                // The length of a truncated frame says nothing about what was sent.
                if frame.status.is_complete() {
                    let len = frame.payload().len();
                    if len < MIN_FRAME_SIZE {
                        found.push(Anomaly::RuntFrame { len });
                    } else if len > MAX_FRAME_SIZE {
                        found.push(Anomaly::OversizeFrame { len });
                    }
                }
            }
        }
        if frame.preamble.malformed > 0 {
            found.push(Anomaly::MalformedPreamble {
                bytes: frame.preamble.malformed,
            });
        }
        if frame.carrier_toggles > 0 {
            found.push(Anomaly::CarrierSenseToggle {
                count: frame.carrier_toggles,
            });
        }

        frame.diagnostics.extend_from_slice(&found);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{PREAMBLE_AND_SFD, PREAMBLE_BYTE};
    use crate::sample::Dibit;

    fn closed_frame(payload_len: usize, status: FrameStatus) -> Frame {
        let mut frame = Frame::new(0, 0);
        frame.bytes.extend_from_slice(&PREAMBLE_AND_SFD);
        frame.bytes.resize(PREAMBLE_AND_SFD.len() + payload_len, 0x42);
        frame.sfd_offset = Some(PREAMBLE_AND_SFD.len() - 1);
        frame.preamble.bytes = PREAMBLE_AND_SFD.len() - 1;
        frame.dibit_count = frame.bytes.len() * 4;
        frame.status = status;
        frame
    }

    #[test]
    fn well_formed_frame_has_no_diagnostics() {
        let mut frame = closed_frame(MIN_FRAME_SIZE, FrameStatus::CompleteAligned);
        assert_eq!(Vec::<Anomaly>::new(), ErrorClassifier::new(None).classify(&mut frame));
        assert!(frame.diagnostics.is_empty());
    }

    #[test]
    fn in_progress_frames_are_not_classified() {
        let mut frame = closed_frame(10, FrameStatus::InProgress);
        assert!(ErrorClassifier::default().classify(&mut frame).is_empty());
    }

    #[test]
    fn runt_and_oversize_frames() {
        let classifier = ErrorClassifier::default();
        let mut runt = closed_frame(MIN_FRAME_SIZE - 1, FrameStatus::CompleteAligned);
        assert_eq!(
            vec![Anomaly::RuntFrame {
                len: MIN_FRAME_SIZE - 1
            }],
            classifier.classify(&mut runt)
        );
        let mut oversize = closed_frame(MAX_FRAME_SIZE + 1, FrameStatus::CompleteAligned);
        assert_eq!(
            vec![Anomaly::OversizeFrame {
                len: MAX_FRAME_SIZE + 1
            }],
            classifier.classify(&mut oversize)
        );
    }

    // Dribble bits are informational, and recorded alongside the frame.
    #[test]
    fn dribble_bits() {
        let residual = Residual::new(&[Dibit::from_bits(0b01), Dibit::from_bits(0b01)]).unwrap();
        let mut frame = closed_frame(MIN_FRAME_SIZE, FrameStatus::CompleteUnaligned(residual));
        let found = ErrorClassifier::default().classify(&mut frame);
        assert_eq!(vec![Anomaly::DribbleBits { residual }], found);
        assert_eq!(found, frame.diagnostics);
        assert_eq!(Severity::Info, found[0].severity());
    }

    // A truncated frame is not a runt, even though it's short.
    #[test]
    fn truncated_frames_skip_length_checks() {
        let mut frame = closed_frame(3, FrameStatus::Truncated);
        assert_eq!(
            vec![Anomaly::Truncated { bytes: 11 }],
            ErrorClassifier::default().classify(&mut frame)
        );
    }

    #[test]
    fn missing_sfd_and_malformed_preamble() {
        let mut frame = Frame::new(3, 100);
        frame.bytes = vec![PREAMBLE_BYTE, 0x12, PREAMBLE_BYTE];
        frame.preamble.bytes = 3;
        frame.preamble.malformed = 1;
        frame.dibit_count = 12;
        frame.status = FrameStatus::CompleteAligned;
        assert_eq!(
            vec![
                Anomaly::MissingSfd { preamble_bytes: 3 },
                Anomaly::MalformedPreamble { bytes: 1 }
            ],
            ErrorClassifier::default().classify(&mut frame)
        );
    }

    #[test]
    fn preamble_budget() {
        let mut frame = closed_frame(MIN_FRAME_SIZE, FrameStatus::CompleteAligned);
        assert!(ErrorClassifier::new(Some(7)).classify(&mut frame).is_empty());
        assert_eq!(
            vec![Anomaly::ExcessivePreamble {
                preamble_bytes: 7,
                budget: 6
            }],
            ErrorClassifier::new(Some(6)).classify(&mut frame)
        );
    }

    // A false carrier only ever gets a single marker.
    #[test]
    fn false_carrier() {
        let mut frame = Frame::new(0, 10);
        frame.dibit_count = 1;
        frame.status = FrameStatus::FalseCarrier;
        assert_eq!(
            vec![Anomaly::FalseCarrier { dibits: 1 }],
            ErrorClassifier::default().classify(&mut frame)
        );
    }

    #[test]
    fn carrier_sense_toggles() {
        let mut frame = closed_frame(MIN_FRAME_SIZE, FrameStatus::CompleteAligned);
        frame.carrier_toggles = 2;
        assert_eq!(
            vec![Anomaly::CarrierSenseToggle { count: 2 }],
            ErrorClassifier::default().classify(&mut frame)
        );
    }

    #[test]
    fn anomaly_messages() {
        assert_eq!(
            "runt frame of 46 byte(s) (minimum is 64)",
            Anomaly::RuntFrame { len: 46 }.to_string()
        );
        assert_eq!(
            "clock edge after 9 sample(s), expected 4",
            Anomaly::UnexpectedEdgeSpacing {
                expected: 4,
                actual: 9
            }
            .to_string()
        );
        assert!(Anomaly::OutOfOrderSample {
            previous: 2,
            index: 2
        }
        .is_structural());
    }

    #[test]
    fn log_levels() {
        let out_of_order = Anomaly::OutOfOrderSample {
            previous: 2,
            index: 2,
        };
        let spacing = Anomaly::UnexpectedEdgeSpacing {
            expected: 4,
            actual: 9,
        };
        assert_eq!(log::Level::Warn, out_of_order.log_level());
        assert_eq!(log::Level::Warn, spacing.log_level());
        assert_eq!(log::Level::Info, Anomaly::RuntFrame { len: 46 }.log_level());
        assert!(!Anomaly::RuntFrame { len: 46 }.is_structural());
        assert_eq!(
            log::Level::Debug,
            Anomaly::CarrierSenseToggle { count: 1 }.log_level()
        );
    }
}
