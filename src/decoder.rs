//! Ties the decoding stages together: samples go in, [Event]s come out.
//!
//! The pipeline is strictly sequential. Every sample passes through the edge detector, every clock
//! edge yields a symbol, and every symbol is handed to the frame assembler. Closed frames are
//! labelled by the error classifier before they are reported.

use crate::assembler::{AssemblerOutput, FrameAssembler};
use crate::classifier::{Anomaly, ErrorClassifier};
use crate::config::{self, DecoderConfig};
use crate::edge::{EdgeDetector, SpacingMonitor};
use crate::event::{Event, EventKind, EventSink};
use crate::frame::FrameStatus;
use crate::sample::{RawSample, Sample};
use crate::symbol::SymbolExtractor;
use log::{debug, log};
use std::collections::VecDeque;

/// Running totals of what a [Decoder] has seen since it was constructed or last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Samples accepted (out of order samples are not counted).
    pub samples: u64,
    /// Active clock edges.
    pub clock_edges: u64,
    /// Closed frames, including false carriers.
    pub frames: u64,
    /// Frames closed as [FrameStatus::FalseCarrier].
    pub false_carriers: u64,
    /// Frames closed as [FrameStatus::Truncated].
    pub truncated: u64,
    /// Error markers emitted.
    pub anomalies: u64,
}

/// A streaming RMII decoder.
///
/// Feed it samples in capture order with [Decoder::push], then call [Decoder::finish] once the
/// capture ends so that a frame still open at that point is reported as truncated. Events are
/// handed to an [EventSink] as soon as they are known; the decoder never looks ahead.
///
/// Frame ids and sample indices keep increasing across [Decoder::finish]. Use [Decoder::reset] to
/// start over with an unrelated capture.
#[derive(Debug, Clone)]
pub struct Decoder {
    config: DecoderConfig,
    edges: EdgeDetector,
    spacing: SpacingMonitor,
    extractor: SymbolExtractor,
    assembler: FrameAssembler,
    classifier: ErrorClassifier,
    last_index: Option<u64>,
    stats: DecodeStats,
}

impl Decoder {
    /// Constructs a new [Decoder], or fails if the configuration cannot describe a decodable
    /// capture.
    pub fn new(config: DecoderConfig) -> config::Result<Decoder> {
        config.validate()?;
        debug!("Decoder configured: {config:?}");
        Ok(Decoder {
            edges: EdgeDetector::new(config.edge),
            spacing: SpacingMonitor::new(
                config.nominal_period(),
                config.spacing_tolerance_percent,
            ),
            extractor: SymbolExtractor,
            assembler: FrameAssembler::new(config.control),
            classifier: ErrorClassifier::new(config.preamble_budget),
            last_index: None,
            stats: DecodeStats::default(),
            config,
        })
    }

    /// The configuration the decoder was constructed with.
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// The totals accumulated so far.
    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    /// Processes the next sample.
    ///
    /// A sample whose index does not strictly increase is skipped, and reported as an
    /// [Anomaly::OutOfOrderSample].
    pub fn push<S>(&mut self, sample: Sample, sink: &mut S)
    where
        S: EventSink + ?Sized,
    {
        if let Some(previous) = self.last_index {
            if sample.index <= previous {
                let anomaly = Anomaly::OutOfOrderSample {
                    previous,
                    index: sample.index,
                };
                self.report(sample.index, sample.index, None, anomaly, sink);
                return;
            }
        }
        self.last_index = Some(sample.index);
        self.stats.samples += 1;

        let Some(edge) = self.edges.feed(&sample) else {
            return;
        };
        self.stats.clock_edges += 1;
        if self.config.report_clock_edges {
            sink.on_event(Event::new(
                edge.sample_index,
                edge.sample_index,
                EventKind::ClockEdge,
            ));
        }

        if let Some(irregular) = self.spacing.check(&edge) {
            let frame_id = self.assembler.open_frame().map(|frame| frame.id);
            let anomaly = Anomaly::UnexpectedEdgeSpacing {
                expected: irregular.expected,
                actual: irregular.actual,
            };
            self.report(
                edge.sample_index.saturating_sub(irregular.actual),
                edge.sample_index,
                frame_id,
                anomaly,
                sink,
            );
        }

        let period = self
            .spacing
            .nominal_period()
            .or(edge.since_previous)
            .unwrap_or(1);
        let symbol = self.extractor.extract(&edge, &sample, period);
        if self.config.report_symbols {
            sink.on_event(Event::new(
                symbol.sample_index,
                symbol.end_index,
                EventKind::SymbolDecoded {
                    dibit: symbol.dibit,
                    ctrl: symbol.ctrl,
                },
            ));
        }

        let Decoder {
            assembler,
            classifier,
            stats,
            ..
        } = self;
        assembler.consume(&symbol, |output| {
            forward(output, classifier, stats, &mut *sink)
        });
    }

    /// Processes the next capture word, splitting it into signals using the configured channel
    /// map.
    pub fn push_raw<S>(&mut self, raw: RawSample, sink: &mut S)
    where
        S: EventSink + ?Sized,
    {
        let sample = self.config.channels.resolve(raw);
        self.push(sample, sink);
    }

    /// Signals the end of the capture. A frame that is still open is closed as
    /// [FrameStatus::Truncated], ending at the last sample seen. Calling this again without new
    /// samples in between has no effect.
    pub fn finish<S>(&mut self, sink: &mut S)
    where
        S: EventSink + ?Sized,
    {
        let last_index = self.last_index.unwrap_or_default();
        let Decoder {
            assembler,
            classifier,
            stats,
            ..
        } = self;
        assembler.finish(last_index, |output| {
            forward(output, classifier, stats, &mut *sink)
        });
    }

    /// Returns the decoder to its freshly constructed state, dropping any open frame.
    pub fn reset(&mut self) {
        self.edges.reset();
        self.spacing.reset();
        self.assembler.reset();
        self.last_index = None;
        self.stats = DecodeStats::default();
    }

    /// Decodes a complete capture, returning all of its events.
    pub fn decode<I>(&mut self, samples: I) -> Vec<Event>
    where
        I: IntoIterator<Item = Sample>,
    {
        let mut events = Vec::new();
        for sample in samples {
            self.push(sample, &mut events);
        }
        self.finish(&mut events);
        events
    }

    /// Returns an iterator that pulls samples from `samples` as events are requested. The capture
    /// is finished once `samples` is exhausted.
    pub fn events<I>(&mut self, samples: I) -> Events<'_, I::IntoIter>
    where
        I: IntoIterator<Item = Sample>,
    {
        Events {
            decoder: self,
            samples: samples.into_iter(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    fn report<S>(
        &mut self,
        start: u64,
        end: u64,
        frame_id: Option<u64>,
        anomaly: Anomaly,
        sink: &mut S,
    ) where
        S: EventSink + ?Sized,
    {
        log!(anomaly.log_level(), "Sample {end}: {anomaly}");
        self.stats.anomalies += 1;
        sink.on_event(Event::new(
            start,
            end,
            EventKind::ErrorMarker { frame_id, anomaly },
        ));
    }
}

/// Turns assembler output into events. A closed frame is classified first, and its diagnostics
/// are reported ahead of the frame itself.
fn forward<S>(
    output: AssemblerOutput,
    classifier: &ErrorClassifier,
    stats: &mut DecodeStats,
    sink: &mut S,
) where
    S: EventSink + ?Sized,
{
    match output {
        AssemblerOutput::FrameStarted {
            frame_id,
            sample_index,
        } => sink.on_event(Event::new(
            sample_index,
            sample_index,
            EventKind::FrameStart { frame_id },
        )),
        AssemblerOutput::Byte(byte) => sink.on_event(Event::new(
            byte.dibit_indices[0],
            byte.end_index,
            EventKind::ByteDecoded {
                value: byte.value,
                frame_id: byte.frame_id,
                offset: byte.offset,
                dibit_indices: byte.dibit_indices,
            },
        )),
        AssemblerOutput::FrameClosed(mut frame) => {
            let anomalies = classifier.classify(&mut frame);
            let start = frame.start_index;
            let end = frame.end_index.unwrap_or(start);
            stats.frames += 1;
            match frame.status {
                FrameStatus::FalseCarrier => stats.false_carriers += 1,
                FrameStatus::Truncated => stats.truncated += 1,
                _ => {}
            }
            for anomaly in anomalies {
                log!(anomaly.log_level(), "Frame #{}: {anomaly}", frame.id);
                stats.anomalies += 1;
                sink.on_event(Event::new(
                    start,
                    end,
                    EventKind::ErrorMarker {
                        frame_id: Some(frame.id),
                        anomaly,
                    },
                ));
            }
            sink.on_event(Event::new(start, end, EventKind::FrameEnd { frame }));
        }
    }
}

/// A pull-based adapter over a [Decoder], returned by [Decoder::events].
pub struct Events<'a, I> {
    decoder: &'a mut Decoder,
    samples: I,
    pending: VecDeque<Event>,
    finished: bool,
}

impl<I> Iterator for Events<'_, I>
where
    I: Iterator<Item = Sample>,
{
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            if self.finished {
                return None;
            }
            match self.samples.next() {
                Some(sample) => self.decoder.push(sample, &mut self.pending),
                None => {
                    self.decoder.finish(&mut self.pending);
                    self.finished = true;
                }
            }
        }
    }
}
