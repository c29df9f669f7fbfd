//! The decoder's output: a stream of [Event]s, each covering a range of samples.

use crate::classifier::Anomaly;
use crate::debug_util::FormatFrameSummary;
use crate::frame::{Frame, DIBITS_PER_BYTE};
use crate::sample::Dibit;
use std::collections::VecDeque;

/// What an [Event] reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// The reference clock made its active transition.
    ClockEdge,
    /// The lines were sampled at a clock edge.
    SymbolDecoded {
        /// The data lines.
        dibit: Dibit,
        /// The control line.
        ctrl: bool,
    },
    /// A byte of an open frame was completed.
    ByteDecoded {
        /// The byte value.
        value: u8,
        /// The frame the byte belongs to.
        frame_id: u64,
        /// The byte's position within the frame.
        offset: usize,
        /// The clock edge sample indices of the byte's dibits, in the order they were received.
        dibit_indices: [u64; DIBITS_PER_BYTE],
    },
    /// The control line asserted, opening a frame.
    FrameStart {
        /// The id of the new frame.
        frame_id: u64,
    },
    /// A frame was closed. The frame carries its final status and diagnostics.
    FrameEnd {
        /// The closed frame.
        frame: Frame,
    },
    /// Something unusual was detected.
    ErrorMarker {
        /// The frame the anomaly concerns, if any.
        frame_id: Option<u64>,
        /// What was detected.
        anomaly: Anomaly,
    },
}

/// One decoder output, covering the samples `start..end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// The first sample the event covers.
    pub start: u64,
    /// The end of the covered range. Point events have `end == start`.
    pub end: u64,
    /// What happened.
    pub kind: EventKind,
}

impl Event {
    /// Constructs a new [Event].
    pub const fn new(start: u64, end: u64, kind: EventKind) -> Event {
        Event { start, end, kind }
    }

    /// Returns the anomaly carried by an [EventKind::ErrorMarker].
    pub fn anomaly(&self) -> Option<&Anomaly> {
        match &self.kind {
            EventKind::ErrorMarker { anomaly, .. } => Some(anomaly),
            _ => None,
        }
    }

    /// Returns the frame carried by an [EventKind::FrameEnd].
    pub fn frame(&self) -> Option<&Frame> {
        match &self.kind {
            EventKind::FrameEnd { frame } => Some(frame),
            _ => None,
        }
    }
}

impl core::fmt::Display for Event {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:>10}-{:<10} ", self.start, self.end)?;
        match &self.kind {
            EventKind::ClockEdge => write!(f, "clk"),
            EventKind::SymbolDecoded { dibit, ctrl } => {
                write!(f, "dibit {dibit} ctrl {}", *ctrl as u8)
            }
            EventKind::ByteDecoded {
                value,
                frame_id,
                offset,
                ..
            } => write!(f, "byte  #{frame_id}[{offset}] {value:02X}"),
            EventKind::FrameStart { frame_id } => write!(f, "start #{frame_id}"),
            EventKind::FrameEnd { frame } => write!(f, "end   {}", FormatFrameSummary(frame)),
            EventKind::ErrorMarker {
                frame_id: Some(frame_id),
                anomaly,
            } => write!(f, "error #{frame_id}: {anomaly}"),
            EventKind::ErrorMarker {
                frame_id: None,
                anomaly,
            } => write!(f, "error: {anomaly}"),
        }
    }
}

/// Receives the events produced by a [crate::Decoder].
///
/// This is the boundary to whatever renders the decoded data; the decoder makes no formatting
/// decisions of its own.
pub trait EventSink {
    /// Called for every event, in order.
    fn on_event(&mut self, event: Event);
}

impl EventSink for Vec<Event> {
    fn on_event(&mut self, event: Event) {
        self.push(event);
    }
}

impl EventSink for VecDeque<Event> {
    fn on_event(&mut self, event: Event) {
        self.push_back(event);
    }
}

impl<F> EventSink for F
where
    F: FnMut(Event),
{
    fn on_event(&mut self, event: Event) {
        self(event)
    }
}
