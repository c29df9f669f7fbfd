//! The frame-level state machine: groups symbols into bytes and infers frame boundaries from the
//! control line.
//!
//! RMII has no explicit start or end of frame signal. A frame is every run of clock edges with the
//! control line asserted, its first bytes are preamble until the SFD shows up, and whatever was
//! left in the byte accumulator when the control line deasserts tells us whether the frame ended on
//! a byte boundary.

use crate::config::ControlEncoding;
use crate::debug_util;
use crate::frame::{
    Frame, FrameStatus, Residual, DIBITS_PER_BYTE, FALSE_CARRIER_BYTE, PREAMBLE_BYTE, SFD_BYTE,
};
use crate::symbol::Symbol;
use bitvec::prelude::*;
use log::{debug, trace};

/// The states of a [FrameAssembler].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    /// Waiting for the control line to assert.
    Idle,
    /// A frame is open, but the SFD hasn't been seen yet.
    Preamble,
    /// A frame is open and past its SFD.
    InFrame,
    /// The open frame is being finalized. The assembler moves on to [AssemblerState::Idle] before
    /// handing the closed frame out.
    Closing,
}

/// A completed byte of the open frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedByte {
    /// The byte value, assembled from four dibits with the first one received in bits 1:0.
    pub value: u8,
    /// The id of the frame the byte belongs to.
    pub frame_id: u64,
    /// The position of the byte within [Frame::bytes].
    pub offset: usize,
    /// The clock edge sample indices of the byte's dibits, in the order they were received.
    pub dibit_indices: [u64; DIBITS_PER_BYTE],
    /// The (exclusive) end of the last dibit's clock period.
    pub end_index: u64,
}

/// What a [FrameAssembler] reports while consuming symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblerOutput {
    /// A new frame was opened at the given clock edge.
    FrameStarted {
        /// The id of the new frame.
        frame_id: u64,
        /// The sample index of the first asserted clock edge.
        sample_index: u64,
    },
    /// A byte was completed.
    Byte(DecodedByte),
    /// The open frame was closed.
    FrameClosed(Frame),
}

/// Buffers up to three dibits until a byte is complete.
#[derive(Debug, Clone, Default)]
struct PartialByte {
    value: u8,
    len: usize,
    indices: [u64; DIBITS_PER_BYTE],
}

impl PartialByte {
    /// Adds a dibit, returning the byte value, the dibit indices and the byte's end index once
    /// four dibits have been collected.
    fn push(&mut self, symbol: &Symbol) -> Option<(u8, [u64; DIBITS_PER_BYTE], u64)> {
        // Bytes are transferred least significant dibit first, so the n-th dibit we receive
        // occupies bits 2n+1:2n.
        let bit_idx = 2 * self.len;
        self.value.view_bits_mut::<Lsb0>()[bit_idx..bit_idx + 2].store_le(symbol.dibit.value());
        self.indices[self.len] = symbol.sample_index;
        self.len += 1;
        if self.len < DIBITS_PER_BYTE {
            return None;
        }
        let completed = (self.value, self.indices, symbol.end_index);
        self.clear();
        Some(completed)
    }

    fn residual(&self) -> Option<Residual> {
        (self.len > 0).then(|| Residual::from_partial(self.value, self.len))
    }

    fn clear(&mut self) {
        *self = PartialByte::default();
    }
}

/// The central decoding state machine. Consumes one [Symbol] per clock edge, and reports frame
/// starts, completed bytes and closed frames.
///
/// At most one frame is open at any time. Malformed input never causes an error: every deviation
/// ends up in the closed frame's [FrameStatus] or its statistics, for the
/// [crate::ErrorClassifier] to label.
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    control: ControlEncoding,
    state: AssemblerState,
    frame: Option<Frame>,
    partial: PartialByte,
    // A CRS_DV-encoded symbol that had its carrier sense bit low. Whether it carries data is only
    // known once the next (data valid) edge has been seen.
    held: Option<Symbol>,
    next_frame_id: u64,
}

impl FrameAssembler {
    /// Constructs a new, idle [FrameAssembler].
    pub fn new(control: ControlEncoding) -> FrameAssembler {
        FrameAssembler {
            control,
            state: AssemblerState::Idle,
            frame: None,
            partial: PartialByte::default(),
            held: None,
            next_frame_id: 0,
        }
    }

    /// The current state.
    pub fn state(&self) -> AssemblerState {
        self.state
    }

    /// The currently open frame, if any.
    pub fn open_frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    /// Consumes the symbol of the next clock edge, passing anything it completes to `out`.
    pub fn consume<F>(&mut self, symbol: &Symbol, mut out: F)
    where
        F: FnMut(AssemblerOutput),
    {
        match self.state {
            // Closing never outlives a single call, so seeing it here means the same as idle.
            AssemblerState::Idle | AssemblerState::Closing => {
                if symbol.ctrl {
                    self.open(symbol, &mut out);
                    self.commit(symbol, &mut out);
                }
            }
            AssemblerState::Preamble | AssemblerState::InFrame => {
                self.consume_open(symbol, &mut out)
            }
        }
    }

    /// Ends the input. An open frame is closed as [FrameStatus::Truncated] at `last_index`, the
    /// index of the last sample seen.
    pub fn finish<F>(&mut self, last_index: u64, mut out: F)
    where
        F: FnMut(AssemblerOutput),
    {
        if self.frame.is_some() {
            self.close(last_index, Some(FrameStatus::Truncated), &mut out);
        }
    }

    /// Drops any open frame and returns to [AssemblerState::Idle]. Frame ids restart from zero.
    pub fn reset(&mut self) {
        *self = FrameAssembler::new(self.control);
    }

    fn open<F>(&mut self, symbol: &Symbol, out: &mut F)
    where
        F: FnMut(AssemblerOutput),
    {
        let frame_id = self.next_frame_id;
        self.next_frame_id += 1;
        debug!("Frame #{frame_id} started at sample {}", symbol.sample_index);
        self.frame = Some(Frame::new(frame_id, symbol.sample_index));
        self.partial.clear();
        self.held = None;
        self.state = AssemblerState::Preamble;
        out(AssemblerOutput::FrameStarted {
            frame_id,
            sample_index: symbol.sample_index,
        });
    }

    fn consume_open<F>(&mut self, symbol: &Symbol, out: &mut F)
    where
        F: FnMut(AssemblerOutput),
    {
        if symbol.ctrl {
            // If carrier sense dropped on the previous edge, data remained valid after all.
            if let Some(held) = self.held.take() {
                if let Some(frame) = self.frame.as_mut() {
                    frame.carrier_toggles += 1;
                }
                self.commit(&held, out);
            }
            self.commit(symbol, out);
            return;
        }

        // With CRS_DV, a low level on the first dibit of a nibble only means that carrier sense
        // dropped. Hold on to the symbol until the next edge tells us whether data is still valid.
        let position = self.partial.len + self.held.is_some() as usize;
        if self.control == ControlEncoding::CrsDv && position % 2 == 0 && self.held.is_none() {
            self.held = Some(*symbol);
            return;
        }

        // Data valid deasserted. The data lines on this edge (and any held dibit) are no longer
        // part of the frame; whatever is buffered stays as dribble.
        self.held = None;
        self.close(symbol.sample_index, None, out);
    }

    fn commit<F>(&mut self, symbol: &Symbol, out: &mut F)
    where
        F: FnMut(AssemblerOutput),
    {
        let Some(frame) = self.frame.as_mut() else {
            return;
        };
        frame.dibit_count += 1;
        let Some((value, dibit_indices, end_index)) = self.partial.push(symbol) else {
            return;
        };

        let offset = frame.bytes.len();
        frame.bytes.push(value);
        trace!("Frame #{} byte {offset}: {value:02X}", frame.id);
        if self.state == AssemblerState::Preamble {
            if value == SFD_BYTE {
                debug!(
                    "Frame #{} SFD after {} preamble byte(s)",
                    frame.id, frame.preamble.bytes
                );
                trace!(
                    "Frame #{} preamble and SFD in wire order:{}",
                    frame.id,
                    debug_util::FormatDibits(&frame.bytes)
                );
                frame.sfd_offset = Some(offset);
                self.state = AssemblerState::InFrame;
            } else {
                frame.preamble.bytes += 1;
                match value {
                    PREAMBLE_BYTE => {}
                    FALSE_CARRIER_BYTE => frame.preamble.false_carrier_codes += 1,
                    _ => frame.preamble.malformed += 1,
                }
            }
        }
        out(AssemblerOutput::Byte(DecodedByte {
            value,
            frame_id: frame.id,
            offset,
            dibit_indices,
            end_index,
        }));
    }

    fn close<F>(&mut self, end_index: u64, status: Option<FrameStatus>, out: &mut F)
    where
        F: FnMut(AssemblerOutput),
    {
        let Some(mut frame) = self.frame.take() else {
            return;
        };
        self.state = AssemblerState::Closing;

        let false_carrier = frame.dibit_count < DIBITS_PER_BYTE
            || (frame.sfd_offset.is_none() && frame.preamble.false_carrier_codes > 0);
        frame.status = match (status, self.partial.residual()) {
            (Some(status), _) => status,
            _ if false_carrier => FrameStatus::FalseCarrier,
            (None, None) => FrameStatus::CompleteAligned,
            (None, Some(residual)) => FrameStatus::CompleteUnaligned(residual),
        };
        frame.end_index = Some(end_index);
        debug!("{}", debug_util::FormatFrameSummary(&frame));
        if log::log_enabled!(log::Level::Trace) {
            debug_util::log_data_hex(log::Level::Trace, &frame.bytes);
        }

        self.partial.clear();
        self.held = None;
        self.state = AssemblerState::Idle;
        out(AssemblerOutput::FrameClosed(frame));
    }
}
