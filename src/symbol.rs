//! Turns clock edges into [Symbol]s.

use crate::edge::ClockEdge;
use crate::sample::{Dibit, Sample};

/// The state of the control and data lines at one clock edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    /// The sample index of the clock edge.
    pub sample_index: u64,
    /// The (exclusive) end of the clock period the symbol occupies.
    pub end_index: u64,
    /// The data lines.
    pub dibit: Dibit,
    /// The control line.
    pub ctrl: bool,
}

/// Samples the control and data lines at each clock edge.
///
/// RMII only defines the lines at the edge itself, so nothing is carried over from one symbol to
/// the next.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymbolExtractor;

impl SymbolExtractor {
    /// Reads the symbol at `edge` from `sample`, which must be the sample the edge was detected
    /// on. `period` is the nominal clock period used to size the symbol's sample range.
    pub fn extract(&self, edge: &ClockEdge, sample: &Sample, period: u64) -> Symbol {
        debug_assert_eq!(edge.sample_index, sample.index);
        Symbol {
            sample_index: edge.sample_index,
            end_index: edge.sample_index.saturating_add(period.max(1)),
            dibit: sample.data,
            ctrl: sample.ctrl,
        }
    }
}
