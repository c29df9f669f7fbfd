//! Finds the reference clock edges at which RMII defines the control and data lines as valid, and
//! keeps an eye on how regularly those edges arrive.

use crate::config::EdgePolarity;
use crate::sample::Sample;

/// A sampling instant: the sample at which the reference clock made its active transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockEdge {
    /// The index of the first sample after the transition.
    pub sample_index: u64,
    /// The number of samples since the previous edge, if there was one.
    pub since_previous: Option<u64>,
}

/// Emits a [ClockEdge] for every active transition of the reference clock.
///
/// The detector is edge triggered: a clock that stays high for many samples yields a single edge.
/// The first sample of a stream never yields an edge, since there is no prior level to compare
/// against.
#[derive(Debug, Clone)]
pub struct EdgeDetector {
    polarity: EdgePolarity,
    previous_level: Option<bool>,
    previous_edge: Option<u64>,
}

impl EdgeDetector {
    /// Constructs a new [EdgeDetector] triggering on the given transition.
    pub const fn new(polarity: EdgePolarity) -> EdgeDetector {
        EdgeDetector {
            polarity,
            previous_level: None,
            previous_edge: None,
        }
    }

    /// Feeds the next sample in capture order, returning an edge if the clock just made its
    /// active transition.
    pub fn feed(&mut self, sample: &Sample) -> Option<ClockEdge> {
        let previous = self.previous_level.replace(sample.ref_clock)?;
        let triggered = match self.polarity {
            EdgePolarity::Rising => !previous && sample.ref_clock,
            EdgePolarity::Falling => previous && !sample.ref_clock,
        };
        if !triggered {
            return None;
        }
        let since_previous = self
            .previous_edge
            .map(|previous_edge| sample.index.saturating_sub(previous_edge));
        self.previous_edge = Some(sample.index);
        Some(ClockEdge {
            sample_index: sample.index,
            since_previous,
        })
    }

    /// Forgets all prior clock state, as if no sample had been fed yet.
    pub fn reset(&mut self) {
        self.previous_level = None;
        self.previous_edge = None;
    }
}

/// An edge-to-edge distance that doesn't fit the reference clock's nominal period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrregularSpacing {
    /// The nominal period, in samples.
    pub expected: u64,
    /// The observed distance, in samples.
    pub actual: u64,
}

/// Tracks the nominal reference clock period and flags edges that deviate from it.
///
/// The nominal period is either provided up front (derived from the capture's sample rate), or
/// learned from the distance between the first two edges.
#[derive(Debug, Clone)]
pub struct SpacingMonitor {
    configured_period: Option<u64>,
    nominal_period: Option<u64>,
    tolerance_percent: u32,
}

impl SpacingMonitor {
    /// Constructs a new [SpacingMonitor].
    pub const fn new(configured_period: Option<u64>, tolerance_percent: u32) -> SpacingMonitor {
        SpacingMonitor {
            configured_period,
            nominal_period: configured_period,
            tolerance_percent,
        }
    }

    /// The current nominal period, in samples.
    pub fn nominal_period(&self) -> Option<u64> {
        self.nominal_period
    }

    /// Checks the spacing of the given edge against the nominal period.
    pub fn check(&mut self, edge: &ClockEdge) -> Option<IrregularSpacing> {
        let actual = edge.since_previous?;
        let Some(expected) = self.nominal_period else {
            self.nominal_period = Some(actual);
            return None;
        };
        // Captures commonly sample the clock only a handful of times per period, so a deviation
        // of one sample is always tolerated.
        let allowed = (expected * self.tolerance_percent as u64 / 100).max(1);
        if actual.abs_diff(expected) > allowed {
            Some(IrregularSpacing { expected, actual })
        } else {
            None
        }
    }

    /// Forgets any learned period.
    pub fn reset(&mut self) {
        self.nominal_period = self.configured_period;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Dibit;

    fn clock_samples(levels: &[u8]) -> Vec<Sample> {
        levels
            .iter()
            .enumerate()
            .map(|(idx, &level)| Sample::new(idx as u64, level != 0, false, Dibit::default()))
            .collect()
    }

    fn edge_indices(polarity: EdgePolarity, levels: &[u8]) -> Vec<u64> {
        let mut detector = EdgeDetector::new(polarity);
        clock_samples(levels)
            .iter()
            .filter_map(|sample| detector.feed(sample))
            .map(|edge| edge.sample_index)
            .collect()
    }

    // Multiple consecutive high samples yield a single edge.
    #[test]
    fn rising_edges_are_edge_triggered() {
        assert_eq!(
            vec![2, 6],
            edge_indices(EdgePolarity::Rising, &[0, 0, 1, 1, 1, 0, 1, 1])
        );
    }

    // A clock that is already high in the first sample didn't transition there.
    #[test]
    fn first_sample_never_yields_an_edge() {
        assert_eq!(Vec::<u64>::new(), edge_indices(EdgePolarity::Rising, &[1, 1, 1]));
        assert_eq!(vec![3], edge_indices(EdgePolarity::Rising, &[1, 1, 0, 1]));
    }

    #[test]
    fn falling_edges() {
        assert_eq!(
            vec![2, 5],
            edge_indices(EdgePolarity::Falling, &[1, 1, 0, 0, 1, 0, 0])
        );
    }

    // The number of edges equals the number of 0->1 transitions, and re-running gives the same
    // result.
    #[test]
    fn edge_count_matches_transitions() {
        let levels = [0, 1, 0, 1, 1, 0, 0, 1, 0, 1, 1, 1, 0, 1];
        let transitions = levels.windows(2).filter(|w| w[0] == 0 && w[1] == 1).count();
        assert_eq!(transitions, edge_indices(EdgePolarity::Rising, &levels).len());
        assert_eq!(
            edge_indices(EdgePolarity::Rising, &levels),
            edge_indices(EdgePolarity::Rising, &levels)
        );
    }

    #[test]
    fn edges_report_distance_to_previous_edge() {
        let mut detector = EdgeDetector::new(EdgePolarity::Rising);
        let edges: Vec<ClockEdge> = clock_samples(&[0, 1, 0, 0, 1, 0, 1])
            .iter()
            .filter_map(|sample| detector.feed(sample))
            .collect();
        assert_eq!(
            vec![None, Some(3), Some(2)],
            edges.iter().map(|e| e.since_previous).collect::<Vec<_>>()
        );
    }

    #[test]
    fn reset_forgets_previous_level() {
        let mut detector = EdgeDetector::new(EdgePolarity::Rising);
        let samples = clock_samples(&[0, 1]);
        assert!(detector.feed(&samples[0]).is_none());
        detector.reset();
        assert!(detector.feed(&samples[1]).is_none());
    }

    fn edge(since_previous: Option<u64>) -> ClockEdge {
        ClockEdge {
            sample_index: 0,
            since_previous,
        }
    }

    #[test]
    fn spacing_monitor_learns_period() {
        let mut monitor = SpacingMonitor::new(None, 25);
        assert_eq!(None, monitor.check(&edge(None)));
        assert_eq!(None, monitor.check(&edge(Some(8))));
        assert_eq!(Some(8), monitor.nominal_period());
        // 25% of 8 is 2 samples.
        assert_eq!(None, monitor.check(&edge(Some(10))));
        assert_eq!(
            Some(IrregularSpacing {
                expected: 8,
                actual: 11
            }),
            monitor.check(&edge(Some(11)))
        );
        assert_eq!(
            Some(IrregularSpacing {
                expected: 8,
                actual: 3
            }),
            monitor.check(&edge(Some(3)))
        );
        monitor.reset();
        assert_eq!(None, monitor.nominal_period());
    }

    // A one-sample jitter is tolerated even when the percentage rounds down to zero samples.
    #[test]
    fn spacing_monitor_tolerates_one_sample_jitter() {
        let mut monitor = SpacingMonitor::new(Some(2), 10);
        assert_eq!(None, monitor.check(&edge(Some(3))));
        assert_eq!(None, monitor.check(&edge(Some(1))));
        assert!(monitor.check(&edge(Some(4))).is_some());
        monitor.reset();
        assert_eq!(Some(2), monitor.nominal_period());
    }
}
