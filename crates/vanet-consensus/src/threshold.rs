//! Cost comparison and adaptive voting thresholds.
//!
//! Two costs are "the same" when they differ by less than
//! [`UPDATE_THRESHOLD`] of the *first* (reference) cost. The comparison is
//! deliberately asymmetric: `is_same_cost(9, 10)` holds (|9-10| < 3.6) while
//! `is_same_cost(7, 10)` does not (|7-10| >= 2.8).
//!
//! The voting threshold moves between [`MIN_VOTING_THRESHOLD`] and
//! [`MAX_VOTING_THRESHOLD`]: every accepted increase raises it by one, every
//! accepted decrease lowers it by one.

/// Relative difference under which two costs fall into the same bucket.
pub const UPDATE_THRESHOLD: f64 = 0.4;

/// Lowest (and initial) quorum size.
pub const MIN_VOTING_THRESHOLD: usize = 2;

/// Highest quorum size.
pub const MAX_VOTING_THRESHOLD: usize = 7;

/// Fraction of a segment a car must have driven for its own measurement to count.
pub const MIN_TRACE_FRACTION: f64 = 0.5;

/// Minimum ticks a car must have spent on a segment for its own measurement to count.
pub const MIN_DWELL_TIME: u64 = 10;

/// Subtracted from the speed limit when deriving a default segment cost.
pub const SPEED_MARGIN: f64 = 3.0;

/// Floor for the cruising speed used by default costs (m/s).
pub const MIN_CRUISE_SPEED: f64 = 1.0;

/// Fuzzy cost equality, relative to `reference`.
#[inline]
pub fn is_same_cost(reference: f64, candidate: f64) -> bool {
    (reference - candidate).abs() < reference * UPDATE_THRESHOLD
}

/// Whether `candidate` moved far enough from `reference` to count as news.
#[inline]
pub fn is_material_change(reference: f64, candidate: f64) -> bool {
    (reference - candidate).abs() > reference * UPDATE_THRESHOLD
}

/// Threshold after an accepted increase.
pub const fn raise_threshold(current: usize) -> usize {
    if current < MAX_VOTING_THRESHOLD {
        current + 1
    } else {
        MAX_VOTING_THRESHOLD
    }
}

/// Threshold after an accepted decrease.
pub const fn lower_threshold(current: usize) -> usize {
    if current > MIN_VOTING_THRESHOLD {
        current - 1
    } else {
        MIN_VOTING_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn same_cost_is_asymmetric() {
        assert!(is_same_cost(9.0, 10.0));
        assert!(!is_same_cost(7.0, 10.0));
        // Reversed: 0.4 * 10 = 4 > 3
        assert!(is_same_cost(10.0, 7.0));
    }

    #[test]
    fn boundary_is_exclusive() {
        // |10 - 14| == 4 == 10 * 0.4
        assert!(!is_same_cost(10.0, 14.0));
        assert!(!is_material_change(10.0, 14.0));
        assert!(is_material_change(10.0, 14.5));
    }

    #[test]
    fn zero_reference_matches_nothing() {
        assert!(!is_same_cost(0.0, 0.0));
    }

    #[test]
    fn raise_caps_at_max() {
        let mut t = MIN_VOTING_THRESHOLD;
        for _ in 0..20 {
            t = raise_threshold(t);
        }
        assert_eq!(t, MAX_VOTING_THRESHOLD);
    }

    #[test]
    fn lower_floors_at_min() {
        let mut t = MAX_VOTING_THRESHOLD;
        for _ in 0..20 {
            t = lower_threshold(t);
        }
        assert_eq!(t, MIN_VOTING_THRESHOLD);
    }

    #[test]
    fn single_steps() {
        assert_eq!(raise_threshold(2), 3);
        assert_eq!(lower_threshold(3), 2);
        assert_eq!(lower_threshold(2), 2);
        assert_eq!(raise_threshold(7), 7);
    }

    proptest! {
        #[test]
        fn thresholds_stay_in_bounds(steps in proptest::collection::vec(any::<bool>(), 0..64)) {
            let mut t = MIN_VOTING_THRESHOLD;
            for up in steps {
                t = if up { raise_threshold(t) } else { lower_threshold(t) };
                prop_assert!((MIN_VOTING_THRESHOLD..=MAX_VOTING_THRESHOLD).contains(&t));
            }
        }

        #[test]
        fn same_cost_is_reflexive_for_positive(c in 0.001f64..1e6) {
            prop_assert!(is_same_cost(c, c));
            prop_assert!(!is_material_change(c, c));
        }

        #[test]
        fn same_and_material_are_exclusive(a in 0.001f64..1e4, b in 0.001f64..1e4) {
            prop_assert!(!(is_same_cost(a, b) && is_material_change(a, b)));
        }
    }
}
