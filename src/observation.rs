//! State discretization: bucketing continuous readings into Q-table keys.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::EnvConfig;
use crate::track::RAY_COUNT;

/// Buckets `value` into one of `bins` equal-width bins over `[min, max]`.
///
/// The index is `floor((value - min) / bin_size)` clamped into
/// `[0, bins - 1]`: values below `min` land in bin 0 and values at or above
/// `max` land in the last bin, so out-of-range readings can never produce an
/// out-of-table index.
///
/// `bins` must be nonzero; [`crate::config::EnvConfig::validate`] enforces
/// this for the bin counts the environment feeds through here.
pub fn discretize(value: f64, min: f64, max: f64, bins: usize) -> usize {
    debug_assert!(bins > 0, "bin count must be nonzero");
    let bin_size = (max - min) / bins as f64;
    let raw = ((value - min) / bin_size) as i64;
    raw.clamp(0, bins as i64 - 1) as usize
}

/// The discretized state: one heading bucket plus one distance bucket per
/// ray-cast direction.
///
/// This is the only key type the Q-table understands. It is small, `Copy`,
/// and hashes by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Observation {
    /// Angular bin of the heading over 360 degrees.
    pub heading: u8,
    /// Distance bin per ray, over `[0, max_distance]`.
    pub rays: [u8; RAY_COUNT],
}

impl Observation {
    /// Encodes a heading (degrees, any magnitude) and per-ray distances.
    ///
    /// The heading is wrapped into `[0, 360)` before bucketing so a car that
    /// has turned through several full revolutions still lands in the same
    /// bin as one at the equivalent angle.
    pub fn encode(
        heading_deg: f64,
        distances: &[f64; RAY_COUNT],
        max_distance: f64,
        config: &EnvConfig,
    ) -> Self {
        let heading = discretize(
            heading_deg.rem_euclid(360.0),
            0.0,
            360.0,
            config.heading_bins,
        ) as u8;
        let mut rays = [0u8; RAY_COUNT];
        for (slot, &distance) in rays.iter_mut().zip(distances) {
            *slot = discretize(distance, 0.0, max_distance, config.distance_bins) as u8;
        }
        Self { heading, rays }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discretize_interior_values() {
        // 5 bins of width 200 over [0, 1000].
        assert_eq!(discretize(0.0, 0.0, 1000.0, 5), 0);
        assert_eq!(discretize(199.9, 0.0, 1000.0, 5), 0);
        assert_eq!(discretize(200.0, 0.0, 1000.0, 5), 1);
        assert_eq!(discretize(999.9, 0.0, 1000.0, 5), 4);
    }

    #[test]
    fn discretize_bin_edges_are_deterministic() {
        for bin in 0..5 {
            let edge = bin as f64 * 200.0;
            assert_eq!(discretize(edge, 0.0, 1000.0, 5), bin);
        }
    }

    #[test]
    fn discretize_clamps_out_of_range() {
        assert_eq!(discretize(-50.0, 0.0, 1000.0, 5), 0);
        assert_eq!(discretize(1000.0, 0.0, 1000.0, 5), 4);
        assert_eq!(discretize(99999.0, 0.0, 1000.0, 5), 4);
    }

    #[test]
    #[should_panic(expected = "bin count must be nonzero")]
    fn discretize_rejects_zero_bins() {
        discretize(5.0, 0.0, 10.0, 0);
    }

    #[test]
    fn encode_wraps_heading_across_revolutions() {
        let config = EnvConfig::default();
        let distances = [0.0; RAY_COUNT];
        let base = Observation::encode(90.0, &distances, 1000.0, &config);
        let wrapped = Observation::encode(90.0 + 720.0, &distances, 1000.0, &config);
        let negative = Observation::encode(90.0 - 360.0, &distances, 1000.0, &config);
        assert_eq!(base, wrapped);
        assert_eq!(base, negative);
    }

    #[test]
    fn encode_buckets_each_ray_independently() {
        let config = EnvConfig::default();
        let mut distances = [0.0; RAY_COUNT];
        distances[3] = 999.0;
        let obs = Observation::encode(0.0, &distances, 1000.0, &config);
        assert_eq!(obs.rays[3], 4);
        assert_eq!(obs.rays[0], 0);
    }

    #[test]
    fn observation_is_a_value_key() {
        use std::collections::HashMap;
        let config = EnvConfig::default();
        let distances = [10.0; RAY_COUNT];
        let a = Observation::encode(45.0, &distances, 1000.0, &config);
        let b = Observation::encode(45.0, &distances, 1000.0, &config);
        let mut map = HashMap::new();
        map.insert(a, 1.0);
        assert_eq!(map.get(&b), Some(&1.0));
    }
}
