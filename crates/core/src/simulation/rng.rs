//! Seeded random number generation for deterministic simulation.
//!
//! The transport draws every message delay from a [`RandomSource`] that is
//! injected at construction, so independent simulations never share state
//! and tests can replace the generator with a scripted sequence.

use std::collections::VecDeque;

use rand::{rngs::SmallRng, Rng, SeedableRng};

/// Source of the random decisions made by the simulated network.
///
/// # Determinism
///
/// For deterministic replay:
/// 1. All random decisions must go through this source
/// 2. Draws must happen in the same order each run
pub trait RandomSource {
    /// Draws a delivery delay uniformly from `1..=max_latency`.
    fn delay(&mut self, max_latency: u64) -> u64;

    /// Returns true with the given probability.
    fn chance(&mut self, probability: f64) -> bool;
}

/// A seeded random number generator for simulation.
pub struct SimulationRng {
    inner: SmallRng,
    seed: u64,
}

impl SimulationRng {
    /// Creates a new simulation RNG with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            inner: SmallRng::seed_from_u64(seed),
            seed,
        }
    }

    /// Generates a random u64.
    pub fn gen_u64(&mut self) -> u64 {
        self.inner.random()
    }

    /// Generates a random u64 in the given inclusive range.
    pub fn gen_range_inclusive(&mut self, range: std::ops::RangeInclusive<u64>) -> u64 {
        self.inner.random_range(range)
    }
}

impl RandomSource for SimulationRng {
    fn delay(&mut self, max_latency: u64) -> u64 {
        self.gen_range_inclusive(1..=max_latency.max(1))
    }

    fn chance(&mut self, probability: f64) -> bool {
        self.inner.random_bool(probability.clamp(0.0, 1.0))
    }
}

impl std::fmt::Debug for SimulationRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationRng")
            .field("seed", &self.seed)
            .finish()
    }
}

/// A [`RandomSource`] that replays a fixed list of delays.
///
/// Once the script runs out every further delay is `fallback`. Delays are
/// clamped into `1..=max_latency`. `chance` is true only for probability 1.
#[derive(Debug, Clone)]
pub struct ScriptedDelays {
    delays: VecDeque<u64>,
    fallback: u64,
}

impl ScriptedDelays {
    pub fn new(delays: impl IntoIterator<Item = u64>) -> Self {
        Self {
            delays: delays.into_iter().collect(),
            fallback: 1,
        }
    }

    pub fn with_fallback(mut self, fallback: u64) -> Self {
        self.fallback = fallback;
        self
    }
}

impl RandomSource for ScriptedDelays {
    fn delay(&mut self, max_latency: u64) -> u64 {
        let next = self.delays.pop_front().unwrap_or(self.fallback);
        next.clamp(1, max_latency.max(1))
    }

    fn chance(&mut self, probability: f64) -> bool {
        probability >= 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determinism_same_seed() {
        let mut rng1 = SimulationRng::new(42);
        let mut rng2 = SimulationRng::new(42);

        for _ in 0..100 {
            assert_eq!(rng1.gen_u64(), rng2.gen_u64());
        }
    }

    #[test]
    fn test_determinism_different_seeds() {
        let mut rng1 = SimulationRng::new(42);
        let mut rng2 = SimulationRng::new(43);

        let same_count = (0..100)
            .filter(|_| rng1.gen_u64() == rng2.gen_u64())
            .count();
        assert!(same_count < 10);
    }

    #[test]
    fn test_delay_bounds() {
        let mut rng = SimulationRng::new(1233);
        let mut seen_min = u64::MAX;
        let mut seen_max = 0;
        for _ in 0..5_000 {
            let d = rng.delay(100);
            assert!((1..=100).contains(&d));
            seen_min = seen_min.min(d);
            seen_max = seen_max.max(d);
        }
        // Both ends of the inclusive range are reachable
        assert_eq!(seen_min, 1);
        assert_eq!(seen_max, 100);
    }

    #[test]
    fn test_delay_with_unit_latency() {
        let mut rng = SimulationRng::new(7);
        for _ in 0..10 {
            assert_eq!(rng.delay(1), 1);
        }
    }

    #[test]
    fn test_chance_extremes() {
        let mut rng = SimulationRng::new(42);
        for _ in 0..100 {
            assert!(!rng.chance(0.0));
            assert!(rng.chance(1.0));
        }
    }

    #[test]
    fn test_scripted_delays() {
        let mut script = ScriptedDelays::new([5, 0, 250]).with_fallback(9);
        assert_eq!(script.delay(100), 5);
        assert_eq!(script.delay(100), 1);
        assert_eq!(script.delay(100), 100);
        assert_eq!(script.delay(100), 9);
        assert!(!script.chance(0.99));
        assert!(script.chance(1.0));
    }
}
