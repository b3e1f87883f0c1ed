//! Uniform random variation selection

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{thread_rng, Rng, SeedableRng};

use crate::domain::experiment::VariationSelector;
use crate::domain::DomainError;

/// Picks every variation with equal probability
///
/// The default selector draws from the thread-local RNG on each call, so
/// concurrent assignments never contend on a shared generator. A seeded
/// selector is available for reproducible runs.
#[derive(Debug, Default)]
pub struct UniformSelector {
    seeded: Option<Mutex<StdRng>>,
}

impl UniformSelector {
    /// Create a selector backed by the thread-local RNG
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a deterministic selector from a seed
    pub fn seeded(seed: u64) -> Self {
        Self {
            seeded: Some(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }
}

impl VariationSelector for UniformSelector {
    fn select(&self, count: usize) -> Result<usize, DomainError> {
        if count == 0 {
            return Err(DomainError::no_variations(
                "Cannot select from an empty variation list",
            ));
        }

        match &self.seeded {
            Some(rng) => {
                let mut rng = rng.lock().map_err(|e| {
                    DomainError::internal(format!("Random source unavailable: {}", e))
                })?;
                Ok(rng.gen_range(0..count))
            }
            None => Ok(thread_rng().gen_range(0..count)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_roughly_uniform(selector: &UniformSelector, arms: usize, draws: usize) {
        let mut counts = vec![0usize; arms];

        for _ in 0..draws {
            let index = selector.select(arms).unwrap();
            counts[index] += 1;
        }

        let expected = draws as f64 / arms as f64;
        for (arm, count) in counts.iter().enumerate() {
            let deviation = (*count as f64 - expected).abs() / expected;
            assert!(
                deviation < 0.10,
                "arm {} drawn {} times, expected about {}",
                arm,
                count,
                expected
            );
        }
    }

    #[test]
    fn test_two_arms_are_uniform() {
        assert_roughly_uniform(&UniformSelector::new(), 2, 10_000);
    }

    #[test]
    fn test_four_arms_are_uniform() {
        assert_roughly_uniform(&UniformSelector::new(), 4, 20_000);
    }

    #[test]
    fn test_seeded_selector_is_uniform() {
        assert_roughly_uniform(&UniformSelector::seeded(7), 3, 15_000);
    }

    #[test]
    fn test_seeded_selector_is_reproducible() {
        let first = UniformSelector::seeded(42);
        let second = UniformSelector::seeded(42);

        let a: Vec<_> = (0..50).map(|_| first.select(5).unwrap()).collect();
        let b: Vec<_> = (0..50).map(|_| second.select(5).unwrap()).collect();

        assert_eq!(a, b);
    }

    #[test]
    fn test_single_arm_always_selected() {
        let selector = UniformSelector::new();
        assert!((0..100).all(|_| selector.select(1).unwrap() == 0));
    }

    #[test]
    fn test_empty_list_fails() {
        let result = UniformSelector::new().select(0);
        assert!(matches!(result, Err(DomainError::NoVariations { .. })));

        let result = UniformSelector::seeded(1).select(0);
        assert!(matches!(result, Err(DomainError::NoVariations { .. })));
    }
}
