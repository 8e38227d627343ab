/// Seedable, restorable random source for choice sampling.
///
/// Each draw reseeds a `StdRng` from the current seed, takes the uniform
/// value, and advances the seed from the same stream. The seed therefore
/// always reproduces the continuation of the sequence, not its origin.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
pub struct RandomSource {
    seed: u64,
}

impl RandomSource {
    /// Non-reproducible source seeded from the current time.
    pub fn from_time() -> RandomSource {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        RandomSource::from_seed(nanos)
    }

    /// Reproducible source from an explicit seed.
    pub fn from_seed(seed: u64) -> RandomSource {
        RandomSource { seed }
    }

    /// Draw the next uniform float in `[0, 1)`.
    pub fn random(&mut self) -> f64 {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let value: f64 = rng.gen();
        self.seed = rng.gen();
        value
    }

    /// The seed that reproduces the sequence from this point onward.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}
