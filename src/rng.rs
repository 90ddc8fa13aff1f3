use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rand_pcg::Pcg64;

/// The random streams consumed by the sampler, behind one seedable source.
///
/// Generic over the engine so callers can plug in any `rand::Rng`; the
/// default engine is PCG-64, which is cheap, seedable, and reproducible
/// for a given seed. One source is exclusively owned by one driver.
#[derive(Clone, Debug)]
pub struct RandomSource<R = Pcg64> {
    rng: R,
}

impl RandomSource<Pcg64> {
    /// A deterministic source for the given seed.
    pub fn seeded(seed: u64) -> Self {
        RandomSource {
            rng: Pcg64::seed_from_u64(seed),
        }
    }
}

impl<R: Rng> RandomSource<R> {
    /// Wrap an existing engine.
    pub fn from_rng(rng: R) -> Self {
        RandomSource { rng }
    }

    /// Uniform draw from [0, 1).
    #[inline]
    pub fn uniform(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Standard normal draw.
    #[inline]
    pub fn gaussian(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }

    /// Uniform site index in [0, n).
    #[inline]
    pub fn index(&mut self, n: usize) -> usize {
        self.rng.gen_range(0..n)
    }
}
