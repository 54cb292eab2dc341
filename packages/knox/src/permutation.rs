//! Monte-Carlo null distribution by time-label permutation.
//!
//! Each trial shuffles the timestamps across the fixed positions and counts
//! close pairs again. Trial `i` draws from the ChaCha stream `i` of the base
//! seed, so the samples depend only on the seed and never on how the thread
//! pool schedules the trials.

use std::sync::Arc;

use crime_risk_knox_models::NullDistribution;
use rand::SeedableRng as _;
use rand::seq::SliceRandom as _;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::KnoxError;
use crate::counter::PairCounter;
use crate::progress::ProgressCallback;

/// Draws permutation trials for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermutationEngine {
    permutations: usize,
    seed: u64,
}

impl PermutationEngine {
    /// An engine drawing `permutations` trials. Without a seed, one is drawn
    /// from entropy and reported through [`Self::seed`].
    #[must_use]
    pub fn new(permutations: usize, seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(rand::random);
        Self { permutations, seed }
    }

    /// Base seed of the trials.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of trials.
    #[must_use]
    pub const fn permutations(&self) -> usize {
        self.permutations
    }

    /// Runs every trial and collects the pair counts in trial order.
    ///
    /// With fewer than two incidents no pair can exist and no trial runs.
    ///
    /// # Errors
    ///
    /// Returns [`KnoxError::IncompleteNull`] if fewer samples come back
    /// than trials were requested.
    pub fn sample(
        &self,
        counter: &dyn PairCounter,
        times: &[i64],
        progress: &Arc<dyn ProgressCallback>,
    ) -> Result<NullDistribution, KnoxError> {
        debug_assert_eq!(counter.incident_count(), times.len());

        if times.len() < 2 {
            log::debug!("Fewer than 2 incidents; skipping permutation trials");
            return Ok(NullDistribution::empty(self.seed));
        }

        log::info!(
            "Running {} permutation trials (seed {})",
            self.permutations,
            self.seed
        );
        progress.set_total(self.permutations as u64);

        let samples: Vec<u64> = (0..self.permutations)
            .into_par_iter()
            .map(|trial| {
                let mut shuffled = times.to_vec();
                shuffled.shuffle(&mut trial_rng(self.seed, trial));
                let count = counter.count_pairs(&shuffled);
                progress.inc(1);
                count
            })
            .collect();

        progress.finish(format!("{} trials complete", samples.len()));

        if samples.len() != self.permutations {
            return Err(KnoxError::IncompleteNull {
                expected: self.permutations,
                actual: samples.len(),
            });
        }

        Ok(NullDistribution {
            samples,
            seed: self.seed,
        })
    }
}

/// The generator for trial `trial` of a run seeded with `seed`.
#[must_use]
pub fn trial_rng(seed: u64, trial: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(trial as u64);
    rng
}
