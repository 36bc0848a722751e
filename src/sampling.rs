//! Workload sampling primitives
//!
//! Two small generators drive the synthesized workload: a weighted
//! discrete sampler for DSCP and rate classes, and an exponential
//! interval sampler whose successive gaps approximate a Poisson arrival
//! process at the target request rate. Both draw from a caller-supplied
//! RNG so the plan builder can seed them deterministically.

use crate::config::WeightedClass;
use crate::{Error, Result};
use rand::Rng;

/// Discrete sampler returning values proportionally to their weights
#[derive(Debug, Clone)]
pub struct WeightedSampler {
    classes: Vec<WeightedClass>,
    total: u64,
}

impl WeightedSampler {
    /// Build a sampler over the given classes.
    ///
    /// Fails when the weights sum to zero, since no draw would be
    /// well-defined.
    pub fn new(classes: &[WeightedClass]) -> Result<Self> {
        let total: u64 = classes.iter().map(|c| u64::from(c.weight)).sum();
        if total == 0 {
            return Err(Error::Config("weighted distribution has zero total weight".into()));
        }
        Ok(Self {
            classes: classes.to_vec(),
            total,
        })
    }

    /// Draw one value; `P(values[k]) = weights[k] / total`
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        let r = rng.gen_range(0..self.total);
        let mut running = 0u64;
        for class in &self.classes {
            running += u64::from(class.weight);
            if running > r {
                return class.value;
            }
        }
        // Unreachable: running == total > r on the last class
        self.classes[self.classes.len() - 1].value
    }
}

/// Draw one exponentially-distributed gap in microseconds.
///
/// `lambda` is the mean arrival rate in requests per microsecond.
/// Successive draws approximate a Poisson process at that rate via the
/// inverse-CDF method, `gap = round(-ln(U) / lambda)` with `U` uniform
/// in `(0, 1]`.
pub fn poisson_interval<R: Rng + ?Sized>(rng: &mut R, lambda: f64) -> u64 {
    // gen::<f64>() is uniform in [0, 1); flip it to (0, 1] so ln() is finite
    let u: f64 = 1.0 - rng.gen::<f64>();
    (-u.ln() / lambda).round() as u64
}
