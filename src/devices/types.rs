//! Common types shared by depot equipment and vehicles.

use chrono::TimeDelta;
use rand::{Rng, rngs::StdRng};

/// Index of a bus within the depot fleet.
///
/// Connectors hold a `BusId` rather than the bus itself; the fleet is owned by
/// the depot and looked up by index when energy is delivered.
pub type BusId = usize;

/// Noise model for schedule jitter.
///
/// Offsets are drawn from a zero-mean Gaussian with standard deviation
/// `std_steps` (in timesteps), folded to be non-negative and rounded to whole
/// timesteps so jittered instants stay on the simulation grid.
#[derive(Debug, Clone, Copy)]
pub struct JitterModel {
    /// Standard deviation of the offset, in timesteps.
    pub std_steps: f32,
    /// Duration of one timestep.
    pub step: TimeDelta,
}

impl JitterModel {
    /// Creates a jitter model.
    ///
    /// # Panics
    ///
    /// Panics if `std_steps` is negative or `step` is not positive.
    pub fn new(std_steps: f32, step: TimeDelta) -> Self {
        assert!(std_steps >= 0.0);
        assert!(step > TimeDelta::zero());
        Self { std_steps, step }
    }

    /// Samples a non-negative offset as a whole number of timesteps.
    pub fn sample_offset(&self, rng: &mut StdRng) -> TimeDelta {
        let steps = gaussian_noise(rng, self.std_steps).abs().round() as i32;
        self.step * steps
    }
}

/// Utility function to generate Gaussian noise using Box-Muller transform.
///
/// # Arguments
///
/// * `rng` - Random number generator
/// * `std_dev` - Standard deviation of the noise
///
/// # Returns
///
/// Random value from a Gaussian distribution with mean 0 and specified standard deviation
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f32) -> f32 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f32 = rng.random::<f32>().clamp(1e-6, 1.0);
    let u2: f32 = rng.random::<f32>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos();
    z0 * std_dev
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn zero_std_dev_is_silent() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(gaussian_noise(&mut rng, 0.0), 0.0);
    }

    #[test]
    fn noise_mean_is_near_zero() {
        let mut rng = StdRng::seed_from_u64(7);
        let n = 5000;
        let sum: f32 = (0..n).map(|_| gaussian_noise(&mut rng, 1.0)).sum();
        assert!((sum / n as f32).abs() < 0.1);
    }

    #[test]
    fn jitter_offsets_are_whole_non_negative_steps() {
        let mut rng = StdRng::seed_from_u64(3);
        let model = JitterModel::new(2.0, TimeDelta::hours(1));
        for _ in 0..200 {
            let offset = model.sample_offset(&mut rng);
            assert!(offset >= TimeDelta::zero());
            assert_eq!(offset.num_seconds() % 3600, 0);
        }
    }

    #[test]
    fn zero_jitter_never_moves_schedule() {
        let mut rng = StdRng::seed_from_u64(3);
        let model = JitterModel::new(0.0, TimeDelta::minutes(15));
        assert_eq!(model.sample_offset(&mut rng), TimeDelta::zero());
    }
}
