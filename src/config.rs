//! Configuration for the car, the environment, and the learning constants.

use thiserror::Error;

/// Errors raised by configuration validation.
///
/// Configuration mistakes fail fast at construction time; they are never
/// silently clamped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("heading bin count must be in 1..=256, got {0}")]
    BadHeadingBins(usize),

    #[error("distance bin count must be in 1..=256, got {0}")]
    BadDistanceBins(usize),

    #[error("maximum velocity must be positive")]
    NonPositiveMaxVelocity,

    #[error("acceleration must be positive")]
    NonPositiveAcceleration,

    #[error("population must contain at least one car")]
    EmptyPopulation,
}

/// Physical constants of a single car.
#[derive(Debug, Clone)]
pub struct CarConfig {
    /// Forward velocity cap; reverse caps at half of this.
    pub max_velocity: f64,
    /// Heading change per rotate call, in degrees.
    pub rotation_velocity: f64,
    /// Velocity gained per accelerate call.
    pub acceleration: f64,
    /// Below this velocity magnitude the car cannot rotate, so a stationary
    /// car never spins in place.
    pub min_rotation_speed: f64,
    /// Body length in pixels (along the heading axis).
    pub body_length: u32,
    /// Body width in pixels.
    pub body_width: u32,
    /// Heading perturbation applied on collision, in degrees. Zero disables
    /// the jitter; a nonzero value helps a wedged car work itself free.
    pub collision_jitter_deg: f64,
}

impl Default for CarConfig {
    fn default() -> Self {
        Self {
            max_velocity: 6.0,
            rotation_velocity: 4.0,
            acceleration: 0.1,
            min_rotation_speed: 0.1,
            body_length: 20,
            body_width: 10,
            collision_jitter_deg: 0.0,
        }
    }
}

/// Environment discretization, reward shaping, and termination settings.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub car: CarConfig,
    /// Angular bins over 360 degrees for the heading bucket.
    pub heading_bins: usize,
    /// Bins over `[0, max_extent]` for each ray distance.
    pub distance_bins: usize,
    /// Consecutive unmoved steps before the episode times out.
    pub stuck_timeout_steps: u32,
    /// Episode ends once cumulative reward falls to this floor or below.
    pub reward_floor: f64,
    /// Reward on a step where the body overlaps border or grass.
    pub border_penalty: f64,
    /// Reward for reaching the finish zone after a full lap.
    pub finish_reward: f64,
    /// Reward for reaching the finish zone the wrong way or too early.
    pub wrong_way_penalty: f64,
    /// Multiplier on the displacement shaping term when moving backward, so
    /// reverse travel costs far more than forward travel earns.
    pub reverse_penalty_factor: f64,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            car: CarConfig::default(),
            heading_bins: 8,
            distance_bins: 5,
            stuck_timeout_steps: 50,
            reward_floor: -1000.0,
            border_penalty: -10.0,
            finish_reward: 100.0,
            wrong_way_penalty: -10.0,
            reverse_penalty_factor: 10.0,
        }
    }
}

impl EnvConfig {
    /// Validates the configuration, failing fast on values that would
    /// produce out-of-table bin indices or a car that cannot move.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heading_bins == 0 || self.heading_bins > 256 {
            return Err(ConfigError::BadHeadingBins(self.heading_bins));
        }
        if self.distance_bins == 0 || self.distance_bins > 256 {
            return Err(ConfigError::BadDistanceBins(self.distance_bins));
        }
        if self.car.max_velocity <= 0.0 {
            return Err(ConfigError::NonPositiveMaxVelocity);
        }
        if self.car.acceleration <= 0.0 {
            return Err(ConfigError::NonPositiveAcceleration);
        }
        Ok(())
    }
}

/// Q-learning constants.
///
/// Epsilon decay across episodes is the driver's responsibility; the decay
/// rate and floor live here so drivers share one source of truth.
#[derive(Debug, Clone)]
pub struct LearningConfig {
    pub learning_rate: f64,
    pub discount_factor: f64,
    /// Initial exploration rate.
    pub epsilon: f64,
    /// Geometric per-episode decay factor for epsilon.
    pub epsilon_decay: f64,
    /// Epsilon never decays below this floor.
    pub min_epsilon: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            discount_factor: 0.95,
            epsilon: 0.1,
            epsilon_decay: 0.995,
            min_epsilon: 0.01,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(EnvConfig::default().validate(), Ok(()));
    }

    #[test]
    fn zero_bins_rejected() {
        let mut config = EnvConfig::default();
        config.heading_bins = 0;
        assert_eq!(config.validate(), Err(ConfigError::BadHeadingBins(0)));

        let mut config = EnvConfig::default();
        config.distance_bins = 0;
        assert_eq!(config.validate(), Err(ConfigError::BadDistanceBins(0)));
    }

    #[test]
    fn oversized_bins_rejected() {
        let mut config = EnvConfig::default();
        config.distance_bins = 300;
        assert_eq!(config.validate(), Err(ConfigError::BadDistanceBins(300)));
    }

    #[test]
    fn degenerate_car_rejected() {
        let mut config = EnvConfig::default();
        config.car.max_velocity = 0.0;
        assert_eq!(config.validate(), Err(ConfigError::NonPositiveMaxVelocity));

        let mut config = EnvConfig::default();
        config.car.acceleration = -0.1;
        assert_eq!(config.validate(), Err(ConfigError::NonPositiveAcceleration));
    }
}
