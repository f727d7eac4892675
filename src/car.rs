//! Car kinematics: pose, state transitions, collision response, and lap
//! detection.
//!
//! The car owns its pose exclusively; only the operations here mutate it.
//! Positions use the screen convention (y grows downward), so a heading of
//! 0 degrees moves the car up, 90 left, 180 down, and 270 right.

use log::trace;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::CarConfig;
use crate::track::{self, Mask, SpawnHeading, Track, RAY_COUNT, RAY_STEP_DEG};

/// Steering direction for a rotate operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Steer {
    Left,
    Right,
}

/// A simulated car.
///
/// Created once per simulated vehicle and reused across episodes via
/// [`Car::reset`]. The heading accumulates as the car turns; it is not
/// normalized to `[0, 360)`.
#[derive(Debug, Clone)]
pub struct Car {
    config: CarConfig,
    x: f64,
    y: f64,
    heading: f64,
    velocity: f64,
    start_position: (f64, f64),
    spawn_heading: SpawnHeading,
    previous_position: (f64, f64),
    stuck_steps: u32,
    distance_traveled: f64,
    distance_this_frame: f64,
    footprint: Mask,
    rng: StdRng,
}

impl Car {
    /// Creates a car at its spawn pose.
    ///
    /// The seed drives only the optional collision jitter, so two cars with
    /// the same seed behave identically.
    pub fn new(config: CarConfig, start: (f64, f64), spawn_heading: SpawnHeading, seed: u64) -> Self {
        let heading = spawn_heading.angle_degrees();
        let footprint = Mask::rotated_rect(config.body_length, config.body_width, heading);
        Self {
            config,
            x: start.0,
            y: start.1,
            heading,
            velocity: 0.0,
            start_position: start,
            spawn_heading,
            previous_position: start,
            stuck_steps: 0,
            distance_traveled: 0.0,
            distance_this_frame: 0.0,
            footprint,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Turns the car by its rotation speed.
    ///
    /// No-op below the minimum velocity magnitude, so a stationary car
    /// cannot rotate for free. When reversing, the steering direction is
    /// flipped so the controls stay intuitive.
    pub fn rotate(&mut self, steer: Steer) {
        if self.velocity.abs() < self.config.min_rotation_speed {
            return;
        }
        let step = if self.velocity > 0.0 {
            self.config.rotation_velocity
        } else {
            -self.config.rotation_velocity
        };
        match steer {
            Steer::Left => self.heading += step,
            Steer::Right => self.heading -= step,
        }
        self.refresh_footprint();
    }

    /// Accelerates toward the forward cap. A reversing car first brakes
    /// through zero at twice the acceleration rate.
    pub fn accelerate_forward(&mut self) {
        if self.velocity < 0.0 {
            self.velocity = (self.velocity + self.config.acceleration * 2.0).min(0.0);
        } else {
            self.velocity = (self.velocity + self.config.acceleration).min(self.config.max_velocity);
        }
    }

    /// Accelerates toward the reverse cap, which is half the forward cap. A
    /// forward-moving car first brakes through zero at twice the rate.
    pub fn accelerate_backward(&mut self) {
        if self.velocity > 0.0 {
            self.velocity = (self.velocity - self.config.acceleration * 2.0).max(0.0);
        } else {
            self.velocity =
                (self.velocity - self.config.acceleration).max(-self.config.max_velocity / 2.0);
        }
    }

    /// Lets the velocity decay toward zero at half the acceleration rate,
    /// from whichever side of zero it is on. Never overshoots.
    pub fn coast(&mut self) {
        if self.velocity > 0.0 {
            self.velocity = (self.velocity - self.config.acceleration / 2.0).max(0.0);
        } else if self.velocity < 0.0 {
            self.velocity = (self.velocity + self.config.acceleration / 2.0).min(0.0);
        }
    }

    /// Advances the pose by one tick of the current velocity.
    ///
    /// Also maintains the stuck counter (consecutive ticks with a
    /// bit-identical position) and the cumulative distance, which grows when
    /// moving forward and shrinks when reversing.
    pub fn advance(&mut self) {
        if (self.x, self.y) == self.previous_position {
            self.stuck_steps += 1;
        } else {
            self.stuck_steps = 0;
        }
        self.previous_position = (self.x, self.y);

        let rad = self.heading.to_radians();
        let dx = -rad.sin() * self.velocity;
        let dy = -rad.cos() * self.velocity;
        self.distance_this_frame = (dx * dx + dy * dy).sqrt();
        if self.velocity > 0.0 {
            self.distance_traveled += self.distance_this_frame;
        } else {
            self.distance_traveled -= self.distance_this_frame;
        }
        self.x += dx;
        self.y += dy;
    }

    /// Soft-bump collision response: the velocity magnitude is halved, never
    /// reversed. With a nonzero configured jitter the heading is additionally
    /// perturbed by exactly that amount in a random direction, and the
    /// footprint mask is recomputed either way.
    pub fn handle_collision(&mut self) {
        self.velocity *= 0.5;
        if self.config.collision_jitter_deg != 0.0 {
            let jitter = if self.rng.gen::<bool>() {
                self.config.collision_jitter_deg
            } else {
                -self.config.collision_jitter_deg
            };
            self.heading += jitter;
        }
        self.refresh_footprint();
        trace!(
            "collision handled: velocity now {:.3}, heading {:.1}",
            self.velocity,
            self.heading
        );
    }

    /// Restores the spawn pose and zeroes velocity, counters, and distance.
    pub fn reset(&mut self) {
        self.x = self.start_position.0;
        self.y = self.start_position.1;
        self.heading = self.spawn_heading.angle_degrees();
        self.velocity = 0.0;
        self.previous_position = self.start_position;
        self.stuck_steps = 0;
        self.distance_traveled = 0.0;
        self.distance_this_frame = 0.0;
        self.refresh_footprint();
    }

    /// Checks the footprint against an occupancy mask placed at `mask_pos`,
    /// returning the first intersection point in that mask's coordinates.
    pub fn collide(&self, mask: &Mask, mask_pos: (f64, f64)) -> Option<(i64, i64)> {
        let (left, top) = self.footprint_top_left();
        let offset = ((left - mask_pos.0) as i64, (top - mask_pos.1) as i64);
        mask.overlap(&self.footprint, offset)
    }

    /// Casts [`RAY_COUNT`] rays from the car's center at fixed angular steps
    /// starting from absolute 0 degrees.
    ///
    /// The directions are absolute, not relative to the car's heading: the
    /// heading itself is a separate component of the observation, so the
    /// discretized state stays consistent across training.
    pub fn ray_distances(&self, mask: &Mask, max_length: f64) -> [f64; RAY_COUNT] {
        let mut distances = [0.0; RAY_COUNT];
        for (i, slot) in distances.iter_mut().enumerate() {
            *slot = mask.ray_cast((self.x, self.y), i as f64 * RAY_STEP_DEG, max_length);
        }
        distances
    }

    /// Returns whether this car has completed a full lap of `track`.
    pub fn has_completed_lap(&self, track: &Track) -> bool {
        track::has_completed_lap(self.spawn_heading, track.finish_position(), (self.x, self.y))
    }

    fn refresh_footprint(&mut self) {
        self.footprint =
            Mask::rotated_rect(self.config.body_length, self.config.body_width, self.heading);
    }

    fn footprint_top_left(&self) -> (f64, f64) {
        (
            self.x - self.footprint.width() as f64 / 2.0,
            self.y - self.footprint.height() as f64 / 2.0,
        )
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn distance_traveled(&self) -> f64 {
        self.distance_traveled
    }

    /// Displacement magnitude of the most recent [`Car::advance`].
    pub fn distance_this_frame(&self) -> f64 {
        self.distance_this_frame
    }

    pub fn stuck_steps(&self) -> u32 {
        self.stuck_steps
    }

    pub fn spawn_heading(&self) -> SpawnHeading {
        self.spawn_heading
    }
}
