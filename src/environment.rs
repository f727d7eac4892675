//! Single-agent and population environments over the circuit.
//!
//! An environment composes a [`Car`] (or several) with an injected [`Track`]
//! into the usual `reset`/`step` contract: apply an action, advance physics,
//! resolve collisions, and report the discretized observation, shaped
//! reward, and termination flag. The episode loop itself lives in the
//! caller; rendering reads post-step state and never participates in the
//! reward or termination computation.

use log::debug;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::car::{Car, Steer};
use crate::config::{ConfigError, EnvConfig};
use crate::observation::Observation;
use crate::track::Track;

/// Errors raised by environment operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvError {
    #[error("expected {expected} actions for the active set, got {got}")]
    ActionCountMismatch { expected: usize, got: usize },

    #[error("action index {0} is out of range 0..5")]
    InvalidActionIndex(usize),
}

/// The closed action set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Action {
    RotateLeft,
    RotateRight,
    Accelerate,
    Brake,
    Coast,
}

impl Action {
    /// Number of actions.
    pub const COUNT: usize = 5;

    /// All actions in canonical order. This order is also the tie-break
    /// order for greedy action selection.
    pub const ALL: [Action; Action::COUNT] = [
        Action::RotateLeft,
        Action::RotateRight,
        Action::Accelerate,
        Action::Brake,
        Action::Coast,
    ];

    /// Canonical index of this action.
    pub fn index(self) -> usize {
        match self {
            Action::RotateLeft => 0,
            Action::RotateRight => 1,
            Action::Accelerate => 2,
            Action::Brake => 3,
            Action::Coast => 4,
        }
    }

    /// Converts an index into an action, failing fast when out of range.
    pub fn from_index(index: usize) -> Result<Action, EnvError> {
        Action::ALL
            .get(index)
            .copied()
            .ok_or(EnvError::InvalidActionIndex(index))
    }
}

/// Result of a single-agent environment step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,
}

/// Result of a population step.
///
/// All vectors align with the active set as it was when [`PopulationEnvironment::step`]
/// was called; the active set shrinks only after the results are assembled.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationStep {
    pub observations: Vec<Observation>,
    pub rewards: Vec<f64>,
    pub done: Vec<bool>,
    /// True once every car in the population has terminated.
    pub population_done: bool,
}

/// Single-car environment.
#[derive(Debug)]
pub struct CarEnvironment {
    track: Track,
    config: EnvConfig,
    car: Car,
    total_reward: f64,
}

impl CarEnvironment {
    /// Builds an environment over an injected track, validating the
    /// configuration up front.
    pub fn new(track: Track, config: EnvConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let car = Car::new(
            config.car.clone(),
            track.start_position(),
            track.spawn_heading(),
            0,
        );
        Ok(Self {
            track,
            config,
            car,
            total_reward: 0.0,
        })
    }

    /// Starts a new episode and returns the initial observation.
    pub fn reset(&mut self) -> Observation {
        self.total_reward = 0.0;
        self.car.reset();
        self.observe()
    }

    /// Applies an action, advances physics, resolves collisions, and
    /// reports the resulting transition.
    pub fn step(&mut self, action: Action) -> Step {
        apply_action(&mut self.car, action);
        if hits_obstacle(&self.car, &self.track) {
            self.car.handle_collision();
        }
        let observation = self.observe();
        let reward = reward_for(&self.car, &self.track, &self.config);
        self.total_reward += reward;
        let done = terminated(&self.car, &self.track, &self.config, self.total_reward);
        if done {
            debug!(
                "episode finished: total reward {:.2}, distance {:.1}",
                self.total_reward,
                self.car.distance_traveled()
            );
        }
        Step {
            observation,
            reward,
            done,
        }
    }

    /// The current discretized state, computed without advancing physics.
    pub fn observe(&self) -> Observation {
        observe(&self.car, &self.track, &self.config)
    }

    /// Read-only car state, for HUD rendering.
    pub fn car(&self) -> &Car {
        &self.car
    }

    /// Cumulative reward this episode.
    pub fn total_reward(&self) -> f64 {
        self.total_reward
    }

    pub fn track(&self) -> &Track {
        &self.track
    }
}

/// Fixed-size population of cars over one shared track.
///
/// "Population" is batched, not threaded: each call to
/// [`PopulationEnvironment::step`] processes the active cars sequentially in
/// ascending index order. The invariant
/// `active.len() == cars.len() - terminated_count` holds throughout an
/// episode, and the active set only shrinks until the next reset.
#[derive(Debug)]
pub struct PopulationEnvironment {
    track: Track,
    config: EnvConfig,
    cars: Vec<Car>,
    active: Vec<usize>,
    rewards: Vec<f64>,
}

impl PopulationEnvironment {
    /// Builds a population of `num_cars` cars sharing one track.
    pub fn new(track: Track, config: EnvConfig, num_cars: usize) -> Result<Self, ConfigError> {
        config.validate()?;
        if num_cars == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        let cars = (0..num_cars)
            .map(|i| {
                Car::new(
                    config.car.clone(),
                    track.start_position(),
                    track.spawn_heading(),
                    i as u64,
                )
            })
            .collect();
        Ok(Self {
            track,
            config,
            cars,
            active: (0..num_cars).collect(),
            rewards: vec![0.0; num_cars],
        })
    }

    /// Starts a new episode: every car back at spawn, the active set back to
    /// the full population. Returns one observation per car.
    pub fn reset(&mut self) -> Vec<Observation> {
        self.active = (0..self.cars.len()).collect();
        self.rewards.fill(0.0);
        for car in &mut self.cars {
            car.reset();
        }
        self.cars
            .iter()
            .map(|car| observe(car, &self.track, &self.config))
            .collect()
    }

    /// Steps every active car with its corresponding action.
    ///
    /// `actions` must contain exactly one action per active car; a mismatch
    /// fails fast. Output vectors align with the active set at call time.
    pub fn step(&mut self, actions: &[Action]) -> Result<PopulationStep, EnvError> {
        if actions.len() != self.active.len() {
            return Err(EnvError::ActionCountMismatch {
                expected: self.active.len(),
                got: actions.len(),
            });
        }

        let stepped: Vec<usize> = self.active.clone();
        let mut observations = Vec::with_capacity(stepped.len());
        let mut rewards = Vec::with_capacity(stepped.len());
        let mut done = Vec::with_capacity(stepped.len());

        for (&idx, &action) in stepped.iter().zip(actions) {
            let car = &mut self.cars[idx];
            apply_action(car, action);
            if hits_obstacle(car, &self.track) {
                car.handle_collision();
            }

            let car = &self.cars[idx];
            let reward = reward_for(car, &self.track, &self.config);
            self.rewards[idx] += reward;
            let finished = terminated(car, &self.track, &self.config, self.rewards[idx]);

            observations.push(observe(car, &self.track, &self.config));
            rewards.push(reward);
            done.push(finished);
        }

        self.active = stepped
            .iter()
            .zip(&done)
            .filter(|(_, &finished)| !finished)
            .map(|(&idx, _)| idx)
            .collect();
        let population_done = self.active.is_empty();
        if population_done {
            debug!(
                "population episode finished: best reward {:.2}",
                self.rewards[self.best_index()]
            );
        }

        Ok(PopulationStep {
            observations,
            rewards,
            done,
            population_done,
        })
    }

    /// Index of the car with the highest cumulative episode reward; ties go
    /// to the lowest index.
    pub fn best_index(&self) -> usize {
        let mut best = 0;
        for (i, &reward) in self.rewards.iter().enumerate().skip(1) {
            if reward > self.rewards[best] {
                best = i;
            }
        }
        best
    }

    /// Indices of the cars still running this episode, ascending.
    pub fn active(&self) -> &[usize] {
        &self.active
    }

    /// Per-car cumulative episode rewards, indexed by car.
    pub fn rewards(&self) -> &[f64] {
        &self.rewards
    }

    /// Read-only car states, for HUD rendering.
    pub fn cars(&self) -> &[Car] {
        &self.cars
    }

    pub fn num_cars(&self) -> usize {
        self.cars.len()
    }

    pub fn track(&self) -> &Track {
        &self.track
    }
}

fn apply_action(car: &mut Car, action: Action) {
    match action {
        Action::RotateLeft => car.rotate(Steer::Left),
        Action::RotateRight => car.rotate(Steer::Right),
        Action::Accelerate => car.accelerate_forward(),
        Action::Brake => car.accelerate_backward(),
        Action::Coast => car.coast(),
    }
    car.advance();
}

fn hits_obstacle(car: &Car, track: &Track) -> bool {
    car.collide(track.border(), (0.0, 0.0)).is_some()
        || track
            .grass()
            .is_some_and(|grass| car.collide(grass, (0.0, 0.0)).is_some())
}

fn on_finish(car: &Car, track: &Track) -> bool {
    car.collide(track.finish(), track.finish_position()).is_some()
}

/// Shaped reward for the car's current post-step state.
///
/// Boundary overlap dominates everything else; the finish zone pays out or
/// penalizes depending on the lap check; otherwise the reward is the signed
/// displacement of this frame, with reverse travel scaled up as a penalty so
/// the agent cannot farm reward by driving backward.
fn reward_for(car: &Car, track: &Track, config: &EnvConfig) -> f64 {
    if hits_obstacle(car, track) {
        return config.border_penalty;
    }
    if on_finish(car, track) {
        return if car.has_completed_lap(track) {
            config.finish_reward
        } else {
            config.wrong_way_penalty
        };
    }
    if car.velocity() > 0.0 {
        car.distance_this_frame()
    } else {
        -config.reverse_penalty_factor * car.distance_this_frame()
    }
}

/// An episode ends when the car is wedged, hopeless, or at the finish zone
/// (in either direction; a wrong-way crossing still ends the attempt).
fn terminated(car: &Car, track: &Track, config: &EnvConfig, total_reward: f64) -> bool {
    car.stuck_steps() >= config.stuck_timeout_steps
        || total_reward <= config.reward_floor
        || on_finish(car, track)
}

fn observe(car: &Car, track: &Track, config: &EnvConfig) -> Observation {
    let distances = car.ray_distances(track.border(), track.max_extent());
    Observation::encode(car.heading(), &distances, track.max_extent(), config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::{Mask, SpawnHeading};
    use assert_approx_eq::assert_approx_eq;

    /// A 200x200 field with no obstacles and an unreachable finish zone.
    fn open_track() -> Track {
        Track::new(
            Mask::empty(200, 200),
            None,
            Mask::empty(1, 1),
            (0.0, 0.0),
            (100.0, 100.0),
            SpawnHeading::Right,
        )
        .unwrap()
    }

    /// A field that is wall everywhere: the car collides on every step.
    fn walled_track() -> Track {
        Track::new(
            Mask::filled(200, 200),
            None,
            Mask::empty(1, 1),
            (0.0, 0.0),
            (100.0, 100.0),
            SpawnHeading::Right,
        )
        .unwrap()
    }

    fn finish_track(finish_position: (f64, f64)) -> Track {
        Track::new(
            Mask::empty(200, 200),
            None,
            Mask::filled(10, 10),
            finish_position,
            (100.0, 100.0),
            SpawnHeading::Right,
        )
        .unwrap()
    }

    #[test]
    fn action_index_round_trip() {
        for action in Action::ALL {
            assert_eq!(Action::from_index(action.index()), Ok(action));
        }
        assert_eq!(
            Action::from_index(5),
            Err(EnvError::InvalidActionIndex(5))
        );
    }

    #[test]
    fn accelerate_then_coast_profile() {
        let mut env = CarEnvironment::new(open_track(), EnvConfig::default()).unwrap();
        env.reset();

        let mut last_distance = 0.0;
        for _ in 0..5 {
            let step = env.step(Action::Accelerate);
            assert!(step.reward > 0.0);
            assert!(!step.done);
            assert!(env.car().distance_traveled() > last_distance);
            last_distance = env.car().distance_traveled();
        }

        // Velocity decays toward zero without changing sign, and once the
        // car has stopped the shaping reward is no longer positive.
        let mut last_velocity = env.car().velocity();
        loop {
            let step = env.step(Action::Coast);
            let velocity = env.car().velocity();
            assert!(velocity >= 0.0);
            assert!(velocity < last_velocity || velocity == 0.0);
            if velocity == 0.0 {
                assert!(step.reward <= 0.0);
                break;
            }
            last_velocity = velocity;
        }
    }

    #[test]
    fn border_collision_penalty_and_velocity_halving() {
        let mut env = CarEnvironment::new(walled_track(), EnvConfig::default()).unwrap();
        env.reset();

        // One accelerate step: velocity reaches 0.1, then the collision
        // response halves it.
        let step = env.step(Action::Accelerate);
        assert_eq!(step.reward, -10.0);
        assert_eq!(env.total_reward(), -10.0);
        assert_eq!(env.car().velocity(), 0.05);
    }

    #[test]
    fn grass_counts_as_boundary() {
        let mut grass = Mask::filled(200, 200);
        let road = Mask::from_fn(200, 200, |x, y| {
            (80..120).contains(&x) && (80..120).contains(&y)
        });
        grass.clear_where(&road);
        let track = Track::new(
            Mask::empty(200, 200),
            Some(grass),
            Mask::empty(1, 1),
            (0.0, 0.0),
            (100.0, 100.0),
            SpawnHeading::Right,
        )
        .unwrap();

        let mut env = CarEnvironment::new(track, EnvConfig::default()).unwrap();
        env.reset();
        // On the carved-out road there is no penalty.
        let step = env.step(Action::Accelerate);
        assert!(step.reward > 0.0);
    }

    #[test]
    fn stuck_timeout_terminates_episode() {
        let mut env = CarEnvironment::new(open_track(), EnvConfig::default()).unwrap();
        env.reset();
        for step_index in 1..=50 {
            let step = env.step(Action::Coast);
            if step_index < 50 {
                assert!(!step.done, "terminated early at step {}", step_index);
            } else {
                assert!(step.done);
            }
        }
    }

    #[test]
    fn reward_floor_terminates_episode() {
        let mut env = CarEnvironment::new(walled_track(), EnvConfig::default()).unwrap();
        env.reset();
        // Constant acceleration keeps the car moving (so it is never stuck)
        // while the wall charges -10 per step; the floor is -1000.
        let mut steps = 0;
        loop {
            steps += 1;
            if env.step(Action::Accelerate).done {
                break;
            }
            assert!(steps < 200, "episode failed to terminate");
        }
        assert_eq!(steps, 100);
        assert_eq!(env.total_reward(), -1000.0);
    }

    #[test]
    fn finish_zone_pays_out_after_a_full_lap() {
        // Spawn heading Right: a completed lap approaches with x at or below
        // the finish coordinate. The car coasts in place on the line.
        let mut env = CarEnvironment::new(finish_track((100.0, 95.0)), EnvConfig::default()).unwrap();
        env.reset();
        let step = env.step(Action::Coast);
        assert_eq!(step.reward, 100.0);
        assert!(step.done);
    }

    #[test]
    fn finish_zone_penalizes_a_wrong_way_crossing() {
        // Finish placed so the overlap happens from the far side of the line.
        let mut env = CarEnvironment::new(finish_track((95.0, 95.0)), EnvConfig::default()).unwrap();
        env.reset();
        let step = env.step(Action::Coast);
        assert_eq!(step.reward, -10.0);
        // The episode still ends; a failed crossing is a terminal outcome.
        assert!(step.done);
    }

    #[test]
    fn population_step_requires_matching_action_count() {
        let mut env = PopulationEnvironment::new(open_track(), EnvConfig::default(), 4).unwrap();
        env.reset();
        let err = env.step(&[Action::Coast; 3]).unwrap_err();
        assert_eq!(
            err,
            EnvError::ActionCountMismatch {
                expected: 4,
                got: 3
            }
        );
    }

    #[test]
    fn environments_are_debug_formattable() {
        // unwrap_err on a Result<Env, _> needs the Ok type to be Debug.
        let single = CarEnvironment::new(open_track(), EnvConfig::default()).unwrap();
        let population = PopulationEnvironment::new(open_track(), EnvConfig::default(), 2).unwrap();
        assert!(format!("{:?}", single).contains("CarEnvironment"));
        assert!(format!("{:?}", population).contains("PopulationEnvironment"));
    }

    #[test]
    fn population_rejects_zero_cars() {
        let err = PopulationEnvironment::new(open_track(), EnvConfig::default(), 0).unwrap_err();
        assert_eq!(err, ConfigError::EmptyPopulation);
    }

    #[test]
    fn population_active_set_shrinks_and_stays_aligned() {
        let mut env = PopulationEnvironment::new(open_track(), EnvConfig::default(), 4).unwrap();
        let observations = env.reset();
        assert_eq!(observations.len(), 4);
        assert_eq!(env.active(), &[0, 1, 2, 3]);

        // Car 2 keeps accelerating; the rest sit still until the stuck
        // timeout removes them all on the same step.
        let mut population_done = false;
        let mut steps = 0;
        while !population_done {
            steps += 1;
            let actions: Vec<Action> = env
                .active()
                .iter()
                .map(|&idx| {
                    if idx == 2 && steps <= 50 {
                        Action::Accelerate
                    } else {
                        Action::Coast
                    }
                })
                .collect();
            let result = env.step(&actions).unwrap();
            assert_eq!(result.observations.len(), result.rewards.len());
            assert_eq!(result.rewards.len(), result.done.len());
            assert_eq!(
                env.active().len(),
                env.num_cars() - result.done.iter().filter(|&&d| d).count()
                    - (4 - result.done.len())
            );
            population_done = result.population_done;
            if steps == 50 {
                // The three coasting cars timed out together; car 2 drives on.
                assert_eq!(env.active(), &[2]);
            }
            assert!(steps < 1000, "population failed to terminate");
        }

        assert_eq!(env.best_index(), 2);
        assert!(env.rewards()[2] > env.rewards()[0]);
    }

    #[test]
    fn population_rewards_accumulate_per_car() {
        let mut env = PopulationEnvironment::new(walled_track(), EnvConfig::default(), 2).unwrap();
        env.reset();
        let result = env.step(&[Action::Accelerate, Action::Accelerate]).unwrap();
        assert_eq!(result.rewards, vec![-10.0, -10.0]);
        assert_eq!(env.rewards(), &[-10.0, -10.0]);
    }

    #[test]
    fn best_index_prefers_first_on_ties() {
        let env = PopulationEnvironment::new(open_track(), EnvConfig::default(), 3).unwrap();
        assert_eq!(env.best_index(), 0);
    }

    #[test]
    fn observation_reflects_track_extent() {
        let mut env = CarEnvironment::new(open_track(), EnvConfig::default()).unwrap();
        let observation = env.reset();
        // Open field: every ray saturates at the diagonal extent and lands
        // in the last distance bin.
        assert!(observation.rays.iter().all(|&bin| bin == 4));
    }

    #[test]
    fn reverse_movement_is_penalized() {
        let mut env = CarEnvironment::new(open_track(), EnvConfig::default()).unwrap();
        env.reset();
        let step = env.step(Action::Brake);
        assert_approx_eq!(step.reward, -1.0, 1e-9);
    }
}
