//! raceline - circuit-driving simulation and tabular Q-learning.
//!
//! Simulates a car on a closed circuit (ray-cast sensing against occupancy
//! masks, soft-bump collisions, direction-aware lap detection) and trains
//! epsilon-greedy Q-learning agents against it, either one car at a time or
//! as a batched population with an elitist clone-best scheme.
//!
//! The crate is pull-driven. An external driver owns the episode loop,
//! rendering, input, table persistence, and epsilon scheduling; it calls
//! [`CarEnvironment::reset`] / [`CarEnvironment::step`] (or the
//! [`PopulationEnvironment`] equivalents), routes observations through an
//! [`agent`] implementation, and feeds transitions back into `update`. The
//! track is an injected read-only resource supplied already decoded and
//! scaled.

pub mod agent;
pub mod car;
pub mod config;
pub mod environment;
pub mod observation;
pub mod track;

pub use agent::{
    Agent, AgentError, ElitistPopulationAgent, IndependentTableAgent, QLearningAgent, QTable,
    SharedTableAgent,
};
pub use car::{Car, Steer};
pub use config::{CarConfig, ConfigError, EnvConfig, LearningConfig};
pub use environment::{
    Action, CarEnvironment, EnvError, PopulationEnvironment, PopulationStep, Step,
};
pub use observation::{discretize, Observation};
pub use track::{has_completed_lap, Mask, SpawnHeading, Track, TrackError, RAY_COUNT};
