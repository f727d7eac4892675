//! Tabular Q-learning agents.
//!
//! One polymorphic [`Agent`] interface with three population variants that
//! differ only in table storage and cloning policy:
//!
//! - [`IndependentTableAgent`]: one table per population member.
//! - [`SharedTableAgent`]: a single table read and written by every member.
//! - [`ElitistPopulationAgent`]: independent tables plus a post-episode
//!   clone-best step that overwrites every member's table with a deep copy
//!   of the best performer's.
//!
//! [`QLearningAgent`] is the standalone single-agent core the variants are
//! built from.

mod population;
mod single;
mod table;

pub use population::{ElitistPopulationAgent, IndependentTableAgent, SharedTableAgent};
pub use single::QLearningAgent;
pub use table::QTable;

use thiserror::Error;

use crate::environment::Action;
use crate::observation::Observation;

/// Errors raised by batch agent operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("batch arrays disagree in length: expected {expected}, got {got}")]
    BatchLengthMismatch { expected: usize, got: usize },

    #[error("agent index {index} is out of range for a population of {population}")]
    AgentIndexOutOfRange { index: usize, population: usize },
}

/// The capability set shared by all population agent variants.
///
/// Per-index operations panic on an out-of-range index; the batch operations
/// validate their inputs and fail fast with a descriptive error instead.
pub trait Agent {
    /// Population size.
    fn num_agents(&self) -> usize;

    /// Current exploration rate.
    fn epsilon(&self) -> f64;

    /// Overwrites the exploration rate. Epsilon decay across episodes is
    /// the driver's schedule; this is the mutation point it uses.
    fn set_epsilon(&mut self, epsilon: f64);

    /// Epsilon-greedy action selection for one population member.
    fn choose_action(&mut self, agent: usize, state: &Observation) -> Action;

    /// One temporal-difference update against the member's table.
    fn update(
        &mut self,
        agent: usize,
        state: &Observation,
        action: Action,
        reward: f64,
        next_state: &Observation,
    );

    /// Selects one action per listed member.
    ///
    /// `agents` and `states` must be parallel arrays, typically the
    /// environment's active set and its observations.
    fn choose_actions(
        &mut self,
        agents: &[usize],
        states: &[Observation],
    ) -> Result<Vec<Action>, AgentError> {
        if agents.len() != states.len() {
            return Err(AgentError::BatchLengthMismatch {
                expected: agents.len(),
                got: states.len(),
            });
        }
        self.check_indices(agents)?;
        Ok(agents
            .iter()
            .zip(states)
            .map(|(&agent, state)| self.choose_action(agent, state))
            .collect())
    }

    /// Applies one TD update per listed member.
    fn update_batch(
        &mut self,
        agents: &[usize],
        states: &[Observation],
        actions: &[Action],
        rewards: &[f64],
        next_states: &[Observation],
    ) -> Result<(), AgentError> {
        let expected = agents.len();
        for got in [states.len(), actions.len(), rewards.len(), next_states.len()] {
            if got != expected {
                return Err(AgentError::BatchLengthMismatch { expected, got });
            }
        }
        self.check_indices(agents)?;
        for i in 0..expected {
            self.update(agents[i], &states[i], actions[i], rewards[i], &next_states[i]);
        }
        Ok(())
    }

    #[doc(hidden)]
    fn check_indices(&self, agents: &[usize]) -> Result<(), AgentError> {
        let population = self.num_agents();
        for &index in agents {
            if index >= population {
                return Err(AgentError::AgentIndexOutOfRange { index, population });
            }
        }
        Ok(())
    }
}
