//! The single-agent Q-learning core.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::table::QTable;
use crate::config::LearningConfig;
use crate::environment::Action;
use crate::observation::Observation;

/// A tabular epsilon-greedy Q-learning agent for one car.
///
/// Holds its own seeded RNG so runs are reproducible end to end.
#[derive(Debug, Clone)]
pub struct QLearningAgent {
    table: QTable,
    learning_rate: f64,
    discount_factor: f64,
    epsilon: f64,
    rng: StdRng,
}

impl QLearningAgent {
    pub fn new(config: &LearningConfig, seed: u64) -> Self {
        Self {
            table: QTable::new(),
            learning_rate: config.learning_rate,
            discount_factor: config.discount_factor,
            epsilon: config.epsilon,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Epsilon-greedy selection: explore uniformly with probability epsilon,
    /// otherwise take the table's greedy action (deterministic tie-break).
    pub fn choose_action(&mut self, state: &Observation) -> Action {
        if self.rng.gen::<f64>() < self.epsilon {
            Action::ALL[self.rng.gen_range(0..Action::COUNT)]
        } else {
            self.table.best_action(state)
        }
    }

    /// One temporal-difference update:
    /// `Q(s,a) += alpha * (r + gamma * max_a' Q(s',a') - Q(s,a))`.
    ///
    /// The max over the next state runs over the full action set with the
    /// table's 0.0 default for unseen pairs. The table is self-consistent
    /// the moment this returns, so an episode can be abandoned between
    /// updates without corruption.
    pub fn update(
        &mut self,
        state: &Observation,
        action: Action,
        reward: f64,
        next_state: &Observation,
    ) {
        let current = self.table.get(state, action);
        let next_max = self.table.max_value(next_state);
        let target = reward + self.discount_factor * next_max;
        self.table
            .set(*state, action, current + self.learning_rate * (target - current));
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.epsilon = epsilon;
    }

    /// The learned table, for persistence or inspection.
    pub fn table(&self) -> &QTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut QTable {
        &mut self.table
    }

    /// Replaces the learned table, e.g. with one restored by the driver.
    pub fn set_table(&mut self, table: QTable) {
        self.table = table;
    }
}
