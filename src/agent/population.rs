//! Population agent variants: independent tables, one shared table, and the
//! elitist clone-best scheme.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::table::QTable;
use super::{Agent, AgentError};
use crate::config::{ConfigError, LearningConfig};
use crate::environment::Action;
use crate::observation::Observation;

fn td_update(
    table: &mut QTable,
    learning_rate: f64,
    discount_factor: f64,
    state: &Observation,
    action: Action,
    reward: f64,
    next_state: &Observation,
) {
    let current = table.get(state, action);
    let target = reward + discount_factor * table.max_value(next_state);
    table.set(*state, action, current + learning_rate * (target - current));
}

fn epsilon_greedy(
    table: &QTable,
    epsilon: f64,
    rng: &mut StdRng,
    state: &Observation,
) -> Action {
    if rng.gen::<f64>() < epsilon {
        Action::ALL[rng.gen_range(0..Action::COUNT)]
    } else {
        table.best_action(state)
    }
}

/// A population where every member learns into its own table.
///
/// Exploration is sampled independently per call but driven by one seeded
/// RNG, so whole training runs stay reproducible.
#[derive(Debug, Clone)]
pub struct IndependentTableAgent {
    tables: Vec<QTable>,
    learning_rate: f64,
    discount_factor: f64,
    epsilon: f64,
    rng: StdRng,
}

impl IndependentTableAgent {
    pub fn new(config: &LearningConfig, num_agents: usize, seed: u64) -> Result<Self, ConfigError> {
        if num_agents == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        Ok(Self {
            tables: vec![QTable::new(); num_agents],
            learning_rate: config.learning_rate,
            discount_factor: config.discount_factor,
            epsilon: config.epsilon,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// The table belonging to one member.
    pub fn table(&self, agent: usize) -> &QTable {
        &self.tables[agent]
    }

    pub fn table_mut(&mut self, agent: usize) -> &mut QTable {
        &mut self.tables[agent]
    }

    pub fn tables(&self) -> &[QTable] {
        &self.tables
    }
}

impl Agent for IndependentTableAgent {
    fn num_agents(&self) -> usize {
        self.tables.len()
    }

    fn epsilon(&self) -> f64 {
        self.epsilon
    }

    fn set_epsilon(&mut self, epsilon: f64) {
        self.epsilon = epsilon;
    }

    fn choose_action(&mut self, agent: usize, state: &Observation) -> Action {
        epsilon_greedy(&self.tables[agent], self.epsilon, &mut self.rng, state)
    }

    fn update(
        &mut self,
        agent: usize,
        state: &Observation,
        action: Action,
        reward: f64,
        next_state: &Observation,
    ) {
        td_update(
            &mut self.tables[agent],
            self.learning_rate,
            self.discount_factor,
            state,
            action,
            reward,
            next_state,
        );
    }
}

/// A population where every member reads and writes one cooperative table.
///
/// There is no cloning step; every update is immediately visible to every
/// member. Exploration is still sampled independently per call.
#[derive(Debug, Clone)]
pub struct SharedTableAgent {
    table: QTable,
    num_agents: usize,
    learning_rate: f64,
    discount_factor: f64,
    epsilon: f64,
    rng: StdRng,
}

impl SharedTableAgent {
    pub fn new(config: &LearningConfig, num_agents: usize, seed: u64) -> Result<Self, ConfigError> {
        if num_agents == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        Ok(Self {
            table: QTable::new(),
            num_agents,
            learning_rate: config.learning_rate,
            discount_factor: config.discount_factor,
            epsilon: config.epsilon,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// The one shared table.
    pub fn table(&self) -> &QTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut QTable {
        &mut self.table
    }
}

impl Agent for SharedTableAgent {
    fn num_agents(&self) -> usize {
        self.num_agents
    }

    fn epsilon(&self) -> f64 {
        self.epsilon
    }

    fn set_epsilon(&mut self, epsilon: f64) {
        self.epsilon = epsilon;
    }

    fn choose_action(&mut self, agent: usize, state: &Observation) -> Action {
        assert!(
            agent < self.num_agents,
            "agent index {} out of range for population of {}",
            agent,
            self.num_agents
        );
        epsilon_greedy(&self.table, self.epsilon, &mut self.rng, state)
    }

    fn update(
        &mut self,
        agent: usize,
        state: &Observation,
        action: Action,
        reward: f64,
        next_state: &Observation,
    ) {
        assert!(
            agent < self.num_agents,
            "agent index {} out of range for population of {}",
            agent,
            self.num_agents
        );
        td_update(
            &mut self.table,
            self.learning_rate,
            self.discount_factor,
            state,
            action,
            reward,
            next_state,
        );
    }
}

/// Independent tables with a generational elitist step.
///
/// After each episode the driver asks the environment for the
/// best-performing member and calls [`ElitistPopulationAgent::clone_best`],
/// which overwrites every member's table with a deep copy of the winner's.
/// This is table cloning, not gradient sharing; after the clone the copies
/// evolve independently again.
#[derive(Debug, Clone)]
pub struct ElitistPopulationAgent {
    inner: IndependentTableAgent,
}

impl ElitistPopulationAgent {
    pub fn new(config: &LearningConfig, num_agents: usize, seed: u64) -> Result<Self, ConfigError> {
        Ok(Self {
            inner: IndependentTableAgent::new(config, num_agents, seed)?,
        })
    }

    /// Overwrites every member's table with a copy of member `best`'s.
    pub fn clone_best(&mut self, best: usize) -> Result<(), AgentError> {
        let population = self.inner.num_agents();
        if best >= population {
            return Err(AgentError::AgentIndexOutOfRange {
                index: best,
                population,
            });
        }
        let winner = self.inner.tables[best].clone();
        for table in &mut self.inner.tables {
            *table = winner.clone();
        }
        Ok(())
    }

    pub fn table(&self, agent: usize) -> &QTable {
        self.inner.table(agent)
    }

    pub fn table_mut(&mut self, agent: usize) -> &mut QTable {
        self.inner.table_mut(agent)
    }

    pub fn tables(&self) -> &[QTable] {
        self.inner.tables()
    }
}

impl Agent for ElitistPopulationAgent {
    fn num_agents(&self) -> usize {
        self.inner.num_agents()
    }

    fn epsilon(&self) -> f64 {
        self.inner.epsilon()
    }

    fn set_epsilon(&mut self, epsilon: f64) {
        self.inner.set_epsilon(epsilon);
    }

    fn choose_action(&mut self, agent: usize, state: &Observation) -> Action {
        self.inner.choose_action(agent, state)
    }

    fn update(
        &mut self,
        agent: usize,
        state: &Observation,
        action: Action,
        reward: f64,
        next_state: &Observation,
    ) {
        self.inner
            .update(agent, state, action, reward, next_state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::RAY_COUNT;

    fn state(heading: u8) -> Observation {
        Observation {
            heading,
            rays: [0; RAY_COUNT],
        }
    }

    fn config() -> LearningConfig {
        LearningConfig {
            epsilon: 0.0,
            ..LearningConfig::default()
        }
    }

    #[test]
    fn independent_tables_do_not_alias() {
        let mut agent = IndependentTableAgent::new(&config(), 3, 0).unwrap();
        agent.update(0, &state(0), Action::Accelerate, 10.0, &state(1));
        assert!(agent.table(0).get(&state(0), Action::Accelerate) > 0.0);
        assert_eq!(agent.table(1).get(&state(0), Action::Accelerate), 0.0);
        assert_eq!(agent.table(2).get(&state(0), Action::Accelerate), 0.0);
    }

    #[test]
    fn shared_table_is_visible_to_all_members() {
        let mut agent = SharedTableAgent::new(&config(), 3, 0).unwrap();
        agent.update(0, &state(0), Action::Accelerate, 10.0, &state(1));
        // Member 2's greedy choice sees member 0's update.
        assert_eq!(agent.choose_action(2, &state(0)), Action::Accelerate);
    }

    #[test]
    fn clone_best_copies_the_winner_everywhere() {
        let mut agent = ElitistPopulationAgent::new(&config(), 4, 0).unwrap();
        // Member 2 learns something the others do not.
        agent.update(2, &state(0), Action::Accelerate, 10.0, &state(1));
        agent.update(2, &state(1), Action::Coast, -2.0, &state(2));
        let winner = agent.table(2).clone();

        agent.clone_best(2).unwrap();
        for member in 0..4 {
            assert_eq!(agent.table(member), &winner);
        }
    }

    #[test]
    fn clones_stay_independent_after_the_copy() {
        let mut agent = ElitistPopulationAgent::new(&config(), 4, 0).unwrap();
        agent.update(2, &state(0), Action::Accelerate, 10.0, &state(1));
        agent.clone_best(2).unwrap();

        agent
            .table_mut(0)
            .set(state(0), Action::Accelerate, 99.0);
        assert_ne!(
            agent.table(1).get(&state(0), Action::Accelerate),
            99.0
        );
    }

    #[test]
    fn clone_best_rejects_bad_index() {
        let mut agent = ElitistPopulationAgent::new(&config(), 2, 0).unwrap();
        let err = agent.clone_best(7).unwrap_err();
        assert_eq!(
            err,
            AgentError::AgentIndexOutOfRange {
                index: 7,
                population: 2
            }
        );
    }

    #[test]
    fn zero_member_population_is_rejected() {
        assert_eq!(
            IndependentTableAgent::new(&config(), 0, 0).unwrap_err(),
            ConfigError::EmptyPopulation
        );
        assert_eq!(
            SharedTableAgent::new(&config(), 0, 0).unwrap_err(),
            ConfigError::EmptyPopulation
        );
    }
}
