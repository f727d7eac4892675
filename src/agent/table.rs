//! The Q-table: an explicit mapping from (state, action) to value estimates.

use std::collections::HashMap;

use crate::environment::Action;
use crate::observation::Observation;

/// A tabular action-value function.
///
/// Unseen pairs read as 0.0 — one explicit default everywhere, so greedy
/// selection and the TD target agree on what "unknown" is worth. Cloning a
/// table produces an independent deep copy; mutating one clone never shows
/// through another.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QTable {
    values: HashMap<(Observation, Action), f64>,
}

impl QTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The value estimate for `(state, action)`, 0.0 when unseen.
    pub fn get(&self, state: &Observation, action: Action) -> f64 {
        self.values.get(&(*state, action)).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, state: Observation, action: Action, value: f64) {
        self.values.insert((state, action), value);
    }

    /// The maximum value over the full action set for `state`.
    pub fn max_value(&self, state: &Observation) -> f64 {
        Action::ALL
            .iter()
            .map(|&action| self.get(state, action))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// The greedy action for `state`.
    ///
    /// Ties break toward the first action in [`Action::ALL`] order, so the
    /// result is deterministic for any table contents.
    pub fn best_action(&self, state: &Observation) -> Action {
        let mut best = Action::ALL[0];
        let mut best_value = self.get(state, best);
        for &action in &Action::ALL[1..] {
            let value = self.get(state, action);
            if value > best_value {
                best = action;
                best_value = value;
            }
        }
        best
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over stored entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&(Observation, Action), &f64)> {
        self.values.iter()
    }
}

// Tables serialize as an entry list rather than a map: the composite key is
// not a string, and formats like JSON only accept string map keys.
#[cfg(feature = "serde")]
impl serde::Serialize for QTable {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(self.values.len()))?;
        for ((state, action), value) in &self.values {
            seq.serialize_element(&(state, action, value))?;
        }
        seq.end()
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for QTable {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = Vec::<(Observation, Action, f64)>::deserialize(deserializer)?;
        Ok(Self {
            values: entries
                .into_iter()
                .map(|(state, action, value)| ((state, action), value))
                .collect(),
        })
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

    #[test]
    fn unseen_pairs_default_to_zero() {
        let table = QTable::new();
        assert_eq!(table.get(&state(0), Action::Accelerate), 0.0);
        assert_eq!(table.max_value(&state(0)), 0.0);
    }

    #[test]
    fn best_action_breaks_ties_toward_first() {
        let table = QTable::new();
        // Everything unseen: the first action in canonical order wins.
        assert_eq!(table.best_action(&state(0)), Action::RotateLeft);

        let mut table = QTable::new();
        table.set(state(0), Action::Brake, 2.0);
        table.set(state(0), Action::Coast, 2.0);
        assert_eq!(table.best_action(&state(0)), Action::Brake);
    }

    #[test]
    fn best_action_prefers_strictly_higher_values() {
        let mut table = QTable::new();
        table.set(state(0), Action::Accelerate, 1.5);
        table.set(state(0), Action::RotateLeft, 1.0);
        assert_eq!(table.best_action(&state(0)), Action::Accelerate);
    }

    #[test]
    fn max_value_covers_negative_tables() {
        let mut table = QTable::new();
        for action in Action::ALL {
            table.set(state(3), action, -5.0);
        }
        assert_eq!(table.max_value(&state(3)), -5.0);
    }

    #[test]
    fn clones_are_independent() {
        let mut a = QTable::new();
        a.set(state(1), Action::Coast, 4.0);
        let b = a.clone();
        a.set(state(1), Action::Coast, 9.0);
        assert_eq!(b.get(&state(1), Action::Coast), 4.0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_round_trips_the_mapping() {
        let mut table = QTable::new();
        table.set(state(2), Action::Accelerate, 1.25);
        table.set(state(7), Action::RotateRight, -3.5);
        let json = serde_json::to_string(&table).unwrap();
        let back: QTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
    }
}
