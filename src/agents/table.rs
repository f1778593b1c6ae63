use crate::env::Direction;
use crate::util::argmax;

/// Tabular action values, one row of four per state index.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueTable {
    rows: Vec<[f64; 4]>,
}

impl ValueTable {
    /// Creates `capacity` rows with every slot set to `initial`.
    pub fn new(capacity: usize, initial: f64) -> ValueTable {
        ValueTable {
            rows: vec![[initial; 4]; capacity],
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, state: usize) -> Option<&[f64; 4]> {
        self.rows.get(state)
    }

    /// Overwrites a single slot, out-of-range states are ignored.
    pub fn set(&mut self, state: usize, action: Direction, value: f64) {
        if let Some(row) = self.rows.get_mut(state) {
            row[action.id()] = value;
        }
    }

    /// `max_a Q[state][a]`
    pub fn best_value(&self, state: usize) -> Option<f64> {
        let row = self.rows.get(state)?;
        argmax(row.iter()).map(|a| row[a])
    }

    /// Temporal difference update of `Q[state][action]`.
    ///
    /// `next` is `None` for terminal transitions, which bootstrap with 0.
    /// Returns the new value or `None` if an index is out of range.
    pub fn update(
        &mut self,
        state: usize,
        action: Direction,
        reward: f64,
        next: Option<usize>,
        learning_rate: f64,
        discount: f64,
    ) -> Option<f64> {
        let future = match next {
            Some(next) => self.best_value(next)?,
            None => 0.0,
        };
        let q = self.rows.get_mut(state)?.get_mut(action.id())?;
        *q = (1.0 - learning_rate) * *q + learning_rate * (reward + discount * future);
        Some(*q)
    }

    /// Mean over all slots.
    pub fn average(&self) -> f64 {
        if self.rows.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.rows.iter().flatten().sum();
        sum / (self.rows.len() * 4) as f64
    }
}
