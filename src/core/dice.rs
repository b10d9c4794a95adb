// src/core/dice.rs

//! A small sample domain used to exercise the protocol registry: rolling dice
//! and listing the rolls made so far.

use crate::core::RelayError;
use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::VecDeque;

const DICE_FACES: u8 = 6;
const MAX_DICE_PER_ROLL: u64 = 100;
/// Only the most recent rolls are kept.
const HISTORY_LIMIT: usize = 100;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DiceRoll {
    pub id: u64,
    pub faces: Vec<u8>,
    pub total: u32,
}

#[derive(Debug)]
struct DiceState {
    rng: SmallRng,
    next_id: u64,
    history: VecDeque<DiceRoll>,
}

#[derive(Debug)]
pub struct DiceService {
    state: Mutex<DiceState>,
}

impl DiceService {
    pub fn new() -> Self {
        Self::with_rng(SmallRng::from_entropy())
    }

    /// A service with a deterministic sequence of rolls.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(SmallRng::seed_from_u64(seed))
    }

    fn with_rng(rng: SmallRng) -> Self {
        Self {
            state: Mutex::new(DiceState {
                rng,
                next_id: 1,
                history: VecDeque::with_capacity(HISTORY_LIMIT),
            }),
        }
    }

    /// Rolls `diceCount` six-sided dice (default 1, at most 100).
    pub fn roll_dice(&self, data: &Map<String, Value>) -> Result<Value, RelayError> {
        let count = match data.get("diceCount") {
            None | Some(Value::Null) => 1,
            Some(value) => value.as_u64().ok_or_else(|| {
                RelayError::InvalidArgument(format!(
                    "diceCount must be a positive integer, got {value}"
                ))
            })?,
        };
        if count == 0 || count > MAX_DICE_PER_ROLL {
            return Err(RelayError::InvalidArgument(format!(
                "diceCount must be between 1 and {MAX_DICE_PER_ROLL}, got {count}"
            )));
        }

        let mut state = self.state.lock();
        let faces: Vec<u8> = (0..count)
            .map(|_| state.rng.gen_range(1..=DICE_FACES))
            .collect();
        let roll = DiceRoll {
            id: state.next_id,
            total: faces.iter().map(|f| u32::from(*f)).sum(),
            faces,
        };
        state.next_id += 1;

        if state.history.len() == HISTORY_LIMIT {
            state.history.pop_front();
        }
        state.history.push_back(roll.clone());
        serde_json::to_value(roll).map_err(|e| RelayError::Internal(e.to_string()))
    }

    /// Lists the rolls made so far, oldest first.
    pub fn dice_list(&self, _data: &Map<String, Value>) -> Result<Value, RelayError> {
        let state = self.state.lock();
        Ok(json!({
            "count": state.history.len(),
            "rolls": state.history,
        }))
    }
}

impl Default for DiceService {
    fn default() -> Self {
        Self::new()
    }
}
