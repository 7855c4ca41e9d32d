/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that determine what role a validator should play in a given round.

use crate::types::{
    data_types::{Address, RoundIdentifier},
    validator_set::ValidatorSet,
};

/// Get the proposer of `round`.
///
/// Proposers are selected round-robin over the [ordering of validators](ValidatorSet): the proposer of
/// round `r` at height `h` is the validator at position `(h + r) mod n`. Returns `None` only if
/// `validator_set` is empty.
pub fn proposer_for(round: &RoundIdentifier, validator_set: &ValidatorSet) -> Option<Address> {
    if validator_set.is_empty() {
        return None;
    }
    let n = validator_set.len() as u128;
    let position = (round.height.int() as u128 + round.round.int() as u128) % n;
    validator_set.get(position as usize).copied()
}

/// Check whether `validator` is the proposer of `round`.
pub fn is_proposer(validator: &Address, round: &RoundIdentifier, validator_set: &ValidatorSet) -> bool {
    proposer_for(round, validator_set).is_some_and(|proposer| proposer == *validator)
}
