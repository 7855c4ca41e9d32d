/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types and functions that store information about validator sets and the quorums formed from them.

use std::slice;

use super::data_types::Address;

/// Stores the addresses of the validators responsible for agreeing on blocks at one height.
///
/// ## Ordering of validators
///
/// `ValidatorSet` internally maintains the list of validators in ascending order of their
/// `Address`es, without duplicates. Every node therefore agrees on the position of each validator,
/// which is what [proposer selection](crate::ibft::roles::proposer_for) relies on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidatorSet {
    validators: Vec<Address>,
}

impl ValidatorSet {
    /// Create a validator set containing `validators`. Duplicate addresses are only included once.
    pub fn new(validators: impl IntoIterator<Item = Address>) -> ValidatorSet {
        let mut validators: Vec<Address> = validators.into_iter().collect();
        validators.sort();
        validators.dedup();
        Self { validators }
    }

    pub fn contains(&self, validator: &Address) -> bool {
        self.validators.binary_search(validator).is_ok()
    }

    /// Get the position of `validator` in the [ordering of validators](Self#ordering-of-validators),
    /// if it is in the validator set.
    pub fn position(&self, validator: &Address) -> Option<usize> {
        self.validators.binary_search(validator).ok()
    }

    /// Get the validator at `position` in the [ordering of validators](Self#ordering-of-validators).
    pub fn get(&self, position: usize) -> Option<&Address> {
        self.validators.get(position)
    }

    pub fn validators(&self) -> slice::Iter<'_, Address> {
        self.validators.iter()
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Get the quorum size of this validator set. See [`quorum`].
    pub fn quorum(&self) -> usize {
        quorum(self.len())
    }
}

impl FromIterator<Address> for ValidatorSet {
    fn from_iter<T: IntoIterator<Item = Address>>(iter: T) -> Self {
        ValidatorSet::new(iter)
    }
}

/// Compute the minimum number of distinct validators that must attest to something for their
/// attestations to form a certificate, given a validator set of size `validator_count`.
///
/// The quorum is `⌈2n/3⌉`: 2 for n = 3, 3 for n = 4, 4 for n = 6, 5 for n = 7. Any two quorums of the
/// same validator set intersect in at least one honest validator as long as at most `f` of
/// `n = 3f + 1` validators are faulty.
pub fn quorum(validator_count: usize) -> usize {
    (2 * validator_count + 2) / 3
}

/// Compute the number of Prepare messages that, together with the Proposal, make up `quorum`
/// attestations for a block.
pub fn prepare_message_count_for_quorum(quorum: usize) -> usize {
    quorum.saturating_sub(1)
}
