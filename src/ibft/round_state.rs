/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Bookkeeping of the proposal, prepares, and commits received in a single round.
//!
//! Prepares and commits can arrive before the proposal they refer to. Until a proposal is accepted,
//! they are kept without being validated. Once it is accepted, those that do not validate against it
//! are pruned, and every message arriving later is validated before being kept.

use std::collections::BTreeMap;

use crate::app::{App, AppError};
use crate::ibft::messages::{Commit, Prepare, PreparedCertificate, Proposal, SignedPayload};
use crate::ibft::validation::MessageValidator;
use crate::types::{
    block::{Block, CommitSeal},
    data_types::{Address, RoundIdentifier},
    validator_set::prepare_message_count_for_quorum,
};

pub(crate) struct RoundState {
    validator: MessageValidator,
    quorum: usize,
    proposal: Option<SignedPayload<Proposal>>,
    prepares: BTreeMap<Address, SignedPayload<Prepare>>,
    commits: BTreeMap<Address, SignedPayload<Commit>>,
}

impl RoundState {
    pub(crate) fn new(validator: MessageValidator, quorum: usize) -> Self {
        Self {
            validator,
            quorum,
            proposal: None,
            prepares: BTreeMap::new(),
            commits: BTreeMap::new(),
        }
    }

    pub(crate) fn round_identifier(&self) -> RoundIdentifier {
        self.validator.round_identifier()
    }

    /// Try to accept `proposal` as the proposal of this round. Returns whether it was newly accepted.
    ///
    /// A proposal that is identical to the one already accepted is not an error, but is not newly
    /// accepted either.
    pub(crate) fn set_proposal<A: App>(
        &mut self,
        proposal: SignedPayload<Proposal>,
        app: &A,
    ) -> Result<bool, AppError> {
        if let Some(accepted) = &self.proposal {
            self.validator.validate_subsequent_proposal(accepted, &proposal);
            return Ok(false);
        }

        if !self.validator.validate_proposal(&proposal, app)? {
            return Ok(false);
        }

        let validator = &self.validator;
        self.prepares
            .retain(|_, prepare| validator.validate_prepare(prepare, &proposal));
        self.commits
            .retain(|_, commit| validator.validate_commit(commit, &proposal));
        self.proposal = Some(proposal);
        Ok(true)
    }

    /// Try to add `prepare`. Returns whether it was added. A copy of a prepare already held is not.
    pub(crate) fn add_prepare(&mut self, prepare: SignedPayload<Prepare>) -> bool {
        if self.prepares.get(&prepare.sender()) == Some(&prepare) {
            return false;
        }
        if let Some(proposal) = &self.proposal {
            if !self.validator.validate_prepare(&prepare, proposal) {
                return false;
            }
        }
        self.prepares.insert(prepare.sender(), prepare);
        true
    }

    /// Try to add `commit`. Returns whether it was added. A copy of a commit already held is not.
    pub(crate) fn add_commit(&mut self, commit: SignedPayload<Commit>) -> bool {
        if self.commits.get(&commit.sender()) == Some(&commit) {
            return false;
        }
        if let Some(proposal) = &self.proposal {
            if !self.validator.validate_commit(&commit, proposal) {
                return false;
            }
        }
        self.commits.insert(commit.sender(), commit);
        true
    }

    pub(crate) fn is_prepared(&self) -> bool {
        self.proposal.is_some()
            && self.prepares.len() >= prepare_message_count_for_quorum(self.quorum)
    }

    pub(crate) fn is_committed(&self) -> bool {
        self.proposal.is_some() && self.commits.len() >= self.quorum
    }

    pub(crate) fn proposal(&self) -> Option<&SignedPayload<Proposal>> {
        self.proposal.as_ref()
    }

    pub(crate) fn proposed_block(&self) -> Option<&Block> {
        self.proposal.as_ref().map(|proposal| &proposal.payload.block)
    }

    /// Get proof that the proposal of this round was prepared, if it was.
    pub(crate) fn prepared_certificate(&self) -> Option<PreparedCertificate> {
        if !self.is_prepared() {
            return None;
        }
        self.proposal.clone().map(|proposal| PreparedCertificate {
            proposal,
            prepares: self.prepares.values().cloned().collect(),
        })
    }

    pub(crate) fn commit_seals(&self) -> Vec<CommitSeal> {
        self.commits
            .values()
            .map(|commit| commit.payload.commit_seal.clone())
            .collect()
    }
}
