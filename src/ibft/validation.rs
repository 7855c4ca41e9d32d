/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Rules that decide whether a received message is acceptable.
//!
//! Validators in this module are predicates: they never change protocol state. When a message is
//! rejected, a [`RejectMessage`](crate::events::RejectMessageEvent) event describing why is published,
//! and `false` is returned. Rejections are not errors, since Byzantine validators are expected to send
//! invalid messages. The only errors returned are [`AppError`]s from validating block headers.
//!
//! ## Validators
//!
//! - [`MessageValidator`]: validates Proposal, Prepare, and Commit messages for one round. Created for
//!   any round through a [`MessageValidatorFactory`], which captures everything about the height that
//!   does not change from round to round.
//! - [`RoundChangeMessageValidator`]: validates RoundChange messages, including the prepared
//!   certificate they may carry.
//! - [`NewRoundMessageValidator`]: validates NewRound messages, including the round change certificate
//!   and the proposal they carry.
//! - [`validate_commit_seals`]: validates the commit seals of a committed block.

use std::collections::BTreeSet;
use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::app::{App, AppError, ValidateBlockHeaderRequest};
use crate::events::{Event, RejectMessageEvent, RejectReason};
use crate::ibft::messages::*;
use crate::ibft::roles::{is_proposer, proposer_for};
use crate::types::{
    block::{Block, BlockHeader},
    data_types::{Address, BlockHeight, RoundIdentifier},
    validator_set::{prepare_message_count_for_quorum, quorum, ValidatorSet},
};

/// Validates Proposal, Prepare, and Commit messages for a single round.
#[derive(Clone)]
pub(crate) struct MessageValidator {
    validator_set: ValidatorSet,
    expected_proposer: Option<Address>,
    round: RoundIdentifier,
    parent_header: BlockHeader,
    event_publisher: Option<Sender<Event>>,
}

impl MessageValidator {
    pub(crate) fn round_identifier(&self) -> RoundIdentifier {
        self.round
    }

    /// Check that `proposal` is for this validator's round, is sent by the round's proposer, and
    /// proposes a block whose header is valid and belongs to this round.
    pub(crate) fn validate_proposal<A: App>(
        &self,
        proposal: &SignedPayload<Proposal>,
        app: &A,
    ) -> Result<bool, AppError> {
        let origin = proposal.sender();
        let round = proposal.round_identifier();

        if round != self.round {
            return Ok(self.reject(round, origin, RejectReason::WrongRound));
        }

        if self.expected_proposer != Some(origin) {
            return Ok(self.reject(round, origin, RejectReason::UnexpectedProposer));
        }

        let block = &proposal.payload.block;
        if block.height() != self.round.height || block.round() != self.round.round {
            return Ok(self.reject(round, origin, RejectReason::BlockRoundMismatch));
        }

        if !block.is_correct()
            || !app.validate_block_header(ValidateBlockHeaderRequest::new(
                &block.header,
                &self.parent_header,
            ))?
        {
            return Ok(self.reject(round, origin, RejectReason::InvalidBlockHeader));
        }

        Ok(true)
    }

    /// Check that a proposal received after `accepted` was accepted for this round is identical to it.
    pub(crate) fn validate_subsequent_proposal(
        &self,
        accepted: &SignedPayload<Proposal>,
        proposal: &SignedPayload<Proposal>,
    ) -> bool {
        if accepted.sender() != proposal.sender() || accepted.payload != proposal.payload {
            return self.reject(
                proposal.round_identifier(),
                proposal.sender(),
                RejectReason::ConflictingProposal,
            );
        }
        true
    }

    /// Check that `prepare` is for this round, is sent by a validator other than the proposer, and
    /// refers to the block in `proposal`.
    pub(crate) fn validate_prepare(
        &self,
        prepare: &SignedPayload<Prepare>,
        proposal: &SignedPayload<Proposal>,
    ) -> bool {
        let origin = prepare.sender();
        let round = prepare.round_identifier();

        if round != self.round {
            return self.reject(round, origin, RejectReason::WrongRound);
        }

        if !self.validator_set.contains(&origin) {
            return self.reject(round, origin, RejectReason::NotAValidator);
        }

        // The proposal stands in for the proposer's prepare.
        if origin == proposal.sender() {
            return self.reject(round, origin, RejectReason::ProposerSentPrepare);
        }

        if prepare.payload.digest != proposal.payload.block.hash() {
            return self.reject(round, origin, RejectReason::DigestMismatch);
        }

        true
    }

    /// Check that `commit` is for this round, is sent by a validator, refers to the block in
    /// `proposal`, and carries a commit seal made by its sender.
    pub(crate) fn validate_commit(
        &self,
        commit: &SignedPayload<Commit>,
        proposal: &SignedPayload<Proposal>,
    ) -> bool {
        let origin = commit.sender();
        let round = commit.round_identifier();

        if round != self.round {
            return self.reject(round, origin, RejectReason::WrongRound);
        }

        if !self.validator_set.contains(&origin) {
            return self.reject(round, origin, RejectReason::NotAValidator);
        }

        let block_hash = proposal.payload.block.hash();
        if commit.payload.digest != block_hash {
            return self.reject(round, origin, RejectReason::DigestMismatch);
        }

        if commit.payload.commit_seal.recover_committer(&block_hash) != Some(origin) {
            return self.reject(round, origin, RejectReason::CommitSealSignerMismatch);
        }

        true
    }

    fn reject(&self, round: RoundIdentifier, origin: Address, reason: RejectReason) -> bool {
        publish_rejection(&self.event_publisher, round, origin, reason)
    }
}

/// Creates [`MessageValidator`]s for any round of one height.
#[derive(Clone)]
pub(crate) struct MessageValidatorFactory {
    validator_set: ValidatorSet,
    parent_header: BlockHeader,
    event_publisher: Option<Sender<Event>>,
}

impl MessageValidatorFactory {
    pub(crate) fn new(
        validator_set: ValidatorSet,
        parent_header: BlockHeader,
        event_publisher: Option<Sender<Event>>,
    ) -> Self {
        Self {
            validator_set,
            parent_header,
            event_publisher,
        }
    }

    pub(crate) fn create_at(&self, round: RoundIdentifier) -> MessageValidator {
        MessageValidator {
            validator_set: self.validator_set.clone(),
            expected_proposer: proposer_for(&round, &self.validator_set),
            round,
            parent_header: self.parent_header.clone(),
            event_publisher: self.event_publisher.clone(),
        }
    }

    pub(crate) fn validator_set(&self) -> &ValidatorSet {
        &self.validator_set
    }

    pub(crate) fn quorum(&self) -> usize {
        self.validator_set.quorum()
    }

    /// Get the height that the validators created by this factory validate messages for.
    pub(crate) fn height(&self) -> BlockHeight {
        self.parent_header.height + 1
    }
}

/// Validates RoundChange messages for one height.
#[derive(Clone)]
pub(crate) struct RoundChangeMessageValidator {
    factory: MessageValidatorFactory,
}

impl RoundChangeMessageValidator {
    pub(crate) fn new(factory: MessageValidatorFactory) -> Self {
        Self { factory }
    }

    /// Check that `round_change` is sent by a validator for a round of this height, and that its
    /// prepared certificate, if any, is a valid proof that a block was prepared in an earlier round.
    pub(crate) fn validate<A: App>(
        &self,
        round_change: &SignedPayload<RoundChange>,
        app: &A,
    ) -> Result<bool, AppError> {
        let origin = round_change.sender();
        let round = round_change.round_identifier();

        if !self.factory.validator_set().contains(&origin) {
            return Ok(self.reject(round, origin, RejectReason::NotAValidator));
        }

        if round.height != self.factory.height() {
            return Ok(self.reject(round, origin, RejectReason::WrongHeight));
        }

        match &round_change.payload.prepared_certificate {
            Some(prepared_certificate) => {
                self.validate_prepared_certificate(prepared_certificate, round, origin, app)
            }
            None => Ok(true),
        }
    }

    fn validate_prepared_certificate<A: App>(
        &self,
        prepared_certificate: &PreparedCertificate,
        target_round: RoundIdentifier,
        origin: Address,
        app: &A,
    ) -> Result<bool, AppError> {
        let prepared_round = prepared_certificate.round_identifier();
        if prepared_round.height != target_round.height || prepared_round.round >= target_round.round
        {
            return Ok(self.reject(
                target_round,
                origin,
                RejectReason::PreparedCertificateNotFromPriorRound,
            ));
        }

        let preparers: BTreeSet<Address> = prepared_certificate
            .prepares
            .iter()
            .map(|prepare| prepare.sender())
            .collect();
        if preparers.len() < prepare_message_count_for_quorum(self.factory.quorum()) {
            return Ok(self.reject(
                target_round,
                origin,
                RejectReason::InsufficientPreparedEvidence,
            ));
        }

        let validator = self.factory.create_at(prepared_round);
        if !validator.validate_proposal(&prepared_certificate.proposal, app)? {
            return Ok(self.reject(target_round, origin, RejectReason::InvalidPreparedCertificate));
        }

        let all_prepares_valid = prepared_certificate
            .prepares
            .iter()
            .all(|prepare| validator.validate_prepare(prepare, &prepared_certificate.proposal));
        if !all_prepares_valid {
            return Ok(self.reject(target_round, origin, RejectReason::InvalidPreparedCertificate));
        }

        Ok(true)
    }

    fn reject(&self, round: RoundIdentifier, origin: Address, reason: RejectReason) -> bool {
        publish_rejection(&self.factory.event_publisher, round, origin, reason)
    }
}

/// Validates NewRound messages for one height.
#[derive(Clone)]
pub(crate) struct NewRoundMessageValidator {
    factory: MessageValidatorFactory,
    round_change_validator: RoundChangeMessageValidator,
}

impl NewRoundMessageValidator {
    pub(crate) fn new(factory: MessageValidatorFactory) -> Self {
        Self {
            round_change_validator: RoundChangeMessageValidator::new(factory.clone()),
            factory,
        }
    }

    /// Check that `new_round` is sent by the proposer of a non-zero round of this height, carries a
    /// quorum of valid round changes for that round, and proposes a valid block. If any of the round
    /// changes carries a prepared certificate, the proposed block must be the block prepared in the
    /// latest round.
    pub(crate) fn validate<A: App>(
        &self,
        new_round: &SignedPayload<NewRound>,
        app: &A,
    ) -> Result<bool, AppError> {
        let origin = new_round.sender();
        let round = new_round.round_identifier();

        if round.height != self.factory.height() {
            return Ok(self.reject(round, origin, RejectReason::WrongHeight));
        }

        if round.round.is_init() {
            return Ok(self.reject(round, origin, RejectReason::NewRoundForRoundZero));
        }

        if !is_proposer(&origin, &round, self.factory.validator_set()) {
            return Ok(self.reject(round, origin, RejectReason::UnexpectedProposer));
        }

        let proposal = &new_round.payload.proposal;
        if proposal.round_identifier() != round {
            return Ok(self.reject(round, origin, RejectReason::WrongRound));
        }

        let round_change_certificate = match &new_round.payload.round_change_certificate {
            Some(round_change_certificate) => round_change_certificate,
            None => {
                return Ok(self.reject(
                    round,
                    origin,
                    RejectReason::MissingRoundChangeCertificate,
                ))
            }
        };

        if !self.validate_round_change_certificate(round_change_certificate, round, origin, app)? {
            return Ok(false);
        }

        if !self.factory.create_at(round).validate_proposal(proposal, app)? {
            return Ok(false);
        }

        if let Some(prepared_certificate) = round_change_certificate.latest_prepared_certificate() {
            if prepared_certificate.block().hash() != proposal.payload.block.hash() {
                return Ok(self.reject(
                    round,
                    origin,
                    RejectReason::ProposalDoesNotMatchPreparedBlock,
                ));
            }
        }

        Ok(true)
    }

    fn validate_round_change_certificate<A: App>(
        &self,
        round_change_certificate: &RoundChangeCertificate,
        round: RoundIdentifier,
        origin: Address,
        app: &A,
    ) -> Result<bool, AppError> {
        let round_changes = &round_change_certificate.round_changes;

        if round_changes.len() < self.factory.quorum() {
            return Ok(self.reject(
                round,
                origin,
                RejectReason::InsufficientRoundChangeCertificate,
            ));
        }

        if round_changes
            .iter()
            .any(|round_change| round_change.round_identifier() != round)
        {
            return Ok(self.reject(
                round,
                origin,
                RejectReason::RoundChangeCertificateRoundMismatch,
            ));
        }

        let senders: BTreeSet<Address> = round_change_certificate.senders().into_iter().collect();
        if senders.len() != round_changes.len() {
            return Ok(self.reject(round, origin, RejectReason::DuplicateRoundChangeSender));
        }

        for round_change in round_changes {
            if !self.round_change_validator.validate(round_change, app)? {
                return Ok(self.reject(
                    round,
                    origin,
                    RejectReason::InvalidRoundChangeInCertificate,
                ));
            }
        }

        Ok(true)
    }

    fn reject(&self, round: RoundIdentifier, origin: Address, reason: RejectReason) -> bool {
        publish_rejection(&self.factory.event_publisher, round, origin, reason)
    }
}

/// Check that the commit seals in the header of `block` were made over its hash by at least a quorum
/// of distinct members of `validator_set`, and by no one else.
pub fn validate_commit_seals(block: &Block, validator_set: &ValidatorSet) -> Result<(), RejectReason> {
    let block_hash = block.hash();
    let mut committers = BTreeSet::new();
    for commit_seal in &block.header.commit_seals {
        match commit_seal.recover_committer(&block_hash) {
            Some(committer) if validator_set.contains(&committer) => {
                committers.insert(committer);
            }
            _ => return Err(RejectReason::CommitterNotAValidator),
        }
    }

    if committers.len() < quorum(validator_set.len()) {
        return Err(RejectReason::InsufficientCommitSeals);
    }

    Ok(())
}

fn publish_rejection(
    event_publisher: &Option<Sender<Event>>,
    round: RoundIdentifier,
    origin: Address,
    reason: RejectReason,
) -> bool {
    Event::publish(
        event_publisher,
        Event::RejectMessage(RejectMessageEvent {
            timestamp: SystemTime::now(),
            round,
            origin,
            reason,
        }),
    );
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ibft::test_utils::*;
    use crate::types::block::CommitSeal;
    use std::sync::mpsc;

    fn factory(net: &TestNet) -> MessageValidatorFactory {
        MessageValidatorFactory::new(net.validator_set(), net.parent.clone(), None)
    }

    /// A factory whose validators publish to the returned receiver.
    fn publishing_factory(net: &TestNet) -> (MessageValidatorFactory, mpsc::Receiver<Event>) {
        let (event_publisher, events) = mpsc::channel();
        let factory =
            MessageValidatorFactory::new(net.validator_set(), net.parent.clone(), Some(event_publisher));
        (factory, events)
    }

    fn rejections(events: &mpsc::Receiver<Event>) -> Vec<RejectReason> {
        events
            .try_iter()
            .filter_map(|event| match event {
                Event::RejectMessage(event) => Some(event.reason),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn proposal_must_come_from_the_expected_proposer() {
        let net = TestNet::new(4);
        let round = round_id(1, 0);
        let validator = factory(&net).create_at(round);
        let app = net.app();

        let good = net.proposal(round);
        let bad = net.proposal_by(net.non_proposer(round), round);

        assert!(validator.validate_proposal(&good, &app).unwrap());
        assert!(!validator.validate_proposal(&bad, &app).unwrap());
    }

    #[test]
    fn proposal_for_another_round_or_with_a_bad_header_is_rejected() {
        let net = TestNet::new(4);
        let round = round_id(1, 0);
        let (factory, events) = publishing_factory(&net);
        let app = net.app();

        let other_round = net.proposal(round_id(1, 1));
        assert!(!factory
            .create_at(round)
            .validate_proposal(&other_round, &app)
            .unwrap());

        let mut block = net.block(round);
        block.header.parent_hash = block.hash();
        let bad_header = net.sign(net.proposer(round), Proposal { round, block });
        assert!(!factory
            .create_at(round)
            .validate_proposal(&bad_header, &app)
            .unwrap());

        assert_eq!(
            rejections(&events),
            vec![RejectReason::WrongRound, RejectReason::InvalidBlockHeader]
        );
    }

    #[test]
    fn a_second_proposal_must_repeat_the_accepted_one() {
        let net = TestNet::new(4);
        let round = round_id(1, 0);
        let (factory, events) = publishing_factory(&net);
        let validator = factory.create_at(round);
        let accepted = net.proposal(round);

        let mut other_block = net.block(round);
        other_block.header.timestamp += 1;
        let other_block = net.sign(
            net.proposer(round),
            Proposal {
                round,
                block: other_block,
            },
        );
        let other_sender = net.proposal_by(net.non_proposer(round), round);

        assert!(validator.validate_subsequent_proposal(&accepted, &accepted.clone()));
        assert!(!validator.validate_subsequent_proposal(&accepted, &other_block));
        assert!(!validator.validate_subsequent_proposal(&accepted, &other_sender));
        assert_eq!(
            rejections(&events),
            vec![
                RejectReason::ConflictingProposal,
                RejectReason::ConflictingProposal
            ]
        );
    }

    #[test]
    fn header_validation_failure_is_propagated() {
        let net = TestNet::new(4);
        let round = round_id(1, 0);
        let mut app = net.app();
        app.fail_header_validation = true;

        assert!(matches!(
            factory(&net)
                .create_at(round)
                .validate_proposal(&net.proposal(round), &app),
            Err(AppError::ValidateBlockHeader(_))
        ));
    }

    #[test]
    fn proposer_may_not_prepare() {
        let net = TestNet::new(4);
        let round = round_id(1, 0);
        let validator = factory(&net).create_at(round);
        let proposal = net.proposal(round);
        let digest = proposal.payload.block.hash();

        let from_proposer = net.prepare_by(net.proposer(round), round, digest);
        let from_other = net.prepare_by(net.non_proposer(round), round, digest);

        assert!(!validator.validate_prepare(&from_proposer, &proposal));
        assert!(validator.validate_prepare(&from_other, &proposal));
    }

    #[test]
    fn prepare_from_outsider_or_for_other_block_is_rejected() {
        let net = TestNet::new(4);
        let round = round_id(1, 0);
        let validator = factory(&net).create_at(round);
        let proposal = net.proposal(round);
        let digest = proposal.payload.block.hash();

        let outsider = keypair(200);
        let from_outsider = SignedPayload::new(&outsider, Prepare { round, digest });
        let wrong_digest = net.prepare_by(
            net.non_proposer(round),
            round,
            crate::types::data_types::CryptoHash::new([5u8; 32]),
        );

        assert!(!validator.validate_prepare(&from_outsider, &proposal));
        assert!(!validator.validate_prepare(&wrong_digest, &proposal));
    }

    #[test]
    fn commit_seal_must_be_made_by_the_sender() {
        let net = TestNet::new(4);
        let round = round_id(1, 0);
        let validator = factory(&net).create_at(round);
        let proposal = net.proposal(round);
        let block_hash = proposal.payload.block.hash();
        let sender = net.non_proposer(round);

        let good = net.commit_by(sender, round, block_hash);
        let mut forged = good.clone();
        forged.payload.commit_seal = CommitSeal::new(net.keypair(net.proposer(round)), &block_hash);
        let forged = net.sign(sender, forged.payload);

        assert!(validator.validate_commit(&good, &proposal));
        assert!(!validator.validate_commit(&forged, &proposal));
    }

    #[test]
    fn round_change_with_insufficient_prepares_is_rejected() {
        let net = TestNet::new(4);
        let validator = RoundChangeMessageValidator::new(factory(&net));
        let app = net.app();
        let target = round_id(1, 1);
        let sender = net.addresses()[0];

        // Quorum is 3, so a prepared certificate needs 2 prepares besides the proposal.
        let enough = net.round_change_by(sender, target, Some(net.prepared_certificate(round_id(1, 0), 2)));
        let too_few = net.round_change_by(sender, target, Some(net.prepared_certificate(round_id(1, 0), 1)));

        assert!(validator.validate(&enough, &app).unwrap());
        assert!(!validator.validate(&too_few, &app).unwrap());
    }

    #[test]
    fn round_change_with_prepared_certificate_from_same_or_later_round_is_rejected() {
        let net = TestNet::new(4);
        let validator = RoundChangeMessageValidator::new(factory(&net));
        let app = net.app();
        let sender = net.addresses()[0];

        let same_round = net.round_change_by(
            sender,
            round_id(1, 1),
            Some(net.prepared_certificate(round_id(1, 1), 2)),
        );
        let wrong_height = net.round_change_by(sender, round_id(2, 1), None);

        assert!(!validator.validate(&same_round, &app).unwrap());
        assert!(!validator.validate(&wrong_height, &app).unwrap());
    }

    #[test]
    fn new_round_requires_a_quorum_certificate_for_its_round() {
        let net = TestNet::new(4);
        let validator = NewRoundMessageValidator::new(factory(&net));
        let app = net.app();
        let round = round_id(1, 1);

        let valid = net.new_round(round, 3, None);
        let too_small = net.new_round(round, 2, None);
        let mut missing = valid.payload.clone();
        missing.round_change_certificate = None;
        let missing = net.sign(net.proposer(round), missing);

        assert!(validator.validate(&valid, &app).unwrap());
        assert!(!validator.validate(&too_small, &app).unwrap());
        assert!(!validator.validate(&missing, &app).unwrap());
    }

    #[test]
    fn new_round_certificate_needs_distinct_senders_for_its_own_round() {
        let net = TestNet::new(4);
        let (factory, events) = publishing_factory(&net);
        let validator = NewRoundMessageValidator::new(factory);
        let app = net.app();
        let round = round_id(1, 1);
        let addresses = net.addresses();
        let valid = net.new_round(round, 3, None).payload;

        let mut duplicated = valid.clone();
        let round_changes = &mut duplicated
            .round_change_certificate
            .as_mut()
            .unwrap()
            .round_changes;
        round_changes[2] = round_changes[0].clone();
        let duplicated = net.sign(net.proposer(round), duplicated);

        let mut mismatched = valid;
        mismatched
            .round_change_certificate
            .as_mut()
            .unwrap()
            .round_changes[2] = net.round_change_by(addresses[2], round_id(1, 2), None);
        let mismatched = net.sign(net.proposer(round), mismatched);

        assert!(!validator.validate(&duplicated, &app).unwrap());
        assert!(!validator.validate(&mismatched, &app).unwrap());
        assert_eq!(
            rejections(&events),
            vec![
                RejectReason::DuplicateRoundChangeSender,
                RejectReason::RoundChangeCertificateRoundMismatch
            ]
        );
    }

    #[test]
    fn new_round_for_round_zero_or_from_non_proposer_is_rejected() {
        let net = TestNet::new(4);
        let validator = NewRoundMessageValidator::new(factory(&net));
        let app = net.app();

        let round_zero = net.new_round(round_id(1, 0), 3, None);
        let round = round_id(1, 1);
        let mut from_other = net.new_round(round, 3, None).payload;
        from_other.proposal = net.proposal_by(net.non_proposer(round), round);
        let from_other = net.sign(net.non_proposer(round), from_other);

        assert!(!validator.validate(&round_zero, &app).unwrap());
        assert!(!validator.validate(&from_other, &app).unwrap());
    }

    #[test]
    fn new_round_must_repropose_the_latest_prepared_block() {
        let net = TestNet::new(4);
        let validator = NewRoundMessageValidator::new(factory(&net));
        let app = net.app();
        let round = round_id(1, 2);
        let prepared = net.prepared_certificate(round_id(1, 1), 2);

        let reproposed = net.new_round(
            round,
            3,
            Some((prepared.clone(), prepared.block().with_round(round.round))),
        );
        let mut fresh_block = net.block(round);
        fresh_block.header.timestamp += 1;
        let fresh = net.new_round(round, 3, Some((prepared, fresh_block)));

        assert!(validator.validate(&reproposed, &app).unwrap());
        assert!(!validator.validate(&fresh, &app).unwrap());
    }

    #[test]
    fn commit_seals_need_a_quorum_of_validators() {
        let net = TestNet::new(4);
        let block = net.block(round_id(1, 0));
        let seals = |count: usize| -> Vec<CommitSeal> {
            net.keypairs
                .iter()
                .take(count)
                .map(|keypair| CommitSeal::new(keypair, &block.hash()))
                .collect()
        };

        assert_eq!(validate_commit_seals(&block.sealed(seals(3)), &net.validator_set()), Ok(()));
        assert_eq!(
            validate_commit_seals(&block.sealed(seals(2)), &net.validator_set()),
            Err(RejectReason::InsufficientCommitSeals)
        );

        let mut with_outsider = seals(3);
        with_outsider.push(CommitSeal::new(&keypair(200), &block.hash()));
        assert_eq!(
            validate_commit_seals(&block.sealed(with_outsider), &net.validator_set()),
            Err(RejectReason::CommitterNotAValidator)
        );

        let mut duplicated = seals(2);
        duplicated.push(duplicated[0].clone());
        assert_eq!(
            validate_commit_seals(&block.sealed(duplicated), &net.validator_set()),
            Err(RejectReason::InsufficientCommitSeals)
        );
    }
}
