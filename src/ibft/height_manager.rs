/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Event-driven state machine that runs the rounds of a single height.
//!
//! Main type: [`BlockHeightManager`].
//!
//! ## Rounds
//!
//! Every height starts in round 0. The proposer of round 0 waits for its block timer, then proposes a
//! block. Validators that accept the proposal send a Prepare, validators that see a prepared proposal
//! send a Commit, and once a quorum of Commits is collected the block is sealed and imported.
//!
//! If a round times out, the replica moves to the next round and asks the other validators to do the
//! same by sending a RoundChange, which carries the latest prepared certificate it knows of. A quorum
//! of RoundChanges for a round lets its proposer start it with a NewRound. Proposals for rounds other
//! than 0 are only ever accepted from inside a NewRound.

use std::collections::BTreeMap;
use std::sync::mpsc::Sender;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::app::{App, AppError, ProduceBlockRequest};
use crate::config::IbftConfiguration;
use crate::events::*;
use crate::ibft::messages::*;
use crate::ibft::roles::{is_proposer, proposer_for};
use crate::ibft::round_change::RoundChangeManager;
use crate::ibft::round_state::RoundState;
use crate::ibft::validation::{
    validate_commit_seals, MessageValidatorFactory, NewRoundMessageValidator,
};
use crate::networking::{network::Network, sending::SenderHandle};
use crate::timers::Scheduler;
use crate::types::{
    block::{Block, BlockHeader, CommitSeal},
    data_types::{Address, BlockHeight, Round, RoundIdentifier},
    validator_set::ValidatorSet,
};

/// What the current round of a [`BlockHeightManager`] is waiting for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HeightStatus {
    AwaitingProposal(Round),
    AwaitingPrepareQuorum(Round),
    AwaitingCommitQuorum(Round),
    Committed,
}

/// A single validator's view of the consensus instance for one height.
///
/// # Usage
///
/// A `BlockHeightManager` is created by the [`Controller`](super::controller::Controller) for the child
/// of a chain head, [started](Self::start) once, and then driven by its handlers, each of which is
/// called with a message or timer expiry that the controller already checked belongs to this height.
/// After the height is [`Committed`](HeightStatus::Committed), every handler is a no-op.
pub(crate) struct BlockHeightManager<N: Network, S: Scheduler> {
    config: IbftConfiguration,
    parent_header: BlockHeader,
    factory: MessageValidatorFactory,
    new_round_validator: NewRoundMessageValidator,
    round_change_manager: RoundChangeManager,
    current_round: RoundState,
    future_round_states: BTreeMap<Round, RoundState>,
    latest_prepared_certificate: Option<PreparedCertificate>,
    status: HeightStatus,
    sender_handle: SenderHandle<N>,
    scheduler: S,
    event_publisher: Option<Sender<Event>>,
}

impl<N: Network, S: Scheduler> BlockHeightManager<N, S> {
    pub(crate) fn new(
        config: IbftConfiguration,
        parent_header: BlockHeader,
        validator_set: ValidatorSet,
        sender_handle: SenderHandle<N>,
        scheduler: S,
        event_publisher: Option<Sender<Event>>,
    ) -> Self {
        let factory =
            MessageValidatorFactory::new(validator_set, parent_header.clone(), event_publisher.clone());
        let round_zero = RoundIdentifier::new(factory.height(), Round::init());
        Self {
            config,
            parent_header,
            new_round_validator: NewRoundMessageValidator::new(factory.clone()),
            round_change_manager: RoundChangeManager::new(factory.clone(), event_publisher.clone()),
            current_round: RoundState::new(factory.create_at(round_zero), factory.quorum()),
            future_round_states: BTreeMap::new(),
            latest_prepared_certificate: None,
            status: HeightStatus::AwaitingProposal(Round::init()),
            factory,
            sender_handle,
            scheduler,
            event_publisher,
        }
    }

    pub(crate) fn height(&self) -> BlockHeight {
        self.factory.height()
    }

    pub(crate) fn current_round(&self) -> RoundIdentifier {
        self.current_round.round_identifier()
    }

    pub(crate) fn status(&self) -> HeightStatus {
        self.status
    }

    /// Start round 0: arm its round timer, and if this replica is its proposer, arm the block timer
    /// that tells it when to propose.
    pub(crate) fn start(&mut self) {
        self.publish(Event::StartHeight(StartHeightEvent {
            timestamp: SystemTime::now(),
            height: self.height(),
            validator_count: self.factory.validator_set().len(),
        }));

        let round = self.current_round();
        self.start_round_timer(round);

        if self.is_local_proposer(round) {
            let expiry = UNIX_EPOCH
                .checked_add(Duration::from_secs(self.parent_header.timestamp))
                .and_then(|parent_time| parent_time.checked_add(self.config.block_period))
                .unwrap_or_else(SystemTime::now);
            self.scheduler.start_block_timer(round, expiry);
        }
    }

    /// On the block timer of the current round expiring, propose a new block if this replica is the
    /// round's proposer and no proposal was accepted yet.
    pub(crate) fn handle_block_timer_expiry<A: App>(
        &mut self,
        round: RoundIdentifier,
        app: &mut A,
    ) -> Result<(), AppError> {
        if round != self.current_round() || self.status == HeightStatus::Committed {
            self.discard(round, None, DiscardReason::StaleTimer);
            return Ok(());
        }

        if !self.is_local_proposer(round) || self.current_round.proposal().is_some() {
            return Ok(());
        }

        let block = self.produce_block(round.round, app)?;
        let proposal = SignedPayload::new(&self.config.keypair, Proposal { round, block });
        self.sender_handle.broadcast(proposal.clone());
        self.publish(Event::Propose(ProposeEvent {
            timestamp: SystemTime::now(),
            proposal: proposal.payload.clone(),
        }));

        self.accept_proposal(proposal, false, app)
    }

    /// On the round timer of the current round expiring, move to the next round and ask the other
    /// validators to do the same.
    pub(crate) fn handle_round_expiry<A: App>(
        &mut self,
        round: RoundIdentifier,
        app: &mut A,
    ) -> Result<(), AppError> {
        if round != self.current_round() || self.status == HeightStatus::Committed {
            self.discard(round, None, DiscardReason::StaleTimer);
            return Ok(());
        }

        self.publish(Event::RoundTimeout(RoundTimeoutEvent {
            timestamp: SystemTime::now(),
            round,
        }));

        if let Some(prepared_certificate) = self.current_round.prepared_certificate() {
            self.latest_prepared_certificate = Some(prepared_certificate);
        }

        let next_round = round.round + 1;
        self.start_new_round(next_round);

        if !self.is_local_validator() {
            return Ok(());
        }

        let round_change = SignedPayload::new(
            &self.config.keypair,
            RoundChange {
                round: round.with_round(next_round),
                prepared_certificate: self.latest_prepared_certificate.clone(),
            },
        );
        self.sender_handle.broadcast(round_change.clone());
        self.publish(Event::RoundChange(RoundChangeEvent {
            timestamp: SystemTime::now(),
            round_change: round_change.payload.clone(),
        }));

        self.handle_round_change(round_change, app)
    }

    /// Accept a Proposal for round 0.
    pub(crate) fn handle_proposal<A: App>(
        &mut self,
        proposal: SignedPayload<Proposal>,
        app: &mut A,
    ) -> Result<(), AppError> {
        let round = proposal.round_identifier();
        let origin = proposal.sender();

        if self.status == HeightStatus::Committed {
            self.discard(round, Some(origin), DiscardReason::AlreadyCommitted);
            return Ok(());
        }

        if round.round < self.current_round().round {
            self.discard(round, Some(origin), DiscardReason::PriorRound);
            return Ok(());
        }

        if !round.round.is_init() {
            self.reject(round, origin, RejectReason::ProposalForNonZeroRound);
            return Ok(());
        }

        self.accept_proposal(proposal, true, app)
    }

    pub(crate) fn handle_prepare<A: App>(
        &mut self,
        prepare: SignedPayload<Prepare>,
        app: &mut A,
    ) -> Result<(), AppError> {
        let round = prepare.round_identifier();
        let origin = prepare.sender();
        let current_round = self.current_round().round;

        if self.status == HeightStatus::Committed {
            self.discard(round, Some(origin), DiscardReason::AlreadyCommitted);
        } else if round.round < current_round {
            self.discard(round, Some(origin), DiscardReason::PriorRound);
        } else if self.config.is_too_far_ahead(round.round, current_round) {
            self.discard(round, Some(origin), DiscardReason::TooFarInFuture);
        } else if round.round > current_round {
            self.future_round_state(round).add_prepare(prepare);
            self.buffered(round, origin);
        } else {
            let payload = prepare.payload.clone();
            if self.current_round.add_prepare(prepare) {
                self.publish(Event::ReceivePrepare(ReceivePrepareEvent {
                    timestamp: SystemTime::now(),
                    origin,
                    prepare: payload,
                }));
                self.update_state(app)?;
            }
        }

        Ok(())
    }

    pub(crate) fn handle_commit<A: App>(
        &mut self,
        commit: SignedPayload<Commit>,
        app: &mut A,
    ) -> Result<(), AppError> {
        let round = commit.round_identifier();
        let origin = commit.sender();
        let current_round = self.current_round().round;

        if self.status == HeightStatus::Committed {
            self.discard(round, Some(origin), DiscardReason::AlreadyCommitted);
        } else if round.round < current_round {
            self.discard(round, Some(origin), DiscardReason::PriorRound);
        } else if self.config.is_too_far_ahead(round.round, current_round) {
            self.discard(round, Some(origin), DiscardReason::TooFarInFuture);
        } else if round.round > current_round {
            self.future_round_state(round).add_commit(commit);
            self.buffered(round, origin);
        } else {
            let payload = commit.payload.clone();
            if self.current_round.add_commit(commit) {
                self.publish(Event::ReceiveCommit(ReceiveCommitEvent {
                    timestamp: SystemTime::now(),
                    origin,
                    commit: payload,
                }));
                self.update_state(app)?;
            }
        }

        Ok(())
    }

    /// Collect a RoundChange. If it completes a round change certificate for the current round or a
    /// later one, move to that round, and start it with a NewRound if this replica is its proposer.
    pub(crate) fn handle_round_change<A: App>(
        &mut self,
        round_change: SignedPayload<RoundChange>,
        app: &mut A,
    ) -> Result<(), AppError> {
        let round = round_change.round_identifier();
        let origin = round_change.sender();

        if self.status == HeightStatus::Committed {
            self.discard(round, Some(origin), DiscardReason::AlreadyCommitted);
            return Ok(());
        }

        if round.round < self.current_round().round {
            self.discard(round, Some(origin), DiscardReason::PriorRound);
            return Ok(());
        }

        if self
            .config
            .is_too_far_ahead(round.round, self.current_round().round)
        {
            self.discard(round, Some(origin), DiscardReason::TooFarInFuture);
            return Ok(());
        }

        self.publish(Event::ReceiveRoundChange(ReceiveRoundChangeEvent {
            timestamp: SystemTime::now(),
            origin,
            round_change: round_change.payload.clone(),
        }));

        let round_change_certificate = match self
            .round_change_manager
            .append_round_change_message(round_change, app)?
        {
            Some(round_change_certificate) => round_change_certificate,
            None => return Ok(()),
        };

        if round.round > self.current_round().round {
            self.start_new_round(round.round);
        }

        if self.is_local_proposer(round) {
            self.propose_new_round(round, round_change_certificate, app)?;
        }

        Ok(())
    }

    /// Accept a NewRound, moving to its round if it is a later round, and accept the proposal it
    /// carries.
    pub(crate) fn handle_new_round<A: App>(
        &mut self,
        new_round: SignedPayload<NewRound>,
        app: &mut A,
    ) -> Result<(), AppError> {
        let round = new_round.round_identifier();
        let origin = new_round.sender();

        if self.status == HeightStatus::Committed {
            self.discard(round, Some(origin), DiscardReason::AlreadyCommitted);
            return Ok(());
        }

        if round.round < self.current_round().round {
            self.discard(round, Some(origin), DiscardReason::PriorRound);
            return Ok(());
        }

        if !self.new_round_validator.validate(&new_round, app)? {
            return Ok(());
        }

        self.publish(Event::ReceiveNewRound(ReceiveNewRoundEvent {
            timestamp: SystemTime::now(),
            origin,
            new_round: new_round.payload.clone(),
        }));

        if round.round > self.current_round().round {
            self.start_new_round(round.round);
        }

        self.accept_proposal(new_round.payload.proposal, true, app)
    }

    // Start `round` as the proposer: re-propose the latest prepared block in the certificate, or a new
    // block if there is none.
    fn propose_new_round<A: App>(
        &mut self,
        round: RoundIdentifier,
        round_change_certificate: RoundChangeCertificate,
        app: &mut A,
    ) -> Result<(), AppError> {
        let block = match round_change_certificate.latest_prepared_certificate() {
            Some(prepared_certificate) => prepared_certificate.block().with_round(round.round),
            None => self.produce_block(round.round, app)?,
        };

        let proposal = SignedPayload::new(&self.config.keypair, Proposal { round, block });
        let new_round = SignedPayload::new(
            &self.config.keypair,
            NewRound {
                round,
                proposal: proposal.clone(),
                round_change_certificate: Some(round_change_certificate),
            },
        );
        self.sender_handle.broadcast(new_round.clone());
        self.publish(Event::NewRound(NewRoundEvent {
            timestamp: SystemTime::now(),
            new_round: new_round.payload,
        }));

        self.accept_proposal(proposal, false, app)
    }

    // Set `proposal` as the proposal of the current round. If it is newly accepted, send a Prepare
    // unless this replica is the proposer.
    fn accept_proposal<A: App>(
        &mut self,
        proposal: SignedPayload<Proposal>,
        received: bool,
        app: &mut A,
    ) -> Result<(), AppError> {
        let origin = proposal.sender();
        if !self.current_round.set_proposal(proposal, app)? {
            return Ok(());
        }

        let round = self.current_round();
        self.status = HeightStatus::AwaitingPrepareQuorum(round.round);

        let digest = match self.current_round.proposal() {
            Some(proposal) => {
                if received {
                    self.publish(Event::ReceiveProposal(ReceiveProposalEvent {
                        timestamp: SystemTime::now(),
                        origin,
                        proposal: proposal.payload.clone(),
                    }));
                }
                proposal.payload.block.hash()
            }
            None => return Ok(()),
        };

        if self.is_local_validator() && !self.is_local_proposer(round) {
            let prepare = SignedPayload::new(&self.config.keypair, Prepare { round, digest });
            self.sender_handle.broadcast(prepare.clone());
            self.publish(Event::Prepare(PrepareEvent {
                timestamp: SystemTime::now(),
                prepare: prepare.payload.clone(),
            }));
            self.current_round.add_prepare(prepare);
        }

        self.update_state(app)
    }

    // Send a Commit once the current round is prepared, and import the block once it is committed.
    fn update_state<A: App>(&mut self, app: &mut A) -> Result<(), AppError> {
        let round = self.current_round();

        if self.status == HeightStatus::AwaitingPrepareQuorum(round.round)
            && self.current_round.is_prepared()
        {
            self.latest_prepared_certificate = self.current_round.prepared_certificate();
            self.status = HeightStatus::AwaitingCommitQuorum(round.round);

            let digest = self
                .current_round
                .proposed_block()
                .map(Block::hash)
                .filter(|_| self.is_local_validator());
            if let Some(digest) = digest {
                let commit = SignedPayload::new(
                    &self.config.keypair,
                    Commit {
                        round,
                        digest,
                        commit_seal: CommitSeal::new(&self.config.keypair, &digest),
                    },
                );
                self.sender_handle.broadcast(commit.clone());
                self.publish(Event::Commit(CommitEvent {
                    timestamp: SystemTime::now(),
                    commit: commit.payload.clone(),
                }));
                self.current_round.add_commit(commit);
            }
        }

        if self.status != HeightStatus::Committed && self.current_round.is_committed() {
            self.import_block(app)?;
        }

        Ok(())
    }

    fn import_block<A: App>(&mut self, app: &mut A) -> Result<(), AppError> {
        let (block, proposer) = match self.current_round.proposal() {
            Some(proposal) => (
                proposal
                    .payload
                    .block
                    .sealed(self.current_round.commit_seals()),
                proposal.sender(),
            ),
            None => return Ok(()),
        };

        let round = self.current_round();
        if let Err(reason) = validate_commit_seals(&block, self.factory.validator_set()) {
            self.reject(round, proposer, reason);
            return Ok(());
        }

        self.status = HeightStatus::Committed;
        let block_hash = block.hash();
        let commit_seals = block.header.commit_seals.len();
        let imported = app.import_block(block)?;
        self.publish(Event::CommitBlock(CommitBlockEvent {
            timestamp: SystemTime::now(),
            block: block_hash,
            round,
            commit_seals,
            imported,
        }));

        Ok(())
    }

    // Make `round` the current round, adopting the messages buffered for it.
    fn start_new_round(&mut self, round: Round) {
        let round_identifier = RoundIdentifier::new(self.height(), round);

        let buffered = self.future_round_states.remove(&round);
        self.future_round_states = self.future_round_states.split_off(&round);
        self.current_round = match buffered {
            Some(round_state) => round_state,
            None => RoundState::new(
                self.factory.create_at(round_identifier),
                self.factory.quorum(),
            ),
        };
        self.status = HeightStatus::AwaitingProposal(round);
        self.round_change_manager
            .discard_rounds_prior_to(round_identifier);

        self.start_round_timer(round_identifier);
    }

    fn start_round_timer(&mut self, round: RoundIdentifier) {
        let timeout = self.config.round_timeout(round.round);
        self.scheduler.start_round_timer(round, timeout);
        self.publish(Event::StartRound(StartRoundEvent {
            timestamp: SystemTime::now(),
            round,
            proposer: proposer_for(&round, self.factory.validator_set()),
            timeout,
        }));
    }

    fn future_round_state(&mut self, round: RoundIdentifier) -> &mut RoundState {
        let factory = &self.factory;
        self.future_round_states
            .entry(round.round)
            .or_insert_with(|| RoundState::new(factory.create_at(round), factory.quorum()))
    }

    fn produce_block<A: App>(&self, round: Round, app: &mut A) -> Result<Block, AppError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|since_epoch| since_epoch.as_secs())
            .unwrap_or(0);
        let timestamp = now.max(self.parent_header.timestamp);
        app.produce_block(ProduceBlockRequest::new(
            &self.parent_header,
            round,
            timestamp,
        ))
    }

    fn is_local_proposer(&self, round: RoundIdentifier) -> bool {
        is_proposer(&self.config.me, &round, self.factory.validator_set())
    }

    fn is_local_validator(&self) -> bool {
        self.factory.validator_set().contains(&self.config.me)
    }

    fn buffered(&self, round: RoundIdentifier, origin: Address) {
        self.publish(Event::BufferFutureMessage(BufferFutureMessageEvent {
            timestamp: SystemTime::now(),
            round,
            origin,
        }));
    }

    fn discard(&self, round: RoundIdentifier, origin: Option<Address>, reason: DiscardReason) {
        self.publish(Event::DiscardMessage(DiscardMessageEvent {
            timestamp: SystemTime::now(),
            round,
            origin,
            reason,
        }));
    }

    fn reject(&self, round: RoundIdentifier, origin: Address, reason: RejectReason) {
        self.publish(Event::RejectMessage(RejectMessageEvent {
            timestamp: SystemTime::now(),
            round,
            origin,
            reason,
        }));
    }

    fn publish(&self, event: Event) {
        Event::publish(&self.event_publisher, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ibft::test_utils::*;

    type TestManager = BlockHeightManager<RecordingNetwork, RecordingScheduler>;

    fn manager(net: &TestNet, me: Address) -> (TestManager, RecordingNetwork, RecordingScheduler) {
        let network = RecordingNetwork::default();
        let scheduler = RecordingScheduler::default();
        let config = IbftConfiguration::new(
            net.keypair(me).clone(),
            Duration::from_secs(1),
            Duration::from_secs(10),
            3,
        );
        let manager = BlockHeightManager::new(
            config,
            net.parent.clone(),
            net.validator_set(),
            SenderHandle::new(network.clone()),
            scheduler.clone(),
            None,
        );
        (manager, network, scheduler)
    }

    fn sent_codes(network: &RecordingNetwork) -> Vec<u8> {
        network.take_sent().iter().map(IbftMessage::code).collect()
    }

    #[test]
    fn proposer_arms_block_timer_and_proposes_on_expiry() {
        let net = TestNet::new(4);
        let round = round_id(1, 0);
        let (mut manager, network, scheduler) = manager(&net, net.proposer(round));
        let mut app = net.app();

        manager.start();
        let expected_expiry =
            UNIX_EPOCH + Duration::from_secs(net.parent.timestamp) + Duration::from_secs(1);
        assert_eq!(
            scheduler.take_armed(),
            vec![
                ArmedTimer::Round(round, Duration::from_secs(10)),
                ArmedTimer::Block(round, expected_expiry)
            ]
        );

        manager.handle_block_timer_expiry(round, &mut app).unwrap();
        let sent = network.take_sent();
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            IbftMessage::Proposal(proposal) => {
                assert_eq!(proposal.round_identifier(), round);
                assert_eq!(proposal.payload.block.height(), BlockHeight::new(1));
            }
            other => panic!("expected a proposal, got {:?}", other),
        }
        assert_eq!(manager.status(), HeightStatus::AwaitingPrepareQuorum(Round::new(0)));
    }

    #[test]
    fn non_proposer_does_not_arm_block_timer() {
        let net = TestNet::new(4);
        let round = round_id(1, 0);
        let (mut manager, _, scheduler) = manager(&net, net.non_proposer(round));

        manager.start();

        assert_eq!(
            scheduler.take_armed(),
            vec![ArmedTimer::Round(round, Duration::from_secs(10))]
        );
    }

    #[test]
    fn validator_prepares_commits_and_imports() {
        let net = TestNet::new(4);
        let round = round_id(1, 0);
        let non_proposers = net.non_proposers(round);
        let me = non_proposers[0];
        let (mut manager, network, _) = manager(&net, me);
        let mut app = net.app();
        manager.start();

        let proposal = net.proposal(round);
        let digest = proposal.payload.block.hash();
        manager.handle_proposal(proposal, &mut app).unwrap();
        assert_eq!(sent_codes(&network), vec![PREPARE]);

        manager
            .handle_prepare(net.prepare_by(non_proposers[1], round, digest), &mut app)
            .unwrap();
        assert_eq!(sent_codes(&network), vec![COMMIT]);
        assert_eq!(manager.status(), HeightStatus::AwaitingCommitQuorum(Round::new(0)));

        manager
            .handle_commit(net.commit_by(net.proposer(round), round, digest), &mut app)
            .unwrap();
        assert!(app.imported.is_empty());
        manager
            .handle_commit(net.commit_by(non_proposers[2], round, digest), &mut app)
            .unwrap();

        assert_eq!(manager.status(), HeightStatus::Committed);
        assert_eq!(app.imported.len(), 1);
        assert_eq!(app.imported[0].hash(), digest);
        assert_eq!(app.imported[0].header.commit_seals.len(), 3);

        manager
            .handle_commit(net.commit_by(non_proposers[1], round, digest), &mut app)
            .unwrap();
        assert_eq!(app.imported.len(), 1);
    }

    #[test]
    fn proposal_for_later_round_is_rejected() {
        let net = TestNet::new(4);
        let (mut manager, network, _) = manager(&net, net.non_proposer(round_id(1, 1)));
        let mut app = net.app();
        manager.start();

        manager
            .handle_proposal(net.proposal(round_id(1, 1)), &mut app)
            .unwrap();

        assert!(network.take_sent().is_empty());
        assert_eq!(manager.current_round(), round_id(1, 0));
    }

    #[test]
    fn round_expiry_sends_round_change_with_prepared_certificate() {
        let net = TestNet::new(4);
        let round = round_id(1, 0);
        let non_proposers = net.non_proposers(round);
        let (mut manager, network, scheduler) = manager(&net, non_proposers[0]);
        let mut app = net.app();
        manager.start();
        scheduler.take_armed();

        let proposal = net.proposal(round);
        let digest = proposal.payload.block.hash();
        manager.handle_proposal(proposal, &mut app).unwrap();
        manager
            .handle_prepare(net.prepare_by(non_proposers[1], round, digest), &mut app)
            .unwrap();
        network.take_sent();

        manager.handle_round_expiry(round, &mut app).unwrap();

        assert_eq!(manager.current_round(), round_id(1, 1));
        assert_eq!(
            scheduler.take_armed(),
            vec![ArmedTimer::Round(round_id(1, 1), Duration::from_secs(20))]
        );
        let sent = network.take_sent();
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            IbftMessage::RoundChange(round_change) => {
                assert_eq!(round_change.round_identifier(), round_id(1, 1));
                let prepared = round_change.payload.prepared_certificate.as_ref().unwrap();
                assert_eq!(prepared.round_identifier(), round);
                assert_eq!(prepared.block().hash(), digest);
            }
            other => panic!("expected a round change, got {:?}", other),
        }
    }

    #[test]
    fn stale_timers_are_ignored() {
        let net = TestNet::new(4);
        let (mut manager, network, _) = manager(&net, net.proposer(round_id(1, 0)));
        let mut app = net.app();
        manager.start();

        manager.handle_round_expiry(round_id(1, 3), &mut app).unwrap();
        manager
            .handle_block_timer_expiry(round_id(1, 2), &mut app)
            .unwrap();

        assert_eq!(manager.current_round(), round_id(1, 0));
        assert!(network.take_sent().is_empty());
    }

    #[test]
    fn round_change_quorum_makes_the_next_proposer_send_new_round() {
        let net = TestNet::new(4);
        let target = round_id(1, 1);
        let (mut manager, network, _) = manager(&net, net.proposer(target));
        let mut app = net.app();
        manager.start();

        let senders = net.non_proposers(target);
        manager
            .handle_round_change(net.round_change_by(senders[0], target, None), &mut app)
            .unwrap();
        manager
            .handle_round_change(net.round_change_by(senders[1], target, None), &mut app)
            .unwrap();
        assert!(network.take_sent().is_empty());
        assert_eq!(manager.current_round(), round_id(1, 0));

        manager
            .handle_round_change(net.round_change_by(senders[2], target, None), &mut app)
            .unwrap();

        assert_eq!(manager.current_round(), target);
        assert_eq!(manager.status(), HeightStatus::AwaitingPrepareQuorum(Round::new(1)));
        let sent = network.take_sent();
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            IbftMessage::NewRound(new_round) => {
                assert_eq!(new_round.round_identifier(), target);
                let certificate = new_round.payload.round_change_certificate.as_ref().unwrap();
                assert_eq!(certificate.round_changes.len(), 3);
                assert_eq!(new_round.payload.proposal.payload.block.round(), Round::new(1));
            }
            other => panic!("expected a new round, got {:?}", other),
        }
    }

    #[test]
    fn new_round_moves_to_its_round_and_adopts_buffered_prepares() {
        let net = TestNet::new(4);
        let target = round_id(1, 1);
        let non_proposers = net.non_proposers(target);
        let (mut manager, network, _) = manager(&net, non_proposers[0]);
        let mut app = net.app();
        manager.start();

        let digest = net.block(target).hash();
        manager
            .handle_prepare(net.prepare_by(non_proposers[1], target, digest), &mut app)
            .unwrap();
        assert_eq!(manager.current_round(), round_id(1, 0));

        manager
            .handle_new_round(net.new_round(target, 3, None), &mut app)
            .unwrap();

        assert_eq!(manager.current_round(), target);
        assert_eq!(sent_codes(&network), vec![PREPARE, COMMIT]);
        assert_eq!(manager.status(), HeightStatus::AwaitingCommitQuorum(Round::new(1)));

        manager
            .handle_prepare(net.prepare_by(non_proposers[2], round_id(1, 0), digest), &mut app)
            .unwrap();
        assert!(network.take_sent().is_empty());
    }

    #[test]
    fn messages_for_rounds_beyond_the_max_distance_leave_no_state() {
        let net = TestNet::new(4);
        let far = round_id(1, 4);
        let senders = net.non_proposers(far);
        let (mut manager, network, _) = manager(&net, net.proposer(far));
        let mut app = net.app();
        manager.start();

        let digest = net.block(far).hash();
        for sender in &senders {
            manager
                .handle_prepare(net.prepare_by(*sender, far, digest), &mut app)
                .unwrap();
            manager
                .handle_commit(net.commit_by(*sender, far, digest), &mut app)
                .unwrap();
            manager
                .handle_round_change(net.round_change_by(*sender, far, None), &mut app)
                .unwrap();
        }

        // A quorum of round changes for a round within reach would have made this replica propose.
        assert!(manager.future_round_states.is_empty());
        assert_eq!(manager.current_round(), round_id(1, 0));
        assert!(network.take_sent().is_empty());

        let near = round_id(1, 3);
        manager
            .handle_prepare(net.prepare_by(senders[0], near, digest), &mut app)
            .unwrap();
        assert_eq!(manager.future_round_states.len(), 1);
    }
}
