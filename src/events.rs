/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of ibft-rs events for event handling and logging.
//!
//! Components of the protocol publish events through an optional `Sender<Event>` handed to them at
//! construction. An event for a given action indicates that the action has been completed. The
//! [event bus](crate::event_bus) delivers events to the [default loggers](crate::logging) and to any
//! handlers registered through [`ReplicaSpec`](crate::replica::ReplicaSpec).

use std::sync::mpsc::Sender;
use std::time::{Duration, SystemTime};

use crate::ibft::messages::{Commit, NewRound, Prepare, Proposal, RoundChange};
use crate::types::data_types::{Address, BlockHeight, CryptoHash, RoundIdentifier};

pub enum Event {
    // Events that start a height or a round.
    StartHeight(StartHeightEvent),
    StartRound(StartRoundEvent),
    // Events that involve broadcasting a message.
    Propose(ProposeEvent),
    Prepare(PrepareEvent),
    Commit(CommitEvent),
    RoundChange(RoundChangeEvent),
    NewRound(NewRoundEvent),
    // Events that involve accepting a received message.
    ReceiveProposal(ReceiveProposalEvent),
    ReceivePrepare(ReceivePrepareEvent),
    ReceiveCommit(ReceiveCommitEvent),
    ReceiveRoundChange(ReceiveRoundChangeEvent),
    ReceiveNewRound(ReceiveNewRoundEvent),
    // Progress events.
    RoundTimeout(RoundTimeoutEvent),
    CollectRoundChangeCertificate(CollectRoundChangeCertificateEvent),
    CommitBlock(CommitBlockEvent),
    // Events about messages that are not (or not yet) processed.
    RejectMessage(RejectMessageEvent),
    DiscardMessage(DiscardMessageEvent),
    BufferFutureMessage(BufferFutureMessageEvent),
    Gossip(GossipEvent),
}

impl Event {
    /// Publish `event` if there is an `event_publisher`. Events published after the event bus has
    /// stopped are dropped.
    pub(crate) fn publish(event_publisher: &Option<Sender<Event>>, event: Event) {
        if let Some(event_publisher) = event_publisher {
            let _ = event_publisher.send(event);
        }
    }
}

pub struct StartHeightEvent {
    pub timestamp: SystemTime,
    pub height: BlockHeight,
    pub validator_count: usize,
}

pub struct StartRoundEvent {
    pub timestamp: SystemTime,
    pub round: RoundIdentifier,
    pub proposer: Option<Address>,
    pub timeout: Duration,
}

pub struct ProposeEvent {
    pub timestamp: SystemTime,
    pub proposal: Proposal,
}

pub struct PrepareEvent {
    pub timestamp: SystemTime,
    pub prepare: Prepare,
}

pub struct CommitEvent {
    pub timestamp: SystemTime,
    pub commit: Commit,
}

pub struct RoundChangeEvent {
    pub timestamp: SystemTime,
    pub round_change: RoundChange,
}

pub struct NewRoundEvent {
    pub timestamp: SystemTime,
    pub new_round: NewRound,
}

pub struct ReceiveProposalEvent {
    pub timestamp: SystemTime,
    pub origin: Address,
    pub proposal: Proposal,
}

pub struct ReceivePrepareEvent {
    pub timestamp: SystemTime,
    pub origin: Address,
    pub prepare: Prepare,
}

pub struct ReceiveCommitEvent {
    pub timestamp: SystemTime,
    pub origin: Address,
    pub commit: Commit,
}

pub struct ReceiveRoundChangeEvent {
    pub timestamp: SystemTime,
    pub origin: Address,
    pub round_change: RoundChange,
}

pub struct ReceiveNewRoundEvent {
    pub timestamp: SystemTime,
    pub origin: Address,
    pub new_round: NewRound,
}

pub struct RoundTimeoutEvent {
    pub timestamp: SystemTime,
    pub round: RoundIdentifier,
}

pub struct CollectRoundChangeCertificateEvent {
    pub timestamp: SystemTime,
    pub round: RoundIdentifier,
    pub signers: Vec<Address>,
}

pub struct CommitBlockEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
    pub round: RoundIdentifier,
    pub commit_seals: usize,
    /// Whether the app accepted the block. A refused block leaves the height committed locally.
    pub imported: bool,
}

pub struct RejectMessageEvent {
    pub timestamp: SystemTime,
    pub round: RoundIdentifier,
    pub origin: Address,
    pub reason: RejectReason,
}

pub struct DiscardMessageEvent {
    pub timestamp: SystemTime,
    pub round: RoundIdentifier,
    /// `None` for timer expiries.
    pub origin: Option<Address>,
    pub reason: DiscardReason,
}

pub struct BufferFutureMessageEvent {
    pub timestamp: SystemTime,
    pub round: RoundIdentifier,
    pub origin: Address,
}

pub struct GossipEvent {
    pub timestamp: SystemTime,
    pub code: u8,
    pub origin: Address,
    pub peer: Address,
}

/// Why a message failed validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    NotAValidator,
    WrongRound,
    WrongHeight,
    UnexpectedProposer,
    InvalidBlockHeader,
    BlockRoundMismatch,
    ConflictingProposal,
    ProposalForNonZeroRound,
    DigestMismatch,
    ProposerSentPrepare,
    CommitSealSignerMismatch,
    PreparedCertificateNotFromPriorRound,
    InsufficientPreparedEvidence,
    InvalidPreparedCertificate,
    NewRoundForRoundZero,
    MissingRoundChangeCertificate,
    InsufficientRoundChangeCertificate,
    RoundChangeCertificateRoundMismatch,
    DuplicateRoundChangeSender,
    InvalidRoundChangeInCertificate,
    ProposalDoesNotMatchPreparedBlock,
    InsufficientCommitSeals,
    CommitterNotAValidator,
}

/// Why a message or timer expiry was dropped without being validated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiscardReason {
    StaleHeight,
    /// For a height, or a round of the current height, too far beyond the current one.
    TooFarInFuture,
    FutureBufferFull,
    PriorRound,
    UnknownSender,
    AlreadyCommitted,
    StaleTimer,
}
