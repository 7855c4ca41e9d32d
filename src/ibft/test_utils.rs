/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Fixtures shared by the unit tests of the consensus core.

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use crate::app::{App, AppError, ProduceBlockRequest, ValidateBlockHeaderRequest};
use crate::ibft::messages::*;
use crate::ibft::roles::proposer_for;
use crate::networking::{messages::Message, network::Network};
use crate::timers::Scheduler;
use crate::types::{
    block::{Block, BlockHeader, CommitSeal},
    crypto_primitives::{Keypair, SigningKey},
    data_types::*,
    validator_set::ValidatorSet,
};

pub(crate) fn keypair(seed: u8) -> Keypair {
    Keypair::new(SigningKey::from_bytes(&[seed; 32]))
}

pub(crate) fn round_id(height: u64, round: u32) -> RoundIdentifier {
    RoundIdentifier::new(BlockHeight::new(height), Round::new(round))
}

pub(crate) fn parent_header(height: u64) -> BlockHeader {
    BlockHeader {
        height: BlockHeight::new(height),
        parent_hash: CryptoHash::new([0u8; 32]),
        timestamp: 1_700_000_000,
        round: Round::new(0),
        data_hash: Block::data_hash(&Data::default()),
        commit_seals: Vec::new(),
    }
}

/// A set of validators with known keys, agreeing on blocks extending `parent`.
pub(crate) struct TestNet {
    pub(crate) keypairs: Vec<Keypair>,
    pub(crate) parent: BlockHeader,
}

impl TestNet {
    /// Validators agreeing on the block at height 1.
    pub(crate) fn new(validator_count: u8) -> TestNet {
        TestNet::at_height(validator_count, 1)
    }

    /// Validators agreeing on the block at `height`.
    pub(crate) fn at_height(validator_count: u8, height: u64) -> TestNet {
        TestNet {
            keypairs: (1..=validator_count).map(keypair).collect(),
            parent: parent_header(height - 1),
        }
    }

    pub(crate) fn validator_set(&self) -> ValidatorSet {
        self.keypairs.iter().map(|keypair| keypair.address()).collect()
    }

    /// Addresses of the validators in the order of the validator set.
    pub(crate) fn addresses(&self) -> Vec<Address> {
        self.validator_set().validators().copied().collect()
    }

    pub(crate) fn keypair(&self, address: Address) -> &Keypair {
        self.keypairs
            .iter()
            .find(|keypair| keypair.address() == address)
            .unwrap()
    }

    /// The signing key behind `address`, for configuring a replica that acts as that validator.
    pub(crate) fn signing_key(&self, address: Address) -> SigningKey {
        let position = self
            .keypairs
            .iter()
            .position(|keypair| keypair.address() == address)
            .unwrap();
        SigningKey::from_bytes(&[position as u8 + 1; 32])
    }

    pub(crate) fn proposer(&self, round: RoundIdentifier) -> Address {
        proposer_for(&round, &self.validator_set()).unwrap()
    }

    pub(crate) fn non_proposers(&self, round: RoundIdentifier) -> Vec<Address> {
        let proposer = self.proposer(round);
        self.addresses()
            .into_iter()
            .filter(|address| *address != proposer)
            .collect()
    }

    pub(crate) fn non_proposer(&self, round: RoundIdentifier) -> Address {
        self.non_proposers(round)[0]
    }

    pub(crate) fn app(&self) -> TestApp {
        TestApp::new(self.parent.clone(), self.validator_set())
    }

    pub(crate) fn sign<P: Payload>(&self, signer: Address, payload: P) -> SignedPayload<P> {
        SignedPayload::new(self.keypair(signer), payload)
    }

    /// The block that the proposer of `round` proposes, if it proposes a fresh block.
    pub(crate) fn block(&self, round: RoundIdentifier) -> Block {
        Block::new(
            round.height,
            self.parent.hash(),
            self.parent.timestamp + 1,
            round.round,
            Data::new(vec![Datum::new(vec![1, 2, 3])]),
        )
    }

    pub(crate) fn proposal(&self, round: RoundIdentifier) -> SignedPayload<Proposal> {
        self.proposal_by(self.proposer(round), round)
    }

    pub(crate) fn proposal_by(&self, signer: Address, round: RoundIdentifier) -> SignedPayload<Proposal> {
        self.sign(
            signer,
            Proposal {
                round,
                block: self.block(round),
            },
        )
    }

    pub(crate) fn prepare_by(
        &self,
        signer: Address,
        round: RoundIdentifier,
        digest: CryptoHash,
    ) -> SignedPayload<Prepare> {
        self.sign(signer, Prepare { round, digest })
    }

    pub(crate) fn commit_by(
        &self,
        signer: Address,
        round: RoundIdentifier,
        digest: CryptoHash,
    ) -> SignedPayload<Commit> {
        let commit_seal = CommitSeal::new(self.keypair(signer), &digest);
        self.sign(
            signer,
            Commit {
                round,
                digest,
                commit_seal,
            },
        )
    }

    pub(crate) fn round_change_by(
        &self,
        signer: Address,
        round: RoundIdentifier,
        prepared_certificate: Option<PreparedCertificate>,
    ) -> SignedPayload<RoundChange> {
        self.sign(
            signer,
            RoundChange {
                round,
                prepared_certificate,
            },
        )
    }

    /// A prepared certificate for the proposal of `round`, with prepares from `prepare_count`
    /// validators other than the proposer.
    pub(crate) fn prepared_certificate(
        &self,
        round: RoundIdentifier,
        prepare_count: usize,
    ) -> PreparedCertificate {
        let proposal = self.proposal(round);
        let digest = proposal.payload.block.hash();
        let prepares = self
            .non_proposers(round)
            .into_iter()
            .take(prepare_count)
            .map(|signer| self.prepare_by(signer, round, digest))
            .collect();
        PreparedCertificate { proposal, prepares }
    }

    /// A NewRound for `round` from its proposer, with round changes from the first
    /// `round_change_count` validators. If `prepared` is given, the first round change carries its
    /// prepared certificate and its block is proposed.
    pub(crate) fn new_round(
        &self,
        round: RoundIdentifier,
        round_change_count: usize,
        prepared: Option<(PreparedCertificate, Block)>,
    ) -> SignedPayload<NewRound> {
        let (mut prepared_certificate, block) = match prepared {
            Some((prepared_certificate, block)) => (Some(prepared_certificate), block),
            None => (None, self.block(round)),
        };
        let round_changes = self
            .addresses()
            .into_iter()
            .take(round_change_count)
            .map(|signer| self.round_change_by(signer, round, prepared_certificate.take()))
            .collect();
        let proposer = self.proposer(round);
        self.sign(
            proposer,
            NewRound {
                round,
                proposal: self.sign(proposer, Proposal { round, block }),
                round_change_certificate: Some(RoundChangeCertificate { round_changes }),
            },
        )
    }
}

/// An in-memory chain.
pub(crate) struct TestApp {
    pub(crate) head: BlockHeader,
    pub(crate) validators: ValidatorSet,
    pub(crate) imported: Vec<Block>,
    pub(crate) fail_header_validation: bool,
}

impl TestApp {
    pub(crate) fn new(head: BlockHeader, validators: ValidatorSet) -> TestApp {
        TestApp {
            head,
            validators,
            imported: Vec::new(),
            fail_header_validation: false,
        }
    }
}

impl App for TestApp {
    fn chain_head_header(&self) -> BlockHeader {
        self.head.clone()
    }

    fn validators_at_height(&self, _height: BlockHeight) -> ValidatorSet {
        self.validators.clone()
    }

    fn produce_block(&mut self, request: ProduceBlockRequest) -> Result<Block, AppError> {
        Ok(Block::new(
            request.parent().height + 1,
            request.parent().hash(),
            request.timestamp(),
            request.round(),
            Data::new(vec![Datum::new(vec![1, 2, 3])]),
        ))
    }

    fn validate_block_header(&self, request: ValidateBlockHeaderRequest) -> Result<bool, AppError> {
        if self.fail_header_validation {
            return Err(AppError::ValidateBlockHeader(String::from("unavailable")));
        }
        let (header, parent) = (request.header(), request.parent());
        Ok(header.height == parent.height + 1
            && header.parent_hash == parent.hash()
            && header.timestamp >= parent.timestamp)
    }

    fn import_block(&mut self, block: Block) -> Result<bool, AppError> {
        self.head = block.header.clone();
        self.imported.push(block);
        Ok(true)
    }
}

/// A [`Network`] that records every broadcast.
#[derive(Clone, Default)]
pub(crate) struct RecordingNetwork {
    pub(crate) sent: Arc<Mutex<Vec<(Message, Vec<Address>)>>>,
}

impl RecordingNetwork {
    /// Take every message broadcast so far, decoded.
    pub(crate) fn take_sent(&self) -> Vec<IbftMessage> {
        self.sent
            .lock()
            .unwrap()
            .drain(..)
            .map(|(message, _)| IbftMessage::decode(&message).unwrap())
            .collect()
    }
}

impl Network for RecordingNetwork {
    fn broadcast(&mut self, message: Message, exclude: &[Address]) {
        self.sent.lock().unwrap().push((message, exclude.to_vec()));
    }

    fn recv(&mut self) -> Option<(Address, Message)> {
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ArmedTimer {
    Round(RoundIdentifier, Duration),
    Block(RoundIdentifier, SystemTime),
}

/// A [`Scheduler`] that records every armed timer.
#[derive(Clone, Default)]
pub(crate) struct RecordingScheduler {
    pub(crate) armed: Arc<Mutex<Vec<ArmedTimer>>>,
}

impl RecordingScheduler {
    pub(crate) fn take_armed(&self) -> Vec<ArmedTimer> {
        self.armed.lock().unwrap().drain(..).collect()
    }
}

impl Scheduler for RecordingScheduler {
    fn start_round_timer(&mut self, round: RoundIdentifier, timeout: Duration) {
        self.armed.lock().unwrap().push(ArmedTimer::Round(round, timeout));
    }

    fn start_block_timer(&mut self, round: RoundIdentifier, expiry: SystemTime) {
        self.armed.lock().unwrap().push(ArmedTimer::Block(round, expiry));
    }
}
