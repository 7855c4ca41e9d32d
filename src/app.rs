/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`App`] trait, ibft-rs's interface to the blockchain it agrees on.
//!
//! The consensus core does not execute, store, or validate the contents of blocks itself. Instead, it
//! calls into an `App` provided by the library user whenever it needs to:
//! 1. Read the [chain head](App::chain_head_header) and the
//!    [validator set](App::validators_at_height) responsible for the next height.
//! 2. [Produce a block](App::produce_block) to propose, when the local node is the proposer.
//! 3. [Validate the header](App::validate_block_header) of a proposed block.
//! 4. [Import a block](App::import_block) that has been committed and sealed.
//!
//! These calls are made synchronously from the thread that runs the protocol, so implementations should
//! return promptly. An `Err` returned from any of them is treated as a hard failure of the event that
//! triggered the call and is returned to the caller of the [`Controller`](crate::ibft::controller::Controller).

use std::fmt::{self, Display, Formatter};

use crate::types::{
    block::{Block, BlockHeader},
    data_types::{BlockHeight, Round},
    validator_set::ValidatorSet,
};

pub trait App: Send {
    /// Get the header of the latest block in the local chain.
    fn chain_head_header(&self) -> BlockHeader;

    /// Get the height of the latest block in the local chain.
    fn chain_head_height(&self) -> BlockHeight {
        self.chain_head_header().height
    }

    /// Get the validators responsible for agreeing on the block at `height`.
    fn validators_at_height(&self, height: BlockHeight) -> ValidatorSet;

    /// Create a block extending `request.parent` to propose in `request.round`.
    fn produce_block(&mut self, request: ProduceBlockRequest) -> Result<Block, AppError>;

    /// Decide whether `request.header` is a valid header for a block extending `request.parent`.
    fn validate_block_header(&self, request: ValidateBlockHeaderRequest) -> Result<bool, AppError>;

    /// Import a committed block whose header carries the commit seals that prove it was committed.
    ///
    /// Returns whether the block became the new chain head.
    fn import_block(&mut self, block: Block) -> Result<bool, AppError>;
}

pub struct ProduceBlockRequest<'a> {
    parent: &'a BlockHeader,
    round: Round,
    timestamp: u64,
}

impl<'a> ProduceBlockRequest<'a> {
    pub(crate) fn new(parent: &'a BlockHeader, round: Round, timestamp: u64) -> Self {
        Self {
            parent,
            round,
            timestamp,
        }
    }

    pub fn parent(&self) -> &BlockHeader {
        self.parent
    }

    /// The round the produced block will be proposed in. This is the value for `round` in its header.
    pub fn round(&self) -> Round {
        self.round
    }

    /// The value for `timestamp` in the header of the produced block, in seconds since the Unix Epoch.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

pub struct ValidateBlockHeaderRequest<'a> {
    header: &'a BlockHeader,
    parent: &'a BlockHeader,
}

impl<'a> ValidateBlockHeaderRequest<'a> {
    pub(crate) fn new(header: &'a BlockHeader, parent: &'a BlockHeader) -> Self {
        Self { header, parent }
    }

    pub fn header(&self) -> &BlockHeader {
        self.header
    }

    pub fn parent(&self) -> &BlockHeader {
        self.parent
    }
}

/// Failure of an [`App`] method. Each variant carries a description provided by the `App`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AppError {
    ProduceBlock(String),
    ValidateBlockHeader(String),
    ImportBlock(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ProduceBlock(reason) => write!(f, "failed to produce block: {}", reason),
            AppError::ValidateBlockHeader(reason) => {
                write!(f, "failed to validate block header: {}", reason)
            }
            AppError::ImportBlock(reason) => write!(f, "failed to import block: {}", reason),
        }
    }
}

impl std::error::Error for AppError {}
