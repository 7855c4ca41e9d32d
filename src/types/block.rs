/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the 'block' type, its header, and the commit seals that prove a block was
//! committed.

use borsh::{BorshDeserialize, BorshSerialize};

use super::crypto_primitives::{recover_signer, CryptoHasher, Digest, Keypair};
use super::data_types::*;

/// Header of a [`Block`].
///
/// The [hash](Self::hash) of a header covers `height`, `parent_hash`, `timestamp`, and `data_hash`,
/// but neither `round` nor `commit_seals`. This way, a block that was prepared in one round can be
/// re-proposed in a later round without changing the hash that validators vote on, and the seals
/// collected for a block do not alter the hash they sign.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct BlockHeader {
    pub height: BlockHeight,
    pub parent_hash: CryptoHash,
    /// Seconds since the Unix Epoch.
    pub timestamp: u64,
    pub round: Round,
    pub data_hash: CryptoHash,
    pub commit_seals: Vec<CommitSeal>,
}

impl BlockHeader {
    pub fn hash(&self) -> CryptoHash {
        let mut hasher = CryptoHasher::new();
        hasher.update(self.height.int().to_le_bytes());
        hasher.update(self.parent_hash.bytes());
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update(self.data_hash.bytes());
        CryptoHash::new(hasher.finalize().into())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub data: Data,
}

impl Block {
    /// Create an unsealed block extending `parent_hash`.
    pub fn new(
        height: BlockHeight,
        parent_hash: CryptoHash,
        timestamp: u64,
        round: Round,
        data: Data,
    ) -> Block {
        Block {
            header: BlockHeader {
                height,
                parent_hash,
                timestamp,
                round,
                data_hash: Block::data_hash(&data),
                commit_seals: Vec::new(),
            },
            data,
        }
    }

    pub fn data_hash(data: &Data) -> CryptoHash {
        let mut hasher = CryptoHasher::new();
        for datum in data.iter() {
            hasher.update((datum.bytes().len() as u64).to_le_bytes());
            hasher.update(datum.bytes());
        }
        CryptoHash::new(hasher.finalize().into())
    }

    pub fn hash(&self) -> CryptoHash {
        self.header.hash()
    }

    pub fn height(&self) -> BlockHeight {
        self.header.height
    }

    pub fn round(&self) -> Round {
        self.header.round
    }

    /// Get a copy of this block whose header carries `round` instead of its current round.
    ///
    /// The hash of the returned block is the same as the hash of `self`.
    pub fn with_round(&self, round: Round) -> Block {
        let mut block = self.clone();
        block.header.round = round;
        block
    }

    /// Get a copy of this block with `commit_seals` placed in its header.
    pub fn sealed(&self, commit_seals: Vec<CommitSeal>) -> Block {
        let mut block = self.clone();
        block.header.commit_seals = commit_seals;
        block
    }

    /// Check whether `data_hash` in the header is the hash of `data`.
    pub fn is_correct(&self) -> bool {
        self.header.data_hash == Block::data_hash(&self.data)
    }
}

/// A signature by a validator over the [hash](BlockHeader::hash) of a block, carried in
/// [`Commit`](crate::ibft::messages::Commit) messages and placed into the header of the block once it
/// is committed. The committer can be recovered from the seal alone.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct CommitSeal {
    pub signer: VerifyingKeyBytes,
    pub signature: SignatureBytes,
}

impl CommitSeal {
    pub fn new(keypair: &Keypair, block_hash: &CryptoHash) -> CommitSeal {
        CommitSeal {
            signer: keypair.public().to_bytes(),
            signature: keypair.sign(&block_hash.bytes()),
        }
    }

    /// Get the address of the validator that sealed `block_hash`, or `None` if this seal is not a
    /// correct seal over `block_hash`.
    pub fn recover_committer(&self, block_hash: &CryptoHash) -> Option<Address> {
        recover_signer(&self.signer, &block_hash.bytes(), &self.signature)
    }
}
