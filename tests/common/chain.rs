//! [`TestChain`], a simple implementation of [`App`] used in all of the integration tests.

use std::{
    sync::{Arc, Mutex},
    time::{SystemTime, UNIX_EPOCH},
};

use ibft_rs::{
    app::{App, AppError, ProduceBlockRequest, ValidateBlockHeaderRequest},
    types::{
        block::{Block, BlockHeader},
        data_types::{BlockHeight, CryptoHash, Data, Datum, Round},
        validator_set::ValidatorSet,
    },
};

/// An in-memory chain of blocks, shared between its clones so that tests can inspect the chain of a
/// running replica.
///
/// Every produced block carries a single datum: the little-endian bytes of its height. Headers are
/// valid if they extend the parent by one height and their timestamp does not go back in time.
#[derive(Clone)]
pub(crate) struct TestChain {
    blocks: Arc<Mutex<Vec<Block>>>,
    validators: ValidatorSet,
}

impl TestChain {
    pub(crate) fn new(genesis: Block, validators: ValidatorSet) -> TestChain {
        TestChain {
            blocks: Arc::new(Mutex::new(vec![genesis])),
            validators,
        }
    }

    /// A genesis block timestamped now.
    pub(crate) fn genesis() -> Block {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        Block::new(
            BlockHeight::new(0),
            CryptoHash::new([0u8; 32]),
            now,
            Round::new(0),
            Data::default(),
        )
    }

    pub(crate) fn height(&self) -> BlockHeight {
        self.blocks.lock().unwrap().last().unwrap().height()
    }

    pub(crate) fn blocks(&self) -> Vec<Block> {
        self.blocks.lock().unwrap().clone()
    }

    pub(crate) fn block_at(&self, height: BlockHeight) -> Option<Block> {
        self.blocks
            .lock()
            .unwrap()
            .get(height.int() as usize)
            .cloned()
    }
}

impl App for TestChain {
    fn chain_head_header(&self) -> BlockHeader {
        self.blocks.lock().unwrap().last().unwrap().header.clone()
    }

    fn validators_at_height(&self, _height: BlockHeight) -> ValidatorSet {
        self.validators.clone()
    }

    fn produce_block(&mut self, request: ProduceBlockRequest) -> Result<Block, AppError> {
        let height = request.parent().height + 1;
        Ok(Block::new(
            height,
            request.parent().hash(),
            request.timestamp(),
            request.round(),
            Data::new(vec![Datum::new(height.int().to_le_bytes().to_vec())]),
        ))
    }

    fn validate_block_header(&self, request: ValidateBlockHeaderRequest) -> Result<bool, AppError> {
        let (header, parent) = (request.header(), request.parent());
        Ok(header.height == parent.height + 1
            && header.parent_hash == parent.hash()
            && header.timestamp >= parent.timestamp)
    }

    fn import_block(&mut self, block: Block) -> Result<bool, AppError> {
        let mut blocks = self.blocks.lock().unwrap();
        if block.header.parent_hash != blocks.last().unwrap().hash() {
            return Ok(false);
        }
        blocks.push(block);
        Ok(true)
    }
}
