/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The wire-level message exchanged through the [`Network`](super::network::Network).

use borsh::{BorshDeserialize, BorshSerialize};

/// A message as carried by the peer-to-peer network: a message type code and an opaque payload.
///
/// The consensus core assigns meaning to `code` and `data` when it
/// [decodes](crate::ibft::messages::IbftMessage::decode) the message. The network provider only needs
/// to deliver both fields unchanged.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Message {
    pub code: u8,
    pub data: Vec<u8>,
}

impl Message {
    pub fn new(code: u8, data: Vec<u8>) -> Message {
        Message { code, data }
    }

    /// Get the size of this message in bytes, not counting framing added by the network provider.
    pub fn size(&self) -> u64 {
        1 + self.data.len() as u64
    }
}
