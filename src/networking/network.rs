/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The trait that pluggable peer-to-peer networking providers implement.

use crate::types::data_types::Address;

use super::messages::Message;

pub trait Network: Clone + Send {
    /// Send a message to every connected peer except those in `exclude`, without blocking.
    ///
    /// The local node is never a recipient of its own broadcasts.
    fn broadcast(&mut self, message: Message, exclude: &[Address]);

    /// Receive a message from any peer. Returns immediately with a None if no message is available now.
    ///
    /// The returned `Address` identifies the peer that the message was received from. This is not
    /// necessarily the peer that originally signed the message, since messages are gossiped.
    fn recv(&mut self) -> Option<(Address, Message)>;
}
