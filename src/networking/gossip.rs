/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Re-broadcasting of messages received from other validators.

use std::collections::{HashSet, VecDeque};
use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::events::{Event, GossipEvent};
use crate::ibft::messages::IbftMessage;
use crate::types::data_types::{Address, SignatureBytes};

use super::{messages::Message, network::Network, sending::SenderHandle};

/// Forwards messages to every peer except the one they were received from and the one that signed
/// them.
///
/// Messages are identified by their signature. The signatures of the last `history_limit` gossiped
/// messages are remembered, and a message whose signature is remembered is not gossiped again.
pub(crate) struct Gossiper<N: Network> {
    me: Address,
    sender_handle: SenderHandle<N>,
    history_limit: usize,
    history: VecDeque<SignatureBytes>,
    gossiped: HashSet<SignatureBytes>,
    event_publisher: Option<Sender<Event>>,
}

impl<N: Network> Gossiper<N> {
    pub(crate) fn new(
        me: Address,
        sender_handle: SenderHandle<N>,
        history_limit: usize,
        event_publisher: Option<Sender<Event>>,
    ) -> Self {
        Self {
            me,
            sender_handle,
            history_limit,
            history: VecDeque::new(),
            gossiped: HashSet::new(),
            event_publisher,
        }
    }

    /// Gossip `message`, whose decoded form is `ibft_message`, after receiving it from `peer`. Returns
    /// whether it was gossiped.
    ///
    /// Messages signed by this replica are never gossiped, since the replica broadcast them itself.
    pub(crate) fn gossip(&mut self, ibft_message: &IbftMessage, message: Message, peer: Address) -> bool {
        let signer = ibft_message.sender();
        if signer == self.me {
            return false;
        }

        if !self.remember(ibft_message.signature()) {
            return false;
        }

        self.sender_handle.broadcast_excluding(message, &[peer, signer]);
        Event::publish(
            &self.event_publisher,
            Event::Gossip(GossipEvent {
                timestamp: SystemTime::now(),
                code: ibft_message.code(),
                origin: signer,
                peer,
            }),
        );
        true
    }

    // Returns false if `signature` is already remembered.
    fn remember(&mut self, signature: SignatureBytes) -> bool {
        if self.history_limit == 0 {
            return true;
        }
        if !self.gossiped.insert(signature) {
            return false;
        }
        self.history.push_back(signature);
        if self.history.len() > self.history_limit {
            if let Some(forgotten) = self.history.pop_front() {
                self.gossiped.remove(&forgotten);
            }
        }
        true
    }
}
