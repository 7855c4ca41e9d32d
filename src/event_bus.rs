/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The event bus thread, which delivers published [events](crate::events) to their handlers.

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::events::*;
use crate::logging::Logger;

pub(crate) type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

/// Handlers for every kind of event. Each kind of event can have any number of handlers, which are
/// invoked in the order they were registered.
#[derive(Default)]
pub(crate) struct EventHandlers {
    pub(crate) start_height_handlers: Vec<HandlerPtr<StartHeightEvent>>,
    pub(crate) start_round_handlers: Vec<HandlerPtr<StartRoundEvent>>,
    pub(crate) propose_handlers: Vec<HandlerPtr<ProposeEvent>>,
    pub(crate) prepare_handlers: Vec<HandlerPtr<PrepareEvent>>,
    pub(crate) commit_handlers: Vec<HandlerPtr<CommitEvent>>,
    pub(crate) round_change_handlers: Vec<HandlerPtr<RoundChangeEvent>>,
    pub(crate) new_round_handlers: Vec<HandlerPtr<NewRoundEvent>>,
    pub(crate) receive_proposal_handlers: Vec<HandlerPtr<ReceiveProposalEvent>>,
    pub(crate) receive_prepare_handlers: Vec<HandlerPtr<ReceivePrepareEvent>>,
    pub(crate) receive_commit_handlers: Vec<HandlerPtr<ReceiveCommitEvent>>,
    pub(crate) receive_round_change_handlers: Vec<HandlerPtr<ReceiveRoundChangeEvent>>,
    pub(crate) receive_new_round_handlers: Vec<HandlerPtr<ReceiveNewRoundEvent>>,
    pub(crate) round_timeout_handlers: Vec<HandlerPtr<RoundTimeoutEvent>>,
    pub(crate) collect_round_change_certificate_handlers:
        Vec<HandlerPtr<CollectRoundChangeCertificateEvent>>,
    pub(crate) commit_block_handlers: Vec<HandlerPtr<CommitBlockEvent>>,
    pub(crate) reject_message_handlers: Vec<HandlerPtr<RejectMessageEvent>>,
    pub(crate) discard_message_handlers: Vec<HandlerPtr<DiscardMessageEvent>>,
    pub(crate) buffer_future_message_handlers: Vec<HandlerPtr<BufferFutureMessageEvent>>,
    pub(crate) gossip_handlers: Vec<HandlerPtr<GossipEvent>>,
}

impl EventHandlers {
    /// Create a set of event handlers which contains the default logger of every event if
    /// `log_events` is true, and is empty otherwise.
    pub(crate) fn new(log_events: bool) -> EventHandlers {
        if !log_events {
            return EventHandlers::default();
        }

        EventHandlers {
            start_height_handlers: vec![StartHeightEvent::get_logger()],
            start_round_handlers: vec![StartRoundEvent::get_logger()],
            propose_handlers: vec![ProposeEvent::get_logger()],
            prepare_handlers: vec![PrepareEvent::get_logger()],
            commit_handlers: vec![CommitEvent::get_logger()],
            round_change_handlers: vec![RoundChangeEvent::get_logger()],
            new_round_handlers: vec![NewRoundEvent::get_logger()],
            receive_proposal_handlers: vec![ReceiveProposalEvent::get_logger()],
            receive_prepare_handlers: vec![ReceivePrepareEvent::get_logger()],
            receive_commit_handlers: vec![ReceiveCommitEvent::get_logger()],
            receive_round_change_handlers: vec![ReceiveRoundChangeEvent::get_logger()],
            receive_new_round_handlers: vec![ReceiveNewRoundEvent::get_logger()],
            round_timeout_handlers: vec![RoundTimeoutEvent::get_logger()],
            collect_round_change_certificate_handlers: vec![
                CollectRoundChangeCertificateEvent::get_logger(),
            ],
            commit_block_handlers: vec![CommitBlockEvent::get_logger()],
            reject_message_handlers: vec![RejectMessageEvent::get_logger()],
            discard_message_handlers: vec![DiscardMessageEvent::get_logger()],
            buffer_future_message_handlers: vec![BufferFutureMessageEvent::get_logger()],
            gossip_handlers: vec![GossipEvent::get_logger()],
        }
    }

    /// Check whether there are no handlers for any kind of event. If so, there is no need to start
    /// the event bus, or to publish events at all.
    pub(crate) fn is_empty(&self) -> bool {
        self.start_height_handlers.is_empty()
            && self.start_round_handlers.is_empty()
            && self.propose_handlers.is_empty()
            && self.prepare_handlers.is_empty()
            && self.commit_handlers.is_empty()
            && self.round_change_handlers.is_empty()
            && self.new_round_handlers.is_empty()
            && self.receive_proposal_handlers.is_empty()
            && self.receive_prepare_handlers.is_empty()
            && self.receive_commit_handlers.is_empty()
            && self.receive_round_change_handlers.is_empty()
            && self.receive_new_round_handlers.is_empty()
            && self.round_timeout_handlers.is_empty()
            && self.collect_round_change_certificate_handlers.is_empty()
            && self.commit_block_handlers.is_empty()
            && self.reject_message_handlers.is_empty()
            && self.discard_message_handlers.is_empty()
            && self.buffer_future_message_handlers.is_empty()
            && self.gossip_handlers.is_empty()
    }

    pub(crate) fn fire_handlers(&self, event: Event) {
        match event {
            Event::StartHeight(start_height_event) => self
                .start_height_handlers
                .iter()
                .for_each(|handler| handler(&start_height_event)),

            Event::StartRound(start_round_event) => self
                .start_round_handlers
                .iter()
                .for_each(|handler| handler(&start_round_event)),

            Event::Propose(propose_event) => self
                .propose_handlers
                .iter()
                .for_each(|handler| handler(&propose_event)),

            Event::Prepare(prepare_event) => self
                .prepare_handlers
                .iter()
                .for_each(|handler| handler(&prepare_event)),

            Event::Commit(commit_event) => self
                .commit_handlers
                .iter()
                .for_each(|handler| handler(&commit_event)),

            Event::RoundChange(round_change_event) => self
                .round_change_handlers
                .iter()
                .for_each(|handler| handler(&round_change_event)),

            Event::NewRound(new_round_event) => self
                .new_round_handlers
                .iter()
                .for_each(|handler| handler(&new_round_event)),

            Event::ReceiveProposal(receive_proposal_event) => self
                .receive_proposal_handlers
                .iter()
                .for_each(|handler| handler(&receive_proposal_event)),

            Event::ReceivePrepare(receive_prepare_event) => self
                .receive_prepare_handlers
                .iter()
                .for_each(|handler| handler(&receive_prepare_event)),

            Event::ReceiveCommit(receive_commit_event) => self
                .receive_commit_handlers
                .iter()
                .for_each(|handler| handler(&receive_commit_event)),

            Event::ReceiveRoundChange(receive_round_change_event) => self
                .receive_round_change_handlers
                .iter()
                .for_each(|handler| handler(&receive_round_change_event)),

            Event::ReceiveNewRound(receive_new_round_event) => self
                .receive_new_round_handlers
                .iter()
                .for_each(|handler| handler(&receive_new_round_event)),

            Event::RoundTimeout(round_timeout_event) => self
                .round_timeout_handlers
                .iter()
                .for_each(|handler| handler(&round_timeout_event)),

            Event::CollectRoundChangeCertificate(collect_event) => self
                .collect_round_change_certificate_handlers
                .iter()
                .for_each(|handler| handler(&collect_event)),

            Event::CommitBlock(commit_block_event) => self
                .commit_block_handlers
                .iter()
                .for_each(|handler| handler(&commit_block_event)),

            Event::RejectMessage(reject_message_event) => self
                .reject_message_handlers
                .iter()
                .for_each(|handler| handler(&reject_message_event)),

            Event::DiscardMessage(discard_message_event) => self
                .discard_message_handlers
                .iter()
                .for_each(|handler| handler(&discard_message_event)),

            Event::BufferFutureMessage(buffer_event) => self
                .buffer_future_message_handlers
                .iter()
                .for_each(|handler| handler(&buffer_event)),

            Event::Gossip(gossip_event) => self
                .gossip_handlers
                .iter()
                .for_each(|handler| handler(&gossip_event)),
        }
    }
}

/// Spawn the event bus thread, which fires the handlers of every event received from
/// `event_subscriber` until `shutdown_signal` is received, or until every publisher is gone.
pub(crate) fn start_event_bus(
    event_handlers: EventHandlers,
    event_subscriber: Receiver<Event>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => return,
            Err(TryRecvError::Empty) => (),
        }

        match event_subscriber.recv_timeout(Duration::from_millis(10)) {
            Ok(event) => event_handlers.fire_handlers(event),
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => return,
        }
    })
}
