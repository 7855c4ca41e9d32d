/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Methods to build and run a replica.
//!
//! A replica is a process that takes part in agreeing on the blocks of an IBFT 2.0 blockchain. The key
//! components of this module are:
//! - The builder-pattern interface to construct a [specification of the replica](ReplicaSpec) with:
//!   1. `ReplicaSpec::builder` to construct a `ReplicaSpecBuilder`,
//!   2. The setters of the `ReplicaSpecBuilder`, and
//!   3. The `ReplicaSpecBuilder::build` method to construct a [ReplicaSpec],
//! - The function to [start](ReplicaSpec::start) a [Replica] given its specification,
//! - [The type](Replica) which keeps the replica alive.
//!
//! ## Validators and non-validators
//!
//! A replica whose address is not in the validator set of a height still follows that height: it
//! gossips the validators' messages, accepts proposals, counts prepares and commits, and imports the
//! block once it sees a commit quorum. It never signs messages of its own for that height.
//!
//! ## Starting a replica
//!
//! ```ignore
//! let replica =
//!     ReplicaSpec::builder()
//!     .app(app)
//!     .network(network)
//!     .configuration(configuration)
//!     .on_commit_block(commit_block_handler)
//!     .build()
//!     .start();
//! ```
//!
//! ### Required setters
//!
//! - `.app(...)`
//! - `.network(...)`
//! - `.configuration(...)`
//!
//! ### Optional setters
//!
//! The optional setters are for registering user-defined event handlers for events from [crate::events]:
//! - `.on_start_height(...)`
//! - `.on_start_round(...)`
//! - `.on_propose(...)`
//! - `.on_prepare(...)`
//! - `.on_commit(...)`
//! - `.on_round_change(...)`
//! - `.on_new_round(...)`
//! - `.on_receive_proposal(...)`
//! - `.on_receive_prepare(...)`
//! - `.on_receive_commit(...)`
//! - `.on_receive_round_change(...)`
//! - `.on_receive_new_round(...)`
//! - `.on_round_timeout(...)`
//! - `.on_collect_round_change_certificate(...)`
//! - `.on_commit_block(...)`
//! - `.on_reject_message(...)`
//! - `.on_discard_message(...)`
//! - `.on_buffer_future_message(...)`
//! - `.on_gossip(...)`
//!
//! ## Threads
//!
//! A running replica has up to three threads:
//! 1. The poller, which moves messages from the [`Network`] onto the processor's [`EventQueue`].
//! 2. The processor, which runs the [`Controller`] on the queued events and on expired timers.
//! 3. The event bus, which runs event handlers. It is only started if there are handlers.
//!
//! Dropping the [Replica] stops all three. [`Replica::stop`] does the same, and also returns the
//! error the processor stopped with, if any.

use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use typed_builder::TypedBuilder;

use crate::app::App;
use crate::config::Configuration;
use crate::event_bus::*;
use crate::events::*;
use crate::ibft::controller::{Controller, IbftError};
use crate::networking::{network::Network, receiving::start_polling};
use crate::processor::{start_processor, EventQueue, IbftEvent, QueueError};
use crate::timers::DeadlineScheduler;
use crate::types::block::BlockHeader;

/// Stores all necessary parameters and trait implementations required to run the [Replica].
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [ReplicaSpec]. On the builder call the following methods to construct a valid [ReplicaSpec].

    Required:
    - `.app(...)`
    - `.network(...)`
    - `.configuration(...)`

    Optional:
    - `.on_start_height(...)`
    - `.on_start_round(...)`
    - `.on_propose(...)`
    - `.on_prepare(...)`
    - `.on_commit(...)`
    - `.on_round_change(...)`
    - `.on_new_round(...)`
    - `.on_receive_proposal(...)`
    - `.on_receive_prepare(...)`
    - `.on_receive_commit(...)`
    - `.on_receive_round_change(...)`
    - `.on_receive_new_round(...)`
    - `.on_round_timeout(...)`
    - `.on_collect_round_change_certificate(...)`
    - `.on_commit_block(...)`
    - `.on_reject_message(...)`
    - `.on_discard_message(...)`
    - `.on_buffer_future_message(...)`
    - `.on_gossip(...)`
"))]
pub struct ReplicaSpec<A: App + 'static, N: Network + 'static> {
    // Required parameters
    #[builder(setter(doc = "Set the application that produces, validates, and imports blocks. The argument must implement the [App](crate::app::App) trait. Required."))]
    app: A,
    #[builder(setter(doc = "Set the implementation of peer-to-peer networking. The argument must implement the [Network](crate::networking::network::Network) trait. Required."))]
    network: N,
    #[builder(setter(doc = "Set the [configuration](Configuration), which contains the necessary parameters to run a replica. Required."))]
    configuration: Configuration,
    // Optional parameters
    #[builder(default, setter(transform = |handler: impl Fn(&StartHeightEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<StartHeightEvent>),
    doc = "Register a handler closure to be invoked after the replica starts working on a new height. Optional."))]
    on_start_height: Option<HandlerPtr<StartHeightEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&StartRoundEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<StartRoundEvent>),
    doc = "Register a handler closure to be invoked after the replica starts a round. Optional."))]
    on_start_round: Option<HandlerPtr<StartRoundEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ProposeEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ProposeEvent>),
    doc = "Register a handler closure to be invoked after the replica broadcasts a proposal for a block. Optional."))]
    on_propose: Option<HandlerPtr<ProposeEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&PrepareEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<PrepareEvent>),
    doc = "Register a handler closure to be invoked after the replica sends a prepare. Optional."))]
    on_prepare: Option<HandlerPtr<PrepareEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&CommitEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<CommitEvent>),
    doc = "Register a handler closure to be invoked after the replica sends a commit. Optional."))]
    on_commit: Option<HandlerPtr<CommitEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&RoundChangeEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<RoundChangeEvent>),
    doc = "Register a handler closure to be invoked after the replica sends a round change. Optional."))]
    on_round_change: Option<HandlerPtr<RoundChangeEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&NewRoundEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<NewRoundEvent>),
    doc = "Register a handler closure to be invoked after the replica starts a round by broadcasting a new round message. Optional."))]
    on_new_round: Option<HandlerPtr<NewRoundEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceiveProposalEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceiveProposalEvent>),
    doc = "Register a handler closure to be invoked after the replica accepts a proposal. Optional."))]
    on_receive_proposal: Option<HandlerPtr<ReceiveProposalEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceivePrepareEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceivePrepareEvent>),
    doc = "Register a handler closure to be invoked after the replica receives a prepare. Optional."))]
    on_receive_prepare: Option<HandlerPtr<ReceivePrepareEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceiveCommitEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceiveCommitEvent>),
    doc = "Register a handler closure to be invoked after the replica receives a commit. Optional."))]
    on_receive_commit: Option<HandlerPtr<ReceiveCommitEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceiveRoundChangeEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceiveRoundChangeEvent>),
    doc = "Register a handler closure to be invoked after the replica receives a round change. Optional."))]
    on_receive_round_change: Option<HandlerPtr<ReceiveRoundChangeEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceiveNewRoundEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceiveNewRoundEvent>),
    doc = "Register a handler closure to be invoked after the replica accepts a new round message. Optional."))]
    on_receive_new_round: Option<HandlerPtr<ReceiveNewRoundEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&RoundTimeoutEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<RoundTimeoutEvent>),
    doc = "Register a handler closure to be invoked after the replica's current round times out. Optional."))]
    on_round_timeout: Option<HandlerPtr<RoundTimeoutEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&CollectRoundChangeCertificateEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<CollectRoundChangeCertificateEvent>),
    doc = "Register a handler closure to be invoked after the replica collects a round change certificate. Optional."))]
    on_collect_round_change_certificate: Option<HandlerPtr<CollectRoundChangeCertificateEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&CommitBlockEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<CommitBlockEvent>),
    doc = "Register a handler closure to be invoked after a block is committed and handed to the app for import. Optional."))]
    on_commit_block: Option<HandlerPtr<CommitBlockEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&RejectMessageEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<RejectMessageEvent>),
    doc = "Register a handler closure to be invoked after a message fails validation. Optional."))]
    on_reject_message: Option<HandlerPtr<RejectMessageEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&DiscardMessageEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<DiscardMessageEvent>),
    doc = "Register a handler closure to be invoked after a message or timer expiry is dropped without being validated. Optional."))]
    on_discard_message: Option<HandlerPtr<DiscardMessageEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&BufferFutureMessageEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<BufferFutureMessageEvent>),
    doc = "Register a handler closure to be invoked after a message is buffered for a later height. Optional."))]
    on_buffer_future_message: Option<HandlerPtr<BufferFutureMessageEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&GossipEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<GossipEvent>),
    doc = "Register a handler closure to be invoked after the replica gossips a message received from a peer. Optional."))]
    on_gossip: Option<HandlerPtr<GossipEvent>>,
}

impl<A: App + 'static, N: Network + 'static> ReplicaSpec<A, N> {
    /// Starts all threads and channels associated with running a replica, and returns the handles to
    /// them in a [Replica] struct.
    pub fn start(self) -> Replica {
        let mut event_handlers = EventHandlers::new(self.configuration.log_events);
        event_handlers.start_height_handlers.extend(self.on_start_height);
        event_handlers.start_round_handlers.extend(self.on_start_round);
        event_handlers.propose_handlers.extend(self.on_propose);
        event_handlers.prepare_handlers.extend(self.on_prepare);
        event_handlers.commit_handlers.extend(self.on_commit);
        event_handlers.round_change_handlers.extend(self.on_round_change);
        event_handlers.new_round_handlers.extend(self.on_new_round);
        event_handlers.receive_proposal_handlers.extend(self.on_receive_proposal);
        event_handlers.receive_prepare_handlers.extend(self.on_receive_prepare);
        event_handlers.receive_commit_handlers.extend(self.on_receive_commit);
        event_handlers.receive_round_change_handlers.extend(self.on_receive_round_change);
        event_handlers.receive_new_round_handlers.extend(self.on_receive_new_round);
        event_handlers.round_timeout_handlers.extend(self.on_round_timeout);
        event_handlers.collect_round_change_certificate_handlers.extend(self.on_collect_round_change_certificate);
        event_handlers.commit_block_handlers.extend(self.on_commit_block);
        event_handlers.reject_message_handlers.extend(self.on_reject_message);
        event_handlers.discard_message_handlers.extend(self.on_discard_message);
        event_handlers.buffer_future_message_handlers.extend(self.on_buffer_future_message);
        event_handlers.gossip_handlers.extend(self.on_gossip);

        let (event_publisher, event_subscriber) = if !event_handlers.is_empty() {
            Some(mpsc::channel()).unzip()
        } else {
            (None, None)
        };

        let (event_queue, events) = EventQueue::new(self.configuration.event_queue_capacity);

        let scheduler = DeadlineScheduler::new();
        let controller = Controller::new(
            &self.configuration,
            self.app,
            self.network.clone(),
            scheduler.clone(),
            event_publisher,
        );
        let (processor_shutdown, processor_shutdown_receiver) = mpsc::channel();
        let processor = start_processor(controller, scheduler, events, processor_shutdown_receiver);

        let (poller_shutdown, poller_shutdown_receiver) = mpsc::channel();
        let poller = start_polling(self.network, event_queue.clone(), poller_shutdown_receiver);

        let (event_bus, event_bus_shutdown) = match event_subscriber {
            Some(event_subscriber) => {
                let (event_bus_shutdown, event_bus_shutdown_receiver) = mpsc::channel();
                let event_bus =
                    start_event_bus(event_handlers, event_subscriber, event_bus_shutdown_receiver);
                (Some(event_bus), Some(event_bus_shutdown))
            }
            None => (None, None),
        };

        Replica {
            event_queue,
            poller: Some(poller),
            poller_shutdown,
            processor: Some(processor),
            processor_shutdown,
            event_bus,
            event_bus_shutdown,
        }
    }
}

/// A handle to the background threads of an ibft-rs replica. When this value is dropped, all
/// background threads are gracefully shut down.
pub struct Replica {
    event_queue: EventQueue,
    poller: Option<JoinHandle<()>>,
    poller_shutdown: Sender<()>,
    processor: Option<JoinHandle<Result<(), IbftError>>>,
    processor_shutdown: Sender<()>,
    event_bus: Option<JoinHandle<()>>,
    event_bus_shutdown: Option<Sender<()>>,
}

impl Replica {
    /// Tell the replica that the local chain grew to `chain_head` through other means than the
    /// replica itself, e.g., block sync. The replica moves on to the child of `chain_head` if it is
    /// ahead of the height currently being agreed on.
    pub fn notify_new_chain_head(&self, chain_head: BlockHeader) -> Result<(), QueueError> {
        self.event_queue.push(IbftEvent::NewChainHead(chain_head))
    }

    /// Get the queue that feeds the replica's processor thread.
    pub fn event_queue(&self) -> &EventQueue {
        &self.event_queue
    }

    /// Stop all background threads, and get the result the processor thread stopped with.
    ///
    /// The result is an [`IbftError::App`] if the processor had already stopped because an [`App`]
    /// method failed. A panic in the processor thread is resumed on the calling thread.
    pub fn stop(mut self) -> Result<(), IbftError> {
        match self.shutdown() {
            Some(Ok(result)) => result,
            Some(Err(panic)) => std::panic::resume_unwind(panic),
            None => Ok(()),
        }
    }

    // The poller pushes onto the queue that the processor consumes, and the processor publishes to the
    // event bus. Each thread is stopped before the threads it depends on.
    fn shutdown(&mut self) -> Option<thread::Result<Result<(), IbftError>>> {
        let _ = self.poller_shutdown.send(());
        if let Some(poller) = self.poller.take() {
            let _ = poller.join();
        }

        let _ = self.processor_shutdown.send(());
        let processor_result = self.processor.take().map(JoinHandle::join);

        if let Some(event_bus_shutdown) = &self.event_bus_shutdown {
            let _ = event_bus_shutdown.send(());
        }
        if let Some(event_bus) = self.event_bus.take() {
            let _ = event_bus.join();
        }

        processor_result
    }
}

impl Drop for Replica {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
