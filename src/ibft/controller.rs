/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Top-level entry point of the consensus core.
//!
//! The [`Controller`] receives every input of the protocol: messages from the network, timer
//! expiries from the [`Scheduler`], and new chain heads. It owns the
//! [`BlockHeightManager`] of the current height and replaces it whenever the chain grows.
//!
//! ## Height gating
//!
//! Messages are decoded once, then classified by the height they belong to:
//! - **Current height**: if the signer is a validator of the height, the message is gossiped, then
//!   handed to the height manager.
//! - **Later height**: the message is buffered, and replayed in the order it was received once its
//!   height becomes current.
//! - **Earlier height**: the message is discarded.
//!
//! Timer expiries for any height other than the current one are discarded.
//!
//! ## Errors
//!
//! Handlers return an [`IbftError`] if a message cannot be decoded, which only affects that message,
//! or if a call into the [`App`] fails.

use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::app::{App, AppError};
use crate::config::{Configuration, IbftConfiguration};
use crate::events::{BufferFutureMessageEvent, DiscardMessageEvent, DiscardReason, Event};
use crate::ibft::future_messages::FutureMessageBuffer;
use crate::ibft::height_manager::{BlockHeightManager, HeightStatus};
use crate::ibft::messages::{DecodeError, IbftMessage};
use crate::networking::{gossip::Gossiper, messages::Message, network::Network, sending::SenderHandle};
use crate::timers::Scheduler;
use crate::types::{
    block::BlockHeader,
    data_types::{Address, BlockHeight, BufferSize, Round, RoundIdentifier},
    validator_set::ValidatorSet,
};

/// Drives the IBFT protocol for one replica, one height after another.
pub struct Controller<A: App, N: Network, S: Scheduler + Clone> {
    config: IbftConfiguration,
    app: A,
    network: N,
    scheduler: S,
    validator_set: ValidatorSet,
    height_manager: Option<BlockHeightManager<N, S>>,
    future_messages: FutureMessageBuffer,
    gossiper: Gossiper<N>,
    event_publisher: Option<Sender<Event>>,
}

impl<A: App, N: Network, S: Scheduler + Clone> Controller<A, N, S> {
    pub fn new(
        configuration: &Configuration,
        app: A,
        network: N,
        scheduler: S,
        event_publisher: Option<Sender<Event>>,
    ) -> Self {
        let config = configuration.ibft_configuration();
        let gossiper = Gossiper::new(
            config.me,
            SenderHandle::new(network.clone()),
            configuration.gossip_history_limit,
            event_publisher.clone(),
        );
        Self {
            config,
            app,
            network,
            scheduler,
            validator_set: ValidatorSet::default(),
            height_manager: None,
            future_messages: FutureMessageBuffer::new(
                configuration.future_messages_max_distance,
                configuration.future_messages_limit,
            ),
            gossiper,
            event_publisher,
        }
    }

    /// Start working on the child of the app's current chain head.
    pub fn start(&mut self) -> Result<(), IbftError> {
        let chain_head = self.app.chain_head_header();
        self.start_new_height_manager(chain_head)
    }

    /// Get the height that is currently being agreed on, or `None` if the controller has not started.
    pub fn height(&self) -> Option<BlockHeight> {
        self.height_manager.as_ref().map(BlockHeightManager::height)
    }

    /// Get the current round of the current height, or `None` if the controller has not started.
    pub fn current_round(&self) -> Option<RoundIdentifier> {
        self.height_manager
            .as_ref()
            .map(BlockHeightManager::current_round)
    }

    /// Get the number of messages buffered for later heights.
    pub fn buffered_messages(&self) -> BufferSize {
        self.future_messages.len()
    }

    pub fn app(&self) -> &A {
        &self.app
    }

    /// Handle `message`, received from `origin`.
    pub fn handle_message(&mut self, origin: Address, message: Message) -> Result<(), IbftError> {
        let current_height = self.height().ok_or(IbftError::NotStarted)?;
        let ibft_message = IbftMessage::decode(&message)?;
        let round = ibft_message.round_identifier();
        let sender = ibft_message.sender();

        match round.height.cmp(&current_height) {
            Ordering::Less => {
                self.discard(round, Some(sender), DiscardReason::StaleHeight);
                Ok(())
            }
            Ordering::Greater => {
                match self
                    .future_messages
                    .add(current_height, round.height, origin, message)
                {
                    Ok(()) => Event::publish(
                        &self.event_publisher,
                        Event::BufferFutureMessage(BufferFutureMessageEvent {
                            timestamp: SystemTime::now(),
                            round,
                            origin: sender,
                        }),
                    ),
                    Err(reason) => self.discard(round, Some(sender), reason),
                }
                Ok(())
            }
            Ordering::Equal => {
                if !self.validator_set.contains(&sender) {
                    self.discard(round, Some(sender), DiscardReason::UnknownSender);
                    return Ok(());
                }

                self.gossiper.gossip(&ibft_message, message, origin);
                self.dispatch(ibft_message)?;
                self.advance_if_committed()
            }
        }
    }

    /// Handle the expiry of the block timer armed for `round`.
    pub fn handle_block_timer_expiry(&mut self, round: RoundIdentifier) -> Result<(), IbftError> {
        let height_manager = self.height_manager.as_mut().ok_or(IbftError::NotStarted)?;
        if round.height != height_manager.height() {
            self.discard(round, None, DiscardReason::StaleTimer);
            return Ok(());
        }

        height_manager.handle_block_timer_expiry(round, &mut self.app)?;
        self.advance_if_committed()
    }

    /// Handle the expiry of the round timer armed for `round`.
    pub fn handle_round_expiry(&mut self, round: RoundIdentifier) -> Result<(), IbftError> {
        let height_manager = self.height_manager.as_mut().ok_or(IbftError::NotStarted)?;
        if round.height != height_manager.height() {
            self.discard(round, None, DiscardReason::StaleTimer);
            return Ok(());
        }

        height_manager.handle_round_expiry(round, &mut self.app)?;
        self.advance_if_committed()
    }

    /// Handle the chain growing to `chain_head`, which is for example the case after a block was
    /// imported through other means than this controller.
    ///
    /// Chain heads that are not higher than the parent of the current height are ignored.
    pub fn handle_new_chain_head(&mut self, chain_head: BlockHeader) -> Result<(), IbftError> {
        let current_height = self.height().ok_or(IbftError::NotStarted)?;
        if chain_head.height + 1 <= current_height {
            self.discard(
                RoundIdentifier::new(chain_head.height + 1, Round::init()),
                None,
                DiscardReason::StaleHeight,
            );
            return Ok(());
        }

        self.start_new_height_manager(chain_head)
    }

    fn dispatch(&mut self, ibft_message: IbftMessage) -> Result<(), IbftError> {
        let height_manager = self.height_manager.as_mut().ok_or(IbftError::NotStarted)?;
        let app = &mut self.app;
        match ibft_message {
            IbftMessage::Proposal(proposal) => height_manager.handle_proposal(proposal, app)?,
            IbftMessage::Prepare(prepare) => height_manager.handle_prepare(prepare, app)?,
            IbftMessage::Commit(commit) => height_manager.handle_commit(commit, app)?,
            IbftMessage::RoundChange(round_change) => {
                height_manager.handle_round_change(round_change, app)?
            }
            IbftMessage::NewRound(new_round) => height_manager.handle_new_round(new_round, app)?,
        }
        Ok(())
    }

    // Move on to the next height once the current one is committed and the app's chain has grown.
    fn advance_if_committed(&mut self) -> Result<(), IbftError> {
        let committed_height = match &self.height_manager {
            Some(height_manager) if height_manager.status() == HeightStatus::Committed => {
                height_manager.height()
            }
            _ => return Ok(()),
        };

        if self.app.chain_head_height() >= committed_height {
            let chain_head = self.app.chain_head_header();
            self.start_new_height_manager(chain_head)?;
        }
        Ok(())
    }

    // Replace the height manager with one for the child of `parent_header`, start it, then replay the
    // messages buffered for the new height.
    fn start_new_height_manager(&mut self, parent_header: BlockHeader) -> Result<(), IbftError> {
        let height = parent_header.height + 1;
        self.validator_set = self.app.validators_at_height(height);

        let mut height_manager = BlockHeightManager::new(
            self.config.clone(),
            parent_header,
            self.validator_set.clone(),
            SenderHandle::new(self.network.clone()),
            self.scheduler.clone(),
            self.event_publisher.clone(),
        );
        height_manager.start();
        self.height_manager = Some(height_manager);

        for (origin, message) in self.future_messages.take_for_height(height) {
            self.handle_message(origin, message)?;
        }
        Ok(())
    }

    fn discard(&self, round: RoundIdentifier, origin: Option<Address>, reason: DiscardReason) {
        Event::publish(
            &self.event_publisher,
            Event::DiscardMessage(DiscardMessageEvent {
                timestamp: SystemTime::now(),
                round,
                origin,
                reason,
            }),
        )
    }
}

/// Failure of a [`Controller`] handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IbftError {
    Decode(DecodeError),
    App(AppError),
    NotStarted,
}

impl From<DecodeError> for IbftError {
    fn from(value: DecodeError) -> Self {
        IbftError::Decode(value)
    }
}

impl From<AppError> for IbftError {
    fn from(value: AppError) -> Self {
        IbftError::App(value)
    }
}

impl Display for IbftError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            IbftError::Decode(err) => Display::fmt(err, f),
            IbftError::App(err) => write!(f, "app failure: {}", err),
            IbftError::NotStarted => write!(f, "controller has not been started"),
        }
    }
}

impl std::error::Error for IbftError {}
