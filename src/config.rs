/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Configuration of a replica, as specified by the operator.
//!
//! [`Configuration`] is split up into smaller, component specific configuration structs before being
//! passed to the components that use it.

use std::time::Duration;

use ed25519_dalek::SigningKey;
use typed_builder::TypedBuilder;

use crate::types::{
    crypto_primitives::Keypair,
    data_types::{Address, BufferSize, Round},
};

#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [Configuration]. On the builder call the following methods to construct a valid [Configuration].

    Required:
    - `.me(...)`

    Optional:
    - `.block_period(...)`
    - `.request_timeout(...)`
    - `.future_messages_max_distance(...)`
    - `.future_messages_limit(...)`
    - `.future_rounds_max_distance(...)`
    - `.gossip_history_limit(...)`
    - `.event_queue_capacity(...)`
    - `.log_events(...)`
"))]
pub struct Configuration {
    #[builder(setter(doc = "Set the replica's signing key, used to sign messages and commit seals. Required."))]
    pub me: SigningKey,
    #[builder(
        default = Duration::from_secs(1),
        setter(doc = "Set the minimum time between the timestamp of a parent block and the proposal of its child in round 0. Defaults to 1 second.")
    )]
    pub block_period: Duration,
    #[builder(
        default = Duration::from_secs(10),
        setter(doc = "Set the timeout of round 0. The timeout of round `r` is this value times `2^r`. Defaults to 10 seconds.")
    )]
    pub request_timeout: Duration,
    #[builder(
        default = 10,
        setter(doc = "Set how many heights beyond the current height messages are buffered for. Messages for later heights are discarded. Defaults to 10.")
    )]
    pub future_messages_max_distance: u64,
    #[builder(
        default = BufferSize::new(1000),
        setter(doc = "Set the maximum number of messages for future heights that are buffered at any given moment. Defaults to 1000.")
    )]
    pub future_messages_limit: BufferSize,
    #[builder(
        default = 10,
        setter(doc = "Set how many rounds beyond the current round of a height messages are kept for. Messages for later rounds are discarded. Defaults to 10.")
    )]
    pub future_rounds_max_distance: u32,
    #[builder(
        default = 10_000,
        setter(doc = "Set the number of recently gossiped messages that are remembered to avoid gossiping them twice. Defaults to 10000.")
    )]
    pub gossip_history_limit: usize,
    #[builder(
        default = BufferSize::new(1000),
        setter(doc = "Set the maximum number of events waiting to be processed. Events arriving when the queue is full are dropped. Defaults to 1000.")
    )]
    pub event_queue_capacity: BufferSize,
    #[builder(default = false, setter(doc = "Enable logging? Defaults to false."))]
    pub log_events: bool,
}

impl Configuration {
    pub(crate) fn ibft_configuration(&self) -> IbftConfiguration {
        IbftConfiguration::new(
            Keypair::new(self.me.clone()),
            self.block_period,
            self.request_timeout,
            self.future_rounds_max_distance,
        )
    }
}

/// Parameters of the per-height protocol.
#[derive(Clone)]
pub(crate) struct IbftConfiguration {
    pub(crate) keypair: Keypair,
    pub(crate) me: Address,
    pub(crate) block_period: Duration,
    pub(crate) request_timeout: Duration,
    pub(crate) future_rounds_max_distance: u32,
}

impl IbftConfiguration {
    pub(crate) fn new(
        keypair: Keypair,
        block_period: Duration,
        request_timeout: Duration,
        future_rounds_max_distance: u32,
    ) -> Self {
        Self {
            me: keypair.address(),
            keypair,
            block_period,
            request_timeout,
            future_rounds_max_distance,
        }
    }

    /// Whether `round` is further beyond `current` than messages are kept for.
    pub(crate) fn is_too_far_ahead(&self, round: Round, current: Round) -> bool {
        round.int().saturating_sub(current.int()) > self.future_rounds_max_distance
    }

    /// Get the timeout of `round`: `request_timeout * 2^round`, saturating at [`Duration::MAX`].
    pub(crate) fn round_timeout(&self, round: Round) -> Duration {
        2u32.checked_pow(round.int())
            .and_then(|factor| self.request_timeout.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }
}
