/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Aggregation of RoundChange messages into round change certificates.
//!
//! Validators may ask to move to different rounds at the same time, so RoundChange messages are
//! collected separately for every round. A [`RoundChangeCertificate`] for a round is produced exactly
//! once: on the message that brings the number of distinct senders for that round up to a quorum.

use std::collections::BTreeMap;
use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::app::{App, AppError};
use crate::events::{CollectRoundChangeCertificateEvent, Event};
use crate::ibft::messages::{RoundChange, RoundChangeCertificate, SignedPayload};
use crate::ibft::validation::{MessageValidatorFactory, RoundChangeMessageValidator};
use crate::types::data_types::{Address, RoundIdentifier};

/// RoundChange messages received for a single round.
#[derive(Default)]
struct RoundChangeStatus {
    received_messages: BTreeMap<Address, SignedPayload<RoundChange>>,
    actioned: bool,
}

pub(crate) struct RoundChangeManager {
    quorum: usize,
    validator: RoundChangeMessageValidator,
    cache: BTreeMap<RoundIdentifier, RoundChangeStatus>,
    event_publisher: Option<Sender<Event>>,
}

impl RoundChangeManager {
    pub(crate) fn new(
        factory: MessageValidatorFactory,
        event_publisher: Option<Sender<Event>>,
    ) -> Self {
        Self {
            quorum: factory.quorum(),
            validator: RoundChangeMessageValidator::new(factory),
            cache: BTreeMap::new(),
            event_publisher,
        }
    }

    /// Add `round_change` to the messages collected for its round, and return a round change
    /// certificate if it completes a quorum for that round.
    ///
    /// Invalid messages are dropped. A message from a sender that already sent a RoundChange for the
    /// same round replaces the earlier one. Once a certificate has been produced for a round, further
    /// messages for that round are ignored.
    pub(crate) fn append_round_change_message<A: App>(
        &mut self,
        round_change: SignedPayload<RoundChange>,
        app: &A,
    ) -> Result<Option<RoundChangeCertificate>, AppError> {
        if !self.validator.validate(&round_change, app)? {
            return Ok(None);
        }

        let round = round_change.round_identifier();
        let status = self.cache.entry(round).or_default();
        if status.actioned {
            return Ok(None);
        }

        status
            .received_messages
            .insert(round_change.sender(), round_change);
        if status.received_messages.len() < self.quorum {
            return Ok(None);
        }

        status.actioned = true;
        let round_change_certificate = RoundChangeCertificate {
            round_changes: status.received_messages.values().cloned().collect(),
        };

        Event::publish(
            &self.event_publisher,
            Event::CollectRoundChangeCertificate(CollectRoundChangeCertificateEvent {
                timestamp: SystemTime::now(),
                round,
                signers: round_change_certificate.senders(),
            }),
        );

        Ok(Some(round_change_certificate))
    }

    /// Forget the RoundChange messages collected for every round before `target`.
    pub(crate) fn discard_rounds_prior_to(&mut self, target: RoundIdentifier) {
        self.cache = self.cache.split_off(&target);
    }
}
