/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Default loggers for [events](crate::events), registered on the event bus when
//! [`Configuration::log_events`](crate::config::Configuration::log_events) is set.
//!
//! Lines are emitted through the [log](https://docs.rs/log/latest/log/) facade, so nothing is printed
//! until the library user installs a
//! [logger](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Line format
//!
//! Every line is a comma separated list. It starts with the event name (one of the constants below)
//! and the whole seconds since the Unix Epoch at which the event happened. Event-specific values
//! follow. Addresses and hashes are shortened to the first seven characters of their Base64 encoding.
//! A [ReceivePrepare](crate::events::ReceivePrepareEvent), for instance, looks like this:
//!
//! ```text
//! ReceivePrepare, 1701329264, Id5u7f6, 12/0, fNGCJyk
//! ```
//!
//! Here `Id5u7f6` is the signer of the prepare, `12/0` is its round as `height/round`, and `fNGCJyk`
//! is the hash of the prepared block.
//!
//! ## Log levels
//!
//! Protocol progress is logged at `info`, discarded messages at `debug`, and rejected messages at
//! `trace`.
//!
//! Two lines have no corresponding event and are logged whether or not events are enabled: a `warn`
//! when a received message is dropped because the event queue is full, and an `error` when the
//! processor stops because the app failed.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use log;
use std::time::SystemTime;

use crate::events::*;
use crate::ibft::controller::IbftError;
use crate::ibft::messages::{NewRound, RoundChange};
use crate::processor::QueueError;
use crate::types::data_types::Address;

pub const START_HEIGHT: &str = "StartHeight";
pub const START_ROUND: &str = "StartRound";

pub const PROPOSE: &str = "Propose";
pub const PREPARE: &str = "Prepare";
pub const COMMIT: &str = "Commit";
pub const ROUND_CHANGE: &str = "RoundChange";
pub const NEW_ROUND: &str = "NewRound";

pub const RECEIVE_PROPOSAL: &str = "ReceiveProposal";
pub const RECEIVE_PREPARE: &str = "ReceivePrepare";
pub const RECEIVE_COMMIT: &str = "ReceiveCommit";
pub const RECEIVE_ROUND_CHANGE: &str = "ReceiveRoundChange";
pub const RECEIVE_NEW_ROUND: &str = "ReceiveNewRound";

pub const ROUND_TIMEOUT: &str = "RoundTimeout";
pub const COLLECT_ROUND_CHANGE_CERTIFICATE: &str = "CollectRoundChangeCertificate";
pub const COMMIT_BLOCK: &str = "CommitBlock";

pub const REJECT_MESSAGE: &str = "RejectMessage";
pub const DISCARD_MESSAGE: &str = "DiscardMessage";
pub const BUFFER_FUTURE_MESSAGE: &str = "BufferFutureMessage";
pub const GOSSIP: &str = "Gossip";

pub const DROP_INPUT: &str = "DropInput";
pub const STOP_PROCESSOR: &str = "StopProcessor";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for StartHeightEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |start_height_event: &StartHeightEvent| {
            log::info!(
                "{}, {}, {}, {}",
                START_HEIGHT,
                secs_since_unix_epoch(start_height_event.timestamp),
                start_height_event.height,
                start_height_event.validator_count
            )
        };
        Box::new(logger)
    }
}

impl Logger for StartRoundEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |start_round_event: &StartRoundEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                START_ROUND,
                secs_since_unix_epoch(start_round_event.timestamp),
                start_round_event.round,
                start_round_event
                    .proposer
                    .map(|proposer| first_seven_base64_chars(&proposer.bytes()))
                    .unwrap_or_default(),
                start_round_event.timeout.as_millis()
            )
        };
        Box::new(logger)
    }
}

impl Logger for ProposeEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |propose_event: &ProposeEvent| {
            log::info!(
                "{}, {}, {}, {}",
                PROPOSE,
                secs_since_unix_epoch(propose_event.timestamp),
                propose_event.proposal.round,
                first_seven_base64_chars(&propose_event.proposal.block.hash().bytes())
            )
        };
        Box::new(logger)
    }
}

impl Logger for PrepareEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |prepare_event: &PrepareEvent| {
            log::info!(
                "{}, {}, {}, {}",
                PREPARE,
                secs_since_unix_epoch(prepare_event.timestamp),
                prepare_event.prepare.round,
                first_seven_base64_chars(&prepare_event.prepare.digest.bytes())
            )
        };
        Box::new(logger)
    }
}

impl Logger for CommitEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |commit_event: &CommitEvent| {
            log::info!(
                "{}, {}, {}, {}",
                COMMIT,
                secs_since_unix_epoch(commit_event.timestamp),
                commit_event.commit.round,
                first_seven_base64_chars(&commit_event.commit.digest.bytes())
            )
        };
        Box::new(logger)
    }
}

impl Logger for RoundChangeEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |round_change_event: &RoundChangeEvent| {
            log::info!(
                "{}, {}, {}, {}",
                ROUND_CHANGE,
                secs_since_unix_epoch(round_change_event.timestamp),
                round_change_event.round_change.round,
                prepared_round_info(&round_change_event.round_change)
            )
        };
        Box::new(logger)
    }
}

impl Logger for NewRoundEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |new_round_event: &NewRoundEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                NEW_ROUND,
                secs_since_unix_epoch(new_round_event.timestamp),
                new_round_event.new_round.round,
                first_seven_base64_chars(
                    &new_round_event.new_round.proposal.payload.block.hash().bytes()
                ),
                round_change_certificate_size(&new_round_event.new_round)
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveProposalEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_proposal_event: &ReceiveProposalEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                RECEIVE_PROPOSAL,
                secs_since_unix_epoch(receive_proposal_event.timestamp),
                first_seven_base64_chars(&receive_proposal_event.origin.bytes()),
                receive_proposal_event.proposal.round,
                first_seven_base64_chars(&receive_proposal_event.proposal.block.hash().bytes())
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceivePrepareEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_prepare_event: &ReceivePrepareEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                RECEIVE_PREPARE,
                secs_since_unix_epoch(receive_prepare_event.timestamp),
                first_seven_base64_chars(&receive_prepare_event.origin.bytes()),
                receive_prepare_event.prepare.round,
                first_seven_base64_chars(&receive_prepare_event.prepare.digest.bytes())
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveCommitEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_commit_event: &ReceiveCommitEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                RECEIVE_COMMIT,
                secs_since_unix_epoch(receive_commit_event.timestamp),
                first_seven_base64_chars(&receive_commit_event.origin.bytes()),
                receive_commit_event.commit.round,
                first_seven_base64_chars(&receive_commit_event.commit.digest.bytes())
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveRoundChangeEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_round_change_event: &ReceiveRoundChangeEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                RECEIVE_ROUND_CHANGE,
                secs_since_unix_epoch(receive_round_change_event.timestamp),
                first_seven_base64_chars(&receive_round_change_event.origin.bytes()),
                receive_round_change_event.round_change.round,
                prepared_round_info(&receive_round_change_event.round_change)
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveNewRoundEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_new_round_event: &ReceiveNewRoundEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                RECEIVE_NEW_ROUND,
                secs_since_unix_epoch(receive_new_round_event.timestamp),
                first_seven_base64_chars(&receive_new_round_event.origin.bytes()),
                receive_new_round_event.new_round.round,
                first_seven_base64_chars(
                    &receive_new_round_event
                        .new_round
                        .proposal
                        .payload
                        .block
                        .hash()
                        .bytes()
                ),
                round_change_certificate_size(&receive_new_round_event.new_round)
            )
        };
        Box::new(logger)
    }
}

impl Logger for RoundTimeoutEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |round_timeout_event: &RoundTimeoutEvent| {
            log::info!(
                "{}, {}, {}",
                ROUND_TIMEOUT,
                secs_since_unix_epoch(round_timeout_event.timestamp),
                round_timeout_event.round
            )
        };
        Box::new(logger)
    }
}

impl Logger for CollectRoundChangeCertificateEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |collect_event: &CollectRoundChangeCertificateEvent| {
            log::info!(
                "{}, {}, {}, {}",
                COLLECT_ROUND_CHANGE_CERTIFICATE,
                secs_since_unix_epoch(collect_event.timestamp),
                collect_event.round,
                collect_event.signers.len()
            )
        };
        Box::new(logger)
    }
}

impl Logger for CommitBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |commit_block_event: &CommitBlockEvent| {
            let level = if commit_block_event.imported {
                log::Level::Info
            } else {
                log::Level::Warn
            };
            log::log!(
                level,
                "{}, {}, {}, {}, {}, {}",
                COMMIT_BLOCK,
                secs_since_unix_epoch(commit_block_event.timestamp),
                first_seven_base64_chars(&commit_block_event.block.bytes()),
                commit_block_event.round,
                commit_block_event.commit_seals,
                commit_block_event.imported
            )
        };
        Box::new(logger)
    }
}

impl Logger for RejectMessageEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |reject_message_event: &RejectMessageEvent| {
            log::trace!(
                "{}, {}, {}, {}, {:?}",
                REJECT_MESSAGE,
                secs_since_unix_epoch(reject_message_event.timestamp),
                first_seven_base64_chars(&reject_message_event.origin.bytes()),
                reject_message_event.round,
                reject_message_event.reason
            )
        };
        Box::new(logger)
    }
}

impl Logger for DiscardMessageEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |discard_message_event: &DiscardMessageEvent| {
            log::debug!(
                "{}, {}, {}, {}, {:?}",
                DISCARD_MESSAGE,
                secs_since_unix_epoch(discard_message_event.timestamp),
                discard_message_event
                    .origin
                    .map(|origin| first_seven_base64_chars(&origin.bytes()))
                    .unwrap_or_default(),
                discard_message_event.round,
                discard_message_event.reason
            )
        };
        Box::new(logger)
    }
}

impl Logger for BufferFutureMessageEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |buffer_event: &BufferFutureMessageEvent| {
            log::debug!(
                "{}, {}, {}, {}",
                BUFFER_FUTURE_MESSAGE,
                secs_since_unix_epoch(buffer_event.timestamp),
                first_seven_base64_chars(&buffer_event.origin.bytes()),
                buffer_event.round
            )
        };
        Box::new(logger)
    }
}

impl Logger for GossipEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |gossip_event: &GossipEvent| {
            log::debug!(
                "{}, {}, {}, {}, {}",
                GOSSIP,
                secs_since_unix_epoch(gossip_event.timestamp),
                gossip_event.code,
                first_seven_base64_chars(&gossip_event.origin.bytes()),
                first_seven_base64_chars(&gossip_event.peer.bytes())
            )
        };
        Box::new(logger)
    }
}

/// Log that a message received from `origin` was dropped before reaching the processor. These inputs
/// never reach the controller, so no event is published for them.
pub(crate) fn log_dropped_input(origin: &Address, err: &QueueError) {
    log::warn!(
        "{}, {}, {}, {}",
        DROP_INPUT,
        secs_since_unix_epoch(SystemTime::now()),
        first_seven_base64_chars(&origin.bytes()),
        err
    )
}

/// Log that the processor thread stopped because of `err`.
pub(crate) fn log_stopped_processor(err: &IbftError) {
    log::error!(
        "{}, {}, {}",
        STOP_PROCESSOR,
        secs_since_unix_epoch(SystemTime::now()),
        err
    )
}

// Shortens addresses and hashes to the first seven characters of their Base64 encoding.
fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}

fn prepared_round_info(round_change: &RoundChange) -> String {
    match &round_change.prepared_certificate {
        Some(cert) => format!(
            "prepared in {}, block: {}, no. of prepares: {}",
            cert.round_identifier(),
            first_seven_base64_chars(&cert.block().hash().bytes()),
            cert.prepares.len()
        ),
        None => String::from("not prepared"),
    }
}

fn round_change_certificate_size(new_round: &NewRound) -> usize {
    new_round
        .round_change_certificate
        .as_ref()
        .map_or(0, |cert| cert.round_changes.len())
}
