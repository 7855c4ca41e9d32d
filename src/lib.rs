/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A Rust implementation of the round management of the IBFT 2.0 Byzantine fault tolerant consensus
//! protocol.
//!
//! ibft-rs agrees on one block per height among a set of validators, of which fewer than a third may be
//! faulty. The library user provides the blockchain through the [`App`](app::App) trait and peer-to-peer
//! networking through the [`Network`](networking::network::Network) trait, and starts a
//! [`Replica`](replica::Replica) with a [`ReplicaSpec`](replica::ReplicaSpec).
//!
//! ## Protocol overview
//!
//! Each height proceeds in rounds numbered from 0:
//! 1. The proposer of the round broadcasts a Proposal. In rounds after 0, the proposal is carried in a
//!    NewRound, together with the round change certificate that justifies the round.
//! 2. Validators that accept the proposal broadcast a Prepare.
//! 3. Validators that see the proposal together with a quorum of Prepares broadcast a Commit, which
//!    carries a commit seal over the block.
//! 4. Validators that see a quorum of Commits seal the block with the collected commit seals and
//!    import it.
//!
//! If a round does not complete before its timer expires, validators broadcast a RoundChange for the
//! next round, carrying the latest prepared certificate they know of so that a prepared block is
//! proposed again.
//!
//! ## Crate layout
//!
//! - [`ibft`]: the consensus core, driven by the [`Controller`](ibft::controller::Controller).
//! - [`types`]: blocks, validator sets, and cryptographic primitives.
//! - [`networking`]: the wire-level message and the `Network` trait.
//! - [`timers`], [`processor`], [`replica`]: the machinery that runs the consensus core on threads.
//! - [`events`], [`logging`]: observability.

pub mod app;

pub mod config;

pub mod events;

pub(crate) mod event_bus;

pub mod ibft;

pub mod logging;

pub mod networking;

pub mod processor;

pub mod replica;

pub mod timers;

pub mod types;
