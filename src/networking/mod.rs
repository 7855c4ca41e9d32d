/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Pluggable peer-to-peer (P2P) networking.
//!
//! The library user provides an implementation of [`Network`](network::Network). ibft-rs polls it for
//! incoming [`Message`](messages::Message)s on a dedicated thread, and broadcasts through it from the
//! processor thread.

pub mod network;

pub mod messages;

pub(crate) mod gossip;

pub(crate) mod receiving;

pub(crate) mod sending;
