/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types and traits that are used across multiple components of ibft-rs.
//!
//! Types that are specific to the consensus protocol itself, e.g., its messages and certificates,
//! can be found in [`crate::ibft`].

pub mod data_types;

pub mod crypto_primitives;

pub mod block;

pub mod validator_set;
