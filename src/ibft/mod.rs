/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The IBFT 2.0 consensus core.
//!
//! The [`Controller`](controller::Controller) is the entry point. It keeps one
//! [`BlockHeightManager`](height_manager::BlockHeightManager) for the height being agreed on, which in
//! turn keeps the state of every round of that height.

pub mod controller;

pub mod messages;

pub mod roles;

pub mod validation;

pub(crate) mod future_messages;

pub(crate) mod height_manager;

pub(crate) mod round_change;

pub(crate) mod round_state;

#[cfg(test)]
pub(crate) mod test_utils;
