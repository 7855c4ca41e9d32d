/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Bounded buffer of messages received for heights after the current one.

use std::collections::BTreeMap;

use crate::events::DiscardReason;
use crate::networking::messages::Message;
use crate::types::data_types::{Address, BlockHeight, BufferSize};

/// Messages for future heights, together with the peers they were received from, kept in the order
/// they were received for each height.
///
/// At most `limit` messages are kept at once. When the buffer is full, the messages for the highest
/// buffered height are evicted to make space, unless the new message is for an even higher height, in
/// which case the new message is dropped instead.
pub(crate) struct FutureMessageBuffer {
    max_distance: u64,
    limit: BufferSize,
    size: BufferSize,
    messages: BTreeMap<BlockHeight, Vec<(Address, Message)>>,
}

impl FutureMessageBuffer {
    pub(crate) fn new(max_distance: u64, limit: BufferSize) -> Self {
        Self {
            max_distance,
            limit,
            size: BufferSize::new(0),
            messages: BTreeMap::new(),
        }
    }

    /// Buffer `message`, which is for `height` and was received from `origin`, while the current height
    /// is `current_height`.
    ///
    /// # Precondition
    ///
    /// `height > current_height`.
    pub(crate) fn add(
        &mut self,
        current_height: BlockHeight,
        height: BlockHeight,
        origin: Address,
        message: Message,
    ) -> Result<(), DiscardReason> {
        if height - current_height > self.max_distance {
            return Err(DiscardReason::TooFarInFuture);
        }

        if self.limit.int() == 0 {
            return Err(DiscardReason::FutureBufferFull);
        }

        if self.size >= self.limit {
            match self.messages.last_key_value() {
                Some((highest, _)) if height > *highest => {
                    return Err(DiscardReason::FutureBufferFull)
                }
                _ => self.evict_highest(),
            }
        }

        self.messages
            .entry(height)
            .or_default()
            .push((origin, message));
        self.size += 1;
        Ok(())
    }

    /// Remove and return the messages buffered for `height`, and drop those buffered for lower heights.
    pub(crate) fn take_for_height(&mut self, height: BlockHeight) -> Vec<(Address, Message)> {
        let mut current_and_later = self.messages.split_off(&height);
        for dropped in self.messages.values() {
            self.size -= dropped.len() as u64;
        }
        let messages = current_and_later.remove(&height).unwrap_or_default();
        self.size -= messages.len() as u64;
        self.messages = current_and_later;
        messages
    }

    pub(crate) fn len(&self) -> BufferSize {
        self.size
    }

    fn evict_highest(&mut self) {
        if let Some((_, evicted)) = self.messages.pop_last() {
            self.size -= evicted.len() as u64;
        }
    }
}
