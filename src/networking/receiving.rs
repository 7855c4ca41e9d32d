/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions for receiving messages from the P2P network.

use std::sync::mpsc::{Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use crate::logging::log_dropped_input;
use crate::processor::{EventQueue, IbftEvent, QueueError};

use super::network::Network;

/// Spawn the poller thread, which polls the [`Network`] for messages and pushes them onto the
/// processor's [`EventQueue`] until `shutdown_signal` is received.
///
/// Messages are not inspected here. If the queue is full, the message is dropped and a warning is
/// logged. Peers re-send and gossip messages, so a dropped message is usually received again.
pub(crate) fn start_polling<N: Network + 'static>(
    mut network: N,
    event_queue: EventQueue,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => return,
            Err(TryRecvError::Empty) => (),
        }

        if let Some((origin, message)) = network.recv() {
            match event_queue.push(IbftEvent::Message(origin, message)) {
                Ok(()) => (),
                Err(err @ QueueError::Full) => log_dropped_input(&origin, &err),
                Err(QueueError::Disconnected) => return,
            }
        } else {
            thread::yield_now()
        }
    })
}
