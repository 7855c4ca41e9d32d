/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The processor thread, which runs the [`Controller`] one input at a time.
//!
//! Inputs reach the processor in two ways:
//! 1. Through the [`EventQueue`]: messages pushed by the network poller, and new chain heads pushed by
//!    the library user through the [`Replica`](crate::replica::Replica).
//! 2. Through the [`DeadlineScheduler`]: the processor polls it for expired timers between inputs.
//!
//! Both sources are merged into a single sequence ordered by arrival: a queued event arrives when it
//! is pushed, and a timer arrives at its deadline. An event pushed before a timer expired is therefore
//! handled before that timer, however late the processor gets to either of them.
//!
//! Each input is handled to completion before the next one is taken, so the controller never sees two
//! inputs at once.

use std::fmt::{self, Display, Formatter};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::app::App;
use crate::ibft::controller::{Controller, IbftError};
use crate::logging::log_stopped_processor;
use crate::networking::{messages::Message, network::Network};
use crate::timers::{DeadlineScheduler, TimerExpiry};
use crate::types::{
    block::BlockHeader,
    data_types::{Address, BufferSize, RoundIdentifier},
};

// Longest time the processor waits on the queue before checking timers and the shutdown signal again.
const MAX_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// An input of the [`Controller`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IbftEvent {
    /// A message received from the peer at the given address.
    Message(Address, Message),
    BlockTimerExpiry(RoundIdentifier),
    RoundExpiry(RoundIdentifier),
    /// The local chain grew to the given head.
    NewChainHead(BlockHeader),
}

impl From<TimerExpiry> for IbftEvent {
    fn from(value: TimerExpiry) -> Self {
        match value {
            TimerExpiry::BlockTimer(round) => IbftEvent::BlockTimerExpiry(round),
            TimerExpiry::RoundTimer(round) => IbftEvent::RoundExpiry(round),
        }
    }
}

/// An [`IbftEvent`] together with the instant it was pushed onto the [`EventQueue`].
#[derive(Debug)]
pub(crate) struct QueuedEvent {
    pub(crate) arrived: Instant,
    pub(crate) event: IbftEvent,
}

/// Bounded, multi-producer queue of [`IbftEvent`]s waiting to be processed. Events are processed in
/// the order they were pushed.
#[derive(Clone)]
pub struct EventQueue {
    sender: SyncSender<QueuedEvent>,
}

impl EventQueue {
    /// Create a queue that holds at most `capacity` events, and the receiving end the processor takes
    /// them from.
    pub(crate) fn new(capacity: BufferSize) -> (EventQueue, Receiver<QueuedEvent>) {
        let capacity = usize::try_from(capacity.int()).unwrap_or(usize::MAX);
        let (sender, receiver) = mpsc::sync_channel(capacity);
        (EventQueue { sender }, receiver)
    }

    /// Push `event` without blocking.
    pub fn push(&self, event: IbftEvent) -> Result<(), QueueError> {
        let queued = QueuedEvent {
            arrived: Instant::now(),
            event,
        };
        self.sender.try_send(queued).map_err(|err| match err {
            TrySendError::Full(_) => QueueError::Full,
            TrySendError::Disconnected(_) => QueueError::Disconnected,
        })
    }
}

/// Failure to push onto an [`EventQueue`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueError {
    /// The queue is at capacity. The event was dropped.
    Full,
    /// The processor has stopped. The event was dropped.
    Disconnected,
}

impl Display for QueueError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Full => write!(f, "event queue is full"),
            QueueError::Disconnected => write!(f, "event queue has no consumer"),
        }
    }
}

impl std::error::Error for QueueError {}

/// Spawn the processor thread, which starts `controller` and then feeds it expired timers from
/// `scheduler` and events from `events` until `shutdown_signal` is received.
///
/// The thread also stops if handling an input fails because of the [`App`]. Its result is then that
/// error. Inputs that fail to decode only cost the input itself.
pub(crate) fn start_processor<A, N>(
    mut controller: Controller<A, N, DeadlineScheduler>,
    scheduler: DeadlineScheduler,
    events: Receiver<QueuedEvent>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<Result<(), IbftError>>
where
    A: App + 'static,
    N: Network + 'static,
{
    thread::spawn(move || {
        let mut inputs = Inputs::new(events, scheduler);
        let result = run(&mut controller, &mut inputs, &shutdown_signal);
        if let Err(err) = &result {
            log_stopped_processor(err);
        }
        result
    })
}

fn run<A: App, N: Network>(
    controller: &mut Controller<A, N, DeadlineScheduler>,
    inputs: &mut Inputs,
    shutdown_signal: &Receiver<()>,
) -> Result<(), IbftError> {
    controller.start()?;

    loop {
        match shutdown_signal.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => return Ok(()),
            Err(TryRecvError::Empty) => (),
        }

        match inputs.next(Instant::now()) {
            Some(event) => process(controller, event)?,
            None if inputs.disconnected => return Ok(()),
            None => inputs.wait(),
        }
    }
}

/// Queued events and expired timers, merged in the order they arrived.
struct Inputs {
    events: Receiver<QueuedEvent>,
    scheduler: DeadlineScheduler,
    // The oldest queued event, taken off the channel but not yet handed out.
    next_event: Option<QueuedEvent>,
    disconnected: bool,
}

impl Inputs {
    fn new(events: Receiver<QueuedEvent>, scheduler: DeadlineScheduler) -> Inputs {
        Inputs {
            events,
            scheduler,
            next_event: None,
            disconnected: false,
        }
    }

    /// Take the input that arrived first among those that arrived at or before `now`.
    ///
    /// An expired timer is only handed out ahead of the oldest queued event if its deadline is strictly
    /// earlier than the instant that event was pushed.
    fn next(&mut self, now: Instant) -> Option<IbftEvent> {
        if self.next_event.is_none() {
            match self.events.try_recv() {
                Ok(queued) => self.next_event = Some(queued),
                Err(TryRecvError::Empty) => (),
                Err(TryRecvError::Disconnected) => self.disconnected = true,
            }
        }

        let timer_first = match (&self.next_event, self.scheduler.next_deadline()) {
            (_, None) => false,
            (_, Some(deadline)) if deadline > now => false,
            (Some(queued), Some(deadline)) => deadline < queued.arrived,
            (None, Some(_)) => true,
        };

        if timer_first {
            self.scheduler.pop_expired(now).map(IbftEvent::from)
        } else {
            self.next_event.take().map(|queued| queued.event)
        }
    }

    /// Block until an event is pushed, the earliest timer is due, or [`MAX_POLL_INTERVAL`] passes.
    fn wait(&mut self) {
        if self.next_event.is_some() {
            return;
        }

        let timeout = self
            .scheduler
            .next_deadline()
            .map_or(MAX_POLL_INTERVAL, |deadline| {
                deadline
                    .saturating_duration_since(Instant::now())
                    .min(MAX_POLL_INTERVAL)
            });
        match self.events.recv_timeout(timeout) {
            Ok(queued) => self.next_event = Some(queued),
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => self.disconnected = true,
        }
    }
}

/// Run `controller` on `event`.
fn process<A: App, N: Network>(
    controller: &mut Controller<A, N, DeadlineScheduler>,
    event: IbftEvent,
) -> Result<(), IbftError> {
    let result = match event {
        IbftEvent::Message(origin, message) => controller.handle_message(origin, message),
        IbftEvent::BlockTimerExpiry(round) => controller.handle_block_timer_expiry(round),
        IbftEvent::RoundExpiry(round) => controller.handle_round_expiry(round),
        IbftEvent::NewChainHead(chain_head) => controller.handle_new_chain_head(chain_head),
    };

    match result {
        Err(IbftError::Decode(_)) => Ok(()),
        result => result,
    }
}
