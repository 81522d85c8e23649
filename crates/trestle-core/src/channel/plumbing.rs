//! Queue plumbing for bridge communication
//!
//! Thin typed layer over `crossbeam` unbounded channels. Unbounded is a
//! deliberate choice: enqueue never blocks either thread and nothing is ever
//! dropped, at the cost of queue growth when the consumer stops draining.

use crate::channel::messages::{ClientEvent, Command, ServerEvent};
use crossbeam::channel::{unbounded, Receiver, Sender, TryRecvError};

// ----------------------------------------------------------------------------
// Queue Type Aliases
// ----------------------------------------------------------------------------

pub type CommandSender = Sender<Command>;
pub type CommandReceiver = Receiver<Command>;
pub type ServerEventSender = Sender<ServerEvent>;
pub type ServerEventReceiver = Receiver<ServerEvent>;
pub type ClientEventSender = Sender<ClientEvent>;
pub type ClientEventReceiver = Receiver<ClientEvent>;

// ----------------------------------------------------------------------------
// Queue Creation Utilities
// ----------------------------------------------------------------------------

/// Create the command queue (consumer → worker)
pub fn create_command_queue() -> (CommandSender, CommandReceiver) {
    unbounded()
}

/// Create the server event queue (worker → consumer)
pub fn create_server_event_queue() -> (ServerEventSender, ServerEventReceiver) {
    unbounded()
}

/// Create the client event queue (worker → consumer)
pub fn create_client_event_queue() -> (ClientEventSender, ClientEventReceiver) {
    unbounded()
}

// ----------------------------------------------------------------------------
// Drain Helper
// ----------------------------------------------------------------------------

/// Discard everything currently queued, returning how many items were
/// dropped. Dropped items release any pooled buffers they carry.
///
/// Used when a role (re)starts, so events buffered from a previous session
/// are never observed in the new one, and at shutdown to clear the queues.
pub fn drain_queue<T>(receiver: &Receiver<T>) -> usize {
    let mut discarded = 0;
    loop {
        match receiver.try_recv() {
            Ok(_) => discarded += 1,
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return discarded,
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
