//! Channel Module
//!
//! Queue infrastructure connecting the consumer thread to the worker thread:
//! - `messages`: command and event types that cross the boundary
//! - `plumbing`: typed queue aliases, constructors, and the drain helper

pub mod messages;
pub mod plumbing;

// Re-export message types
pub use messages::{ClientEvent, Command, ServerEvent};

// Re-export plumbing types
pub use plumbing::{
    create_client_event_queue, create_command_queue, create_server_event_queue, drain_queue,
    ClientEventReceiver, ClientEventSender, CommandReceiver, CommandSender, ServerEventReceiver,
    ServerEventSender,
};
