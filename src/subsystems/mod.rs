//! Subsystem modules for the loan concierge.

pub mod agents;
pub mod comms;
pub mod conversation;
pub mod desk;
pub mod memory;
pub mod runtime;
pub mod tools;
