//! Protocol types shared by every part of the Dust question client.
//!
//! This crate describes what travels over the wire (conversations,
//! messages, stream events, agent configurations) and the contract a
//! transport has to fulfill so that the answer pipeline can drive it.
//! Types here carry no network behavior; the HTTP implementation lives
//! in its own crate, and tests can substitute a scripted transport.

#![deny(missing_docs)]

mod agent;
mod conversation;
mod credentials;
mod event;
mod stream;
mod transport;

pub use agent::*;
pub use conversation::*;
pub use credentials::*;
pub use event::*;
pub use stream::*;
pub use transport::*;
