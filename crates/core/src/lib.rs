//! The answer pipeline: submitting a question, following the agent
//! reply stream, and folding its events into an answer. Also includes
//! the small stores a host needs around it (history, agent directory).

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod agents;
mod answer;
mod citation;
mod history;
mod question;
mod store;

pub use agents::{AgentDirectory, AgentList, DirectoryError, active_agents};
pub use answer::{
    AnswerAggregator, AnswerState, DEFAULT_THROTTLE, Outcome, ProtocolError,
};
pub use citation::strip_citations;
pub use history::{HistoryEntry, HistoryStore};
pub use question::{Answer, AskError, Question};
pub use store::{StoreError, read_json, write_json};

/// Re-exports of [`dust_ask_protocol`] crate.
pub mod protocol {
    pub use dust_ask_protocol::*;
}
