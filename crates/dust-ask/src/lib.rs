//! Ask Dust agents from the terminal.
//!
//! The crate includes a CLI tool for using in the terminal. It can also be
//! used as a library: [`Settings`] locates the credentials and local stores,
//! and [`Session`] bundles a ready-to-use transport with them.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod output;
mod session;
mod settings;

pub use output::{AnswerPrinter, Printed};
pub use session::{Session, SessionBuilder};
pub use settings::{API_KEY_VAR, Settings, WORKSPACE_VAR};

/// Re-exports of [`dust_ask_core`] crate.
pub mod core {
    pub use dust_ask_core::*;
}
