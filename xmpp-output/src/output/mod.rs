//! Host-facing output surface.
//!
//! This module holds the two types the host application touches on every
//! call: the [`LogMessage`] it hands over and the [`MessageOutput`] contract
//! it drives. Everything XMPP-specific lives behind them in
//! [`crate::relay`] and [`crate::xmpp`].

mod message;
mod message_output;

pub use message::LogMessage;
pub use message_output::MessageOutput;
