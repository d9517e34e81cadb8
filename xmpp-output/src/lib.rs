#![forbid(unsafe_code)]

//! Forward log messages from a log-management host to an XMPP recipient.
//!
//! The crate is a thin adapter: the host hands over parsed messages through
//! the [`output::MessageOutput`] contract, the [`relay::XmppOutput`] relay
//! formats each one with a `{field}` template and delivers it as a chat or
//! group-chat stanza, reconnecting at most once per failing send. The XMPP
//! wire protocol itself is supplied by the client library behind the
//! [`xmpp`] seam.

pub mod output;
pub mod relay;
pub mod xmpp;

mod error;

pub use crate::error::{BatchError, OutputError};

///
/// Expose all structures required in virtually any use of the output
///
/// ```
/// use xmpp_output::prelude::*;
/// ```
pub mod prelude {
    pub use crate::output::{LogMessage, MessageOutput};
    pub use crate::relay::{OutputConfig, XmppOutput};
    pub use crate::{BatchError, OutputError};
}
