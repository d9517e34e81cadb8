/// Error types surfaced to the host application
use crate::xmpp::SessionError;
use thiserror::Error;

/// Errors reported by an output instance.
///
/// Only two kinds exist: configuration failures, which are raised while a
/// connection is being established (at construction time or during the
/// single in-flight reconnect), and delivery failures, which are raised per
/// message once the single reconnect-and-retry has failed. Both carry
/// enough context for an operator to identify the server and recipient
/// involved.
#[derive(Debug, Error)]
pub enum OutputError {
    /// Establishing the XMPP session failed: unreachable host, rejected
    /// credentials, or a refused room join. Fatal to the attempt that
    /// raised it; a later `write` starts a fresh attempt.
    #[error("unable to connect to XMPP server {server}: {reason}")]
    Configuration {
        /// Server description in `host:port (service name: X)` form.
        server: String,
        /// What went wrong while connecting, authenticating, or joining.
        reason: String,
    },

    /// Transmitting a single message failed even after one reconnect and
    /// one retry. The relay stays usable; the message is dropped.
    #[error("unable to deliver message to {recipient} via {server}: {source}")]
    Delivery {
        /// Server description in `host:port (service name: X)` form.
        server: String,
        /// The chat or room address the message was bound for.
        recipient: String,
        #[source]
        source: SessionError,
    },
}

impl OutputError {
    /// True when this error was raised while (re)establishing the session.
    pub fn is_configuration(&self) -> bool {
        matches!(self, OutputError::Configuration { .. })
    }
}

/// Outcome of a best-effort batch write.
///
/// `write_batch` attempts every message in input order and collects the
/// failures instead of short-circuiting on the first one. Each entry pairs
/// the index of the failed message within the input slice with the error it
/// produced.
#[derive(Debug, Error)]
#[error("{} of {attempted} messages failed", .failures.len())]
pub struct BatchError {
    /// How many messages the batch contained.
    pub attempted: usize,
    /// Input index and error for every message that could not be delivered.
    pub failures: Vec<(usize, OutputError)>,
}
