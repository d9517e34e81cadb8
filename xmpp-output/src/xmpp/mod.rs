//! Narrow seam over the XMPP client library.
//!
//! The relay never talks to the wire directly. It sees three operations:
//! connect, send, join room. The production implementation
//! ([`TokioConnector`]) drives `tokio-xmpp` on a relay-owned runtime; tests
//! substitute scripted fakes through the same two traits.

mod stanza;
mod tokio_session;

pub use tokio_session::{TokioConnector, TokioSession, DEFAULT_IO_TIMEOUT};

use std::fmt;
use std::time::Duration;
use thiserror::Error;
use xmpp_parsers::jid::{BareJid, FullJid};

/// Stanza flavor for an outgoing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    /// One-to-one chat with a peer address.
    Direct,
    /// Group chat into a previously joined room.
    Room,
}

/// A formatted message bound for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Bare address of the peer or room.
    pub to: BareJid,
    /// Chat or groupchat.
    pub kind: ChatKind,
    /// Already-formatted body text.
    pub body: String,
}

/// Everything a connector needs to open and authenticate one session.
///
/// Built once by the relay from its configuration; the resource of `jid`
/// is the host-assigned node identifier, not the room nickname.
#[derive(Clone)]
pub struct ConnectionProfile {
    /// Full login JID, `user@domain/node-id`.
    pub jid: FullJid,
    /// Account password.
    pub password: String,
    /// Host to dial, which may differ from the JID domain.
    pub host: String,
    /// Port to dial.
    pub port: u16,
    /// Fail instead of continuing on an unencrypted transport.
    pub require_security: bool,
    /// Relax certificate-chain validation as far as the transport allows.
    pub accept_selfsigned: bool,
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("jid", &self.jid)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("require_security", &self.require_security)
            .field("accept_selfsigned", &self.accept_selfsigned)
            .finish()
    }
}

/// Errors raised at the session seam.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// TCP/DNS-level failure before any XMPP negotiation.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The peer offers no TLS upgrade at all.
    #[error("TLS unavailable: {0}")]
    TlsUnavailable(String),

    /// TLS negotiation started but failed, certificate problems included.
    #[error("TLS negotiation failed: {0}")]
    Tls(String),

    /// The server rejected the credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The session is not currently established. The only error class that
    /// triggers the relay's single reconnect-and-retry.
    #[error("session is not connected")]
    NotConnected,

    /// The server did not answer within the connector's I/O timeout.
    #[error("no response from server within {}s", .0.as_secs())]
    Timeout(Duration),

    /// The room refused the join handshake.
    #[error("room {room} refused the join: {reason}")]
    RoomJoin {
        /// Bare room address.
        room: BareJid,
        /// Condition reported in the error presence, if any.
        reason: String,
    },

    /// Any other stream-level failure.
    #[error("stream failure: {0}")]
    Stream(String),
}

impl SessionError {
    /// True when the failure means "no live connection", as opposed to a
    /// live connection refusing the operation.
    pub fn is_disconnected(&self) -> bool {
        matches!(self, SessionError::NotConnected)
    }
}

/// One live XMPP session.
///
/// Owned exclusively by the relay and recreated wholesale on reconnect;
/// there is no partial repair.
pub trait XmppSession: Send {
    /// Transmit one message over the session.
    fn send(&mut self, message: &OutboundMessage) -> Result<(), SessionError>;

    /// Join a multi-user chat room under the given nickname.
    ///
    /// Blocks until the room echoes our occupant presence or refuses the
    /// join.
    fn join_room(&mut self, room: &BareJid, nick: &str) -> Result<(), SessionError>;

    /// Close the session gracefully. Errors during teardown are not
    /// interesting to the caller and are swallowed here.
    fn close(&mut self);
}

/// Factory for sessions: `connect(profile) -> Session`.
///
/// The relay is generic over this trait so tests can inject scripted
/// sessions without a network.
pub trait SessionConnector: Send + Sync {
    /// Session type produced by this connector.
    type Session: XmppSession;

    /// Open a connection, upgrade transport security per the profile's
    /// policy, and authenticate.
    fn connect(&self, profile: &ConnectionProfile) -> Result<Self::Session, SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_profile_debug_redacts_password() {
        let profile = ConnectionProfile {
            jid: FullJid::from_str("relay@example.org/node-1").expect("valid JID"),
            password: "s3cret".to_string(),
            host: "jabber.example.org".to_string(),
            port: 5222,
            require_security: true,
            accept_selfsigned: false,
        };
        let rendered = format!("{profile:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<redacted>"));
        assert!(rendered.contains("jabber.example.org"));
    }

    #[test]
    fn test_only_not_connected_is_disconnected() {
        assert!(SessionError::NotConnected.is_disconnected());
        assert!(!SessionError::Auth("nope".to_string()).is_disconnected());
        assert!(!SessionError::Timeout(Duration::from_secs(30)).is_disconnected());
        assert!(!SessionError::Stream("reset".to_string()).is_disconnected());
    }
}
