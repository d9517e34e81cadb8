//! `tokio-xmpp`-backed session implementation.
//!
//! The host-facing surface is synchronous, so each session owns a
//! current-thread runtime and drives the async client to completion inside
//! the calling thread. TLS policy is mapped onto the two connectors the
//! client library offers: the StartTLS connector (encrypted, full
//! certificate validation) and the plain TCP connector used as the
//! opportunistic fallback when the peer cannot provide TLS.

use crate::xmpp::stanza::{self, JoinOutcome};
use crate::xmpp::{
    ConnectionProfile, OutboundMessage, SessionConnector, SessionError, XmppSession,
};
use futures::StreamExt;
use log::{debug, warn};
use minidom::Element;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::runtime;
use tokio::time::timeout;
use tokio_xmpp::connect::ServerConnector;
use tokio_xmpp::starttls::ServerConfig;
use tokio_xmpp::tcp::TcpServerConnector;
use tokio_xmpp::{AsyncClient, AsyncConfig, Event};
use xmpp_parsers::jid::{BareJid, Jid};

/// Bound on connection setup, room joins, and individual sends.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Production connector over `tokio-xmpp`.
#[derive(Debug, Clone)]
pub struct TokioConnector {
    io_timeout: Duration,
}

impl TokioConnector {
    /// Create a connector with a custom I/O timeout.
    pub fn new(io_timeout: Duration) -> Self {
        Self { io_timeout }
    }
}

impl Default for TokioConnector {
    fn default() -> Self {
        Self::new(DEFAULT_IO_TIMEOUT)
    }
}

/// The two transport flavors a session can end up on.
enum Transport {
    StartTls(AsyncClient<ServerConfig>),
    Plaintext(AsyncClient<TcpServerConnector>),
}

impl Transport {
    async fn next_event(&mut self) -> Option<Event> {
        match self {
            Transport::StartTls(client) => client.next().await,
            Transport::Plaintext(client) => client.next().await,
        }
    }

    async fn send_stanza(&mut self, element: Element) -> Result<(), tokio_xmpp::Error> {
        match self {
            Transport::StartTls(client) => client.send_stanza(element).await,
            Transport::Plaintext(client) => client.send_stanza(element).await,
        }
    }

    async fn send_end(&mut self) -> Result<(), tokio_xmpp::Error> {
        match self {
            Transport::StartTls(client) => client.send_end().await,
            Transport::Plaintext(client) => client.send_end().await,
        }
    }
}

/// One live session: a transport plus the runtime that drives it.
pub struct TokioSession {
    runtime: runtime::Runtime,
    transport: Transport,
    io_timeout: Duration,
}

impl SessionConnector for TokioConnector {
    type Session = TokioSession;

    fn connect(&self, profile: &ConnectionProfile) -> Result<TokioSession, SessionError> {
        let rt = runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| {
                SessionError::Connection(format!("failed to start I/O driver: {error}"))
            })?;
        let io_timeout = self.io_timeout;

        let transport = rt.block_on(async {
            match starttls_transport(profile, io_timeout).await {
                Ok(client) => Ok(Transport::StartTls(client)),
                Err(error) if allows_plaintext_fallback(profile, &error) => {
                    warn!(
                        "TLS not usable for {}:{} ({error}); continuing unencrypted",
                        profile.host, profile.port
                    );
                    plaintext_transport(profile, io_timeout)
                        .await
                        .map(Transport::Plaintext)
                }
                Err(error) => Err(annotate_tls_policy(profile, error)),
            }
        })?;

        debug!("XMPP session established to {}:{}", profile.host, profile.port);
        Ok(TokioSession {
            runtime: rt,
            transport,
            io_timeout,
        })
    }
}

impl XmppSession for TokioSession {
    fn send(&mut self, message: &OutboundMessage) -> Result<(), SessionError> {
        let element = stanza::outbound_element(message);
        let io_timeout = self.io_timeout;
        let transport = &mut self.transport;
        self.runtime.block_on(async move {
            timeout(io_timeout, transport.send_stanza(element))
                .await
                .map_err(|_| SessionError::Timeout(io_timeout))?
                .map_err(|error| classify(&error))
        })
    }

    fn join_room(&mut self, room: &BareJid, nick: &str) -> Result<(), SessionError> {
        let join = stanza::room_join(room, nick)?;
        let io_timeout = self.io_timeout;
        let transport = &mut self.transport;
        self.runtime.block_on(async move {
            timeout(io_timeout, transport.send_stanza(join))
                .await
                .map_err(|_| SessionError::Timeout(io_timeout))?
                .map_err(|error| classify(&error))?;

            // The join is confirmed by the room echoing our occupant
            // presence; anything else from the room's bare JID with type
            // error is a refusal.
            let deadline = Instant::now() + io_timeout;
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(SessionError::Timeout(io_timeout));
                }
                let event = timeout(remaining, transport.next_event())
                    .await
                    .map_err(|_| SessionError::Timeout(io_timeout))?;
                match event {
                    Some(Event::Stanza(elem)) => match stanza::join_outcome(&elem, room, nick) {
                        Some(JoinOutcome::Joined) => {
                            debug!("joined room {room} as {nick}");
                            return Ok(());
                        }
                        Some(JoinOutcome::Refused(reason)) => {
                            return Err(SessionError::RoomJoin {
                                room: room.clone(),
                                reason,
                            })
                        }
                        None => continue,
                    },
                    Some(Event::Disconnected(error)) => return Err(classify(&error)),
                    Some(Event::Online { .. }) => continue,
                    None => return Err(SessionError::NotConnected),
                }
            }
        })
    }

    fn close(&mut self) {
        let io_timeout = self.io_timeout;
        let transport = &mut self.transport;
        let result = self
            .runtime
            .block_on(async move { timeout(io_timeout, transport.send_end()).await });
        match result {
            Ok(Ok(())) => debug!("XMPP session closed"),
            Ok(Err(error)) => debug!("XMPP session close reported {error}"),
            Err(_) => debug!("XMPP session close timed out"),
        }
    }
}

async fn starttls_transport(
    profile: &ConnectionProfile,
    io_timeout: Duration,
) -> Result<AsyncClient<ServerConfig>, SessionError> {
    let config = AsyncConfig {
        jid: Jid::from(profile.jid.clone()),
        password: profile.password.clone(),
        server: ServerConfig::Manual {
            host: profile.host.clone(),
            port: profile.port,
        },
    };
    let mut client = AsyncClient::new_with_config(config);
    client.set_reconnect(false);
    wait_for_online(&mut client, io_timeout).await?;
    Ok(client)
}

async fn plaintext_transport(
    profile: &ConnectionProfile,
    io_timeout: Duration,
) -> Result<AsyncClient<TcpServerConnector>, SessionError> {
    let address = format!("{}:{}", profile.host, profile.port);
    let mut client = AsyncClient::new_with_connector(
        Jid::from(profile.jid.clone()),
        profile.password.as_str(),
        TcpServerConnector::new(address),
    );
    client.set_reconnect(false);
    wait_for_online(&mut client, io_timeout).await?;
    Ok(client)
}

/// Drive the client until login completes or fails.
async fn wait_for_online<C: ServerConnector>(
    client: &mut AsyncClient<C>,
    io_timeout: Duration,
) -> Result<(), SessionError> {
    let deadline = Instant::now() + io_timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(SessionError::Timeout(io_timeout));
        }
        let event = timeout(remaining, client.next())
            .await
            .map_err(|_| SessionError::Timeout(io_timeout))?;
        match event {
            Some(Event::Online { .. }) => return Ok(()),
            Some(Event::Disconnected(error)) => return Err(classify(&error)),
            Some(Event::Stanza(_)) => continue,
            None => {
                return Err(SessionError::Stream(
                    "connection closed during negotiation".to_string(),
                ))
            }
        }
    }
}

/// Whether the TLS policy permits retrying this failure over plain TCP.
///
/// Opportunistic mode (`require_security` unset) falls back when the peer
/// offers no TLS at all; with `accept_selfsigned` it additionally tolerates
/// failed certificate validation, since the transport exposes no way to
/// keep the encryption while skipping the chain check.
fn allows_plaintext_fallback(profile: &ConnectionProfile, error: &SessionError) -> bool {
    if profile.require_security {
        return false;
    }
    match error {
        SessionError::TlsUnavailable(_) => true,
        SessionError::Tls(_) => profile.accept_selfsigned,
        _ => false,
    }
}

/// With security required, `accept_selfsigned` cannot be honored by the
/// underlying transport; say so instead of surfacing a bare TLS error.
fn annotate_tls_policy(profile: &ConnectionProfile, error: SessionError) -> SessionError {
    match error {
        SessionError::Tls(reason) if profile.require_security && profile.accept_selfsigned => {
            SessionError::Tls(format!(
                "{reason} (accept_selfsigned cannot relax certificate validation while security is required)"
            ))
        }
        other => other,
    }
}

/// Sort a client-library error into the seam taxonomy.
///
/// The client library's error type changes shape between releases; its
/// rendered messages do not, so classification goes by message text.
fn classify<E: fmt::Display>(error: &E) -> SessionError {
    let message = error.to_string();
    let lower = message.to_ascii_lowercase();
    if lower.contains("disconnect") {
        SessionError::NotConnected
    } else if lower.contains("auth") || lower.contains("sasl") || lower.contains("credential") {
        SessionError::Auth(message)
    } else if lower.contains("no tls") || lower.contains("tls not") {
        SessionError::TlsUnavailable(message)
    } else if lower.contains("tls") || lower.contains("certificate") || lower.contains("handshake")
    {
        SessionError::Tls(message)
    } else if lower.contains("dns")
        || lower.contains("resolve")
        || lower.contains("srv")
        || lower.contains("refused")
        || lower.contains("unreachable")
    {
        SessionError::Connection(message)
    } else {
        SessionError::Stream(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use xmpp_parsers::jid::FullJid;

    fn profile(require_security: bool, accept_selfsigned: bool) -> ConnectionProfile {
        ConnectionProfile {
            jid: FullJid::from_str("relay@example.org/node-1").expect("valid JID"),
            password: "secret".to_string(),
            host: "jabber.example.org".to_string(),
            port: 5222,
            require_security,
            accept_selfsigned,
        }
    }

    #[test]
    fn test_classify_disconnect() {
        assert!(matches!(
            classify(&"client got disconnected"),
            SessionError::NotConnected
        ));
    }

    #[test]
    fn test_classify_auth() {
        assert!(matches!(
            classify(&"sasl authentication failed: not-authorized"),
            SessionError::Auth(_)
        ));
    }

    #[test]
    fn test_classify_tls_unavailable() {
        assert!(matches!(
            classify(&"no TLS available"),
            SessionError::TlsUnavailable(_)
        ));
    }

    #[test]
    fn test_classify_certificate_failure() {
        assert!(matches!(
            classify(&"TLS handshake: invalid peer certificate"),
            SessionError::Tls(_)
        ));
    }

    #[test]
    fn test_classify_connection() {
        assert!(matches!(
            classify(&"dns resolution failed for host"),
            SessionError::Connection(_)
        ));
    }

    #[test]
    fn test_classify_fallthrough_is_stream() {
        assert!(matches!(
            classify(&"unexpected end of element"),
            SessionError::Stream(_)
        ));
    }

    #[test]
    fn test_no_fallback_when_security_required() {
        let error = SessionError::TlsUnavailable("no TLS available".to_string());
        assert!(!allows_plaintext_fallback(&profile(true, true), &error));
    }

    #[test]
    fn test_opportunistic_fallback_on_missing_tls() {
        let error = SessionError::TlsUnavailable("no TLS available".to_string());
        assert!(allows_plaintext_fallback(&profile(false, false), &error));
    }

    #[test]
    fn test_certificate_failure_needs_selfsigned_flag() {
        let error = SessionError::Tls("invalid peer certificate".to_string());
        assert!(!allows_plaintext_fallback(&profile(false, false), &error));
        assert!(allows_plaintext_fallback(&profile(false, true), &error));
    }

    #[test]
    fn test_auth_failure_never_falls_back() {
        let error = SessionError::Auth("not-authorized".to_string());
        assert!(!allows_plaintext_fallback(&profile(false, true), &error));
    }

    #[test]
    fn test_annotate_mentions_selfsigned_limit() {
        let annotated = annotate_tls_policy(
            &profile(true, true),
            SessionError::Tls("invalid peer certificate".to_string()),
        );
        match annotated {
            SessionError::Tls(reason) => assert!(reason.contains("accept_selfsigned")),
            other => panic!("expected TLS error, got {other:?}"),
        }
    }
}
