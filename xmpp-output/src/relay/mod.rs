//! The relay: one XMPP session, one recipient, one format template.
//!
//! `XmppOutput` is the crate's core component. It owns the only live
//! connection, serializes all connection use behind a mutex, and performs
//! exactly one reconnect-and-retry inside a failing `write` before
//! reporting the error to the host.

mod config;
mod recipient;
mod template;

pub use config::{OutputConfig, DEFAULT_FORMAT, DEFAULT_PORT};
pub use recipient::{Recipient, ROOM_PREFIX};
pub use template::MessageTemplate;

use crate::error::{BatchError, OutputError};
use crate::output::{LogMessage, MessageOutput};
use crate::xmpp::{
    ConnectionProfile, OutboundMessage, SessionConnector, SessionError, TokioConnector,
    XmppSession,
};
use log::{debug, info, warn};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use xmpp_parsers::jid::FullJid;

/// Message output that relays log messages to an XMPP recipient or room.
///
/// Constructed once per output instance; the connection is opened (and any
/// room joined) during construction, so a returned `XmppOutput` is ready to
/// deliver. The connector type parameter exists for test injection and
/// defaults to the production `tokio-xmpp` connector.
///
/// State machine: construction either yields a connected relay or an
/// error (no partial object). A failing send transparently reconnects once
/// within the same call; a relay whose reconnect failed stays usable and
/// re-attempts the connection on the next `write`. `stop` is terminal.
pub struct XmppOutput<C: SessionConnector = TokioConnector> {
    config: OutputConfig,
    profile: ConnectionProfile,
    recipient: Recipient,
    template: MessageTemplate,
    connector: C,
    connection: Mutex<Option<C::Session>>,
    running: AtomicBool,
}

impl XmppOutput<TokioConnector> {
    /// Construct a relay and open its connection.
    ///
    /// `node_id` is the host-assigned node identifier; it becomes the
    /// resource of the login JID. The nickname used in rooms comes from
    /// `config.resource` instead.
    ///
    /// # Errors
    /// Returns `OutputError::Configuration` on invalid configuration,
    /// unreachable host, rejected credentials, or a refused room join.
    pub fn new(config: OutputConfig, node_id: &str) -> Result<Self, OutputError> {
        Self::with_connector(config, node_id, TokioConnector::default())
    }
}

impl<C: SessionConnector> XmppOutput<C> {
    /// Construct a relay over a pre-built connector.
    ///
    /// This constructor is useful for testing, allowing injection of
    /// scripted sessions.
    pub fn with_connector(
        config: OutputConfig,
        node_id: &str,
        connector: C,
    ) -> Result<Self, OutputError> {
        info!("Initializing XMPP output for {}", config.server_string());

        config
            .validate()
            .map_err(|reason| Self::invalid(&config, reason))?;
        if node_id.is_empty() {
            return Err(Self::invalid(
                &config,
                "node identifier must not be empty".to_string(),
            ));
        }

        let recipient = Recipient::parse(&config.recipient).map_err(|error| {
            Self::invalid(
                &config,
                format!("invalid recipient '{}': {error}", config.recipient),
            )
        })?;

        let account = format!("{}@{}/{}", config.username, config.service_name(), node_id);
        let jid = FullJid::from_str(&account).map_err(|error| {
            Self::invalid(&config, format!("invalid account JID '{account}': {error}"))
        })?;

        let template = MessageTemplate::parse(&config.format);
        let profile = ConnectionProfile {
            jid,
            password: config.password.clone(),
            host: config.hostname.clone(),
            port: config.port,
            require_security: config.require_security,
            accept_selfsigned: config.accept_selfsigned,
        };

        let relay = Self {
            config,
            profile,
            recipient,
            template,
            connector,
            connection: Mutex::new(None),
            running: AtomicBool::new(false),
        };

        let session = relay.establish()?;
        {
            let mut guard = relay.lock_connection();
            *guard = Some(session);
            relay.running.store(true, Ordering::Release);
        }
        Ok(relay)
    }

    /// Forward one message, reconnecting at most once.
    ///
    /// # Errors
    /// `OutputError::Configuration` when the reconnect itself fails;
    /// `OutputError::Delivery` when the message cannot be transmitted even
    /// after the reconnect-and-retry. Either way the message is dropped and
    /// the relay stays usable.
    pub fn write(&self, message: &LogMessage) -> Result<(), OutputError> {
        let outbound = OutboundMessage {
            to: self.recipient.address().clone(),
            kind: self.recipient.chat_kind(),
            body: self.template.render(message),
        };

        let mut guard = self.lock_connection();

        // A previous reconnect failed; this write starts the next attempt.
        if guard.is_none() {
            let session = self.establish()?;
            *guard = Some(session);
            self.running.store(true, Ordering::Release);
        }

        let first_attempt = match guard.as_mut() {
            Some(session) => session.send(&outbound),
            None => Err(SessionError::NotConnected),
        };

        match first_attempt {
            Ok(()) => Ok(()),
            Err(error) if error.is_disconnected() => {
                warn!(
                    "send to {} failed ({error}); reconnecting once",
                    self.recipient
                );
                *guard = None;
                self.running.store(false, Ordering::Release);

                let mut fresh = self.establish()?;
                match fresh.send(&outbound) {
                    Ok(()) => {
                        *guard = Some(fresh);
                        self.running.store(true, Ordering::Release);
                        Ok(())
                    }
                    Err(retry_error) => {
                        if !retry_error.is_disconnected() {
                            *guard = Some(fresh);
                            self.running.store(true, Ordering::Release);
                        }
                        Err(self.delivery_error(retry_error))
                    }
                }
            }
            Err(error) => Err(self.delivery_error(error)),
        }
    }

    /// Forward a batch in input order, best-effort.
    ///
    /// An error on one message does not prevent attempting the remaining
    /// messages; every failure is reported with its input index.
    ///
    /// # Errors
    /// `BatchError` collecting the per-message failures, if any.
    pub fn write_batch(&self, messages: &[LogMessage]) -> Result<(), BatchError> {
        let mut failures = Vec::new();
        for (index, message) in messages.iter().enumerate() {
            if let Err(error) = self.write(message) {
                failures.push((index, error));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(BatchError {
                attempted: messages.len(),
                failures,
            })
        }
    }

    /// Close the connection. Safe to call more than once.
    pub fn stop(&self) {
        let mut guard = self.lock_connection();
        match guard.take() {
            Some(mut session) => {
                session.close();
                info!("XMPP output for {} stopped", self.config.server_string());
            }
            None => debug!("XMPP output already stopped"),
        }
        self.running.store(false, Ordering::Release);
    }

    /// Whether this instance currently holds a connection.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// The parsed recipient this relay delivers to.
    pub fn recipient(&self) -> &Recipient {
        &self.recipient
    }

    /// Open a connection and, for room recipients, join the room. The full
    /// construction connection logic; also re-run on every reconnect.
    fn establish(&self) -> Result<C::Session, OutputError> {
        let mut session = self
            .connector
            .connect(&self.profile)
            .map_err(|error| self.configuration_error(error))?;
        if let Recipient::Room(room) = &self.recipient {
            session
                .join_room(room, &self.config.resource)
                .map_err(|error| self.configuration_error(error))?;
            debug!("joined room {room} as {}", self.config.resource);
        }
        Ok(session)
    }

    fn lock_connection(&self) -> MutexGuard<'_, Option<C::Session>> {
        // A panic while holding the lock leaves at worst a dead session,
        // which the write path replaces wholesale anyway.
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn configuration_error(&self, error: SessionError) -> OutputError {
        OutputError::Configuration {
            server: self.config.server_string(),
            reason: error.to_string(),
        }
    }

    fn invalid(config: &OutputConfig, reason: String) -> OutputError {
        OutputError::Configuration {
            server: config.server_string(),
            reason,
        }
    }

    fn delivery_error(&self, source: SessionError) -> OutputError {
        OutputError::Delivery {
            server: self.config.server_string(),
            recipient: self.recipient.to_string(),
            source,
        }
    }
}

impl<C: SessionConnector> MessageOutput for XmppOutput<C> {
    fn name(&self) -> String {
        "XMPP Output".to_string()
    }

    fn write(&self, message: &LogMessage) -> Result<(), OutputError> {
        XmppOutput::write(self, message)
    }

    fn write_batch(&self, messages: &[LogMessage]) -> Result<(), BatchError> {
        XmppOutput::write_batch(self, messages)
    }

    fn stop(&self) {
        XmppOutput::stop(self)
    }

    fn is_running(&self) -> bool {
        XmppOutput::is_running(self)
    }
}
