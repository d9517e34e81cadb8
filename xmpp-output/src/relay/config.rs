use serde::Deserialize;
use std::fmt;

/// Default XMPP client port.
pub const DEFAULT_PORT: u16 = 5222;

/// Default message format template.
pub const DEFAULT_FORMAT: &str = "{source} {message}";

/// Session configuration, supplied once at construction.
///
/// Mirrors the host's configuration surface field for field. The struct is
/// immutable for the relay's lifetime; changing a value means constructing
/// a new relay. `Debug` redacts the password.
#[derive(Clone, Deserialize)]
pub struct OutputConfig {
    /// Hostname of the XMPP server to dial.
    pub hostname: String,

    /// XMPP domain of the account when it differs from the hostname, e.g.
    /// `example.org` of the JID `user@example.org`.
    #[serde(default)]
    pub service_name: Option<String>,

    /// Port of the XMPP server.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Do not enforce full validation of the certificate chain.
    #[serde(default)]
    pub accept_selfsigned: bool,

    /// Account local part, e.g. `user` of the JID `user@example.org`.
    pub username: String,

    /// Account password.
    pub password: String,

    /// Force encryption for the server connection.
    #[serde(default)]
    pub require_security: bool,

    /// Recipient of the messages: a peer address, or a room address with
    /// the `muc:` prefix.
    pub recipient: String,

    /// Message format; field names in braces are substituted.
    #[serde(default = "default_format")]
    pub format: String,

    /// Nickname to use in rooms.
    pub resource: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_format() -> String {
    DEFAULT_FORMAT.to_string()
}

impl OutputConfig {
    /// The XMPP domain: `service_name` when set and non-empty, otherwise
    /// the hostname.
    pub fn service_name(&self) -> &str {
        match &self.service_name {
            Some(name) if !name.is_empty() => name,
            _ => &self.hostname,
        }
    }

    /// Server description used in operator-facing errors and logs:
    /// `host:port (service name: X)`.
    pub fn server_string(&self) -> String {
        format!(
            "{}:{} (service name: {})",
            self.hostname,
            self.port,
            self.service_name()
        )
    }

    /// Reject configurations that cannot possibly connect. JID-level
    /// validation happens where the JIDs are built.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.hostname.is_empty() {
            return Err("hostname must not be empty".to_string());
        }
        if self.username.is_empty() {
            return Err("username must not be empty".to_string());
        }
        if self.recipient.is_empty() {
            return Err("recipient must not be empty".to_string());
        }
        if self.recipient.starts_with(super::recipient::ROOM_PREFIX) && self.resource.is_empty() {
            return Err("resource must not be empty when the recipient is a room".to_string());
        }
        Ok(())
    }
}

impl fmt::Debug for OutputConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputConfig")
            .field("hostname", &self.hostname)
            .field("service_name", &self.service_name)
            .field("port", &self.port)
            .field("accept_selfsigned", &self.accept_selfsigned)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("require_security", &self.require_security)
            .field("recipient", &self.recipient)
            .field("format", &self.format)
            .field("resource", &self.resource)
            .finish()
    }
}
