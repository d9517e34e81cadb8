use crate::xmpp::ChatKind;
use std::fmt;
use std::str::FromStr;
use xmpp_parsers::jid::BareJid;

/// Prefix marking a recipient address as a multi-user chat room.
pub const ROOM_PREFIX: &str = "muc:";

/// Where messages go: a chat peer or a chat room.
///
/// The two are distinguished by the `muc:` prefix convention on the
/// configured address: `muc:logs@conference.example.org` is a room,
/// `ops@example.org` is a direct peer. A room additionally requires a join
/// handshake before the first message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// One-to-one chat peer.
    Direct(BareJid),
    /// Group chat room, joined with the configured nickname.
    Room(BareJid),
}

impl Recipient {
    /// Parse a configured recipient address.
    pub fn parse(raw: &str) -> Result<Self, xmpp_parsers::jid::Error> {
        match raw.strip_prefix(ROOM_PREFIX) {
            Some(room) => Ok(Recipient::Room(BareJid::from_str(room)?)),
            None => Ok(Recipient::Direct(BareJid::from_str(raw)?)),
        }
    }

    /// The bare address stanzas are sent to.
    pub fn address(&self) -> &BareJid {
        match self {
            Recipient::Direct(jid) | Recipient::Room(jid) => jid,
        }
    }

    /// Stanza flavor for this recipient.
    pub fn chat_kind(&self) -> ChatKind {
        match self {
            Recipient::Direct(_) => ChatKind::Direct,
            Recipient::Room(_) => ChatKind::Room,
        }
    }

    /// True for room recipients.
    pub fn is_room(&self) -> bool {
        matches!(self, Recipient::Room(_))
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipient::Direct(jid) => write!(f, "{jid}"),
            Recipient::Room(jid) => write!(f, "{ROOM_PREFIX}{jid}"),
        }
    }
}
