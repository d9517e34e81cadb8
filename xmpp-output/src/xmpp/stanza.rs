//! Outgoing stanza construction and MUC join-presence classification.
//!
//! Builds `minidom` elements through the `xmpp-parsers` structs rather than
//! by hand, and parses room presences only as far as the relay needs: did
//! the join land, or was it refused.

use crate::xmpp::{ChatKind, OutboundMessage, SessionError};
use minidom::Element;
use std::str::FromStr;
use xmpp_parsers::jid::{BareJid, Jid};
use xmpp_parsers::message::{Body, Message, MessageType};
use xmpp_parsers::muc::user::{MucUser, Status};
use xmpp_parsers::ns;
use xmpp_parsers::presence::{Presence, Type as PresenceType};

/// Build the chat or groupchat stanza for one outgoing message.
pub(crate) fn outbound_element(message: &OutboundMessage) -> Element {
    let mut stanza = Message::new(Some(Jid::from(message.to.clone())));
    stanza.type_ = match message.kind {
        ChatKind::Direct => MessageType::Chat,
        ChatKind::Room => MessageType::Groupchat,
    };
    stanza
        .bodies
        .insert(String::new(), Body(message.body.clone()));
    stanza.into()
}

/// Build the presence that requests membership in `room` under `nick`.
pub(crate) fn room_join(room: &BareJid, nick: &str) -> Result<Element, SessionError> {
    let occupant = occupant_jid(room, nick)?;
    let muc_elem = Element::builder("x", ns::MUC).build();

    let presence = Presence {
        from: None,
        to: Some(occupant),
        id: None,
        type_: PresenceType::None,
        show: None,
        statuses: Default::default(),
        priority: 0i8,
        payloads: vec![muc_elem],
    };
    Ok(presence.into())
}

fn occupant_jid(room: &BareJid, nick: &str) -> Result<Jid, SessionError> {
    let full = format!("{room}/{nick}");
    Jid::from_str(&full).map_err(|error| SessionError::RoomJoin {
        room: room.clone(),
        reason: format!("invalid occupant JID '{full}': {error}"),
    })
}

/// What a presence from the room told us about our join attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum JoinOutcome {
    /// The room echoed our occupant presence.
    Joined,
    /// The room answered with an error presence.
    Refused(String),
}

/// Classify a stanza received while waiting for a room join.
///
/// Returns `None` for anything that is not a presence from the target room
/// addressed at our join: other occupants' presences, messages, IQ traffic.
pub(crate) fn join_outcome(elem: &Element, room: &BareJid, nick: &str) -> Option<JoinOutcome> {
    if !elem.is("presence", ns::DEFAULT_NS) {
        return None;
    }
    let presence = Presence::try_from(elem.clone()).ok()?;
    let from = presence.from.as_ref()?;
    if from.to_bare() != *room {
        return None;
    }

    match presence.type_ {
        PresenceType::Error => Some(JoinOutcome::Refused(error_condition(elem))),
        PresenceType::None => {
            if is_self_presence(&presence) || from.to_string() == format!("{room}/{nick}") {
                Some(JoinOutcome::Joined)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Self-presence carries a MUC user payload with status code 110.
fn is_self_presence(presence: &Presence) -> bool {
    presence.payloads.iter().any(|payload| {
        if !payload.is("x", ns::MUC_USER) {
            return false;
        }
        MucUser::try_from(payload.clone())
            .map(|muc_user| muc_user.status.iter().any(|s| *s == Status::SelfPresence))
            .unwrap_or(false)
    })
}

/// Pull the defined condition out of an error presence, e.g.
/// `registration-required` or `not-authorized`.
fn error_condition(elem: &Element) -> String {
    elem.children()
        .find(|child| child.name() == "error")
        .and_then(|error| error.children().next().map(|c| c.name().to_string()))
        .unwrap_or_else(|| "join refused".to_string())
}
