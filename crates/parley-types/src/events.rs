use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use crate::models::{InvalidUserId, UserId};

/// The `type` discriminator carried by every envelope on the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnvelopeKind {
    Message,
    Typing,
    CallInitiate,
    CallAnswer,
    CallHangup,
    FileShare,
    Offer,
    Answer,
    IceCandidate,
    UserStatus,
}

impl EnvelopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Typing => "typing",
            Self::CallInitiate => "call-initiate",
            Self::CallAnswer => "call-answer",
            Self::CallHangup => "call-hangup",
            Self::FileShare => "file-share",
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "ice-candidate",
            Self::UserStatus => "user-status",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "message" => Self::Message,
            "typing" => Self::Typing,
            "call-initiate" => Self::CallInitiate,
            "call-answer" => Self::CallAnswer,
            "call-hangup" => Self::CallHangup,
            "file-share" => Self::FileShare,
            "offer" => Self::Offer,
            "answer" => Self::Answer,
            "ice-candidate" => Self::IceCandidate,
            "user-status" => Self::UserStatus,
            _ => return None,
        })
    }

    /// WebRTC negotiation payloads (SDP offer/answer and trickled ICE).
    pub fn is_signal(&self) -> bool {
        matches!(self, Self::Offer | Self::Answer | Self::IceCandidate)
    }

    /// Only the server emits these; clients may not send them.
    pub fn is_server_only(&self) -> bool {
        matches!(self, Self::UserStatus)
    }
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("frame of {0} bytes exceeds the size limit")]
    TooLarge(usize),
    #[error("not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("envelope is not a JSON object")]
    NotAnObject,
    #[error("envelope has no `type`")]
    MissingType,
    #[error("unknown envelope type `{0}`")]
    UnknownType(String),
    #[error("`{0}` envelopes are server-originated")]
    ServerOnly(&'static str),
    #[error("envelope has no `to`")]
    MissingRecipient,
    #[error("invalid recipient: {0}")]
    InvalidRecipient(#[from] InvalidUserId),
    #[error("`from` does not match the connected user (claimed {0})")]
    SpoofedSender(String),
    #[error("envelope is addressed to its sender")]
    SelfAddressed,
}

/// A client envelope that passed validation and is ready to forward.
///
/// Everything except `from` is carried through untouched: `as_text` is the
/// exact text received, with `from` appended when the client left it out.
#[derive(Debug, Clone)]
pub struct Envelope {
    kind: EnvelopeKind,
    from: UserId,
    to: UserId,
    typing: bool,
    text: String,
}

impl Envelope {
    pub fn parse(raw: &str, sender: &UserId) -> Result<Self, EnvelopeError> {
        let Value::Object(body) = serde_json::from_str::<Value>(raw)? else {
            return Err(EnvelopeError::NotAnObject);
        };

        let type_name = body
            .get("type")
            .and_then(Value::as_str)
            .ok_or(EnvelopeError::MissingType)?;
        let kind = EnvelopeKind::parse(type_name)
            .ok_or_else(|| EnvelopeError::UnknownType(type_name.to_string()))?;
        if kind.is_server_only() {
            return Err(EnvelopeError::ServerOnly(kind.as_str()));
        }

        let to = match body.get("to").and_then(id_text) {
            Some(to) => UserId::parse(to)?,
            None => return Err(EnvelopeError::MissingRecipient),
        };
        if &to == sender {
            return Err(EnvelopeError::SelfAddressed);
        }

        let text = match body.get("from") {
            None => stamp_sender(raw, sender)?,
            Some(claimed) => match id_text(claimed) {
                Some(id) if id == sender.as_str() => raw.to_string(),
                _ => return Err(EnvelopeError::SpoofedSender(claimed.to_string())),
            },
        };

        // Absent `isTyping` counts as typing.
        let typing = kind == EnvelopeKind::Typing
            && body.get("isTyping").and_then(Value::as_bool).unwrap_or(true);

        Ok(Self {
            kind,
            from: sender.clone(),
            to,
            typing,
            text,
        })
    }

    /// The indicator the hub sends on a typing timeout.
    pub fn typing_stopped(from: &UserId, to: &UserId) -> Self {
        let text = json!({
            "type": EnvelopeKind::Typing.as_str(),
            "from": from,
            "to": to,
            "isTyping": false,
        })
        .to_string();
        Self {
            kind: EnvelopeKind::Typing,
            from: from.clone(),
            to: to.clone(),
            typing: false,
            text,
        }
    }

    pub fn kind(&self) -> EnvelopeKind {
        self.kind
    }

    pub fn from(&self) -> &UserId {
        &self.from
    }

    pub fn to(&self) -> &UserId {
        &self.to
    }

    /// For `typing` envelopes: whether this starts (or continues) typing.
    pub fn is_typing(&self) -> bool {
        self.typing
    }

    pub fn as_text(&self) -> &str {
        &self.text
    }
}

/// Append `"from"` as the last member of the raw object text. The object
/// always holds at least `type`, so a separating comma is always needed.
fn stamp_sender(raw: &str, sender: &UserId) -> Result<String, EnvelopeError> {
    let head = raw
        .trim_end()
        .strip_suffix('}')
        .ok_or(EnvelopeError::NotAnObject)?;
    let from = serde_json::to_string(sender.as_str())?;
    Ok(format!("{},\"from\":{}}}", head, from))
}

/// Ids arrive as strings from most clients but as numbers from rows keyed by
/// integer primary keys; both compare by their decimal text.
fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// Events produced by the hub itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    UserStatus {
        user_id: UserId,
        status: PresenceStatus,
    },
}
