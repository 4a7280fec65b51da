use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8080;

pub const NEW_CLIENT: &str = "new_client";
pub const CLIENT_DISCONNECTED: &str = "client_disconnected";
pub const PLAYER_READY: &str = "player_ready";
pub const PLAYER_CONTROLS: &str = "player_controls";

/// Server-minted identifier for a connection.
///
/// Travels on the wire as a JSON string so hosts can treat it as opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for ClientId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ClientId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(u64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(raw) => Ok(ClientId(raw)),
            Repr::Text(text) => text
                .parse()
                .map(ClientId)
                .map_err(serde::de::Error::custom),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Client,
}

/// Player-supplied fields carried by `register` and `ready`.
///
/// Only `playerName` is interpreted; anything else the client sends is kept
/// and echoed back to the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    #[serde(
        rename = "playerName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub player_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PlayerProfile {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            player_name: Some(name.into()),
            extra: Map::new(),
        }
    }
}

/// A decoded inbound frame, one variant per discriminator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Inbound {
    Register { role: Role, value: PlayerProfile },
    Message { message: String },
    Ready { value: PlayerProfile },
    Controls { value: Map<String, Value> },
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("frame has no string `type` field")]
    MissingType,
    #[error("unknown message type `{0}`")]
    UnknownType(String),
    #[error("invalid `{kind}` payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct RegisterFrame {
    role: Role,
    #[serde(default)]
    value: PlayerProfile,
}

#[derive(Deserialize)]
struct MessageFrame {
    message: String,
}

#[derive(Deserialize)]
struct ReadyFrame {
    #[serde(default)]
    value: PlayerProfile,
}

#[derive(Deserialize)]
struct ControlsFrame {
    #[serde(default)]
    value: Map<String, Value>,
}

impl Inbound {
    /// Decodes a text frame, keeping unknown discriminators and bad payloads
    /// apart so the router can log them differently.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let frame: Value = serde_json::from_str(text).map_err(DecodeError::Malformed)?;

        let kind = match frame.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            _ => return Err(DecodeError::MissingType),
        };

        let decoded = match kind.as_str() {
            "register" => serde_json::from_value::<RegisterFrame>(frame)
                .map(|f| Inbound::Register {
                    role: f.role,
                    value: f.value,
                }),
            "message" => serde_json::from_value::<MessageFrame>(frame)
                .map(|f| Inbound::Message { message: f.message }),
            "ready" => {
                serde_json::from_value::<ReadyFrame>(frame).map(|f| Inbound::Ready { value: f.value })
            }
            "controls" => serde_json::from_value::<ControlsFrame>(frame)
                .map(|f| Inbound::Controls { value: f.value }),
            _ => return Err(DecodeError::UnknownType(kind)),
        };

        decoded.map_err(|source| DecodeError::InvalidPayload { kind, source })
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// The `{ type, message, data }` wrapper used for every host notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub data: Value,
}

impl Envelope {
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_text(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.data
            .get("clientId")
            .and_then(|id| ClientId::deserialize(id).ok())
    }

    pub fn player_name(&self) -> Option<&str> {
        self.data.get("playerName").and_then(Value::as_str)
    }

    pub fn ready(&self) -> Option<bool> {
        self.data.get("ready").and_then(Value::as_bool)
    }
}

/// Events the relay reports to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    NewClient {
        client_id: ClientId,
        profile: PlayerProfile,
    },
    ClientDisconnected {
        client_id: ClientId,
    },
    PlayerReady {
        client_id: ClientId,
        profile: PlayerProfile,
    },
    PlayerControls {
        client_id: ClientId,
        controls: Map<String, Value>,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::NewClient { .. } => NEW_CLIENT,
            Notification::ClientDisconnected { .. } => CLIENT_DISCONNECTED,
            Notification::PlayerReady { .. } => PLAYER_READY,
            Notification::PlayerControls { .. } => PLAYER_CONTROLS,
        }
    }

    pub fn client_id(&self) -> ClientId {
        match self {
            Notification::NewClient { client_id, .. }
            | Notification::ClientDisconnected { client_id }
            | Notification::PlayerReady { client_id, .. }
            | Notification::PlayerControls { client_id, .. } => *client_id,
        }
    }

    /// Builds the envelope. Server-owned fields (`clientId`, `ready`) always
    /// overwrite anything the client put in its payload.
    pub fn into_envelope(self) -> Envelope {
        let kind = self.kind().to_string();
        let client_id = Value::String(self.client_id().to_string());

        let (message, data) = match self {
            Notification::NewClient { profile, .. } => {
                let mut data = profile_fields(profile);
                data.insert("clientId".into(), client_id);
                data.insert("ready".into(), Value::Bool(false));
                ("A new client has connected".to_string(), data)
            }
            Notification::ClientDisconnected { client_id: id } => {
                let mut data = Map::new();
                data.insert("clientId".into(), client_id);
                (format!("Client with ID {} has disconnected", id), data)
            }
            Notification::PlayerReady { profile, .. } => {
                let mut data = profile_fields(profile);
                data.insert("clientId".into(), client_id);
                data.insert("ready".into(), Value::Bool(true));
                ("A player is ready".to_string(), data)
            }
            Notification::PlayerControls { controls, .. } => {
                let mut data = controls;
                data.insert("clientId".into(), client_id);
                ("Player controls update".to_string(), data)
            }
        };

        Envelope {
            kind,
            message,
            data: Value::Object(data),
        }
    }
}

fn profile_fields(profile: PlayerProfile) -> Map<String, Value> {
    let mut data = profile.extra;
    if let Some(name) = profile.player_name {
        data.insert("playerName".into(), Value::String(name));
    }
    data
}
