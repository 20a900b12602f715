use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

/// One peer's entry in the shared store. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerRecord {
    pub x: f32,
    pub y: f32,
    pub health: u32,
    #[serde(rename = "maxHealth")]
    pub max_health: u32,
    pub timestamp: u64,
    #[serde(deserialize_with = "lenient_messages")]
    pub messages: Vec<PeerMessage>,
}

impl PeerRecord {
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.timestamp)
    }

    pub fn is_stale(&self, now_ms: u64, stale_threshold_ms: u64) -> bool {
        self.age_ms(now_ms) > stale_threshold_ms
    }

    pub(crate) fn push_message(&mut self, message: PeerMessage, max_messages: usize) {
        self.messages.push(message);
        if self.messages.len() > max_messages {
            let excess = self.messages.len() - max_messages;
            self.messages.drain(..excess);
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(rename = "senderId", default)]
    pub sender_id: String,
    /// Per-sender counter, starting at 1. Zero marks a writer that does not
    /// number its messages.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub seq: u64,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

impl PeerMessage {
    pub fn new(body: &MessageBody, timestamp: u64, sender_id: impl Into<String>) -> Self {
        let (kind, data) = body.encode();
        Self {
            kind: kind.to_string(),
            data,
            timestamp,
            sender_id: sender_id.into(),
            seq: 0,
        }
    }

    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }

    /// `None` for unknown kinds or payloads that do not match their kind.
    pub fn body(&self) -> Option<MessageBody> {
        MessageBody::decode(&self.kind, &self.data)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    Attack { x: f32, y: f32 },
    Damage { target_id: String, amount: u32 },
    Position { x: f32, y: f32, health: Option<u32> },
}

#[derive(Serialize, Deserialize)]
struct AttackData {
    x: f32,
    y: f32,
}

#[derive(Serialize, Deserialize)]
struct DamageData {
    #[serde(rename = "targetId")]
    target_id: String,
    #[serde(alias = "amount")]
    damage: u32,
}

#[derive(Serialize, Deserialize)]
struct PositionData {
    x: f32,
    y: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    health: Option<u32>,
}

impl MessageBody {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Attack { .. } => "attack",
            Self::Damage { .. } => "damage",
            Self::Position { .. } => "position",
        }
    }

    fn encode(&self) -> (&'static str, Value) {
        let data = match self {
            Self::Attack { x, y } => serde_json::to_value(AttackData { x: *x, y: *y }),
            Self::Damage { target_id, amount } => serde_json::to_value(DamageData {
                target_id: target_id.clone(),
                damage: *amount,
            }),
            Self::Position { x, y, health } => serde_json::to_value(PositionData {
                x: *x,
                y: *y,
                health: *health,
            }),
        };
        (self.kind(), data.unwrap_or(Value::Null))
    }

    fn decode(kind: &str, data: &Value) -> Option<Self> {
        match kind {
            "attack" => {
                let data = AttackData::deserialize(data).ok()?;
                Some(Self::Attack {
                    x: data.x,
                    y: data.y,
                })
            }
            "damage" => {
                let data = DamageData::deserialize(data).ok()?;
                Some(Self::Damage {
                    target_id: data.target_id,
                    amount: data.damage,
                })
            }
            "position" => {
                let data = PositionData::deserialize(data).ok()?;
                Some(Self::Position {
                    x: data.x,
                    y: data.y,
                    health: data.health,
                })
            }
            _ => None,
        }
    }
}

fn lenient_messages<'de, D>(deserializer: D) -> Result<Vec<PeerMessage>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    let mut messages = Vec::with_capacity(raw.len());
    for value in raw {
        match PeerMessage::deserialize(&value) {
            Ok(message) => messages.push(message),
            Err(error) => warn!(error = %error, "peer_message_skipped"),
        }
    }
    Ok(messages)
}
