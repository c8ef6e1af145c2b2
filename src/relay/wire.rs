//! Relay Wire Envelope
//!
//! Every message on a relay socket is one JSON text frame in this envelope.
//! The `type` tag selects the variant; payload fields are camelCase to match
//! the browser side. Unknown frame types fail to parse and are dropped by
//! the reader, never echoed back.

use serde::{Deserialize, Serialize};

use crate::events::RealtimeEvent;

// == Frame ==
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Frame {
    /// Client request to subscribe to one guild room.
    #[serde(rename = "join:guild")]
    JoinGuild {
        #[serde(rename = "guildId")]
        guild_id: String,
    },

    /// Server acknowledgement of a granted join.
    #[serde(rename = "joined")]
    Joined {
        #[serde(rename = "guildId")]
        guild_id: String,
    },

    /// One relayed state-change event.
    #[serde(rename = "realtime:event")]
    RealtimeEvent { event: RealtimeEvent },

    /// Orderly teardown requested by the client.
    #[serde(rename = "disconnect")]
    Disconnect,
}

impl Frame {
    /// Serializes the frame for a text websocket message.
    pub fn encode(&self) -> crate::error::Result<String> {
        serde_json::to_string(self)
            .map_err(|e| crate::error::CoreError::Relay(format!("frame encode failed: {e}")))
    }

    /// Parses one text websocket message.
    pub fn decode(text: &str) -> crate::error::Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| crate::error::CoreError::Relay(format!("frame decode failed: {e}")))
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_roundtrip() {
        let frame = Frame::JoinGuild {
            guild_id: "g1".to_string(),
        };
        let text = frame.encode().unwrap();

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "join:guild");
        assert_eq!(value["guildId"], "g1");

        assert_eq!(Frame::decode(&text).unwrap(), frame);
    }

    #[test]
    fn test_joined_roundtrip() {
        let frame = Frame::Joined {
            guild_id: "g2".to_string(),
        };
        assert_eq!(Frame::decode(&frame.encode().unwrap()).unwrap(), frame);
    }

    #[test]
    fn test_event_roundtrip_keeps_envelope() {
        let frame = Frame::RealtimeEvent {
            event: RealtimeEvent::now("poll:ended", "g1", json!({ "id": "p1" })),
        };
        let text = frame.encode().unwrap();

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "realtime:event");
        assert_eq!(value["event"]["type"], "poll:ended");
        assert_eq!(value["event"]["guildId"], "g1");
        assert!(value["event"]["timestamp"].as_str().unwrap().contains('T'));

        assert_eq!(Frame::decode(&text).unwrap(), frame);
    }

    #[test]
    fn test_disconnect_roundtrip() {
        let text = Frame::Disconnect.encode().unwrap();
        assert_eq!(Frame::decode(&text).unwrap(), Frame::Disconnect);
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        assert!(Frame::decode(r#"{"type":"shutdown"}"#).is_err());
        assert!(Frame::decode("not json").is_err());
    }
}
