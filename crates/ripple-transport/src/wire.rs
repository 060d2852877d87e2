//! Wire envelope and protocol frames.
//!
//! Every message carries the sending port's identity plus the (name,
//! channel) pair that scopes it; receivers drop anything outside their own
//! scope. The empty string is the valid default channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Action relay body shared by both forward directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionFrame {
    /// Correlation id allocated by the originating replica; absent on
    /// master-originated broadcasts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub action: String,
    pub payload: Vec<Value>,
}

impl ActionFrame {
    pub fn new(action: impl Into<String>, payload: Vec<Value>) -> Self {
        Self {
            id: None,
            action: action.into(),
            payload,
        }
    }

    pub fn with_id(id: impl Into<String>, action: impl Into<String>, payload: Vec<Value>) -> Self {
        Self {
            id: Some(id.into()),
            action: action.into(),
            payload,
        }
    }
}

/// Protocol event plus its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum Frame {
    /// Replica asks the master for a full snapshot.
    #[serde(rename = "state/request")]
    StateRequest,
    /// Master replies with the current snapshot.
    #[serde(rename = "state/response")]
    StateResponse(Value),
    /// Replica asks the master to apply an action on the authoritative state.
    #[serde(rename = "forward/master")]
    ForwardMaster(ActionFrame),
    /// Master relays an applied action to its mirrors.
    #[serde(rename = "forward/replica")]
    ForwardReplica(ActionFrame),
    /// Replica announces itself on a channel before requesting state.
    #[serde(rename = "register/replica")]
    RegisterReplica,
    /// Master acknowledges a channel registration.
    #[serde(rename = "register/success")]
    RegisterSuccess,
}

/// Envelope for everything that crosses a [`Port`](crate::Port).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub port_id: String,
    pub name: String,
    pub channel: String,
    #[serde(flatten)]
    pub frame: Frame,
}

impl Message {
    pub fn new(
        port_id: impl Into<String>,
        name: impl Into<String>,
        channel: impl Into<String>,
        frame: Frame,
    ) -> Self {
        Self {
            port_id: port_id.into(),
            name: name.into(),
            channel: channel.into(),
            frame,
        }
    }

    pub fn state_request(
        port_id: impl Into<String>,
        name: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self::new(port_id, name, channel, Frame::StateRequest)
    }

    pub fn state_response(
        port_id: impl Into<String>,
        name: impl Into<String>,
        channel: impl Into<String>,
        snapshot: Value,
    ) -> Self {
        Self::new(port_id, name, channel, Frame::StateResponse(snapshot))
    }

    pub fn forward_master(
        port_id: impl Into<String>,
        name: impl Into<String>,
        channel: impl Into<String>,
        frame: ActionFrame,
    ) -> Self {
        Self::new(port_id, name, channel, Frame::ForwardMaster(frame))
    }

    pub fn forward_replica(
        port_id: impl Into<String>,
        name: impl Into<String>,
        channel: impl Into<String>,
        frame: ActionFrame,
    ) -> Self {
        Self::new(port_id, name, channel, Frame::ForwardReplica(frame))
    }

    pub fn register_replica(
        port_id: impl Into<String>,
        name: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self::new(port_id, name, channel, Frame::RegisterReplica)
    }

    pub fn register_success(
        port_id: impl Into<String>,
        name: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self::new(port_id, name, channel, Frame::RegisterSuccess)
    }

    /// True when the message targets the given (name, channel) scope.
    pub fn matches_scope(&self, name: &str, channel: &str) -> bool {
        self.name == name && self.channel == channel
    }
}
