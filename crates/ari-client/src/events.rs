//! Typed models for the ARI event feed
//!
//! Only the events the routing engine consumes are modelled; everything else
//! decodes into [`AriEvent::Other`] and is dropped by the consumer.

use serde::Deserialize;

/// Caller identification attached to a channel.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CallerId {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub number: String,
}

/// A channel as reported by Asterisk.
#[derive(Debug, Clone, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Channel state, e.g. `Ring`, `Up`, `Down`.
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub caller: Option<CallerId>,
}

impl Channel {
    /// Caller number, or the empty string when Asterisk supplied none.
    pub fn caller_number(&self) -> String {
        self.caller
            .as_ref()
            .map(|c| c.number.clone())
            .unwrap_or_default()
    }

    /// True once the channel has been answered.
    pub fn is_up(&self) -> bool {
        self.state.eq_ignore_ascii_case("Up")
    }
}

/// A bridge as reported by Asterisk.
#[derive(Debug, Clone, Deserialize)]
pub struct Bridge {
    pub id: String,
}

/// A channel variable value, as returned by the variable endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Variable {
    pub value: String,
}

/// Events consumed from the ARI websocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum AriEvent {
    /// A channel entered the Stasis application.
    StasisStart {
        #[serde(default)]
        args: Vec<String>,
        channel: Channel,
    },
    /// A channel left the Stasis application.
    StasisEnd { channel: Channel },
    /// A channel was destroyed.
    ChannelDestroyed {
        channel: Channel,
        #[serde(default)]
        cause: i32,
        #[serde(default)]
        cause_txt: String,
    },
    /// Any event the router does not consume.
    #[serde(other)]
    Other,
}

impl AriEvent {
    /// The id of the channel this event concerns, when it concerns one.
    pub fn channel_id(&self) -> Option<&str> {
        match self {
            AriEvent::StasisStart { channel, .. }
            | AriEvent::StasisEnd { channel }
            | AriEvent::ChannelDestroyed { channel, .. } => Some(&channel.id),
            AriEvent::Other => None,
        }
    }
}
