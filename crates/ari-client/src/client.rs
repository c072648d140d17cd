//! ARI client: websocket event feed plus the REST action surface
//!
//! The client splits the Asterisk REST Interface into two halves:
//!
//! - [`AriClient::connect_events`] opens the websocket event feed and pumps
//!   decoded [`AriEvent`]s into a channel. The pump task ends when the
//!   transport drops; consumers observe that as the stream closing.
//! - [`MediaControl`] is the action surface (answer, hangup, playback,
//!   origination, bridging). The routing engine programs against the trait so
//!   tests can substitute a scripted implementation.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, info, warn};

use crate::config::AriConfig;
use crate::error::{AriError, Result};
use crate::events::{AriEvent, Bridge, Channel, Variable};

/// Request parameters for originating a new outgoing channel.
#[derive(Debug, Clone)]
pub struct OriginateParams {
    /// Endpoint handed to Asterisk, e.g. `PJSIP/agent-0001`
    pub endpoint: String,
    /// Caller id presented to the dialled party
    pub caller_id: String,
    /// Arguments passed to the Stasis application when the leg enters it
    pub app_args: String,
    /// Seconds to wait for an answer before the origination is abandoned
    pub timeout_seconds: u32,
}

/// Media-server operations the routing engine issues.
#[async_trait]
pub trait MediaControl: Send + Sync {
    /// Answer a ringing channel.
    async fn answer(&self, channel_id: &str) -> Result<()>;

    /// Hang a channel up.
    async fn hangup(&self, channel_id: &str) -> Result<()>;

    /// Play a media id (e.g. `sound:ss-noservice`) on a channel.
    async fn play_media(&self, channel_id: &str, media: &str) -> Result<()>;

    /// Start the default music-on-hold class on a channel.
    async fn start_hold_music(&self, channel_id: &str) -> Result<()>;

    /// Stop music-on-hold on a channel.
    async fn stop_hold_music(&self, channel_id: &str) -> Result<()>;

    /// Originate a new channel into this application; returns the new channel id.
    async fn originate(&self, params: OriginateParams) -> Result<String>;

    /// Create a mixing bridge; returns the bridge id.
    async fn create_bridge(&self) -> Result<String>;

    /// Add a channel to a bridge.
    async fn add_to_bridge(&self, bridge_id: &str, channel_id: &str) -> Result<()>;

    /// Destroy a bridge.
    async fn destroy_bridge(&self, bridge_id: &str) -> Result<()>;

    /// Read a channel variable; `None` when the variable is not set.
    async fn channel_variable(&self, channel_id: &str, name: &str) -> Result<Option<String>>;
}

/// Client for one Asterisk ARI endpoint.
#[derive(Clone)]
pub struct AriClient {
    config: AriConfig,
    http: reqwest::Client,
}

impl AriClient {
    pub fn new(config: AriConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, http }
    }

    pub fn config(&self) -> &AriConfig {
        &self.config
    }

    /// Connect the event websocket and spawn the read pump.
    ///
    /// Returns the receiving end of the event stream. The stream closing means
    /// the control transport is gone; per the routing policy that is fatal to
    /// the process, so the caller decides how to wind down.
    pub async fn connect_events(&self) -> Result<mpsc::UnboundedReceiver<AriEvent>> {
        let url = self.config.ws_url();
        let (ws, _response) = connect_async(url.as_str()).await?;
        info!(
            "🔌 ARI event socket connected to {}:{} as app '{}'",
            self.config.host, self.config.port, self.config.app_name
        );

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let (_write, mut read) = ws.split();
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<AriEvent>(&text) {
                        Ok(event) => {
                            if tx.send(event).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Dropping undecodable ARI event: {}", e),
                    },
                    Ok(Message::Close(_)) => {
                        warn!("ARI event socket closed by server");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("ARI event socket error: {}", e);
                        break;
                    }
                }
            }
            // Dropping the sender closes the stream on the consumer side.
        });

        Ok(rx)
    }

    async fn post(&self, path: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.config.http_base(), path);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .query(query)
            .send()
            .await?;
        Self::check(response).await
    }

    async fn delete(&self, path: &str) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.config.http_base(), path);
        let response = self
            .http
            .delete(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await?;
        Self::check(response).await
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.config.http_base(), path);
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .query(query)
            .send()
            .await?;
        Self::check(response).await
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(AriError::Rejected { status, body })
        }
    }
}

#[async_trait]
impl MediaControl for AriClient {
    async fn answer(&self, channel_id: &str) -> Result<()> {
        self.post(&format!("/channels/{channel_id}/answer"), &[]).await?;
        Ok(())
    }

    async fn hangup(&self, channel_id: &str) -> Result<()> {
        self.delete(&format!("/channels/{channel_id}")).await?;
        Ok(())
    }

    async fn play_media(&self, channel_id: &str, media: &str) -> Result<()> {
        self.post(
            &format!("/channels/{channel_id}/play"),
            &[("media", media.to_string())],
        )
        .await?;
        Ok(())
    }

    async fn start_hold_music(&self, channel_id: &str) -> Result<()> {
        // No mohClass parameter: Asterisk picks its default music class.
        self.post(&format!("/channels/{channel_id}/moh"), &[]).await?;
        Ok(())
    }

    async fn stop_hold_music(&self, channel_id: &str) -> Result<()> {
        self.delete(&format!("/channels/{channel_id}/moh")).await?;
        Ok(())
    }

    async fn originate(&self, params: OriginateParams) -> Result<String> {
        let query = [
            ("endpoint", params.endpoint),
            ("app", self.config.app_name.clone()),
            ("appArgs", params.app_args),
            ("callerId", params.caller_id),
            ("timeout", params.timeout_seconds.to_string()),
        ];
        let response = self.post("/channels", &query).await?;
        let channel: Channel = response.json().await?;
        Ok(channel.id)
    }

    async fn create_bridge(&self) -> Result<String> {
        let response = self
            .post("/bridges", &[("type", "mixing".to_string())])
            .await?;
        let bridge: Bridge = response.json().await?;
        Ok(bridge.id)
    }

    async fn add_to_bridge(&self, bridge_id: &str, channel_id: &str) -> Result<()> {
        self.post(
            &format!("/bridges/{bridge_id}/addChannel"),
            &[("channel", channel_id.to_string())],
        )
        .await?;
        Ok(())
    }

    async fn destroy_bridge(&self, bridge_id: &str) -> Result<()> {
        self.delete(&format!("/bridges/{bridge_id}")).await?;
        Ok(())
    }

    async fn channel_variable(&self, channel_id: &str, name: &str) -> Result<Option<String>> {
        let result = self
            .get(
                &format!("/channels/{channel_id}/variable"),
                &[("variable", name.to_string())],
            )
            .await;
        match result {
            Ok(response) => {
                let variable: Variable = response.json().await?;
                Ok(Some(variable.value))
            }
            // Asterisk answers 404 for variables that were never set.
            Err(AriError::Rejected { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
