use crate::channels::traits::{
    AnnouncementChannel, CelebrationEntry, ChannelAdapter, ChannelInboundMessage, ChatPlatform,
    NewCelebration,
};
use crate::config::DiscordConfig;
use crate::error::{CakedayError, Result};
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use futures_util::{SinkExt, StreamExt};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};

/// GUILDS | GUILD_MESSAGES | MESSAGE_CONTENT
const GATEWAY_INTENTS: u64 = 1 | (1 << 9) | (1 << 15);

const GUILD_TEXT_CHANNEL: u8 = 0;
const EVENT_PRIVACY_GUILD_ONLY: u8 = 2;
const EVENT_ENTITY_EXTERNAL: u8 = 3;

#[derive(Debug, Deserialize)]
struct EventPayload {
    id: String,
    name: String,
    scheduled_start_time: DateTime<Utc>,
    #[serde(default)]
    scheduled_end_time: Option<DateTime<Utc>>,
}

impl From<EventPayload> for CelebrationEntry {
    fn from(payload: EventPayload) -> Self {
        Self {
            id: payload.id,
            name: payload.name,
            start: payload.scheduled_start_time,
            end: payload.scheduled_end_time,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChannelPayload {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    position: i64,
}

/// Discord adapter using the gateway websocket for inbound commands and the
/// REST API for everything outbound.
pub struct DiscordAdapter {
    bot_token: String,
    api_base: String,
    allowed_guild_ids: Vec<String>,
    client: reqwest::Client,
    /// Last heartbeat round trip in microseconds; 0 = not measured yet.
    latency_micros: AtomicU64,
}

impl DiscordAdapter {
    pub fn new(bot_token: impl Into<String>, config: &DiscordConfig) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            allowed_guild_ids: config.allowed_guild_ids.clone(),
            client: reqwest::Client::new(),
            latency_micros: AtomicU64::new(0),
        }
    }

    fn is_guild_allowed(&self, guild_id: &str) -> bool {
        if self.allowed_guild_ids.is_empty() {
            return true;
        }
        self.allowed_guild_ids
            .iter()
            .any(|g| g == "*" || g.as_str() == guild_id)
    }

    fn bot_user_id_from_token(token: &str) -> Option<String> {
        let first = token.split('.').next()?;
        let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(first)
            .ok()?;
        String::from_utf8(decoded).ok()
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.bot_token)
    }

    async fn check(response: reqwest::Response, action: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, action, &body))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str, action: &str) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{path}", self.api_base))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| CakedayError::Platform(format!("{action}: {e}")))?;
        Self::check(response, action)
            .await?
            .json()
            .await
            .map_err(|e| CakedayError::Platform(format!("{action}: bad response: {e}")))
    }
}

fn status_error(status: StatusCode, action: &str, body: &str) -> CakedayError {
    match status {
        StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => {
            CakedayError::PlatformForbidden(format!("{action} ({status}): {body}"))
        }
        _ => CakedayError::Platform(format!("{action} ({status}): {body}")),
    }
}

fn rfc3339(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Text channels in sidebar order.
fn text_channels(mut channels: Vec<ChannelPayload>) -> Vec<AnnouncementChannel> {
    channels.retain(|c| c.kind == GUILD_TEXT_CHANNEL);
    channels.sort_by_key(|c| c.position);
    channels
        .into_iter()
        .map(|c| AnnouncementChannel {
            id: c.id,
            name: c.name,
        })
        .collect()
}

/// Pull a command-relevant message out of a `MESSAGE_CREATE` payload.
fn inbound_from_event(data: &serde_json::Value, bot_user_id: &str) -> Option<ChannelInboundMessage> {
    let author = data.get("author")?;
    let author_id = author.get("id").and_then(serde_json::Value::as_str)?;
    if author_id.is_empty() || author_id == bot_user_id {
        return None;
    }
    let author_is_bot = author
        .get("bot")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false);
    if author_is_bot {
        return None;
    }

    let channel_id = data.get("channel_id").and_then(serde_json::Value::as_str)?;
    let content = data
        .get("content")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .trim();
    if channel_id.is_empty() || content.is_empty() {
        return None;
    }

    let str_field = |value: &serde_json::Value, key: &str| {
        value
            .get(key)
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_owned()
    };

    Some(ChannelInboundMessage {
        venue_id: data
            .get("guild_id")
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned),
        reply_target: channel_id.to_owned(),
        author_id: author_id.to_owned(),
        author_name: str_field(author, "username"),
        author_discriminator: str_field(author, "discriminator"),
        text: content.to_owned(),
    })
}

#[async_trait]
impl ChatPlatform for DiscordAdapter {
    fn id(&self) -> &'static str {
        "discord"
    }

    async fn send_message(&self, destination: &str, text: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/channels/{destination}/messages", self.api_base))
            .header("Authorization", self.auth_header())
            .json(&json!({ "content": text }))
            .send()
            .await
            .map_err(|e| CakedayError::Platform(format!("discord send: {e}")))?;
        Self::check(response, "discord send").await?;
        Ok(())
    }

    async fn create_scheduled_celebration(
        &self,
        venue: &str,
        celebration: &NewCelebration,
    ) -> Result<CelebrationEntry> {
        let body = json!({
            "name": celebration.name,
            "description": celebration.description,
            "scheduled_start_time": rfc3339(celebration.start),
            "scheduled_end_time": rfc3339(celebration.end),
            "privacy_level": EVENT_PRIVACY_GUILD_ONLY,
            "entity_type": EVENT_ENTITY_EXTERNAL,
            "entity_metadata": { "location": celebration.location },
        });
        let response = self
            .client
            .post(format!("{}/guilds/{venue}/scheduled-events", self.api_base))
            .header("Authorization", self.auth_header())
            .header("X-Audit-Log-Reason", "Created by birthday bot")
            .json(&body)
            .send()
            .await
            .map_err(|e| CakedayError::Platform(format!("discord create event: {e}")))?;
        let payload: EventPayload = Self::check(response, "discord create event")
            .await?
            .json()
            .await
            .map_err(|e| CakedayError::Platform(format!("discord create event: bad response: {e}")))?;
        Ok(payload.into())
    }

    async fn list_scheduled_celebrations(&self, venue: &str) -> Result<Vec<CelebrationEntry>> {
        let events: Vec<EventPayload> = self
            .get_json(
                &format!("/guilds/{venue}/scheduled-events"),
                "discord list events",
            )
            .await?;
        Ok(events.into_iter().map(CelebrationEntry::from).collect())
    }

    async fn announcement_channels(&self, venue: &str) -> Result<Vec<AnnouncementChannel>> {
        let channels: Vec<ChannelPayload> = self
            .get_json(&format!("/guilds/{venue}/channels"), "discord list channels")
            .await?;
        Ok(text_channels(channels))
    }

    fn latency(&self) -> Option<Duration> {
        match self.latency_micros.load(Ordering::Relaxed) {
            0 => None,
            micros => Some(Duration::from_micros(micros)),
        }
    }
}

#[async_trait]
impl ChannelAdapter for DiscordAdapter {
    async fn run(&self, inbound_tx: mpsc::Sender<ChannelInboundMessage>) -> anyhow::Result<()> {
        if self.bot_token.trim().is_empty() {
            anyhow::bail!("discord bot token is empty");
        }

        let bot_user_id = Self::bot_user_id_from_token(&self.bot_token).unwrap_or_default();

        let gateway_resp: serde_json::Value = self
            .client
            .get(format!("{}/gateway/bot", self.api_base))
            .header("Authorization", self.auth_header())
            .send()
            .await?
            .json()
            .await?;

        let gateway_url = gateway_resp
            .get("url")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("wss://gateway.discord.gg");
        let ws_url = format!("{gateway_url}/?v=10&encoding=json");

        let (stream, _) = tokio_tungstenite::connect_async(&ws_url).await?;
        let (mut write, mut read) = stream.split();

        let hello = read
            .next()
            .await
            .ok_or_else(|| anyhow::anyhow!("no hello"))??;
        let hello_text = match hello {
            Message::Text(text) => text.to_string(),
            _ => anyhow::bail!("unexpected discord hello payload"),
        };
        let hello_json: serde_json::Value = serde_json::from_str(&hello_text)?;
        let heartbeat_interval_ms = hello_json
            .get("d")
            .and_then(|v| v.get("heartbeat_interval"))
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(41_250);

        let identify = json!({
            "op": 2,
            "d": {
                "token": self.bot_token,
                "intents": GATEWAY_INTENTS,
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": "cakeday",
                    "device": "cakeday"
                }
            }
        });
        write.send(Message::Text(identify.to_string())).await?;
        info!("discord gateway connected");

        let mut heartbeat =
            tokio::time::interval(Duration::from_millis(heartbeat_interval_ms));
        let mut last_sequence = serde_json::Value::Null;
        let mut heartbeat_sent_at: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    let payload = json!({"op": 1, "d": last_sequence});
                    if write.send(Message::Text(payload.to_string())).await.is_err() {
                        anyhow::bail!("discord heartbeat failed");
                    }
                    heartbeat_sent_at = Some(Instant::now());
                }
                maybe_msg = read.next() => {
                    let raw = match maybe_msg {
                        Some(Ok(Message::Text(text))) => text.to_string(),
                        Some(Ok(Message::Close(_))) | None => {
                            anyhow::bail!("discord websocket closed");
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(err)) => anyhow::bail!("discord websocket error: {err}"),
                    };

                    let payload: serde_json::Value = match serde_json::from_str(&raw) {
                        Ok(v) => v,
                        Err(_) => continue,
                    };

                    if let Some(seq) = payload.get("s").filter(|s| !s.is_null()) {
                        last_sequence = seq.clone();
                    }

                    match payload.get("op").and_then(serde_json::Value::as_u64) {
                        // Heartbeat ACK
                        Some(11) => {
                            if let Some(sent) = heartbeat_sent_at.take() {
                                let micros = u64::try_from(sent.elapsed().as_micros()).unwrap_or(u64::MAX);
                                self.latency_micros.store(micros.max(1), Ordering::Relaxed);
                            }
                            continue;
                        }
                        // Reconnect / invalid session: let the runtime reconnect.
                        Some(7) | Some(9) => anyhow::bail!("discord asked for a reconnect"),
                        _ => {}
                    }

                    let event_name = payload.get("t").and_then(serde_json::Value::as_str).unwrap_or_default();
                    if event_name != "MESSAGE_CREATE" {
                        continue;
                    }

                    let Some(data) = payload.get("d") else {
                        continue;
                    };
                    let Some(inbound) = inbound_from_event(data, &bot_user_id) else {
                        continue;
                    };
                    if let Some(guild) = inbound.venue_id.as_deref()
                        && !self.is_guild_allowed(guild)
                    {
                        debug!(guild, "ignoring message from guild outside allowlist");
                        continue;
                    }

                    if inbound_tx.send(inbound).await.is_err() {
                        anyhow::bail!("discord inbound channel closed");
                    }
                }
            }
        }
    }

    async fn health_check(&self) -> anyhow::Result<bool> {
        if self.bot_token.trim().is_empty() {
            return Ok(false);
        }
        let response = self
            .client
            .get(format!("{}/users/@me", self.api_base))
            .header("Authorization", self.auth_header())
            .send()
            .await?;
        Ok(response.status().is_success())
    }
}
