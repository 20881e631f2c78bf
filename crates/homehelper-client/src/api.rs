//! HTTP collaborator: history, pagination, mention windows and mark-seen.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use homehelper_shared::error::FetchError;
use homehelper_shared::protocol::ChatMessage;
use homehelper_shared::types::{ChannelId, Direction, MessageId};

use crate::config::ClientConfig;

/// Pagination anchor: the edge message of the rendered window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub id: MessageId,
    pub date: DateTime<Utc>,
}

impl Cursor {
    pub fn of(message: &ChatMessage) -> Self {
        Self {
            id: message.id,
            date: message.date,
        }
    }

    fn query(&self, direction: Direction) -> [(&'static str, String); 2] {
        let timestamp = self.date.to_rfc3339_opts(SecondsFormat::Millis, true);
        match direction {
            Direction::Previous => [
                ("lastMessageId", self.id.to_string()),
                ("lastMessageTimestamp", timestamp),
            ],
            Direction::Next => [
                ("recentMessageId", self.id.to_string()),
                ("recentMessageTimestamp", timestamp),
            ],
        }
    }
}

/// Server endpoints consumed by the chat engine and the mention inbox.
#[async_trait]
pub trait ChatApi: Send + Sync + 'static {
    /// Most recent messages of a channel.
    async fn history(&self, channel: ChannelId) -> Result<Vec<ChatMessage>, FetchError>;

    /// Messages older (`Previous`) or newer (`Next`) than `cursor`. Empty when
    /// there are none.
    async fn page(
        &self,
        channel: ChannelId,
        direction: Direction,
        cursor: Cursor,
    ) -> Result<Vec<ChatMessage>, FetchError>;

    /// Messages around `mention_time`.
    async fn around(
        &self,
        channel: ChannelId,
        mention_time: DateTime<Utc>,
    ) -> Result<Vec<ChatMessage>, FetchError>;

    /// Acknowledge every mention of the current user in `channel`.
    async fn mark_seen(&self, channel: ChannelId) -> Result<(), FetchError>;
}

#[async_trait]
impl<T: ChatApi + ?Sized> ChatApi for Arc<T> {
    async fn history(&self, channel: ChannelId) -> Result<Vec<ChatMessage>, FetchError> {
        (**self).history(channel).await
    }

    async fn page(
        &self,
        channel: ChannelId,
        direction: Direction,
        cursor: Cursor,
    ) -> Result<Vec<ChatMessage>, FetchError> {
        (**self).page(channel, direction, cursor).await
    }

    async fn around(
        &self,
        channel: ChannelId,
        mention_time: DateTime<Utc>,
    ) -> Result<Vec<ChatMessage>, FetchError> {
        (**self).around(channel, mention_time).await
    }

    async fn mark_seen(&self, channel: ChannelId) -> Result<(), FetchError> {
        (**self).mark_seen(channel).await
    }
}

/// `reqwest` implementation of [`ChatApi`].
#[derive(Debug, Clone)]
pub struct HttpChatApi {
    client: reqwest::Client,
    base_url: String,
    csrf: Option<(String, String)>,
}

impl HttpChatApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            csrf: None,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        let api = Self::new(&config.base_url);
        match &config.csrf_token {
            Some(token) => api.with_csrf(&config.csrf_header, token),
            None => api,
        }
    }

    /// Attach `header: token` to every state-changing request.
    pub fn with_csrf(mut self, header: &str, token: &str) -> Self {
        self.csrf = Some((header.to_string(), token.to_string()));
        self
    }

    async fn fetch_messages(
        &self,
        url: String,
        query: &[(&str, String)],
    ) -> Result<Vec<ChatMessage>, FetchError> {
        debug!(url = %url, "Fetching messages");
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        response
            .json::<Vec<ChatMessage>>()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn history(&self, channel: ChannelId) -> Result<Vec<ChatMessage>, FetchError> {
        let url = format!("{}/chat/{}/history", self.base_url, channel);
        self.fetch_messages(url, &[]).await
    }

    async fn page(
        &self,
        channel: ChannelId,
        direction: Direction,
        cursor: Cursor,
    ) -> Result<Vec<ChatMessage>, FetchError> {
        let url = format!("{}/chat/{}/{}", self.base_url, channel, direction.as_path());
        self.fetch_messages(url, &cursor.query(direction)).await
    }

    async fn around(
        &self,
        channel: ChannelId,
        mention_time: DateTime<Utc>,
    ) -> Result<Vec<ChatMessage>, FetchError> {
        let url = format!("{}/chat/{}/showMention", self.base_url, channel);
        let at = mention_time.to_rfc3339_opts(SecondsFormat::AutoSi, true);
        self.fetch_messages(url, &[("mentionTime", at)]).await
    }

    async fn mark_seen(&self, channel: ChannelId) -> Result<(), FetchError> {
        let url = format!("{}/mark-seen/{}", self.base_url, channel);
        let mut request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json");
        if let Some((header, token)) = &self.csrf {
            request = request.header(header.as_str(), token.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url,
            });
        }
        Ok(())
    }
}
