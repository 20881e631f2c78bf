//! Unseen-mention inbox and its reconciliation with the server.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use homehelper_shared::dates::format_relative_time;
use homehelper_shared::protocol::MentionNotification;
use homehelper_shared::types::ChannelId;

use crate::api::ChatApi;
use crate::state::SessionContext;

/// Chat page showing the message behind `mention`.
pub fn redirect_path(mention: &MentionNotification) -> String {
    format!(
        "/renovation/{}/chat/{}?mentionTime={}",
        mention.renovation_details.id,
        mention.channel_id,
        mention.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    )
}

pub fn relative_time(mention: &MentionNotification, now: DateTime<Utc>) -> String {
    format_relative_time(mention.timestamp, now)
}

/// Unseen mentions, newest first, plus the unread indicator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MentionInbox {
    entries: Vec<MentionNotification>,
    unread: bool,
}

impl MentionInbox {
    pub fn new(initial: Vec<MentionNotification>) -> Self {
        let unread = !initial.is_empty();
        Self {
            entries: initial,
            unread,
        }
    }

    pub fn entries(&self) -> &[MentionNotification] {
        &self.entries
    }

    pub fn has_unread(&self) -> bool {
        self.unread
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push_live(&mut self, mention: MentionNotification) {
        self.entries.insert(0, mention);
        self.unread = true;
    }

    /// Drop every entry of `channel_id`. Clears the indicator once nothing is
    /// left anywhere. Returns how many entries went away.
    pub fn remove_channel(&mut self, channel_id: ChannelId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|m| m.channel_id != channel_id);
        if self.entries.is_empty() {
            self.unread = false;
        }
        before - self.entries.len()
    }
}

struct Inner<A> {
    api: A,
    session: SessionContext,
    inbox: Mutex<MentionInbox>,
}

/// Applies live mentions to the inbox and marks channels seen.
pub struct MentionController<A> {
    inner: Arc<Inner<A>>,
}

impl<A> Clone for MentionController<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A: ChatApi> MentionController<A> {
    pub fn new(api: A, session: SessionContext, initial: Vec<MentionNotification>) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                session,
                inbox: Mutex::new(MentionInbox::new(initial)),
            }),
        }
    }

    fn inbox(&self) -> MutexGuard<'_, MentionInbox> {
        match self.inner.inbox.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn snapshot(&self) -> MentionInbox {
        self.inbox().clone()
    }

    /// Handle a raw payload from the user's mention topic.
    ///
    /// A mention in the chat already on screen is acknowledged right away;
    /// any other lands in the inbox.
    pub fn on_mention(&self, payload: Value) -> Option<JoinHandle<()>> {
        let mention: MentionNotification = match serde_json::from_value(payload) {
            Ok(mention) => mention,
            Err(e) => {
                warn!(error = %e, "Dropping undecodable mention");
                return None;
            }
        };

        if self.inner.session.is_viewing(mention.channel_id) {
            debug!(channel = %mention.channel_id, "Mention in open channel");
            let this = self.clone();
            let channel = mention.channel_id;
            return Some(tokio::spawn(async move { this.mark_seen(channel).await }));
        }

        debug!(channel = %mention.channel_id, sender = %mention.sender.full_name(), "New mention");
        self.inbox().push_live(mention);
        None
    }

    /// Acknowledge `channel_id` and clear its entries on success.
    pub async fn mark_seen(&self, channel_id: ChannelId) {
        match self.inner.api.mark_seen(channel_id).await {
            Ok(()) => {
                let mut inbox = self.inbox();
                let removed = inbox.remove_channel(channel_id);
                info!(channel = %channel_id, removed, unread = inbox.has_unread(), "Mentions marked seen");
            }
            Err(e) => warn!(channel = %channel_id, error = %e, "Failed to mark mentions seen"),
        }
    }

    /// Visiting a chat acknowledges its mentions.
    pub async fn on_page_open(&self) {
        if let Some(channel_id) = self.inner.session.channel_id {
            self.mark_seen(channel_id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::Offset;
    use mockito::Server;

    use homehelper_shared::error::FetchError;
    use homehelper_shared::mentions::MemberRoster;
    use homehelper_shared::protocol::{ChatMessage, ChatUser, RenovationDetails};
    use homehelper_shared::types::{Direction, RenovationId, UserId};

    use crate::api::{Cursor, HttpChatApi};

    fn mention(channel: i64, at: &str) -> MentionNotification {
        MentionNotification {
            renovation_details: RenovationDetails {
                id: RenovationId(3),
                name: "Kitchen".into(),
            },
            channel_id: ChannelId(channel),
            channel_name: format!("channel-{channel}"),
            sender: ChatUser {
                id: UserId(2),
                first_name: "Grace".into(),
                last_name: "Hopper".into(),
                image: String::new(),
            },
            message_content: "hey @Ada".into(),
            timestamp: at.parse().unwrap(),
        }
    }

    fn session(open: Option<i64>) -> SessionContext {
        SessionContext {
            user_id: UserId(1),
            renovation_id: RenovationId(3),
            channel_id: open.map(ChannelId),
            roster: MemberRoster::default(),
            mention_time: None,
            utc_offset: Utc.fix(),
        }
    }

    #[derive(Default)]
    struct SeenApi {
        calls: Mutex<Vec<ChannelId>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl ChatApi for SeenApi {
        async fn history(&self, _: ChannelId) -> Result<Vec<ChatMessage>, FetchError> {
            Ok(Vec::new())
        }

        async fn page(&self, _: ChannelId, _: Direction, _: Cursor) -> Result<Vec<ChatMessage>, FetchError> {
            Ok(Vec::new())
        }

        async fn around(&self, _: ChannelId, _: DateTime<Utc>) -> Result<Vec<ChatMessage>, FetchError> {
            Ok(Vec::new())
        }

        async fn mark_seen(&self, channel: ChannelId) -> Result<(), FetchError> {
            self.calls.lock().unwrap().push(channel);
            if self.fail.load(Ordering::SeqCst) {
                return Err(FetchError::Request("offline".into()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_inbox_indicator_follows_entries() {
        let mut inbox = MentionInbox::new(Vec::new());
        assert!(!inbox.has_unread());

        inbox.push_live(mention(4, "2025-01-01T10:00:00Z"));
        inbox.push_live(mention(5, "2025-01-01T11:00:00Z"));
        inbox.push_live(mention(4, "2025-01-01T12:00:00Z"));
        assert!(inbox.has_unread());
        assert_eq!(inbox.entries()[0].timestamp.to_rfc3339(), "2025-01-01T12:00:00+00:00");

        assert_eq!(inbox.remove_channel(ChannelId(4)), 2);
        assert!(inbox.has_unread());
        assert_eq!(inbox.remove_channel(ChannelId(9)), 0);
        assert_eq!(inbox.remove_channel(ChannelId(5)), 1);
        assert!(!inbox.has_unread());
    }

    #[test]
    fn test_redirect_path() {
        let entry = mention(4, "2025-03-01T10:00:00.123Z");
        assert_eq!(
            redirect_path(&entry),
            "/renovation/3/chat/4?mentionTime=2025-03-01T10:00:00.123Z"
        );
        assert_eq!(
            relative_time(&entry, "2025-03-01T10:05:00Z".parse().unwrap()),
            "4 mins ago"
        );
    }

    #[tokio::test]
    async fn test_live_mention_elsewhere_goes_to_inbox() {
        let api = Arc::new(SeenApi::default());
        let controller = MentionController::new(api.clone(), session(Some(7)), Vec::new());

        let payload = serde_json::to_value(mention(4, "2025-01-01T10:00:00Z")).unwrap();
        assert!(controller.on_mention(payload).is_none());

        let inbox = controller.snapshot();
        assert_eq!(inbox.len(), 1);
        assert!(inbox.has_unread());
        assert!(api.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_live_mention_in_open_channel_is_marked_seen() {
        let api = Arc::new(SeenApi::default());
        let controller = MentionController::new(
            api.clone(),
            session(Some(7)),
            vec![mention(7, "2025-01-01T09:00:00Z"), mention(8, "2025-01-01T09:30:00Z")],
        );

        let payload = serde_json::to_value(mention(7, "2025-01-01T10:00:00Z")).unwrap();
        controller.on_mention(payload).unwrap().await.unwrap();

        assert_eq!(*api.calls.lock().unwrap(), vec![ChannelId(7)]);
        let inbox = controller.snapshot();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox.entries()[0].channel_id, ChannelId(8));
        assert!(inbox.has_unread());
    }

    #[tokio::test]
    async fn test_failed_mark_seen_keeps_inbox() {
        let api = Arc::new(SeenApi::default());
        api.fail.store(true, Ordering::SeqCst);
        let controller = MentionController::new(
            api.clone(),
            session(Some(7)),
            vec![mention(7, "2025-01-01T09:00:00Z")],
        );

        controller.on_page_open().await;

        assert_eq!(controller.snapshot().len(), 1);
        assert!(controller.snapshot().has_unread());
    }

    #[tokio::test]
    async fn test_undecodable_mention_is_dropped() {
        let controller = MentionController::new(SeenApi::default(), session(None), Vec::new());
        assert!(controller.on_mention(serde_json::json!({"channelId": "x"})).is_none());
        assert!(controller.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_page_open_marks_seen_over_http() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/mark-seen/7")
            .match_header("X-CSRF-TOKEN", "tok")
            .with_status(200)
            .create_async()
            .await;
        let api = HttpChatApi::new(&server.url()).with_csrf("X-CSRF-TOKEN", "tok");
        let controller = MentionController::new(
            api,
            session(Some(7)),
            vec![mention(7, "2025-01-01T09:00:00Z"), mention(7, "2025-01-01T09:10:00Z")],
        );

        controller.on_page_open().await;

        m.assert_async().await;
        let inbox = controller.snapshot();
        assert!(inbox.is_empty());
        assert!(!inbox.has_unread());
    }
}
