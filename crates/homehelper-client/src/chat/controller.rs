//! The chat controller: owns one window and its view, merges live pushes with
//! paginated history in both directions.
//!
//! Window and view sit behind one mutex that is never held across an await.
//! Every network call is tagged: pagination with the window generation it was
//! issued under, full reloads with a sequence number. Answers that no longer
//! match are dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use homehelper_shared::constants::{AT_BOTTOM_EPSILON_PX, LAZY_LOAD_THRESHOLD_PX};
use homehelper_shared::dates::{calendar_date, format_message_date, is_different_date};
use homehelper_shared::mentions::MemberRoster;
use homehelper_shared::protocol::ChatMessage;
use homehelper_shared::types::{ChannelId, Direction, UserId};

use crate::api::ChatApi;
use crate::chat::view::{reveal, ChatEntry, ChatView, DisplayMessage, ScrollAction, Viewport};
use crate::chat::window::{ChatWindow, LoadGate};
use crate::config::ClientConfig;
use crate::events::ChatEvent;
use crate::services::ChannelService;

#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub channel_id: ChannelId,
    /// Messages from this user always scroll into view.
    pub user_id: UserId,
    pub utc_offset: FixedOffset,
    /// Jump target for the first load instead of the latest messages.
    pub mention_time: Option<DateTime<Utc>>,
    pub lazy_load_threshold_px: f64,
    pub at_bottom_epsilon_px: f64,
}

impl ChatSettings {
    pub fn new(channel_id: ChannelId, user_id: UserId) -> Self {
        Self {
            channel_id,
            user_id,
            utc_offset: Utc.fix(),
            mention_time: None,
            lazy_load_threshold_px: LAZY_LOAD_THRESHOLD_PX,
            at_bottom_epsilon_px: AT_BOTTOM_EPSILON_PX,
        }
    }

    /// `None` when no chat channel is open.
    pub fn from_config(config: &ClientConfig) -> Option<Self> {
        let channel_id = config.channel_id?;
        Some(Self {
            utc_offset: config.utc_offset,
            mention_time: config.mention_time,
            lazy_load_threshold_px: config.lazy_load_threshold_px,
            at_bottom_epsilon_px: config.at_bottom_epsilon_px,
            ..Self::new(channel_id, config.user_id)
        })
    }
}

/// Directions to paginate given the current scroll position.
pub fn directions_near_edges(viewport: Viewport, threshold: f64) -> Vec<Direction> {
    let mut directions = Vec::new();
    if viewport.scroll_top <= threshold {
        directions.push(Direction::Previous);
    }
    if viewport.distance_from_bottom() <= threshold {
        directions.push(Direction::Next);
    }
    directions
}

#[derive(Debug, Clone, Copy)]
enum Reload {
    Latest,
    Around(DateTime<Utc>),
}

struct State<V> {
    window: ChatWindow,
    view: V,
}

impl<V: ChatView> State<V> {
    /// Append one message below everything rendered, preceded by a date
    /// separator when its calendar day differs from the last appended one.
    ///
    /// With `follow`, the view sticks to the bottom if it was already there or
    /// the message is the user's own.
    fn append(&mut self, message: ChatMessage, settings: &ChatSettings, follow: bool) {
        let offset = &settings.utc_offset;
        let was_at_bottom = self.view.viewport().is_at_bottom(settings.at_bottom_epsilon_px);

        let new_day = self
            .window
            .last()
            .map_or(true, |last| is_different_date(last.date, message.date, offset));
        if new_day {
            self.view
                .append(ChatEntry::DateSeparator(calendar_date(message.date, offset)));
        }

        let own = message.user.id == settings.user_id;
        self.view.append(display(message.clone(), offset));
        self.window.record_append(message);

        if follow && (own || was_at_bottom) {
            self.view.scroll_to_bottom();
        }
    }

    /// Splice an older block, oldest first, above the rendered transcript.
    ///
    /// The separator heading the old top block is rebuilt: it reappears only
    /// when the old top message starts a different day than the newest
    /// message of the block.
    fn splice_previous(&mut self, messages: Vec<ChatMessage>, offset: &FixedOffset) {
        let (Some(oldest), Some(newest)) = (messages.first(), messages.last()) else {
            return;
        };
        let oldest = oldest.clone();

        let mut entries = Vec::with_capacity(messages.len() * 2 + 1);
        entries.push(ChatEntry::DateSeparator(calendar_date(oldest.date, offset)));
        for (i, message) in messages.iter().enumerate() {
            entries.push(display(message.clone(), offset));
            if let Some(following) = messages.get(i + 1) {
                if is_different_date(message.date, following.date, offset) {
                    entries.push(ChatEntry::DateSeparator(calendar_date(following.date, offset)));
                }
            }
        }
        if let Some(top) = self.window.top() {
            if is_different_date(newest.date, top.date, offset) {
                entries.push(ChatEntry::DateSeparator(calendar_date(top.date, offset)));
            }
        }

        self.view.remove_leading_separator();
        self.view.prepend_batch(entries);
        self.window.set_top(oldest);
    }
}

fn display(message: ChatMessage, offset: &FixedOffset) -> ChatEntry {
    let time_label = format_message_date(message.date, Utc::now(), offset);
    ChatEntry::Message(DisplayMessage {
        message,
        time_label,
    })
}

/// Server batches arrive newest first or oldest first depending on the
/// endpoint; replay always goes oldest first. Messages sharing a timestamp
/// are ordered by id, the server's own tie-break.
fn sort_chronological(messages: &mut [ChatMessage]) {
    messages.sort_by_key(|m| (m.date, m.id));
}

struct Composer {
    channel: ChannelService,
    roster: MemberRoster,
}

struct Inner<V, A> {
    settings: ChatSettings,
    api: A,
    state: Mutex<State<V>>,
    reload_seq: AtomicU64,
    composer: OnceLock<Composer>,
}

pub struct ChatController<V, A> {
    inner: Arc<Inner<V, A>>,
}

impl<V, A> Clone for ChatController<V, A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Holds the in-flight slot of one direction. Dropping it without calling
/// `complete` still releases the slot.
struct InFlight<'a, V: ChatView, A: ChatApi> {
    controller: &'a ChatController<V, A>,
    direction: Direction,
    generation: u64,
    armed: bool,
}

impl<V: ChatView, A: ChatApi> InFlight<'_, V, A> {
    fn complete(mut self, window: &mut ChatWindow) -> bool {
        self.armed = false;
        window.finish_load(self.direction, self.generation)
    }
}

impl<V: ChatView, A: ChatApi> Drop for InFlight<'_, V, A> {
    fn drop(&mut self) {
        if self.armed {
            self.controller
                .state()
                .window
                .finish_load(self.direction, self.generation);
        }
    }
}

impl<V: ChatView, A: ChatApi> ChatController<V, A> {
    pub fn new(settings: ChatSettings, api: A, view: V) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                api,
                state: Mutex::new(State {
                    window: ChatWindow::new(),
                    view,
                }),
                reload_seq: AtomicU64::new(0),
                composer: OnceLock::new(),
            }),
        }
    }

    /// Route `ChatEvent::Send` through `channel`, resolving mentions against
    /// `roster`. Only the first call has an effect.
    pub fn attach_composer(&self, channel: ChannelService, roster: MemberRoster) {
        if self.inner.composer.set(Composer { channel, roster }).is_err() {
            warn!(channel = %self.inner.settings.channel_id, "Composer already attached");
        }
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.inner.settings
    }

    pub fn with_view<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        f(&self.state().view)
    }

    pub fn with_view_mut<R>(&self, f: impl FnOnce(&mut V) -> R) -> R {
        f(&mut self.state().view)
    }

    pub fn with_window<R>(&self, f: impl FnOnce(&ChatWindow) -> R) -> R {
        f(&self.state().window)
    }

    fn state(&self) -> MutexGuard<'_, State<V>> {
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Handle a raw payload from the channel topic.
    pub fn on_incoming(&self, payload: Value) {
        match ChatMessage::from_value(payload) {
            Ok(message) => self.append_live(message),
            Err(e) => {
                warn!(channel = %self.inner.settings.channel_id, error = %e, "Dropping undecodable chat message");
            }
        }
    }

    pub fn append_live(&self, message: ChatMessage) {
        debug!(channel = %self.inner.settings.channel_id, id = %message.id, "Live message");
        self.state().append(message, &self.inner.settings, true);
    }

    /// Replace the window with the most recent messages.
    pub async fn load_message_history(&self) {
        self.reload(Reload::Latest).await;
    }

    /// Replace the window with the messages around `mention_time` and bring
    /// the middle one on screen.
    pub async fn pull_up_mention(&self, mention_time: DateTime<Utc>) {
        self.reload(Reload::Around(mention_time)).await;
    }

    async fn reload(&self, target: Reload) {
        let seq = self.inner.reload_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let settings = &self.inner.settings;
        let channel = settings.channel_id;

        let fetched = match target {
            Reload::Latest => self.inner.api.history(channel).await,
            Reload::Around(at) => self.inner.api.around(channel, at).await,
        };
        let mut messages = match fetched {
            Ok(messages) => messages,
            Err(e) => {
                warn!(channel = %channel, error = %e, "Failed to load messages");
                return;
            }
        };
        sort_chronological(&mut messages);

        let mut state = self.state();
        if self.inner.reload_seq.load(Ordering::SeqCst) != seq {
            debug!(channel = %channel, seq, "Reload superseded, dropping result");
            return;
        }

        state.window.reset();
        state.view.clear();
        for message in &messages {
            state.append(message.clone(), settings, true);
        }
        if let (Some(oldest), Some(newest)) = (messages.first(), messages.last()) {
            state.window.set_top(oldest.clone());
            state.window.set_bottom(newest.clone());
        }
        info!(channel = %channel, count = messages.len(), "Chat window loaded");

        if matches!(target, Reload::Around(_)) {
            let index = messages.len() / 2;
            let Some(bounds) = state.view.element_bounds(index) else {
                return;
            };
            match reveal(state.view.viewport(), bounds) {
                ScrollAction::Stay => {}
                ScrollAction::ToBottom => state.view.scroll_to_bottom(),
                ScrollAction::To(top) => state.view.scroll_to(top),
            }
        }
    }

    /// Fetch the next page in `direction`, at most one request per direction
    /// at a time.
    pub async fn load_messages(&self, direction: Direction) {
        let settings = &self.inner.settings;
        let channel = settings.channel_id;

        let gate = self.state().window.begin_load(direction);
        let (cursor, generation) = match gate {
            LoadGate::Proceed { cursor, generation } => (cursor, generation),
            LoadGate::NoEdge => {
                debug!(channel = %channel, %direction, "No edge message, direction exhausted");
                return;
            }
            LoadGate::Busy | LoadGate::Exhausted => return,
        };

        let in_flight = InFlight {
            controller: self,
            direction,
            generation,
            armed: true,
        };
        let fetched = self.inner.api.page(channel, direction, cursor).await;

        let mut state = self.state();
        if !in_flight.complete(&mut state.window) {
            debug!(channel = %channel, %direction, generation, "Discarding page for a reset window");
            return;
        }

        let mut messages = match fetched {
            Ok(messages) => messages,
            Err(e) => {
                warn!(channel = %channel, %direction, error = %e, "Failed to load page");
                return;
            }
        };
        if messages.is_empty() {
            debug!(channel = %channel, %direction, "No more messages");
            state.window.mark_exhausted(direction);
            return;
        }

        sort_chronological(&mut messages);
        debug!(channel = %channel, %direction, count = messages.len(), "Page loaded");
        match direction {
            Direction::Previous => state.splice_previous(messages, &settings.utc_offset),
            Direction::Next => {
                for message in messages {
                    state.append(message, settings, false);
                }
            }
        }
    }

    fn spawn_load(&self, direction: Direction) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { this.load_messages(direction).await })
    }

    /// Start pagination for every edge within the lazy-load threshold.
    pub fn on_scroll(&self, viewport: Viewport) -> Vec<JoinHandle<()>> {
        directions_near_edges(viewport, self.inner.settings.lazy_load_threshold_px)
            .into_iter()
            .map(|direction| self.spawn_load(direction))
            .collect()
    }

    /// Validate and publish composer input.
    pub fn send(&self, text: &str) {
        let channel = self.inner.settings.channel_id;
        let Some(composer) = self.inner.composer.get() else {
            warn!(channel = %channel, "No composer attached, message dropped");
            return;
        };
        if let Err(e) = composer.channel.send_text(channel, text, &composer.roster) {
            warn!(channel = %channel, error = %e, "Message not sent");
        }
    }

    async fn initial_load(&self) {
        match self.inner.settings.mention_time {
            Some(at) => self.pull_up_mention(at).await,
            None => self.load_message_history().await,
        }
    }

    /// Process events until `Shutdown` or until every sender is gone.
    ///
    /// Live messages are applied inline; network work is spawned so that both
    /// pagination directions and live delivery interleave.
    pub async fn run(self, mut events: mpsc::Receiver<ChatEvent>) {
        let channel = self.inner.settings.channel_id;
        info!(channel = %channel, "Chat controller started");

        while let Some(event) = events.recv().await {
            match event {
                ChatEvent::Incoming(payload) => self.on_incoming(payload),
                ChatEvent::Subscribed => {
                    let this = self.clone();
                    tokio::spawn(async move { this.initial_load().await });
                }
                ChatEvent::Scrolled(viewport) => {
                    self.on_scroll(viewport);
                }
                ChatEvent::LoadMore(direction) => {
                    self.spawn_load(direction);
                }
                ChatEvent::JumpTo(at) => {
                    let this = self.clone();
                    tokio::spawn(async move { this.pull_up_mention(at).await });
                }
                ChatEvent::Send(text) => self.send(&text),
                ChatEvent::Shutdown => break,
            }
        }

        info!(channel = %channel, "Chat controller stopped");
    }
}
