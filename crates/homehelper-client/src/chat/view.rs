//! Presentation seam for the chat transcript.
//!
//! The controller only talks to a `ChatView`; `TranscriptView` keeps the
//! rendered entries in memory with fixed row heights so scroll geometry can
//! be reasoned about without a real layout engine.

use chrono::NaiveDate;

use homehelper_shared::protocol::ChatMessage;

/// Scroll geometry of the message container, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl Viewport {
    pub fn distance_from_bottom(&self) -> f64 {
        self.scroll_height - self.scroll_top - self.client_height
    }

    pub fn is_at_bottom(&self, epsilon: f64) -> bool {
        self.distance_from_bottom().abs() < epsilon
    }
}

/// Vertical placement of one rendered entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementBounds {
    pub top: f64,
    pub height: f64,
}

impl ElementBounds {
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollAction {
    Stay,
    ToBottom,
    To(f64),
}

/// Where to scroll so that `element` is on screen.
///
/// Nothing moves when the element is already fully visible. Close to the end
/// of the transcript the view snaps to the bottom; otherwise the element is
/// centred.
pub fn reveal(viewport: Viewport, element: ElementBounds) -> ScrollAction {
    let visible_bottom = viewport.scroll_top + viewport.client_height;
    if element.top >= viewport.scroll_top && element.bottom() <= visible_bottom {
        return ScrollAction::Stay;
    }

    let half = viewport.client_height / 2.0;
    if viewport.scroll_height - element.bottom() < half {
        ScrollAction::ToBottom
    } else {
        ScrollAction::To(element.top - half + element.height / 2.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayMessage {
    pub message: ChatMessage,
    /// `3:45 pm` for today, `11/08/25 10:00 am` otherwise.
    pub time_label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatEntry {
    DateSeparator(NaiveDate),
    Message(DisplayMessage),
}

impl ChatEntry {
    pub fn is_separator(&self) -> bool {
        matches!(self, ChatEntry::DateSeparator(_))
    }

    pub fn message(&self) -> Option<&ChatMessage> {
        match self {
            ChatEntry::Message(display) => Some(&display.message),
            ChatEntry::DateSeparator(_) => None,
        }
    }
}

pub trait ChatView: Send + 'static {
    fn clear(&mut self);

    fn append(&mut self, entry: ChatEntry);

    /// Insert `entries` above everything rendered, in one layout pass.
    fn prepend_batch(&mut self, entries: Vec<ChatEntry>);

    /// Drop the first entry if it is a date separator.
    fn remove_leading_separator(&mut self) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn viewport(&self) -> Viewport;

    fn element_bounds(&self, index: usize) -> Option<ElementBounds>;

    fn scroll_to(&mut self, top: f64);

    fn scroll_to_bottom(&mut self);
}

pub const SEPARATOR_HEIGHT_PX: f64 = 32.0;
pub const MESSAGE_HEIGHT_PX: f64 = 64.0;

/// In-memory transcript.
///
/// Prepending keeps the entries that were on screen in place by shifting the
/// scroll offset by the inserted height.
#[derive(Debug, Clone)]
pub struct TranscriptView {
    entries: Vec<ChatEntry>,
    client_height: f64,
    scroll_top: f64,
}

impl TranscriptView {
    pub fn new(client_height: f64) -> Self {
        Self {
            entries: Vec::new(),
            client_height,
            scroll_top: 0.0,
        }
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    /// Ids of the rendered messages, top to bottom.
    pub fn message_ids(&self) -> Vec<i64> {
        self.entries
            .iter()
            .filter_map(ChatEntry::message)
            .map(|m| m.id.0)
            .collect()
    }

    pub fn separator_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_separator()).count()
    }

    fn height_of(entry: &ChatEntry) -> f64 {
        match entry {
            ChatEntry::DateSeparator(_) => SEPARATOR_HEIGHT_PX,
            ChatEntry::Message(_) => MESSAGE_HEIGHT_PX,
        }
    }

    fn content_height(&self) -> f64 {
        self.entries.iter().map(Self::height_of).sum()
    }

    fn max_scroll_top(&self) -> f64 {
        (self.content_height() - self.client_height).max(0.0)
    }
}

impl ChatView for TranscriptView {
    fn clear(&mut self) {
        self.entries.clear();
        self.scroll_top = 0.0;
    }

    fn append(&mut self, entry: ChatEntry) {
        self.entries.push(entry);
    }

    fn prepend_batch(&mut self, entries: Vec<ChatEntry>) {
        let added: f64 = entries.iter().map(Self::height_of).sum();
        self.entries.splice(0..0, entries);
        self.scroll_to(self.scroll_top + added);
    }

    fn remove_leading_separator(&mut self) -> bool {
        if !self.entries.first().is_some_and(ChatEntry::is_separator) {
            return false;
        }
        self.entries.remove(0);
        self.scroll_to(self.scroll_top - SEPARATOR_HEIGHT_PX);
        true
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn viewport(&self) -> Viewport {
        Viewport {
            scroll_top: self.scroll_top,
            scroll_height: self.content_height().max(self.client_height),
            client_height: self.client_height,
        }
    }

    fn element_bounds(&self, index: usize) -> Option<ElementBounds> {
        let entry = self.entries.get(index)?;
        let top = self.entries[..index].iter().map(Self::height_of).sum();
        Some(ElementBounds {
            top,
            height: Self::height_of(entry),
        })
    }

    fn scroll_to(&mut self, top: f64) {
        self.scroll_top = top.clamp(0.0, self.max_scroll_top());
    }

    fn scroll_to_bottom(&mut self) {
        self.scroll_top = self.max_scroll_top();
    }
}
