//! Window state of one open chat: cursors, pagination flags, generation.

use homehelper_shared::protocol::ChatMessage;
use homehelper_shared::types::Direction;

use crate::api::Cursor;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaginationState {
    pub loading: bool,
    pub exhausted: bool,
}

/// Outcome of asking to paginate in one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadGate {
    /// Request the page after `cursor`; the answer belongs to `generation`.
    Proceed { cursor: Cursor, generation: u64 },
    /// No edge message to paginate from. The direction is now exhausted.
    NoEdge,
    Busy,
    Exhausted,
}

#[derive(Debug, Default)]
pub struct ChatWindow {
    top: Option<ChatMessage>,
    bottom: Option<ChatMessage>,
    last: Option<ChatMessage>,
    previous: PaginationState,
    next: PaginationState,
    generation: u64,
}

impl ChatWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything and start a new generation. Responses to requests
    /// issued before the reset no longer apply.
    pub fn reset(&mut self) {
        let generation = self.generation.wrapping_add(1);
        *self = Self {
            generation,
            ..Self::default()
        };
    }

    /// Oldest rendered message.
    pub fn top(&self) -> Option<&ChatMessage> {
        self.top.as_ref()
    }

    /// Newest rendered message.
    pub fn bottom(&self) -> Option<&ChatMessage> {
        self.bottom.as_ref()
    }

    /// Most recently appended message, the reference for date separators.
    pub fn last(&self) -> Option<&ChatMessage> {
        self.last.as_ref()
    }

    pub fn state(&self, direction: Direction) -> PaginationState {
        match direction {
            Direction::Previous => self.previous,
            Direction::Next => self.next,
        }
    }

    fn state_mut(&mut self, direction: Direction) -> &mut PaginationState {
        match direction {
            Direction::Previous => &mut self.previous,
            Direction::Next => &mut self.next,
        }
    }

    fn edge(&self, direction: Direction) -> Option<&ChatMessage> {
        match direction {
            Direction::Previous => self.top.as_ref(),
            Direction::Next => self.bottom.as_ref(),
        }
    }

    /// Claim the single in-flight slot for `direction`.
    pub fn begin_load(&mut self, direction: Direction) -> LoadGate {
        let Some(cursor) = self.edge(direction).map(Cursor::of) else {
            self.state_mut(direction).exhausted = true;
            return LoadGate::NoEdge;
        };

        let generation = self.generation;
        let state = self.state_mut(direction);
        if state.loading {
            return LoadGate::Busy;
        }
        if state.exhausted {
            return LoadGate::Exhausted;
        }
        state.loading = true;
        LoadGate::Proceed { cursor, generation }
    }

    /// Release the in-flight slot taken by `begin_load`.
    ///
    /// Returns false when the window was reset in the meantime; the flags of
    /// the new generation are left alone and the response must be dropped.
    pub fn finish_load(&mut self, direction: Direction, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        self.state_mut(direction).loading = false;
        true
    }

    pub fn mark_exhausted(&mut self, direction: Direction) {
        self.state_mut(direction).exhausted = true;
    }

    pub fn record_append(&mut self, message: ChatMessage) {
        self.bottom = Some(message.clone());
        self.last = Some(message);
    }

    pub fn set_top(&mut self, message: ChatMessage) {
        self.top = Some(message);
    }

    pub fn set_bottom(&mut self, message: ChatMessage) {
        self.bottom = Some(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use homehelper_shared::protocol::ChatUser;
    use homehelper_shared::types::{MessageId, UserId};

    fn message(id: i64) -> ChatMessage {
        ChatMessage {
            id: MessageId(id),
            date: Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap(),
            user: ChatUser {
                id: UserId(1),
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                image: String::new(),
            },
            fragments: Vec::new(),
            ai: false,
        }
    }

    #[test]
    fn test_missing_edge_exhausts_direction() {
        let mut window = ChatWindow::new();
        assert_eq!(window.begin_load(Direction::Previous), LoadGate::NoEdge);
        assert!(window.state(Direction::Previous).exhausted);
        assert!(!window.state(Direction::Previous).loading);
        assert_eq!(window.begin_load(Direction::Previous), LoadGate::NoEdge);
    }

    #[test]
    fn test_single_in_flight_per_direction() {
        let mut window = ChatWindow::new();
        window.set_top(message(1));
        window.record_append(message(2));

        let LoadGate::Proceed { cursor, generation } = window.begin_load(Direction::Previous) else {
            panic!("expected to proceed");
        };
        assert_eq!(cursor.id, MessageId(1));
        assert_eq!(window.begin_load(Direction::Previous), LoadGate::Busy);
        assert!(matches!(
            window.begin_load(Direction::Next),
            LoadGate::Proceed { cursor, .. } if cursor.id == MessageId(2)
        ));

        assert!(window.finish_load(Direction::Previous, generation));
        window.mark_exhausted(Direction::Previous);
        assert_eq!(window.begin_load(Direction::Previous), LoadGate::Exhausted);
    }

    #[test]
    fn test_reset_invalidates_outstanding_loads() {
        let mut window = ChatWindow::new();
        window.set_top(message(1));
        let LoadGate::Proceed { generation, .. } = window.begin_load(Direction::Previous) else {
            panic!("expected to proceed");
        };

        window.reset();
        assert!(window.top().is_none());
        assert_eq!(window.state(Direction::Previous), PaginationState::default());

        window.set_top(message(5));
        assert!(matches!(window.begin_load(Direction::Previous), LoadGate::Proceed { .. }));
        assert!(!window.finish_load(Direction::Previous, generation));
        assert!(window.state(Direction::Previous).loading);
    }

    #[test]
    fn test_append_moves_bottom_and_last() {
        let mut window = ChatWindow::new();
        window.record_append(message(3));
        assert_eq!(window.bottom().map(|m| m.id), Some(MessageId(3)));
        assert_eq!(window.last().map(|m| m.id), Some(MessageId(3)));
        assert!(window.top().is_none());
    }
}
