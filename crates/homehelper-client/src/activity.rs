//! Live activity feed: the most recent renovation events, newest first.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use homehelper_shared::constants::ACTIVITY_FEED_LIMIT;
use homehelper_shared::dates::format_relative_time;
use homehelper_shared::protocol::ActivityItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    TaskAdded,
    TaskStateChanged,
    TaskEdited,
    BudgetEdited,
    ExpenseAdded,
    InviteAccepted,
    InviteDeclined,
    Other,
}

impl From<&str> for ActivityKind {
    fn from(activity_type: &str) -> Self {
        let upper = activity_type.to_uppercase();
        if upper.starts_with("TASK_CHANGED_FROM_") {
            return ActivityKind::TaskStateChanged;
        }
        match upper.as_str() {
            "TASK_ADDED" => ActivityKind::TaskAdded,
            "TASK_EDITED" => ActivityKind::TaskEdited,
            "BUDGET_EDITED" => ActivityKind::BudgetEdited,
            "EXPENSE_ADDED" => ActivityKind::ExpenseAdded,
            "INVITE_ACCEPTED" => ActivityKind::InviteAccepted,
            "INVITE_DECLINED" => ActivityKind::InviteDeclined,
            _ => ActivityKind::Other,
        }
    }
}

fn task_state_label(state: Option<&str>) -> &'static str {
    match state {
        Some("NOT_STARTED") => "Not Started",
        Some("IN_PROGRESS") => "In Progress",
        Some("BLOCKED") => "Blocked",
        Some("COMPLETED") => "Completed",
        Some("CANCELLED") => "Cancelled",
        _ => "",
    }
}

/// Display helpers for one feed entry.
pub trait ActivityItemExt {
    fn kind(&self) -> ActivityKind;

    /// Who did it: sender name, else email, else nothing.
    fn sender(&self) -> &str;

    /// Sentence describing the event, ending with the renovation name.
    /// Empty for unknown kinds.
    fn describe(&self) -> String;

    /// Page the entry links to.
    fn link_path(&self) -> String;

    fn relative_time(&self, now: DateTime<Utc>) -> String;
}

impl ActivityItemExt for ActivityItem {
    fn kind(&self) -> ActivityKind {
        ActivityKind::from(self.activity_type.as_str())
    }

    fn sender(&self) -> &str {
        self.sender_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("")
    }

    fn describe(&self) -> String {
        let task = self.task_name.as_deref().unwrap_or_default();
        let action = match self.kind() {
            ActivityKind::TaskAdded => format!("created a task '{task}' for "),
            ActivityKind::TaskStateChanged => format!(
                "changed task state '{task}' from {} → {} for ",
                task_state_label(self.old_state.as_deref()),
                task_state_label(self.new_state.as_deref()),
            ),
            ActivityKind::TaskEdited => format!("edited task '{task}' for "),
            ActivityKind::BudgetEdited => "edited budget for ".to_string(),
            ActivityKind::ExpenseAdded => format!(
                "added a ${} expense for '{}' to ",
                self.expense_amount.unwrap_or_default(),
                self.expense_name.as_deref().unwrap_or_default(),
            ),
            ActivityKind::InviteAccepted => "accepted your invitation to ".to_string(),
            ActivityKind::InviteDeclined => "declined your invitation to ".to_string(),
            ActivityKind::Other => return String::new(),
        };
        action + &self.renovation_name
    }

    fn link_path(&self) -> String {
        let renovation = format!("/renovation/{}", self.renovation_id);
        match self.kind() {
            ActivityKind::TaskAdded
            | ActivityKind::TaskEdited
            | ActivityKind::TaskStateChanged
            | ActivityKind::ExpenseAdded => match self.task_id {
                Some(task_id) => format!("{renovation}/tasks/{task_id}"),
                None => renovation,
            },
            ActivityKind::BudgetEdited => format!("{renovation}/budget"),
            ActivityKind::InviteAccepted | ActivityKind::InviteDeclined => {
                format!("{renovation}/members")
            }
            ActivityKind::Other => renovation,
        }
    }

    fn relative_time(&self, now: DateTime<Utc>) -> String {
        format_relative_time(self.timestamp, now)
    }
}

/// Bounded feed, newest first.
#[derive(Debug, Clone)]
pub struct ActivityFeed {
    items: VecDeque<ActivityItem>,
    limit: usize,
}

impl Default for ActivityFeed {
    fn default() -> Self {
        Self::with_limit(ACTIVITY_FEED_LIMIT)
    }
}

impl ActivityFeed {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(limit + 1),
            limit,
        }
    }

    /// Feed seeded with server-rendered items, already newest first.
    pub fn new(initial: Vec<ActivityItem>) -> Self {
        let mut feed = Self::default();
        for item in initial {
            feed.items.push_back(item);
            feed.trim();
        }
        feed
    }

    /// Add a live item on top.
    pub fn push_live(&mut self, item: ActivityItem) {
        self.items.push_front(item);
        self.trim();
    }

    fn trim(&mut self) {
        while self.items.len() > self.limit {
            self.items.pop_back();
        }
    }

    pub fn items(&self) -> impl Iterator<Item = &ActivityItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the "no recent activity" placeholder applies.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
