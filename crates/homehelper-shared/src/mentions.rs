use serde::{Deserialize, Serialize};

use crate::constants::{ASSISTANT_FIRST_NAME, MENTION_TERMINATORS};
use crate::protocol::Mention;
use crate::types::UserId;

/// A member of the open channel, as injected into the chat page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: UserId,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub image: String,
}

impl Member {
    /// First and last name joined by a space, skipping an empty last name.
    pub fn full_name(&self) -> String {
        if self.last_name.is_empty() {
            self.first_name.clone()
        } else {
            format!("{} {}", self.first_name, self.last_name)
        }
    }

    fn is_assistant(&self) -> bool {
        self.first_name == ASSISTANT_FIRST_NAME
    }
}

/// Channel members in mention precedence order.
///
/// The assistant is always first, everyone else follows alphabetically by
/// full name. When two names could match at the same `@`, the one earlier in
/// this order wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberRoster {
    members: Vec<Member>,
}

impl MemberRoster {
    pub fn new(mut members: Vec<Member>) -> Self {
        members.sort_by(|a, b| match (a.is_assistant(), b.is_assistant()) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            _ => a
                .full_name()
                .to_lowercase()
                .cmp(&b.full_name().to_lowercase()),
        });
        Self { members }
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Scan `text` for `@Full Name` references to roster members.
    ///
    /// Matching is case-sensitive and a name only counts when followed by the
    /// end of the text, whitespace, or a mention terminator. Positions are
    /// character indices; matches never overlap.
    pub fn mentions_in(&self, text: &str) -> Vec<Mention> {
        let names: Vec<(UserId, Vec<char>)> = self
            .members
            .iter()
            .map(|m| (m.id, m.full_name().chars().collect::<Vec<char>>()))
            .filter(|(_, name)| !name.is_empty())
            .collect();
        if names.is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let mut mentions = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            if chars[i] != '@' {
                i += 1;
                continue;
            }

            let rest = &chars[i + 1..];
            let hit = names.iter().find(|(_, name)| {
                rest.starts_with(name)
                    && rest
                        .get(name.len())
                        .map_or(true, |c| c.is_whitespace() || MENTION_TERMINATORS.contains(c))
            });

            match hit {
                Some((user_id, name)) => {
                    mentions.push(Mention {
                        user_id: *user_id,
                        start_position: i,
                        end_position: i + name.len(),
                    });
                    i += 1 + name.len();
                }
                None => i += 1,
            }
        }

        mentions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: i64, first: &str, last: &str) -> Member {
        Member {
            id: UserId(id),
            first_name: first.into(),
            last_name: last.into(),
            email: String::new(),
            image: String::new(),
        }
    }

    fn roster() -> MemberRoster {
        MemberRoster::new(vec![
            member(3, "zoe", "Adams"),
            member(2, "Bob", "Smith"),
            member(9, "BrickAI", ""),
            member(4, "Bob", "Smithers"),
        ])
    }

    #[test]
    fn test_roster_order() {
        let order: Vec<_> = roster().members().iter().map(|m| m.id.0).collect();
        assert_eq!(order, vec![9, 2, 4, 3]);
    }

    #[test]
    fn test_mention_positions_are_char_indices() {
        let text = "héllo @Bob Smith, and @BrickAI!";
        let mentions = roster().mentions_in(text);
        assert_eq!(
            mentions,
            vec![
                Mention {
                    user_id: UserId(2),
                    start_position: 6,
                    end_position: 15,
                },
                Mention {
                    user_id: UserId(9),
                    start_position: 22,
                    end_position: 29,
                },
            ]
        );
    }

    #[test]
    fn test_mention_requires_terminator() {
        let roster = roster();
        // "Bob Smith" is followed by "ers", so only the longer name can match.
        let mentions = roster.mentions_in("@Bob Smithers");
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].user_id, UserId(4));

        assert!(roster.mentions_in("@Bob Smithy").is_empty());
        assert!(roster.mentions_in("@bob smith").is_empty());
    }

    #[test]
    fn test_adjacent_mentions() {
        let mentions = roster().mentions_in("@BrickAI@Bob Smith");
        let ids: Vec<_> = mentions.iter().map(|m| m.user_id.0).collect();
        assert_eq!(ids, vec![9, 2]);
        assert_eq!(mentions[1].start_position, 8);
    }

    #[test]
    fn test_empty_roster_finds_nothing() {
        assert!(MemberRoster::default().mentions_in("@Bob Smith").is_empty());
    }
}
