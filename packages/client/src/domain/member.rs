//! Room members and the roster the relay broadcasts.

use serde::{Deserialize, Serialize};

/// A member of a room as the relay describes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    /// Relay-assigned user id, unique within a room
    pub id: String,
    /// Display name
    #[serde(default)]
    pub username: String,
    /// Avatar reference (thumbnail URL)
    #[serde(default, alias = "thumb", skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Whether the relay currently considers this member the host
    #[serde(default)]
    pub is_host: bool,
}

impl Member {
    /// Create a member that only carries an id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: String::new(),
            avatar_url: None,
            is_host: false,
        }
    }

    /// Set the display name
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Mark the member as host
    #[must_use]
    pub fn as_host(mut self) -> Self {
        self.is_host = true;
        self
    }

    /// Name to show in the UI, falling back to the id
    pub fn display_name(&self) -> &str {
        if self.username.is_empty() {
            &self.id
        } else {
            &self.username
        }
    }
}

/// Ordered set of members keyed by id.
///
/// The roster is always the relay's last broadcast: it is replaced wholesale and
/// never edited member by member.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Roster {
    members: Vec<Member>,
}

impl Roster {
    /// Replace the roster with the relay-provided list.
    ///
    /// Order is preserved. A repeated id keeps its first occurrence.
    pub fn replace(&mut self, members: Vec<Member>) {
        let mut deduped: Vec<Member> = Vec::with_capacity(members.len());
        for member in members {
            if deduped.iter().any(|m| m.id == member.id) {
                tracing::warn!("Relay roster repeats member '{}', keeping first", member.id);
                continue;
            }
            deduped.push(member);
        }
        self.members = deduped;
    }

    pub fn clear(&mut self) {
        self.members.clear();
    }

    pub fn get(&self, id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.id == id)
    }

    pub fn find_by_username(&self, username: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.username == username)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// First member flagged as host by the relay
    pub fn flagged_host(&self) -> Option<&Member> {
        self.members.iter().find(|m| m.is_host)
    }

    /// Move the host flag to `id`; other members lose it
    pub fn mark_host(&mut self, id: &str) {
        for member in &mut self.members {
            member.is_host = member.id == id;
        }
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
