//! Chat messages exchanged inside a room.

use serde::{Deserialize, Serialize};

/// Author of a chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageAuthor {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumb: Option<String>,
}

/// A chat message (`new_message` payload)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub msg: String,
    pub user: MessageAuthor,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
}

fn default_kind() -> String {
    "message".to_string()
}

impl Message {
    /// Message typed by the local user, shown before the relay echoes anything
    pub fn local(msg: impl Into<String>, thumb: Option<String>) -> Self {
        Self {
            msg: msg.into(),
            user: MessageAuthor {
                username: "You".to_string(),
                thumb,
            },
            kind: default_kind(),
        }
    }
}
