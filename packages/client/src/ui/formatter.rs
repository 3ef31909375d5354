//! Notice formatting for the console.

use lounge_shared::time::timestamp_to_local_rfc3339;

use crate::{
    domain::{Member, Message},
    session::{SessionNotice, SessionSnapshot},
};

const RULE: &str = "============================================================";

/// Formatter for console display
pub struct NoticeFormatter;

impl NoticeFormatter {
    /// Format a session notice
    ///
    /// # Arguments
    ///
    /// * `notice` - The notice to render
    /// * `at` - Unix timestamp when the notice was received (milliseconds)
    ///
    /// # Returns
    ///
    /// A formatted line, starting with a newline so it does not collide with the prompt
    pub fn format_notice(notice: &SessionNotice, at: i64) -> String {
        let time = timestamp_to_local_rfc3339(at);
        match notice {
            SessionNotice::Joined { identity, users } => format!(
                "\n* joined room '{}' on {} ({} users) at {}\n",
                identity.room, identity.server, users, time
            ),
            SessionNotice::Rejoined { identity, users } => format!(
                "\n* rejoined room '{}' ({} users) at {}\n",
                identity.room, users, time
            ),
            SessionNotice::RejoinFailed { identity, reason } => format!(
                "\n! could not rejoin room '{}': {}\n",
                identity.room, reason
            ),
            SessionNotice::UserJoined(member) => {
                format!("\n+ {} entered at {}\n", member.display_name(), time)
            }
            SessionNotice::UserLeft(member) => {
                format!("\n- {} left at {}\n", member.display_name(), time)
            }
            SessionNotice::HostChanged(member) => {
                format!("\n* {} is now the host\n", member.display_name())
            }
            SessionNotice::PartyPausingChanged(enabled) => format!(
                "\n* party pausing turned {}\n",
                if *enabled { "on" } else { "off" }
            ),
            SessionNotice::NewMessage(message) => Self::format_message(message, at),
            SessionNotice::ConnectionLost { reason, will_retry } => {
                let suffix = if *will_retry { ", retrying" } else { "" };
                format!("\n! connection lost: {}{}\n", reason, suffix)
            }
            SessionNotice::Reconnecting {
                attempt,
                max_attempts,
            } => format!("\n* reconnecting ({}/{})\n", attempt, max_attempts),
        }
    }

    /// Format a chat message
    ///
    /// # Arguments
    ///
    /// * `message` - The received message
    /// * `at` - Unix timestamp when the message was received (milliseconds)
    pub fn format_message(message: &Message, at: i64) -> String {
        format!(
            "\n\n------------------------------------------------------------\n\
             @{}: {}\n\
             received at {}\n\
             ------------------------------------------------------------\n",
            message.user.username,
            message.msg,
            timestamp_to_local_rfc3339(at)
        )
    }

    /// Format the room roster, marking the host and this client
    pub fn format_users(snapshot: &SessionSnapshot) -> String {
        let mut output = String::new();
        output.push_str("\n\n");
        output.push_str(RULE);
        output.push_str("\nUsers:\n");

        if snapshot.users.is_empty() {
            output.push_str("(No users)\n");
        } else {
            let me = snapshot.me.as_ref().map(|m| m.id.as_str());
            let host = snapshot.host_id.as_deref();
            for member in &snapshot.users {
                output.push_str(&Self::format_member(
                    member,
                    Some(member.id.as_str()) == host,
                    Some(member.id.as_str()) == me,
                ));
            }
        }

        output.push_str(&format!(
            "srtt {:.0}ms, party pausing {}\n",
            snapshot.srtt,
            if snapshot.party_pausing { "on" } else { "off" }
        ));
        output.push_str(RULE);
        output.push('\n');
        output
    }

    fn format_member(member: &Member, is_host: bool, is_me: bool) -> String {
        let host_suffix = if is_host { " (host)" } else { "" };
        let me_suffix = if is_me { " (me)" } else { "" };
        format!("{}{}{}\n", member.display_name(), host_suffix, me_suffix)
    }
}
