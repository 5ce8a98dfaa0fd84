use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chat bound to exactly one meetup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: Uuid,
    pub meetup_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub participant_ids: BTreeSet<Uuid>,
    pub created_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
}

impl Chat {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.participant_ids.contains(&user_id)
    }
}

/// Listing entry for a user's chats, newest activity first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSummary {
    #[serde(flatten)]
    pub chat: Chat,
    pub unread_count: i64,
    pub last_message: Option<super::Message>,
}
