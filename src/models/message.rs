use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;
use uuid::Uuid;

/// An immutable entry in a chat's message log.
///
/// Ids are ULIDs assigned at append time and sort by creation order, so a
/// message id doubles as a pagination cursor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Ulid,
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A message joined with the viewer's own receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageWithReceipt {
    #[serde(flatten)]
    pub message: Message,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub needs_delivery_update: bool,
}

/// One page of a chat's history, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePage {
    pub messages: Vec<MessageWithReceipt>,
    pub has_more: bool,
}
