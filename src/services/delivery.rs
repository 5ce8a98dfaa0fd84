use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use ulid::Ulid;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Message, Receipt, ReceiptType},
    store::{Collections, Db},
};

/// Per-recipient receipt fan-out and state transitions.
///
/// Each (message, recipient) pair moves strictly forward through
/// pending, delivered, read. A read acknowledgement backfills the
/// delivered timestamp, and no transition ever regresses.
pub struct DeliveryTracker {
    db: Db,
}

impl DeliveryTracker {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Create one receipt per participant of the message's chat, within the
    /// caller's write transaction. The sender's own receipt starts
    /// delivered and read at the message's creation time.
    pub(crate) fn materialize_in(
        db: &mut Collections,
        message: &Message,
        participant_ids: &BTreeSet<Uuid>,
    ) {
        for &user_id in participant_ids {
            let at = (user_id == message.sender_id).then_some(message.created_at);
            db.receipts.insert(
                (message.id, user_id),
                Receipt {
                    message_id: message.id,
                    user_id,
                    delivered_at: at,
                    read_at: at,
                },
            );
        }
    }

    /// Advance a recipient's receipt. Idempotent: re-applying the same or a
    /// lower state leaves the stored timestamps untouched. Writers
    /// serialize on the store lock, so racing acknowledgements cannot
    /// regress one another.
    pub async fn advance(
        &self,
        message_id: Ulid,
        user_id: Uuid,
        to: ReceiptType,
        now: DateTime<Utc>,
    ) -> AppResult<Receipt> {
        let mut db = self.db.write().await;
        let receipt = db
            .receipts
            .get_mut(&(message_id, user_id))
            .ok_or(AppError::ReceiptNotFound)?;

        match to {
            ReceiptType::Delivered => {
                if receipt.delivered_at.is_none() {
                    receipt.delivered_at = Some(now);
                }
            }
            ReceiptType::Read => {
                if receipt.read_at.is_none() {
                    receipt.read_at = Some(now);
                    // A read message is never shown as merely delivered.
                    if receipt.delivered_at.is_none() {
                        receipt.delivered_at = Some(now);
                    }
                }
            }
        }

        Ok(receipt.clone())
    }

    /// The viewer's own receipt for a message, if one was materialized for
    /// them at send time.
    pub async fn status_for(&self, message_id: Ulid, user_id: Uuid) -> AppResult<Option<Receipt>> {
        let db = self.db.read().await;
        db.message(message_id)?;
        Ok(db.receipts.get(&(message_id, user_id)).cloned())
    }

    /// Whether the viewer should acknowledge delivery of this message.
    ///
    /// False for the sender's own messages and for messages that predate
    /// the viewer's membership (no receipt row exists to advance).
    pub fn needs_delivery_update(
        message: &Message,
        viewer_id: Uuid,
        receipt: Option<&Receipt>,
    ) -> bool {
        message.sender_id != viewer_id && receipt.is_some_and(|r| r.delivered_at.is_none())
    }
}
