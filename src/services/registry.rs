use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::Chat,
    store::{Collections, Db},
};

/// Chat lifecycle and membership.
///
/// Called by the meetup management layer when meetups are created, joined,
/// or deleted. Each meetup is bound to at most one chat.
pub struct ChatRegistry {
    db: Db,
}

impl ChatRegistry {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_chat(
        &self,
        meetup_id: Uuid,
        name: &str,
        description: Option<String>,
        participant_ids: Vec<Uuid>,
    ) -> AppResult<Chat> {
        let mut db = self.db.write().await;

        if db.chat_by_meetup.contains_key(&meetup_id) {
            return Err(AppError::ChatAlreadyExists);
        }

        let now = Utc::now();
        let chat = Chat {
            id: Uuid::new_v4(),
            meetup_id,
            name: name.to_string(),
            description,
            participant_ids: participant_ids.into_iter().collect::<BTreeSet<_>>(),
            created_at: now,
            last_message_at: now,
        };

        db.chat_by_meetup.insert(meetup_id, chat.id);
        db.chats.insert(chat.id, chat.clone());

        Ok(chat)
    }

    pub async fn chat_for_meetup(&self, meetup_id: Uuid) -> AppResult<Chat> {
        let db = self.db.read().await;
        let chat_id = db
            .chat_by_meetup
            .get(&meetup_id)
            .copied()
            .ok_or(AppError::ChatNotFound)?;
        db.chat(chat_id).cloned()
    }

    pub async fn get_chat(&self, chat_id: Uuid) -> AppResult<Chat> {
        let db = self.db.read().await;
        db.chat(chat_id).cloned()
    }

    /// Add a member to a chat. A no-op if they already belong.
    ///
    /// New members receive receipts for future messages only; nothing is
    /// backfilled for history that predates them.
    pub async fn add_participant(&self, chat_id: Uuid, user_id: Uuid) -> AppResult<Chat> {
        let mut db = self.db.write().await;
        let chat = db.chat_mut(chat_id)?;
        chat.participant_ids.insert(user_id);
        Ok(chat.clone())
    }

    /// Advance the chat's last-activity marker. Timestamps older than the
    /// current value are ignored.
    pub async fn touch_activity(&self, chat_id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        let mut db = self.db.write().await;
        Self::touch_in(&mut db, chat_id, at)
    }

    pub(crate) fn touch_in(db: &mut Collections, chat_id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        let chat = db.chat_mut(chat_id)?;
        if at > chat.last_message_at {
            chat.last_message_at = at;
        }
        Ok(())
    }

    /// Meetup deletion cascade: removes the chat together with its message
    /// log and every receipt attached to those messages.
    pub async fn remove_chat_for_meetup(&self, meetup_id: Uuid) -> AppResult<()> {
        let mut db = self.db.write().await;
        let chat_id = db
            .chat_by_meetup
            .remove(&meetup_id)
            .ok_or(AppError::ChatNotFound)?;
        db.chats.remove(&chat_id);

        if let Some(message_ids) = db.chat_messages.remove(&chat_id) {
            for message_id in &message_ids {
                db.messages.remove(message_id);
            }
            db.receipts
                .retain(|(message_id, _), _| !message_ids.contains(message_id));
        }

        tracing::info!("Removed chat {} for meetup {}", chat_id, meetup_id);
        Ok(())
    }
}
