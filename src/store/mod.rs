use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use ulid::Ulid;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Chat, Message, Receipt},
};

/// Embedded indexed store backing all chat state.
///
/// A single writer lock spans every collection, so a mutation touching
/// several of them (message append plus receipt fan-out) commits as one
/// unit: readers observe either none of it or all of it.
#[derive(Clone, Default)]
pub struct Db {
    inner: Arc<RwLock<Collections>>,
}

impl Db {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn read(&self) -> RwLockReadGuard<'_, Collections> {
        self.inner.read().await
    }

    pub(crate) async fn write(&self) -> RwLockWriteGuard<'_, Collections> {
        self.inner.write().await
    }
}

pub struct Collections {
    pub chats: HashMap<Uuid, Chat>,
    pub chat_by_meetup: HashMap<Uuid, Uuid>,
    pub messages: HashMap<Ulid, Message>,
    /// Message ids per chat, kept in id order (creation order).
    pub chat_messages: HashMap<Uuid, BTreeSet<Ulid>>,
    pub receipts: HashMap<(Ulid, Uuid), Receipt>,
    ids: ulid::Generator,
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            chats: HashMap::new(),
            chat_by_meetup: HashMap::new(),
            messages: HashMap::new(),
            chat_messages: HashMap::new(),
            receipts: HashMap::new(),
            ids: ulid::Generator::new(),
        }
    }
}

impl Collections {
    pub fn chat(&self, chat_id: Uuid) -> AppResult<&Chat> {
        self.chats.get(&chat_id).ok_or(AppError::ChatNotFound)
    }

    pub fn chat_mut(&mut self, chat_id: Uuid) -> AppResult<&mut Chat> {
        self.chats.get_mut(&chat_id).ok_or(AppError::ChatNotFound)
    }

    pub fn message(&self, message_id: Ulid) -> AppResult<&Message> {
        self.messages
            .get(&message_id)
            .ok_or(AppError::MessageNotFound)
    }

    /// Next message id. Ids are generated monotonically under the writer
    /// lock, so later appends always sort after earlier ones.
    pub fn next_message_id(&mut self) -> AppResult<Ulid> {
        self.ids
            .generate()
            .map_err(|_| AppError::Internal(anyhow!("message id overflow within one millisecond")))
    }

    /// Insert into the message arena and the per-chat index.
    pub fn insert_message(&mut self, message: Message) {
        self.chat_messages
            .entry(message.chat_id)
            .or_default()
            .insert(message.id);
        self.messages.insert(message.id, message);
    }
}
