use chrono::Utc;
use ulid::Ulid;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::Message,
    store::{Collections, Db},
};

use super::registry::ChatRegistry;

/// Append-only, ordered message log per chat.
pub struct MessageStore {
    db: Db,
}

impl MessageStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn append(&self, chat_id: Uuid, sender_id: Uuid, content: &str) -> AppResult<Message> {
        let mut db = self.db.write().await;
        Self::append_in(&mut db, chat_id, sender_id, content)
    }

    /// Append within a caller-held write transaction.
    ///
    /// Validation happens before the first mutation, so a failed append
    /// leaves the store untouched. The id is taken from the store's
    /// monotonic generator and the chat's last-activity marker advances in
    /// the same transaction.
    pub(crate) fn append_in(
        db: &mut Collections,
        chat_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> AppResult<Message> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::EmptyMessage);
        }

        // Server-assigned timestamp, never behind the chat's latest activity.
        let last_message_at = db.chat(chat_id)?.last_message_at;
        let created_at = Utc::now().max(last_message_at);

        let message = Message {
            id: db.next_message_id()?,
            chat_id,
            sender_id,
            content: content.to_string(),
            created_at,
        };
        db.insert_message(message.clone());
        ChatRegistry::touch_in(db, chat_id, created_at)?;

        Ok(message)
    }

    /// One page of history, newest first, strictly ordered by id descending.
    ///
    /// `before` is an exclusive upper bound. Because cursors are immutable
    /// message ids, appends racing a paginated scroll-back can never skip
    /// or duplicate a message within one cursor chain.
    pub async fn page(
        &self,
        chat_id: Uuid,
        limit: usize,
        before: Option<Ulid>,
    ) -> AppResult<(Vec<Message>, bool)> {
        let db = self.db.read().await;
        Self::page_in(&db, chat_id, limit, before)
    }

    pub(crate) fn page_in(
        db: &Collections,
        chat_id: Uuid,
        limit: usize,
        before: Option<Ulid>,
    ) -> AppResult<(Vec<Message>, bool)> {
        db.chat(chat_id)?;

        let Some(index) = db.chat_messages.get(&chat_id) else {
            return Ok((Vec::new(), false));
        };

        let mut ids = match before {
            Some(cursor) => index.range(..cursor),
            None => index.range(..),
        }
        .rev();

        let mut messages = Vec::new();
        for id in ids.by_ref().take(limit) {
            messages.push(db.message(*id)?.clone());
        }
        let has_more = ids.next().is_some();

        Ok((messages, has_more))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::registry::ChatRegistry;

    async fn chat_with_sender(db: &Db) -> (Uuid, Uuid) {
        let sender = Uuid::new_v4();
        let chat = ChatRegistry::new(db.clone())
            .create_chat(Uuid::new_v4(), "Dinner", None, vec![sender])
            .await
            .unwrap();
        (chat.id, sender)
    }

    #[tokio::test]
    async fn rejects_blank_content() {
        let db = Db::new();
        let (chat_id, sender) = chat_with_sender(&db).await;
        let store = MessageStore::new(db);

        for content in ["", "   ", "\n\t"] {
            let err = store.append(chat_id, sender, content).await.unwrap_err();
            assert!(matches!(err, AppError::EmptyMessage));
        }
    }

    #[tokio::test]
    async fn trims_content_and_advances_activity() {
        let db = Db::new();
        let (chat_id, sender) = chat_with_sender(&db).await;
        let store = MessageStore::new(db.clone());

        let message = store.append(chat_id, sender, "  hello  ").await.unwrap();
        assert_eq!(message.content, "hello");

        let chat = ChatRegistry::new(db).get_chat(chat_id).await.unwrap();
        assert_eq!(chat.last_message_at, message.created_at);
    }

    #[tokio::test]
    async fn ids_are_strictly_increasing() {
        let db = Db::new();
        let (chat_id, sender) = chat_with_sender(&db).await;
        let store = MessageStore::new(db);

        let mut previous = None;
        for i in 0..100 {
            let message = store
                .append(chat_id, sender, &format!("msg {i}"))
                .await
                .unwrap();
            if let Some(previous) = previous {
                assert!(message.id > previous);
            }
            previous = Some(message.id);
        }
    }

    #[tokio::test]
    async fn pages_newest_first_with_exclusive_cursor() {
        let db = Db::new();
        let (chat_id, sender) = chat_with_sender(&db).await;
        let store = MessageStore::new(db);

        let mut sent = Vec::new();
        for i in 0..60 {
            sent.push(store.append(chat_id, sender, &format!("msg {i}")).await.unwrap());
        }

        let (first, has_more) = store.page(chat_id, 50, None).await.unwrap();
        assert_eq!(first.len(), 50);
        assert!(has_more);
        assert_eq!(first[0].id, sent[59].id);

        let cursor = first.last().map(|m| m.id);
        let (rest, has_more) = store.page(chat_id, 50, cursor).await.unwrap();
        assert_eq!(rest.len(), 10);
        assert!(!has_more);

        let mut all: Vec<_> = first.iter().chain(rest.iter()).map(|m| m.id).collect();
        assert!(all.windows(2).all(|w| w[0] > w[1]));
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 60);
    }

    #[tokio::test]
    async fn cursor_chain_is_stable_under_concurrent_appends() {
        let db = Db::new();
        let (chat_id, sender) = chat_with_sender(&db).await;
        let store = MessageStore::new(db);

        for i in 0..30 {
            store.append(chat_id, sender, &format!("old {i}")).await.unwrap();
        }

        let (first, has_more) = store.page(chat_id, 20, None).await.unwrap();
        assert!(has_more);

        // New messages arriving mid-scroll must not shift the older pages.
        for i in 0..5 {
            store.append(chat_id, sender, &format!("new {i}")).await.unwrap();
        }

        let cursor = first.last().map(|m| m.id);
        let (rest, has_more) = store.page(chat_id, 20, cursor).await.unwrap();
        assert_eq!(rest.len(), 10);
        assert!(!has_more);

        // 30 distinct messages across the chain, none of them the new ones.
        let seen: std::collections::HashSet<_> =
            first.iter().chain(rest.iter()).map(|m| m.id).collect();
        assert_eq!(seen.len(), 30);
        assert!(first
            .iter()
            .chain(rest.iter())
            .all(|m| m.content.starts_with("old")));
    }

    #[tokio::test]
    async fn page_on_empty_chat_is_empty() {
        let db = Db::new();
        let (chat_id, _) = chat_with_sender(&db).await;
        let store = MessageStore::new(db);

        let (messages, has_more) = store.page(chat_id, 50, None).await.unwrap();
        assert!(messages.is_empty());
        assert!(!has_more);
    }

    #[tokio::test]
    async fn page_of_unknown_chat_is_not_found() {
        let store = MessageStore::new(Db::new());
        let err = store.page(Uuid::new_v4(), 50, None).await.unwrap_err();
        assert!(matches!(err, AppError::ChatNotFound));
    }
}
