use chrono::Utc;
use ulid::Ulid;
use uuid::Uuid;

use crate::{
    config::ChatConfig,
    error::{AppError, AppResult},
    models::{ChatSummary, Message, MessagePage, MessageWithReceipt, Receipt, ReceiptType},
    store::Db,
};

use super::{delivery::DeliveryTracker, messages::MessageStore};

/// Façade over the chat registry, message log and delivery tracker.
///
/// All writes flow through here so that a send commits its message, the
/// chat's activity bump and the receipt fan-out as one unit.
pub struct ChatService {
    db: Db,
    delivery: DeliveryTracker,
    config: ChatConfig,
}

impl ChatService {
    pub fn new(db: Db, config: ChatConfig) -> Self {
        Self {
            delivery: DeliveryTracker::new(db.clone()),
            db,
            config,
        }
    }

    /// Append a message and fan out receipts to the membership as it stands
    /// right now. Participants added afterwards see the message but get no
    /// receipt row for it.
    pub async fn send_message(
        &self,
        chat_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> AppResult<Message> {
        let mut db = self.db.write().await;

        let chat = db.chat(chat_id)?;
        if !chat.is_participant(sender_id) {
            return Err(AppError::NotParticipant);
        }
        let recipients = chat.participant_ids.clone();

        let message = MessageStore::append_in(&mut db, chat_id, sender_id, content)?;
        DeliveryTracker::materialize_in(&mut db, &message, &recipients);

        Ok(message)
    }

    /// One page of a chat as seen by `viewer_id`: each message joined with
    /// the viewer's own receipt only. Other recipients' receipts are never
    /// exposed here.
    pub async fn fetch_page(
        &self,
        chat_id: Uuid,
        viewer_id: Uuid,
        limit: Option<usize>,
        before: Option<Ulid>,
    ) -> AppResult<MessagePage> {
        let limit = self.page_limit(limit)?;

        let db = self.db.read().await;
        let chat = db.chat(chat_id)?;
        if !chat.is_participant(viewer_id) {
            return Err(AppError::NotParticipant);
        }

        let (messages, has_more) = MessageStore::page_in(&db, chat_id, limit, before)?;
        let messages = messages
            .into_iter()
            .map(|message| {
                let receipt = db.receipts.get(&(message.id, viewer_id));
                MessageWithReceipt {
                    delivered_at: receipt.and_then(|r| r.delivered_at),
                    read_at: receipt.and_then(|r| r.read_at),
                    needs_delivery_update: DeliveryTracker::needs_delivery_update(
                        &message, viewer_id, receipt,
                    ),
                    message,
                }
            })
            .collect();

        Ok(MessagePage { messages, has_more })
    }

    /// The user's chats, most recently active first, each with the viewer's
    /// unread count and the latest message.
    pub async fn list_chats_for_user(&self, user_id: Uuid) -> AppResult<Vec<ChatSummary>> {
        let db = self.db.read().await;

        let mut summaries: Vec<ChatSummary> = db
            .chats
            .values()
            .filter(|chat| chat.is_participant(user_id))
            .map(|chat| {
                let index = db.chat_messages.get(&chat.id);
                let last_message = index
                    .and_then(|ids| ids.iter().next_back())
                    .and_then(|id| db.messages.get(id))
                    .cloned();
                let unread_count = index
                    .map(|ids| {
                        ids.iter()
                            .filter(|&&id| {
                                let Some(message) = db.messages.get(&id) else {
                                    return false;
                                };
                                message.sender_id != user_id
                                    && matches!(
                                        db.receipts.get(&(id, user_id)),
                                        Some(r) if r.read_at.is_none()
                                    )
                            })
                            .count() as i64
                    })
                    .unwrap_or(0);

                ChatSummary {
                    chat: chat.clone(),
                    unread_count,
                    last_message,
                }
            })
            .collect();

        // Latest activity first; ties broken by the newest message id so the
        // order stays deterministic when timestamps collide.
        summaries.sort_by(|a, b| {
            (b.chat.last_message_at, b.last_message.as_ref().map(|m| m.id))
                .cmp(&(a.chat.last_message_at, a.last_message.as_ref().map(|m| m.id)))
        });
        Ok(summaries)
    }

    pub async fn acknowledge_delivered(
        &self,
        message_id: Ulid,
        user_id: Uuid,
    ) -> AppResult<Receipt> {
        self.delivery
            .advance(message_id, user_id, ReceiptType::Delivered, Utc::now())
            .await
    }

    pub async fn acknowledge_read(&self, message_id: Ulid, user_id: Uuid) -> AppResult<Receipt> {
        self.delivery
            .advance(message_id, user_id, ReceiptType::Read, Utc::now())
            .await
    }

    fn page_limit(&self, limit: Option<usize>) -> AppResult<usize> {
        match limit {
            Some(0) => Err(AppError::Validation("limit must be positive".to_string())),
            Some(n) => Ok(n.min(self.config.max_page_size)),
            None => Ok(self.config.default_page_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::registry::ChatRegistry;

    fn chat_config() -> ChatConfig {
        ChatConfig {
            default_page_size: 50,
            max_page_size: 100,
        }
    }

    fn service(db: &Db) -> ChatService {
        ChatService::new(db.clone(), chat_config())
    }

    async fn pair_chat(db: &Db) -> (Uuid, Uuid, Uuid) {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let chat = ChatRegistry::new(db.clone())
            .create_chat(Uuid::new_v4(), "Dinner", None, vec![alice, bob])
            .await
            .unwrap();
        (chat.id, alice, bob)
    }

    #[tokio::test]
    async fn send_rejects_non_participants() {
        let db = Db::new();
        let (chat_id, _, _) = pair_chat(&db).await;

        let err = service(&db)
            .send_message(chat_id, Uuid::new_v4(), "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotParticipant));
    }

    #[tokio::test]
    async fn send_fans_out_to_exactly_the_current_membership() {
        let db = Db::new();
        let (chat_id, alice, bob) = pair_chat(&db).await;
        let service = service(&db);

        let message = service.send_message(chat_id, alice, "hi").await.unwrap();

        let db = db.read().await;
        let rows: Vec<_> = db
            .receipts
            .keys()
            .filter(|(message_id, _)| *message_id == message.id)
            .collect();
        assert_eq!(rows.len(), 2);
        assert!(db.receipts.contains_key(&(message.id, alice)));
        assert!(db.receipts.contains_key(&(message.id, bob)));
    }

    #[tokio::test]
    async fn failed_send_leaves_no_trace() {
        let db = Db::new();
        let (chat_id, alice, _) = pair_chat(&db).await;
        let service = service(&db);

        let err = service.send_message(chat_id, alice, "   ").await.unwrap_err();
        assert!(matches!(err, AppError::EmptyMessage));

        let db = db.read().await;
        assert!(db.messages.is_empty());
        assert!(db.receipts.is_empty());
    }

    #[tokio::test]
    async fn late_joiners_get_no_retroactive_receipts() {
        let db = Db::new();
        let (chat_id, alice, _) = pair_chat(&db).await;
        let registry = ChatRegistry::new(db.clone());
        let service = service(&db);

        let mut early = Vec::new();
        for i in 0..5 {
            early.push(
                service
                    .send_message(chat_id, alice, &format!("msg {i}"))
                    .await
                    .unwrap(),
            );
        }

        let carol = Uuid::new_v4();
        registry.add_participant(chat_id, carol).await.unwrap();
        let after = service.send_message(chat_id, alice, "welcome").await.unwrap();

        let page = service
            .fetch_page(chat_id, carol, None, None)
            .await
            .unwrap();
        assert_eq!(page.messages.len(), 6);
        for entry in &page.messages {
            if entry.message.id == after.id {
                assert!(entry.needs_delivery_update);
            } else {
                // History from before carol joined carries no receipt for her.
                assert_eq!(entry.delivered_at, None);
                assert!(!entry.needs_delivery_update);
            }
        }

        let db = db.read().await;
        for message in &early {
            assert!(!db.receipts.contains_key(&(message.id, carol)));
        }
        assert!(db.receipts.contains_key(&(after.id, carol)));
    }

    #[tokio::test]
    async fn concurrent_sends_get_distinct_ordered_ids() {
        let db = Db::new();
        let (chat_id, alice, _) = pair_chat(&db).await;

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..32 {
            let service = service(&db);
            tasks.spawn(async move {
                service
                    .send_message(chat_id, alice, &format!("msg {i}"))
                    .await
            });
        }

        let mut ids = Vec::new();
        while let Some(sent) = tasks.join_next().await {
            ids.push(sent.unwrap().unwrap().id);
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 32);

        let page = service(&db)
            .fetch_page(chat_id, alice, None, None)
            .await
            .unwrap();
        assert_eq!(page.messages.len(), 32);
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn fetch_page_rejects_outsiders_and_zero_limits() {
        let db = Db::new();
        let (chat_id, alice, _) = pair_chat(&db).await;
        let service = service(&db);

        let err = service
            .fetch_page(chat_id, Uuid::new_v4(), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotParticipant));

        let err = service
            .fetch_page(chat_id, alice, Some(0), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn fetch_page_clamps_oversized_limits() {
        let db = Db::new();
        let (chat_id, alice, _) = pair_chat(&db).await;
        let service = ChatService::new(
            db.clone(),
            ChatConfig {
                default_page_size: 2,
                max_page_size: 3,
            },
        );

        for i in 0..5 {
            service
                .send_message(chat_id, alice, &format!("msg {i}"))
                .await
                .unwrap();
        }

        let page = service.fetch_page(chat_id, alice, None, None).await.unwrap();
        assert_eq!(page.messages.len(), 2);

        let page = service
            .fetch_page(chat_id, alice, Some(1000), None)
            .await
            .unwrap();
        assert_eq!(page.messages.len(), 3);
        assert!(page.has_more);
    }

    #[tokio::test]
    async fn delivery_round_trip_through_the_facade() {
        let db = Db::new();
        let (chat_id, alice, bob) = pair_chat(&db).await;
        let service = service(&db);

        let message = service.send_message(chat_id, alice, "hi").await.unwrap();

        let page = service.fetch_page(chat_id, bob, None, None).await.unwrap();
        let entry = &page.messages[0];
        assert!(entry.needs_delivery_update);
        assert_eq!(entry.delivered_at, None);
        assert_eq!(entry.read_at, None);

        let receipt = service.acknowledge_delivered(message.id, bob).await.unwrap();
        assert!(receipt.delivered_at.is_some());
        assert_eq!(receipt.read_at, None);

        let receipt = service.acknowledge_read(message.id, bob).await.unwrap();
        assert!(receipt.read_at.is_some());

        let page = service.fetch_page(chat_id, bob, None, None).await.unwrap();
        let entry = &page.messages[0];
        assert!(!entry.needs_delivery_update);
        assert_eq!(entry.read_at, receipt.read_at);
    }

    #[tokio::test]
    async fn sender_sees_only_their_own_synthetic_receipt() {
        let db = Db::new();
        let (chat_id, alice, _) = pair_chat(&db).await;
        let service = service(&db);

        let message = service.send_message(chat_id, alice, "hi").await.unwrap();

        // The sender's view reflects their own pre-marked row, not an
        // aggregate over the other recipients.
        let page = service.fetch_page(chat_id, alice, None, None).await.unwrap();
        let entry = &page.messages[0];
        assert_eq!(entry.delivered_at, Some(message.created_at));
        assert_eq!(entry.read_at, Some(message.created_at));
        assert!(!entry.needs_delivery_update);
    }

    #[tokio::test]
    async fn lists_chats_by_recent_activity_with_unread_counts() {
        let db = Db::new();
        let registry = ChatRegistry::new(db.clone());
        let service = service(&db);

        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let first = registry
            .create_chat(Uuid::new_v4(), "First", None, vec![alice, bob])
            .await
            .unwrap();
        let second = registry
            .create_chat(Uuid::new_v4(), "Second", None, vec![alice, bob])
            .await
            .unwrap();
        registry
            .create_chat(Uuid::new_v4(), "Not Alice's", None, vec![bob])
            .await
            .unwrap();

        service.send_message(first.id, bob, "one").await.unwrap();
        service.send_message(first.id, bob, "two").await.unwrap();
        let latest = service.send_message(second.id, bob, "three").await.unwrap();

        let chats = service.list_chats_for_user(alice).await.unwrap();
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[0].chat.id, second.id);
        assert_eq!(chats[0].unread_count, 1);
        assert_eq!(
            chats[0].last_message.as_ref().map(|m| m.id),
            Some(latest.id)
        );
        assert_eq!(chats[1].chat.id, first.id);
        assert_eq!(chats[1].unread_count, 2);

        service.acknowledge_read(latest.id, alice).await.unwrap();
        let chats = service.list_chats_for_user(alice).await.unwrap();
        assert_eq!(chats[0].unread_count, 0);
    }
}
