use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use super::{handlers, middleware::auth_middleware};
use crate::AppState;

pub fn create_router(state: AppState) -> Router<AppState> {
    // Chat routes (protected)
    let chat_routes = Router::new()
        .route("/", get(handlers::chats::list_chats))
        .route("/", post(handlers::chats::create_chat))
        .route("/by-meetup/:meetup_id", get(handlers::chats::get_chat_for_meetup))
        .route("/by-meetup/:meetup_id", delete(handlers::chats::delete_chat_for_meetup))
        .route("/:id", get(handlers::chats::get_chat))
        .route("/:id/participants", post(handlers::chats::add_participant))
        .route("/:id/messages", get(handlers::chats::get_messages))
        .route("/:id/messages", post(handlers::chats::send_message))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Message routes (protected)
    let message_routes = Router::new()
        .route("/:id/delivered", post(handlers::messages::mark_delivered))
        .route("/:id/read", post(handlers::messages::mark_read))
        .route("/:id/status", get(handlers::messages::get_status))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Combine all routes
    Router::new()
        .nest("/chats", chat_routes)
        .nest("/messages", message_routes)
        .with_state(state)
}
