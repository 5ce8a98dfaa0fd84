pub mod auth;
pub mod chat;
pub mod delivery;
pub mod messages;
pub mod registry;
