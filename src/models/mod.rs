pub mod chat;
pub mod message;
pub mod receipt;

pub use chat::*;
pub use message::*;
pub use receipt::*;
