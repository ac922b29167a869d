//! Storage crate: conversation and message persistence.
//!
//! ## Modules
//!
//! - [`error`] – Storage error types
//! - [`conversation_store`] – ConversationStore trait and SQLite implementation
//! - [`sqlite_pool`] – SqlitePoolManager

mod conversation_store;
mod error;
mod sqlite_pool;

pub use conversation_store::{ConversationStore, SqliteConversationStore};
pub use error::StorageError;
pub use sqlite_pool::SqlitePoolManager;
