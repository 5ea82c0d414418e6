//! Storage implementations for Snello: the to-do item store and the chat
//! session store.

pub mod in_memory;
pub mod session_file;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryItemStore;
pub use session_file::FileSessionStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteItemStore;
