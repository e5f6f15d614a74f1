//! In-memory account store for the Upstep backend.
//!
//! Implements [`AccountStore`] from `upstep-storage`. Contents do not
//! survive a restart.
//!
//! # Example
//!
//! ```ignore
//! use upstep_db_memory::InMemoryAccountStore;
//! use upstep_storage::AccountStore;
//!
//! let store = InMemoryAccountStore::new();
//! let accounts = store.list().await?;
//! ```

pub mod storage;

pub use storage::InMemoryAccountStore;
pub use upstep_storage::{AccountStore, StorageError};
