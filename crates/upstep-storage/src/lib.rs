//! # upstep-storage
//!
//! Account store abstraction for the Upstep backend.
//!
//! This crate defines the [`AccountStore`] trait and its input and error
//! types. Implementations live in separate crates (see `upstep-db-memory`).
//!
//! ## Implementing a backend
//!
//! ```ignore
//! use async_trait::async_trait;
//! use upstep_storage::{AccountStore, StorageError};
//!
//! struct MyStore;
//!
//! #[async_trait]
//! impl AccountStore for MyStore {
//!     async fn find_by_id(&self, id: &str) -> Result<Option<Account>, StorageError> {
//!         // Implementation
//!     }
//!     // ... other methods
//! }
//! ```

mod error;
mod traits;
mod types;

pub use error::StorageError;
pub use traits::AccountStore;
pub use types::{AccountChange, AccountPatch, NewAccount};
