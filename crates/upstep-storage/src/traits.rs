//! The account store contract.

use async_trait::async_trait;
use upstep_core::{Account, AccountStatus};

use crate::error::StorageError;
use crate::types::{AccountChange, AccountPatch, NewAccount};

/// Storage contract that every account backend implements.
///
/// Implementations must be thread-safe (`Send + Sync`). Reads return
/// `Ok(None)` for a missing record; writes addressed to a missing record
/// return [`StorageError::NotFound`].
///
/// # Example
///
/// ```ignore
/// use upstep_storage::{AccountStore, StorageError};
///
/// async fn must_exist(store: &dyn AccountStore, id: &str) -> Result<Account, StorageError> {
///     store
///         .find_by_id(id)
///         .await?
///         .ok_or_else(|| StorageError::not_found(id))
/// }
/// ```
#[async_trait]
pub trait AccountStore: Send + Sync {
    // ==================== Reads ====================

    /// Reads an account by ID.
    async fn find_by_id(&self, id: &str) -> Result<Option<Account>, StorageError>;

    /// Reads every account whose ID is in `ids`. Unknown IDs are skipped;
    /// the result follows store order, not `ids` order.
    async fn find_many(&self, ids: &[String]) -> Result<Vec<Account>, StorageError>;

    /// Reads an account by (already normalized) email.
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StorageError>;

    /// Lists all accounts in creation order.
    async fn list(&self) -> Result<Vec<Account>, StorageError>;

    // ==================== Writes ====================

    /// Creates a new account.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if the email is taken.
    async fn create(&self, account: NewAccount) -> Result<Account, StorageError>;

    /// Applies a partial update. The previous record is read in the same
    /// write.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown ID and
    /// `StorageError::AlreadyExists` if the new email is taken.
    async fn update(&self, id: &str, patch: AccountPatch) -> Result<AccountChange, StorageError>;

    /// Sets the status of one account. The previous record is read in the
    /// same write, so concurrent writers each see the status they replaced.
    async fn update_status(
        &self,
        id: &str,
        status: AccountStatus,
    ) -> Result<AccountChange, StorageError>;

    /// Sets the status of every account in `ids` in one write. Returns one
    /// change per updated record; unknown IDs are skipped.
    async fn update_many(
        &self,
        ids: &[String],
        status: AccountStatus,
    ) -> Result<Vec<AccountChange>, StorageError>;

    /// Deletes an account and returns the record as it was.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown ID.
    async fn delete(&self, id: &str) -> Result<Account, StorageError>;
}
