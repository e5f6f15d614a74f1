use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use upstep_core::{Account, AccountStatus};
use upstep_storage::{AccountChange, AccountPatch, AccountStore, NewAccount, StorageError};
use uuid::Uuid;

/// In-memory account store.
///
/// A single `RwLock` over an insertion-ordered map keeps `update_many`
/// atomic with respect to concurrent readers and gives `list` a stable
/// creation order.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAccountStore {
    data: Arc<RwLock<IndexMap<String, Account>>>,
}

impl InMemoryAccountStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }

    fn email_taken(data: &IndexMap<String, Account>, email: &str, except_id: Option<&str>) -> bool {
        data.values()
            .any(|a| a.email == email && Some(a.id.as_str()) != except_id)
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Account>, StorageError> {
        Ok(self.data.read().await.get(id).cloned())
    }

    async fn find_many(&self, ids: &[String]) -> Result<Vec<Account>, StorageError> {
        let guard = self.data.read().await;
        Ok(guard
            .values()
            .filter(|a| ids.contains(&a.id))
            .cloned()
            .collect())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StorageError> {
        let guard = self.data.read().await;
        Ok(guard.values().find(|a| a.email == email).cloned())
    }

    async fn list(&self) -> Result<Vec<Account>, StorageError> {
        Ok(self.data.read().await.values().cloned().collect())
    }

    async fn create(&self, account: NewAccount) -> Result<Account, StorageError> {
        let mut guard = self.data.write().await;
        if Self::email_taken(&guard, &account.email, None) {
            return Err(StorageError::already_exists("email", account.email));
        }

        let now = OffsetDateTime::now_utc();
        let stored = Account {
            id: Uuid::new_v4().to_string(),
            name: account.name,
            email: account.email,
            password_hash: account.password_hash,
            level: account.level,
            status: account.status,
            created_at: now,
            updated_at: now,
        };
        guard.insert(stored.id.clone(), stored.clone());
        tracing::debug!(id = %stored.id, "account created");
        Ok(stored)
    }

    async fn update(&self, id: &str, patch: AccountPatch) -> Result<AccountChange, StorageError> {
        let mut guard = self.data.write().await;
        if let Some(email) = patch.email.as_deref()
            && Self::email_taken(&guard, email, Some(id))
        {
            return Err(StorageError::already_exists("email", email));
        }

        let account = guard
            .get_mut(id)
            .ok_or_else(|| StorageError::not_found(id))?;
        let before = account.clone();
        if let Some(name) = patch.name {
            account.name = name;
        }
        if let Some(email) = patch.email {
            account.email = email;
        }
        if let Some(hash) = patch.password_hash {
            account.password_hash = hash;
        }
        if let Some(level) = patch.level {
            account.level = level;
        }
        if let Some(status) = patch.status {
            account.status = status;
        }
        account.updated_at = OffsetDateTime::now_utc();
        Ok(AccountChange {
            before,
            after: account.clone(),
        })
    }

    async fn update_status(
        &self,
        id: &str,
        status: AccountStatus,
    ) -> Result<AccountChange, StorageError> {
        let mut guard = self.data.write().await;
        let account = guard
            .get_mut(id)
            .ok_or_else(|| StorageError::not_found(id))?;
        let before = account.clone();
        account.status = status;
        account.updated_at = OffsetDateTime::now_utc();
        Ok(AccountChange {
            before,
            after: account.clone(),
        })
    }

    async fn update_many(
        &self,
        ids: &[String],
        status: AccountStatus,
    ) -> Result<Vec<AccountChange>, StorageError> {
        let mut guard = self.data.write().await;
        let now = OffsetDateTime::now_utc();
        let mut changes = Vec::new();
        for account in guard.values_mut().filter(|a| ids.contains(&a.id)) {
            let before = account.clone();
            account.status = status;
            account.updated_at = now;
            changes.push(AccountChange {
                before,
                after: account.clone(),
            });
        }
        Ok(changes)
    }

    async fn delete(&self, id: &str) -> Result<Account, StorageError> {
        let mut guard = self.data.write().await;
        guard
            .shift_remove(id)
            .ok_or_else(|| StorageError::not_found(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upstep_core::Level;

    fn new_account(email: &str) -> NewAccount {
        NewAccount {
            name: "Coach".into(),
            email: email.into(),
            password_hash: "hash".into(),
            level: Level::Beginner,
            status: AccountStatus::Active,
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let store = InMemoryAccountStore::new();
        let created = store.create(new_account("a@example.com")).await.unwrap();

        let found = store.find_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(found.email, "a@example.com");
        assert!(store.find_by_id("missing").await.unwrap().is_none());

        let by_email = store.find_by_email("a@example.com").await.unwrap();
        assert_eq!(by_email.map(|a| a.id), Some(created.id));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = InMemoryAccountStore::new();
        store.create(new_account("a@example.com")).await.unwrap();
        let err = store.create(new_account("a@example.com")).await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_update_email_collision() {
        let store = InMemoryAccountStore::new();
        store.create(new_account("a@example.com")).await.unwrap();
        let b = store.create(new_account("b@example.com")).await.unwrap();

        let patch = AccountPatch {
            email: Some("a@example.com".into()),
            ..Default::default()
        };
        let err = store.update(&b.id, patch).await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { .. }));

        // Re-saving its own email is fine
        let patch = AccountPatch {
            email: Some("b@example.com".into()),
            level: Some(Level::Master),
            ..Default::default()
        };
        let change = store.update(&b.id, patch).await.unwrap();
        assert_eq!(change.before.level, Level::Beginner);
        assert_eq!(change.after.level, Level::Master);
    }

    #[tokio::test]
    async fn test_update_status_missing() {
        let store = InMemoryAccountStore::new();
        let err = store
            .update_status("nope", AccountStatus::Suspended)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_status_reports_replaced_status() {
        let store = InMemoryAccountStore::new();
        let a = store.create(new_account("a@example.com")).await.unwrap();

        let (first, second) = tokio::join!(
            store.update_status(&a.id, AccountStatus::Suspended),
            store.update_status(&a.id, AccountStatus::Suspended),
        );
        let mut before: Vec<_> = [first.unwrap(), second.unwrap()]
            .into_iter()
            .map(|c| c.before.status)
            .collect();
        before.sort_by_key(|s| s.as_str());
        assert_eq!(before, [AccountStatus::Active, AccountStatus::Suspended]);
    }

    #[tokio::test]
    async fn test_update_many_skips_unknown() {
        let store = InMemoryAccountStore::new();
        let a = store.create(new_account("a@example.com")).await.unwrap();
        let b = store.create(new_account("b@example.com")).await.unwrap();

        let ids = vec![a.id.clone(), "ghost".to_string(), b.id.clone()];
        let changes = store
            .update_many(&ids, AccountStatus::Pending)
            .await
            .unwrap();
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.before.status == AccountStatus::Active));
        assert!(changes.iter().all(|c| c.after.status == AccountStatus::Pending));

        let found = store.find_many(&ids).await.unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_preserves_order() {
        let store = InMemoryAccountStore::new();
        let a = store.create(new_account("a@example.com")).await.unwrap();
        let b = store.create(new_account("b@example.com")).await.unwrap();
        let c = store.create(new_account("c@example.com")).await.unwrap();

        let deleted = store.delete(&b.id).await.unwrap();
        assert_eq!(deleted.id, b.id);
        assert!(store.delete(&b.id).await.unwrap_err().is_not_found());

        let ids: Vec<_> = store.list().await.unwrap().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![a.id, c.id]);
    }
}
