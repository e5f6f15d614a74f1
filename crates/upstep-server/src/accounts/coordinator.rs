//! Status-change coordination.
//!
//! Account mutations that affect live sessions go through
//! [`StatusCoordinator`]. Each operation writes to the store first, then
//! decides what to tell connected clients with [`StatusTransition::decide`]
//! and finally emits through a [`Notifier`]. Notification is best-effort and
//! never fails the operation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use upstep_core::{Account, AccountStatus, AccountView};
use upstep_storage::{AccountChange, AccountPatch, AccountStore, StorageError};

use crate::error::ApiError;
use crate::realtime::{EventKind, ForceLogout, LevelChange, Notifier};

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StorageError),
}

impl From<CoordinatorError> for ApiError {
    fn from(e: CoordinatorError) -> Self {
        match e {
            CoordinatorError::Validation(msg) => ApiError::Validation(msg),
            CoordinatorError::Store(err) => err.into(),
        }
    }
}

/// What a status write means for connected clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition {
    pub previous: AccountStatus,
    pub new: AccountStatus,
    pub changed: bool,
    pub will_logout: bool,
}

impl StatusTransition {
    pub fn decide(previous: AccountStatus, new: AccountStatus) -> Self {
        let changed = previous != new;
        Self {
            previous,
            new,
            changed,
            will_logout: changed && new.triggers_logout(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeOutcome {
    pub account: AccountView,
    pub previous_status: AccountStatus,
    pub changed: bool,
    pub will_logout: bool,
}

/// One row of a bulk status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkStatusRecord {
    pub user_id: String,
    pub previous_status: AccountStatus,
    pub new_status: AccountStatus,
    pub changed: bool,
    pub will_logout: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionOutcome {
    pub account: AccountView,
    pub logged_out: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    pub account: AccountView,
    pub previous_status: AccountStatus,
    pub changed: bool,
    pub will_logout: bool,
    pub level_changed: bool,
}

fn to_payload<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_default()
}

fn parse_status(status: &str) -> Result<AccountStatus, CoordinatorError> {
    status
        .parse()
        .map_err(|e: upstep_core::CoreError| CoordinatorError::Validation(e.to_string()))
}

pub struct StatusCoordinator {
    store: Arc<dyn AccountStore>,
    notifier: Arc<dyn Notifier>,
}

impl StatusCoordinator {
    pub fn new(store: Arc<dyn AccountStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Emit `user-updated` then `force-logout` as the transition demands.
    fn emit(&self, transition: &StatusTransition, account: &Account) {
        if transition.changed {
            self.notifier
                .notify_user(&account.id, EventKind::UserUpdated, to_payload(&account.view()));
        }
        if transition.will_logout {
            self.notifier.notify_user(
                &account.id,
                EventKind::ForceLogout,
                to_payload(&ForceLogout::for_status(transition.new)),
            );
        }
    }

    /// Set one account's status and notify its live session.
    pub async fn apply_status_change(
        &self,
        user_id: &str,
        new_status: &str,
    ) -> Result<StatusChangeOutcome, CoordinatorError> {
        let new_status = parse_status(new_status)?;
        let AccountChange { before, after } =
            self.store.update_status(user_id, new_status).await?;

        let transition = StatusTransition::decide(before.status, after.status);
        self.emit(&transition, &after);

        tracing::info!(
            user_id,
            previous = %transition.previous,
            new = %transition.new,
            changed = transition.changed,
            will_logout = transition.will_logout,
            "account status updated"
        );

        Ok(StatusChangeOutcome {
            account: after.view(),
            previous_status: transition.previous,
            changed: transition.changed,
            will_logout: transition.will_logout,
        })
    }

    /// Set the status of many accounts in one store write.
    ///
    /// IDs matching no account are skipped and absent from the result.
    pub async fn apply_bulk_status_change(
        &self,
        user_ids: &[String],
        new_status: &str,
    ) -> Result<Vec<BulkStatusRecord>, CoordinatorError> {
        let new_status = parse_status(new_status)?;
        if user_ids.is_empty() {
            return Err(CoordinatorError::Validation(
                "userIds must be a non-empty list".into(),
            ));
        }

        let mut seen = HashSet::new();
        let ids: Vec<String> = user_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();

        let mut changes: HashMap<String, AccountChange> = self
            .store
            .update_many(&ids, new_status)
            .await?
            .into_iter()
            .map(|c| (c.after.id.clone(), c))
            .collect();

        let mut records = Vec::with_capacity(changes.len());
        for id in &ids {
            let Some(AccountChange { before, after }) = changes.remove(id) else {
                tracing::debug!(user_id = %id, "bulk status change skipped unknown account");
                continue;
            };

            let transition = StatusTransition::decide(before.status, after.status);
            self.emit(&transition, &after);

            records.push(BulkStatusRecord {
                user_id: id.clone(),
                previous_status: transition.previous,
                new_status: transition.new,
                changed: transition.changed,
                will_logout: transition.will_logout,
            });
        }

        tracing::info!(
            requested = ids.len(),
            updated = records.len(),
            status = %new_status,
            "bulk status change applied"
        );
        Ok(records)
    }

    /// Delete an account; an active account's live session is logged out.
    pub async fn apply_account_deletion(
        &self,
        user_id: &str,
    ) -> Result<DeletionOutcome, CoordinatorError> {
        let deleted = self.store.delete(user_id).await?;

        let logged_out = deleted.status == AccountStatus::Active;
        if logged_out {
            self.notifier.notify_user(
                &deleted.id,
                EventKind::ForceLogout,
                to_payload(&ForceLogout::for_deletion()),
            );
        }

        tracing::info!(user_id, logged_out, "account deleted");
        Ok(DeletionOutcome {
            account: deleted.view(),
            logged_out,
        })
    }

    /// Apply a full-record update; notifies on status and level changes.
    pub async fn apply_account_update(
        &self,
        user_id: &str,
        patch: AccountPatch,
    ) -> Result<UpdateOutcome, CoordinatorError> {
        let AccountChange {
            before: previous,
            after: updated,
        } = self.store.update(user_id, patch).await?;

        let transition = StatusTransition::decide(previous.status, updated.status);
        self.emit(&transition, &updated);

        let level_changed = previous.level != updated.level;
        if level_changed {
            self.notifier.notify_user(
                &updated.id,
                EventKind::LevelUpdated,
                to_payload(&LevelChange {
                    user_id: updated.id.clone(),
                    previous_level: previous.level,
                    level: updated.level,
                }),
            );
        }

        Ok(UpdateOutcome {
            account: updated.view(),
            previous_status: transition.previous,
            changed: transition.changed,
            will_logout: transition.will_logout,
            level_changed,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::realtime::DeliveryReport;
    use parking_lot::Mutex;
    use upstep_core::Level;
    use upstep_db_memory::InMemoryAccountStore;
    use upstep_storage::NewAccount;

    /// Notifier that records every call.
    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub sent: Mutex<Vec<(String, EventKind, Value)>>,
    }

    impl RecordingNotifier {
        pub fn kinds_for(&self, user_id: &str) -> Vec<EventKind> {
            self.sent
                .lock()
                .iter()
                .filter(|(u, _, _)| u == user_id)
                .map(|(_, k, _)| *k)
                .collect()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify_user(&self, user_id: &str, kind: EventKind, payload: Value) -> DeliveryReport {
            self.sent.lock().push((user_id.to_string(), kind, payload));
            DeliveryReport {
                attempted: 1,
                delivered: 1,
            }
        }

        fn notify_all(&self, kind: EventKind, payload: Value) -> DeliveryReport {
            self.sent.lock().push(("*".to_string(), kind, payload));
            DeliveryReport::default()
        }
    }

    async fn setup() -> (StatusCoordinator, Arc<InMemoryAccountStore>, Arc<RecordingNotifier>) {
        let store = Arc::new(InMemoryAccountStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let coordinator = StatusCoordinator::new(store.clone(), notifier.clone());
        (coordinator, store, notifier)
    }

    async fn seed(store: &InMemoryAccountStore, email: &str, status: AccountStatus) -> String {
        store
            .create(NewAccount {
                name: "Coach".into(),
                email: email.into(),
                password_hash: "hash".into(),
                level: Level::Beginner,
                status,
            })
            .await
            .unwrap()
            .id
    }

    #[test]
    fn test_decide() {
        use AccountStatus::*;
        let same = StatusTransition::decide(Active, Active);
        assert!(!same.changed && !same.will_logout);

        let suspend = StatusTransition::decide(Active, Suspended);
        assert!(suspend.changed && suspend.will_logout);

        let reactivate = StatusTransition::decide(Suspended, Active);
        assert!(reactivate.changed && !reactivate.will_logout);

        // Moving between two logout statuses still logs out
        let demote = StatusTransition::decide(Pending, Inactive);
        assert!(demote.changed && demote.will_logout);

        let stay = StatusTransition::decide(Pending, Pending);
        assert!(!stay.will_logout);
    }

    #[tokio::test]
    async fn test_unchanged_status_emits_nothing() {
        let (coordinator, store, notifier) = setup().await;
        let id = seed(&store, "a@b.co", AccountStatus::Active).await;

        let outcome = coordinator.apply_status_change(&id, "active").await.unwrap();
        assert!(!outcome.changed);
        assert!(!outcome.will_logout);
        assert!(notifier.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_suspend_emits_update_then_logout() {
        let (coordinator, store, notifier) = setup().await;
        let id = seed(&store, "a@b.co", AccountStatus::Active).await;

        let outcome = coordinator.apply_status_change(&id, "Suspended").await.unwrap();
        assert!(outcome.changed);
        assert!(outcome.will_logout);
        assert_eq!(outcome.previous_status, AccountStatus::Active);
        assert_eq!(outcome.account.status, AccountStatus::Suspended);

        assert_eq!(
            notifier.kinds_for(&id),
            vec![EventKind::UserUpdated, EventKind::ForceLogout]
        );
        let sent = notifier.sent.lock();
        assert_eq!(sent[0].2["status"], "suspended");
        assert!(sent[0].2.get("passwordHash").is_none());
        assert_eq!(sent[1].2["newStatus"], "suspended");
    }

    #[tokio::test]
    async fn test_concurrent_identical_changes_notify_once() {
        let (coordinator, store, notifier) = setup().await;
        let id = seed(&store, "a@b.co", AccountStatus::Active).await;

        let (first, second) = tokio::join!(
            coordinator.apply_status_change(&id, "suspended"),
            coordinator.apply_status_change(&id, "suspended"),
        );
        let changed = [first.unwrap(), second.unwrap()]
            .iter()
            .filter(|o| o.changed)
            .count();
        assert_eq!(changed, 1);
        assert_eq!(
            notifier.kinds_for(&id),
            vec![EventKind::UserUpdated, EventKind::ForceLogout]
        );
    }

    #[tokio::test]
    async fn test_status_change_errors() {
        let (coordinator, store, notifier) = setup().await;
        let id = seed(&store, "a@b.co", AccountStatus::Active).await;

        assert!(matches!(
            coordinator.apply_status_change(&id, "archived").await,
            Err(CoordinatorError::Validation(_))
        ));
        assert!(matches!(
            coordinator.apply_status_change("missing", "active").await,
            Err(CoordinatorError::Store(StorageError::NotFound { .. }))
        ));
        assert!(notifier.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_bulk_change_notifies_only_changed() {
        let (coordinator, store, notifier) = setup().await;
        let u1 = seed(&store, "u1@b.co", AccountStatus::Pending).await;
        let u2 = seed(&store, "u2@b.co", AccountStatus::Active).await;

        let records = coordinator
            .apply_bulk_status_change(&[u1.clone(), u2.clone()], "pending")
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].user_id, u1);
        assert!(!records[0].changed);
        assert!(!records[0].will_logout);
        assert_eq!(records[1].user_id, u2);
        assert!(records[1].changed);
        assert!(records[1].will_logout);

        assert!(notifier.kinds_for(&u1).is_empty());
        assert_eq!(
            notifier.kinds_for(&u2),
            vec![EventKind::UserUpdated, EventKind::ForceLogout]
        );
    }

    #[tokio::test]
    async fn test_bulk_change_skips_unknown_ids() {
        let (coordinator, store, _notifier) = setup().await;
        let u1 = seed(&store, "u1@b.co", AccountStatus::Active).await;

        let records = coordinator
            .apply_bulk_status_change(&["ghost".into(), u1.clone(), u1.clone()], "inactive")
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].user_id, u1);
        assert_eq!(records[0].new_status, AccountStatus::Inactive);
    }

    #[tokio::test]
    async fn test_bulk_change_validation() {
        let (coordinator, _store, _notifier) = setup().await;
        assert!(matches!(
            coordinator.apply_bulk_status_change(&[], "active").await,
            Err(CoordinatorError::Validation(_))
        ));
        assert!(matches!(
            coordinator
                .apply_bulk_status_change(&["a".into()], "frozen")
                .await,
            Err(CoordinatorError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_deleting_active_account_logs_out() {
        let (coordinator, store, notifier) = setup().await;
        let id = seed(&store, "a@b.co", AccountStatus::Active).await;

        let outcome = coordinator.apply_account_deletion(&id).await.unwrap();
        assert!(outcome.logged_out);
        assert!(store.find_by_id(&id).await.unwrap().is_none());

        let sent = notifier.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, EventKind::ForceLogout);
        assert_eq!(sent[0].2["reason"], "account deleted");
        assert_eq!(sent[0].2["newStatus"], "deleted");
    }

    #[tokio::test]
    async fn test_deleting_pending_account_emits_nothing() {
        let (coordinator, store, notifier) = setup().await;
        let id = seed(&store, "a@b.co", AccountStatus::Pending).await;

        let outcome = coordinator.apply_account_deletion(&id).await.unwrap();
        assert!(!outcome.logged_out);
        assert!(notifier.sent.lock().is_empty());

        assert!(matches!(
            coordinator.apply_account_deletion(&id).await,
            Err(CoordinatorError::Store(StorageError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_update_emits_level_change() {
        let (coordinator, store, notifier) = setup().await;
        let id = seed(&store, "a@b.co", AccountStatus::Active).await;

        let outcome = coordinator
            .apply_account_update(
                &id,
                AccountPatch {
                    level: Some(Level::Senior),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(outcome.level_changed);
        assert!(!outcome.changed);
        assert_eq!(notifier.kinds_for(&id), vec![EventKind::LevelUpdated]);
        assert_eq!(notifier.sent.lock()[0].2["previousLevel"], "beginner");
    }

    #[tokio::test]
    async fn test_update_with_status_change() {
        let (coordinator, store, notifier) = setup().await;
        let id = seed(&store, "a@b.co", AccountStatus::Active).await;

        let outcome = coordinator
            .apply_account_update(
                &id,
                AccountPatch {
                    name: Some("Renamed".into()),
                    status: Some(AccountStatus::Inactive),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.account.name, "Renamed");
        assert!(outcome.will_logout);
        assert_eq!(
            notifier.kinds_for(&id),
            vec![EventKind::UserUpdated, EventKind::ForceLogout]
        );
    }
}
