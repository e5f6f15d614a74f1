//! Input types for account store writes.

use upstep_core::{Account, AccountStatus, Level};

/// Data for a new account. Validation and password hashing happen before
/// the store sees it.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub level: Level,
    pub status: AccountStatus,
}

/// Full-record update. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct AccountPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub level: Option<Level>,
    pub status: Option<AccountStatus>,
}

impl AccountPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.password_hash.is_none()
            && self.level.is_none()
            && self.status.is_none()
    }
}

/// Result of a write: the record as it was under the write lock, and as
/// it is now.
#[derive(Debug, Clone)]
pub struct AccountChange {
    pub before: Account,
    pub after: Account,
}
