//! Account domain types.
//!
//! An [`Account`] is owned by the account store. Everything that leaves the
//! store layer towards clients goes through [`AccountView`], which never
//! carries the password hash.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::CoreError;
use crate::timestamp::format_rfc3339;

/// Lifecycle status of an account.
///
/// Parsing is case-insensitive and accepts `"not active"` as an alias for
/// [`AccountStatus::Inactive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum AccountStatus {
    #[default]
    Active,
    Pending,
    Suspended,
    Inactive,
}

impl AccountStatus {
    pub const ALL: [AccountStatus; 4] = [
        AccountStatus::Active,
        AccountStatus::Pending,
        AccountStatus::Suspended,
        AccountStatus::Inactive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Pending => "pending",
            AccountStatus::Suspended => "suspended",
            AccountStatus::Inactive => "inactive",
        }
    }

    /// Whether newly entering this status ends any live session.
    pub fn triggers_logout(&self) -> bool {
        matches!(
            self,
            AccountStatus::Suspended | AccountStatus::Pending | AccountStatus::Inactive
        )
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "active" => Ok(AccountStatus::Active),
            "pending" => Ok(AccountStatus::Pending),
            "suspended" => Ok(AccountStatus::Suspended),
            "inactive" | "not active" => Ok(AccountStatus::Inactive),
            _ => Err(CoreError::invalid_status(s)),
        }
    }
}

impl TryFrom<String> for AccountStatus {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Coaching level an account is assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Level {
    #[default]
    Beginner,
    Senior,
    Master,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Beginner => "beginner",
            Level::Senior => "senior",
            Level::Master => "master",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Level::Beginner),
            "senior" => Ok(Level::Senior),
            "master" => Ok(Level::Master),
            _ => Err(CoreError::invalid_level(s)),
        }
    }
}

impl TryFrom<String> for Level {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A stored account record.
#[derive(Clone)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    pub level: Level,
    pub status: AccountStatus,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Account {
    /// Client-facing projection without secrets.
    pub fn view(&self) -> AccountView {
        AccountView {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            level: self.level,
            status: self.status,
            created_at: format_rfc3339(self.created_at),
            updated_at: format_rfc3339(self.updated_at),
        }
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("level", &self.level)
            .field("status", &self.status)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Account as serialized to HTTP and WebSocket clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub level: Level,
    pub status: AccountStatus,
    pub created_at: String,
    pub updated_at: String,
}
