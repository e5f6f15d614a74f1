//! Request bodies for the account routes and their validation.

use std::sync::LazyLock;

use serde::Deserialize;
use upstep_core::{AccountStatus, Level};
use upstep_storage::{AccountPatch, NewAccount};

use super::password::hash_password;
use crate::error::ApiError;

static EMAIL_REGEX: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^\S+@\S+\.\S+$").expect("Invalid email regex"));

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Default, Deserialize)]
pub struct CreateAccountRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub level: Option<String>,
    pub status: Option<String>,
}

/// PUT body. Absent fields are left unchanged; a blank password keeps the
/// current one.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateAccountRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub level: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusChangeRequest {
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkStatusRequest {
    #[serde(alias = "ids")]
    pub user_ids: Option<Vec<String>>,
    pub status: Option<String>,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_name(name: &str) -> Result<String, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("Name is required"));
    }
    Ok(name.to_string())
}

fn validate_email(email: &str) -> Result<String, ApiError> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(ApiError::validation("Email is required"));
    }
    if !EMAIL_REGEX.is_match(&email) {
        return Err(ApiError::validation("Please enter a valid email"));
    }
    Ok(email)
}

fn validate_password(password: &str) -> Result<String, ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    hash_password(password).map_err(|e| ApiError::internal(format!("password hashing failed: {e}")))
}

fn parse_level(level: Option<&str>) -> Result<Option<Level>, ApiError> {
    level.map(|l| l.parse().map_err(ApiError::from)).transpose()
}

fn parse_status(status: Option<&str>) -> Result<Option<AccountStatus>, ApiError> {
    status.map(|s| s.parse().map_err(ApiError::from)).transpose()
}

impl CreateAccountRequest {
    /// Validate and hash into a store insert.
    pub fn into_new_account(self) -> Result<NewAccount, ApiError> {
        let name = validate_name(self.name.as_deref().unwrap_or_default())?;
        let email = validate_email(self.email.as_deref().unwrap_or_default())?;
        let password = self
            .password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ApiError::validation("Password is required"))?;
        let password_hash = validate_password(&password)?;

        Ok(NewAccount {
            name,
            email,
            password_hash,
            level: parse_level(self.level.as_deref())?.unwrap_or_default(),
            status: parse_status(self.status.as_deref())?.unwrap_or_default(),
        })
    }
}

impl UpdateAccountRequest {
    /// Validate present fields into a store patch.
    pub fn into_patch(self) -> Result<AccountPatch, ApiError> {
        // Blank means "keep"; anything else is stored as given
        let password_hash = match self.password.as_deref() {
            Some(p) if !p.trim().is_empty() => Some(validate_password(p)?),
            _ => None,
        };

        Ok(AccountPatch {
            name: self.name.as_deref().map(validate_name).transpose()?,
            email: self.email.as_deref().map(validate_email).transpose()?,
            password_hash,
            level: parse_level(self.level.as_deref())?,
            status: parse_status(self.status.as_deref())?,
        })
    }
}

impl LoginRequest {
    /// Both fields, email normalized.
    pub fn credentials(&self) -> Result<(String, &str), ApiError> {
        match (self.email.as_deref(), self.password.as_deref()) {
            (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
                Ok((normalize_email(email), password))
            }
            _ => Err(ApiError::validation(
                "Please provide both email and password",
            )),
        }
    }
}
