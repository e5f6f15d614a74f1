//! Core domain types shared by the Upstep crates.

pub mod account;
pub mod error;
pub mod listing;
pub mod timestamp;

pub use account::{Account, AccountStatus, AccountView, Level};
pub use error::{CoreError, Result};
pub use listing::{FileInfo, ListingKey, display_name_for};
pub use timestamp::{format_rfc3339, now_rfc3339};
