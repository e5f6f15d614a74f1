//! Coach accounts: validation, password hashing, coordinated mutations.

pub mod coordinator;
pub mod handlers;
pub mod password;
pub mod validation;

pub use coordinator::{
    BulkStatusRecord, CoordinatorError, DeletionOutcome, StatusChangeOutcome, StatusCoordinator,
    StatusTransition, UpdateOutcome,
};
