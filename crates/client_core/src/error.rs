use rust_decimal::Decimal;
use shared::domain::{MenuItemId, Role, UserId};
use thiserror::Error;

/// Input rejected locally, before any request is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Missing { field: &'static str },
    #[error("{field} must be a number")]
    NotANumber { field: &'static str },
    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },
    #[error("{field} must not be negative")]
    Negative { field: &'static str },
    #[error("end time must be after start time")]
    EndBeforeStart,
    #[error("assign at least one staff member")]
    NoStaffAssigned,
    #[error("Image is required")]
    MissingImage,
    #[error("'{0}' is reserved and cannot be used as a category name")]
    ReservedCategory(String),
    #[error("category '{0}' already exists")]
    DuplicateCategory(String),
    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),
    #[error("password must be at least {min} characters")]
    PasswordTooShort { min: usize },
    #[error("accounts cannot be created with role {0}")]
    RoleNotCreatable(Role),
    #[error("a {actor} cannot change a {target} account to {requested}")]
    RoleChangeNotPermitted {
        actor: Role,
        target: Role,
        requested: Role,
    },
    #[error("a {actor} cannot delete a {target} account")]
    RemovalNotPermitted { actor: Role, target: Role },
    #[error("payments totalling {total_paid} exceed the allocated budget of {budget}")]
    Overpayment { budget: Decimal, total_paid: Decimal },
    #[error("page numbers start at 1")]
    InvalidPage,
    #[error("staff member {0} is not assigned to this work")]
    UnknownStaff(UserId),
    #[error("user {0} is not loaded")]
    UnknownUser(UserId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} is already in progress")]
pub struct RequestInFlight {
    pub operation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("not signed in")]
pub struct NotSignedIn;

/// Outcome of a staff payment whose follow-up budget write failed.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The payment was reverted; server state matches what it was before.
    #[error("budget update failed, payment for {staff_id} was rolled back: {source}")]
    RolledBack {
        staff_id: UserId,
        source: anyhow::Error,
    },
    /// The payment is stored but the budget is stale. `expected_budget` is the
    /// value the work order should carry.
    #[error(
        "payment for {staff_id} is saved but the budget could not be set to {expected_budget}: {source} (rollback failed: {rollback_error})"
    )]
    Diverged {
        staff_id: UserId,
        expected_budget: Decimal,
        source: anyhow::Error,
        rollback_error: String,
    },
}

/// A category delete whose item cascade stopped part way. The category itself
/// is already gone.
#[derive(Debug, Error)]
#[error(
    "category '{category}' deleted, but {} item(s) could not be removed after {} succeeded: {source}",
    .remaining.len(),
    .deleted.len()
)]
pub struct CascadeError {
    pub category: String,
    pub deleted: Vec<MenuItemId>,
    pub remaining: Vec<MenuItemId>,
    pub source: anyhow::Error,
}
