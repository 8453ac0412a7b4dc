//! Client state and API access for the catering operations dashboard.

pub mod api;
pub mod error;
pub mod events;
pub mod inflight;
pub mod menu_store;
pub mod session;
pub mod user_store;
pub mod work_detail;
pub mod work_store;

pub use api::{ApiClient, DEFAULT_REQUEST_TIMEOUT};
pub use error::{CascadeError, NotSignedIn, ReconcileError, RequestInFlight, ValidationError};
pub use events::{ClientEvent, NoticeLevel, Notifier};
pub use menu_store::{CascadeReport, CascadeScope, MenuItemDraft, MenuStore};
pub use session::{Dashboard, ProfileUpdate};
pub use user_store::{NewUser, UserStore};
pub use work_detail::{DetailEdit, WorkDetail};
pub use work_store::{StaffPayment, WorkDraft, WorkEdit, WorkStore};

#[cfg(test)]
#[path = "tests/mock_api.rs"]
mod mock_api;
