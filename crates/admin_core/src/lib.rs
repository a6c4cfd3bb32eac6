pub mod access;
pub mod actions;
pub mod audit;
pub mod dashboard;
mod foundations;
pub mod list;
pub mod render;
pub mod system;

pub use access::{AccessError, AccessValidator, AdminPrincipal, Session, ADMIN_LOGIN};
pub use actions::{
    Action, ActionDispatcher, ActionOutcome, DispatchError, PetUpdate, ReportDecision, RowActions,
    UserUpdate,
};
pub use audit::AuditLog;
pub use dashboard::{DashboardStats, ReportTally};
pub use list::{ListController, ListState, LoadOutcome, PageChange, PageInfo};
pub use render::{project_page, DisplayRow, Project, TrustTier};
pub use system::{list_breeds, BreedDraft};

use shared::domain::{DeletionRequest, Foundation, Pet, Report, User};

pub type UserList = ListController<User>;
pub type PetList = ListController<Pet>;
pub type ReportList = ListController<Report>;
pub type FoundationList = ListController<Foundation>;
pub type DeletionRequestList = ListController<DeletionRequest>;

#[cfg(test)]
#[path = "tests/stub_gateway.rs"]
pub(crate) mod stub_gateway;
