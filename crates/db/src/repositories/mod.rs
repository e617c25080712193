//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.
//! Each operation runs in its own transaction scoped to one organization.

pub mod invoice;
pub mod organization;
pub mod reconciliation;
pub mod trust;

pub use invoice::InvoiceRepository;
pub use organization::OrganizationRepository;
pub use reconciliation::ReconciliationRepository;
pub use trust::TrustRepository;
