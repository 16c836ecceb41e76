//! Infrastructure layer
//!
//! Concrete adapters for the outbound ports, plus the pieces that run
//! outside a request: legacy document migration and the expiry sweep.

pub mod clock;
pub mod migration;
pub mod notifications;
pub mod persistence;
pub mod scheduler;
pub mod snapshot;

pub use clock::{FixedClock, SystemClock};
pub use migration::{ContractMigrator, MigrationError};
pub use notifications::{RecordingNotificationSink, TracingNotificationSink};
pub use persistence::{
    InMemoryAccountDirectory, InMemoryContractRepository, InMemoryCustomerRepository, InMemoryItemCatalog,
    InMemoryPlanCatalog,
};
pub use scheduler::SweepScheduler;
pub use snapshot::{LoadReport, Snapshot, SnapshotError};
