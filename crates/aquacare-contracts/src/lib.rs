//! AquaCare Contract Engine
//!
//! Lifecycle of water-purifier maintenance (AMC) and rental contracts, and
//! reconciliation between self-registered web accounts and the offline
//! customer profiles the service team maintains.
//!
//! ## Architecture
//!
//! - **Domain Layer**: contract and customer aggregates, value objects, events
//!   and the pure lifecycle, identity and sync rules
//! - **Application Layer**: use case orchestration over version-checked stores
//! - **Ports Layer**: hexagonal interfaces for stores, catalogs and notifications
//! - **Infrastructure Layer**: in-memory adapters, legacy document migration and
//!   the periodic expiry sweep
//!
//! ## Two stores, one contract
//!
//! A contract lives either as a self-service record (created from a web order)
//! or embedded in a customer profile as its current AMC or rental, and often as
//! both. Reads merge the two; writes go to the owning copy first and mirror
//! into the other.

pub mod domain;
pub mod application;
pub mod ports;
pub mod infrastructure;
pub mod config;
pub mod error;

// Re-exports for convenience
pub use domain::aggregates::{
    ComplaintTicket, Contract, ContractKind, ContractOrigin, ContractStatus, CustomerProfile, NewCustomer,
    PaymentState, PlanTemplate, ServiceVisitEntry, VisitDetails, WebAccount,
};
pub use domain::value_objects::{AccountId, ContractId, CustomerId, Money, OrderId, PlanId, TicketId};
pub use domain::events::{ContractEvent, CustomerEvent, DomainEvent};
pub use application::{ContractService, ServicePorts};
pub use ports::inbound::ContractUseCases;
pub use ports::outbound::{Clock, ContractRepository, CustomerRepository, RepositoryError};
pub use config::{ConfigError, EngineConfig};
pub use error::{Anomaly, ContractError, ContractResult, ErrorKind};
