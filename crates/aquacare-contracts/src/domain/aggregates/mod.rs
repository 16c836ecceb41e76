//! Aggregates module

pub mod account;
pub mod contract;
pub mod customer;
pub mod plan;
pub mod ticket;
pub mod visit;

pub use account::WebAccount;
pub use contract::{
    term_end, ArchiveReason, Contract, ContractKind, ContractOrigin, ContractStatus, LifecycleError,
    NewContract, OrderKey, PaymentState,
};
pub use customer::{CustomerError, CustomerProfile, CustomerType, NewCustomer};
pub use plan::{CatalogItem, PlanTemplate};
pub use ticket::{ComplaintTicket, ComplaintType, TicketPriority, TicketStatus, TicketUpdate};
pub use visit::{MirrorOutcome, ServiceCategory, ServiceVisitEntry, TicketMirror, VisitDetails, VisitStatus};
