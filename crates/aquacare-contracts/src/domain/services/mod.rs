//! Domain services module
//!
//! Stateless rules over aggregates. Nothing here touches storage.

pub mod factory;
pub mod identity;
pub mod ledger;
pub mod lifecycle;
pub mod sync;

pub use factory::{
    generate_id, AdminTerms, ContractFactory, CreationContext, EnquiryTerms, OrderTerms, RenewalTerms,
};
pub use identity::{IdentityResolver, MatchQuery, Resolution};
pub use ledger::ServiceVisitLedger;
pub use lifecycle::LifecycleManager;
pub use sync::{ContractSource, Enrichment, Link, ResolvedContract, SyncBridge};
