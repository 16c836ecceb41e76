//! Outbound ports (Repository traits)
//!
//! Hexagonal architecture: these are the interfaces that infrastructure must implement.
//!
//! Both stores are version-checked: `update` succeeds only when the stored
//! version equals the version carried by the entity, and returns the new one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::{CatalogItem, Contract, CustomerProfile, PlanTemplate, WebAccount};
use crate::domain::services::MatchQuery;
use crate::domain::value_objects::{AccountId, ContractId, CustomerId, ItemRef, OrderId, PlanId, TicketId};

/// Customer profile store
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<CustomerProfile>, RepositoryError>;

    /// Profiles whose mobile or email satisfies the query
    async fn find_matching(&self, query: &MatchQuery) -> Result<Vec<CustomerProfile>, RepositoryError>;

    /// Profile holding the complaint ticket
    async fn find_by_ticket(&self, ticket_id: &TicketId) -> Result<Option<CustomerProfile>, RepositoryError>;

    /// Profile whose current AMC or rental carries this id
    async fn find_by_contract(&self, contract_id: &ContractId) -> Result<Option<CustomerProfile>, RepositoryError>;

    /// Insert a new profile. Id and mobile number are unique.
    async fn insert(&self, profile: &CustomerProfile) -> Result<(), RepositoryError>;

    /// Conditional write; returns the new version
    async fn update(&self, profile: &CustomerProfile) -> Result<u64, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<CustomerProfile>, RepositoryError>;
}

/// Self-service contract store
#[async_trait]
pub trait ContractRepository: Send + Sync {
    async fn find_by_id(&self, id: &ContractId) -> Result<Option<Contract>, RepositoryError>;

    async fn find_by_account(&self, account_id: &AccountId) -> Result<Vec<Contract>, RepositoryError>;

    async fn find_by_order(&self, order_id: &OrderId) -> Result<Vec<Contract>, RepositoryError>;

    /// Contract whose service history references the ticket
    async fn find_by_visit_ticket(&self, ticket_id: &TicketId) -> Result<Option<Contract>, RepositoryError>;

    /// Persisted-Active contracts whose term ended before `cutoff`
    async fn find_active_ending_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Contract>, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<Contract>, RepositoryError>;

    /// Insert a new contract. Id and (order, item, plan) are unique.
    async fn insert(&self, contract: &Contract) -> Result<(), RepositoryError>;

    /// Conditional write; returns the new version
    async fn update(&self, contract: &Contract) -> Result<u64, RepositoryError>;
}

/// Read-only view of the authentication collaborator's accounts
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn find_account(&self, id: &AccountId) -> Result<Option<WebAccount>, RepositoryError>;

    async fn find_matching(&self, query: &MatchQuery) -> Result<Vec<WebAccount>, RepositoryError>;
}

#[async_trait]
pub trait PlanCatalog: Send + Sync {
    async fn get_plan(&self, id: &PlanId) -> Result<Option<PlanTemplate>, RepositoryError>;
}

/// Products and parts behind one lookup
#[async_trait]
pub trait ItemCatalog: Send + Sync {
    async fn lookup(&self, item: &ItemRef) -> Result<Option<CatalogItem>, RepositoryError>;
}

/// Fire-and-forget delivery; failures are logged by the caller and dropped.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), RepositoryError>;
}

/// Source of "now" for every lifecycle decision
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub customer_id: Option<CustomerId>,
    pub contract_id: Option<ContractId>,
    pub message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    ContractCreated,
    ContractActivated,
    ContractRenewed,
    ContractCancelled,
    ContractExpired,
    ServiceRequested,
    ComplaintOpened,
}

/// Repository error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("entity not found")]
    NotFound,
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
    #[error("version conflict: expected {expected}, found {found}")]
    VersionConflict { expected: u64, found: u64 },
    #[error("connection error: {0}")]
    ConnectionError(String),
    #[error("serialization error: {0}")]
    SerializationError(String),
}
