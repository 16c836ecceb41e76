//! In-memory adapters
//!
//! Both stores enforce the same guarantees a document database would give
//! the engine: unique keys on insert and compare-and-set on update.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::domain::aggregates::{CatalogItem, Contract, ContractStatus, CustomerProfile, PlanTemplate, WebAccount};
use crate::domain::services::MatchQuery;
use crate::domain::value_objects::Phone;
use crate::domain::value_objects::{AccountId, ContractId, CustomerId, ItemRef, OrderId, PlanId, TicketId};
use crate::ports::outbound::{
    AccountDirectory, ContractRepository, CustomerRepository, ItemCatalog, PlanCatalog, RepositoryError,
};

fn national(mobile: &str) -> Option<String> {
    Phone::new(mobile).ok().map(|p| p.national_number().to_string())
}

fn sorted<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    items.sort_by_key(|item| key(item));
    items
}

// =============================================================================
// Customer profiles
// =============================================================================

/// In-memory customer profile store
#[derive(Default)]
pub struct InMemoryCustomerRepository {
    profiles: RwLock<HashMap<CustomerId, CustomerProfile>>,
}

impl InMemoryCustomerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn stored(profile: &CustomerProfile, version: u64) -> CustomerProfile {
        let mut copy = profile.clone();
        copy.take_events();
        for contract in copy.current_contracts_mut() {
            contract.take_events();
        }
        for contract in copy.archive_mut() {
            contract.take_events();
        }
        copy.set_version(version);
        copy
    }

    fn select(&self, pred: impl Fn(&CustomerProfile) -> bool) -> Vec<CustomerProfile> {
        let profiles = self.profiles.read();
        let found: Vec<CustomerProfile> = profiles.values().filter(|p| pred(p)).cloned().collect();
        sorted(found, |p| (p.created_at(), p.id().clone()))
    }
}

#[async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<CustomerProfile>, RepositoryError> {
        Ok(self.profiles.read().get(id).cloned())
    }

    async fn find_matching(&self, query: &MatchQuery) -> Result<Vec<CustomerProfile>, RepositoryError> {
        if query.is_empty() {
            return Ok(vec![]);
        }
        Ok(self.select(|p| query.matches_profile(p)))
    }

    async fn find_by_ticket(&self, ticket_id: &TicketId) -> Result<Option<CustomerProfile>, RepositoryError> {
        Ok(self.select(|p| p.ticket(ticket_id).is_some()).into_iter().next())
    }

    async fn find_by_contract(&self, contract_id: &ContractId) -> Result<Option<CustomerProfile>, RepositoryError> {
        Ok(self.select(|p| p.current_by_id(contract_id).is_some()).into_iter().next())
    }

    async fn insert(&self, profile: &CustomerProfile) -> Result<(), RepositoryError> {
        let mut profiles = self.profiles.write();
        if profiles.contains_key(profile.id()) {
            return Err(RepositoryError::DuplicateKey(profile.id().to_string()));
        }
        let mobile = national(profile.mobile());
        if mobile.is_some() && profiles.values().any(|p| national(p.mobile()) == mobile) {
            return Err(RepositoryError::DuplicateKey(format!("mobile {}", profile.mobile())));
        }
        profiles.insert(profile.id().clone(), Self::stored(profile, profile.version()));
        Ok(())
    }

    async fn update(&self, profile: &CustomerProfile) -> Result<u64, RepositoryError> {
        let mut profiles = self.profiles.write();
        let current = profiles.get(profile.id()).ok_or(RepositoryError::NotFound)?;
        if current.version() != profile.version() {
            return Err(RepositoryError::VersionConflict {
                expected: profile.version(),
                found: current.version(),
            });
        }
        let version = profile.version() + 1;
        profiles.insert(profile.id().clone(), Self::stored(profile, version));
        Ok(version)
    }

    async fn list_all(&self) -> Result<Vec<CustomerProfile>, RepositoryError> {
        Ok(self.select(|_| true))
    }
}

// =============================================================================
// Self-service contract records
// =============================================================================

/// In-memory self-service contract store
#[derive(Default)]
pub struct InMemoryContractRepository {
    contracts: RwLock<HashMap<ContractId, Contract>>,
}

impl InMemoryContractRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn stored(contract: &Contract, version: u64) -> Contract {
        let mut copy = contract.clone();
        copy.take_events();
        copy.set_version(version);
        copy
    }

    fn select(&self, pred: impl Fn(&Contract) -> bool) -> Vec<Contract> {
        let contracts = self.contracts.read();
        let found: Vec<Contract> = contracts.values().filter(|c| pred(c)).cloned().collect();
        sorted(found, |c| (c.created_at(), c.id().clone()))
    }
}

#[async_trait]
impl ContractRepository for InMemoryContractRepository {
    async fn find_by_id(&self, id: &ContractId) -> Result<Option<Contract>, RepositoryError> {
        Ok(self.contracts.read().get(id).cloned())
    }

    async fn find_by_account(&self, account_id: &AccountId) -> Result<Vec<Contract>, RepositoryError> {
        Ok(self.select(|c| c.account_id() == Some(account_id)))
    }

    async fn find_by_order(&self, order_id: &OrderId) -> Result<Vec<Contract>, RepositoryError> {
        Ok(self.select(|c| c.order_id() == Some(order_id)))
    }

    async fn find_by_visit_ticket(&self, ticket_id: &TicketId) -> Result<Option<Contract>, RepositoryError> {
        Ok(self.select(|c| c.visit_for_ticket(ticket_id).is_some()).into_iter().next())
    }

    async fn find_active_ending_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Contract>, RepositoryError> {
        Ok(self.select(|c| c.status() == ContractStatus::Active && c.end_date() < cutoff))
    }

    async fn list_all(&self) -> Result<Vec<Contract>, RepositoryError> {
        Ok(self.select(|_| true))
    }

    async fn insert(&self, contract: &Contract) -> Result<(), RepositoryError> {
        let mut contracts = self.contracts.write();
        if contracts.contains_key(contract.id()) {
            return Err(RepositoryError::DuplicateKey(contract.id().to_string()));
        }
        if let Some(key) = contract.order_key() {
            if contracts.values().any(|c| c.order_key().as_ref() == Some(&key)) {
                return Err(RepositoryError::DuplicateKey(format!("order {}", key.order_id)));
            }
        }
        contracts.insert(contract.id().clone(), Self::stored(contract, contract.version()));
        Ok(())
    }

    async fn update(&self, contract: &Contract) -> Result<u64, RepositoryError> {
        let mut contracts = self.contracts.write();
        let current = contracts.get(contract.id()).ok_or(RepositoryError::NotFound)?;
        if current.version() != contract.version() {
            return Err(RepositoryError::VersionConflict {
                expected: contract.version(),
                found: current.version(),
            });
        }
        let version = contract.version() + 1;
        contracts.insert(contract.id().clone(), Self::stored(contract, version));
        Ok(version)
    }
}

// =============================================================================
// Read-only collaborators
// =============================================================================

/// Web accounts known to the authentication collaborator
#[derive(Default)]
pub struct InMemoryAccountDirectory {
    accounts: DashMap<AccountId, WebAccount>,
}

impl InMemoryAccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, account: WebAccount) {
        self.accounts.insert(account.id.clone(), account);
    }
}

#[async_trait]
impl AccountDirectory for InMemoryAccountDirectory {
    async fn find_account(&self, id: &AccountId) -> Result<Option<WebAccount>, RepositoryError> {
        Ok(self.accounts.get(id).map(|a| a.value().clone()))
    }

    async fn find_matching(&self, query: &MatchQuery) -> Result<Vec<WebAccount>, RepositoryError> {
        if query.is_empty() {
            return Ok(vec![]);
        }
        let found: Vec<WebAccount> = self
            .accounts
            .iter()
            .filter(|a| query.matches_account(a.value()))
            .map(|a| a.value().clone())
            .collect();
        Ok(sorted(found, |a| a.id.clone()))
    }
}

#[derive(Default)]
pub struct InMemoryPlanCatalog {
    plans: DashMap<PlanId, PlanTemplate>,
}

impl InMemoryPlanCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, plan: PlanTemplate) {
        self.plans.insert(plan.id.clone(), plan);
    }
}

#[async_trait]
impl PlanCatalog for InMemoryPlanCatalog {
    async fn get_plan(&self, id: &PlanId) -> Result<Option<PlanTemplate>, RepositoryError> {
        Ok(self.plans.get(id).map(|p| p.value().clone()))
    }
}

/// Products and parts keyed by their tagged reference
#[derive(Default)]
pub struct InMemoryItemCatalog {
    items: DashMap<ItemRef, CatalogItem>,
}

impl InMemoryItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, item: ItemRef, entry: CatalogItem) {
        self.items.insert(item, entry);
    }
}

#[async_trait]
impl ItemCatalog for InMemoryItemCatalog {
    async fn lookup(&self, item: &ItemRef) -> Result<Option<CatalogItem>, RepositoryError> {
        Ok(self.items.get(item).map(|i| i.value().clone()))
    }
}
