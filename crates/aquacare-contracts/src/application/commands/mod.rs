//! Command handlers
//!
//! `ContractService` orchestrates the domain services over the outbound
//! ports. Every write is a version-checked read-modify-write, retried a
//! bounded number of times when another writer got there first.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::application::dto::*;
use crate::application::queries::ContractQueries;
use crate::config::EngineConfig;
use crate::domain::aggregates::{
    ArchiveReason, ComplaintTicket, Contract, ContractKind, ContractStatus, CustomerProfile, LifecycleError,
    NewCustomer, PlanTemplate, ServiceVisitEntry, TicketUpdate, VisitDetails, WebAccount,
};
use crate::domain::events::{ContractEvent, CustomerEvent, DomainEvent};
use crate::domain::services::{
    ContractFactory, ContractSource, CreationContext, EnquiryTerms, IdentityResolver, LifecycleManager, Link,
    MatchQuery, OrderTerms, RenewalTerms, Resolution, ServiceVisitLedger, SyncBridge,
};
use crate::domain::value_objects::{AccountId, ContractId, CustomerId, OrderId, PlanId, TicketId};
use crate::error::{ContractError, ContractResult};
use crate::ports::inbound::ContractUseCases;
use crate::ports::outbound::{
    AccountDirectory, Clock, ContractRepository, CustomerRepository, ItemCatalog, Notification, NotificationKind,
    NotificationSink, PlanCatalog, RepositoryError,
};

/// Outbound adapters the service is wired with
#[derive(Clone)]
pub struct ServicePorts {
    pub customers: Arc<dyn CustomerRepository>,
    pub contracts: Arc<dyn ContractRepository>,
    pub accounts: Arc<dyn AccountDirectory>,
    pub plans: Arc<dyn PlanCatalog>,
    pub items: Arc<dyn ItemCatalog>,
    pub notifier: Arc<dyn NotificationSink>,
    pub clock: Arc<dyn Clock>,
}

/// Contract application service
pub struct ContractService {
    customers: Arc<dyn CustomerRepository>,
    contracts: Arc<dyn ContractRepository>,
    accounts: Arc<dyn AccountDirectory>,
    plans: Arc<dyn PlanCatalog>,
    items: Arc<dyn ItemCatalog>,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    factory: ContractFactory,
    ledger: ServiceVisitLedger,
    config: EngineConfig,
}

/// Result of a mutation closure: whether the document needs writing.
enum Step<T> {
    Write(T),
    Skip(T),
}

impl ContractService {
    pub fn new(ports: ServicePorts, config: EngineConfig) -> Self {
        Self {
            customers: ports.customers,
            contracts: ports.contracts,
            accounts: ports.accounts,
            plans: ports.plans,
            items: ports.items,
            notifier: ports.notifier,
            clock: ports.clock,
            factory: ContractFactory::new(config.default_duration_months, config.default_rental_quota),
            ledger: ServiceVisitLedger::new(config.ticket_prefix.clone()),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // =========================================================================
    // Loading
    // =========================================================================

    async fn load_contract(&self, id: &ContractId) -> ContractResult<Contract> {
        self.contracts
            .find_by_id(id)
            .await?
            .ok_or_else(|| ContractError::contract_not_found(id))
    }

    async fn load_profile(&self, id: &CustomerId) -> ContractResult<CustomerProfile> {
        self.customers
            .find_by_id(id)
            .await?
            .ok_or_else(|| ContractError::customer_not_found(id))
    }

    async fn load_plan(&self, id: &PlanId) -> ContractResult<PlanTemplate> {
        self.plans
            .get_plan(id)
            .await?
            .ok_or_else(|| ContractError::NotFound(format!("plan {id}")))
    }

    async fn resolve_account(&self, account: &WebAccount) -> ContractResult<Resolution> {
        let query = MatchQuery::for_account(account);
        if query.is_empty() {
            return Ok(Resolution::default());
        }
        let candidates = self.customers.find_matching(&query).await?;
        Ok(IdentityResolver::pick(Some(&account.id), candidates))
    }

    /// Find a profile by mobile/email or create it. A concurrent creator
    /// shows up as a unique-mobile violation and is re-resolved.
    async fn ensure_profile(&self, account_id: Option<&AccountId>, new: NewCustomer) -> ContractResult<CustomerProfile> {
        let query = MatchQuery::new(Some(new.mobile.as_str()), new.email.as_deref());
        if let Some(existing) = IdentityResolver::pick(account_id, self.customers.find_matching(&query).await?).profile {
            return Ok(existing);
        }

        let mut profile = CustomerProfile::create(new, self.now())?;
        match self.customers.insert(&profile).await {
            Ok(()) => {
                tracing::info!(customer_id = %profile.id(), "Created customer profile");
                let events = profile.take_events();
                self.publish(events, Some(profile.id())).await;
                Ok(profile)
            }
            Err(RepositoryError::DuplicateKey(key)) => {
                tracing::debug!(key = %key, "Profile created concurrently, re-resolving");
                IdentityResolver::pick(account_id, self.customers.find_matching(&query).await?)
                    .profile
                    .ok_or_else(|| ContractError::Conflict(format!("customer {key} already exists")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The profile that should mirror a self-service contract.
    async fn profile_for(&self, contract: &Contract) -> ContractResult<Option<CustomerProfile>> {
        if let Some(profile) = self.customers.find_by_contract(contract.id()).await? {
            return Ok(Some(profile));
        }
        match contract.account_id() {
            Some(account_id) => self.resolve_customer(account_id).await,
            None => Ok(None),
        }
    }

    // =========================================================================
    // Conditional writes
    // =========================================================================

    async fn update_contract<T, F>(&self, id: &ContractId, mut apply: F) -> ContractResult<(Contract, T)>
    where
        F: FnMut(&mut Contract) -> ContractResult<Step<T>> + Send,
        T: Send,
    {
        for attempt in 1..=self.config.max_update_retries {
            let mut contract = self.load_contract(id).await?;
            let value = match apply(&mut contract)? {
                Step::Skip(value) => return Ok((contract, value)),
                Step::Write(value) => value,
            };
            match self.contracts.update(&contract).await {
                Ok(version) => {
                    contract.set_version(version);
                    return Ok((contract, value));
                }
                Err(RepositoryError::VersionConflict { expected, found }) => {
                    tracing::debug!(contract_id = %id, attempt, expected, found, "Contract write lost a race, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(ContractError::Conflict(format!("contract {id} kept changing; gave up after retries")))
    }

    async fn update_profile<T, F>(&self, id: &CustomerId, mut apply: F) -> ContractResult<(CustomerProfile, T)>
    where
        F: FnMut(&mut CustomerProfile) -> ContractResult<Step<T>> + Send,
        T: Send,
    {
        for attempt in 1..=self.config.max_update_retries {
            let mut profile = self.load_profile(id).await?;
            let value = match apply(&mut profile)? {
                Step::Skip(value) => return Ok((profile, value)),
                Step::Write(value) => value,
            };
            match self.customers.update(&profile).await {
                Ok(version) => {
                    profile.set_version(version);
                    let events = profile.take_events();
                    self.publish(events, Some(id)).await;
                    return Ok((profile, value));
                }
                Err(RepositoryError::VersionConflict { expected, found }) => {
                    tracing::debug!(customer_id = %id, attempt, expected, found, "Profile write lost a race, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(ContractError::Conflict(format!("customer {id} kept changing; gave up after retries")))
    }

    /// Copy a self-service contract into the profile that embeds it.
    /// The record is already committed, so failures are logged only.
    async fn mirror_into_profile(&self, contract: &Contract) {
        let now = self.now();
        let profile = match self.customers.find_by_contract(contract.id()).await {
            Ok(Some(profile)) => profile,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(contract_id = %contract.id(), error = %e, "Cannot load profile for sync");
                return;
            }
        };
        let result = self
            .update_profile(profile.id(), |p| {
                Ok(if p.sync_current(contract, now) { Step::Write(()) } else { Step::Skip(()) })
            })
            .await;
        if let Err(e) = result {
            tracing::warn!(contract_id = %contract.id(), error = %e, "Profile copy not updated");
        }
    }

    /// Archive a self-service record that a profile just replaced.
    async fn archive_record(&self, id: &ContractId, reason: ArchiveReason) {
        let now = self.now();
        match self.contracts.find_by_id(id).await {
            Ok(Some(_)) => {}
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(contract_id = %id, error = %e, "Cannot load replaced contract");
                return;
            }
        }
        let result = self
            .update_contract(id, |c| {
                if c.archived().is_some() {
                    return Ok(Step::Skip(()));
                }
                c.archive(reason, now);
                Ok(Step::Write(()))
            })
            .await;
        match result {
            Ok((mut contract, ())) => self.publish(contract.take_events(), None).await,
            Err(e) => tracing::warn!(contract_id = %id, error = %e, "Replaced contract not archived"),
        }
    }

    /// Install a new contract on a profile, archiving whatever it replaces
    /// in both stores.
    async fn install_on_profile(&self, customer_id: &CustomerId, contract: &Contract) -> ContractResult<CustomerProfile> {
        let now = self.now();
        let (profile, replaced) = self
            .update_profile(customer_id, |p| {
                if p.current_by_id(contract.id()).is_some() {
                    return Ok(Step::Skip(None));
                }
                Ok(Step::Write(LifecycleManager::install(p, contract.clone(), now)))
            })
            .await?;
        if let Some(replaced) = replaced {
            self.archive_record(&replaced, ArchiveReason::Replaced).await;
        }
        Ok(profile)
    }

    /// Apply a state transition wherever the contract lives.
    async fn transition<F>(
        &self,
        account_id: Option<&AccountId>,
        contract_id: &ContractId,
        apply: F,
    ) -> ContractResult<Contract>
    where
        F: Fn(&mut Contract, DateTime<Utc>) -> Result<(), LifecycleError> + Send + Sync,
    {
        let now = self.now();

        if let Some(record) = self.contracts.find_by_id(contract_id).await? {
            if account_id.is_some() && record.account_id() != account_id {
                return Err(ContractError::contract_not_found(contract_id));
            }
            let (mut contract, ()) = self
                .update_contract(contract_id, |c| {
                    apply(c, now)?;
                    Ok(Step::Write(()))
                })
                .await?;
            let events = contract.take_events();
            let customer = match self.customers.find_by_contract(contract_id).await {
                Ok(customer) => customer,
                Err(e) => {
                    tracing::warn!(contract_id = %contract_id, error = %e, "Cannot load profile for notification");
                    None
                }
            };
            self.publish(events, customer.as_ref().map(|p| p.id())).await;
            self.mirror_into_profile(&contract).await;
            return Ok(contract);
        }

        let profile = self
            .customers
            .find_by_contract(contract_id)
            .await?
            .ok_or_else(|| ContractError::contract_not_found(contract_id))?;
        if let Some(account_id) = account_id {
            let owner = self.resolve_customer(account_id).await?;
            if owner.map(|o| o.id().clone()).as_ref() != Some(profile.id()) {
                return Err(ContractError::contract_not_found(contract_id));
            }
        }

        let (_, (contract, events)) = self
            .update_profile(profile.id(), |p| {
                let contract = p
                    .current_by_id_mut(contract_id)
                    .ok_or_else(|| ContractError::contract_not_found(contract_id))?;
                apply(contract, now)?;
                let events = contract.take_events();
                Ok(Step::Write((contract.clone(), events)))
            })
            .await?;
        self.publish(events, Some(profile.id())).await;
        Ok(contract)
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    async fn publish(&self, events: Vec<DomainEvent>, customer_id: Option<&CustomerId>) {
        for event in events {
            tracing::debug!(event_type = event.event_type(), aggregate_id = event.aggregate_id(), "Domain event");
            let Some(notification) = notification_for(&event, customer_id) else {
                continue;
            };
            if let Err(e) = self.notifier.notify(notification).await {
                tracing::warn!(event_type = event.event_type(), error = %e, "Notification dropped");
            }
        }
    }

    async fn view(&self, contract: &Contract, source: ContractSource, now: DateTime<Utc>) -> ContractResult<ContractView> {
        let needs_plan = contract.amount().is_none()
            || contract.product_image().is_none()
            || contract.plan_name().trim().is_empty();
        let plan = match (needs_plan, contract.plan_id()) {
            (true, Some(plan_id)) => self.plans.get_plan(plan_id).await?,
            _ => None,
        };
        Ok(ContractView::build(contract, source, SyncBridge::enrich(contract, plan.as_ref()), now))
    }

    async fn visible_contracts(&self, account_id: &AccountId) -> ContractResult<(Vec<Contract>, Option<CustomerProfile>)> {
        let records = self.contracts.find_by_account(account_id).await?;
        let profile = self.resolve_customer(account_id).await?;
        Ok((records, profile))
    }
}

fn notification_for(event: &DomainEvent, customer_id: Option<&CustomerId>) -> Option<Notification> {
    let customer_id = customer_id.cloned();
    let (kind, contract_id, message) = match event {
        DomainEvent::Contract(ContractEvent::Created { contract_id, kind, status, .. }) => (
            NotificationKind::ContractCreated,
            Some(contract_id.clone()),
            format!("New {kind:?} contract {contract_id} ({status:?})"),
        ),
        DomainEvent::Contract(ContractEvent::Activated { contract_id, .. }) => (
            NotificationKind::ContractActivated,
            Some(contract_id.clone()),
            format!("Contract {contract_id} is now active"),
        ),
        DomainEvent::Contract(ContractEvent::Expired { contract_id, .. }) => (
            NotificationKind::ContractExpired,
            Some(contract_id.clone()),
            format!("Contract {contract_id} has expired"),
        ),
        DomainEvent::Contract(ContractEvent::Cancelled { contract_id, reason, .. }) => (
            NotificationKind::ContractCancelled,
            Some(contract_id.clone()),
            format!("Contract {contract_id} cancelled: {reason}"),
        ),
        DomainEvent::Contract(ContractEvent::Archived { contract_id, reason: ArchiveReason::Renewed }) => (
            NotificationKind::ContractRenewed,
            Some(contract_id.clone()),
            format!("Contract {contract_id} renewed"),
        ),
        DomainEvent::Contract(ContractEvent::VisitRequested {
            contract_id,
            ticket_id,
            services_used,
            services_total,
        }) => (
            NotificationKind::ServiceRequested,
            Some(contract_id.clone()),
            format!("Service visit {ticket_id} requested on {contract_id} ({services_used}/{services_total})"),
        ),
        DomainEvent::Customer(CustomerEvent::TicketOpened { ticket_id, .. }) => (
            NotificationKind::ComplaintOpened,
            None,
            format!("Ticket {ticket_id} opened"),
        ),
        _ => return None,
    };
    Some(Notification { kind, customer_id, contract_id, message })
}

#[async_trait]
impl ContractUseCases for ContractService {
    async fn resolve_customer(&self, account_id: &AccountId) -> ContractResult<Option<CustomerProfile>> {
        let Some(account) = self.accounts.find_account(account_id).await? else {
            return Ok(None);
        };
        Ok(self.resolve_account(&account).await?.profile)
    }

    async fn register_customer(&self, customer: NewCustomer) -> ContractResult<CustomerProfile> {
        let mut profile = CustomerProfile::create(customer, self.now())?;
        self.customers.insert(&profile).await.map_err(|e| match e {
            RepositoryError::DuplicateKey(key) => ContractError::Conflict(format!("customer {key} already exists")),
            other => other.into(),
        })?;
        tracing::info!(customer_id = %profile.id(), "Registered customer profile");
        let events = profile.take_events();
        self.publish(events, Some(profile.id())).await;
        Ok(profile)
    }

    async fn get_my_contracts(
        &self,
        account_id: &AccountId,
        status: Option<ContractStatus>,
        page: PageRequest,
    ) -> ContractResult<Page<ContractView>> {
        let now = self.now();
        let (records, profile) = self.visible_contracts(account_id).await?;

        let mut views = vec![];
        for (contract, source) in ContractQueries::merge(records, profile.as_ref()) {
            if status.is_some_and(|s| contract.effective_status(now) != s) {
                continue;
            }
            views.push(self.view(&contract, source, now).await?);
        }

        let limit = page.limit.unwrap_or(self.config.default_page_size);
        Ok(Page::slice(views, page.page, limit))
    }

    async fn get_contract_summary(&self, account_id: &AccountId) -> ContractResult<ContractSummary> {
        let now = self.now();
        let (records, profile) = self.visible_contracts(account_id).await?;

        let merged: Vec<Contract> = ContractQueries::merge(records.clone(), profile.as_ref())
            .into_iter()
            .map(|(c, _)| c)
            .collect();
        let mut summary = ContractQueries::summarize(&merged, now, self.config.expiring_soon_days);

        if let Some(current) = SyncBridge::current(ContractKind::Amc, &records, profile.as_ref(), now) {
            summary.current_amc = Some(self.view(&current.contract, current.source, now).await?);
        }
        if let Some(current) = SyncBridge::current(ContractKind::Rental, &records, profile.as_ref(), now) {
            summary.current_rental = Some(self.view(&current.contract, current.source, now).await?);
        }
        Ok(summary)
    }

    async fn get_current_contract(
        &self,
        account_id: &AccountId,
        kind: ContractKind,
    ) -> ContractResult<Option<ContractView>> {
        let now = self.now();
        let (records, profile) = self.visible_contracts(account_id).await?;
        match SyncBridge::current(kind, &records, profile.as_ref(), now) {
            Some(current) => Ok(Some(self.view(&current.contract, current.source, now).await?)),
            None => Ok(None),
        }
    }

    async fn request_service_visit(
        &self,
        account_id: &AccountId,
        contract_id: &ContractId,
        details: VisitDetails,
    ) -> ContractResult<ServiceVisitEntry> {
        let now = self.now();

        if let Some(record) = self.contracts.find_by_id(contract_id).await? {
            if record.account_id() != Some(account_id) {
                return Err(ContractError::contract_not_found(contract_id));
            }
            let (mut contract, entry) = self
                .update_contract(contract_id, |c| Ok(Step::Write(self.ledger.request_visit(c, &details, now)?)))
                .await?;
            tracing::info!(
                contract_id = %contract_id,
                used = contract.services_used(),
                total = contract.services_total(),
                "Service visit requested"
            );

            let events = contract.take_events();
            let profile = match self.profile_for(&contract).await {
                Ok(profile) => profile,
                Err(e) => {
                    tracing::warn!(contract_id = %contract_id, error = %e, "Cannot resolve profile for visit ticket");
                    None
                }
            };
            self.publish(events, profile.as_ref().map(|p| p.id())).await;

            if let Some(profile) = profile {
                let ticket = ServiceVisitLedger::mirror_ticket(&contract, &entry, &details, now);
                let result = self
                    .update_profile(profile.id(), |p| {
                        p.sync_current(&contract, now);
                        if let Some(ticket) = &ticket {
                            if p.ticket(&ticket.id).is_none() {
                                p.open_ticket(ticket.clone(), now);
                            }
                        }
                        Ok(Step::Write(()))
                    })
                    .await;
                if let Err(e) = result {
                    tracing::warn!(contract_id = %contract_id, error = %e, "Visit ticket not mirrored to profile");
                }
            }
            return Ok(entry);
        }

        let profile = self
            .resolve_customer(account_id)
            .await?
            .filter(|p| p.current_by_id(contract_id).is_some())
            .ok_or_else(|| ContractError::contract_not_found(contract_id))?;

        let (_, (entry, events)) = self
            .update_profile(profile.id(), |p| {
                let contract = p
                    .current_by_id_mut(contract_id)
                    .ok_or_else(|| ContractError::contract_not_found(contract_id))?;
                let entry = self.ledger.request_visit(contract, &details, now)?;
                let events = contract.take_events();
                let ticket = ServiceVisitLedger::mirror_ticket(contract, &entry, &details, now);
                if let Some(ticket) = ticket {
                    p.open_ticket(ticket, now);
                }
                Ok(Step::Write((entry, events)))
            })
            .await?;
        tracing::info!(contract_id = %contract_id, customer_id = %profile.id(), "Service visit requested");
        self.publish(events, Some(profile.id())).await;
        Ok(entry)
    }

    async fn cancel_contract(
        &self,
        account_id: Option<&AccountId>,
        contract_id: &ContractId,
        reason: &str,
    ) -> ContractResult<Contract> {
        let contract = self
            .transition(account_id, contract_id, |c, now| c.cancel(reason, now))
            .await?;
        tracing::info!(contract_id = %contract_id, reason, "Contract cancelled");
        Ok(contract)
    }

    async fn book_rental(&self, command: BookRentalCommand) -> ContractResult<Contract> {
        let now = self.now();
        let plan = self.load_plan(&command.plan_id).await?;
        let profile = self.ensure_profile(None, command.customer).await?;

        let terms = EnquiryTerms {
            product_name: command.product_name,
            start_date: command.start_date,
            amount_paid: command.amount_paid,
            payment: command.payment,
            notes: command.notes,
        };
        let mut contract = self.factory.create_rental(&plan, CreationContext::Enquiry(terms), now)?;
        self.install_on_profile(profile.id(), &contract).await?;

        tracing::info!(contract_id = %contract.id(), customer_id = %profile.id(), "Rental booked");
        self.publish(contract.take_events(), Some(profile.id())).await;
        Ok(contract)
    }

    async fn on_order_completed(&self, event: OrderCompleted) -> ContractResult<Vec<Contract>> {
        let now = self.now();
        let kind = event.fulfillment.contract_kind();
        let account = self.accounts.find_account(&event.account_id).await?;

        let mut profile = match &account {
            Some(account) => self.resolve_account(account).await?.profile,
            None => None,
        };
        if profile.is_none() {
            if let Some(customer) = event.customer.clone() {
                profile = Some(self.ensure_profile(Some(&event.account_id), customer).await?);
            }
        }

        let mut contracts = vec![];
        for line in &event.items {
            let Some(plan_id) = &line.plan_id else {
                continue;
            };
            let Some(plan) = self.plans.get_plan(plan_id).await? else {
                tracing::warn!(order_id = %event.order_id, plan_id = %plan_id, "Order references unknown plan");
                continue;
            };
            if !plan.is_active {
                tracing::info!(order_id = %event.order_id, plan_id = %plan_id, "Plan retired, no contract created");
                continue;
            }
            let item = self.items.lookup(&line.item).await?;
            if let Some(item) = &item {
                if !item.plan_ids.is_empty() && !item.offers_plan(plan_id) {
                    tracing::warn!(item = %line.item, plan_id = %plan_id, "Plan not offered for item, skipped");
                    continue;
                }
            }

            let terms = OrderTerms {
                account_id: event.account_id.clone(),
                order_id: event.order_id.clone(),
                item: line.item.clone(),
                item_name: item.as_ref().map(|i| i.name.clone()),
                item_image: item.as_ref().and_then(|i| i.image_url.clone()),
                amount: line.amount,
                payment: event.payment,
            };
            let mut contract = self.factory.create(kind, &plan, CreationContext::Order(terms), now)?;

            match self.contracts.insert(&contract).await {
                Ok(()) => {
                    tracing::info!(contract_id = %contract.id(), order_id = %event.order_id, "Contract created from order");
                    if let Some(profile) = &profile {
                        self.install_on_profile(profile.id(), &contract).await?;
                    }
                    self.publish(contract.take_events(), profile.as_ref().map(|p| p.id())).await;
                    contracts.push(contract);
                }
                Err(RepositoryError::DuplicateKey(key)) => {
                    let key_wanted = contract.order_key();
                    let existing = self
                        .contracts
                        .find_by_order(&event.order_id)
                        .await?
                        .into_iter()
                        .find(|c| c.order_key() == key_wanted)
                        .ok_or_else(|| ContractError::Conflict(format!("duplicate contract key {key}")))?;
                    tracing::debug!(contract_id = %existing.id(), "Order replay, returning existing contract");
                    if let Some(profile) = &profile {
                        let archived_on_profile = profile.archive().iter().any(|c| c.id() == existing.id());
                        if existing.archived().is_none() && !archived_on_profile {
                            self.install_on_profile(profile.id(), &existing).await?;
                        }
                    }
                    contracts.push(existing);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(contracts)
    }

    async fn on_order_cancelled(&self, order_id: &OrderId, reason: &str) -> ContractResult<Vec<Contract>> {
        let now = self.now();
        let note = format!("Order {order_id} cancelled: {reason}");
        let mut cancelled = vec![];

        for contract in self.contracts.find_by_order(order_id).await? {
            if contract.status().is_terminal() {
                continue;
            }
            let (mut contract, did_cancel) = self
                .update_contract(contract.id(), |c| {
                    if c.status().is_terminal() {
                        return Ok(Step::Skip(false));
                    }
                    c.cancel(&note, now)?;
                    Ok(Step::Write(true))
                })
                .await?;
            if did_cancel {
                tracing::info!(contract_id = %contract.id(), order_id = %order_id, "Contract cancelled with its order");
                self.publish(contract.take_events(), None).await;
                self.mirror_into_profile(&contract).await;
                cancelled.push(contract);
            }
        }
        Ok(cancelled)
    }

    async fn create_contract(&self, command: CreateContractCommand) -> ContractResult<Contract> {
        let now = self.now();
        let plan = self.load_plan(&command.plan_id).await?;
        self.load_profile(&command.customer_id).await?;

        let mut contract = self
            .factory
            .create(command.kind, &plan, CreationContext::Admin(command.terms), now)?;
        self.install_on_profile(&command.customer_id, &contract).await?;

        tracing::info!(contract_id = %contract.id(), customer_id = %command.customer_id, "Contract created by admin");
        self.publish(contract.take_events(), Some(&command.customer_id)).await;
        Ok(contract)
    }

    async fn renew_contract(&self, command: RenewContractCommand) -> ContractResult<Contract> {
        let now = self.now();

        if let Some(previous) = self.contracts.find_by_id(&command.contract_id).await? {
            let plan_id = command
                .plan_id
                .clone()
                .or_else(|| previous.plan_id().cloned())
                .ok_or_else(|| ContractError::Validation("renewal needs a plan".into()))?;
            let plan = self.load_plan(&plan_id).await?;

            // Archive first: of two racing renewals only one wins this write.
            let (mut archived, mut renewed) = self
                .update_contract(previous.id(), |c| {
                    let terms = renewal_terms(c, &command);
                    Ok(Step::Write(LifecycleManager::renew(&self.factory, c, &plan, terms, now)?))
                })
                .await?;
            if let Err(e) = self.contracts.insert(&renewed).await {
                tracing::error!(
                    previous = %previous.id(),
                    renewed = %renewed.id(),
                    error = %e,
                    "Previous term archived but renewal not stored"
                );
                return Err(e.into());
            }

            let profile = self.customers.find_by_contract(previous.id()).await?;
            if let Some(profile) = &profile {
                let copy = renewed.clone();
                self.update_profile(profile.id(), |p| {
                    p.install_contract(copy.clone(), ArchiveReason::Renewed, now);
                    Ok(Step::Write(()))
                })
                .await?;
            }

            let customer_id = profile.as_ref().map(|p| p.id());
            self.publish(archived.take_events(), customer_id).await;
            self.publish(renewed.take_events(), customer_id).await;
            return Ok(renewed);
        }

        let profile = self
            .customers
            .find_by_contract(&command.contract_id)
            .await?
            .ok_or_else(|| ContractError::contract_not_found(&command.contract_id))?;
        let previous = profile
            .current_by_id(&command.contract_id)
            .ok_or_else(|| ContractError::contract_not_found(&command.contract_id))?;
        let plan_id = command
            .plan_id
            .clone()
            .or_else(|| previous.plan_id().cloned())
            .ok_or_else(|| ContractError::Validation("renewal needs a plan".into()))?;
        let plan = self.load_plan(&plan_id).await?;

        let (_, mut renewed) = self
            .update_profile(profile.id(), |p| {
                let previous = p
                    .current_by_id(&command.contract_id)
                    .ok_or_else(|| ContractError::contract_not_found(&command.contract_id))?;
                let terms = renewal_terms(previous, &command);
                let renewed =
                    LifecycleManager::renew_embedded(&self.factory, p, &command.contract_id, &plan, terms, now)?;
                Ok(Step::Write(renewed))
            })
            .await?;

        self.publish(
            vec![DomainEvent::Contract(ContractEvent::Archived {
                contract_id: command.contract_id.clone(),
                reason: ArchiveReason::Renewed,
            })],
            Some(profile.id()),
        )
        .await;
        self.publish(renewed.take_events(), Some(profile.id())).await;
        Ok(renewed)
    }

    async fn hold_contract(&self, contract_id: &ContractId) -> ContractResult<Contract> {
        self.transition(None, contract_id, |c, now| c.hold(now)).await
    }

    async fn resume_contract(&self, contract_id: &ContractId) -> ContractResult<Contract> {
        self.transition(None, contract_id, |c, now| c.resume(now)).await
    }

    async fn confirm_payment(&self, command: ConfirmPaymentCommand) -> ContractResult<Contract> {
        let payment = command.payment;
        let amount_paid = command.amount_paid;
        self.transition(None, &command.contract_id, move |c, now| {
            c.confirm_payment(payment, amount_paid, now)
        })
        .await
    }

    async fn add_complaint(&self, command: AddComplaintCommand) -> ContractResult<ComplaintTicket> {
        let now = self.now();
        if command.description.trim().is_empty() {
            return Err(ContractError::Validation("complaint description is required".into()));
        }
        let ticket = ComplaintTicket::open(
            TicketId::generate(&self.config.admin_ticket_prefix, now),
            command.complaint_type,
            command.description.trim(),
            command.priority,
            now,
        );
        self.update_profile(&command.customer_id, |p| {
            p.open_ticket(ticket.clone(), now);
            Ok(Step::Write(()))
        })
        .await?;
        tracing::info!(ticket_id = %ticket.id, customer_id = %command.customer_id, "Complaint added");
        Ok(ticket)
    }

    async fn update_ticket(&self, ticket_id: &TicketId, update: TicketUpdate) -> ContractResult<ComplaintTicket> {
        let now = self.now();
        let profile = self
            .customers
            .find_by_ticket(ticket_id)
            .await?
            .ok_or_else(|| ContractError::ticket_not_found(ticket_id))?;

        let (profile, ()) = self
            .update_profile(profile.id(), |p| {
                Ok(if p.update_ticket(ticket_id, &update, now)? { Step::Write(()) } else { Step::Skip(()) })
            })
            .await?;
        let ticket = profile
            .ticket(ticket_id)
            .cloned()
            .ok_or_else(|| ContractError::ticket_not_found(ticket_id))?;

        let linked = self.link_ticket_to_visit(ticket_id).await?;
        tracing::info!(ticket_id = %ticket_id, status = ?ticket.status, linked, "Ticket updated");
        Ok(ticket)
    }

    async fn link_ticket_to_visit(&self, ticket_id: &TicketId) -> ContractResult<bool> {
        let now = self.now();
        let profile = self
            .customers
            .find_by_ticket(ticket_id)
            .await?
            .ok_or_else(|| ContractError::ticket_not_found(ticket_id))?;
        let ticket = profile
            .ticket(ticket_id)
            .cloned()
            .ok_or_else(|| ContractError::ticket_not_found(ticket_id))?;

        // Exact id on a self-service record
        if let Some(record) = self.contracts.find_by_visit_ticket(ticket_id).await? {
            let (contract, link) = self
                .update_contract(record.id(), |c| {
                    Ok(match SyncBridge::mirror_exact(c, &ticket, now) {
                        Some(link) if link.wrote() => Step::Write(link),
                        _ => Step::Skip(Link::Unchanged),
                    })
                })
                .await?;
            if link.wrote() {
                self.mirror_into_profile(&contract).await;
            }
            return Ok(true);
        }

        // Exact id on an embedded contract
        if profile.current_contracts().any(|c| c.visit_for_ticket(ticket_id).is_some()) {
            self.update_profile(profile.id(), |p| {
                for contract in p.current_contracts_mut() {
                    if let Some(link) = SyncBridge::mirror_exact(contract, &ticket, now) {
                        return Ok(if link.wrote() { Step::Write(()) } else { Step::Skip(()) });
                    }
                }
                Ok(Step::Skip(()))
            })
            .await?;
            return Ok(true);
        }

        // Same day, unlinked entry, on a contract owned by one of the
        // profile's accounts
        let day = ticket.date.date_naive();
        for account in self.accounts.find_matching(&MatchQuery::for_profile(&profile)).await? {
            for record in self.contracts.find_by_account(&account.id).await? {
                let candidate = record
                    .service_history()
                    .iter()
                    .any(|v| !v.is_linked() && v.date.date_naive() == day);
                if !candidate {
                    continue;
                }
                let (contract, bound) = self
                    .update_contract(record.id(), |c| {
                        Ok(match SyncBridge::bind_same_day(c, &ticket, now) {
                            Some(_) => Step::Write(true),
                            None => Step::Skip(false),
                        })
                    })
                    .await?;
                if bound {
                    self.mirror_into_profile(&contract).await;
                    return Ok(true);
                }
            }
        }

        let (_, bound) = self
            .update_profile(profile.id(), |p| {
                for contract in p.current_contracts_mut() {
                    if SyncBridge::bind_same_day(contract, &ticket, now).is_some() {
                        return Ok(Step::Write(true));
                    }
                }
                Ok(Step::Skip(false))
            })
            .await?;
        if !bound {
            tracing::debug!(ticket_id = %ticket_id, "No service visit to link");
        }
        Ok(bound)
    }

    async fn admin_dashboard(&self) -> ContractResult<DashboardStats> {
        let now = self.now();
        let profiles = self.customers.list_all().await?;
        let records = self.contracts.list_all().await?;
        let current = ContractQueries::current_set(records, &profiles);
        Ok(ContractQueries::dashboard(&current, now, self.config.expiring_soon_days))
    }

    async fn run_expiry_sweep(&self, now: DateTime<Utc>) -> ContractResult<SweepReport> {
        let mut report = SweepReport::default();

        for due in self.contracts.find_active_ending_before(now).await? {
            report.examined += 1;
            let result = self
                .update_contract(due.id(), |c| Ok(if c.expire(now) { Step::Write(true) } else { Step::Skip(false) }))
                .await;
            match result {
                Ok((mut contract, true)) => {
                    self.publish(contract.take_events(), None).await;
                    self.mirror_into_profile(&contract).await;
                    report.expired.push(contract.id().clone());
                }
                Ok((contract, false)) => {
                    tracing::debug!(contract_id = %contract.id(), status = ?contract.status(), "Sweep skipped contract");
                    report.skipped.push(contract.id().clone());
                }
                Err(e) => {
                    tracing::warn!(contract_id = %due.id(), error = %e, "Sweep could not expire contract");
                    report.failed.push(due.id().clone());
                }
            }
        }

        for profile in self.customers.list_all().await? {
            if !LifecycleManager::profile_has_due(&profile, now) {
                continue;
            }
            report.examined += 1;
            let result = self
                .update_profile(profile.id(), |p| {
                    let expired = LifecycleManager::expire_profile(p, now);
                    let events: Vec<DomainEvent> = p.current_contracts_mut().flat_map(|c| c.take_events()).collect();
                    Ok(if expired.is_empty() { Step::Skip((expired, events)) } else { Step::Write((expired, events)) })
                })
                .await;
            match result {
                Ok((_, (expired, events))) => {
                    self.publish(events, Some(profile.id())).await;
                    for id in expired {
                        if !report.expired.contains(&id) {
                            report.expired.push(id);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(customer_id = %profile.id(), error = %e, "Sweep could not update profile");
                    report.failed.extend(profile.current_contracts().map(|c| c.id().clone()));
                }
            }
        }

        tracing::info!(
            examined = report.examined,
            expired = report.expired.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Expiry sweep finished"
        );
        Ok(report)
    }
}

fn renewal_terms(previous: &Contract, command: &RenewContractCommand) -> RenewalTerms {
    RenewalTerms {
        start_date: command.start_date,
        amount_paid: command.amount_paid,
        payment: command.payment,
        ..RenewalTerms::following(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::PaymentState;

    #[test]
    fn test_visit_event_maps_to_service_notification() {
        let event = DomainEvent::Contract(ContractEvent::VisitRequested {
            contract_id: ContractId::from_string("AMC-1"),
            ticket_id: TicketId::from_string("SR-1"),
            services_used: 1,
            services_total: 4,
        });
        let notification = notification_for(&event, None).unwrap();
        assert_eq!(notification.kind, NotificationKind::ServiceRequested);
        assert!(notification.message.contains("(1/4)"));
    }

    #[test]
    fn test_replacement_archive_is_silent() {
        let event = DomainEvent::Contract(ContractEvent::Archived {
            contract_id: ContractId::from_string("AMC-1"),
            reason: ArchiveReason::Replaced,
        });
        assert!(notification_for(&event, None).is_none());
    }

    #[test]
    fn test_renewal_terms_keep_lineage() {
        let start = chrono::TimeZone::with_ymd_and_hms(&Utc, 2024, 1, 15, 10, 0, 0).unwrap();
        let previous =
            Contract::create(crate::domain::aggregates::contract::tests::draft(start, 2), start).unwrap();
        let mut command = RenewContractCommand::paid(previous.id().clone());
        command.payment = PaymentState::Partial;
        let terms = renewal_terms(&previous, &command);
        assert_eq!(terms.previous_id, *previous.id());
        assert_eq!(terms.previous_end, previous.end_date());
        assert_eq!(terms.payment, PaymentState::Partial);
    }
}
