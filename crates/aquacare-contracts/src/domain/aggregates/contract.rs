//! Contract Aggregate
//!
//! An Annual Maintenance Contract or an equipment rental. The same aggregate
//! backs the self-service per-contract record and the sub-document embedded
//! in a customer profile; `origin` says which side owns it.
//!
//! State machine:
//!
//! ```text
//! Pending ──payment──► Active ──end passed──► Expired
//!                        │  ▲
//!                  hold  │  │ resume
//!                        ▼  │
//!                       OnHold
//! Pending | Active | OnHold ──cancel──► Cancelled
//! ```
//!
//! `Expired` and `Cancelled` are terminal. Renewal never edits dates: the
//! current term is archived and a new contract is created.

use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::visit::{MirrorOutcome, ServiceVisitEntry, TicketMirror, VisitDetails};
use crate::domain::events::{ContractEvent, DomainEvent};
use crate::domain::value_objects::{AccountId, ContractId, ItemRef, Money, OrderId, PlanId, TicketId};

/// Current document layout. Older layouts are upgraded by the migration step.
pub const CONTRACT_SCHEMA_VERSION: u16 = 2;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Contract aggregate root
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Contract {
    schema_version: u16,
    id: ContractId,
    kind: ContractKind,
    origin: ContractOrigin,
    item: Option<ItemRef>,
    plan_id: Option<PlanId>,
    plan_name: String,
    product_name: Option<String>,
    product_image: Option<String>,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    duration_months: u32,
    services_total: u32,
    services_used: u32,
    parts_included: bool,
    amount: Option<Money>,
    amount_paid: Money,
    payment_state: PaymentState,
    status: ContractStatus,
    archived: Option<ArchiveReason>,
    technician: Option<String>,
    notes: Vec<String>,
    renewed_from: Option<ContractId>,
    service_history: Vec<ServiceVisitEntry>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

/// Everything the factory decides before a contract exists.
#[derive(Clone, Debug)]
pub struct NewContract {
    pub id: ContractId,
    pub kind: ContractKind,
    pub origin: ContractOrigin,
    pub item: Option<ItemRef>,
    pub plan_id: Option<PlanId>,
    pub plan_name: String,
    pub product_name: Option<String>,
    pub product_image: Option<String>,
    pub start_date: DateTime<Utc>,
    pub duration_months: u32,
    pub services_total: u32,
    pub parts_included: bool,
    pub amount: Option<Money>,
    pub amount_paid: Money,
    pub payment_state: PaymentState,
    pub status: ContractStatus,
    pub technician: Option<String>,
    pub notes: Option<String>,
    pub renewed_from: Option<ContractId>,
}

/// `start + months`, the only way an end date is ever computed.
pub fn term_end(start: DateTime<Utc>, months: u32) -> Result<DateTime<Utc>, LifecycleError> {
    if months == 0 {
        return Err(LifecycleError::InvalidTerm("duration must be at least one month".into()));
    }
    start
        .checked_add_months(Months::new(months))
        .ok_or_else(|| LifecycleError::InvalidTerm(format!("{months} months overflows the calendar")))
}

impl Contract {
    /// Create a contract from a factory draft
    pub fn create(draft: NewContract, now: DateTime<Utc>) -> Result<Self, LifecycleError> {
        if !matches!(draft.status, ContractStatus::Pending | ContractStatus::Active) {
            return Err(LifecycleError::InvalidTerm(format!(
                "a new contract cannot start as {:?}",
                draft.status
            )));
        }
        let end_date = term_end(draft.start_date, draft.duration_months)?;

        let mut contract = Self {
            schema_version: CONTRACT_SCHEMA_VERSION,
            id: draft.id,
            kind: draft.kind,
            origin: draft.origin,
            item: draft.item,
            plan_id: draft.plan_id,
            plan_name: draft.plan_name,
            product_name: draft.product_name,
            product_image: draft.product_image,
            start_date: draft.start_date,
            end_date,
            duration_months: draft.duration_months,
            services_total: draft.services_total,
            services_used: 0,
            parts_included: draft.parts_included,
            amount: draft.amount,
            amount_paid: draft.amount_paid,
            payment_state: draft.payment_state,
            status: draft.status,
            archived: None,
            technician: draft.technician,
            notes: draft.notes.into_iter().collect(),
            renewed_from: draft.renewed_from,
            service_history: vec![],
            created_at: now,
            updated_at: now,
            version: 0,
            events: vec![],
        };

        contract.raise_event(ContractEvent::Created {
            contract_id: contract.id.clone(),
            kind: contract.kind,
            status: contract.status,
            end_date,
        });

        Ok(contract)
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn schema_version(&self) -> u16 { self.schema_version }
    pub fn id(&self) -> &ContractId { &self.id }
    pub fn kind(&self) -> ContractKind { self.kind }
    pub fn origin(&self) -> &ContractOrigin { &self.origin }
    pub fn item(&self) -> Option<&ItemRef> { self.item.as_ref() }
    pub fn plan_id(&self) -> Option<&PlanId> { self.plan_id.as_ref() }
    pub fn plan_name(&self) -> &str { &self.plan_name }
    pub fn product_name(&self) -> Option<&str> { self.product_name.as_deref() }
    pub fn product_image(&self) -> Option<&str> { self.product_image.as_deref() }
    pub fn start_date(&self) -> DateTime<Utc> { self.start_date }
    pub fn end_date(&self) -> DateTime<Utc> { self.end_date }
    pub fn duration_months(&self) -> u32 { self.duration_months }
    pub fn services_total(&self) -> u32 { self.services_total }
    pub fn services_used(&self) -> u32 { self.services_used }
    pub fn parts_included(&self) -> bool { self.parts_included }
    pub fn amount(&self) -> Option<Money> { self.amount }
    pub fn amount_paid(&self) -> Money { self.amount_paid }
    pub fn payment_state(&self) -> PaymentState { self.payment_state }
    pub fn status(&self) -> ContractStatus { self.status }
    pub fn archived(&self) -> Option<ArchiveReason> { self.archived }
    pub fn technician(&self) -> Option<&str> { self.technician.as_deref() }
    pub fn notes(&self) -> &[String] { &self.notes }
    pub fn renewed_from(&self) -> Option<&ContractId> { self.renewed_from.as_ref() }
    pub fn service_history(&self) -> &[ServiceVisitEntry] { &self.service_history }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn version(&self) -> u64 { self.version }

    pub fn account_id(&self) -> Option<&AccountId> {
        match &self.origin {
            ContractOrigin::WebOrder { account_id, .. } => Some(account_id),
            _ => None,
        }
    }

    pub fn order_id(&self) -> Option<&OrderId> {
        match &self.origin {
            ContractOrigin::WebOrder { order_id, .. } => order_id.as_ref(),
            _ => None,
        }
    }

    /// Uniqueness key for order-sourced contracts: (order, item, plan).
    pub fn order_key(&self) -> Option<OrderKey> {
        let order_id = self.order_id()?;
        if self.renewed_from.is_some() {
            return None;
        }
        Some(OrderKey {
            order_id: order_id.clone(),
            item: self.item.clone(),
            plan_id: self.plan_id.clone(),
        })
    }

    /// Status as it should be displayed at `now`, even before the sweep
    /// has persisted an expiry.
    pub fn effective_status(&self, now: DateTime<Utc>) -> ContractStatus {
        if self.status == ContractStatus::Active && now > self.end_date {
            ContractStatus::Expired
        } else {
            self.status
        }
    }

    pub fn services_remaining(&self) -> u32 {
        self.services_total.saturating_sub(self.services_used)
    }

    /// Whole days left in the term, rounded up; zero unless active.
    pub fn days_remaining(&self, now: DateTime<Utc>) -> u32 {
        if self.effective_status(now) != ContractStatus::Active {
            return 0;
        }
        let secs = (self.end_date - now).num_seconds() as f64;
        (secs / SECONDS_PER_DAY).ceil().max(0.0) as u32
    }

    /// Share of the term already elapsed, 0..=100.
    pub fn progress_percent(&self, now: DateTime<Utc>) -> u8 {
        let total = ((self.end_date - self.start_date).num_seconds() as f64 / SECONDS_PER_DAY).ceil();
        if total <= 0.0 {
            return 100;
        }
        let passed = ((now - self.start_date).num_seconds() as f64 / SECONDS_PER_DAY).ceil();
        (passed / total * 100.0).clamp(0.0, 100.0).round() as u8
    }

    // =========================================================================
    // Lifecycle transitions
    // =========================================================================

    /// Pending → Active once the payment is settled.
    pub fn confirm_payment(
        &mut self,
        payment: PaymentState,
        amount_paid: Money,
        now: DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        if self.status != ContractStatus::Pending {
            return Err(self.invalid(ContractStatus::Pending));
        }
        if payment != PaymentState::Paid {
            return Err(LifecycleError::PaymentNotConfirmed(self.id.clone()));
        }

        self.payment_state = PaymentState::Paid;
        self.amount_paid = amount_paid;
        self.status = ContractStatus::Active;
        self.touch(now);
        self.raise_event(ContractEvent::Activated {
            contract_id: self.id.clone(),
            activated_at: now,
        });
        Ok(())
    }

    /// Active → Expired when the term is over. Returns whether anything
    /// changed so repeated sweeps stay no-ops.
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != ContractStatus::Active || now <= self.end_date {
            return false;
        }
        self.status = ContractStatus::Expired;
        self.touch(now);
        self.raise_event(ContractEvent::Expired {
            contract_id: self.id.clone(),
            expired_at: now,
        });
        true
    }

    /// Cancel a live contract. Terminal contracts are rejected unchanged.
    pub fn cancel(&mut self, reason: &str, now: DateTime<Utc>) -> Result<(), LifecycleError> {
        match self.status {
            ContractStatus::Cancelled => return Err(LifecycleError::AlreadyCancelled(self.id.clone())),
            ContractStatus::Expired => return Err(LifecycleError::AlreadyExpired(self.id.clone())),
            ContractStatus::Pending | ContractStatus::Active | ContractStatus::OnHold => {}
        }

        let reason = if reason.trim().is_empty() { "Not specified" } else { reason.trim() };
        self.status = ContractStatus::Cancelled;
        self.notes.push(format!("Cancelled. Reason: {reason}"));
        self.touch(now);
        self.raise_event(ContractEvent::Cancelled {
            contract_id: self.id.clone(),
            reason: reason.to_string(),
            cancelled_at: now,
        });
        Ok(())
    }

    pub fn hold(&mut self, now: DateTime<Utc>) -> Result<(), LifecycleError> {
        if self.status != ContractStatus::Active {
            return Err(self.invalid(ContractStatus::Active));
        }
        self.status = ContractStatus::OnHold;
        self.touch(now);
        self.raise_event(ContractEvent::PutOnHold { contract_id: self.id.clone() });
        Ok(())
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(), LifecycleError> {
        if self.status != ContractStatus::OnHold {
            return Err(self.invalid(ContractStatus::OnHold));
        }
        self.status = ContractStatus::Active;
        self.touch(now);
        self.raise_event(ContractEvent::Resumed { contract_id: self.id.clone() });
        Ok(())
    }

    /// Retire this term ahead of a replacement or renewal.
    pub fn archive(&mut self, reason: ArchiveReason, now: DateTime<Utc>) {
        if self.status != ContractStatus::Cancelled {
            self.status = ContractStatus::Expired;
        }
        self.archived = Some(reason);
        self.touch(now);
        self.raise_event(ContractEvent::Archived {
            contract_id: self.id.clone(),
            reason,
        });
    }

    // =========================================================================
    // Service visits
    // =========================================================================

    /// Consume one service slot. The history append and the counter move
    /// together or not at all.
    pub fn request_visit(
        &mut self,
        details: &VisitDetails,
        ticket_id: TicketId,
        now: DateTime<Utc>,
    ) -> Result<ServiceVisitEntry, LifecycleError> {
        let status = self.effective_status(now);
        if status != ContractStatus::Active {
            return Err(LifecycleError::InvalidTransition {
                id: self.id.clone(),
                status,
                expected: ContractStatus::Active,
            });
        }
        if self.services_used >= self.services_total {
            return Err(LifecycleError::QuotaExhausted {
                id: self.id.clone(),
                services_total: self.services_total,
            });
        }

        let entry = ServiceVisitEntry::requested(details, ticket_id.clone(), now);
        self.service_history.push(entry.clone());
        self.services_used += 1;
        self.touch(now);
        self.raise_event(ContractEvent::VisitRequested {
            contract_id: self.id.clone(),
            ticket_id,
            services_used: self.services_used,
            services_total: self.services_total,
        });
        Ok(entry)
    }

    pub fn visit_for_ticket(&self, ticket_id: &TicketId) -> Option<&ServiceVisitEntry> {
        self.service_history
            .iter()
            .find(|v| v.ticket_id.as_ref() == Some(ticket_id))
    }

    /// Mirror a ticket onto the entry already bound to it.
    pub fn mirror_ticket(
        &mut self,
        ticket_id: &TicketId,
        mirror: &TicketMirror,
        now: DateTime<Utc>,
    ) -> Option<MirrorOutcome> {
        let entry = self
            .service_history
            .iter_mut()
            .find(|v| v.ticket_id.as_ref() == Some(ticket_id))?;
        let outcome = entry.mirror(mirror);
        if outcome.changed {
            self.touch(now);
        }
        Some(outcome)
    }

    /// Bind the first unlinked entry recorded on `day` to `ticket_id`.
    ///
    /// Never rebinds a linked entry and never binds a ticket twice.
    pub fn bind_ticket_on_day(
        &mut self,
        day: NaiveDate,
        ticket_id: &TicketId,
        mirror: &TicketMirror,
        now: DateTime<Utc>,
    ) -> Option<Uuid> {
        if self.visit_for_ticket(ticket_id).is_some() {
            return None;
        }
        let entry = self
            .service_history
            .iter_mut()
            .find(|v| !v.is_linked() && v.date.date_naive() == day)?;
        entry.ticket_id = Some(ticket_id.clone());
        entry.mirror(mirror);
        let id = entry.id;
        self.touch(now);
        Some(id)
    }

    // =========================================================================
    // Storage & events
    // =========================================================================

    /// Set by storage adapters after a successful conditional write.
    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    /// Get and clear accumulated domain events
    pub fn take_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn from_parts(parts: ContractParts) -> Self {
        Self {
            schema_version: CONTRACT_SCHEMA_VERSION,
            id: parts.id,
            kind: parts.kind,
            origin: parts.origin,
            item: None,
            plan_id: parts.plan_id,
            plan_name: parts.plan_name,
            product_name: parts.product_name,
            product_image: None,
            start_date: parts.start_date,
            end_date: parts.end_date,
            duration_months: parts.duration_months,
            services_total: parts.services_total,
            services_used: parts.services_used.min(parts.services_total),
            parts_included: parts.parts_included,
            amount: parts.amount,
            amount_paid: parts.amount_paid,
            payment_state: parts.payment_state,
            status: parts.status,
            archived: None,
            technician: parts.technician,
            notes: parts.notes,
            renewed_from: None,
            service_history: parts.service_history,
            created_at: parts.created_at,
            updated_at: parts.created_at,
            version: 0,
            events: vec![],
        }
    }

    fn invalid(&self, expected: ContractStatus) -> LifecycleError {
        LifecycleError::InvalidTransition {
            id: self.id.clone(),
            status: self.status,
            expected,
        }
    }

    fn raise_event(&mut self, event: ContractEvent) {
        self.events.push(DomainEvent::Contract(event));
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

/// Field bundle used when rebuilding a contract from a legacy document.
pub(crate) struct ContractParts {
    pub id: ContractId,
    pub kind: ContractKind,
    pub origin: ContractOrigin,
    pub plan_id: Option<PlanId>,
    pub plan_name: String,
    pub product_name: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub duration_months: u32,
    pub services_total: u32,
    pub services_used: u32,
    pub parts_included: bool,
    pub amount: Option<Money>,
    pub amount_paid: Money,
    pub payment_state: PaymentState,
    pub status: ContractStatus,
    pub technician: Option<String>,
    pub notes: Vec<String>,
    pub service_history: Vec<ServiceVisitEntry>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Supporting Types
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractKind {
    Amc,
    Rental,
}

impl ContractKind {
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::Amc => "AMC",
            Self::Rental => "RNT",
        }
    }
}

/// Who created the contract, which also decides which store is
/// authoritative for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractOrigin {
    /// Self-service purchase; the per-contract record is authoritative.
    WebOrder {
        account_id: AccountId,
        order_id: Option<OrderId>,
    },
    /// Walk-in or phone sale entered by an admin; the profile is authoritative.
    Admin,
    /// Rental booking from a website enquiry, kept on the profile only.
    Enquiry,
}

impl ContractOrigin {
    pub fn is_self_service(&self) -> bool {
        matches!(self, Self::WebOrder { .. })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractStatus {
    Pending,
    #[default]
    Active,
    Expired,
    Cancelled,
    OnHold,
}

impl ContractStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Expired | Self::Cancelled)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentState {
    Paid,
    Partial,
    #[default]
    Pending,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArchiveReason {
    Replaced,
    Renewed,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OrderKey {
    pub order_id: OrderId,
    pub item: Option<ItemRef>,
    pub plan_id: Option<PlanId>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("contract {0} is already cancelled")]
    AlreadyCancelled(ContractId),
    #[error("contract {0} has already expired")]
    AlreadyExpired(ContractId),
    #[error("contract {0} is archived and no longer current")]
    AlreadyArchived(ContractId),
    #[error("contract {id} is {status:?}, expected {expected:?}")]
    InvalidTransition {
        id: ContractId,
        status: ContractStatus,
        expected: ContractStatus,
    },
    #[error("payment for contract {0} is not confirmed")]
    PaymentNotConfirmed(ContractId),
    #[error("all {services_total} service visits on contract {id} are used; renew to book more")]
    QuotaExhausted { id: ContractId, services_total: u32 },
    #[error("invalid contract term: {0}")]
    InvalidTerm(String),
    #[error("plan {0} is not available")]
    PlanUnavailable(PlanId),
}
