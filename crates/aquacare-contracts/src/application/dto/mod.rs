//! Data Transfer Objects (DTOs)
//!
//! Objects for transferring data across boundaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::{
    ComplaintType, Contract, ContractKind, ContractStatus, NewCustomer, PaymentState, ServiceVisitEntry,
    TicketPriority,
};
use crate::domain::services::{AdminTerms, ContractSource, Enrichment};
use crate::domain::value_objects::{AccountId, ContractId, CustomerId, ItemRef, Money, OrderId, PlanId};

// =============================================================================
// Order Events
// =============================================================================

/// Emitted by the order collaborator once an order is paid or delivered.
#[derive(Clone, Debug)]
pub struct OrderCompleted {
    pub account_id: AccountId,
    pub order_id: OrderId,
    pub items: Vec<OrderLine>,
    pub fulfillment: Fulfillment,
    pub payment: PaymentState,
    /// Shipping contact, used to create a profile when none resolves.
    pub customer: Option<NewCustomer>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderLine {
    pub item: ItemRef,
    pub plan_id: Option<PlanId>,
    pub amount: Money,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fulfillment {
    /// Equipment bought outright; plan lines become AMCs.
    #[default]
    Purchase,
    /// Equipment rented; plan lines become rental contracts.
    Rental,
}

impl Fulfillment {
    pub fn contract_kind(&self) -> ContractKind {
        match self {
            Self::Purchase => ContractKind::Amc,
            Self::Rental => ContractKind::Rental,
        }
    }
}

// =============================================================================
// Admin Commands
// =============================================================================

#[derive(Clone, Debug)]
pub struct CreateContractCommand {
    pub customer_id: CustomerId,
    pub kind: ContractKind,
    pub plan_id: PlanId,
    pub terms: AdminTerms,
}

#[derive(Clone, Debug)]
pub struct RenewContractCommand {
    pub contract_id: ContractId,
    /// Defaults to the plan of the contract being renewed.
    pub plan_id: Option<PlanId>,
    pub start_date: Option<DateTime<Utc>>,
    pub amount_paid: Option<Money>,
    pub payment: PaymentState,
}

impl RenewContractCommand {
    pub fn paid(contract_id: ContractId) -> Self {
        Self {
            contract_id,
            plan_id: None,
            start_date: None,
            amount_paid: None,
            payment: PaymentState::Paid,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConfirmPaymentCommand {
    pub contract_id: ContractId,
    pub payment: PaymentState,
    pub amount_paid: Money,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AddComplaintCommand {
    pub customer_id: CustomerId,
    pub complaint_type: ComplaintType,
    pub description: String,
    pub priority: TicketPriority,
}

/// Rental enquiry or paid booking from the website.
#[derive(Clone, Debug)]
pub struct BookRentalCommand {
    pub customer: NewCustomer,
    pub plan_id: PlanId,
    pub product_name: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub payment: PaymentState,
    pub amount_paid: Option<Money>,
    pub notes: Option<String>,
}

// =============================================================================
// Paging
// =============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// 1-based; 0 is treated as 1.
    pub page: u32,
    pub limit: Option<u32>,
}

impl PageRequest {
    pub fn first() -> Self {
        Self { page: 1, limit: None }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u32,
}

impl<T> Page<T> {
    pub fn slice(all: Vec<T>, page: u32, limit: u32) -> Self {
        let page = page.max(1);
        let limit = limit.max(1);
        let total = all.len() as u64;
        let pages = total.div_ceil(limit as u64) as u32;
        let skip = ((page - 1) as usize).saturating_mul(limit as usize);
        let items = all.into_iter().skip(skip).take(limit as usize).collect();
        Self { items, page, limit, total, pages }
    }
}

// =============================================================================
// Views (Read Models)
// =============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContractView {
    pub id: ContractId,
    pub kind: ContractKind,
    pub status: ContractStatus,
    pub self_service: bool,
    pub plan_name: String,
    pub product_name: Option<String>,
    pub image_url: Option<String>,
    pub amount: Option<Money>,
    pub amount_paid: Money,
    pub payment_state: PaymentState,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub services_total: u32,
    pub services_used: u32,
    pub services_remaining: u32,
    pub days_remaining: u32,
    pub progress_percent: u8,
    pub parts_included: bool,
    pub renewed_from: Option<ContractId>,
    pub service_history: Vec<ServiceVisitEntry>,
}

impl ContractView {
    pub fn build(contract: &Contract, source: ContractSource, enrichment: Enrichment, now: DateTime<Utc>) -> Self {
        Self {
            id: contract.id().clone(),
            kind: contract.kind(),
            status: contract.effective_status(now),
            self_service: source == ContractSource::SelfService,
            plan_name: enrichment.plan_name,
            product_name: contract.product_name().map(String::from),
            image_url: enrichment.image_url,
            amount: enrichment.amount,
            amount_paid: contract.amount_paid(),
            payment_state: contract.payment_state(),
            start_date: contract.start_date(),
            end_date: contract.end_date(),
            services_total: contract.services_total(),
            services_used: contract.services_used(),
            services_remaining: contract.services_remaining(),
            days_remaining: contract.days_remaining(now),
            progress_percent: contract.progress_percent(now),
            parts_included: contract.parts_included(),
            renewed_from: contract.renewed_from().cloned(),
            service_history: contract.service_history().to_vec(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExpiringContract {
    pub id: ContractId,
    pub kind: ContractKind,
    pub plan_name: String,
    pub end_date: DateTime<Utc>,
    pub days_remaining: u32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ContractSummary {
    pub active: u32,
    pub expired: u32,
    pub services_used: u32,
    pub expiring_soon: Vec<ExpiringContract>,
    pub current_amc: Option<ContractView>,
    pub current_rental: Option<ContractView>,
}

/// Admin overview across every current contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub active: u32,
    /// Subset of `active` ending within the configured window
    pub expiring_soon: u32,
    pub expired: u32,
    /// Pending, on hold and cancelled
    pub other: u32,
    pub total: u32,
    pub revenue: Money,
}

impl Default for DashboardStats {
    fn default() -> Self {
        Self {
            active: 0,
            expiring_soon: 0,
            expired: 0,
            other: 0,
            total: 0,
            revenue: Money::zero(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub examined: usize,
    pub expired: Vec<ContractId>,
    /// No longer active when the write landed
    pub skipped: Vec<ContractId>,
    pub failed: Vec<ContractId>,
}

impl SweepReport {
    pub fn is_noop(&self) -> bool {
        self.expired.is_empty() && self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_slice() {
        let page = Page::slice((1..=23).collect::<Vec<_>>(), 3, 10);
        assert_eq!(page.items, vec![21, 22, 23]);
        assert_eq!(page.total, 23);
        assert_eq!(page.pages, 3);

        let empty = Page::slice(Vec::<u32>::new(), 0, 10);
        assert_eq!(empty.page, 1);
        assert_eq!(empty.pages, 0);
        assert!(empty.items.is_empty());
    }
}
