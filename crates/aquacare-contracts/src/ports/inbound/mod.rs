//! Inbound ports (Use case traits)
//!
//! Hexagonal architecture: application service interfaces.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::application::dto::*;
use crate::domain::aggregates::{
    ComplaintTicket, Contract, ContractKind, ContractStatus, CustomerProfile, NewCustomer, ServiceVisitEntry,
    TicketUpdate, VisitDetails,
};
use crate::domain::value_objects::{AccountId, ContractId, OrderId, TicketId};
use crate::error::ContractResult;

/// Contract lifecycle and identity use cases
#[async_trait]
pub trait ContractUseCases: Send + Sync {
    // -------------------------------------------------------------------------
    // Identity
    // -------------------------------------------------------------------------

    /// Offline profile linked to a web account, if any
    async fn resolve_customer(&self, account_id: &AccountId) -> ContractResult<Option<CustomerProfile>>;

    /// Admin-side profile creation; the mobile must not be registered yet
    async fn register_customer(&self, customer: NewCustomer) -> ContractResult<CustomerProfile>;

    // -------------------------------------------------------------------------
    // Self-service
    // -------------------------------------------------------------------------

    /// Contracts visible to the account, newest first
    async fn get_my_contracts(
        &self,
        account_id: &AccountId,
        status: Option<ContractStatus>,
        page: PageRequest,
    ) -> ContractResult<Page<ContractView>>;

    async fn get_contract_summary(&self, account_id: &AccountId) -> ContractResult<ContractSummary>;

    /// "My current AMC" / "my current rental"
    async fn get_current_contract(
        &self,
        account_id: &AccountId,
        kind: ContractKind,
    ) -> ContractResult<Option<ContractView>>;

    async fn request_service_visit(
        &self,
        account_id: &AccountId,
        contract_id: &ContractId,
        details: VisitDetails,
    ) -> ContractResult<ServiceVisitEntry>;

    /// Cancel; `account_id` restricts the call to the owner's contracts
    async fn cancel_contract(
        &self,
        account_id: Option<&AccountId>,
        contract_id: &ContractId,
        reason: &str,
    ) -> ContractResult<Contract>;

    /// Rental enquiry or paid booking
    async fn book_rental(&self, command: BookRentalCommand) -> ContractResult<Contract>;

    // -------------------------------------------------------------------------
    // Order events
    // -------------------------------------------------------------------------

    /// One contract per eligible line; replays return the existing contracts
    async fn on_order_completed(&self, event: OrderCompleted) -> ContractResult<Vec<Contract>>;

    /// Cancel every live contract created from the order
    async fn on_order_cancelled(&self, order_id: &OrderId, reason: &str) -> ContractResult<Vec<Contract>>;

    // -------------------------------------------------------------------------
    // Admin
    // -------------------------------------------------------------------------

    async fn create_contract(&self, command: CreateContractCommand) -> ContractResult<Contract>;

    async fn renew_contract(&self, command: RenewContractCommand) -> ContractResult<Contract>;

    async fn hold_contract(&self, contract_id: &ContractId) -> ContractResult<Contract>;

    async fn resume_contract(&self, contract_id: &ContractId) -> ContractResult<Contract>;

    async fn confirm_payment(&self, command: ConfirmPaymentCommand) -> ContractResult<Contract>;

    async fn add_complaint(&self, command: AddComplaintCommand) -> ContractResult<ComplaintTicket>;

    /// Update a ticket and mirror it onto its service visit
    async fn update_ticket(&self, ticket_id: &TicketId, update: TicketUpdate) -> ContractResult<ComplaintTicket>;

    /// Whether the ticket is bound to a visit entry after the call
    async fn link_ticket_to_visit(&self, ticket_id: &TicketId) -> ContractResult<bool>;

    async fn admin_dashboard(&self) -> ContractResult<DashboardStats>;

    // -------------------------------------------------------------------------
    // Maintenance
    // -------------------------------------------------------------------------

    async fn run_expiry_sweep(&self, now: DateTime<Utc>) -> ContractResult<SweepReport>;
}
