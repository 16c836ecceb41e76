//! Domain Events
//!
//! Events raised by aggregates to communicate state changes. The application
//! layer drains them after a successful write and turns the interesting ones
//! into notifications.

use chrono::{DateTime, Utc};

use crate::domain::aggregates::contract::{ArchiveReason, ContractKind, ContractStatus};
use crate::domain::aggregates::ticket::TicketStatus;
use crate::domain::value_objects::{ContractId, CustomerId, TicketId};

/// All domain events in the contracts bounded context
#[derive(Clone, Debug, PartialEq)]
pub enum DomainEvent {
    Contract(ContractEvent),
    Customer(CustomerEvent),
}

#[derive(Clone, Debug, PartialEq)]
pub enum ContractEvent {
    Created {
        contract_id: ContractId,
        kind: ContractKind,
        status: ContractStatus,
        end_date: DateTime<Utc>,
    },
    Activated {
        contract_id: ContractId,
        activated_at: DateTime<Utc>,
    },
    Expired {
        contract_id: ContractId,
        expired_at: DateTime<Utc>,
    },
    Cancelled {
        contract_id: ContractId,
        reason: String,
        cancelled_at: DateTime<Utc>,
    },
    PutOnHold {
        contract_id: ContractId,
    },
    Resumed {
        contract_id: ContractId,
    },
    Archived {
        contract_id: ContractId,
        reason: ArchiveReason,
    },
    VisitRequested {
        contract_id: ContractId,
        ticket_id: TicketId,
        services_used: u32,
        services_total: u32,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum CustomerEvent {
    Created {
        customer_id: CustomerId,
        created_at: DateTime<Utc>,
    },
    ContractInstalled {
        customer_id: CustomerId,
        contract_id: ContractId,
        replaced: Option<ContractId>,
    },
    TicketOpened {
        customer_id: CustomerId,
        ticket_id: TicketId,
    },
    TicketUpdated {
        customer_id: CustomerId,
        ticket_id: TicketId,
        status: TicketStatus,
    },
}

impl DomainEvent {
    /// Get the aggregate ID this event belongs to
    pub fn aggregate_id(&self) -> &str {
        match self {
            DomainEvent::Contract(e) => match e {
                ContractEvent::Created { contract_id, .. }
                | ContractEvent::Activated { contract_id, .. }
                | ContractEvent::Expired { contract_id, .. }
                | ContractEvent::Cancelled { contract_id, .. }
                | ContractEvent::PutOnHold { contract_id }
                | ContractEvent::Resumed { contract_id }
                | ContractEvent::Archived { contract_id, .. }
                | ContractEvent::VisitRequested { contract_id, .. } => contract_id.as_str(),
            },
            DomainEvent::Customer(e) => match e {
                CustomerEvent::Created { customer_id, .. }
                | CustomerEvent::ContractInstalled { customer_id, .. }
                | CustomerEvent::TicketOpened { customer_id, .. }
                | CustomerEvent::TicketUpdated { customer_id, .. } => customer_id.as_str(),
            },
        }
    }

    /// Get event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::Contract(e) => match e {
                ContractEvent::Created { .. } => "contract.created",
                ContractEvent::Activated { .. } => "contract.activated",
                ContractEvent::Expired { .. } => "contract.expired",
                ContractEvent::Cancelled { .. } => "contract.cancelled",
                ContractEvent::PutOnHold { .. } => "contract.on_hold",
                ContractEvent::Resumed { .. } => "contract.resumed",
                ContractEvent::Archived { .. } => "contract.archived",
                ContractEvent::VisitRequested { .. } => "contract.visit_requested",
            },
            DomainEvent::Customer(e) => match e {
                CustomerEvent::Created { .. } => "customer.created",
                CustomerEvent::ContractInstalled { .. } => "customer.contract_installed",
                CustomerEvent::TicketOpened { .. } => "customer.ticket_opened",
                CustomerEvent::TicketUpdated { .. } => "customer.ticket_updated",
            },
        }
    }
}
