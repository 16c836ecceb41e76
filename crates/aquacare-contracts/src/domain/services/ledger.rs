//! Service visit ledger

use chrono::{DateTime, Utc};

use crate::domain::aggregates::{
    ComplaintTicket, ComplaintType, Contract, LifecycleError, ServiceVisitEntry, VisitDetails,
};
use crate::domain::value_objects::TicketId;

/// Consumes visit quota and produces the matching complaint ticket.
#[derive(Clone, Debug)]
pub struct ServiceVisitLedger {
    ticket_prefix: String,
}

impl ServiceVisitLedger {
    pub fn new(ticket_prefix: impl Into<String>) -> Self {
        Self { ticket_prefix: ticket_prefix.into() }
    }

    /// Append a visit with a fresh ticket id and take one slot.
    pub fn request_visit(
        &self,
        contract: &mut Contract,
        details: &VisitDetails,
        now: DateTime<Utc>,
    ) -> Result<ServiceVisitEntry, LifecycleError> {
        let ticket_id = TicketId::generate(&self.ticket_prefix, now);
        contract.request_visit(details, ticket_id, now)
    }

    /// Open ticket mirroring `entry`, sharing its ticket id.
    pub fn mirror_ticket(
        contract: &Contract,
        entry: &ServiceVisitEntry,
        details: &VisitDetails,
        now: DateTime<Utc>,
    ) -> Option<ComplaintTicket> {
        let ticket_id = entry.ticket_id.clone()?;
        let mut description = format!(
            "{} requested for {} ({}), visit {} of {}",
            entry.category.label(),
            contract.plan_name(),
            contract.id(),
            contract.services_used(),
            contract.services_total()
        );
        if let Some(notes) = details.notes.as_deref().filter(|n| !n.trim().is_empty()) {
            description.push_str(": ");
            description.push_str(notes.trim());
        }

        Some(ComplaintTicket::open(
            ticket_id,
            ComplaintType::from(entry.category),
            description,
            details.priority.unwrap_or_default(),
            now,
        ))
    }
}
