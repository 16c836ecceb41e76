//! Service visit history entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::ticket::{TicketPriority, TicketStatus};
use crate::domain::value_objects::TicketId;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceCategory {
    Installation,
    #[default]
    RegularService,
    Repair,
    FilterChange,
    Other,
}

impl ServiceCategory {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Installation => "Installation",
            Self::RegularService => "Regular Service",
            Self::Repair => "Repair",
            Self::FilterChange => "Filter Change",
            Self::Other => "Other",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisitStatus {
    #[default]
    PendingAssignment,
    Assigned,
    Completed,
}

/// What a customer asks for when booking a visit.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VisitDetails {
    pub category: ServiceCategory,
    pub notes: Option<String>,
    pub priority: Option<TicketPriority>,
}

/// One consumed service slot on a contract.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceVisitEntry {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    pub category: ServiceCategory,
    pub technician: Option<String>,
    pub status: VisitStatus,
    pub notes: Option<String>,
    pub ticket_id: Option<TicketId>,
}

impl ServiceVisitEntry {
    pub fn requested(details: &VisitDetails, ticket_id: TicketId, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            date: now,
            category: details.category,
            technician: None,
            status: VisitStatus::PendingAssignment,
            notes: details.notes.clone(),
            ticket_id: Some(ticket_id),
        }
    }

    pub fn is_linked(&self) -> bool {
        self.ticket_id.is_some()
    }

    /// Copy ticket-side progress onto this entry.
    ///
    /// A completed visit never regresses; a ticket that disagrees with it is
    /// reported as drift and the entry is left alone.
    pub fn mirror(&mut self, ticket: &TicketMirror) -> MirrorOutcome {
        let target = ticket.visit_status();

        if self.status == VisitStatus::Completed && target != VisitStatus::Completed {
            return MirrorOutcome {
                changed: false,
                drift: Some(format!(
                    "visit {} is completed but ticket is {:?}",
                    self.id, ticket.status
                )),
            };
        }

        let mut changed = false;
        if self.status != target {
            self.status = target;
            changed = true;
        }
        if ticket.technician.is_some() && self.technician != ticket.technician {
            self.technician = ticket.technician.clone();
            changed = true;
        }
        if ticket.resolution_notes.is_some() && self.notes != ticket.resolution_notes {
            self.notes = ticket.resolution_notes.clone();
            changed = true;
        }

        MirrorOutcome { changed, drift: None }
    }
}

/// Ticket fields that flow from the admin side onto a visit entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TicketMirror {
    pub status: TicketStatus,
    pub technician: Option<String>,
    pub resolution_notes: Option<String>,
}

impl TicketMirror {
    fn visit_status(&self) -> VisitStatus {
        match self.status {
            TicketStatus::Resolved => VisitStatus::Completed,
            TicketStatus::InProgress => VisitStatus::Assigned,
            TicketStatus::Open if self.technician.is_some() => VisitStatus::Assigned,
            TicketStatus::Open => VisitStatus::PendingAssignment,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MirrorOutcome {
    pub changed: bool,
    pub drift: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> ServiceVisitEntry {
        ServiceVisitEntry::requested(
            &VisitDetails::default(),
            TicketId::from_string("SR-1"),
            Utc::now(),
        )
    }

    #[test]
    fn test_mirror_assigns_technician() {
        let mut visit = entry();
        let outcome = visit.mirror(&TicketMirror {
            status: TicketStatus::InProgress,
            technician: Some("Ravi".into()),
            resolution_notes: None,
        });
        assert!(outcome.changed);
        assert_eq!(visit.status, VisitStatus::Assigned);
        assert_eq!(visit.technician.as_deref(), Some("Ravi"));
    }

    #[test]
    fn test_mirror_is_idempotent() {
        let mut visit = entry();
        let mirror = TicketMirror {
            status: TicketStatus::Resolved,
            technician: Some("Ravi".into()),
            resolution_notes: Some("Filter replaced".into()),
        };
        assert!(visit.mirror(&mirror).changed);
        assert_eq!(visit.mirror(&mirror), MirrorOutcome::default());
    }

    #[test]
    fn test_completed_visit_reports_drift() {
        let mut visit = entry();
        visit.status = VisitStatus::Completed;
        let outcome = visit.mirror(&TicketMirror {
            status: TicketStatus::Open,
            technician: None,
            resolution_notes: None,
        });
        assert!(!outcome.changed);
        assert!(outcome.drift.is_some());
        assert_eq!(visit.status, VisitStatus::Completed);
    }
}
