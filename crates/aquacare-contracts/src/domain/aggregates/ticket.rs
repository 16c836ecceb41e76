//! Complaint tickets embedded in a customer profile

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::visit::{ServiceCategory, TicketMirror};
use crate::domain::value_objects::TicketId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComplaintType {
    NoWater,
    BadTaste,
    Leakage,
    Noise,
    WaterQualityTest,
    AmcInquiry,
    ServiceRequest,
    FilterChange,
    Installation,
    Repair,
    Other,
}

impl From<ServiceCategory> for ComplaintType {
    fn from(category: ServiceCategory) -> Self {
        match category {
            ServiceCategory::Installation => Self::Installation,
            ServiceCategory::RegularService => Self::ServiceRequest,
            ServiceCategory::Repair => Self::Repair,
            ServiceCategory::FilterChange => Self::FilterChange,
            ServiceCategory::Other => Self::Other,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TicketPriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComplaintTicket {
    pub id: TicketId,
    pub complaint_type: ComplaintType,
    pub description: String,
    pub date: DateTime<Utc>,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub assigned_technician: Option<String>,
    pub resolution_notes: Option<String>,
}

impl ComplaintTicket {
    pub fn open(
        id: TicketId,
        complaint_type: ComplaintType,
        description: impl Into<String>,
        priority: TicketPriority,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            complaint_type,
            description: description.into(),
            date,
            priority,
            status: TicketStatus::Open,
            assigned_technician: None,
            resolution_notes: None,
        }
    }

    /// Apply an admin update; returns whether anything changed.
    pub fn apply(&mut self, update: &TicketUpdate) -> bool {
        let before = self.clone();
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(priority) = update.priority {
            self.priority = priority;
        }
        if let Some(tech) = &update.assigned_technician {
            self.assigned_technician = Some(tech.clone());
        }
        if let Some(notes) = &update.resolution_notes {
            self.resolution_notes = Some(notes.clone());
        }
        *self != before
    }

    pub fn mirror(&self) -> TicketMirror {
        TicketMirror {
            status: self.status,
            technician: self.assigned_technician.clone(),
            resolution_notes: self.resolution_notes.clone(),
        }
    }
}

/// Partial update of a ticket; `None` leaves the field untouched.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TicketUpdate {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub assigned_technician: Option<String>,
    pub resolution_notes: Option<String>,
}
