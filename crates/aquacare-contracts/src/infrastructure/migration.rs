//! Legacy contract documents
//!
//! Version 1 sub-documents were written by the admin panel before quota,
//! duration and payment tracking existed, so any of those may be missing.
//! Current documents carry `schema_version` and deserialize as-is.

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::aggregates::contract::{ContractParts, CONTRACT_SCHEMA_VERSION};
use crate::domain::aggregates::{
    term_end, Contract, ContractKind, ContractOrigin, ContractStatus, PaymentState, ServiceCategory,
    ServiceVisitEntry, VisitStatus,
};
use crate::domain::services::generate_id;
use crate::domain::value_objects::{ContractId, Money, PlanId, TicketId};

/// Visit quota the admin panel assumed for AMCs that never stored one
const LEGACY_AMC_QUOTA: u32 = 3;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyContract {
    #[serde(alias = "amcId", alias = "rentalId")]
    id: Option<String>,
    plan_id: Option<String>,
    plan_name: Option<String>,
    #[serde(alias = "machineModel")]
    product_name: Option<String>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    duration_months: Option<u32>,
    services_total: Option<u32>,
    services_used: Option<u32>,
    parts_included: Option<bool>,
    amount: Option<Decimal>,
    amount_paid: Option<Decimal>,
    payment_status: Option<String>,
    status: Option<String>,
    assigned_technician: Option<String>,
    notes: Option<String>,
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    service_history: Vec<LegacyVisit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyVisit {
    date: Option<DateTime<Utc>>,
    #[serde(alias = "type")]
    service_type: Option<String>,
    #[serde(alias = "technicianName")]
    technician: Option<String>,
    status: Option<String>,
    notes: Option<String>,
    complaint_id: Option<String>,
}

impl LegacyVisit {
    fn upgrade(self, fallback_date: DateTime<Utc>) -> Result<ServiceVisitEntry, MigrationError> {
        let category = match self.service_type.as_deref() {
            None | Some("Regular Service") => ServiceCategory::RegularService,
            Some("Installation") => ServiceCategory::Installation,
            Some("Repair") => ServiceCategory::Repair,
            Some("Filter Change") => ServiceCategory::FilterChange,
            Some("Other") => ServiceCategory::Other,
            Some(other) => return Err(MigrationError::Invalid(format!("service type {other:?}"))),
        };
        let technician = self.technician.filter(|t| !t.trim().is_empty());
        // Entries written without a status were logged after the technician came.
        let status = match self.status.as_deref() {
            Some("Completed") => VisitStatus::Completed,
            Some("Assigned") => VisitStatus::Assigned,
            Some(_) => VisitStatus::PendingAssignment,
            None if technician.is_some() => VisitStatus::Completed,
            None => VisitStatus::PendingAssignment,
        };
        Ok(ServiceVisitEntry {
            id: Uuid::new_v4(),
            date: self.date.unwrap_or(fallback_date),
            category,
            technician,
            status,
            notes: self.notes.filter(|n| !n.trim().is_empty()),
            ticket_id: self.complaint_id.filter(|c| !c.trim().is_empty()).map(TicketId::from_string),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("document has no {0}")]
    MissingField(&'static str),
    #[error("invalid value: {0}")]
    Invalid(String),
}

/// Upgrades stored contract documents to the current schema.
#[derive(Clone, Debug)]
pub struct ContractMigrator {
    default_duration_months: u32,
    default_rental_quota: u32,
}

impl ContractMigrator {
    pub fn new(default_duration_months: u32, default_rental_quota: u32) -> Self {
        Self {
            default_duration_months,
            default_rental_quota,
        }
    }

    pub fn is_current(document: &Value) -> bool {
        document
            .get("schema_version")
            .and_then(Value::as_u64)
            .is_some_and(|v| v >= u64::from(CONTRACT_SCHEMA_VERSION))
    }

    /// Parse one document of the given kind, upgrading it when it predates
    /// schema versioning.
    pub fn upgrade(&self, kind: ContractKind, document: Value) -> Result<Contract, MigrationError> {
        if Self::is_current(&document) {
            return Ok(serde_json::from_value(document)?);
        }
        let legacy: LegacyContract = serde_json::from_value(document)?;
        self.from_legacy(kind, legacy)
    }

    /// Upgrade a batch, keeping going past bad documents.
    pub fn upgrade_all(
        &self,
        kind: ContractKind,
        documents: Vec<Value>,
    ) -> (Vec<Contract>, Vec<(usize, MigrationError)>) {
        let mut upgraded = vec![];
        let mut failed = vec![];
        for (index, document) in documents.into_iter().enumerate() {
            match self.upgrade(kind, document) {
                Ok(contract) => upgraded.push(contract),
                Err(e) => {
                    tracing::warn!(index, error = %e, "Skipping contract document");
                    failed.push((index, e));
                }
            }
        }
        tracing::info!(upgraded = upgraded.len(), failed = failed.len(), "Contract migration finished");
        (upgraded, failed)
    }

    fn from_legacy(&self, kind: ContractKind, legacy: LegacyContract) -> Result<Contract, MigrationError> {
        let start_date = legacy.start_date.ok_or(MigrationError::MissingField("start date"))?;
        let duration_months = match (legacy.duration_months.filter(|m| *m > 0), legacy.end_date) {
            (Some(months), _) => months,
            (None, Some(end)) => months_between(start_date, end).max(1),
            (None, None) => self.default_duration_months,
        };
        let end_date = match legacy.end_date {
            Some(end) => end,
            None => term_end(start_date, duration_months).map_err(|e| MigrationError::Invalid(e.to_string()))?,
        };
        if end_date < start_date {
            return Err(MigrationError::Invalid(format!("ends {end_date} before it starts {start_date}")));
        }

        let services_total = legacy.services_total.unwrap_or(match kind {
            ContractKind::Amc => LEGACY_AMC_QUOTA,
            ContractKind::Rental => self.default_rental_quota,
        });
        let payment_state = match legacy.payment_status.as_deref() {
            Some("Paid") => PaymentState::Paid,
            Some("Partial") => PaymentState::Partial,
            Some(_) => PaymentState::Pending,
            None if kind == ContractKind::Rental => PaymentState::Paid,
            None => PaymentState::Pending,
        };
        let status = match legacy.status.as_deref() {
            None | Some("Active") => ContractStatus::Active,
            Some("Expired") => ContractStatus::Expired,
            Some("On Hold") | Some("OnHold") => ContractStatus::OnHold,
            Some("Cancelled") => ContractStatus::Cancelled,
            Some("Pending") | Some("Inactive") => ContractStatus::Pending,
            Some(other) => return Err(MigrationError::Invalid(format!("status {other:?}"))),
        };

        let created_at = legacy.created_at.unwrap_or(start_date);
        let service_history = legacy
            .service_history
            .into_iter()
            .map(|visit| visit.upgrade(start_date))
            .collect::<Result<Vec<_>, _>>()?;
        // Older documents logged visits without bumping the counter
        let services_used = legacy.services_used.unwrap_or(0).max(service_history.len() as u32);

        let id = match legacy.id.filter(|id| !id.trim().is_empty()) {
            Some(id) => ContractId::from_string(id),
            None => generate_id(kind, created_at),
        };

        Ok(Contract::from_parts(ContractParts {
            id,
            kind,
            origin: ContractOrigin::Admin,
            plan_id: legacy.plan_id.map(PlanId::from_string),
            plan_name: legacy.plan_name.unwrap_or_default(),
            product_name: legacy.product_name,
            start_date,
            end_date,
            duration_months,
            services_total,
            services_used,
            parts_included: legacy.parts_included.unwrap_or(false),
            amount: legacy.amount.map(money).transpose()?,
            amount_paid: legacy.amount_paid.map(money).transpose()?.unwrap_or_else(Money::zero),
            payment_state,
            status,
            technician: legacy.assigned_technician,
            notes: legacy.notes.into_iter().filter(|n| !n.trim().is_empty()).collect(),
            service_history,
            created_at,
        }))
    }
}

fn money(amount: Decimal) -> Result<Money, MigrationError> {
    Money::inr(amount).map_err(|e| MigrationError::Invalid(e.to_string()))
}

fn months_between(start: DateTime<Utc>, end: DateTime<Utc>) -> u32 {
    let months = (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32;
    months.max(0) as u32
}
