//! Sync bridge
//!
//! Keeps the profile's embedded contracts and the self-service contract
//! records from drifting apart, and decides which copy a reader sees.
//!
//! Authority for a given contract id follows its origin: web-order contracts
//! are owned by the self-service record, everything else by the profile.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::aggregates::{
    ComplaintTicket, Contract, ContractKind, ContractStatus, CustomerProfile, PlanTemplate,
};
use crate::domain::value_objects::Money;
use crate::error::Anomaly;

/// What happened when a ticket was applied to one contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Link {
    /// Already bound and already in step.
    Unchanged,
    /// Already bound; ticket fields were copied over.
    Updated,
    /// Newly bound to the visit entry with this id.
    Bound(Uuid),
}

impl Link {
    pub fn wrote(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Which store the reader's copy came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContractSource {
    SelfService,
    Profile,
}

#[derive(Clone, Debug)]
pub struct ResolvedContract {
    pub contract: Contract,
    pub source: ContractSource,
    pub anomaly: Option<Anomaly>,
}

/// Display fields filled in from the plan catalog when the contract lacks them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Enrichment {
    pub plan_name: String,
    pub image_url: Option<String>,
    pub amount: Option<Money>,
}

pub struct SyncBridge;

impl SyncBridge {
    /// Mirror the ticket onto the entry that already carries its id.
    pub fn mirror_exact(contract: &mut Contract, ticket: &ComplaintTicket, now: DateTime<Utc>) -> Option<Link> {
        let outcome = contract.mirror_ticket(&ticket.id, &ticket.mirror(), now)?;
        if let Some(detail) = outcome.drift {
            Anomaly::SyncDrift {
                contract_id: contract.id().clone(),
                ticket_id: Some(ticket.id.clone()),
                detail,
            }
            .log();
        }
        Some(if outcome.changed { Link::Updated } else { Link::Unchanged })
    }

    /// Bind the ticket to an unlinked entry from the same calendar day.
    pub fn bind_same_day(contract: &mut Contract, ticket: &ComplaintTicket, now: DateTime<Utc>) -> Option<Link> {
        let entry_id = contract.bind_ticket_on_day(ticket.date.date_naive(), &ticket.id, &ticket.mirror(), now)?;
        tracing::info!(
            contract_id = %contract.id(),
            ticket_id = %ticket.id,
            entry_id = %entry_id,
            "Bound ticket to service visit"
        );
        Some(Link::Bound(entry_id))
    }

    /// The contract a dashboard should show as "current" for `kind`.
    ///
    /// An active self-service record wins; otherwise the profile's embedded
    /// sub-document. Neither source is modified.
    pub fn current(
        kind: ContractKind,
        records: &[Contract],
        profile: Option<&CustomerProfile>,
        now: DateTime<Utc>,
    ) -> Option<ResolvedContract> {
        let record = records
            .iter()
            .filter(|c| c.kind() == kind && c.effective_status(now) == ContractStatus::Active)
            .max_by_key(|c| c.start_date());
        let embedded = profile.and_then(|p| p.current(kind));

        match (record, embedded) {
            (Some(record), Some(embedded)) if record.id() == embedded.id() => {
                let (chosen, anomaly) = Self::authoritative(record, embedded);
                let source = if std::ptr::eq(chosen, record) {
                    ContractSource::SelfService
                } else {
                    ContractSource::Profile
                };
                Some(ResolvedContract { contract: chosen.clone(), source, anomaly })
            }
            (Some(record), _) => Some(ResolvedContract {
                contract: record.clone(),
                source: ContractSource::SelfService,
                anomaly: None,
            }),
            (None, Some(embedded)) => Some(ResolvedContract {
                contract: embedded.clone(),
                source: ContractSource::Profile,
                anomaly: None,
            }),
            (None, None) => None,
        }
    }

    /// Pick the owning copy of one contract and report any disagreement.
    pub fn authoritative<'a>(record: &'a Contract, embedded: &'a Contract) -> (&'a Contract, Option<Anomaly>) {
        let detail = Self::differences(record, embedded);
        let anomaly = detail.map(|detail| {
            let anomaly = Anomaly::SyncDrift {
                contract_id: record.id().clone(),
                ticket_id: None,
                detail,
            };
            anomaly.log();
            anomaly
        });

        let chosen = if record.origin() != embedded.origin() || record.origin().is_self_service() {
            record
        } else {
            embedded
        };
        (chosen, anomaly)
    }

    /// Fill in what the contract does not carry itself.
    pub fn enrich(contract: &Contract, plan: Option<&PlanTemplate>) -> Enrichment {
        let plan_name = if contract.plan_name().trim().is_empty() {
            plan.map(|p| p.name.clone()).unwrap_or_default()
        } else {
            contract.plan_name().to_string()
        };
        Enrichment {
            plan_name,
            image_url: contract
                .product_image()
                .map(String::from)
                .or_else(|| plan.and_then(|p| p.image_url.clone())),
            amount: contract.amount().or_else(|| plan.map(|p| p.price)),
        }
    }

    fn differences(a: &Contract, b: &Contract) -> Option<String> {
        let mut diffs = vec![];
        if a.origin() != b.origin() {
            diffs.push("origin".to_string());
        }
        if a.status() != b.status() {
            diffs.push(format!("status {:?} vs {:?}", a.status(), b.status()));
        }
        if a.services_used() != b.services_used() {
            diffs.push(format!("services used {} vs {}", a.services_used(), b.services_used()));
        }
        if a.service_history().len() != b.service_history().len() {
            diffs.push("service history length".to_string());
        }
        if a.end_date() != b.end_date() {
            diffs.push("end date".to_string());
        }
        if diffs.is_empty() {
            None
        } else {
            Some(diffs.join("; "))
        }
    }
}
